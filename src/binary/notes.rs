//! Builds per-function control-flow graphs from a notes (gcno) file's
//! FUNCTION/BASIC_BLOCKS/ARCS/LINES records.

use bitflags::bitflags;
use std::collections::HashMap;

use super::reader::{GcovHeader, PayloadCursor, RawRecord, RecordReader};
use super::{is_child_tag, TAG_ARCS, TAG_BASIC_BLOCKS, TAG_FUNCTION, TAG_LINES};
use crate::error::Result;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct ArcFlags: u32 {
        const COMPUTED_COUNT  = 0x0000_0001;
        const FAKE_ARC        = 0x0000_0002;
        const FALLTHROUGH     = 0x0000_0004;
        /// Set by the solver, not present on the wire.
        const CALL_NON_RETURN = 0x4000_0000;
        /// Set by the solver, not present on the wire.
        const UNCONDITIONAL   = 0x8000_0000;
    }
}

#[derive(Clone, Debug)]
pub struct Arc {
    pub target: usize,
    pub flags: ArcFlags,
    /// `None` while unsolved (mirrors the original's NaN sentinel).
    pub count: Option<i64>,
}

impl Arc {
    pub fn is_computed(&self) -> bool {
        self.flags.contains(ArcFlags::COMPUTED_COUNT)
    }
}

#[derive(Clone, Debug, Default)]
pub struct Block {
    pub out_arcs: Vec<Arc>,
    /// `(source file, line number)` in the order the LINES record listed
    /// them, which is already ascending per file.
    pub lines: Vec<(String, u32)>,
    /// Set during solver graph augmentation when this block is the
    /// fallthrough target of a call site with no other predecessor.
    pub is_call_return: bool,
}

#[derive(Clone, Debug)]
pub struct FunctionGraph {
    pub id: u32,
    pub name: String,
    pub source: String,
    pub line: u32,
    pub blocks: Vec<Block>,
}

impl FunctionGraph {
    pub fn entry(&self) -> usize {
        0
    }

    pub fn exit(&self) -> usize {
        1
    }
}

/// Parses a notes file's records into one [`FunctionGraph`] per FUNCTION
/// record, in file order.
pub fn build_notes(buf: &[u8]) -> Result<(GcovHeader, Vec<FunctionGraph>)> {
    let (header, body_start) = GcovHeader::parse(buf)?;
    let mut functions = Vec::new();
    let mut current: Option<FunctionGraph> = None;

    for record in RecordReader::new(buf, body_start) {
        if !is_child_tag(record.tag) {
            if record.tag == TAG_FUNCTION {
                if let Some(f) = current.take() {
                    functions.push(f);
                }
                current = Some(read_function(&record, &header.version)?);
            } else {
                if let Some(f) = current.take() {
                    functions.push(f);
                }
                log::debug!("skipping unrecognized top-level tag {:#010x}", record.tag);
            }
            continue;
        }

        let Some(func) = current.as_mut() else {
            log::warn!("child record {:#010x} with no enclosing function", record.tag);
            continue;
        };

        match record.tag {
            TAG_BASIC_BLOCKS => read_basic_blocks(&record, func)?,
            TAG_ARCS => read_arcs(&record, func)?,
            TAG_LINES => read_lines(&record, func)?,
            other => log::debug!("skipping unrecognized child tag {:#010x}", other),
        }
    }
    if let Some(f) = current.take() {
        functions.push(f);
    }
    Ok((header, functions))
}

fn read_function(record: &RawRecord, version: &str) -> Result<FunctionGraph> {
    let mut cur = PayloadCursor::new(record.payload);
    let id = cur.read_u32()?;
    let _checksum = cur.read_u32()?;
    if version.as_bytes() > b"407 " {
        let _checksum2 = cur.read_u32()?;
    }
    let name = cur.read_string()?;
    let source = cur.read_string()?;
    let line = cur.read_u32()?;
    Ok(FunctionGraph {
        id,
        name,
        source,
        line,
        blocks: Vec::new(),
    })
}

fn read_basic_blocks(record: &RawRecord, func: &mut FunctionGraph) -> Result<()> {
    let n = record.payload.len() / 4;
    func.blocks = vec![Block::default(); n];
    Ok(())
}

fn read_arcs(record: &RawRecord, func: &mut FunctionGraph) -> Result<()> {
    let mut cur = PayloadCursor::new(record.payload);
    let src = cur.read_u32()? as usize;
    while !cur.at_end() {
        let target = cur.read_u32()? as usize;
        let flags = ArcFlags::from_bits_truncate(cur.read_u32()?);
        let count = if flags.contains(ArcFlags::COMPUTED_COUNT) {
            None
        } else {
            Some(0)
        };
        if src >= func.blocks.len() {
            func.blocks.resize_with(src + 1, Block::default);
        }
        func.blocks[src].out_arcs.push(Arc {
            target,
            flags,
            count,
        });
    }
    Ok(())
}

fn read_lines(record: &RawRecord, func: &mut FunctionGraph) -> Result<()> {
    let mut cur = PayloadCursor::new(record.payload);
    let block_idx = cur.read_u32()? as usize;
    if block_idx >= func.blocks.len() {
        func.blocks.resize_with(block_idx + 1, Block::default);
    }
    let mut current_file = String::new();
    loop {
        if cur.at_end() {
            break;
        }
        let line = cur.read_u32()?;
        if line == 0 {
            let filename = cur.read_string()?;
            if filename.is_empty() {
                break;
            }
            current_file = filename;
        } else {
            func.blocks[block_idx]
                .lines
                .push((current_file.clone(), line));
        }
    }
    Ok(())
}

/// Looks functions up by identifier, the way the data counter merger needs
/// to when matching gcda FUNCTION records against the notes graph.
pub fn index_by_id(functions: &[FunctionGraph]) -> HashMap<u32, usize> {
    functions
        .iter()
        .enumerate()
        .map(|(i, f)| (f.id, i))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::reader::NOTES_MAGIC;

    fn push_string(buf: &mut Vec<u8>, s: &str) {
        let words = (s.len() + 3) / 4;
        buf.extend_from_slice(&(words as u32).to_le_bytes());
        let mut padded = s.as_bytes().to_vec();
        padded.resize(words * 4, 0);
        buf.extend_from_slice(&padded);
    }

    fn push_record(buf: &mut Vec<u8>, tag: u32, payload: &[u8]) {
        assert_eq!(payload.len() % 4, 0);
        buf.extend_from_slice(&tag.to_le_bytes());
        buf.extend_from_slice(&((payload.len() / 4) as u32).to_le_bytes());
        buf.extend_from_slice(payload);
    }

    #[test]
    fn single_function_two_blocks_one_arc() {
        // On-disk header bytes "*704"/"1234" decode (big-endian-packed,
        // little-endian-stored) to version "407*" and stamp "4321"; "407*"
        // compares greater than "407 ", so the FUNCTION record carries a
        // second checksum word.
        let mut buf = NOTES_MAGIC.to_le_bytes().to_vec();
        buf.extend_from_slice(b"*704");
        buf.extend_from_slice(b"1234");

        let mut func_payload = Vec::new();
        func_payload.extend_from_slice(&1u32.to_le_bytes()); // id
        func_payload.extend_from_slice(&0u32.to_le_bytes()); // checksum
        func_payload.extend_from_slice(&0u32.to_le_bytes()); // checksum2 (version > "407 ")
        push_string(&mut func_payload, "foo");
        push_string(&mut func_payload, "a.c");
        func_payload.extend_from_slice(&10u32.to_le_bytes()); // decl line
        push_record(&mut buf, TAG_FUNCTION, &func_payload);

        let bb_payload = vec![0u8; 8]; // 2 blocks
        push_record(&mut buf, TAG_BASIC_BLOCKS, &bb_payload);

        let mut arcs_payload = Vec::new();
        arcs_payload.extend_from_slice(&0u32.to_le_bytes()); // src block 0
        arcs_payload.extend_from_slice(&1u32.to_le_bytes()); // target block 1
        arcs_payload.extend_from_slice(&0u32.to_le_bytes()); // flags: plain
        push_record(&mut buf, TAG_ARCS, &arcs_payload);

        let mut lines_payload = Vec::new();
        lines_payload.extend_from_slice(&0u32.to_le_bytes()); // block 0
        lines_payload.extend_from_slice(&0u32.to_le_bytes());
        push_string(&mut lines_payload, "a.c");
        lines_payload.extend_from_slice(&10u32.to_le_bytes());
        lines_payload.extend_from_slice(&11u32.to_le_bytes());
        lines_payload.extend_from_slice(&0u32.to_le_bytes());
        push_string(&mut lines_payload, "");
        push_record(&mut buf, TAG_LINES, &lines_payload);

        let (header, functions) = build_notes(&buf).unwrap();
        assert_eq!(header.version, "407*");
        assert_eq!(functions.len(), 1);
        let f = &functions[0];
        assert_eq!(f.name, "foo");
        assert_eq!(f.blocks.len(), 2);
        assert_eq!(f.blocks[0].out_arcs.len(), 1);
        assert_eq!(f.blocks[0].out_arcs[0].target, 1);
        assert_eq!(f.blocks[0].lines, vec![("a.c".to_string(), 10), ("a.c".to_string(), 11)]);
    }
}
