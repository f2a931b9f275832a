//! Matches a data (gcda) file's FUNCTION/COUNTERS records against an
//! already-built notes graph and deposits runtime counters onto the
//! matching non-computed arcs.

use std::collections::HashMap;

use super::notes::FunctionGraph;
use super::reader::{GcovHeader, PayloadCursor, RawRecord, RecordReader};
use super::{is_child_tag, TAG_COUNTERS, TAG_FUNCTION};
use crate::error::{CovError, Result};

/// Parses `buf` as a data file and deposits its counters onto `functions`
/// (indexed by gcno-assigned identifier via `id_index`). `functions` must
/// already have been built from the paired notes file.
pub fn merge_data(
    buf: &[u8],
    functions: &mut [FunctionGraph],
    id_index: &HashMap<u32, usize>,
) -> Result<GcovHeader> {
    let (header, body_start) = GcovHeader::parse(buf)?;
    let mut current: Option<usize> = None;

    for record in RecordReader::new(buf, body_start) {
        if !is_child_tag(record.tag) {
            if record.tag == TAG_FUNCTION {
                current = Some(read_function_header(&record, &header, id_index)?);
            } else {
                current = None;
            }
            continue;
        }

        if record.tag == TAG_COUNTERS {
            let Some(idx) = current else {
                log::warn!("COUNTERS record with no enclosing function");
                continue;
            };
            deposit_counters(&record, &mut functions[idx])?;
        }
    }
    Ok(header)
}

fn read_function_header(
    record: &RawRecord,
    header: &GcovHeader,
    id_index: &HashMap<u32, usize>,
) -> Result<usize> {
    let mut cur = PayloadCursor::new(record.payload);
    let id = cur.read_u32()?;
    let _checksum = cur.read_u32()?;
    if header.stamp == "LLVM" {
        let _extra = cur.read_u32()?;
        let _name = cur.read_string()?;
    } else if header.version.as_bytes() > b"407 " {
        let _extra = cur.read_u32()?;
    }
    id_index
        .get(&id)
        .copied()
        .ok_or(CovError::UnknownFunction(id))
}

/// Arc positions in block-then-arc order whose counts are recorded at
/// runtime (i.e. `COMPUTED_COUNT` is *not* set on them) — this is the order
/// the COUNTERS payload's values correspond to.
fn counted_arc_positions(func: &FunctionGraph) -> Vec<(usize, usize)> {
    let mut positions = Vec::new();
    for (bi, block) in func.blocks.iter().enumerate() {
        for (ai, arc) in block.out_arcs.iter().enumerate() {
            if !arc.is_computed() {
                positions.push((bi, ai));
            }
        }
    }
    positions
}

fn deposit_counters(record: &RawRecord, func: &mut FunctionGraph) -> Result<()> {
    let positions = counted_arc_positions(func);
    let expected_words = positions.len() * 2;
    let found_words = record.payload.len() / 4;
    if found_words != expected_words {
        return Err(CovError::CounterMismatch {
            name: func.name.clone(),
            expected: expected_words,
            found: found_words,
        });
    }
    let mut cur = PayloadCursor::new(record.payload);
    for (bi, ai) in positions {
        let lo = cur.read_u32()? as u64;
        let hi = cur.read_u32()? as u64;
        let value = (lo | (hi << 32)) as i64;
        let arc = &mut func.blocks[bi].out_arcs[ai];
        arc.count = Some(arc.count.unwrap_or(0) + value);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::notes::{Arc, ArcFlags, Block};
    use crate::binary::reader::DATA_MAGIC;

    fn sample_function() -> FunctionGraph {
        FunctionGraph {
            id: 1,
            name: "foo".into(),
            source: "a.c".into(),
            line: 10,
            blocks: vec![
                Block {
                    out_arcs: vec![Arc {
                        target: 1,
                        flags: ArcFlags::empty(),
                        count: Some(0),
                    }],
                    lines: vec![],
                    is_call_return: false,
                },
                Block::default(),
            ],
        }
    }

    fn push_string(buf: &mut Vec<u8>, s: &str) {
        let words = (s.len() + 3) / 4;
        buf.extend_from_slice(&(words as u32).to_le_bytes());
        let mut padded = s.as_bytes().to_vec();
        padded.resize(words * 4, 0);
        buf.extend_from_slice(&padded);
    }

    fn push_record(buf: &mut Vec<u8>, tag: u32, payload: &[u8]) {
        buf.extend_from_slice(&tag.to_le_bytes());
        buf.extend_from_slice(&((payload.len() / 4) as u32).to_le_bytes());
        buf.extend_from_slice(payload);
    }

    #[test]
    fn deposits_single_counter() {
        let mut functions = vec![sample_function()];
        let mut id_index = HashMap::new();
        id_index.insert(1, 0);

        // On-disk bytes "*704"/"1234" decode to version "407*", stamp
        // "4321" — not "LLVM", and "407*" > "407 ", so the extra word below
        // is present.
        let mut buf = DATA_MAGIC.to_le_bytes().to_vec();
        buf.extend_from_slice(b"*704");
        buf.extend_from_slice(b"1234");

        let mut func_payload = Vec::new();
        func_payload.extend_from_slice(&1u32.to_le_bytes());
        func_payload.extend_from_slice(&0u32.to_le_bytes());
        func_payload.extend_from_slice(&0u32.to_le_bytes()); // extra word (version > 407)
        push_record(&mut buf, TAG_FUNCTION, &func_payload);

        let mut counters_payload = Vec::new();
        counters_payload.extend_from_slice(&5u32.to_le_bytes()); // low
        counters_payload.extend_from_slice(&0u32.to_le_bytes()); // high
        push_record(&mut buf, TAG_COUNTERS, &counters_payload);

        let _ = push_string; // not used in this fixture; kept for symmetry with notes tests
        merge_data(&buf, &mut functions, &id_index).unwrap();
        assert_eq!(functions[0].blocks[0].out_arcs[0].count, Some(5));
    }
}
