//! Byte-level builders for synthetic gcno/gcda fixtures, so solver and
//! projector tests don't hand-encode tagged records inline every time.

const NOTES_MAGIC: u32 = 0x6763_6e6f;
const DATA_MAGIC: u32 = 0x6763_6461;

const TAG_FUNCTION: u32 = 0x0100_0000;
const TAG_BASIC_BLOCKS: u32 = 0x0141_0000;
const TAG_ARCS: u32 = 0x0143_0000;
const TAG_LINES: u32 = 0x0145_0000;
const TAG_COUNTERS: u32 = 0x01a1_0000;

fn push_string(buf: &mut Vec<u8>, s: &str) {
    let words = (s.len() + 3) / 4;
    buf.extend_from_slice(&(words as u32).to_le_bytes());
    let mut padded = s.as_bytes().to_vec();
    padded.resize(words * 4, 0);
    buf.extend_from_slice(&padded);
}

fn push_record(buf: &mut Vec<u8>, tag: u32, payload: &[u8]) {
    assert_eq!(payload.len() % 4, 0, "record payload must be word-aligned");
    buf.extend_from_slice(&tag.to_le_bytes());
    buf.extend_from_slice(&((payload.len() / 4) as u32).to_le_bytes());
    buf.extend_from_slice(payload);
}

/// Encodes a decoded 4-character version/stamp value (e.g. `"407*"`,
/// `"LLVM"`) into its on-disk bytes: the header stores it as a
/// little-endian `u32` of the big-endian-packed ASCII value, so the raw
/// bytes are the character order reversed (the same quirk as the gcno
/// magic's raw bytes spelling "oncg").
fn encode_header_field(s: &str) -> [u8; 4] {
    assert_eq!(s.len(), 4);
    let mut bytes = [0u8; 4];
    for (dst, src) in bytes.iter_mut().zip(s.bytes().rev()) {
        *dst = src;
    }
    bytes
}

/// One arc in a fixture function: `(target block, flags, runtime count if
/// not computed)`.
pub struct FixtureArc {
    pub target: u32,
    pub flags: u32,
    pub count: Option<u64>,
}

/// One function to emit into a notes/data byte pair: its identifier, name,
/// source file, declaration line, block count, and per-block outgoing arcs.
pub struct FixtureFunction {
    pub id: u32,
    pub name: &'static str,
    pub source: &'static str,
    pub line: u32,
    pub block_arcs: Vec<Vec<FixtureArc>>,
    pub block_lines: Vec<Vec<(String, u32)>>,
}

/// Builds a notes (gcno) byte buffer containing `functions`, under the
/// given decoded `version`/`stamp` values (e.g. `"407*"`, `"LLVM"`) —
/// encoded to their on-disk byte order, not written literally.
pub fn build_gcno(version: &str, stamp: &str, functions: &[FixtureFunction]) -> Vec<u8> {
    assert_eq!(version.len(), 4);
    assert_eq!(stamp.len(), 4);
    let mut buf = NOTES_MAGIC.to_le_bytes().to_vec();
    buf.extend_from_slice(&encode_header_field(version));
    buf.extend_from_slice(&encode_header_field(stamp));

    for func in functions {
        let mut payload = Vec::new();
        payload.extend_from_slice(&func.id.to_le_bytes());
        payload.extend_from_slice(&0u32.to_le_bytes()); // checksum
        if version.as_bytes() > b"407 " {
            payload.extend_from_slice(&0u32.to_le_bytes()); // checksum2
        }
        push_string(&mut payload, func.name);
        push_string(&mut payload, func.source);
        payload.extend_from_slice(&func.line.to_le_bytes());
        push_record(&mut buf, TAG_FUNCTION, &payload);

        let bb_payload = vec![0u8; func.block_arcs.len() * 4];
        push_record(&mut buf, TAG_BASIC_BLOCKS, &bb_payload);

        for (bi, arcs) in func.block_arcs.iter().enumerate() {
            if arcs.is_empty() {
                continue;
            }
            let mut arcs_payload = Vec::new();
            arcs_payload.extend_from_slice(&(bi as u32).to_le_bytes());
            for arc in arcs {
                arcs_payload.extend_from_slice(&arc.target.to_le_bytes());
                arcs_payload.extend_from_slice(&arc.flags.to_le_bytes());
            }
            push_record(&mut buf, TAG_ARCS, &arcs_payload);
        }

        for (bi, lines) in func.block_lines.iter().enumerate() {
            if lines.is_empty() {
                continue;
            }
            let mut lines_payload = Vec::new();
            lines_payload.extend_from_slice(&(bi as u32).to_le_bytes());
            let mut current_file = String::new();
            for (file, line) in lines {
                if file != &current_file {
                    lines_payload.extend_from_slice(&0u32.to_le_bytes());
                    push_string(&mut lines_payload, file);
                    current_file = file.clone();
                }
                lines_payload.extend_from_slice(&line.to_le_bytes());
            }
            lines_payload.extend_from_slice(&0u32.to_le_bytes());
            push_string(&mut lines_payload, "");
            push_record(&mut buf, TAG_LINES, &lines_payload);
        }
    }
    buf
}

/// Builds a matching data (gcda) byte buffer depositing each function's
/// non-computed arc counts, in block-then-arc order. `version`/`stamp` are
/// decoded values, as in [`build_gcno`].
pub fn build_gcda(version: &str, stamp: &str, functions: &[FixtureFunction]) -> Vec<u8> {
    assert_eq!(version.len(), 4);
    assert_eq!(stamp.len(), 4);
    let mut buf = DATA_MAGIC.to_le_bytes().to_vec();
    buf.extend_from_slice(&encode_header_field(version));
    buf.extend_from_slice(&encode_header_field(stamp));

    for func in functions {
        let mut header_payload = Vec::new();
        header_payload.extend_from_slice(&func.id.to_le_bytes());
        header_payload.extend_from_slice(&0u32.to_le_bytes()); // checksum
        if stamp == "LLVM" {
            header_payload.extend_from_slice(&0u32.to_le_bytes());
            push_string(&mut header_payload, func.name);
        } else if version.as_bytes() > b"407 " {
            header_payload.extend_from_slice(&0u32.to_le_bytes());
        }
        push_record(&mut buf, TAG_FUNCTION, &header_payload);

        let mut counters_payload = Vec::new();
        for arcs in &func.block_arcs {
            for arc in arcs {
                if let Some(count) = arc.count {
                    counters_payload.extend_from_slice(&((count & 0xffff_ffff) as u32).to_le_bytes());
                    counters_payload.extend_from_slice(&((count >> 32) as u32).to_le_bytes());
                }
            }
        }
        push_record(&mut buf, TAG_COUNTERS, &counters_payload);
    }
    buf
}
