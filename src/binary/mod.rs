//! Reading, solving, and projecting GCC-family binary coverage artifacts
//! (a "notes" file paired with a "data" file, one pair per translation
//! unit).

pub mod data;
pub mod notes;
pub mod pairing;
pub mod project;
pub mod reader;
pub mod solver;

pub use notes::{Arc, ArcFlags, Block, FunctionGraph};
pub use reader::{FileKind, GcovHeader, RecordReader};

use crate::config::ParseConfig;
use crate::error::{CovError, Result};
use crate::model::FileTable;

/// Parses a notes/data pair, solves the flow graph for every function, and
/// projects the results into a fresh [`FileTable`].
///
/// Callers ingesting multiple pairs merge each resulting table into the
/// appropriate [`crate::model::CoverageStore`] test bucket themselves —
/// this function has no notion of test names (see SPEC_FULL §4.10).
pub fn ingest_pair(notes_buf: &[u8], data_buf: &[u8], cfg: &ParseConfig) -> Result<FileTable> {
    let (notes_header, mut functions) = notes::build_notes(notes_buf)?;
    let id_index = notes::index_by_id(&functions);
    let data_header = data::merge_data(data_buf, &mut functions, &id_index)?;

    if notes_header.version != data_header.version {
        return Err(CovError::VersionMismatch {
            notes: notes_header.version,
            data: data_header.version,
        });
    }
    if notes_header.stamp != data_header.stamp {
        return Err(CovError::StampMismatch {
            notes: notes_header.stamp,
            data: data_header.stamp,
        });
    }

    let mut table = FileTable::new();
    for func in functions.iter_mut() {
        let block_counts = solver::solve(func)?;
        project::project(func, &block_counts, cfg, &mut table);
    }
    Ok(table)
}

/// Memory-maps `notes_path` and `data_path` and ingests them as a pair, the
/// way this codebase's other binary-format readers prefer mapping a whole
/// file over buffered incremental reads.
pub fn ingest_pair_files(
    notes_path: &std::path::Path,
    data_path: &std::path::Path,
    cfg: &ParseConfig,
) -> Result<FileTable> {
    let notes_file = std::fs::File::open(notes_path)?;
    let data_file = std::fs::File::open(data_path)?;
    // Safety: the mapped files are not expected to be concurrently
    // truncated or written by another process during a parse.
    let notes_map = unsafe { memmap2::Mmap::map(&notes_file)? };
    let data_map = unsafe { memmap2::Mmap::map(&data_file)? };
    ingest_pair(&notes_map, &data_map, cfg)
}

/// FUNCTION record tag (top level).
pub const TAG_FUNCTION: u32 = 0x0100_0000;
/// BASIC_BLOCKS record tag (child of FUNCTION).
pub const TAG_BASIC_BLOCKS: u32 = 0x0141_0000;
/// ARCS record tag (child of FUNCTION).
pub const TAG_ARCS: u32 = 0x0143_0000;
/// LINES record tag (child of FUNCTION).
pub const TAG_LINES: u32 = 0x0145_0000;
/// COUNTERS record tag (child of FUNCTION, data file only).
pub const TAG_COUNTERS: u32 = 0x01a1_0000;
/// Object summary record tag, ignored.
pub const TAG_OBJECT_SUMMARY: u32 = 0xa100_0000;
/// Program summary record tag, ignored.
pub const TAG_PROGRAM_SUMMARY: u32 = 0xa300_0000;

/// A tag is a "child" record if the middle octet is nonzero; children
/// attach to the most recently seen top-level (FUNCTION) record.
pub fn is_child_tag(tag: u32) -> bool {
    tag & 0x00ff_0000 != 0
}
