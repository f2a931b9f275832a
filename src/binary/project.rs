//! Projects a solved [`FunctionGraph`] into the shared [`FileTable`] model:
//! function hits, line hits, and branch hits, with source paths normalized
//! against a [`ParseConfig`].

use super::notes::{ArcFlags, FunctionGraph};
use crate::config::ParseConfig;
use crate::model::FileTable;

const ENTRY: usize = 0;
const EXIT: usize = 1;

/// Folds one solved function's contribution into `table`. `block_counts`
/// must be the result of [`super::solver::solve`] for `func`.
pub fn project(func: &FunctionGraph, block_counts: &[u64], cfg: &ParseConfig, table: &mut FileTable) {
    let decl_file = cfg.resolve(std::path::Path::new(&func.source));
    let entry_count = block_counts[ENTRY];
    {
        let cov = table.file_mut(decl_file);
        cov.set_function_line(&func.name, func.line);
        cov.add_function_hit(&func.name, entry_count);
    }

    for (bi, block) in func.blocks.iter().enumerate() {
        if bi == ENTRY || bi == EXIT || block.is_call_return {
            continue;
        }
        let count = block_counts[bi];
        for (file, line) in &block.lines {
            let path = cfg.resolve(std::path::Path::new(file));
            table.file_mut(path).add_line(*line, count);
        }

        let non_fake = block
            .out_arcs
            .iter()
            .filter(|a| !a.flags.contains(ArcFlags::FAKE_ARC))
            .count();
        if non_fake > 1 {
            if let Some((file, line)) = block.lines.last() {
                let path = cfg.resolve(std::path::Path::new(file));
                let cov = table.file_mut(path);
                for (ai, arc) in block.out_arcs.iter().enumerate() {
                    if arc
                        .flags
                        .intersects(ArcFlags::FAKE_ARC | ArcFlags::CALL_NON_RETURN | ArcFlags::UNCONDITIONAL)
                    {
                        continue;
                    }
                    cov.add_branch(*line, bi as u32, ai as u32, arc.count.unwrap_or(0) as u64);
                }
            }
        }
    }
}
