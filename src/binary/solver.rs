//! Kirchhoff-style flow solver: infers counts for arcs whose runtime
//! counter was omitted (`COMPUTED_COUNT`) by propagating flow conservation
//! across each function's control-flow graph.

use std::collections::HashSet;

use super::notes::{ArcFlags, FunctionGraph};
use crate::error::{CovError, Result};

const ENTRY: usize = 0;
const EXIT: usize = 1;

/// Sets the solver-internal `CALL_NON_RETURN`/`UNCONDITIONAL` bits and
/// marks call-return blocks, mirroring the original's `build_solver_graph`.
fn augment(func: &mut FunctionGraph) -> Vec<Vec<(usize, usize)>> {
    let n = func.blocks.len();
    let mut preds = vec![Vec::new(); n];
    for (bi, block) in func.blocks.iter().enumerate() {
        for (ai, arc) in block.out_arcs.iter().enumerate() {
            preds[arc.target].push((bi, ai));
        }
    }

    for (bi, block) in func.blocks.iter_mut().enumerate() {
        if bi == ENTRY {
            continue;
        }
        for arc in block.out_arcs.iter_mut() {
            if arc.flags.contains(ArcFlags::FAKE_ARC) {
                arc.flags |= ArcFlags::CALL_NON_RETURN;
            }
        }
    }

    for bi in 0..n {
        let non_fake: Vec<usize> = func.blocks[bi]
            .out_arcs
            .iter()
            .enumerate()
            .filter(|(_, a)| !a.flags.contains(ArcFlags::FAKE_ARC))
            .map(|(ai, _)| ai)
            .collect();
        let has_fake = func.blocks[bi]
            .out_arcs
            .iter()
            .any(|a| a.flags.contains(ArcFlags::FAKE_ARC));
        if non_fake.len() == 1 {
            let ai = non_fake[0];
            func.blocks[bi].out_arcs[ai].flags |= ArcFlags::UNCONDITIONAL;
            let is_fallthrough = func.blocks[bi].out_arcs[ai]
                .flags
                .contains(ArcFlags::FALLTHROUGH);
            if bi != ENTRY && has_fake && is_fallthrough {
                let target = func.blocks[bi].out_arcs[ai].target;
                if preds[target].len() == 1 {
                    func.blocks[target].is_call_return = true;
                }
            }
        }
    }

    preds
}

fn out_sum(func: &FunctionGraph, bi: usize) -> Option<i64> {
    func.blocks[bi]
        .out_arcs
        .iter()
        .map(|a| a.count)
        .collect::<Option<Vec<i64>>>()
        .map(|v| v.iter().sum())
}

fn in_sum(func: &FunctionGraph, preds: &[Vec<(usize, usize)>], bi: usize) -> Option<i64> {
    preds[bi]
        .iter()
        .map(|&(sb, sa)| func.blocks[sb].out_arcs[sa].count)
        .collect::<Option<Vec<i64>>>()
        .map(|v| v.iter().sum())
}

fn try_compute_block(
    func: &FunctionGraph,
    preds: &[Vec<(usize, usize)>],
    bi: usize,
) -> Option<i64> {
    if bi == ENTRY {
        out_sum(func, bi)
    } else if bi == EXIT {
        in_sum(func, preds, bi)
    } else {
        out_sum(func, bi).or_else(|| in_sum(func, preds, bi))
    }
}

/// Solves all computed arcs in `func`, mutating their counts in place, and
/// returns each block's resolved count (same length and order as
/// `func.blocks`).
pub fn solve(func: &mut FunctionGraph) -> Result<Vec<u64>> {
    let preds = augment(func);
    let n = func.blocks.len();
    let mut block_count: Vec<Option<i64>> = vec![None; n];

    let mut unsolved_arcs: HashSet<(usize, usize)> = HashSet::new();
    for (bi, block) in func.blocks.iter().enumerate() {
        for (ai, arc) in block.out_arcs.iter().enumerate() {
            if arc.count.is_none() {
                unsolved_arcs.insert((bi, ai));
            }
        }
    }
    let mut unsolved_blocks: HashSet<usize> = (0..n).collect();

    // Blocks with no unknown out-arcs (or no out-arcs at all) can often be
    // seeded immediately; fold that into the same fixed-point loop below by
    // just letting the first pass discover it.
    loop {
        let mut changed = false;

        for &(bi, ai) in unsolved_arcs.clone().iter() {
            if func.blocks[bi].out_arcs[ai].count.is_some() {
                continue;
            }
            if let Some(total) = block_count[bi] {
                let others: Option<i64> = func.blocks[bi]
                    .out_arcs
                    .iter()
                    .enumerate()
                    .filter(|&(j, _)| j != ai)
                    .map(|(_, a)| a.count)
                    .collect::<Option<Vec<i64>>>()
                    .map(|v| v.iter().sum());
                if let Some(sum_others) = others {
                    func.blocks[bi].out_arcs[ai].count = Some(total - sum_others);
                    unsolved_arcs.remove(&(bi, ai));
                    changed = true;
                    continue;
                }
            }
            let target = func.blocks[bi].out_arcs[ai].target;
            if let Some(total) = block_count[target] {
                let sum_others: Option<i64> = preds[target]
                    .iter()
                    .filter(|&&(sb, sa)| !(sb == bi && sa == ai))
                    .map(|&(sb, sa)| func.blocks[sb].out_arcs[sa].count)
                    .collect::<Option<Vec<i64>>>()
                    .map(|v| v.iter().sum());
                if let Some(sum_others) = sum_others {
                    func.blocks[bi].out_arcs[ai].count = Some(total - sum_others);
                    unsolved_arcs.remove(&(bi, ai));
                    changed = true;
                }
            }
        }

        for &bi in unsolved_blocks.clone().iter() {
            if let Some(c) = try_compute_block(func, &preds, bi) {
                block_count[bi] = Some(c);
                unsolved_blocks.remove(&bi);
                changed = true;
            }
        }

        if unsolved_arcs.is_empty() && unsolved_blocks.is_empty() {
            break;
        }
        if !changed {
            return Err(CovError::UnsolvableGraph(func.name.clone()));
        }
    }

    let mut result = Vec::with_capacity(n);
    for (bi, c) in block_count.into_iter().enumerate() {
        let c = c.unwrap_or(0);
        if c < 0 {
            return Err(CovError::NegativeCount {
                name: func.name.clone(),
                block: bi,
            });
        }
        result.push(c as u64);
    }
    for block in &func.blocks {
        for arc in &block.out_arcs {
            if arc.count.unwrap_or(0) < 0 {
                return Err(CovError::NegativeCount {
                    name: func.name.clone(),
                    block: 0,
                });
            }
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::notes::{Arc, Block};

    fn linear_function(known: i64) -> FunctionGraph {
        // block 0 (entry) --computed--> block 2 --known(5)--> block 1 (exit)
        FunctionGraph {
            id: 1,
            name: "foo".into(),
            source: "a.c".into(),
            line: 1,
            blocks: vec![
                Block {
                    out_arcs: vec![Arc {
                        target: 2,
                        flags: ArcFlags::COMPUTED_COUNT,
                        count: None,
                    }],
                    lines: vec![],
                    is_call_return: false,
                },
                Block::default(),
                Block {
                    out_arcs: vec![Arc {
                        target: 1,
                        flags: ArcFlags::empty(),
                        count: Some(known),
                    }],
                    lines: vec![],
                    is_call_return: false,
                },
            ],
        }
    }

    #[test]
    fn solves_trivial_chain() {
        let mut func = linear_function(5);
        let counts = solve(&mut func).unwrap();
        assert_eq!(func.blocks[0].out_arcs[0].count, Some(5));
        assert_eq!(counts[0], 5); // entry == function hit count
        assert_eq!(counts[2], 5);
    }

    fn call_site_function(non_fake_flags: ArcFlags) -> FunctionGraph {
        // block 0 (entry) --plain--> block 2 (call site) --known--> block 1 (exit)
        // block 2 also has a FAKE_ARC to the exit, modelling a call that
        // might not return.
        FunctionGraph {
            id: 3,
            name: "calls".into(),
            source: "a.c".into(),
            line: 1,
            blocks: vec![
                Block {
                    out_arcs: vec![Arc {
                        target: 2,
                        flags: ArcFlags::empty(),
                        count: Some(1),
                    }],
                    lines: vec![],
                    is_call_return: false,
                },
                Block::default(),
                Block {
                    out_arcs: vec![
                        Arc {
                            target: 1,
                            flags: ArcFlags::FAKE_ARC,
                            count: Some(0),
                        },
                        Arc {
                            target: 3,
                            flags: non_fake_flags,
                            count: Some(1),
                        },
                    ],
                    lines: vec![],
                    is_call_return: false,
                },
                Block::default(),
            ],
        }
    }

    #[test]
    fn fallthrough_after_fake_arc_is_marked_call_return() {
        let mut func = call_site_function(ArcFlags::FALLTHROUGH);
        augment(&mut func);
        assert!(func.blocks[3].is_call_return);
    }

    #[test]
    fn non_fallthrough_after_fake_arc_is_not_marked_call_return() {
        let mut func = call_site_function(ArcFlags::empty());
        augment(&mut func);
        assert!(!func.blocks[3].is_call_return);
    }

    #[test]
    fn detects_unsolvable_graph() {
        // A self-loop disconnected from any known block can never close.
        let mut func = FunctionGraph {
            id: 2,
            name: "stuck".into(),
            source: "a.c".into(),
            line: 1,
            blocks: vec![
                Block::default(),
                Block::default(),
                Block {
                    out_arcs: vec![Arc {
                        target: 2,
                        flags: ArcFlags::COMPUTED_COUNT,
                        count: None,
                    }],
                    lines: vec![],
                    is_call_return: false,
                },
            ],
        };
        let result = solve(&mut func);
        assert!(matches!(result, Err(CovError::UnsolvableGraph(_))));
    }
}
