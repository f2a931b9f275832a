//! Reader and writer for the line-oriented LCOV text coverage trace
//! format: `TN`/`SF`/`DA`/`FN`/`FNDA`/`BRDA` input instructions, with
//! `LH`/`LF`/`FNH`/`FNF`/`BRH`/`BRF` summaries recomputed on output.

use std::io::Write;
use std::path::PathBuf;

use memchr::memchr_iter;

use crate::error::{CovError, Result};
use crate::model::CoverageStore;

/// Splits `input` on `\n` using `memchr`, the same line-scanning primitive
/// this codebase's other line-oriented parser reaches for.
fn lines(input: &[u8]) -> impl Iterator<Item = &[u8]> {
    let mut start = 0;
    let mut breaks = memchr_iter(b'\n', input);
    std::iter::from_fn(move || {
        if start > input.len() {
            return None;
        }
        match breaks.next() {
            Some(pos) => {
                let line = &input[start..pos];
                start = pos + 1;
                Some(line)
            }
            None => {
                if start == input.len() {
                    None
                } else {
                    let line = &input[start..];
                    start = input.len() + 1;
                    Some(line)
                }
            }
        }
    })
}

/// Parses LCOV text into `store`, creating or updating test buckets and
/// file records. `DA`/`FNDA`/`BRDA` counts are additive against whatever
/// was already in `store`.
pub fn parse_lcov(input: &[u8], store: &mut CoverageStore) -> Result<()> {
    let mut current_test = String::new();
    let mut current_file: Option<PathBuf> = None;
    let mut line_no = 0usize;

    for raw_line in lines(input) {
        line_no += 1;
        let raw_line = raw_line.strip_suffix(b"\r").unwrap_or(raw_line);
        if raw_line.is_empty() {
            continue;
        }
        let line = std::str::from_utf8(raw_line)
            .map_err(|_| CovError::LcovParse {
                line: line_no,
                text: String::from_utf8_lossy(raw_line).into_owned(),
            })?;

        if line == "end_of_record" {
            current_file = None;
            continue;
        }

        let (instr, payload) = match line.split_once(':') {
            Some((i, p)) => (i, p),
            None => {
                return Err(CovError::LcovParse {
                    line: line_no,
                    text: line.to_string(),
                })
            }
        };

        let bad = || CovError::LcovParse {
            line: line_no,
            text: line.to_string(),
        };

        match instr {
            "TN" => current_test = payload.to_string(),
            "SF" => {
                let resolved = std::fs::canonicalize(payload).unwrap_or_else(|_| PathBuf::from(payload));
                current_file = Some(resolved);
            }
            "DA" => {
                let path = current_file.clone().ok_or_else(bad)?;
                let mut parts = payload.split(',');
                let line_num: u32 = parts.next().ok_or_else(bad)?.parse().map_err(|_| bad())?;
                let count: u64 = parts.next().ok_or_else(bad)?.parse().map_err(|_| bad())?;
                store.test_mut(&current_test).file_mut(path).add_line(line_num, count);
            }
            "FN" => {
                let path = current_file.clone().ok_or_else(bad)?;
                let mut parts = payload.splitn(2, ',');
                let decl_line: u32 = parts.next().ok_or_else(bad)?.parse().map_err(|_| bad())?;
                let name = parts.next().ok_or_else(bad)?;
                store
                    .test_mut(&current_test)
                    .file_mut(path)
                    .set_function_line(name, decl_line);
            }
            "FNDA" => {
                let path = current_file.clone().ok_or_else(bad)?;
                let mut parts = payload.splitn(2, ',');
                let count: u64 = parts.next().ok_or_else(bad)?.parse().map_err(|_| bad())?;
                let name = parts.next().ok_or_else(bad)?;
                store
                    .test_mut(&current_test)
                    .file_mut(path)
                    .add_function_hit(name, count);
            }
            "BRDA" => {
                let path = current_file.clone().ok_or_else(bad)?;
                let mut parts = payload.split(',');
                let line_num: u32 = parts.next().ok_or_else(bad)?.parse().map_err(|_| bad())?;
                let group: u32 = parts.next().ok_or_else(bad)?.parse().map_err(|_| bad())?;
                let ordinal: u32 = parts.next().ok_or_else(bad)?.parse().map_err(|_| bad())?;
                let count_str = parts.next().ok_or_else(bad)?;
                let count: u64 = if count_str == "-" {
                    0
                } else {
                    count_str.parse().map_err(|_| bad())?
                };
                store
                    .test_mut(&current_test)
                    .file_mut(path)
                    .add_branch(line_num, group, ordinal, count);
            }
            "LH" | "LF" | "FNH" | "FNF" | "BRH" | "BRF" => {}
            _ => return Err(bad()),
        }
    }
    Ok(())
}

/// Serializes `store` as LCOV text, one `TN`/`SF`...`end_of_record` block
/// per (test, file) pair, test names then file paths in sorted order for
/// reproducibility.
pub fn write_lcov<W: Write>(store: &CoverageStore, w: &mut W) -> Result<()> {
    let mut test_names: Vec<&str> = store.test_names().collect();
    test_names.sort_unstable();

    for test_name in test_names {
        let table = store.test(test_name).expect("name came from test_names()");
        for (path, cov) in table.files() {
            writeln!(w, "TN:{test_name}")?;
            writeln!(w, "SF:{}", path.display())?;

            for (name, line, _) in cov.functions() {
                writeln!(w, "FN:{line},{name}")?;
            }
            for (name, _, count) in cov.functions() {
                writeln!(w, "FNDA:{count},{name}")?;
            }
            writeln!(w, "FNF:{}", cov.functions().len())?;
            writeln!(w, "FNH:{}", cov.functions_hit())?;

            for (&line, &count) in &cov.lines {
                writeln!(w, "DA:{line},{count}")?;
            }
            writeln!(w, "LH:{}", cov.lines_hit())?;
            writeln!(w, "LF:{}", cov.lines.len())?;

            for (&(line, group), counts) in &cov.branches {
                let total: u64 = counts.iter().sum();
                for (ordinal, &count) in counts.iter().enumerate() {
                    if total == 0 {
                        writeln!(w, "BRDA:{line},{group},{ordinal},-")?;
                    } else {
                        writeln!(w, "BRDA:{line},{group},{ordinal},{count}")?;
                    }
                }
            }
            writeln!(w, "BRH:{}", cov.branches_hit())?;
            writeln!(w, "BRF:{}", cov.branches_total())?;

            writeln!(w, "end_of_record")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_preserves_counts() {
        let input = b"TN:t1\nSF:/a/b.c\nFN:10,foo\nFNDA:3,foo\nDA:10,3\nDA:11,3\nBRDA:11,0,0,2\nBRDA:11,0,1,1\nend_of_record\n";
        let mut store = CoverageStore::new();
        parse_lcov(input, &mut store).unwrap();

        let mut out = Vec::new();
        write_lcov(&store, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("FNF:1"));
        assert!(text.contains("FNH:1"));
        assert!(text.contains("LH:2"));
        assert!(text.contains("LF:2"));
        assert!(text.contains("BRH:2"));
        assert!(text.contains("BRF:2"));
        assert!(text.contains("DA:10,3"));
        assert!(text.contains("DA:11,3"));
    }

    #[test]
    fn merge_additivity() {
        let mut store = CoverageStore::new();
        parse_lcov(b"TN:\nSF:/a.c\nDA:5,1\nend_of_record\n", &mut store).unwrap();
        parse_lcov(b"TN:\nSF:/a.c\nDA:5,1\nend_of_record\n", &mut store).unwrap();
        let table = store.test("").unwrap();
        let cov = table.file("/a.c").unwrap();
        assert_eq!(cov.lines[&5], 2);
    }

    #[test]
    fn dash_branches_round_trip_as_zero() {
        let input = b"TN:\nSF:/a.c\nBRDA:7,0,0,-\nBRDA:7,0,1,-\nend_of_record\n";
        let mut store = CoverageStore::new();
        parse_lcov(input, &mut store).unwrap();
        let cov = store.test("").unwrap().file("/a.c").unwrap();
        assert_eq!(cov.branches[&(7, 0)], vec![0, 0]);

        let mut out = Vec::new();
        write_lcov(&store, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("BRDA:7,0,0,-"));
        assert!(text.contains("BRDA:7,0,1,-"));
    }

    #[test]
    fn rejects_unknown_instruction() {
        let mut store = CoverageStore::new();
        let err = parse_lcov(b"TN:\nSF:/a.c\nBOGUS:1\nend_of_record\n", &mut store).unwrap_err();
        assert!(matches!(err, CovError::LcovParse { .. }));
    }
}
