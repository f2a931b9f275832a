//! The in-memory coverage model: a store of named test buckets, each holding
//! per-file line, function, and branch hit counts.
//!
//! Counts are always merged additively. Absence of a line number means "not
//! instrumented"; a present zero means "instrumented, never executed".

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::error::{CovError, Result};
use crate::glob::glob_match;

/// Coverage data for a single source file.
#[derive(Clone, Debug, Default)]
pub struct FileCoverage {
    pub lines: BTreeMap<u32, u64>,
    /// Declaration line and cumulative hit count per function, in the order
    /// functions were first observed (the LCOV writer emits `FN`/`FNDA`
    /// pairs in this order).
    functions: Vec<(String, u32, u64)>,
    function_index: HashMap<String, usize>,
    /// `(line, branch group) -> per-ordinal counts`.
    pub branches: BTreeMap<(u32, u32), Vec<u64>>,
}

impl FileCoverage {
    pub fn add_line(&mut self, line: u32, count: u64) {
        *self.lines.entry(line).or_insert(0) += count;
    }

    /// Sets (or updates, last-wins) a function's declaration line, creating
    /// the function entry if it doesn't exist yet.
    pub fn set_function_line(&mut self, name: &str, line: u32) {
        match self.function_index.get(name) {
            Some(&idx) => self.functions[idx].1 = line,
            None => {
                self.function_index
                    .insert(name.to_string(), self.functions.len());
                self.functions.push((name.to_string(), line, 0));
            }
        }
    }

    pub fn add_function_hit(&mut self, name: &str, count: u64) {
        match self.function_index.get(name) {
            Some(&idx) => self.functions[idx].2 += count,
            None => {
                self.function_index
                    .insert(name.to_string(), self.functions.len());
                self.functions.push((name.to_string(), 0, count));
            }
        }
    }

    pub fn add_branch(&mut self, line: u32, group: u32, ordinal: u32, count: u64) {
        let counts = self.branches.entry((line, group)).or_default();
        let ordinal = ordinal as usize;
        if counts.len() <= ordinal {
            counts.resize(ordinal + 1, 0);
        }
        counts[ordinal] += count;
    }

    /// Functions in first-observed order: `(name, declaration line, hit count)`.
    pub fn functions(&self) -> &[(String, u32, u64)] {
        &self.functions
    }

    pub fn lines_hit(&self) -> usize {
        self.lines.values().filter(|&&c| c > 0).count()
    }

    pub fn functions_hit(&self) -> usize {
        self.functions.iter().filter(|(_, _, c)| *c > 0).count()
    }

    pub fn branches_total(&self) -> usize {
        self.branches.values().map(|v| v.len()).sum()
    }

    pub fn branches_hit(&self) -> usize {
        self.branches
            .values()
            .flat_map(|v| v.iter())
            .filter(|&&c| c > 0)
            .count()
    }

    fn merge_from(&mut self, other: &FileCoverage) {
        for (&line, &count) in &other.lines {
            self.add_line(line, count);
        }
        for (name, line, count) in &other.functions {
            if *line != 0 || !self.function_index.contains_key(name) {
                self.set_function_line(name, *line);
            }
            self.add_function_hit(name, *count);
        }
        for (&(line, group), counts) in &other.branches {
            for (ordinal, &count) in counts.iter().enumerate() {
                self.add_branch(line, group, ordinal as u32, count);
            }
        }
    }

    /// Structural equality ignoring function insertion order (per the
    /// `CoverageStore` equivalence-check contract: lines exact, functions as
    /// a `(name, line, count)` set, branches as a `(line, group, ordinals)`
    /// set).
    pub fn is_equivalent(&self, other: &FileCoverage) -> bool {
        if self.lines != other.lines || self.branches != other.branches {
            return false;
        }
        let mut a: Vec<_> = self.functions.clone();
        let mut b: Vec<_> = other.functions.clone();
        a.sort();
        b.sort();
        a == b
    }
}

/// All files observed under a single test bucket (or the flattened view
/// across every test bucket).
#[derive(Clone, Debug, Default)]
pub struct FileTable(BTreeMap<PathBuf, FileCoverage>);

impl FileTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file_mut(&mut self, path: impl Into<PathBuf>) -> &mut FileCoverage {
        self.0.entry(path.into()).or_default()
    }

    pub fn file(&self, path: impl AsRef<Path>) -> Option<&FileCoverage> {
        self.0.get(path.as_ref())
    }

    pub fn files(&self) -> impl Iterator<Item = (&PathBuf, &FileCoverage)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    fn merge_from(&mut self, other: &FileTable) {
        for (path, cov) in &other.0 {
            self.file_mut(path.clone()).merge_from(cov);
        }
    }

    /// Restricts this table to files whose path matches `pattern`.
    pub fn filtered(&self, pattern: &str) -> FileTable {
        let mut out = FileTable::new();
        for (path, cov) in &self.0 {
            if glob_match(pattern, &path.to_string_lossy()) {
                out.0.insert(path.clone(), cov.clone());
            }
        }
        out
    }
}

/// A mapping from test name (possibly the empty "unnamed" bucket) to that
/// test's `FileTable`.
#[derive(Clone, Debug, Default)]
pub struct CoverageStore {
    tests: HashMap<String, FileTable>,
}

impl CoverageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the `FileTable` for `test_name`, creating an empty one if it
    /// doesn't exist yet. `""` denotes the unnamed bucket.
    pub fn test_mut(&mut self, test_name: &str) -> &mut FileTable {
        self.tests.entry(test_name.to_string()).or_default()
    }

    pub fn test(&self, test_name: &str) -> Option<&FileTable> {
        self.tests.get(test_name)
    }

    pub fn test_names(&self) -> impl Iterator<Item = &str> {
        self.tests.keys().map(String::as_str)
    }

    /// Merges `other`'s test buckets into `self`, additively combining any
    /// buckets that share a name.
    pub fn merge(&mut self, other: &CoverageStore) {
        for (name, table) in &other.tests {
            self.test_mut(name).merge_from(table);
        }
    }

    /// A single `FileTable` obtained by additively merging every test
    /// bucket together.
    pub fn flatten(&self) -> FileTable {
        let mut out = FileTable::new();
        for table in self.tests.values() {
            out.merge_from(table);
        }
        out
    }

    /// Restricts every test bucket to files matching `pattern`, dropping
    /// buckets left empty by the filter.
    pub fn filter_by_glob(&self, pattern: &str) -> Result<CoverageStore> {
        if pattern.is_empty() {
            return Err(CovError::InvalidGlob(pattern.to_string()));
        }
        let mut out = CoverageStore::new();
        for (name, table) in &self.tests {
            let filtered = table.filtered(pattern);
            if !filtered.is_empty() {
                out.tests.insert(name.clone(), filtered);
            }
        }
        Ok(out)
    }

    pub fn is_equivalent(&self, other: &CoverageStore) -> bool {
        if self.tests.len() != other.tests.len() {
            return false;
        }
        for (name, table) in &self.tests {
            let Some(other_table) = other.tests.get(name) else {
                return false;
            };
            if table.len() != other_table.len() {
                return false;
            }
            for (path, cov) in table.files() {
                match other_table.file(path) {
                    Some(other_cov) if cov.is_equivalent(other_cov) => {}
                    _ => return false,
                }
            }
        }
        true
    }
}
