//! Directory-rooted aggregation tree, with the common path prefix across
//! all files collapsed into a single root.

use serde::Serialize;

use crate::error::Result;
use crate::model::FileTable;

/// One node of the aggregation tree. The root has an empty `name`.
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct AggregateNode {
    pub name: String,
    pub lines: usize,
    #[serde(rename = "lines-hit")]
    pub lines_hit: usize,
    pub funcs: usize,
    #[serde(rename = "funcs-hit")]
    pub funcs_hit: usize,
    pub branches: usize,
    #[serde(rename = "branches-hit")]
    pub branches_hit: usize,
    pub files: Vec<AggregateNode>,
}

impl AggregateNode {
    fn child_mut(&mut self, name: &str) -> &mut AggregateNode {
        if let Some(idx) = self.files.iter().position(|f| f.name == name) {
            return &mut self.files[idx];
        }
        self.files.push(AggregateNode {
            name: name.to_string(),
            ..Default::default()
        });
        self.files.last_mut().unwrap()
    }

    fn add_totals(&mut self, lines: usize, lines_hit: usize, funcs: usize, funcs_hit: usize, branches: usize, branches_hit: usize) {
        self.lines += lines;
        self.lines_hit += lines_hit;
        self.funcs += funcs;
        self.funcs_hit += funcs_hit;
        self.branches += branches;
        self.branches_hit += branches_hit;
    }
}

/// Builds the aggregation tree for `table`, splitting each path on `/` and
/// accumulating totals at every ancestor, then collapsing the root chain
/// while it has exactly one child (absorbing a shared path prefix).
pub fn build_tree(table: &FileTable) -> AggregateNode {
    let mut root = AggregateNode::default();

    for (path, cov) in table.files() {
        let lines = cov.lines.len();
        let lines_hit = cov.lines_hit();
        let funcs = cov.functions().len();
        let funcs_hit = cov.functions_hit();
        let branches = cov.branches_total();
        let branches_hit = cov.branches_hit();

        // Split on '/' directly (not `Path::components()`) so a leading
        // absolute-path slash becomes its own single-child level like the
        // original's `filename.split('/')` does — it gets collapsed away
        // below along with any other shared prefix.
        let components: Vec<String> = path
            .to_string_lossy()
            .split('/')
            .map(str::to_string)
            .collect();

        root.add_totals(lines, lines_hit, funcs, funcs_hit, branches, branches_hit);
        let mut node = &mut root;
        for component in &components {
            node = node.child_mut(component);
            node.add_totals(lines, lines_hit, funcs, funcs_hit, branches, branches_hit);
        }
    }

    collapse_root(root)
}

fn collapse_root(mut root: AggregateNode) -> AggregateNode {
    while root.files.len() == 1 && !root.files[0].files.is_empty() {
        root = root.files.into_iter().next().unwrap();
    }
    root
}

/// Serializes a tree to the JSON shape described in SPEC_FULL §6.
pub fn to_json(node: &AggregateNode) -> Result<String> {
    Ok(serde_json::to_string(node)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FileTable;

    #[test]
    fn collapses_common_root_prefix() {
        let mut table = FileTable::new();
        table.file_mut("/u/a/x.c").add_line(1, 1);
        table.file_mut("/u/a/y.c").add_line(1, 0);
        table.file_mut("/u/a/z.c").add_line(1, 1);

        let tree = build_tree(&table);
        let mut names: Vec<&str> = tree.files.iter().map(|f| f.name.as_str()).collect();
        names.sort_unstable();
        assert_eq!(names, vec!["x.c", "y.c", "z.c"]);
        assert_eq!(tree.lines, 3);
        assert_eq!(tree.lines_hit, 2);
    }

    #[test]
    fn totals_sum_from_children() {
        let mut table = FileTable::new();
        table.file_mut("/u/a/x.c").add_line(1, 1);
        table.file_mut("/u/b/y.c").add_line(1, 1);
        table.file_mut("/u/b/y.c").add_line(2, 0);

        let tree = build_tree(&table);
        assert_eq!(tree.name, "u");
        assert_eq!(tree.lines, 3);
        assert_eq!(tree.lines_hit, 2);
        let b = tree.files.iter().find(|f| f.name == "b").unwrap();
        assert_eq!(b.lines, 2);
        assert_eq!(b.lines_hit, 1);
    }

    #[test]
    fn single_file_table_stops_short_of_the_leaf() {
        let mut table = FileTable::new();
        table.file_mut("/a.c").add_line(1, 1);

        let tree = build_tree(&table);
        // The leaf itself has no children, so collapsing must stop one
        // level above it rather than descending into the file node.
        assert_eq!(tree.files.len(), 1);
        assert_eq!(tree.files[0].name, "a.c");
        assert!(tree.files[0].files.is_empty());
    }

    #[test]
    fn serializes_expected_keys() {
        let mut table = FileTable::new();
        table.file_mut("/a.c").add_line(1, 1);
        let tree = build_tree(&table);
        let json = to_json(&tree).unwrap();
        assert!(json.contains("\"lines-hit\""));
        assert!(json.contains("\"funcs-hit\""));
        assert!(json.contains("\"branches-hit\""));
        assert!(json.contains("\"files\""));
    }
}
