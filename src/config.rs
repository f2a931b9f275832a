use std::path::PathBuf;

/// How relative source paths recorded in a notes file should be resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SymlinkPolicy {
    /// Canonicalize the resolved path, following symlinks.
    #[default]
    Follow,
    /// Keep the resolved-but-not-canonicalized path as-is.
    Preserve,
}

/// Configuration passed into binary (notes+data) ingestion.
///
/// Replaces the module-level default base directory the original tooling
/// relied on with an explicit, per-call record.
#[derive(Clone, Debug, Default)]
pub struct ParseConfig {
    /// Directory relative paths in notes records are resolved against.
    pub base_dir: PathBuf,
    pub symlink_policy: SymlinkPolicy,
}

impl ParseConfig {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            symlink_policy: SymlinkPolicy::default(),
        }
    }

    pub fn with_symlink_policy(mut self, policy: SymlinkPolicy) -> Self {
        self.symlink_policy = policy;
        self
    }

    /// Resolves `path` against `base_dir` if it is relative, then applies
    /// the configured symlink policy.
    pub fn resolve(&self, path: &std::path::Path) -> PathBuf {
        let joined = if path.is_relative() {
            self.base_dir.join(path)
        } else {
            path.to_path_buf()
        };
        match self.symlink_policy {
            SymlinkPolicy::Follow => std::fs::canonicalize(&joined).unwrap_or(joined),
            SymlinkPolicy::Preserve => joined,
        }
    }
}
