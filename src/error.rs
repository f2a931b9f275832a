use thiserror::Error;

pub type Result<T, E = CovError> = std::result::Result<T, E>;

/// Errors raised while reading, solving, or writing coverage data.
///
/// Format and semantic failures (bad magic, truncated records, unknown
/// functions, unsolvable graphs) are fatal for the file that produced them;
/// callers ingesting multiple inputs should catch `CovError` per-file and
/// continue with the rest.
#[derive(Error, Debug)]
pub enum CovError {
    #[error("bad magic number: expected notes or data magic, found {0:#010x}")]
    BadMagic(u32),

    #[error("version mismatch: notes file has '{notes}', data file has '{data}'")]
    VersionMismatch { notes: String, data: String },

    #[error("stamp mismatch: notes file has '{notes}', data file has '{data}'")]
    StampMismatch { notes: String, data: String },

    #[error("truncated record at offset {0}")]
    Truncated(usize),

    #[error("malformed string at offset {0}")]
    MalformedString(usize),

    #[error("data file references unknown function identifier {0:#x}")]
    UnknownFunction(u32),

    #[error("counter count mismatch for function '{name}': expected {expected}, found {found}")]
    CounterMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("flow graph for function '{0}' did not converge to a solution")]
    UnsolvableGraph(String),

    #[error("negative count inferred for function '{name}' block {block}")]
    NegativeCount { name: String, block: usize },

    #[error("malformed LCOV input at line {line}: '{text}'")]
    LcovParse { line: usize, text: String },

    #[error("invalid glob pattern: '{0}'")]
    InvalidGlob(String),

    #[error("io error: '{0}'")]
    Io(#[from] std::io::Error),

    #[error("json error: '{0}'")]
    Json(#[from] serde_json::Error),
}
