//! Pure helper for matching a `.gcda` data file against its sibling
//! `.gcno` notes file by identical basename. Not a directory walker —
//! operates over an already-obtained listing of paths.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Given a listing of file paths (as might come from one directory),
/// returns `(notes_path, data_path)` pairs for every `.gcda` file with a
/// sibling `.gcno` file sharing the same parent directory and stem.
pub fn pair_notes_and_data<I, P>(paths: I) -> Vec<(PathBuf, PathBuf)>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let mut notes_by_key: HashMap<(Option<PathBuf>, std::ffi::OsString), PathBuf> = HashMap::new();
    let mut data_files = Vec::new();

    for p in paths {
        let p = p.as_ref().to_path_buf();
        match p.extension().and_then(|e| e.to_str()) {
            Some("gcno") => {
                let key = (p.parent().map(Path::to_path_buf), p.file_stem().unwrap_or_default().to_os_string());
                notes_by_key.insert(key, p);
            }
            Some("gcda") => data_files.push(p),
            _ => {}
        }
    }

    let mut pairs = Vec::new();
    for data in data_files {
        let key = (
            data.parent().map(Path::to_path_buf),
            data.file_stem().unwrap_or_default().to_os_string(),
        );
        if let Some(notes) = notes_by_key.get(&key) {
            pairs.push((notes.clone(), data));
        }
    }
    pairs
}
