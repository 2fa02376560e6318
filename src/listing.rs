use std::fs;

use camino::Utf8Path;

use crate::error::HarvestError;

/// Base names of regular files in `dir` whose names satisfy `predicate`,
/// sorted for determinism. Does not descend into subdirectories. An empty
/// directory is not an error; a missing one is.
pub fn list_matching(
    dir: &Utf8Path,
    predicate: impl Fn(&str) -> bool,
) -> Result<Vec<String>, HarvestError> {
    if !dir.as_std_path().is_dir() {
        return Err(HarvestError::DirectoryNotFound(
            dir.as_std_path().to_path_buf(),
        ));
    }
    let entries =
        fs::read_dir(dir.as_std_path()).map_err(|err| HarvestError::Filesystem(err.to_string()))?;
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| HarvestError::Filesystem(err.to_string()))?;
        let file_type = entry
            .file_type()
            .map_err(|err| HarvestError::Filesystem(err.to_string()))?;
        if !file_type.is_file() {
            continue;
        }
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if predicate(&name) {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}
