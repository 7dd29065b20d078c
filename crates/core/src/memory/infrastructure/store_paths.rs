use std::path::{Path, PathBuf};

/// `<dir>/<name>.json` with spaces in the name replaced by underscores.
pub fn person_file(dir: &Path, name: &str) -> PathBuf {
    let stem: String = name
        .trim()
        .chars()
        .map(|c| match c {
            ' ' => '_',
            '/' | '\\' | ':' => '-',
            other => other,
        })
        .collect();
    dir.join(format!("{stem}.json"))
}
