//! Default locations of the raw and generated data directories.
//!
//! Paths resolve against the workspace root so the binary behaves the same
//! regardless of the caller's working directory.

use std::path::{Path, PathBuf};

/// Returns the workspace root directory, resolved at compile time from
/// `CARGO_MANIFEST_DIR`. Falls back to the current directory when the
/// crate was built outside its workspace layout.
#[must_use]
pub fn project_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

/// Returns the `data/` directory path.
#[must_use]
pub fn data_dir() -> PathBuf {
    project_root().join("data")
}

/// Returns `data/raw/`, where per-state source files are expected.
#[must_use]
pub fn raw_dir() -> PathBuf {
    data_dir().join("raw")
}

/// Returns `data/generated/`, where artifacts and the manifest live.
#[must_use]
pub fn generated_dir() -> PathBuf {
    data_dir().join("generated")
}

/// Optional directory of source definition overrides inside `raw`.
#[must_use]
pub fn sources_dir(raw: &Path) -> PathBuf {
    raw.join("sources")
}

/// Optional municipality directory inside `raw`.
#[must_use]
pub fn municipalities_path(raw: &Path) -> PathBuf {
    raw.join("municipalities.csv")
}

/// Ensures a directory exists, creating it if necessary.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_lives_under_data() {
        assert!(generated_dir().starts_with(data_dir()));
        assert!(raw_dir().ends_with("data/raw"));
    }

    #[test]
    fn ensure_dir_creates_nested() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a/b/c");
        ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());
        ensure_dir(&nested).unwrap();
    }
}
