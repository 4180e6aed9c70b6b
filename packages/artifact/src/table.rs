//! CSV table I/O and SHA-256 fingerprints.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read as _, Write as _};
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest as _, Sha256};

use crate::{ArtifactError, ArtifactKind};

/// Hex-encoded SHA-256 of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Hex-encoded SHA-256 of a file's contents, streamed in chunks.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be read.
pub fn sha256_file(path: &Path) -> std::io::Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Serializes `rows` as CSV with a header row into `path`.
///
/// An empty slice still produces a file (with no header), so consumers can
/// tell "no rows" apart from "never written".
///
/// # Errors
///
/// Returns an error if the file cannot be created or a row fails to
/// serialize.
pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), ArtifactError> {
    let file = BufWriter::new(File::create(path)?);
    let mut writer = csv::Writer::from_writer(file);
    for row in rows {
        writer.serialize(row)?;
    }
    let mut inner = writer
        .into_inner()
        .map_err(|e| ArtifactError::Io(e.into_error()))?;
    inner.flush()?;
    Ok(())
}

/// Reads every row of a CSV table at `path`.
///
/// # Errors
///
/// * [`ArtifactError::Io`] if the file cannot be opened.
/// * [`ArtifactError::SchemaMismatch`] if a row does not decode into `T`.
pub fn read_csv<T: DeserializeOwned>(kind: ArtifactKind, path: &Path) -> Result<Vec<T>, ArtifactError> {
    let file = File::open(path)?;
    let mut reader = csv::Reader::from_reader(BufReader::new(file));
    reader
        .deserialize()
        .collect::<Result<Vec<T>, _>>()
        .map_err(|e| ArtifactError::SchemaMismatch {
            kind,
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Row {
        name: String,
        value: Option<f64>,
    }

    #[test]
    fn known_digest() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn file_digest_matches_bytes_digest() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("f.txt");
        std::fs::write(&path, b"abc").unwrap();
        assert_eq!(sha256_file(&path).unwrap(), sha256_hex(b"abc"));
    }

    #[test]
    fn optional_cells_survive_a_write_and_read() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("t.csv");
        let rows = vec![
            Row { name: "a".into(), value: Some(1.5) },
            Row { name: "b".into(), value: None },
        ];
        write_csv(&path, &rows).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "name,value\na,1.5\nb,\n"
        );
        let back: Vec<Row> = read_csv(ArtifactKind::Canonical, &path).unwrap();
        assert_eq!(back, rows);
    }

    #[test]
    fn wrong_shape_is_schema_mismatch() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("t.csv");
        std::fs::write(&path, "other\n1\n").unwrap();
        let err = read_csv::<Row>(ArtifactKind::QualityFlags, &path).unwrap_err();
        assert!(matches!(
            err,
            ArtifactError::SchemaMismatch { kind: ArtifactKind::QualityFlags, .. }
        ));
    }
}
