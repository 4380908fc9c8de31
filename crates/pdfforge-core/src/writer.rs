//! Output writer
//!
//! Serialises an assembled document and proves the result is readable
//! before reporting success.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

use crate::document::Document;
use crate::error::AssembleError;

/// A verified output file
#[derive(Debug, Clone, Serialize)]
pub struct Artifact {
    pub path: PathBuf,
    pub page_count: u32,
    pub size_bytes: u64,
}

/// Serialise `document` to PDF bytes
pub fn to_bytes(document: Document) -> Result<Vec<u8>, AssembleError> {
    let mut doc = document.into_lopdf();
    doc.compress();

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| AssembleError::serialization("save", e))?;

    if buffer.is_empty() {
        return Err(AssembleError::serialization("save", "zero-length output"));
    }
    Ok(buffer)
}

/// Write `document` to `target`.
///
/// Bytes go to a sibling `.part` file which is reopened and checked for
/// the expected page count, then renamed into place. `target` therefore
/// either does not exist or holds a complete, readable PDF.
pub fn write_document(document: Document, target: &Path) -> Result<Artifact, AssembleError> {
    let expected_pages = document.page_count();
    if expected_pages == 0 {
        return Err(AssembleError::EmptyInputSet("Document has no pages".into()));
    }

    let bytes = to_bytes(document)?;

    let partial = target.with_extension("part");
    fs::write(&partial, &bytes)
        .map_err(|e| AssembleError::serialization("write", e))?;

    let size_bytes = match verify(&partial, expected_pages) {
        Ok(size) => size,
        Err(e) => {
            if let Err(remove_err) = fs::remove_file(&partial) {
                warn!(path = %partial.display(), "failed to remove partial output: {}", remove_err);
            }
            return Err(e);
        }
    };

    fs::rename(&partial, target)
        .map_err(|e| AssembleError::serialization("rename", e))?;

    debug!(path = %target.display(), pages = expected_pages, size_bytes, "artifact written");

    Ok(Artifact {
        path: target.to_path_buf(),
        page_count: expected_pages,
        size_bytes,
    })
}

/// Reopen a written file and check it holds `expected_pages` pages
fn verify(path: &Path, expected_pages: u32) -> Result<u64, AssembleError> {
    let size = fs::metadata(path)
        .map_err(|e| AssembleError::serialization("verify", e))?
        .len();
    if size == 0 {
        return Err(AssembleError::serialization("verify", "zero-length output"));
    }

    let reopened = lopdf::Document::load(path)
        .map_err(|e| AssembleError::serialization("verify", format!("output unreadable: {}", e)))?;

    let actual = reopened.get_pages().len() as u32;
    if actual != expected_pages {
        return Err(AssembleError::serialization(
            "verify",
            format!("expected {} pages, found {}", expected_pages, actual),
        ));
    }

    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::fixtures::{create_test_pdf, page_markers};
    use crate::merge::merge_documents;
    use crate::source::{PdfSource, Source};
    use pretty_assertions::assert_eq;

    fn merged(counts: &[u32]) -> Document {
        let sources: Vec<Source> = counts
            .iter()
            .enumerate()
            .map(|(i, &n)| {
                let bytes = create_test_pdf(n, &format!("D{}", i));
                Source::open(&format!("{}.pdf", i), &bytes).unwrap()
            })
            .collect();
        merge_documents(&sources).unwrap()
    }

    #[test]
    fn test_write_then_reopen_keeps_pages_and_order() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("merged.pdf");
        let doc = merged(&[2, 1]);
        let markers = page_markers(&doc);

        let artifact = write_document(doc, &target).unwrap();

        assert_eq!(artifact.page_count, 3);
        assert!(artifact.size_bytes > 0);
        assert!(!target.with_extension("part").exists());

        let bytes = fs::read(&target).unwrap();
        let reopened = PdfSource::open("merged.pdf", &bytes).unwrap();
        assert_eq!(page_markers(reopened.document()), markers);
    }

    #[test]
    fn test_write_into_missing_directory_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("gone").join("out.pdf");

        let err = write_document(merged(&[1]), &target).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::SerializationFailure);
        assert!(!target.exists());
    }

    #[test]
    fn test_to_bytes_is_loadable() {
        let bytes = to_bytes(merged(&[4])).unwrap();
        let doc = lopdf::Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 4);
    }

    #[test]
    fn test_verify_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.part");
        fs::write(&path, b"%PDF-1.7 not really").unwrap();
        let err = verify(&path, 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SerializationFailure);

        fs::write(&path, b"").unwrap();
        assert!(verify(&path, 1).is_err());
    }
}
