//! Input loading: read the Markdown document into memory.
//!
//! I/O failures are mapped onto the dedicated input variants of
//! [`Md2PdfError`] so the caller can tell "file missing" from "permission
//! denied" from "not text" without inspecting `io::ErrorKind` itself.

use crate::error::Md2PdfError;
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

const UTF8_BOM: char = '\u{FEFF}';

/// Read the whole document at `path` as UTF-8 text.
///
/// A leading byte-order mark is dropped.
pub async fn read_document(path: &Path) -> Result<String, Md2PdfError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| map_read_error(path, e))?;

    let text = String::from_utf8(bytes).map_err(|e| Md2PdfError::InvalidEncoding {
        path: path.to_path_buf(),
        detail: e.utf8_error().to_string(),
    })?;

    debug!("Read {} bytes from {}", text.len(), path.display());

    Ok(match text.strip_prefix(UTF8_BOM) {
        Some(rest) => rest.to_string(),
        None => text,
    })
}

fn map_read_error(path: &Path, e: std::io::Error) -> Md2PdfError {
    let path = path.to_path_buf();
    match e.kind() {
        ErrorKind::NotFound => Md2PdfError::FileNotFound { path },
        ErrorKind::PermissionDenied => Md2PdfError::PermissionDenied { path },
        _ => Md2PdfError::ReadFailed { path, source: e },
    }
}

/// Document title used for the HTML `<title>` (and thus the PDF metadata).
pub fn document_title(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "Document".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind as FailureKind;

    #[tokio::test]
    async fn reads_utf8_and_strips_bom() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.md");
        std::fs::write(&path, "\u{FEFF}# Título\n").unwrap();

        let text = read_document(&path).await.unwrap();
        assert_eq!(text, "# Título\n");
    }

    #[tokio::test]
    async fn missing_file_is_input_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_document(&dir.path().join("nope.md"))
            .await
            .unwrap_err();
        assert!(matches!(err, Md2PdfError::FileNotFound { .. }));
        assert_eq!(err.kind(), FailureKind::Input);
    }

    #[tokio::test]
    async fn invalid_utf8_is_input_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bin.md");
        std::fs::write(&path, [0x66, 0x6f, 0xff, 0xfe]).unwrap();

        let err = read_document(&path).await.unwrap_err();
        assert!(matches!(err, Md2PdfError::InvalidEncoding { .. }), "{err}");
        assert_eq!(err.kind(), FailureKind::Input);
    }

    #[test]
    fn directory_is_read_failure() {
        let dir = tempfile::tempdir().unwrap();
        let err = tokio_test::block_on(read_document(dir.path())).unwrap_err();
        assert_eq!(err.kind(), FailureKind::Input);
    }

    #[test]
    fn title_from_file_stem() {
        assert_eq!(document_title(Path::new("/a/b/notes.md")), "notes");
        assert_eq!(document_title(Path::new("/")), "Document");
    }
}
