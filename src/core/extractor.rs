use crate::error::{AppError, Result};
use bytes::Bytes;
use serde::Deserialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Json,
}

impl DocumentKind {
    /// Picks the parser from the upload's file name suffix, ignoring case.
    /// A bare `.pdf` or `.json` name counts.
    pub fn from_file_name(file_name: &str) -> Result<Self> {
        let name = file_name.to_lowercase();
        if name.ends_with(".pdf") {
            Ok(DocumentKind::Pdf)
        } else if name.ends_with(".json") {
            Ok(DocumentKind::Json)
        } else {
            Err(AppError::UnsupportedFileType {
                file_name: file_name.to_string(),
            })
        }
    }
}

#[derive(Deserialize)]
struct TextEntry {
    text: String,
}

/// Flattens an uploaded document into one string.
#[instrument(skip(bytes, staging_dir), fields(size = bytes.len()))]
pub async fn extract_text(
    file_name: &str,
    bytes: Bytes,
    staging_dir: Option<PathBuf>,
) -> Result<String> {
    match DocumentKind::from_file_name(file_name)? {
        DocumentKind::Pdf => extract_pdf(bytes, staging_dir).await,
        DocumentKind::Json => extract_json(&bytes),
    }
}

/// `[{"text": "..."}, ...]` -> texts joined by single spaces.
pub fn extract_json(bytes: &[u8]) -> Result<String> {
    let entries: Vec<TextEntry> = serde_json::from_slice(bytes)
        .map_err(|e| AppError::MalformedDocument(format!("expected [{{\"text\": ...}}]: {}", e)))?;

    let text = entries
        .iter()
        .map(|entry| entry.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    debug!(entries = entries.len(), bytes = text.len(), "json document flattened");
    Ok(text)
}

/// Stages the PDF on disk, parses it page by page and joins the pages with
/// single spaces. Both steps run on the blocking pool. The staged file is
/// removed when the blocking task ends, including when the parser errors or
/// panics.
pub async fn extract_pdf(bytes: Bytes, staging_dir: Option<PathBuf>) -> Result<String> {
    let pages = tokio::task::spawn_blocking(move || -> Result<Vec<String>> {
        let staged = stage_pdf(&bytes, staging_dir.as_deref())?;
        debug!(path = %staged.path().display(), "pdf staged");

        let pages = pdf_extract::extract_text_by_pages(staged.path());
        if let Err(e) = staged.close() {
            warn!("failed to remove staged pdf: {}", e);
        }
        pages.map_err(|e| AppError::MalformedDocument(format!("unreadable pdf: {}", e)))
    })
    .await
    .map_err(|e| {
        if e.is_panic() {
            AppError::MalformedDocument("pdf parser aborted on this file".to_string())
        } else {
            AppError::Internal(format!("pdf extraction task failed: {}", e))
        }
    })??;

    debug!(pages = pages.len(), "pdf parsed");
    Ok(pages.join(" "))
}

/// Writes the upload to a uniquely named `.pdf` temp file. A failed write
/// drops (and so deletes) the file before returning.
fn stage_pdf(bytes: &[u8], staging_dir: Option<&Path>) -> Result<NamedTempFile> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("upload-").suffix(".pdf");
    let mut file = match staging_dir {
        Some(dir) => builder.tempfile_in(dir)?,
        None => builder.tempfile()?,
    };
    file.write_all(bytes)?;
    file.flush()?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staged_files(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    /// Assembles a small uncompressed PDF with one Helvetica text run per page.
    fn build_pdf(pages: &[&str]) -> Vec<u8> {
        let n = pages.len();
        let font_id = 3 + 2 * n;
        let kids = (0..n)
            .map(|i| format!("{} 0 R", 3 + 2 * i))
            .collect::<Vec<_>>()
            .join(" ");

        let mut objects = vec![
            "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
            format!("<< /Type /Pages /Kids [{}] /Count {} >>", kids, n),
        ];
        for (i, text) in pages.iter().enumerate() {
            let content = format!("BT /F1 24 Tf 72 720 Td ({}) Tj ET", text);
            objects.push(format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents {} 0 R /Resources << /Font << /F1 {} 0 R >> >> >>",
                4 + 2 * i,
                font_id
            ));
            objects.push(format!(
                "<< /Length {} >>\nstream\n{}\nendstream",
                content.len(),
                content
            ));
        }
        objects.push("<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string());

        let mut out = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::new();
        for (i, body) in objects.iter().enumerate() {
            offsets.push(out.len());
            out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
        }
        let xref_at = out.len();
        out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
        for offset in offsets {
            out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
        }
        out.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
                objects.len() + 1,
                xref_at
            )
            .as_bytes(),
        );
        out
    }

    #[test]
    fn kind_is_chosen_by_extension() {
        assert_eq!(DocumentKind::from_file_name("report.pdf").unwrap(), DocumentKind::Pdf);
        assert_eq!(DocumentKind::from_file_name("REPORT.PDF").unwrap(), DocumentKind::Pdf);
        assert_eq!(DocumentKind::from_file_name("chunks.json").unwrap(), DocumentKind::Json);
        assert!(matches!(
            DocumentKind::from_file_name("pdf"),
            Err(AppError::UnsupportedFileType { .. })
        ));
    }

    #[test]
    fn bare_suffix_names_are_recognized() {
        assert_eq!(DocumentKind::from_file_name(".pdf").unwrap(), DocumentKind::Pdf);
        assert_eq!(DocumentKind::from_file_name(".JSON").unwrap(), DocumentKind::Json);
        assert!(matches!(
            DocumentKind::from_file_name("report.pdf.txt"),
            Err(AppError::UnsupportedFileType { .. })
        ));
        assert!(matches!(
            DocumentKind::from_file_name(""),
            Err(AppError::UnsupportedFileType { .. })
        ));
    }

    #[test]
    fn json_entries_joined_with_spaces() {
        let text = extract_json(br#"[{"text":"a"},{"text":"b"}]"#).unwrap();
        assert_eq!(text, "a b");
    }

    #[test]
    fn json_extra_fields_ignored_and_empty_array_is_empty_text() {
        let text = extract_json(br#"[{"text":"x","page":1},{"text":"y","page":2}]"#).unwrap();
        assert_eq!(text, "x y");
        assert_eq!(extract_json(b"[]").unwrap(), "");
    }

    #[test]
    fn json_entry_without_text_is_malformed() {
        let err = extract_json(br#"[{"text":"a"},{"body":"b"}]"#).unwrap_err();
        assert!(matches!(err, AppError::MalformedDocument(_)));

        let err = extract_json(br#"{"text":"a"}"#).unwrap_err();
        assert!(matches!(err, AppError::MalformedDocument(_)));
    }

    #[tokio::test]
    async fn unsupported_extension_returns_no_text() {
        let result = extract_text("notes.txt", Bytes::from_static(b"plain text"), None).await;
        match result {
            Err(AppError::UnsupportedFileType { file_name }) => assert_eq!(file_name, "notes.txt"),
            other => panic!("expected UnsupportedFileType, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn json_upload_goes_through_extract_text() {
        let bytes = Bytes::from_static(br#"[{"text":"first"},{"text":"second"}]"#);
        let text = extract_text("doc.json", bytes, None).await.unwrap();
        assert_eq!(text, "first second");
    }

    #[tokio::test]
    async fn pdf_pages_extracted_and_staging_file_removed() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = Bytes::from(build_pdf(&["Hello", "World"]));

        let text = extract_text("doc.pdf", pdf, Some(dir.path().to_path_buf()))
            .await
            .unwrap();

        assert!(text.contains("Hello"), "got {:?}", text);
        assert!(text.contains("World"), "got {:?}", text);
        assert_eq!(staged_files(dir.path()), 0);
    }

    #[tokio::test]
    async fn broken_pdf_fails_without_leaking_staging_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = extract_text(
            "broken.pdf",
            Bytes::from_static(b"this is not a pdf"),
            Some(dir.path().to_path_buf()),
        )
        .await;

        assert!(matches!(result, Err(AppError::MalformedDocument(_))));
        assert_eq!(staged_files(dir.path()), 0);
    }

    #[test]
    fn staged_file_is_unique_and_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let first = stage_pdf(b"%PDF-1.4", Some(dir.path())).unwrap();
        let second = stage_pdf(b"%PDF-1.4", Some(dir.path())).unwrap();

        assert_ne!(first.path(), second.path());
        assert_eq!(first.path().extension().unwrap(), "pdf");
        assert_eq!(std::fs::read(first.path()).unwrap(), b"%PDF-1.4");

        let path = first.path().to_path_buf();
        drop(first);
        drop(second);
        assert!(!path.exists());
        assert_eq!(staged_files(dir.path()), 0);
    }

    #[tokio::test]
    async fn pdf_staging_failure_surfaces_as_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        let result = extract_pdf(Bytes::from_static(b"%PDF-1.4"), Some(missing)).await;
        assert!(matches!(result, Err(AppError::Io(_))));
        assert_eq!(staged_files(dir.path()), 0);
    }

    #[test]
    fn staging_into_missing_dir_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        assert!(matches!(stage_pdf(b"x", Some(&missing)), Err(AppError::Io(_))));
    }
}
