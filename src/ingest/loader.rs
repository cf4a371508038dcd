//! Directory loader for plain-text, Markdown and PDF documents.
//!
//! Extensions match case-insensitively. PDF text is extracted page by page
//! with `lopdf`; pages are joined with blank lines.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::IngestError;
use crate::vectorstore::Metadata;

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub content: String,
    pub metadata: Metadata,
}

fn doc_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension().and_then(|e| e.to_str())?;
    [("txt", "text"), ("md", "markdown"), ("pdf", "pdf")]
        .into_iter()
        .find(|(known, _)| ext.eq_ignore_ascii_case(known))
        .map(|(_, kind)| kind)
}

/// Text of every page in order, plus the page count.
fn read_pdf(path: &Path) -> Result<(String, usize), lopdf::Error> {
    let doc = lopdf::Document::load(path)?;
    let pages: Vec<u32> = doc.get_pages().keys().copied().collect();
    let mut texts = Vec::with_capacity(pages.len());
    for page in &pages {
        texts.push(doc.extract_text(&[*page])?);
    }
    Ok((texts.join("\n\n"), pages.len()))
}

/// Load every `.txt` / `.md` / `.pdf` file under `dir`, recursively, sorted
/// by path.
///
/// Files that cannot be read are logged and skipped.
pub fn load_directory(dir: &Path) -> Result<Vec<Document>, IngestError> {
    if !dir.is_dir() {
        return Err(IngestError::MissingDirectory(dir.display().to_string()));
    }
    let mut paths = Vec::new();
    collect_files(dir, &mut paths)?;
    paths.sort();

    let mut docs = Vec::new();
    for path in paths {
        let Some(kind) = doc_type(&path) else { continue };
        let mut metadata = Metadata::new();
        let content = if kind == "pdf" {
            match read_pdf(&path) {
                Ok((text, pages)) => {
                    metadata.insert("pages".into(), pages.into());
                    text
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to read pdf");
                    continue;
                }
            }
        } else {
            match fs::read(&path) {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to read document");
                    continue;
                }
            }
        };
        metadata.insert("source".into(), path.display().to_string().into());
        metadata.insert("type".into(), kind.into());
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            metadata.insert("file_name".into(), name.into());
        }
        info!(file = %path.display(), chars = content.chars().count(), "loaded document");
        docs.push(Document { content, metadata });
    }
    info!(count = docs.len(), dir = %dir.display(), "loaded documents");
    Ok(docs)
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), IngestError> {
    let entries = fs::read_dir(dir)
        .map_err(|e| IngestError::Io(format!("read_dir {}: {e}", dir.display())))?;
    for entry in entries {
        let entry = entry.map_err(|e| IngestError::Io(format!("read_dir {}: {e}", dir.display())))?;
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, out)?;
        } else if path.is_file() {
            out.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn loads_supported_files_sorted_and_recursive() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("policies");
        fs::create_dir_all(&nested).unwrap();
        fs::write(temp.path().join("b.txt"), "plain").unwrap();
        fs::write(nested.join("a.md"), "# Access").unwrap();
        fs::write(temp.path().join("c.png"), "binary").unwrap();

        let docs = load_directory(temp.path()).unwrap();
        assert_eq!(docs.len(), 2);
        let types: Vec<&str> = docs.iter().map(|d| d.metadata["type"].as_str().unwrap()).collect();
        assert_eq!(types, vec!["text", "markdown"]);
        assert_eq!(docs[1].metadata["file_name"], "a.md");
        assert!(docs[1].metadata["source"].as_str().unwrap().ends_with("a.md"));
    }

    #[test]
    fn extensions_match_case_insensitively() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("NOTES.MD"), "# Notes").unwrap();
        fs::write(temp.path().join("readme.Txt"), "hello").unwrap();
        let docs = load_directory(temp.path()).unwrap();
        let types: Vec<&str> = docs.iter().map(|d| d.metadata["type"].as_str().unwrap()).collect();
        assert_eq!(types, vec!["markdown", "text"]);
    }

    /// Single-page PDF showing `text` in a standard font.
    fn write_pdf(path: &Path, text: &str) {
        use lopdf::content::{Content, Operation};
        use lopdf::{Object, Stream, dictionary};

        let mut doc = lopdf::Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path).unwrap();
    }

    #[test]
    fn pdf_text_is_extracted() {
        let temp = TempDir::new().unwrap();
        write_pdf(&temp.path().join("Policy.PDF"), "Access requires MFA");
        let docs = load_directory(temp.path()).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].metadata["type"], "pdf");
        assert_eq!(docs[0].metadata["pages"], 1);
        assert!(docs[0].content.contains("Access requires MFA"), "{:?}", docs[0].content);
    }

    #[test]
    fn unreadable_pdf_is_skipped() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("broken.pdf"), "not a pdf").unwrap();
        fs::write(temp.path().join("ok.txt"), "fine").unwrap();
        let docs = load_directory(temp.path()).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].metadata["type"], "text");
    }

    #[test]
    fn missing_directory_errors() {
        let temp = TempDir::new().unwrap();
        let err = load_directory(&temp.path().join("nope")).unwrap_err();
        assert!(matches!(err, IngestError::MissingDirectory(_)));
    }

    #[test]
    fn empty_directory_is_empty() {
        let temp = TempDir::new().unwrap();
        assert!(load_directory(temp.path()).unwrap().is_empty());
    }
}
