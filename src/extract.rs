use log::{debug, warn};
use lopdf::Document;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

const IMAGE_PDF_NOTE: &str = "Note: Image-based PDFs cannot be read";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    PlainText,
}

impl DocumentKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "pdf" => Some(Self::Pdf),
            "txt" | "md" | "csv" => Some(Self::PlainText),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Text(String),
    Unsupported { extension: String },
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Error reading file: {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Error reading file: PDF read error: {source}\n{IMAGE_PDF_NOTE}")]
    Pdf {
        #[source]
        source: lopdf::Error,
    },
    /// The document needs a user password to open.
    #[error("Error reading file: PDF read error: encrypted\n{IMAGE_PDF_NOTE}")]
    Encrypted,
}

/// Returns the extension with its leading dot, or an empty string.
pub fn dotted_extension(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default()
}

pub fn extract(path: &Path) -> Result<Extraction, ExtractionError> {
    let Some(kind) = DocumentKind::from_path(path) else {
        let extension = dotted_extension(path);
        debug!(
            "unsupported attachment type {extension:?}: {}",
            path.display()
        );
        return Ok(Extraction::Unsupported { extension });
    };

    let text = match kind {
        DocumentKind::PlainText => read_text(path)?,
        DocumentKind::Pdf => read_pdf(path)?,
    };
    debug!("extracted {} bytes from {}", text.len(), path.display());
    Ok(Extraction::Text(text))
}

fn read_text(path: &Path) -> Result<String, ExtractionError> {
    fs::read_to_string(path).map_err(|source| ExtractionError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_pdf(path: &Path) -> Result<String, ExtractionError> {
    if !path.exists() {
        return Err(ExtractionError::Io {
            path: path.to_path_buf(),
            source: io::Error::new(io::ErrorKind::NotFound, "file not found"),
        });
    }

    let mut document = Document::load(path).map_err(|source| {
        warn!("failed to open pdf {}: {source}", path.display());
        ExtractionError::Pdf { source }
    })?;
    if document.is_encrypted() {
        // Files protected only by an owner password open with an empty user password.
        document.decrypt("").map_err(|source| {
            warn!("cannot decrypt pdf {}: {source}", path.display());
            ExtractionError::Encrypted
        })?;
    }

    // get_pages is keyed by page number, so iteration follows page order.
    let mut text = String::new();
    for page_number in document.get_pages().into_keys() {
        let page_text = document
            .extract_text(&[page_number])
            .map_err(|source| ExtractionError::Pdf { source })?;
        text.push_str(&page_text);
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::{dotted_extension, extract, DocumentKind, Extraction, ExtractionError};
    use lopdf::content::{Content, Operation};
    use lopdf::encryption::{decrypt_object, get_encryption_key};
    use lopdf::{dictionary, Document, Object, Stream, StringFormat};
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    const PASSWORD_PAD: [u8; 32] = [
        0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01,
        0x08, 0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53,
        0x69, 0x7A,
    ];

    fn text_page(text: &str) -> Vec<Operation> {
        vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 24.into()]),
            Operation::new("Td", vec![100.into(), 600.into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ]
    }

    fn image_page() -> Vec<Operation> {
        vec![
            Operation::new("q", vec![]),
            Operation::new("Do", vec!["Im1".into()]),
            Operation::new("Q", vec![]),
        ]
    }

    fn build_pdf(pages: Vec<Vec<Operation>>) -> Document {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let image_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 1,
                "Height" => 1,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            vec![0x80],
        ));
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
            "XObject" => dictionary! { "Im1" => image_id },
        });

        let mut kids = Vec::new();
        for operations in pages {
            let content = Content { operations };
            let content_id = doc.add_object(Stream::new(
                dictionary! {},
                content.encode().expect("content should encode"),
            ));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(Object::from(page_id));
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc
    }

    fn write_pdf(path: &Path, pages: &[&str]) {
        let pages = pages.iter().map(|text| text_page(text)).collect();
        let mut doc = build_pdf(pages);
        doc.save(path).expect("pdf fixture should save");
    }

    fn rc4(key: &[u8], data: &[u8]) -> Vec<u8> {
        let mut state: Vec<u8> = (0..=255).collect();
        let mut j = 0u8;
        for i in 0..256 {
            j = j.wrapping_add(state[i]).wrapping_add(key[i % key.len()]);
            state.swap(i, j as usize);
        }

        let (mut i, mut j) = (0u8, 0u8);
        data.iter()
            .map(|byte| {
                i = i.wrapping_add(1);
                j = j.wrapping_add(state[i as usize]);
                state.swap(i as usize, j as usize);
                let index = state[i as usize].wrapping_add(state[j as usize]);
                byte ^ state[index as usize]
            })
            .collect()
    }

    /// Seals every stream with the 40-bit RC4 standard security handler (revision 2).
    fn encrypt(doc: &mut Document, password: &str) {
        let encrypt_id = doc.add_object(dictionary! {
            "Filter" => "Standard",
            "V" => 1,
            "R" => 2,
            "O" => Object::String(vec![0x4F; 32], StringFormat::Hexadecimal),
            "U" => Object::String(vec![0; 32], StringFormat::Hexadecimal),
            "P" => -44,
        });
        let file_id = Object::string_literal("docchat-fixture!");
        doc.trailer.set("Encrypt", encrypt_id);
        doc.trailer.set("ID", vec![file_id.clone(), file_id]);

        let key = get_encryption_key(&*doc, password, false).expect("key");
        for (&id, object) in doc.objects.iter_mut() {
            let Ok(sealed) = decrypt_object(&key, id, &*object) else {
                continue;
            };
            if let Object::Stream(stream) = object {
                stream.set_content(sealed);
            }
        }

        let user_check = rc4(&key, &PASSWORD_PAD);
        doc.get_object_mut(encrypt_id)
            .and_then(Object::as_dict_mut)
            .expect("encrypt dictionary")
            .set("U", Object::String(user_check, StringFormat::Hexadecimal));
    }

    fn fixture(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, contents).expect("fixture should write");
        path
    }

    fn extracted_text(path: &Path) -> String {
        match extract(path).expect("pdf should extract") {
            Extraction::Text(text) => text,
            other => panic!("pdf should yield text, got {other:?}"),
        }
    }

    #[test]
    fn kind_is_matched_case_insensitively() {
        assert_eq!(
            DocumentKind::from_path(Path::new("REPORT.PDF")),
            Some(DocumentKind::Pdf)
        );
        assert_eq!(
            DocumentKind::from_path(Path::new("notes.Md")),
            Some(DocumentKind::PlainText)
        );
        assert_eq!(
            DocumentKind::from_path(Path::new("table.CSV")),
            Some(DocumentKind::PlainText)
        );
        assert_eq!(DocumentKind::from_path(Path::new("photo.png")), None);
        assert_eq!(DocumentKind::from_path(Path::new("Makefile")), None);
    }

    #[test]
    fn plain_text_files_are_returned_verbatim() {
        let dir = TempDir::new().expect("temp dir");
        let body = "name,amount\nQ1 revenue,$5M\n\n  trailing spaces  \n";
        for name in ["data.csv", "notes.txt", "README.md"] {
            let path = fixture(&dir, name, body);
            let extraction = extract(&path).expect("plain text should extract");
            assert_eq!(extraction, Extraction::Text(body.to_string()));
        }
    }

    #[test]
    fn unsupported_extension_is_a_typed_negative_result() {
        let dir = TempDir::new().expect("temp dir");
        let path = fixture(&dir, "photo.png", "not really an image");

        let extraction = extract(&path).expect("unsupported type is not an error");
        assert_eq!(
            extraction,
            Extraction::Unsupported {
                extension: ".png".to_string()
            }
        );
    }

    #[test]
    fn missing_text_file_reports_read_error() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("gone.txt");
        let error = extract(&path).expect_err("missing file should fail");

        assert!(matches!(error, ExtractionError::Io { .. }));
        assert!(error.to_string().starts_with("Error reading file:"));
    }

    #[test]
    fn corrupted_pdf_fails_with_image_note() {
        let dir = TempDir::new().expect("temp dir");
        let path = fixture(&dir, "broken.pdf", "this is not a pdf document");

        let error = extract(&path).expect_err("corrupted pdf should fail");
        assert!(matches!(error, ExtractionError::Pdf { .. }));
        let message = error.to_string();
        assert!(message.starts_with("Error reading file: PDF read error:"));
        assert!(message.contains("Image-based PDFs cannot be read"));
    }

    #[test]
    fn pdf_pages_are_concatenated_in_order() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("report.pdf");
        write_pdf(&path, &["Hello World", "Second Page"]);

        let text = extracted_text(&path);
        let first = text.find("Hello World").expect("first page text present");
        let second = text.find("Second Page").expect("second page text present");
        assert!(first < second);
    }

    #[test]
    fn image_only_page_yields_empty_text() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("scan.pdf");
        let mut doc = build_pdf(vec![image_page()]);
        doc.save(&path).expect("pdf fixture should save");

        assert_eq!(extracted_text(&path).trim(), "");
    }

    #[test]
    fn image_pages_between_text_pages_keep_order() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("mixed.pdf");
        let pages = vec![text_page("Cover"), image_page(), text_page("Appendix")];
        let mut doc = build_pdf(pages);
        doc.save(&path).expect("pdf fixture should save");

        let text = extracted_text(&path);
        let cover = text.find("Cover").expect("cover text present");
        let appendix = text.find("Appendix").expect("appendix text present");
        assert!(cover < appendix);
    }

    #[test]
    fn owner_password_only_pdf_is_decrypted() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("locked.pdf");
        let mut doc = build_pdf(vec![text_page("Quarterly Summary")]);
        encrypt(&mut doc, "");
        doc.save(&path).expect("pdf fixture should save");

        let raw = fs::read(&path).expect("fixture should read");
        let marker = b"Quarterly Summary";
        assert!(!raw.windows(marker.len()).any(|window| window == marker));
        assert!(extracted_text(&path).contains("Quarterly Summary"));
    }

    #[test]
    fn pdf_needing_user_password_reports_encrypted() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("secret.pdf");
        let mut doc = build_pdf(vec![text_page("Board Minutes")]);
        encrypt(&mut doc, "secret");
        doc.save(&path).expect("pdf fixture should save");

        let error = extract(&path).expect_err("password protected pdf should fail");
        assert!(matches!(error, ExtractionError::Encrypted));
        let prefix = "Error reading file: PDF read error: encrypted";
        let message = error.to_string();
        assert!(message.starts_with(prefix));
        assert!(message.ends_with("Image-based PDFs cannot be read"));
    }

    #[test]
    fn dotted_extension_keeps_original_case() {
        assert_eq!(dotted_extension(Path::new("/tmp/a/notes.TXT")), ".TXT");
        assert_eq!(dotted_extension(Path::new("/tmp/a/Makefile")), "");
    }
}
