//! Data-URL artifact encoding and PDF page geometry
//!
//! Compiled outputs travel as self-describing data URLs
//! (`data:<mime>;base64,<payload>`). Any failure here is an
//! infrastructure failure, never a compile failure: the toolchain already
//! succeeded by the time encoding starts.

use base64::Engine;
use lopdf::{Dictionary, Document, Object};
use std::path::Path;

use crate::error::EngineError;

/// MIME type guessed from a file's extension.
pub fn mime_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("pdf") => "application/pdf",
        Some("dvi") => "application/x-dvi",
        Some("png") => "image/png",
        Some("svg") => "image/svg+xml",
        Some("tex") | Some("log") | Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}

/// Encode a compiled output file as a data URL.
pub fn encode_data_url(path: &Path) -> Result<String, EngineError> {
    let bytes = std::fs::read(path)
        .map_err(|e| EngineError::Encode(format!("{}: {}", path.display(), e)))?;
    let payload = base64::engine::general_purpose::STANDARD.encode(&bytes);
    Ok(format!("data:{};base64,{}", mime_type_for(path), payload))
}

/// Reconstruct PDF bytes from a data URL, rejecting any other MIME type.
pub fn decode_pdf_data_url(url: &str) -> Result<Vec<u8>, EngineError> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| EngineError::Encode(format!("not a data URL: {:.32}", url)))?;
    let (mime, payload) = rest
        .split_once(";base64,")
        .ok_or_else(|| EngineError::Encode("data URL is missing a base64 payload".to_string()))?;
    if mime != "application/pdf" {
        return Err(EngineError::MimeMismatch(mime.to_string()));
    }
    base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| EngineError::Encode(format!("invalid base64 payload: {}", e)))
}

/// Media box of the first page, in points: `[x0, y0, x1, y1]`.
///
/// The box may live on the page itself or be inherited from an ancestor
/// `Pages` node.
pub fn pdf_mediabox(bytes: &[u8]) -> Result<[f64; 4], EngineError> {
    let doc = Document::load_mem(bytes).map_err(|e| EngineError::Encode(e.to_string()))?;
    let pages = doc.get_pages();
    let (_, &first_page) = pages
        .iter()
        .next()
        .ok_or_else(|| EngineError::Encode("document has no pages".to_string()))?;

    let mut dict = page_dict(&doc, first_page)?;
    loop {
        if let Ok(obj) = dict.get(b"MediaBox") {
            return mediabox_array(&doc, obj);
        }
        match dict.get(b"Parent") {
            Ok(Object::Reference(parent)) => dict = page_dict(&doc, *parent)?,
            _ => return Err(EngineError::Encode("page has no MediaBox".to_string())),
        }
    }
}

/// Landscape pages (wider than tall) are presented as slides, portrait
/// pages as documents.
pub fn is_landscape(mediabox: &[f64; 4]) -> bool {
    let width = mediabox[2] - mediabox[0];
    let height = mediabox[3] - mediabox[1];
    width > height
}

fn page_dict(doc: &Document, id: lopdf::ObjectId) -> Result<&Dictionary, EngineError> {
    doc.get_object(id)
        .and_then(Object::as_dict)
        .map_err(|e| EngineError::Encode(e.to_string()))
}

fn mediabox_array(doc: &Document, obj: &Object) -> Result<[f64; 4], EngineError> {
    let obj = resolve(doc, obj);
    let arr = obj
        .as_array()
        .map_err(|e| EngineError::Encode(e.to_string()))?;
    if arr.len() != 4 {
        return Err(EngineError::Encode(format!(
            "MediaBox has {} entries, expected 4",
            arr.len()
        )));
    }
    let mut out = [0.0; 4];
    for (i, item) in arr.iter().enumerate() {
        out[i] = number(resolve(doc, item)).ok_or_else(|| {
            EngineError::Encode("MediaBox entry is not a number".to_string())
        })?;
    }
    Ok(out)
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        other => other,
    }
}

fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    /// Minimal one-page PDF with the given media box extents.
    fn test_pdf(width: i64, height: i64) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");

        let pages_id = doc.new_object_id();
        let content_id = doc.add_object(Object::Stream(lopdf::Stream::new(
            Dictionary::new(),
            b"BT /F1 12 Tf 50 700 Td (hi) Tj ET".to_vec(),
        )));

        let mut page_dict = Dictionary::new();
        page_dict.set("Type", Object::Name(b"Page".to_vec()));
        page_dict.set("Parent", Object::Reference(pages_id));
        page_dict.set("Contents", Object::Reference(content_id));
        page_dict.set(
            "MediaBox",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(width),
                Object::Integer(height),
            ]),
        );
        let page_id = doc.add_object(Object::Dictionary(page_dict));

        let mut pages_dict = Dictionary::new();
        pages_dict.set("Type", Object::Name(b"Pages".to_vec()));
        pages_dict.set("Count", Object::Integer(1));
        pages_dict.set("Kids", Object::Array(vec![Object::Reference(page_id)]));
        doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

        let mut catalog = Dictionary::new();
        catalog.set("Type", Object::Name(b"Catalog".to_vec()));
        catalog.set("Pages", Object::Reference(pages_id));
        let catalog_id = doc.add_object(Object::Dictionary(catalog));
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    #[test]
    fn mime_types_follow_extensions() {
        assert_eq!(mime_type_for(Path::new("out.pdf")), "application/pdf");
        assert_eq!(mime_type_for(Path::new("out.DVI")), "application/x-dvi");
        assert_eq!(mime_type_for(Path::new("doc.log")), "text/plain");
        assert_eq!(mime_type_for(Path::new("blob")), "application/octet-stream");
    }

    #[test]
    fn encoded_pdf_carries_the_pdf_mime_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.pdf");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(&test_pdf(612, 792)).unwrap();

        let url = encode_data_url(&path).unwrap();
        assert!(url.starts_with("data:application/pdf;base64,"), "{:.48}", url);
    }

    #[test]
    fn decode_round_trips_the_payload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.pdf");
        let bytes = test_pdf(612, 792);
        std::fs::write(&path, &bytes).unwrap();

        let url = encode_data_url(&path).unwrap();
        assert_eq!(decode_pdf_data_url(&url).unwrap(), bytes);
    }

    #[test]
    fn decode_rejects_foreign_mime_types() {
        let err = decode_pdf_data_url("data:image/png;base64,aGk=").unwrap_err();
        assert!(matches!(err, EngineError::MimeMismatch(m) if m == "image/png"));
    }

    #[test]
    fn decode_rejects_malformed_urls() {
        assert!(decode_pdf_data_url("http://example.com/a.pdf").is_err());
        assert!(decode_pdf_data_url("data:application/pdf,plain").is_err());
    }

    #[test]
    fn missing_file_is_an_encode_error() {
        let err = encode_data_url(Path::new("/nonexistent/out.pdf")).unwrap_err();
        assert!(matches!(err, EngineError::Encode(_)));
        assert!(!err.is_compile_error());
    }

    #[test]
    fn mediabox_is_read_from_the_first_page() {
        let mediabox = pdf_mediabox(&test_pdf(612, 792)).unwrap();
        assert_eq!(mediabox, [0.0, 0.0, 612.0, 792.0]);
    }

    #[test]
    fn landscape_pages_are_slides() {
        assert!(is_landscape(&[0.0, 0.0, 800.0, 600.0]));
        assert!(!is_landscape(&[0.0, 0.0, 612.0, 792.0]));
    }
}
