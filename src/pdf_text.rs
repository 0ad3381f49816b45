use crate::error::ParseError;
use lopdf::{Dictionary, Document};
use tracing::{info, warn};

/// Minimum number of non-whitespace characters we expect from a
/// "real" text PDF. Below this threshold we treat it as scanned.
const MIN_TEXT_CHARS: usize = 30;

/// Extract the receipt's text lines from raw PDF bytes.
///
/// Runs a structural check with lopdf first so image-only receipts (photo
/// scans forwarded into Kivra) are reported as [`ParseError::ScannedPdf`]
/// instead of producing an empty line list that fails on the first anchor.
pub fn extract_lines(pdf_bytes: &[u8]) -> Result<Vec<String>, ParseError> {
    let doc = Document::load_mem(pdf_bytes).map_err(|e| ParseError::Pdf(e.to_string()))?;

    if looks_like_scanned(&doc) {
        info!("PDF structural check: likely scanned / image-only");
        return Err(ParseError::ScannedPdf);
    }

    let text = pdf_extract::extract_text_from_mem(pdf_bytes).map_err(|e| {
        warn!(error = %e, "pdf-extract failed — may be scanned or corrupted");
        ParseError::ScannedPdf
    })?;

    let meaningful = text.chars().filter(|c| !c.is_whitespace()).count();
    if meaningful < MIN_TEXT_CHARS {
        info!(chars = meaningful, "Extracted text too short — treating as scanned");
        return Err(ParseError::ScannedPdf);
    }

    info!(chars = meaningful, "Text extracted successfully");
    Ok(text.lines().map(str::to_string).collect())
}

/// Heuristic: inspect the PDF object tree for signs that every page is just
/// a single image with no text operators. A page whose `Resources` carry
/// XObject images but no Font entries is almost certainly a scanned page.
fn looks_like_scanned(doc: &Document) -> bool {
    let pages = doc.get_pages();
    if pages.is_empty() {
        return false; // Can't tell — let text extraction try
    }

    let mut image_only = 0;
    for object_id in pages.values() {
        let Ok(page_dict) = doc.get_object(*object_id).and_then(|o| o.as_dict()) else {
            continue;
        };
        if has_resource(doc, page_dict, b"XObject") && !has_resource(doc, page_dict, b"Font") {
            image_only += 1;
        }
    }

    let ratio = image_only as f64 / pages.len() as f64;
    info!(
        total_pages = pages.len(),
        image_only,
        ratio = format!("{ratio:.2}"),
        "Scanned-page analysis"
    );

    // If ≥80% of pages are image-only, treat the whole PDF as scanned
    ratio >= 0.8
}

/// True when the page's `Resources` dictionary holds a non-empty entry
/// under `key`, following indirect references on the way.
fn has_resource(doc: &Document, page_dict: &Dictionary, key: &[u8]) -> bool {
    page_dict
        .get(b"Resources")
        .ok()
        .and_then(|r| doc.dereference(r).ok())
        .and_then(|(_, resolved)| resolved.as_dict().ok())
        .and_then(|res| res.get(key).ok())
        .and_then(|v| doc.dereference(v).ok())
        .and_then(|(_, resolved)| resolved.as_dict().ok())
        .is_some_and(|dict| !dict.is_empty())
}
