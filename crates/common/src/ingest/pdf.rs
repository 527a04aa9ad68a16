//! PDF text extraction
//!
//! Walks each page's content stream with lopdf and collects the operands of
//! the text-showing operators. Pages that fail to decode are skipped.

use crate::errors::{AppError, Result};
use lopdf::content::Content;
use lopdf::Object;
use tracing::{debug, warn};

/// Extract text content from an in-memory PDF
///
/// A PDF without a text layer yields an empty string; only an unreadable
/// file is an error.
pub fn extract_text(bytes: &[u8]) -> Result<String> {
    let doc = lopdf::Document::load_mem(bytes).map_err(|e| AppError::InvalidFormat {
        message: format!("Unreadable PDF: {}", e),
    })?;

    let pages = doc.get_pages();
    debug!(page_count = pages.len(), "Extracting text from PDF");

    let mut text = String::new();
    for (page_num, page_id) in pages {
        match page_text(&doc, page_id) {
            Ok(page) => {
                text.push_str(&page);
                text.push('\n');
            }
            Err(e) => {
                warn!(page = page_num, error = %e, "Failed to extract text from page, skipping");
            }
        }
    }

    let cleaned = clean_text(&text);
    debug!(
        original_len = text.len(),
        cleaned_len = cleaned.len(),
        "Text extraction complete"
    );

    Ok(cleaned)
}

fn page_text(doc: &lopdf::Document, page_id: lopdf::ObjectId) -> std::result::Result<String, lopdf::Error> {
    let content = Content::decode(&doc.get_page_content(page_id)?)?;

    let mut text = String::new();
    for operation in &content.operations {
        match operation.operator.as_str() {
            // Tj, ' and " carry the string as their last operand
            "Tj" | "'" | "\"" => {
                if let Some(Object::String(bytes, _)) = operation.operands.last() {
                    text.push_str(&decode_pdf_string(bytes));
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = operation.operands.first() {
                    for item in items {
                        if let Object::String(bytes, _) = item {
                            text.push_str(&decode_pdf_string(bytes));
                        }
                    }
                }
            }
            "ET" => text.push(' '),
            _ => {}
        }
    }

    Ok(text)
}

/// Decode a string operand; UTF-16BE when it carries a BOM, Latin-1 otherwise
fn decode_pdf_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    bytes.iter().map(|&b| b as char).collect()
}

/// Collapse whitespace and normalize typographic quotes
pub(crate) fn clean_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace('\u{FEFF}', "")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
}
