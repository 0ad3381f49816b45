//! Structured-data extraction from Swedish grocery receipt PDFs.
//!
//! Each supported chain (Coop printed, Coop app, ICA via Kivra) embeds a
//! plain-text layout in its receipt PDFs. The pipeline is the same for all
//! of them: extract text lines, locate the anchor lines (date, total, item
//! header), segment the item block between the anchors, and decompose each
//! item line into name, quantity, unit and prices. The result is one JSON
//! document per receipt.

pub mod anchors;
pub mod batch;
pub mod config;
pub mod error;
pub mod model;
pub mod pdf_text;
pub mod segment;
pub mod vendors;

pub use error::ParseError;
pub use model::{Product, Quantity, Unit, Visit};
pub use vendors::{Parsed, Vendor};

use chrono_tz::Tz;
use std::path::Path;
use tracing::info;

/// Parse one receipt PDF into a [`Visit`] plus per-line diagnostics.
/// With `vendor` unset the layout is auto-detected from the text.
pub fn parse_pdf(path: &Path, vendor: Option<Vendor>, tz: Tz) -> Result<Parsed, ParseError> {
    let bytes = std::fs::read(path)?;
    let lines = pdf_text::extract_lines(&bytes)?;
    let vendor = match vendor {
        Some(v) => v,
        None => Vendor::detect(&lines)?,
    };
    info!(vendor = ?vendor, file = %path.display(), "Parsing receipt");
    vendor.parse(&lines, tz)
}
