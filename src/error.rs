use thiserror::Error;

/// Everything that can go wrong between a PDF on disk and a parsed `Visit`.
///
/// A missing anchor aborts the parse of that file; per-line decomposition
/// failures never surface here (they end up in the `unhandled` list or are
/// skipped, depending on the vendor).
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse PDF: {0}")]
    Pdf(String),

    #[error("PDF appears to be scanned / image-only — no text to extract")]
    ScannedPdf,

    #[error("anchor line not found: {0:?}")]
    MissingAnchor(&'static str),

    #[error("could not detect receipt layout from extracted text")]
    UnknownLayout,

    #[error("invalid timestamp field: {0:?}")]
    BadTimestamp(String),

    #[error("bad {field} in line {line:?}")]
    BadField { field: &'static str, line: String },

    #[error("unknown unit {unit:?} in line {line:?}")]
    UnknownUnit { unit: String, line: String },
}
