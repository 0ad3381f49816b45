//! Anchor location: find the fixed marker lines (date, total, item-block
//! header) that bracket the interesting parts of a receipt.

use crate::error::ParseError;

/// Index of the first line containing `needle`.
pub fn find_line(lines: &[String], needle: &str) -> Option<usize> {
    lines.iter().position(|l| l.contains(needle))
}

/// Like [`find_line`], but a missing anchor is a hard error — malformed
/// layouts abort the parse of the whole file.
pub fn require_line(lines: &[String], needle: &'static str) -> Result<usize, ParseError> {
    find_line(lines, needle).ok_or(ParseError::MissingAnchor(needle))
}

/// First line containing `needle`, by reference.
pub fn line_containing<'a>(
    lines: &'a [String],
    needle: &'static str,
) -> Result<&'a str, ParseError> {
    Ok(lines[require_line(lines, needle)?].as_str())
}

/// Trimmed text after the first occurrence of `marker` on its anchor line.
pub fn value_after(lines: &[String], marker: &'static str) -> Result<String, ParseError> {
    let line = line_containing(lines, marker)?;
    let (_, rest) = line.split_once(marker).expect("anchor line contains marker");
    Ok(rest.trim().to_string())
}
