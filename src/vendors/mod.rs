//! Per-vendor receipt parsers.
//!
//! The three supported layouts share the anchor/segmentation machinery and
//! differ only in their anchor strings and per-line decomposers, so each
//! vendor is one module behind a common [`Vendor`] dispatch.

mod coop_v1;
mod coop_v2;
mod ica_kivra;

use crate::anchors::find_line;
use crate::error::ParseError;
use crate::model::Visit;
use chrono::NaiveDateTime;
use chrono::TimeZone;
use chrono::offset::LocalResult;
use chrono_tz::Tz;

/// ICA Kivra column header; doubles as the start-of-items anchor.
pub(crate) const ICA_ITEM_HEADER: &str = "Beskrivning Art. nr. Pris Mängd Summa(SEK)";

/// Which store chain's text layout to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vendor {
    /// Coop printed receipts: starred price tokens, `Datum: … Tid: …`.
    CoopV1,
    /// Coop app "Scan & Pay" receipts: price-per-line state machine.
    CoopV2,
    /// ICA receipts delivered through Kivra: positional token columns.
    IcaKivra,
}

/// Result of parsing one receipt: the structured visit plus any item lines
/// the decomposer could not make sense of (diagnostic only).
#[derive(Debug)]
pub struct Parsed {
    pub visit: Visit,
    pub unhandled: Vec<String>,
}

impl Vendor {
    /// Guess the layout from the extracted text. The ICA column header is
    /// unambiguous; the two Coop generations are told apart by how the
    /// timestamp is printed.
    pub fn detect(lines: &[String]) -> Result<Vendor, ParseError> {
        if find_line(lines, ICA_ITEM_HEADER).is_some() {
            return Ok(Vendor::IcaKivra);
        }
        if lines
            .iter()
            .any(|l| l.contains("Datum:") && l.contains(" Tid:"))
        {
            return Ok(Vendor::CoopV1);
        }
        if find_line(lines, "Org.Nr").is_some() && find_line(lines, "Kvitto").is_some() {
            return Ok(Vendor::CoopV2);
        }
        Err(ParseError::UnknownLayout)
    }

    /// Run this vendor's parser over the extracted lines.
    pub fn parse(self, lines: &[String], tz: Tz) -> Result<Parsed, ParseError> {
        match self {
            Vendor::CoopV1 => coop_v1::parse(lines, tz),
            Vendor::CoopV2 => coop_v2::parse(lines, tz),
            Vendor::IcaKivra => ica_kivra::parse(lines, tz),
        }
    }
}

/// Parse a price/quantity field that may use a decimal comma.
pub(crate) fn parse_decimal(raw: &str) -> Option<f64> {
    raw.replace(',', ".").parse().ok()
}

/// Localize a naive wall-clock timestamp. The repeated hour on the
/// fall-back Sunday resolves to standard time (the second occurrence);
/// wall times inside the spring-forward gap never existed and are rejected.
pub(crate) fn localize(naive: NaiveDateTime, tz: Tz) -> Result<chrono::DateTime<Tz>, ParseError> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Ok(dt),
        LocalResult::Ambiguous(_, standard) => Ok(standard),
        LocalResult::None => Err(ParseError::BadTimestamp(naive.to_string())),
    }
}

/// Shared Coop total line: `Total<amount> SEK` with a decimal comma.
pub(crate) fn coop_total(lines: &[String]) -> Result<f64, ParseError> {
    let line = crate::anchors::line_containing(lines, "Total")?;
    let (_, rest) = line.split_once("Total").expect("anchor line contains marker");
    let raw = rest.trim().replace("SEK", "");
    parse_decimal(raw.trim()).ok_or_else(|| ParseError::BadField {
        field: "total",
        line: line.to_string(),
    })
}

/// The store name sits on a fixed line near the top of the extracted text.
pub(crate) fn store_at(lines: &[String], index: usize) -> Result<String, ParseError> {
    let store = lines
        .get(index)
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .ok_or(ParseError::MissingAnchor("store name"))?;
    Ok(store.to_string())
}
