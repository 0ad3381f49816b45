//! ICA receipts as delivered through Kivra.
//!
//! The item table is column-aligned in the source PDF but collapses into
//! whitespace-separated tokens on extraction, so decomposition anchors on
//! the tail of the line: `… <art.nr> <unit price> <qty> <st|kg> <total>`.
//! Discount rows (`Chokladbitar 3F20 - 7.00`) fail the positional checks
//! and are skipped, matching how the importer has always treated them.

use super::{ICA_ITEM_HEADER, Parsed, localize, parse_decimal, store_at};
use crate::anchors::{require_line, value_after};
use crate::error::ParseError;
use crate::model::{Product, Quantity, Unit, Visit};
use crate::segment::join_wrapped;
use chrono::NaiveDateTime;
use chrono_tz::Tz;
use tracing::debug;

pub(super) fn parse(lines: &[String], tz: Tz) -> Result<Parsed, ParseError> {
    let datetime = parse_datetime(lines, tz)?;
    let store = store_at(lines, 1)?;
    let id = receipt_nr(lines, &datetime)?;
    let total = parse_total(lines)?;

    // Items sit between the column header and the matching total line.
    let header_ix = require_line(lines, ICA_ITEM_HEADER)?;
    let total_ix = total_line_index(lines, total)?;

    let mut products = Vec::new();
    for line in join_wrapped(&lines[header_ix + 1..total_ix]) {
        match decompose(&line) {
            Some(product) => products.push(product),
            None => debug!(line = %line, "skipping undecomposable line (discount row?)"),
        }
    }

    Ok(Parsed {
        visit: Visit {
            id,
            datetime,
            store,
            products,
            total,
            source_pdf: None,
        },
        unhandled: Vec::new(),
    })
}

/// Date and time live on separate `Datum:` / `Tid:` lines.
fn parse_datetime(lines: &[String], tz: Tz) -> Result<chrono::DateTime<Tz>, ParseError> {
    let date = value_after(lines, "Datum:")?;
    let time = value_after(lines, "Tid:")?;
    let stamp = format!("{date} {time}");
    let naive = NaiveDateTime::parse_from_str(&stamp, "%Y-%m-%d %H:%M")
        .map_err(|_| ParseError::BadTimestamp(stamp.clone()))?;
    localize(naive, tz)
}

/// Kivra receipt numbers restart per store, so the id is synthesized as
/// `<org.nr>-<YYYYMMDD>-<kvittonr>` to stay unique across stores and days.
fn receipt_nr(lines: &[String], datetime: &chrono::DateTime<Tz>) -> Result<String, ParseError> {
    let orgnr_field = value_after(lines, "Org. nr:")?;
    let orgnr = orgnr_field
        .split_whitespace()
        .next()
        .ok_or(ParseError::MissingAnchor("Org. nr:"))?;

    let kvittonr_field = value_after(lines, "Kvittonr:")?;
    let kvittonr = kvittonr_field
        .split("Tid")
        .next()
        .unwrap_or(&kvittonr_field)
        .trim();

    Ok(format!("{orgnr}-{}-{kvittonr}", datetime.format("%Y%m%d")))
}

fn parse_total(lines: &[String]) -> Result<f64, ParseError> {
    let raw = value_after(lines, "Total: ")?;
    raw.parse().map_err(|_| ParseError::BadField {
        field: "total",
        line: raw,
    })
}

/// The total can reappear in a VAT summary further down; the anchor is the
/// `Total:` line whose text carries the integer part of the parsed total.
fn total_line_index(lines: &[String], total: f64) -> Result<usize, ParseError> {
    let whole = format!("{}", total.trunc() as i64);
    lines
        .iter()
        .position(|l| l.contains("Total:") && l.contains(&whole))
        .ok_or(ParseError::MissingAnchor("Total:"))
}

fn decompose(line: &str) -> Option<Product> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 5 {
        return None;
    }

    let total_price = parse_decimal(tokens[tokens.len() - 1])?;
    let unit = Unit::normalize(tokens[tokens.len() - 2])?;
    let amount = parse_decimal(tokens[tokens.len() - 3])?;
    if amount == 0.0 {
        return None;
    }
    let unit_price = total_price / amount;

    // The article number is usually fifth from the end; a shifted column
    // (extra token in the quantity field) pushes it one to the right.
    let candidate = tokens[tokens.len() - 5];
    let art_nr = if !candidate.is_empty() && candidate.chars().all(|c| c.is_ascii_digit()) {
        candidate
    } else {
        tokens[tokens.len() - 4]
    };

    let name = line
        .split(art_nr)
        .next()?
        .trim()
        .trim_start_matches('*')
        .to_string();

    Some(Product {
        name,
        amount: Quantity::from_value(amount, unit),
        unit,
        total_price,
        unit_price,
        sku: Some(art_nr.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Europe::Stockholm;

    fn receipt() -> Vec<String> {
        [
            "Ditt kvitto från ICA",
            "ICA Kvantum Malmborgs Lund",
            "Datum: 2024-11-02",
            "Tid: 18:21",
            "Org. nr: 556021-0261",
            "Kvittonr: 4711",
            "Beskrivning Art. nr. Pris Mängd Summa(SEK)",
            "*Co-Co dubbel 7310511251406 9.00 3 st 27.00",
            "Chokladbitar 3F20 - 7.00",
            "Salladsbar/Matbar 9000 129.60 0.50 kg 64.80",
            "*Vaniljmunk 8801 12.00 4 st 48.00",
            "29. Munkar 4f40 - 8.00",
            "Total: 139.80",
            "Moms% Moms Netto Brutto",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    #[test]
    fn synthesizes_the_receipt_id() {
        let parsed = parse(&receipt(), Stockholm).unwrap();
        assert_eq!(parsed.visit.id, "556021-0261-20241102-4711");
    }

    #[test]
    fn parses_the_header_fields() {
        let parsed = parse(&receipt(), Stockholm).unwrap();
        let v = &parsed.visit;
        assert_eq!(v.store, "ICA Kvantum Malmborgs Lund");
        assert_eq!(v.total, 139.8);
        assert_eq!(
            v.datetime.format("%Y-%m-%d %H:%M:%S%:z").to_string(),
            "2024-11-02 18:21:00+01:00"
        );
    }

    #[test]
    fn decomposes_items_and_skips_discount_rows() {
        let parsed = parse(&receipt(), Stockholm).unwrap();
        let p = &parsed.visit.products;
        assert_eq!(p.len(), 3);

        assert_eq!(p[0].name, "Co-Co dubbel");
        assert_eq!(p[0].sku.as_deref(), Some("7310511251406"));
        assert_eq!(p[0].amount, Quantity::Count(3));
        assert_eq!(p[0].unit, Unit::Stk);
        assert_eq!(p[0].unit_price, 9.0);
        assert_eq!(p[0].total_price, 27.0);

        assert_eq!(p[1].name, "Salladsbar/Matbar");
        assert_eq!(p[1].amount, Quantity::Weight(0.5));
        assert_eq!(p[1].unit, Unit::Kg);
        assert_eq!(p[1].unit_price, 129.6);

        assert_eq!(p[2].name, "Vaniljmunk");
        assert_eq!(p[2].amount, Quantity::Count(4));
    }

    #[test]
    fn lowercase_units_normalize_to_coop_codes() {
        let parsed = parse(&receipt(), Stockholm).unwrap();
        let units: Vec<Unit> = parsed.visit.products.iter().map(|p| p.unit).collect();
        assert_eq!(units, vec![Unit::Stk, Unit::Kg, Unit::Stk]);
    }

    #[test]
    fn missing_item_header_is_loud() {
        let lines: Vec<String> = receipt()
            .into_iter()
            .filter(|l| !l.contains("Beskrivning"))
            .collect();
        assert!(matches!(
            parse(&lines, Stockholm),
            Err(ParseError::MissingAnchor(ICA_ITEM_HEADER))
        ));
    }
}
