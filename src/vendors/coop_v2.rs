//! Coop app "Scan & Pay" layout.
//!
//! Unlike the printed layout, every logical field gets its own line: an
//! item line carries exactly one positive price, an optional `x 2STK 7.48`
//! quantity line follows, offer lines carry only negative prices, and any
//! other text continues the item name. Decomposition is therefore a small
//! state machine over normalized lines.

use super::{Parsed, coop_total, localize, parse_decimal, store_at};
use crate::anchors::{line_containing, require_line, value_after};
use crate::error::ParseError;
use crate::model::{Product, Quantity, Unit, Visit};
use chrono::NaiveDateTime;
use chrono_tz::Tz;
use regex::Regex;

/// A line whose prices are all non-positive and that mentions one of these
/// is a campaign/discount row, not an item.
const OFFER_KEYWORDS: [&str; 9] = [
    "FÖR",
    "RABATT",
    "ERBJUD",
    "PRIS",
    "BONUS",
    "KVITTOT",
    "MÅNADSBONUS",
    "rabatt",
    "ord. priser",
];

pub(super) fn parse(lines: &[String], tz: Tz) -> Result<Parsed, ParseError> {
    let datetime = parse_datetime(lines, tz)?;
    let store = store_at(lines, 0)?;
    let id = value_after(lines, "Kvitto")?;
    let total = coop_total(lines)?;

    // Items sit between the Org.Nr line and the total line.
    let orgnr_ix = require_line(lines, "Org.Nr")?;
    let total_ix = require_line(lines, "Total")?;
    let products = decompose_items(&lines[orgnr_ix + 1..total_ix]);

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

/// ` Datum2025-06-0412:48` — no separators at all; the field is sliced by
/// position after stripping the marker.
fn parse_datetime(lines: &[String], tz: Tz) -> Result<chrono::DateTime<Tz>, ParseError> {
    let line = line_containing(lines, "Datum")?;
    let rest = line.replace("Datum", "");
    let rest = rest.trim();
    if rest.len() < 15 || !rest.is_char_boundary(10) || !rest.is_char_boundary(15) {
        return Err(ParseError::BadTimestamp(line.to_string()));
    }
    let stamp = format!("{} {}", &rest[0..10], &rest[10..15]);
    let naive = NaiveDateTime::parse_from_str(&stamp, "%Y-%m-%d %H:%M")
        .map_err(|_| ParseError::BadTimestamp(stamp.clone()))?;
    localize(naive, tz)
}

/// One item under construction while scanning its surrounding lines.
struct Draft {
    name: String,
    base_price: f64,
    quantity: f64,
    unit: Option<Unit>,
    unit_price: Option<f64>,
    discount: f64,
}

fn decompose_items(lines: &[String]) -> Vec<Product> {
    let price_re = Regex::new(r"(-?\d+[.,]\d{2})").expect("static regex");
    let qty_re = Regex::new(r"x ([\d.]+)(KG|STK)").expect("static regex");

    let prices = |line: &str| -> Vec<f64> {
        price_re
            .find_iter(line)
            .filter_map(|m| parse_decimal(m.as_str()))
            .collect()
    };
    let is_quantity =
        |line: &str| line.starts_with("x ") && (line.contains("KG") || line.contains("STK"));
    let is_offer = |line: &str, ps: &[f64]| {
        !ps.is_empty()
            && ps.iter().all(|&p| p <= 0.0)
            && OFFER_KEYWORDS.iter().any(|k| line.contains(k))
    };

    let mut drafts: Vec<Draft> = Vec::new();

    for raw in lines {
        // Collapse whitespace and switch to decimal points up front.
        let line = raw.split_whitespace().collect::<Vec<_>>().join(" ").replace(',', ".");
        if line.is_empty() {
            continue;
        }

        let ps = prices(&line);

        let is_item = ps.len() == 1 && ps[0] > 0.0 && !is_quantity(&line) && !is_offer(&line, &ps);
        if is_item {
            drafts.push(Draft {
                name: price_re.replace_all(&line, "").trim().to_string(),
                base_price: ps[0],
                quantity: 1.0,
                unit: None,
                unit_price: None,
                discount: 0.0,
            });
            continue;
        }

        let Some(current) = drafts.last_mut() else {
            continue; // preamble before the first item
        };

        if is_quantity(&line) {
            if let Some(cap) = qty_re.captures(&line) {
                if let Ok(q) = cap[1].parse::<f64>() {
                    current.quantity = q;
                }
                current.unit = Unit::normalize(&cap[2]);
            }
            if let Some(&up) = ps.last() {
                current.unit_price = Some(up);
            }
            continue;
        }

        if is_offer(&line, &ps) {
            current.discount += ps.iter().filter(|&&p| p < 0.0).sum::<f64>();
            continue;
        }

        // Anything else continues the item name.
        let tail = price_re.replace_all(&line, "");
        current.name.push(' ');
        current.name.push_str(tail.trim());
    }

    drafts.into_iter().map(Draft::finish).collect()
}

impl Draft {
    fn finish(self) -> Product {
        let final_price = round2(self.base_price + self.discount);
        let unit = self.unit.unwrap_or(Unit::Stk);
        Product {
            unit_price: self.unit_price.unwrap_or(final_price / self.quantity),
            amount: Quantity::from_value(self.quantity, unit),
            unit,
            total_price: final_price,
            sku: Some(self.name.clone()),
            name: self.name,
        }
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Europe::Stockholm;

    fn receipt() -> Vec<String> {
        [
            "Coop Varberga",
            " Datum2025-06-0412:48",
            "Kvitto242000-012-24284",
            "Org.Nr556030-5921",
            "Gurka 14,95",
            "x 2STK 7,48",
            "MEDLEMSPRIS RABATT -2,00",
            "Banan EKO 12,77",
            "x 0.512KG 24,95",
            "Total 25,72 SEK",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    #[test]
    fn parses_the_header_fields() {
        let parsed = parse(&receipt(), Stockholm).unwrap();
        let v = &parsed.visit;
        assert_eq!(v.id, "242000-012-24284");
        assert_eq!(v.store, "Coop Varberga");
        assert_eq!(v.total, 25.72);
        assert_eq!(
            v.datetime.format("%Y-%m-%d %H:%M:%S%:z").to_string(),
            "2025-06-04 12:48:00+02:00"
        );
    }

    #[test]
    fn discount_lands_on_the_open_item() {
        let parsed = parse(&receipt(), Stockholm).unwrap();
        let p = &parsed.visit.products;
        assert_eq!(p.len(), 2);

        assert_eq!(p[0].name, "Gurka");
        assert_eq!(p[0].amount, Quantity::Count(2));
        assert_eq!(p[0].unit, Unit::Stk);
        assert_eq!(p[0].unit_price, 7.48);
        assert_eq!(p[0].total_price, 12.95); // 14.95 − 2.00

        assert_eq!(p[1].name, "Banan EKO");
        assert_eq!(p[1].amount, Quantity::Weight(0.512));
        assert_eq!(p[1].unit, Unit::Kg);
        assert_eq!(p[1].unit_price, 24.95);
        assert_eq!(p[1].total_price, 12.77);
    }

    #[test]
    fn continuation_lines_extend_the_name() {
        let mut lines = receipt();
        lines.insert(5, "EKOLOGISK HOLLAND".to_string());
        let parsed = parse(&lines, Stockholm).unwrap();
        assert_eq!(parsed.visit.products[0].name, "Gurka EKOLOGISK HOLLAND");
    }

    #[test]
    fn offer_without_item_context_is_ignored() {
        let mut lines = receipt();
        // Move the discount line before the first item.
        let offer = lines.remove(6);
        lines.insert(4, offer);
        let parsed = parse(&lines, Stockholm).unwrap();
        assert_eq!(parsed.visit.products[0].total_price, 14.95);
    }

    #[test]
    fn unit_defaults_to_pieces() {
        // No quantity line seen for an item: 1 STK at the final price.
        let mut lines = receipt();
        lines.remove(5); // drop Gurka's quantity line
        let parsed = parse(&lines, Stockholm).unwrap();
        assert_eq!(parsed.visit.products[0].unit, Unit::Stk);
        assert_eq!(parsed.visit.products[0].amount, Quantity::Count(1));
        assert_eq!(parsed.visit.products[0].unit_price, 12.95);
    }
}
