//! Coop printed-receipt layout ("starred" prices).
//!
//! Item lines look like
//! `MELLANMJÖLK 1,5% 2STK 13,50* 27,00 25%` — the token before the first
//! starred token carries quantity and unit fused together (`2STK`,
//! `0,512KG`), the starred token is the unit price and the next one the
//! line total.

use super::{Parsed, coop_total, localize, parse_decimal, store_at};
use crate::anchors::{line_containing, require_line};
use crate::error::ParseError;
use crate::model::{Product, Quantity, Unit, Visit};
use crate::segment::join_wrapped;
use chrono::NaiveDateTime;
use chrono_tz::Tz;
use tracing::debug;

pub(super) fn parse(lines: &[String], tz: Tz) -> Result<Parsed, ParseError> {
    let datetime = parse_datetime(lines, tz)?;
    let store = store_at(lines, 1)?;
    let id = receipt_nr(lines)?;
    let total = coop_total(lines)?;

    // Items sit strictly between the date line and the total line.
    let date_ix = require_line(lines, "Datum:")?;
    let total_ix = require_line(lines, "Total")?;

    let mut products = Vec::new();
    let mut unhandled = Vec::new();
    for line in join_wrapped(&lines[date_ix + 1..total_ix]) {
        if line.is_empty() {
            continue;
        }
        if !line.contains('*') {
            // Deposit returns, membership chatter, … — keep for diagnostics.
            debug!(line = %line, "no starred price token — recording as unhandled");
            unhandled.push(line);
            continue;
        }
        products.push(decompose(&line)?);
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
        unhandled,
    })
}

/// `Datum: 2023-12-07 Tid: 13:30:10`, one line, seconds included.
fn parse_datetime(lines: &[String], tz: Tz) -> Result<chrono::DateTime<Tz>, ParseError> {
    let line = line_containing(lines, "Datum:")?;
    let (date_part, time_part) = line
        .split_once(" Tid:")
        .ok_or_else(|| ParseError::BadTimestamp(line.to_string()))?;
    let date = date_part.replace("Datum:", "");
    let stamp = format!("{} {}", date.trim(), time_part.trim());
    let naive = NaiveDateTime::parse_from_str(&stamp, "%Y-%m-%d %H:%M:%S")
        .map_err(|_| ParseError::BadTimestamp(stamp.clone()))?;
    localize(naive, tz)
}

/// `Nr: 2421-012-24284 Ka: 3` — the receipt number sits before the till id.
fn receipt_nr(lines: &[String]) -> Result<String, ParseError> {
    let line = line_containing(lines, "Nr:")?;
    let before_till = line.split(" Ka:").next().unwrap_or(line);
    Ok(before_till.replace("Nr:", "").trim().to_string())
}

fn decompose(line: &str) -> Result<Product, ParseError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();

    // Name runs up to the first starred token; the token just before it is
    // the fused quantity+unit field.
    let mut name = Vec::new();
    let mut qty_field = None;
    for tok in &tokens {
        if tok.contains('*') {
            qty_field = name.pop();
            break;
        }
        name.push(*tok);
    }
    let qty_field = qty_field.ok_or_else(|| ParseError::BadField {
        field: "quantity",
        line: line.to_string(),
    })?;

    let bad = |field: &'static str| ParseError::BadField {
        field,
        line: line.to_string(),
    };
    if tokens.len() < 3 {
        return Err(bad("price columns"));
    }
    let unit_price = parse_decimal(&tokens[tokens.len() - 3].replace('*', ""))
        .ok_or_else(|| bad("unit price"))?;
    let total_price =
        parse_decimal(tokens[tokens.len() - 2]).ok_or_else(|| bad("total price"))?;

    let (amount, unit) = split_quantity(qty_field, line)?;

    Ok(Product {
        name: name.join(" "),
        amount,
        unit,
        total_price,
        unit_price,
        sku: None,
    })
}

/// `2STK` → 2 pieces, `0,512KG` → 0.512 kg. Anything else is a hard error:
/// an unknown unit means the layout assumption no longer holds.
fn split_quantity(field: &str, line: &str) -> Result<(Quantity, Unit), ParseError> {
    if let Some(pos) = field.find("STK") {
        let count = field[..pos]
            .trim()
            .parse::<i64>()
            .map_err(|_| ParseError::BadField {
                field: "piece count",
                line: line.to_string(),
            })?;
        return Ok((Quantity::Count(count), Unit::Stk));
    }
    if let Some(pos) = field.find("KG") {
        let weight = parse_decimal(field[..pos].trim()).ok_or_else(|| ParseError::BadField {
            field: "weight",
            line: line.to_string(),
        })?;
        return Ok((Quantity::Weight(weight), Unit::Kg));
    }
    Err(ParseError::UnknownUnit {
        unit: field.to_string(),
        line: line.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Europe::Stockholm;

    fn receipt() -> Vec<String> {
        [
            "Coop",
            "Coop Konsum Storgatan 12",
            "Nr: 2421-012-24284 Ka: 3",
            "Org.Nr: 556030-5921",
            "Datum: 2023-12-07 Tid: 13:30:10",
            "MELLANMJÖLK 1,5% 2STK 13,50* 27,00 25%",
            "PANT RETUR 2,00",
            "BANAN EKO 0,512KG 24,95* 12,77 12%",
            "Total 39,77 SEK",
            "Tack för besöket!",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    #[test]
    fn parses_the_header_fields() {
        let parsed = parse(&receipt(), Stockholm).unwrap();
        let v = &parsed.visit;
        assert_eq!(v.id, "2421-012-24284");
        assert_eq!(v.store, "Coop Konsum Storgatan 12");
        assert_eq!(v.total, 39.77);
        assert_eq!(
            v.datetime.format("%Y-%m-%d %H:%M:%S%:z").to_string(),
            "2023-12-07 13:30:10+01:00"
        );
    }

    #[test]
    fn decomposes_count_and_weight_items() {
        let parsed = parse(&receipt(), Stockholm).unwrap();
        let p = &parsed.visit.products;
        assert_eq!(p.len(), 2);

        assert_eq!(p[0].name, "MELLANMJÖLK 1,5%");
        assert_eq!(p[0].amount, Quantity::Count(2));
        assert_eq!(p[0].unit, Unit::Stk);
        assert_eq!(p[0].unit_price, 13.5);
        assert_eq!(p[0].total_price, 27.0);

        assert_eq!(p[1].name, "BANAN EKO");
        assert_eq!(p[1].amount, Quantity::Weight(0.512));
        assert_eq!(p[1].unit, Unit::Kg);
    }

    #[test]
    fn starless_lines_are_unhandled_not_fatal() {
        let parsed = parse(&receipt(), Stockholm).unwrap();
        assert_eq!(parsed.unhandled, vec!["PANT RETUR 2,00"]);
    }

    #[test]
    fn unknown_unit_aborts_the_parse() {
        let mut lines = receipt();
        lines[5] = "OST PRÄST 2LÅDA 13,50* 27,00 25%".to_string();
        assert!(matches!(
            parse(&lines, Stockholm),
            Err(ParseError::UnknownUnit { .. })
        ));
    }

    #[test]
    fn missing_total_anchor_is_loud() {
        let lines: Vec<String> = receipt()
            .into_iter()
            .filter(|l| !l.contains("Total"))
            .collect();
        assert!(matches!(
            parse(&lines, Stockholm),
            Err(ParseError::MissingAnchor("Total"))
        ));
    }
}
