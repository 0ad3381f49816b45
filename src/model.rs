use chrono::DateTime;
use chrono_tz::Tz;
use serde::{Serialize, Serializer};

/// Unit-of-measure code used on Swedish grocery receipts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Unit {
    /// Piece count ("styck").
    #[serde(rename = "STK")]
    Stk,
    /// Kilogram weight.
    #[serde(rename = "KG")]
    Kg,
}

impl Unit {
    /// Map the unit spellings seen across vendors onto the Coop codes.
    /// ICA prints lowercase `st` / `kg`.
    pub fn normalize(raw: &str) -> Option<Unit> {
        match raw {
            "STK" | "st" => Some(Unit::Stk),
            "KG" | "kg" => Some(Unit::Kg),
            _ => None,
        }
    }
}

/// Purchased quantity: an integer count of pieces or a fractional weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Quantity {
    Count(i64),
    Weight(f64),
}

impl Quantity {
    /// Build from a raw fractional value and its unit. Whole-numbered piece
    /// counts become integers, everything else stays fractional.
    pub fn from_value(value: f64, unit: Unit) -> Quantity {
        if unit == Unit::Stk && value.fract() == 0.0 {
            Quantity::Count(value as i64)
        } else {
            Quantity::Weight(value)
        }
    }

    pub fn as_f64(&self) -> f64 {
        match *self {
            Quantity::Count(n) => n as f64,
            Quantity::Weight(w) => w,
        }
    }
}

impl Serialize for Quantity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match *self {
            Quantity::Count(n) => serializer.serialize_i64(n),
            Quantity::Weight(w) => serializer.serialize_f64(w),
        }
    }
}

/// One purchased line item.
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub name: String,
    pub amount: Quantity,
    pub unit: Unit,
    #[serde(rename = "totalPrice")]
    pub total_price: f64,
    #[serde(rename = "unitPrice")]
    pub unit_price: f64,
    /// Article number where the layout carries one (ICA), or the product
    /// name as a stand-in (Coop v2).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
}

/// One receipt transaction ("kvitto").
#[derive(Debug, Clone, Serialize)]
pub struct Visit {
    /// Receipt number, possibly synthesized from org.nr + date + counter.
    pub id: String,
    #[serde(serialize_with = "serialize_local")]
    pub datetime: DateTime<Tz>,
    pub store: String,
    pub products: Vec<Product>,
    pub total: f64,
    /// Only populated in batch mode.
    #[serde(rename = "sourcePdf", skip_serializing_if = "Option::is_none")]
    pub source_pdf: Option<String>,
}

impl Visit {
    /// Sum of the item totals. Only approximately equal to `self.total`:
    /// discount rows the decomposer skipped are missing from it.
    pub fn products_total(&self) -> f64 {
        self.products.iter().map(|p| p.total_price).sum()
    }
}

/// `2024-11-02 18:21:00+01:00` — local wall time with offset, matching the
/// format the downstream importer expects.
fn serialize_local<S: Serializer>(dt: &DateTime<Tz>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&dt.format("%Y-%m-%d %H:%M:%S%:z").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Europe::Stockholm;

    #[test]
    fn quantity_serializes_count_as_integer() {
        assert_eq!(serde_json::to_string(&Quantity::Count(3)).unwrap(), "3");
        assert_eq!(
            serde_json::to_string(&Quantity::Weight(0.512)).unwrap(),
            "0.512"
        );
    }

    #[test]
    fn whole_piece_counts_collapse_to_integers() {
        assert_eq!(Quantity::from_value(4.0, Unit::Stk), Quantity::Count(4));
        assert_eq!(Quantity::from_value(0.5, Unit::Kg), Quantity::Weight(0.5));
    }

    #[test]
    fn visit_serializes_expected_keys() {
        let visit = Visit {
            id: "2421-012".into(),
            datetime: Stockholm.with_ymd_and_hms(2023, 12, 7, 13, 30, 10).unwrap(),
            store: "Coop Konsum".into(),
            products: vec![Product {
                name: "MELLANMJÖLK".into(),
                amount: Quantity::Count(2),
                unit: Unit::Stk,
                total_price: 27.0,
                unit_price: 13.5,
                sku: None,
            }],
            total: 27.0,
            source_pdf: None,
        };
        let json = serde_json::to_value(&visit).unwrap();
        assert_eq!(json["datetime"], "2023-12-07 13:30:10+01:00");
        assert_eq!(json["products"][0]["unit"], "STK");
        assert_eq!(json["products"][0]["totalPrice"], 27.0);
        // sku and sourcePdf are absent, not null
        assert!(json["products"][0].get("sku").is_none());
        assert!(json.get("sourcePdf").is_none());
    }
}
