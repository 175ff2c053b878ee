use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::path::Path;
use thiserror::Error;

use crate::Amount;
use crate::engine::CartEngine;
use crate::model::{CartAction, Coupon, Product};
use crate::pricing::StoreConfig;
use crate::store::KeyValueStore;

/// Errors that can occur when reading actions or writing the cart
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("failed to open csv file: {0}")]
    Open(csv::Error),

    #[error("line {line}: failed to parse row: {source}")]
    Parse { line: usize, source: csv::Error },

    #[error("line {line}: unrecognized action type '{action}'")]
    UnrecognizedType { line: usize, action: String },

    #[error("line {line}: {action} missing {field}")]
    MissingField {
        line: usize,
        action: &'static str,
        field: &'static str,
    },

    #[error("line {line}: invalid {field} '{value}'")]
    InvalidValue {
        line: usize,
        field: &'static str,
        value: String,
    },

    #[error("failed to write csv: {0}")]
    Write(#[from] csv::Error),

    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Deserialize)]
struct InputRow {
    r#type: String,
    product: Option<String>,
    name: Option<String>,
    price: Option<f64>,
    color: Option<String>,
    quantity: Option<i64>,
    new_color: Option<String>,
    code: Option<String>,
    discount_type: Option<String>,
    amount: Option<f64>,
    min_order: Option<f64>,
}

#[derive(Debug, Serialize)]
struct ItemRow<'a> {
    product: &'a str,
    name: &'a str,
    color: &'a str,
    quantity: u32,
    unit_price: String,
    line_total: String,
}

#[derive(Debug, Serialize)]
struct SummaryRow<'a> {
    subtotal: String,
    discount: String,
    delivery_fee: String,
    grand_total: String,
    coupon: &'a str,
}

const ITEM_HEADERS: [&str; 6] = [
    "product",
    "name",
    "color",
    "quantity",
    "unit_price",
    "line_total",
];

const SUMMARY_HEADERS: [&str; 5] = [
    "subtotal",
    "discount",
    "delivery_fee",
    "grand_total",
    "coupon",
];

fn require<T>(
    value: Option<T>,
    line: usize,
    action: &'static str,
    field: &'static str,
) -> Result<T, CsvError> {
    value.ok_or(CsvError::MissingField {
        line,
        action,
        field,
    })
}

fn amount(value: f64, line: usize, field: &'static str) -> Result<Amount, CsvError> {
    if value.is_finite() && value >= 0.0 {
        Ok(Amount::from_float(value))
    } else {
        Err(CsvError::InvalidValue {
            line,
            field,
            value: value.to_string(),
        })
    }
}

impl InputRow {
    fn into_action(self, line: usize) -> Result<CartAction, CsvError> {
        match self.r#type.as_str() {
            "add" => {
                let id = require(self.product, line, "add", "product")?;
                let price = require(self.price, line, "add", "price")?;
                let name = self.name.unwrap_or_else(|| id.clone());
                Ok(CartAction::Add {
                    product: Product::new(id, name, amount(price, line, "price")?),
                    color: self.color,
                })
            }
            "quantity" => Ok(CartAction::SetQuantity {
                product_id: require(self.product, line, "quantity", "product")?,
                color: self.color,
                quantity: require(self.quantity, line, "quantity", "quantity")?,
            }),
            "recolor" => Ok(CartAction::Recolor {
                product_id: require(self.product, line, "recolor", "product")?,
                from: self.color,
                to: self.new_color,
            }),
            "remove" => Ok(CartAction::Remove {
                product_id: require(self.product, line, "remove", "product")?,
                color: self.color,
            }),
            "clear" => Ok(CartAction::Clear),
            "coupon" => {
                let code = require(self.code, line, "coupon", "code")?;
                let kind = require(self.discount_type, line, "coupon", "discount_type")?;
                let value = amount(
                    require(self.amount, line, "coupon", "amount")?,
                    line,
                    "amount",
                )?;
                let min_order = amount(self.min_order.unwrap_or(0.0), line, "min_order")?;
                let coupon = match kind.as_str() {
                    "flat" => Coupon::flat(&code, value, min_order),
                    "percentage" => Coupon::percentage(&code, value, min_order),
                    _ => {
                        return Err(CsvError::InvalidValue {
                            line,
                            field: "discount_type",
                            value: kind,
                        });
                    }
                };
                Ok(CartAction::ApplyCoupon(coupon))
            }
            "uncoupon" => Ok(CartAction::RemoveCoupon),
            other => Err(CsvError::UnrecognizedType {
                line,
                action: other.to_string(),
            }),
        }
    }
}

/// Read cart actions from a csv file
pub fn read_actions(
    path: impl AsRef<Path>,
) -> Result<impl Iterator<Item = Result<CartAction, CsvError>>, CsvError> {
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .map_err(CsvError::Open)?;

    Ok(reader
        .into_deserialize::<InputRow>()
        .enumerate()
        .map(|(idx, result)| {
            let line = idx + 2; // 1-indexed, skip header
            let row = result.map_err(|source| CsvError::Parse { line, source })?;
            row.into_action(line)
        }))
}

/// Write the cart lines, a blank line, then the totals
pub fn write_cart<S: KeyValueStore>(
    mut out: impl io::Write,
    engine: &CartEngine<S>,
    config: &StoreConfig,
) -> Result<(), CsvError> {
    {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(&mut out);
        writer.write_record(ITEM_HEADERS)?;
        for item in engine.items() {
            writer.serialize(ItemRow {
                product: &item.product.id,
                name: &item.product.name,
                color: item.selected_color.as_deref().unwrap_or(""),
                quantity: item.quantity,
                unit_price: item.product.price.to_string(),
                line_total: item.line_total().to_string(),
            })?;
        }
        writer.flush()?;
    }

    writeln!(out)?;

    let delivery_fee = config.delivery_fee_for(engine.total_amount());
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(&mut out);
    writer.write_record(SUMMARY_HEADERS)?;
    writer.serialize(SummaryRow {
        subtotal: engine.total_amount().to_string(),
        discount: engine.discount().to_string(),
        delivery_fee: delivery_fee.to_string(),
        grand_total: engine.grand_total(delivery_fee).to_string(),
        coupon: engine.coupon().map(|c| c.code.as_str()).unwrap_or(""),
    })?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use tempfile::NamedTempFile;

    const HEADER: &str =
        "type,product,name,price,color,quantity,new_color,code,discount_type,amount,min_order\n";

    fn write_csv(rows: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(HEADER.as_bytes()).unwrap();
        file.write_all(rows.as_bytes()).unwrap();
        file
    }

    fn read_all(rows: &str) -> Vec<Result<CartAction, CsvError>> {
        let file = write_csv(rows);
        read_actions(file.path()).unwrap().collect()
    }

    #[test]
    fn read_add() {
        let results = read_all("add,p1,Mug,120,Red,,,,,,\n");
        assert_eq!(results.len(), 1);

        match results.into_iter().next().unwrap().unwrap() {
            CartAction::Add { product, color } => {
                assert_eq!(product.id, "p1");
                assert_eq!(product.name, "Mug");
                assert_eq!(product.price, Amount::from_rupees(120));
                assert_eq!(color.as_deref(), Some("Red"));
            }
            other => panic!("expected add, got {other:?}"),
        }
    }

    #[test]
    fn read_add_without_name_uses_id() {
        let results = read_all("add,p1,,120,,,,,,,\n");
        match results.into_iter().next().unwrap().unwrap() {
            CartAction::Add { product, color } => {
                assert_eq!(product.name, "p1");
                assert_eq!(color, None);
            }
            other => panic!("expected add, got {other:?}"),
        }
    }

    #[test]
    fn read_negative_quantity() {
        let results = read_all("quantity,p1,,,,-5,,,,,\n");
        assert!(matches!(
            results[0],
            Ok(CartAction::SetQuantity { quantity: -5, .. })
        ));
    }

    #[test]
    fn read_recolor() {
        let results = read_all("recolor,p1,,,Red,,Blue,,,,\n");
        match results.into_iter().next().unwrap().unwrap() {
            CartAction::Recolor {
                product_id,
                from,
                to,
            } => {
                assert_eq!(product_id, "p1");
                assert_eq!(from.as_deref(), Some("Red"));
                assert_eq!(to.as_deref(), Some("Blue"));
            }
            other => panic!("expected recolor, got {other:?}"),
        }
    }

    #[test]
    fn read_coupon() {
        let results = read_all("coupon,,,,,,,save10,percentage,10,500\n");
        match results.into_iter().next().unwrap().unwrap() {
            CartAction::ApplyCoupon(coupon) => {
                assert_eq!(
                    coupon,
                    Coupon::percentage("SAVE10", Amount::from_rupees(10), Amount::from_rupees(500))
                );
            }
            other => panic!("expected coupon, got {other:?}"),
        }
    }

    #[test]
    fn read_with_whitespace() {
        let results = read_all("add , p1 , Mug , 120 , , , , , , , \n");
        assert!(results[0].is_ok());
    }

    #[test]
    fn read_returns_error_for_unknown_type() {
        let results = read_all("teleport,p1,,,,,,,,,\n");
        let err = results[0].as_ref().unwrap_err();
        assert!(matches!(err, CsvError::UnrecognizedType { line: 2, .. }));
    }

    #[test]
    fn read_returns_error_for_missing_price() {
        let results = read_all("add,p1,Mug,,,,,,,,\n");
        let err = results[0].as_ref().unwrap_err();
        assert!(matches!(
            err,
            CsvError::MissingField {
                line: 2,
                field: "price",
                ..
            }
        ));
    }

    #[test]
    fn read_returns_error_for_bad_discount_type() {
        let results = read_all("coupon,,,,,,,X,bogo,10,\n");
        let err = results[0].as_ref().unwrap_err();
        assert!(matches!(
            err,
            CsvError::InvalidValue {
                field: "discount_type",
                ..
            }
        ));
    }

    #[test]
    fn read_returns_error_for_negative_price() {
        let results = read_all("add,p1,Mug,-3,,,,,,,\n");
        assert!(matches!(
            results[0],
            Err(CsvError::InvalidValue { field: "price", .. })
        ));
    }

    #[test]
    fn open_missing_file_fails() {
        assert!(matches!(
            read_actions("/definitely/not/here.csv"),
            Err(CsvError::Open(_))
        ));
    }

    #[test]
    fn write_cart_tables() {
        let mut engine = CartEngine::open(MemoryStore::new());
        engine.add_item(
            Product::new("p1", "Mug", Amount::from_rupees(200)),
            Some("Red"),
        );
        engine.update_quantity("p1", 2, Some("Red"));
        engine.apply_coupon(Coupon::flat("FLAT50", Amount::from_rupees(50), Amount::ZERO));

        let mut out = Vec::new();
        let config = StoreConfig::new(Amount::from_rupees(40), None);
        write_cart(&mut out, &engine, &config).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "product,name,color,quantity,unit_price,line_total\n\
             p1,Mug,Red,2,200.00,400.00\n\
             \n\
             subtotal,discount,delivery_fee,grand_total,coupon\n\
             400.00,50.00,40.00,390.00,FLAT50\n"
        );
    }

    #[test]
    fn write_empty_cart_still_has_headers() {
        let engine = CartEngine::open(MemoryStore::new());
        let mut out = Vec::new();
        write_cart(&mut out, &engine, &StoreConfig::default()).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "product,name,color,quantity,unit_price,line_total\n\
             \n\
             subtotal,discount,delivery_fee,grand_total,coupon\n\
             0.00,0.00,0.00,0.00,\n"
        );
    }
}
