//! Printable documents.
//!
//! A [`PrintDocument`] is a neutral description of a page: header fields,
//! tables and summary figures. Builders turn domain data into documents and
//! [`PrintTemplate`] renders any of them as an HTML page laid out for the
//! browser's print-to-PDF.

use std::collections::HashMap;

use askama::Template;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use bakery_core::production::round_figure;
use bakery_core::{ProductId, WasteReason};

use crate::filters;
use crate::models::product::Product;
use crate::models::production::ProductionSheet;
use crate::models::waste::WasteRecord;

/// A label and its value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrintField {
    pub label: String,
    pub value: String,
}

impl PrintField {
    fn new(label: &str, value: impl ToString) -> Self {
        Self {
            label: label.to_string(),
            value: value.to_string(),
        }
    }
}

/// A table column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrintColumn {
    pub label: String,
    /// Right-aligned when numeric.
    pub numeric: bool,
}

impl PrintColumn {
    fn text(label: &str) -> Self {
        Self {
            label: label.to_string(),
            numeric: false,
        }
    }

    fn number(label: &str) -> Self {
        Self {
            label: label.to_string(),
            numeric: true,
        }
    }
}

/// A table of rows, all as wide as `columns`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrintTable {
    pub caption: String,
    pub columns: Vec<PrintColumn>,
    pub rows: Vec<Vec<String>>,
    /// Totals row, if any.
    pub footer: Option<Vec<String>>,
}

/// Description of a printable page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrintDocument {
    pub title: String,
    pub subtitle: Option<String>,
    pub fields: Vec<PrintField>,
    pub tables: Vec<PrintTable>,
    pub summary: Vec<PrintField>,
    pub printed_at: String,
}

/// Inclusive date range of a report. Open ends are allowed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    /// Human-readable description of the range.
    #[must_use]
    pub fn label(&self) -> String {
        match (self.from, self.to) {
            (Some(from), Some(to)) if from == to => format!("{}", from.format(DATE_FORMAT)),
            (Some(from), Some(to)) => {
                format!("{} to {}", from.format(DATE_FORMAT), to.format(DATE_FORMAT))
            }
            (Some(from), None) => format!("From {}", from.format(DATE_FORMAT)),
            (None, Some(to)) => format!("Until {}", to.format(DATE_FORMAT)),
            (None, None) => "All dates".to_string(),
        }
    }
}

/// HTML page rendering a [`PrintDocument`].
#[derive(Template)]
#[template(path = "print/document.html")]
pub struct PrintTemplate {
    pub doc: PrintDocument,
}

const DATE_FORMAT: &str = "%d/%m/%Y";

fn printed_stamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M UTC").to_string()
}

/// Two decimals, as shown for money and weights.
fn amount(value: Decimal) -> String {
    format!("{:.2}", round_figure(value))
}

/// Quantities without trailing zeros.
fn quantity(value: Decimal) -> String {
    value.normalize().to_string()
}

// =============================================================================
// Builders
// =============================================================================

/// Document for one production sheet: its lines and its totals.
#[must_use]
pub fn production_sheet_document(sheet: &ProductionSheet, printed_at: DateTime<Utc>) -> PrintDocument {
    let totals = &sheet.totals;

    let materials = PrintTable {
        caption: "Raw materials".to_string(),
        columns: vec![
            PrintColumn::text("Code"),
            PrintColumn::text("Material"),
            PrintColumn::number("Quantity"),
            PrintColumn::text("Unit"),
            PrintColumn::number("Unit price"),
            PrintColumn::number("Cost"),
        ],
        rows: sheet
            .materials
            .iter()
            .map(|line| {
                vec![
                    line.code.clone(),
                    line.name.clone(),
                    quantity(line.quantity),
                    line.unit.to_string(),
                    amount(line.unit_price),
                    line.to_line().cost().map(amount).unwrap_or_default(),
                ]
            })
            .collect(),
        footer: Some(vec![
            "Total".to_string(),
            String::new(),
            amount(totals.material_weight),
            "kg".to_string(),
            String::new(),
            amount(totals.material_cost),
        ]),
    };

    let products = PrintTable {
        caption: "Products".to_string(),
        columns: vec![
            PrintColumn::text("Code"),
            PrintColumn::text("Product"),
            PrintColumn::number("Quantity"),
            PrintColumn::number("Unit price"),
            PrintColumn::number("Weight (kg)"),
            PrintColumn::number("Amount"),
        ],
        rows: sheet
            .products
            .iter()
            .map(|line| {
                let calc = line.to_line();
                vec![
                    line.code.clone(),
                    line.name.clone(),
                    quantity(line.quantity),
                    amount(line.unit_price),
                    calc.weight().map(amount).unwrap_or_default(),
                    calc.amount().map(amount).unwrap_or_default(),
                ]
            })
            .collect(),
        footer: Some(vec![
            "Total".to_string(),
            String::new(),
            quantity(totals.production_quantity),
            String::new(),
            amount(totals.production_weight),
            amount(totals.production_amount),
        ]),
    };

    let mut fields = vec![
        PrintField::new("Production date", sheet.production_date.format(DATE_FORMAT)),
        PrintField::new("Responsible", &sheet.responsible),
    ];
    if let Some(notes) = sheet.notes.as_deref().filter(|n| !n.trim().is_empty()) {
        fields.push(PrintField::new("Notes", notes));
    }

    PrintDocument {
        title: format!("Production sheet #{}", sheet.id),
        subtitle: Some(sheet.production_date.format(DATE_FORMAT).to_string()),
        fields,
        tables: vec![materials, products],
        summary: vec![
            PrintField::new("Material weight (kg)", amount(totals.material_weight)),
            PrintField::new("Material cost", amount(totals.material_cost)),
            PrintField::new("Production weight (kg)", amount(totals.production_weight)),
            PrintField::new("Production amount", amount(totals.production_amount)),
            PrintField::new("Weight difference (kg)", amount(totals.weight_difference)),
            PrintField::new("Profitability rate", format!("{} %", amount(totals.profitability_rate))),
        ],
        printed_at: printed_stamp(printed_at),
    }
}

/// Document listing waste records over a date range, valued at current prices.
///
/// Records whose product is no longer in `products` are listed with their ID
/// and no value.
#[must_use]
pub fn waste_report_document(
    records: &[WasteRecord],
    products: &[Product],
    range: DateRange,
    printed_at: DateTime<Utc>,
) -> PrintDocument {
    let by_id: HashMap<ProductId, &Product> = products.iter().map(|p| (p.id, p)).collect();

    let mut total_quantity = Decimal::ZERO;
    let mut total_value = Decimal::ZERO;
    let mut by_reason: Vec<(WasteReason, Decimal)> = Vec::new();

    let rows = records
        .iter()
        .map(|record| {
            let product = by_id.get(&record.product_id);
            let value = product.map(|p| record.quantity * p.unit_price);

            total_quantity += record.quantity;
            total_value += value.unwrap_or_default();
            match by_reason.iter_mut().find(|(reason, _)| *reason == record.reason) {
                Some((_, qty)) => *qty += record.quantity,
                None => by_reason.push((record.reason, record.quantity)),
            }

            vec![
                record.recorded_at.format(DATE_FORMAT).to_string(),
                product.map_or_else(|| format!("#{}", record.product_id), |p| p.name.clone()),
                record.reason.label().to_string(),
                quantity(record.quantity),
                value.map(amount).unwrap_or_default(),
                record.operator.clone(),
            ]
        })
        .collect();

    let table = PrintTable {
        caption: "Waste".to_string(),
        columns: vec![
            PrintColumn::text("Date"),
            PrintColumn::text("Product"),
            PrintColumn::text("Reason"),
            PrintColumn::number("Quantity"),
            PrintColumn::number("Value"),
            PrintColumn::text("Operator"),
        ],
        rows,
        footer: Some(vec![
            "Total".to_string(),
            String::new(),
            String::new(),
            quantity(total_quantity),
            amount(total_value),
            String::new(),
        ]),
    };

    by_reason.sort_by_key(|(reason, _)| reason.label());
    let mut summary = vec![
        PrintField::new("Records", records.len()),
        PrintField::new("Quantity wasted", quantity(total_quantity)),
        PrintField::new("Value wasted", amount(total_value)),
    ];
    summary.extend(
        by_reason
            .into_iter()
            .map(|(reason, qty)| PrintField::new(reason.label(), quantity(qty))),
    );

    PrintDocument {
        title: "Waste report".to_string(),
        subtitle: Some(range.label()),
        fields: vec![PrintField::new("Period", range.label())],
        tables: vec![table],
        summary,
        printed_at: printed_stamp(printed_at),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    use bakery_core::{
        CompanyId, ProductionSheetId, RawMaterialId, SheetTotals, UnitOfMeasure,
    };

    use super::*;
    use crate::models::production::{SheetMaterialLine, SheetProductLine};
    use crate::offline::tests::{product, waste};

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 2, 9, 15, 0).unwrap()
    }

    fn sheet() -> ProductionSheet {
        ProductionSheet {
            id: ProductionSheetId::new(12),
            company_id: CompanyId::new(1),
            production_date: NaiveDate::from_ymd_opt(2026, 4, 1).unwrap(),
            responsible: "Paul".to_string(),
            notes: Some("   ".to_string()),
            totals: SheetTotals {
                material_weight: dec!(10.50),
                material_cost: dec!(12.00),
                production_quantity: dec!(40),
                production_weight: dec!(10.00),
                production_amount: dec!(48.00),
                profitability_rate: dec!(75.00),
                weight_difference: dec!(-0.50),
            },
            materials: vec![SheetMaterialLine {
                raw_material_id: RawMaterialId::new(1),
                code: "FLOUR".to_string(),
                name: "Flour T65".to_string(),
                quantity: dec!(10.000),
                unit_price: dec!(1.2),
                unit: UnitOfMeasure::Kilogram,
            }],
            products: vec![SheetProductLine {
                product_id: ProductId::new(1),
                code: "BAG".to_string(),
                name: "Baguette".to_string(),
                quantity: dec!(40),
                unit_price: dec!(1.20),
                weight_per_unit: dec!(0.25),
            }],
            created_at: at(),
            updated_at: at(),
        }
    }

    #[test]
    fn test_production_sheet_document() {
        let doc = production_sheet_document(&sheet(), at());

        assert_eq!(doc.title, "Production sheet #12");
        assert_eq!(doc.subtitle.as_deref(), Some("01/04/2026"));
        // Blank notes are left out.
        assert_eq!(doc.fields.len(), 2);
        assert_eq!(doc.tables.len(), 2);

        let materials = &doc.tables[0];
        assert_eq!(materials.rows[0], ["FLOUR", "Flour T65", "10", "kg", "1.20", "12.00"]);
        assert_eq!(materials.footer.as_ref().unwrap()[5], "12.00");

        let products = &doc.tables[1];
        assert_eq!(products.rows[0][4], "10.00");
        assert_eq!(products.rows[0][5], "48.00");

        let rate = doc.summary.iter().find(|f| f.label == "Profitability rate").unwrap();
        assert_eq!(rate.value, "75.00 %");
        assert_eq!(doc.printed_at, "2026-04-02 09:15 UTC");
    }

    #[test]
    fn test_waste_report_document() {
        let products = vec![product(1, 1, "Baguette", dec!(0)), product(1, 2, "Croissant", dec!(0))];
        let mut damaged = waste(1, 2, dec!(3));
        damaged.reason = WasteReason::Damaged;
        let orphan = waste(1, 9, dec!(1));
        let records = vec![waste(1, 1, dec!(5)), damaged, orphan];

        let day = NaiveDate::from_ymd_opt(2026, 1, 10).unwrap();
        let range = DateRange {
            from: Some(day),
            to: Some(day),
        };
        let doc = waste_report_document(&records, &products, range, at());

        assert_eq!(doc.subtitle.as_deref(), Some("10/01/2026"));
        let table = &doc.tables[0];
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.rows[0][1], "Baguette");
        assert_eq!(table.rows[0][4], "6.00");
        assert_eq!(table.rows[2][1], "#9");
        assert_eq!(table.rows[2][4], "");

        let footer = table.footer.as_ref().unwrap();
        assert_eq!(footer[3], "9");
        assert_eq!(footer[4], "9.60");

        let labels: Vec<&str> = doc.summary.iter().map(|f| f.label.as_str()).collect();
        assert_eq!(
            labels,
            ["Records", "Quantity wasted", "Value wasted", "Damaged", "Expired"]
        );
    }

    #[test]
    fn test_date_range_labels() {
        let a = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let b = NaiveDate::from_ymd_opt(2026, 3, 31).unwrap();
        assert_eq!(DateRange { from: Some(a), to: Some(b) }.label(), "01/03/2026 to 31/03/2026");
        assert_eq!(DateRange { from: Some(a), to: None }.label(), "From 01/03/2026");
        assert_eq!(DateRange::default().label(), "All dates");
    }

    #[test]
    fn test_template_renders_document() {
        let html = PrintTemplate {
            doc: production_sheet_document(&sheet(), at()),
        }
        .render()
        .unwrap();

        assert!(html.contains("Production sheet #12"));
        assert!(html.contains("Flour T65"));
        assert!(html.contains("75.00 %"));
        assert!(html.contains(r#"<th class="text">Material</th>"#));
        assert!(html.contains(r#"<th class="num">Cost</th>"#));
    }
}
