//! Domain models for the bakery back-office.
//!
//! Models are plain data: repositories turn database rows into them, routes
//! serialize them, and the offline cache stores them as JSON payloads.

pub mod product;
pub mod production;
pub mod raw_material;
pub mod waste;

pub use product::{
    CreateProductInput, Product, StockAdjustment, UpdateProductInput, consolidate_adjustments,
};
pub use production::{
    CreateProductionSheetInput, LineResolutionError, MaterialLineInput, ProductLineInput,
    ProductionSheet, ProductionSheetFilter, ProductionSheetSummary, SheetMaterialLine,
    SheetProductLine, TotalsRequest, resolve_material_lines, resolve_product_lines,
};
pub use raw_material::{
    ChangePriceInput, CreateRawMaterialInput, PriceChange, RawMaterial, RawMaterialFilter,
    RawMaterialWithHistory, UpdateRawMaterialInput,
};
pub use waste::{CreateWasteInput, WasteEntryResult, WasteFilter, WasteRecord, stock_movements};
