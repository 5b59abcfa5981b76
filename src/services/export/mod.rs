//! Result-set export.

mod csv;
mod json;

pub use csv::export_to_csv;
pub use json::export_to_json;
