use anyhow::Result;
use csv::Writer;
use serde_json::Value;

use crate::services::database::{QueryResult, RowMap};

pub fn export_to_csv(result: &QueryResult) -> Result<String> {
    let mut wtr = Writer::from_writer(vec![]);

    // Header row
    wtr.write_record(&result.fields)?;

    // Data rows, in field order
    for row in &result.rows {
        let values: Vec<String> = result
            .fields
            .iter()
            .map(|field| cell_text(row, field))
            .collect();
        wtr.write_record(&values)?;
    }

    let bytes = wtr.into_inner()?;
    Ok(String::from_utf8(bytes)?)
}

fn cell_text(row: &RowMap, field: &str) -> String {
    match row.get(field) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
