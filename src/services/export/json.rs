use anyhow::Result;

use crate::services::database::QueryResult;

/// Render the result rows as a pretty-printed JSON array of objects.
pub fn export_to_json(result: &QueryResult) -> Result<String> {
    Ok(serde_json::to_string_pretty(&result.rows)?)
}
