//! Named-parameter template handling.
//!
//! Templates carry `:name` placeholders. The scanner walks the SQL once,
//! skipping string literals, quoted identifiers, comments, and `::` casts,
//! so only real placeholders are bound. Values are handed to the dialect
//! adapter as bound parameters; they are never spliced into the SQL text.

use crate::error::{CoreError, CoreResult};
use crate::services::database::types::{NamedParam, ParamValue};

/// One `:name` occurrence inside a template.
#[derive(Debug, Clone, PartialEq)]
pub struct Placeholder {
    pub name: String,
    pub start: usize,
    pub end: usize,
}

/// Native placeholder syntax of the target backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `$1`, `$2`, ... (PostgreSQL)
    Numbered,
    /// `?` per occurrence (SQLite)
    Question,
}

/// Find every bindable `:name` occurrence, in text order.
pub fn scan_placeholders(sql: &str) -> Vec<Placeholder> {
    let chars: Vec<(usize, char)> = sql.char_indices().collect();
    let mut placeholders = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (pos, c) = chars[i];
        match c {
            // String literal with '' escaping
            '\'' => {
                i += 1;
                while i < chars.len() {
                    if chars[i].1 == '\'' {
                        if i + 1 < chars.len() && chars[i + 1].1 == '\'' {
                            i += 2;
                            continue;
                        }
                        break;
                    }
                    i += 1;
                }
            }
            // Quoted identifier
            '"' => {
                i += 1;
                while i < chars.len() && chars[i].1 != '"' {
                    i += 1;
                }
            }
            // Line comment
            '-' if i + 1 < chars.len() && chars[i + 1].1 == '-' => {
                while i < chars.len() && chars[i].1 != '\n' {
                    i += 1;
                }
            }
            // Block comment
            '/' if i + 1 < chars.len() && chars[i + 1].1 == '*' => {
                i += 2;
                while i + 1 < chars.len() && !(chars[i].1 == '*' && chars[i + 1].1 == '/') {
                    i += 1;
                }
                i += 1;
            }
            ':' => {
                // `::` cast, not a placeholder
                if i + 1 < chars.len() && chars[i + 1].1 == ':' {
                    i += 2;
                    continue;
                }
                if i + 1 < chars.len()
                    && (chars[i + 1].1.is_ascii_alphabetic() || chars[i + 1].1 == '_')
                {
                    let name_start = chars[i + 1].0;
                    let mut j = i + 1;
                    while j < chars.len()
                        && (chars[j].1.is_ascii_alphanumeric() || chars[j].1 == '_')
                    {
                        j += 1;
                    }
                    let end = if j < chars.len() { chars[j].0 } else { sql.len() };
                    placeholders.push(Placeholder {
                        name: sql[name_start..end].to_string(),
                        start: pos,
                        end,
                    });
                    i = j;
                    continue;
                }
            }
            _ => {}
        }
        i += 1;
    }

    placeholders
}

/// Match supplied parameters against the template's placeholders.
///
/// Returns bound values in placeholder occurrence order. Every placeholder
/// must have a matching parameter and every parameter must be used.
pub fn resolve_template(template: &str, params: &[NamedParam]) -> CoreResult<Vec<ParamValue>> {
    let placeholders = scan_placeholders(template);

    if placeholders.is_empty() && !params.is_empty() {
        return Err(CoreError::validation(format!(
            "Template has no placeholders but {} parameter(s) were supplied",
            params.len()
        )));
    }

    let mut values = Vec::with_capacity(placeholders.len());
    for placeholder in &placeholders {
        let param = params
            .iter()
            .find(|p| p.name == placeholder.name)
            .ok_or_else(|| {
                CoreError::validation(format!(
                    "No value supplied for parameter :{}",
                    placeholder.name
                ))
            })?;
        values.push(param.value.clone());
    }

    for param in params {
        if !placeholders.iter().any(|p| p.name == param.name) {
            return Err(CoreError::validation(format!(
                "Parameter '{}' does not appear in the template",
                param.name
            )));
        }
    }

    Ok(values)
}

/// Rewrite `:name` placeholders into the backend's native syntax, keeping
/// occurrence order aligned with the values from [`resolve_template`].
pub fn rewrite_placeholders(sql: &str, style: PlaceholderStyle) -> String {
    let placeholders = scan_placeholders(sql);
    if placeholders.is_empty() {
        return sql.to_string();
    }

    let mut out = String::with_capacity(sql.len());
    let mut cursor = 0;
    for (index, placeholder) in placeholders.iter().enumerate() {
        out.push_str(&sql[cursor..placeholder.start]);
        match style {
            PlaceholderStyle::Numbered => out.push_str(&format!("${}", index + 1)),
            PlaceholderStyle::Question => out.push('?'),
        }
        cursor = placeholder.end;
    }
    out.push_str(&sql[cursor..]);
    out
}
