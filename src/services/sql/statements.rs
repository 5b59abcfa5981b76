//! Statement location within a multi-statement editor buffer.
//!
//! Backs run-statement-at-cursor: finds each statement's byte and line
//! range via tree-sitter, falling back to semicolon splitting when the
//! buffer is too broken to parse.

use serde::{Deserialize, Serialize};
use tree_sitter::{Node, Parser, Tree};

use crate::services::database::{StatementEffect, classify_statement};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatementSpan {
    pub start_byte: usize,
    pub end_byte: usize,
    pub start_line: usize,
    pub end_line: usize,
    pub text: String,
    pub effect: StatementEffect,
}

impl StatementSpan {
    pub fn contains(&self, offset: usize) -> bool {
        offset >= self.start_byte && offset <= self.end_byte
    }
}

pub struct StatementLocator {
    parser: Parser,
}

const STATEMENT_KINDS: [&str; 8] = [
    "select_statement",
    "insert_statement",
    "update_statement",
    "delete_statement",
    "create_statement",
    "drop_statement",
    "alter_statement",
    "statement",
];

impl StatementLocator {
    pub fn new() -> Self {
        let mut parser = Parser::new();
        let language = tree_sitter_sequel::LANGUAGE.into();
        parser.set_language(&language).unwrap();

        Self { parser }
    }

    /// Locate every statement in the buffer, in document order.
    pub fn locate(&mut self, sql: &str) -> Vec<StatementSpan> {
        let tree = match self.parser.parse(sql, None) {
            Some(tree) => tree,
            None => return Vec::new(),
        };

        let mut spans = Vec::new();
        self.walk_tree(&tree, sql, &mut spans);

        if spans.is_empty() {
            fallback_semicolon_split(sql, &mut spans);
        }

        spans
    }

    /// The statement under the cursor, if any.
    pub fn statement_at(&mut self, sql: &str, offset: usize) -> Option<StatementSpan> {
        self.locate(sql)
            .into_iter()
            .find(|span| span.contains(offset))
    }

    fn walk_tree(&self, tree: &Tree, source: &str, spans: &mut Vec<StatementSpan>) {
        self.visit_node(&tree.root_node(), source, spans);
    }

    fn visit_node(&self, node: &Node, source: &str, spans: &mut Vec<StatementSpan>) {
        if STATEMENT_KINDS.contains(&node.kind()) {
            let text = node
                .utf8_text(source.as_bytes())
                .unwrap_or("")
                .trim()
                .to_string();
            if !text.is_empty() && !text.starts_with("--") {
                spans.push(StatementSpan {
                    start_byte: node.start_byte(),
                    end_byte: node.end_byte(),
                    start_line: node.start_position().row,
                    end_line: node.end_position().row,
                    effect: classify_statement(&text),
                    text,
                });
            }
            // A matched statement owns its subtree; nested selects are not
            // reported separately
            return;
        }

        for i in 0..node.child_count() {
            if let Some(child) = node.child(i) {
                self.visit_node(&child, source, spans);
            }
        }
    }
}

impl Default for StatementLocator {
    fn default() -> Self {
        Self::new()
    }
}

fn fallback_semicolon_split(source: &str, spans: &mut Vec<StatementSpan>) {
    let mut current = String::new();
    let mut statement_start_line = 0;
    let mut statement_start_byte = 0;
    let mut byte_offset = 0;

    for (line_index, line) in source.lines().enumerate() {
        if current.trim().is_empty() {
            statement_start_line = line_index;
            statement_start_byte = byte_offset;
        }

        current.push_str(line);
        current.push('\n');

        if line.trim().ends_with(';') && !line.trim().starts_with("--") {
            let text = current.trim().to_string();
            if !text.is_empty() {
                spans.push(StatementSpan {
                    start_byte: statement_start_byte,
                    end_byte: byte_offset + line.len(),
                    start_line: statement_start_line,
                    end_line: line_index,
                    effect: classify_statement(&text),
                    text,
                });
            }
            current.clear();
        }

        byte_offset += line.len() + 1;
    }

    if !current.trim().is_empty() {
        let text = current.trim().to_string();
        spans.push(StatementSpan {
            start_byte: statement_start_byte,
            end_byte: source.len(),
            start_line: statement_start_line,
            end_line: source.lines().count().saturating_sub(1),
            effect: classify_statement(&text),
            text,
        });
    }
}
