//! SQL completion engine.
//!
//! Providers are registered in a fixed priority order: keywords first,
//! then tables, then columns, then value literals. The engine merges
//! their output, dedupes by (label, kind), and caps the list so the
//! editor never renders an unbounded set. No network or database call
//! happens on this path; all schema data comes from the cached snapshot.

pub mod providers;
pub mod token;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::services::database::SchemaSnapshot;

use providers::{
    ClauseKeywordProvider, ColumnNameProvider, StatementKeywordProvider, TableNameProvider,
    ValueLiteralProvider,
};
use token::{Prefix, Token, TokenKind, tokenize, word_prefix_at};

/// Upper bound on suggestions returned per request.
pub const MAX_SUGGESTIONS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionKind {
    Keyword,
    Table,
    Column,
    Value,
}

/// A proposed text insertion at the cursor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub label: String,
    pub kind: SuggestionKind,
    pub insert_text: String,
    pub detail: String,
    /// Start of the range the insertion replaces; never past the cursor
    pub range_start: usize,
}

/// Immutable view of the document and cursor handed to every provider.
pub struct CompletionContext<'a> {
    pub text: &'a str,
    pub offset: usize,
    /// Tokens of the current statement before the partial word at the cursor
    pub tokens: Vec<Token<'a>>,
    pub prefix: Prefix<'a>,
}

impl<'a> CompletionContext<'a> {
    pub fn build(text: &'a str, offset: usize) -> Self {
        let mut offset = offset.min(text.len());
        while offset > 0 && !text.is_char_boundary(offset) {
            offset -= 1;
        }

        let prefix = word_prefix_at(text, offset);
        let all = tokenize(&text[..prefix.start]);
        let statement_start = all
            .iter()
            .rposition(|t| t.kind == TokenKind::Symbol && t.text == ";")
            .map(|i| i + 1)
            .unwrap_or(0);
        let tokens = all[statement_start..].to_vec();

        Self {
            text,
            offset,
            tokens,
            prefix,
        }
    }

    /// Whether the statement already contains the keyword phrase,
    /// case-insensitively. Multi-word phrases match consecutive tokens.
    pub fn has_keyword(&self, phrase: &str) -> bool {
        let words: Vec<&str> = phrase.split_whitespace().collect();
        if words.is_empty() || self.tokens.len() < words.len() {
            return false;
        }
        self.tokens.windows(words.len()).any(|window| {
            window
                .iter()
                .zip(words.iter())
                .all(|(token, word)| token.is_keyword(word))
        })
    }
}

/// One grammatical context worth of suggestions.
pub trait SuggestionProvider: Send + Sync {
    fn propose(
        &self,
        ctx: &CompletionContext<'_>,
        schema: Option<&SchemaSnapshot>,
    ) -> Vec<Suggestion>;
}

pub struct CompletionEngine {
    providers: Vec<Box<dyn SuggestionProvider>>,
}

impl Default for CompletionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletionEngine {
    pub fn new() -> Self {
        Self {
            providers: vec![
                Box::new(StatementKeywordProvider),
                Box::new(ClauseKeywordProvider),
                Box::new(TableNameProvider),
                Box::new(ColumnNameProvider),
                Box::new(ValueLiteralProvider),
            ],
        }
    }

    /// Run every provider over the document and merge their suggestions.
    pub fn complete(
        &self,
        text: &str,
        offset: usize,
        schema: Option<&SchemaSnapshot>,
    ) -> Vec<Suggestion> {
        let ctx = CompletionContext::build(text, offset);
        let mut seen: HashSet<(String, SuggestionKind)> = HashSet::new();
        let mut results = Vec::new();

        for provider in &self.providers {
            for suggestion in provider.propose(&ctx, schema) {
                if results.len() >= MAX_SUGGESTIONS {
                    return results;
                }
                if seen.insert((suggestion.label.clone(), suggestion.kind)) {
                    results.push(suggestion);
                }
            }
        }

        results
    }
}
