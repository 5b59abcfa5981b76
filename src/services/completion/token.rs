//! Lightweight SQL token scanner for completion context detection.
//!
//! Not a SQL parser: a single pass that classifies words, quoted
//! identifiers, string literals, numbers, and operator symbols, skipping
//! comments. Enough structure for the suggestion providers to judge the
//! grammatical context at the cursor.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Word,
    QuotedIdent,
    Str,
    Number,
    Symbol,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    /// Raw slice, including quotes for quoted identifiers
    pub text: &'a str,
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
}

impl Token<'_> {
    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Word && self.text.eq_ignore_ascii_case(keyword)
    }

    /// Identifier text with any surrounding quotes stripped
    pub fn ident_text(&self) -> &str {
        if self.kind == TokenKind::QuotedIdent {
            self.text.trim_matches('"')
        } else {
            self.text
        }
    }

    pub fn is_identifier(&self) -> bool {
        matches!(self.kind, TokenKind::Word | TokenKind::QuotedIdent)
    }
}

/// The partial word immediately before the cursor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prefix<'a> {
    /// Byte offset where the replacement range starts (the opening quote
    /// for a quoted prefix)
    pub start: usize,
    /// Typed text without the opening quote
    pub text: &'a str,
    pub quoted: bool,
}

impl Prefix<'_> {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

const TWO_CHAR_SYMBOLS: [&str; 6] = ["<=", ">=", "<>", "!=", "::", "||"];

/// Tokenize the given text. Comments produce no tokens.
pub fn tokenize(text: &str) -> Vec<Token<'_>> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (start, c) = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        // Line comment
        if c == '-' && i + 1 < chars.len() && chars[i + 1].1 == '-' {
            while i < chars.len() && chars[i].1 != '\n' {
                i += 1;
            }
            continue;
        }

        // Block comment
        if c == '/' && i + 1 < chars.len() && chars[i + 1].1 == '*' {
            i += 2;
            while i + 1 < chars.len() && !(chars[i].1 == '*' && chars[i + 1].1 == '/') {
                i += 1;
            }
            i = (i + 2).min(chars.len());
            continue;
        }

        // String literal with '' escaping
        if c == '\'' {
            i += 1;
            while i < chars.len() {
                if chars[i].1 == '\'' {
                    if i + 1 < chars.len() && chars[i + 1].1 == '\'' {
                        i += 2;
                        continue;
                    }
                    i += 1;
                    break;
                }
                i += 1;
            }
            let end = end_offset(&chars, i, text);
            tokens.push(Token {
                text: &text[start..end],
                kind: TokenKind::Str,
                start,
                end,
            });
            continue;
        }

        // Quoted identifier, possibly unterminated at end of input
        if c == '"' {
            i += 1;
            while i < chars.len() && chars[i].1 != '"' {
                i += 1;
            }
            if i < chars.len() {
                i += 1;
            }
            let end = end_offset(&chars, i, text);
            tokens.push(Token {
                text: &text[start..end],
                kind: TokenKind::QuotedIdent,
                start,
                end,
            });
            continue;
        }

        if c.is_ascii_alphabetic() || c == '_' {
            while i < chars.len()
                && (chars[i].1.is_ascii_alphanumeric() || chars[i].1 == '_' || chars[i].1 == '$')
            {
                i += 1;
            }
            let end = end_offset(&chars, i, text);
            tokens.push(Token {
                text: &text[start..end],
                kind: TokenKind::Word,
                start,
                end,
            });
            continue;
        }

        if c.is_ascii_digit() {
            while i < chars.len() && (chars[i].1.is_ascii_digit() || chars[i].1 == '.') {
                i += 1;
            }
            let end = end_offset(&chars, i, text);
            tokens.push(Token {
                text: &text[start..end],
                kind: TokenKind::Number,
                start,
                end,
            });
            continue;
        }

        // Operators: prefer two-character forms
        if i + 1 < chars.len() {
            let pair = &text[start..end_offset(&chars, i + 2, text)];
            if TWO_CHAR_SYMBOLS.contains(&pair) {
                tokens.push(Token {
                    text: pair,
                    kind: TokenKind::Symbol,
                    start,
                    end: end_offset(&chars, i + 2, text),
                });
                i += 2;
                continue;
            }
        }

        let end = end_offset(&chars, i + 1, text);
        tokens.push(Token {
            text: &text[start..end],
            kind: TokenKind::Symbol,
            start,
            end,
        });
        i += 1;
    }

    tokens
}

fn end_offset(chars: &[(usize, char)], index: usize, text: &str) -> usize {
    chars.get(index).map(|(pos, _)| *pos).unwrap_or(text.len())
}

/// Find the partial word being typed at `offset`, if any.
pub fn word_prefix_at(text: &str, offset: usize) -> Prefix<'_> {
    let bytes = text.as_bytes();
    let mut start = offset;
    while start > 0 {
        let b = bytes[start - 1];
        if b.is_ascii_alphanumeric() || b == b'_' {
            start -= 1;
        } else {
            break;
        }
    }

    // A leading double quote makes this a quoted identifier prefix
    if start > 0 && bytes[start - 1] == b'"' {
        return Prefix {
            start: start - 1,
            text: &text[start..offset],
            quoted: true,
        };
    }

    Prefix {
        start,
        text: &text[start..offset],
        quoted: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<TokenKind> {
        tokenize(text).iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_tokenize_basic_statement() {
        let tokens = tokenize("SELECT id FROM users WHERE age >= 21");
        let words: Vec<&str> = tokens.iter().map(|t| t.text).collect();
        assert_eq!(
            words,
            vec!["SELECT", "id", "FROM", "users", "WHERE", "age", ">=", "21"]
        );
        assert_eq!(tokens[6].kind, TokenKind::Symbol);
        assert_eq!(tokens[7].kind, TokenKind::Number);
    }

    #[test]
    fn test_tokenize_skips_comments() {
        assert_eq!(
            kinds("SELECT -- trailing\n1 /* block */ + 2"),
            vec![
                TokenKind::Word,
                TokenKind::Number,
                TokenKind::Symbol,
                TokenKind::Number
            ]
        );
    }

    #[test]
    fn test_tokenize_strings_and_quoted_idents() {
        let tokens = tokenize(r#"SELECT "user name", 'it''s' FROM t"#);
        assert_eq!(tokens[1].kind, TokenKind::QuotedIdent);
        assert_eq!(tokens[1].ident_text(), "user name");
        assert_eq!(tokens[3].kind, TokenKind::Str);
    }

    #[test]
    fn test_keyword_match_is_case_insensitive() {
        let tokens = tokenize("select");
        assert!(tokens[0].is_keyword("SELECT"));
        assert!(!tokens[0].is_keyword("FROM"));
    }

    #[test]
    fn test_word_prefix_plain() {
        let prefix = word_prefix_at("SELECT na", 9);
        assert_eq!(prefix.text, "na");
        assert_eq!(prefix.start, 7);
        assert!(!prefix.quoted);
    }

    #[test]
    fn test_word_prefix_quoted() {
        let text = r#"SELECT * FROM "us"#;
        let prefix = word_prefix_at(text, text.len());
        assert_eq!(prefix.text, "us");
        assert!(prefix.quoted);
        assert_eq!(prefix.start, 14);
    }

    #[test]
    fn test_word_prefix_empty_after_space() {
        let prefix = word_prefix_at("SELECT ", 7);
        assert!(prefix.is_empty());
        assert_eq!(prefix.start, 7);
    }
}
