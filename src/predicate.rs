//! Whitelisted row-predicate grammar for the structured data query path.
//!
//! The planner model translates a question into a tiny filter expression
//! over the statistics table's columns. That text is never executed: it is
//! checked against a deny-list, parsed into an AST of column comparisons
//! joined by AND/OR/NOT, and interpreted by this module.
//!
//! Grammar (case-insensitive keywords):
//!
//! ```text
//! expr       := and_expr ( ("or" | "||") and_expr )*
//! and_expr   := unary ( ("and" | "&&") unary )*
//! unary      := ("not" | "!")? primary
//! primary    := "(" expr ")" | comparison
//! comparison := column op value
//! column     := quoted string | bare word
//! op         := "contains" | "includes" | "has" | "equals" | "is" | "=" | "==" | "!="
//! value      := quoted string | bare word
//! ```
//!
//! Both sides of every comparison are normalized first: lowercased, hyphens
//! mapped to spaces, whitespace runs collapsed. "Laki - Laki", "laki-laki"
//! and "LAKI LAKI" all compare equal.

use std::collections::HashMap;

/// Rejected predicate text. `Unsafe` means the deny-list fired before any
/// parsing; `Parse` means the text is not in the grammar.
#[derive(Debug)]
pub enum PredicateError {
    Unsafe(String),
    Parse(String),
}

impl std::fmt::Display for PredicateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PredicateError::Unsafe(what) => {
                write!(f, "unsafe content in generated filter: {}", what)
            }
            PredicateError::Parse(msg) => write!(f, "could not parse generated filter: {}", msg),
        }
    }
}

impl std::error::Error for PredicateError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Contains,
    Equals,
    NotEquals,
}

/// Parsed filter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Compare {
        column: String,
        op: CmpOp,
        value: String,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

/// Symbols that would only appear in real code, never in the grammar.
const FORBIDDEN_FRAGMENTS: &[&str] = &[";", "{", "}", "=>", "`", "$("];

/// Identifier deny-list: function keywords and I/O-capable names.
const FORBIDDEN_WORDS: &[&str] = &[
    "function", "lambda", "def", "return", "require", "import", "eval", "exec", "process",
    "child_process", "fs", "readfile", "writefile", "fetch", "http", "https", "system", "spawn",
    "new",
];

/// Scan raw predicate text for content that must never reach the parser.
pub fn validate_safety(raw: &str) -> Result<(), PredicateError> {
    for fragment in FORBIDDEN_FRAGMENTS {
        if raw.contains(fragment) {
            return Err(PredicateError::Unsafe(format!("'{}'", fragment)));
        }
    }

    let lower = raw.to_lowercase();
    for word in lower.split(|c: char| !(c.is_alphanumeric() || c == '_')) {
        if !word.is_empty() && FORBIDDEN_WORDS.contains(&word) {
            return Err(PredicateError::Unsafe(format!("identifier '{}'", word)));
        }
    }

    Ok(())
}

/// Validate and parse predicate text into an executable [`Expr`].
pub fn compile(raw: &str) -> Result<Expr, PredicateError> {
    validate_safety(raw)?;
    let tokens = tokenize(raw)?;
    if tokens.is_empty() {
        return Err(PredicateError::Parse("empty filter".to_string()));
    }
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_or()?;
    if parser.pos != parser.tokens.len() {
        return Err(PredicateError::Parse(format!(
            "unexpected trailing input at token {}",
            parser.pos
        )));
    }
    Ok(expr)
}

/// Lowercase, map hyphens to spaces, collapse whitespace runs.
pub fn normalize(s: &str) -> String {
    s.to_lowercase()
        .replace('-', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

impl Expr {
    /// Evaluate against one row. A column missing from the row compares as
    /// an empty string; evaluation never panics, so a bad predicate can at
    /// worst produce non-matches, never abort a table scan.
    pub fn matches(&self, row: &HashMap<String, String>) -> bool {
        match self {
            Expr::Compare { column, op, value } => {
                let cell = normalize(lookup(row, column));
                let wanted = normalize(value);
                match op {
                    CmpOp::Contains => cell.contains(&wanted),
                    CmpOp::Equals => cell == wanted,
                    CmpOp::NotEquals => cell != wanted,
                }
            }
            Expr::And(a, b) => a.matches(row) && b.matches(row),
            Expr::Or(a, b) => a.matches(row) || b.matches(row),
            Expr::Not(inner) => !inner.matches(row),
        }
    }
}

/// Exact column lookup with a case-insensitive fallback, since the planner
/// occasionally changes header casing.
fn lookup<'a>(row: &'a HashMap<String, String>, column: &str) -> &'a str {
    if let Some(v) = row.get(column) {
        return v;
    }
    let lower = column.to_lowercase();
    row.iter()
        .find(|(k, _)| k.to_lowercase() == lower)
        .map(|(_, v)| v.as_str())
        .unwrap_or("")
}

// ============ Tokenizer ============

#[derive(Debug, Clone, PartialEq)]
enum Token {
    LParen,
    RParen,
    Word(String),
    Quoted(String),
    Eq,
    NotEq,
}

fn tokenize(raw: &str) -> Result<Vec<Token>, PredicateError> {
    let mut tokens = Vec::new();
    let mut chars = raw.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ch if ch.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '"' | '\'' => {
                let quote = c;
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some(ch) if ch == quote => break,
                        Some(ch) => s.push(ch),
                        None => {
                            return Err(PredicateError::Parse("unterminated string".to_string()))
                        }
                    }
                }
                tokens.push(Token::Quoted(s));
            }
            '=' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                }
                tokens.push(Token::Eq);
            }
            '!' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::NotEq);
                } else {
                    tokens.push(Token::Word("not".to_string()));
                }
            }
            '&' => {
                chars.next();
                if chars.next() != Some('&') {
                    return Err(PredicateError::Parse("stray '&'".to_string()));
                }
                tokens.push(Token::Word("and".to_string()));
            }
            '|' => {
                chars.next();
                if chars.next() != Some('|') {
                    return Err(PredicateError::Parse("stray '|'".to_string()));
                }
                tokens.push(Token::Word("or".to_string()));
            }
            ch if ch.is_alphanumeric() || ch == '_' || ch == '-' => {
                let mut word = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_alphanumeric() || ch == '_' || ch == '-' {
                        word.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Word(word));
            }
            other => {
                return Err(PredicateError::Parse(format!(
                    "unexpected character '{}'",
                    other
                )));
            }
        }
    }

    Ok(tokens)
}

// ============ Parser ============

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn peek_keyword(&self, kw: &str) -> bool {
        matches!(self.peek(), Some(Token::Word(w)) if w.eq_ignore_ascii_case(kw))
    }

    fn parse_or(&mut self) -> Result<Expr, PredicateError> {
        let mut left = self.parse_and()?;
        while self.peek_keyword("or") {
            self.next();
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, PredicateError> {
        let mut left = self.parse_unary()?;
        while self.peek_keyword("and") {
            self.next();
            let right = self.parse_unary()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, PredicateError> {
        if self.peek_keyword("not") {
            self.next();
            let inner = self.parse_unary()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, PredicateError> {
        if self.peek() == Some(&Token::LParen) {
            self.next();
            let inner = self.parse_or()?;
            match self.next() {
                Some(Token::RParen) => return Ok(inner),
                _ => return Err(PredicateError::Parse("expected ')'".to_string())),
            }
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, PredicateError> {
        let column = match self.next() {
            Some(Token::Quoted(s)) | Some(Token::Word(s)) => s,
            other => {
                return Err(PredicateError::Parse(format!(
                    "expected a column name, got {:?}",
                    other
                )))
            }
        };

        let op = match self.next() {
            Some(Token::Eq) => CmpOp::Equals,
            Some(Token::NotEq) => CmpOp::NotEquals,
            Some(Token::Word(w)) => match w.to_lowercase().as_str() {
                "contains" | "includes" | "has" => CmpOp::Contains,
                "equals" | "is" => CmpOp::Equals,
                other => {
                    return Err(PredicateError::Parse(format!(
                        "unknown operator '{}'",
                        other
                    )))
                }
            },
            other => {
                return Err(PredicateError::Parse(format!(
                    "expected an operator, got {:?}",
                    other
                )))
            }
        };

        let value = match self.next() {
            Some(Token::Quoted(s)) | Some(Token::Word(s)) => s,
            other => {
                return Err(PredicateError::Parse(format!(
                    "expected a value, got {:?}",
                    other
                )))
            }
        };

        Ok(Expr::Compare { column, op, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn rejects_statement_separator() {
        let err = compile("\"Agama\" = \"islam\"; drop table").unwrap_err();
        assert!(matches!(err, PredicateError::Unsafe(_)));
    }

    #[test]
    fn rejects_function_keywords() {
        for raw in [
            "function(row) true",
            "row => true",
            "lambda row: true",
            "def f",
        ] {
            let err = compile(raw).unwrap_err();
            assert!(matches!(err, PredicateError::Unsafe(_)), "raw: {}", raw);
        }
    }

    #[test]
    fn rejects_io_identifiers() {
        for raw in [
            "require('fs')",
            "import os",
            "eval(x)",
            "process.exit()",
            "fs contains \"x\"",
        ] {
            let err = compile(raw).unwrap_err();
            assert!(matches!(err, PredicateError::Unsafe(_)), "raw: {}", raw);
        }
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            compile("??!"),
            Err(PredicateError::Parse(_)) | Err(PredicateError::Unsafe(_))
        ));
        assert!(matches!(compile(""), Err(PredicateError::Parse(_))));
        assert!(matches!(
            compile("\"Agama\" = \"islam"),
            Err(PredicateError::Parse(_))
        ));
    }

    #[test]
    fn parses_simple_contains() {
        let expr = compile("\"Jenis Kelamin\" contains \"laki-laki\"").unwrap();
        assert_eq!(
            expr,
            Expr::Compare {
                column: "Jenis Kelamin".to_string(),
                op: CmpOp::Contains,
                value: "laki-laki".to_string(),
            }
        );
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let expr =
            compile("\"A\" = \"1\" or \"B\" = \"2\" and \"C\" = \"3\"").unwrap();
        match expr {
            Expr::Or(left, right) => {
                assert!(matches!(*left, Expr::Compare { .. }));
                assert!(matches!(*right, Expr::And(_, _)));
            }
            other => panic!("expected Or at the top, got {:?}", other),
        }
    }

    #[test]
    fn symbolic_operators_parse() {
        assert!(compile("\"Agama\" == \"Islam\" && \"Nama\" != \"Budi\"").is_ok());
        assert!(compile("(\"A\" = \"1\") || (\"B\" = \"2\")").is_ok());
    }

    #[test]
    fn hyphen_space_and_case_forms_match_uniformly() {
        let expr = compile("\"Jenis Kelamin\" contains \"laki-laki\"").unwrap();
        for stored in ["Laki - Laki", "laki-laki", "LAKI LAKI"] {
            assert!(
                expr.matches(&row(&[("Jenis Kelamin", stored)])),
                "stored: {}",
                stored
            );
        }
        assert!(!expr.matches(&row(&[("Jenis Kelamin", "Perempuan")])));
    }

    #[test]
    fn missing_column_is_a_non_match() {
        let expr = compile("\"Pendidikan\" contains \"sma\"").unwrap();
        assert!(!expr.matches(&row(&[("Nama", "Budi")])));
    }

    #[test]
    fn column_lookup_is_case_insensitive() {
        let expr = compile("\"agama\" = \"islam\"").unwrap();
        assert!(expr.matches(&row(&[("Agama", "Islam")])));
    }

    #[test]
    fn not_inverts() {
        let expr = compile("not \"Agama\" = \"islam\"").unwrap();
        assert!(expr.matches(&row(&[("Agama", "Hindu")])));
        assert!(!expr.matches(&row(&[("Agama", "Islam")])));
    }

    #[test]
    fn normalize_collapses_whitespace_and_hyphens() {
        assert_eq!(normalize("  Laki -  Laki "), "laki laki");
        assert_eq!(normalize("laki-laki"), "laki laki");
        assert_eq!(normalize("LAKI LAKI"), "laki laki");
    }
}
