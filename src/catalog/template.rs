//! Parameterised SQL statement templates
//!
//! A template keeps the static shape of a statement separate from the values
//! substituted into it. Placeholders are written `{name}`; every placeholder
//! must be bound exactly once and every binding must name a placeholder.
//! Literal values are rendered as quoted SQL strings with embedded quotes
//! doubled, and the rendered text is lexed to make sure it is still a single
//! statement.

use once_cell::sync::Lazy;
use regex::Regex;
use sqlparser::dialect::GenericDialect;
use sqlparser::tokenizer::{Token, Tokenizer};

use super::CatalogError;

static RE_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([a-z_][a-z0-9_]*)\}").expect("Invalid regex"));

/// A value bound into a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    /// Rendered as a single-quoted string literal
    Literal(String),
    /// Rendered verbatim; only for identifiers the catalog itself owns
    Ident(String),
}

impl SqlValue {
    pub fn literal(value: impl Into<String>) -> Self {
        SqlValue::Literal(value.into())
    }

    pub fn ident(value: impl Into<String>) -> Self {
        SqlValue::Ident(value.into())
    }

    fn render(&self) -> String {
        match self {
            SqlValue::Literal(v) => format!("'{}'", unquote(v).replace('\'', "''")),
            SqlValue::Ident(v) => v.clone(),
        }
    }
}

/// Strip one pair of surrounding single quotes, if present
///
/// Configuration files conventionally store S3 locations pre-quoted
/// (`'s3://bucket/key'`); both spellings render to the same literal.
pub fn unquote(value: &str) -> &str {
    let trimmed = value.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('\'') && trimmed.ends_with('\'') {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    }
}

/// Static statement shape with named placeholders
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqlTemplate {
    name: &'static str,
    shape: &'static str,
}

impl SqlTemplate {
    pub const fn new(name: &'static str, shape: &'static str) -> Self {
        Self { name, shape }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Placeholder names in order of first appearance
    pub fn placeholders(&self) -> Vec<&'static str> {
        let shape: &'static str = self.shape;
        let mut names: Vec<&'static str> = Vec::new();
        for caps in RE_PLACEHOLDER.captures_iter(shape) {
            if let Some(m) = caps.get(1) {
                let name = m.as_str();
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// Substitute every placeholder and check the result
    pub fn render(&self, bindings: &[(&str, SqlValue)]) -> Result<String, CatalogError> {
        let placeholders = self.placeholders();

        for (key, _) in bindings {
            if !placeholders.iter().any(|p| *p == *key) {
                return Err(CatalogError::UnknownPlaceholder {
                    template: self.name,
                    placeholder: key.to_string(),
                });
            }
        }
        for placeholder in &placeholders {
            if !bindings.iter().any(|(key, _)| key == placeholder) {
                return Err(CatalogError::UnboundPlaceholder {
                    template: self.name,
                    placeholder: placeholder.to_string(),
                });
            }
        }

        let rendered = RE_PLACEHOLDER
            .replace_all(self.shape, |caps: &regex::Captures| {
                let key = &caps[1];
                bindings
                    .iter()
                    .find(|(k, _)| *k == key)
                    .map(|(_, v)| v.render())
                    .unwrap_or_default()
            })
            .into_owned();

        ensure_single_statement(self.name, &rendered)?;
        Ok(rendered)
    }
}

/// Reject text that does not lex, or that lexes as more than one statement
fn ensure_single_statement(template: &'static str, sql: &str) -> Result<(), CatalogError> {
    let dialect = GenericDialect {};
    let tokens = Tokenizer::new(&dialect, sql)
        .tokenize()
        .map_err(|e| CatalogError::MalformedStatement {
            template,
            message: e.to_string(),
        })?;

    let significant: Vec<&Token> = tokens
        .iter()
        .filter(|t| !matches!(t, Token::Whitespace(_)))
        .collect();

    let terminators = significant
        .iter()
        .filter(|t| matches!(t, Token::SemiColon))
        .count();
    let ends_with_terminator = matches!(significant.last(), Some(Token::SemiColon));

    if terminators > 1 || (terminators == 1 && !ends_with_terminator) {
        return Err(CatalogError::MalformedStatement {
            template,
            message: "rendered text contains more than one statement".to_string(),
        });
    }

    Ok(())
}
