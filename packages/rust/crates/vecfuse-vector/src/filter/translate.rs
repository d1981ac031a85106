//! Filter expression translator.
//!
//! Accepts the membership form `<field> in ["a", "b"]` and produces a
//! backend-neutral [`Predicate`]. Anything else is handled by an explicit
//! [`FilterFallback`] policy chosen by the caller.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use vecfuse_types::{FILE_EXTENSION_KEY, FilterFallback, Metadata};

use crate::VectorStoreError;

/// Extensions admitted by the default predicate.
pub const DEFAULT_FILE_EXTENSIONS: &[&str] = &[
    ".ts", ".tsx", ".js", ".jsx", ".py", ".java", ".cpp", ".c", ".h", ".hpp", ".cs", ".go", ".rs",
    ".php", ".rb", ".swift", ".kt", ".scala", ".m", ".mm", ".md", ".markdown", ".ipynb",
];

fn compile_regex(pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(regex) => regex,
        Err(_compile_err) => match Regex::new(r"$^") {
            Ok(fallback) => fallback,
            Err(fallback_err) => panic!("hardcoded fallback regex must compile: {fallback_err}"),
        },
    }
}

static IN_EXPRESSION: LazyLock<Regex> = LazyLock::new(|| {
    compile_regex(r"(?s)^\s*([A-Za-z_][A-Za-z0-9_.]*)\s+(?i:in)\s*\[(.*)\]\s*$")
});

/// Membership predicate: `field` must equal one of `values`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Predicate {
    /// Document field or metadata key
    pub field: String,
    /// Accepted values; empty matches nothing
    pub values: Vec<String>,
}

impl Predicate {
    /// Build a membership predicate.
    #[must_use]
    pub fn new_in<I, S>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// JSON form `{field: {"in": [...]}}`.
    #[must_use]
    pub fn to_json(&self) -> Value {
        self.to_json_for(&self.field)
    }

    /// JSON form keyed by a backend column name instead of the field name.
    #[must_use]
    pub fn to_json_for(&self, key: &str) -> Value {
        let mut map = serde_json::Map::new();
        map.insert(key.to_string(), json!({ "in": self.values }));
        Value::Object(map)
    }

    /// Check a single resolved value. Missing values never match.
    #[must_use]
    pub fn matches_value(&self, value: Option<&Value>) -> bool {
        match value {
            Some(Value::String(s)) => self.values.iter().any(|v| v == s),
            Some(Value::Number(n)) => {
                let rendered = n.to_string();
                self.values.iter().any(|v| *v == rendered)
            }
            Some(Value::Bool(b)) => {
                let rendered = b.to_string();
                self.values.iter().any(|v| *v == rendered)
            }
            _ => false,
        }
    }

    /// Evaluate against a flat metadata mapping.
    #[must_use]
    pub fn matches(&self, flat: &Metadata) -> bool {
        self.matches_value(flat.get(&self.field))
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let quoted: Vec<String> = self
            .values
            .iter()
            .map(|v| format!("\"{}\"", v.replace('\\', "\\\\").replace('"', "\\\"")))
            .collect();
        write!(f, "{} in [{}]", self.field, quoted.join(", "))
    }
}

/// Strictly parse `<field> in [<quoted>, ...]`.
///
/// # Errors
///
/// Returns [`VectorStoreError::InvalidFilterExpression`] when the input does
/// not match the grammar.
pub fn parse_filter(expression: &str) -> Result<Predicate, VectorStoreError> {
    let invalid = || VectorStoreError::InvalidFilterExpression(expression.to_string());
    let captures = IN_EXPRESSION.captures(expression).ok_or_else(invalid)?;
    let field = captures.get(1).ok_or_else(invalid)?.as_str();
    let body = captures.get(2).map_or("", |m| m.as_str());
    let values = parse_quoted_list(body).ok_or_else(invalid)?;
    Ok(Predicate::new_in(field, values))
}

fn parse_quoted_list(body: &str) -> Option<Vec<String>> {
    let mut values = Vec::new();
    let mut chars = body.trim().chars().peekable();
    if chars.peek().is_none() {
        return Some(values);
    }
    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        let quote = match chars.next() {
            Some(q @ ('"' | '\'')) => q,
            _ => return None,
        };
        let mut value = String::new();
        loop {
            match chars.next()? {
                '\\' => value.push(chars.next()?),
                c if c == quote => break,
                c => value.push(c),
            }
        }
        values.push(value);
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        match chars.next() {
            None => return Some(values),
            Some(',') => {}
            Some(_) => return None,
        }
    }
}

/// Translator bound to a default predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterTranslator {
    default_predicate: Predicate,
}

impl Default for FilterTranslator {
    fn default() -> Self {
        Self::with_default_extensions(DEFAULT_FILE_EXTENSIONS.iter().copied())
    }
}

impl FilterTranslator {
    /// Translator falling back to `default_predicate`.
    #[must_use]
    pub const fn new(default_predicate: Predicate) -> Self {
        Self { default_predicate }
    }

    /// Translator whose default restricts `fileExtension` to `extensions`.
    #[must_use]
    pub fn with_default_extensions<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Predicate::new_in(FILE_EXTENSION_KEY, extensions))
    }

    /// The predicate substituted under [`FilterFallback::UseDefault`].
    #[must_use]
    pub const fn default_predicate(&self) -> &Predicate {
        &self.default_predicate
    }

    /// Total translation: unparseable input yields the default predicate.
    #[must_use]
    pub fn translate(&self, expression: &str) -> Predicate {
        parse_filter(expression).unwrap_or_else(|_| {
            log::warn!("Unparseable filter '{expression}', using default predicate");
            self.default_predicate.clone()
        })
    }

    /// Translation with an explicit fallback policy.
    ///
    /// A blank expression means no filter under every policy.
    ///
    /// # Errors
    ///
    /// Returns [`VectorStoreError::InvalidFilterExpression`] only under
    /// [`FilterFallback::Reject`].
    pub fn translate_with_policy(
        &self,
        expression: &str,
        policy: FilterFallback,
    ) -> Result<Option<Predicate>, VectorStoreError> {
        if expression.trim().is_empty() {
            return Ok(None);
        }
        match parse_filter(expression) {
            Ok(predicate) => Ok(Some(predicate)),
            Err(err) => match policy {
                FilterFallback::Reject => Err(err),
                FilterFallback::IgnoreFilter => {
                    log::warn!("Unparseable filter '{expression}', searching without filter");
                    Ok(None)
                }
                FilterFallback::UseDefault => {
                    log::warn!("Unparseable filter '{expression}', using default predicate");
                    Ok(Some(self.default_predicate.clone()))
                }
            },
        }
    }
}

/// Translate with the built-in default predicate. Never fails.
#[must_use]
pub fn translate(expression: &str) -> Predicate {
    FilterTranslator::default().translate(expression)
}

/// Translate with the built-in default predicate and an explicit policy.
///
/// # Errors
///
/// See [`FilterTranslator::translate_with_policy`].
pub fn translate_with_policy(
    expression: &str,
    policy: FilterFallback,
) -> Result<Option<Predicate>, VectorStoreError> {
    FilterTranslator::default().translate_with_policy(expression, policy)
}

/// The built-in default predicate.
#[must_use]
pub fn default_predicate() -> Predicate {
    FilterTranslator::default().default_predicate
}
