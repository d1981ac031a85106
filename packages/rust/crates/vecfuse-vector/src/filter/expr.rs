//! JSON expression to Lance WHERE clause converter.
//!
//! Converts JSON expression filters to SQL WHERE clauses for native
//! Lance filter pushdown.
//!
//! # Supported Operators
//!
//! | JSON Expression | WHERE Clause |
//! |-----------------|--------------|
//! | `{"file_extension": ".rs"}` | `file_extension = '.rs'` |
//! | `{"file_extension": {"in": [".rs", ".py"]}}` | `file_extension IN ('.rs', '.py')` |
//! | `{"start_line": {"$gt": 10}}` | `start_line > 10` |
//! | `{"start_line": {"$gte": 5}}` | `start_line >= 5` |
//! | `{"end_line": {"$lt": 100}}` | `end_line < 100` |
//! | `{"end_line": {"$lte": 100}}` | `end_line <= 100` |
//! | `{"id": {"$ne": "deleted"}}` | `id != 'deleted'` |

use serde_json::Value;

/// Convert JSON expression to Lance WHERE clause.
///
/// Keys are emitted verbatim, so callers map document fields to column names
/// first. Unsupported operators and value types are skipped.
///
/// # Examples
///
/// ```
/// use vecfuse_vector::filter::json_to_lance_where;
/// use serde_json::json;
///
/// let expr = json!({"file_extension": {"in": [".rs", ".py"]}});
/// assert_eq!(json_to_lance_where(&expr), "file_extension IN ('.rs', '.py')");
/// ```
#[must_use]
pub fn json_to_lance_where(expr: &Value) -> String {
    let Value::Object(map) = expr else {
        return String::new();
    };
    let clauses: Vec<String> = map
        .iter()
        .filter_map(|(key, value)| match value {
            Value::Object(inner) => {
                let (op, operand) = inner.iter().next()?;
                match op.as_str() {
                    "$in" | "in" => in_clause(key, operand),
                    "$gt" | ">" => Some(format!("{key} > {}", sql_literal(operand)?)),
                    "$gte" | ">=" => Some(format!("{key} >= {}", sql_literal(operand)?)),
                    "$lt" | "<" => Some(format!("{key} < {}", sql_literal(operand)?)),
                    "$lte" | "<=" => Some(format!("{key} <= {}", sql_literal(operand)?)),
                    "$ne" | "!=" => Some(format!("{key} != {}", sql_literal(operand)?)),
                    "$eq" | "=" => Some(format!("{key} = {}", sql_literal(operand)?)),
                    _ => None,
                }
            }
            _ => Some(format!("{key} = {}", sql_literal(value)?)),
        })
        .collect();
    clauses.join(" AND ")
}

fn in_clause(key: &str, operand: &Value) -> Option<String> {
    let items = operand.as_array()?;
    if items.is_empty() {
        // `IN ()` is not valid SQL; an empty set matches nothing.
        return Some("FALSE".to_string());
    }
    let literals: Option<Vec<String>> = items.iter().map(sql_literal).collect();
    Some(format!("{key} IN ({})", literals?.join(", ")))
}

/// Render a scalar JSON value as a SQL literal with quotes escaped.
fn sql_literal(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(format!("'{}'", s.replace('\'', "''"))),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
