//! Filter expressions: the caller-facing `in` grammar and the Lance SQL
//! rendering used for pushdown.

mod expr;
mod translate;

pub use expr::json_to_lance_where;
pub use translate::{
    DEFAULT_FILE_EXTENSIONS, FilterTranslator, Predicate, default_predicate, parse_filter,
    translate, translate_with_policy,
};
