//! Clinical record services
//!
//! Each submodule groups the operations for one area of the record. Service
//! functions take a `&mut SqliteConnection`, so callers decide whether they
//! run on a pooled connection or inside a transaction.

pub mod catalogs;
pub mod imaging;
pub mod labs;
pub mod medication;
pub mod nursing;
pub mod patients;
pub mod records;
pub mod supplies;

/// Folded form stored in the `*_key` columns. Every case-insensitive match
/// compares against these keys, never against SQL `LOWER`, which leaves
/// non-ASCII letters such as `É` untouched.
pub(crate) fn search_key(text: &str) -> String {
    text.trim().to_lowercase()
}

/// `%term%` pattern for `LIKE` matching against a `*_key` column.
pub(crate) fn contains_pattern(term: &str) -> String {
    format!("%{}%", search_key(term))
}
