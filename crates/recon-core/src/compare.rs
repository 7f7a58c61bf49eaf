//! Cell comparison strategies
//!
//! Change detection never compares cells directly; it goes through a [`ValueComparator`].
//! [`LooseEquality`] is the strategy used for spreadsheet exports, where the same value may
//! arrive with stray whitespace or as a different scalar type.

use crate::table::CellValue;

/// Decides whether two cells hold the same value
pub trait ValueComparator {
    fn equivalent(&self, a: &CellValue, b: &CellValue) -> bool;
}

/// Null-safe, whitespace-trimmed, stringified equality
///
/// Two empty cells are equal. Otherwise the trimmed display strings are compared, so
/// `Integer(5)` equals `String("5")`, while `Integer(1)` and `Float(1.0)` differ. Cells keep
/// their source text, so `0.10` and `0.1` differ too.
#[derive(Debug, Clone, Copy, Default)]
pub struct LooseEquality;

impl ValueComparator for LooseEquality {
    fn equivalent(&self, a: &CellValue, b: &CellValue) -> bool {
        if a.is_empty() && b.is_empty() {
            return true;
        }
        loose_key(a) == loose_key(b)
    }
}

/// Trimmed string form of a cell, the representation loose equality compares
pub fn loose_key(value: &CellValue) -> String {
    value.to_string_value().trim().to_string()
}
