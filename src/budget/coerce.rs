// src/budget/coerce.rs

use super::raw_table::Cell;

/// Outcome of coercing a budget cell to a number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Coerced {
    Value(f64),
    /// Nothing there (empty cell, blank text, NaN).
    Missing,
    /// Text that isn't a number; maps to null, but worth a warning.
    Unparsable,
}

impl Coerced {
    pub fn value(self) -> Option<f64> {
        match self {
            Coerced::Value(v) => Some(v),
            Coerced::Missing | Coerced::Unparsable => None,
        }
    }
}

/// Trim whitespace + strip outer quotes if present.
pub fn clean_str(raw: &str) -> &str {
    let trimmed = raw.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        trimmed[1..trimmed.len() - 1].trim()
    } else {
        trimmed
    }
}

/// Coerce a cell to `f64`. Thousands separators, currency signs and
/// placeholders like `N/A` are not stripped; they make the cell unparsable.
pub fn coerce_numeric(cell: &Cell) -> Coerced {
    match cell {
        Cell::Empty => Coerced::Missing,
        Cell::Number(n) if n.is_finite() => Coerced::Value(*n),
        Cell::Number(_) => Coerced::Missing,
        Cell::Text(s) => {
            let cleaned = clean_str(s);
            if cleaned.is_empty() {
                return Coerced::Missing;
            }
            match cleaned.parse::<f64>() {
                Ok(v) if v.is_finite() => Coerced::Value(v),
                Ok(_) => Coerced::Missing,
                Err(_) => Coerced::Unparsable,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbers_and_numeric_text() {
        assert_eq!(coerce_numeric(&Cell::Number(1500.0)), Coerced::Value(1500.0));
        assert_eq!(coerce_numeric(&Cell::from("1500")), Coerced::Value(1500.0));
        assert_eq!(coerce_numeric(&Cell::from(" 1500.5 ")), Coerced::Value(1500.5));
        assert_eq!(coerce_numeric(&Cell::from("-3e2")), Coerced::Value(-300.0));
    }

    #[test]
    fn test_formatting_artifacts_become_null() {
        assert_eq!(coerce_numeric(&Cell::from("1,200")), Coerced::Unparsable);
        assert_eq!(coerce_numeric(&Cell::from("N/A")), Coerced::Unparsable);
        assert_eq!(coerce_numeric(&Cell::from("$100")), Coerced::Unparsable);
        assert_eq!(coerce_numeric(&Cell::from("1,200")).value(), None);
    }

    #[test]
    fn test_missing_values() {
        assert_eq!(coerce_numeric(&Cell::Empty), Coerced::Missing);
        assert_eq!(coerce_numeric(&Cell::from("")), Coerced::Missing);
        assert_eq!(coerce_numeric(&Cell::from("   ")), Coerced::Missing);
        assert_eq!(coerce_numeric(&Cell::from("NaN")), Coerced::Missing);
        assert_eq!(coerce_numeric(&Cell::Number(f64::NAN)), Coerced::Missing);
    }

    #[test]
    fn test_clean_str() {
        assert_eq!(clean_str("  \"2025-04\" "), "2025-04");
        assert_eq!(clean_str("\""), "\"");
        assert_eq!(clean_str(" x "), "x");
    }
}
