// src/budget/raw_table.rs

/// Number of leading label columns (metric, payment type, subscription length,
/// company size). Everything after them is a month column.
pub const LABEL_COUNT: usize = 4;

static EMPTY_CELL: Cell = Cell::Empty;

/// A single source cell, before any coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
}

impl Cell {
    /// True for empty cells and whitespace-only text.
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Number(_) => false,
            Cell::Text(s) => s.trim().is_empty(),
        }
    }

    /// Render the cell as a categorical label.
    ///
    /// Integral numbers drop their fractional part, so a spreadsheet `12`
    /// stays `"12"` rather than `"12.0"`.
    pub fn as_label(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Number(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 => {
                format!("{}", *n as i64)
            }
            Cell::Number(n) => n.to_string(),
            Cell::Text(s) => s.trim().to_string(),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

impl From<f64> for Cell {
    fn from(n: f64) -> Self {
        Cell::Number(n)
    }
}

/// A budget sheet as read from the source file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawBudgetTable {
    /// Header row, exactly as the file has it. The first `LABEL_COUNT`
    /// entries are ignored (labels are assigned by position).
    pub headers: Vec<String>,
    /// Data rows. Rows may be shorter than `headers`; missing cells read as empty.
    pub rows: Vec<Vec<Cell>>,
}

impl RawBudgetTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self { headers, rows }
    }

    pub fn num_columns(&self) -> usize {
        self.headers.len()
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Headers of the month columns (everything after the labels).
    pub fn month_headers(&self) -> &[String] {
        self.headers.get(LABEL_COUNT..).unwrap_or(&[])
    }

    /// Cell at (`row`, `col`); out-of-range positions read as `Cell::Empty`.
    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY_CELL)
    }
}
