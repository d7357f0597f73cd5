use std::path::Path;

use rescore_stats::Score;

/// The content of a cell, after normalization.
#[derive(PartialEq, Debug, Clone)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
}

impl Cell {
    /// Parses text content. Blank text is empty, and numbers are recognized.
    pub fn from_text(s: &str) -> Cell {
        let t = s.trim();
        if t.is_empty() {
            Cell::Empty
        } else if let Ok(x) = t.parse::<f64>() {
            Cell::Number(x)
        } else {
            Cell::Text(t.to_string())
        }
    }

    pub fn as_score(&self) -> Score {
        match self {
            Cell::Number(x) if !x.is_nan() => Some(*x),
            _ => None,
        }
    }

    /// The cell as an identifier or a label.
    ///
    /// Whole numbers are printed without decimals: identifiers typed in a
    /// spreadsheet are often stored as floating point numbers.
    pub fn as_label(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Number(x) if x.is_nan() => None,
            Cell::Number(x) if x.fract() == 0.0 && x.abs() < 1e15 => {
                Some(format!("{}", *x as i64))
            }
            Cell::Number(x) => Some(x.to_string()),
            Cell::Text(s) => Some(s.clone()),
        }
    }
}

static EMPTY_CELL: Cell = Cell::Empty;

/// The data rows of the sheet, without the header rows.
#[derive(PartialEq, Debug, Clone)]
pub struct Table {
    pub rows: Vec<Vec<Cell>>,
    /// The width of the widest row.
    pub width: usize,
}

impl Table {
    pub fn new(rows: Vec<Vec<Cell>>) -> Table {
        let width = rows.iter().map(|r| r.len()).max().unwrap_or(0);
        Table { rows, width }
    }

    /// Rows may be shorter than the table: the missing cells are empty.
    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY_CELL)
    }
}

pub fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_string()
}
