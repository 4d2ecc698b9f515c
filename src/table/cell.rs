use std::fmt;

/// One spreadsheet value after missing-value detection.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
}

impl Cell {
    /// Classify raw text: blanks and NA tokens become `Empty`, finite
    /// numbers become `Number`, everything else stays `Text` (untrimmed).
    pub fn from_text(raw: &str, na_tokens: &[String]) -> Cell {
        let trimmed = raw.trim();
        if trimmed.is_empty() || na_tokens.iter().any(|t| t == trimmed) {
            return Cell::Empty;
        }
        match parse_finite(trimmed) {
            Some(v) => Cell::Number(v),
            None => Cell::Text(raw.to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    /// Numeric view: numbers as-is, text only if it parses as a finite float.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(v) => Some(*v),
            Cell::Text(s) => parse_finite(s),
            Cell::Empty => None,
        }
    }

    /// Text view; `None` for empty cells.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            other => Some(other.to_string()),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Number(v) => write!(f, "{}", v),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

/// Trimmed float parse that refuses `nan`/`inf` spellings.
pub fn parse_finite(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}
