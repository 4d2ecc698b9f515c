use calamine::{open_workbook_auto, Data, Reader};
use std::path::Path;
use tracing::debug;

use super::cell::Cell;
use crate::error::Error;

pub const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

pub fn is_workbook(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| WORKBOOK_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Read the first worksheet into a grid. Columns keep their sheet position,
/// so a sheet whose data starts at C4 yields two blank leading cells per row.
/// Rows above the used range are not materialized.
pub fn read_first_sheet(path: &Path, na_tokens: &[String]) -> Result<Vec<Vec<Cell>>, Error> {
    let mut workbook = open_workbook_auto(path).map_err(|e| Error::unreadable(path, e))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| Error::unreadable(path, "workbook has no worksheets"))?
        .map_err(|e| Error::unreadable(path, e))?;

    let (row_offset, col_offset) = range
        .start()
        .map(|(r, c)| (r as usize, c as usize))
        .unwrap_or((0, 0));
    debug!(row_offset, col_offset, "worksheet range start");

    let grid = range
        .rows()
        .map(|row| {
            let mut cells = vec![Cell::Empty; col_offset];
            cells.extend(row.iter().map(|d| convert(d, na_tokens)));
            cells
        })
        .collect();
    Ok(grid)
}

fn convert(data: &Data, na_tokens: &[String]) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) if f.is_finite() => Cell::Number(*f),
        Data::Float(_) => Cell::Empty,
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => {
            Cell::from_text(s, na_tokens)
        }
        Data::Bool(b) => Cell::Text(if *b { "True" } else { "False" }.to_string()),
        Data::DateTime(dt) => Cell::Number(dt.as_f64()),
    }
}
