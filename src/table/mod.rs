// src/table/mod.rs
use csv::ReaderBuilder;
use std::{collections::HashSet, fs::File, io::BufReader, path::Path};
use tracing::{debug, info, warn};

pub mod cell;
pub mod workbook;

pub use cell::Cell;

use crate::config::{normalize_label, RoleAliases};
use crate::error::Error;

#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    /// Column labels, either from the detected header row or positional (`0`, `1`, ...).
    pub headers: Vec<String>,
    /// Data rows below the header, each padded to `headers.len()`.
    pub rows: Vec<Vec<Cell>>,
    /// Index of the header row among the non-blank grid rows; `None` for the
    /// positional fallback.
    pub header_row: Option<usize>,
}

impl RawTable {
    /// Use grid row `h` as header and everything below it as data.
    pub fn with_header(grid: &[Vec<Cell>], h: usize) -> Self {
        let header_cells = grid.get(h).map(Vec::as_slice).unwrap_or(&[]);
        let data = grid.get(h + 1..).unwrap_or(&[]);
        let width = data
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(header_cells.len()))
            .max()
            .unwrap_or(0);

        let headers = (0..width)
            .map(|i| match header_cells.get(i).and_then(Cell::as_text) {
                Some(label) => label,
                None => format!("Unnamed: {}", i),
            })
            .collect();

        Self {
            headers,
            rows: pad_rows(data, width),
            header_row: Some(h),
        }
    }

    /// No header: every grid row is data, columns are labelled by position.
    pub fn headerless(grid: &[Vec<Cell>]) -> Self {
        let width = grid.iter().map(Vec::len).max().unwrap_or(0);
        Self {
            headers: (0..width).map(|i| i.to_string()).collect(),
            rows: pad_rows(grid, width),
            header_row: None,
        }
    }

    pub fn width(&self) -> usize {
        self.headers.len()
    }

    /// Cells of column `idx`, top to bottom.
    pub fn column(&self, idx: usize) -> impl Iterator<Item = &Cell> + '_ {
        self.rows.iter().map(move |row| &row[idx])
    }
}

fn pad_rows(rows: &[Vec<Cell>], width: usize) -> Vec<Vec<Cell>> {
    rows.iter()
        .map(|row| {
            let mut r = row.clone();
            r.resize(width, Cell::Empty);
            r
        })
        .collect()
}

/// Read `path` into a grid of cells. Workbooks go through their first sheet,
/// everything else is parsed as comma-separated text with ragged rows allowed.
/// Rows with no value in any cell are dropped, so they never count toward the
/// header window.
#[tracing::instrument(level = "info", skip(path, na_tokens), fields(path = %path.as_ref().display()))]
pub fn load_grid<P: AsRef<Path>>(path: P, na_tokens: &[String]) -> Result<Vec<Vec<Cell>>, Error> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(Error::unreadable(path, "no such file"));
    }

    let mut grid = if workbook::is_workbook(path) {
        workbook::read_first_sheet(path, na_tokens)?
    } else {
        read_csv_grid(path, na_tokens)?
    };

    let before = grid.len();
    grid.retain(|row| !row.iter().all(Cell::is_empty));
    if grid.is_empty() {
        return Err(Error::unreadable(path, "no data rows"));
    }
    debug!(rows = grid.len(), blank = before - grid.len(), "grid loaded");
    Ok(grid)
}

fn read_csv_grid(path: &Path, na_tokens: &[String]) -> Result<Vec<Vec<Cell>>, Error> {
    let file = File::open(path).map_err(|e| Error::unreadable(path, e))?;
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(BufReader::new(file));

    let mut grid = Vec::new();
    for (idx, result) in rdr.byte_records().enumerate() {
        let record = result
            .map_err(|e| Error::unreadable(path, format!("CSV parse error at record {}: {}", idx, e)))?;
        let row: Vec<Cell> = record
            .iter()
            .enumerate()
            .map(|(col, field)| {
                let text = String::from_utf8_lossy(field);
                let text = if idx == 0 && col == 0 {
                    text.trim_start_matches('\u{feff}').to_string()
                } else {
                    text.into_owned()
                };
                Cell::from_text(&text, na_tokens)
            })
            .collect();
        grid.push(row);
    }
    Ok(grid)
}

/// Pick the first row in `0..=max_header_row` whose normalized labels share
/// at least one member with the alias union. Falls back to positional labels.
pub fn detect_header(grid: &[Vec<Cell>], aliases: &RoleAliases, max_header_row: usize) -> RawTable {
    let known: HashSet<String> = aliases.all_normalized();

    for (h, row) in grid.iter().enumerate().take(max_header_row.saturating_add(1)) {
        let hit = row
            .iter()
            .filter_map(Cell::as_text)
            .any(|label| known.contains(&normalize_label(&label)));
        if hit {
            info!(header_row = h, "header row detected");
            return RawTable::with_header(grid, h);
        }
    }

    warn!(
        "no header row within the first {} rows, using positional columns",
        max_header_row.saturating_add(1)
    );
    RawTable::headerless(grid)
}

/// Load `path` and run header detection on it.
pub fn load_table<P: AsRef<Path>>(
    path: P,
    aliases: &RoleAliases,
    max_header_row: usize,
    na_tokens: &[String],
) -> Result<RawTable, Error> {
    let grid = load_grid(path, na_tokens)?;
    Ok(detect_header(&grid, aliases, max_header_row))
}
