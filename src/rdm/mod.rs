// src/rdm/mod.rs
use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use rayon::prelude::*;
use regex::Regex;
use std::path::Path;
use tracing::{info, warn};

pub mod heatmap;

pub use heatmap::{render_heatmap, write_heatmap_labels};

use crate::error::Error;
use crate::output::{csv_float, write_csv_atomic};
use crate::stats;
use crate::table::{load_grid, Cell};

static PERCENTISH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([+-]?\d+(?:\.\d+)?)\s*%?\s*$").expect("percent pattern is valid")
});

/// Participants × tasks, cells missing where nothing numeric was found.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskMatrix {
    pub participants: Vec<String>,
    pub tasks: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
}

/// Square matrix over one label set. `NaN` marks an undefined entry.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledMatrix {
    pub labels: Vec<String>,
    pub values: Vec<Vec<f64>>,
}

/// Numeric value of a matrix cell. `"85%"` → 0.85, `"0,5"` → 0.5.
pub fn parse_percentish(cell: &Cell) -> Option<f64> {
    let raw = match cell {
        Cell::Empty => return None,
        Cell::Number(v) => return Some(*v),
        Cell::Text(s) => s.trim().replace(',', "."),
    };
    if let Some(caps) = PERCENTISH_RE.captures(&raw) {
        let v: f64 = caps[1].parse().ok()?;
        return Some(if raw.contains('%') { v / 100.0 } else { v });
    }
    crate::table::cell::parse_finite(&raw)
}

/// Header row gives task labels, the first column gives participant labels.
pub fn load_task_matrix<P: AsRef<Path>>(path: P, na_tokens: &[String]) -> Result<TaskMatrix, Error> {
    let path = path.as_ref();
    let grid = load_grid(path, na_tokens)?;
    let (header, body) = grid
        .split_first()
        .ok_or_else(|| Error::unreadable(path, "no header row"))?;

    let width = grid.iter().map(Vec::len).max().unwrap_or(0);
    if width < 2 {
        return Err(Error::unreadable(path, "no task columns"));
    }

    let tasks: Vec<String> = (1..width)
        .map(|i| {
            header
                .get(i)
                .and_then(Cell::as_text)
                .unwrap_or_else(|| format!("Unnamed: {}", i))
        })
        .collect();

    let mut participants = Vec::with_capacity(body.len());
    let mut values = Vec::with_capacity(body.len());
    for (r, row) in body.iter().enumerate() {
        if row.iter().all(Cell::is_empty) {
            continue;
        }
        participants.push(
            row.first()
                .and_then(Cell::as_text)
                .unwrap_or_else(|| format!("row {}", r + 1)),
        );
        values.push(
            (1..width)
                .map(|i| row.get(i).and_then(parse_percentish))
                .collect(),
        );
    }

    info!(
        participants = participants.len(),
        tasks = tasks.len(),
        "task matrix loaded"
    );
    Ok(TaskMatrix {
        participants,
        tasks,
        values,
    })
}

impl TaskMatrix {
    fn max_value(&self) -> Option<f64> {
        self.values
            .iter()
            .flatten()
            .flatten()
            .copied()
            .reduce(f64::max)
    }

    /// Scores that look like 0-100 percentages are scaled to 0-1.
    /// Returns whether rescaling happened.
    pub fn rescale_percent(&mut self) -> bool {
        match self.max_value() {
            Some(max) if max > 1.5 => {
                for v in self.values.iter_mut().flatten().flatten() {
                    *v /= 100.0;
                }
                info!(max, "values rescaled from 0-100 to 0-1");
                true
            }
            _ => false,
        }
    }

    /// Drop participants with any missing task score. Returns the number dropped.
    pub fn drop_incomplete(&mut self) -> usize {
        let before = self.participants.len();
        let (participants, values): (Vec<_>, Vec<_>) = std::mem::take(&mut self.participants)
            .into_iter()
            .zip(std::mem::take(&mut self.values))
            .filter(|(_, row)| row.iter().all(Option::is_some))
            .unzip();
        self.participants = participants;
        self.values = values;
        let dropped = before - self.participants.len();
        if dropped > 0 {
            warn!(dropped, "participants with missing scores removed");
        }
        dropped
    }

    fn task_column(&self, t: usize) -> Vec<Option<f64>> {
        self.values.iter().map(|row| row[t]).collect()
    }

    /// Pearson correlation between every pair of tasks over participants
    /// present in both. Rows are computed in parallel.
    pub fn correlation(&self) -> LabeledMatrix {
        let columns: Vec<Vec<Option<f64>>> =
            (0..self.tasks.len()).map(|t| self.task_column(t)).collect();
        let values: Vec<Vec<f64>> = columns
            .par_iter()
            .map(|a| columns.iter().map(|b| stats::pearson(a, b)).collect())
            .collect();
        LabeledMatrix {
            labels: self.tasks.clone(),
            values,
        }
    }

    /// Cleaned matrix as CSV, participants as the index column.
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut header = vec![""];
        header.extend(self.tasks.iter().map(String::as_str));
        let rows = self.participants.iter().zip(&self.values).map(|(p, row)| {
            std::iter::once(p.clone())
                .chain(row.iter().map(|v| v.map(csv_float).unwrap_or_default()))
                .collect::<Vec<_>>()
        });
        write_csv_atomic(path, &header, rows)
            .with_context(|| format!("writing task matrix {}", path.display()))
    }
}

impl LabeledMatrix {
    /// `1 - corr` with a zero diagonal.
    pub fn dissimilarity(&self) -> LabeledMatrix {
        let values = self
            .values
            .iter()
            .enumerate()
            .map(|(i, row)| {
                row.iter()
                    .enumerate()
                    .map(|(j, c)| if i == j { 0.0 } else { 1.0 - c })
                    .collect()
            })
            .collect();
        LabeledMatrix {
            labels: self.labels.clone(),
            values,
        }
    }

    /// Smallest and largest finite entries.
    pub fn finite_range(&self) -> Option<(f64, f64)> {
        self.values
            .iter()
            .flatten()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut header = vec![""];
        header.extend(self.labels.iter().map(String::as_str));
        let rows = self.labels.iter().zip(&self.values).map(|(label, row)| {
            std::iter::once(label.clone())
                .chain(row.iter().map(|v| csv_float(*v)))
                .collect::<Vec<_>>()
        });
        write_csv_atomic(path, &header, rows)
            .with_context(|| format!("writing matrix {}", path.display()))
    }
}

/// Files produced by one RDM run.
pub const CLEAN_MATRIX_FILE: &str = "participant_task_matrix_clean.csv";
pub const CORRELATION_FILE: &str = "correlation_matrix.csv";
pub const RDM_FILE: &str = "RDM_matrix.csv";
pub const HEATMAP_FILE: &str = "RDM_heatmap.png";
pub const HEATMAP_LABELS_FILE: &str = "RDM_heatmap_labels.csv";

#[derive(Debug, Clone, Default)]
pub struct RdmOptions {
    pub drop_incomplete: bool,
}

/// Load, clean, correlate and write every RDM artifact into `out_dir`.
#[tracing::instrument(level = "info", skip_all, fields(input = %input.as_ref().display()))]
pub fn run_rdm<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    out_dir: Q,
    na_tokens: &[String],
    opts: &RdmOptions,
) -> Result<LabeledMatrix> {
    let out_dir = out_dir.as_ref();
    let mut matrix = load_task_matrix(input, na_tokens)?;
    if opts.drop_incomplete {
        matrix.drop_incomplete();
    }
    matrix.rescale_percent();

    let corr = matrix.correlation();
    let rdm = corr.dissimilarity();

    matrix.write_csv(out_dir.join(CLEAN_MATRIX_FILE))?;
    corr.write_csv(out_dir.join(CORRELATION_FILE))?;
    rdm.write_csv(out_dir.join(RDM_FILE))?;
    render_heatmap(&rdm, &out_dir.join(HEATMAP_FILE))?;
    write_heatmap_labels(&rdm.labels, out_dir.join(HEATMAP_LABELS_FILE))?;

    info!(dir = %out_dir.display(), "RDM outputs written");
    Ok(rdm)
}
