// src/summary/mod.rs
use std::collections::BTreeMap;

use crate::stats;
use crate::trials::CleanedTrial;

pub mod write;

pub use write::{write_summary_csv, write_summary_parquet};

/// Accuracy and reaction-time statistics of one condition.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionSummary {
    pub condition: i64,
    pub n_trials: usize,
    pub accuracy_pct: f64,
    pub mean_rt_ms: f64,
    /// `None` for a single-trial condition.
    pub std_rt_ms: Option<f64>,
    pub median_rt_ms: f64,
}

pub const COLUMNS: [&str; 6] = [
    "condition",
    "n_trials",
    "accuracy_pct",
    "mean_rt_ms",
    "std_rt_ms",
    "median_rt_ms",
];

/// Group trials by condition, one row per condition in ascending order.
pub fn summarize(trials: &[CleanedTrial]) -> Vec<ConditionSummary> {
    let mut groups: BTreeMap<i64, (Vec<f64>, usize)> = BTreeMap::new();
    for trial in trials {
        let (rts, hits) = groups.entry(trial.condition).or_default();
        rts.push(trial.rt);
        *hits += trial.is_correct as usize;
    }

    groups
        .into_iter()
        .filter_map(|(condition, (rts, hits))| {
            let n = rts.len();
            Some(ConditionSummary {
                condition,
                n_trials: n,
                accuracy_pct: 100.0 * hits as f64 / n as f64,
                mean_rt_ms: stats::mean(&rts)?,
                std_rt_ms: stats::sample_std(&rts),
                median_rt_ms: stats::median(&rts)?,
            })
        })
        .collect()
}

/// Console rendering with every number rounded to two decimals.
pub fn render_table(rows: &[ConditionSummary]) -> String {
    let mut cells: Vec<[String; 6]> = Vec::with_capacity(rows.len() + 1);
    cells.push(COLUMNS.map(str::to_string));
    for r in rows {
        cells.push([
            r.condition.to_string(),
            r.n_trials.to_string(),
            format!("{:.2}", r.accuracy_pct),
            format!("{:.2}", r.mean_rt_ms),
            r.std_rt_ms
                .map(|v| format!("{:.2}", v))
                .unwrap_or_else(|| "NaN".to_string()),
            format!("{:.2}", r.median_rt_ms),
        ]);
    }

    let mut widths = [0usize; 6];
    for row in &cells {
        for (w, c) in widths.iter_mut().zip(row) {
            *w = (*w).max(c.len());
        }
    }

    let mut out = String::new();
    for row in &cells {
        let line: Vec<String> = row
            .iter()
            .zip(widths)
            .map(|(c, w)| format!("{:>w$}", c, w = w))
            .collect();
        out.push_str(&line.join("  "));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trial(condition: i64, rt: f64, is_correct: bool) -> CleanedTrial {
        CleanedTrial {
            answer: "left".into(),
            correct: if is_correct { "left" } else { "right" }.into(),
            env: format!("shifty_{}.jpg", condition),
            rt,
            condition,
            is_correct,
        }
    }

    #[test]
    fn groups_are_sorted_and_counted() {
        let trials = vec![
            trial(5, 600.0, true),
            trial(0, 400.0, true),
            trial(5, 640.0, false),
            trial(2, 500.0, true),
            trial(5, 610.0, true),
        ];
        let rows = summarize(&trials);
        let conditions: Vec<i64> = rows.iter().map(|r| r.condition).collect();
        assert_eq!(conditions, vec![0, 2, 5]);
        assert_eq!(rows.iter().map(|r| r.n_trials).sum::<usize>(), trials.len());

        let five = &rows[2];
        assert_eq!(five.n_trials, 3);
        assert!((five.accuracy_pct - 200.0 / 3.0).abs() < 1e-9);
        assert_eq!(five.median_rt_ms, 610.0);
    }

    #[test]
    fn singleton_condition_has_undefined_std() {
        let rows = summarize(&[trial(1, 475.0, true)]);
        assert_eq!(rows[0].std_rt_ms, None);
        assert_eq!(rows[0].mean_rt_ms, 475.0);
        assert!(summarize(&[]).is_empty());
    }

    #[test]
    fn table_rounds_to_two_decimals() {
        let rows = vec![
            ConditionSummary {
                condition: 2,
                n_trials: 3,
                accuracy_pct: 200.0 / 3.0,
                mean_rt_ms: 475.0,
                std_rt_ms: Some(35.355339),
                median_rt_ms: 475.0,
            },
            ConditionSummary {
                condition: 7,
                n_trials: 1,
                accuracy_pct: 0.0,
                mean_rt_ms: 512.0,
                std_rt_ms: None,
                median_rt_ms: 512.0,
            },
        ];
        let text = render_table(&rows);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].trim_start().starts_with("condition"));
        assert!(lines[1].contains("66.67"));
        assert!(lines[1].contains("35.36"));
        assert!(lines[2].contains("NaN"));
        assert!(lines[2].contains("512.00"));
    }
}
