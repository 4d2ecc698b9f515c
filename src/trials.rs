use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::config::Config;
use crate::roles::{ColumnRoleMap, Role};
use crate::table::{Cell, RawTable};

static CONDITION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[sS]hifty_([+-]?)(\d+)").expect("condition pattern is valid"));

/// One behavioral trial that survived every cleaning stage.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedTrial {
    pub answer: String,
    pub correct: String,
    pub env: String,
    pub rt: f64,
    pub condition: i64,
    pub is_correct: bool,
}

#[derive(Debug, Clone)]
pub struct TrialOptions {
    /// Answers that can be scored correct, compared lowercase.
    pub scorable_answers: Vec<String>,
    pub collapse_sign: bool,
}

impl Default for TrialOptions {
    fn default() -> Self {
        Config::default().trial_options()
    }
}

/// Rows removed at each stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DropCounts {
    pub missing_field: usize,
    pub invalid_rt: usize,
    pub no_condition: usize,
}

impl DropCounts {
    pub fn total(&self) -> usize {
        self.missing_field + self.invalid_rt + self.no_condition
    }
}

#[derive(Debug, Clone)]
pub struct Cleaned {
    pub trials: Vec<CleanedTrial>,
    pub dropped: DropCounts,
}

/// Projected row before typing: the four role cells, all present.
struct RoleRow<'a> {
    answer: &'a Cell,
    env: &'a Cell,
    rt: &'a Cell,
    correct: &'a Cell,
}

/// Stage 1: keep rows with all four role cells present.
fn project_complete<'a>(table: &'a RawTable, roles: &ColumnRoleMap) -> (Vec<RoleRow<'a>>, usize) {
    let (a, e, r, c) = (
        roles.index(Role::Answer),
        roles.index(Role::Env),
        roles.index(Role::Rt),
        roles.index(Role::Correct),
    );
    let kept: Vec<RoleRow<'a>> = table
        .rows
        .iter()
        .map(|row| RoleRow {
            answer: &row[a],
            env: &row[e],
            rt: &row[r],
            correct: &row[c],
        })
        .filter(|row| {
            !(row.answer.is_empty() || row.env.is_empty() || row.rt.is_empty() || row.correct.is_empty())
        })
        .collect();
    let dropped = table.rows.len() - kept.len();
    (kept, dropped)
}

/// Stage 2: numeric rt, unparseable values are dropped.
fn coerce_rt<'a>(rows: Vec<RoleRow<'a>>) -> (Vec<(RoleRow<'a>, f64)>, usize) {
    let before = rows.len();
    let kept: Vec<_> = rows
        .into_iter()
        .filter_map(|row| row.rt.as_f64().map(|rt| (row, rt)))
        .collect();
    let dropped = before - kept.len();
    (kept, dropped)
}

/// Condition number embedded in an env string (`shifty_-3.jpg` → 3 when
/// collapsing signs, -3 otherwise). `None` when there is no such token.
pub fn derive_condition(env: &str, collapse_sign: bool) -> Option<i64> {
    let caps = CONDITION_RE.captures(env)?;
    let magnitude: i64 = caps[2].parse().ok()?;
    if !collapse_sign && &caps[1] == "-" {
        Some(-magnitude)
    } else {
        Some(magnitude)
    }
}

/// A trial is correct only for a scorable answer that equals the ground truth.
pub fn score(answer: &str, correct: &str, scorable: &[String]) -> bool {
    scorable.iter().any(|s| s == answer) && answer == correct
}

fn normalize_value(cell: &Cell) -> String {
    cell.to_string().trim().to_lowercase()
}

/// Run every cleaning stage over `table` and derive condition and score.
pub fn clean_trials(table: &RawTable, roles: &ColumnRoleMap, opts: &TrialOptions) -> Cleaned {
    let scorable: Vec<String> = opts
        .scorable_answers
        .iter()
        .map(|s| s.trim().to_lowercase())
        .collect();

    let (complete, missing_field) = project_complete(table, roles);
    let (timed, invalid_rt) = coerce_rt(complete);

    let mut no_condition = 0;
    let mut trials = Vec::with_capacity(timed.len());
    for (row, rt) in timed {
        let env = row.env.to_string();
        let Some(condition) = derive_condition(&env, opts.collapse_sign) else {
            no_condition += 1;
            continue;
        };
        let answer = normalize_value(row.answer);
        let correct = normalize_value(row.correct);
        let is_correct = score(&answer, &correct, &scorable);
        trials.push(CleanedTrial {
            answer,
            correct,
            env,
            rt,
            condition,
            is_correct,
        });
    }

    let dropped = DropCounts {
        missing_field,
        invalid_rt,
        no_condition,
    };
    debug!(
        kept = trials.len(),
        missing_field, invalid_rt, no_condition, "trial cleaning finished"
    );
    Cleaned { trials, dropped }
}
