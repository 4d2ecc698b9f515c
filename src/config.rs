use serde::Deserialize;
use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};
use tracing::info;

use crate::error::Error;
use crate::roles::{Heuristics, Role};
use crate::trials::TrialOptions;

/// Optional configuration file looked up in the working directory.
pub const CONFIG_FILE: &str = "trialstats.yaml";

/// Accepted column labels for each canonical role.
/// Compared after trimming and lowercasing.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RoleAliases {
    pub answer: Vec<String>,
    pub env: Vec<String>,
    pub rt: Vec<String>,
    pub correct: Vec<String>,
}

impl Default for RoleAliases {
    fn default() -> Self {
        Self {
            answer: strings(&["answer", "resp", "response", "ans"]),
            env: strings(&["env", "stim", "image", "file", "filename", "path"]),
            rt: strings(&[
                "rt",
                "rt_ms",
                "reaction_time",
                "latency",
                "time",
                "rt (ms)",
                "rt(ms)",
            ]),
            correct: strings(&["correct", "gt", "ground_truth", "truth", "label"]),
        }
    }
}

impl RoleAliases {
    pub fn for_role(&self, role: Role) -> &[String] {
        match role {
            Role::Answer => &self.answer,
            Role::Env => &self.env,
            Role::Rt => &self.rt,
            Role::Correct => &self.correct,
        }
    }

    /// True when the normalized `label` belongs to `role`'s alias set.
    pub fn matches(&self, role: Role, label: &str) -> bool {
        let norm = normalize_label(label);
        self.for_role(role)
            .iter()
            .any(|alias| normalize_label(alias) == norm)
    }

    /// Union of every role's aliases, normalized.
    pub fn all_normalized(&self) -> HashSet<String> {
        Role::ALL
            .iter()
            .flat_map(|r| self.for_role(*r).iter())
            .map(|a| normalize_label(a))
            .collect()
    }
}

/// Trim + lowercase, the comparison form of a column label.
pub fn normalize_label(label: &str) -> String {
    label.trim().to_lowercase()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Trial log to summarize (CSV or workbook).
    pub input: PathBuf,
    /// Summary table destination.
    pub output_csv: PathBuf,
    /// Optional Parquet copy of the summary table.
    pub output_parquet: Option<PathBuf>,
    /// Last row index tried as header (inclusive).
    pub max_header_row: usize,
    pub aliases: RoleAliases,
    /// Cell texts treated as missing values.
    pub na_tokens: Vec<String>,
    /// Substrings that identify the env column when no alias matches.
    pub env_markers: Vec<String>,
    /// Share of numeric cells a column needs to be guessed as rt.
    pub rt_numeric_threshold: f64,
    /// Answers that can ever be scored correct.
    pub scorable_answers: Vec<String>,
    /// Fold `shifty_-N` and `shifty_N` into condition N.
    pub collapse_sign: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input: PathBuf::from("book1.xlsx"),
            output_csv: PathBuf::from("accuracy_rt_by_condition.csv"),
            output_parquet: None,
            max_header_row: 8,
            aliases: RoleAliases::default(),
            na_tokens: default_na_tokens(),
            env_markers: strings(&[".jpg", "shifty_"]),
            rt_numeric_threshold: 0.9,
            scorable_answers: strings(&["left", "right"]),
            collapse_sign: true,
        }
    }
}

impl Config {
    pub fn heuristics(&self) -> Heuristics {
        Heuristics {
            env_markers: self.env_markers.clone(),
            rt_numeric_threshold: self.rt_numeric_threshold,
        }
    }

    pub fn trial_options(&self) -> TrialOptions {
        TrialOptions {
            scorable_answers: self.scorable_answers.clone(),
            collapse_sign: self.collapse_sign,
        }
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        if !path.exists() {
            info!("no {} found, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let cfg = Self::from_yaml(&text).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        info!("loaded config from {}", path.display());
        Ok(cfg)
    }

    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }
}

pub fn default_na_tokens() -> Vec<String> {
    strings(&[
        "NA", "N/A", "n/a", "NaN", "nan", "-NaN", "-nan", "NULL", "null", "None", "#N/A", "<NA>",
        "-",
    ])
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
