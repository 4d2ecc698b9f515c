use std::{collections::BTreeMap, fmt};
use tracing::{info, warn};

use crate::config::{Config, RoleAliases};
use crate::error::Error;
use crate::table::RawTable;

/// The four column meanings every trial row must provide.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    Answer,
    Env,
    Rt,
    Correct,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Answer, Role::Env, Role::Rt, Role::Correct];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Answer => "answer",
            Role::Env => "env",
            Role::Rt => "rt",
            Role::Correct => "correct",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a role found its column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchKind {
    Alias,
    Content,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnRef {
    pub index: usize,
    pub label: String,
    pub kind: MatchKind,
}

/// Content heuristics used when a role has no alias match.
#[derive(Clone, Debug)]
pub struct Heuristics {
    /// Lowercase substrings that mark an env column.
    pub env_markers: Vec<String>,
    /// Share of rows that must be numeric for an rt guess.
    pub rt_numeric_threshold: f64,
}

impl Default for Heuristics {
    fn default() -> Self {
        Config::default().heuristics()
    }
}

/// Complete role → column mapping of one table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnRoleMap {
    columns: BTreeMap<Role, ColumnRef>,
}

impl ColumnRoleMap {
    pub fn get(&self, role: Role) -> &ColumnRef {
        // construction via `resolve_roles` guarantees all four roles
        &self.columns[&role]
    }

    pub fn index(&self, role: Role) -> usize {
        self.get(role).index
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Role, &ColumnRef)> {
        self.columns.iter()
    }
}

/// Exact alias pass: for each role, the first label (left to right) whose
/// normalized form is one of the role's aliases.
pub fn match_aliases(aliases: &RoleAliases, labels: &[String]) -> BTreeMap<Role, ColumnRef> {
    let mut found = BTreeMap::new();
    for role in Role::ALL {
        if let Some((index, label)) = labels
            .iter()
            .enumerate()
            .find(|(_, l)| aliases.matches(role, l))
        {
            found.insert(
                role,
                ColumnRef {
                    index,
                    label: label.clone(),
                    kind: MatchKind::Alias,
                },
            );
        }
    }
    found
}

/// First column where any cell, lowercased, contains one of the markers.
pub fn guess_env_column(table: &RawTable, markers: &[String]) -> Option<usize> {
    let markers: Vec<String> = markers.iter().map(|m| m.to_lowercase()).collect();
    (0..table.width()).find(|&idx| {
        table.column(idx).any(|cell| {
            let text = cell.to_string().to_lowercase();
            markers.iter().any(|m| text.contains(m.as_str()))
        })
    })
}

/// First column where strictly more than `threshold` of all rows are numeric.
pub fn guess_rt_column(table: &RawTable, threshold: f64) -> Option<usize> {
    let total = table.rows.len();
    if total == 0 {
        return None;
    }
    (0..table.width()).find(|&idx| {
        let numeric = table.column(idx).filter(|c| c.as_f64().is_some()).count();
        numeric as f64 / total as f64 > threshold
    })
}

/// Alias matching for all roles, then content guesses for `env` and `rt`.
/// Fails when any role is still unresolved.
pub fn resolve_roles(
    table: &RawTable,
    aliases: &RoleAliases,
    heuristics: &Heuristics,
) -> Result<ColumnRoleMap, Error> {
    let mut columns = match_aliases(aliases, &table.headers);

    let content_ref = |index: usize| ColumnRef {
        index,
        label: table.headers[index].clone(),
        kind: MatchKind::Content,
    };

    if !columns.contains_key(&Role::Env) {
        if let Some(idx) = guess_env_column(table, &heuristics.env_markers) {
            let c = content_ref(idx);
            warn!(column = %c.label, "env column guessed from cell contents");
            columns.insert(Role::Env, c);
        }
    }
    if !columns.contains_key(&Role::Rt) {
        if let Some(idx) = guess_rt_column(table, heuristics.rt_numeric_threshold) {
            let c = content_ref(idx);
            warn!(column = %c.label, "rt column guessed from numeric share");
            columns.insert(Role::Rt, c);
        }
    }

    let missing: Vec<Role> = Role::ALL
        .into_iter()
        .filter(|r| !columns.contains_key(r))
        .collect();
    if !missing.is_empty() {
        return Err(Error::RoleResolution {
            missing,
            mapped: columns
                .iter()
                .map(|(r, c)| (*r, c.label.clone()))
                .collect(),
            available: table.headers.clone(),
        });
    }

    for (role, c) in &columns {
        info!(role = %role, column = %c.label, index = c.index, kind = ?c.kind, "role mapped");
    }
    Ok(ColumnRoleMap { columns })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Cell;

    fn labels(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn table(headers: &[&str], rows: Vec<Vec<Cell>>) -> RawTable {
        RawTable {
            headers: labels(headers),
            rows,
            header_row: Some(0),
        }
    }

    fn t(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    #[test]
    fn alias_matching_ignores_case_and_whitespace() {
        let aliases = RoleAliases::default();
        for rt in ["RT", " rt ", "Rt", "RT (ms)"] {
            let found = match_aliases(&aliases, &labels(&["x", rt]));
            assert_eq!(found[&Role::Rt].index, 1, "label {:?}", rt);
            assert_eq!(found[&Role::Rt].label, rt);
        }
    }

    #[test]
    fn first_matching_label_wins() {
        let found = match_aliases(
            &RoleAliases::default(),
            &labels(&["Stim", "Image", "resp", "answer"]),
        );
        assert_eq!(found[&Role::Env].label, "Stim");
        assert_eq!(found[&Role::Answer].label, "resp");
        assert!(!found.contains_key(&Role::Rt));
    }

    #[test]
    fn env_and_rt_fall_back_to_contents() -> anyhow::Result<()> {
        let tbl = table(
            &["Response", "trial_file", "ms", "GT"],
            vec![
                vec![t("left"), t("imgs/Shifty_2.JPG"), Cell::Number(450.0), t("left")],
                vec![t("right"), t("imgs/shifty_-4.jpg"), Cell::Number(512.0), t("left")],
            ],
        );
        let map = resolve_roles(&tbl, &RoleAliases::default(), &Heuristics::default())?;
        assert_eq!(map.index(Role::Env), 1);
        assert_eq!(map.get(Role::Env).kind, MatchKind::Content);
        assert_eq!(map.index(Role::Rt), 2);
        assert_eq!(map.get(Role::Answer).kind, MatchKind::Alias);
        Ok(())
    }

    #[test]
    fn rt_guess_needs_strictly_more_than_threshold() {
        let mut rows: Vec<Vec<Cell>> = (0..9).map(|i| vec![Cell::Number(i as f64)]).collect();
        rows.push(vec![t("n/a-ish")]);
        let tbl = table(&["ms"], rows);
        // exactly 90% numeric
        assert_eq!(guess_rt_column(&tbl, 0.9), None);
        assert_eq!(guess_rt_column(&tbl, 0.85), Some(0));
        assert_eq!(guess_rt_column(&table(&["ms"], vec![]), 0.9), None);
    }

    #[test]
    fn missing_correct_is_named_in_error() {
        let tbl = table(
            &["answer", "env", "rt", "outcome"],
            vec![vec![t("left"), t("shifty_2.jpg"), Cell::Number(450.0), t("left")]],
        );
        let err = resolve_roles(&tbl, &RoleAliases::default(), &Heuristics::default())
            .unwrap_err();
        match &err {
            Error::RoleResolution {
                missing,
                mapped,
                available,
            } => {
                assert_eq!(missing, &vec![Role::Correct]);
                assert_eq!(mapped.len(), 3);
                assert_eq!(available, &labels(&["answer", "env", "rt", "outcome"]));
            }
            other => panic!("unexpected error {other:?}"),
        }
        let msg = err.to_string();
        assert!(msg.contains("could not find columns for: correct"), "{msg}");
        assert!(msg.contains("\"outcome\""), "{msg}");
    }

    #[test]
    fn answer_has_no_content_fallback() {
        let tbl = table(
            &["choice", "stim", "rt", "truth"],
            vec![vec![t("left"), t("shifty_2.jpg"), Cell::Number(450.0), t("left")]],
        );
        let err = resolve_roles(&tbl, &RoleAliases::default(), &Heuristics::default())
            .unwrap_err();
        assert!(err.to_string().contains("for: answer;"));
    }
}
