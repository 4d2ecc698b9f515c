use std::{collections::BTreeMap, path::PathBuf};

use crate::roles::Role;

/// Fatal failures of a run. Row-level losses are never errors, they are
/// counted in [`crate::trials::DropCounts`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("cannot read {}: {reason}", path.display())]
    SourceUnreadable { path: PathBuf, reason: String },

    #[error(
        "could not find columns for: {}; found mapping: {{{}}}; available columns: {available:?}",
        join_roles(missing),
        join_mapping(mapped)
    )]
    RoleResolution {
        missing: Vec<Role>,
        mapped: BTreeMap<Role, String>,
        available: Vec<String>,
    },

    #[error("invalid config {}: {reason}", path.display())]
    Config { path: PathBuf, reason: String },
}

impl Error {
    pub(crate) fn unreadable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::SourceUnreadable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

fn join_roles(roles: &[Role]) -> String {
    roles
        .iter()
        .map(|r| r.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn join_mapping(mapped: &BTreeMap<Role, String>) -> String {
    mapped
        .iter()
        .map(|(role, label)| format!("{}: {:?}", role.as_str(), label))
        .collect::<Vec<_>>()
        .join(", ")
}
