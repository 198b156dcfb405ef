// ── Domain model ──

use std::fmt;
use std::path::PathBuf;

use pennsync_api::DatasetEnvelope;
use serde::{Serialize, Serializer};

/// A remote dataset. The name doubles as the local directory key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dataset {
    pub id: String,
    pub name: String,
}

impl From<DatasetEnvelope> for Dataset {
    fn from(envelope: DatasetEnvelope) -> Self {
        Self {
            id: envelope.content.id,
            name: envelope.content.name,
        }
    }
}

/// Change classification reported by the mapping tool.
///
/// Labels are compared uppercase. Anything outside the four known kinds is
/// kept verbatim and never treated as an addition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
    Unchanged,
    Other(String),
}

impl ChangeKind {
    /// Classify a raw label from the diff table.
    pub fn from_label(label: &str) -> Self {
        let label = label.trim();
        match label.to_uppercase().as_str() {
            "ADDED" => Self::Added,
            "MODIFIED" => Self::Modified,
            "DELETED" => Self::Deleted,
            "UNCHANGED" => Self::Unchanged,
            _ => Self::Other(label.to_owned()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Added => "ADDED",
            Self::Modified => "MODIFIED",
            Self::Deleted => "DELETED",
            Self::Unchanged => "UNCHANGED",
            Self::Other(label) => label,
        }
    }

    pub fn is_added(&self) -> bool {
        matches!(self, Self::Added)
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ChangeKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One file entry of a diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffRow {
    pub file_name: String,
    /// Path relative to the dataset root, blank for top-level files.
    pub relative_path: String,
    /// `None` when the diff table had no change column.
    pub change_kind: Option<ChangeKind>,
    /// `<dataset dir>/<relative_path>/<file_name>`.
    pub local_path: PathBuf,
}

impl DiffRow {
    pub fn is_added(&self) -> bool {
        self.change_kind.as_ref().is_some_and(ChangeKind::is_added)
    }

    /// Upload target (`-t`) for this row, if it has a non-blank path.
    pub fn target(&self) -> Option<&str> {
        let path = self.relative_path.trim();
        (!path.is_empty()).then_some(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_case_insensitive() {
        assert_eq!(ChangeKind::from_label("added"), ChangeKind::Added);
        assert_eq!(ChangeKind::from_label(" Modified "), ChangeKind::Modified);
        assert_eq!(ChangeKind::from_label("DELETED"), ChangeKind::Deleted);
        assert_eq!(ChangeKind::from_label("unchanged"), ChangeKind::Unchanged);
    }

    #[test]
    fn unknown_label_is_preserved_and_not_added() {
        let kind = ChangeKind::from_label("Renamed");
        assert_eq!(kind, ChangeKind::Other("Renamed".into()));
        assert!(!kind.is_added());
        assert_eq!(kind.to_string(), "Renamed");
    }

    #[test]
    fn blank_path_has_no_target() {
        let row = DiffRow {
            file_name: "README.md".into(),
            relative_path: "  ".into(),
            change_kind: Some(ChangeKind::Added),
            local_path: PathBuf::from("data/output/DS1/README.md"),
        };
        assert!(row.target().is_none());
        assert!(row.is_added());
    }

    #[test]
    fn change_kind_serializes_as_label() {
        let json = serde_json::to_string(&ChangeKind::Modified).expect("json");
        assert_eq!(json, "\"MODIFIED\"");
    }
}
