// ── Diff engine ──
//
// Runs `map diff` against a mapped dataset directory and turns the table it
// prints into typed rows with resolved local paths.

pub mod table;

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::layout::DataLayout;
use crate::model::{ChangeKind, DiffRow};
use crate::tool::{AgentCommand, ToolRunner};

pub use table::{DiffTable, parse_table};

/// Header positions of the columns the engine understands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Columns {
    pub file_name: Option<usize>,
    pub path: Option<usize>,
    pub change: Option<usize>,
}

impl Columns {
    /// First matching header for each column, case-insensitive.
    pub fn resolve(headers: &[String]) -> Self {
        let upper: Vec<String> = headers.iter().map(|h| h.to_uppercase()).collect();
        Self {
            file_name: upper
                .iter()
                .position(|h| h.contains("FILE NAME") || h.contains("FILENAME")),
            path: upper
                .iter()
                .position(|h| h.contains("PATH") && !h.contains("FULL")),
            change: upper
                .iter()
                .position(|h| h.contains("UPDATE") || h.contains("CHANGE")),
        }
    }
}

/// Diff of one dataset at one point in time.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiffSet {
    pub dataset: String,
    pub headers: Vec<String>,
    pub rows: Vec<DiffRow>,
    /// Malformed table rows that were skipped.
    pub dropped: usize,
    /// Whether the table carried a change column.
    pub has_change_column: bool,
}

impl DiffSet {
    /// Build typed rows from a parsed table.
    pub fn from_table(dataset: &str, table: DiffTable, layout: &DataLayout) -> Self {
        let columns = Columns::resolve(&table.headers);
        let cell = |row: &[String], idx: Option<usize>| -> String {
            idx.and_then(|i| row.get(i)).cloned().unwrap_or_default()
        };

        let rows = table
            .rows
            .iter()
            .map(|row| {
                let file_name = cell(row, columns.file_name);
                let relative_path = cell(row, columns.path);
                let change_kind = columns
                    .change
                    .and_then(|i| row.get(i))
                    .map(|label| ChangeKind::from_label(label));
                let local_path = layout.resolve(dataset, &relative_path, &file_name);
                DiffRow {
                    file_name,
                    relative_path,
                    change_kind,
                    local_path,
                }
            })
            .collect();

        Self {
            dataset: dataset.to_owned(),
            headers: table.headers,
            rows,
            dropped: table.dropped,
            has_change_column: columns.change.is_some(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// ADDED rows in diff order.
    ///
    /// Fails when the table had no change column, since nothing can be
    /// classified without it.
    pub fn added(&self) -> Result<Vec<&DiffRow>, CoreError> {
        if !self.has_change_column {
            return Err(CoreError::MissingColumn {
                headers: self.headers.clone(),
            });
        }
        Ok(self.rows.iter().filter(|r| r.is_added()).collect())
    }

    /// Row count per change label, sorted by label.
    pub fn summary(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for row in &self.rows {
            let label = row
                .change_kind
                .as_ref()
                .map_or_else(|| "UNKNOWN".to_owned(), ToString::to_string);
            *counts.entry(label).or_insert(0) += 1;
        }
        counts
    }
}

/// Compares mapped datasets with their remote state through the agent tool.
#[derive(Debug)]
pub struct DiffEngine<'a, R> {
    runner: &'a R,
    layout: &'a DataLayout,
}

impl<'a, R: ToolRunner> DiffEngine<'a, R> {
    pub fn new(runner: &'a R, layout: &'a DataLayout) -> Self {
        Self { runner, layout }
    }

    /// Run `map diff` for `dataset` and parse the result.
    pub async fn diff(&self, dataset: &str) -> Result<DiffSet, CoreError> {
        let path = self.layout.dataset_dir(dataset);
        info!(dataset, "checking for changes between local and remote");

        let output = self
            .runner
            .run(&AgentCommand::MapDiff { path })
            .await
            .map_err(CoreError::DiffInvocation)?;
        debug!(stdout = %output.stdout, "diff output");

        let table = parse_table(&output.stdout);
        if !table.has_header() {
            warn!(dataset, "no header row in diff output");
        }
        if table.dropped > 0 {
            warn!(dataset, dropped = table.dropped, "skipped malformed diff rows");
        }

        let set = DiffSet::from_table(dataset, table, self.layout);
        if set.is_empty() {
            info!(dataset, "no changes detected");
        }
        Ok(set)
    }
}
