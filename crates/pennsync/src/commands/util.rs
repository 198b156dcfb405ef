//! Shared helpers for command handlers.

use pennsync_core::{Dataset, SyncService, parse_name_list};

use crate::error::CliError;

/// Split a `--dataset` value, rejecting an empty list.
pub fn parse_names(raw: &str) -> Result<Vec<String>, CliError> {
    let names = parse_name_list(raw);
    if names.is_empty() {
        return Err(CliError::Validation {
            field: "dataset".into(),
            reason: "expected at least one dataset name".into(),
        });
    }
    Ok(names)
}

/// Resolve `--dataset` names against the platform listing.
///
/// Unknown names are warned about by the service. Returns `None` after
/// telling the user when nothing matched at all.
pub async fn select_datasets(
    service: &SyncService,
    raw: &str,
    quiet: bool,
) -> Result<Option<Vec<Dataset>>, CliError> {
    let names = parse_names(raw)?;
    let selection = service.select(&names).await?;
    if selection.found.is_empty() {
        if !quiet {
            eprintln!("No datasets found matching: {}", names.join(", "));
        }
        return Ok(None);
    }
    Ok(Some(selection.found))
}

/// Turn a batch with failed entries into a non-zero exit.
pub fn batch_result(operation: &str, failed: usize, total: usize) -> Result<(), CliError> {
    if failed == 0 {
        return Ok(());
    }
    Err(CliError::BatchFailed {
        operation: operation.into(),
        failed,
        total,
    })
}

/// Map an interactive prompt failure into CliError.
pub fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}
