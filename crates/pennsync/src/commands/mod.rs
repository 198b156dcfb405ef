//! Command dispatch: bridges CLI args -> core services -> output formatting.

pub mod config_cmd;
pub mod datasets;
pub mod diff;
pub mod map;
pub mod pull;
pub mod push;
pub mod util;

use pennsync_core::SyncService;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a platform-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    service: &SyncService,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Datasets(args) => datasets::handle(service, args, global).await,
        Command::Map(args) => map::handle(service, args, global).await,
        Command::Push(args) => push::handle(service, args, global).await,
        Command::Pull(args) => pull::handle(service, args, global).await,
        // Config, Completions and Diff run without a platform session
        Command::Config(_) | Command::Completions(_) | Command::Diff(_) => unreachable!(),
    }
}
