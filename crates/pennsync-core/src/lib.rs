// pennsync-core: diff-driven, manifest-based dataset synchronization on top
// of pennsync-api and the external agent tool.

pub mod config;
pub mod datasets;
pub mod diff;
pub mod error;
pub mod layout;
pub mod manifest;
pub mod map;
pub mod model;
pub mod pull;
pub mod push;
pub mod service;
pub mod tool;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{SyncConfig, TlsVerification};
pub use datasets::{Selection, filter_datasets, parse_name_list, select_by_name};
pub use diff::{DiffEngine, DiffSet, DiffTable, parse_table};
pub use error::CoreError;
pub use layout::DataLayout;
pub use manifest::{
    ManifestBuilder, ManifestError, ManifestHandle, RowFailure, RowFailureKind, parse_manifest_id,
};
pub use map::{MapOutcome, MapReport, Mapper};
pub use model::{ChangeKind, Dataset, DiffRow};
pub use pull::{PullEvent, PullFailure, PullReport, Puller, RetryPolicy};
pub use push::{BatchReport, PushOutcome, PushReport, PushTally, Pusher};
pub use service::SyncService;
pub use tool::{AgentCli, AgentCommand, ToolError, ToolOutput, ToolRunner};
