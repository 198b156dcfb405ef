// ── External agent tool ──
//
// The vendor CLI does mapping, diffing and uploading. It is driven as a
// black-box subprocess: arguments in, exit status plus text out.

use std::ffi::OsString;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;

use thiserror::Error;
use tracing::debug;

/// Failures of one tool invocation.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The executable could not be found.
    #[error("'{program}' is not installed or not on PATH")]
    Unavailable { program: String },

    /// The tool ran and exited non-zero.
    #[error("`{command}` exited with {}: {}", .code.map_or_else(|| "a signal".to_owned(), |c| format!("status {c}")), .stderr.trim())]
    Failed {
        command: String,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    /// Spawning or waiting on the process failed.
    #[error("failed to run '{program}': {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Captured output of a successful invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn stdout(text: impl Into<String>) -> Self {
        Self {
            stdout: text.into(),
            stderr: String::new(),
        }
    }
}

/// Every subcommand of the agent tool this crate issues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentCommand {
    /// `map <dataset id> <path>`
    Map { dataset_id: String, path: PathBuf },
    /// `map diff <path>`
    MapDiff { path: PathBuf },
    /// `dataset use <dataset id>`
    DatasetUse { dataset_id: String },
    /// `manifest create <path> [-t <target>]`
    ManifestCreate {
        path: PathBuf,
        target: Option<String>,
    },
    /// `manifest add <manifest id> <path> [-t <target>]`
    ManifestAdd {
        manifest_id: u64,
        path: PathBuf,
        target: Option<String>,
    },
    /// `upload manifest <manifest id>`
    UploadManifest { manifest_id: u64 },
}

impl AgentCommand {
    /// Argument vector, without the program name.
    pub fn args(&self) -> Vec<OsString> {
        match self {
            Self::Map { dataset_id, path } => {
                vec!["map".into(), dataset_id.into(), path.into()]
            }
            Self::MapDiff { path } => vec!["map".into(), "diff".into(), path.into()],
            Self::DatasetUse { dataset_id } => {
                vec!["dataset".into(), "use".into(), dataset_id.into()]
            }
            Self::ManifestCreate { path, target } => {
                let mut args: Vec<OsString> = vec!["manifest".into(), "create".into(), path.into()];
                push_target(&mut args, target.as_deref());
                args
            }
            Self::ManifestAdd {
                manifest_id,
                path,
                target,
            } => {
                let mut args: Vec<OsString> = vec![
                    "manifest".into(),
                    "add".into(),
                    manifest_id.to_string().into(),
                    path.into(),
                ];
                push_target(&mut args, target.as_deref());
                args
            }
            Self::UploadManifest { manifest_id } => vec![
                "upload".into(),
                "manifest".into(),
                manifest_id.to_string().into(),
            ],
        }
    }
}

fn push_target(args: &mut Vec<OsString>, target: Option<&str>) {
    if let Some(target) = target.map(str::trim).filter(|t| !t.is_empty()) {
        args.push("-t".into());
        args.push(target.into());
    }
}

impl fmt::Display for AgentCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args: Vec<String> = self
            .args()
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        f.write_str(&args.join(" "))
    }
}

/// Runs agent commands. The production implementation is [`AgentCli`].
pub trait ToolRunner: Send + Sync {
    fn run(
        &self,
        command: &AgentCommand,
    ) -> impl Future<Output = Result<ToolOutput, ToolError>> + Send;
}

/// Runs the agent as a child process.
#[derive(Debug, Clone)]
pub struct AgentCli {
    program: String,
}

impl AgentCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl ToolRunner for AgentCli {
    async fn run(&self, command: &AgentCommand) -> Result<ToolOutput, ToolError> {
        debug!(program = %self.program, %command, "running agent command");

        let output = tokio::process::Command::new(&self.program)
            .args(command.args())
            .stdin(std::process::Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| {
                if source.kind() == std::io::ErrorKind::NotFound {
                    ToolError::Unavailable {
                        program: self.program.clone(),
                    }
                } else {
                    ToolError::Io {
                        program: self.program.clone(),
                        source,
                    }
                }
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            return Err(ToolError::Failed {
                command: format!("{} {command}", self.program),
                code: output.status.code(),
                stdout,
                stderr,
            });
        }

        Ok(ToolOutput { stdout, stderr })
    }
}

// ── Scripted runner for tests ────────────────────────────────────────
