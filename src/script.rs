//! Subprocess execution of the Logseq query and API scripts.
//!
//! Every operation shells out to a fixed wrapper executable with
//! `[script, graph?, ...args]`. Combined stdout+stderr is the only reply
//! channel, for success payloads and error diagnostics alike. The spawn
//! itself sits behind [`ScriptExecutor`] so tests can substitute a
//! recording executor and assert call counts.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

use crate::config::ApiConfig;
use crate::tasks::{parse_tasks, TaskCache};
use crate::tools::{TaskPriority, TaskStatus};

/// Default path of the script wrapper executable.
pub const DEFAULT_RUNNER: &str = "/app/mcp-logseq/run-script.sh";

/// Scripts whose name contains this substring produce task listings that
/// refresh the cache.
const TASK_SCRIPT_MARKER: &str = "task";

/// Output substrings that identify a refused connection to the Logseq API.
const CONNECTION_REFUSED_MARKERS: [&str; 2] = ["fetch failed", "ECONNREFUSED"];

/// Failure of a script subprocess: spawn error or non-zero exit.
///
/// `output` carries whatever combined output was captured before the
/// failure, since the scripts report their own errors on stdout/stderr.
#[derive(Debug, Clone, Error)]
#[error("{reason}")]
pub struct ScriptFailure {
    pub reason: String,
    pub output: String,
}

/// Spawn seam between the runners and the operating system.
#[async_trait]
pub trait ScriptExecutor: Send + Sync {
    /// Run `script` with positional `args` and extra environment entries,
    /// returning combined stdout+stderr on success.
    async fn execute(
        &self,
        script: &str,
        args: &[String],
        extra_env: &[(String, String)],
    ) -> Result<String, ScriptFailure>;
}

/// Executor that invokes the real script wrapper via `tokio::process`.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    runner: PathBuf,
}

impl ProcessExecutor {
    pub fn new(runner: impl Into<PathBuf>) -> Self {
        Self {
            runner: runner.into(),
        }
    }
}

#[async_trait]
impl ScriptExecutor for ProcessExecutor {
    async fn execute(
        &self,
        script: &str,
        args: &[String],
        extra_env: &[(String, String)],
    ) -> Result<String, ScriptFailure> {
        // kill_on_drop: a cancelled request drops this future and must not
        // leave the script running.
        let output = Command::new(&self.runner)
            .arg(script)
            .args(args)
            .env("HOME", "/root")
            .envs(extra_env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|err| ScriptFailure {
                reason: err.to_string(),
                output: String::new(),
            })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if output.status.success() {
            Ok(combined)
        } else {
            Err(ScriptFailure {
                reason: output.status.to_string(),
                output: combined,
            })
        }
    }
}

/// A validated API operation: one case per script, carrying exactly the
/// arguments that script takes in positional order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    CreateTask {
        page: String,
        content: String,
        status: TaskStatus,
        priority: TaskPriority,
    },
    CompleteTask {
        uuid: String,
    },
    TaskInfo {
        uuid: String,
    },
    UpdateTaskStatus {
        uuid: String,
        status: TaskStatus,
    },
}

impl ApiCall {
    /// Script identifier the operation maps to.
    pub fn script(&self) -> &'static str {
        match self {
            Self::CreateTask { .. } => "create_task_clean.cljs",
            Self::CompleteTask { .. } => "complete_task.cljs",
            Self::TaskInfo { .. } => "get_task_info.cljs",
            Self::UpdateTaskStatus { .. } => "update_task_status.cljs",
        }
    }

    /// Positional argument vector, in script order.
    pub fn args(&self) -> Vec<String> {
        match self {
            Self::CreateTask {
                page,
                content,
                status,
                priority,
            } => vec![
                page.clone(),
                content.clone(),
                status.as_str().to_string(),
                priority.as_str().to_string(),
            ],
            Self::CompleteTask { uuid } | Self::TaskInfo { uuid } => vec![uuid.clone()],
            Self::UpdateTaskStatus { uuid, status } => {
                vec![uuid.clone(), status.as_str().to_string()]
            }
        }
    }

    /// Whether a successful call changes graph content (and so should
    /// trigger resource-change notifications).
    pub fn mutates(&self) -> bool {
        !matches!(self, Self::TaskInfo { .. })
    }
}

/// Executes query and API scripts, translating failures into the envelope
/// texts clients see.
pub struct ScriptRunner {
    executor: Arc<dyn ScriptExecutor>,
    cache: Arc<TaskCache>,
}

impl ScriptRunner {
    pub fn new(executor: Arc<dyn ScriptExecutor>, cache: Arc<TaskCache>) -> Self {
        Self { executor, cache }
    }

    /// Run a read-only query script against `graph`.
    ///
    /// Task-listing output refreshes the cache entry for `graph` before
    /// the reply is returned. Failures come back as `Err(text)` ready to
    /// be wrapped in an error envelope; an empty `graph` short-circuits
    /// without spawning anything.
    pub async fn run_query(
        &self,
        script: &str,
        graph: &str,
        extra_args: &[String],
    ) -> Result<String, String> {
        if graph.is_empty() {
            return Err("Error: graph parameter is required".to_string());
        }

        let mut args = vec![graph.to_string()];
        args.extend_from_slice(extra_args);

        match self.executor.execute(script, &args, &[]).await {
            Ok(output) => {
                if script.contains(TASK_SCRIPT_MARKER) {
                    self.cache.replace(graph, parse_tasks(&output)).await;
                }
                Ok(output)
            }
            Err(failure) => Err(format!(
                "Script execution failed: {}\nOutput: {}",
                failure.reason, failure.output
            )),
        }
    }

    /// Run a validated API operation, forwarding API settings from the
    /// current environment. Never touches the task cache.
    pub async fn run_api(&self, call: &ApiCall) -> Result<String, String> {
        let config = ApiConfig::from_env();
        match self
            .executor
            .execute(call.script(), &call.args(), &config.subprocess_env())
            .await
        {
            Ok(output) => Ok(output),
            Err(failure) => {
                let mut message = format!(
                    "API script execution failed: {}\nOutput: {}",
                    failure.reason, failure.output
                );
                if CONNECTION_REFUSED_MARKERS
                    .iter()
                    .any(|marker| failure.output.contains(marker))
                {
                    message.push_str(&remediation_hint(&config));
                }
                Err(message)
            }
        }
    }
}

/// Three-step hint appended when the API connection is refused.
fn remediation_hint(config: &ApiConfig) -> String {
    format!(
        "\n\nLogseq API appears to be unavailable. Please ensure:\n  1. Logseq is running on your host\n  2. HTTP API is enabled (Settings > Features > Developer Mode > HTTP APIs)\n  3. The API is accessible at {}:{}",
        config.host_or_default(),
        config.port_or_default()
    )
}
