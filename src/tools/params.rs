//! Parameter structs for all MCP tools, plus the task vocabularies.
//!
//! Required string fields deserialize through `#[serde(default)]` and are
//! validated for emptiness in the handlers, so an omitted field produces
//! the server's descriptive error envelope instead of a protocol-level
//! deserialization fault.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// ── vocabularies ──

/// Task workflow status. The variant names are the exact wire values the
/// scripts and the Logseq API accept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum TaskStatus {
    #[default]
    Todo,
    Doing,
    Done,
    Later,
    Now,
    Waiting,
    Canceled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Todo => "Todo",
            Self::Doing => "Doing",
            Self::Done => "Done",
            Self::Later => "Later",
            Self::Now => "Now",
            Self::Waiting => "Waiting",
            Self::Canceled => "Canceled",
        }
    }
}

/// Task priority level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum TaskPriority {
    High,
    #[default]
    Medium,
    Low,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }
}

// ── query tools ──

/// Parameters for the graph-scoped task listing tools
/// (`list_all_tasks`, `list_tasks_by_status`, `find_tasks`).
#[derive(Debug, Deserialize, JsonSchema)]
pub struct GraphParams {
    /// Graph to query.
    #[schemars(description = "The name of the Logseq graph (e.g., 'mcp', 'Demo')")]
    #[serde(default)]
    pub graph: String,
}

/// Parameters for the listing tools that take an `expand` switch
/// (`list_pages`, `list_tags`, `list_properties`).
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ExpandParams {
    /// Graph to query.
    #[schemars(description = "The name of the Logseq graph (e.g., 'mcp', 'Demo')")]
    #[serde(default)]
    pub graph: String,
    /// Whether to include additional per-entry detail.
    #[schemars(
        description = "Provide additional detail on each entry (e.g. timestamps, parents, property types)"
    )]
    #[serde(default)]
    pub expand: bool,
}

/// Parameters for the `get_page` tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetPageParams {
    /// Graph to query.
    #[schemars(description = "The name of the Logseq graph (e.g., 'mcp', 'Demo')")]
    #[serde(default)]
    pub graph: String,
    /// Page to retrieve.
    #[schemars(
        description = "The page's name or UUID to retrieve. A property and a tag are pages."
    )]
    #[serde(default, rename = "pageName")]
    pub page_name: String,
}

// ── API tools ──

/// Parameters for the `create_task` tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateTaskParams {
    /// Destination page.
    #[schemars(
        description = "The page name or date where the task should be created (e.g., 'Feb 7th, 2026' or 'Projects')"
    )]
    #[serde(default)]
    pub page: String,
    /// Task content/title.
    #[schemars(description = "The task content/title")]
    #[serde(default)]
    pub content: String,
    /// Initial status (defaults to Todo).
    #[schemars(description = "Task status: Todo, Doing, Done, Later, Now, Waiting, or Canceled")]
    #[serde(default)]
    pub status: TaskStatus,
    /// Priority level (defaults to Medium).
    #[schemars(description = "Task priority level")]
    #[serde(default)]
    pub priority: TaskPriority,
}

/// Parameters for the `complete_task` and `get_task_info` tools.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct TaskUuidParams {
    /// Target task block.
    #[schemars(description = "The UUID of the task block")]
    #[serde(default)]
    pub uuid: String,
}

/// Parameters for the `update_task_status` tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateTaskStatusParams {
    /// Target task block.
    #[schemars(description = "The UUID of the task block to update")]
    #[serde(default)]
    pub uuid: String,
    /// New status to set.
    #[schemars(description = "New task status")]
    pub status: Option<TaskStatus>,
}
