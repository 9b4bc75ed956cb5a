//! MCP ServerHandler implementation for Logseq.
//!
//! Provides the MCP server with query tools (backed by the script runtime)
//! and API tools (backed by Logseq's HTTP API):
//!
//! **Query tools (script runtime)**
//! - `list_all_tasks` — List every task in a graph
//! - `list_tasks_by_status` — List tasks grouped by status
//! - `find_tasks` — Find tasks matching criteria
//! - `list_pages` — List all pages in a graph
//! - `get_page` — Get a page's content including its blocks
//! - `list_tags` — List all tags in a graph
//! - `list_properties` — List all properties in a graph
//!
//! **API tools (require Logseq running with its HTTP API enabled)**
//! - `create_task` — Create a task on a page
//! - `complete_task` — Mark a task Done
//! - `get_task_info` — Look up a single task by UUID
//! - `update_task_status` — Set a task's status
//!
//! Task listings are additionally exposed as `logseq://tasks/{graph}`
//! resources; successful mutations announce possible staleness for every
//! cached graph, off the critical path.

use std::path::PathBuf;
use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    AnnotateAble, CallToolResult, Content, Implementation, ListResourcesResult,
    PaginatedRequestParams, ProtocolVersion, RawResource, ReadResourceRequestParams,
    ReadResourceResult, ResourceContents, ResourceUpdatedNotificationParam, ServerCapabilities,
    ServerInfo,
};
use rmcp::service::{Peer, RequestContext};
use rmcp::{tool, tool_handler, tool_router, ErrorData as McpError, RoleServer, ServerHandler};
use tracing::warn;

use crate::script::{ApiCall, ProcessExecutor, ScriptExecutor, ScriptRunner};
use crate::tasks::TaskCache;
use crate::tools::*;

/// Logseq MCP server handler with query tools, API tools, and the
/// per-graph tasks resource.
#[derive(Clone)]
pub struct LogseqMcpServer {
    tool_router: ToolRouter<Self>,
    runner: Arc<ScriptRunner>,
    cache: Arc<TaskCache>,
}

impl LogseqMcpServer {
    /// Create a server that shells out to the script wrapper at `runner`.
    pub fn new(runner: impl Into<PathBuf>) -> Self {
        Self::with_executor(Arc::new(ProcessExecutor::new(runner)))
    }

    /// Create a server over an arbitrary executor. Tests substitute a
    /// recording executor here to assert subprocess call counts.
    pub fn with_executor(executor: Arc<dyn ScriptExecutor>) -> Self {
        let cache = Arc::new(TaskCache::new());
        Self {
            tool_router: Self::tool_router(),
            runner: Arc::new(ScriptRunner::new(executor, Arc::clone(&cache))),
            cache,
        }
    }

    /// Run a validated API operation and, when it both succeeds and
    /// mutates graph content, fire the staleness announcements.
    async fn finish_api_call(&self, call: ApiCall, peer: Peer<RoleServer>) -> CallToolResult {
        let outcome = self.runner.run_api(&call).await;
        if outcome.is_ok() && call.mutates() {
            self.notify_tasks_changed(peer);
        }
        reply(outcome)
    }

    /// Announce that cached task resources may be stale.
    ///
    /// Detached from the originating request: runs on its own task, reads
    /// the cache snapshot at fire time, and only logs send failures. A
    /// graph appears here only if some earlier listing call cached it.
    fn notify_tasks_changed(&self, peer: Peer<RoleServer>) {
        let cache = Arc::clone(&self.cache);
        tokio::spawn(async move {
            for graph in cache.graphs().await {
                let uri = tasks_uri(&graph);
                if let Err(err) = peer
                    .notify_resource_updated(ResourceUpdatedNotificationParam { uri: uri.clone() })
                    .await
                {
                    warn!("failed to send resource update notification for {uri}: {err}");
                }
            }
        });
    }
}

#[tool_handler(router = self.tool_router)]
impl ServerHandler for LogseqMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            server_info: Implementation {
                name: "logseq-mcp".to_string(),
                title: Some("Logseq MCP Server".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                description: Some(
                    "MCP server providing programmatic access to Logseq via query scripts \
                     and the Logseq HTTP API"
                        .to_string(),
                ),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Logseq is a local-first knowledge base organized into named graphs. \
                 Query tools (list_all_tasks, list_tasks_by_status, find_tasks, list_pages, \
                 get_page, list_tags, list_properties) read a graph through its query-script \
                 runtime and require a 'graph' argument. \
                 API tools (create_task, complete_task, get_task_info, update_task_status) \
                 go through the Logseq HTTP API and require Logseq to be running with the \
                 HTTP API feature enabled. \
                 Task listings are also exposed as resources at logseq://tasks/{graph}."
                    .to_string(),
            ),
        }
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        let mut resources = vec![RawResource {
            uri: "logseq://tasks/{graph}".to_string(),
            name: "logseq-tasks".to_string(),
            title: Some("Logseq Tasks".to_string()),
            description: Some(
                "All tasks in a Logseq graph. Use URI pattern: logseq://tasks/{graph}".to_string(),
            ),
            mime_type: Some("application/json".to_string()),
            size: None,
            icons: None,
            meta: None,
        }
        .no_annotation()];

        for graph in self.cache.graphs().await {
            resources.push(
                RawResource {
                    uri: tasks_uri(&graph),
                    name: graph.clone(),
                    title: Some(format!("Tasks: {graph}")),
                    description: Some(format!("Cached task listing for graph '{graph}'")),
                    mime_type: Some("application/json".to_string()),
                    size: None,
                    icons: None,
                    meta: None,
                }
                .no_annotation(),
            );
        }

        Ok(ListResourcesResult {
            meta: None,
            next_cursor: None,
            resources,
        })
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        let uri = request.uri;
        let graph = parse_tasks_uri(&uri).ok_or_else(|| {
            McpError::invalid_params("invalid URI format, expected: logseq://tasks/{graph}", None)
        })?;

        // Refresh before reading; a failed refresh falls back to whatever
        // is already cached.
        if let Err(err) = self
            .runner
            .run_query("list_all_tasks.cljs", &graph, &[])
            .await
        {
            warn!("task refresh for resource {uri} failed: {err}");
        }

        let tasks = self.cache.get(&graph).await;
        let payload = serde_json::to_string(&tasks)
            .map_err(|err| McpError::internal_error(err.to_string(), None))?;

        Ok(ReadResourceResult {
            contents: vec![ResourceContents::TextResourceContents {
                uri,
                mime_type: Some("application/json".to_string()),
                text: payload,
                meta: None,
            }],
        })
    }
}

#[tool_router(router = tool_router)]
impl LogseqMcpServer {
    // ── Query tools (script runtime) ──

    /// List every task in a graph.
    #[tool(
        name = "list_all_tasks",
        description = "List all tasks from a Logseq graph database. Returns task ID, UUID, title, status, and priority."
    )]
    pub async fn list_all_tasks(
        &self,
        Parameters(params): Parameters<GraphParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(reply(
            self.runner
                .run_query("list_all_tasks.cljs", &params.graph, &[])
                .await,
        ))
    }

    /// List tasks grouped by their workflow status.
    #[tool(
        name = "list_tasks_by_status",
        description = "List tasks grouped by status (Todo, Doing, Done, Backlog) from a Logseq graph."
    )]
    pub async fn list_tasks_by_status(
        &self,
        Parameters(params): Parameters<GraphParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(reply(
            self.runner
                .run_query("list_tasks_by_status.cljs", &params.graph, &[])
                .await,
        ))
    }

    /// Find tasks matching the query script's criteria.
    #[tool(
        name = "find_tasks",
        description = "Find tasks matching specific criteria in a Logseq graph."
    )]
    pub async fn find_tasks(
        &self,
        Parameters(params): Parameters<GraphParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(reply(
            self.runner
                .run_query("find_tasks.cljs", &params.graph, &[])
                .await,
        ))
    }

    /// List all pages in a graph.
    #[tool(
        name = "list_pages",
        description = "List all pages in a graph. Pass expand=true for created-at and updated-at timestamps."
    )]
    pub async fn list_pages(
        &self,
        Parameters(params): Parameters<ExpandParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(reply(
            self.runner
                .run_query(
                    "list_pages.cljs",
                    &params.graph,
                    &[params.expand.to_string()],
                )
                .await,
        ))
    }

    /// Get a page's content including its blocks.
    #[tool(
        name = "get_page",
        description = "Get a page's content including its blocks. A property and a tag are pages."
    )]
    pub async fn get_page(
        &self,
        Parameters(params): Parameters<GetPageParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(reply(
            self.runner
                .run_query("get_page.cljs", &params.graph, &[params.page_name])
                .await,
        ))
    }

    /// List all tags in a graph.
    #[tool(
        name = "list_tags",
        description = "List all tags in a graph. Pass expand=true for parents/extends and tag properties."
    )]
    pub async fn list_tags(
        &self,
        Parameters(params): Parameters<ExpandParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(reply(
            self.runner
                .run_query("list_tags.cljs", &params.graph, &[params.expand.to_string()])
                .await,
        ))
    }

    /// List all properties in a graph.
    #[tool(
        name = "list_properties",
        description = "List all properties in a graph. Pass expand=true for property type and cardinality."
    )]
    pub async fn list_properties(
        &self,
        Parameters(params): Parameters<ExpandParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(reply(
            self.runner
                .run_query(
                    "list_properties.cljs",
                    &params.graph,
                    &[params.expand.to_string()],
                )
                .await,
        ))
    }

    // ── API tools (Logseq HTTP API) ──

    /// Create a new task on a page.
    #[tool(
        name = "create_task",
        description = "Create a new task in Logseq via API. Requires Logseq to be running with HTTP API enabled."
    )]
    pub async fn create_task(
        &self,
        peer: Peer<RoleServer>,
        Parameters(params): Parameters<CreateTaskParams>,
    ) -> Result<CallToolResult, McpError> {
        if params.page.is_empty() || params.content.is_empty() {
            return Ok(reply(Err(
                "Error: page and content parameters are required".to_string()
            )));
        }

        let call = ApiCall::CreateTask {
            page: params.page,
            content: params.content,
            status: params.status,
            priority: params.priority,
        };
        Ok(self.finish_api_call(call, peer).await)
    }

    /// Mark a task as Done.
    #[tool(
        name = "complete_task",
        description = "Mark a task as complete (Done status) via API. Requires Logseq running."
    )]
    pub async fn complete_task(
        &self,
        peer: Peer<RoleServer>,
        Parameters(params): Parameters<TaskUuidParams>,
    ) -> Result<CallToolResult, McpError> {
        if params.uuid.is_empty() {
            return Ok(reply(Err("Error: uuid parameter is required".to_string())));
        }

        let call = ApiCall::CompleteTask { uuid: params.uuid };
        Ok(self.finish_api_call(call, peer).await)
    }

    /// Look up a single task block by UUID.
    #[tool(
        name = "get_task_info",
        description = "Get a task block's details by UUID via API. Requires Logseq running."
    )]
    pub async fn get_task_info(
        &self,
        peer: Peer<RoleServer>,
        Parameters(params): Parameters<TaskUuidParams>,
    ) -> Result<CallToolResult, McpError> {
        if params.uuid.is_empty() {
            return Ok(reply(Err("Error: uuid parameter is required".to_string())));
        }

        let call = ApiCall::TaskInfo { uuid: params.uuid };
        Ok(self.finish_api_call(call, peer).await)
    }

    /// Set a task's workflow status.
    #[tool(
        name = "update_task_status",
        description = "Update the status of a task via API. Requires Logseq running."
    )]
    pub async fn update_task_status(
        &self,
        peer: Peer<RoleServer>,
        Parameters(params): Parameters<UpdateTaskStatusParams>,
    ) -> Result<CallToolResult, McpError> {
        let (uuid, status) = match (params.uuid.is_empty(), params.status) {
            (false, Some(status)) => (params.uuid, status),
            _ => {
                return Ok(reply(Err(
                    "Error: uuid and status parameters are required".to_string()
                )))
            }
        };

        let call = ApiCall::UpdateTaskStatus { uuid, status };
        Ok(self.finish_api_call(call, peer).await)
    }
}

/// Wrap reply text in the uniform envelope; `Err` text sets the error flag.
fn reply(outcome: Result<String, String>) -> CallToolResult {
    match outcome {
        Ok(text) => CallToolResult::success(vec![Content::text(text)]),
        Err(text) => CallToolResult::error(vec![Content::text(text)]),
    }
}

/// Resource URI for a graph's task listing.
fn tasks_uri(graph: &str) -> String {
    format!("logseq://tasks/{graph}")
}

/// Extract the graph segment of a `logseq://tasks/{graph}` URI.
///
/// Slash-segment indexing mirrors the original wire contract: the fourth
/// segment is the graph, and trailing segments are tolerated.
fn parse_tasks_uri(uri: &str) -> Option<String> {
    let parts: Vec<&str> = uri.split('/').collect();
    if parts.len() < 4 || parts[0] != "logseq:" || parts[2] != "tasks" {
        return None;
    }
    Some(parts[3].to_string())
}
