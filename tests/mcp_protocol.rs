//! MCP protocol integration tests.
//!
//! Verifies the protocol round-trip over an in-memory duplex transport:
//! tool discovery, envelope-carried domain errors (with subprocess
//! call-count assertions against a recording executor), the task listing →
//! resource read round-trip, and staleness notifications after mutations.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rmcp::model::{
    CallToolRequestParams, ClientInfo, ReadResourceRequestParams, ResourceContents,
    ResourceUpdatedNotificationParam,
};
use rmcp::service::NotificationContext;
use rmcp::{ClientHandler, RoleClient, ServiceExt};
use tokio::sync::mpsc;

use logseq_mcp::script::{ScriptExecutor, ScriptFailure};
use logseq_mcp::server::LogseqMcpServer;

const TASK_LISTING: &str =
    "Task ID: 1\nUUID: abc\nTitle: Buy milk\nStatus: Todo\nPriority: High\n";

/// Executor that records invocations and replies with a canned result.
struct RecordingExecutor {
    calls: AtomicUsize,
    result: Result<String, ScriptFailure>,
}

impl RecordingExecutor {
    fn succeeding(output: &str) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            result: Ok(output.to_string()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScriptExecutor for RecordingExecutor {
    async fn execute(
        &self,
        _script: &str,
        _args: &[String],
        _extra_env: &[(String, String)],
    ) -> Result<String, ScriptFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

#[derive(Debug, Clone, Default)]
struct DummyClient;

impl ClientHandler for DummyClient {
    fn get_info(&self) -> ClientInfo {
        ClientInfo::default()
    }
}

/// Client that records resource-updated notifications.
#[derive(Debug, Clone)]
struct NotifyingClient {
    updates: mpsc::UnboundedSender<String>,
}

impl ClientHandler for NotifyingClient {
    fn get_info(&self) -> ClientInfo {
        ClientInfo::default()
    }

    async fn on_resource_updated(
        &self,
        params: ResourceUpdatedNotificationParam,
        _context: NotificationContext<RoleClient>,
    ) {
        let _ = self.updates.send(params.uri);
    }
}

fn call(name: &str, arguments: serde_json::Value) -> CallToolRequestParams {
    CallToolRequestParams {
        meta: None,
        name: name.to_string().into(),
        arguments: Some(arguments.as_object().expect("object arguments").clone()),
        task: None,
    }
}

fn text_of(result: &rmcp::model::CallToolResult) -> &str {
    result
        .content
        .first()
        .and_then(|c| c.raw.as_text())
        .map(|t| t.text.as_str())
        .expect("expected text content")
}

#[tokio::test]
async fn protocol_lists_all_tools() -> anyhow::Result<()> {
    let (server_transport, client_transport) = tokio::io::duplex(4096);

    let executor = RecordingExecutor::succeeding("");
    let server = LogseqMcpServer::with_executor(executor);
    let server_handle = tokio::spawn(async move {
        let service = server.serve(server_transport).await?;
        service.waiting().await?;
        anyhow::Ok(())
    });

    let client = DummyClient.serve(client_transport).await?;

    let tools = client.list_tools(None).await?;
    let mut names: Vec<&str> = tools.tools.iter().map(|t| t.name.as_ref()).collect();
    names.sort();
    assert_eq!(
        names,
        vec![
            "complete_task",
            "create_task",
            "find_tasks",
            "get_page",
            "get_task_info",
            "list_all_tasks",
            "list_pages",
            "list_properties",
            "list_tags",
            "list_tasks_by_status",
            "update_task_status",
        ]
    );

    client.cancel().await?;
    server_handle.await??;
    Ok(())
}

#[tokio::test]
async fn empty_graph_is_an_error_envelope_without_subprocess() -> anyhow::Result<()> {
    let (server_transport, client_transport) = tokio::io::duplex(4096);

    let executor = RecordingExecutor::succeeding(TASK_LISTING);
    let server = LogseqMcpServer::with_executor(Arc::clone(&executor) as _);
    let server_handle = tokio::spawn(async move {
        let service = server.serve(server_transport).await?;
        service.waiting().await?;
        anyhow::Ok(())
    });

    let client = DummyClient.serve(client_transport).await?;

    let result = client
        .call_tool(call("list_all_tasks", serde_json::json!({ "graph": "" })))
        .await?;

    assert_eq!(result.is_error, Some(true));
    assert_eq!(text_of(&result), "Error: graph parameter is required");
    assert_eq!(executor.calls(), 0);

    client.cancel().await?;
    server_handle.await??;
    Ok(())
}

#[tokio::test]
async fn create_task_without_content_is_an_error_envelope() -> anyhow::Result<()> {
    let (server_transport, client_transport) = tokio::io::duplex(4096);

    let executor = RecordingExecutor::succeeding("Created\n");
    let server = LogseqMcpServer::with_executor(Arc::clone(&executor) as _);
    let server_handle = tokio::spawn(async move {
        let service = server.serve(server_transport).await?;
        service.waiting().await?;
        anyhow::Ok(())
    });

    let client = DummyClient.serve(client_transport).await?;

    let result = client
        .call_tool(call("create_task", serde_json::json!({ "page": "Projects" })))
        .await?;

    assert_eq!(result.is_error, Some(true));
    assert_eq!(
        text_of(&result),
        "Error: page and content parameters are required"
    );
    assert_eq!(executor.calls(), 0);

    client.cancel().await?;
    server_handle.await??;
    Ok(())
}

#[tokio::test]
async fn listing_then_resource_read_round_trips_the_same_tasks() -> anyhow::Result<()> {
    let (server_transport, client_transport) = tokio::io::duplex(4096);

    let executor = RecordingExecutor::succeeding(TASK_LISTING);
    let server = LogseqMcpServer::with_executor(Arc::clone(&executor) as _);
    let server_handle = tokio::spawn(async move {
        let service = server.serve(server_transport).await?;
        service.waiting().await?;
        anyhow::Ok(())
    });

    let client = DummyClient.serve(client_transport).await?;

    let listing = client
        .call_tool(call("list_all_tasks", serde_json::json!({ "graph": "G" })))
        .await?;
    assert_ne!(listing.is_error, Some(true));
    assert_eq!(text_of(&listing), TASK_LISTING);

    let read = client
        .read_resource(ReadResourceRequestParams {
            meta: None,
            uri: "logseq://tasks/G".to_string(),
        })
        .await?;

    let ResourceContents::TextResourceContents {
        text, mime_type, ..
    } = &read.contents[0]
    else {
        panic!("expected text resource contents");
    };
    assert_eq!(mime_type.as_deref(), Some("application/json"));

    let tasks: serde_json::Value = serde_json::from_str(text)?;
    assert_eq!(
        tasks,
        serde_json::json!([{
            "id": 1,
            "uuid": "abc",
            "title": "Buy milk",
            "status": "Todo",
            "priority": "High",
        }])
    );

    // One call for the listing tool, one for the resource-triggered refresh.
    assert_eq!(executor.calls(), 2);

    client.cancel().await?;
    server_handle.await??;
    Ok(())
}

#[tokio::test]
async fn malformed_resource_uri_fails_the_call() -> anyhow::Result<()> {
    let (server_transport, client_transport) = tokio::io::duplex(4096);

    let executor = RecordingExecutor::succeeding(TASK_LISTING);
    let server = LogseqMcpServer::with_executor(executor);
    let server_handle = tokio::spawn(async move {
        let service = server.serve(server_transport).await?;
        service.waiting().await?;
        anyhow::Ok(())
    });

    let client = DummyClient.serve(client_transport).await?;

    let read = client
        .read_resource(ReadResourceRequestParams {
            meta: None,
            uri: "logseq://tasks".to_string(),
        })
        .await;
    assert!(read.is_err(), "expected a protocol-level failure");

    client.cancel().await?;
    server_handle.await??;
    Ok(())
}

#[tokio::test]
async fn successful_mutation_notifies_every_cached_graph() -> anyhow::Result<()> {
    let (server_transport, client_transport) = tokio::io::duplex(4096);

    let executor = RecordingExecutor::succeeding(TASK_LISTING);
    let server = LogseqMcpServer::with_executor(Arc::clone(&executor) as _);
    let server_handle = tokio::spawn(async move {
        let service = server.serve(server_transport).await?;
        service.waiting().await?;
        anyhow::Ok(())
    });

    let (updates_tx, mut updates_rx) = mpsc::unbounded_channel();
    let client = NotifyingClient {
        updates: updates_tx,
    }
    .serve(client_transport)
    .await?;

    // Cache graph G first; the notifier only covers graphs already listed.
    client
        .call_tool(call("list_all_tasks", serde_json::json!({ "graph": "G" })))
        .await?;

    let completed = client
        .call_tool(call("complete_task", serde_json::json!({ "uuid": "abc" })))
        .await?;
    assert_ne!(completed.is_error, Some(true));

    let uri = tokio::time::timeout(Duration::from_secs(5), updates_rx.recv())
        .await
        .expect("timed out waiting for resource update notification")
        .expect("notification channel closed");
    assert_eq!(uri, "logseq://tasks/G");

    // Exactly one cached graph, so exactly one notification.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(updates_rx.try_recv().is_err());

    client.cancel().await?;
    server_handle.await??;
    Ok(())
}
