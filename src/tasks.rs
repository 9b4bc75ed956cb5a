//! Task records, the task-listing reply parser, and the per-graph cache.
//!
//! The query scripts print tasks as line-oriented text with one
//! `Field: value` pair per line and a blank line between records. The
//! parser is a pure function over that text; the cache is the only shared
//! mutable state in the server.

use std::collections::HashMap;

use serde::Serialize;
use tokio::sync::RwLock;

/// A to-do item with status/priority metadata extracted from graph content.
///
/// Produced only by [`parse_tasks`]; never constructed from client input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Task {
    pub id: i64,
    pub uuid: String,
    pub title: String,
    pub status: String,
    pub priority: String,
}

/// Parse the line-oriented task listing emitted by the query scripts.
///
/// A blank line terminates the record in progress; the terminator is
/// optional at end of stream. Recognized field prefixes assign into the
/// current record; any other non-blank line still opens a record but is
/// otherwise ignored. An unparsable `Task ID` value is kept as 0 rather
/// than rejecting the record.
pub fn parse_tasks(output: &str) -> Vec<Task> {
    let mut tasks = Vec::new();
    let mut current: Option<Task> = None;

    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            if let Some(task) = current.take() {
                tasks.push(task);
            }
            continue;
        }

        let task = current.get_or_insert_with(Task::default);
        if let Some(rest) = line.strip_prefix("Task ID:") {
            task.id = rest.trim().parse().unwrap_or(0);
        } else if let Some(rest) = line.strip_prefix("UUID:") {
            task.uuid = rest.trim().to_string();
        } else if let Some(rest) = line.strip_prefix("Title:") {
            task.title = rest.trim().to_string();
        } else if let Some(rest) = line.strip_prefix("Status:") {
            task.status = rest.trim().to_string();
        } else if let Some(rest) = line.strip_prefix("Priority:") {
            task.priority = rest.trim().to_string();
        }
    }

    if let Some(task) = current.take() {
        tasks.push(task);
    }

    tasks
}

/// Per-graph task cache shared across concurrent tool and resource calls.
///
/// At most one entry per graph, replaced wholesale on each successful
/// listing. Reads take the shared lock, listing-triggered writes the
/// exclusive one; the lock is never held across a subprocess invocation.
#[derive(Debug, Default)]
pub struct TaskCache {
    inner: RwLock<HashMap<String, Vec<Task>>>,
}

impl TaskCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cache entry for `graph` with a freshly parsed listing.
    pub async fn replace(&self, graph: &str, tasks: Vec<Task>) {
        self.inner.write().await.insert(graph.to_string(), tasks);
    }

    /// Tasks currently cached for `graph`; empty if the graph was never
    /// listed.
    pub async fn get(&self, graph: &str) -> Vec<Task> {
        self.inner
            .read()
            .await
            .get(graph)
            .cloned()
            .unwrap_or_default()
    }

    /// All graphs with a cache entry, in no particular order.
    pub async fn graphs(&self) -> Vec<String> {
        self.inner.read().await.keys().cloned().collect()
    }
}
