use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use super::{check_errors, Connection, GithubClient, GraphQlEnvelope, PullRequestNode};
use crate::config::TimeWindow;
use crate::stats::Aggregate;

/// Author attribution when a PR carries no resolvable login (deleted
/// account, ghost author).
pub const UNKNOWN_AUTHOR: &str = "(unknown)";

const PULL_REQUESTS_QUERY: &str = r#"
query($owner:String!, $name:String!, $base:String!, $cursor:String) {
  repository(owner:$owner, name:$name) {
    pullRequests(
      first: 100
      after: $cursor
      states: MERGED
      orderBy: { field: UPDATED_AT, direction: DESC }
      baseRefName: $base
    ) {
      pageInfo { hasNextPage endCursor }
      nodes {
        number
        mergedAt
        additions
        deletions
        baseRefName
        author { login }
      }
    }
  }
}"#;

#[derive(Debug, Default, Deserialize)]
struct PullRequestsData {
    #[serde(default)]
    repository: Option<RepositoryPulls>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepositoryPulls {
    #[serde(default)]
    pull_requests: Connection<PullRequestNode>,
}

/// Accumulates merged-PR totals per author across the given base branches.
///
/// Pages are ordered by update time, not merge time, so merge timestamps are
/// not monotonic across pages; the window is applied per node and the scan
/// runs until history ends or the per-branch cap is hit.
pub async fn aggregate_pull_requests(
    client: &GithubClient,
    org: &str,
    repo: &str,
    branches: &[String],
    window: &TimeWindow,
    max_per_branch: usize,
) -> Result<HashMap<String, Aggregate>> {
    let mut totals: HashMap<String, Aggregate> = HashMap::new();

    for base in branches {
        let mut cursor: Option<String> = None;
        let mut scanned = 0usize;

        loop {
            let mut variables = Map::new();
            variables.insert("owner".to_string(), Value::from(org));
            variables.insert("name".to_string(), Value::from(repo));
            variables.insert("base".to_string(), Value::from(base.as_str()));
            if let Some(cursor) = &cursor {
                variables.insert("cursor".to_string(), Value::from(cursor.clone()));
            }

            let body = client
                .graphql(PULL_REQUESTS_QUERY, Value::Object(variables))
                .await
                .with_context(|| format!("repo {}/{} base {}", org, repo, base))?;
            let envelope: GraphQlEnvelope<PullRequestsData> = serde_json::from_str(&body)
                .with_context(|| {
                    format!("Failed to parse pull request page for {}/{}", org, repo)
                })?;
            check_errors(&envelope.errors)
                .with_context(|| format!("repo {}/{} base {}", org, repo, base))?;

            let page = envelope
                .data
                .unwrap_or_default()
                .repository
                .map(|node| node.pull_requests)
                .unwrap_or_default();
            if page.nodes.is_empty() {
                break;
            }

            let capped = scan_page(&page.nodes, window, max_per_branch, &mut scanned, &mut totals);
            if capped {
                debug!(
                    "scan cap of {} reached for {}/{} base {}",
                    max_per_branch, org, repo, base
                );
                break;
            }

            match page.page_info.end_cursor {
                Some(next) if page.page_info.has_next_page => cursor = Some(next),
                _ => break,
            }
        }
    }

    Ok(totals)
}

/// Applies one page of nodes to the running totals. Every node counts toward
/// `scanned`, capped or not; only nodes whose merge time falls inside the
/// window contribute to totals. Returns true once the cap is reached.
fn scan_page(
    nodes: &[PullRequestNode],
    window: &TimeWindow,
    max_per_branch: usize,
    scanned: &mut usize,
    totals: &mut HashMap<String, Aggregate>,
) -> bool {
    for node in nodes {
        *scanned += 1;
        let merged_at = node.merged_at.unwrap_or(DateTime::<Utc>::MIN_UTC);
        if window.contains(merged_at) {
            let login = node
                .author
                .as_ref()
                .map(|author| author.login.as_str())
                .filter(|login| !login.is_empty())
                .unwrap_or(UNKNOWN_AUTHOR);
            debug!(
                "PR #{} into {} by {}: +{} / -{}",
                node.number, node.base_ref_name, login, node.additions, node.deletions
            );
            totals
                .entry(login.to_string())
                .or_default()
                .record(node.additions, node.deletions);
        }
        if *scanned >= max_per_branch {
            return true;
        }
    }
    false
}
