use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::{check_errors, Connection, GithubClient, GraphQlEnvelope, RepositoryNode};
use crate::config::Visibility;

const REPOSITORIES_QUERY: &str = r#"
query($org:String!, $cursor:String, $privacy: RepositoryPrivacy) {
  organization(login:$org) {
    repositories(
      first:100,
      after:$cursor,
      orderBy:{field: NAME, direction: ASC},
      privacy:$privacy
    ) {
      pageInfo { hasNextPage endCursor }
      nodes { name isFork isArchived isPrivate }
    }
  }
}"#;

#[derive(Debug, Default, Deserialize)]
struct RepositoriesData {
    #[serde(default)]
    organization: Option<OrganizationNode>,
}

#[derive(Debug, Deserialize)]
struct OrganizationNode {
    #[serde(default)]
    repositories: Connection<RepositoryNode>,
}

/// Filters applied while enumerating an organization's repositories.
#[derive(Debug, Clone)]
pub struct RepoFilter {
    pub include_forks: bool,
    pub include_archived: bool,
    pub visibility: Visibility,
    /// Cap on repositories that survive filtering; 0 means unlimited.
    pub max_repos: usize,
}

/// Lists repository names in the organization, name-ascending, applying
/// fork/archived/visibility filters and the optional cap. The cap counts
/// surviving repositories, not raw page nodes.
pub async fn list_repositories(
    client: &GithubClient,
    org: &str,
    filter: &RepoFilter,
) -> Result<Vec<String>> {
    let mut repos = Vec::new();
    let mut cursor: Option<String> = None;

    loop {
        let mut variables = Map::new();
        variables.insert("org".to_string(), Value::from(org));
        if let Some(cursor) = &cursor {
            variables.insert("cursor".to_string(), Value::from(cursor.clone()));
        }
        if let Some(privacy) = filter.visibility.privacy_filter() {
            variables.insert("privacy".to_string(), Value::from(privacy));
        }

        let body = client
            .graphql(REPOSITORIES_QUERY, Value::Object(variables))
            .await
            .with_context(|| format!("Failed to list repositories for {}", org))?;
        let envelope: GraphQlEnvelope<RepositoriesData> =
            serde_json::from_str(&body).context("Failed to parse repository listing response")?;
        check_errors(&envelope.errors)
            .with_context(|| format!("Repository listing for {} failed", org))?;

        let page = envelope
            .data
            .unwrap_or_default()
            .organization
            .map(|node| node.repositories)
            .unwrap_or_default();

        for node in page.nodes {
            if !filter.include_forks && node.is_fork {
                debug!("skipping fork {}", node.name);
                continue;
            }
            if !filter.include_archived && node.is_archived {
                debug!("skipping archived repository {}", node.name);
                continue;
            }
            debug!("found repository {} (private: {})", node.name, node.is_private);
            repos.push(node.name);
            if filter.max_repos > 0 && repos.len() >= filter.max_repos {
                info!("repository cap of {} reached", filter.max_repos);
                return Ok(repos);
            }
        }

        match page.page_info.end_cursor {
            Some(next) if page.page_info.has_next_page => cursor = Some(next),
            _ => break,
        }
    }

    Ok(repos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAGE_ONE: &str = r#"{"data":{"organization":{"repositories":{
        "pageInfo":{"hasNextPage":true,"endCursor":"CUR1"},
        "nodes":[
            {"name":"alpha","isFork":false,"isArchived":false,"isPrivate":false},
            {"name":"bravo","isFork":true,"isArchived":false,"isPrivate":false},
            {"name":"charlie","isFork":false,"isArchived":true,"isPrivate":false}
        ]}}}}"#;

    const PAGE_TWO: &str = r#"{"data":{"organization":{"repositories":{
        "pageInfo":{"hasNextPage":false,"endCursor":null},
        "nodes":[{"name":"delta","isFork":false,"isArchived":false,"isPrivate":true}]
        }}}}"#;

    const SINGLE_PAGE: &str = r#"{"data":{"organization":{"repositories":{
        "pageInfo":{"hasNextPage":false,"endCursor":null},
        "nodes":[
            {"name":"alpha","isFork":false,"isArchived":false,"isPrivate":false},
            {"name":"bravo","isFork":true,"isArchived":false,"isPrivate":false},
            {"name":"charlie","isFork":false,"isArchived":true,"isPrivate":false}
        ]}}}}"#;

    fn client_for(server: &MockServer) -> GithubClient {
        GithubClient::new("test-token")
            .unwrap()
            .with_endpoint(format!("{}/graphql", server.uri()))
    }

    fn default_filter() -> RepoFilter {
        RepoFilter {
            include_forks: false,
            include_archived: false,
            visibility: Visibility::All,
            max_repos: 0,
        }
    }

    #[tokio::test]
    async fn follows_cursors_and_filters_forks_and_archived() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE_ONE))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE_TWO))
            .expect(1)
            .mount(&server)
            .await;

        let repos = list_repositories(&client_for(&server), "acme", &default_filter())
            .await
            .unwrap();
        assert_eq!(repos, vec!["alpha".to_string(), "delta".to_string()]);
    }

    #[tokio::test]
    async fn include_flags_keep_forks_and_archived() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_string(SINGLE_PAGE))
            .mount(&server)
            .await;

        let filter = RepoFilter {
            include_forks: true,
            include_archived: true,
            ..default_filter()
        };
        let repos = list_repositories(&client_for(&server), "acme", &filter)
            .await
            .unwrap();
        assert_eq!(
            repos,
            vec!["alpha".to_string(), "bravo".to_string(), "charlie".to_string()]
        );
    }

    #[tokio::test]
    async fn repository_cap_stops_pagination_early() {
        let server = MockServer::start().await;
        // The cap is hit on the first page, so the second page must never be
        // requested.
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE_ONE))
            .expect(1)
            .mount(&server)
            .await;

        let filter = RepoFilter {
            max_repos: 1,
            ..default_filter()
        };
        let repos = list_repositories(&client_for(&server), "acme", &filter)
            .await
            .unwrap();
        assert_eq!(repos, vec!["alpha".to_string()]);
    }

    #[tokio::test]
    async fn graphql_errors_abort_the_listing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"data":null,"errors":[{"message":"org not found"},{"message":"try again"}]}"#,
            ))
            .mount(&server)
            .await;

        let err = list_repositories(&client_for(&server), "nope", &default_filter())
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("org not found; try again"));
    }
}
