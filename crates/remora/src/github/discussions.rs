//! Discussion fetching over the GraphQL API.
//!
//! Discussions, their comments, and nested replies are paginated resources;
//! cursors are threaded explicitly and every inner level is drained before
//! the outer level advances (replies before the next comment page, comment
//! pages before the next discussion page). The [`Discussion`] record types
//! are plain data, decoupled from the query transport.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{GitHub, GitHubError};

/// One discussion with all of its comments.
#[derive(Debug, Clone)]
pub struct Discussion {
    pub number: i64,
    pub title: String,
    pub body: String,
    pub author: String,
    pub category: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub comments: Vec<DiscussionComment>,
}

/// A top-level comment under a discussion.
#[derive(Debug, Clone)]
pub struct DiscussionComment {
    pub id: i64,
    pub author: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_answer: bool,
    pub replies: Vec<DiscussionReply>,
}

/// A reply nested under a comment.
#[derive(Debug, Clone)]
pub struct DiscussionReply {
    pub id: i64,
    pub author: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const DISCUSSIONS_QUERY: &str = r#"
query($owner: String!, $name: String!, $cursor: String) {
  repository(owner: $owner, name: $name) {
    discussions(first: 50, after: $cursor, orderBy: {field: UPDATED_AT, direction: DESC}) {
      nodes {
        number title body createdAt updatedAt
        author { login }
        category { name }
      }
      pageInfo { hasNextPage endCursor }
    }
  }
}"#;

const COMMENTS_QUERY: &str = r#"
query($owner: String!, $name: String!, $number: Int!, $cursor: String) {
  repository(owner: $owner, name: $name) {
    discussion(number: $number) {
      comments(first: 50, after: $cursor) {
        nodes {
          id databaseId body createdAt lastEditedAt isAnswer
          author { login }
          replies(first: 50) {
            nodes {
              databaseId body createdAt lastEditedAt
              author { login }
            }
            pageInfo { hasNextPage endCursor }
          }
        }
        pageInfo { hasNextPage endCursor }
      }
    }
  }
}"#;

const REPLIES_QUERY: &str = r#"
query($id: ID!, $cursor: String) {
  node(id: $id) {
    ... on DiscussionComment {
      replies(first: 50, after: $cursor) {
        nodes {
          databaseId body createdAt lastEditedAt
          author { login }
        }
        pageInfo { hasNextPage endCursor }
      }
    }
  }
}"#;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: bool,
    end_cursor: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AuthorNode {
    login: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DiscussionNode {
    number: i64,
    title: String,
    body: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    author: Option<AuthorNode>,
    category: CategoryNode,
}

#[derive(Debug, Deserialize)]
struct CategoryNode {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentNode {
    id: String,
    database_id: i64,
    body: String,
    created_at: DateTime<Utc>,
    last_edited_at: Option<DateTime<Utc>>,
    is_answer: bool,
    author: Option<AuthorNode>,
    replies: Connection<ReplyNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReplyNode {
    database_id: i64,
    body: String,
    created_at: DateTime<Utc>,
    last_edited_at: Option<DateTime<Utc>>,
    author: Option<AuthorNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Connection<T> {
    nodes: Vec<T>,
    page_info: PageInfo,
}

fn login(author: Option<AuthorNode>) -> String {
    author.map(|a| a.login).unwrap_or_else(|| "ghost".to_string())
}

/// Length of the leading run of nodes updated after `watermark`. Pages arrive
/// newest-first, so the first stale node ends the fresh prefix and everything
/// behind it is stale too.
fn fresh_len(nodes: &[DiscussionNode], watermark: DateTime<Utc>) -> usize {
    nodes
        .iter()
        .position(|n| n.updated_at <= watermark)
        .unwrap_or(nodes.len())
}

impl GitHub {
    /// Fetch all discussions updated strictly after `watermark`, with every
    /// comment and reply.
    pub async fn discussions_updated_after(
        &self,
        owner: &str,
        name: &str,
        watermark: DateTime<Utc>,
    ) -> Result<Vec<Discussion>, GitHubError> {
        let mut discussions = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let data = self
                .graphql(
                    DISCUSSIONS_QUERY,
                    json!({ "owner": owner, "name": name, "cursor": cursor }),
                )
                .await?;
            let page: Connection<DiscussionNode> =
                serde_json::from_value(data["repository"]["discussions"].clone())?;

            debug!(count = page.nodes.len(), "fetched discussion page");
            let fresh = fresh_len(&page.nodes, watermark);
            let hit_stale = fresh < page.nodes.len();
            for node in page.nodes.into_iter().take(fresh) {
                let comments = self.discussion_comments(owner, name, node.number).await?;
                discussions.push(Discussion {
                    number: node.number,
                    title: node.title,
                    body: node.body,
                    author: login(node.author),
                    category: node.category.name,
                    created_at: node.created_at,
                    updated_at: node.updated_at,
                    comments,
                });
            }

            // Newest-first ordering: once a stale node shows up, later pages
            // hold nothing newer.
            if hit_stale || !page.page_info.has_next_page {
                break;
            }
            cursor = page.page_info.end_cursor;
        }
        Ok(discussions)
    }

    async fn discussion_comments(
        &self,
        owner: &str,
        name: &str,
        number: i64,
    ) -> Result<Vec<DiscussionComment>, GitHubError> {
        let mut comments = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let data = self
                .graphql(
                    COMMENTS_QUERY,
                    json!({ "owner": owner, "name": name, "number": number, "cursor": cursor }),
                )
                .await?;
            let page: Connection<CommentNode> =
                serde_json::from_value(data["repository"]["discussion"]["comments"].clone())?;

            for node in page.nodes {
                let mut replies: Vec<DiscussionReply> =
                    node.replies.nodes.into_iter().map(to_reply).collect();
                // Drain reply pages beyond the first before moving on.
                let mut reply_page = node.replies.page_info;
                while reply_page.has_next_page {
                    let data = self
                        .graphql(
                            REPLIES_QUERY,
                            json!({ "id": node.id, "cursor": reply_page.end_cursor }),
                        )
                        .await?;
                    let more: Connection<ReplyNode> =
                        serde_json::from_value(data["node"]["replies"].clone())?;
                    replies.extend(more.nodes.into_iter().map(to_reply));
                    reply_page = more.page_info;
                }

                let updated_at = node.last_edited_at.unwrap_or(node.created_at);
                comments.push(DiscussionComment {
                    id: node.database_id,
                    author: login(node.author),
                    body: node.body,
                    created_at: node.created_at,
                    updated_at,
                    is_answer: node.is_answer,
                    replies,
                });
            }

            if !page.page_info.has_next_page {
                break;
            }
            cursor = page.page_info.end_cursor;
        }
        Ok(comments)
    }

    async fn graphql(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<serde_json::Value, GitHubError> {
        let payload = json!({ "query": query, "variables": variables });
        let resp: serde_json::Value = self.octocrab().graphql(&payload).await?;
        if let Some(errors) = resp.get("errors") {
            if errors.as_array().is_some_and(|a| !a.is_empty()) {
                return Err(GitHubError::GraphQl {
                    message: errors.to_string(),
                });
            }
        }
        Ok(resp.get("data").cloned().unwrap_or_default())
    }
}

fn to_reply(node: ReplyNode) -> DiscussionReply {
    let updated_at = node.last_edited_at.unwrap_or(node.created_at);
    DiscussionReply {
        id: node.database_id,
        author: login(node.author),
        body: node.body,
        created_at: node.created_at,
        updated_at,
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn node(number: i64, updated_at: DateTime<Utc>) -> DiscussionNode {
        DiscussionNode {
            number,
            title: format!("discussion {number}"),
            body: String::new(),
            created_at: updated_at,
            updated_at,
            author: None,
            category: CategoryNode {
                name: "General".into(),
            },
        }
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn fresh_prefix_stops_at_the_first_stale_node() {
        let nodes = vec![node(3, at(12)), node(2, at(10)), node(1, at(8))];
        assert_eq!(fresh_len(&nodes, at(9)), 2);
        assert_eq!(fresh_len(&nodes, at(10)), 1);
    }

    #[test]
    fn all_fresh_pages_keep_paginating() {
        let nodes = vec![node(2, at(12)), node(1, at(10))];
        assert_eq!(fresh_len(&nodes, at(8)), nodes.len());
    }

    #[test]
    fn fully_stale_page_yields_nothing() {
        let nodes = vec![node(2, at(6)), node(1, at(5))];
        assert_eq!(fresh_len(&nodes, at(9)), 0);
        assert_eq!(fresh_len(&[], at(9)), 0);
    }
}
