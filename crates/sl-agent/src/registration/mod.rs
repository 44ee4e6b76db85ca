//! Node registration and label mutation calls
//!
//! Every mutating call fetches a fresh CSRF crumb first and attaches it
//! when the coordinator issued one.

mod chunk;
mod crumb;

pub use chunk::{chunk_labels, LABEL_CHUNK_LIMIT};
pub use crumb::{fetch_crumb, CRUMB_PATH};

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode, Url};

use sl_core::error::ProtocolError;
use sl_core::traits::{NodeRegistrar, NodeRegistration};
use sl_core::{Candidate, LabelSet};

use crate::discovery::direct::join;
use crate::http::HttpContext;
use crate::xml::element_text;

/// Node creation endpoint
pub const CREATE_NODE_PATH: &str = "plugin/swarm/createSlave";
/// Label query endpoint
pub const GET_LABELS_PATH: &str = "plugin/swarm/getSlaveLabels";
/// Label append endpoint
pub const ADD_LABELS_PATH: &str = "plugin/swarm/addSlaveLabels";
/// Label removal endpoint
pub const REMOVE_LABELS_PATH: &str = "plugin/swarm/removeSlaveLabels";

/// Talks to the coordinator's node registry over HTTP
#[derive(Debug, Clone)]
pub struct RegistrationClient {
    http: HttpContext,
}

impl RegistrationClient {
    /// Create a client on top of the shared HTTP context
    pub fn new(http: HttpContext) -> Self {
        Self { http }
    }

    async fn with_crumb(&self, base: &Url, request: RequestBuilder) -> RequestBuilder {
        match fetch_crumb(&self.http, base).await {
            Some(crumb) => request.header(crumb.header_name.as_str(), crumb.header_value.as_str()),
            None => request,
        }
    }

    /// Send labels to `path`, one request per chunk. Stops at the first failure.
    async fn mutate_labels(
        &self,
        candidate: &Candidate,
        path: &str,
        operation: &'static str,
        name: &str,
        labels: &LabelSet,
    ) -> Result<(), ProtocolError> {
        let url = join(&candidate.url, path)?;
        let chunks = chunk_labels(labels.iter(), LABEL_CHUNK_LIMIT);
        let total = chunks.len();

        for (i, chunk) in chunks.into_iter().enumerate() {
            tracing::debug!("{} chunk {}/{} for node {}", operation, i + 1, total, name);
            let request = self.http.post(url.clone()).query(&[
                ("name", name),
                ("secret", candidate.secret.as_str()),
                ("labels", chunk.as_str()),
            ]);
            let request = self.with_crumb(&candidate.url, request).await;
            let response = request.send().await?;
            let status = response.status();
            if status != StatusCode::OK {
                return Err(ProtocolError::BadStatus {
                    operation,
                    status: status.as_u16(),
                    body: response.text().await.unwrap_or_default(),
                });
            }
        }
        Ok(())
    }
}

#[async_trait]
impl NodeRegistrar for RegistrationClient {
    async fn create_node(
        &self,
        candidate: &Candidate,
        registration: &NodeRegistration,
    ) -> Result<String, ProtocolError> {
        let url = join(&candidate.url, CREATE_NODE_PATH)?;
        let labels = registration.labels.joined();
        let defer_labels = labels.len() > LABEL_CHUNK_LIMIT;

        let mut query: Vec<(&str, String)> = vec![
            ("name", registration.name.clone()),
            ("executors", registration.executors.to_string()),
            ("remoteFsRoot", registration.fs_root.clone()),
            (
                "description",
                registration.description.clone().unwrap_or_default(),
            ),
            ("labels", if defer_labels { String::new() } else { labels }),
            ("secret", candidate.secret.clone()),
            ("mode", registration.mode.as_str().to_string()),
            (
                "deleteExistingClients",
                registration.delete_existing_clients.to_string(),
            ),
        ];
        for (tool, location) in &registration.tool_locations {
            query.push(("toolLocation", format!("{}:{}", tool, location)));
        }
        if let Some(hash) = &registration.hash {
            query.push(("hash", hash.clone()));
        }

        tracing::info!("Registering node {} with {}", registration.name, candidate);
        let request = self.http.post(url).query(&query);
        let request = self.with_crumb(&candidate.url, request).await;
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if status != StatusCode::OK {
            return Err(ProtocolError::BadStatus {
                operation: "create node",
                status: status.as_u16(),
                body,
            });
        }

        let name = parse_node_name(&body).unwrap_or_else(|| registration.name.clone());
        if name != registration.name {
            tracing::info!("Coordinator renamed node {} to {}", registration.name, name);
        }

        if defer_labels {
            tracing::debug!(
                "Sending {} labels separately to stay under the request size limit",
                registration.labels.len()
            );
            self.add_labels(candidate, &name, &registration.labels)
                .await?;
        }

        Ok(name)
    }

    async fn get_labels(
        &self,
        candidate: &Candidate,
        name: &str,
    ) -> Result<LabelSet, ProtocolError> {
        let url = join(&candidate.url, GET_LABELS_PATH)?;
        let response = self
            .http
            .get(url)
            .query(&[("name", name), ("secret", candidate.secret.as_str())])
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if status != StatusCode::OK {
            return Err(ProtocolError::BadStatus {
                operation: "get labels",
                status: status.as_u16(),
                body,
            });
        }

        let labels = element_text(&body, "labels")
            .map_err(|e| ProtocolError::Malformed {
                operation: "get labels",
                reason: e.to_string(),
            })?
            .ok_or_else(|| ProtocolError::Malformed {
                operation: "get labels",
                reason: "no labels element".to_string(),
            })?;
        Ok(LabelSet::parse(&labels))
    }

    async fn add_labels(
        &self,
        candidate: &Candidate,
        name: &str,
        labels: &LabelSet,
    ) -> Result<(), ProtocolError> {
        self.mutate_labels(candidate, ADD_LABELS_PATH, "add labels", name, labels)
            .await
    }

    async fn remove_labels(
        &self,
        candidate: &Candidate,
        name: &str,
        labels: &LabelSet,
    ) -> Result<(), ProtocolError> {
        self.mutate_labels(candidate, REMOVE_LABELS_PATH, "remove labels", name, labels)
            .await
    }
}

/// Extract `name=<value>` from a properties-style body
fn parse_node_name(body: &str) -> Option<String> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#') && !line.starts_with('!'))
        .find_map(|line| {
            let (key, value) = line.split_once(|c| c == '=' || c == ':')?;
            (key.trim() == "name").then(|| value.trim().to_string())
        })
        .filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_node_name() {
        assert_eq!(
            parse_node_name("#Generated\nname=builder-1a2b3c4d\n"),
            Some("builder-1a2b3c4d".to_string())
        );
        assert_eq!(parse_node_name("name : spaced "), Some("spaced".to_string()));
    }

    #[test]
    fn test_parse_node_name_missing() {
        assert_eq!(parse_node_name(""), None);
        assert_eq!(parse_node_name("other=value"), None);
        assert_eq!(parse_node_name("name="), None);
        assert_eq!(parse_node_name("# name=commented"), None);
    }
}
