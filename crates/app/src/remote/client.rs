use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use common::prelude::{
    NewNode, NewUser, Node, NodeStore, NodeUpdate, SearchQuery, StoreError, User, UserUpdate,
};

use super::error::RemoteError;

/// Status the remote API uses for "temporarily unavailable, try again"
pub const TRANSIENT_STATUS: u16 = 555;

/// [`NodeStore`] backed by the remote filesystem API
#[derive(Debug, Clone)]
pub struct HttpNodeStore {
    base: String,
    client: Client,
}

#[derive(Deserialize)]
struct UserEnvelope {
    user: User,
}

#[derive(Deserialize)]
struct NodeEnvelope {
    node: Node,
}

#[derive(Deserialize)]
struct NodesEnvelope {
    nodes: Vec<Node>,
}

#[derive(Serialize)]
struct AuthBody<'a> {
    key: &'a str,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

impl HttpNodeStore {
    pub fn new(base_url: &Url, api_key: &str) -> Result<Self, RemoteError> {
        if base_url.cannot_be_a_base() {
            return Err(RemoteError::BaseUrl(base_url.to_string()));
        }

        let mut default_headers = HeaderMap::new();
        default_headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let mut auth = HeaderValue::from_str(&format!("bearer {}", api_key))?;
        auth.set_sensitive(true);
        default_headers.insert(AUTHORIZATION, auth);
        let client = Client::builder().default_headers(default_headers).build()?;

        Ok(Self {
            base: base_url.as_str().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> Result<String, StoreError> {
        let response = request
            .send()
            .await
            .map_err(|e| StoreError::Transient(format!("request failed: {e}")))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| StoreError::Transient(format!("reading response failed: {e}")))?;

        if status.is_success() {
            Ok(body)
        } else {
            Err(classify(status, &body, what))
        }
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> Result<T, StoreError> {
        let body = self.send(request, what).await?;
        serde_json::from_str(&body)
            .map_err(|e| StoreError::Internal(format!("unexpected response for {what}: {e}")))
    }
}

/// Map a non-success response onto the store error taxonomy
fn classify(status: StatusCode, body: &str, what: &str) -> StoreError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error)
        .unwrap_or_else(|_| {
            status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| body.to_string())
        });

    match status.as_u16() {
        TRANSIENT_STATUS => StoreError::Transient(message),
        404 => StoreError::NotFound(what.to_string()),
        code => StoreError::Rejected {
            status: code,
            message,
        },
    }
}

fn encode<T: Serialize>(value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value)
        .map_err(|e| StoreError::Internal(format!("failed to encode search query: {e}")))
}

/// Query string for a search; filters travel as JSON-encoded values
fn search_params(query: &SearchQuery) -> Result<Vec<(&'static str, String)>, StoreError> {
    let mut params = Vec::new();
    if let Some(after) = &query.after {
        params.push(("after", after.clone()));
    }
    if !query.match_fields.is_empty() {
        params.push(("match", encode(&query.match_fields)?));
    }
    if !query.regex_match.is_empty() {
        params.push(("regexMatch", encode(&query.regex_match)?));
    }
    Ok(params)
}

#[async_trait]
impl NodeStore for HttpNodeStore {
    async fn get_user(&self, username: &str) -> Result<User, StoreError> {
        let request = self.client.get(self.url(&format!("/users/{username}")));
        let envelope: UserEnvelope = self.fetch(request, &format!("user {username}")).await?;
        Ok(envelope.user)
    }

    async fn create_user(&self, user: &NewUser) -> Result<User, StoreError> {
        let request = self.client.post(self.url("/users")).json(user);
        self.send(request, &format!("user {}", user.username))
            .await?;
        Ok(User {
            username: user.username.clone(),
            email: user.email.clone(),
            salt: Some(user.salt.clone()),
        })
    }

    async fn update_user(&self, username: &str, update: &UserUpdate) -> Result<(), StoreError> {
        let request = self
            .client
            .put(self.url(&format!("/users/{username}")))
            .json(update);
        self.send(request, &format!("user {username}")).await?;
        Ok(())
    }

    async fn delete_user(&self, username: &str) -> Result<(), StoreError> {
        let request = self.client.delete(self.url(&format!("/users/{username}")));
        self.send(request, &format!("user {username}")).await?;
        Ok(())
    }

    async fn authenticate_user(&self, username: &str, key: &str) -> Result<bool, StoreError> {
        let request = self
            .client
            .post(self.url(&format!("/users/{username}/auth")))
            .json(&AuthBody { key });
        match self.send(request, &format!("user {username}")).await {
            Ok(_) => Ok(true),
            Err(StoreError::Rejected { status: 401 | 403, .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn search_nodes(
        &self,
        owner: &str,
        query: &SearchQuery,
    ) -> Result<Vec<Node>, StoreError> {
        let request = self
            .client
            .get(self.url(&format!("/filesystem/{owner}/search")))
            .query(&search_params(query)?);
        let envelope: NodesEnvelope = self.fetch(request, &format!("nodes of {owner}")).await?;
        Ok(envelope.nodes)
    }

    async fn get_nodes(&self, owner: &str, ids: &[String]) -> Result<Vec<Node>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let request = self
            .client
            .get(self.url(&format!("/filesystem/{owner}/{}", ids.join("/"))));
        match self.fetch::<NodesEnvelope>(request, "nodes").await {
            Ok(envelope) => Ok(envelope.nodes),
            // the remote answers 404 when none of the ids resolve
            Err(StoreError::NotFound(_)) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    async fn create_node(&self, owner: &str, node: &NewNode) -> Result<Node, StoreError> {
        let request = self
            .client
            .post(self.url(&format!("/filesystem/{owner}")))
            .json(node);
        let envelope: NodeEnvelope = self.fetch(request, &format!("user {owner}")).await?;
        Ok(envelope.node)
    }

    async fn update_node(
        &self,
        owner: &str,
        id: &str,
        update: &NodeUpdate,
    ) -> Result<(), StoreError> {
        let request = self
            .client
            .put(self.url(&format!("/filesystem/{owner}/{id}")))
            .json(update);
        self.send(request, &format!("node {id}")).await?;
        Ok(())
    }

    async fn delete_nodes(&self, owner: &str, ids: &[String]) -> Result<(), StoreError> {
        if ids.is_empty() {
            return Ok(());
        }
        let request = self
            .client
            .delete(self.url(&format!("/filesystem/{owner}/{}", ids.join("/"))));
        self.send(request, "nodes").await?;
        Ok(())
    }
}
