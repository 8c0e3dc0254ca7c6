//! HTTP client for the hosted auth + relational data platform.

use campusnet_shared::{
    ApiError, AuthUser, CommentRecord, NewComment, NewPost, NewVote, PostRecord, ProfileMetadata,
    Session,
};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;

/// HTTP client for the platform's auth and relational endpoints.
///
/// Every request carries the publishable API key; authenticated requests add
/// the session's bearer token on top.
#[derive(Debug, Clone)]
pub struct PlatformClient {
    client: Client,
    base_url: String,
    api_key: String,
    access_token: Option<String>,
}

impl PlatformClient {
    /// Create a new platform client.
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: String::new(),
            api_key: String::new(),
            access_token: None,
        }
    }

    /// Set the base URL for platform requests.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the publishable API key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    /// Attach (or clear) the session bearer token.
    pub fn with_access_token(mut self, token: Option<String>) -> Self {
        self.access_token = token;
        self
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }

    fn apply_headers(&self, mut rb: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if !self.api_key.is_empty() {
            rb = rb.header("apikey", &self.api_key);
        }
        let bearer = self.access_token.as_deref().unwrap_or(&self.api_key);
        if !bearer.is_empty() {
            rb = rb.header("Authorization", format!("Bearer {bearer}"));
        }
        rb
    }

    async fn read_json<TRes: DeserializeOwned>(
        resp: reqwest::Response,
    ) -> Result<TRes, ApiError> {
        let status = resp.status().as_u16();
        let is_success = resp.status().is_success();

        let text = resp
            .text()
            .await
            .map_err(|e| ApiError::Network(format!("failed to read body: {e}")))?;

        if !is_success {
            return Err(ApiError::Http { status, body: text });
        }

        if text.is_empty() {
            serde_json::from_str("null").map_err(|e| ApiError::Deserialize(e.to_string()))
        } else {
            serde_json::from_str(&text).map_err(|e| ApiError::Deserialize(e.to_string()))
        }
    }

    /// Make a GET request.
    pub async fn get_json<TRes: DeserializeOwned>(&self, path: &str) -> Result<TRes, ApiError> {
        let rb = self.apply_headers(self.client.get(self.url(path)));
        let resp = rb.send().await.map_err(|e| ApiError::Network(e.to_string()))?;
        Self::read_json(resp).await
    }

    /// Make a POST request with a JSON body and optional `Prefer` header.
    pub async fn post_json<TReq: Serialize, TRes: DeserializeOwned>(
        &self,
        path: &str,
        body: &TReq,
        prefer: Option<&str>,
    ) -> Result<TRes, ApiError> {
        let mut rb = self.apply_headers(self.client.post(self.url(path))).json(body);
        if let Some(prefer) = prefer {
            rb = rb.header("Prefer", prefer);
        }
        let resp = rb.send().await.map_err(|e| ApiError::Network(e.to_string()))?;
        Self::read_json(resp).await
    }

    /// Make a PUT request with a JSON body.
    pub async fn put_json<TReq: Serialize, TRes: DeserializeOwned>(
        &self,
        path: &str,
        body: &TReq,
    ) -> Result<TRes, ApiError> {
        let rb = self.apply_headers(self.client.put(self.url(path))).json(body);
        let resp = rb.send().await.map_err(|e| ApiError::Network(e.to_string()))?;
        Self::read_json(resp).await
    }

    // --- Auth endpoints ---

    /// Exchange credentials for a session.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, ApiError> {
        self.post_json(
            "/auth/v1/token?grant_type=password",
            &json!({ "email": email, "password": password }),
            None,
        )
        .await
    }

    /// Fetch the user behind the current access token.
    pub async fn get_user(&self) -> Result<AuthUser, ApiError> {
        self.get_json("/auth/v1/user").await
    }

    /// Write the user-metadata mirror of the profile.
    pub async fn update_user_metadata(
        &self,
        data: &ProfileMetadata,
    ) -> Result<AuthUser, ApiError> {
        self.put_json("/auth/v1/user", &json!({ "data": data })).await
    }

    /// Revoke the current session.
    pub async fn sign_out(&self) -> Result<(), ApiError> {
        let _: serde_json::Value = self
            .post_json("/auth/v1/logout", &json!({}), None)
            .await?;
        Ok(())
    }

    // --- Relational endpoints ---

    /// All posts, newest first, with votes embedded.
    pub async fn fetch_posts(&self) -> Result<Vec<PostRecord>, ApiError> {
        self.get_json("/rest/v1/posts?select=*,votes(user_id,type)&order=created_at.desc")
            .await
    }

    /// Insert a post and return the stored row.
    pub async fn insert_post(&self, post: &NewPost) -> Result<PostRecord, ApiError> {
        let rows: Vec<PostRecord> = self
            .post_json("/rest/v1/posts", &[post], Some("return=representation"))
            .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| ApiError::Deserialize("insert returned no rows".to_string()))
    }

    /// Comments for one post, oldest first.
    pub async fn fetch_comments(&self, post_id: &str) -> Result<Vec<CommentRecord>, ApiError> {
        self.get_json(&format!(
            "/rest/v1/comments?select=*&post_id=eq.{post_id}&order=created_at.asc"
        ))
        .await
    }

    /// Insert a comment and return the stored row.
    pub async fn insert_comment(&self, comment: &NewComment) -> Result<CommentRecord, ApiError> {
        let rows: Vec<CommentRecord> = self
            .post_json("/rest/v1/comments", &[comment], Some("return=representation"))
            .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| ApiError::Deserialize("insert returned no rows".to_string()))
    }

    /// Upsert a vote keyed by (post, user), so re-votes merge instead of
    /// duplicating.
    pub async fn upsert_vote(&self, vote: &NewVote) -> Result<(), ApiError> {
        let _: serde_json::Value = self
            .post_json(
                "/rest/v1/votes?on_conflict=post_id,user_id",
                &[vote],
                Some("resolution=merge-duplicates"),
            )
            .await?;
        Ok(())
    }
}

impl Default for PlatformClient {
    fn default() -> Self {
        Self::new()
    }
}
