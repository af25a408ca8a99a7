//! HTTP client for end-to-end tests
//!
//! This module provides a high-level HTTP client that wraps reqwest
//! and provides methods for all sample-server endpoints.
//!
//! When API routes or request formats change, update only this file.

use super::constants::*;
use reqwest::Response;
use std::time::Duration;

/// HTTP test client acting as one upload source
pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
    /// Upload token sent with authenticated requests, if any
    token: Option<String>,
}

impl TestClient {
    /// Creates a client that sends no upload token
    ///
    /// Use this for testing authentication failures and public endpoints.
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self {
            client,
            base_url,
            token: None,
        }
    }

    /// Creates a client that authenticates with the given upload token
    ///
    /// This is the most common way to create a test client.
    pub fn for_source(base_url: String, token: &str) -> Self {
        let mut client = Self::new(base_url);
        client.token = Some(token.to_owned());
        client
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.header("Authorization", format!("Bearer {}", token)),
            None => request,
        }
    }

    // ========================================================================
    // Upload Endpoints
    // ========================================================================

    /// POST /upload
    pub async fn upload(&self, body: Vec<u8>) -> Response {
        self.authorize(self.client.post(format!("{}/upload", self.base_url)))
            .body(body)
            .send()
            .await
            .expect("Upload request failed")
    }

    /// POST /upload with the token in the query string instead of the header
    ///
    /// Devices in the field still authenticate with `?token=`.
    pub async fn upload_with_query_token(&self, body: Vec<u8>, token: &str) -> Response {
        self.client
            .post(format!(
                "{}/upload?token={}",
                self.base_url,
                urlencoding::encode(token)
            ))
            .body(body)
            .send()
            .await
            .expect("Upload request failed")
    }

    // ========================================================================
    // Listing Endpoints
    // ========================================================================

    /// GET /sources
    pub async fn list_sources(&self) -> Response {
        self.client
            .get(format!("{}/sources", self.base_url))
            .send()
            .await
            .expect("List sources request failed")
    }

    // ========================================================================
    // Sample Endpoints
    // ========================================================================

    /// POST /samples/{sample_id}/hidden
    pub async fn toggle_hidden(&self, sample_id: u64) -> Response {
        self.authorize(
            self.client
                .post(format!("{}/samples/{}/hidden", self.base_url, sample_id)),
        )
        .send()
        .await
        .expect("Toggle hidden request failed")
    }

    /// GET /uploads/{source_id}/{file_name}
    pub async fn fetch_audio(&self, source_id: &str, file_name: &str) -> Response {
        self.client
            .get(format!(
                "{}/uploads/{}/{}",
                self.base_url, source_id, file_name
            ))
            .send()
            .await
            .expect("Fetch audio request failed")
    }

    /// GET /uploads/{source_id}/{file_name} with Range header
    pub async fn fetch_audio_with_range(
        &self,
        source_id: &str,
        file_name: &str,
        range: &str,
    ) -> Response {
        self.client
            .get(format!(
                "{}/uploads/{}/{}",
                self.base_url, source_id, file_name
            ))
            .header("Range", range)
            .send()
            .await
            .expect("Fetch audio with range request failed")
    }

    // ========================================================================
    // Health Check / System Endpoints
    // ========================================================================

    /// GET /
    pub async fn home(&self) -> Response {
        self.client
            .get(format!("{}/", self.base_url))
            .send()
            .await
            .expect("Home request failed")
    }
}
