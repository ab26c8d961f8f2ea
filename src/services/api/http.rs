//! HTTP implementation of [`BackendApi`].
//!
//! `smolhttp` is a blocking client, so every request runs inside
//! `smol::unblock` and resolves on the executor without blocking the
//! event loop.

use anyhow::{Result, anyhow};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use super::{
    BackendApi, ConnectRequest, ErrorBody, HealthResponse, QueryData, QueryRequest, QueryResponse,
    SchemaResponse,
};

const DEFAULT_BASE_URL: &str = "http://localhost:1234";

#[derive(Debug, Clone)]
pub struct HttpBackendApi {
    base_url: String,
}

impl HttpBackendApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url }
    }

    /// Client against the default local backend.
    pub fn localhost() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_json<T: DeserializeOwned + Send + 'static>(
        &self,
        path: &str,
        body: String,
    ) -> Result<T> {
        let url = self.endpoint(path);
        smol::unblock(move || {
            let response = smolhttp::Client::new(&url)
                .map_err(|e| anyhow!("Failed to create HTTP client: {}", e))?
                .post()
                .headers(vec![(
                    "content-type".to_string(),
                    "application/json".to_string(),
                )])
                .body(body.into())
                .send()
                .map_err(|e| anyhow!("Request to {} failed: {}", url, e))?;
            parse_body(&response.text())
        })
        .await
    }

    async fn get_json<T: DeserializeOwned + Send + 'static>(&self, path: &str) -> Result<T> {
        let url = self.endpoint(path);
        smol::unblock(move || {
            let response = smolhttp::Client::new(&url)
                .map_err(|e| anyhow!("Failed to create HTTP client: {}", e))?
                .get()
                .send()
                .map_err(|e| anyhow!("Request to {} failed: {}", url, e))?;
            parse_body(&response.text())
        })
        .await
    }
}

/// Decode a response body, preferring the backend's own error message
/// when the payload is an error envelope.
fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T> {
    match serde_json::from_str::<T>(body) {
        Ok(value) => Ok(value),
        Err(parse_err) => {
            if let Ok(error) = serde_json::from_str::<ErrorBody>(body) {
                return Err(anyhow!(error.message));
            }
            Err(anyhow!("Failed to parse backend response: {}", parse_err))
        }
    }
}

impl BackendApi for HttpBackendApi {
    async fn connect(&self, req: &ConnectRequest) -> Result<()> {
        let body = serde_json::to_string(req)?;
        // Any parseable body counts as success; failures surface as the
        // backend's error message.
        let _: serde_json::Value = self.post_json("/connect", body).await?;
        Ok(())
    }

    async fn query(&self, connection_id: Uuid, sql: &str) -> Result<QueryData> {
        let body = serde_json::to_string(&QueryRequest { connection_id, sql })?;
        let response: QueryResponse = self.post_json("/query", body).await?;
        Ok(response.data)
    }

    async fn schema(&self, connection_id: Uuid) -> Result<SchemaResponse> {
        self.get_json(&format!("/schema/{}", connection_id)).await
    }

    async fn health(&self) -> Result<bool> {
        let response: HealthResponse = self.get_json("/health").await?;
        Ok(response.success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_normalized() {
        let api = HttpBackendApi::new("http://localhost:1234/");
        assert_eq!(api.endpoint("/health"), "http://localhost:1234/health");
    }

    #[test]
    fn error_envelope_surfaces_backend_message() {
        let err = parse_body::<QueryResponse>(r#"{"message":"relation does not exist"}"#)
            .unwrap_err();
        assert_eq!(err.to_string(), "relation does not exist");
    }

    #[test]
    fn query_response_parses_rows_and_fields() {
        let body = r#"{"data":{"rows":[{"id":1}],"fields":[{"name":"id"}]}}"#;
        let response: QueryResponse = parse_body(body).unwrap();
        assert_eq!(response.data.rows.len(), 1);
        assert_eq!(response.data.fields[0].name, "id");
    }
}
