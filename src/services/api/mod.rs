//! Wire contract with the backend query service.
//!
//! The backend owns every PostgreSQL session; this client only speaks
//! its HTTP surface: `POST /connect`, `POST /query`, `GET
//! /schema/:connectionId`, `GET /health`. The [`BackendApi`] trait is
//! the seam the query engine, schema browser, and health monitor are
//! written against; tests substitute an in-memory implementation.

mod http;

pub use http::HttpBackendApi;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::future::Future;
use uuid::Uuid;

use crate::store::ConnectionEntry;

/// Body of `POST /connect`. The id is client-allocated; the backend
/// registers the session under it.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectRequest {
    pub id: Uuid,
    pub host: String,
    pub port: String,
    pub database: String,
    pub username: String,
    pub password: String,
}

impl From<&ConnectionEntry> for ConnectRequest {
    fn from(entry: &ConnectionEntry) -> Self {
        Self {
            id: entry.id,
            host: entry.host.clone(),
            port: entry.port.clone(),
            database: entry.database.clone(),
            username: entry.username.clone(),
            password: entry.password.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QueryRequest<'a> {
    pub connection_id: Uuid,
    pub sql: &'a str,
}

/// One result column. The backend reports names only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldInfo {
    pub name: String,
}

/// Payload of `POST /query`: rows as JSON objects keyed by field name.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryData {
    #[serde(default)]
    pub rows: Vec<Map<String, Value>>,
    #[serde(default)]
    pub fields: Vec<FieldInfo>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct QueryResponse {
    pub data: QueryData,
}

/// One column in a table description from `GET /schema`.
#[derive(Debug, Clone, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub nullable: bool,
    #[serde(default)]
    pub default: Option<String>,
    pub position: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TableSchema {
    #[serde(rename = "type")]
    pub table_type: String,
    pub columns: Vec<ColumnInfo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchemaResponse {
    #[serde(default)]
    pub schema: HashMap<String, TableSchema>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HealthResponse {
    pub success: bool,
}

/// Error body the backend attaches to failed requests.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub message: String,
}

/// The backend query service, as consumed by this client. All methods
/// are non-blocking; callers recover failures at the component that
/// issued the operation.
pub trait BackendApi: Send + Sync + 'static {
    /// Validate credentials and register a session under the request id.
    fn connect(&self, req: &ConnectRequest) -> impl Future<Output = Result<()>> + Send;

    /// Execute SQL against a registered session.
    fn query(
        &self,
        connection_id: Uuid,
        sql: &str,
    ) -> impl Future<Output = Result<QueryData>> + Send;

    /// Describe every table visible to the session.
    fn schema(&self, connection_id: Uuid) -> impl Future<Output = Result<SchemaResponse>> + Send;

    /// Liveness probe.
    fn health(&self) -> impl Future<Output = Result<bool>> + Send;
}
