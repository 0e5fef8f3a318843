//! Wire message types for the DeltaStream REST and streaming APIs.
//!
//! REST bodies are camelCase JSON. Identifier fields use the service's
//! upper-case `ID` suffix (`statementID`, `organizationID`). Streaming socket
//! messages are JSON objects discriminated by their `type` field.

use crate::sqlstate::SqlState;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Body of the `request` part of a statement submission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementRequestBody {
    /// Statement text
    pub statement: String,
    /// Organization id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    /// Role name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Database name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    /// Schema name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    /// Store name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store: Option<String>,
    /// Compute pool name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compute_pool: Option<String>,
    /// Session-scoped parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<StatementParameters>,
}

/// Session parameters attached to a statement submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementParameters {
    #[serde(rename = "sessionID", default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

/// Terminal statement response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSet {
    /// Statement id
    #[serde(rename = "statementID")]
    pub statement_id: Uuid,
    /// SQL status code
    pub sql_state: SqlState,
    /// Engine message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Creation time (epoch seconds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_on: Option<i64>,
    /// Result metadata
    pub metadata: ResultSetMetadata,
    /// Rows of the returned partition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<Vec<Option<String>>>>,
}

impl ResultSet {
    /// Rows of the returned partition, empty when the server sent none.
    pub fn rows(&self) -> &[Vec<Option<String>>] {
        self.data.as_deref().unwrap_or(&[])
    }
}

/// Metadata of a result set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSetMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    /// Partition descriptors, in partition order
    #[serde(default)]
    pub partition_info: Vec<PartitionInfo>,
    /// Column descriptors, in column order
    #[serde(default)]
    pub columns: Vec<ResultSetColumn>,
    /// Set when the result lives on a dataplane endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataplane_request: Option<DataplaneRequest>,
    /// Context after the statement ran
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ResultSetContext>,
}

/// Partition descriptor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionInfo {
    pub row_count: i32,
}

/// Column descriptor of a bounded result set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSetColumn {
    pub name: String,
    /// Declared type, possibly followed by `;`-separated display hints
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub nullable: bool,
}

/// Instruction to fetch a result from a dataplane endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataplaneRequest {
    /// Endpoint URI
    pub uri: String,
    /// Bearer token for the endpoint
    pub token: String,
    /// Kind of result behind the endpoint
    pub request_type: DataplaneRequestType,
    #[serde(rename = "statementID", default, skip_serializing_if = "Option::is_none")]
    pub statement_id: Option<Uuid>,
    /// Query backing a continuous stream
    #[serde(rename = "queryID", default, skip_serializing_if = "Option::is_none")]
    pub query_id: Option<String>,
}

/// Kind of dataplane result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataplaneRequestType {
    /// Bounded, partitioned result set
    ResultSet,
    /// Continuous push stream
    Streaming,
    /// Kind not known to this driver; consumed as a stream
    #[serde(other)]
    Unknown,
}

/// Addressing defaults carried between statements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSetContext {
    #[serde(rename = "organizationID", default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compute_pool_name: Option<String>,
}

/// Body of a `202 Accepted` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementStatus {
    #[serde(rename = "statementID")]
    pub statement_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql_state: Option<SqlState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_on: Option<i64>,
}

/// Kind of organization resource that can be downloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    /// Protobuf descriptor source
    DescriptorSource,
    /// User-defined function source
    FunctionSource,
}

impl ResourceType {
    /// Path segment of the resource type.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::DescriptorSource => "descriptor_source",
            ResourceType::FunctionSource => "function_source",
        }
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of an error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
}

/// Body of `GET /version`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    #[serde(default)]
    pub major: u32,
    #[serde(default)]
    pub minor: u32,
    #[serde(default)]
    pub patch: u32,
}

/// Message sent by the client over the streaming socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    /// First message on every socket
    Auth {
        #[serde(rename = "accessToken")]
        access_token: String,
        #[serde(rename = "sessionId")]
        session_id: String,
    },
}

/// Message received over the streaming socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// Column layout, sent once before any data
    Metadata(StreamMetadata),
    /// One row
    Data(StreamData),
    /// Terminal in-band error
    Error(StreamError),
    /// Any tag this driver does not understand
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamMetadata {
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub columns: Vec<StreamColumn>,
}

/// Column descriptor of a streaming result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamColumn {
    pub name: String,
    #[serde(default)]
    pub nullable: bool,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamData {
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub data: Vec<Option<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamError {
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub message: String,
    #[serde(rename = "sqlCode", default, skip_serializing_if = "Option::is_none")]
    pub sql_code: Option<SqlState>,
}
