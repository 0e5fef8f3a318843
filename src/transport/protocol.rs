//! Statement API abstraction trait.
//!
//! This module defines the `StatementApi` trait that abstracts the REST
//! endpoints the driver consumes: statement submission, statement status and
//! version. Polling and error classification live above this seam; an
//! implementation only moves requests and responses.

use crate::error::Result;
use crate::query::Attachment;
use async_trait::async_trait;
use uuid::Uuid;

use super::messages::{ResourceType, ResultSet, StatementRequestBody, StatementStatus, Version};

/// Raw outcome of a submission or status request.
#[derive(Debug)]
pub enum ApiResponse {
    /// `200 OK`: terminal, carries a result set whose SQL state decides
    /// success
    Completed(ResultSet),
    /// `202 Accepted`: still running
    Accepted(StatementStatus),
    /// Any other status, with the server's message
    Failed { status: u16, message: String },
}

/// Raw outcome of a resource download.
#[derive(Debug)]
pub enum DownloadResponse {
    /// `200 OK` with the resource content
    Completed(Vec<u8>),
    /// Any other status, with the server's message
    Failed { status: u16, message: String },
}

/// Statement API trait for service communication.
///
/// Implementations are shared between a connection and its cursors, so every
/// method takes `&self`.
#[async_trait]
pub trait StatementApi: Send + Sync {
    /// Submit a statement.
    ///
    /// # Arguments
    ///
    /// * `request` - JSON body of the `request` part
    /// * `attachments` - Files streamed as `attachments` parts
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be sent or the response body
    /// cannot be read.
    async fn submit_statement(
        &self,
        request: &StatementRequestBody,
        attachments: Vec<Attachment>,
    ) -> Result<ApiResponse>;

    /// Fetch the status of a statement, and the rows of one partition once
    /// it has completed.
    ///
    /// # Arguments
    ///
    /// * `statement_id` - Statement to query
    /// * `partition_id` - Partition whose rows are returned
    /// * `session_id` - Session the statement belongs to
    async fn get_statement_status(
        &self,
        statement_id: Uuid,
        partition_id: i32,
        session_id: Option<String>,
    ) -> Result<ApiResponse>;

    /// Fetch the server version.
    ///
    /// # Errors
    ///
    /// Returns an error for any non-success response.
    async fn get_version(&self) -> Result<Version>;

    /// Download an organization resource.
    ///
    /// # Arguments
    ///
    /// * `resource_type` - Kind of resource
    /// * `organization_id` - Organization owning the resource
    /// * `name` - Resource name
    async fn download_resource(
        &self,
        resource_type: ResourceType,
        organization_id: Uuid,
        name: &str,
    ) -> Result<DownloadResponse>;
}
