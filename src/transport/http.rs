//! HTTP implementation of the statement API.
//!
//! Statements are submitted as `multipart/form-data`: one `request` part with
//! the JSON body, then one `attachments` part per file. Attachment readers are
//! streamed into the body.

use crate::connection::TokenProvider;
use crate::error::{ConnectionError, DeltaStreamError, Result, TransportError};
use crate::query::{Attachment, AttachmentBody};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, Response, StatusCode, Url};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::io::ReaderStream;
use tracing::debug;
use uuid::Uuid;

use super::messages::{ErrorResponse, ResourceType, StatementRequestBody, Version};
use super::protocol::{ApiResponse, DownloadResponse, StatementApi};

/// Environment variable that marks requests as maintenance traffic.
pub const MAINTENANCE_ENV: &str = "DELTASTREAM_MAINTENANCE";

const MAINTENANCE_HEADER: &str = "deltastream-maintenance";

/// Options for building an [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct HttpOptions {
    /// TCP connect timeout
    pub connect_timeout: Duration,
    /// Skip TLS certificate validation
    pub insecure_tls: bool,
    /// Send the maintenance header on every request
    pub maintenance: bool,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            insecure_tls: false,
            maintenance: false,
        }
    }
}

impl HttpOptions {
    /// Enable the maintenance header when `DELTASTREAM_MAINTENANCE` is set.
    pub fn with_maintenance_from_env(mut self) -> Self {
        self.maintenance = std::env::var_os(MAINTENANCE_ENV).is_some();
        self
    }
}

/// Statement API over HTTP.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
}

impl HttpTransport {
    /// Create a transport for the API rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns a client error if the URL is malformed or the HTTP client
    /// cannot be built.
    pub fn new(
        base_url: &str,
        tokens: Arc<dyn TokenProvider>,
        options: &HttpOptions,
    ) -> Result<Self> {
        let url = Url::parse(base_url).map_err(|e| ConnectionError::InvalidParameter {
            parameter: "server".to_string(),
            message: format!("invalid server url: {}", e),
        })?;

        let mut headers = HeaderMap::new();
        if options.maintenance {
            headers.insert(MAINTENANCE_HEADER, HeaderValue::from_static("yes"));
        }

        let client = Client::builder()
            .connect_timeout(options.connect_timeout)
            .danger_accept_invalid_certs(options.insecure_tls)
            .default_headers(headers)
            .build()
            .map_err(|e| DeltaStreamError::Client(format!("unable to initialize client: {}", e)))?;

        Ok(Self {
            client,
            base_url: url.as_str().trim_end_matches('/').to_string(),
            tokens,
        })
    }

    /// Base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn read_response(response: Response) -> Result<ApiResponse> {
        let status = response.status();
        let body = response.bytes().await.map_err(TransportError::from)?;

        match status {
            StatusCode::OK => Ok(ApiResponse::Completed(
                serde_json::from_slice(&body).map_err(TransportError::from)?,
            )),
            StatusCode::ACCEPTED => Ok(ApiResponse::Accepted(
                serde_json::from_slice(&body).map_err(TransportError::from)?,
            )),
            _ => Ok(ApiResponse::Failed {
                status: status.as_u16(),
                message: error_message(&body),
            }),
        }
    }
}

#[async_trait]
impl StatementApi for HttpTransport {
    async fn submit_statement(
        &self,
        request: &StatementRequestBody,
        attachments: Vec<Attachment>,
    ) -> Result<ApiResponse> {
        let json = serde_json::to_string(request).map_err(|e| {
            DeltaStreamError::Client(format!("error building request: {}", e))
        })?;
        let request_part = Part::text(json)
            .mime_str("application/json")
            .map_err(|e| DeltaStreamError::Client(format!("error building request: {}", e)))?;

        let mut form = Form::new().part("request", request_part);
        for attachment in attachments {
            form = form.part("attachments", attachment_part(attachment)?);
        }

        let token = self.tokens.token().await?;
        let url = format!("{}/statements", self.base_url);
        debug!(%url, "POST statement");

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await
            .map_err(TransportError::from)?;

        Self::read_response(response).await
    }

    async fn get_statement_status(
        &self,
        statement_id: Uuid,
        partition_id: i32,
        session_id: Option<String>,
    ) -> Result<ApiResponse> {
        let mut query = vec![
            ("partitionID", partition_id.to_string()),
            ("timezone", "UTC".to_string()),
        ];
        if let Some(session_id) = session_id {
            query.push(("sessionID", session_id));
        }

        let token = self.tokens.token().await?;
        let url = format!("{}/statements/{}", self.base_url, statement_id);
        debug!(%url, partition_id, "GET statement status");

        let response = self
            .client
            .get(&url)
            .query(&query)
            .bearer_auth(token)
            .send()
            .await
            .map_err(TransportError::from)?;

        Self::read_response(response).await
    }

    async fn get_version(&self) -> Result<Version> {
        let token = self.tokens.token().await?;
        let response = self
            .client
            .get(format!("{}/version", self.base_url))
            .bearer_auth(token)
            .send()
            .await
            .map_err(TransportError::from)?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.bytes().await.map_err(TransportError::from)?;
            return Err(TransportError::InvalidResponse(format!(
                "status code: {}: {}",
                status.as_u16(),
                error_message(&body)
            ))
            .into());
        }

        let body = response.bytes().await.map_err(TransportError::from)?;
        Ok(serde_json::from_slice(&body).map_err(TransportError::from)?)
    }

    async fn download_resource(
        &self,
        resource_type: ResourceType,
        organization_id: Uuid,
        name: &str,
    ) -> Result<DownloadResponse> {
        let token = self.tokens.token().await?;
        let url = format!(
            "{}/download/{}/{}/{}",
            self.base_url,
            resource_type,
            organization_id,
            urlencoding::encode(name)
        );
        debug!(%url, "GET resource");

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(TransportError::from)?;

        let status = response.status();
        let body = response.bytes().await.map_err(TransportError::from)?;
        if status == StatusCode::OK {
            Ok(DownloadResponse::Completed(body.to_vec()))
        } else {
            Ok(DownloadResponse::Failed {
                status: status.as_u16(),
                message: error_message(&body),
            })
        }
    }
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Build the multipart part for one attachment.
fn attachment_part(attachment: Attachment) -> Result<Part> {
    let (name, body) = attachment.into_parts();
    let part = match body {
        AttachmentBody::Bytes(bytes) => Part::bytes(bytes),
        AttachmentBody::Reader(reader) => Part::stream(Body::wrap_stream(ReaderStream::new(reader))),
    };
    part.file_name(name)
        .mime_str("application/octet-stream")
        .map_err(|e| DeltaStreamError::Client(format!("error building request: {}", e)))
}

/// Message of an error response, or its raw body.
fn error_message(body: &[u8]) -> String {
    match serde_json::from_slice::<ErrorResponse>(body) {
        Ok(err) => err.message,
        Err(_) => String::from_utf8_lossy(body).trim().to_string(),
    }
}
