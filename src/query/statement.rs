//! Statement submission and completion polling.
//!
//! A submitted statement either completes inline (`200`) or is accepted for
//! asynchronous execution (`202`). Accepted statements are polled at a fixed
//! interval until they reach a terminal state or the caller cancels.

use crate::connection::SessionContext;
use crate::error::{classify_dataplane_failure, classify_failure, DeltaStreamError, Result, SqlError};
use crate::transport::messages::{ResultSet, StatementParameters, StatementRequestBody};
use crate::transport::{ApiResponse, StatementApi};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

/// Content of an attachment.
pub enum AttachmentBody {
    /// In-memory bytes
    Bytes(Vec<u8>),
    /// Reader streamed into the request body
    Reader(Box<dyn AsyncRead + Send + Sync + Unpin>),
}

/// Named file sent alongside a statement.
pub struct Attachment {
    name: String,
    body: AttachmentBody,
}

impl Attachment {
    /// Attach in-memory bytes.
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            body: AttachmentBody::Bytes(bytes.into()),
        }
    }

    /// Attach a reader. Its content is streamed, never buffered whole.
    pub fn from_reader(
        name: impl Into<String>,
        reader: impl AsyncRead + Send + Sync + Unpin + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            body: AttachmentBody::Reader(Box::new(reader)),
        }
    }

    /// Attach a file from disk.
    ///
    /// # Errors
    ///
    /// Returns a client error if the file cannot be opened.
    pub async fn from_file(name: impl Into<String>, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = tokio::fs::File::open(path).await.map_err(|e| {
            DeltaStreamError::Client(format!(
                "error opening attachment {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(Self::from_reader(name, file))
    }

    /// File name of the attachment.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn into_parts(self) -> (String, AttachmentBody) {
        (self.name, self.body)
    }
}

impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body = match &self.body {
            AttachmentBody::Bytes(bytes) => format!("{} bytes", bytes.len()),
            AttachmentBody::Reader(_) => "<reader>".to_string(),
        };
        f.debug_struct("Attachment")
            .field("name", &self.name)
            .field("body", &body)
            .finish()
    }
}

/// A statement and its attachments.
#[derive(Debug)]
pub struct StatementRequest {
    statement: String,
    attachments: Vec<Attachment>,
}

impl StatementRequest {
    /// Create a request for `statement`.
    pub fn new(statement: impl Into<String>) -> Self {
        Self {
            statement: statement.into(),
            attachments: Vec::new(),
        }
    }

    /// Add an attachment.
    pub fn attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Statement text.
    pub fn statement(&self) -> &str {
        &self.statement
    }

    /// Attachments added so far.
    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }
}

impl From<&str> for StatementRequest {
    fn from(statement: &str) -> Self {
        Self::new(statement)
    }
}

impl From<String> for StatementRequest {
    fn from(statement: String) -> Self {
        Self::new(statement)
    }
}

enum Outcome {
    Done(ResultSet),
    Pending(Uuid),
}

/// Submits statements and polls them to completion against one endpoint.
#[derive(Clone)]
pub struct StatementExecutor {
    api: Arc<dyn StatementApi>,
    /// Context replaced on every terminal success. Dataplane executors have
    /// none.
    session: Option<SessionContext>,
    session_id: Option<String>,
    poll_interval: Duration,
    dataplane: bool,
}

impl StatementExecutor {
    /// Create an executor.
    ///
    /// # Arguments
    /// * `api` - Endpoint the executor talks to
    /// * `session` - Context to read defaults from and update, if any
    /// * `session_id` - Session id sent with every request
    /// * `poll_interval` - Delay between status polls
    pub fn new(
        api: Arc<dyn StatementApi>,
        session: Option<SessionContext>,
        session_id: Option<String>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            api,
            session,
            session_id,
            poll_interval,
            dataplane: false,
        }
    }

    /// Classify failures the way dataplane endpoints report them.
    pub fn for_dataplane(mut self) -> Self {
        self.dataplane = true;
        self
    }

    /// Session id sent with every request.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Submit a statement and wait for its terminal result.
    ///
    /// # Errors
    ///
    /// Returns `DeltaStreamError::Sql` for a non-success SQL state, a
    /// classified fault for a failed response, or
    /// `DeltaStreamError::Cancelled` if `cancel` fires first.
    pub async fn submit(
        &self,
        cancel: &CancellationToken,
        request: StatementRequest,
    ) -> Result<ResultSet> {
        let body = match &self.session {
            Some(session) => {
                session
                    .request_body(&request.statement, self.session_id.as_deref())
                    .await
            }
            None => StatementRequestBody {
                statement: request.statement.clone(),
                parameters: Some(StatementParameters {
                    session_id: self.session_id.clone(),
                    timezone: None,
                }),
                ..Default::default()
            },
        };

        debug!(
            attachments = request.attachments.len(),
            "submitting statement"
        );
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DeltaStreamError::Cancelled),
            response = self.api.submit_statement(&body, request.attachments) => response?,
        };

        match self.dispatch(response).await? {
            Outcome::Done(result) => Ok(result),
            Outcome::Pending(statement_id) => {
                debug!(%statement_id, "statement accepted, waiting for completion");
                self.get_statement(cancel, statement_id, 0).await
            }
        }
    }

    /// Fetch one partition of a statement, polling while it is pending.
    ///
    /// The first poll is immediate. There is no retry ceiling; the loop ends
    /// on a terminal response or cancellation.
    pub async fn get_statement(
        &self,
        cancel: &CancellationToken,
        statement_id: Uuid,
        partition_id: i32,
    ) -> Result<ResultSet> {
        loop {
            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(DeltaStreamError::Cancelled),
                response = self.api.get_statement_status(
                    statement_id,
                    partition_id,
                    self.session_id.clone(),
                ) => response?,
            };

            if let Outcome::Done(result) = self.dispatch(response).await? {
                return Ok(result);
            }

            debug!(%statement_id, partition_id, "statement pending");
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(DeltaStreamError::Cancelled),
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    async fn dispatch(&self, response: ApiResponse) -> Result<Outcome> {
        match response {
            ApiResponse::Completed(result) => {
                if !result.sql_state.is_success() {
                    return Err(SqlError {
                        code: result.sql_state,
                        message: result.message.unwrap_or_default(),
                        statement_id: Some(result.statement_id),
                    }
                    .into());
                }
                if let (Some(session), Some(context)) = (&self.session, &result.metadata.context) {
                    session.replace(context.clone()).await;
                }
                Ok(Outcome::Done(result))
            }
            ApiResponse::Accepted(status) => Ok(Outcome::Pending(status.statement_id)),
            ApiResponse::Failed { status, message } if self.dataplane => {
                Err(classify_dataplane_failure(status, message))
            }
            ApiResponse::Failed { status, message } => Err(classify_failure(status, message)),
        }
    }
}

impl fmt::Debug for StatementExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatementExecutor")
            .field("session_id", &self.session_id)
            .field("poll_interval", &self.poll_interval)
            .field("updates_context", &self.session.is_some())
            .field("dataplane", &self.dataplane)
            .finish()
    }
}
