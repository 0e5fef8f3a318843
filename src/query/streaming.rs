//! Cursor over a continuous push stream.
//!
//! A background task owns the read half of the socket. It hands the column
//! metadata over once, then forwards data frames through a bounded channel.
//! A full channel stalls socket reads, which is the stream's flow control.
//! An in-band error ends the stream and is reported after the rows that
//! preceded it.

use crate::error::{ConversionError, DeltaStreamError, Result, SqlError, TransportError};
use crate::sqlstate::SqlState;
use crate::transport::messages::{
    DataplaneRequest, ResultSet, ServerMessage, StreamData, StreamError, StreamMetadata,
};
use crate::transport::{StreamDialer, StreamSocket};
use crate::types::{decode, ColumnType, Value, WireFormat};
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::fmt;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::rows::RowCursor;
use super::statement::{StatementExecutor, StatementRequest};

/// Options for opening a stream.
#[derive(Debug, Clone)]
pub struct StreamOptions {
    /// Capacity of the row channel
    pub buffer: usize,
    /// Whether display hints are reported
    pub hints_enabled: bool,
    /// Session id for the socket
    pub session_id: Option<String>,
}

/// Cursor over a streaming result.
pub struct StreamingRows {
    metadata: StreamMetadata,
    data: mpsc::Receiver<StreamData>,
    error: oneshot::Receiver<DeltaStreamError>,
    sink: SplitSink<StreamSocket, Message>,
    reader: JoinHandle<()>,
    cancel: CancellationToken,
    hints_enabled: bool,
    finished: bool,
    closed: bool,
}

impl StreamingRows {
    /// Open the stream described by a dataplane redirect and wait for its
    /// column metadata.
    ///
    /// # Arguments
    /// * `dialer` - Socket dialer
    /// * `request` - Streaming dataplane redirect
    /// * `describer` - Executor used to look up the history of a failed
    ///   query, if any
    /// * `cancel` - Token that ends the stream
    /// * `options` - Buffering, hint and session options
    ///
    /// # Errors
    ///
    /// Returns a client error if the socket cannot be opened, the in-band
    /// error if the server fails the stream before sending metadata, or
    /// `DeltaStreamError::Cancelled` if `cancel` fires first.
    pub async fn open(
        dialer: &StreamDialer,
        request: &DataplaneRequest,
        describer: Option<StatementExecutor>,
        cancel: CancellationToken,
        options: StreamOptions,
    ) -> Result<Self> {
        let socket = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DeltaStreamError::Cancelled),
            socket = dialer.connect(&request.uri, &request.token, options.session_id.as_deref()) => socket?,
        };
        let (sink, stream) = socket.split();

        let (ready_tx, ready_rx) = oneshot::channel();
        let (data_tx, data_rx) = mpsc::channel(options.buffer);
        let (error_tx, error_rx) = oneshot::channel();

        let reader = FrameReader {
            stream,
            ready: Some(ready_tx),
            data: data_tx,
            error: Some(error_tx),
            describer: request.query_id.clone().zip(describer),
            cancel: cancel.clone(),
        };
        let reader = tokio::spawn(reader.run());

        let metadata = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                reader.abort();
                return Err(DeltaStreamError::Cancelled);
            }
            ready = ready_rx => match ready {
                Ok(Ok(metadata)) => metadata,
                Ok(Err(err)) => return Err(err),
                Err(_) => {
                    return Err(DeltaStreamError::Protocol(
                        "stream ended before metadata".to_string(),
                    ))
                }
            },
        };
        debug!(columns = metadata.columns.len(), "stream ready");

        Ok(Self {
            metadata,
            data: data_rx,
            error: error_rx,
            sink,
            reader,
            cancel,
            hints_enabled: options.hints_enabled,
            finished: false,
            closed: false,
        })
    }

    /// Headers sent with the column metadata.
    pub fn headers(&self) -> &std::collections::HashMap<String, String> {
        &self.metadata.headers
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.finished = true;
        self.data.close();
        let result = match self.sink.close().await {
            Ok(()) | Err(WsError::ConnectionClosed) | Err(WsError::AlreadyClosed) => Ok(()),
            Err(err) => Err(DeltaStreamError::Client(format!(
                "error while closing connection: {}",
                err
            ))),
        };
        self.reader.abort();
        result
    }
}

#[async_trait]
impl RowCursor for StreamingRows {
    fn columns(&self) -> Vec<String> {
        self.metadata.columns.iter().map(|c| c.name.clone()).collect()
    }

    fn column_type(&self, index: usize) -> Option<ColumnType> {
        self.metadata.columns.get(index).map(|c| {
            ColumnType::new(
                c.name.clone(),
                &c.type_name,
                c.nullable,
                self.hints_enabled,
                WireFormat::Streamed,
            )
            .with_dimensions(c.length, c.precision, c.scale)
        })
    }

    async fn next(&mut self, dest: &mut [Value]) -> Result<bool> {
        if self.closed {
            return Err(DeltaStreamError::Client("rows are closed".to_string()));
        }
        if self.finished {
            return Ok(false);
        }

        let frame = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                debug!("stream cancelled");
                self.shutdown().await?;
                return Ok(false);
            }
            frame = self.data.recv() => frame,
        };

        let Some(frame) = frame else {
            self.finished = true;
            return match self.error.try_recv() {
                Ok(err) => Err(err),
                Err(_) => Ok(false),
            };
        };

        if frame.data.len() != dest.len() {
            return Err(ConversionError::ColumnCountMismatch {
                expected: frame.data.len(),
                actual: dest.len(),
            }
            .into());
        }

        for (idx, (cell, slot)) in frame.data.iter().zip(dest.iter_mut()).enumerate() {
            let column = self.metadata.columns.get(idx).ok_or_else(|| {
                DeltaStreamError::Protocol(format!("no metadata for column {}", idx))
            })?;
            *slot = decode(cell.as_deref(), &column.type_name, WireFormat::Streamed)?;
        }

        Ok(true)
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.shutdown().await
    }
}

impl Drop for StreamingRows {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

impl fmt::Debug for StreamingRows {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingRows")
            .field("columns", &self.metadata.columns.len())
            .field("finished", &self.finished)
            .field("closed", &self.closed)
            .finish()
    }
}

/// Read half of the socket, run as a background task.
struct FrameReader {
    stream: SplitStream<StreamSocket>,
    ready: Option<oneshot::Sender<Result<StreamMetadata>>>,
    data: mpsc::Sender<StreamData>,
    error: Option<oneshot::Sender<DeltaStreamError>>,
    /// Query id and executor used to enrich in-band errors
    describer: Option<(String, StatementExecutor)>,
    cancel: CancellationToken,
}

impl FrameReader {
    async fn run(mut self) {
        while let Some(frame) = self.stream.next().await {
            let message = match frame {
                Ok(Message::Text(text)) => serde_json::from_str::<ServerMessage>(&text),
                Ok(Message::Binary(bytes)) => serde_json::from_slice::<ServerMessage>(&bytes),
                Ok(Message::Close(_)) => break,
                Ok(_) => continue,
                Err(err) => {
                    self.fail(TransportError::ReceiveError(err.to_string()).into());
                    return;
                }
            };

            let message = match message {
                Ok(message) => message,
                Err(err) => {
                    self.fail(DeltaStreamError::Protocol(format!(
                        "invalid stream message: {}",
                        err
                    )));
                    return;
                }
            };

            match message {
                ServerMessage::Metadata(metadata) => match self.ready.take() {
                    Some(ready) => {
                        let _ = ready.send(Ok(metadata));
                    }
                    None => debug!("ignoring repeated stream metadata"),
                },
                ServerMessage::Data(data) => {
                    if self.ready.is_some() {
                        self.fail(DeltaStreamError::Protocol(
                            "data received before metadata".to_string(),
                        ));
                        return;
                    }
                    if self.data.send(data).await.is_err() {
                        return;
                    }
                }
                ServerMessage::Error(err) => {
                    let err = self.sql_error(err).await;
                    self.fail(err);
                    return;
                }
                ServerMessage::Unknown => {
                    self.fail(DeltaStreamError::Protocol(
                        "unexpected message type".to_string(),
                    ));
                    return;
                }
            }
        }

        if let Some(ready) = self.ready.take() {
            let _ = ready.send(Err(DeltaStreamError::Protocol(
                "stream ended before metadata".to_string(),
            )));
        }
    }

    /// Report a terminal error on whichever channel the consumer waits on.
    fn fail(&mut self, err: DeltaStreamError) {
        if let Some(ready) = self.ready.take() {
            let _ = ready.send(Err(err));
        } else if let Some(error) = self.error.take() {
            let _ = error.send(err);
        }
    }

    async fn sql_error(&self, err: StreamError) -> DeltaStreamError {
        let mut message = err.message;
        if let Some((query_id, executor)) = &self.describer {
            let statement = format!("DESCRIBE QUERY HISTORY {};", query_id);
            match executor
                .submit(&self.cancel, StatementRequest::new(statement))
                .await
            {
                Ok(history) => {
                    if let Some(enriched) = enrich_message(&history, &message) {
                        message = enriched;
                    }
                }
                Err(e) => warn!(%query_id, error = %e, "unable to describe failed query"),
            }
        }

        SqlError {
            code: err.sql_code.unwrap_or_else(|| SqlState::from_code("")),
            message,
            statement_id: None,
        }
        .into()
    }
}

/// Prefix an in-band error with the messages of a query that has errored.
///
/// Returns `None` unless the history's first row reports `state` as
/// `errored` and carries a `messages` column.
fn enrich_message(history: &ResultSet, message: &str) -> Option<String> {
    let row = history.rows().first()?;
    let mut errored = false;
    let mut messages = None;

    for (idx, column) in history.metadata.columns.iter().enumerate() {
        let Some(cell) = row.get(idx) else {
            continue;
        };
        let cell = cell.as_deref().unwrap_or_default();
        if column.name.eq_ignore_ascii_case("state") && cell.eq_ignore_ascii_case("errored") {
            errored = true;
        } else if column.name.eq_ignore_ascii_case("messages") {
            messages = Some(format!("{}\n\n{}", cell, message));
        }
    }

    if errored {
        messages
    } else {
        None
    }
}
