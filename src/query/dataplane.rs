//! Dataplane redirect handling.
//!
//! A terminal statement response may point at a dataplane endpoint instead
//! of carrying rows itself. Bounded results are then fetched from that
//! endpoint's REST API; anything else is consumed as a socket stream.

use crate::connection::StaticToken;
use crate::error::{DeltaStreamError, Result};
use crate::transport::messages::{DataplaneRequest, DataplaneRequestType, ResultSet};
use crate::transport::{HttpOptions, HttpTransport, StreamDialer};
use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::results::PartitionedRows;
use super::rows::Rows;
use super::statement::StatementExecutor;
use super::streaming::{StreamOptions, StreamingRows};

/// API path served by every dataplane endpoint.
const DATAPLANE_API_PATH: &str = "/v2";

/// Settings for the cursors a connection opens.
#[derive(Debug, Clone)]
pub struct CursorSettings {
    /// Report display hints in column type names
    pub hints_enabled: bool,
    /// Session id sent to dataplane endpoints
    pub session_id: Option<String>,
    /// Delay between status polls on dataplane endpoints
    pub poll_interval: Duration,
    /// HTTP options for dataplane endpoints
    pub http: HttpOptions,
    /// Streaming socket handshake timeout
    pub handshake_timeout: Duration,
    /// Capacity of the streaming row buffer
    pub stream_buffer: usize,
}

/// Open the cursor for a terminal result.
///
/// # Arguments
/// * `primary` - Executor of the connection; fetches later partitions of
///   inline results and describes failed streaming queries
/// * `cancel` - Token scoping the cursor
/// * `result` - Terminal result of the statement
/// * `settings` - Cursor settings
///
/// # Errors
///
/// Returns a client error if the dataplane endpoint cannot be reached, or
/// any error of the first dataplane fetch or stream handshake.
pub async fn open_rows(
    primary: &StatementExecutor,
    cancel: CancellationToken,
    result: ResultSet,
    settings: &CursorSettings,
) -> Result<Rows> {
    let Some(request) = result.metadata.dataplane_request.clone() else {
        return Ok(PartitionedRows::new(primary.clone(), cancel, result, settings.hints_enabled).into());
    };

    match request.request_type {
        DataplaneRequestType::ResultSet => {
            debug!(statement_id = %result.statement_id, "fetching result from dataplane");
            let executor = dataplane_executor(&request, settings)?;
            let first = executor.get_statement(&cancel, result.statement_id, 0).await?;
            Ok(PartitionedRows::new(executor, cancel, first, settings.hints_enabled).into())
        }
        DataplaneRequestType::Streaming | DataplaneRequestType::Unknown => {
            debug!(statement_id = %result.statement_id, "opening dataplane stream");
            let dialer = StreamDialer::new(settings.handshake_timeout)
                .insecure_tls(settings.http.insecure_tls);
            let options = StreamOptions {
                buffer: settings.stream_buffer,
                hints_enabled: settings.hints_enabled,
                session_id: settings.session_id.clone(),
            };
            let rows =
                StreamingRows::open(&dialer, &request, Some(primary.clone()), cancel, options)
                    .await?;
            Ok(rows.into())
        }
    }
}

/// Executor for a dataplane endpoint. It authenticates with the redirect's
/// token and never updates the connection's context.
pub fn dataplane_executor(
    request: &DataplaneRequest,
    settings: &CursorSettings,
) -> Result<StatementExecutor> {
    let base_url = dataplane_base_url(&request.uri)?;
    let token = StaticToken::new(request.token.clone())
        .map_err(|e| DeltaStreamError::Client(format!("invalid dataplane token: {}", e)))?;
    let options = settings.http.clone().with_maintenance_from_env();
    let api = HttpTransport::new(&base_url, Arc::new(token), &options)?;

    Ok(StatementExecutor::new(
        Arc::new(api),
        None,
        settings.session_id.clone(),
        settings.poll_interval,
    )
    .for_dataplane())
}

/// Replace the path of a dataplane URI with the API path.
fn dataplane_base_url(uri: &str) -> Result<String> {
    let mut url =
        Url::parse(uri).map_err(|_| DeltaStreamError::Client("invalid dataplane uri".to_string()))?;
    url.set_path(DATAPLANE_API_PATH);
    Ok(url.to_string())
}
