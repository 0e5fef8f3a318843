//! Transport layer for DeltaStream communication.
//!
//! This module provides the statement API abstraction and the HTTP and
//! WebSocket implementations the driver talks through.
//!
//! # Architecture
//!
//! The transport layer is organized into:
//! - `protocol` - Statement API trait definition
//! - `messages` - REST bodies and streaming frames
//! - `http` - Multipart REST transport
//! - `websocket` - Streaming socket dialer
//!
//! # Example
//!
//! ```no_run
//! use deltastream_rs::connection::StaticToken;
//! use deltastream_rs::transport::{HttpOptions, HttpTransport, StatementApi};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let tokens = Arc::new(StaticToken::new("sometoken")?);
//! let transport = HttpTransport::new(
//!     "https://api.deltastream.io/v2",
//!     tokens,
//!     &HttpOptions::default(),
//! )?;
//!
//! let version = transport.get_version().await?;
//! println!("Server version: {}.{}.{}", version.major, version.minor, version.patch);
//! # Ok(())
//! # }
//! ```

pub mod http;
pub mod messages;
pub mod protocol;
pub mod websocket;

// Re-export commonly used types
pub use http::{HttpOptions, HttpTransport, MAINTENANCE_ENV};
pub use messages::{
    DataplaneRequest, DataplaneRequestType, ResourceType, ResultSet, ResultSetContext,
    StatementRequestBody, Version,
};
pub use protocol::{ApiResponse, DownloadResponse, StatementApi};
pub use websocket::{StreamDialer, StreamSocket};
