//! Session-scoped addressing context.
//!
//! The server echoes the organization, role, database, schema, store and
//! compute pool after every statement. The connection keeps the latest echo
//! and submits it as the defaults of the next statement.

use crate::transport::messages::{ResultSetContext, StatementParameters, StatementRequestBody};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Result-set context shared between a connection and its executors.
#[derive(Debug, Default, Clone)]
pub struct SessionContext {
    context: Arc<RwLock<ResultSetContext>>,
}

impl SessionContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current context.
    pub async fn get(&self) -> ResultSetContext {
        self.context.read().await.clone()
    }

    /// Replace the context.
    pub async fn replace(&self, context: ResultSetContext) {
        let mut guard = self.context.write().await;
        *guard = context;
    }

    /// Build a request body for `statement` using the current defaults.
    pub async fn request_body(
        &self,
        statement: &str,
        session_id: Option<&str>,
    ) -> StatementRequestBody {
        let ctx = self.context.read().await;
        StatementRequestBody {
            statement: statement.to_string(),
            organization: ctx.organization_id.map(|id| id.to_string()),
            role: ctx.role_name.clone(),
            database: ctx.database_name.clone(),
            schema: ctx.schema_name.clone(),
            store: ctx.store_name.clone(),
            compute_pool: ctx.compute_pool_name.clone(),
            parameters: Some(StatementParameters {
                session_id: session_id.map(str::to_string),
                timezone: None,
            }),
        }
    }
}
