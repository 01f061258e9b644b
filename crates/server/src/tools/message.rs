//! post_message tool implementation.
//!
//! Accepts a command object (`{"type": "CLEAR_CACHE"}` and friends) and
//! returns its acknowledgement.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use offcache_client::{Command, OfflineService};
use offcache_core::Error;

/// Input parameters for the post_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PostMessageParams {
    /// Command object tagged by `type`: SKIP_WAITING, CLEAR_CACHE, or
    /// PRELOAD_IMAGES with a `urls` array.
    pub message: serde_json::Value,
}

/// Implementation of the post_message tool.
pub async fn post_message_impl(service: &OfflineService, params: PostMessageParams) -> Result<CallToolResult, McpError> {
    let command = Command::from_value(params.message)?;
    tracing::debug!(?command, "received command");

    let ack = service.post_message(command).await?;
    let json = serde_json::to_string_pretty(&ack)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize acknowledgement: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
