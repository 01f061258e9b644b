//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::tools::{
    BackgroundSyncParams, CacheGetParams, FetchParams, PostMessageParams, background_sync_impl, fetch_impl, get_impl,
    post_message_impl,
};

use offcache_client::OfflineService;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

/// The main MCP server handler for offcache.
#[derive(Clone)]
pub struct OffcacheServer {
    service: Arc<OfflineService>,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl OffcacheServer {
    /// Create a handler over an installed and activated service.
    pub fn new(service: Arc<OfflineService>) -> Self {
        Self { service, tool_router: Self::tool_router() }
    }

    /// Serve a request through the offline cache.
    #[tool(
        description = "Serve a request through the offline cache. Returns the response with its classification, strategy and source, or `declined` for requests the cache does not handle."
    )]
    async fn fetch(&self, params: Parameters<FetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.service, params.0).await
    }

    /// Deliver a command message.
    #[tool(
        description = "Send a command: {\"type\": \"SKIP_WAITING\"}, {\"type\": \"CLEAR_CACHE\"} or {\"type\": \"PRELOAD_IMAGES\", \"urls\": [...]}. Returns an acknowledgement."
    )]
    async fn post_message(&self, params: Parameters<PostMessageParams>) -> Result<CallToolResult, McpError> {
        post_message_impl(&self.service, params.0).await
    }

    #[tool(description = "Background sync event. The \"background-sync\" tag refreshes the asset manifest; other tags are skipped.")]
    async fn background_sync(&self, params: Parameters<BackgroundSyncParams>) -> Result<CallToolResult, McpError> {
        background_sync_impl(&self.service, params.0).await
    }

    /// Inspect a stored entry.
    #[tool(description = "Read a stored entry by role (static, image, api) and URL. Fails with CACHE_MISS when absent.")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(&self.service, params.0).await
    }
}

impl ServerHandler for OffcacheServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "offcache".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
