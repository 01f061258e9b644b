//! cache_get tool implementation.
//!
//! Reads one stored entry from the current-version namespace of a role.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use offcache_client::OfflineService;
use offcache_core::url::resolve;
use offcache_core::{CacheRole, Error, RequestDescriptor};

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// Namespace role: static, image or api.
    pub role: CacheRole,
    /// Absolute URL, or a path resolved against the configured origin.
    pub url: String,
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize)]
pub struct CacheGetOutput {
    pub namespace: String,
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    pub body_len: usize,
    pub stored_at: String,
}

pub async fn get_output(service: &OfflineService, params: CacheGetParams) -> Result<CacheGetOutput, Error> {
    let url = resolve(&params.url, Some(service.origin()))?;
    let request = RequestDescriptor::from_url(url);
    let store = service.namespaces().store(params.role);

    let entry = store
        .get(&request)
        .await?
        .ok_or_else(|| Error::CacheMiss(request.url.to_string()))?;

    Ok(CacheGetOutput {
        namespace: entry.namespace,
        url: entry.url,
        status: entry.response.status,
        body: entry.response.text().map(str::to_string),
        body_len: entry.response.body.len(),
        headers: entry.response.headers,
        stored_at: entry.stored_at,
    })
}

/// Implementation of the cache_get tool.
pub async fn get_impl(service: &OfflineService, params: CacheGetParams) -> Result<CallToolResult, McpError> {
    let output = get_output(service, params).await?;
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize entry: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
