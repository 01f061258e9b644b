//! fetch tool implementation.
//!
//! Routes one request through the engine, the way a host would on every
//! outgoing request.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use offcache_client::{FetchOutcome, OfflineService, ServedFrom, Strategy};
use offcache_core::url::resolve;
use offcache_core::{Destination, Error, RequestClassification, RequestDescriptor, RequestMode};

/// Input parameters for the fetch tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct FetchParams {
    /// Absolute URL, or a path resolved against the configured origin.
    pub url: String,

    /// HTTP method (default: GET). Anything but GET is declined.
    #[serde(default)]
    pub method: Option<String>,

    /// What the response is used for: document, image, style, script, font.
    #[serde(default)]
    pub destination: Option<Destination>,

    /// Accept header sent by the client.
    #[serde(default)]
    pub accept: Option<String>,

    /// Request mode: navigate, same-origin, no-cors, cors.
    #[serde(default)]
    pub mode: Option<RequestMode>,
}

/// Output structure for the fetch tool.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FetchOutput {
    /// The engine does not handle this request; the host fetches it directly.
    Declined { url: String },
    Served(ServedOutput),
}

#[derive(Debug, Clone, Serialize)]
pub struct ServedOutput {
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    /// Body as text when it is valid UTF-8.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    pub body_len: usize,
    pub classification: RequestClassification,
    pub strategy: Strategy,
    pub source: ServedFrom,
}

impl FetchParams {
    fn to_request(&self, service: &OfflineService) -> Result<RequestDescriptor, Error> {
        let url = resolve(&self.url, Some(service.origin()))?;
        let mut request = RequestDescriptor::from_url(url);
        if let Some(method) = &self.method {
            request = request.with_method(method.as_str());
        }
        if let Some(destination) = self.destination {
            request = request.with_destination(destination);
        }
        if let Some(accept) = &self.accept {
            request = request.with_accept(accept.as_str());
        }
        if let Some(mode) = self.mode {
            request = request.with_mode(mode);
        }
        Ok(request)
    }
}

pub async fn fetch_output(service: &OfflineService, params: FetchParams) -> Result<FetchOutput, Error> {
    if params.url.trim().is_empty() {
        return Err(Error::InvalidInput("url cannot be empty".into()));
    }

    let request = params.to_request(service)?;
    let output = match service.fetch(&request).await? {
        FetchOutcome::Declined => FetchOutput::Declined { url: request.url.to_string() },
        FetchOutcome::Served(served) => FetchOutput::Served(ServedOutput {
            url: request.url.to_string(),
            status: served.response.status,
            body: served.response.text().map(str::to_string),
            body_len: served.response.body.len(),
            headers: served.response.headers,
            classification: served.classification,
            strategy: served.strategy,
            source: served.source,
        }),
    };
    Ok(output)
}

/// Implementation of the fetch tool.
pub async fn fetch_impl(service: &OfflineService, params: FetchParams) -> Result<CallToolResult, McpError> {
    let output = fetch_output(service, params).await?;
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize response: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
