//! background_sync tool implementation.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use offcache_client::{OfflineService, RefreshReport};
use offcache_core::Error;

/// Input parameters for the background_sync tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BackgroundSyncParams {
    /// Sync tag. Only "background-sync" refreshes the manifest.
    pub tag: String,
}

/// Output structure for the background_sync tool.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BackgroundSyncOutput {
    Skipped { tag: String },
    Refreshed(RefreshReport),
}

pub async fn sync_output(service: &OfflineService, params: BackgroundSyncParams) -> Result<BackgroundSyncOutput, Error> {
    let output = match service.lifecycle().on_background_sync(&params.tag).await? {
        Some(report) => BackgroundSyncOutput::Refreshed(report),
        None => BackgroundSyncOutput::Skipped { tag: params.tag },
    };
    Ok(output)
}

/// Implementation of the background_sync tool.
pub async fn background_sync_impl(
    service: &OfflineService, params: BackgroundSyncParams,
) -> Result<CallToolResult, McpError> {
    let output = sync_output(service, params).await?;
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize sync result: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::service;

    #[tokio::test]
    async fn test_other_tag_is_skipped() {
        let service = service().await;
        let output = sync_output(&service, BackgroundSyncParams { tag: "periodic".into() }).await.unwrap();
        assert!(matches!(output, BackgroundSyncOutput::Skipped { ref tag } if tag == "periodic"));
    }

    #[tokio::test]
    async fn test_refresh_while_offline_reports_failures() {
        let service = service().await;
        let output = sync_output(&service, BackgroundSyncParams { tag: "background-sync".into() })
            .await
            .unwrap();
        let BackgroundSyncOutput::Refreshed(report) = output else {
            panic!("expected a refresh");
        };
        assert!(report.refreshed.is_empty());
        assert_eq!(report.failed.len(), service.lifecycle().manifest().len());
    }
}
