//! Built-in fallback responses.

use offcache_core::ResponseSnapshot;

/// Page served when the network is down and no offline page was cached.
pub const OFFLINE_PAGE_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Offline</title>
</head>
<body>
<main>
<h1>You are offline</h1>
<p>This page is not available without a network connection. Reconnect and try again.</p>
</main>
</body>
</html>
"#;

/// Synthesized offline page.
pub fn offline_page() -> ResponseSnapshot {
    ResponseSnapshot::new(
        200,
        vec![
            ("content-type".to_string(), "text/html; charset=utf-8".to_string()),
            ("cache-control".to_string(), "no-store".to_string()),
        ],
        OFFLINE_PAGE_HTML,
    )
}

/// Empty image returned when an uncached image cannot be fetched.
pub fn placeholder_image() -> ResponseSnapshot {
    ResponseSnapshot::new(
        200,
        vec![
            ("content-type".to_string(), "image/svg+xml".to_string()),
            ("cache-control".to_string(), "no-store".to_string()),
        ],
        "",
    )
}
