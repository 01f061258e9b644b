//! Request classification.
//!
//! Classification is an ordered table of `(matcher, category)` rules; the first
//! rule that matches decides. Categories overlap in naming (a `.json` file
//! under `/files/` also lives in a file directory), so order is significant:
//! Image, Api, StaticAsset, Html, then Other as the fallthrough.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::request::{Destination, RequestDescriptor};
use crate::url::is_http;

/// Category a request falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RequestClassification {
    Image,
    Api,
    StaticAsset,
    Html,
    Other,
}

/// Patterns the classification table is built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "default_image_extensions")]
    pub image_extensions: Vec<String>,

    #[serde(default = "default_image_dirs")]
    pub image_dirs: Vec<String>,

    /// Generic upload/file directories; only image-extension paths in them count as images.
    #[serde(default = "default_file_dirs")]
    pub file_dirs: Vec<String>,

    /// Path of the manifest index resource, always treated as API data.
    #[serde(default = "default_index_resource")]
    pub index_resource: String,

    #[serde(default = "default_api_segments")]
    pub api_segments: Vec<String>,

    #[serde(default = "default_static_extensions")]
    pub static_extensions: Vec<String>,

    #[serde(default = "default_static_dirs")]
    pub static_dirs: Vec<String>,

    /// Third-party asset CDNs whose responses are cached as static assets.
    #[serde(default = "default_cdn_hosts")]
    pub cdn_hosts: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_image_extensions() -> Vec<String> {
    strings(&["png", "jpg", "jpeg", "gif", "webp", "svg", "ico", "avif", "bmp"])
}

fn default_image_dirs() -> Vec<String> {
    strings(&["/images/", "/img/", "/icons/"])
}

fn default_file_dirs() -> Vec<String> {
    strings(&["/files/"])
}

fn default_index_resource() -> String {
    "/index.json".into()
}

fn default_api_segments() -> Vec<String> {
    strings(&["/api/"])
}

fn default_static_extensions() -> Vec<String> {
    strings(&["css", "js", "mjs", "woff", "woff2", "ttf", "otf", "eot"])
}

fn default_static_dirs() -> Vec<String> {
    strings(&["/css/", "/js/", "/fonts/", "/static/"])
}

fn default_cdn_hosts() -> Vec<String> {
    strings(&[
        "cdn.jsdelivr.net",
        "cdnjs.cloudflare.com",
        "unpkg.com",
        "fonts.googleapis.com",
        "fonts.gstatic.com",
    ])
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            image_extensions: default_image_extensions(),
            image_dirs: default_image_dirs(),
            file_dirs: default_file_dirs(),
            index_resource: default_index_resource(),
            api_segments: default_api_segments(),
            static_extensions: default_static_extensions(),
            static_dirs: default_static_dirs(),
            cdn_hosts: default_cdn_hosts(),
        }
    }
}

/// A single predicate over a request.
#[derive(Debug, Clone)]
pub enum Matcher {
    Destination(Vec<Destination>),
    PathPattern(Regex),
    PathUnder(Vec<String>),
    PathUnderWithPattern(Vec<String>, Regex),
    PathEquals(String),
    PathContains(Vec<String>),
    Host(Vec<String>),
    AcceptsHtml,
}

impl Matcher {
    pub fn matches(&self, request: &RequestDescriptor) -> bool {
        let path = request.url.path();
        match self {
            Matcher::Destination(kinds) => request.destination.is_some_and(|d| kinds.contains(&d)),
            Matcher::PathPattern(re) => re.is_match(path),
            Matcher::PathUnder(dirs) => dirs.iter().any(|d| path.contains(d.as_str())),
            Matcher::PathUnderWithPattern(dirs, re) => {
                dirs.iter().any(|d| path.contains(d.as_str())) && re.is_match(path)
            }
            Matcher::PathEquals(p) => path == p,
            Matcher::PathContains(needles) => needles.iter().any(|n| path.contains(n.as_str())),
            Matcher::Host(hosts) => request
                .url
                .host_str()
                .is_some_and(|h| hosts.iter().any(|allowed| allowed.eq_ignore_ascii_case(h))),
            Matcher::AcceptsHtml => request.accepts_html(),
        }
    }
}

/// One row of the classification table.
#[derive(Debug, Clone)]
pub struct Rule {
    pub category: RequestClassification,
    pub matcher: Matcher,
}

/// Ordered classification table.
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: Vec<Rule>,
}

/// Build a case-insensitive `\.(a|b|c)$` pattern from bare extensions.
fn extension_pattern(extensions: &[String]) -> Result<Regex, regex::Error> {
    let alternatives: Vec<String> = extensions
        .iter()
        .map(|e| regex::escape(e.trim_start_matches('.')))
        .collect();
    Regex::new(&format!(r"(?i)\.({})$", alternatives.join("|")))
}

impl Classifier {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Build the standard table from configuration.
    pub fn from_config(config: &ClassifierConfig) -> Result<Self, regex::Error> {
        use RequestClassification::*;

        let image_ext = extension_pattern(&config.image_extensions)?;
        let static_ext = extension_pattern(&config.static_extensions)?;

        let rule = |category, matcher| Rule { category, matcher };
        let rules = vec![
            rule(Image, Matcher::Destination(vec![Destination::Image])),
            rule(Image, Matcher::PathPattern(image_ext.clone())),
            rule(Image, Matcher::PathUnder(config.image_dirs.clone())),
            rule(Image, Matcher::PathUnderWithPattern(config.file_dirs.clone(), image_ext)),
            rule(Api, Matcher::PathEquals(config.index_resource.clone())),
            rule(Api, Matcher::PathContains(vec![".json".to_string()])),
            rule(Api, Matcher::PathContains(config.api_segments.clone())),
            rule(
                StaticAsset,
                Matcher::Destination(vec![Destination::Style, Destination::Script, Destination::Font]),
            ),
            rule(StaticAsset, Matcher::PathPattern(static_ext)),
            rule(StaticAsset, Matcher::PathUnder(config.static_dirs.clone())),
            rule(StaticAsset, Matcher::Host(config.cdn_hosts.clone())),
            rule(Html, Matcher::Destination(vec![Destination::Document])),
            rule(Html, Matcher::AcceptsHtml),
        ];

        Ok(Self::new(rules))
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Category of a request; Other when no rule matches.
    pub fn classify(&self, request: &RequestDescriptor) -> RequestClassification {
        self.rules
            .iter()
            .find(|rule| rule.matcher.matches(request))
            .map(|rule| rule.category)
            .unwrap_or(RequestClassification::Other)
    }

    /// Classify an eligible request, or decline it.
    ///
    /// Non-GET requests and non-HTTP(S) schemes return None; the host passes
    /// them through untouched.
    pub fn route(&self, request: &RequestDescriptor) -> Option<RequestClassification> {
        if !request.is_get() || !is_http(&request.url) {
            return None;
        }
        Some(self.classify(request))
    }
}
