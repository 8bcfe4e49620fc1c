//! Indirection token resolution
//!
//! Some sites list servers as deferred AJAX calls instead of URLs. Resolving a
//! token posts the stored parameters to the site's `admin-ajax.php`, pulls the
//! iframe out of the reply and runs it through the embed resolver. Successful
//! results are cached for the process lifetime of the cache entry.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use super::{extract, EmbedResolver};
use crate::cache::TtlCache;
use crate::fetch::{browser_headers_with_referer, FetchError, USER_AGENT};
use crate::models::{Headers, IndirectToken, ResolvedMedia, TokenParams};

/// Errors resolving an indirection token
#[derive(Error, Debug)]
pub enum TokenError {
    #[error("No AJAX endpoint registered for provider '{0}'")]
    UnknownProvider(String),

    #[error("Request failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("AJAX endpoint returned status {0}")]
    Status(u16),

    #[error("Unexpected AJAX response: {0}")]
    BadResponse(String),

    #[error("AJAX response has no player iframe")]
    NoIframe,
}

/// Where a provider's AJAX calls go
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AjaxEndpoint {
    /// `.../wp-admin/admin-ajax.php`
    pub url: String,
    /// Site origin, sent as Origin and used as Referer for the embed
    pub origin: String,
}

impl AjaxEndpoint {
    pub fn new(origin: impl Into<String>) -> Self {
        let origin = origin.into().trim_end_matches('/').to_string();
        Self {
            url: format!("{}/wp-admin/admin-ajax.php", origin),
            origin,
        }
    }

    fn referer(&self) -> String {
        format!("{}/", self.origin)
    }
}

#[derive(Debug, Deserialize)]
struct AjaxReply {
    data: String,
}

/// Resolves [`IndirectToken`]s into playable media
pub struct TokenResolver {
    embeds: Arc<EmbedResolver>,
    cache: Arc<TtlCache<String, ResolvedMedia>>,
    endpoints: HashMap<String, AjaxEndpoint>,
}

impl TokenResolver {
    /// Resolver with the built-in endpoints for the known token providers
    pub fn new(embeds: Arc<EmbedResolver>, cache: Arc<TtlCache<String, ResolvedMedia>>) -> Self {
        Self {
            embeds,
            cache,
            endpoints: HashMap::new(),
        }
        .with_endpoint("otakudesu", AjaxEndpoint::new("https://otakudesu.best"))
        .with_endpoint("samehadaku", AjaxEndpoint::new("https://v1.samehadaku.how"))
    }

    /// Register or replace a provider's endpoint (used for testing)
    pub fn with_endpoint(mut self, provider: impl Into<String>, endpoint: AjaxEndpoint) -> Self {
        self.endpoints.insert(provider.into(), endpoint);
        self
    }

    pub fn handles(&self, provider: &str) -> bool {
        self.endpoints.contains_key(provider)
    }

    /// Resolve a token, consulting the cache first
    pub async fn resolve(&self, token: &IndirectToken) -> Result<ResolvedMedia, TokenError> {
        let key = token.cache_key();
        if let Some(hit) = self.cache.get(&key) {
            debug!(provider = %token.provider, "token cache hit");
            return Ok(hit);
        }

        let media = self.resolve_uncached(token).await?;
        self.cache.insert(key, media.clone());
        Ok(media)
    }

    async fn resolve_uncached(&self, token: &IndirectToken) -> Result<ResolvedMedia, TokenError> {
        let endpoint = self
            .endpoints
            .get(&token.provider)
            .ok_or_else(|| TokenError::UnknownProvider(token.provider.clone()))?;

        let mut headers = browser_headers_with_referer(&endpoint.referer());
        headers.insert("Origin".to_string(), endpoint.origin.clone());
        headers.insert("X-Requested-With".to_string(), "XMLHttpRequest".to_string());

        let form = form_fields(&token.params);
        let page = self
            .embeds
            .fetcher()
            .post_form(&endpoint.url, &headers, &form)
            .await?;
        if !page.is_success() {
            return Err(TokenError::Status(page.status));
        }

        let html = reply_html(&page.body)?;
        let src = iframe_src(&html).ok_or(TokenError::NoIframe)?;
        info!(provider = %token.provider, src = %src, "token resolved to embed");

        if src.contains("youtube.com") || src.contains("youtu.be") {
            return Ok(ResolvedMedia::direct(src));
        }

        let referer = endpoint.referer();
        match self.embeds.resolve_embedded(&src, &referer).await {
            Some(media) => Ok(media),
            None => {
                debug!(src = %src, "embed unresolved, returning iframe url");
                Ok(ResolvedMedia::with_headers(src, embed_headers(&referer)))
            }
        }
    }
}

fn embed_headers(referer: &str) -> Headers {
    let mut headers = Headers::new();
    headers.insert("User-Agent".to_string(), USER_AGENT.to_string());
    headers.insert("Referer".to_string(), referer.to_string());
    headers
}

/// Form body for the AJAX call
fn form_fields(params: &TokenParams) -> Vec<(String, String)> {
    match params {
        TokenParams::Mirror {
            action,
            nonce,
            payload,
        } => {
            let mut form: Vec<(String, String)> = payload
                .iter()
                .map(|(k, v)| {
                    let value = match v {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (k.clone(), value)
                })
                .collect();
            form.push(("action".to_string(), action.clone()));
            form.push(("nonce".to_string(), nonce.clone()));
            form
        }
        TokenParams::PlayerOption {
            post,
            nume,
            option_type,
        } => vec![
            ("action".to_string(), "player_ajax".to_string()),
            ("post".to_string(), post.clone()),
            ("nume".to_string(), nume.clone()),
            ("type".to_string(), option_type.clone()),
        ],
    }
}

/// Player HTML from an AJAX reply: either `{"data": base64(html)}` or raw HTML
fn reply_html(body: &str) -> Result<String, TokenError> {
    if let Ok(reply) = serde_json::from_str::<AjaxReply>(body) {
        let bytes = STANDARD
            .decode(reply.data.trim())
            .map_err(|e| TokenError::BadResponse(e.to_string()))?;
        return Ok(String::from_utf8_lossy(&bytes).into_owned());
    }
    if body.contains("<iframe") || body.contains("src=") {
        return Ok(body.to_string());
    }
    Err(TokenError::BadResponse(body.chars().take(120).collect()))
}

fn iframe_src(html: &str) -> Option<String> {
    extract::iframe_src(html).or_else(|| {
        let re = Regex::new(r#"src="([^"]+)""#).ok()?;
        re.captures(html).map(|c| c[1].to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_fields_mirror() {
        let mut payload = serde_json::Map::new();
        payload.insert("id".to_string(), serde_json::json!(123));
        payload.insert("q".to_string(), serde_json::json!("720p"));
        let form = form_fields(&TokenParams::Mirror {
            action: "act".to_string(),
            nonce: "n0nce".to_string(),
            payload,
        });

        assert!(form.contains(&("id".to_string(), "123".to_string())));
        assert!(form.contains(&("q".to_string(), "720p".to_string())));
        assert!(form.contains(&("action".to_string(), "act".to_string())));
        assert!(form.contains(&("nonce".to_string(), "n0nce".to_string())));
    }

    #[test]
    fn test_form_fields_player_option() {
        let form = form_fields(&TokenParams::PlayerOption {
            post: "42".to_string(),
            nume: "2".to_string(),
            option_type: "schtml".to_string(),
        });
        assert_eq!(form[0], ("action".to_string(), "player_ajax".to_string()));
        assert_eq!(form[3], ("type".to_string(), "schtml".to_string()));
    }

    #[test]
    fn test_reply_html_base64() {
        let html = r#"<iframe src="https://desustream.info/dstream/x"></iframe>"#;
        let body = format!(r#"{{"data":"{}"}}"#, STANDARD.encode(html));
        let decoded = reply_html(&body).unwrap();
        assert_eq!(iframe_src(&decoded).as_deref(), Some("https://desustream.info/dstream/x"));
    }

    #[test]
    fn test_reply_html_raw_and_garbage() {
        let raw = r#"<div><iframe src="https://www.blogger.com/video.g?token=t"></iframe></div>"#;
        assert_eq!(reply_html(raw).unwrap(), raw);
        assert!(matches!(reply_html("0"), Err(TokenError::BadResponse(_))));
    }

    #[test]
    fn test_endpoint_from_origin() {
        let e = AjaxEndpoint::new("https://v1.samehadaku.how/");
        assert_eq!(e.url, "https://v1.samehadaku.how/wp-admin/admin-ajax.php");
        assert_eq!(e.referer(), "https://v1.samehadaku.how/");
    }
}
