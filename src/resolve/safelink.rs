//! Safelink gateway unwrapping
//!
//! Gateways sit between a listing and the real file host. The destination is
//! taken from the first of: the HTTP redirect chain, a meta refresh, a script
//! redirect, or the first outbound anchor.

use tracing::debug;
use url::Url;

use super::extract;
use crate::fetch::{browser_headers, Fetcher};

/// Follow a safelink gateway to its destination.
///
/// Returns `None` when the gateway page can't be fetched or names no
/// destination.
pub async fn unwrap_safelink(fetcher: &dyn Fetcher, url: &str) -> Option<String> {
    let page = match fetcher.get(url, &browser_headers()).await {
        Ok(page) => page,
        Err(e) => {
            debug!(url, error = %e, "safelink fetch failed");
            return None;
        }
    };

    let gateway_host = Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default();

    if left_gateway(&page.final_url, &gateway_host) {
        return Some(page.final_url);
    }

    let destination = extract::meta_refresh(&page.body)
        .or_else(|| extract::script_redirect(&page.body))
        .and_then(|target| extract::absolutize(&target, &page.final_url))
        .or_else(|| extract::outbound_anchor(&page.body, &gateway_host));

    debug!(url, destination = ?destination, "unwrapped safelink");
    destination
}

fn left_gateway(final_url: &str, gateway_host: &str) -> bool {
    Url::parse(final_url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .is_some_and(|host| !gateway_host.is_empty() && host != gateway_host)
}
