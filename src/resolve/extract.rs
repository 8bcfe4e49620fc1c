//! HTML and script extraction helpers
//!
//! Each function takes page text and returns the first candidate URL it can
//! find, or `None`. Nothing here does I/O.

use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

/// File extensions that a media player can open directly
const MEDIA_EXTENSIONS: &[&str] = &[".mp4", ".m3u8", ".mkv", ".webm", ".mpd"];

/// True if `url` already points at playable media rather than a page
pub fn is_direct_media(url: &str) -> bool {
    let lower = url.to_lowercase();
    if lower.contains("googlevideo.com/videoplayback")
        || lower.contains("pixeldrain.com/api/file/")
    {
        return true;
    }
    let path = Url::parse(&lower)
        .map(|u| u.path().to_string())
        .unwrap_or(lower);
    MEDIA_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// `scheme://host/` of a URL, used as a Referer for assets it embeds
pub fn origin_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(match parsed.port() {
        Some(port) => format!("{}://{}:{}/", parsed.scheme(), host, port),
        None => format!("{}://{}/", parsed.scheme(), host),
    })
}

/// Make a possibly relative reference absolute against `base`
pub fn absolutize(reference: &str, base: &str) -> Option<String> {
    let reference = reference.trim();
    if reference.is_empty() {
        return None;
    }
    if reference.starts_with("http://") || reference.starts_with("https://") {
        return Some(reference.to_string());
    }
    let base = Url::parse(base).ok()?;
    base.join(reference).ok().map(|u| u.to_string())
}

fn first_attr(html: &str, selector: &str, attr: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .filter_map(|el| el.value().attr(attr))
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(str::to_string)
}

/// `src` of the first iframe
pub fn iframe_src(html: &str) -> Option<String> {
    first_attr(html, "iframe[src]", "src")
}

/// `src` of a `<video>` source element, or of the video element itself
pub fn video_source(html: &str) -> Option<String> {
    first_attr(html, "video source[src]", "src").or_else(|| first_attr(html, "video[src]", "src"))
}

/// Content of an OpenGraph video meta tag
pub fn og_video(html: &str) -> Option<String> {
    first_attr(html, r#"meta[property="og:video"]"#, "content")
        .or_else(|| first_attr(html, r#"meta[property="og:video:url"]"#, "content"))
        .or_else(|| first_attr(html, r#"meta[property="og:video:secure_url"]"#, "content"))
}

/// Target of a `<meta http-equiv="refresh" content="0;URL=...">` tag
pub fn meta_refresh(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("meta[http-equiv][content]").ok()?;
    let re = Regex::new(r#"(?i)url\s*=\s*['"]?([^'"\s;]+)"#).ok()?;

    document
        .select(&selector)
        .filter(|el| {
            el.value()
                .attr("http-equiv")
                .is_some_and(|v| v.eq_ignore_ascii_case("refresh"))
        })
        .filter_map(|el| el.value().attr("content"))
        .find_map(|content| re.captures(content).map(|c| c[1].to_string()))
}

/// Target of a JavaScript `location = "..."` or `location.replace("...")`
pub fn script_redirect(html: &str) -> Option<String> {
    let patterns = [
        r#"window\.location\.replace\(\s*["']([^"']+)["']\s*\)"#,
        r#"location\.replace\(\s*["']([^"']+)["']\s*\)"#,
        r#"window\.location(?:\.href)?\s*=\s*["']([^"']+)["']"#,
        r#"location\.href\s*=\s*["']([^"']+)["']"#,
        r#"location\s*=\s*["']([^"']+)["']"#,
    ];
    patterns
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .find_map(|re| re.captures(html).map(|c| c[1].to_string()))
}

/// First absolute link leaving `gateway_host` (and its subdomains)
pub fn outbound_anchor(html: &str, gateway_host: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("a[href]").ok()?;
    let gateway = gateway_host.trim_start_matches("www.").to_lowercase();

    document
        .select(&selector)
        .filter_map(|el| el.value().attr("href"))
        .filter(|href| href.starts_with("http://") || href.starts_with("https://"))
        .find(|href| {
            Url::parse(href)
                .ok()
                .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
                .is_some_and(|host| host != gateway && !host.ends_with(&format!(".{}", gateway)))
        })
        .map(str::to_string)
}

/// Video URL from an inline player setup script.
///
/// Handles the packed `o={"1k":"...","1l":"..."}` object some hosts emit
/// (HLS preferred over MP4) and jwplayer-style `sources: [{file: "..."}]`.
pub fn script_player_url(html: &str) -> Option<String> {
    if let Some(url) = packed_object_url(html) {
        return Some(url);
    }

    let sources = Regex::new(r"sources\s*:\s*\[([^\]]+)\]").ok()?;
    let file = Regex::new(r#"file\s*:\s*["']([^"']+)["']"#).ok()?;
    sources
        .captures(html)
        .and_then(|c| file.captures(&c[1]).map(|f| f[1].to_string()))
}

fn packed_object_url(html: &str) -> Option<String> {
    let object = Regex::new(r"\bo\s*=\s*\{([^}]+)\}").ok()?;
    let pair = Regex::new(r#""([^"]+)"\s*:\s*"([^"]+)""#).ok()?;

    let body = object.captures(html)?.get(1)?.as_str().to_string();
    let values: Vec<String> = pair
        .captures_iter(&body)
        .map(|c| c[2].to_string())
        .filter(|v| v.contains("://") || v.starts_with('/'))
        .collect();

    values
        .iter()
        .find(|v| v.contains("m3u8"))
        .or_else(|| values.iter().find(|v| v.contains("mp4")))
        .or_else(|| values.iter().find(|v| v.contains("://")))
        .cloned()
}

/// Last-resort scan of raw HTML for an absolute HLS or MP4 URL
pub fn raw_media_url(html: &str) -> Option<String> {
    [
        r#"(https?://[^"'\s<>]+\.m3u8[^"'\s<>]*)"#,
        r#"(https?://[^"'\s<>]+\.mp4[^"'\s<>]*)"#,
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .find_map(|re| re.captures(html).map(|c| c[1].to_string()))
}

/// Longest `googlevideo.com/videoplayback` URL in the page, JSON-unescaped
pub fn googlevideo_url(html: &str) -> Option<String> {
    let re = Regex::new(r#"(https://[^"'\s]+googlevideo\.com/videoplayback[^"'\s]+)"#).ok()?;
    re.captures_iter(html)
        .map(|c| c[1].to_string())
        .max_by_key(|u| u.len())
        .map(|u| {
            u.replace("\\u003d", "=")
                .replace("\\u0026", "&")
                .replace("\\/", "/")
        })
}

/// Download link on a file-host page: an anchor whose text or href mentions
/// "download" and that stays on the host or points at an MP4
pub fn download_anchor(html: &str, host_keyword: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("a[href]").ok()?;
    document.select(&selector).find_map(|el| {
        let href = el.value().attr("href")?;
        let text = el.text().collect::<String>().to_lowercase();
        let mentions_download = text.contains("download") || href.contains("download");
        let plausible = href.starts_with("http")
            && (href.contains(".mp4") || href.contains(host_keyword));
        (mentions_download && plausible).then(|| href.to_string())
    })
}
