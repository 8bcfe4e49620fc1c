//! Server link classification and ordering
//!
//! Every raw link is run through an ordered rule table: blacklist first, then
//! direct-stream hosts, then browser-only hosts. The first matching rule decides
//! the tier; links matching nothing are download-only. Classification is pure
//! and idempotent.

use serde::Serialize;

use crate::models::{ClassifiedLink, LinkTier, ProviderTag, RawLink, BROWSER_MARKER, STREAM_MARKER};

/// Hosts that are broken or dead; links to them are dropped
pub const BLACKLIST_KEYWORDS: &[&str] = &[
    "gdriveplayer", // Broken wrapper, returns 404
    "solidfiles",   // SSL failures
    "letsupload",
];

/// Hosts with a resolver or native player support
pub const DIRECT_STREAM_KEYWORDS: &[&str] = &[
    "sokuja",
    "vidhide",
    "streamhd",
    "streamwish",
    "filemoon",
    "pixeldrain",
    "pdrain",
    "kraken",
    "gdrive",
    "drive",
    "desudrive",
    "blogger",
];

/// Hosts that only work in a browser (captcha, session cookies)
pub const BROWSER_ONLY_KEYWORDS: &[&str] = &[
    "mega",
    "acefile",
    "racaty",
    "mirrorupload",
    "wibufile",
    "yourupload",
    "zippyshare",
];

/// Outcome of a matching rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Drop,
    Assign(LinkTier),
}

/// One row of the rule table
#[derive(Debug, Clone)]
struct Rule {
    keywords: Vec<String>,
    /// Also match links the provider tagged as streams or that carry a token
    provider_stream: bool,
    verdict: Verdict,
}

impl Rule {
    fn matches(&self, link: &RawLink, url: &str, server: &str) -> bool {
        if self.provider_stream
            && (link.tag == Some(ProviderTag::Stream) || link.target.is_token())
        {
            return true;
        }
        self.keywords
            .iter()
            .any(|k| url.contains(k.as_str()) || server.contains(k.as_str()))
    }
}

/// Keyword-driven link classifier
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: Vec<Rule>,
}

impl Classifier {
    /// Build a classifier from custom keyword lists (evaluated in this order)
    pub fn with_keywords(blacklist: &[&str], direct: &[&str], browser: &[&str]) -> Self {
        let owned = |list: &[&str]| list.iter().map(|k| k.to_lowercase()).collect::<Vec<_>>();
        Self {
            rules: vec![
                Rule {
                    keywords: owned(blacklist),
                    provider_stream: false,
                    verdict: Verdict::Drop,
                },
                Rule {
                    keywords: owned(direct),
                    provider_stream: true,
                    verdict: Verdict::Assign(LinkTier::DirectStream),
                },
                Rule {
                    keywords: owned(browser),
                    provider_stream: false,
                    verdict: Verdict::Assign(LinkTier::BrowserEmbed),
                },
            ],
        }
    }

    /// Assign a tier and display label, or `None` when the link is blacklisted
    pub fn classify(&self, link: &RawLink) -> Option<ClassifiedLink> {
        let bare_server = strip_markers(&link.server);
        let server = bare_server.to_lowercase();
        let url = link.target.url().unwrap_or_default().to_lowercase();

        let verdict = self
            .rules
            .iter()
            .find(|rule| rule.matches(link, &url, &server))
            .map(|rule| rule.verdict)
            .unwrap_or(Verdict::Assign(LinkTier::DownloadOnly));

        let tier = match verdict {
            Verdict::Drop => return None,
            Verdict::Assign(tier) => tier,
        };

        let display_server = match tier.marker() {
            Some(marker) => format!("{} {}", marker, bare_server),
            None => bare_server.to_string(),
        };

        Some(ClassifiedLink {
            raw: link.clone(),
            tier,
            display_server,
        })
    }

    /// Classify every link, dropping blacklisted ones
    pub fn classify_all(&self, links: &[RawLink]) -> Vec<ClassifiedLink> {
        links.iter().filter_map(|l| self.classify(l)).collect()
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::with_keywords(BLACKLIST_KEYWORDS, DIRECT_STREAM_KEYWORDS, BROWSER_ONLY_KEYWORDS)
    }
}

/// Server label without any leading tier markers
fn strip_markers(server: &str) -> &str {
    let mut s = server.trim_start();
    loop {
        let next = s
            .strip_prefix(STREAM_MARKER)
            .or_else(|| s.strip_prefix(BROWSER_MARKER));
        match next {
            Some(rest) => s = rest.trim_start(),
            None => return s,
        }
    }
}

/// Order links direct-stream first, then browser-only, then download-only.
/// The sort is stable so provider order survives within each tier.
pub fn organize(mut links: Vec<ClassifiedLink>) -> Vec<ClassifiedLink> {
    links.sort_by_key(|l| l.tier);
    links
}

/// Classify then organize a provider's raw links
pub fn classify_and_organize(classifier: &Classifier, links: &[RawLink]) -> Vec<ClassifiedLink> {
    organize(classifier.classify_all(links))
}

/// Per-tier counts for list headers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TierCounts {
    pub stream: usize,
    pub browser: usize,
    pub download: usize,
}

impl TierCounts {
    pub fn of(links: &[ClassifiedLink]) -> Self {
        links.iter().fold(Self::default(), |mut acc, l| {
            match l.tier {
                LinkTier::DirectStream => acc.stream += 1,
                LinkTier::BrowserEmbed => acc.browser += 1,
                LinkTier::DownloadOnly => acc.download += 1,
            }
            acc
        })
    }
}

impl std::fmt::Display for TierCounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} Stream | {} {} Browser | 💾 {} Download",
            STREAM_MARKER, self.stream, BROWSER_MARKER, self.browser, self.download
        )
    }
}
