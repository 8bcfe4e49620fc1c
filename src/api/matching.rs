//! Title variants and season/episode matching
//!
//! Indonesian sites index shows by short romaji names, so searches start with
//! the shortest plausible form of a title. Season matching is a best-effort
//! heuristic over result titles and reports how sure it is.

use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;

use crate::models::{AnimeRef, EpisodeRef};

/// Search titles in priority order: short forms, then the full titles by
/// length. Case-insensitive duplicates and entries under 3 characters are
/// dropped.
pub fn title_variants<S: AsRef<str>>(titles: &[S]) -> Vec<String> {
    let mut by_length: Vec<&str> = titles
        .iter()
        .map(|t| t.as_ref().trim())
        .filter(|t| !t.is_empty())
        .collect();
    by_length.sort_by_key(|t| t.chars().count());

    let mut short = Vec::new();
    for title in &by_length {
        if let Some((head, _)) = title.split_once(':') {
            short.push(head.trim().to_string());
        }
        if title.chars().any(|c| c.is_ascii_alphabetic()) {
            let words: Vec<&str> = title.split_whitespace().collect();
            if words.len() >= 2 {
                short.push(words.iter().take(3).copied().collect::<Vec<_>>().join(" "));
            }
        }
    }

    let mut seen = HashSet::new();
    short
        .into_iter()
        .chain(by_length.into_iter().map(str::to_string))
        .filter(|t| t.chars().count() >= 3)
        .filter(|t| seen.insert(t.to_lowercase()))
        .collect()
}

/// How a season match was decided
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchConfidence {
    /// Title names the requested season
    Exact,
    /// Season 1 picked because the title names no later season
    Inferred,
    /// Nothing matched; first result taken
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeasonMatch {
    pub anime: AnimeRef,
    pub confidence: MatchConfidence,
}

fn ordinal(n: u32) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{}", n, suffix)
}

fn season_pattern(season: u32) -> Option<Regex> {
    Regex::new(&format!(
        r"\b(?:season\s*{n}|s{n}|part\s*{n}|{ord}(?:\s+season)?)\b",
        n = season,
        ord = ordinal(season)
    ))
    .ok()
}

/// Any marker of a season after the first
fn later_season_pattern() -> Option<Regex> {
    Regex::new(r"\b(?:season\s*0*(?:[2-9]|\d{2,})|s0*(?:[2-9]|\d{2,})|part\s*(?:[2-9]|\d{2,})|(?:2nd|3rd|\d+th)\s+season)\b").ok()
}

/// Pick the search result for `season`
pub fn match_season(results: &[AnimeRef], season: u32) -> Option<SeasonMatch> {
    let first = results.first()?;
    let found = |anime: &AnimeRef, confidence| {
        Some(SeasonMatch {
            anime: anime.clone(),
            confidence,
        })
    };

    if let Some(re) = season_pattern(season) {
        if let Some(anime) = results.iter().find(|a| re.is_match(&a.title.to_lowercase())) {
            return found(anime, MatchConfidence::Exact);
        }
    }

    if season == 1 {
        if let Some(later) = later_season_pattern() {
            if let Some(anime) = results
                .iter()
                .find(|a| !later.is_match(&a.title.to_lowercase()))
            {
                return found(anime, MatchConfidence::Inferred);
            }
        }
    }

    found(first, MatchConfidence::Fallback)
}

/// Pick episode `number`: by the listed number first, then by
/// "episode N" in the title
pub fn match_episode(episodes: &[EpisodeRef], number: u32) -> Option<&EpisodeRef> {
    if let Some(ep) = episodes.iter().find(|e| e.number.numeric() == Some(number)) {
        return Some(ep);
    }

    let re = Regex::new(r"episode\s+(\d+)").ok()?;
    episodes.iter().find(|e| {
        re.captures(&e.title.to_lowercase())
            .and_then(|c| c[1].parse::<u32>().ok())
            == Some(number)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EpisodeNumber;

    fn anime(title: &str) -> AnimeRef {
        AnimeRef {
            provider: "test".to_string(),
            title: title.to_string(),
            url: format!("https://site.example/{}", title.len()),
            thumbnail: None,
        }
    }

    fn episode(number: &str, title: &str) -> EpisodeRef {
        EpisodeRef {
            provider: "test".to_string(),
            anime: anime("Show"),
            number: EpisodeNumber::from(number),
            title: title.to_string(),
            url: format!("https://site.example/ep/{}", number),
        }
    }

    #[test]
    fn test_title_variants_short_first() {
        let titles = [
            "Maou Gakuin no Futekigousha: Shijou Saikyou no Maou no Shiso",
            "The Misfit of Demon King Academy",
        ];
        let variants = title_variants(&titles);
        assert_eq!(variants[0], "The Misfit of");
        assert!(variants.contains(&"Maou Gakuin no Futekigousha".to_string()));
        assert!(variants.contains(&"Maou Gakuin no".to_string()));
        // Full titles come after every short form
        let full = variants
            .iter()
            .position(|v| v == "The Misfit of Demon King Academy")
            .unwrap();
        assert!(variants[..full].iter().all(|v| v.len() < 40));
    }

    #[test]
    fn test_title_variants_dedup_and_min_length() {
        let titles = ["Naruto", "naruto", "NA", "", "ナルト"];
        assert_eq!(title_variants(&titles), vec!["ナルト", "Naruto"]);
    }

    #[test]
    fn test_ordinal() {
        assert_eq!(ordinal(1), "1st");
        assert_eq!(ordinal(2), "2nd");
        assert_eq!(ordinal(3), "3rd");
        assert_eq!(ordinal(4), "4th");
        assert_eq!(ordinal(11), "11th");
        assert_eq!(ordinal(22), "22nd");
    }

    #[test]
    fn test_match_season_explicit() {
        let results = vec![anime("Mushoku Tensei"), anime("Mushoku Tensei Season 2")];
        let m = match_season(&results, 2).unwrap();
        assert_eq!(m.anime.title, "Mushoku Tensei Season 2");
        assert_eq!(m.confidence, MatchConfidence::Exact);
    }

    #[test]
    fn test_match_season_ordinal_and_short() {
        let results = vec![anime("Kimetsu"), anime("Oshi no Ko 2nd Season")];
        assert_eq!(match_season(&results, 2).unwrap().anime.title, "Oshi no Ko 2nd Season");

        let results = vec![anime("Kaiju No. 8"), anime("Spy x Family S3")];
        assert_eq!(match_season(&results, 3).unwrap().anime.title, "Spy x Family S3");
    }

    #[test]
    fn test_match_season_one_skips_sequels() {
        let results = vec![anime("Vinland Saga Season 2"), anime("Vinland Saga")];
        let m = match_season(&results, 1).unwrap();
        assert_eq!(m.anime.title, "Vinland Saga");
        assert_eq!(m.confidence, MatchConfidence::Inferred);
    }

    #[test]
    fn test_match_season_fallback() {
        let results = vec![anime("Frieren"), anime("Frieren Specials")];
        let m = match_season(&results, 4).unwrap();
        assert_eq!(m.anime.title, "Frieren");
        assert_eq!(m.confidence, MatchConfidence::Fallback);
        assert!(match_season(&[], 1).is_none());
    }

    #[test]
    fn test_s2_inside_word_is_not_a_marker() {
        // "mass2" is not a season marker
        let results = vec![anime("Mass2 Effect")];
        assert_eq!(
            match_season(&results, 1).unwrap().confidence,
            MatchConfidence::Inferred
        );
    }

    #[test]
    fn test_match_episode() {
        let eps = vec![
            episode("?", "Special"),
            episode("12 END", "Finale"),
            episode("OVA", "Episode 13 Extra"),
        ];
        assert_eq!(match_episode(&eps, 12).unwrap().title, "Finale");
        assert_eq!(match_episode(&eps, 13).unwrap().number.as_str(), "OVA");
        assert!(match_episode(&eps, 1).is_none());
    }
}
