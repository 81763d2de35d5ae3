//! Per-kind ranking (§4.G step 3). Each kind scores on a shared notion of
//! relevance (query-term overlap with the candidate title) plus a kind
//! specific signal: view count and recency for video, popularity and
//! recency for song, host authority and recency for knowledge.

use chrono::{DateTime, Utc};
use routecast_types::{AgentKind, Candidate};

/// Lower/upper duration bounds a video candidate is expected to fall
/// within. Candidates outside the bounds are deprioritized, not dropped:
/// a route step with nothing else available still gets a best-effort pick.
#[derive(Debug, Clone, Copy, Default)]
pub struct VideoDurationBounds {
    pub min_seconds: Option<u64>,
    pub max_seconds: Option<u64>,
}

/// Lowercased, deduplicated words pulled out of the queries an agent ran,
/// used as the substrate for relevance scoring.
pub fn query_terms(queries: &[String]) -> Vec<String> {
    let mut terms: Vec<String> = queries
        .iter()
        .flat_map(|q| q.to_lowercase().split_whitespace().map(str::to_string).collect::<Vec<_>>())
        .filter(|w| w.len() > 2)
        .collect();
    terms.sort();
    terms.dedup();
    terms
}

fn relevance(terms: &[String], title: &str) -> f64 {
    let title_lower = title.to_lowercase();
    terms.iter().filter(|t| title_lower.contains(t.as_str())).count() as f64
}

fn recency(published_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    match published_at {
        Some(dt) => {
            let age_days = (now - dt).num_days().max(0) as f64;
            ((3650.0 - age_days) / 365.0).max(0.0)
        }
        None => 0.0,
    }
}

fn authority(candidate: &Candidate) -> f64 {
    if let Some(a) = candidate.authority {
        return a;
    }
    let host = host_of(&candidate.url).to_lowercase();
    if host.ends_with(".gov") || host.ends_with(".edu") || host.contains("wikipedia.org") {
        3.0
    } else {
        0.0
    }
}

fn host_of(url: &str) -> &str {
    let without_scheme = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    without_scheme.split(['/', '?', '#']).next().unwrap_or(without_scheme)
}

/// Scores one candidate for ranking within a single agent run. Higher is
/// better; negative scores are possible (a video outside the configured
/// duration bounds) and still rankable, never filtered out entirely.
pub fn score(
    kind: AgentKind,
    candidate: &Candidate,
    terms: &[String],
    now: DateTime<Utc>,
    video_bounds: VideoDurationBounds,
) -> f64 {
    let rel = relevance(terms, &candidate.title);
    let rec = recency(candidate.published_at, now);
    match kind {
        AgentKind::Video => {
            let views = candidate.view_count.unwrap_or(0) as f64 / 1000.0;
            let duration_bonus = match candidate.duration_seconds {
                Some(d) => {
                    let min_ok = video_bounds.min_seconds.map_or(true, |min| d >= min);
                    let max_ok = video_bounds.max_seconds.map_or(true, |max| d <= max);
                    if min_ok && max_ok {
                        5.0
                    } else {
                        -1000.0
                    }
                }
                None => 0.0,
            };
            10.0 * rel + views + rec + duration_bonus
        }
        AgentKind::Song => {
            let popularity = candidate.popularity.unwrap_or(0.0) / 100.0;
            10.0 * rel + 2.0 * rec + popularity
        }
        AgentKind::Knowledge => 5.0 * authority(candidate) + 10.0 * rel + 2.0 * rec,
    }
}

/// Sorts candidates by descending score, preserving first-seen order among
/// ties (the sort is stable; scores are computed once up front).
pub fn rank(
    kind: AgentKind,
    mut candidates: Vec<Candidate>,
    terms: &[String],
    now: DateTime<Utc>,
    video_bounds: VideoDurationBounds,
) -> Vec<(Candidate, f64)> {
    let mut scored: Vec<(Candidate, f64)> = candidates
        .drain(..)
        .map(|c| {
            let s = score(kind, &c, terms, now, video_bounds);
            (c, s)
        })
        .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(title: &str) -> Candidate {
        Candidate {
            id: None,
            title: title.to_string(),
            url: "https://example.com/a".to_string(),
            source: "mock".to_string(),
            snippet: None,
            view_count: None,
            popularity: None,
            authority: None,
            published_at: None,
            duration_seconds: None,
        }
    }

    #[test]
    fn higher_relevance_ranks_first() {
        let terms = query_terms(&["lombard street tour".to_string()]);
        let candidates = vec![candidate("unrelated video"), candidate("lombard street tour guide")];
        let ranked = rank(AgentKind::Video, candidates, &terms, Utc::now(), VideoDurationBounds::default());
        assert!(ranked[0].0.title.contains("lombard"));
    }

    #[test]
    fn video_outside_duration_bounds_is_deprioritized_not_dropped() {
        let mut short = candidate("crooked street");
        short.duration_seconds = Some(10);
        let mut long_enough = candidate("crooked street");
        long_enough.duration_seconds = Some(120);
        let bounds = VideoDurationBounds {
            min_seconds: Some(60),
            max_seconds: Some(600),
        };
        let ranked = rank(
            AgentKind::Video,
            vec![short.clone(), long_enough.clone()],
            &[],
            Utc::now(),
            bounds,
        );
        assert_eq!(ranked.len(), 2, "both candidates still present");
        assert_eq!(ranked[0].0.duration_seconds, Some(120));
    }

    #[test]
    fn knowledge_favors_authoritative_hosts() {
        let mut wiki = candidate("history of lombard street");
        wiki.url = "https://en.wikipedia.org/wiki/Lombard_Street".to_string();
        let blog = candidate("history of lombard street");
        let ranked = rank(AgentKind::Knowledge, vec![blog, wiki.clone()], &[], Utc::now(), VideoDurationBounds::default());
        assert_eq!(ranked[0].0.url, wiki.url);
    }

    #[test]
    fn query_terms_drops_short_filler_words() {
        let terms = query_terms(&["a to the of tour".to_string()]);
        assert_eq!(terms, vec!["tour".to_string()]);
    }
}
