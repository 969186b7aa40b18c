//! Keyword selection between the analysis and SEO stages.

use std::collections::{BTreeMap, HashSet};

use contentcrew_shared::{
    CompetitorRankingsMap, ContentCrewError, Result, SelectedKeywordDetails,
};

/// Competitor domain → unique keywords in first-seen order.
pub type AvailableKeywords = BTreeMap<String, Vec<String>>;

pub fn available_keywords(rankings: &CompetitorRankingsMap) -> AvailableKeywords {
    rankings
        .iter()
        .map(|(domain, result)| {
            let mut seen = HashSet::new();
            let keywords = result
                .results
                .iter()
                .filter_map(|r| r.keyword.as_deref())
                .filter(|k| seen.insert(*k))
                .map(str::to_string)
                .collect();
            (domain.clone(), keywords)
        })
        .collect()
}

/// Outcome of matching a selection against the rankings.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub details: SelectedKeywordDetails,
    /// Requested keywords found in no domain.
    pub unmatched: Vec<String>,
}

/// First record seen for each selected keyword, scanning domains in
/// ascending order and records in upstream order.
pub fn build_selected_keyword_details(
    rankings: &CompetitorRankingsMap,
    selected: &[String],
) -> Result<Selection> {
    let wanted: HashSet<&str> = selected
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    if wanted.is_empty() {
        return Err(ContentCrewError::validation("no keywords selected"));
    }

    let mut details = SelectedKeywordDetails::new();
    for result in rankings.values() {
        for record in &result.results {
            let Some(keyword) = record.keyword.as_deref() else {
                continue;
            };
            if wanted.contains(keyword) && !details.contains_key(keyword) {
                details.insert(keyword.to_string(), record.clone());
            }
        }
    }

    let mut unmatched: Vec<String> = wanted
        .into_iter()
        .filter(|k| !details.contains_key(*k))
        .map(str::to_string)
        .collect();
    unmatched.sort();

    Ok(Selection { details, unmatched })
}

/// Resolve `D.K` picks (1-based domain and keyword positions, as listed by
/// [`available_keywords`]) to keywords.
pub fn resolve_picks(available: &AvailableKeywords, picks: &[String]) -> Result<Vec<String>> {
    let domains: Vec<&Vec<String>> = available.values().collect();
    let mut out = Vec::with_capacity(picks.len());

    let picks = picks
        .iter()
        .flat_map(|p| p.split(','))
        .map(str::trim)
        .filter(|p| !p.is_empty());

    for pick in picks {
        let invalid = || {
            ContentCrewError::validation(format!("invalid keyword pick '{pick}' (expected D.K)"))
        };
        let (d, k) = pick.split_once('.').ok_or_else(invalid)?;
        let d: usize = d.trim().parse().map_err(|_| invalid())?;
        let k: usize = k.trim().parse().map_err(|_| invalid())?;

        let keyword = d
            .checked_sub(1)
            .and_then(|d| domains.get(d))
            .and_then(|kws| k.checked_sub(1).and_then(|k| kws.get(k)))
            .ok_or_else(|| {
                ContentCrewError::validation(format!("keyword pick '{pick}' is out of range"))
            })?;

        if !out.contains(keyword) {
            out.push(keyword.clone());
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use contentcrew_shared::{KeywordRecord, RankingsResult};
    use serde_json::json;

    fn record(keyword: Option<&str>, volume: i64) -> KeywordRecord {
        KeywordRecord::project(&json!({ "keyword": keyword, "searchVolume": volume }))
    }

    fn rankings() -> CompetitorRankingsMap {
        BTreeMap::from([
            (
                "y.com".to_string(),
                RankingsResult {
                    result_count: None,
                    results: vec![record(Some("school admission"), 200), record(Some("fees"), 5)],
                },
            ),
            (
                "x.com".to_string(),
                RankingsResult {
                    result_count: None,
                    results: vec![
                        record(Some("school admission"), 100),
                        record(None, 1),
                        record(Some("school admission"), 300),
                        record(Some("cbse"), 7),
                    ],
                },
            ),
        ])
    }

    #[test]
    fn available_keywords_are_unique_in_first_seen_order() {
        let available = available_keywords(&rankings());
        assert_eq!(available["x.com"], ["school admission", "cbse"]);
        assert_eq!(available["y.com"], ["school admission", "fees"]);
        assert_eq!(available.keys().collect::<Vec<_>>(), ["x.com", "y.com"]);
    }

    #[test]
    fn first_seen_record_wins_in_domain_order() {
        let selection = build_selected_keyword_details(
            &rankings(),
            &["school admission".into(), "fees".into(), "missing".into()],
        )
        .unwrap();

        assert_eq!(selection.details.len(), 2);
        let admission = &selection.details["school admission"];
        assert_eq!(admission.search_volume.as_ref().and_then(|n| n.as_i64()), Some(100));
        assert_eq!(selection.unmatched, ["missing"]);
    }

    #[test]
    fn selection_is_deterministic() {
        let selected = vec!["school admission".to_string(), "cbse".to_string()];
        let a = build_selected_keyword_details(&rankings(), &selected).unwrap();
        let b = build_selected_keyword_details(&rankings(), &selected).unwrap();
        assert_eq!(
            serde_json::to_string(&a.details).unwrap(),
            serde_json::to_string(&b.details).unwrap()
        );
    }

    #[test]
    fn empty_selection_is_rejected() {
        let err = build_selected_keyword_details(&rankings(), &[" ".into()]).unwrap_err();
        assert!(matches!(err, ContentCrewError::Validation { .. }));
    }

    #[test]
    fn picks_resolve_by_position() {
        let available = available_keywords(&rankings());
        let picked = resolve_picks(&available, &["1.2, 2.1".into(), "1.2".into()]).unwrap();
        assert_eq!(picked, ["cbse", "school admission"]);

        assert!(resolve_picks(&available, &["3.1".into()]).is_err());
        assert!(resolve_picks(&available, &["0.1".into()]).is_err());
        assert!(resolve_picks(&available, &["x".into()]).is_err());
    }
}
