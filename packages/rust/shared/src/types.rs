//! Core domain types: user identifiers and keyword-research records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use uuid::Uuid;

use crate::error::{ContentCrewError, Result};

// ---------------------------------------------------------------------------
// UserId
// ---------------------------------------------------------------------------

/// Opaque, externally issued user identifier. Names the user's workspace directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    /// Validate an identifier. It must be usable as a single path component.
    pub fn parse(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();

        if trimmed.is_empty() {
            return Err(ContentCrewError::validation("user id must not be empty"));
        }
        if trimmed == "." || trimmed == ".." {
            return Err(ContentCrewError::validation(format!(
                "user id '{trimmed}' is not a valid directory name"
            )));
        }
        if trimmed.contains(['/', '\\', '\0']) {
            return Err(ContentCrewError::validation(format!(
                "user id '{trimmed}' must not contain path separators"
            )));
        }

        Ok(Self(trimmed.to_string()))
    }

    /// Issue a fresh, time-sortable identifier (UUID v7).
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for UserId {
    type Err = ContentCrewError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for UserId {
    type Error = ContentCrewError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

// ---------------------------------------------------------------------------
// Keyword research records
// ---------------------------------------------------------------------------

/// Filtered projection of one upstream keyword result.
///
/// Always serializes exactly six keys; fields the upstream omitted are `null`.
/// Numbers keep the upstream representation (integer vs. float).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordRecord {
    pub keyword: Option<String>,
    pub search_volume: Option<Number>,
    pub ranking_difficulty: Option<Number>,
    pub total_monthly_clicks: Option<Number>,
    pub exact_cost_per_click: Option<Number>,
    pub paid_competitors: Option<Number>,
}

impl KeywordRecord {
    /// Project a raw upstream result down to the six tracked fields.
    ///
    /// Total: a field that is missing or has an unexpected type becomes `None`.
    pub fn project(raw: &Value) -> Self {
        let number = |key: &str| raw.get(key).and_then(Value::as_number).cloned();

        Self {
            keyword: raw.get("keyword").and_then(Value::as_str).map(str::to_string),
            search_volume: number("searchVolume"),
            ranking_difficulty: number("rankingDifficulty"),
            total_monthly_clicks: number("totalMonthlyClicks"),
            exact_cost_per_click: number("exactCostPerClick"),
            paid_competitors: number("paidCompetitors"),
        }
    }
}

/// Keyword rankings for one domain, as persisted in the rankings files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingsResult {
    /// Copied from the upstream payload; not recomputed from `results`.
    pub result_count: Option<Number>,
    pub results: Vec<KeywordRecord>,
}

/// One entry of the competitors endpoint. Extra upstream fields are preserved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Competitor {
    pub domain: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Payload of the competitors endpoint, persisted verbatim as `competitors.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitorList {
    #[serde(default)]
    pub results: Vec<Competitor>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CompetitorList {
    /// Competitor domains in upstream order.
    pub fn domains(&self) -> Vec<String> {
        self.results.iter().map(|c| c.domain.clone()).collect()
    }
}

/// Competitor domain → rankings. Ordered by domain so iteration is deterministic.
pub type CompetitorRankingsMap = BTreeMap<String, RankingsResult>;

/// Selected keyword → the first record seen for it across all competitor domains.
pub type SelectedKeywordDetails = BTreeMap<String, KeywordRecord>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn user_id_rejects_path_tricks() {
        assert!(UserId::parse("").is_err());
        assert!(UserId::parse("   ").is_err());
        assert!(UserId::parse("..").is_err());
        assert!(UserId::parse("a/b").is_err());
        assert!(UserId::parse("a\\b").is_err());
        assert_eq!(UserId::parse(" abc-123 ").unwrap().as_str(), "abc-123");
    }

    #[test]
    fn user_id_generate_is_valid() {
        let id = UserId::generate();
        let parsed: UserId = id.to_string().parse().expect("parse UserId");
        assert_eq!(id, parsed);
    }

    #[test]
    fn projection_keeps_exactly_six_fields() {
        let raw = json!({
            "keyword": "school admission",
            "searchVolume": 1900,
            "rankingDifficulty": 42,
            "totalMonthlyClicks": 310.5,
            "exactCostPerClick": 0.87,
            "paidCompetitors": 12,
            "broadCostPerClick": 1.2,
            "seoClicks": 99
        });
        let record = KeywordRecord::project(&raw);
        let value = serde_json::to_value(&record).unwrap();
        let obj = value.as_object().unwrap();

        assert_eq!(obj.len(), 6);
        assert_eq!(obj["keyword"], "school admission");
        assert_eq!(obj["searchVolume"], 1900);
        assert_eq!(obj["totalMonthlyClicks"], 310.5);
        assert!(!obj.contains_key("seoClicks"));
    }

    #[test]
    fn projection_is_total_on_missing_fields() {
        let record = KeywordRecord::project(&json!({ "searchVolume": "n/a" }));
        assert_eq!(record.keyword, None);
        assert_eq!(record.search_volume, None);

        let value = serde_json::to_value(&record).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), 6);
        assert!(obj.values().all(Value::is_null));
    }

    #[test]
    fn projection_is_idempotent() {
        let raw = json!({ "keyword": "cbse school", "paidCompetitors": 3 });
        let once = KeywordRecord::project(&raw);
        let twice = KeywordRecord::project(&serde_json::to_value(&once).unwrap());
        assert_eq!(once, twice);
    }

    #[test]
    fn competitor_list_preserves_unknown_fields() {
        let raw = json!({
            "resultCount": 2,
            "results": [
                { "domain": "x.com", "commonTerms": 17 },
                { "domain": "y.com", "commonTerms": 4 }
            ]
        });
        let list: CompetitorList = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(list.domains(), vec!["x.com", "y.com"]);
        assert_eq!(serde_json::to_value(&list).unwrap(), raw);
    }
}
