use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const SCHEMA_VERSION: &str = "v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    HomeElo,
    AwayElo,
    HomeLeaguePosition,
    AwayLeaguePosition,
    LeagueSize,
    HomeFormPoints,
    AwayFormPoints,
    HomeGoalsForAvg,
    HomeGoalsAgainstAvg,
    AwayGoalsForAvg,
    AwayGoalsAgainstAvg,
    LeagueAvgGoals,
    H2hMatches,
    H2hHomeWins,
    H2hDraws,
    H2hAwayWins,
    H2hHomeGoalsAvg,
    H2hAwayGoalsAvg,
    HomeInjuries,
    AwayInjuries,
    OddsHomeProb,
    OddsDrawProb,
    OddsAwayProb,
    NeutralVenue,
}

pub const FEATURE_COUNT: usize = 24;

pub const ALL_FEATURES: [Feature; FEATURE_COUNT] = [
    Feature::HomeElo,
    Feature::AwayElo,
    Feature::HomeLeaguePosition,
    Feature::AwayLeaguePosition,
    Feature::LeagueSize,
    Feature::HomeFormPoints,
    Feature::AwayFormPoints,
    Feature::HomeGoalsForAvg,
    Feature::HomeGoalsAgainstAvg,
    Feature::AwayGoalsForAvg,
    Feature::AwayGoalsAgainstAvg,
    Feature::LeagueAvgGoals,
    Feature::H2hMatches,
    Feature::H2hHomeWins,
    Feature::H2hDraws,
    Feature::H2hAwayWins,
    Feature::H2hHomeGoalsAvg,
    Feature::H2hAwayGoalsAvg,
    Feature::HomeInjuries,
    Feature::AwayInjuries,
    Feature::OddsHomeProb,
    Feature::OddsDrawProb,
    Feature::OddsAwayProb,
    Feature::NeutralVenue,
];

pub const FORM_POINTS_MAX: f64 = 15.0;

static BY_NAME: Lazy<HashMap<&'static str, Feature>> =
    Lazy::new(|| ALL_FEATURES.iter().map(|f| (f.name(), *f)).collect());

impl Feature {
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Feature::HomeElo => "home_elo",
            Feature::AwayElo => "away_elo",
            Feature::HomeLeaguePosition => "home_league_position",
            Feature::AwayLeaguePosition => "away_league_position",
            Feature::LeagueSize => "league_size",
            Feature::HomeFormPoints => "home_form_points",
            Feature::AwayFormPoints => "away_form_points",
            Feature::HomeGoalsForAvg => "home_goals_for_avg",
            Feature::HomeGoalsAgainstAvg => "home_goals_against_avg",
            Feature::AwayGoalsForAvg => "away_goals_for_avg",
            Feature::AwayGoalsAgainstAvg => "away_goals_against_avg",
            Feature::LeagueAvgGoals => "league_avg_goals",
            Feature::H2hMatches => "h2h_matches",
            Feature::H2hHomeWins => "h2h_home_wins",
            Feature::H2hDraws => "h2h_draws",
            Feature::H2hAwayWins => "h2h_away_wins",
            Feature::H2hHomeGoalsAvg => "h2h_home_goals_avg",
            Feature::H2hAwayGoalsAvg => "h2h_away_goals_avg",
            Feature::HomeInjuries => "home_injuries",
            Feature::AwayInjuries => "away_injuries",
            Feature::OddsHomeProb => "odds_home_prob",
            Feature::OddsDrawProb => "odds_draw_prob",
            Feature::OddsAwayProb => "odds_away_prob",
            Feature::NeutralVenue => "neutral_venue",
        }
    }

    pub fn from_name(name: &str) -> Option<Feature> {
        BY_NAME.get(name.trim()).copied()
    }

    pub fn default_value(self) -> f64 {
        match self {
            Feature::HomeElo | Feature::AwayElo => 1500.0,
            Feature::HomeLeaguePosition | Feature::AwayLeaguePosition => 10.0,
            Feature::LeagueSize => 20.0,
            Feature::HomeFormPoints | Feature::AwayFormPoints => FORM_POINTS_MAX / 2.0,
            Feature::HomeGoalsForAvg
            | Feature::HomeGoalsAgainstAvg
            | Feature::AwayGoalsForAvg
            | Feature::AwayGoalsAgainstAvg
            | Feature::LeagueAvgGoals
            | Feature::H2hHomeGoalsAvg
            | Feature::H2hAwayGoalsAvg => 1.35,
            Feature::H2hMatches
            | Feature::H2hHomeWins
            | Feature::H2hDraws
            | Feature::H2hAwayWins
            | Feature::HomeInjuries
            | Feature::AwayInjuries
            | Feature::OddsHomeProb
            | Feature::OddsDrawProb
            | Feature::OddsAwayProb
            | Feature::NeutralVenue => 0.0,
        }
    }

    fn domain(self) -> (f64, f64) {
        match self {
            Feature::HomeElo | Feature::AwayElo => (500.0, 3000.0),
            Feature::HomeLeaguePosition | Feature::AwayLeaguePosition => (1.0, 60.0),
            Feature::LeagueSize => (2.0, 60.0),
            Feature::HomeFormPoints | Feature::AwayFormPoints => (0.0, FORM_POINTS_MAX),
            Feature::HomeGoalsForAvg
            | Feature::HomeGoalsAgainstAvg
            | Feature::AwayGoalsForAvg
            | Feature::AwayGoalsAgainstAvg
            | Feature::H2hHomeGoalsAvg
            | Feature::H2hAwayGoalsAvg => (0.0, 10.0),
            Feature::LeagueAvgGoals => (0.2, 5.0),
            Feature::H2hMatches
            | Feature::H2hHomeWins
            | Feature::H2hDraws
            | Feature::H2hAwayWins => (0.0, 500.0),
            Feature::HomeInjuries | Feature::AwayInjuries => (0.0, 40.0),
            Feature::OddsHomeProb
            | Feature::OddsDrawProb
            | Feature::OddsAwayProb
            | Feature::NeutralVenue => (0.0, 1.0),
        }
    }
}

/// Dense, fully numeric feature vector in schema order. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    values: [f64; FEATURE_COUNT],
}

impl Default for FeatureVector {
    fn default() -> Self {
        let mut values = [0.0; FEATURE_COUNT];
        for f in ALL_FEATURES {
            values[f.index()] = f.default_value();
        }
        Self { values }
    }
}

impl FeatureVector {
    pub fn get(&self, feature: Feature) -> f64 {
        self.values[feature.index()]
    }

    pub fn flag(&self, feature: Feature) -> bool {
        self.get(feature) >= 0.5
    }

    /// Returns a copy with one feature replaced (clamped to its domain).
    pub fn with(mut self, feature: Feature, value: f64) -> Self {
        self.values[feature.index()] = if value.is_finite() {
            let (lo, hi) = feature.domain();
            value.clamp(lo, hi)
        } else {
            feature.default_value()
        };
        self
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (Feature, f64)> + '_ {
        ALL_FEATURES.iter().map(|f| (*f, self.values[f.index()]))
    }

    /// Overround-free odds-implied probabilities, when the market was supplied.
    pub fn market_probs(&self) -> Option<[f64; 3]> {
        let raw = [
            self.get(Feature::OddsHomeProb),
            self.get(Feature::OddsDrawProb),
            self.get(Feature::OddsAwayProb),
        ];
        let sum: f64 = raw.iter().sum();
        if sum <= 1e-9 || raw.iter().any(|p| *p <= 0.0) {
            return None;
        }
        Some([raw[0] / sum, raw[1] / sum, raw[2] / sum])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    NotAnObject,
    Unparsable,
    NonFinite,
    /// Parsed but outside the feature's domain; clamped.
    OutOfRange,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureIssue {
    pub feature: Option<Feature>,
    pub kind: IssueKind,
}

impl fmt::Display for FeatureIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.feature, self.kind) {
            (None, _) => write!(f, "feature payload is not an object; all features defaulted"),
            (Some(feat), IssueKind::OutOfRange) => {
                write!(f, "feature {} out of range; clamped", feat.name())
            }
            (Some(feat), _) => write!(f, "feature {} malformed; defaulted", feat.name()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NormalizedFeatures {
    pub vector: FeatureVector,
    pub issues: Vec<FeatureIssue>,
    pub missing: usize,
}

/// Coerces a raw provider payload into a complete v1 [`FeatureVector`]. Never fails.
pub fn normalize(raw: &Value) -> NormalizedFeatures {
    let Some(map) = raw.as_object() else {
        return NormalizedFeatures {
            vector: FeatureVector::default(),
            issues: vec![FeatureIssue {
                feature: None,
                kind: IssueKind::NotAnObject,
            }],
            missing: FEATURE_COUNT,
        };
    };
    normalize_map(map)
}

pub fn normalize_map(map: &Map<String, Value>) -> NormalizedFeatures {
    let mut vector = FeatureVector::default();
    let mut issues = Vec::new();
    let mut missing = 0usize;

    for feature in ALL_FEATURES {
        let Some(value) = map.get(feature.name()) else {
            missing += 1;
            continue;
        };
        if value.is_null() {
            missing += 1;
            continue;
        }
        match coerce(value) {
            Coerced::Value(v) if !v.is_finite() => issues.push(FeatureIssue {
                feature: Some(feature),
                kind: IssueKind::NonFinite,
            }),
            Coerced::Value(v) => {
                let (lo, hi) = feature.domain();
                if v < lo || v > hi {
                    issues.push(FeatureIssue {
                        feature: Some(feature),
                        kind: IssueKind::OutOfRange,
                    });
                }
                vector.values[feature.index()] = v.clamp(lo, hi);
            }
            Coerced::Unusable => issues.push(FeatureIssue {
                feature: Some(feature),
                kind: IssueKind::Unparsable,
            }),
        }
    }

    if !issues.is_empty() {
        tracing::debug!(count = issues.len(), "feature payload had malformed values");
    }

    NormalizedFeatures {
        vector,
        issues,
        missing,
    }
}

enum Coerced {
    Value(f64),
    Unusable,
}

const NESTED_KEYS: [&str; 3] = ["total", "value", "avg"];

fn coerce(value: &Value) -> Coerced {
    match value {
        Value::Number(n) => n.as_f64().map_or(Coerced::Unusable, Coerced::Value),
        Value::Bool(b) => Coerced::Value(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => parse_stat_cell(s).map_or(Coerced::Unusable, Coerced::Value),
        Value::Object(inner) => NESTED_KEYS
            .iter()
            .find_map(|k| inner.get(*k))
            .filter(|v| !v.is_object())
            .map_or(Coerced::Unusable, coerce),
        Value::Array(_) | Value::Null => Coerced::Unusable,
    }
}

fn parse_stat_cell(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if s.is_empty() || s == "-" {
        return None;
    }
    match s.to_ascii_lowercase().as_str() {
        "true" | "yes" => return Some(1.0),
        "false" | "no" => return Some(0.0),
        _ => {}
    }
    let (s, scale) = match s.strip_suffix('%') {
        Some(rest) => (rest, 0.01),
        None => (s, 1.0),
    };
    s.trim().replace(',', "").parse::<f64>().ok().map(|v| v * scale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn schema_order_matches_indices() {
        for (i, f) in ALL_FEATURES.iter().enumerate() {
            assert_eq!(f.index(), i);
            assert_eq!(Feature::from_name(f.name()), Some(*f));
        }
    }

    #[test]
    fn empty_payload_is_all_defaults() {
        let n = normalize(&json!({}));
        assert_eq!(n.vector, FeatureVector::default());
        assert!(n.issues.is_empty());
        assert_eq!(n.missing, FEATURE_COUNT);
    }

    #[test]
    fn coerces_strings_nested_and_bools() {
        let n = normalize(&json!({
            "home_elo": "1,620",
            "home_form_points": {"total": 11, "home": 7},
            "neutral_venue": true,
            "odds_home_prob": "55%",
            "away_injuries": {"value": "3"},
        }));
        assert!(n.issues.is_empty());
        assert_eq!(n.vector.get(Feature::HomeElo), 1620.0);
        assert_eq!(n.vector.get(Feature::HomeFormPoints), 11.0);
        assert!(n.vector.flag(Feature::NeutralVenue));
        assert_eq!(n.vector.get(Feature::AwayInjuries), 3.0);
        assert!((n.vector.get(Feature::OddsHomeProb) - 0.55).abs() < 1e-12);
    }

    #[test]
    fn malformed_values_fall_back_with_issue() {
        let n = normalize(&json!({
            "home_elo": [1, 2],
            "away_elo": {"rank": 4},
            "league_size": "n/a",
        }));
        assert_eq!(n.vector.get(Feature::HomeElo), 1500.0);
        assert_eq!(n.vector.get(Feature::AwayElo), 1500.0);
        assert_eq!(n.vector.get(Feature::LeagueSize), 20.0);
        assert_eq!(n.issues.len(), 3);
        assert!(n.issues.iter().all(|i| i.kind == IssueKind::Unparsable));
    }

    #[test]
    fn non_object_payload_defaults_everything() {
        let n = normalize(&json!("garbage"));
        assert_eq!(n.vector, FeatureVector::default());
        assert_eq!(n.issues.len(), 1);
        assert_eq!(n.issues[0].kind, IssueKind::NotAnObject);
    }

    #[test]
    fn market_probs_strip_overround() {
        let v = FeatureVector::default()
            .with(Feature::OddsHomeProb, 0.50)
            .with(Feature::OddsDrawProb, 0.30)
            .with(Feature::OddsAwayProb, 0.30);
        let m = v.market_probs().unwrap();
        assert!((m.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!(FeatureVector::default().market_probs().is_none());
    }
}
