use crate::race::*;

use race_projection::baseline::{self, PastReturn, TrendAdjustment};
use race_projection::rationale::SideLabels;
use serde::{Deserialize, Serialize};

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RaceSubdivision {
    pub name: String,
    #[serde(rename = "expectedShare")]
    pub expected_share: Option<f64>,
    #[serde(rename = "expectedTurnout")]
    pub expected_turnout: Option<u64>,
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct RaceThresholds {
    #[serde(rename = "certaintyThresholdForCall")]
    pub certainty_threshold_for_call: Option<f64>,
    #[serde(rename = "minReportingForCall")]
    pub min_reporting_for_call: Option<f64>,
    #[serde(rename = "impossibilityBuffer")]
    pub impossibility_buffer: Option<f64>,
    #[serde(rename = "historicalConfidence")]
    pub historical_confidence: Option<f64>,
    #[serde(rename = "blowoutMargin")]
    pub blowout_margin: Option<f64>,
    #[serde(rename = "blowoutReportingThreshold")]
    pub blowout_reporting_threshold: Option<f64>,
    #[serde(rename = "useVoteBasedReporting")]
    pub use_vote_based_reporting: Option<bool>,
    #[serde(rename = "includeForwardProjection")]
    pub include_forward_projection: Option<bool>,
    pub weights: Option<RaceWeights>,
    pub categories: Option<RaceCategories>,
}

/// Overrides of the certainty weights. Missing values come from the default or
/// the enhanced weights, depending on `includeForwardProjection`.
#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct RaceWeights {
    #[serde(rename = "marginMultiplier")]
    pub margin_multiplier: Option<f64>,
    #[serde(rename = "marginCap")]
    pub margin_cap: Option<f64>,
    #[serde(rename = "reportingWeight")]
    pub reporting_weight: Option<f64>,
    #[serde(rename = "consistencyScale")]
    pub consistency_scale: Option<f64>,
    #[serde(rename = "consistencyCap")]
    pub consistency_cap: Option<f64>,
    #[serde(rename = "projectedMarginMultiplier")]
    pub projected_margin_multiplier: Option<f64>,
    #[serde(rename = "projectedMarginCap")]
    pub projected_margin_cap: Option<f64>,
    #[serde(rename = "agreementBonus")]
    pub agreement_bonus: Option<f64>,
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct RaceCategories {
    #[serde(rename = "tooCloseMargin")]
    pub too_close_margin: Option<f64>,
    #[serde(rename = "minReporting")]
    pub min_reporting: Option<f64>,
    #[serde(rename = "leanMargin")]
    pub lean_margin: Option<f64>,
    #[serde(rename = "likelyMargin")]
    pub likely_margin: Option<f64>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RacePastReturn {
    pub year: u32,
    #[serde(rename = "votesA")]
    pub votes_a: u64,
    #[serde(rename = "votesB")]
    pub votes_b: u64,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RaceTrend {
    pub history: Vec<RacePastReturn>,
    #[serde(rename = "conservativeFactor")]
    pub conservative_factor: Option<f64>,
}

/// The race file, as written by users.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RaceConfig {
    pub name: String,
    #[serde(rename = "sideA")]
    pub side_a: Option<String>,
    #[serde(rename = "sideB")]
    pub side_b: Option<String>,
    pub subdivisions: Vec<RaceSubdivision>,
    pub thresholds: Option<RaceThresholds>,
    pub trend: Option<RaceTrend>,
}

/// A race, validated and ready to be projected.
#[derive(PartialEq, Debug, Clone)]
pub struct Race {
    pub name: String,
    pub labels: SideLabels,
    pub subdivisions: Vec<Subdivision>,
    pub config: ProjectionConfig,
    pub trend: Option<TrendAdjustment>,
}

pub fn read_race_config(path: &str) -> RaceResult<RaceConfig> {
    let contents = fs::read_to_string(path).context(OpeningFileSnafu { path })?;
    serde_json::from_str(&contents).context(ParsingJsonSnafu { path })
}

pub fn read_summary(path: &str) -> RaceResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningFileSnafu { path })?;
    serde_json::from_str(&contents).context(ParsingJsonSnafu { path })
}

pub fn validate_race(config: &RaceConfig) -> RaceResult<Race> {
    if config.subdivisions.is_empty() {
        whatever!("Race {:?} has no subdivisions", config.name)
    }
    let mut subdivisions: Vec<Subdivision> =
        config.subdivisions.iter().map(to_subdivision).collect();

    let trend = match &config.trend {
        Some(t) => {
            let factor = t.conservative_factor.unwrap_or(baseline::CONSERVATIVE_FACTOR);
            check_fraction("conservativeFactor", factor)?;
            let returns: Vec<PastReturn> = t
                .history
                .iter()
                .map(|r| PastReturn {
                    year: r.year,
                    votes_a: r.votes_a,
                    votes_b: r.votes_b,
                })
                .collect();
            let shares = baseline::yearly_shares(&returns);
            let adjustment = baseline::trend_adjustment(&shares, factor);
            match adjustment {
                Some(adj) => {
                    baseline::apply_trend(&mut subdivisions, adj.adjustment);
                }
                None => {
                    warn!("validate_race: the trend needs at least two years of history, ignoring it");
                }
            }
            adjustment
        }
        None => None,
    };

    let default_labels = SideLabels::default();
    Ok(Race {
        name: config.name.clone(),
        labels: SideLabels {
            a: config.side_a.clone().unwrap_or(default_labels.a),
            b: config.side_b.clone().unwrap_or(default_labels.b),
        },
        subdivisions,
        config: validate_thresholds(&config.thresholds.clone().unwrap_or_default())?,
        trend,
    })
}

fn to_subdivision(s: &RaceSubdivision) -> Subdivision {
    let benchmark = match (s.expected_share, s.expected_turnout) {
        (None, None) => None,
        (share, turnout) => {
            if let Some(x) = share {
                if !(0.0..=1.0).contains(&x) {
                    // The estimator falls back to an even split for this subdivision.
                    warn!(
                        "to_subdivision: {}: expectedShare {} is not a fraction",
                        s.name, x
                    );
                }
            }
            Some(Benchmark {
                expected_share: share.unwrap_or(DEFAULT_HISTORICAL_SHARE),
                expected_turnout: turnout.unwrap_or(0),
            })
        }
    };
    Subdivision {
        name: s.name.trim().to_string(),
        benchmark,
    }
}

fn check_fraction(name: &str, x: f64) -> RaceResult<f64> {
    if !(0.0..=1.0).contains(&x) {
        whatever!("{} must be between 0 and 1, got {}", name, x)
    }
    Ok(x)
}

fn check_non_negative(name: &str, x: f64) -> RaceResult<f64> {
    if !(x.is_finite() && x >= 0.0) {
        whatever!("{} must be a non-negative number, got {}", name, x)
    }
    Ok(x)
}

fn validate_weights(w: &RaceWeights, base: CertaintyWeights) -> RaceResult<CertaintyWeights> {
    Ok(CertaintyWeights {
        margin_multiplier: check_non_negative(
            "marginMultiplier",
            w.margin_multiplier.unwrap_or(base.margin_multiplier),
        )?,
        margin_cap: check_fraction("marginCap", w.margin_cap.unwrap_or(base.margin_cap))?,
        reporting_weight: check_fraction(
            "reportingWeight",
            w.reporting_weight.unwrap_or(base.reporting_weight),
        )?,
        consistency_scale: check_non_negative(
            "consistencyScale",
            w.consistency_scale.unwrap_or(base.consistency_scale),
        )?,
        consistency_cap: check_fraction(
            "consistencyCap",
            w.consistency_cap.unwrap_or(base.consistency_cap),
        )?,
        projected_margin_multiplier: check_non_negative(
            "projectedMarginMultiplier",
            w.projected_margin_multiplier
                .unwrap_or(base.projected_margin_multiplier),
        )?,
        projected_margin_cap: check_fraction(
            "projectedMarginCap",
            w.projected_margin_cap.unwrap_or(base.projected_margin_cap),
        )?,
        agreement_bonus: check_fraction(
            "agreementBonus",
            w.agreement_bonus.unwrap_or(base.agreement_bonus),
        )?,
    })
}

fn validate_categories(c: &RaceCategories) -> RaceResult<CategoryThresholds> {
    let d = CategoryThresholds::DEFAULT_THRESHOLDS;
    let res = CategoryThresholds {
        too_close_margin: check_fraction(
            "tooCloseMargin",
            c.too_close_margin.unwrap_or(d.too_close_margin),
        )?,
        min_reporting: check_fraction("minReporting", c.min_reporting.unwrap_or(d.min_reporting))?,
        lean_margin: check_fraction("leanMargin", c.lean_margin.unwrap_or(d.lean_margin))?,
        likely_margin: check_fraction("likelyMargin", c.likely_margin.unwrap_or(d.likely_margin))?,
    };
    if res.lean_margin > res.likely_margin {
        whatever!(
            "leanMargin ({}) must not be above likelyMargin ({})",
            res.lean_margin,
            res.likely_margin
        )
    }
    Ok(res)
}

fn validate_thresholds(t: &RaceThresholds) -> RaceResult<ProjectionConfig> {
    let d = ProjectionConfig::DEFAULT_CONFIG;
    let include_forward_projection = t
        .include_forward_projection
        .unwrap_or(d.include_forward_projection);
    let certainty_threshold_for_call = t
        .certainty_threshold_for_call
        .unwrap_or(d.certainty_threshold_for_call);
    if !(0.0..=100.0).contains(&certainty_threshold_for_call) {
        whatever!(
            "certaintyThresholdForCall must be a percentage, got {}",
            certainty_threshold_for_call
        )
    }
    Ok(ProjectionConfig {
        certainty_threshold_for_call,
        min_reporting_for_call: check_fraction(
            "minReportingForCall",
            t.min_reporting_for_call.unwrap_or(d.min_reporting_for_call),
        )?,
        impossibility_buffer: check_fraction(
            "impossibilityBuffer",
            t.impossibility_buffer.unwrap_or(d.impossibility_buffer),
        )?,
        historical_confidence: check_fraction(
            "historicalConfidence",
            t.historical_confidence.unwrap_or(d.historical_confidence),
        )?,
        blowout_margin: check_fraction(
            "blowoutMargin",
            t.blowout_margin.unwrap_or(d.blowout_margin),
        )?,
        blowout_reporting_threshold: check_fraction(
            "blowoutReportingThreshold",
            t.blowout_reporting_threshold
                .unwrap_or(d.blowout_reporting_threshold),
        )?,
        use_vote_based_reporting: t
            .use_vote_based_reporting
            .unwrap_or(d.use_vote_based_reporting),
        include_forward_projection,
        weights: validate_weights(
            &t.weights.clone().unwrap_or_default(),
            if include_forward_projection {
                CertaintyWeights::ENHANCED_WEIGHTS
            } else {
                CertaintyWeights::DEFAULT_WEIGHTS
            },
        )?,
        categories: validate_categories(&t.categories.clone().unwrap_or_default())?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> RaceConfig {
        serde_json::from_str(s).unwrap()
    }

    #[test]
    fn minimal_race() {
        let race = validate_race(&parse(
            r#"{"name": "Test", "subdivisions": [{"name": " Adams "}, {"name": "Baker", "expectedTurnout": 1200}]}"#,
        ))
        .unwrap();
        assert_eq!(race.labels, SideLabels::default());
        assert_eq!(race.config, ProjectionConfig::DEFAULT_CONFIG);
        assert_eq!(race.subdivisions[0], Subdivision::without_benchmark("Adams"));
        assert_eq!(race.subdivisions[1], Subdivision::new("Baker", 0.5, 1200));
        assert_eq!(race.trend, None);
    }

    #[test]
    fn thresholds_override_defaults() {
        let race = validate_race(&parse(
            r#"{
                "name": "Test",
                "sideA": "Yes",
                "sideB": "No",
                "subdivisions": [{"name": "Adams", "expectedShare": 0.4, "expectedTurnout": 10}],
                "thresholds": {"certaintyThresholdForCall": 95.0, "includeForwardProjection": true}
            }"#,
        ))
        .unwrap();
        assert_eq!(race.labels, SideLabels::new("Yes", "No"));
        assert_eq!(race.config.certainty_threshold_for_call, 95.0);
        assert_eq!(race.config.min_reporting_for_call, 0.15);
        assert!(race.config.include_forward_projection);
        assert_eq!(race.config.weights, CertaintyWeights::ENHANCED_WEIGHTS);
    }

    #[test]
    fn invalid_thresholds() {
        let res = validate_race(&parse(
            r#"{"name": "Test", "subdivisions": [{"name": "A"}], "thresholds": {"minReportingForCall": 1.5}}"#,
        ));
        assert!(res.is_err());
        let res = validate_race(&parse(
            r#"{"name": "Test", "subdivisions": [{"name": "A"}], "thresholds": {"certaintyThresholdForCall": 120}}"#,
        ));
        assert!(res.is_err());
        let res = validate_race(&parse(r#"{"name": "Empty", "subdivisions": []}"#));
        assert!(res.is_err());
    }

    #[test]
    fn weights_and_categories_override() {
        let race = validate_race(&parse(
            r#"{
                "name": "Test",
                "subdivisions": [{"name": "Adams"}],
                "thresholds": {
                    "includeForwardProjection": true,
                    "weights": {"marginCap": 0.5, "agreementBonus": 0.0},
                    "categories": {"minReporting": 0.3, "likelyMargin": 0.1}
                }
            }"#,
        ))
        .unwrap();
        let w = race.config.weights;
        assert_eq!(w.margin_cap, 0.5);
        assert_eq!(w.agreement_bonus, 0.0);
        // The rest comes from the enhanced weights.
        assert_eq!(w.reporting_weight, CertaintyWeights::ENHANCED_WEIGHTS.reporting_weight);
        assert_eq!(w.projected_margin_cap, CertaintyWeights::ENHANCED_WEIGHTS.projected_margin_cap);
        let c = race.config.categories;
        assert_eq!(c.min_reporting, 0.3);
        assert_eq!(c.likely_margin, 0.1);
        assert_eq!(c.lean_margin, CategoryThresholds::DEFAULT_THRESHOLDS.lean_margin);
    }

    #[test]
    fn invalid_weights_and_categories() {
        let res = validate_race(&parse(
            r#"{"name": "Test", "subdivisions": [{"name": "A"}], "thresholds": {"weights": {"consistencyScale": -1}}}"#,
        ));
        assert!(res.is_err());
        let res = validate_race(&parse(
            r#"{"name": "Test", "subdivisions": [{"name": "A"}], "thresholds": {"weights": {"marginCap": 2.0}}}"#,
        ));
        assert!(res.is_err());
        let res = validate_race(&parse(
            r#"{"name": "Test", "subdivisions": [{"name": "A"}], "thresholds": {"categories": {"leanMargin": 0.2}}}"#,
        ));
        assert!(res.is_err());
    }

    #[test]
    fn trend_shifts_benchmarks() {
        let race = validate_race(&parse(
            r#"{
                "name": "Test",
                "subdivisions": [{"name": "Adams", "expectedShare": 0.5, "expectedTurnout": 10}],
                "trend": {
                    "conservativeFactor": 0.5,
                    "history": [
                        {"year": 2020, "votesA": 50, "votesB": 50},
                        {"year": 2024, "votesA": 40, "votesB": 60}
                    ]
                }
            }"#,
        ))
        .unwrap();
        let trend = race.trend.unwrap();
        assert_eq!(trend.first_year, 2020);
        assert_eq!(trend.last_year, 2024);
        assert_eq!(race.subdivisions[0].benchmark.unwrap().expected_share, 0.45);
    }

    #[test]
    fn reads_race_file() {
        let path = format!("{}/testdata/senate_race.json", env!("CARGO_MANIFEST_DIR"));
        let race = validate_race(&read_race_config(&path).unwrap()).unwrap();
        assert_eq!(race.labels, SideLabels::new("Democrat", "Republican"));
        assert_eq!(race.subdivisions.len(), 2);
        assert!(matches!(
            read_race_config("/does/not/exist.json"),
            Err(RaceError::OpeningFile { .. })
        ));
    }
}
