use race_projection::rationale::{self, SideLabels, NO_DATA_HEADLINE, NO_DATA_RATIONALE};
use race_projection::store::TallySummary;
use serde_json::json;

use crate::race::*;

fn round_to(x: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (x * scale).round() / scale
}

fn leader_code(side: LeadingSide) -> &'static str {
    match side {
        LeadingSide::A => "A",
        LeadingSide::B => "B",
        LeadingSide::Tied => "tied",
    }
}

fn headline_and_rationale(race: &Race, outcome: Option<&ProjectionResult>) -> (String, String) {
    match outcome {
        Some(res) => (
            rationale::headline(res, &race.labels),
            rationale::rationale(res, &race.labels, &race.config.categories),
        ),
        None => (NO_DATA_HEADLINE.to_string(), NO_DATA_RATIONALE.to_string()),
    }
}

/// The panel printed after each run.
pub fn render_text(race: &Race, summary: &TallySummary, outcome: Option<&ProjectionResult>) -> String {
    let (headline, rationale) = headline_and_rationale(race, outcome);
    let margin = match summary.margin_percent {
        Some(m) => format!("{} votes ({:.2}%)", summary.vote_margin, m),
        None => "-".to_string(),
    };
    let mut lines: Vec<String> = vec![
        race.name.clone(),
        format!(
            "{} / {} subdivisions reporting",
            summary.reporting, summary.subdivisions
        ),
        format!(
            "{}: {} ({:.1}%)",
            race.labels.a, summary.total_a, summary.share_a
        ),
        format!(
            "{}: {} ({:.1}%)",
            race.labels.b, summary.total_b, summary.share_b
        ),
        format!("Margin: {}", margin),
        "".to_string(),
        headline,
        rationale,
    ];
    if let Some(fp) = outcome.and_then(|res| res.forward_projection.as_ref()) {
        lines.push(format!(
            "Projected final count: {} {:.0} / {} {:.0}",
            race.labels.a, fp.projected_a, race.labels.b, fp.projected_b
        ));
    }
    lines.join("\n")
}

fn build_projection_js(labels: &SideLabels, outcome: Option<&ProjectionResult>) -> JSValue {
    let res = match outcome {
        Some(res) => res,
        None => {
            return json!({
                "status": "noData",
                "leader": null,
                "leaderLabel": null,
                "certaintyPercent": 0.0,
                "called": false,
                "category": Category::TooClose.as_str(),
                "reportingPercent": 0.0,
                "callReason": null,
                "currentMargin": 0.0,
                "overperformanceA": 0.0,
                "overperformanceB": 0.0,
                "forwardProjection": null,
            })
        }
    };
    let forward_projection = match &res.forward_projection {
        Some(fp) => json!({
            "projectedA": fp.projected_a.round() as u64,
            "projectedB": fp.projected_b.round() as u64,
            "projectedMargin": round_to(fp.projected_margin, 4),
            "projectedLeader": leader_code(fp.projected_leader),
            "averageDeviation": round_to(fp.average_deviation, 4),
        }),
        None => JSValue::Null,
    };
    json!({
        "status": "projected",
        "leader": leader_code(res.leading_side),
        "leaderLabel": labels.of(res.leading_side),
        "certaintyPercent": round_to(res.certainty_percent, 1),
        "called": res.called,
        "category": res.category.as_str(),
        "reportingPercent": round_to(res.reporting_percentage * 100.0, 1),
        "callReason": res.call_reason.map(|r| r.description()),
        "currentMargin": round_to(res.current_margin, 4),
        "overperformanceA": round_to(res.overperformance_a, 2),
        "overperformanceB": round_to(res.overperformance_b, 2),
        "forwardProjection": forward_projection,
    })
}

/// The JSON summary written with `--out` and compared with `--reference`.
pub fn build_summary_js(race: &Race, summary: &TallySummary, outcome: Option<&ProjectionResult>) -> JSValue {
    let (headline, rationale) = headline_and_rationale(race, outcome);
    let c = &race.config;
    json!({
        "race": race.name,
        "sides": {
            "a": race.labels.a,
            "b": race.labels.b,
        },
        "config": {
            "certaintyThresholdForCall": c.certainty_threshold_for_call,
            "minReportingForCall": c.min_reporting_for_call,
            "impossibilityBuffer": c.impossibility_buffer,
            "historicalConfidence": c.historical_confidence,
            "blowoutMargin": c.blowout_margin,
            "blowoutReportingThreshold": c.blowout_reporting_threshold,
            "useVoteBasedReporting": c.use_vote_based_reporting,
            "includeForwardProjection": c.include_forward_projection,
            "weights": {
                "marginMultiplier": c.weights.margin_multiplier,
                "marginCap": c.weights.margin_cap,
                "reportingWeight": c.weights.reporting_weight,
                "consistencyScale": c.weights.consistency_scale,
                "consistencyCap": c.weights.consistency_cap,
                "projectedMarginMultiplier": c.weights.projected_margin_multiplier,
                "projectedMarginCap": c.weights.projected_margin_cap,
                "agreementBonus": c.weights.agreement_bonus,
            },
            "categories": {
                "tooCloseMargin": c.categories.too_close_margin,
                "minReporting": c.categories.min_reporting,
                "leanMargin": c.categories.lean_margin,
                "likelyMargin": c.categories.likely_margin,
            },
        },
        "totals": {
            "votesA": summary.total_a,
            "votesB": summary.total_b,
            "total": summary.total,
            "reporting": summary.reporting,
            "subdivisions": summary.subdivisions,
            "marginVotes": summary.vote_margin,
        },
        "headline": headline,
        "rationale": rationale,
        "projection": build_projection_js(&race.labels, outcome),
    })
}
