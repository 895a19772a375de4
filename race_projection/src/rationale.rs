//! Human-readable descriptions of a projection.

use crate::*;

/// Shown when no vote has been recorded yet.
pub const NO_DATA_HEADLINE: &str = "Too Close To Call";
pub const NO_DATA_RATIONALE: &str = "Enter vote data to see projection";

const SEPARATOR: &str = " • ";

/// Display names of the two sides.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SideLabels {
    pub a: String,
    pub b: String,
}

impl SideLabels {
    pub fn new(a: &str, b: &str) -> SideLabels {
        SideLabels {
            a: a.to_string(),
            b: b.to_string(),
        }
    }

    /// The label of the leading side. A tie has no label.
    pub fn of(&self, side: LeadingSide) -> Option<&str> {
        match side {
            LeadingSide::A => Some(self.a.as_str()),
            LeadingSide::B => Some(self.b.as_str()),
            LeadingSide::Tied => None,
        }
    }
}

impl Default for SideLabels {
    fn default() -> Self {
        SideLabels::new("Side A", "Side B")
    }
}

/// The one-line call: "Projected winner: X", "Lean X", "Too Close To Call", ...
pub fn headline(res: &ProjectionResult, labels: &SideLabels) -> String {
    let leader = match labels.of(res.leading_side) {
        Some(l) => l,
        None => return NO_DATA_HEADLINE.to_string(),
    };
    match res.category {
        Category::Called => format!("Projected winner: {}", leader),
        Category::Likely => format!("Likely {}", leader),
        Category::Lean => format!("Lean {}", leader),
        Category::Tilt => format!("Tilt {}", leader),
        Category::TooClose => NO_DATA_HEADLINE.to_string(),
    }
}

/// The supporting line: certainty, reporting, call reason and which side runs
/// ahead of its benchmarks. `thresholds` must be the ones the result was
/// categorized with.
///
/// ```
/// use race_projection::rationale::{rationale, SideLabels};
/// use race_projection::*;
/// use std::collections::BTreeMap;
///
/// let subdivisions = vec![Subdivision::new("Adams", 0.5, 1_000_000)];
/// let mut tallies = BTreeMap::new();
/// tallies.insert("Adams".to_string(), TallyEntry::new(600_000, 400_000));
/// let res = run_projection(&subdivisions, &tallies, &ProjectionConfig::DEFAULT_CONFIG)?;
///
/// assert_eq!(
///     rationale(
///         &res,
///         &SideLabels::new("Democrats", "Republicans"),
///         &ProjectionConfig::DEFAULT_CONFIG.categories
///     ),
///     "Certainty: 99.9% • 100% reporting • mathematically impossible for trailing side • Democrats outperforming benchmarks"
/// );
/// # Ok::<(), ProjectionErrors>(())
/// ```
pub fn rationale(
    res: &ProjectionResult,
    labels: &SideLabels,
    thresholds: &CategoryThresholds,
) -> String {
    let certainty = format!("Certainty: {:.1}%", res.certainty_percent);
    let reporting = format!("{:.0}% reporting", res.reporting_percentage * 100.0);

    let mut parts: Vec<String> = Vec::new();
    match res.category {
        Category::Called => {
            parts.push(certainty);
            parts.push(reporting);
            if let Some(reason) = res.call_reason {
                parts.push(reason.description().to_string());
            }
        }
        Category::TooClose => {
            if res.reporting_percentage < thresholds.min_reporting {
                parts.push("Not enough data".to_string());
            } else {
                parts.push("Race within margin of error".to_string());
            }
            parts.push(certainty);
        }
        Category::Likely | Category::Lean | Category::Tilt => {
            parts.push(certainty);
            parts.push(reporting);
        }
    }

    let score = res.overperformance_score();
    if score != 0.0 {
        let side = if score > 0.0 { &labels.a } else { &labels.b };
        parts.push(format!("{} outperforming benchmarks", side));
    }
    parts.join(SEPARATOR)
}
