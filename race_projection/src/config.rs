// ********* Input data structures ***********

use std::error::Error;
use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Share of the vote assumed for side A when a subdivision has no usable benchmark.
pub const DEFAULT_HISTORICAL_SHARE: f64 = 0.5;

/// Weight given to a subdivision when its benchmark does not provide a turnout.
pub const DEFAULT_SUBDIVISION_WEIGHT: u64 = 10_000;

/// Largest vote count accepted for one side of one subdivision.
pub const MAX_VOTES_PER_SIDE: u64 = 10_000_000;

/// Historical results for a subdivision.
#[derive(PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Benchmark {
    /// The share of the two-party vote that side A received in the past, in [0, 1].
    pub expected_share: f64,
    /// The number of votes cast in the past.
    pub expected_turnout: u64,
}

impl Benchmark {
    /// The historical share of side A, falling back to an even split when the
    /// benchmark is missing or the value is not a valid fraction.
    pub fn share_or_default(benchmark: Option<&Benchmark>) -> f64 {
        match benchmark {
            Some(b) if b.expected_share.is_finite() && (0.0..=1.0).contains(&b.expected_share) => {
                b.expected_share
            }
            _ => DEFAULT_HISTORICAL_SHARE,
        }
    }

    /// The weight of a subdivision in the deviation signal.
    pub fn weight_or_default(benchmark: Option<&Benchmark>) -> u64 {
        match benchmark {
            Some(b) if b.expected_turnout > 0 => b.expected_turnout,
            _ => DEFAULT_SUBDIVISION_WEIGHT,
        }
    }

    /// The expected turnout, or zero when nothing is known about the subdivision.
    pub fn turnout_or_zero(benchmark: Option<&Benchmark>) -> u64 {
        benchmark.map(|b| b.expected_turnout).unwrap_or(0)
    }
}

/// A geographic reporting unit, for example a county.
#[derive(PartialEq, Debug, Clone)]
pub struct Subdivision {
    pub name: String,
    pub benchmark: Option<Benchmark>,
}

impl Subdivision {
    pub fn new(name: &str, expected_share: f64, expected_turnout: u64) -> Subdivision {
        Subdivision {
            name: name.to_string(),
            benchmark: Some(Benchmark {
                expected_share,
                expected_turnout,
            }),
        }
    }

    /// A subdivision for which no historical data exists.
    pub fn without_benchmark(name: &str) -> Subdivision {
        Subdivision {
            name: name.to_string(),
            benchmark: None,
        }
    }
}

/// The live count of a subdivision.
///
/// A count of zero votes on both sides cannot be told apart from a subdivision
/// that has not reported yet. The `reported` flag records explicitly that the
/// subdivision has reported, even if it reported no votes.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TallyEntry {
    #[serde(rename = "votesA")]
    pub votes_a: u64,
    #[serde(rename = "votesB")]
    pub votes_b: u64,
    #[serde(default)]
    pub reported: bool,
}

impl TallyEntry {
    pub const EMPTY: TallyEntry = TallyEntry {
        votes_a: 0,
        votes_b: 0,
        reported: false,
    };

    pub fn new(votes_a: u64, votes_b: u64) -> TallyEntry {
        TallyEntry {
            votes_a,
            votes_b,
            reported: false,
        }
    }

    pub fn total(&self) -> u64 {
        self.votes_a.saturating_add(self.votes_b)
    }

    /// The same entry with both counts capped at [`MAX_VOTES_PER_SIDE`].
    pub fn clamped(&self) -> TallyEntry {
        TallyEntry {
            votes_a: self.votes_a.min(MAX_VOTES_PER_SIDE),
            votes_b: self.votes_b.min(MAX_VOTES_PER_SIDE),
            reported: self.reported,
        }
    }

    pub fn is_reporting(&self) -> bool {
        self.reported || self.total() > 0
    }
}

// ******** Output data structures *********

/// The two sides of the race.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum LeadingSide {
    A,
    B,
    /// Both sides have exactly the same number of votes.
    Tied,
}

/// The discrete call for the race.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, PartialOrd, Ord)]
pub enum Category {
    TooClose,
    Tilt,
    Lean,
    Likely,
    Called,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::TooClose => "tooClose",
            Category::Tilt => "tilt",
            Category::Lean => "lean",
            Category::Likely => "likely",
            Category::Called => "called",
        }
    }
}

/// Why a race was called outright instead of through the composite score.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum CallReason {
    MathematicallyImpossible,
    OverwhelmingMargin,
}

impl CallReason {
    pub fn description(&self) -> &'static str {
        match self {
            CallReason::MathematicallyImpossible => "mathematically impossible for trailing side",
            CallReason::OverwhelmingMargin => "overwhelming margin with high reporting",
        }
    }
}

/// The outcome of the race if the subdivisions that have not reported yet vote like
/// their history, shifted by the trend observed so far.
#[derive(PartialEq, Debug, Clone)]
pub struct ForwardProjection {
    pub projected_a: f64,
    pub projected_b: f64,
    /// Distance of the projected share of side A from an even split.
    pub projected_margin: f64,
    pub projected_leader: LeadingSide,
    /// Turnout-weighted mean of (current share - historical share) over the
    /// reporting subdivisions.
    pub average_deviation: f64,
}

#[derive(PartialEq, Debug, Clone)]
pub struct ProjectionResult {
    pub leading_side: LeadingSide,
    /// Synthetic confidence in [0, 99.9].
    pub certainty_percent: f64,
    pub called: bool,
    pub category: Category,
    /// Fraction of the race that has reported, in [0, 1].
    pub reporting_percentage: f64,
    pub call_reason: Option<CallReason>,
    pub total_a: u64,
    pub total_b: u64,
    pub reported_subdivisions: usize,
    pub expected_total_votes: u64,
    /// Distance of the share of side A from an even split.
    pub current_margin: f64,
    pub overperformance_a: f64,
    pub overperformance_b: f64,
    pub forward_projection: Option<ForwardProjection>,
}

impl ProjectionResult {
    /// Positive when side A runs ahead of its benchmarks, negative for side B.
    pub fn overperformance_score(&self) -> f64 {
        self.overperformance_a - self.overperformance_b
    }
}

/// Errors that prevent a projection from being produced.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum ProjectionErrors {
    /// No votes have been recorded in any subdivision.
    InsufficientData,
    /// The race does not have any subdivision.
    EmptyRace,
    DuplicateSubdivision(String),
    UnknownSubdivision(String),
}

impl Error for ProjectionErrors {}

impl Display for ProjectionErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProjectionErrors::InsufficientData => write!(f, "no votes have been recorded yet"),
            ProjectionErrors::EmptyRace => write!(f, "the race has no subdivisions"),
            ProjectionErrors::DuplicateSubdivision(name) => {
                write!(f, "subdivision {:?} is listed more than once", name)
            }
            ProjectionErrors::UnknownSubdivision(name) => {
                write!(f, "unknown subdivision {:?}", name)
            }
        }
    }
}

// ********* Configuration **********

/// The weights of the composite certainty score.
///
/// The margin, reporting and consistency terms make up the reference score.
/// The projected margin and agreement terms only apply when the forward
/// projection is enabled.
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct CertaintyWeights {
    pub margin_multiplier: f64,
    pub margin_cap: f64,
    pub reporting_weight: f64,
    pub consistency_scale: f64,
    pub consistency_cap: f64,
    pub projected_margin_multiplier: f64,
    pub projected_margin_cap: f64,
    pub agreement_bonus: f64,
}

impl CertaintyWeights {
    /// A 20% margin saturates the margin term at 60%.
    pub const DEFAULT_WEIGHTS: CertaintyWeights = CertaintyWeights {
        margin_multiplier: 300.0,
        margin_cap: 0.60,
        reporting_weight: 0.30,
        consistency_scale: 100_000.0,
        consistency_cap: 0.10,
        projected_margin_multiplier: 0.0,
        projected_margin_cap: 0.0,
        agreement_bonus: 0.0,
    };

    pub const ENHANCED_WEIGHTS: CertaintyWeights = CertaintyWeights {
        margin_multiplier: 300.0,
        margin_cap: 0.45,
        reporting_weight: 0.25,
        consistency_scale: 100_000.0,
        consistency_cap: 0.10,
        projected_margin_multiplier: 300.0,
        projected_margin_cap: 0.15,
        agreement_bonus: 0.05,
    };
}

/// Margins used to label a race that has not been called.
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct CategoryThresholds {
    pub too_close_margin: f64,
    pub min_reporting: f64,
    pub lean_margin: f64,
    pub likely_margin: f64,
}

impl CategoryThresholds {
    pub const DEFAULT_THRESHOLDS: CategoryThresholds = CategoryThresholds {
        too_close_margin: 0.015,
        min_reporting: 0.15,
        lean_margin: 0.04,
        likely_margin: 0.08,
    };
}

#[derive(PartialEq, Debug, Clone, Copy)]
pub struct ProjectionConfig {
    /// Certainty (in percent) at which the race is called. Lower is more aggressive.
    pub certainty_threshold_for_call: f64,
    /// Fraction of the race that must have reported before any call.
    pub min_reporting_for_call: f64,
    /// Extra room required beyond the lead before a comeback is ruled out.
    pub impossibility_buffer: f64,
    /// How much of the historical turnout is expected to still come in.
    pub historical_confidence: f64,
    pub blowout_margin: f64,
    pub blowout_reporting_threshold: f64,
    /// Measure reporting with votes against the expected turnout instead of
    /// counting the subdivisions that reported.
    pub use_vote_based_reporting: bool,
    pub include_forward_projection: bool,
    pub weights: CertaintyWeights,
    pub categories: CategoryThresholds,
}

impl ProjectionConfig {
    pub const DEFAULT_CONFIG: ProjectionConfig = ProjectionConfig {
        certainty_threshold_for_call: 97.0,
        min_reporting_for_call: 0.15,
        impossibility_buffer: 0.01,
        historical_confidence: 0.85,
        blowout_margin: 0.10,
        blowout_reporting_threshold: 0.90,
        use_vote_based_reporting: false,
        include_forward_projection: false,
        weights: CertaintyWeights::DEFAULT_WEIGHTS,
        categories: CategoryThresholds::DEFAULT_THRESHOLDS,
    };

    pub const ENHANCED_CONFIG: ProjectionConfig = ProjectionConfig {
        include_forward_projection: true,
        weights: CertaintyWeights::ENHANCED_WEIGHTS,
        ..ProjectionConfig::DEFAULT_CONFIG
    };
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        ProjectionConfig::DEFAULT_CONFIG
    }
}
