mod config;
pub mod baseline;
pub mod manual;
pub mod rationale;
pub mod store;

use log::{debug, info};

use std::{
    collections::BTreeMap,
    ops::{Add, AddAssign},
};

pub use crate::config::*;

// **** Private structures ****

#[derive(Eq, PartialEq, Debug, Clone, Copy, PartialOrd, Ord, Hash)]
struct VoteCount(u64);

impl VoteCount {
    const EMPTY: VoteCount = VoteCount(0);

    fn as_f64(self) -> f64 {
        self.0 as f64
    }
}

impl std::iter::Sum for VoteCount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        VoteCount(iter.map(|vc| vc.0).sum())
    }
}

impl AddAssign for VoteCount {
    fn add_assign(&mut self, rhs: VoteCount) {
        self.0 += rhs.0;
    }
}

impl Add for VoteCount {
    type Output = VoteCount;
    fn add(self: VoteCount, rhs: VoteCount) -> VoteCount {
        VoteCount(self.0 + rhs.0)
    }
}

// One row of the snapshot: a subdivision joined with its current count.
struct SubdivisionState<'a> {
    subdivision: &'a Subdivision,
    tally: TallyEntry,
}

struct Aggregate {
    total_a: VoteCount,
    total_b: VoteCount,
    reported_subdivisions: usize,
    expected_total_votes: VoteCount,
    reporting_percentage: f64,
}

impl Aggregate {
    fn reported_votes(&self) -> VoteCount {
        self.total_a + self.total_b
    }

    fn leading_side(&self) -> LeadingSide {
        leader_of(self.total_a.as_f64(), self.total_b.as_f64())
    }

    fn lead(&self) -> VoteCount {
        VoteCount(self.total_a.0.abs_diff(self.total_b.0))
    }

    // Invariant: only called once the total is known to be positive.
    fn current_margin(&self) -> f64 {
        margin_of(self.total_a.as_f64(), self.total_b.as_f64())
    }
}

#[derive(Debug, Default)]
struct Deviation {
    overperformance_a: f64,
    overperformance_b: f64,
    // Sum of (current share - historical share) * weight, and the sum of the weights.
    weighted_diff: f64,
    total_weight: f64,
}

impl Deviation {
    fn average(&self) -> f64 {
        if self.total_weight > 0.0 {
            self.weighted_diff / self.total_weight
        } else {
            0.0
        }
    }

    // Net overperformance of the leader over the trailing side, never negative.
    fn signal_for(&self, leader: LeadingSide) -> f64 {
        let net = match leader {
            LeadingSide::A => self.overperformance_a - self.overperformance_b,
            LeadingSide::B => self.overperformance_b - self.overperformance_a,
            LeadingSide::Tied => 0.0,
        };
        net.max(0.0)
    }
}

/// Computes the projection of a race from the current counts.
///
/// Arguments:
/// * `subdivisions` the reporting units of the race, with their historical benchmarks
/// * `tallies` the current counts, keyed by subdivision name. A subdivision without
///   an entry has not reported.
/// * `config` the thresholds and weights of the model
///
/// ```
/// use std::collections::BTreeMap;
/// use race_projection::*;
///
/// let subdivisions = vec![
///     Subdivision::new("Adams", 0.55, 500_000),
///     Subdivision::new("Baker", 0.45, 500_000),
/// ];
/// let mut tallies = BTreeMap::new();
/// tallies.insert("Adams".to_string(), TallyEntry::new(320_000, 180_000));
/// tallies.insert("Baker".to_string(), TallyEntry::new(280_000, 220_000));
///
/// let res = run_projection(&subdivisions, &tallies, &ProjectionConfig::DEFAULT_CONFIG)?;
/// assert!(res.called);
/// assert_eq!(res.leading_side, LeadingSide::A);
/// # Ok::<(), ProjectionErrors>(())
/// ```
pub fn run_projection(
    subdivisions: &[Subdivision],
    tallies: &BTreeMap<String, TallyEntry>,
    config: &ProjectionConfig,
) -> Result<ProjectionResult, ProjectionErrors> {
    if subdivisions.is_empty() {
        return Err(ProjectionErrors::EmptyRace);
    }
    for name in tallies.keys() {
        if !subdivisions.iter().any(|s| s.name == *name) {
            debug!("run_projection: ignoring tally for unknown subdivision {:?}", name);
        }
    }

    let states: Vec<SubdivisionState> = subdivisions
        .iter()
        .map(|subdivision| SubdivisionState {
            subdivision,
            tally: tallies
                .get(&subdivision.name)
                .map(|t| t.clamped())
                .unwrap_or(TallyEntry::EMPTY),
        })
        .collect();

    let agg = aggregate(&states, config);
    if agg.reported_votes() == VoteCount::EMPTY {
        debug!("run_projection: no votes recorded");
        return Err(ProjectionErrors::InsufficientData);
    }
    info!(
        "Projecting {} subdivisions: A {} B {}, {} reporting ({:.3})",
        states.len(),
        agg.total_a.0,
        agg.total_b.0,
        agg.reported_subdivisions,
        agg.reporting_percentage
    );

    let deviation = historical_deviation(&states);
    debug!("run_projection: deviation: {:?}", deviation);

    let leading_side = agg.leading_side();
    let current_margin = agg.current_margin();

    let forward_projection = if config.include_forward_projection {
        let fp = project_remaining(&states, &agg, deviation.average(), config);
        debug!("run_projection: forward projection: {:?}", fp);
        Some(fp)
    } else {
        None
    };

    let (certainty_percent, call_reason) = score_certainty(
        &agg,
        &deviation,
        forward_projection.as_ref(),
        leading_side,
        config,
    );

    let called = leading_side != LeadingSide::Tied
        && certainty_percent >= config.certainty_threshold_for_call
        && agg.reporting_percentage >= config.min_reporting_for_call;

    let category = if called {
        Category::Called
    } else {
        categorize(current_margin, agg.reporting_percentage, &config.categories)
    };

    info!(
        "Projection: leader {:?} certainty {:.1}% category {:?} reason {:?}",
        leading_side, certainty_percent, category, call_reason
    );

    Ok(ProjectionResult {
        leading_side,
        certainty_percent,
        called,
        category,
        reporting_percentage: agg.reporting_percentage,
        // A reason is only meaningful if the race is actually called.
        call_reason: if called { call_reason } else { None },
        total_a: agg.total_a.0,
        total_b: agg.total_b.0,
        reported_subdivisions: agg.reported_subdivisions,
        expected_total_votes: agg.expected_total_votes.0,
        current_margin,
        overperformance_a: deviation.overperformance_a,
        overperformance_b: deviation.overperformance_b,
        forward_projection,
    })
}

fn leader_of(a: f64, b: f64) -> LeadingSide {
    if a > b {
        LeadingSide::A
    } else if b > a {
        LeadingSide::B
    } else {
        LeadingSide::Tied
    }
}

fn margin_of(a: f64, b: f64) -> f64 {
    let total = a + b;
    if total > 0.0 {
        (a / total - 0.5).abs()
    } else {
        0.0
    }
}

fn aggregate(states: &[SubdivisionState], config: &ProjectionConfig) -> Aggregate {
    let total_a: VoteCount = states.iter().map(|s| VoteCount(s.tally.votes_a)).sum();
    let total_b: VoteCount = states.iter().map(|s| VoteCount(s.tally.votes_b)).sum();
    let reported_subdivisions = states.iter().filter(|s| s.tally.is_reporting()).count();
    let expected_total_votes: VoteCount = states
        .iter()
        .map(|s| VoteCount(Benchmark::turnout_or_zero(s.subdivision.benchmark.as_ref())))
        .sum();

    let by_subdivisions = reported_subdivisions as f64 / states.len() as f64;
    let reporting_percentage =
        if config.use_vote_based_reporting && expected_total_votes > VoteCount::EMPTY {
            ((total_a + total_b).as_f64() / expected_total_votes.as_f64()).min(1.0)
        } else {
            by_subdivisions
        };

    Aggregate {
        total_a,
        total_b,
        reported_subdivisions,
        expected_total_votes,
        reporting_percentage,
    }
}

fn historical_deviation(states: &[SubdivisionState]) -> Deviation {
    let mut dev = Deviation::default();
    for s in states.iter() {
        let total = s.tally.total();
        // A subdivision that reported zero votes has no share to compare.
        if total == 0 {
            continue;
        }
        let benchmark = s.subdivision.benchmark.as_ref();
        let current_share = s.tally.votes_a as f64 / total as f64;
        let diff = current_share - Benchmark::share_or_default(benchmark);
        let weight = Benchmark::weight_or_default(benchmark) as f64;
        debug!(
            "historical_deviation: {}: share {:.4} diff {:+.4} weight {}",
            s.subdivision.name, current_share, diff, weight
        );
        dev.overperformance_a += diff.max(0.0) * weight;
        dev.overperformance_b += (-diff).max(0.0) * weight;
        dev.weighted_diff += diff * weight;
        dev.total_weight += weight;
    }
    dev
}

fn is_mathematically_impossible(agg: &Aggregate, config: &ProjectionConfig) -> bool {
    let remaining_votes = agg.expected_total_votes.0.saturating_sub(agg.reported_votes().0);
    let remaining_estimate = remaining_votes as f64 * config.historical_confidence;
    let lead = agg.lead().as_f64();
    debug!(
        "is_mathematically_impossible: remaining estimate {:.0} lead {}",
        remaining_estimate, lead
    );
    lead > 0.0
        && remaining_estimate <= lead * (1.0 + config.impossibility_buffer)
        && agg.reporting_percentage > config.min_reporting_for_call
}

/// Returns the certainty in percent, and the reason for an outright call if any.
fn score_certainty(
    agg: &Aggregate,
    deviation: &Deviation,
    forward_projection: Option<&ForwardProjection>,
    leading_side: LeadingSide,
    config: &ProjectionConfig,
) -> (f64, Option<CallReason>) {
    if is_mathematically_impossible(agg, config) {
        return (99.9, Some(CallReason::MathematicallyImpossible));
    }

    let margin = agg.current_margin();
    let composite = composite_certainty(agg, deviation, forward_projection, leading_side, config);
    if agg.reporting_percentage > config.blowout_reporting_threshold
        && margin > config.blowout_margin
    {
        // Never below the composite score.
        return (composite.max(99.5), Some(CallReason::OverwhelmingMargin));
    }
    (composite, None)
}

fn composite_certainty(
    agg: &Aggregate,
    deviation: &Deviation,
    forward_projection: Option<&ForwardProjection>,
    leading_side: LeadingSide,
    config: &ProjectionConfig,
) -> f64 {
    let w = &config.weights;
    let margin_component = (agg.current_margin() * w.margin_multiplier).min(w.margin_cap);
    let reporting_component = agg.reporting_percentage * w.reporting_weight;
    let consistency_component = if w.consistency_scale > 0.0 {
        (deviation.signal_for(leading_side) / w.consistency_scale).min(w.consistency_cap)
    } else {
        0.0
    };
    let projection_component = match forward_projection {
        Some(fp) => {
            let agreement = if fp.projected_leader == leading_side && leading_side != LeadingSide::Tied
            {
                w.agreement_bonus
            } else {
                0.0
            };
            (fp.projected_margin * w.projected_margin_multiplier).min(w.projected_margin_cap)
                + agreement
        }
        None => 0.0,
    };
    debug!(
        "composite_certainty: margin {:.4} reporting {:.4} consistency {:.4} projection {:.4}",
        margin_component, reporting_component, consistency_component, projection_component
    );

    let base = margin_component + reporting_component + consistency_component + projection_component;
    (base * 100.0).clamp(0.0, 99.9)
}

fn project_remaining(
    states: &[SubdivisionState],
    agg: &Aggregate,
    average_deviation: f64,
    config: &ProjectionConfig,
) -> ForwardProjection {
    let mut projected_a = agg.total_a.as_f64();
    let mut projected_b = agg.total_b.as_f64();
    for s in states.iter().filter(|s| !s.tally.is_reporting()) {
        let benchmark = s.subdivision.benchmark.as_ref();
        let expected_votes =
            Benchmark::turnout_or_zero(benchmark) as f64 * config.historical_confidence;
        let adjusted_share =
            (Benchmark::share_or_default(benchmark) + average_deviation).clamp(0.0, 1.0);
        projected_a += expected_votes * adjusted_share;
        projected_b += expected_votes * (1.0 - adjusted_share);
    }
    ForwardProjection {
        projected_a,
        projected_b,
        projected_margin: margin_of(projected_a, projected_b),
        projected_leader: leader_of(projected_a, projected_b),
        average_deviation,
    }
}

fn categorize(margin: f64, reporting: f64, thresholds: &CategoryThresholds) -> Category {
    let adjusted_margin = margin * (reporting * 2.0).min(1.0);
    if adjusted_margin < thresholds.too_close_margin || reporting < thresholds.min_reporting {
        Category::TooClose
    } else if adjusted_margin > thresholds.likely_margin {
        Category::Likely
    } else if adjusted_margin > thresholds.lean_margin {
        Category::Lean
    } else {
        Category::Tilt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn tallies(entries: &[(&str, u64, u64)]) -> BTreeMap<String, TallyEntry> {
        entries
            .iter()
            .map(|(name, a, b)| (name.to_string(), TallyEntry::new(*a, *b)))
            .collect()
    }

    // Twenty subdivisions with a large expected turnout, so that a comeback always
    // stays possible.
    fn large_race() -> Vec<Subdivision> {
        (0..20)
            .map(|idx| Subdivision::new(&format!("S{:02}", idx), 0.5, 100_000))
            .collect()
    }

    #[test]
    fn mathematically_impossible() {
        init();
        let subdivisions = vec![
            Subdivision::new("North", 0.52, 500_000),
            Subdivision::new("South", 0.48, 500_000),
        ];
        let t = tallies(&[("North", 320_000, 180_000), ("South", 280_000, 220_000)]);
        let res = run_projection(&subdivisions, &t, &ProjectionConfig::DEFAULT_CONFIG).unwrap();
        assert!(res.called);
        assert_eq!(res.leading_side, LeadingSide::A);
        assert_eq!(res.category, Category::Called);
        assert_eq!(res.call_reason, Some(CallReason::MathematicallyImpossible));
        assert_eq!(res.certainty_percent, 99.9);
        assert_eq!(res.total_a, 600_000);
        assert_eq!(res.total_b, 400_000);
        assert_eq!(res.reporting_percentage, 1.0);
    }

    #[test]
    fn impossible_requires_minimum_reporting() {
        init();
        // One subdivision out of ten: the remaining estimate is tiny but reporting is too low.
        let mut subdivisions: Vec<Subdivision> = (0..9)
            .map(|idx| Subdivision::new(&format!("S{}", idx), 0.5, 10))
            .collect();
        subdivisions.push(Subdivision::new("Big", 0.5, 100_000));
        let t = tallies(&[("Big", 80_000, 20_000)]);
        let res = run_projection(&subdivisions, &t, &ProjectionConfig::DEFAULT_CONFIG).unwrap();
        assert_ne!(res.call_reason, Some(CallReason::MathematicallyImpossible));
        assert!(!res.called);
        assert_eq!(res.category, Category::TooClose);
    }

    #[test]
    fn blowout() {
        init();
        let subdivisions = large_race();
        let entries: Vec<(String, u64, u64)> = subdivisions
            .iter()
            .take(19)
            .map(|s| (s.name.clone(), 7_000, 3_000))
            .collect();
        let t: BTreeMap<String, TallyEntry> = entries
            .iter()
            .map(|(n, a, b)| (n.clone(), TallyEntry::new(*a, *b)))
            .collect();
        let res = run_projection(&subdivisions, &t, &ProjectionConfig::DEFAULT_CONFIG).unwrap();
        assert!((res.reporting_percentage - 0.95).abs() < 1e-9);
        assert!((res.current_margin - 0.20).abs() < 1e-9);
        assert_eq!(res.certainty_percent, 99.5);
        assert_eq!(res.call_reason, Some(CallReason::OverwhelmingMargin));
        assert!(res.called);
    }

    #[test]
    fn insufficient_data() {
        init();
        let subdivisions = large_race();
        let res = run_projection(&subdivisions, &BTreeMap::new(), &ProjectionConfig::DEFAULT_CONFIG);
        assert_eq!(res, Err(ProjectionErrors::InsufficientData));

        let t = tallies(&[("S00", 0, 0), ("S01", 0, 0)]);
        let res = run_projection(&subdivisions, &t, &ProjectionConfig::ENHANCED_CONFIG);
        assert_eq!(res, Err(ProjectionErrors::InsufficientData));
    }

    #[test]
    fn empty_race() {
        let res = run_projection(&[], &BTreeMap::new(), &ProjectionConfig::DEFAULT_CONFIG);
        assert_eq!(res, Err(ProjectionErrors::EmptyRace));
    }

    #[test]
    fn too_close() {
        init();
        let subdivisions = vec![
            Subdivision::new("East", 0.5, 100_000),
            Subdivision::new("West", 0.5, 100_000),
        ];
        let t = tallies(&[("East", 50_100, 49_900)]);
        let res = run_projection(&subdivisions, &t, &ProjectionConfig::DEFAULT_CONFIG).unwrap();
        assert_eq!(res.reporting_percentage, 0.5);
        assert_eq!(res.category, Category::TooClose);
        assert!(!res.called);
        assert_eq!(res.call_reason, None);
        assert_eq!(res.leading_side, LeadingSide::A);
    }

    #[test]
    fn tie_is_never_called() {
        init();
        let subdivisions = vec![Subdivision::new("Only", 0.5, 1_000)];
        let t = tallies(&[("Only", 500, 500)]);
        let res = run_projection(&subdivisions, &t, &ProjectionConfig::DEFAULT_CONFIG).unwrap();
        assert_eq!(res.leading_side, LeadingSide::Tied);
        assert!(!res.called);
        assert_eq!(res.category, Category::TooClose);
    }

    #[test]
    fn composite_score() {
        init();
        let subdivisions = large_race();
        // 10 out of 20 reporting, 55/45 split everywhere against an even history.
        let entries: Vec<(String, u64, u64)> = subdivisions
            .iter()
            .take(10)
            .map(|s| (s.name.clone(), 5_500, 4_500))
            .collect();
        let t: BTreeMap<String, TallyEntry> = entries
            .iter()
            .map(|(n, a, b)| (n.clone(), TallyEntry::new(*a, *b)))
            .collect();
        let res = run_projection(&subdivisions, &t, &ProjectionConfig::DEFAULT_CONFIG).unwrap();
        // margin: min(0.05 * 300, 0.6) = 0.6
        // reporting: 0.5 * 0.3 = 0.15
        // consistency: min(10 * 0.05 * 100000 / 100000, 0.1) = 0.1
        assert!((res.certainty_percent - 85.0).abs() < 1e-6);
        assert!(!res.called);
        // adjusted margin: 0.05 * 1.0 > 0.04
        assert_eq!(res.category, Category::Lean);
        assert!(res.overperformance_a > 0.0);
        assert_eq!(res.overperformance_b, 0.0);
    }

    #[test]
    fn categories_follow_adjusted_margin() {
        let th = CategoryThresholds::DEFAULT_THRESHOLDS;
        assert_eq!(categorize(0.10, 0.6, &th), Category::Likely);
        assert_eq!(categorize(0.05, 0.6, &th), Category::Lean);
        assert_eq!(categorize(0.03, 0.6, &th), Category::Tilt);
        assert_eq!(categorize(0.01, 0.6, &th), Category::TooClose);
        // Low reporting scales the margin down.
        assert_eq!(categorize(0.10, 0.3, &th), Category::Lean);
        assert_eq!(categorize(0.30, 0.1, &th), Category::TooClose);
    }

    #[test]
    fn missing_benchmark_uses_defaults() {
        init();
        let subdivisions = vec![
            Subdivision::without_benchmark("Unknown"),
            Subdivision::new("Known", 0.5, 0),
        ];
        let t = tallies(&[("Unknown", 600, 400)]);
        let res = run_projection(&subdivisions, &t, &ProjectionConfig::DEFAULT_CONFIG).unwrap();
        // (0.6 - 0.5) * 10000
        assert!((res.overperformance_a - 1_000.0).abs() < 1e-6);
        assert_eq!(res.expected_total_votes, 0);
    }

    #[test]
    fn malformed_share_is_neutral() {
        let b = Benchmark {
            expected_share: 1.7,
            expected_turnout: 5,
        };
        assert_eq!(Benchmark::share_or_default(Some(&b)), DEFAULT_HISTORICAL_SHARE);
        let b = Benchmark {
            expected_share: f64::NAN,
            expected_turnout: 5,
        };
        assert_eq!(Benchmark::share_or_default(Some(&b)), DEFAULT_HISTORICAL_SHARE);
        assert_eq!(Benchmark::weight_or_default(None), DEFAULT_SUBDIVISION_WEIGHT);
    }

    #[test]
    fn explicit_reported_flag_counts_as_reporting() {
        init();
        let subdivisions = vec![
            Subdivision::new("East", 0.5, 100_000),
            Subdivision::new("West", 0.5, 100_000),
        ];
        let mut t = tallies(&[("East", 50_100, 49_900)]);
        t.insert(
            "West".to_string(),
            TallyEntry {
                votes_a: 0,
                votes_b: 0,
                reported: true,
            },
        );
        let res = run_projection(&subdivisions, &t, &ProjectionConfig::DEFAULT_CONFIG).unwrap();
        assert_eq!(res.reported_subdivisions, 2);
        assert_eq!(res.reporting_percentage, 1.0);
    }

    #[test]
    fn vote_based_reporting() {
        init();
        let subdivisions = vec![
            Subdivision::new("East", 0.5, 100_000),
            Subdivision::new("West", 0.5, 300_000),
        ];
        let t = tallies(&[("East", 60_000, 40_000)]);
        let config = ProjectionConfig {
            use_vote_based_reporting: true,
            ..ProjectionConfig::DEFAULT_CONFIG
        };
        let res = run_projection(&subdivisions, &t, &config).unwrap();
        assert!((res.reporting_percentage - 0.25).abs() < 1e-9);

        // Without any turnout data, falls back to counting subdivisions.
        let subdivisions = vec![
            Subdivision::without_benchmark("East"),
            Subdivision::without_benchmark("West"),
        ];
        let res = run_projection(&subdivisions, &t, &config).unwrap();
        assert_eq!(res.reporting_percentage, 0.5);

        // More votes than expected are capped.
        let subdivisions = vec![Subdivision::new("East", 0.5, 50_000)];
        let res = run_projection(&subdivisions, &t, &config).unwrap();
        assert_eq!(res.reporting_percentage, 1.0);
    }

    #[test]
    fn forward_projection_shifts_history() {
        init();
        let subdivisions = vec![
            Subdivision::new("Reported", 0.50, 100_000),
            Subdivision::new("Pending", 0.40, 200_000),
        ];
        // Side A runs 10 points ahead of history in the reporting subdivision.
        let t = tallies(&[("Reported", 60_000, 40_000)]);
        let res = run_projection(&subdivisions, &t, &ProjectionConfig::ENHANCED_CONFIG).unwrap();
        let fp = res.forward_projection.clone().unwrap();
        assert!((fp.average_deviation - 0.10).abs() < 1e-9);
        // Pending: 200000 * 0.85 votes at 0.5 share.
        assert!((fp.projected_a - (60_000.0 + 85_000.0)).abs() < 1e-6);
        assert!((fp.projected_b - (40_000.0 + 85_000.0)).abs() < 1e-6);
        assert_eq!(fp.projected_leader, LeadingSide::A);

        let plain = run_projection(&subdivisions, &t, &ProjectionConfig::DEFAULT_CONFIG).unwrap();
        assert!(plain.forward_projection.is_none());
    }

    #[test]
    fn forward_projection_clamps_share() {
        let subdivisions = vec![
            Subdivision::new("Reported", 0.10, 100_000),
            Subdivision::new("Pending", 0.80, 100_000),
        ];
        let t = tallies(&[("Reported", 90_000, 10_000)]);
        let res = run_projection(&subdivisions, &t, &ProjectionConfig::ENHANCED_CONFIG).unwrap();
        let fp = res.forward_projection.unwrap();
        // 0.8 + 0.8 is clamped to 1.0: all pending votes go to side A.
        assert!((fp.projected_b - 10_000.0).abs() < 1e-6);
    }

    #[test]
    fn certainty_is_bounded() {
        init();
        let subdivisions = large_race();
        for config in [ProjectionConfig::DEFAULT_CONFIG, ProjectionConfig::ENHANCED_CONFIG] {
            for a in [0u64, 1, 10, 1_000, 50_000, 10_000_000] {
                for b in [0u64, 1, 999, 50_000, 10_000_000] {
                    for reporting in [1usize, 5, 20] {
                        let t: BTreeMap<String, TallyEntry> = subdivisions
                            .iter()
                            .take(reporting)
                            .map(|s| (s.name.clone(), TallyEntry::new(a, b)))
                            .collect();
                        match run_projection(&subdivisions, &t, &config) {
                            Ok(res) => {
                                assert!(res.certainty_percent >= 0.0);
                                assert!(res.certainty_percent <= 99.9);
                                assert!((0.0..=1.0).contains(&res.reporting_percentage));
                            }
                            Err(e) => {
                                assert_eq!(e, ProjectionErrors::InsufficientData);
                                assert_eq!(a + b, 0);
                            }
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn idempotent() {
        let subdivisions = large_race();
        let t = tallies(&[("S00", 1_234, 987), ("S05", 4_000, 4_100), ("S07", 10, 0)]);
        for config in [ProjectionConfig::DEFAULT_CONFIG, ProjectionConfig::ENHANCED_CONFIG] {
            let first = run_projection(&subdivisions, &t, &config).unwrap();
            let second = run_projection(&subdivisions, &t, &config).unwrap();
            assert_eq!(first, second);
        }
    }

    #[test]
    fn certainty_grows_with_margin() {
        init();
        let subdivisions = large_race();
        let mut previous = 0.0;
        for extra in (0..40_000u64).step_by(500) {
            let t = tallies(&[
                ("S00", 10_000 + extra, 10_000),
                ("S01", 8_000, 8_500),
                ("S02", 9_000, 9_000),
            ]);
            let res = run_projection(&subdivisions, &t, &ProjectionConfig::DEFAULT_CONFIG).unwrap();
            if res.leading_side == LeadingSide::A {
                assert!(
                    res.certainty_percent >= previous,
                    "certainty went down from {} to {} at {}",
                    previous,
                    res.certainty_percent,
                    extra
                );
                previous = res.certainty_percent;
            }
        }
        assert!(previous > 0.0);
    }

    #[test]
    fn certainty_continuous_at_blowout_threshold() {
        init();
        let subdivisions = large_race();
        let mut previous = 0.0;
        let mut last = None;
        // Every subdivision reports 5000 votes; the margin crosses 10% at 3000 votes for A.
        for a in (2_900..=3_100u64).step_by(5) {
            let t: BTreeMap<String, TallyEntry> = subdivisions
                .iter()
                .map(|s| (s.name.clone(), TallyEntry::new(a, 5_000 - a)))
                .collect();
            let res = run_projection(&subdivisions, &t, &ProjectionConfig::DEFAULT_CONFIG).unwrap();
            assert!(
                res.certainty_percent >= previous,
                "certainty went down from {} to {} at {}",
                previous,
                res.certainty_percent,
                a
            );
            previous = res.certainty_percent;
            last = Some(res);
        }
        let last = last.unwrap();
        assert_eq!(last.call_reason, Some(CallReason::OverwhelmingMargin));
        assert_eq!(last.certainty_percent, 99.9);
    }

    #[test]
    fn leader_gains_where_trailing_side_overperforms() {
        init();
        let subdivisions = vec![
            Subdivision::new("Home", 0.5, 10_000),
            Subdivision::new("Away", 0.5, 40_000),
        ];
        let mut previous = 0.0;
        let mut first = None;
        // A leads overall, but B runs further ahead of history in Away.
        for a in (4_500..=6_000u64).step_by(100) {
            let t = tallies(&[("Home", 6_000, 4_000), ("Away", a, 5_500)]);
            let res = run_projection(&subdivisions, &t, &ProjectionConfig::DEFAULT_CONFIG).unwrap();
            assert_eq!(res.leading_side, LeadingSide::A);
            assert!(
                res.certainty_percent >= previous,
                "certainty went down from {} to {} at {}",
                previous,
                res.certainty_percent,
                a
            );
            previous = res.certainty_percent;
            first.get_or_insert(res.certainty_percent);
        }
        // margin 0.6 + reporting 0.3, the trailing side's overperformance adds nothing.
        assert!((first.unwrap() - 90.0).abs() < 1e-6);
        assert!(previous > 91.0);
    }

    #[test]
    fn oversized_counts_are_clamped() {
        init();
        assert_eq!(TallyEntry::new(u64::MAX, 5).total(), u64::MAX);
        let subdivisions = large_race();
        let t = tallies(&[("S00", u64::MAX, 1), ("S01", 3, u64::MAX)]);
        let res = run_projection(&subdivisions, &t, &ProjectionConfig::DEFAULT_CONFIG).unwrap();
        assert_eq!(res.total_a, MAX_VOTES_PER_SIDE + 3);
        assert_eq!(res.total_b, MAX_VOTES_PER_SIDE + 1);
    }
}
