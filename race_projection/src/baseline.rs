//! Adjusting historical benchmarks with a recent partisan trend.
//!
//! Benchmarks usually come from an election a few years old. The statewide
//! share of side A in the elections held since then gives a trend, and a
//! damped fraction of that trend is added to every subdivision's historical
//! share.

use log::{debug, info};

use std::collections::BTreeMap;

use crate::*;

/// Fraction of the observed trend applied to the benchmarks.
pub const CONSERVATIVE_FACTOR: f64 = 0.75;

/// Two-party returns of one past contest.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct PastReturn {
    pub year: u32,
    pub votes_a: u64,
    pub votes_b: u64,
}

/// Statewide results for one year.
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct YearlyShare {
    pub year: u32,
    pub share_a: f64,
    pub votes_a: u64,
    pub votes_b: u64,
}

#[derive(PartialEq, Debug, Clone, Copy)]
pub struct TrendAdjustment {
    /// Change of the share of side A between the first and the last year.
    pub raw_trend: f64,
    /// The change actually applied to the benchmarks.
    pub adjustment: f64,
    pub first_year: u32,
    pub last_year: u32,
}

/// Sums the returns per year. Years without any two-party vote are dropped.
pub fn yearly_shares(returns: &[PastReturn]) -> Vec<YearlyShare> {
    let mut by_year: BTreeMap<u32, (u64, u64)> = BTreeMap::new();
    for r in returns.iter() {
        let e = by_year.entry(r.year).or_insert((0, 0));
        e.0 += r.votes_a;
        e.1 += r.votes_b;
    }
    by_year
        .into_iter()
        .filter(|(_, (a, b))| a + b > 0)
        .map(|(year, (votes_a, votes_b))| YearlyShare {
            year,
            share_a: votes_a as f64 / (votes_a + votes_b) as f64,
            votes_a,
            votes_b,
        })
        .collect()
}

/// The damped trend between the earliest and the latest year.
///
/// Returns None when fewer than two years are available.
pub fn trend_adjustment(shares: &[YearlyShare], factor: f64) -> Option<TrendAdjustment> {
    let first = shares.iter().min_by_key(|s| s.year)?;
    let last = shares.iter().max_by_key(|s| s.year)?;
    if first.year == last.year {
        return None;
    }
    let raw_trend = last.share_a - first.share_a;
    let res = TrendAdjustment {
        raw_trend,
        adjustment: raw_trend * factor,
        first_year: first.year,
        last_year: last.year,
    };
    debug!("trend_adjustment: {:?}", res);
    Some(res)
}

/// Shifts the historical share of every benchmark by `adjustment`.
///
/// Shares are clamped to [0, 1] and rounded to 4 decimals. Returns the number of
/// subdivisions updated.
pub fn apply_trend(subdivisions: &mut [Subdivision], adjustment: f64) -> usize {
    let mut updated = 0;
    for s in subdivisions.iter_mut() {
        if let Some(b) = s.benchmark.as_mut() {
            let shifted = (b.expected_share + adjustment).clamp(0.0, 1.0);
            b.expected_share = (shifted * 10_000.0).round() / 10_000.0;
            updated += 1;
        }
    }
    info!(
        "Applied a trend of {:+.4} to {} benchmarks",
        adjustment, updated
    );
    updated
}
