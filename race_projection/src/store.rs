/*!
The store of the live counts of a race.

The store holds one [`TallyEntry`] per subdivision and keeps it in sync with a
key-value [`TallyCache`], so that the counts survive a restart. The cache is a
convenience: when it fails, the failure is reported once and the store keeps
working from memory.

```
use race_projection::store::{MemoryCache, VoteStore};
use race_projection::*;

let mut store = VoteStore::new(&[
    Subdivision::new("Adams", 0.55, 1_000),
    Subdivision::new("Baker", 0.45, 1_000),
])?
.with_cache(Box::new(MemoryCache::new()));

store.set_raw_tally("Adams", "620", "not a number")?;
assert_eq!(store.tally("Adams").map(|t| t.votes_b), Some(0));

let res = store.project(&ProjectionConfig::DEFAULT_CONFIG)?;
assert_eq!(res.leading_side, LeadingSide::A);
# Ok::<(), ProjectionErrors>(())
```
*/

use log::{debug, info, warn};

use std::collections::{BTreeMap, HashMap, HashSet};
use std::error::Error;
use std::fmt::Display;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use crate::*;

/// Errors raised by a cache backend.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum CacheError {
    Io(String),
    Format(String),
}

impl Error for CacheError {}

impl Display for CacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheError::Io(msg) => write!(f, "cache I/O error: {}", msg),
            CacheError::Format(msg) => write!(f, "cache format error: {}", msg),
        }
    }
}

/// A key-value store for serialized tallies.
pub trait TallyCache {
    fn load(&self, key: &str) -> Result<Option<String>, CacheError>;
    fn save(&mut self, key: &str, value: &str) -> Result<(), CacheError>;
    fn clear(&mut self, key: &str) -> Result<(), CacheError>;
}

/// A cache that lives as long as the process.
#[derive(Debug, Default, Clone)]
pub struct MemoryCache {
    entries: HashMap<String, String>,
}

impl MemoryCache {
    pub fn new() -> MemoryCache {
        MemoryCache::default()
    }
}

impl TallyCache for MemoryCache {
    fn load(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.entries.get(key).cloned())
    }

    fn save(&mut self, key: &str, value: &str) -> Result<(), CacheError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn clear(&mut self, key: &str) -> Result<(), CacheError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// A cache that keeps one JSON file per key in a directory.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>) -> FileCache {
        FileCache { dir: dir.into() }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl TallyCache for FileCache {
    fn load(&self, key: &str) -> Result<Option<String>, CacheError> {
        match fs::read_to_string(self.path(key)) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CacheError::Io(e.to_string())),
        }
    }

    fn save(&mut self, key: &str, value: &str) -> Result<(), CacheError> {
        fs::create_dir_all(&self.dir).map_err(|e| CacheError::Io(e.to_string()))?;
        fs::write(self.path(key), value).map_err(|e| CacheError::Io(e.to_string()))
    }

    fn clear(&mut self, key: &str) -> Result<(), CacheError> {
        match fs::remove_file(self.path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::Io(e.to_string())),
        }
    }
}

/// The identifier of a set of subdivisions, independent of their order, case and
/// surrounding whitespace.
pub fn race_key(subdivisions: &[Subdivision]) -> String {
    let mut names: Vec<String> = subdivisions
        .iter()
        .map(|s| s.name.trim().to_lowercase())
        .collect();
    names.sort();
    let joined = names.join("\n");
    let digest = sha256::digest(joined.as_str());
    format!("racecall-{}", &digest[..16])
}

/// Reads a vote count typed by a user.
///
/// Anything that is not a whole number between 0 and [`MAX_VOTES_PER_SIDE`] counts as 0.
pub fn coerce_vote_count(raw: &str) -> u64 {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return 0;
    }
    match trimmed.parse::<u64>() {
        Ok(x) if x <= MAX_VOTES_PER_SIDE => x,
        _ => {
            warn!("coerce_vote_count: treating {:?} as 0", raw);
            0
        }
    }
}

/// The running totals of a race.
#[derive(PartialEq, Debug, Clone)]
pub struct TallySummary {
    pub total_a: u64,
    pub total_b: u64,
    pub total: u64,
    pub reporting: usize,
    pub subdivisions: usize,
    /// Shares in percent. Both are 50 when no vote has been recorded.
    pub share_a: f64,
    pub share_b: f64,
    pub vote_margin: u64,
    /// None when no vote has been recorded.
    pub margin_percent: Option<f64>,
}

/// The live counts of a race.
pub struct VoteStore {
    subdivisions: Vec<Subdivision>,
    tallies: BTreeMap<String, TallyEntry>,
    cache: Option<Box<dyn TallyCache>>,
    cache_key: String,
    persistence_error: Option<CacheError>,
}

impl VoteStore {
    /// Creates a store with every subdivision at zero.
    pub fn new(subdivisions: &[Subdivision]) -> Result<VoteStore, ProjectionErrors> {
        if subdivisions.is_empty() {
            return Err(ProjectionErrors::EmptyRace);
        }
        let mut seen: HashSet<&str> = HashSet::new();
        for s in subdivisions.iter() {
            if !seen.insert(s.name.as_str()) {
                return Err(ProjectionErrors::DuplicateSubdivision(s.name.clone()));
            }
        }
        let tallies = subdivisions
            .iter()
            .map(|s| (s.name.clone(), TallyEntry::EMPTY))
            .collect();
        Ok(VoteStore {
            subdivisions: subdivisions.to_vec(),
            tallies,
            cache: None,
            cache_key: race_key(subdivisions),
            persistence_error: None,
        })
    }

    /// Attaches a cache and restores the counts saved under this race's key.
    pub fn with_cache(mut self, cache: Box<dyn TallyCache>) -> VoteStore {
        match cache.load(&self.cache_key) {
            Ok(Some(content)) => match serde_json::from_str::<BTreeMap<String, TallyEntry>>(&content)
            {
                Ok(saved) => self.restore(saved),
                Err(e) => self.report_failure(CacheError::Format(e.to_string())),
            },
            Ok(None) => {
                debug!("with_cache: nothing cached under {}", self.cache_key);
            }
            Err(e) => self.report_failure(e),
        }
        self.cache = Some(cache);
        self
    }

    fn restore(&mut self, saved: BTreeMap<String, TallyEntry>) {
        let mut restored = 0;
        for (name, entry) in saved {
            if let Some(t) = self.tallies.get_mut(&name) {
                *t = entry.clamped();
                restored += 1;
            } else {
                debug!("restore: dropping cached entry for unknown subdivision {:?}", name);
            }
        }
        info!("Restored {} cached tallies from {}", restored, self.cache_key);
    }

    pub fn subdivisions(&self) -> &[Subdivision] {
        &self.subdivisions
    }

    pub fn tallies(&self) -> &BTreeMap<String, TallyEntry> {
        &self.tallies
    }

    pub fn tally(&self, name: &str) -> Option<&TallyEntry> {
        self.tallies.get(name)
    }

    pub fn cache_key(&self) -> &str {
        &self.cache_key
    }

    /// The first persistence failure, if any happened.
    pub fn persistence_error(&self) -> Option<&CacheError> {
        self.persistence_error.as_ref()
    }

    /// Replaces both counts of a subdivision.
    pub fn set_tally(&mut self, name: &str, votes_a: u64, votes_b: u64) -> Result<(), ProjectionErrors> {
        let entry = self
            .tallies
            .get_mut(name)
            .ok_or_else(|| ProjectionErrors::UnknownSubdivision(name.to_string()))?;
        *entry = TallyEntry {
            votes_a,
            votes_b,
            reported: entry.reported,
        }
        .clamped();
        debug!("set_tally: {}: {:?}", name, entry);
        self.persist();
        Ok(())
    }

    /// Replaces both counts of a subdivision from raw user input.
    pub fn set_raw_tally(&mut self, name: &str, raw_a: &str, raw_b: &str) -> Result<(), ProjectionErrors> {
        self.set_tally(name, coerce_vote_count(raw_a), coerce_vote_count(raw_b))
    }

    /// Records that a subdivision has reported, even with no votes.
    pub fn mark_reported(&mut self, name: &str) -> Result<(), ProjectionErrors> {
        let entry = self
            .tallies
            .get_mut(name)
            .ok_or_else(|| ProjectionErrors::UnknownSubdivision(name.to_string()))?;
        entry.reported = true;
        self.persist();
        Ok(())
    }

    /// Sets every count back to zero and removes the cached entry.
    pub fn reset(&mut self) {
        for t in self.tallies.values_mut() {
            *t = TallyEntry::EMPTY;
        }
        info!("Reset {} tallies", self.tallies.len());
        let res = match self.cache.as_mut() {
            Some(cache) => cache.clear(&self.cache_key),
            None => Ok(()),
        };
        if let Err(e) = res {
            self.report_failure(e);
        }
    }

    pub fn summary(&self) -> TallySummary {
        let total_a: u64 = self.tallies.values().map(|t| t.votes_a).sum();
        let total_b: u64 = self.tallies.values().map(|t| t.votes_b).sum();
        let total = total_a + total_b;
        let reporting = self.tallies.values().filter(|t| t.is_reporting()).count();
        let vote_margin = total_a.abs_diff(total_b);
        let (share_a, share_b, margin_percent) = if total > 0 {
            (
                total_a as f64 / total as f64 * 100.0,
                total_b as f64 / total as f64 * 100.0,
                Some(vote_margin as f64 / total as f64 * 100.0),
            )
        } else {
            (50.0, 50.0, None)
        };
        TallySummary {
            total_a,
            total_b,
            total,
            reporting,
            subdivisions: self.subdivisions.len(),
            share_a,
            share_b,
            vote_margin,
            margin_percent,
        }
    }

    /// Runs the estimator over the current counts.
    pub fn project(&self, config: &ProjectionConfig) -> Result<ProjectionResult, ProjectionErrors> {
        run_projection(&self.subdivisions, &self.tallies, config)
    }

    fn persist(&mut self) {
        let res = match self.cache.as_mut() {
            Some(cache) => serde_json::to_string(&self.tallies)
                .map_err(|e| CacheError::Format(e.to_string()))
                .and_then(|content| cache.save(&self.cache_key, &content)),
            None => Ok(()),
        };
        if let Err(e) = res {
            self.report_failure(e);
        }
    }

    // Only the first failure is logged.
    fn report_failure(&mut self, e: CacheError) {
        if self.persistence_error.is_none() {
            warn!(
                "Tally cache unavailable ({}), continuing with in-memory counts",
                e
            );
            self.persistence_error = Some(e);
        } else {
            debug!("report_failure: {}", e);
        }
    }
}
