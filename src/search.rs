//! Salt search: drives salt generation, CREATE2 hashing and prefix matching
//! until the lowest matching iteration is found or the budget runs out.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::crypto::{create2_address, Address, InitCodeHash, Salt};
use crate::matcher::Pattern;
use crate::salt::{salt_for_iteration, SaltGenerator};
use crate::worker::WorkerPool;

/// Iterations between cancellation and deadline checks.
pub(crate) const CHECK_INTERVAL: u64 = 1000;

/// Shortest gap between two progress reports.
pub(crate) const MIN_REPORT_INTERVAL: Duration = Duration::from_millis(100);

/// Everything needed to evaluate a candidate offline.
#[derive(Debug, Clone)]
pub struct SearchParams {
    pub deployer: Address,
    pub init_code_hash: InitCodeHash,
    pub pattern: Pattern,
    pub starting_iteration: u64,
    /// Number of iterations to try; `None` searches up to `u64::MAX`.
    pub max_iterations: Option<u64>,
    pub timeout: Option<Duration>,
    /// Optional address placed in the first 20 salt bytes.
    pub caller: Option<Address>,
}

impl SearchParams {
    pub fn new(deployer: Address, init_code_hash: InitCodeHash, pattern: Pattern) -> Self {
        Self {
            deployer,
            init_code_hash,
            pattern,
            starting_iteration: 0,
            max_iterations: None,
            timeout: None,
            caller: None,
        }
    }

    pub fn starting_at(mut self, iteration: u64) -> Self {
        self.starting_iteration = iteration;
        self
    }

    pub fn with_budget(mut self, max_iterations: u64) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_caller(mut self, caller: Address) -> Self {
        self.caller = Some(caller);
        self
    }

    /// Exclusive end of the iteration range.
    pub fn end(&self) -> u64 {
        match self.max_iterations {
            Some(budget) => self.starting_iteration.saturating_add(budget),
            None => u64::MAX,
        }
    }

    /// Number of iterations in the range.
    pub fn range_len(&self) -> u64 {
        self.end() - self.starting_iteration
    }

    /// Salt sequence positioned at the starting iteration.
    pub fn salts(&self) -> SaltGenerator {
        let salts = SaltGenerator::new(self.starting_iteration);
        match self.caller {
            Some(caller) => salts.with_caller(caller),
            None => salts,
        }
    }

    /// Salt and predicted address for one iteration.
    #[inline]
    pub fn candidate(&self, iteration: u64) -> (Salt, Address) {
        let salt = salt_for_iteration(self.caller.as_ref(), iteration);
        let address = create2_address(&self.deployer, &salt, &self.init_code_hash);
        (salt, address)
    }

    /// Evaluates one iteration against the pattern.
    #[inline]
    pub fn evaluate(&self, iteration: u64) -> Option<SearchResult> {
        self.evaluate_salt(iteration, salt_for_iteration(self.caller.as_ref(), iteration))
    }

    #[inline]
    fn evaluate_salt(&self, iteration: u64, salt: Salt) -> Option<SearchResult> {
        let address = create2_address(&self.deployer, &salt, &self.init_code_hash);
        self.pattern.matches(&address).is_match().then_some(SearchResult {
            iteration,
            salt,
            address,
        })
    }

    /// Outcomes decided without searching: empty range, unsatisfiable pattern,
    /// or an empty prefix that matches at the starting iteration.
    fn trivial_outcome(&self) -> Option<SearchOutcome> {
        if !self.pattern.is_satisfiable() {
            log::warn!(
                "prefix {:?} can never match an address; nothing to search",
                self.pattern.prefix()
            );
            return Some(SearchOutcome::Exhausted { searched: 0 });
        }
        if self.range_len() == 0 {
            return Some(SearchOutcome::Exhausted { searched: 0 });
        }
        if self.pattern.is_empty() {
            return self.evaluate(self.starting_iteration).map(SearchOutcome::Found);
        }
        None
    }
}

/// A matching salt and the address it produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchResult {
    pub iteration: u64,
    pub salt: Salt,
    pub address: Address,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    Found(SearchResult),
    /// The whole budget was searched without a match.
    Exhausted { searched: u64 },
    /// Stopped by cancellation or timeout before a match could be confirmed.
    /// Every iteration below `resume_at` was checked without a match, so a
    /// later search starting there picks up the same lowest match.
    Cancelled { searched: u64, resume_at: u64 },
}

impl SearchOutcome {
    pub fn found(&self) -> Option<&SearchResult> {
        match self {
            SearchOutcome::Found(result) => Some(result),
            _ => None,
        }
    }

    /// Converts "not found" into [`crate::Error::SearchExhausted`] for callers
    /// that want to bail with `?`.
    pub fn into_result(self) -> crate::Result<SearchResult> {
        match self {
            SearchOutcome::Found(result) => Ok(result),
            SearchOutcome::Exhausted { searched } | SearchOutcome::Cancelled { searched, .. } => {
                Err(crate::Error::SearchExhausted { searched })
            }
        }
    }
}

/// Snapshot handed to progress callbacks.
#[derive(Debug, Clone, Copy)]
pub struct Progress {
    pub iterations: u64,
    pub elapsed: Duration,
}

impl Progress {
    pub fn per_second(&self) -> f64 {
        let t = self.elapsed.as_secs_f64();
        if t > 0.0 {
            self.iterations as f64 / t
        } else {
            0.0
        }
    }
}

/// Searches with `workers` threads; 1 (or 0) runs on the calling thread.
pub fn search(params: &SearchParams, workers: usize) -> SearchOutcome {
    let cancel = Arc::new(AtomicBool::new(false));
    search_with(params, workers, cancel, Duration::from_secs(1), &mut |_| {})
}

/// Like [`search`], with external cancellation and periodic progress reports.
pub fn search_with(
    params: &SearchParams,
    workers: usize,
    cancel: Arc<AtomicBool>,
    report_interval: Duration,
    on_progress: &mut dyn FnMut(Progress),
) -> SearchOutcome {
    log::info!(
        "searching for prefix {:?} (case sensitive: {}) from iteration {} with {} worker(s)",
        params.pattern.prefix(),
        params.pattern.case_sensitive(),
        params.starting_iteration,
        workers.max(1)
    );

    let report_interval = report_interval.max(MIN_REPORT_INTERVAL);
    let outcome = match params.trivial_outcome() {
        Some(outcome) => outcome,
        None if workers <= 1 => search_sequential(params, &cancel, report_interval, on_progress),
        None => WorkerPool::with_cancel(workers, params.clone(), cancel)
            .resolve(report_interval, on_progress),
    };

    match &outcome {
        SearchOutcome::Found(r) => {
            log::info!("found salt {} -> {} at iteration {}", r.salt, r.address, r.iteration)
        }
        SearchOutcome::Exhausted { searched } => {
            log::info!("search exhausted after {} iterations", searched)
        }
        SearchOutcome::Cancelled {
            searched,
            resume_at,
        } => log::info!(
            "search cancelled after {} iterations; resume at {}",
            searched,
            resume_at
        ),
    }
    outcome
}

/// Single-threaded scan of the iteration range in order.
pub fn search_sequential(
    params: &SearchParams,
    cancel: &AtomicBool,
    report_interval: Duration,
    on_progress: &mut dyn FnMut(Progress),
) -> SearchOutcome {
    let report_interval = report_interval.max(MIN_REPORT_INTERVAL);
    let start = Instant::now();
    let deadline = params.timeout.map(|t| start + t);
    let mut last_report = start;
    let mut searched = 0u64;

    let end = params.end();
    for (iteration, salt) in params.salts().take_while(|&(i, _)| i < end) {
        if let Some(result) = params.evaluate_salt(iteration, salt) {
            return SearchOutcome::Found(result);
        }
        searched += 1;

        if searched % CHECK_INTERVAL == 0 {
            let now = Instant::now();
            if cancel.load(Ordering::Relaxed) || deadline.is_some_and(|d| now >= d) {
                return SearchOutcome::Cancelled {
                    searched,
                    resume_at: params.starting_iteration + searched,
                };
            }
            if now.duration_since(last_report) >= report_interval {
                last_report = now;
                on_progress(Progress {
                    iterations: searched,
                    elapsed: now.duration_since(start),
                });
            }
        }
    }

    SearchOutcome::Exhausted { searched }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Synthetic deployment target used across search tests.
    pub(crate) fn params(prefix: &str) -> SearchParams {
        SearchParams::new(
            Address::from_bytes([0x11; 20]),
            InitCodeHash::of(b"synthetic init code"),
            Pattern::new(prefix, false),
        )
    }

    /// A prefix long enough that exactly one iteration in `range` carries it.
    pub(crate) fn unique_prefix(p: &SearchParams, range: std::ops::Range<u64>, target: u64) -> String {
        let hex = p.candidate(target).1.to_hex();
        for len in 1..=40 {
            let prefix = &hex[..len];
            let hits = range
                .clone()
                .filter(|&i| p.candidate(i).1.to_hex().starts_with(prefix))
                .count();
            if hits == 1 {
                return prefix.to_string();
            }
        }
        unreachable!("distinct iterations yield distinct addresses")
    }

    fn sequential(p: &SearchParams) -> SearchOutcome {
        search_sequential(p, &AtomicBool::new(false), Duration::from_secs(60), &mut |_| {})
    }

    #[test]
    fn test_first_match_sequential() {
        let base = params("").with_budget(1000);
        let prefix = unique_prefix(&base, 0..1000, 617);
        let p = params(&prefix).with_budget(1000);
        let outcome = sequential(&p);
        let found = outcome.found().unwrap();
        assert_eq!(found.iteration, 617);
        assert_eq!(found.salt, salt_for_iteration(None, 617));
        assert_eq!(
            found.address,
            create2_address(&p.deployer, &found.salt, &p.init_code_hash)
        );
    }

    #[test]
    fn test_lowest_iteration_wins() {
        // Prefix of a single digit: many matches, the earliest must win.
        let base = params("");
        let digit = &base.candidate(0).1.to_hex()[..1];
        let p = params(digit).with_budget(1000);
        assert_eq!(sequential(&p).found().unwrap().iteration, 0);

        let p = params(digit).starting_at(1).with_budget(1000);
        let expected = (1..1001)
            .find(|&i| base.candidate(i).1.to_hex().starts_with(digit))
            .unwrap();
        assert_eq!(sequential(&p).found().unwrap().iteration, expected);
    }

    #[test]
    fn test_exhaustion() {
        let p = params("0123456789").with_budget(500);
        assert_eq!(sequential(&p), SearchOutcome::Exhausted { searched: 500 });
    }

    #[test]
    fn test_unsatisfiable_prefix_returns_immediately() {
        let p = params(&"f".repeat(41)).with_budget(10_000);
        assert_eq!(search(&p, 1), SearchOutcome::Exhausted { searched: 0 });
        assert_eq!(search(&p, 4), SearchOutcome::Exhausted { searched: 0 });
    }

    #[test]
    fn test_resumes_from_starting_iteration() {
        let base = params("").with_budget(1000);
        let prefix = unique_prefix(&base, 0..1000, 100);
        let p = params(&prefix).starting_at(101).with_budget(899);
        assert_eq!(search(&p, 1), SearchOutcome::Exhausted { searched: 899 });
        assert_eq!(search(&p, 4), SearchOutcome::Exhausted { searched: 899 });

        let p = params(&prefix).starting_at(100).with_budget(900);
        assert_eq!(search(&p, 1).found().unwrap().iteration, 100);
    }

    #[test]
    fn test_empty_prefix_short_circuits() {
        let p = params("").starting_at(77).with_budget(10);
        let found = search(&p, 8).into_result().unwrap();
        assert_eq!(found.iteration, 77);
    }

    #[test]
    fn test_zero_budget() {
        let p = params("").with_budget(0);
        assert_eq!(search(&p, 1), SearchOutcome::Exhausted { searched: 0 });
    }

    #[test]
    fn test_cancel_stops_search() {
        let p = params(&"0".repeat(40));
        let cancel = AtomicBool::new(true);
        let outcome = search_sequential(&p, &cancel, Duration::from_secs(60), &mut |_| {});
        assert_eq!(
            outcome,
            SearchOutcome::Cancelled {
                searched: CHECK_INTERVAL,
                resume_at: CHECK_INTERVAL,
            }
        );
    }

    #[test]
    fn test_cancelled_search_resumes_to_same_match() {
        let base = params("").with_budget(3000);
        let prefix = unique_prefix(&base, 0..3000, 2500);
        let p = params(&prefix).starting_at(0).with_budget(3000);

        let cancel = AtomicBool::new(true);
        let outcome = search_sequential(&p, &cancel, Duration::from_secs(60), &mut |_| {});
        let resume_at = match outcome {
            SearchOutcome::Cancelled { resume_at, .. } => resume_at,
            other => panic!("expected cancellation, got {:?}", other),
        };
        assert_eq!(resume_at, CHECK_INTERVAL);

        let resumed = params(&prefix).starting_at(resume_at).with_budget(3000 - resume_at);
        assert_eq!(sequential(&resumed).found(), sequential(&p).found());
        assert_eq!(sequential(&resumed).found().unwrap().iteration, 2500);
    }

    #[test]
    fn test_zero_report_interval_is_throttled() {
        let p = params(&"0".repeat(40)).with_timeout(Duration::from_millis(300));
        let cancel = Arc::new(AtomicBool::new(false));
        for workers in [1, 4] {
            let mut reports = 0u32;
            let outcome = search_with(&p, workers, cancel.clone(), Duration::ZERO, &mut |_| {
                reports += 1
            });
            assert!(matches!(outcome, SearchOutcome::Cancelled { .. }));
            assert!(reports <= 4, "{} reports with {} workers", reports, workers);
        }
    }

    #[test]
    fn test_timeout_stops_search() {
        let p = params(&"0".repeat(40)).with_timeout(Duration::from_millis(50));
        let outcome = search(&p, 1);
        assert!(matches!(outcome, SearchOutcome::Cancelled { .. }));
    }

    #[test]
    fn test_into_result() {
        let err = SearchOutcome::Exhausted { searched: 9 }.into_result().unwrap_err();
        assert!(matches!(err, crate::Error::SearchExhausted { searched: 9 }));
    }
}
