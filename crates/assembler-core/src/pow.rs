//! Proof-of-work nonce search.
//!
//! Every search substitutes a nonce into the 76-byte header template, double
//! hashes the 80 bytes, and accepts the first nonce whose hash (read as a
//! big-endian number after byte reversal) is strictly below the target.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::thread;

use tracing::{debug, info};

use crate::constants::{BLOCK_HEADER_SIZE, HEADER_TEMPLATE_SIZE, PROGRESS_INTERVAL};
use crate::difficulty::Target;
use crate::error::{MiningError, Result};
use crate::hash::{double_sha256, hash_to_display_hex};

/// A winning nonce and the hash it produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Solution {
    pub nonce: u32,
    /// Block hash, internal byte order.
    pub hash: [u8; 32],
    /// Hashes computed to find it, across all workers.
    pub attempts: u64,
}

/// Sequential search state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchState {
    Searching { next_nonce: u32 },
    Found(Solution),
}

impl Default for SearchState {
    fn default() -> Self {
        SearchState::Searching { next_nonce: 0 }
    }
}

impl SearchState {
    /// Try the next nonce. A `Found` state is terminal and returned unchanged.
    fn step(self, header: &mut [u8; BLOCK_HEADER_SIZE], target: &Target) -> Result<Self> {
        let nonce = match self {
            SearchState::Found(_) => return Ok(self),
            SearchState::Searching { next_nonce } => next_nonce,
        };

        let hash = hash_with_nonce(header, nonce);
        if target.is_met_by(&hash) {
            return Ok(SearchState::Found(Solution {
                nonce,
                hash,
                attempts: nonce as u64 + 1,
            }));
        }

        let next_nonce = nonce.checked_add(1).ok_or(MiningError::NonceSpaceExhausted)?;
        if next_nonce % PROGRESS_INTERVAL == 0 {
            debug!(nonce = next_nonce, "search progress");
        }
        Ok(SearchState::Searching { next_nonce })
    }
}

#[inline]
fn hash_with_nonce(header: &mut [u8; BLOCK_HEADER_SIZE], nonce: u32) -> [u8; 32] {
    // Nonce is little-endian at bytes 76-79
    header[HEADER_TEMPLATE_SIZE..].copy_from_slice(&nonce.to_le_bytes());
    double_sha256(header)
}

fn header_from_template(template: &[u8; HEADER_TEMPLATE_SIZE]) -> [u8; BLOCK_HEADER_SIZE] {
    let mut header = [0u8; BLOCK_HEADER_SIZE];
    header[..HEADER_TEMPLATE_SIZE].copy_from_slice(template);
    header
}

/// Search nonces from 0 upward for the first hash below `target`.
///
/// `max_attempts` caps the number of nonces tried.
pub fn search(
    template: &[u8; HEADER_TEMPLATE_SIZE],
    target: &Target,
    max_attempts: Option<u64>,
) -> Result<Solution> {
    let mut header = header_from_template(template);
    let mut state = SearchState::default();

    loop {
        match state {
            SearchState::Found(solution) => {
                info!(
                    nonce = solution.nonce,
                    hash = %hash_to_display_hex(&solution.hash),
                    "found hash below target"
                );
                return Ok(solution);
            }
            SearchState::Searching { next_nonce } => {
                if let Some(limit) = max_attempts {
                    if next_nonce as u64 >= limit {
                        return Err(MiningError::AttemptLimitReached(limit));
                    }
                }
                state = state.step(&mut header, target)?;
            }
        }
    }
}

/// Outcome of scanning one nonce window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    Found(Solution),
    Exhausted {
        hashes_computed: u64,
        /// Where the following batch should start, `None` once the nonce space is used up.
        next_nonce: Option<u32>,
    },
}

/// Scan `nonce_count` nonces starting at `nonce_start`.
///
/// `Solution::attempts` counts hashes within this batch only.
pub fn mine_batch(
    template: &[u8; HEADER_TEMPLATE_SIZE],
    target: &Target,
    nonce_start: u32,
    nonce_count: u32,
) -> BatchOutcome {
    let mut header = header_from_template(template);
    let nonce_end = (nonce_start as u64 + nonce_count as u64).min(u32::MAX as u64 + 1);

    for nonce in nonce_start as u64..nonce_end {
        let nonce = nonce as u32;
        let hash = hash_with_nonce(&mut header, nonce);
        if target.is_met_by(&hash) {
            return BatchOutcome::Found(Solution {
                nonce,
                hash,
                attempts: (nonce - nonce_start) as u64 + 1,
            });
        }
    }

    BatchOutcome::Exhausted {
        hashes_computed: nonce_end - nonce_start as u64,
        next_nonce: u32::try_from(nonce_end).ok(),
    }
}

/// Search the nonce space with `workers` scoped threads.
///
/// Worker `w` tries nonces `w, w + workers, ...` in increasing order and stops
/// once it passes the lowest winning nonce published so far, so the result is
/// always the same nonce [`search`] would find.
pub fn search_parallel(
    template: &[u8; HEADER_TEMPLATE_SIZE],
    target: &Target,
    workers: usize,
    max_attempts: Option<u64>,
) -> Result<Solution> {
    if workers <= 1 {
        return search(template, target, max_attempts);
    }

    let limit = max_attempts.unwrap_or(u32::MAX as u64 + 1);
    let best = AtomicU32::new(u32::MAX);
    let found = AtomicBool::new(false);
    let total_attempts = AtomicU64::new(0);

    thread::scope(|scope| {
        for worker in 0..workers {
            let (best, found, total_attempts) = (&best, &found, &total_attempts);
            scope.spawn(move || {
                let mut header = header_from_template(template);
                let mut attempts = 0u64;

                for nonce in (worker as u64..limit.min(u32::MAX as u64 + 1)).step_by(workers) {
                    let nonce = nonce as u32;
                    if found.load(Ordering::Acquire) && nonce > best.load(Ordering::Acquire) {
                        break;
                    }

                    attempts += 1;
                    if attempts % PROGRESS_INTERVAL as u64 == 0 {
                        debug!(worker, nonce, "search progress");
                    }

                    if target.is_met_by(&hash_with_nonce(&mut header, nonce)) {
                        best.fetch_min(nonce, Ordering::AcqRel);
                        found.store(true, Ordering::Release);
                        break;
                    }
                }

                total_attempts.fetch_add(attempts, Ordering::Relaxed);
            });
        }
    });

    if !found.load(Ordering::Acquire) {
        return Err(match max_attempts {
            Some(limit) if limit <= u32::MAX as u64 => MiningError::AttemptLimitReached(limit),
            _ => MiningError::NonceSpaceExhausted,
        });
    }

    let nonce = best.load(Ordering::Acquire);
    let hash = hash_with_nonce(&mut header_from_template(template), nonce);
    info!(
        nonce,
        workers,
        hash = %hash_to_display_hex(&hash),
        "found hash below target"
    );

    Ok(Solution {
        nonce,
        hash,
        attempts: total_attempts.load(Ordering::Relaxed),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ZERO_TEMPLATE: [u8; HEADER_TEMPLATE_SIZE] = [0u8; HEADER_TEMPLATE_SIZE];

    fn easy_target() -> Target {
        let mut bytes = [0u8; 32];
        bytes[1] = 0xff;
        Target::from_be_bytes(bytes)
    }

    #[test]
    fn test_search_finds_first_winning_nonce() {
        let target = easy_target();
        let solution = search(&ZERO_TEMPLATE, &target, None).unwrap();

        assert_eq!(solution.nonce, 164);
        assert_eq!(solution.attempts, 165);
        assert_eq!(
            hash_to_display_hex(&solution.hash),
            "00b704388028b93bb6b4e82c22c42a91f440bfeb0655ea0d6fbe46ebf4d1b618"
        );
        assert!(target.is_met_by(&solution.hash));

        // Every earlier nonce misses
        let mut header = header_from_template(&ZERO_TEMPLATE);
        for nonce in 0..solution.nonce {
            assert!(!target.is_met_by(&hash_with_nonce(&mut header, nonce)), "nonce {}", nonce);
        }
    }

    #[test]
    fn test_search_attempt_limit() {
        let target = easy_target();
        assert_eq!(
            search(&ZERO_TEMPLATE, &target, Some(100)),
            Err(MiningError::AttemptLimitReached(100))
        );
        assert_eq!(search(&ZERO_TEMPLATE, &target, Some(165)).unwrap().nonce, 164);
    }

    #[test]
    fn test_step_reports_exhaustion_at_wrap() {
        let mut header = header_from_template(&ZERO_TEMPLATE);
        let state = SearchState::Searching { next_nonce: u32::MAX };

        // A target of one is never met by a real hash
        let mut one = [0u8; 32];
        one[31] = 1;
        assert_eq!(
            state.step(&mut header, &Target::from_be_bytes(one)),
            Err(MiningError::NonceSpaceExhausted)
        );
    }

    #[test]
    fn test_found_state_is_terminal() {
        let mut header = header_from_template(&ZERO_TEMPLATE);
        let solution = Solution { nonce: 7, hash: [0; 32], attempts: 8 };
        let state = SearchState::Found(solution);
        assert_eq!(state.step(&mut header, &easy_target()), Ok(state));
    }

    #[test]
    fn test_mine_batch() {
        let target = easy_target();

        let miss = mine_batch(&ZERO_TEMPLATE, &target, 0, 100);
        assert_eq!(
            miss,
            BatchOutcome::Exhausted { hashes_computed: 100, next_nonce: Some(100) }
        );

        match mine_batch(&ZERO_TEMPLATE, &target, 100, 100) {
            BatchOutcome::Found(solution) => {
                assert_eq!(solution.nonce, 164);
                assert_eq!(solution.attempts, 65);
            }
            other => panic!("expected a solution, got {:?}", other),
        }
    }

    #[test]
    fn test_mine_batch_stops_at_end_of_nonce_space() {
        let mut one = [0u8; 32];
        one[31] = 1;
        let outcome = mine_batch(&ZERO_TEMPLATE, &Target::from_be_bytes(one), u32::MAX - 1, 10);
        assert_eq!(
            outcome,
            BatchOutcome::Exhausted { hashes_computed: 2, next_nonce: None }
        );
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let target = easy_target();
        let sequential = search(&ZERO_TEMPLATE, &target, None).unwrap();

        for workers in [2, 3, 8] {
            let parallel = search_parallel(&ZERO_TEMPLATE, &target, workers, None).unwrap();
            assert_eq!(parallel.nonce, sequential.nonce, "workers {}", workers);
            assert_eq!(parallel.hash, sequential.hash);
        }
    }

    #[test]
    fn test_parallel_attempt_limit() {
        assert_eq!(
            search_parallel(&ZERO_TEMPLATE, &easy_target(), 4, Some(100)),
            Err(MiningError::AttemptLimitReached(100))
        );
    }
}
