//! Proof-of-work difficulty: the [`Complexity`] target a block hash must
//! stay under, and the sliding-window retarget that adapts it to the
//! observed block rate.

use std::collections::VecDeque;

use primitive_types::U256;
use tracing::info;

use pyrite_core::constants::{DIFFICULTY_RECALCULATION_RATE, TARGET_BLOCKS_PER_MINUTE};
use pyrite_core::{BlockDepth, Error, ImmutableBlock, Result, Sha256, Timestamp};

// ── Complexity ───────────────────────────────────────────────────────────────

/// The PoW target. `densed` is the 256-bit target value; `comparer` is its
/// big-endian 32-byte rendering, compared byte-wise against block hashes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Complexity {
    densed: U256,
    comparer: [u8; 32],
}

impl Complexity {
    pub fn new(densed: U256) -> Self {
        let mut comparer = [0u8; 32];
        densed.to_big_endian(&mut comparer);
        Self { densed, comparer }
    }

    /// The all-ones target: every hash passes. Genesis difficulty.
    pub fn easiest() -> Self {
        Self::new(U256::MAX)
    }

    pub fn densed(&self) -> &U256 {
        &self.densed
    }

    pub fn comparer(&self) -> &[u8; 32] {
        &self.comparer
    }

    /// A hash satisfies the target when it is lexicographically ≤ the
    /// comparer.
    pub fn accepts(&self, hash: &Sha256) -> bool {
        hash.as_bytes()[..] <= self.comparer[..]
    }
}

// ── Consensus ────────────────────────────────────────────────────────────────

/// Holds the last `DIFFICULTY_RECALCULATION_RATE` accepted blocks and
/// retargets whenever a window-aligned depth is reached.
pub struct Consensus {
    window: VecDeque<(BlockDepth, Timestamp)>,
    complexity: Complexity,
}

impl Default for Consensus {
    fn default() -> Self {
        Self::new()
    }
}

impl Consensus {
    pub fn new() -> Self {
        Self {
            window: VecDeque::new(),
            complexity: Complexity::easiest(),
        }
    }

    pub fn complexity(&self) -> &Complexity {
        &self.complexity
    }

    /// The PoW predicate: `SHA256(serialize(block)) ≤ comparer`.
    pub fn check_block(&self, block: &ImmutableBlock) -> bool {
        self.complexity.accepts(block.hash())
    }

    /// Record an accepted block and retarget if its depth closes a window.
    ///
    /// Overflow of the 256-bit target arithmetic, or a zero-length window
    /// interval, poisons consensus irrecoverably and is reported as
    /// [`Error::FatalConsensus`].
    pub fn apply_block(&mut self, block: &ImmutableBlock) -> Result<()> {
        self.window.push_back((block.depth(), block.timestamp()));
        if (self.window.len() as u64) < DIFFICULTY_RECALCULATION_RATE {
            return Ok(());
        }
        if (self.window.len() as u64) > DIFFICULTY_RECALCULATION_RATE {
            self.window.pop_front();
        }
        if block.depth() % DIFFICULTY_RECALCULATION_RATE != 0 {
            return Ok(());
        }

        let (_, window_start) = *self.window.front().expect("window is non-empty");
        let elapsed = block.timestamp().saturating_sub(window_start);
        if elapsed == 0 {
            return Err(Error::FatalConsensus(
                "zero elapsed time across a difficulty window".into(),
            ));
        }

        let target_secs = DIFFICULTY_RECALCULATION_RATE * 60 / TARGET_BLOCKS_PER_MINUTE;
        let scaled = self
            .complexity
            .densed()
            .checked_mul(U256::from(target_secs))
            .ok_or_else(|| {
                Error::FatalConsensus("overflow during difficulty retarget".into())
            })?;
        let new_densed = scaled / U256::from(elapsed);

        info!(
            depth = block.depth(),
            elapsed_secs = elapsed,
            "difficulty retarget: {} -> {}",
            self.complexity.densed(),
            new_densed
        );
        self.complexity = Complexity::new(new_densed);
        Ok(())
    }
}
