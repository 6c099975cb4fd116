// regdefs.rs - Public types and constants shared by the compiler and the interpreter.
//
// Compile flags, the four-way match result, sentinels, and the process-wide
// limits that every match call starts from.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use bitflags::bitflags;

// === Sentinels ===

/// Output-array value for a group that did not participate in the match.
pub const OFFSET_NO_MATCH: usize = usize::MAX;

/// Quantifier count used for unbounded repetition (`*`, `+`, `{n,}`).
pub const QUANTIFY_INFINITE: u32 = u32::MAX;

// === Config Constants ===

/// Default number of disjunction-match attempts allowed per `interpret()` call.
pub const MATCH_LIMIT: u32 = 1_000_000;

/// Default number of backtrack-frame slots one `interpret()` call may allocate.
pub const DEFAULT_ARENA_LIMIT: usize = 16 * 1024 * 1024;

/// Maximum pattern length in code units.
pub const MAX_PATTERN_SIZE: usize = 1024 * 1024;

/// Maximum nesting depth of groups in a pattern.
pub const DEFAULT_PARSE_DEPTH_LIMIT: u32 = 4096;

bitflags! {
    /// Compile-time flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RegexFlags: u32 {
        /// Case-insensitive matching (`i`).
        const IGNORE_CASE = 1 << 0;
        /// `^` and `$` also match at line boundaries (`m`).
        const MULTILINE = 1 << 1;
    }
}

/// Outcome of one match attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchResult {
    /// The program matched; captures were written.
    Match,
    /// Every backtracking path was exhausted.
    NoMatch,
    /// The match-limit governor ran out.
    ErrorHitLimit,
    /// The arena could not grow.
    ErrorNoMemory,
}

impl MatchResult {
    pub fn is_error(self) -> bool {
        matches!(self, MatchResult::ErrorHitLimit | MatchResult::ErrorNoMemory)
    }
}

// ============================================================================
// Global Limits
// ============================================================================

static MATCH_LIMIT_IN_INTERPRET: AtomicU32 = AtomicU32::new(MATCH_LIMIT);
static ARENA_LIMIT: AtomicUsize = AtomicUsize::new(DEFAULT_ARENA_LIMIT);

pub fn set_match_limit(n: u32) { MATCH_LIMIT_IN_INTERPRET.store(n, Ordering::Relaxed); }
pub fn get_match_limit() -> u32 { MATCH_LIMIT_IN_INTERPRET.load(Ordering::Relaxed) }
pub fn set_arena_limit(n: usize) { ARENA_LIMIT.store(n, Ordering::Relaxed); }
pub fn get_arena_limit() -> usize { ARENA_LIMIT.load(Ordering::Relaxed) }
