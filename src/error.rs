// error.rs - Error types for yarrow.
//
// Syntax errors carry the parser's code and the pattern offset; match-time
// failures mirror the error half of the four-way match result.

use std::fmt;

use crate::regdefs::MatchResult;
use crate::regerror::ErrorCode;

/// Error type for regex compilation and matching operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegexError {
    /// Syntax error in the pattern.
    Syntax {
        code: ErrorCode,
        offset: usize,
        message: String,
    },
    /// The match-limit governor ran out before the search finished.
    HitLimit,
    /// Backtrack-state allocation failed.
    Memory,
    /// Invalid argument passed to a function.
    InvalidArgument,
}

impl fmt::Display for RegexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegexError::Syntax { message, offset, .. } => {
                write!(f, "syntax error at offset {}: {}", offset, message)
            }
            RegexError::HitLimit => write!(f, "match limit exceeded"),
            RegexError::Memory => write!(f, "memory allocation failed"),
            RegexError::InvalidArgument => write!(f, "invalid argument"),
        }
    }
}

impl std::error::Error for RegexError {}

impl From<ErrorCode> for RegexError {
    fn from(code: ErrorCode) -> Self {
        RegexError::syntax(code, 0)
    }
}

impl RegexError {
    pub(crate) fn syntax(code: ErrorCode, offset: usize) -> Self {
        RegexError::Syntax {
            code,
            offset,
            message: code.message().to_string(),
        }
    }

    /// Map an error outcome of the interpreter. `Match` and `NoMatch` are not errors.
    pub fn from_match_result(result: MatchResult) -> Option<Self> {
        match result {
            MatchResult::ErrorHitLimit => Some(RegexError::HitLimit),
            MatchResult::ErrorNoMemory => Some(RegexError::Memory),
            MatchResult::Match | MatchResult::NoMatch => None,
        }
    }

    /// Numeric code: syntax codes are positive, runtime errors negative.
    pub fn code(&self) -> i32 {
        match self {
            RegexError::Syntax { code, .. } => code.code(),
            RegexError::HitLimit => -1,
            RegexError::Memory => -2,
            RegexError::InvalidArgument => -3,
        }
    }
}
