// regerror.rs - Syntax error codes and their messages.
//
// The parser reports one of these codes together with the offset in the
// pattern where it gave up.

/// Pattern syntax error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    PatternTooLarge,
    QuantifierOutOfOrder,
    QuantifierWithoutAtom,
    QuantifierTooLarge,
    MissingParentheses,
    ParenthesesUnmatched,
    ParenthesesTypeInvalid,
    CharacterClassUnmatched,
    CharacterClassOutOfOrder,
    EscapeUnterminated,
}

impl ErrorCode {
    /// Human-readable message for the code.
    pub fn message(self) -> &'static str {
        match self {
            ErrorCode::PatternTooLarge => "regular expression too large",
            ErrorCode::QuantifierOutOfOrder => "numbers out of order in {} quantifier",
            ErrorCode::QuantifierWithoutAtom => "nothing to repeat",
            ErrorCode::QuantifierTooLarge => "number too large in {} quantifier",
            ErrorCode::MissingParentheses => "missing )",
            ErrorCode::ParenthesesUnmatched => "unmatched parentheses",
            ErrorCode::ParenthesesTypeInvalid => "unrecognized character after (?",
            ErrorCode::CharacterClassUnmatched => "missing terminating ] for character class",
            ErrorCode::CharacterClassOutOfOrder => "range out of order in character class",
            ErrorCode::EscapeUnterminated => "\\ at end of pattern",
        }
    }

    /// Stable numeric code, starting at 1.
    pub fn code(self) -> i32 {
        match self {
            ErrorCode::PatternTooLarge => 1,
            ErrorCode::QuantifierOutOfOrder => 2,
            ErrorCode::QuantifierWithoutAtom => 3,
            ErrorCode::QuantifierTooLarge => 4,
            ErrorCode::MissingParentheses => 5,
            ErrorCode::ParenthesesUnmatched => 6,
            ErrorCode::ParenthesesTypeInvalid => 7,
            ErrorCode::CharacterClassUnmatched => 8,
            ErrorCode::CharacterClassOutOfOrder => 9,
            ErrorCode::EscapeUnterminated => 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages() {
        assert_eq!(ErrorCode::QuantifierWithoutAtom.message(), "nothing to repeat");
        assert_eq!(ErrorCode::MissingParentheses.message(), "missing )");
        assert_eq!(ErrorCode::EscapeUnterminated.message(), "\\ at end of pattern");
    }

    #[test]
    fn codes_are_distinct() {
        let all = [
            ErrorCode::PatternTooLarge,
            ErrorCode::QuantifierOutOfOrder,
            ErrorCode::QuantifierWithoutAtom,
            ErrorCode::QuantifierTooLarge,
            ErrorCode::MissingParentheses,
            ErrorCode::ParenthesesUnmatched,
            ErrorCode::ParenthesesTypeInvalid,
            ErrorCode::CharacterClassUnmatched,
            ErrorCode::CharacterClassOutOfOrder,
            ErrorCode::EscapeUnterminated,
        ];
        let mut codes: Vec<i32> = all.iter().map(|c| c.code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), all.len());
    }
}
