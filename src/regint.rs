// regint.rs - Program model.
// ByteTerm (one instruction), ByteDisjunction (one compiled alternation),
// BytecodePattern (a whole compiled regex) and the frame-slot sizes the
// offsets pass lays frames out with.

use crate::regdefs::OFFSET_NO_MATCH;
use crate::regparse_types::{CharacterClass, ClassId};

// === Backtrack Frame Sizes (in slots) ===
pub const FRAME_SIZE_PATTERN_CHARACTER: usize = 1;
pub const FRAME_SIZE_CHARACTER_CLASS: usize = 1;
pub const FRAME_SIZE_BACK_REFERENCE: usize = 2;
pub const FRAME_SIZE_ALTERNATIVE: usize = 1;
pub const FRAME_SIZE_PARENTHETICAL_ASSERTION: usize = 1;
pub const FRAME_SIZE_PARENTHESES_ONCE: usize = 1;
pub const FRAME_SIZE_PARENTHESES_TERMINAL: usize = 1;
pub const FRAME_SIZE_PARENTHESES: usize = 2;

// === Quantifier ===

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantifierType {
    FixedCount,
    Greedy,
    NonGreedy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quantifier {
    pub ty: QuantifierType,
    pub count: u32,
}

impl Quantifier {
    pub const ONCE: Quantifier = Quantifier {
        ty: QuantifierType::FixedCount,
        count: 1,
    };

    pub fn new(ty: QuantifierType, count: u32) -> Self {
        Quantifier { ty, count }
    }

    #[inline]
    pub fn is_fixed(&self) -> bool {
        self.ty == QuantifierType::FixedCount
    }
}

impl Default for Quantifier {
    fn default() -> Self {
        Quantifier::ONCE
    }
}

// === ByteTerm ===

/// Relative links of an alternative marker. `next` jumps to the following
/// alternative's marker (backwards to the first one on the last marker);
/// `end` jumps to the closing marker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlternativeLinks {
    pub next: isize,
    pub end: isize,
}

/// Shared payload of the parentheses and assertion markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParenthesesInfo {
    pub subpattern_id: usize,
    pub capture: bool,
    pub invert: bool,
    /// Term-count distance between the begin and end markers.
    pub width: usize,
    pub quantifier: Quantifier,
}

impl ParenthesesInfo {
    pub fn new(subpattern_id: usize, capture: bool, invert: bool) -> Self {
        ParenthesesInfo {
            subpattern_id,
            capture,
            invert,
            width: 0,
            quantifier: Quantifier::ONCE,
        }
    }
}

#[derive(Debug, Clone)]
pub enum ByteOp {
    BodyAlternativeBegin { alt: AlternativeLinks, once_through: bool },
    BodyAlternativeDisjunction { alt: AlternativeLinks, once_through: bool },
    BodyAlternativeEnd { alt: AlternativeLinks },
    AlternativeBegin { alt: AlternativeLinks },
    AlternativeDisjunction { alt: AlternativeLinks },
    AlternativeEnd { alt: AlternativeLinks },
    SubpatternBegin,
    SubpatternEnd,
    AssertionBol,
    AssertionEol,
    AssertionWordBoundary { invert: bool },
    PatternCharacter { ch: u32, quantifier: Quantifier },
    PatternCasedCharacter { lo: u32, hi: u32, quantifier: Quantifier },
    CharacterClass { class: ClassId, invert: bool, quantifier: Quantifier },
    BackReference { subpattern_id: usize, quantifier: Quantifier },
    /// Generic group: the nested program runs in its own frames.
    ParenthesesSubpattern { paren: ParenthesesInfo, disjunction: Box<ByteDisjunction> },
    ParenthesesOnceBegin { paren: ParenthesesInfo },
    ParenthesesOnceEnd { paren: ParenthesesInfo },
    ParenthesesTerminalBegin { paren: ParenthesesInfo },
    ParenthesesTerminalEnd { paren: ParenthesesInfo },
    ParentheticalAssertionBegin { paren: ParenthesesInfo },
    ParentheticalAssertionEnd { paren: ParenthesesInfo },
    CheckInput { count: usize },
    UncheckInput { count: usize },
    DotStarEnclosure { bol: bool, eol: bool },
}

/// One instruction.
#[derive(Debug, Clone)]
pub struct ByteTerm {
    pub op: ByteOp,
    /// Offset behind the cursor (after the alternative's CheckInput) where
    /// this term reads. May be negative.
    pub input_position: isize,
    /// First slot of this term's backtrack state in the enclosing frame.
    pub frame_location: usize,
}

impl ByteTerm {
    pub fn new(op: ByteOp, input_position: isize) -> Self {
        ByteTerm {
            op,
            input_position,
            frame_location: 0,
        }
    }

    pub fn with_frame(op: ByteOp, input_position: isize, frame_location: usize) -> Self {
        ByteTerm {
            op,
            input_position,
            frame_location,
        }
    }

    pub fn alternative(&self) -> Option<&AlternativeLinks> {
        match &self.op {
            ByteOp::BodyAlternativeBegin { alt, .. }
            | ByteOp::BodyAlternativeDisjunction { alt, .. }
            | ByteOp::BodyAlternativeEnd { alt }
            | ByteOp::AlternativeBegin { alt }
            | ByteOp::AlternativeDisjunction { alt }
            | ByteOp::AlternativeEnd { alt } => Some(alt),
            _ => None,
        }
    }

    pub fn alternative_mut(&mut self) -> Option<&mut AlternativeLinks> {
        match &mut self.op {
            ByteOp::BodyAlternativeBegin { alt, .. }
            | ByteOp::BodyAlternativeDisjunction { alt, .. }
            | ByteOp::BodyAlternativeEnd { alt }
            | ByteOp::AlternativeBegin { alt }
            | ByteOp::AlternativeDisjunction { alt }
            | ByteOp::AlternativeEnd { alt } => Some(alt),
            _ => None,
        }
    }

    pub fn parentheses(&self) -> Option<&ParenthesesInfo> {
        match &self.op {
            ByteOp::ParenthesesSubpattern { paren, .. }
            | ByteOp::ParenthesesOnceBegin { paren }
            | ByteOp::ParenthesesOnceEnd { paren }
            | ByteOp::ParenthesesTerminalBegin { paren }
            | ByteOp::ParenthesesTerminalEnd { paren }
            | ByteOp::ParentheticalAssertionBegin { paren }
            | ByteOp::ParentheticalAssertionEnd { paren } => Some(paren),
            _ => None,
        }
    }

    pub fn parentheses_mut(&mut self) -> Option<&mut ParenthesesInfo> {
        match &mut self.op {
            ByteOp::ParenthesesSubpattern { paren, .. }
            | ByteOp::ParenthesesOnceBegin { paren }
            | ByteOp::ParenthesesOnceEnd { paren }
            | ByteOp::ParenthesesTerminalBegin { paren }
            | ByteOp::ParenthesesTerminalEnd { paren }
            | ByteOp::ParentheticalAssertionBegin { paren }
            | ByteOp::ParentheticalAssertionEnd { paren } => Some(paren),
            _ => None,
        }
    }

    /// Short name of the instruction, for logs and test failures.
    pub fn name(&self) -> &'static str {
        match &self.op {
            ByteOp::BodyAlternativeBegin { .. } => "BodyAlternativeBegin",
            ByteOp::BodyAlternativeDisjunction { .. } => "BodyAlternativeDisjunction",
            ByteOp::BodyAlternativeEnd { .. } => "BodyAlternativeEnd",
            ByteOp::AlternativeBegin { .. } => "AlternativeBegin",
            ByteOp::AlternativeDisjunction { .. } => "AlternativeDisjunction",
            ByteOp::AlternativeEnd { .. } => "AlternativeEnd",
            ByteOp::SubpatternBegin => "SubpatternBegin",
            ByteOp::SubpatternEnd => "SubpatternEnd",
            ByteOp::AssertionBol => "AssertionBOL",
            ByteOp::AssertionEol => "AssertionEOL",
            ByteOp::AssertionWordBoundary { .. } => "AssertionWordBoundary",
            ByteOp::PatternCharacter { .. } => "PatternCharacter",
            ByteOp::PatternCasedCharacter { .. } => "PatternCasedCharacter",
            ByteOp::CharacterClass { .. } => "CharacterClass",
            ByteOp::BackReference { .. } => "BackReference",
            ByteOp::ParenthesesSubpattern { .. } => "ParenthesesSubpattern",
            ByteOp::ParenthesesOnceBegin { .. } => "ParenthesesSubpatternOnceBegin",
            ByteOp::ParenthesesOnceEnd { .. } => "ParenthesesSubpatternOnceEnd",
            ByteOp::ParenthesesTerminalBegin { .. } => "ParenthesesSubpatternTerminalBegin",
            ByteOp::ParenthesesTerminalEnd { .. } => "ParenthesesSubpatternTerminalEnd",
            ByteOp::ParentheticalAssertionBegin { .. } => "ParentheticalAssertionBegin",
            ByteOp::ParentheticalAssertionEnd { .. } => "ParentheticalAssertionEnd",
            ByteOp::CheckInput { .. } => "CheckInput",
            ByteOp::UncheckInput { .. } => "UncheckInput",
            ByteOp::DotStarEnclosure { .. } => "DotStarEnclosure",
        }
    }
}

// === ByteDisjunction ===

#[derive(Debug, Clone, Default)]
pub struct ByteDisjunction {
    pub terms: Vec<ByteTerm>,
    /// Number of capture groups this program (and anything nested in it) writes.
    pub num_subpatterns: usize,
    /// Backtrack frame size in slots.
    pub frame_size: usize,
}

impl ByteDisjunction {
    pub fn new(num_subpatterns: usize, frame_size: usize) -> Self {
        ByteDisjunction {
            terms: Vec::new(),
            num_subpatterns,
            frame_size,
        }
    }
}

// === BytecodePattern ===

/// A compiled regular expression. Immutable once built.
#[derive(Debug, Clone)]
pub struct BytecodePattern {
    pub body: ByteDisjunction,
    pub ignore_case: bool,
    pub multiline: bool,
    pub num_subpatterns: usize,
    pub classes: Vec<CharacterClass>,
    pub newline_class: ClassId,
    pub wordchar_class: ClassId,
}

impl BytecodePattern {
    #[inline]
    pub fn class(&self, id: ClassId) -> &CharacterClass {
        &self.classes[id.0]
    }

    /// Required length of the output array passed to the interpreter.
    pub fn output_len(&self) -> usize {
        2 * (self.num_subpatterns + 1)
    }

    /// A fresh output array with every slot set to `OFFSET_NO_MATCH`.
    pub fn new_output(&self) -> Vec<usize> {
        vec![OFFSET_NO_MATCH; self.output_len()]
    }
}
