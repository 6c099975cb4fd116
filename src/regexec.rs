// regexec.rs - Backtracking interpreter.
// Runs a compiled BytecodePattern over narrow or wide input.
//
// Structure: match parameters → backtrack state types → Interpreter
// (term handlers, then the disjunction loop, then generic parentheses)
// → entry points. One Interpreter lives for exactly one call; every bit
// of backtrack state sits in a typed arena that the call owns.

use smallvec::SmallVec;
use tracing::{trace, warn};

use crate::arena::{ArenaPool, FrameHandle};
use crate::error::RegexError;
use crate::regdefs::*;
use crate::regenc::{CodeUnit, Input, InputStream};
use crate::regint::*;
use crate::unicode::are_canonically_equivalent;

// ============================================================================
// Match Parameters
// ============================================================================

/// Per-call limits. `Default` snapshots the process-wide settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchParam {
    /// Number of disjunction-match attempts before the call gives up.
    pub match_limit: u32,
    /// Number of backtrack slots the call may allocate.
    pub arena_limit: usize,
}

impl Default for MatchParam {
    fn default() -> Self {
        MatchParam {
            match_limit: get_match_limit(),
            arena_limit: get_arena_limit(),
        }
    }
}

impl MatchParam {
    pub fn with_match_limit(mut self, n: u32) -> Self {
        self.match_limit = n;
        self
    }

    pub fn with_arena_limit(mut self, n: usize) -> Self {
        self.arena_limit = n;
        self
    }
}

// ============================================================================
// Backtrack State
// ============================================================================

/// Cursor of one running disjunction.
#[derive(Debug, Clone, Copy)]
struct DisjunctionContext {
    term: usize,
    match_begin: usize,
    match_end: usize,
    frame: FrameHandle,
}

impl DisjunctionContext {
    fn new(frame: FrameHandle) -> Self {
        DisjunctionContext {
            term: 0,
            match_begin: 0,
            match_end: 0,
            frame,
        }
    }

    #[inline]
    fn jump(&mut self, delta: isize) {
        self.term = (self.term as isize + delta) as usize;
    }
}

/// One matched iteration of a generic group: the captures it overwrote
/// and the state of its nested disjunction.
#[derive(Debug)]
struct ParenthesesContext {
    backup: SmallVec<[usize; 4]>,
    disjunction: DisjunctionContext,
}

/// Iterations of a generic group, newest last.
#[derive(Debug, Default)]
struct ParenthesesState {
    contexts: Vec<ParenthesesContext>,
}

/// Contents of one frame slot. Each term writes the variant for its kind.
#[derive(Debug, Default)]
enum BacktrackState {
    #[default]
    Vacant,
    /// Characters and classes.
    Repeat { match_amount: usize },
    BackReference { begin: usize, match_amount: usize },
    Alternative { offset: isize },
    Assertion { begin: usize },
    Once { begin: Option<usize> },
    Terminal { begin: usize },
    Parentheses(ParenthesesState),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Matching,
    Backtracking,
}

/// What a term handler asks the disjunction loop to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    /// Advance and match the following term.
    Next,
    /// Step back and backtrack into the preceding term.
    Back,
    /// Leave the disjunction.
    Return(MatchResult),
}

impl Step {
    #[inline]
    fn from_bool(ok: bool) -> Step {
        if ok {
            Step::Next
        } else {
            Step::Back
        }
    }

    #[inline]
    fn from_result(result: MatchResult) -> Step {
        match result {
            MatchResult::Match => Step::Next,
            MatchResult::NoMatch => Step::Back,
            err => Step::Return(err),
        }
    }
}

#[inline]
fn offset_position(pos: usize, delta: isize) -> usize {
    (pos as isize + delta) as usize
}

#[inline]
fn to_ascii_upper(ch: u32) -> u32 {
    if (b'a' as u32..=b'z' as u32).contains(&ch) {
        ch - 0x20
    } else {
        ch
    }
}

// ============================================================================
// Interpreter
// ============================================================================

struct Interpreter<'p, 'i, 'o, C: CodeUnit> {
    pattern: &'p BytecodePattern,
    output: &'o mut [usize],
    input: InputStream<'i, C>,
    pool: ArenaPool<BacktrackState>,
    remaining_match_count: u32,
}

impl<'p, 'i, 'o, C: CodeUnit> Interpreter<'p, 'i, 'o, C> {
    fn new(
        pattern: &'p BytecodePattern,
        input: &'i [C],
        start: usize,
        output: &'o mut [usize],
        param: &MatchParam,
    ) -> Self {
        Interpreter {
            pattern,
            output,
            input: InputStream::new(input, start),
            pool: ArenaPool::new(param.arena_limit),
            remaining_match_count: param.match_limit,
        }
    }

    // === Slot Access ===

    #[inline]
    fn set_state(&mut self, frame: FrameHandle, location: usize, state: BacktrackState) {
        *self.pool.slot_mut(frame, location) = state;
    }

    fn repeat_amount(&self, frame: FrameHandle, location: usize) -> usize {
        match self.pool.slot(frame, location) {
            BacktrackState::Repeat { match_amount } => *match_amount,
            _ => 0,
        }
    }

    fn once_begin(&self, frame: FrameHandle, location: usize) -> Option<usize> {
        match self.pool.slot(frame, location) {
            BacktrackState::Once { begin } => *begin,
            _ => None,
        }
    }

    fn saved_position(&self, frame: FrameHandle, location: usize) -> usize {
        match self.pool.slot(frame, location) {
            BacktrackState::Assertion { begin } | BacktrackState::Terminal { begin } => *begin,
            BacktrackState::BackReference { begin, .. } => *begin,
            _ => self.input.get_pos(),
        }
    }

    fn alloc_frame(&mut self, size: usize) -> Result<FrameHandle, MatchResult> {
        self.pool.alloc(size).map_err(|_| {
            warn!(limit = self.pool.limit(), "backtrack arena exhausted");
            MatchResult::ErrorNoMemory
        })
    }

    // === Character Tests ===

    /// Test the unit `negative_offset` behind the cursor against a
    /// character, cased character or class term.
    fn check_unit(&self, op: &ByteOp, negative_offset: isize) -> bool {
        let ch = self.input.read_checked(negative_offset);
        match op {
            ByteOp::PatternCharacter { ch: expected, .. } => ch == *expected,
            ByteOp::PatternCasedCharacter { lo, hi, .. } => ch == *lo || ch == *hi,
            ByteOp::CharacterClass { class, invert, .. } => {
                self.pattern.class(*class).contains(ch) != *invert
            }
            _ => unreachable!("check_unit on {:?}", op),
        }
    }

    #[inline]
    fn is_newline(&self, ch: u32) -> bool {
        self.pattern.class(self.pattern.newline_class).contains(ch)
    }

    #[inline]
    fn is_wordchar(&self, ch: u32) -> bool {
        self.pattern.class(self.pattern.wordchar_class).contains(ch)
    }

    // === Assertions ===

    fn match_assertion_bol(&self, term: &ByteTerm) -> bool {
        let ip = term.input_position;
        self.input.at_start_offset(ip)
            || (self.pattern.multiline && self.is_newline(self.input.read_checked(ip + 1)))
    }

    fn match_assertion_eol(&self, term: &ByteTerm) -> bool {
        let ip = term.input_position;
        if ip != 0 {
            self.input.at_end_offset(ip)
                || (self.pattern.multiline && self.is_newline(self.input.read_checked(ip)))
        } else {
            self.input.at_end() || (self.pattern.multiline && self.is_newline(self.input.read()))
        }
    }

    fn match_assertion_word_boundary(&self, term: &ByteTerm, invert: bool) -> bool {
        let ip = term.input_position;
        let prev_is_wordchar =
            !self.input.at_start_offset(ip) && self.is_wordchar(self.input.read_checked(ip + 1));
        let read_is_wordchar = if ip != 0 {
            !self.input.at_end_offset(ip) && self.is_wordchar(self.input.read_checked(ip))
        } else {
            !self.input.at_end() && self.is_wordchar(self.input.read())
        };
        (prev_is_wordchar != read_is_wordchar) != invert
    }

    // === Characters and Classes ===

    fn match_repeat(&mut self, term: &ByteTerm, ctx: &DisjunctionContext, quantifier: Quantifier) -> bool {
        let ip = term.input_position;
        let count = quantifier.count as usize;
        match quantifier.ty {
            QuantifierType::FixedCount => {
                (0..count).all(|i| self.check_unit(&term.op, ip - i as isize))
            }
            QuantifierType::Greedy => {
                let mut match_amount = 0;
                while match_amount < count && self.input.check_input(1) {
                    if !self.check_unit(&term.op, ip + 1) {
                        self.input.uncheck_input(1);
                        break;
                    }
                    match_amount += 1;
                }
                self.set_state(ctx.frame, term.frame_location, BacktrackState::Repeat { match_amount });
                true
            }
            QuantifierType::NonGreedy => {
                self.set_state(ctx.frame, term.frame_location, BacktrackState::Repeat { match_amount: 0 });
                true
            }
        }
    }

    fn backtrack_repeat(&mut self, term: &ByteTerm, ctx: &DisjunctionContext, quantifier: Quantifier) -> bool {
        match quantifier.ty {
            // Fixed-count terms own no frame slot.
            QuantifierType::FixedCount => false,
            QuantifierType::Greedy => {
                let match_amount = self.repeat_amount(ctx.frame, term.frame_location);
                if match_amount == 0 {
                    return false;
                }
                self.set_state(
                    ctx.frame,
                    term.frame_location,
                    BacktrackState::Repeat { match_amount: match_amount - 1 },
                );
                self.input.uncheck_input(1);
                true
            }
            QuantifierType::NonGreedy => {
                let mut match_amount = self.repeat_amount(ctx.frame, term.frame_location);
                if match_amount < quantifier.count as usize && self.input.check_input(1) {
                    match_amount += 1;
                    self.set_state(ctx.frame, term.frame_location, BacktrackState::Repeat { match_amount });
                    if self.check_unit(&term.op, term.input_position + 1) {
                        return true;
                    }
                }
                self.input.uncheck_input(match_amount);
                false
            }
        }
    }

    // === Back-References ===

    /// Live span of a group, or `None` when it is unset or empty.
    fn back_reference_span(&self, subpattern_id: usize) -> Option<(usize, usize)> {
        let begin = self.output[subpattern_id << 1];
        let end = self.output[(subpattern_id << 1) + 1];
        if begin == OFFSET_NO_MATCH || end == OFFSET_NO_MATCH || begin >= end {
            None
        } else {
            Some((begin, end))
        }
    }

    fn try_consume_back_reference(&mut self, begin: usize, end: usize, negative_offset: isize) -> bool {
        let size = end - begin;
        if !self.input.check_input(size) {
            return false;
        }

        for i in 0..size {
            let old = self.input.reread(begin + i);
            let ch = self.input.read_checked(negative_offset + (size - i) as isize);
            if old == ch {
                continue;
            }
            // ASCII never matches non-ASCII under canonicalization.
            let equivalent = self.pattern.ignore_case
                && if old < 0x80 || ch < 0x80 {
                    to_ascii_upper(old) == to_ascii_upper(ch)
                } else {
                    are_canonically_equivalent(old, ch)
                };
            if !equivalent {
                self.input.uncheck_input(size);
                return false;
            }
        }
        true
    }

    fn match_back_reference(
        &mut self,
        term: &ByteTerm,
        ctx: &DisjunctionContext,
        subpattern_id: usize,
        quantifier: Quantifier,
    ) -> bool {
        // Unset, empty, or still-open groups match the empty string.
        let Some((match_begin, match_end)) = self.back_reference_span(subpattern_id) else {
            return true;
        };
        let ip = term.input_position;
        let count = quantifier.count as usize;
        let begin = self.input.get_pos();

        match quantifier.ty {
            QuantifierType::FixedCount => {
                self.set_state(ctx.frame, term.frame_location, BacktrackState::BackReference { begin, match_amount: 0 });
                for _ in 0..count {
                    if !self.try_consume_back_reference(match_begin, match_end, ip) {
                        self.input.set_pos(begin);
                        return false;
                    }
                }
                true
            }
            QuantifierType::Greedy => {
                let mut match_amount = 0;
                while match_amount < count && self.try_consume_back_reference(match_begin, match_end, ip) {
                    match_amount += 1;
                }
                self.set_state(ctx.frame, term.frame_location, BacktrackState::BackReference { begin, match_amount });
                true
            }
            QuantifierType::NonGreedy => {
                self.set_state(ctx.frame, term.frame_location, BacktrackState::BackReference { begin, match_amount: 0 });
                true
            }
        }
    }

    fn backtrack_back_reference(
        &mut self,
        term: &ByteTerm,
        ctx: &DisjunctionContext,
        subpattern_id: usize,
        quantifier: Quantifier,
    ) -> bool {
        let Some((match_begin, match_end)) = self.back_reference_span(subpattern_id) else {
            return false;
        };
        let (begin, match_amount) = match self.pool.slot(ctx.frame, term.frame_location) {
            BacktrackState::BackReference { begin, match_amount } => (*begin, *match_amount),
            _ => (self.input.get_pos(), 0),
        };

        match quantifier.ty {
            QuantifierType::FixedCount => {
                self.input.set_pos(begin);
                false
            }
            QuantifierType::Greedy => {
                if match_amount == 0 {
                    return false;
                }
                self.set_state(
                    ctx.frame,
                    term.frame_location,
                    BacktrackState::BackReference { begin, match_amount: match_amount - 1 },
                );
                self.input.rewind(match_end - match_begin);
                true
            }
            QuantifierType::NonGreedy => {
                if match_amount < quantifier.count as usize
                    && self.try_consume_back_reference(match_begin, match_end, term.input_position)
                {
                    self.set_state(
                        ctx.frame,
                        term.frame_location,
                        BacktrackState::BackReference { begin, match_amount: match_amount + 1 },
                    );
                    return true;
                }
                self.input.set_pos(begin);
                false
            }
        }
    }

    // === Parentheses Once ===

    fn match_parentheses_once_begin(&mut self, term: &ByteTerm, ctx: &mut DisjunctionContext, paren: &ParenthesesInfo) -> Step {
        let pos = self.input.get_pos();
        match paren.quantifier.ty {
            QuantifierType::Greedy => {
                self.set_state(ctx.frame, term.frame_location, BacktrackState::Once { begin: Some(pos) });
            }
            QuantifierType::NonGreedy => {
                // Skip the group; it is entered when backtracked into.
                self.set_state(ctx.frame, term.frame_location, BacktrackState::Once { begin: None });
                ctx.jump(paren.width as isize);
                return Step::Next;
            }
            QuantifierType::FixedCount => {}
        }
        if paren.capture {
            self.output[paren.subpattern_id << 1] = offset_position(pos, -term.input_position);
        }
        Step::Next
    }

    fn match_parentheses_once_end(&mut self, term: &ByteTerm, ctx: &DisjunctionContext, paren: &ParenthesesInfo) -> bool {
        let pos = self.input.get_pos();
        if paren.capture {
            self.output[(paren.subpattern_id << 1) + 1] = offset_position(pos, term.input_position);
        }
        if paren.quantifier.is_fixed() {
            return true;
        }
        // An empty pass does not count.
        self.once_begin(ctx.frame, term.frame_location) != Some(pos)
    }

    fn backtrack_parentheses_once_begin(&mut self, term: &ByteTerm, ctx: &mut DisjunctionContext, paren: &ParenthesesInfo) -> Step {
        if paren.capture {
            self.output[paren.subpattern_id << 1] = OFFSET_NO_MATCH;
            self.output[(paren.subpattern_id << 1) + 1] = OFFSET_NO_MATCH;
        }
        match paren.quantifier.ty {
            QuantifierType::Greedy => {
                // One more chance: match nothing.
                self.set_state(ctx.frame, term.frame_location, BacktrackState::Once { begin: None });
                ctx.jump(paren.width as isize);
                Step::Next
            }
            QuantifierType::NonGreedy | QuantifierType::FixedCount => Step::Back,
        }
    }

    fn backtrack_parentheses_once_end(&mut self, term: &ByteTerm, ctx: &mut DisjunctionContext, paren: &ParenthesesInfo) -> Step {
        // A fixed group owns no frame slot.
        if paren.quantifier.is_fixed() {
            return Step::Back;
        }
        let begin = self.once_begin(ctx.frame, term.frame_location);
        match (paren.quantifier.ty, begin) {
            (QuantifierType::Greedy, None) => {
                ctx.jump(-(paren.width as isize));
                Step::Back
            }
            (QuantifierType::NonGreedy, None) => {
                let pos = self.input.get_pos();
                self.set_state(ctx.frame, term.frame_location, BacktrackState::Once { begin: Some(pos) });
                if paren.capture {
                    self.output[paren.subpattern_id << 1] = offset_position(pos, term.input_position);
                }
                ctx.jump(-(paren.width as isize));
                Step::Next
            }
            _ => Step::Back,
        }
    }

    // === Parentheses Terminal ===

    fn match_parentheses_terminal_end(&mut self, term: &ByteTerm, ctx: &mut DisjunctionContext, paren: &ParenthesesInfo) -> bool {
        if self.saved_position(ctx.frame, term.frame_location) == self.input.get_pos() {
            return false;
        }
        // Loop back to the begin marker for another iteration.
        ctx.jump(-(paren.width as isize + 1));
        true
    }

    // === Parenthetical Assertions ===

    fn match_parenthetical_assertion_end(&mut self, term: &ByteTerm, ctx: &mut DisjunctionContext, paren: &ParenthesesInfo) -> bool {
        let begin = self.saved_position(ctx.frame, term.frame_location);
        self.input.set_pos(begin);
        if paren.invert {
            ctx.jump(-(paren.width as isize));
            return false;
        }
        true
    }

    fn backtrack_parenthetical_assertion_end(&mut self, term: &ByteTerm, ctx: &mut DisjunctionContext, paren: &ParenthesesInfo) -> bool {
        let begin = self.saved_position(ctx.frame, term.frame_location);
        self.input.set_pos(begin);
        ctx.jump(-(paren.width as isize));
        false
    }

    // === DotStar Enclosure ===

    fn match_dot_star_enclosure(&mut self, ctx: &mut DisjunctionContext, bol: bool, eol: bool) -> bool {
        let match_begin = if ctx.match_begin > 0 {
            self.input.line_start_before(ctx.match_begin)
        } else {
            0
        };
        let match_end = self.input.line_end_from(self.input.get_pos());

        if ((match_begin != 0 && bol) || (match_end != self.input.end() && eol)) && !self.pattern.multiline {
            return false;
        }

        ctx.match_begin = match_begin;
        ctx.match_end = match_end;
        true
    }

    // ========================================================================
    // Term Dispatch
    // ========================================================================

    fn match_term(&mut self, term: &'p ByteTerm, ctx: &mut DisjunctionContext) -> Step {
        match &term.op {
            ByteOp::SubpatternBegin | ByteOp::BodyAlternativeBegin { .. } | ByteOp::AlternativeBegin { .. } => {
                Step::Next
            }
            ByteOp::SubpatternEnd
            | ByteOp::BodyAlternativeDisjunction { .. }
            | ByteOp::BodyAlternativeEnd { .. } => {
                ctx.match_end = self.input.get_pos();
                Step::Return(MatchResult::Match)
            }
            ByteOp::AlternativeDisjunction { alt } | ByteOp::AlternativeEnd { alt } => {
                self.set_state(ctx.frame, term.frame_location, BacktrackState::Alternative { offset: alt.end });
                ctx.jump(alt.end);
                Step::Next
            }

            ByteOp::AssertionBol => Step::from_bool(self.match_assertion_bol(term)),
            ByteOp::AssertionEol => Step::from_bool(self.match_assertion_eol(term)),
            ByteOp::AssertionWordBoundary { invert } => {
                Step::from_bool(self.match_assertion_word_boundary(term, *invert))
            }

            ByteOp::PatternCharacter { quantifier, .. }
            | ByteOp::PatternCasedCharacter { quantifier, .. }
            | ByteOp::CharacterClass { quantifier, .. } => Step::from_bool(self.match_repeat(term, ctx, *quantifier)),

            ByteOp::BackReference { subpattern_id, quantifier } => {
                Step::from_bool(self.match_back_reference(term, ctx, *subpattern_id, *quantifier))
            }

            ByteOp::ParenthesesSubpattern { paren, disjunction } => {
                Step::from_result(self.match_parentheses(term, ctx, paren, disjunction))
            }
            ByteOp::ParenthesesOnceBegin { paren } => self.match_parentheses_once_begin(term, ctx, paren),
            ByteOp::ParenthesesOnceEnd { paren } => {
                Step::from_bool(self.match_parentheses_once_end(term, ctx, paren))
            }
            ByteOp::ParenthesesTerminalBegin { .. } => {
                let begin = self.input.get_pos();
                self.set_state(ctx.frame, term.frame_location, BacktrackState::Terminal { begin });
                Step::Next
            }
            ByteOp::ParenthesesTerminalEnd { paren } => {
                Step::from_bool(self.match_parentheses_terminal_end(term, ctx, paren))
            }
            ByteOp::ParentheticalAssertionBegin { .. } => {
                let begin = self.input.get_pos();
                self.set_state(ctx.frame, term.frame_location, BacktrackState::Assertion { begin });
                Step::Next
            }
            ByteOp::ParentheticalAssertionEnd { paren } => {
                Step::from_bool(self.match_parenthetical_assertion_end(term, ctx, paren))
            }

            ByteOp::CheckInput { count } => Step::from_bool(self.input.check_input(*count)),
            ByteOp::UncheckInput { count } => {
                self.input.uncheck_input(*count);
                Step::Next
            }

            ByteOp::DotStarEnclosure { bol, eol } => {
                if self.match_dot_star_enclosure(ctx, *bol, *eol) {
                    Step::Return(MatchResult::Match)
                } else {
                    Step::Back
                }
            }
        }
    }

    fn backtrack_term(&mut self, term: &'p ByteTerm, ctx: &mut DisjunctionContext, terms: &'p [ByteTerm]) -> Step {
        match &term.op {
            ByteOp::SubpatternBegin => Step::Return(MatchResult::NoMatch),

            ByteOp::BodyAlternativeBegin { alt, .. } | ByteOp::BodyAlternativeDisjunction { alt, .. } => {
                ctx.jump(alt.next);
                if alt.next > 0 {
                    return Step::Next;
                }

                // Every alternative failed here; retry one unit further on.
                if self.input.at_end() {
                    return Step::Return(MatchResult::NoMatch);
                }
                self.input.next();
                ctx.match_begin = self.input.get_pos();

                if let ByteOp::BodyAlternativeBegin { alt: first, once_through: true } = &terms[ctx.term].op {
                    // A lone once-through alternative cannot match further on.
                    if first.next == 0 {
                        return Step::Return(MatchResult::NoMatch);
                    }
                    ctx.jump(first.next);
                }
                Step::Next
            }
            ByteOp::AlternativeBegin { alt } | ByteOp::AlternativeDisjunction { alt } => {
                ctx.jump(alt.next);
                if alt.next > 0 {
                    Step::Next
                } else {
                    Step::Back
                }
            }
            ByteOp::AlternativeEnd { .. } => {
                let offset = match self.pool.slot(ctx.frame, term.frame_location) {
                    BacktrackState::Alternative { offset } => *offset,
                    _ => 0,
                };
                ctx.jump(-offset);
                Step::Back
            }

            ByteOp::AssertionBol | ByteOp::AssertionEol | ByteOp::AssertionWordBoundary { .. } => Step::Back,

            ByteOp::PatternCharacter { quantifier, .. }
            | ByteOp::PatternCasedCharacter { quantifier, .. }
            | ByteOp::CharacterClass { quantifier, .. } => {
                Step::from_bool(self.backtrack_repeat(term, ctx, *quantifier))
            }

            ByteOp::BackReference { subpattern_id, quantifier } => {
                Step::from_bool(self.backtrack_back_reference(term, ctx, *subpattern_id, *quantifier))
            }

            ByteOp::ParenthesesSubpattern { paren, disjunction } => {
                Step::from_result(self.backtrack_parentheses(term, ctx, paren, disjunction))
            }
            ByteOp::ParenthesesOnceBegin { paren } => self.backtrack_parentheses_once_begin(term, ctx, paren),
            ByteOp::ParenthesesOnceEnd { paren } => self.backtrack_parentheses_once_end(term, ctx, paren),
            ByteOp::ParenthesesTerminalBegin { paren } => {
                // The failed iteration is dropped and the loop ends here.
                ctx.jump(paren.width as isize);
                Step::Next
            }
            ByteOp::ParentheticalAssertionBegin { paren } => {
                if paren.invert {
                    ctx.jump(paren.width as isize);
                    Step::Next
                } else {
                    Step::Back
                }
            }
            ByteOp::ParentheticalAssertionEnd { paren } => {
                Step::from_bool(self.backtrack_parenthetical_assertion_end(term, ctx, paren))
            }

            ByteOp::CheckInput { count } => {
                self.input.uncheck_input(*count);
                Step::Back
            }
            ByteOp::UncheckInput { count } => {
                self.input.check_input(*count);
                Step::Back
            }

            ByteOp::SubpatternEnd
            | ByteOp::BodyAlternativeEnd { .. }
            | ByteOp::ParenthesesTerminalEnd { .. }
            | ByteOp::DotStarEnclosure { .. } => {
                unreachable!("backtracked into {}", term.name())
            }
        }
    }

    // ========================================================================
    // Disjunction Loop
    // ========================================================================

    fn match_disjunction(&mut self, disjunction: &'p ByteDisjunction, ctx: &mut DisjunctionContext, backtrack: bool) -> MatchResult {
        self.remaining_match_count = self.remaining_match_count.saturating_sub(1);
        if self.remaining_match_count == 0 {
            warn!("match limit reached");
            return MatchResult::ErrorHitLimit;
        }

        let terms = &disjunction.terms[..];
        let mut mode = if backtrack {
            ctx.term -= 1;
            Mode::Backtracking
        } else {
            ctx.match_begin = self.input.get_pos();
            ctx.term = 0;
            Mode::Matching
        };

        loop {
            let term = &terms[ctx.term];
            let step = match mode {
                Mode::Matching => self.match_term(term, ctx),
                Mode::Backtracking => self.backtrack_term(term, ctx, terms),
            };
            match step {
                Step::Next => {
                    ctx.term += 1;
                    mode = Mode::Matching;
                }
                Step::Back => {
                    ctx.term -= 1;
                    mode = Mode::Backtracking;
                }
                Step::Return(result) => return result,
            }
        }
    }

    /// Like `match_disjunction`, but keeps backtracking while the match is empty.
    fn match_non_zero_disjunction(&mut self, disjunction: &'p ByteDisjunction, ctx: &mut DisjunctionContext, backtrack: bool) -> MatchResult {
        let result = self.match_disjunction(disjunction, ctx, backtrack);
        if result != MatchResult::Match {
            return result;
        }
        while ctx.match_begin == ctx.match_end {
            let result = self.match_disjunction(disjunction, ctx, true);
            if result != MatchResult::Match {
                return result;
            }
        }
        MatchResult::Match
    }

    // ========================================================================
    // Generic Parentheses
    // ========================================================================

    /// Open a new iteration: back up and clear the group's captures.
    fn alloc_parentheses_context(&mut self, paren: &ParenthesesInfo, body: &ByteDisjunction) -> Result<ParenthesesContext, MatchResult> {
        let frame = self.alloc_frame(body.frame_size)?;
        let first = paren.subpattern_id << 1;
        let captures = &mut self.output[first..first + (body.num_subpatterns << 1)];
        let backup = SmallVec::from_slice(captures);
        captures.fill(OFFSET_NO_MATCH);
        Ok(ParenthesesContext {
            backup,
            disjunction: DisjunctionContext::new(frame),
        })
    }

    /// Drop an iteration: restore the captures it overwrote and release its frames.
    fn free_parentheses_context(&mut self, paren: &ParenthesesInfo, context: ParenthesesContext) {
        let first = paren.subpattern_id << 1;
        self.output[first..first + context.backup.len()].copy_from_slice(&context.backup);
        self.pool.dealloc(context.disjunction.frame);
    }

    fn record_parentheses_match(&mut self, term: &ByteTerm, paren: &ParenthesesInfo, state: &ParenthesesState) {
        if !paren.capture {
            return;
        }
        if let Some(last) = state.contexts.last() {
            let id = paren.subpattern_id;
            self.output[id << 1] = offset_position(last.disjunction.match_begin, term.input_position);
            self.output[(id << 1) + 1] = offset_position(last.disjunction.match_end, term.input_position);
        }
    }

    /// Re-run the newest iterations in backtrack mode until one finds another
    /// way to match, popping the ones that cannot.
    fn parentheses_do_backtrack(&mut self, paren: &ParenthesesInfo, body: &'p ByteDisjunction, state: &mut ParenthesesState) -> MatchResult {
        while let Some(mut context) = state.contexts.pop() {
            let result = self.match_disjunction(body, &mut context.disjunction, true);
            if result == MatchResult::Match {
                state.contexts.push(context);
                return MatchResult::Match;
            }
            self.free_parentheses_context(paren, context);
            if result != MatchResult::NoMatch {
                return result;
            }
        }
        MatchResult::NoMatch
    }

    /// Add iterations up to `count`. Fixed groups backtrack through earlier
    /// iterations on failure; the others stop at the first failure.
    fn extend_parentheses(
        &mut self,
        paren: &ParenthesesInfo,
        body: &'p ByteDisjunction,
        state: &mut ParenthesesState,
    ) -> MatchResult {
        let count = paren.quantifier.count as usize;
        let fixed = paren.quantifier.is_fixed();
        while state.contexts.len() < count {
            let mut context = match self.alloc_parentheses_context(paren, body) {
                Ok(context) => context,
                Err(err) => return err,
            };
            let result = if fixed {
                self.match_disjunction(body, &mut context.disjunction, false)
            } else {
                self.match_non_zero_disjunction(body, &mut context.disjunction, false)
            };
            if result == MatchResult::Match {
                state.contexts.push(context);
                continue;
            }

            self.free_parentheses_context(paren, context);
            if result != MatchResult::NoMatch {
                return result;
            }
            if !fixed {
                break;
            }
            let result = self.parentheses_do_backtrack(paren, body, state);
            if result != MatchResult::Match {
                return result;
            }
        }
        MatchResult::Match
    }

    fn match_parentheses(
        &mut self,
        term: &'p ByteTerm,
        ctx: &DisjunctionContext,
        paren: &'p ParenthesesInfo,
        body: &'p ByteDisjunction,
    ) -> MatchResult {
        let mut state = ParenthesesState::default();
        let result = match paren.quantifier.ty {
            QuantifierType::FixedCount | QuantifierType::Greedy => {
                let result = self.extend_parentheses(paren, body, &mut state);
                if result == MatchResult::Match {
                    self.record_parentheses_match(term, paren, &state);
                }
                result
            }
            QuantifierType::NonGreedy => MatchResult::Match,
        };
        self.set_state(ctx.frame, term.frame_location, BacktrackState::Parentheses(state));
        result
    }

    fn backtrack_parentheses(
        &mut self,
        term: &'p ByteTerm,
        ctx: &DisjunctionContext,
        paren: &'p ParenthesesInfo,
        body: &'p ByteDisjunction,
    ) -> MatchResult {
        let mut state = match std::mem::take(self.pool.slot_mut(ctx.frame, term.frame_location)) {
            BacktrackState::Parentheses(state) => state,
            _ => ParenthesesState::default(),
        };
        let result = match paren.quantifier.ty {
            QuantifierType::FixedCount => self.backtrack_parentheses_fixed(term, paren, body, &mut state),
            QuantifierType::Greedy => self.backtrack_parentheses_greedy(term, paren, body, &mut state),
            QuantifierType::NonGreedy => self.backtrack_parentheses_non_greedy(term, paren, body, &mut state),
        };
        self.set_state(ctx.frame, term.frame_location, BacktrackState::Parentheses(state));
        result
    }

    fn backtrack_parentheses_fixed(
        &mut self,
        term: &ByteTerm,
        paren: &ParenthesesInfo,
        body: &'p ByteDisjunction,
        state: &mut ParenthesesState,
    ) -> MatchResult {
        let result = self.parentheses_do_backtrack(paren, body, state);
        if result != MatchResult::Match {
            return result;
        }
        let result = self.extend_parentheses(paren, body, state);
        if result == MatchResult::Match {
            self.record_parentheses_match(term, paren, state);
        }
        result
    }

    // Greedy groups already tried "more", so backtracking always gives
    // something up, then extends again as far as possible.
    fn backtrack_parentheses_greedy(
        &mut self,
        term: &ByteTerm,
        paren: &ParenthesesInfo,
        body: &'p ByteDisjunction,
        state: &mut ParenthesesState,
    ) -> MatchResult {
        let Some(mut context) = state.contexts.pop() else {
            return MatchResult::NoMatch;
        };

        let result = self.match_non_zero_disjunction(body, &mut context.disjunction, true);
        if result == MatchResult::Match {
            state.contexts.push(context);
            let result = self.extend_parentheses(paren, body, state);
            if result != MatchResult::Match {
                return result;
            }
        } else {
            self.free_parentheses_context(paren, context);
            if result != MatchResult::NoMatch {
                return result;
            }
        }

        self.record_parentheses_match(term, paren, state);
        MatchResult::Match
    }

    // Non-greedy groups already tried "less", so backtracking first tries
    // one more iteration, then searches back through the existing ones.
    fn backtrack_parentheses_non_greedy(
        &mut self,
        term: &ByteTerm,
        paren: &ParenthesesInfo,
        body: &'p ByteDisjunction,
        state: &mut ParenthesesState,
    ) -> MatchResult {
        if state.contexts.len() < paren.quantifier.count as usize {
            let mut context = match self.alloc_parentheses_context(paren, body) {
                Ok(context) => context,
                Err(err) => return err,
            };
            let result = self.match_non_zero_disjunction(body, &mut context.disjunction, false);
            if result == MatchResult::Match {
                state.contexts.push(context);
                self.record_parentheses_match(term, paren, state);
                return MatchResult::Match;
            }
            self.free_parentheses_context(paren, context);
            if result != MatchResult::NoMatch {
                return result;
            }
        }

        while let Some(mut context) = state.contexts.pop() {
            let result = self.match_non_zero_disjunction(body, &mut context.disjunction, true);
            if result == MatchResult::Match {
                state.contexts.push(context);
                self.record_parentheses_match(term, paren, state);
                return MatchResult::Match;
            }
            self.free_parentheses_context(paren, context);
            if result != MatchResult::NoMatch {
                return result;
            }
        }
        MatchResult::NoMatch
    }

    // ========================================================================
    // Top Level
    // ========================================================================

    fn interpret(&mut self) -> MatchResult {
        self.output.fill(OFFSET_NO_MATCH);
        if !self.input.is_available_input(0) {
            return MatchResult::NoMatch;
        }

        let pattern = self.pattern;
        self.pool.reset();
        let frame = match self.alloc_frame(pattern.body.frame_size) {
            Ok(frame) => frame,
            Err(err) => return err,
        };
        let mut ctx = DisjunctionContext::new(frame);

        let result = self.match_disjunction(&pattern.body, &mut ctx, false);
        if result == MatchResult::Match {
            self.output[0] = ctx.match_begin;
            self.output[1] = ctx.match_end;
        } else {
            self.output.fill(OFFSET_NO_MATCH);
        }
        self.pool.dealloc(frame);
        result
    }
}

// ============================================================================
// Entry Points
// ============================================================================

/// Run `pattern` against `input` from code-unit offset `start`, returning
/// the four-way result. On `Match`, `output[0..2]` holds the match span and
/// `output[2n..2n + 2]` the span of group `n`; every other outcome leaves
/// the whole array at `OFFSET_NO_MATCH`.
///
/// # Panics
///
/// Panics if `output` is shorter than [`BytecodePattern::output_len`].
pub fn interpret_with(
    pattern: &BytecodePattern,
    input: Input<'_>,
    start: usize,
    output: &mut [usize],
    param: &MatchParam,
) -> MatchResult {
    assert!(
        output.len() >= pattern.output_len(),
        "output array holds {} slots, pattern needs {}",
        output.len(),
        pattern.output_len()
    );
    trace!(start, len = input.len(), limit = param.match_limit, "match attempt");

    let result = match input {
        Input::Narrow(units) => Interpreter::new(pattern, units, start, output, param).interpret(),
        Input::Wide(units) => Interpreter::new(pattern, units, start, output, param).interpret(),
    };

    trace!(?result, begin = output[0], end = output[1], "match finished");
    result
}

/// Run `pattern` with the process-wide limits. Returns the match start, or
/// `OFFSET_NO_MATCH` when nothing matched.
pub fn interpret(pattern: &BytecodePattern, input: Input<'_>, start: usize, output: &mut [usize]) -> Result<usize, RegexError> {
    if output.len() < pattern.output_len() {
        return Err(RegexError::InvalidArgument);
    }
    match interpret_with(pattern, input, start, output, &MatchParam::default()) {
        MatchResult::Match => Ok(output[0]),
        MatchResult::NoMatch => Ok(OFFSET_NO_MATCH),
        MatchResult::ErrorHitLimit => Err(RegexError::HitLimit),
        MatchResult::ErrorNoMemory => Err(RegexError::Memory),
    }
}
