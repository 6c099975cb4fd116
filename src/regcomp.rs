// regcomp.rs - Byte compiler.
// Lowers a parsed Pattern into a BytecodePattern: one flat term list per
// disjunction with CheckInput guards, relative alternative links and the
// frame locations laid out by the offsets pass.
//
// Structure: input offsets → term emitters → parentheses begin/end →
// alternatives → disjunction walk → entry point.

use smallvec::SmallVec;
use tracing::debug;

use crate::error::RegexError;
use crate::regerror::ErrorCode;
use crate::regint::*;
use crate::regparse_types::*;
use crate::unicode;

// ============================================================================
// Input Offsets
// ============================================================================

/// Distance behind the cursor: `checked - position`. May be negative.
fn offset(checked: usize, position: usize) -> Result<isize, RegexError> {
    let checked = isize::try_from(checked).map_err(|_| RegexError::from(ErrorCode::PatternTooLarge))?;
    let position = isize::try_from(position).map_err(|_| RegexError::from(ErrorCode::PatternTooLarge))?;
    Ok(checked - position)
}

#[derive(Debug, Clone, Copy)]
struct ParenthesesStackEntry {
    begin_term: usize,
    saved_alternative_index: usize,
}

// ============================================================================
// ByteCompiler
// ============================================================================

struct ByteCompiler<'p> {
    pattern: &'p Pattern,
    body: ByteDisjunction,
    current_alternative_index: usize,
    parentheses_stack: SmallVec<[ParenthesesStackEntry; 8]>,
}

impl<'p> ByteCompiler<'p> {
    fn new(pattern: &'p Pattern) -> Self {
        ByteCompiler {
            pattern,
            body: ByteDisjunction::default(),
            current_alternative_index: 0,
            parentheses_stack: SmallVec::new(),
        }
    }

    fn compile(mut self) -> Result<BytecodePattern, RegexError> {
        let pattern = self.pattern;
        let body = &pattern.body;
        let once_through = body.alternatives.first().map_or(false, |a| a.once_through);
        self.regex_begin(pattern.num_subpatterns, body.call_frame_size, once_through);
        self.emit_disjunction(body, true, 0, 0)?;
        self.regex_end();

        debug!(
            terms = self.body.terms.len(),
            frame_size = self.body.frame_size,
            subpatterns = self.body.num_subpatterns,
            "compiled pattern"
        );

        Ok(BytecodePattern {
            body: self.body,
            ignore_case: self.pattern.ignore_case,
            multiline: self.pattern.multiline,
            num_subpatterns: self.pattern.num_subpatterns,
            classes: self.pattern.classes.clone(),
            newline_class: self.pattern.newline_class,
            wordchar_class: self.pattern.wordchar_class,
        })
    }

    #[inline]
    fn push(&mut self, op: ByteOp, input_position: isize, frame_location: usize) -> usize {
        self.body.terms.push(ByteTerm::with_frame(op, input_position, frame_location));
        self.body.terms.len() - 1
    }

    // === Term Emitters ===

    fn check_input(&mut self, count: usize) {
        self.push(ByteOp::CheckInput { count }, 0, 0);
    }

    fn uncheck_input(&mut self, count: usize) {
        self.push(ByteOp::UncheckInput { count }, 0, 0);
    }

    fn atom_pattern_character(&mut self, ch: u32, input_position: isize, frame_location: usize, quantifier: Quantifier) {
        if self.pattern.ignore_case {
            let variants = unicode::case_variants(ch);
            if variants.len() == 2 {
                let op = ByteOp::PatternCasedCharacter {
                    lo: variants[0],
                    hi: variants[1],
                    quantifier,
                };
                self.push(op, input_position, frame_location);
                return;
            }
        }
        self.push(ByteOp::PatternCharacter { ch, quantifier }, input_position, frame_location);
    }

    // === Parentheses ===

    fn open_parentheses(&mut self, op: ByteOp, input_position: isize, frame_location: usize, alternative_frame_location: usize) {
        let begin_term = self.push(op, input_position, frame_location);
        self.push(
            ByteOp::AlternativeBegin {
                alt: AlternativeLinks::default(),
            },
            0,
            alternative_frame_location,
        );
        self.parentheses_stack.push(ParenthesesStackEntry {
            begin_term,
            saved_alternative_index: self.current_alternative_index,
        });
        self.current_alternative_index = begin_term + 1;
    }

    fn pop_parentheses_stack(&mut self) -> usize {
        let entry = self
            .parentheses_stack
            .pop()
            .expect("parentheses end without a begin");
        self.current_alternative_index = entry.saved_alternative_index;
        entry.begin_term
    }

    /// Close a begin marker opened by `open_parentheses` with `end_op`,
    /// recording the width on both markers.
    fn close_parentheses(&mut self, end_op: ByteOp, input_position: isize, frame_location: usize, quantifier: Quantifier) {
        let begin_term = self.pop_parentheses_stack();
        self.close_alternative(begin_term + 1);
        let end_term = self.push(end_op, input_position, frame_location);
        let width = end_term - begin_term;
        for index in [begin_term, end_term] {
            if let Some(paren) = self.body.terms[index].parentheses_mut() {
                paren.width = width;
                paren.quantifier = quantifier;
            }
        }
    }

    /// Move everything after the placeholder begin marker into its own
    /// disjunction owned by a ParenthesesSubpattern term.
    fn close_generic_parentheses(
        &mut self,
        parentheses: &Parentheses,
        input_position: isize,
        frame_location: usize,
        quantifier: Quantifier,
    ) {
        let begin_term = self.pop_parentheses_stack();
        self.close_alternative(begin_term + 1);

        let num_subpatterns = (parentheses.last_subpattern_id + 1).saturating_sub(parentheses.subpattern_id);
        let mut nested = ByteDisjunction::new(num_subpatterns, parentheses.disjunction.call_frame_size);
        nested.terms.reserve(self.body.terms.len() - begin_term + 1);
        nested.terms.push(ByteTerm::new(ByteOp::SubpatternBegin, 0));
        nested.terms.extend(self.body.terms.drain(begin_term + 1..));
        nested.terms.push(ByteTerm::new(ByteOp::SubpatternEnd, 0));
        self.body.terms.truncate(begin_term);

        let mut paren = ParenthesesInfo::new(parentheses.subpattern_id, parentheses.capture, false);
        paren.quantifier = quantifier;
        self.push(
            ByteOp::ParenthesesSubpattern {
                paren,
                disjunction: Box::new(nested),
            },
            input_position,
            frame_location,
        );
    }

    // === Alternatives ===

    fn close_alternative(&mut self, orig_begin_term: usize) {
        let end_index = self.body.terms.len();
        let frame_location = self.body.terms[orig_begin_term].frame_location;
        let first_next = self.body.terms[orig_begin_term]
            .alternative()
            .map_or(0, |alt| alt.next);

        if first_next == 0 {
            self.body.terms.remove(orig_begin_term);
            return;
        }

        let mut begin_term = orig_begin_term;
        loop {
            let next = self.body.terms[begin_term].alternative().map_or(0, |alt| alt.next);
            if next == 0 {
                break;
            }
            begin_term = (begin_term as isize + next) as usize;
            let term = &mut self.body.terms[begin_term];
            term.frame_location = frame_location;
            if let Some(alt) = term.alternative_mut() {
                alt.end = end_index as isize - begin_term as isize;
            }
        }
        if let Some(alt) = self.body.terms[begin_term].alternative_mut() {
            alt.next = orig_begin_term as isize - begin_term as isize;
        }
        self.push(
            ByteOp::AlternativeEnd {
                alt: AlternativeLinks::default(),
            },
            0,
            frame_location,
        );
    }

    fn close_body_alternative(&mut self) {
        let end_index = self.body.terms.len();
        let frame_location = self.body.terms[0].frame_location;

        let mut begin_term = 0usize;
        loop {
            let next = self.body.terms[begin_term].alternative().map_or(0, |alt| alt.next);
            if next == 0 {
                break;
            }
            begin_term = (begin_term as isize + next) as usize;
            let term = &mut self.body.terms[begin_term];
            term.frame_location = frame_location;
            if let Some(alt) = term.alternative_mut() {
                alt.end = end_index as isize - begin_term as isize;
            }
        }
        if let Some(alt) = self.body.terms[begin_term].alternative_mut() {
            alt.next = -(begin_term as isize);
        }
        self.push(
            ByteOp::BodyAlternativeEnd {
                alt: AlternativeLinks::default(),
            },
            0,
            frame_location,
        );
    }

    fn regex_begin(&mut self, num_subpatterns: usize, frame_size: usize, once_through: bool) {
        self.body = ByteDisjunction::new(num_subpatterns, frame_size);
        self.push(
            ByteOp::BodyAlternativeBegin {
                alt: AlternativeLinks::default(),
                once_through,
            },
            0,
            0,
        );
        self.current_alternative_index = 0;
    }

    fn regex_end(&mut self) {
        self.close_body_alternative();
    }

    fn link_new_alternative(&mut self, op: ByteOp) {
        let new_index = self.body.terms.len();
        let current = self.current_alternative_index;
        if let Some(alt) = self.body.terms[current].alternative_mut() {
            alt.next = new_index as isize - current as isize;
        }
        self.push(op, 0, 0);
        self.current_alternative_index = new_index;
    }

    // === Disjunction Walk ===

    fn emit_disjunction(
        &mut self,
        disjunction: &PatternDisjunction,
        is_body: bool,
        input_count_already_checked: usize,
        parentheses_input_count_already_checked: usize,
    ) -> Result<(), RegexError> {
        for (index, alternative) in disjunction.alternatives.iter().enumerate() {
            let mut checked = input_count_already_checked;

            if index > 0 {
                let op = if is_body {
                    ByteOp::BodyAlternativeDisjunction {
                        alt: AlternativeLinks::default(),
                        once_through: alternative.once_through,
                    }
                } else {
                    ByteOp::AlternativeDisjunction {
                        alt: AlternativeLinks::default(),
                    }
                };
                self.link_new_alternative(op);
            }

            debug_assert!(alternative.minimum_size >= parentheses_input_count_already_checked);
            let count_to_check = alternative.minimum_size - parentheses_input_count_already_checked;
            if count_to_check > 0 {
                self.check_input(count_to_check);
                checked += count_to_check;
            }

            for term in &alternative.terms {
                self.emit_term(term, &mut checked)?;
            }
        }
        Ok(())
    }

    fn emit_term(&mut self, term: &PatternTerm, checked: &mut usize) -> Result<(), RegexError> {
        let quantifier = term.quantifier;
        match &term.kind {
            TermKind::AssertionBol => {
                self.push(ByteOp::AssertionBol, offset(*checked, term.input_position)?, 0);
            }
            TermKind::AssertionEol => {
                self.push(ByteOp::AssertionEol, offset(*checked, term.input_position)?, 0);
            }
            TermKind::AssertionWordBoundary { invert } => {
                let op = ByteOp::AssertionWordBoundary { invert: *invert };
                self.push(op, offset(*checked, term.input_position)?, 0);
            }
            TermKind::PatternCharacter(ch) => {
                let position = offset(*checked, term.input_position)?;
                self.atom_pattern_character(*ch, position, term.frame_location, quantifier);
            }
            TermKind::CharacterClass { class, invert } => {
                let op = ByteOp::CharacterClass {
                    class: *class,
                    invert: *invert,
                    quantifier,
                };
                self.push(op, offset(*checked, term.input_position)?, term.frame_location);
            }
            TermKind::BackReference(subpattern_id) => {
                let op = ByteOp::BackReference {
                    subpattern_id: *subpattern_id,
                    quantifier,
                };
                self.push(op, offset(*checked, term.input_position)?, term.frame_location);
            }
            TermKind::ForwardReference => {}
            TermKind::ParenthesesSubpattern(parentheses) => {
                self.emit_parentheses(term, parentheses, *checked)?;
            }
            TermKind::ParentheticalAssertion(parentheses) => {
                let alternative_frame_location = term.frame_location + FRAME_SIZE_PARENTHETICAL_ASSERTION;
                debug_assert!(*checked >= term.input_position);
                let positive_input_offset = *checked - term.input_position;
                let minimum_size = parentheses.disjunction.minimum_size;
                let mut uncheck_amount = 0;
                if positive_input_offset > minimum_size {
                    uncheck_amount = positive_input_offset - minimum_size;
                    self.uncheck_input(uncheck_amount);
                    *checked -= uncheck_amount;
                }

                let paren = ParenthesesInfo::new(parentheses.subpattern_id, false, parentheses.invert);
                self.open_parentheses(
                    ByteOp::ParentheticalAssertionBegin { paren },
                    0,
                    term.frame_location,
                    alternative_frame_location,
                );
                self.emit_disjunction(
                    &parentheses.disjunction,
                    false,
                    *checked,
                    positive_input_offset - uncheck_amount,
                )?;
                self.close_parentheses(
                    ByteOp::ParentheticalAssertionEnd { paren },
                    0,
                    term.frame_location,
                    quantifier,
                );

                if uncheck_amount > 0 {
                    self.check_input(uncheck_amount);
                    *checked += uncheck_amount;
                }
            }
            TermKind::DotStarEnclosure { bol, eol } => {
                self.push(ByteOp::DotStarEnclosure { bol: *bol, eol: *eol }, 0, 0);
            }
        }
        Ok(())
    }

    fn emit_parentheses(&mut self, term: &PatternTerm, parentheses: &Parentheses, checked: usize) -> Result<(), RegexError> {
        let quantifier = term.quantifier;
        let paren = ParenthesesInfo::new(parentheses.subpattern_id, parentheses.capture, false);
        // Where the group ends, relative to the cursor after the enclosing guard.
        let delegate_end_input_offset = -offset(checked, term.input_position)?;

        if quantifier.count == 1 && !parentheses.is_copy {
            let mut already_checked = 0;
            let mut alternative_frame_location = term.frame_location;
            if quantifier.is_fixed() {
                already_checked = parentheses.disjunction.minimum_size;
            } else {
                alternative_frame_location += FRAME_SIZE_PARENTHESES_ONCE;
            }
            let begin_position = already_checked as isize - delegate_end_input_offset;
            self.open_parentheses(
                ByteOp::ParenthesesOnceBegin { paren },
                begin_position,
                term.frame_location,
                alternative_frame_location,
            );
            self.emit_disjunction(&parentheses.disjunction, false, checked, already_checked)?;
            self.close_parentheses(
                ByteOp::ParenthesesOnceEnd { paren },
                delegate_end_input_offset,
                term.frame_location,
                quantifier,
            );
        } else if parentheses.is_terminal {
            self.open_parentheses(
                ByteOp::ParenthesesTerminalBegin { paren },
                -delegate_end_input_offset,
                term.frame_location,
                term.frame_location + FRAME_SIZE_PARENTHESES_TERMINAL,
            );
            self.emit_disjunction(&parentheses.disjunction, false, checked, 0)?;
            self.close_parentheses(
                ByteOp::ParenthesesTerminalEnd { paren },
                delegate_end_input_offset,
                term.frame_location,
                quantifier,
            );
        } else {
            // Placeholder until the nested terms are moved out.
            self.open_parentheses(
                ByteOp::ParenthesesSubpattern {
                    paren,
                    disjunction: Box::default(),
                },
                -delegate_end_input_offset,
                term.frame_location,
                0,
            );
            self.emit_disjunction(&parentheses.disjunction, false, checked, 0)?;
            self.close_generic_parentheses(parentheses, delegate_end_input_offset, term.frame_location, quantifier);
        }
        Ok(())
    }
}

// ============================================================================
// Entry Point
// ============================================================================

/// Compile a parsed pattern. The same tree always yields the same program.
pub fn byte_compile(pattern: &Pattern) -> Result<BytecodePattern, RegexError> {
    ByteCompiler::new(pattern).compile()
}
