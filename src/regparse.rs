// regparse.rs - Pattern parser and syntax tree construction.
// Parses ECMAScript pattern text (as UTF-16 code units) into a Pattern,
// then runs the tree optimizations and the offsets pass that the byte
// compiler depends on.
//
// Structure: helpers → tree builder → tokenizer/parser → optimizations →
// offsets pass → entry points.

use tracing::debug;

use crate::error::RegexError;
use crate::regdefs::{RegexFlags, DEFAULT_PARSE_DEPTH_LIMIT, MAX_PATTERN_SIZE, QUANTIFY_INFINITE};
use crate::regerror::ErrorCode;
use crate::regint::*;
use crate::regparse_types::*;
use crate::unicode;

// ============================================================================
// Helpers
// ============================================================================

#[inline]
fn is_ascii_digit(c: u32) -> bool {
    (b'0' as u32..=b'9' as u32).contains(&c)
}

#[inline]
fn is_octal_digit(c: u32) -> bool {
    (b'0' as u32..=b'7' as u32).contains(&c)
}

#[inline]
fn is_ascii_alpha(c: u32) -> bool {
    c < 0x80 && (c as u8).is_ascii_alphabetic()
}

#[inline]
fn is_ascii_alnum(c: u32) -> bool {
    c < 0x80 && (c as u8).is_ascii_alphanumeric()
}

fn hex_value(c: u32) -> Option<u32> {
    char::from_u32(c).and_then(|c| c.to_digit(16))
}

// ============================================================================
// Tree Builder
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GroupKind {
    Body,
    Subpattern { capture: bool },
    Assertion { invert: bool },
}

#[derive(Debug)]
struct OpenGroup {
    disjunction: PatternDisjunction,
    kind: GroupKind,
    subpattern_id: usize,
}

/// Receives parser events and assembles the syntax tree. Groups that are
/// still open live on `stack`; the body is always `stack[0]`.
struct PatternBuilder {
    pattern: Pattern,
    stack: Vec<OpenGroup>,
}

impl PatternBuilder {
    fn new(flags: RegexFlags) -> Self {
        PatternBuilder {
            pattern: Pattern::new(flags),
            stack: vec![OpenGroup {
                disjunction: PatternDisjunction::new(),
                kind: GroupKind::Body,
                subpattern_id: 0,
            }],
        }
    }

    fn alternative(&mut self) -> &mut PatternAlternative {
        let group = self.stack.last_mut().expect("body group is never popped");
        group
            .disjunction
            .alternatives
            .last_mut()
            .expect("disjunctions always hold an alternative")
    }

    fn push_term(&mut self, kind: TermKind) {
        self.alternative().terms.push(PatternTerm::new(kind));
    }

    fn in_inverted_assertion(&self) -> bool {
        self.stack
            .iter()
            .any(|g| g.kind == GroupKind::Assertion { invert: true })
    }

    fn disjunction(&mut self) {
        let group = self.stack.last_mut().expect("body group is never popped");
        group.disjunction.alternatives.push(PatternAlternative::default());
    }

    fn assertion_bol(&mut self) {
        let inverted = self.in_inverted_assertion();
        let alternative = self.alternative();
        if alternative.terms.is_empty() && !inverted {
            alternative.starts_with_bol = true;
            alternative.contains_bol = true;
            self.pattern.contains_bol = true;
        }
        self.push_term(TermKind::AssertionBol);
    }

    fn assertion_eol(&mut self) {
        self.push_term(TermKind::AssertionEol);
    }

    fn assertion_word_boundary(&mut self, invert: bool) {
        self.push_term(TermKind::AssertionWordBoundary { invert });
    }

    fn atom_pattern_character(&mut self, ch: u32) {
        // Non-ASCII letters with case variants match through a class.
        if self.pattern.ignore_case && ch >= 0x80 && unicode::case_variants(ch).len() > 1 {
            let mut class = CharacterClassBuilder::new(true);
            class.put_char(ch);
            let id = self.pattern.add_class(class.build());
            self.push_term(TermKind::CharacterClass { class: id, invert: false });
            return;
        }
        self.push_term(TermKind::PatternCharacter(ch));
    }

    fn atom_builtin_character_class(&mut self, class: BuiltInClass, invert: bool) {
        let id = self.pattern.builtin_class(class);
        self.push_term(TermKind::CharacterClass { class: id, invert });
    }

    fn atom_character_class(&mut self, class: CharacterClass, invert: bool) {
        let id = self.pattern.add_class(class);
        self.push_term(TermKind::CharacterClass { class: id, invert });
    }

    fn atom_back_reference(&mut self, subpattern_id: usize) {
        self.pattern.max_back_reference = self.pattern.max_back_reference.max(subpattern_id);

        // A reference to a group that is not closed yet can only ever see it unset.
        let still_open = self.stack.iter().any(|g| {
            g.kind == GroupKind::Subpattern { capture: true } && g.subpattern_id == subpattern_id
        });
        if subpattern_id > self.pattern.num_subpatterns || still_open {
            self.push_term(TermKind::ForwardReference);
            return;
        }
        self.push_term(TermKind::BackReference(subpattern_id));
    }

    fn atom_parentheses_subpattern_begin(&mut self, capture: bool) {
        let subpattern_id = self.pattern.num_subpatterns + 1;
        if capture {
            self.pattern.num_subpatterns += 1;
        }
        self.stack.push(OpenGroup {
            disjunction: PatternDisjunction::new(),
            kind: GroupKind::Subpattern { capture },
            subpattern_id,
        });
    }

    fn atom_parenthetical_assertion_begin(&mut self, invert: bool) {
        self.stack.push(OpenGroup {
            disjunction: PatternDisjunction::new(),
            kind: GroupKind::Assertion { invert },
            subpattern_id: self.pattern.num_subpatterns + 1,
        });
    }

    fn atom_parentheses_end(&mut self) {
        let Some(group) = self.stack.pop() else {
            return;
        };
        let num_alternatives = group.disjunction.alternatives.len();
        let bol_anchored = group
            .disjunction
            .alternatives
            .iter()
            .filter(|a| a.starts_with_bol)
            .count();

        let (capture, invert) = match group.kind {
            GroupKind::Subpattern { capture } => (capture, false),
            GroupKind::Assertion { invert } => (false, invert),
            GroupKind::Body => (false, false),
        };
        let parentheses = Parentheses {
            disjunction: Box::new(group.disjunction),
            subpattern_id: group.subpattern_id,
            last_subpattern_id: self.pattern.num_subpatterns,
            capture,
            invert,
            is_copy: false,
            is_terminal: false,
        };
        let kind = match group.kind {
            GroupKind::Assertion { .. } => TermKind::ParentheticalAssertion(parentheses),
            _ => TermKind::ParenthesesSubpattern(parentheses),
        };

        let alternative = self.alternative();
        if bol_anchored > 0 {
            alternative.contains_bol = true;
            if bol_anchored == num_alternatives && alternative.terms.is_empty() {
                alternative.starts_with_bol = true;
            }
        }
        alternative.terms.push(PatternTerm::new(kind));
    }

    fn quantify_atom(&mut self, min: u32, max: u32, greedy: bool) {
        debug_assert!(min <= max);
        let alternative = self.alternative();
        let Some(term) = alternative.terms.last_mut() else {
            return;
        };

        if max == 0 {
            alternative.terms.pop();
            if alternative.terms.is_empty() {
                alternative.starts_with_bol = false;
            }
            return;
        }

        if matches!(term.kind, TermKind::ParentheticalAssertion(_)) {
            // Running an assertion again at the same position gives the same
            // answer, and an optional one can never be required.
            if min == 0 {
                alternative.terms.pop();
                if alternative.terms.is_empty() {
                    alternative.starts_with_bol = false;
                }
            }
            return;
        }

        let variable = if greedy {
            QuantifierType::Greedy
        } else {
            QuantifierType::NonGreedy
        };

        if min == 0 {
            term.quantifier = Quantifier::new(variable, max);
            if alternative.terms.len() == 1 {
                alternative.starts_with_bol = false;
            }
        } else if min == max {
            term.quantifier = Quantifier::new(QuantifierType::FixedCount, min);
        } else {
            term.quantifier = Quantifier::new(QuantifierType::FixedCount, min);
            let mut copy = term.clone();
            let count = if max == QUANTIFY_INFINITE { max } else { max - min };
            copy.quantifier = Quantifier::new(variable, count);
            if let TermKind::ParenthesesSubpattern(p) = &mut copy.kind {
                p.is_copy = true;
            }
            alternative.terms.push(copy);
        }
    }

    fn finish(mut self) -> Pattern {
        if let Some(body) = self.stack.drain(..).next() {
            self.pattern.body = body.disjunction;
        }
        self.pattern
    }
}

// ============================================================================
// Parser
// ============================================================================

/// Result of parsing one `\` escape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Escape {
    Character(u32),
    BuiltIn(BuiltInClass, bool),
    WordBoundary(bool),
    BackReference(u32),
}

/// Character class parser state. A plain character is held back until we
/// know whether a `-` turns it into a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClassState {
    Empty,
    CachedCharacter(u32),
    CachedCharacterHyphen(u32),
    AfterCharacterClass,
    AfterCharacterClassHyphen,
}

struct ClassParser {
    builder: CharacterClassBuilder,
    state: ClassState,
}

impl ClassParser {
    fn new(ignore_case: bool) -> Self {
        ClassParser {
            builder: CharacterClassBuilder::new(ignore_case),
            state: ClassState::Empty,
        }
    }

    fn atom_pattern_character(&mut self, ch: u32, hyphen_is_range: bool) -> Result<(), ErrorCode> {
        let hyphen = hyphen_is_range && ch == '-' as u32;
        match self.state {
            // [\d-x] and [\d-\d] are not ranges; the hyphen is a literal.
            ClassState::AfterCharacterClass if hyphen => {
                self.builder.put_char('-' as u32);
                self.state = ClassState::AfterCharacterClassHyphen;
            }
            ClassState::AfterCharacterClass | ClassState::Empty => {
                self.state = ClassState::CachedCharacter(ch);
            }
            ClassState::CachedCharacter(cached) => {
                if hyphen {
                    self.state = ClassState::CachedCharacterHyphen(cached);
                } else {
                    self.builder.put_char(cached);
                    self.state = ClassState::CachedCharacter(ch);
                }
            }
            ClassState::CachedCharacterHyphen(cached) => {
                if ch < cached {
                    return Err(ErrorCode::CharacterClassOutOfOrder);
                }
                self.builder.put_range(cached, ch);
                self.state = ClassState::Empty;
            }
            ClassState::AfterCharacterClassHyphen => {
                self.builder.put_char(ch);
                self.state = ClassState::Empty;
            }
        }
        Ok(())
    }

    fn atom_builtin_character_class(&mut self, class: BuiltInClass, invert: bool) {
        match self.state {
            ClassState::CachedCharacter(cached) => {
                self.builder.put_char(cached);
                self.put_builtin(class, invert);
                self.state = ClassState::AfterCharacterClass;
            }
            ClassState::Empty | ClassState::AfterCharacterClass => {
                self.put_builtin(class, invert);
                self.state = ClassState::AfterCharacterClass;
            }
            // [x-\d]: treated as x, '-' and the class.
            ClassState::CachedCharacterHyphen(cached) => {
                self.builder.put_char(cached);
                self.builder.put_char('-' as u32);
                self.put_builtin(class, invert);
                self.state = ClassState::Empty;
            }
            ClassState::AfterCharacterClassHyphen => {
                self.put_builtin(class, invert);
                self.state = ClassState::Empty;
            }
        }
    }

    fn put_builtin(&mut self, class: BuiltInClass, invert: bool) {
        if invert {
            self.builder.append_inverted(class.ranges());
        } else {
            self.builder.append(class.ranges());
        }
    }

    fn end(mut self) -> CharacterClass {
        match self.state {
            ClassState::CachedCharacter(cached) => self.builder.put_char(cached),
            ClassState::CachedCharacterHyphen(cached) => {
                self.builder.put_char(cached);
                self.builder.put_char('-' as u32);
            }
            _ => {}
        }
        self.builder.build()
    }
}

struct Parser<'a> {
    input: &'a [u16],
    index: usize,
    builder: PatternBuilder,
    backreference_limit: u32,
    depth: u32,
}

impl<'a> Parser<'a> {
    fn new(input: &'a [u16], flags: RegexFlags, backreference_limit: u32) -> Self {
        Parser {
            input,
            index: 0,
            builder: PatternBuilder::new(flags),
            backreference_limit,
            depth: 0,
        }
    }

    #[inline]
    fn at_end(&self) -> bool {
        self.index >= self.input.len()
    }

    #[inline]
    fn peek(&self) -> u32 {
        self.input[self.index] as u32
    }

    #[inline]
    fn peek_is(&self, ch: char) -> bool {
        !self.at_end() && self.peek() == ch as u32
    }

    #[inline]
    fn peek_is_digit(&self) -> bool {
        !self.at_end() && is_ascii_digit(self.peek())
    }

    #[inline]
    fn consume(&mut self) -> u32 {
        let ch = self.peek();
        self.index += 1;
        ch
    }

    fn try_consume(&mut self, ch: char) -> bool {
        if self.peek_is(ch) {
            self.index += 1;
            true
        } else {
            false
        }
    }

    fn error(&self, code: ErrorCode) -> RegexError {
        RegexError::syntax(code, self.index)
    }

    /// Decimal number; saturates at `u32::MAX`.
    fn consume_number(&mut self) -> u32 {
        let mut n: u32 = 0;
        while self.peek_is_digit() {
            let digit = self.consume() - '0' as u32;
            n = n.saturating_mul(10).saturating_add(digit);
        }
        n
    }

    fn consume_octal(&mut self) -> u32 {
        let mut n = self.consume() - '0' as u32;
        while n < 32 && !self.at_end() && is_octal_digit(self.peek()) {
            n = n * 8 + (self.consume() - '0' as u32);
        }
        n
    }

    /// Exactly `count` hex digits, or nothing consumed.
    fn try_consume_hex(&mut self, count: usize) -> Option<u32> {
        let saved = self.index;
        let mut n = 0u32;
        for _ in 0..count {
            match (!self.at_end()).then(|| hex_value(self.peek())).flatten() {
                Some(v) => {
                    self.index += 1;
                    n = (n << 4) | v;
                }
                None => {
                    self.index = saved;
                    return None;
                }
            }
        }
        Some(n)
    }

    fn parse_escape(&mut self, in_class: bool) -> Result<Escape, RegexError> {
        self.consume(); // '\\'
        if self.at_end() {
            return Err(self.error(ErrorCode::EscapeUnterminated));
        }

        let ch = self.peek();
        let escape = match char::from_u32(ch).unwrap_or('\u{fffd}') {
            'b' => {
                self.consume();
                if in_class {
                    Escape::Character(0x08)
                } else {
                    Escape::WordBoundary(false)
                }
            }
            'B' => {
                self.consume();
                if in_class {
                    Escape::Character('B' as u32)
                } else {
                    Escape::WordBoundary(true)
                }
            }
            'd' | 'D' | 's' | 'S' | 'w' | 'W' => {
                self.consume();
                let class = match ch as u8 {
                    b'd' | b'D' => BuiltInClass::Digit,
                    b's' | b'S' => BuiltInClass::Space,
                    _ => BuiltInClass::Word,
                };
                Escape::BuiltIn(class, (ch as u8).is_ascii_uppercase())
            }
            '1'..='9' => {
                if !in_class {
                    let saved = self.index;
                    let n = self.consume_number();
                    if n <= self.backreference_limit {
                        return Ok(Escape::BackReference(n));
                    }
                    self.index = saved;
                }
                if self.peek() >= '8' as u32 {
                    // "\8" and "\9" are a literal backslash; the digit follows as itself.
                    Escape::Character('\\' as u32)
                } else {
                    Escape::Character(self.consume_octal())
                }
            }
            '0' => Escape::Character(self.consume_octal()),
            'f' => {
                self.consume();
                Escape::Character(0x0c)
            }
            'n' => {
                self.consume();
                Escape::Character(0x0a)
            }
            'r' => {
                self.consume();
                Escape::Character(0x0d)
            }
            't' => {
                self.consume();
                Escape::Character(0x09)
            }
            'v' => {
                self.consume();
                Escape::Character(0x0b)
            }
            'c' => {
                let saved = self.index;
                self.consume();
                if !self.at_end() {
                    let control = self.consume();
                    let valid = if in_class {
                        is_ascii_alnum(control) || control == '_' as u32
                    } else {
                        is_ascii_alpha(control)
                    };
                    if valid {
                        return Ok(Escape::Character(control & 0x1f));
                    }
                }
                self.index = saved;
                Escape::Character('\\' as u32)
            }
            'x' => {
                self.consume();
                Escape::Character(self.try_consume_hex(2).unwrap_or('x' as u32))
            }
            'u' => {
                self.consume();
                Escape::Character(self.try_consume_hex(4).unwrap_or('u' as u32))
            }
            _ => Escape::Character(self.consume()),
        };
        Ok(escape)
    }

    /// Returns whether a quantifier may follow.
    fn parse_atom_escape(&mut self) -> Result<bool, RegexError> {
        match self.parse_escape(false)? {
            Escape::Character(ch) => self.builder.atom_pattern_character(ch),
            Escape::BuiltIn(class, invert) => self.builder.atom_builtin_character_class(class, invert),
            Escape::WordBoundary(invert) => {
                self.builder.assertion_word_boundary(invert);
                return Ok(false);
            }
            Escape::BackReference(n) => self.builder.atom_back_reference(n as usize),
        }
        Ok(true)
    }

    fn parse_character_class(&mut self) -> Result<(), RegexError> {
        self.consume(); // '['
        let invert = self.try_consume('^');
        let mut class = ClassParser::new(self.builder.pattern.ignore_case);

        while !self.at_end() {
            match self.peek() {
                c if c == ']' as u32 => {
                    self.consume();
                    let built = class.end();
                    self.builder.atom_character_class(built, invert);
                    return Ok(());
                }
                c if c == '\\' as u32 => match self.parse_escape(true)? {
                    Escape::Character(ch) => class
                        .atom_pattern_character(ch, false)
                        .map_err(|code| self.error(code))?,
                    Escape::BuiltIn(builtin, inv) => class.atom_builtin_character_class(builtin, inv),
                    Escape::WordBoundary(_) | Escape::BackReference(_) => {
                        unreachable!("class escapes never produce assertions or references")
                    }
                },
                _ => {
                    let ch = self.consume();
                    class
                        .atom_pattern_character(ch, true)
                        .map_err(|code| self.error(code))?;
                }
            }
        }
        Err(self.error(ErrorCode::CharacterClassUnmatched))
    }

    fn parse_parentheses_begin(&mut self) -> Result<(), RegexError> {
        self.consume(); // '('
        if self.depth >= DEFAULT_PARSE_DEPTH_LIMIT {
            return Err(self.error(ErrorCode::PatternTooLarge));
        }
        if self.try_consume('?') {
            if self.at_end() {
                return Err(self.error(ErrorCode::ParenthesesTypeInvalid));
            }
            match char::from_u32(self.consume()) {
                Some(':') => self.builder.atom_parentheses_subpattern_begin(false),
                Some('=') => self.builder.atom_parenthetical_assertion_begin(false),
                Some('!') => self.builder.atom_parenthetical_assertion_begin(true),
                _ => return Err(self.error(ErrorCode::ParenthesesTypeInvalid)),
            }
        } else {
            self.builder.atom_parentheses_subpattern_begin(true);
        }
        self.depth += 1;
        Ok(())
    }

    fn parse_parentheses_end(&mut self) -> Result<(), RegexError> {
        self.consume(); // ')'
        if self.depth == 0 {
            return Err(self.error(ErrorCode::ParenthesesUnmatched));
        }
        self.builder.atom_parentheses_end();
        self.depth -= 1;
        Ok(())
    }

    fn parse_quantifier(&mut self, last_was_atom: bool, min: u32, max: u32) -> Result<(), RegexError> {
        if min == u32::MAX {
            return Err(self.error(ErrorCode::QuantifierTooLarge));
        }
        if !last_was_atom {
            return Err(self.error(ErrorCode::QuantifierWithoutAtom));
        }
        let greedy = !self.try_consume('?');
        self.builder.quantify_atom(min, max, greedy);
        Ok(())
    }

    /// `{n}`, `{n,}` or `{n,m}` at the cursor. Anything else leaves the
    /// cursor alone and the `{` is taken literally.
    fn try_parse_brace_quantifier(&mut self, last_was_atom: bool) -> Result<bool, RegexError> {
        let saved = self.index;
        self.consume(); // '{'
        if self.peek_is_digit() {
            let min = self.consume_number();
            let mut max = min;
            if self.try_consume(',') {
                max = if self.peek_is_digit() {
                    self.consume_number()
                } else {
                    QUANTIFY_INFINITE
                };
            }
            if self.try_consume('}') {
                if min > max {
                    return Err(self.error(ErrorCode::QuantifierOutOfOrder));
                }
                self.parse_quantifier(last_was_atom, min, max)?;
                return Ok(true);
            }
        }
        self.index = saved;
        Ok(false)
    }

    fn parse_tokens(&mut self) -> Result<(), RegexError> {
        let mut last_was_atom = false;

        while !self.at_end() {
            let ch = char::from_u32(self.peek()).unwrap_or('\u{fffd}');
            match ch {
                '|' => {
                    self.consume();
                    self.builder.disjunction();
                    last_was_atom = false;
                }
                '(' => {
                    self.parse_parentheses_begin()?;
                    last_was_atom = false;
                }
                ')' => {
                    self.parse_parentheses_end()?;
                    last_was_atom = true;
                }
                '^' => {
                    self.consume();
                    self.builder.assertion_bol();
                    last_was_atom = false;
                }
                '$' => {
                    self.consume();
                    self.builder.assertion_eol();
                    last_was_atom = false;
                }
                '.' => {
                    self.consume();
                    self.builder.atom_builtin_character_class(BuiltInClass::Newline, true);
                    last_was_atom = true;
                }
                '[' => {
                    self.parse_character_class()?;
                    last_was_atom = true;
                }
                '\\' => {
                    last_was_atom = self.parse_atom_escape()?;
                }
                '*' | '+' | '?' => {
                    self.consume();
                    let (min, max) = match ch {
                        '*' => (0, QUANTIFY_INFINITE),
                        '+' => (1, QUANTIFY_INFINITE),
                        _ => (0, 1),
                    };
                    self.parse_quantifier(last_was_atom, min, max)?;
                    last_was_atom = false;
                }
                '{' if self.try_parse_brace_quantifier(last_was_atom)? => {
                    last_was_atom = false;
                }
                _ => {
                    let ch = self.consume();
                    self.builder.atom_pattern_character(ch);
                    last_was_atom = true;
                }
            }
        }

        if self.depth > 0 {
            return Err(self.error(ErrorCode::MissingParentheses));
        }
        Ok(())
    }
}

fn parse_once(pattern: &[u16], flags: RegexFlags, backreference_limit: u32) -> Result<Pattern, RegexError> {
    let mut parser = Parser::new(pattern, flags, backreference_limit);
    parser.parse_tokens()?;
    Ok(parser.builder.finish())
}

// ============================================================================
// Optimizations
// ============================================================================

/// Mark a trailing `(?:...)*` of each body alternative as terminal. Only
/// done when the pattern has no capture groups at all.
fn check_for_terminal_parentheses(pattern: &mut Pattern) {
    if pattern.num_subpatterns > 0 {
        return;
    }
    for alternative in &mut pattern.body.alternatives {
        let Some(term) = alternative.terms.last_mut() else {
            continue;
        };
        let quantifier = term.quantifier;
        if let TermKind::ParenthesesSubpattern(p) = &mut term.kind {
            if quantifier.ty == QuantifierType::Greedy
                && quantifier.count == QUANTIFY_INFINITE
                && !p.capture
            {
                p.is_terminal = true;
                debug!("terminal parentheses");
            }
        }
    }
}

fn is_dot_star(pattern: &Pattern, term: &PatternTerm, allow_non_greedy: bool) -> bool {
    let TermKind::CharacterClass { class, invert } = term.kind else {
        return false;
    };
    let quantified = match term.quantifier.ty {
        QuantifierType::Greedy => true,
        QuantifierType::NonGreedy => allow_non_greedy,
        QuantifierType::FixedCount => false,
    };
    class == pattern.newline_class && invert && quantified && term.quantifier.count == QUANTIFY_INFINITE
}

/// `^?.*X.*$?` as the only body alternative becomes `X` followed by a
/// DotStarEnclosure that widens the match to the surrounding line.
fn optimize_dot_star_wrapped_expressions(pattern: &mut Pattern) {
    if pattern.body.alternatives.len() != 1 || pattern.num_subpatterns > 0 {
        return;
    }
    let terms = &pattern.body.alternatives[0].terms;
    if terms.len() < 3 {
        return;
    }

    let mut index = 0;
    let starts_with_bol = matches!(terms[0].kind, TermKind::AssertionBol);
    if starts_with_bol {
        index += 1;
    }
    if !is_dot_star(pattern, &terms[index], true) {
        return;
    }
    let first_expression_term = index + 1;

    index = terms.len() - 1;
    let ends_with_eol = matches!(terms[index].kind, TermKind::AssertionEol);
    if ends_with_eol {
        index -= 1;
    }
    if !is_dot_star(pattern, &terms[index], false) {
        return;
    }
    let Some(last_expression_term) = index.checked_sub(1) else {
        return;
    };
    if first_expression_term > last_expression_term {
        return;
    }

    let alternative = &mut pattern.body.alternatives[0];
    alternative.terms.truncate(last_expression_term + 1);
    alternative.terms.drain(..first_expression_term);
    alternative.terms.push(PatternTerm::new(TermKind::DotStarEnclosure {
        bol: starts_with_bol,
        eol: ends_with_eol,
    }));
    alternative.starts_with_bol = false;
    pattern.contains_bol = false;
    debug!(bol = starts_with_bol, eol = ends_with_eol, "dot-star enclosure");
}

fn copy_term(term: &PatternTerm, filter_starts_with_bol: bool) -> PatternTerm {
    let mut copy = term.clone();
    if let Some(p) = copy.parentheses_mut() {
        if let Some(filtered) = copy_disjunction(&p.disjunction, filter_starts_with_bol) {
            *p.disjunction = filtered;
        }
    }
    copy
}

fn copy_disjunction(disjunction: &PatternDisjunction, filter_starts_with_bol: bool) -> Option<PatternDisjunction> {
    let alternatives: Vec<PatternAlternative> = disjunction
        .alternatives
        .iter()
        .filter(|a| !filter_starts_with_bol || !a.starts_with_bol)
        .map(|a| PatternAlternative {
            terms: a.terms.iter().map(|t| copy_term(t, filter_starts_with_bol)).collect(),
            ..a.clone()
        })
        .collect();
    if alternatives.is_empty() {
        return None;
    }
    Some(PatternDisjunction {
        alternatives,
        ..PatternDisjunction::default()
    })
}

/// In single-line mode a leading `^` can only match at offset 0. Every
/// body alternative is tried only on the first start position; copies of
/// the alternatives that are not `^`-anchored keep the scan going.
fn optimize_bol(pattern: &mut Pattern) {
    if !pattern.contains_bol || pattern.multiline {
        return;
    }
    let loop_disjunction = copy_disjunction(&pattern.body, true);
    for alternative in &mut pattern.body.alternatives {
        alternative.once_through = true;
    }
    if let Some(loop_disjunction) = loop_disjunction {
        pattern.body.alternatives.extend(loop_disjunction.alternatives);
    }
    debug!(alternatives = pattern.body.alternatives.len(), "once-through body");
}

// ============================================================================
// Offsets
// ============================================================================

fn checked(a: usize, b: usize) -> Result<usize, RegexError> {
    a.checked_add(b)
        .filter(|&n| n <= u32::MAX as usize)
        .ok_or_else(|| RegexError::from(ErrorCode::PatternTooLarge))
}

fn setup_alternative_offsets(
    alternative: &mut PatternAlternative,
    mut call_frame_size: usize,
    initial_input_position: usize,
) -> Result<usize, RegexError> {
    alternative.has_fixed_size = true;
    let mut input_position = initial_input_position;

    for term in &mut alternative.terms {
        let quantifier = term.quantifier;
        match &mut term.kind {
            TermKind::AssertionBol | TermKind::AssertionEol | TermKind::AssertionWordBoundary { .. } => {
                term.input_position = input_position;
            }
            TermKind::BackReference(_) => {
                term.input_position = input_position;
                term.frame_location = call_frame_size;
                call_frame_size = checked(call_frame_size, FRAME_SIZE_BACK_REFERENCE)?;
                alternative.has_fixed_size = false;
            }
            TermKind::ForwardReference => {}
            TermKind::PatternCharacter(_) | TermKind::CharacterClass { .. } => {
                term.input_position = input_position;
                if quantifier.is_fixed() {
                    input_position = checked(input_position, quantifier.count as usize)?;
                } else {
                    term.frame_location = call_frame_size;
                    call_frame_size = checked(call_frame_size, FRAME_SIZE_PATTERN_CHARACTER)?;
                    alternative.has_fixed_size = false;
                }
            }
            TermKind::ParenthesesSubpattern(p) => {
                term.frame_location = call_frame_size;
                if quantifier.count == 1 && !p.is_copy {
                    if !quantifier.is_fixed() {
                        call_frame_size = checked(call_frame_size, FRAME_SIZE_PARENTHESES_ONCE)?;
                    }
                    call_frame_size =
                        setup_disjunction_offsets(&mut p.disjunction, false, call_frame_size, input_position)?;
                    if quantifier.is_fixed() {
                        input_position = checked(input_position, p.disjunction.minimum_size)?;
                    }
                    term.input_position = input_position;
                } else if p.is_terminal {
                    call_frame_size = checked(call_frame_size, FRAME_SIZE_PARENTHESES_TERMINAL)?;
                    call_frame_size =
                        setup_disjunction_offsets(&mut p.disjunction, false, call_frame_size, input_position)?;
                    term.input_position = input_position;
                } else {
                    term.input_position = input_position;
                    setup_disjunction_offsets(&mut p.disjunction, false, 0, input_position)?;
                    call_frame_size = checked(call_frame_size, FRAME_SIZE_PARENTHESES)?;
                }
                alternative.has_fixed_size = false;
            }
            TermKind::ParentheticalAssertion(p) => {
                term.input_position = input_position;
                term.frame_location = call_frame_size;
                call_frame_size = setup_disjunction_offsets(
                    &mut p.disjunction,
                    false,
                    checked(call_frame_size, FRAME_SIZE_PARENTHETICAL_ASSERTION)?,
                    input_position,
                )?;
            }
            TermKind::DotStarEnclosure { .. } => {
                alternative.has_fixed_size = false;
                term.input_position = initial_input_position;
            }
        }
    }

    alternative.minimum_size = input_position - initial_input_position;
    Ok(call_frame_size)
}

fn setup_disjunction_offsets(
    disjunction: &mut PatternDisjunction,
    is_body: bool,
    mut initial_call_frame_size: usize,
    initial_input_position: usize,
) -> Result<usize, RegexError> {
    if !is_body && disjunction.alternatives.len() > 1 {
        initial_call_frame_size = checked(initial_call_frame_size, FRAME_SIZE_ALTERNATIVE)?;
    }

    let mut minimum_size = usize::MAX;
    let mut maximum_call_frame_size = initial_call_frame_size;
    let mut has_fixed_size = true;

    for alternative in &mut disjunction.alternatives {
        let frame_size = setup_alternative_offsets(alternative, initial_call_frame_size, initial_input_position)?;
        minimum_size = minimum_size.min(alternative.minimum_size);
        maximum_call_frame_size = maximum_call_frame_size.max(frame_size);
        has_fixed_size &= alternative.has_fixed_size;
    }

    disjunction.has_fixed_size = has_fixed_size;
    disjunction.minimum_size = if minimum_size == usize::MAX { 0 } else { minimum_size };
    disjunction.call_frame_size = maximum_call_frame_size;
    Ok(maximum_call_frame_size)
}

/// Compute minimum sizes, input positions and frame locations for the
/// whole tree.
pub fn setup_offsets(pattern: &mut Pattern) -> Result<(), RegexError> {
    setup_disjunction_offsets(&mut pattern.body, true, 0, 0)?;
    Ok(())
}

// ============================================================================
// Entry Points
// ============================================================================

/// Parse a pattern given as UTF-16 code units.
pub fn parse_utf16(pattern: &[u16], flags: RegexFlags) -> Result<Pattern, RegexError> {
    if pattern.len() > MAX_PATTERN_SIZE {
        return Err(RegexError::syntax(ErrorCode::PatternTooLarge, 0));
    }

    let mut tree = parse_once(pattern, flags, u32::MAX)?;
    // Decimal escapes past the last group are octal or identity escapes;
    // now that the group count is known, parse again with that limit.
    if tree.max_back_reference > tree.num_subpatterns {
        let limit = u32::try_from(tree.num_subpatterns).unwrap_or(u32::MAX);
        tree = parse_once(pattern, flags, limit)?;
    }

    check_for_terminal_parentheses(&mut tree);
    optimize_dot_star_wrapped_expressions(&mut tree);
    optimize_bol(&mut tree);
    setup_offsets(&mut tree)?;

    debug!(
        subpatterns = tree.num_subpatterns,
        frame_size = tree.body.call_frame_size,
        minimum_size = tree.body.minimum_size,
        "parsed pattern"
    );
    Ok(tree)
}

/// Parse a pattern into a syntax tree ready for the byte compiler.
pub fn parse(pattern: &str, flags: RegexFlags) -> Result<Pattern, RegexError> {
    let units: Vec<u16> = pattern.encode_utf16().collect();
    parse_utf16(&units, flags)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(pattern: &str) -> Pattern {
        parse(pattern, RegexFlags::empty()).unwrap()
    }

    fn err(pattern: &str) -> ErrorCode {
        match parse(pattern, RegexFlags::empty()) {
            Err(RegexError::Syntax { code, .. }) => code,
            other => panic!("expected syntax error for {:?}, got {:?}", pattern, other),
        }
    }

    fn body_terms(pattern: &Pattern) -> &[PatternTerm] {
        &pattern.body.alternatives[0].terms
    }

    #[test]
    fn literal_characters() {
        let pattern = p("abc");
        let terms = body_terms(&pattern);
        assert_eq!(terms.len(), 3);
        assert!(matches!(terms[1].kind, TermKind::PatternCharacter(c) if c == 'b' as u32));
        assert_eq!(pattern.body.minimum_size, 3);
        assert!(pattern.body.has_fixed_size);
        assert_eq!(terms[2].input_position, 2);
    }

    #[test]
    fn alternatives_and_groups() {
        let pattern = p("a|(b)(?:c)");
        assert_eq!(pattern.body.alternatives.len(), 2);
        assert_eq!(pattern.num_subpatterns, 1);
        let terms = &pattern.body.alternatives[1].terms;
        let first = terms[0].parentheses().unwrap();
        assert!(first.capture);
        assert_eq!(first.subpattern_id, 1);
        let second = terms[1].parentheses().unwrap();
        assert!(!second.capture);
        assert_eq!(second.subpattern_id, 2);
    }

    #[test]
    fn quantifier_splitting() {
        let pattern = p("a{2,5}");
        let terms = body_terms(&pattern);
        assert_eq!(terms.len(), 2);
        assert_eq!(terms[0].quantifier, Quantifier::new(QuantifierType::FixedCount, 2));
        assert_eq!(terms[1].quantifier, Quantifier::new(QuantifierType::Greedy, 3));

        let pattern = p("(a){1,}?");
        let terms = body_terms(&pattern);
        assert_eq!(terms[1].quantifier, Quantifier::new(QuantifierType::NonGreedy, QUANTIFY_INFINITE));
        assert!(terms[1].parentheses().unwrap().is_copy);
        assert!(!terms[0].parentheses().unwrap().is_copy);
    }

    #[test]
    fn zero_quantifier_removes_atom() {
        let pattern = p("ab{0}c");
        assert_eq!(body_terms(&pattern).len(), 2);
    }

    #[test]
    fn optional_assertion_is_removed() {
        let pattern = p("(?=a)?b");
        assert_eq!(body_terms(&pattern).len(), 1);
        let pattern = p("(?=a){3}b");
        let terms = body_terms(&pattern);
        assert_eq!(terms.len(), 2);
        assert!(terms[0].quantifier.is_fixed());
        assert_eq!(terms[0].quantifier.count, 1);
    }

    #[test]
    fn invalid_brace_is_literal() {
        let pattern = p("a{,3}");
        assert_eq!(body_terms(&pattern).len(), 5);
        let pattern = p("{");
        assert!(matches!(body_terms(&pattern)[0].kind, TermKind::PatternCharacter(c) if c == '{' as u32));
    }

    #[test]
    fn back_references() {
        let pattern = p("(a)\\1");
        assert!(matches!(body_terms(&pattern)[1].kind, TermKind::BackReference(1)));

        // Still open: a forward reference.
        let pattern = p("(a\\1)");
        let inner = &body_terms(&pattern)[0].parentheses().unwrap().disjunction;
        assert!(matches!(inner.alternatives[0].terms[1].kind, TermKind::ForwardReference));

        // Past the group count: reparsed as octal.
        let pattern = p("(a)\\2");
        assert!(matches!(body_terms(&pattern)[1].kind, TermKind::PatternCharacter(2)));

        // "\8" is a literal backslash followed by '8'.
        let pattern = p("\\8");
        let terms = body_terms(&pattern);
        assert_eq!(terms.len(), 2);
        assert!(matches!(terms[0].kind, TermKind::PatternCharacter(c) if c == '\\' as u32));
    }

    #[test]
    fn escapes() {
        let cases: &[(&str, u32)] = &[
            ("\\n", 0x0a),
            ("\\t", 0x09),
            ("\\v", 0x0b),
            ("\\0", 0),
            ("\\x41", 0x41),
            ("\\u00e9", 0xe9),
            ("\\xZ", 'x' as u32),
            ("\\cJ", 0x0a),
            ("\\101", 0x41),
            ("\\/", '/' as u32),
        ];
        for &(src, expected) in cases {
            let pattern = p(src);
            match body_terms(&pattern)[0].kind {
                TermKind::PatternCharacter(c) => assert_eq!(c, expected, "{}", src),
                ref other => panic!("{}: {:?}", src, other),
            }
        }
        let pattern = p("\\c1");
        assert_eq!(body_terms(&pattern).len(), 3);
    }

    #[test]
    fn character_classes() {
        let pattern = p("[a-c\\d_]");
        let TermKind::CharacterClass { class, invert } = body_terms(&pattern)[0].kind else {
            panic!("expected a class");
        };
        assert!(!invert);
        let class = &pattern.classes[class.0];
        assert!(class.contains('b' as u32));
        assert!(class.contains('7' as u32));
        assert!(class.contains('_' as u32));
        assert!(!class.contains('d' as u32));

        let pattern = p("[^\\s]");
        assert!(matches!(body_terms(&pattern)[0].kind, TermKind::CharacterClass { invert: true, .. }));

        // Builtin then hyphen: the hyphen is literal.
        let pattern = p("[\\d-z]");
        let TermKind::CharacterClass { class, .. } = body_terms(&pattern)[0].kind else {
            panic!("expected a class");
        };
        let class = &pattern.classes[class.0];
        assert!(class.contains('-' as u32));
        assert!(class.contains('z' as u32));
        assert!(!class.contains('y' as u32));

        let pattern = p("[a-]");
        let TermKind::CharacterClass { class, .. } = body_terms(&pattern)[0].kind else {
            panic!("expected a class");
        };
        assert!(pattern.classes[class.0].contains('-' as u32));

        let pattern = p("[\\b]");
        let TermKind::CharacterClass { class, .. } = body_terms(&pattern)[0].kind else {
            panic!("expected a class");
        };
        assert!(pattern.classes[class.0].contains(0x08));
    }

    #[test]
    fn ignore_case_classes() {
        let pattern = parse("[a-c]\u{e9}", RegexFlags::IGNORE_CASE).unwrap();
        let terms = body_terms(&pattern);
        let TermKind::CharacterClass { class, .. } = terms[0].kind else {
            panic!("expected a class");
        };
        assert!(pattern.classes[class.0].contains('B' as u32));
        let TermKind::CharacterClass { class, .. } = terms[1].kind else {
            panic!("non-ASCII letters become classes");
        };
        assert!(pattern.classes[class.0].contains(0xc9));
    }

    #[test]
    fn syntax_errors() {
        assert_eq!(err("a{3,2}"), ErrorCode::QuantifierOutOfOrder);
        assert_eq!(err("*a"), ErrorCode::QuantifierWithoutAtom);
        assert_eq!(err("a|*"), ErrorCode::QuantifierWithoutAtom);
        assert_eq!(err("^*"), ErrorCode::QuantifierWithoutAtom);
        assert_eq!(err("\\b+"), ErrorCode::QuantifierWithoutAtom);
        assert_eq!(err("a{4294967295}"), ErrorCode::QuantifierTooLarge);
        assert_eq!(err("(a"), ErrorCode::MissingParentheses);
        assert_eq!(err("a)"), ErrorCode::ParenthesesUnmatched);
        assert_eq!(err("(?<a)"), ErrorCode::ParenthesesTypeInvalid);
        assert_eq!(err("(?"), ErrorCode::ParenthesesTypeInvalid);
        assert_eq!(err("[a"), ErrorCode::CharacterClassUnmatched);
        assert_eq!(err("[z-a]"), ErrorCode::CharacterClassOutOfOrder);
        assert_eq!(err("a\\"), ErrorCode::EscapeUnterminated);
    }

    #[test]
    fn error_offsets() {
        match parse("ab)", RegexFlags::empty()) {
            Err(RegexError::Syntax { offset, .. }) => assert_eq!(offset, 3),
            other => panic!("{:?}", other),
        }
    }

    #[test]
    fn nesting_limit() {
        let deep = "(".repeat(DEFAULT_PARSE_DEPTH_LIMIT as usize + 1);
        assert_eq!(err(&deep), ErrorCode::PatternTooLarge);
    }

    #[test]
    fn terminal_parentheses() {
        let pattern = p("a(?:bc)*");
        let paren = body_terms(&pattern)[1].parentheses().unwrap();
        assert!(paren.is_terminal);

        // Not with captures anywhere in the pattern.
        let pattern = p("(a)(?:bc)*");
        assert!(!body_terms(&pattern)[1].parentheses().unwrap().is_terminal);
    }

    #[test]
    fn dot_star_enclosure() {
        let pattern = p("^.*abc.*$");
        let terms = body_terms(&pattern);
        assert_eq!(terms.len(), 4);
        assert!(matches!(
            terms[3].kind,
            TermKind::DotStarEnclosure { bol: true, eol: true }
        ));
        assert!(!pattern.contains_bol);

        // Bounded or capturing forms are left alone.
        assert_eq!(body_terms(&p(".{0,5}a.*")).len(), 3);
        assert_eq!(body_terms(&p(".*(a).*")).len(), 3);
        assert_eq!(p(".*a.*|b").body.alternatives.len(), 2);
    }

    #[test]
    fn bol_optimization() {
        let pattern = p("^a|b");
        let alternatives = &pattern.body.alternatives;
        assert_eq!(alternatives.len(), 3);
        assert!(alternatives[0].once_through && alternatives[1].once_through);
        assert!(!alternatives[2].once_through);
        assert!(matches!(alternatives[2].terms[0].kind, TermKind::PatternCharacter(c) if c == 'b' as u32));

        let pattern = parse("^a|b", RegexFlags::MULTILINE).unwrap();
        assert_eq!(pattern.body.alternatives.len(), 2);
        assert!(!pattern.body.alternatives[0].once_through);

        // A skippable group does not anchor the alternative.
        let pattern = p("(?:^a)*b");
        assert!(!pattern.body.alternatives[0].starts_with_bol);
        assert_eq!(pattern.body.alternatives.len(), 2);
    }

    #[test]
    fn offsets_and_frames() {
        let pattern = p("a*b(c|d)\\1");
        let terms = body_terms(&pattern);
        // a* owns one slot, the group's alternatives one, the back-reference two.
        assert_eq!(terms[0].frame_location, 0);
        assert_eq!(terms[0].input_position, 0);
        assert_eq!(terms[1].input_position, 0);
        assert_eq!(terms[2].frame_location, 1);
        assert_eq!(terms[2].input_position, 2);
        assert_eq!(terms[3].frame_location, 2);
        assert_eq!(pattern.body.call_frame_size, 4);
        assert_eq!(pattern.body.minimum_size, 2);
        assert!(!pattern.body.has_fixed_size);
    }

    #[test]
    fn generic_parentheses_frames() {
        let pattern = p("x(ab)+");
        let terms = body_terms(&pattern);
        assert_eq!(terms.len(), 3);
        let generic = terms[2].parentheses().unwrap();
        assert!(generic.is_copy);
        assert_eq!(terms[2].frame_location, 0);
        assert_eq!(generic.disjunction.minimum_size, 2);
        assert_eq!(pattern.body.call_frame_size, FRAME_SIZE_PARENTHESES);
    }

    #[test]
    fn pattern_size_overflow() {
        assert!(matches!(
            parse("a{4294967294}a{4294967294}", RegexFlags::empty()),
            Err(RegexError::Syntax { code: ErrorCode::PatternTooLarge, .. })
        ));
    }
}
