// regparse_types.rs - Syntax tree types.
// Character classes, terms, alternatives, disjunctions and the Pattern that
// the parser builds and the byte compiler consumes.

use crate::regdefs::RegexFlags;
use crate::regint::Quantifier;
use crate::unicode::{self, MAX_CODE_UNIT};

// === Character Classes ===

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharacterRange {
    pub begin: u32,
    pub end: u32,
}

/// A set of code units. Units below 0x80 live in `matches`/`ranges`, the rest
/// in the `*_unicode` tables. All tables are sorted and non-overlapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CharacterClass {
    pub matches: Vec<u32>,
    pub ranges: Vec<CharacterRange>,
    pub matches_unicode: Vec<u32>,
    pub ranges_unicode: Vec<CharacterRange>,
}

impl CharacterClass {
    pub fn from_ranges(ranges: &[(u32, u32)]) -> Self {
        let mut builder = CharacterClassBuilder::new(false);
        builder.append(ranges);
        builder.build()
    }

    pub fn contains(&self, ch: u32) -> bool {
        let (matches, ranges) = if ch & !0x7f != 0 {
            (&self.matches_unicode, &self.ranges_unicode)
        } else {
            (&self.matches, &self.ranges)
        };
        matches.binary_search(&ch).is_ok() || range_lookup(ranges, ch)
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
            && self.ranges.is_empty()
            && self.matches_unicode.is_empty()
            && self.ranges_unicode.is_empty()
    }
}

fn range_lookup(ranges: &[CharacterRange], ch: u32) -> bool {
    ranges
        .binary_search_by(|r| {
            if r.end < ch {
                std::cmp::Ordering::Less
            } else if r.begin > ch {
                std::cmp::Ordering::Greater
            } else {
                std::cmp::Ordering::Equal
            }
        })
        .is_ok()
}

/// Accumulates characters and ranges, then normalizes them into a
/// [`CharacterClass`]. Under ignore-case every added unit brings its case
/// variants along; built-in classes are appended verbatim.
#[derive(Debug, Default)]
pub struct CharacterClassBuilder {
    ignore_case: bool,
    ranges: Vec<(u32, u32)>,
}

impl CharacterClassBuilder {
    pub fn new(ignore_case: bool) -> Self {
        CharacterClassBuilder {
            ignore_case,
            ranges: Vec::new(),
        }
    }

    pub fn put_char(&mut self, ch: u32) {
        if self.ignore_case {
            for v in unicode::case_variants(ch) {
                self.ranges.push((v, v));
            }
        } else {
            self.ranges.push((ch, ch));
        }
    }

    pub fn put_range(&mut self, lo: u32, hi: u32) {
        self.ranges.push((lo, hi));
        if !self.ignore_case {
            return;
        }
        for ch in lo..=hi.min(MAX_CODE_UNIT) {
            for v in unicode::case_variants(ch) {
                if v < lo || v > hi {
                    self.ranges.push((v, v));
                }
            }
        }
    }

    pub fn append(&mut self, ranges: &[(u32, u32)]) {
        self.ranges.extend_from_slice(ranges);
    }

    /// Append the complement of `ranges` (which must be sorted) within the code-unit space.
    pub fn append_inverted(&mut self, ranges: &[(u32, u32)]) {
        let mut next = 0u32;
        for &(lo, hi) in ranges {
            if lo > next {
                self.ranges.push((next, lo - 1));
            }
            next = hi + 1;
        }
        if next <= MAX_CODE_UNIT {
            self.ranges.push((next, MAX_CODE_UNIT));
        }
    }

    pub fn build(mut self) -> CharacterClass {
        self.ranges.sort_unstable();
        let mut merged: Vec<(u32, u32)> = Vec::with_capacity(self.ranges.len());
        for (lo, hi) in self.ranges {
            match merged.last_mut() {
                Some(last) if lo <= last.1.saturating_add(1) => last.1 = last.1.max(hi),
                _ => merged.push((lo, hi)),
            }
        }

        let mut class = CharacterClass::default();
        for (lo, hi) in merged {
            if hi < 0x80 {
                push_part(&mut class.matches, &mut class.ranges, lo, hi);
            } else if lo >= 0x80 {
                push_part(&mut class.matches_unicode, &mut class.ranges_unicode, lo, hi);
            } else {
                push_part(&mut class.matches, &mut class.ranges, lo, 0x7f);
                push_part(&mut class.matches_unicode, &mut class.ranges_unicode, 0x80, hi);
            }
        }
        class
    }
}

fn push_part(matches: &mut Vec<u32>, ranges: &mut Vec<CharacterRange>, lo: u32, hi: u32) {
    if lo == hi {
        matches.push(lo);
    } else {
        ranges.push(CharacterRange { begin: lo, end: hi });
    }
}

/// Index of a class in [`Pattern::classes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltInClass {
    Digit,
    Space,
    Word,
    Newline,
}

impl BuiltInClass {
    pub fn ranges(self) -> &'static [(u32, u32)] {
        match self {
            BuiltInClass::Digit => unicode::DIGIT_RANGES,
            BuiltInClass::Space => unicode::SPACE_RANGES,
            BuiltInClass::Word => unicode::WORDCHAR_RANGES,
            BuiltInClass::Newline => unicode::NEWLINE_RANGES,
        }
    }
}

// === Terms ===

#[derive(Debug, Clone)]
pub struct Parentheses {
    pub disjunction: Box<PatternDisjunction>,
    /// First subpattern id allocated inside (or by) this group.
    pub subpattern_id: usize,
    /// Last subpattern id allocated inside this group.
    pub last_subpattern_id: usize,
    pub capture: bool,
    pub invert: bool,
    /// Set on the trailing copy produced when `{min,max}` is split.
    pub is_copy: bool,
    pub is_terminal: bool,
}

#[derive(Debug, Clone)]
pub enum TermKind {
    AssertionBol,
    AssertionEol,
    AssertionWordBoundary { invert: bool },
    PatternCharacter(u32),
    CharacterClass { class: ClassId, invert: bool },
    BackReference(usize),
    ForwardReference,
    ParenthesesSubpattern(Parentheses),
    ParentheticalAssertion(Parentheses),
    DotStarEnclosure { bol: bool, eol: bool },
}

#[derive(Debug, Clone)]
pub struct PatternTerm {
    pub kind: TermKind,
    pub quantifier: Quantifier,
    pub input_position: usize,
    pub frame_location: usize,
}

impl PatternTerm {
    pub fn new(kind: TermKind) -> Self {
        PatternTerm {
            kind,
            quantifier: Quantifier::ONCE,
            input_position: 0,
            frame_location: 0,
        }
    }

    pub fn parentheses(&self) -> Option<&Parentheses> {
        match &self.kind {
            TermKind::ParenthesesSubpattern(p) | TermKind::ParentheticalAssertion(p) => Some(p),
            _ => None,
        }
    }

    pub fn parentheses_mut(&mut self) -> Option<&mut Parentheses> {
        match &mut self.kind {
            TermKind::ParenthesesSubpattern(p) | TermKind::ParentheticalAssertion(p) => Some(p),
            _ => None,
        }
    }

    pub fn is_assertion(&self) -> bool {
        matches!(
            self.kind,
            TermKind::AssertionBol | TermKind::AssertionEol | TermKind::AssertionWordBoundary { .. }
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct PatternAlternative {
    pub terms: Vec<PatternTerm>,
    pub minimum_size: usize,
    pub has_fixed_size: bool,
    pub once_through: bool,
    pub starts_with_bol: bool,
    pub contains_bol: bool,
}

#[derive(Debug, Clone, Default)]
pub struct PatternDisjunction {
    pub alternatives: Vec<PatternAlternative>,
    pub minimum_size: usize,
    pub has_fixed_size: bool,
    pub call_frame_size: usize,
}

impl PatternDisjunction {
    /// A disjunction holding one empty alternative.
    pub fn new() -> Self {
        PatternDisjunction {
            alternatives: vec![PatternAlternative::default()],
            ..Default::default()
        }
    }
}

// === Pattern ===

/// A parsed regular expression.
#[derive(Debug, Clone)]
pub struct Pattern {
    pub body: PatternDisjunction,
    pub ignore_case: bool,
    pub multiline: bool,
    pub contains_bol: bool,
    pub num_subpatterns: usize,
    pub max_back_reference: usize,
    pub classes: Vec<CharacterClass>,
    pub newline_class: ClassId,
    pub digits_class: ClassId,
    pub spaces_class: ClassId,
    pub wordchar_class: ClassId,
}

impl Pattern {
    pub fn new(flags: RegexFlags) -> Self {
        let mut pattern = Pattern {
            body: PatternDisjunction::new(),
            ignore_case: flags.contains(RegexFlags::IGNORE_CASE),
            multiline: flags.contains(RegexFlags::MULTILINE),
            contains_bol: false,
            num_subpatterns: 0,
            max_back_reference: 0,
            classes: Vec::new(),
            newline_class: ClassId(0),
            digits_class: ClassId(0),
            spaces_class: ClassId(0),
            wordchar_class: ClassId(0),
        };
        pattern.newline_class = pattern.add_class(CharacterClass::from_ranges(unicode::NEWLINE_RANGES));
        pattern.digits_class = pattern.add_class(CharacterClass::from_ranges(unicode::DIGIT_RANGES));
        pattern.spaces_class = pattern.add_class(CharacterClass::from_ranges(unicode::SPACE_RANGES));
        pattern.wordchar_class = pattern.add_class(CharacterClass::from_ranges(unicode::WORDCHAR_RANGES));
        pattern
    }

    pub fn add_class(&mut self, class: CharacterClass) -> ClassId {
        self.classes.push(class);
        ClassId(self.classes.len() - 1)
    }

    pub fn builtin_class(&self, class: BuiltInClass) -> ClassId {
        match class {
            BuiltInClass::Digit => self.digits_class,
            BuiltInClass::Space => self.spaces_class,
            BuiltInClass::Word => self.wordchar_class,
            BuiltInClass::Newline => self.newline_class,
        }
    }

    pub fn flags(&self) -> RegexFlags {
        let mut flags = RegexFlags::empty();
        flags.set(RegexFlags::IGNORE_CASE, self.ignore_case);
        flags.set(RegexFlags::MULTILINE, self.multiline);
        flags
    }
}
