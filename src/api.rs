// api.rs - Idiomatic Rust API for yarrow.
//
// Wraps the parse → byte_compile → interpret pipeline with Rust-native
// types: Regex, RegexBuilder, Match, Captures, FindIter. Offsets exposed
// here are byte offsets into the `&str` that was searched.

use std::borrow::Cow;
use std::ops::Range;

use tracing::debug;

use crate::error::RegexError;
use crate::regcomp::byte_compile;
use crate::regdefs::{MatchResult, RegexFlags, OFFSET_NO_MATCH};
use crate::regenc::Input;
use crate::regexec::{interpret_with, MatchParam};
use crate::regint::BytecodePattern;
use crate::regparse::parse;

/// A compiled regular expression.
///
/// # Examples
///
/// ```
/// use yarrow::api::Regex;
///
/// let re = Regex::new(r"\d+").unwrap();
/// assert!(re.is_match("hello 42"));
///
/// let m = re.find("hello 42").unwrap();
/// assert_eq!(m.as_str(), "42");
/// assert_eq!(m.start(), 6);
/// assert_eq!(m.end(), 8);
/// ```
#[derive(Clone)]
pub struct Regex {
    bytecode: BytecodePattern,
    match_limit: Option<u32>,
    arena_limit: Option<usize>,
}

impl Regex {
    /// Compile a pattern with default flags.
    pub fn new(pattern: &str) -> Result<Regex, RegexError> {
        RegexBuilder::new(pattern).build()
    }

    /// Create a [`RegexBuilder`] for fine-grained control over compilation.
    pub fn builder(pattern: &str) -> RegexBuilder {
        RegexBuilder::new(pattern)
    }

    /// Return the first match in `text`, or `None` if no match.
    ///
    /// A search that runs into the match limit also yields `None`; use
    /// [`Regex::try_find_at`] to tell the two apart.
    pub fn find<'t>(&self, text: &'t str) -> Option<Match<'t>> {
        self.find_at(text, 0)
    }

    /// Return the first match starting at or after byte offset `start`.
    pub fn find_at<'t>(&self, text: &'t str, start: usize) -> Option<Match<'t>> {
        self.try_find_at(text, start).ok().flatten()
    }

    /// Like [`Regex::find_at`], but surfaces match-limit and memory errors.
    pub fn try_find_at<'t>(&self, text: &'t str, start: usize) -> Result<Option<Match<'t>>, RegexError> {
        if start > text.len() {
            return Ok(None);
        }
        let subject = Subject::encode(text);
        let mut output = self.bytecode.new_output();
        if !self.search(subject.input(), subject.unit_offset(start), &mut output)? {
            return Ok(None);
        }
        Ok(Some(Match {
            text,
            start: subject.byte_offset(output[0]),
            end: subject.byte_offset(output[1]),
        }))
    }

    /// Check whether `text` matches the pattern anywhere.
    pub fn is_match(&self, text: &str) -> bool {
        self.find(text).is_some()
    }

    /// Return the first match with all capture groups, or `None`.
    pub fn captures<'t>(&self, text: &'t str) -> Option<Captures<'t>> {
        self.try_captures(text).ok().flatten()
    }

    /// Like [`Regex::captures`], but surfaces match-limit and memory errors.
    pub fn try_captures<'t>(&self, text: &'t str) -> Result<Option<Captures<'t>>, RegexError> {
        let subject = Subject::encode(text);
        let mut output = self.bytecode.new_output();
        if !self.search(subject.input(), 0, &mut output)? {
            return Ok(None);
        }
        Ok(Some(Captures::from_output(text, &subject, &output)))
    }

    /// Iterate over all non-overlapping matches in `text`.
    pub fn find_iter<'r, 't>(&'r self, text: &'t str) -> FindIter<'r, 't> {
        FindIter {
            regex: self,
            text,
            subject: Subject::encode(text),
            last_end: 0,
            done: false,
        }
    }

    /// Search raw UTF-16 code units from unit offset `start`. The returned
    /// range is in code units.
    pub fn find_utf16(&self, units: &[u16], start: usize) -> Result<Option<Range<usize>>, RegexError> {
        let mut output = self.bytecode.new_output();
        if !self.search(Input::Wide(units), start, &mut output)? {
            return Ok(None);
        }
        Ok(Some(output[0]..output[1]))
    }

    /// Return the number of capture groups in the pattern (excluding group 0).
    pub fn captures_len(&self) -> usize {
        self.bytecode.num_subpatterns
    }

    /// Access the compiled program for use with [`crate::regexec`] directly.
    pub fn as_bytecode(&self) -> &BytecodePattern {
        &self.bytecode
    }

    fn match_param(&self) -> MatchParam {
        let mut param = MatchParam::default();
        if let Some(n) = self.match_limit {
            param.match_limit = n;
        }
        if let Some(n) = self.arena_limit {
            param.arena_limit = n;
        }
        param
    }

    fn search(&self, input: Input<'_>, start: usize, output: &mut [usize]) -> Result<bool, RegexError> {
        match interpret_with(&self.bytecode, input, start, output, &self.match_param()) {
            MatchResult::Match => Ok(true),
            MatchResult::NoMatch => Ok(false),
            MatchResult::ErrorHitLimit => Err(RegexError::HitLimit),
            MatchResult::ErrorNoMemory => Err(RegexError::Memory),
        }
    }
}

impl std::fmt::Debug for Regex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Regex")
            .field("captures_len", &self.captures_len())
            .finish_non_exhaustive()
    }
}

// === RegexBuilder ===

/// Builder for compiling a [`Regex`] with custom options.
///
/// # Examples
///
/// ```
/// use yarrow::api::Regex;
///
/// let re = Regex::builder(r"hello world")
///     .case_insensitive(true)
///     .build()
///     .unwrap();
/// assert!(re.is_match("Hello World"));
/// ```
#[derive(Debug, Clone)]
pub struct RegexBuilder {
    pattern: String,
    flags: RegexFlags,
    match_limit: Option<u32>,
    arena_limit: Option<usize>,
}

impl RegexBuilder {
    /// Create a new builder for the given pattern.
    pub fn new(pattern: &str) -> Self {
        RegexBuilder {
            pattern: pattern.to_string(),
            flags: RegexFlags::empty(),
            match_limit: None,
            arena_limit: None,
        }
    }

    /// Enable or disable case-insensitive matching (`i`).
    pub fn case_insensitive(mut self, yes: bool) -> Self {
        self.flags.set(RegexFlags::IGNORE_CASE, yes);
        self
    }

    /// Enable or disable `^`/`$` matching at every line boundary (`m`).
    pub fn multiline(mut self, yes: bool) -> Self {
        self.flags.set(RegexFlags::MULTILINE, yes);
        self
    }

    /// Override the process-wide match limit for this regex.
    pub fn match_limit(mut self, n: u32) -> Self {
        self.match_limit = Some(n);
        self
    }

    /// Override the process-wide backtrack arena limit (in slots) for this regex.
    pub fn arena_limit(mut self, n: usize) -> Self {
        self.arena_limit = Some(n);
        self
    }

    /// Compile the pattern into a [`Regex`].
    pub fn build(self) -> Result<Regex, RegexError> {
        let tree = parse(&self.pattern, self.flags)?;
        let bytecode = byte_compile(&tree)?;
        debug!(pattern = %self.pattern, flags = ?self.flags, "regex built");
        Ok(Regex {
            bytecode,
            match_limit: self.match_limit,
            arena_limit: self.arena_limit,
        })
    }
}

// === Subject ===

/// A `&str` re-encoded into interpreter code units, with the map back to
/// byte offsets.
#[derive(Debug)]
struct Subject<'t> {
    units: Units<'t>,
    /// Byte offset of the char holding each code unit, plus the text
    /// length. `None` when units and bytes coincide (ASCII).
    byte_offsets: Option<Vec<usize>>,
    byte_len: usize,
}

#[derive(Debug)]
enum Units<'t> {
    Narrow(Cow<'t, [u8]>),
    Wide(Vec<u16>),
}

impl<'t> Subject<'t> {
    fn encode(text: &'t str) -> Self {
        if text.is_ascii() {
            return Subject {
                units: Units::Narrow(Cow::Borrowed(text.as_bytes())),
                byte_offsets: None,
                byte_len: text.len(),
            };
        }

        let mut byte_offsets = Vec::with_capacity(text.len() + 1);
        let units = if text.chars().all(|c| (c as u32) <= 0xFF) {
            let mut narrow = Vec::with_capacity(text.len());
            for (i, c) in text.char_indices() {
                narrow.push(c as u32 as u8);
                byte_offsets.push(i);
            }
            Units::Narrow(Cow::Owned(narrow))
        } else {
            let mut wide = Vec::with_capacity(text.len());
            let mut buf = [0u16; 2];
            for (i, c) in text.char_indices() {
                for &unit in c.encode_utf16(&mut buf).iter() {
                    wide.push(unit);
                    byte_offsets.push(i);
                }
            }
            Units::Wide(wide)
        };
        byte_offsets.push(text.len());

        Subject {
            units,
            byte_offsets: Some(byte_offsets),
            byte_len: text.len(),
        }
    }

    fn input(&self) -> Input<'_> {
        match &self.units {
            Units::Narrow(units) => Input::Narrow(&units[..]),
            Units::Wide(units) => Input::Wide(&units[..]),
        }
    }

    fn unit_len(&self) -> usize {
        match &self.units {
            Units::Narrow(units) => units.len(),
            Units::Wide(units) => units.len(),
        }
    }

    /// Byte offset of code unit `unit`. A unit inside a surrogate pair maps
    /// to the start of its char.
    fn byte_offset(&self, unit: usize) -> usize {
        match &self.byte_offsets {
            None => unit,
            Some(offsets) => offsets[unit],
        }
    }

    /// First code unit at or after byte offset `byte`.
    fn unit_offset(&self, byte: usize) -> usize {
        match &self.byte_offsets {
            None => byte,
            Some(offsets) => offsets.partition_point(|&b| b < byte),
        }
    }

    /// Code unit where the char after the one at `unit` begins.
    fn next_char(&self, unit: usize) -> usize {
        match &self.byte_offsets {
            None => unit + 1,
            Some(offsets) => {
                let mut next = unit + 1;
                while next < self.unit_len() && offsets[next] == offsets[unit] {
                    next += 1;
                }
                next
            }
        }
    }
}

// === Match ===

/// A single match result referencing the original text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match<'t> {
    text: &'t str,
    start: usize,
    end: usize,
}

impl<'t> Match<'t> {
    /// Byte offset of the start of the match.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Byte offset of the end of the match (exclusive).
    pub fn end(&self) -> usize {
        self.end
    }

    /// Byte range of the match.
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// The matched text.
    pub fn as_str(&self) -> &'t str {
        &self.text[self.start..self.end]
    }

    /// Returns the length of the match in bytes.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Returns `true` if the match is empty (zero-length).
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

// === Captures ===

/// All capture groups from a single match.
///
/// Group 0 is the entire match. Groups 1..N correspond to `(...)` in the pattern.
pub struct Captures<'t> {
    text: &'t str,
    spans: Vec<Option<(usize, usize)>>,
}

impl<'t> Captures<'t> {
    fn from_output(text: &'t str, subject: &Subject<'_>, output: &[usize]) -> Self {
        let spans = output
            .chunks_exact(2)
            .map(|pair| {
                if pair[0] == OFFSET_NO_MATCH || pair[1] == OFFSET_NO_MATCH {
                    None
                } else {
                    Some((subject.byte_offset(pair[0]), subject.byte_offset(pair[1])))
                }
            })
            .collect();
        Captures { text, spans }
    }

    /// Get capture group `i`, or `None` if the group did not participate.
    ///
    /// Group 0 is the entire match.
    pub fn get(&self, i: usize) -> Option<Match<'t>> {
        let (start, end) = (*self.spans.get(i)?)?;
        Some(Match {
            text: self.text,
            start,
            end,
        })
    }

    /// Number of capture groups (including group 0).
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    /// Returns `true` if there are no capture groups (should never happen for a valid match).
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Iterate over all capture groups.
    pub fn iter(&self) -> CapturesIter<'_, 't> {
        CapturesIter {
            captures: self,
            index: 0,
        }
    }
}

impl std::fmt::Debug for Captures<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut list = f.debug_list();
        for i in 0..self.len() {
            list.entry(&self.get(i).map(|m| m.as_str()));
        }
        list.finish()
    }
}

// === CapturesIter ===

/// Iterator over capture groups in a [`Captures`].
pub struct CapturesIter<'c, 't> {
    captures: &'c Captures<'t>,
    index: usize,
}

impl<'c, 't> Iterator for CapturesIter<'c, 't> {
    type Item = Option<Match<'t>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.captures.len() {
            return None;
        }
        let m = self.captures.get(self.index);
        self.index += 1;
        Some(m)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.captures.len() - self.index;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for CapturesIter<'_, '_> {}

// === FindIter ===

/// Iterator over all non-overlapping matches in a text.
///
/// After an empty match the next search starts one character further on.
/// Iteration stops at the first match-limit or memory error.
pub struct FindIter<'r, 't> {
    regex: &'r Regex,
    text: &'t str,
    subject: Subject<'t>,
    /// Code-unit offset where the next search starts.
    last_end: usize,
    done: bool,
}

impl<'r, 't> Iterator for FindIter<'r, 't> {
    type Item = Match<'t>;

    fn next(&mut self) -> Option<Match<'t>> {
        if self.done || self.last_end > self.subject.unit_len() {
            return None;
        }

        let mut output = self.regex.bytecode.new_output();
        match self.regex.search(self.subject.input(), self.last_end, &mut output) {
            Ok(true) => {}
            Ok(false) | Err(_) => {
                self.done = true;
                return None;
            }
        }

        let (start, end) = (output[0], output[1]);
        self.last_end = if start == end {
            self.subject.next_char(end)
        } else {
            end
        };

        Some(Match {
            text: self.text,
            start: self.subject.byte_offset(start),
            end: self.subject.byte_offset(end),
        })
    }
}

impl std::fmt::Debug for FindIter<'_, '_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FindIter")
            .field("last_end", &self.last_end)
            .field("text_len", &self.subject.byte_len)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regex_new_and_find() {
        let re = Regex::new(r"\d+").unwrap();
        let m = re.find("hello 42 world").unwrap();
        assert_eq!(m.as_str(), "42");
        assert_eq!(m.start(), 6);
        assert_eq!(m.end(), 8);
        assert_eq!(m.range(), 6..8);
        assert_eq!(m.len(), 2);
        assert!(!m.is_empty());
    }

    #[test]
    fn regex_no_match() {
        let re = Regex::new(r"\d+").unwrap();
        assert!(re.find("no digits here").is_none());
    }

    #[test]
    fn regex_is_match() {
        let re = Regex::new(r"hello").unwrap();
        assert!(re.is_match("say hello"));
        assert!(!re.is_match("say goodbye"));
    }

    #[test]
    fn regex_captures() {
        let re = Regex::new(r"(\d{4})-(\d{2})-(\d{2})").unwrap();
        let caps = re.captures("date: 2026-02-14").unwrap();
        assert_eq!(caps.get(0).unwrap().as_str(), "2026-02-14");
        assert_eq!(caps.get(1).unwrap().as_str(), "2026");
        assert_eq!(caps.get(2).unwrap().as_str(), "02");
        assert_eq!(caps.get(3).unwrap().as_str(), "14");
        assert!(caps.get(4).is_none());
        assert_eq!(caps.len(), 4);
    }

    #[test]
    fn regex_captures_len() {
        let re = Regex::new(r"(a)(b)(c)").unwrap();
        assert_eq!(re.captures_len(), 3);
        assert_eq!(re.as_bytecode().output_len(), 8);
    }

    #[test]
    fn regex_find_iter() {
        let re = Regex::new(r"\d+").unwrap();
        let matches: Vec<&str> = re.find_iter("1 + 22 = 333").map(|m| m.as_str()).collect();
        assert_eq!(matches, vec!["1", "22", "333"]);
    }

    #[test]
    fn regex_builder_case_insensitive() {
        let re = Regex::builder(r"hello")
            .case_insensitive(true)
            .build()
            .unwrap();
        assert!(re.is_match("HELLO"));
        assert!(re.is_match("Hello"));
    }

    #[test]
    fn regex_builder_multiline() {
        let re = Regex::builder(r"^b").multiline(true).build().unwrap();
        assert_eq!(re.find("a\nb").unwrap().start(), 2);
        assert!(Regex::new(r"^b").unwrap().find("a\nb").is_none());
    }

    #[test]
    fn regex_invalid_pattern() {
        let err = Regex::new(r"(unclosed").unwrap_err();
        assert!(matches!(err, RegexError::Syntax { .. }));
    }

    #[test]
    fn captures_iter() {
        let re = Regex::new(r"(a)(b)?").unwrap();
        let caps = re.captures("a").unwrap();
        let items: Vec<_> = caps.iter().collect();
        // group 0 = "a", group 1 = "a", group 2 = None (didn't participate)
        assert_eq!(items.len(), 3);
        assert!(items[0].is_some());
        assert!(items[1].is_some());
        assert!(items[2].is_none());
        assert_eq!(caps.iter().len(), 3);
    }

    #[test]
    fn empty_match_find_iter() {
        let re = Regex::new(r"").unwrap();
        let matches: Vec<_> = re.find_iter("ab").collect();
        // Should yield empty matches at positions 0, 1, 2
        assert_eq!(matches.len(), 3);
        assert_eq!(matches[0].start(), 0);
        assert_eq!(matches[1].start(), 1);
        assert_eq!(matches[2].start(), 2);
    }

    #[test]
    fn empty_matches_step_over_chars() {
        let re = Regex::new(r"").unwrap();
        let starts: Vec<_> = re.find_iter("é😀").map(|m| m.start()).collect();
        assert_eq!(starts, vec![0, 2, 6]);
    }

    #[test]
    fn latin1_offsets_are_bytes() {
        let re = Regex::new(r"b+").unwrap();
        let m = re.find("ébb").unwrap();
        assert_eq!(m.range(), 2..4);
        assert_eq!(m.as_str(), "bb");
    }

    #[test]
    fn wide_offsets_are_bytes() {
        let re = Regex::new(r"(β)c").unwrap();
        let caps = re.captures("😀\u{3b2}c").unwrap();
        assert_eq!(caps.get(0).unwrap().range(), 4..7);
        assert_eq!(caps.get(1).unwrap().as_str(), "\u{3b2}");
    }

    #[test]
    fn find_at_skips_earlier_matches() {
        let re = Regex::new(r"a").unwrap();
        assert_eq!(re.find_at("aba", 1).unwrap().start(), 2);
        assert!(re.find_at("aba", 3).is_none());
        assert!(re.find_at("aba", 9).is_none());
    }

    #[test]
    fn find_utf16_reports_units() {
        let re = Regex::new(r"c").unwrap();
        let units: Vec<u16> = "😀c".encode_utf16().collect();
        assert_eq!(re.find_utf16(&units, 0).unwrap(), Some(2..3));
    }

    #[test]
    fn match_limit_surfaces_as_error() {
        let re = Regex::builder(r"(a+)+b").match_limit(1_000).build().unwrap();
        let text = "a".repeat(25);
        assert_eq!(re.try_find_at(&text, 0), Err(RegexError::HitLimit));
        assert!(re.find(&text).is_none());
        assert!(matches!(re.try_captures(&text), Err(RegexError::HitLimit)));
    }

    #[test]
    fn arena_limit_surfaces_as_error() {
        let re = Regex::builder(r"(a)+").arena_limit(0).build().unwrap();
        assert_eq!(re.try_find_at("aaa", 0), Err(RegexError::Memory));
    }
}
