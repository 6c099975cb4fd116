// api_test.rs - Integration tests for the idiomatic Rust API.

use yarrow::api::{Regex, RegexBuilder};
use yarrow::error::RegexError;
use yarrow::prelude::*;
use yarrow::regerror::ErrorCode;

// === Regex::new ===

#[test]
fn simple_pattern() {
    let re = Regex::new(r"\d+").unwrap();
    let m = re.find("abc 123 def").unwrap();
    assert_eq!(m.as_str(), "123");
}

#[test]
fn non_ascii_pattern() {
    let re = Regex::new(r"[ぁ-ゖ]+").unwrap();
    let m = re.find("hello せかい world").unwrap();
    assert_eq!(m.as_str(), "せかい");
    assert_eq!(m.start(), 6);
}

#[test]
fn no_match_returns_none() {
    let re = Regex::new(r"xyz").unwrap();
    assert!(re.find("abc").is_none());
}

#[test]
fn empty_pattern() {
    let re = Regex::new(r"").unwrap();
    let m = re.find("hello").unwrap();
    assert_eq!(m.start(), 0);
    assert_eq!(m.end(), 0);
    assert!(m.is_empty());
}

#[test]
fn invalid_pattern_syntax_error() {
    let err = Regex::new(r"(unclosed").unwrap_err();
    match err {
        RegexError::Syntax { code, offset, .. } => {
            assert_eq!(code, ErrorCode::MissingParentheses);
            assert_eq!(offset, 9);
        }
        other => panic!("expected Syntax error, got {:?}", other),
    }
}

#[test]
fn empty_char_class_is_valid() {
    let re = Regex::new(r"[]").unwrap();
    assert!(!re.is_match("anything"));
    let re = Regex::new(r"a[^]b").unwrap();
    assert!(re.is_match("a\nb"));
}

// === Regex::is_match ===

#[test]
fn is_match_true() {
    let re = Regex::new(r"world").unwrap();
    assert!(re.is_match("hello world"));
}

#[test]
fn is_match_false() {
    let re = Regex::new(r"world").unwrap();
    assert!(!re.is_match("hello earth"));
}

// === Regex::find ===

#[test]
fn find_start_end_range() {
    let re = Regex::new(r"bar").unwrap();
    let m = re.find("foobarbaz").unwrap();
    assert_eq!(m.start(), 3);
    assert_eq!(m.end(), 6);
    assert_eq!(m.range(), 3..6);
    assert_eq!(m.len(), 3);
    assert!(!m.is_empty());
}

#[test]
fn find_offsets_after_astral_char() {
    let re = Regex::new(r"\w+").unwrap();
    let m = re.find("😀 hello").unwrap();
    assert_eq!(m.range(), 5..10);
    assert_eq!(m.as_str(), "hello");
}

#[test]
fn find_at_mid_char_rounds_forward() {
    let re = Regex::new(r"\w").unwrap();
    // Byte 1 falls inside "é"; the search starts at the following char.
    let m = re.find_at("éa", 1).unwrap();
    assert_eq!(m.range(), 2..3);
}

// === Regex::captures ===

#[test]
fn captures_groups() {
    let re = Regex::new(r"(\w+)\s+(\w+)").unwrap();
    let caps = re.captures("hello world").unwrap();
    assert_eq!(caps.get(0).unwrap().as_str(), "hello world");
    assert_eq!(caps.get(1).unwrap().as_str(), "hello");
    assert_eq!(caps.get(2).unwrap().as_str(), "world");
    assert_eq!(caps.len(), 3); // group 0 + 2 captures
}

#[test]
fn captures_optional_group() {
    let re = Regex::new(r"(a)(b)?c").unwrap();
    let caps = re.captures("ac").unwrap();
    assert_eq!(caps.get(0).unwrap().as_str(), "ac");
    assert_eq!(caps.get(1).unwrap().as_str(), "a");
    assert!(caps.get(2).is_none()); // group 2 didn't participate
}

#[test]
fn captures_repeated_group_keeps_last() {
    let re = Regex::new(r"(?:(\d)-)+").unwrap();
    let caps = re.captures("1-2-3-").unwrap();
    assert_eq!(caps.get(1).unwrap().as_str(), "3");
}

#[test]
fn captures_no_match() {
    let re = Regex::new(r"(\d+)").unwrap();
    assert!(re.captures("no digits").is_none());
}

#[test]
fn captures_len() {
    let re = Regex::new(r"(a)(b)(c)(d)").unwrap();
    assert_eq!(re.captures_len(), 4);
}

#[test]
fn captures_len_ignores_non_capturing() {
    let re = Regex::new(r"(?:a)(b)(?=(c))(?!d)").unwrap();
    assert_eq!(re.captures_len(), 2);
}

#[test]
fn captures_iter() {
    let re = Regex::new(r"(a)(b)").unwrap();
    let caps = re.captures("ab").unwrap();
    let items: Vec<_> = caps.iter().collect();
    assert_eq!(items.len(), 3);
    assert_eq!(items[0].unwrap().as_str(), "ab");
    assert_eq!(items[1].unwrap().as_str(), "a");
    assert_eq!(items[2].unwrap().as_str(), "b");
}

// === Regex::find_iter ===

#[test]
fn find_iter_multiple() {
    let re = Regex::new(r"\d+").unwrap();
    let results: Vec<&str> = re.find_iter("1 and 22 and 333").map(|m| m.as_str()).collect();
    assert_eq!(results, vec!["1", "22", "333"]);
}

#[test]
fn find_iter_no_matches() {
    let re = Regex::new(r"\d+").unwrap();
    let results: Vec<_> = re.find_iter("no digits").collect();
    assert!(results.is_empty());
}

#[test]
fn find_iter_empty_pattern() {
    let re = Regex::new(r"").unwrap();
    let results: Vec<_> = re.find_iter("ab").collect();
    // Should find empty match at positions 0, 1, 2
    assert_eq!(results.len(), 3);
    for (i, m) in results.iter().enumerate() {
        assert_eq!(m.start(), i);
        assert!(m.is_empty());
    }
}

#[test]
fn find_iter_overlapping_region() {
    let re = Regex::new(r"\w+").unwrap();
    let results: Vec<&str> = re.find_iter("a bb ccc").map(|m| m.as_str()).collect();
    assert_eq!(results, vec!["a", "bb", "ccc"]);
}

#[test]
fn find_iter_mixed_empty_and_non_empty() {
    let re = Regex::new(r"a*").unwrap();
    let results: Vec<_> = re.find_iter("baa").map(|m| m.range()).collect();
    assert_eq!(results, vec![0..0, 1..3, 3..3]);
}

#[test]
fn find_iter_wide_text() {
    let re = Regex::new(r"α+").unwrap();
    let results: Vec<&str> = re.find_iter("αα β α").map(|m| m.as_str()).collect();
    assert_eq!(results, vec!["αα", "α"]);
}

#[test]
fn find_iter_stops_on_limit_error() {
    let re = Regex::builder(r"(a+)+b").match_limit(1_000).build().unwrap();
    let text = format!("ab {}", "a".repeat(25));
    let results: Vec<&str> = re.find_iter(&text).map(|m| m.as_str()).collect();
    assert_eq!(results, vec!["ab"]);
}

// === RegexBuilder ===

#[test]
fn builder_case_insensitive() {
    let re = RegexBuilder::new(r"hello")
        .case_insensitive(true)
        .build()
        .unwrap();
    assert!(re.is_match("HELLO"));
    assert!(re.is_match("HeLlO"));
}

#[test]
fn builder_multiline() {
    let re = Regex::builder(r"^\d+$").multiline(true).build().unwrap();
    let lines: Vec<&str> = re.find_iter("12\nab\n345").map(|m| m.as_str()).collect();
    assert_eq!(lines, vec!["12", "345"]);

    let re2 = Regex::builder(r"^\d+$").build().unwrap();
    assert!(!re2.is_match("12\nab\n345"));
}

#[test]
fn builder_dot_never_matches_newline() {
    let re = Regex::builder(r"a.b").multiline(true).build().unwrap();
    assert!(!re.is_match("a\nb"));
    assert!(re.is_match("a-b"));
}

#[test]
fn builder_chaining() {
    let re = Regex::builder(r"^hello world$")
        .case_insensitive(true)
        .multiline(true)
        .match_limit(50_000)
        .arena_limit(1 << 16)
        .build()
        .unwrap();
    assert!(re.is_match("first\nHELLO WORLD\nlast"));
}

#[test]
fn builder_match_limit_is_per_regex() {
    let strict = Regex::builder(r"(a+)+b").match_limit(1_000).build().unwrap();
    let relaxed = Regex::new(r"(a+)+b").unwrap();
    let text = "a".repeat(12);
    assert_eq!(strict.try_find_at(&text, 0), Err(RegexError::HitLimit));
    assert_eq!(relaxed.try_find_at(&text, 0), Ok(None));
}

// === UTF-16 API ===

#[test]
fn find_utf16_offsets_in_units() {
    let re = Regex::new(r"\d+").unwrap();
    let units: Vec<u16> = "😀 42".encode_utf16().collect();
    assert_eq!(re.find_utf16(&units, 0).unwrap(), Some(3..5));
}

#[test]
fn find_utf16_lone_surrogate() {
    let re = Regex::new(r"\ud800").unwrap();
    let units = [0x61, 0xd800, 0x62];
    assert_eq!(re.find_utf16(&units, 0).unwrap(), Some(1..2));
}

#[test]
fn find_utf16_from_offset() {
    let re = Regex::new(r"a").unwrap();
    let units: Vec<u16> = "aXa".encode_utf16().collect();
    assert_eq!(re.find_utf16(&units, 1).unwrap(), Some(2..3));
    assert_eq!(re.find_utf16(&units, 3).unwrap(), None);
}

// === RegexError ===

#[test]
fn error_display() {
    let err = Regex::new(r"(").unwrap_err();
    let msg = format!("{}", err);
    assert!(msg.contains("missing )"));
}

#[test]
fn error_is_std_error() {
    let err: Box<dyn std::error::Error> = Box::new(Regex::new(r"[").unwrap_err());
    assert!(!err.to_string().is_empty());
}

#[test]
fn error_code() {
    let err = Regex::new(r"(").unwrap_err();
    assert!(err.code() > 0);
    assert!(RegexError::HitLimit.code() < 0);
}

#[test]
fn error_offsets() {
    let offset = |pattern: &str| match Regex::new(pattern).unwrap_err() {
        RegexError::Syntax { offset, .. } => offset,
        other => panic!("expected Syntax error, got {:?}", other),
    };
    assert_eq!(offset("ab)"), 3);
    assert_eq!(offset("a{2,1}"), 6);
    assert_eq!(offset("x\\"), 2);
}

// === Prelude ===

#[test]
fn prelude_imports_work() {
    // This test verifies that the prelude re-exports are accessible.
    let re = Regex::new(r"(\w+)").unwrap();
    let caps: Captures = re.captures("hello").unwrap();
    let m: Match = caps.get(0).unwrap();
    assert_eq!(m.as_str(), "hello");
    let _: &RegexError = &Regex::new(r"(").unwrap_err();
    let _: RegexFlags = RegexFlags::IGNORE_CASE | RegexFlags::MULTILINE;
}

// === as_bytecode escape hatch ===

#[test]
fn as_bytecode_access() {
    use yarrow::regenc::Input;
    use yarrow::regexec::interpret;

    let re = Regex::new(r"(a)(b)(c)").unwrap();
    let program = re.as_bytecode();
    assert_eq!(program.num_subpatterns, 3);

    let mut output = program.new_output();
    let start = interpret(program, Input::Narrow(b"xabc"), 0, &mut output).unwrap();
    assert_eq!(start, 1);
    assert_eq!(&output[..], &[1, 4, 1, 2, 2, 3, 3, 4]);
}

// === Complex patterns ===

#[test]
fn alternation() {
    let re = Regex::new(r"cat|dog|bird").unwrap();
    assert_eq!(re.find("I have a dog").unwrap().as_str(), "dog");
}

#[test]
fn backreference() {
    let re = Regex::new(r"(\w+)\s+\1").unwrap();
    let m = re.find("hello hello world").unwrap();
    assert_eq!(m.as_str(), "hello hello");
}

#[test]
fn backreference_case_insensitive() {
    let re = Regex::builder(r"(\w+) \1").case_insensitive(true).build().unwrap();
    assert_eq!(re.find("say Hey hEY").unwrap().as_str(), "Hey hEY");
}

#[test]
fn lookahead() {
    let re = Regex::new(r"\d+(?= dollars)").unwrap();
    let m = re.find("I have 42 dollars").unwrap();
    assert_eq!(m.as_str(), "42");
}

#[test]
fn negative_lookahead() {
    let re = Regex::new(r"\d+(?!\d| dollars)").unwrap();
    let m = re.find("42 dollars or 7 euros").unwrap();
    assert_eq!(m.as_str(), "7");
}

#[test]
fn lazy_quantifier() {
    let re = Regex::new(r"<.+?>").unwrap();
    let m = re.find("<a><b>").unwrap();
    assert_eq!(m.as_str(), "<a>");
}

#[test]
fn date_extraction() {
    let re = Regex::new(r"(\d{4})-(\d{2})-(\d{2})").unwrap();
    let caps = re.captures("Today is 2026-02-14.").unwrap();
    assert_eq!(caps.get(1).unwrap().as_str(), "2026");
    assert_eq!(caps.get(2).unwrap().as_str(), "02");
    assert_eq!(caps.get(3).unwrap().as_str(), "14");
    assert_eq!(caps.get(0).unwrap().as_str(), "2026-02-14");
}

#[test]
fn line_extraction() {
    let re = Regex::new(r".*error.*").unwrap();
    let m = re.find("ok\nan error here\nok").unwrap();
    assert_eq!(m.as_str(), "an error here");
}

#[test]
fn regex_is_clone() {
    let re = Regex::new(r"a+").unwrap();
    let copy = re.clone();
    assert_eq!(re.find("baa"), copy.find("baa"));
}

#[test]
fn debug_impl() {
    let re = Regex::new(r"\d+").unwrap();
    let dbg = format!("{:?}", re);
    assert!(dbg.contains("Regex"));
}

#[test]
fn captures_debug_impl() {
    let re = Regex::new(r"(\d+)").unwrap();
    let caps = re.captures("42").unwrap();
    let dbg = format!("{:?}", caps);
    assert_eq!(dbg, r#"[Some("42"), Some("42")]"#);
}
