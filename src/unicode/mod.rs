// unicode/mod.rs - Canonicalization service and built-in class tables.
//
// Case-insensitive matching compares code units by their canonical form:
// the simple uppercase mapping when it is a single BMP code unit, except
// that a non-ASCII unit never canonicalizes to an ASCII one. Everything
// works on UTF-16 code units (u32 values <= 0xFFFF).

use std::collections::HashMap;
use std::sync::OnceLock;

use smallvec::SmallVec;

pub const MAX_CODE_UNIT: u32 = 0xFFFF;

// === Built-in Class Tables ===
// Inclusive (begin, end) ranges, sorted.

pub static NEWLINE_RANGES: &[(u32, u32)] = &[(0x0a, 0x0a), (0x0d, 0x0d), (0x2028, 0x2029)];

pub static WORDCHAR_RANGES: &[(u32, u32)] = &[
    (0x30, 0x39), // 0-9
    (0x41, 0x5a), // A-Z
    (0x5f, 0x5f), // _
    (0x61, 0x7a), // a-z
];

pub static DIGIT_RANGES: &[(u32, u32)] = &[(0x30, 0x39)];

pub static SPACE_RANGES: &[(u32, u32)] = &[
    (0x09, 0x0d),
    (0x20, 0x20),
    (0xa0, 0xa0),
    (0x1680, 0x1680),
    (0x180e, 0x180e),
    (0x2000, 0x200a),
    (0x2028, 0x2029),
    (0x202f, 0x202f),
    (0x205f, 0x205f),
    (0x3000, 0x3000),
    (0xfeff, 0xfeff),
];

#[inline]
pub fn is_newline(ch: u32) -> bool {
    NEWLINE_RANGES.iter().any(|&(lo, hi)| ch >= lo && ch <= hi)
}

#[inline]
pub fn is_wordchar(ch: u32) -> bool {
    ch < 0x80 && WORDCHAR_RANGES.iter().any(|&(lo, hi)| ch >= lo && ch <= hi)
}

// === Canonicalization ===

struct CaseTables {
    canonical: Vec<u16>,
    // Canonical unit -> every unit sharing it, for classes with more than one member.
    variants: HashMap<u16, SmallVec<[u16; 4]>>,
}

fn compute_canonical(ch: u32) -> u32 {
    if ch < 0x80 {
        return (ch as u8).to_ascii_uppercase() as u32;
    }
    let Some(c) = char::from_u32(ch) else {
        return ch;
    };
    let mut upper = c.to_uppercase();
    match (upper.next(), upper.next()) {
        (Some(u), None) => {
            let u = u as u32;
            if u < 0x80 || u > MAX_CODE_UNIT {
                ch
            } else {
                u
            }
        }
        _ => ch,
    }
}

fn case_tables() -> &'static CaseTables {
    static TABLES: OnceLock<CaseTables> = OnceLock::new();
    TABLES.get_or_init(|| {
        let mut canonical = Vec::with_capacity(MAX_CODE_UNIT as usize + 1);
        let mut groups: HashMap<u16, SmallVec<[u16; 4]>> = HashMap::new();
        for ch in 0..=MAX_CODE_UNIT {
            let canon = compute_canonical(ch) as u16;
            canonical.push(canon);
            groups.entry(canon).or_default().push(ch as u16);
        }
        groups.retain(|_, members| members.len() > 1);
        CaseTables { canonical, variants: groups }
    })
}

/// Canonical form of a code unit for case-insensitive comparison.
pub fn canonicalize(ch: u32) -> u32 {
    if ch < 0x80 {
        return (ch as u8).to_ascii_uppercase() as u32;
    }
    if ch > MAX_CODE_UNIT {
        return ch;
    }
    case_tables().canonical[ch as usize] as u32
}

/// True if two non-ASCII code units canonicalize to the same value.
pub fn are_canonically_equivalent(a: u32, b: u32) -> bool {
    a == b || canonicalize(a) == canonicalize(b)
}

/// Every code unit that canonicalizes like `ch`, including `ch` itself, sorted.
pub fn case_variants(ch: u32) -> SmallVec<[u32; 4]> {
    if ch > MAX_CODE_UNIT {
        return smallvec::smallvec![ch];
    }
    let canon = canonicalize(ch) as u16;
    match case_tables().variants.get(&canon) {
        Some(members) => members.iter().map(|&m| m as u32).collect(),
        None => smallvec::smallvec![ch],
    }
}

/// Lowercase partner of a code unit when it has exactly one other case variant.
pub fn to_lower(ch: u32) -> u32 {
    case_variants(ch).iter().copied().find(|&v| v != canonicalize(ch)).unwrap_or(ch)
}

/// Canonical (uppercase) partner of a code unit.
pub fn to_upper(ch: u32) -> u32 {
    canonicalize(ch)
}
