// regenc.rs - Code units and the input cursor.
//
// Input is a buffer of either narrow (8-bit, Latin-1) or wide (16-bit,
// UTF-16) code units. The representation is picked once per match call and
// the interpreter is monomorphized over it through the `CodeUnit` trait.

use memchr::{memchr2, memrchr2};

use crate::unicode::is_newline;

// === Code Unit Trait ===

pub trait CodeUnit: Copy + Eq + Send + Sync + 'static {
    /// Widen to a code point value.
    fn to_u32(self) -> u32;

    /// Index of the first newline-class unit in `units`.
    fn find_newline(units: &[Self]) -> Option<usize>;

    /// Index of the last newline-class unit in `units`.
    fn rfind_newline(units: &[Self]) -> Option<usize>;
}

impl CodeUnit for u8 {
    #[inline]
    fn to_u32(self) -> u32 {
        self as u32
    }

    // U+2028/U+2029 cannot appear in Latin-1 text.
    #[inline]
    fn find_newline(units: &[u8]) -> Option<usize> {
        memchr2(b'\n', b'\r', units)
    }

    #[inline]
    fn rfind_newline(units: &[u8]) -> Option<usize> {
        memrchr2(b'\n', b'\r', units)
    }
}

impl CodeUnit for u16 {
    #[inline]
    fn to_u32(self) -> u32 {
        self as u32
    }

    fn find_newline(units: &[u16]) -> Option<usize> {
        units.iter().position(|&u| is_newline(u as u32))
    }

    fn rfind_newline(units: &[u16]) -> Option<usize> {
        units.iter().rposition(|&u| is_newline(u as u32))
    }
}

// === Input ===

/// A subject buffer in one of the two physical representations.
#[derive(Debug, Clone, Copy)]
pub enum Input<'a> {
    /// 8-bit code units, interpreted as Latin-1.
    Narrow(&'a [u8]),
    /// 16-bit UTF-16 code units.
    Wide(&'a [u16]),
}

impl<'a> Input<'a> {
    /// Length in code units.
    pub fn len(&self) -> usize {
        match self {
            Input::Narrow(s) => s.len(),
            Input::Wide(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<'a> From<&'a [u8]> for Input<'a> {
    fn from(s: &'a [u8]) -> Self {
        Input::Narrow(s)
    }
}

impl<'a> From<&'a [u16]> for Input<'a> {
    fn from(s: &'a [u16]) -> Self {
        Input::Wide(s)
    }
}

// === InputStream ===

/// Cursor over the subject. Offsets passed to the `*_checked` and `at_*`
/// methods are measured backwards from the current position and may be
/// negative.
pub struct InputStream<'a, C: CodeUnit> {
    input: &'a [C],
    pos: usize,
    length: usize,
}

impl<'a, C: CodeUnit> InputStream<'a, C> {
    pub fn new(input: &'a [C], start: usize) -> Self {
        InputStream {
            input,
            pos: start,
            length: input.len(),
        }
    }

    #[inline]
    pub fn next(&mut self) {
        self.pos += 1;
    }

    #[inline]
    pub fn rewind(&mut self, amount: usize) {
        debug_assert!(self.pos >= amount);
        self.pos -= amount;
    }

    /// Unit at the cursor. The cursor must not be at the end.
    #[inline]
    pub fn read(&self) -> u32 {
        self.input[self.pos].to_u32()
    }

    /// Unit `negative_offset` positions behind the cursor.
    #[inline]
    pub fn read_checked(&self, negative_offset: isize) -> u32 {
        let p = self.pos as isize - negative_offset;
        debug_assert!(p >= 0 && (p as usize) < self.length);
        self.input[p as usize].to_u32()
    }

    /// Unit at an absolute position.
    #[inline]
    pub fn reread(&self, from: usize) -> u32 {
        self.input[from].to_u32()
    }

    #[inline]
    pub fn get_pos(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn set_pos(&mut self, p: usize) {
        self.pos = p;
    }

    #[inline]
    pub fn end(&self) -> usize {
        self.length
    }

    #[inline]
    pub fn at_start(&self) -> bool {
        self.pos == 0
    }

    #[inline]
    pub fn at_end(&self) -> bool {
        self.pos == self.length
    }

    #[inline]
    pub fn at_start_offset(&self, negative_offset: isize) -> bool {
        self.pos as isize == negative_offset
    }

    #[inline]
    pub fn at_end_offset(&self, negative_offset: isize) -> bool {
        self.pos as isize - negative_offset == self.length as isize
    }

    /// Advance by `count` if that many units remain; otherwise leave the cursor alone.
    #[inline]
    pub fn check_input(&mut self, count: usize) -> bool {
        match self.length.checked_sub(self.pos) {
            Some(remaining) if count <= remaining => {
                self.pos += count;
                true
            }
            _ => false,
        }
    }

    /// Exact inverse of a successful `check_input(count)`.
    #[inline]
    pub fn uncheck_input(&mut self, count: usize) {
        assert!(self.pos >= count, "uncheck_input past start of input");
        self.pos -= count;
    }

    #[inline]
    pub fn is_available_input(&self, offset: usize) -> bool {
        self.pos
            .checked_add(offset)
            .map_or(false, |p| p <= self.length)
    }

    /// Position just after the last newline before `from`, or 0.
    pub fn line_start_before(&self, from: usize) -> usize {
        C::rfind_newline(&self.input[..from]).map_or(0, |i| i + 1)
    }

    /// Position of the first newline at or after `from`, or the end of input.
    pub fn line_end_from(&self, from: usize) -> usize {
        C::find_newline(&self.input[from..]).map_or(self.length, |i| from + i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_and_uncheck() {
        let text = b"abcd";
        let mut input = InputStream::new(&text[..], 1);
        assert!(input.check_input(3));
        assert_eq!(input.get_pos(), 4);
        assert!(input.at_end());
        assert!(!input.check_input(1));
        assert_eq!(input.get_pos(), 4);
        input.uncheck_input(2);
        assert_eq!(input.get_pos(), 2);
    }

    #[test]
    fn check_input_past_end_is_refused() {
        let text = b"ab";
        let mut input = InputStream::new(&text[..], 3);
        assert!(!input.check_input(0));
        assert!(!input.is_available_input(0));
    }

    #[test]
    fn negative_offsets() {
        let text = b"xyz";
        let mut input = InputStream::new(&text[..], 0);
        assert!(input.check_input(2));
        assert_eq!(input.read_checked(2), 'x' as u32);
        assert_eq!(input.read_checked(1), 'y' as u32);
        assert_eq!(input.read_checked(0), 'z' as u32);
        assert!(input.at_start_offset(2));
        assert!(input.at_end_offset(-1));
        assert_eq!(input.reread(0), 'x' as u32);
    }

    #[test]
    fn wide_units() {
        let text: Vec<u16> = "a\u{3b1}b".encode_utf16().collect();
        let mut input = InputStream::new(&text[..], 0);
        input.next();
        assert_eq!(input.read(), 0x3b1);
        input.rewind(1);
        assert!(input.at_start());
    }

    #[test]
    fn newline_scans_narrow() {
        let text = b"ab\ncd\ref";
        let input = InputStream::new(&text[..], 0);
        assert_eq!(input.line_start_before(4), 3);
        assert_eq!(input.line_start_before(2), 0);
        assert_eq!(input.line_end_from(3), 5);
        assert_eq!(input.line_end_from(6), text.len());
    }

    #[test]
    fn newline_scans_wide() {
        let text: Vec<u16> = "ab\u{2028}cd".encode_utf16().collect();
        let input = InputStream::new(&text[..], 0);
        assert_eq!(input.line_start_before(4), 3);
        assert_eq!(input.line_end_from(0), 2);
    }

    #[test]
    fn input_lengths() {
        let narrow: Input = (&b"abc"[..]).into();
        let wide_buf = [0x61u16, 0x62];
        let wide: Input = (&wide_buf[..]).into();
        assert_eq!(narrow.len(), 3);
        assert_eq!(wide.len(), 2);
        assert!(!wide.is_empty());
    }
}
