//! Variable keys.
//!
//! A [`Key`] is an opaque 64-bit identifier. Symbol keys pack a character in the
//! top byte and an index in the remaining 56 bits, so `Key::symbol('x', 1)`
//! prints as `x1`. Keys without a character print as plain integers.

use std::fmt;

const CHR_BITS: u32 = 8;
const INDEX_BITS: u32 = 64 - CHR_BITS;
const INDEX_MASK: u64 = (1 << INDEX_BITS) - 1;

/// Identifier of a variable in [`crate::core::values::Values`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(u64);

impl Key {
    pub const fn new(raw: u64) -> Self {
        Key(raw)
    }

    /// Symbol key such as `x1` or `l3`.
    ///
    /// Only ASCII characters fit in the character byte. Debug builds panic on
    /// anything else; release builds keep the low seven bits, so the character
    /// read back by [`Key::chr`] differs. Indices above 2⁵⁶ - 1 are truncated.
    pub const fn symbol(chr: char, index: u64) -> Self {
        debug_assert!(chr.is_ascii(), "symbol key character must be ASCII");
        Key((((chr as u64) & 0x7f) << INDEX_BITS) | (index & INDEX_MASK))
    }

    pub const fn raw(&self) -> u64 {
        self.0
    }

    /// Character part, `None` for plain integer keys.
    pub fn chr(&self) -> Option<char> {
        let c = (self.0 >> INDEX_BITS) as u8;
        (c != 0).then_some(c as char)
    }

    pub const fn index(&self) -> u64 {
        self.0 & INDEX_MASK
    }
}

impl From<u64> for Key {
    fn from(raw: u64) -> Self {
        Key(raw)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.chr() {
            Some(c) => write!(f, "{c}{}", self.index()),
            None => write!(f, "{}", self.0),
        }
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({self})")
    }
}
