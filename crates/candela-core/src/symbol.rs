use std::fmt;

/// Maximum length in bytes of a symbol identifier: short uppercase
/// ticker, printable ASCII, <= 16 bytes.
pub const MAX_SYMBOL_LEN: usize = 16;

/// A symbol identifier stored inline, never on the heap.
///
/// A short ASCII ticker rather than a dense numeric id, so the aggregator
/// stays allocation-free on the hot path without needing a symbol table.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct Symbol {
    bytes: [u8; MAX_SYMBOL_LEN],
    len: u8,
}

/// Reasons a candidate symbol string is rejected by [`Symbol::parse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SymbolError {
    #[error("symbol must not be empty")]
    Empty,
    #[error("symbol longer than {MAX_SYMBOL_LEN} bytes")]
    TooLong,
    #[error("symbol must be uppercase ASCII letters or digits")]
    NotUppercaseAscii,
}

impl Symbol {
    /// Parses a symbol from a string slice, enforcing "short uppercase
    /// identifier, printable ASCII, <= 16 bytes".
    pub fn parse(s: &str) -> Result<Self, SymbolError> {
        if s.is_empty() {
            return Err(SymbolError::Empty);
        }
        if s.len() > MAX_SYMBOL_LEN {
            return Err(SymbolError::TooLong);
        }
        if !s
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
        {
            return Err(SymbolError::NotUppercaseAscii);
        }
        let mut bytes = [0u8; MAX_SYMBOL_LEN];
        bytes[..s.len()].copy_from_slice(s.as_bytes());
        Ok(Self {
            bytes,
            len: s.len() as u8,
        })
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        // SAFETY: constructed only from validated ASCII in `parse`.
        unsafe { std::str::from_utf8_unchecked(&self.bytes[..self.len as usize]) }
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}
impl Eq for Symbol {}

impl std::hash::Hash for Symbol {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_symbol() {
        let s = Symbol::parse("BTCUSD").unwrap();
        assert_eq!(s.as_str(), "BTCUSD");
    }

    #[test]
    fn rejects_empty() {
        assert_eq!(Symbol::parse("").unwrap_err(), SymbolError::Empty);
    }

    #[test]
    fn rejects_too_long() {
        assert_eq!(
            Symbol::parse("ABCDEFGHIJKLMNOPQ").unwrap_err(),
            SymbolError::TooLong
        );
    }

    #[test]
    fn rejects_lowercase() {
        assert_eq!(
            Symbol::parse("btcusd").unwrap_err(),
            SymbolError::NotUppercaseAscii
        );
    }

    #[test]
    fn equality_and_hash_match_on_str() {
        let a = Symbol::parse("ETHUSD").unwrap();
        let b = Symbol::parse("ETHUSD").unwrap();
        assert_eq!(a, b);
    }
}
