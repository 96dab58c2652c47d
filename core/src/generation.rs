//! Request-generation tokens.
//!
//! Each fetch takes a token; only the response holding the most recently
//! issued token may touch state. Anything older arrived out of order and is
//! dropped.

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Token(u64);

#[derive(Debug, Default)]
pub struct Generation {
    latest: u64,
}

impl Generation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a new token, superseding every earlier one.
    pub fn next(&mut self) -> Token {
        self.latest += 1;
        Token(self.latest)
    }

    pub fn is_current(&self, token: Token) -> bool {
        token.0 == self.latest
    }

    /// Supersede outstanding tokens without issuing a new one.
    pub fn invalidate(&mut self) {
        self.latest += 1;
    }
}
