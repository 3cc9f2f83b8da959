use std::fmt;

use futures::stream::BoxStream;

use crate::error::GenerationError;

/// One non-empty unit of generated text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Increment(String);

/// Lazy, ordered, non-restartable sequence of increments. An `Err` item is
/// terminal: nothing follows it.
pub type IncrementStream = BoxStream<'static, Result<Increment, GenerationError>>;

impl Increment {
    /// Returns `None` for the empty string.
    pub fn new(text: impl Into<String>) -> Option<Self> {
        let text = text.into();
        (!text.is_empty()).then_some(Self(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Whitespace only.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl AsRef<str> for Increment {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Increment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Increment> for String {
    fn from(increment: Increment) -> Self {
        increment.0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty_text_is_not_an_increment() {
        assert!(Increment::new("").is_none());
        assert_eq!(Increment::new("a").map(String::from), Some("a".to_owned()));
    }

    #[test]
    fn blank_detection() {
        assert!(Increment::new(" \n\t").is_some_and(|i| i.is_blank()));
        assert!(Increment::new(" x ").is_some_and(|i| !i.is_blank()));
    }
}
