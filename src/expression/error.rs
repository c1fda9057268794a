use std::fmt::Write as _;

/// Malformed expression or directive, with the byte offset it was detected at.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("at byte {offset}: {message}")]
pub struct SyntaxError {
    /// Byte offset into the source text.
    pub offset: usize,
    /// What went wrong.
    pub message: String,
}

impl SyntaxError {
    pub(crate) fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }

    /// Shift the offset, for errors found in a sub-string of a larger line.
    pub(crate) fn shifted(mut self, by: usize) -> Self {
        self.offset += by;
        self
    }

    /// Two-line diagnostic: the source followed by a caret under the offending character.
    pub fn caret(&self, source: &str) -> String {
        let col = source
            .char_indices()
            .take_while(|(i, _)| *i < self.offset)
            .count();
        let mut out = String::with_capacity(source.len() * 2 + self.message.len() + 8);
        let _ = writeln!(out, "{source}");
        let _ = write!(out, "{:>width$} {}", "^", self.message, width = col + 1);
        out
    }
}
