//! Positioned diagnostic collection
//!
//! The parser and the checker never stop at the first problem; they report
//! into a [`Diagnostics`] sink and the caller decides whether the run fails.

use std::fmt;
use std::path::Path;

/// Source position inside a description file (1-based line and column)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Pos {
    pub file: String,
    pub line: usize,
    pub col: usize,
}

impl Pos {
    pub fn new(file: impl Into<String>, line: usize, col: usize) -> Self {
        Self {
            file: file.into(),
            line,
            col,
        }
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.col)
    }
}

/// A single positioned message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub pos: Pos,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Only the base name is shown, full paths make the output unreadable.
        let base = Path::new(&self.pos.file)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.pos.file.clone());
        write!(
            f,
            "{}:{}:{}: {}",
            base, self.pos.line, self.pos.col, self.message
        )
    }
}

/// Accumulates diagnostics across a whole parse or check
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, pos: Pos, message: impl Into<String>) {
        self.items.push(Diagnostic {
            pos,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Render every diagnostic, one per line
    pub fn render(&self) -> String {
        let mut out = String::new();
        for d in &self.items {
            out.push_str(&d.to_string());
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_uses_base_name() {
        let mut diags = Diagnostics::new();
        diags.report(Pos::new("/kernel/sys/linux/auto.txt", 3, 7), "unknown type foo");
        assert_eq!(diags.render(), "auto.txt:3:7: unknown type foo\n");
    }

    #[test]
    fn test_render_keeps_every_message_in_order() {
        let mut diags = Diagnostics::new();
        diags.report(Pos::new("a.txt", 1, 1), "first");
        diags.report(Pos::new("b.txt", 2, 4), "second");
        assert_eq!(diags.len(), 2);
        assert_eq!(diags.render(), "a.txt:1:1: first\nb.txt:2:4: second\n");
    }

    #[test]
    fn test_empty_renders_nothing() {
        let diags = Diagnostics::new();
        assert!(diags.is_empty());
        assert_eq!(diags.render(), "");
    }
}
