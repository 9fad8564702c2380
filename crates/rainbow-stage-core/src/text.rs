//! Ropey-backed source text.
//!
//! A minimal [`CodeEditorModel`] for hosts without a code editor of their
//! own, and for tests. Positions are 1-based lines and char columns, the
//! same convention the parser uses for source locations.

use std::ops::Range;

use crate::code_selection::CodeRange;
use crate::platform::{CodeEditorModel, PlatformError};

#[derive(Clone, Debug, Default)]
pub struct SourceText {
    rope: ropey::Rope,
    version: u64,
}

impl SourceText {
    pub fn new(text: &str) -> Self {
        Self {
            rope: ropey::Rope::from_str(text),
            version: 0,
        }
    }

    /// Bumped on every edit.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len_lines(&self) -> usize {
        self.rope.len_lines()
    }

    /// Char offset of a 1-based line/column.
    ///
    /// A column may point one past the last char of its line (the position
    /// of the line break, or the end of the text).
    pub fn char_offset(&self, line: usize, col: usize) -> Result<usize, PlatformError> {
        if line == 0 || col == 0 || line > self.rope.len_lines() {
            return Err(PlatformError::OutsideText { line, col });
        }
        let line_start = self.rope.line_to_char(line - 1);
        let line_len = self.rope.line(line - 1).len_chars();
        let has_break = line < self.rope.len_lines();
        let max_col = line_len - usize::from(has_break) + 1;
        if col > max_col {
            return Err(PlatformError::OutsideText { line, col });
        }
        Ok(line_start + col - 1)
    }

    /// 1-based line/column of a char offset.
    pub fn position(&self, char_offset: usize) -> (usize, usize) {
        let offset = char_offset.min(self.rope.len_chars());
        let line = self.rope.char_to_line(offset);
        (line + 1, offset - self.rope.line_to_char(line) + 1)
    }

    pub fn char_range(&self, range: CodeRange) -> Result<Range<usize>, PlatformError> {
        let start = self.char_offset(range.start_line, range.start_col)?;
        let end = self.char_offset(range.end_line, range.end_col)?;
        if end < start {
            return Err(PlatformError::ReversedRange);
        }
        Ok(start..end)
    }

    pub fn slice(&self, range: CodeRange) -> Result<String, PlatformError> {
        let chars = self.char_range(range)?;
        Ok(self.rope.slice(chars).to_string())
    }
}

impl CodeEditorModel for SourceText {
    fn text(&self) -> String {
        self.rope.to_string()
    }

    fn replace_range(&mut self, range: CodeRange, text: &str) -> Result<(), PlatformError> {
        let chars = self.char_range(range)?;
        tracing::trace!(?range, inserted = text.len(), "replace range");
        self.rope.remove(chars.clone());
        self.rope.insert(chars.start, text);
        self.version += 1;
        Ok(())
    }
}
