//! S-Expression Tokenizer

use crate::error::{Source, SourceFileName};
use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;

/// A slice of the input with the position of its first character.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub line: u32,
    pub col: u32,
    pub text: &'a str,
}

impl Token<'_> {
    pub fn src(&self, file: &SourceFileName) -> Source {
        Source::new(self.line, self.col, file.clone())
    }
}

impl fmt::Debug for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} {:?}", self.line, self.col, self.text)
    }
}

/// Characters that always form a token of their own.
pub const DELIMITERS: &[char] = &['(', ')', '\''];
const COMMENT_CHAR: char = ';';

#[derive(Clone, Copy, PartialEq, Eq)]
struct LineTracker {
    line: u32,
    col: u32
}

impl Default for LineTracker {
    fn default() -> Self {
        Self { line: 1, col: 1 }
    }
}

impl LineTracker {
    #[inline]
    pub fn step(&mut self, c: char) {
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
    }
}

#[inline]
fn ends_token(c: char) -> bool {
    c.is_whitespace() || c == COMMENT_CHAR || DELIMITERS.contains(&c)
}

/// Splits source text into tokens, skipping whitespace and `;` comments.
/// Every token remembers the line and column it started on.
pub struct Toker<'a> {
    line_tracker: LineTracker,
    text: &'a str,
    it: Peekable<CharIndices<'a>>,
}

impl<'a> Toker<'a> {
    pub fn new(text: &'a str) -> Toker<'a> {
        Toker { line_tracker: LineTracker::default(),
                text,
                it: text.char_indices().peekable() }
    }

    fn bump(&mut self) {
        if let Some((_, c)) = self.it.next() {
            self.line_tracker.step(c);
        }
    }

    fn skip_comment(&mut self) {
        while let Some(&(_, c)) = self.it.peek() {
            if c == '\n' {
                break
            }
            self.bump();
        }
    }
}

impl<'a> Iterator for Toker<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let &(i, c) = self.it.peek()?;
            if c == COMMENT_CHAR {
                self.skip_comment();
                continue
            }
            if c.is_whitespace() {
                self.bump();
                continue
            }
            let LineTracker { line, col } = self.line_tracker;
            self.bump();
            if DELIMITERS.contains(&c) {
                return Some(Token { line, col, text: &self.text[i..i + c.len_utf8()] })
            }
            let mut end = i + c.len_utf8();
            while let Some(&(j, nc)) = self.it.peek() {
                if ends_token(nc) {
                    break
                }
                end = j + nc.len_utf8();
                self.bump();
            }
            return Some(Token { line, col, text: &self.text[i..end] })
        }
    }
}

pub fn tokenize(text: &str) -> Vec<Token> {
    Toker::new(text).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(src: &str) -> Vec<&str> {
        tokenize(src).into_iter().map(|t| t.text).collect()
    }

    #[test]
    fn delimiters_split_tokens() {
        assert_eq!(texts("(a 'b)"), vec!["(", "a", "'", "b", ")"]);
        assert_eq!(texts("(f(g))"), vec!["(", "f", "(", "g", ")", ")"]);
        assert_eq!(texts("($define! x . y)"), vec!["(", "$define!", "x", ".", "y", ")"]);
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(texts("a ; the rest (is ignored\nb;c\n"), vec!["a", "b"]);
        assert!(texts("; nothing here").is_empty());
    }

    #[test]
    fn positions() {
        let toks = tokenize("(a\n  bc)");
        let pos: Vec<_> = toks.iter().map(|t| (t.line, t.col)).collect();
        assert_eq!(pos, vec![(1, 1), (1, 2), (2, 3), (2, 5)]);
    }
}
