use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};

lazy_static! {
    static ref NUMBER: Regex = Regex::new(r"^\p{Nd}+").expect("valid regex");
    static ref WORD: Regex = Regex::new(r"^\p{L}[\p{L}\p{Nd}]*").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
}

/// Reduce an already lowercased word to its stem.
pub fn stem(word: &str) -> String {
    STEMMER.stem(word).into_owned()
}

/// Lazy term stream over borrowed content.
///
/// Rules, tried in order at each position after skipping whitespace:
/// a run of decimal digits (`\p{Nd}`) is emitted verbatim, a run of letters
/// (`\p{L}`, plus decimal digits after the first letter) is lowercased and
/// stemmed, anything else is emitted as a single-character term. A leading
/// digit always wins, so `"3d"` lexes as `"3"` then `"d"`. Other numeric
/// characters such as `²` or `½` are single-character terms.
pub struct Lexer<'a> {
    content: &'a str,
    position: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(content: &'a str) -> Self {
        Self { content, position: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.content[self.position..]
    }

    fn trim_left(&mut self) {
        let rest = self.rest();
        let trimmed = rest.trim_start_matches(char::is_whitespace);
        self.position += rest.len() - trimmed.len();
    }

    /// Consume the match of an anchored `pattern` at the current position.
    fn chop(&mut self, pattern: &Regex) -> Option<&'a str> {
        let rest = self.rest();
        let m = pattern.find(rest)?;
        self.position += m.end();
        Some(&rest[..m.end()])
    }
}

impl Iterator for Lexer<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        self.trim_left();
        let c = self.rest().chars().next()?;

        if let Some(number) = self.chop(&NUMBER) {
            return Some(number.to_string());
        }

        if let Some(word) = self.chop(&WORD) {
            return Some(stem(&word.to_lowercase()));
        }

        self.position += c.len_utf8();
        Some(c.to_string())
    }
}

impl std::iter::FusedIterator for Lexer<'_> {}

/// Collect every term of `text`.
pub fn tokenize(text: &str) -> Vec<String> {
    Lexer::new(text).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_tokenize() {
        let t = tokenize("Running, runs run!");
        assert_eq!(t, vec!["run", ",", "run", "run", "!"]);
    }

    #[test]
    fn lexer_is_fused() {
        let mut lexer = Lexer::new("a");
        assert_eq!(lexer.next().as_deref(), Some("a"));
        assert_eq!(lexer.next(), None);
        assert_eq!(lexer.next(), None);
    }

    #[test]
    fn whitespace_only_yields_nothing() {
        assert!(tokenize(" \t\r\n  ").is_empty());
        assert!(tokenize("").is_empty());
    }
}
