//! Lossless tokenization of message text.
//!
//! Every code point falls into exactly one of three classes, checked in order:
//!
//! 1. Unicode separators (`\p{Z}`), grouped into maximal runs;
//! 2. punctuation and symbols (`\p{P}`, `\p{S}`), one token per character;
//! 3. everything else, grouped into maximal runs (this includes control characters such as `\n`).
//!
//! Because the classes partition the code points, the yielded tokens always
//! concatenate back to the input.

use std::sync::OnceLock;

use regex::Regex;

const TOKEN_PATTERN: &str = r"\p{Z}+|[\p{P}\p{S}]|[^\p{P}\p{S}\p{Z}]+";

/// Lexical class of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// One or more separator characters (spaces, line/paragraph separators).
    Separator,
    /// A single punctuation or symbol character.
    Punctuation,
    /// A maximal run of any other characters.
    Word,
}

struct Patterns {
    token: Regex,
    separator: Regex,
    punctuation: Regex,
}

static PATTERNS: OnceLock<Patterns> = OnceLock::new();

fn patterns() -> &'static Patterns {
    PATTERNS.get_or_init(|| Patterns {
        token: Regex::new(TOKEN_PATTERN).expect("token pattern is valid"),
        separator: Regex::new(r"^\p{Z}").expect("separator pattern is valid"),
        punctuation: Regex::new(r"^[\p{P}\p{S}]").expect("punctuation pattern is valid"),
    })
}

/// Lazily tokenizes `text`.
///
/// The returned iterator borrows from `text`; clone it to restart from the current position.
#[must_use]
pub fn tokenize(text: &str) -> Tokens<'_> {
    Tokens { text, pos: 0 }
}

/// Convenience wrapper collecting [`tokenize`] into owned strings.
#[must_use]
pub fn tokenize_owned(text: &str) -> Vec<String> {
    tokenize(text).map(str::to_owned).collect()
}

/// Returns the class of a non-empty token produced by [`tokenize`].
///
/// Only the first character is inspected; an empty string is reported as [`TokenKind::Word`].
#[must_use]
pub fn classify(token: &str) -> TokenKind {
    let patterns = patterns();
    if patterns.separator.is_match(token) {
        TokenKind::Separator
    } else if patterns.punctuation.is_match(token) {
        TokenKind::Punctuation
    } else {
        TokenKind::Word
    }
}

/// Iterator over the tokens of a string slice. See [`tokenize`].
#[derive(Debug, Clone)]
pub struct Tokens<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Iterator for Tokens<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.text.len() {
            return None;
        }
        let found = patterns().token.find_at(self.text, self.pos)?;
        debug_assert_eq!(found.start(), self.pos, "token classes must cover every code point");
        self.pos = found.end();
        Some(found.as_str())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.text.len() - self.pos;
        (usize::from(remaining > 0), Some(remaining))
    }
}

impl std::iter::FusedIterator for Tokens<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn tokens(text: &str) -> Vec<&str> {
        tokenize(text).collect()
    }

    #[test]
    fn splits_words_separators_and_punctuation() {
        assert_eq!(
            tokens("hello,  world!"),
            vec!["hello", ",", "  ", "world", "!"]
        );
    }

    #[test]
    fn punctuation_is_never_merged() {
        assert_eq!(tokens("?!..."), vec!["?", "!", ".", ".", "."]);
        assert_eq!(tokens("a+=b"), vec!["a", "+", "=", "b"]);
    }

    #[test]
    fn unicode_separators_group_into_runs() {
        assert_eq!(
            tokens("hi\u{2003}\u{00A0} there"),
            vec!["hi", "\u{2003}\u{00A0} ", "there"]
        );
    }

    #[test]
    fn newlines_belong_to_word_runs() {
        assert_eq!(tokens("a\nb c"), vec!["a\nb", " ", "c"]);
    }

    #[test]
    fn emoji_and_currency_are_symbols() {
        assert_eq!(tokens("5€ 🎉ok"), vec!["5", "€", " ", "🎉", "ok"]);
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert_eq!(tokenize("").count(), 0);
    }

    #[test]
    fn iterator_is_restartable() {
        let mut iter = tokenize("one two");
        assert_eq!(iter.next(), Some("one"));
        let resumed = iter.clone();
        assert_eq!(iter.collect::<Vec<_>>(), vec![" ", "two"]);
        assert_eq!(resumed.collect::<Vec<_>>(), vec![" ", "two"]);
    }

    #[test]
    fn classify_reports_kinds() {
        assert_eq!(classify("   "), TokenKind::Separator);
        assert_eq!(classify("'"), TokenKind::Punctuation);
        assert_eq!(classify("$"), TokenKind::Punctuation);
        assert_eq!(classify("word"), TokenKind::Word);
        assert_eq!(classify("\t"), TokenKind::Word);
    }

    #[test]
    fn fixed_inputs_round_trip() {
        let samples = [
            "",
            " ",
            "plain",
            "  leading and trailing  ",
            "mixed\u{3000}ideographic\u{2028}line sep",
            "naïve café — “quoted” text…",
            "emoji 👩‍👩‍👧 with ZWJ",
            "tabs\tand\r\nCRLF",
            "日本語のテキスト、句読点。",
            "combining e\u{0301} accent",
        ];
        for sample in samples {
            let joined: String = tokenize(sample).collect();
            assert_eq!(joined, sample);
        }
    }

    #[test]
    fn random_inputs_round_trip() {
        let alphabet: Vec<char> = "ab Z9,.!?\u{00A0}\u{2003}\n\t€😀é\u{0301}-_'\"日"
            .chars()
            .collect();
        let mut rng = StdRng::seed_from_u64(0x746f_6b65);
        for _ in 0..500 {
            let len = rng.gen_range(0..40);
            let text: String = (0..len)
                .map(|_| alphabet[rng.gen_range(0..alphabet.len())])
                .collect();
            let parts = tokens(&text);
            assert!(parts.iter().all(|part| !part.is_empty()));
            assert_eq!(parts.concat(), text);
            assert_eq!(
                parts.iter().map(|part| part.chars().count()).sum::<usize>(),
                text.chars().count()
            );
        }
    }

    #[test]
    fn adjacent_runs_alternate_kinds() {
        let parts = tokens("foo bar, baz");
        for pair in parts.windows(2) {
            let (left, right) = (classify(pair[0]), classify(pair[1]));
            if left != TokenKind::Punctuation && right != TokenKind::Punctuation {
                assert_ne!(left, right, "runs of one kind must be maximal");
            }
        }
    }
}
