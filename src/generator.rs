//! Sentence generation by repeatedly sampling successors of the trailing context.

use log::debug;
use rand::Rng;
use rusqlite::Connection;

use crate::config::GeneratorConfig;
use crate::context::{Context, Successor};
use crate::error::{MarkovError, Result};
use crate::sampler::sample_successor;
use crate::tokenizer::tokenize_owned;

/// Extends `prompt` until the chain reaches an end of message or a context with no successor.
///
/// Sampling is restricted to rows from `author` when given. The result is the plain
/// concatenation of prompt and generated tokens; tokens carry their own whitespace.
///
/// # Errors
///
/// * [`MarkovError::CannotExtrapolate`] when `prompt` is non-empty and its trailing
///   context has no successor at all. An empty prompt with no successor yields `""` instead.
/// * [`MarkovError::RunawayGeneration`] once more than `cfg.max_tokens` tokens accumulate.
pub fn generate<R: Rng + ?Sized>(
    conn: &Connection,
    prompt: &str,
    author: Option<&str>,
    cfg: &GeneratorConfig,
    rng: &mut R,
) -> Result<String> {
    cfg.validate()?;
    let mut tokens = tokenize_owned(prompt);
    let mut first_draw = true;

    loop {
        if tokens.len() > cfg.max_tokens {
            return Err(MarkovError::RunawayGeneration {
                limit: cfg.max_tokens,
            });
        }
        let context = Context::from_tail(tokens.as_slice());
        match sample_successor(conn, &context, author, rng)? {
            Some(Successor::Token(token)) => tokens.push(token),
            Some(Successor::End) => break,
            None if first_draw && !prompt.is_empty() => {
                return Err(MarkovError::CannotExtrapolate {
                    prompt: prompt.to_owned(),
                });
            }
            None => break,
        }
        first_draw = false;
    }

    debug!("generated {} tokens from prompt {prompt:?}", tokens.len());
    Ok(tokens.concat())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_MAX_TOKENS;
    use crate::ingest::insert_message_entries;
    use crate::message::Message;
    use crate::store::{insert_entry, open_in_memory};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn corpus(texts: &[&str]) -> Connection {
        let conn = open_in_memory().unwrap();
        for (idx, text) in texts.iter().enumerate() {
            insert_message_entries(&conn, &Message::new(format!("m{idx}"), "u1", *text)).unwrap();
        }
        conn
    }

    fn run(conn: &Connection, prompt: &str, seed: u64) -> Result<String> {
        let mut rng = StdRng::seed_from_u64(seed);
        generate(conn, prompt, None, &GeneratorConfig::default(), &mut rng)
    }

    #[test]
    fn empty_corpus_and_empty_prompt_yield_empty_string() {
        let conn = open_in_memory().unwrap();
        assert_eq!(run(&conn, "", 1).unwrap(), "");
    }

    #[test]
    fn single_path_is_deterministic() {
        let conn = corpus(&["a b c"]);
        for seed in 0..20 {
            assert_eq!(run(&conn, "a", seed).unwrap(), "a b c");
        }
    }

    #[test]
    fn empty_prompt_reproduces_only_message() {
        let conn = corpus(&["hello there, friend"]);
        assert_eq!(run(&conn, "", 9).unwrap(), "hello there, friend");
    }

    #[test]
    fn unknown_prompt_cannot_extrapolate() {
        let conn = corpus(&["a b c"]);
        let err = run(&conn, "xyzzy", 4).unwrap_err();
        assert!(matches!(
            err,
            MarkovError::CannotExtrapolate { ref prompt } if prompt == "xyzzy"
        ));
    }

    #[test]
    fn prompt_ending_a_message_returns_prompt() {
        let conn = corpus(&["a b c"]);
        assert_eq!(run(&conn, "a b c", 5).unwrap(), "a b c");
    }

    #[test]
    fn acyclic_corpus_terminates_under_cap() {
        let conn = corpus(&[
            "the cat sat on the mat.",
            "the dog sat on the log.",
            "a cat and a dog met.",
        ]);
        for seed in 0..25 {
            let sentence = run(&conn, "", seed).unwrap();
            assert!(tokenize_owned(&sentence).len() <= DEFAULT_MAX_TOKENS);
            assert!(sentence.ends_with('.'));
        }
    }

    #[test]
    fn deterministic_cycle_is_reported_as_runaway() {
        let conn = open_in_memory().unwrap();
        // "x" always follows four "x" tokens, so generation never ends.
        let start = Context::empty();
        insert_entry(&conn, "loop", "u1", &start, &Successor::Token("x".into())).unwrap();
        let mut ctx = start;
        for _ in 0..4 {
            ctx.push("x");
            insert_entry(&conn, "loop", "u1", &ctx, &Successor::Token("x".into())).unwrap();
        }

        let err = run(&conn, "", 11).unwrap_err();
        assert!(matches!(err, MarkovError::RunawayGeneration { limit: 1000 }));
    }

    #[test]
    fn smaller_cap_trips_earlier() {
        let conn = corpus(&["one two three four five six"]);
        let cfg = GeneratorConfig::builder().max_tokens(4).build().unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let err = generate(&conn, "", None, &cfg, &mut rng).unwrap_err();
        assert!(matches!(err, MarkovError::RunawayGeneration { limit: 4 }));
    }

    #[test]
    fn author_scope_is_respected() {
        let conn = open_in_memory().unwrap();
        insert_message_entries(&conn, &Message::new("m1", "alice", "hi alice")).unwrap();
        insert_message_entries(&conn, &Message::new("m2", "bob", "hi bob")).unwrap();
        let mut rng = StdRng::seed_from_u64(8);
        for _ in 0..10 {
            let sentence =
                generate(&conn, "", Some("bob"), &GeneratorConfig::default(), &mut rng).unwrap();
            assert_eq!(sentence, "hi bob");
        }
        let err = generate(&conn, "hi", Some("carol"), &GeneratorConfig::default(), &mut rng)
            .unwrap_err();
        assert!(matches!(err, MarkovError::CannotExtrapolate { .. }));
    }
}
