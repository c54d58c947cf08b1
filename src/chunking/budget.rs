//! Token-budget chunking.

use tracing::debug;

use super::tokenizer::Tokenizer;
use super::{Chunk, ChunkSet};
use crate::errors::ChunkError;
use crate::message::HasAuthorAndContent;

/// Group messages into chunks whose estimated token count stays within
/// `token_budget`.
///
/// A chunk is closed the moment appending the next serialized line would
/// push the running chunk over budget; that message opens the next chunk.
/// A message whose own line exceeds the budget still gets a chunk of its
/// own, so every call makes progress. Messages missing author or content
/// are skipped.
///
/// The final chunk is always emitted, so zero valid messages yield one
/// empty chunk. `input_tokens` is a fresh tokenization of every closed
/// chunk, not the running tally used for cut decisions.
pub fn chunk_by_token_budget<'a, M, T>(
    messages: &'a [M],
    token_budget: usize,
    tokenizer: &T,
) -> Result<ChunkSet<'a, M>, ChunkError>
where
    M: HasAuthorAndContent,
    T: Tokenizer + ?Sized,
{
    if token_budget == 0 {
        return Err(ChunkError::InvalidBudget {
            budget: token_budget,
        });
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut count = 0usize;
    let mut start: Option<&'a M> = None;
    let mut last: Option<&'a M> = None;
    let mut skipped = 0usize;

    for message in messages {
        let Some(line) = message.formatted_line() else {
            debug!("Skipping message without author or content");
            skipped += 1;
            continue;
        };

        let previous_len = current.len();
        current.push_str(&line);
        if previous_len > 0 && tokenizer.count_tokens(&current) > token_budget {
            current.truncate(previous_len);
            debug!(
                chunk = chunks.len(),
                messages = count,
                "Chunk reached token budget"
            );
            chunks.push(Chunk::new(
                std::mem::take(&mut current),
                count,
                start.take(),
                tokenizer,
            ));
            count = 0;
            current.push_str(&line);
        }

        if start.is_none() {
            start = Some(message);
        }
        count += 1;
        last = Some(message);
    }

    chunks.push(Chunk::new(current, count, start, tokenizer));

    let input_tokens = chunks.iter().map(|c| c.token_count).sum();

    debug!(
        chunks = chunks.len(),
        messages = messages.len(),
        skipped,
        input_tokens,
        "Chunked messages by token budget"
    );

    Ok(ChunkSet {
        chunks,
        last,
        input_tokens,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::CharRatioTokenizer;
    use crate::chunking::test_support::{Msg, chars, msg};

    #[test]
    fn test_single_chunk_when_budget_is_large() {
        let messages = vec![
            msg("alice", "hi"),
            msg("bob", "hello there"),
            msg("alice", "bye"),
        ];
        let set = chunk_by_token_budget(&messages, 10_000, &chars).unwrap();

        assert_eq!(set.len(), 1);
        assert_eq!(set.message_counts(), vec![3]);
        assert_eq!(set.starts().len(), 1);
        assert_eq!(set.starts()[0].content, Some("hi".to_string()));
        assert_eq!(set.texts(), vec!["alice: hi\nbob: hello there\nalice: bye\n"]);
    }

    #[test]
    fn test_split_before_overflowing_message() {
        let messages = vec![
            msg("alice", "hi"),
            msg("bob", "hello there"),
            msg("alice", "bye"),
        ];
        // "alice: hi\n" = 10 chars, "bob: hello there\n" = 17, "alice: bye\n" = 11
        let set = chunk_by_token_budget(&messages, 28, &chars).unwrap();

        assert_eq!(set.message_counts(), vec![2, 1]);
        let starts = set.starts();
        assert_eq!(starts[0].content.as_deref(), Some("hi"));
        assert_eq!(starts[1].content.as_deref(), Some("bye"));
        assert_eq!(set.texts()[1], "alice: bye\n");
    }

    #[test]
    fn test_cut_message_opens_next_chunk() {
        let messages = vec![msg("a", "1234"), msg("b", "5678"), msg("c", "90")];
        // "a: 1234\n" is 8 chars; budget 10 fits one line only
        let set = chunk_by_token_budget(&messages, 10, &chars).unwrap();

        assert_eq!(set.message_counts(), vec![1, 1, 1]);
        assert_eq!(set.texts(), vec!["a: 1234\n", "b: 5678\n", "c: 90\n"]);
        let starts: Vec<_> = set.starts().iter().map(|m| m.author.clone()).collect();
        assert_eq!(starts, vec![Some("a".into()), Some("b".into()), Some("c".into())]);
    }

    #[test]
    fn test_oversized_message_gets_its_own_chunk() {
        let long = "x".repeat(100);
        let messages = vec![msg("a", "hi"), msg("b", &long), msg("c", "yo")];
        let set = chunk_by_token_budget(&messages, 20, &chars).unwrap();

        assert_eq!(set.message_counts(), vec![1, 1, 1]);
        assert!(chars(&set.texts()[1]) > 20);
    }

    #[test]
    fn test_oversized_first_message_is_not_split() {
        let long = "y".repeat(50);
        let messages = vec![msg("a", &long)];
        let set = chunk_by_token_budget(&messages, 5, &chars).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.message_counts(), vec![1]);
    }

    #[test]
    fn test_invalid_messages_are_skipped() {
        let messages = vec![
            msg("alice", "hi"),
            Msg {
                author: None,
                content: Some("ghost".into()),
                id: "x".into(),
            },
            Msg {
                author: Some("bob".into()),
                content: None,
                id: "y".into(),
            },
            msg("carol", "yo"),
        ];
        let set = chunk_by_token_budget(&messages, 1_000, &chars).unwrap();

        assert_eq!(set.message_total(), 2);
        assert_eq!(set.texts(), vec!["alice: hi\ncarol: yo\n"]);
        assert_eq!(set.last.map(|m| m.id.as_str()), Some("carol:yo"));
    }

    #[test]
    fn test_zero_valid_messages_yield_one_empty_chunk() {
        let empty: Vec<Msg> = Vec::new();
        let set = chunk_by_token_budget(&empty, 100, &chars).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.message_counts(), vec![0]);
        assert!(set.starts().is_empty());
        assert_eq!(set.input_tokens, 0);
        assert!(set.is_empty_of_messages());
    }

    #[test]
    fn test_zero_budget_is_rejected() {
        let messages = vec![msg("a", "b")];
        let err = chunk_by_token_budget(&messages, 0, &chars).unwrap_err();
        assert!(matches!(err, ChunkError::InvalidBudget { budget: 0 }));
    }

    #[test]
    fn test_input_tokens_is_fresh_sum_per_chunk() {
        let messages: Vec<_> = (0..20).map(|i| msg("user", &format!("message {i}"))).collect();
        let tokenizer = CharRatioTokenizer::new(3);
        let set = chunk_by_token_budget(&messages, 30, &tokenizer).unwrap();
        let expected: usize = set.texts().iter().map(|t| tokenizer.count_tokens(t)).sum();
        assert_eq!(set.input_tokens, expected);
    }

    #[test]
    fn test_partition_and_budget_properties() {
        let messages: Vec<_> = (0..57)
            .map(|i| msg(&format!("user{}", i % 5), &"word ".repeat(i % 9 + 1)))
            .collect();
        for budget in [1, 10, 25, 60, 200, 10_000] {
            let set = chunk_by_token_budget(&messages, budget, &chars).unwrap();

            // partition: counts sum to input and texts concatenate back in order
            assert_eq!(set.message_total(), messages.len());
            let expected: String = messages.iter().filter_map(|m| m.formatted_line()).collect();
            assert_eq!(set.texts().concat(), expected);

            // soft budget: only single-message chunks may exceed it
            for chunk in &set.chunks {
                if chunk.message_count > 1 {
                    assert!(chars(&chunk.text) <= budget);
                }
            }

            // boundaries carry one trailing sentinel
            assert_eq!(set.boundaries().len(), set.len() + 1);
        }
    }

    #[test]
    fn test_deterministic() {
        let messages: Vec<_> = (0..30).map(|i| msg("u", &"z".repeat(i))).collect();
        let a = chunk_by_token_budget(&messages, 40, &chars).unwrap();
        let b = chunk_by_token_budget(&messages, 40, &chars).unwrap();
        assert_eq!(a.texts(), b.texts());
        assert_eq!(a.message_counts(), b.message_counts());
        let ids = |s: &ChunkSet<'_, Msg>| s.starts().iter().map(|m| m.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&a), ids(&b));
    }
}
