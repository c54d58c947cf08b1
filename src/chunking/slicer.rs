//! Fixed-size slicing, not token-aware.

use super::tokenizer::Tokenizer;
use super::{Chunk, ChunkSet};
use crate::errors::ChunkError;
use crate::message::HasAuthorAndContent;

/// Split `items` into contiguous runs of `chunk_size` elements. The last run
/// may be shorter. An empty input yields no slices.
pub fn fixed_slices<T>(items: &[T], chunk_size: usize) -> Result<Vec<&[T]>, ChunkError> {
    if chunk_size == 0 {
        return Err(ChunkError::InvalidChunkSize);
    }
    Ok(items.chunks(chunk_size).collect())
}

/// Fixed-count chunking over valid messages, producing the same
/// [`ChunkSet`] shape as the token-budget chunker so callers can switch
/// modes without changing how they consume the result.
pub fn chunk_by_fixed_count<'a, M, T>(
    messages: &'a [M],
    chunk_size: usize,
    tokenizer: &T,
) -> Result<ChunkSet<'a, M>, ChunkError>
where
    M: HasAuthorAndContent,
    T: Tokenizer + ?Sized,
{
    let valid: Vec<(&'a M, String)> = messages
        .iter()
        .filter_map(|m| m.formatted_line().map(|line| (m, line)))
        .collect();

    let mut chunks = Vec::new();
    for slice in fixed_slices(&valid, chunk_size)? {
        let text: String = slice.iter().map(|(_, line)| line.as_str()).collect();
        let start = slice.first().map(|(m, _)| *m);
        chunks.push(Chunk::new(text, slice.len(), start, tokenizer));
    }
    if chunks.is_empty() {
        chunks.push(Chunk::new(String::new(), 0, None, tokenizer));
    }

    let input_tokens = chunks.iter().map(|c| c.token_count).sum();
    Ok(ChunkSet {
        chunks,
        last: valid.last().map(|(m, _)| *m),
        input_tokens,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::test_support::{Msg, chars, msg};

    #[test]
    fn test_fixed_slices_last_may_be_shorter() {
        let items: Vec<u32> = (1..=7).collect();
        let slices = fixed_slices(&items, 3).unwrap();
        assert_eq!(slices, vec![&[1, 2, 3][..], &[4, 5, 6][..], &[7][..]]);
    }

    #[test]
    fn test_fixed_slices_exact_multiple() {
        let items = ["a", "b", "c", "d"];
        let slices = fixed_slices(&items, 2).unwrap();
        assert_eq!(slices.len(), 2);
        assert_eq!(slices[1], &["c", "d"]);
    }

    #[test]
    fn test_fixed_slices_empty_and_zero() {
        let empty: Vec<u8> = Vec::new();
        assert!(fixed_slices(&empty, 5).unwrap().is_empty());
        assert!(matches!(
            fixed_slices(&[1, 2], 0),
            Err(ChunkError::InvalidChunkSize)
        ));
    }

    #[test]
    fn test_fixed_count_skips_invalid_messages() {
        let messages = vec![
            msg("a", "1"),
            Msg {
                id: "bad".into(),
                author: None,
                content: Some("x".into()),
            },
            msg("b", "2"),
            msg("c", "3"),
        ];
        let set = chunk_by_fixed_count(&messages, 2, &chars).unwrap();
        assert_eq!(set.message_counts(), vec![2, 1]);
        assert_eq!(set.texts(), vec!["a: 1\nb: 2\n", "c: 3\n"]);
        assert_eq!(set.input_tokens, 15);
        assert_eq!(set.boundaries().len(), 3);
    }

    #[test]
    fn test_fixed_count_empty_input_yields_one_empty_chunk() {
        let empty: Vec<Msg> = Vec::new();
        let set = chunk_by_fixed_count(&empty, 10, &chars).unwrap();
        assert_eq!(set.len(), 1);
        assert!(set.is_empty_of_messages());
        assert!(set.last.is_none());
    }
}
