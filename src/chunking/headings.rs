//! Per-chunk headings.

use super::ChunkSet;
use crate::message::{Linkable, message_link};

/// Format one heading.
pub fn heading_for(from_link: &str, to_link: &str, message_count: usize) -> String {
    format!(
        "Summary from **{}** to **{}**. This summary contains __{}__ messages.\n\n",
        from_link, to_link, message_count
    )
}

/// One heading per consecutive pair of chunk boundaries, linking the first
/// message of a chunk to the first message of the next (or to the last
/// message consumed, for the final chunk).
pub fn generate_headings<M: Linkable>(
    guild_id: &str,
    channel_id: &str,
    set: &ChunkSet<'_, M>,
) -> Vec<String> {
    let boundaries = set.boundaries();
    boundaries
        .windows(2)
        .zip(set.chunks.iter())
        .map(|(pair, chunk)| {
            heading_for(
                &message_link(guild_id, channel_id, pair[0].message_id()),
                &message_link(guild_id, channel_id, pair[1].message_id()),
                chunk.message_count,
            )
        })
        .collect()
}
