//! Summary pipelines.
//!
//! | Module     | Purpose                                                      |
//! |------------|--------------------------------------------------------------|
//! | `period`   | Time periods (`1d`, `6h`) and request timestamps             |
//! | `channels` | Guild/channel selection, skip rules, topic tags              |
//! | `pipeline` | Token-mode summary: chunk, head, fan out, reassemble         |
//! | `history`  | Window-mode summary of one channel with prior context        |
//! | `payload`  | `SummaryRequest` and the multi-guild summary it drives       |
//! | `digest`   | Guild digests posted into a target channel                   |

pub mod channels;
pub mod digest;
pub mod history;
pub mod payload;
pub mod period;
pub mod pipeline;

pub use channels::{ChannelFilter, Criteria, IdOrName, SkipReason, select_channels, tagged_channels};
pub use digest::{DigestOptions, summarize_all, summarize_to_channel};
pub use history::{channel_lines, summarize_channel_between};
pub use payload::{PayloadSettings, SummaryRequest, SummaryWindow, summary_from_payload};
pub use period::{parse_endtime, parse_time_period, time_for_dating_back};
pub use pipeline::{SummaryPipeline, SummaryReport, info_block, resolve_budget};
