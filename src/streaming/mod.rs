pub mod accumulator;
pub mod content;
pub mod parser;
pub mod sse;

pub use accumulator::{
    AccumulatedResponse, AccumulatingIter, MessageAccumulator, MessageStream, StreamState,
};
pub use content::{BlockSlot, ContentBlockManager, ResponseBlock, ToolCall, ToolInputBuffer};
pub use parser::{ChunkIter, ChunkStream, EventDecoder, parse_frame};
pub use sse::{SseDecoder, SseFrame, format_event};
