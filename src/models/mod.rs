pub mod events;
pub mod request;
pub mod response;

pub use events::{BlockDelta, BlockKind, ChunkErrorKind, StreamChunk};
pub use request::{
    InputMessage, JsonSchema, MessageContent, MessageRequest, MessageRequestBuilder, Role, Tool,
    ToolChoice,
};
pub use response::{ContentBlock, Message, Usage};
