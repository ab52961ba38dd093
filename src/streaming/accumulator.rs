use std::pin::Pin;
use std::task::{Context, Poll, ready};

use futures::{Stream, StreamExt};
use serde::Serialize;

use crate::error::{ClientError, Result};
use crate::metrics::STREAM_METRICS;
use crate::models::events::{ChunkErrorKind, StreamChunk};
use crate::models::response::{ContentBlock, Message, Usage};
use crate::streaming::content::{ContentBlockManager, ResponseBlock, ToolCall};

/// Lifecycle of one streamed message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamState {
    Idle,
    Started,
    Streaming,
    Finished,
    Failed,
}

/// Snapshot of everything reconstructed from a stream so far
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccumulatedResponse {
    pub id: String,
    pub model: String,
    pub role: String,
    pub content: Vec<ResponseBlock>,
    pub stop_reason: Option<String>,
    pub stop_sequence: Option<String>,
    pub usage: Usage,
    pub tool_calls: Vec<ToolCall>,
    pub state: StreamState,
    /// `message_stop` was observed; false for truncated and failed streams
    pub completed: bool,
    pub failed: bool,
    pub failure: Option<String>,
    /// Frames that could not be decoded and were skipped
    pub decode_errors: usize,
}

impl AccumulatedResponse {
    /// Concatenated text of all text blocks
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|b| match b {
                ResponseBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Convert a completed stream into the non-streaming response shape
    pub fn to_message(&self) -> Option<Message> {
        if !self.completed {
            return None;
        }

        let content = self
            .content
            .iter()
            .map(|block| match block {
                ResponseBlock::Text { text } => ContentBlock::Text { text: text.clone() },
                ResponseBlock::ToolUse { id, name, input } => ContentBlock::ToolUse {
                    id: id.clone(),
                    name: name.clone(),
                    input: input.clone(),
                },
                ResponseBlock::Other { .. } => ContentBlock::Unsupported,
            })
            .collect();

        Some(Message {
            id: self.id.clone(),
            model: self.model.clone(),
            role: self.role.clone(),
            content,
            stop_reason: self.stop_reason.clone(),
            stop_sequence: self.stop_sequence.clone(),
            usage: self.usage,
        })
    }
}

/// Incremental reconstruction of a streamed message.
///
/// Decode errors are counted and skipped. Server `error` events, transport
/// failures and protocol violations move the accumulator to
/// [`StreamState::Failed`], keeping whatever was assembled.
#[derive(Debug)]
pub struct MessageAccumulator {
    state: StreamState,
    id: String,
    model: String,
    blocks: ContentBlockManager,
    tool_calls: Vec<ToolCall>,
    stop_reason: Option<String>,
    stop_sequence: Option<String>,
    usage: Usage,
    failure: Option<String>,
    decode_errors: usize,
}

impl MessageAccumulator {
    pub fn new() -> Self {
        Self {
            state: StreamState::Idle,
            id: String::new(),
            model: String::new(),
            blocks: ContentBlockManager::new(),
            tool_calls: Vec::new(),
            stop_reason: None,
            stop_sequence: None,
            usage: Usage::default(),
            failure: None,
            decode_errors: 0,
        }
    }

    /// Fold one chunk into the aggregate.
    ///
    /// Returns `Err` only for protocol-sequence violations; the accumulator is
    /// then failed and ignores further chunks.
    pub fn apply(&mut self, chunk: &StreamChunk) -> Result<()> {
        if matches!(self.state, StreamState::Finished | StreamState::Failed) {
            tracing::debug!(event = %chunk.event_name(), state = ?self.state, "Ignoring chunk after end of stream");
            return Ok(());
        }

        let result = self.transition(chunk);
        if let Err(e) = &result {
            tracing::warn!(error = %e, "Protocol violation, stream state no longer trusted");
            STREAM_METRICS.record_protocol_error();
            self.fail(e.to_string());
        }
        result
    }

    fn transition(&mut self, chunk: &StreamChunk) -> Result<()> {
        match chunk {
            StreamChunk::MessageStart {
                id,
                model,
                input_tokens,
            } => {
                if self.state != StreamState::Idle {
                    tracing::warn!(id = %id, "Ignoring repeated message_start");
                    return Ok(());
                }
                self.id = id.clone();
                self.model = model.clone();
                self.usage.input_tokens = *input_tokens;
                self.state = StreamState::Started;
                tracing::debug!(id = %id, model = %model, input_tokens, "Message started");
            }
            StreamChunk::ContentBlockStart { index, block } => {
                self.require_started(*index, "content_block_start")?;
                self.blocks.start(*index, block.clone())?;
                self.state = StreamState::Streaming;
            }
            StreamChunk::ContentBlockDelta { index, delta } => {
                self.require_started(*index, "content_block_delta")?;
                self.blocks.append(*index, delta)?;
            }
            StreamChunk::ContentBlockStop { index } => {
                self.require_started(*index, "content_block_stop")?;
                if let Some(call) = self.blocks.stop(*index)? {
                    self.tool_calls.push(call);
                }
            }
            StreamChunk::MessageDelta {
                stop_reason,
                stop_sequence,
                output_tokens,
            } => {
                self.require_message("message_delta")?;
                if stop_reason.is_some() {
                    self.stop_reason = stop_reason.clone();
                }
                if stop_sequence.is_some() {
                    self.stop_sequence = stop_sequence.clone();
                }
                // Last write wins; the field carries a running total, not an increment
                if let Some(tokens) = output_tokens {
                    self.usage.output_tokens = *tokens;
                }
            }
            StreamChunk::MessageStop => {
                self.require_message("message_stop")?;
                self.state = StreamState::Finished;
                STREAM_METRICS.record_completed();
                tracing::debug!(
                    id = %self.id,
                    blocks = self.blocks.len(),
                    tool_calls = self.tool_calls.len(),
                    output_tokens = self.usage.output_tokens,
                    "Message finished"
                );
            }
            StreamChunk::Error {
                kind: ChunkErrorKind::Decode,
                ..
            } => {
                self.decode_errors += 1;
            }
            StreamChunk::Error {
                kind: ChunkErrorKind::Api { error_type },
                message,
            } => {
                self.fail(format!("{}: {}", error_type, message));
            }
            StreamChunk::Ping | StreamChunk::Unknown { .. } => {}
        }

        Ok(())
    }

    fn require_started(&self, index: usize, event: &'static str) -> Result<()> {
        if self.state == StreamState::Idle {
            return Err(ClientError::ProtocolSequence {
                index,
                event,
                reason: "message_start not received",
            });
        }
        Ok(())
    }

    fn require_message(&self, event: &'static str) -> Result<()> {
        if self.state == StreamState::Idle {
            return Err(ClientError::MessageSequence {
                event,
                reason: "message_start not received",
            });
        }
        Ok(())
    }

    /// Mark the stream failed, keeping the partial aggregate
    pub fn fail(&mut self, reason: impl Into<String>) {
        if matches!(self.state, StreamState::Finished | StreamState::Failed) {
            return;
        }
        let reason = reason.into();
        tracing::warn!(id = %self.id, reason = %reason, "Stream failed");
        STREAM_METRICS.record_failed();
        self.failure = Some(reason);
        self.state = StreamState::Failed;
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn is_completed(&self) -> bool {
        self.state == StreamState::Finished
    }

    pub fn is_failed(&self) -> bool {
        self.state == StreamState::Failed
    }

    /// Whether `output_tokens` is final: a `message_delta` with a stop reason was seen
    pub fn is_usage_final(&self) -> bool {
        self.stop_reason.is_some()
    }

    pub fn usage(&self) -> Usage {
        self.usage
    }

    pub fn snapshot(&self) -> AccumulatedResponse {
        AccumulatedResponse {
            id: self.id.clone(),
            model: self.model.clone(),
            role: "assistant".to_string(),
            content: self.blocks.response_blocks(),
            stop_reason: self.stop_reason.clone(),
            stop_sequence: self.stop_sequence.clone(),
            usage: self.usage,
            tool_calls: self.tool_calls.clone(),
            state: self.state,
            completed: self.is_completed(),
            failed: self.is_failed(),
            failure: self.failure.clone(),
            decode_errors: self.decode_errors,
        }
    }

    /// Consume the accumulator, moving the assembled state out without cloning
    pub fn into_response(self) -> AccumulatedResponse {
        let completed = self.is_completed();
        let failed = self.is_failed();
        AccumulatedResponse {
            id: self.id,
            model: self.model,
            role: "assistant".to_string(),
            content: self.blocks.response_blocks(),
            stop_reason: self.stop_reason,
            stop_sequence: self.stop_sequence,
            usage: self.usage,
            tool_calls: self.tool_calls,
            state: self.state,
            completed,
            failed,
            failure: self.failure,
            decode_errors: self.decode_errors,
        }
    }
}

impl Default for MessageAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

/// Pass-through stream that folds every chunk into a [`MessageAccumulator`]
/// before handing it to the caller.
///
/// The aggregate is readable at any time through
/// [`final_response`](Self::final_response). Dropping the stream early closes
/// the transport; the snapshot then reports `completed == false`.
pub struct MessageStream<S> {
    inner: S,
    accumulator: MessageAccumulator,
    done: bool,
}

impl<S> MessageStream<S> {
    pub fn attach(inner: S) -> Self {
        Self {
            inner,
            accumulator: MessageAccumulator::new(),
            done: false,
        }
    }

    /// Current aggregate; final once the stream returned `None`
    pub fn final_response(&self) -> AccumulatedResponse {
        self.accumulator.snapshot()
    }

    pub fn state(&self) -> StreamState {
        self.accumulator.state()
    }

    pub fn is_completed(&self) -> bool {
        self.accumulator.is_completed()
    }

    pub fn is_failed(&self) -> bool {
        self.accumulator.is_failed()
    }
}

impl<S> MessageStream<S>
where
    S: Stream<Item = Result<StreamChunk>> + Unpin,
{
    /// Drain the remaining chunks and return the aggregate.
    ///
    /// Early upstream closure is not an error; check `completed`.
    pub async fn collect_response(mut self) -> Result<AccumulatedResponse> {
        while let Some(item) = self.next().await {
            item?;
        }
        Ok(self.accumulator.into_response())
    }
}

impl<S> Stream for MessageStream<S>
where
    S: Stream<Item = Result<StreamChunk>> + Unpin,
{
    type Item = Result<StreamChunk>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }

        let item = ready!(Pin::new(&mut this.inner).poll_next(cx));
        Poll::Ready(step(&mut this.accumulator, &mut this.done, item))
    }
}

/// Blocking counterpart of [`MessageStream`]
pub struct AccumulatingIter<I> {
    inner: I,
    accumulator: MessageAccumulator,
    done: bool,
}

impl<I> AccumulatingIter<I> {
    pub fn attach(inner: I) -> Self {
        Self {
            inner,
            accumulator: MessageAccumulator::new(),
            done: false,
        }
    }

    pub fn final_response(&self) -> AccumulatedResponse {
        self.accumulator.snapshot()
    }

    pub fn is_completed(&self) -> bool {
        self.accumulator.is_completed()
    }

    pub fn is_failed(&self) -> bool {
        self.accumulator.is_failed()
    }
}

impl<I> Iterator for AccumulatingIter<I>
where
    I: Iterator<Item = Result<StreamChunk>>,
{
    type Item = Result<StreamChunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = self.inner.next();
        step(&mut self.accumulator, &mut self.done, item)
    }
}

/// Shared pull step: fold, or record how the upstream ended
fn step(
    accumulator: &mut MessageAccumulator,
    done: &mut bool,
    item: Option<Result<StreamChunk>>,
) -> Option<Result<StreamChunk>> {
    match item {
        Some(Ok(chunk)) => match accumulator.apply(&chunk) {
            Ok(()) => Some(Ok(chunk)),
            Err(e) => {
                *done = true;
                Some(Err(e))
            }
        },
        Some(Err(e)) => {
            *done = true;
            accumulator.fail(e.to_string());
            Some(Err(e))
        }
        None => {
            *done = true;
            if !accumulator.is_completed() && !accumulator.is_failed() {
                tracing::warn!(state = ?accumulator.state(), "Stream closed before message_stop");
                STREAM_METRICS.record_truncated();
            }
            None
        }
    }
}
