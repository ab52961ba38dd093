use std::pin::Pin;
use std::task::{Context, Poll, ready};

use futures::Stream;
use serde_json::Value;

use crate::error::{ClientError, Result};
use crate::metrics::STREAM_METRICS;
use crate::models::events::{
    BlockDelta, BlockKind, ChunkErrorKind, ContentBlockDeltaPayload, ContentBlockStartPayload,
    ContentBlockStopPayload, ErrorPayload, MessageDeltaPayload, MessageStartPayload, StreamChunk,
};
use crate::streaming::sse::{SseDecoder, SseFrame};

/// Map one SSE frame to a typed chunk.
///
/// Never fails: an undecodable payload becomes an in-band
/// [`ChunkErrorKind::Decode`] chunk so the caller can keep reading.
pub fn parse_frame(frame: &SseFrame) -> StreamChunk {
    let event = frame.event.as_deref().unwrap_or("<unnamed>");

    match decode_frame(frame) {
        Ok(chunk) => {
            tracing::debug!(event = %chunk.event_name(), "Decoded stream chunk");
            chunk
        }
        Err(e) => {
            tracing::warn!(event = %event, error = %e, "Failed to decode stream frame");
            StreamChunk::Error {
                kind: ChunkErrorKind::Decode,
                message: format!("{}: {}", event, e),
            }
        }
    }
}

fn decode_frame(frame: &SseFrame) -> Result<StreamChunk> {
    let value: Value = serde_json::from_str(&frame.data)?;

    // Payloads repeat the event name in `type`; use it when the event line is missing
    let name = match &frame.event {
        Some(event) => event.clone(),
        None => value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    };

    let chunk = match name.as_str() {
        "message_start" => {
            let payload: MessageStartPayload = serde_json::from_value(value)?;
            StreamChunk::MessageStart {
                id: payload.message.id,
                model: payload.message.model,
                input_tokens: payload.message.usage.input_tokens.unwrap_or(0),
            }
        }
        "content_block_start" => {
            let payload: ContentBlockStartPayload = serde_json::from_value(value)?;
            let block = payload.content_block;
            let kind = match block.block_type.as_str() {
                "text" => BlockKind::Text,
                "tool_use" => BlockKind::ToolUse {
                    id: block.id.ok_or_else(|| {
                        ClientError::StreamDecode("tool_use block without id".into())
                    })?,
                    name: block.name.ok_or_else(|| {
                        ClientError::StreamDecode("tool_use block without name".into())
                    })?,
                },
                _ => BlockKind::Other(block.block_type),
            };
            StreamChunk::ContentBlockStart {
                index: payload.index,
                block: kind,
            }
        }
        "content_block_delta" => {
            let payload: ContentBlockDeltaPayload = serde_json::from_value(value)?;
            StreamChunk::ContentBlockDelta {
                index: payload.index,
                delta: parse_delta(payload.delta)?,
            }
        }
        "content_block_stop" => {
            let payload: ContentBlockStopPayload = serde_json::from_value(value)?;
            StreamChunk::ContentBlockStop {
                index: payload.index,
            }
        }
        "message_delta" => {
            let payload: MessageDeltaPayload = serde_json::from_value(value)?;
            StreamChunk::MessageDelta {
                stop_reason: payload.delta.stop_reason,
                stop_sequence: payload.delta.stop_sequence,
                output_tokens: payload.usage.and_then(|u| u.output_tokens),
            }
        }
        "message_stop" => StreamChunk::MessageStop,
        "ping" => StreamChunk::Ping,
        "error" => {
            let payload: ErrorPayload = serde_json::from_value(value)?;
            StreamChunk::Error {
                kind: ChunkErrorKind::Api {
                    error_type: payload.error.error_type,
                },
                message: payload.error.message,
            }
        }
        _ => StreamChunk::Unknown {
            event: name,
            data: value,
        },
    };

    Ok(chunk)
}

fn parse_delta(delta: Value) -> Result<BlockDelta> {
    let kind = delta
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| ClientError::StreamDecode("delta without type".into()))?;

    let field = |name: &str| {
        delta
            .get(name)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ClientError::StreamDecode(format!("{} without {}", kind, name)))
    };

    match kind {
        "text_delta" => Ok(BlockDelta::Text(field("text")?)),
        "input_json_delta" => Ok(BlockDelta::InputJson(field("partial_json")?)),
        _ => Ok(BlockDelta::Other {
            kind: kind.to_string(),
            raw: delta.clone(),
        }),
    }
}

/// Frame decoder plus chunk mapping, driven one chunk per pull.
///
/// Stops producing after a terminal chunk (`message_stop` or a server
/// `error` event).
#[derive(Debug, Default)]
pub struct EventDecoder {
    sse: SseDecoder,
    finished: bool,
}

impl EventDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.sse.push(bytes);
    }

    /// Next decoded chunk from already-pushed bytes
    pub fn next_chunk(&mut self) -> Option<StreamChunk> {
        if self.finished {
            return None;
        }
        let frame = self.sse.next_frame()?;
        Some(self.emit(&frame))
    }

    /// Signal end of input; returns a chunk for an unterminated final frame
    pub fn finish(&mut self) -> Option<StreamChunk> {
        if self.finished {
            return None;
        }
        let chunk = self.sse.finish().map(|frame| self.emit(&frame));
        self.finished = true;
        chunk
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn emit(&mut self, frame: &SseFrame) -> StreamChunk {
        let chunk = parse_frame(frame);

        STREAM_METRICS.record_frame();
        if chunk.is_decode_error() {
            STREAM_METRICS.record_decode_error();
        }
        if chunk.is_terminal() {
            self.finished = true;
        }

        chunk
    }
}

/// Lazy chunk stream over a transport byte stream.
///
/// Bytes are pulled from upstream only when no complete frame is buffered.
/// A transport failure is yielded once as `Err` and ends the stream.
pub struct ChunkStream<S> {
    inner: S,
    decoder: EventDecoder,
}

impl<S> ChunkStream<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            decoder: EventDecoder::new(),
        }
    }
}

impl<S, B, E> Stream for ChunkStream<S>
where
    S: Stream<Item = std::result::Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Into<ClientError>,
{
    type Item = Result<StreamChunk>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if this.decoder.is_finished() {
                return Poll::Ready(None);
            }

            if let Some(chunk) = this.decoder.next_chunk() {
                return Poll::Ready(Some(Ok(chunk)));
            }

            match ready!(Pin::new(&mut this.inner).poll_next(cx)) {
                Some(Ok(bytes)) => this.decoder.push(bytes.as_ref()),
                Some(Err(e)) => {
                    this.decoder.finished = true;
                    return Poll::Ready(Some(Err(e.into())));
                }
                None => return Poll::Ready(this.decoder.finish().map(Ok)),
            }
        }
    }
}

/// Blocking counterpart of [`ChunkStream`] over an iterator of byte chunks
pub struct ChunkIter<I> {
    inner: I,
    decoder: EventDecoder,
}

impl<I> ChunkIter<I> {
    pub fn new(inner: I) -> Self {
        Self {
            inner,
            decoder: EventDecoder::new(),
        }
    }
}

impl<I, B, E> Iterator for ChunkIter<I>
where
    I: Iterator<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<ClientError>,
{
    type Item = Result<StreamChunk>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.decoder.is_finished() {
                return None;
            }

            if let Some(chunk) = self.decoder.next_chunk() {
                return Some(Ok(chunk));
            }

            match self.inner.next() {
                Some(Ok(bytes)) => self.decoder.push(bytes.as_ref()),
                Some(Err(e)) => {
                    self.decoder.finished = true;
                    return Some(Err(e.into()));
                }
                None => return self.decoder.finish().map(Ok),
            }
        }
    }
}
