use serde::Serialize;
use serde_json::Value;

use crate::error::{ClientError, Result};
use crate::metrics::STREAM_METRICS;
use crate::models::events::{BlockDelta, BlockKind};

/// Content block of an accumulated response
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseBlock {
    Text {
        text: String,
    },
    /// Tool invocation; `input` is the raw argument string when it failed to parse
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    Other {
        kind: String,
    },
}

/// Completed tool-call record relayed to the caller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Parsed arguments, or the raw string when parsing failed
    pub arguments: Value,
    pub raw_arguments: String,
    /// Set when `raw_arguments` was not valid JSON
    pub parse_error: Option<String>,
}

impl ToolCall {
    pub fn is_valid(&self) -> bool {
        self.parse_error.is_none()
    }
}

/// Buffer for accumulating partial tool input JSON
#[derive(Debug, Clone)]
pub struct ToolInputBuffer {
    pub tool_id: String,
    pub tool_name: String,
    /// Accumulated partial JSON for tool input
    pub partial_json: String,
}

impl ToolInputBuffer {
    pub fn new(tool_id: String, tool_name: String) -> Self {
        Self {
            tool_id,
            tool_name,
            partial_json: String::new(),
        }
    }

    pub fn append(&mut self, chunk: &str) {
        self.partial_json.push_str(chunk);
    }

    /// Parse what has arrived so far, if it already forms a complete value
    pub fn try_parse(&self) -> Option<Value> {
        serde_json::from_str(&self.partial_json).ok()
    }

    /// Parse the complete argument string into a tool call.
    ///
    /// A tool without arguments may never send a fragment; that is `{}`.
    /// Invalid JSON keeps the raw string and records the parse error.
    pub fn finalize(&self) -> ToolCall {
        let raw = self.partial_json.clone();
        let parsed = if raw.trim().is_empty() {
            Ok(Value::Object(Default::default()))
        } else {
            serde_json::from_str::<Value>(&raw)
        };

        match parsed {
            Ok(arguments) => ToolCall {
                id: self.tool_id.clone(),
                name: self.tool_name.clone(),
                arguments,
                raw_arguments: raw,
                parse_error: None,
            },
            Err(e) => {
                let err = ClientError::ToolArgumentParse {
                    name: self.tool_name.clone(),
                    message: e.to_string(),
                };
                tracing::warn!(
                    tool_name = %self.tool_name,
                    size = raw.len(),
                    error = %e,
                    "Tool arguments are not valid JSON, keeping raw string"
                );
                STREAM_METRICS.record_tool_argument_failure();

                ToolCall {
                    id: self.tool_id.clone(),
                    name: self.tool_name.clone(),
                    arguments: Value::String(raw.clone()),
                    raw_arguments: raw,
                    parse_error: Some(err.to_string()),
                }
            }
        }
    }

    pub fn size(&self) -> usize {
        self.partial_json.len()
    }
}

#[derive(Debug, Clone)]
enum SlotContent {
    Text(String),
    Tool {
        buffer: ToolInputBuffer,
        call: Option<ToolCall>,
    },
    Other(String),
}

/// One content block being assembled, keyed by its wire index
#[derive(Debug, Clone)]
pub struct BlockSlot {
    pub index: usize,
    content: SlotContent,
    pub is_complete: bool,
}

impl BlockSlot {
    fn new(index: usize, kind: BlockKind) -> Self {
        let content = match kind {
            BlockKind::Text => SlotContent::Text(String::new()),
            BlockKind::ToolUse { id, name } => SlotContent::Tool {
                buffer: ToolInputBuffer::new(id, name),
                call: None,
            },
            BlockKind::Other(kind) => SlotContent::Other(kind),
        };

        Self {
            index,
            content,
            is_complete: false,
        }
    }

    pub fn is_tool_use(&self) -> bool {
        matches!(self.content, SlotContent::Tool { .. })
    }

    /// Current view of the block; in-flight tool input shows only once it parses
    pub fn to_response_block(&self) -> ResponseBlock {
        match &self.content {
            SlotContent::Text(text) => ResponseBlock::Text { text: text.clone() },
            SlotContent::Tool { buffer, call } => ResponseBlock::ToolUse {
                id: buffer.tool_id.clone(),
                name: buffer.tool_name.clone(),
                input: match call {
                    Some(call) => call.arguments.clone(),
                    None => buffer.try_parse().unwrap_or(Value::Null),
                },
            },
            SlotContent::Other(kind) => ResponseBlock::Other { kind: kind.clone() },
        }
    }
}

/// Content blocks of one streamed message, in ascending index order
#[derive(Debug, Default)]
pub struct ContentBlockManager {
    blocks: Vec<BlockSlot>,
}

impl ContentBlockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new block; indices must be unique and ascending
    pub fn start(&mut self, index: usize, kind: BlockKind) -> Result<()> {
        if let Some(last) = self.blocks.last()
            && index <= last.index
        {
            let reason = if self.get(index).is_some() {
                "block already started"
            } else {
                "block index out of order"
            };
            return Err(ClientError::ProtocolSequence {
                index,
                event: "content_block_start",
                reason,
            });
        }

        self.blocks.push(BlockSlot::new(index, kind));
        Ok(())
    }

    /// Append a fragment to an open block
    pub fn append(&mut self, index: usize, delta: &BlockDelta) -> Result<()> {
        let slot = self.open_slot(index, "content_block_delta")?;

        match (&mut slot.content, delta) {
            (SlotContent::Text(text), BlockDelta::Text(fragment)) => text.push_str(fragment),
            (SlotContent::Tool { buffer, .. }, BlockDelta::InputJson(fragment)) => {
                buffer.append(fragment);
                tracing::trace!(index, size = buffer.size(), "Appended tool input fragment");
            }
            // Signatures, citations and thinking text are not assembled
            (_, BlockDelta::Other { kind, .. }) => {
                tracing::debug!(index, kind = %kind, "Ignoring unassembled delta");
            }
            (SlotContent::Other(_), _) => {}
            _ => {
                return Err(ClientError::ProtocolSequence {
                    index,
                    event: "content_block_delta",
                    reason: "delta kind does not match block type",
                });
            }
        }

        Ok(())
    }

    /// Freeze a block; returns the tool call it completes, if any
    pub fn stop(&mut self, index: usize) -> Result<Option<ToolCall>> {
        let slot = self.open_slot(index, "content_block_stop")?;
        slot.is_complete = true;

        if let SlotContent::Tool { buffer, call } = &mut slot.content {
            let completed = buffer.finalize();
            tracing::debug!(
                index,
                tool_name = %completed.name,
                valid = completed.is_valid(),
                "Completed tool call"
            );
            *call = Some(completed.clone());
            return Ok(Some(completed));
        }

        Ok(None)
    }

    fn open_slot(&mut self, index: usize, event: &'static str) -> Result<&mut BlockSlot> {
        let slot = self.get_mut(index).ok_or(ClientError::ProtocolSequence {
            index,
            event,
            reason: "block was never started",
        })?;

        if slot.is_complete {
            return Err(ClientError::ProtocolSequence {
                index,
                event,
                reason: "block already stopped",
            });
        }

        Ok(slot)
    }

    /// Get reference to block by index
    pub fn get(&self, index: usize) -> Option<&BlockSlot> {
        self.blocks
            .binary_search_by_key(&index, |b| b.index)
            .ok()
            .map(|pos| &self.blocks[pos])
    }

    fn get_mut(&mut self, index: usize) -> Option<&mut BlockSlot> {
        self.blocks
            .binary_search_by_key(&index, |b| b.index)
            .ok()
            .map(move |pos| &mut self.blocks[pos])
    }

    pub fn blocks(&self) -> &[BlockSlot] {
        &self.blocks
    }

    pub fn response_blocks(&self) -> Vec<ResponseBlock> {
        self.blocks.iter().map(BlockSlot::to_response_block).collect()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn has_tool_use(&self) -> bool {
        self.blocks.iter().any(BlockSlot::is_tool_use)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tool(id: &str, name: &str) -> BlockKind {
        BlockKind::ToolUse {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    #[test]
    fn test_single_text_block() {
        let mut manager = ContentBlockManager::new();
        manager.start(0, BlockKind::Text).unwrap();

        manager
            .append(0, &BlockDelta::Text("Hello".to_string()))
            .unwrap();
        manager
            .append(0, &BlockDelta::Text(" World".to_string()))
            .unwrap();
        assert!(manager.stop(0).unwrap().is_none());

        assert_eq!(manager.len(), 1);
        assert!(!manager.has_tool_use());
        assert_eq!(
            manager.response_blocks(),
            vec![ResponseBlock::Text {
                text: "Hello World".to_string()
            }]
        );
    }

    #[test]
    fn test_mixed_blocks() {
        let mut manager = ContentBlockManager::new();

        manager.start(0, BlockKind::Text).unwrap();
        manager
            .append(0, &BlockDelta::Text("Question".to_string()))
            .unwrap();
        manager.stop(0).unwrap();

        manager.start(1, tool("toolu_123", "TodoWrite")).unwrap();
        manager
            .append(1, &BlockDelta::InputJson("{\"todos\":".to_string()))
            .unwrap();
        manager
            .append(1, &BlockDelta::InputJson(" []}".to_string()))
            .unwrap();
        let call = manager.stop(1).unwrap().unwrap();

        assert_eq!(call.id, "toolu_123");
        assert_eq!(call.name, "TodoWrite");
        assert_eq!(call.arguments, json!({"todos": []}));
        assert!(call.is_valid());
        assert!(manager.has_tool_use());
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn test_tool_without_arguments() {
        let mut manager = ContentBlockManager::new();
        manager.start(0, tool("toolu_1", "now")).unwrap();
        manager
            .append(0, &BlockDelta::InputJson(String::new()))
            .unwrap();

        let call = manager.stop(0).unwrap().unwrap();
        assert_eq!(call.arguments, json!({}));
        assert!(call.is_valid());
    }

    #[test]
    fn test_invalid_tool_arguments_keep_raw_string() {
        let mut manager = ContentBlockManager::new();
        manager.start(0, tool("toolu_1", "broken")).unwrap();
        manager
            .append(0, &BlockDelta::InputJson("{\"a\": ".to_string()))
            .unwrap();

        let call = manager.stop(0).unwrap().unwrap();
        assert_eq!(call.arguments, json!("{\"a\": "));
        assert_eq!(call.raw_arguments, "{\"a\": ");
        assert!(!call.is_valid());
        assert!(
            call.parse_error
                .unwrap()
                .contains("Tool argument parse error for broken")
        );
    }

    #[test]
    fn test_in_flight_tool_input_snapshot() {
        let mut manager = ContentBlockManager::new();
        manager.start(0, tool("toolu_1", "t")).unwrap();
        manager
            .append(0, &BlockDelta::InputJson("{\"a\"".to_string()))
            .unwrap();

        match &manager.response_blocks()[0] {
            ResponseBlock::ToolUse { input, .. } => assert_eq!(input, &Value::Null),
            other => panic!("Expected tool use, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_index_rejected() {
        let mut manager = ContentBlockManager::new();
        let err = manager
            .append(4, &BlockDelta::Text("x".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("never started"));

        let err = manager.stop(4).unwrap_err();
        assert!(err.to_string().contains("content_block_stop"));
    }

    #[test]
    fn test_delta_after_stop_rejected() {
        let mut manager = ContentBlockManager::new();
        manager.start(0, BlockKind::Text).unwrap();
        manager.stop(0).unwrap();

        let err = manager
            .append(0, &BlockDelta::Text("late".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("already stopped"));
    }

    #[test]
    fn test_block_indexing() {
        let mut manager = ContentBlockManager::new();

        manager.start(0, BlockKind::Text).unwrap();
        manager.start(1, tool("toolu_1", "Tool1")).unwrap();
        manager.start(2, BlockKind::Other("thinking".to_string())).unwrap();
        manager.start(3, tool("toolu_2", "Tool2")).unwrap();

        assert_eq!(manager.len(), 4);
        for i in 0..4 {
            assert_eq!(manager.get(i).unwrap().index, i);
        }

        let err = manager.start(1, BlockKind::Text).unwrap_err();
        assert!(err.to_string().contains("already started"));
    }

    #[test]
    fn test_mismatched_delta_kind_rejected() {
        let mut manager = ContentBlockManager::new();
        manager.start(0, BlockKind::Text).unwrap();

        let err = manager
            .append(0, &BlockDelta::InputJson("{}".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("does not match"));
    }
}
