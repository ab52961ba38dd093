use serde::{Deserialize, Serialize};

/// Content block as it appears in request history and non-streaming responses
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: serde_json::Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
    /// Block types this crate does not model (thinking, server tools, ...).
    /// Serializes as `{"type":"unsupported"}`.
    #[serde(other)]
    Unsupported,
}

/// Non-streaming Messages API response
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Message {
    pub id: String,
    pub model: String,
    pub role: String,
    pub content: Vec<ContentBlock>,
    pub stop_reason: Option<String>,
    #[serde(default)]
    pub stop_sequence: Option<String>,
    pub usage: Usage,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u32,
    #[serde(default)]
    pub output_tokens: u32,
}

impl Message {
    /// Concatenated text of all text blocks
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn tool_uses(&self) -> impl Iterator<Item = &ContentBlock> {
        self.content
            .iter()
            .filter(|b| matches!(b, ContentBlock::ToolUse { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_message_response() {
        let json = r#"{
            "id": "msg_01",
            "type": "message",
            "role": "assistant",
            "model": "claude-sonnet-4-5",
            "content": [
                {"type": "text", "text": "Let me check."},
                {"type": "tool_use", "id": "toolu_1", "name": "get_weather", "input": {"city": "Paris"}},
                {"type": "thinking", "thinking": "...", "signature": "abc"}
            ],
            "stop_reason": "tool_use",
            "stop_sequence": null,
            "usage": {"input_tokens": 12, "output_tokens": 30, "cache_read_input_tokens": 0}
        }"#;

        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.id, "msg_01");
        assert_eq!(msg.text(), "Let me check.");
        assert_eq!(msg.tool_uses().count(), 1);
        assert_eq!(msg.content[2], ContentBlock::Unsupported);
        assert_eq!(msg.stop_reason.as_deref(), Some("tool_use"));
        assert_eq!(
            msg.usage,
            Usage {
                input_tokens: 12,
                output_tokens: 30
            }
        );
    }

    #[test]
    fn test_serialize_message_with_unsupported_block() {
        let msg = Message {
            id: "msg_02".to_string(),
            model: "claude-sonnet-4-5".to_string(),
            role: "assistant".to_string(),
            content: vec![
                ContentBlock::Unsupported,
                ContentBlock::Text {
                    text: "Done.".to_string(),
                },
            ],
            stop_reason: Some("end_turn".to_string()),
            stop_sequence: None,
            usage: Usage::default(),
        };

        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value["content"],
            json!([{"type": "unsupported"}, {"type": "text", "text": "Done."}])
        );

        let back: Message = serde_json::from_value(value).unwrap();
        assert_eq!(back, msg);
    }
}
