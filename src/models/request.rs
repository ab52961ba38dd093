use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::Result;
use crate::models::response::ContentBlock;
use crate::validation::validate_request;

/// Messages API request.
///
/// Immutable once built; obtain one through [`MessageRequest::builder`], which
/// validates the assembled options.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct MessageRequest {
    pub(crate) model: String,

    pub(crate) max_tokens: u32,

    pub(crate) messages: Vec<InputMessage>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) system: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) temperature: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) top_p: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) top_k: Option<u32>,

    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub(crate) stop_sequences: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub(crate) tools: Vec<Tool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) tool_choice: Option<ToolChoice>,

    #[serde(default)]
    pub(crate) stream: bool,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct InputMessage {
    pub role: Role,

    /// Either a string or array of content blocks
    pub content: MessageContent,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

impl InputMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Text(text.into()),
        }
    }

    /// Relay tool results back to the model after the caller executed them
    pub fn tool_results(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Blocks(blocks),
        }
    }
}

/// Tool definition offered to the model
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Tool {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub input_schema: JsonSchema,
}

/// JSON Schema subset used for tool input declarations
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct JsonSchema {
    #[serde(rename = "type")]
    pub schema_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<HashMap<String, Box<JsonSchema>>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<JsonSchema>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,

    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<serde_json::Value>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolChoice {
    Auto,
    Any,
    Tool { name: String },
    None,
}

impl MessageRequest {
    pub fn builder(model: impl Into<String>) -> MessageRequestBuilder {
        MessageRequestBuilder::new(model)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    pub fn messages(&self) -> &[InputMessage] {
        &self.messages
    }

    pub fn system(&self) -> Option<&str> {
        self.system.as_deref()
    }

    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    pub fn is_stream(&self) -> bool {
        self.stream
    }

    /// Copy of this request with the streaming flag set as the transport call needs
    pub(crate) fn with_stream(&self, stream: bool) -> Self {
        Self {
            stream,
            ..self.clone()
        }
    }
}

/// Collects request options; [`build`](Self::build) validates and freezes them.
#[derive(Debug, Clone)]
pub struct MessageRequestBuilder {
    request: MessageRequest,
}

impl MessageRequestBuilder {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            request: MessageRequest {
                model: model.into(),
                max_tokens: 1024,
                messages: Vec::new(),
                system: None,
                temperature: None,
                top_p: None,
                top_k: None,
                stop_sequences: Vec::new(),
                tools: Vec::new(),
                tool_choice: None,
                stream: false,
            },
        }
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.request.max_tokens = max_tokens;
        self
    }

    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.request.system = Some(system.into());
        self
    }

    pub fn message(mut self, message: InputMessage) -> Self {
        self.request.messages.push(message);
        self
    }

    pub fn user(self, text: impl Into<String>) -> Self {
        self.message(InputMessage::user(text))
    }

    pub fn assistant(self, text: impl Into<String>) -> Self {
        self.message(InputMessage::assistant(text))
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.request.temperature = Some(temperature);
        self
    }

    pub fn top_p(mut self, top_p: f32) -> Self {
        self.request.top_p = Some(top_p);
        self
    }

    pub fn top_k(mut self, top_k: u32) -> Self {
        self.request.top_k = Some(top_k);
        self
    }

    pub fn stop_sequence(mut self, sequence: impl Into<String>) -> Self {
        self.request.stop_sequences.push(sequence.into());
        self
    }

    pub fn tool(mut self, tool: Tool) -> Self {
        self.request.tools.push(tool);
        self
    }

    pub fn tool_choice(mut self, choice: ToolChoice) -> Self {
        self.request.tool_choice = Some(choice);
        self
    }

    pub fn build(self) -> Result<MessageRequest> {
        validate_request(&self.request)?;
        Ok(self.request)
    }
}
