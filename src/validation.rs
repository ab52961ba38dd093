use crate::error::{ClientError, Result};
use crate::models::request::{JsonSchema, MessageRequest, Role, Tool, ToolChoice};

const MAX_TOOLS: usize = 128;
const MAX_TOOL_NAME_LEN: usize = 64;
const MAX_SCHEMA_DEPTH: usize = 10;

/// Validate a request before it is frozen by the builder
pub fn validate_request(req: &MessageRequest) -> Result<()> {
    if req.model.trim().is_empty() {
        return Err(ClientError::InvalidRequest("Model cannot be empty".into()));
    }

    if req.messages.is_empty() {
        return Err(ClientError::InvalidRequest("No messages provided".into()));
    }

    if req.messages[0].role != Role::User {
        return Err(ClientError::InvalidRequest(
            "First message must be from user".into(),
        ));
    }

    // Relaxed alternation: only consecutive assistant turns are rejected
    for pair in req.messages.windows(2) {
        if pair[0].role == Role::Assistant && pair[1].role == Role::Assistant {
            return Err(ClientError::InvalidRequest(
                "Cannot have consecutive assistant messages".into(),
            ));
        }
    }

    if req.max_tokens == 0 || req.max_tokens > 1_000_000 {
        return Err(ClientError::InvalidRequest(format!(
            "Invalid max_tokens: {}. Must be between 1 and 1,000,000",
            req.max_tokens
        )));
    }

    if let Some(temp) = req.temperature
        && !(0.0..=1.0).contains(&temp)
    {
        return Err(ClientError::InvalidRequest(format!(
            "Invalid temperature: {}. Must be between 0.0 and 1.0",
            temp
        )));
    }

    if let Some(top_p) = req.top_p
        && !(0.0..=1.0).contains(&top_p)
    {
        return Err(ClientError::InvalidRequest(format!(
            "Invalid top_p: {}. Must be between 0.0 and 1.0",
            top_p
        )));
    }

    if req.top_k == Some(0) {
        return Err(ClientError::InvalidRequest(
            "Invalid top_k: 0. Must be greater than 0".into(),
        ));
    }

    if req.stop_sequences.iter().any(|s| s.is_empty()) {
        return Err(ClientError::InvalidRequest(
            "Stop sequences cannot be empty".into(),
        ));
    }

    validate_tools(&req.tools)?;

    if let Some(ToolChoice::Tool { name }) = &req.tool_choice
        && !req.tools.iter().any(|t| &t.name == name)
    {
        return Err(ClientError::InvalidRequest(format!(
            "tool_choice references undeclared tool: {}",
            name
        )));
    }

    Ok(())
}

/// Validate all tools in a request
pub fn validate_tools(tools: &[Tool]) -> Result<()> {
    if tools.len() > MAX_TOOLS {
        return Err(ClientError::InvalidRequest(format!(
            "Too many tools: {} (max {})",
            tools.len(),
            MAX_TOOLS
        )));
    }

    let mut names = std::collections::HashSet::new();
    for tool in tools {
        if !names.insert(&tool.name) {
            return Err(ClientError::InvalidRequest(format!(
                "Duplicate tool name: {}",
                tool.name
            )));
        }

        validate_tool(tool)?;
    }

    Ok(())
}

/// Validate a single tool definition
pub fn validate_tool(tool: &Tool) -> Result<()> {
    if tool.name.is_empty() {
        return Err(ClientError::InvalidRequest(
            "Tool name cannot be empty".into(),
        ));
    }

    if tool.name.len() > MAX_TOOL_NAME_LEN {
        return Err(ClientError::InvalidRequest(format!(
            "Tool name too long: {} (max {} characters)",
            tool.name.len(),
            MAX_TOOL_NAME_LEN
        )));
    }

    if !tool
        .name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ClientError::InvalidRequest(format!(
            "Tool name contains invalid characters: {}",
            tool.name
        )));
    }

    // Tool input is always a JSON object
    if tool.input_schema.schema_type != "object" {
        return Err(ClientError::InvalidRequest(format!(
            "Tool {} input_schema must be of type object, got {}",
            tool.name, tool.input_schema.schema_type
        )));
    }

    validate_json_schema(&tool.input_schema, 0)
}

fn validate_json_schema(schema: &JsonSchema, depth: usize) -> Result<()> {
    if depth > MAX_SCHEMA_DEPTH {
        return Err(ClientError::InvalidRequest(format!(
            "Schema nesting too deep (max {})",
            MAX_SCHEMA_DEPTH
        )));
    }

    let valid_types = [
        "object", "array", "string", "number", "integer", "boolean", "null",
    ];
    if !valid_types.contains(&schema.schema_type.as_str()) {
        return Err(ClientError::InvalidRequest(format!(
            "Invalid schema type: {}",
            schema.schema_type
        )));
    }

    if let Some(properties) = &schema.properties {
        for (name, prop_schema) in properties {
            if name.is_empty() {
                return Err(ClientError::InvalidRequest(
                    "Property name cannot be empty".into(),
                ));
            }
            validate_json_schema(prop_schema, depth + 1)?;
        }

        if let Some(required) = &schema.required
            && let Some(missing) = required.iter().find(|r| !properties.contains_key(*r))
        {
            return Err(ClientError::InvalidRequest(format!(
                "Required property not declared: {}",
                missing
            )));
        }
    }

    if let Some(items) = &schema.items {
        validate_json_schema(items, depth + 1)?;
    }

    if let (Some(min), Some(max)) = (schema.minimum, schema.maximum)
        && min > max
    {
        return Err(ClientError::InvalidRequest(format!(
            "Invalid range: minimum ({}) > maximum ({})",
            min, max
        )));
    }

    Ok(())
}
