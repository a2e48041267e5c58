//! Translation between provider-agnostic conversation types and the Gemini API format.

use serde_json::{json, Value};

use pathfinder_tool_runtime::{conversation::ConversationMessage, tool::ToolDefinition};

/// Translate a [`ToolDefinition`] into a Gemini function declaration.
///
/// Gemini rejects object schemas without properties, so parameterless tools
/// omit `parameters` entirely.
pub(super) fn tool_definition_to_gemini(tool: &ToolDefinition) -> Value {
    let mut decl = json!({
        "name": tool.name,
        "description": tool.description,
    });
    let has_params = tool.input_schema["properties"]
        .as_object()
        .is_some_and(|props| !props.is_empty());
    if has_params {
        decl["parameters"] = tool.input_schema.clone();
    }
    decl
}

/// The `tools` request field, or `None` when no tools are offered.
pub(super) fn tools_to_gemini(tools: &[ToolDefinition]) -> Option<Value> {
    if tools.is_empty() {
        return None;
    }
    let declarations: Vec<Value> = tools.iter().map(tool_definition_to_gemini).collect();
    Some(json!([{ "functionDeclarations": declarations }]))
}

/// Translate a conversation into Gemini `contents`.
///
/// Consecutive tool results are merged into one `user` turn so every
/// `functionCall` turn is answered by a single `functionResponse` turn.
pub(super) fn messages_to_gemini(messages: &[ConversationMessage]) -> Vec<Value> {
    let mut contents: Vec<Value> = Vec::new();
    let mut merging_results = false;

    for msg in messages {
        match msg {
            ConversationMessage::User(text) => {
                merging_results = false;
                contents.push(json!({
                    "role": "user",
                    "parts": [{ "text": text }],
                }));
            }
            ConversationMessage::Assistant(content) => {
                merging_results = false;
                let mut parts: Vec<Value> = Vec::new();
                if let Some(text) = content.text.as_deref().filter(|t| !t.is_empty()) {
                    parts.push(json!({ "text": text }));
                }
                for tc in &content.tool_calls {
                    parts.push(json!({
                        "functionCall": { "name": tc.name, "args": tc.input },
                    }));
                }
                if !parts.is_empty() {
                    contents.push(json!({ "role": "model", "parts": parts }));
                }
            }
            ConversationMessage::ToolResult(result) => {
                let part = json!({
                    "functionResponse": { "name": result.name, "response": result.response },
                });
                match contents.last_mut() {
                    Some(last) if merging_results => {
                        if let Some(parts) = last["parts"].as_array_mut() {
                            parts.push(part);
                        }
                    }
                    _ => contents.push(json!({ "role": "user", "parts": [part] })),
                }
                merging_results = true;
            }
        }
    }

    contents
}
