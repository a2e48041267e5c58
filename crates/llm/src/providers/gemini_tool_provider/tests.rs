//! Unit tests for the Gemini tool provider.

use serde_json::json;

use pathfinder_tool_runtime::conversation::{AssistantContent, ConversationMessage};
use pathfinder_tool_runtime::provider::LlmError;
use pathfinder_tool_runtime::stream::{assemble, StopReason, StreamEvent};
use pathfinder_tool_runtime::tool::{ToolCall, ToolDefinition, ToolFamily, ToolResult};

use super::sse::ChunkParser;
use super::streaming::GeminiToolProvider;
use super::translate::{messages_to_gemini, tool_definition_to_gemini, tools_to_gemini};

fn rank_tool() -> ToolDefinition {
    ToolDefinition {
        name: "get_colleges_by_rank".to_string(),
        description: "Colleges reachable at a rank".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "rank": { "type": "integer", "description": "Student's rank" }
            },
            "required": ["rank"]
        }),
        family: ToolFamily::Query,
    }
}

fn call(id: &str, name: &str, input: serde_json::Value) -> ToolCall {
    ToolCall {
        id: id.to_string(),
        name: name.to_string(),
        input,
    }
}

#[test]
fn test_tool_definition_translation() {
    let decl = tool_definition_to_gemini(&rank_tool());

    assert_eq!(decl["name"], "get_colleges_by_rank");
    assert_eq!(decl["parameters"]["type"], "object");
    assert_eq!(decl["parameters"]["properties"]["rank"]["type"], "integer");
}

#[test]
fn test_parameterless_tool_omits_parameters() {
    let def = ToolDefinition {
        name: "get_all_branches".to_string(),
        description: "List branches".to_string(),
        input_schema: json!({"type": "object", "properties": {}}),
        family: ToolFamily::Query,
    };
    assert!(tool_definition_to_gemini(&def).get("parameters").is_none());
    assert!(tools_to_gemini(&[]).is_none());
    assert_eq!(
        tools_to_gemini(&[def]).unwrap()[0]["functionDeclarations"][0]["name"],
        "get_all_branches"
    );
}

#[test]
fn test_conversation_translation_merges_tool_results() {
    let first = call("c1", "search_college_by_name", json!({"query": "RV"}));
    let second = call("c2", "match_branch_names", json!({"query": "CS"}));
    let messages = vec![
        ConversationMessage::User("RV college CS cutoff?".to_string()),
        ConversationMessage::Assistant(AssistantContent {
            text: None,
            tool_calls: vec![first.clone(), second.clone()],
        }),
        ConversationMessage::ToolResult(ToolResult::ok(&first, json!([{"college_code": "E005"}]))),
        ConversationMessage::ToolResult(ToolResult::ok(&second, json!([]))),
        ConversationMessage::Assistant(AssistantContent::text("Here you go.")),
    ];

    let contents = messages_to_gemini(&messages);
    assert_eq!(contents.len(), 4);

    assert_eq!(contents[0]["role"], "user");
    assert_eq!(contents[0]["parts"][0]["text"], "RV college CS cutoff?");

    assert_eq!(contents[1]["role"], "model");
    let calls = contents[1]["parts"].as_array().unwrap();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0]["functionCall"]["name"], "search_college_by_name");
    assert_eq!(calls[0]["functionCall"]["args"]["query"], "RV");

    assert_eq!(contents[2]["role"], "user");
    let responses = contents[2]["parts"].as_array().unwrap();
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0]["functionResponse"]["name"], "search_college_by_name");
    assert_eq!(
        responses[0]["functionResponse"]["response"]["result"][0]["college_code"],
        "E005"
    );

    assert_eq!(contents[3]["parts"][0]["text"], "Here you go.");
}

#[test]
fn test_request_body() {
    let body = GeminiToolProvider::build_request_body(
        &[ConversationMessage::User("hi".to_string())],
        Some("You are a counselor."),
        &[rank_tool()],
        0.7,
        2048,
    );
    assert_eq!(body["systemInstruction"]["parts"][0]["text"], "You are a counselor.");
    assert_eq!(body["toolConfig"]["functionCallingConfig"]["mode"], "AUTO");
    assert_eq!(body["generationConfig"]["maxOutputTokens"], 2048);
    assert_eq!(
        body["tools"][0]["functionDeclarations"].as_array().unwrap().len(),
        1
    );
}

#[test]
fn test_chunk_text_then_stop() {
    let mut parser = ChunkParser::new();
    let events = parser
        .parse(r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Hello"}]}}]}"#)
        .unwrap();
    assert_eq!(events, vec![StreamEvent::TextDelta { text: "Hello".into() }]);

    let events = parser
        .parse(r#"{"candidates":[{"content":{"role":"model","parts":[{"text":" there"}]},"finishReason":"STOP"}]}"#)
        .unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(
        events[1],
        StreamEvent::MessageEnd {
            stop_reason: StopReason::EndTurn
        }
    );
}

#[test]
fn test_chunk_function_call_assembles() {
    let mut parser = ChunkParser::new();
    let events = parser
        .parse(
            r#"{"candidates":[{"content":{"role":"model","parts":[{"functionCall":{"name":"get_colleges_by_rank","args":{"rank":5000}}}]},"finishReason":"STOP"}]}"#,
        )
        .unwrap();
    assert_eq!(
        events.last(),
        Some(&StreamEvent::MessageEnd {
            stop_reason: StopReason::ToolUse
        })
    );

    let content = assemble(events).unwrap();
    assert_eq!(content.tool_calls.len(), 1);
    assert_eq!(content.tool_calls[0].id, "call_0_get_colleges_by_rank");
    assert_eq!(content.tool_calls[0].input, json!({"rank": 5000}));
}

#[test]
fn test_malformed_function_call_is_an_error() {
    let mut parser = ChunkParser::new();
    let err = parser
        .parse(r#"{"candidates":[{"finishReason":"MALFORMED_FUNCTION_CALL","finishMessage":"bad args"}]}"#)
        .unwrap_err();
    assert!(matches!(err, LlmError::MalformedCall(msg) if msg == "bad args"));
}

#[test]
fn test_max_tokens_and_errors() {
    let mut parser = ChunkParser::new();
    let events = parser
        .parse(r#"{"candidates":[{"content":{"parts":[{"text":"cut"}]},"finishReason":"MAX_TOKENS"}]}"#)
        .unwrap();
    assert_eq!(
        events[1],
        StreamEvent::MessageEnd {
            stop_reason: StopReason::MaxTokens
        }
    );

    let events = parser
        .parse(r#"{"error":{"code":503,"message":"overloaded"}}"#)
        .unwrap();
    assert_eq!(events, vec![StreamEvent::Error { message: "overloaded".into() }]);

    assert!(matches!(
        parser.parse("not json"),
        Err(LlmError::InvalidResponse(_))
    ));
}
