use super::*;

fn make_response(content: serde_json::Value) -> String {
    serde_json::json!({
        "id": "msg_123",
        "type": "message",
        "role": "assistant",
        "content": content,
        "model": "claude-sonnet-4-5-20250929",
        "stop_reason": "end_turn",
        "usage": { "input_tokens": 100, "output_tokens": 50 }
    })
    .to_string()
}

#[test]
fn parse_text_response() {
    let json = make_response(serde_json::json!([
        { "type": "text", "text": "Hello world" }
    ]));
    let resp = parse_response(&json).unwrap();
    assert_eq!(resp.text, "Hello world");
    assert_eq!(resp.model, "claude-sonnet-4-5-20250929");
    assert_eq!(resp.stop_reason, "end_turn");
    assert_eq!(resp.input_tokens, 100);
    assert_eq!(resp.output_tokens, 50);
}

#[test]
fn parse_joins_text_blocks_and_skips_others() {
    let json = make_response(serde_json::json!([
        { "type": "thinking", "thinking": "hmm" },
        { "type": "text", "text": "{\"a\":" },
        { "type": "text", "text": "1}" }
    ]));
    let resp = parse_response(&json).unwrap();
    assert_eq!(resp.text, "{\"a\":1}");
}

#[test]
fn parse_missing_stop_reason_defaults() {
    let json = serde_json::json!({
        "content": [],
        "model": "m",
        "stop_reason": null,
        "usage": { "input_tokens": 1, "output_tokens": 2 }
    })
    .to_string();
    let resp = parse_response(&json).unwrap();
    assert_eq!(resp.stop_reason, "end_turn");
    assert!(resp.text.is_empty());
}

#[test]
fn parse_invalid_json_is_error() {
    assert!(matches!(parse_response("not json"), Err(LlmError::ApiParse(_))));
}
