//! Content Normalizer: collapses vendor-specific content-block arrays
//! (Anthropic-style tagged blocks, OpenAI-style multimodal parts) into the
//! single runtime [`MessageContent`] shape.
//!
//! `normalize` is total: it never returns an error. Blocks with an
//! unrecognized tag or missing required fields are logged at `debug` and
//! dropped, per the malformed-block policy.

use crate::model::{ContentPart, ImageSource, MessageContent};
use serde_json::Value;

/// Raw content as it arrives on the wire: either a plain string or an array
/// of vendor-tagged blocks (still unparsed `Value`s, since unknown or
/// malformed blocks must be skipped rather than fail deserialization).
#[derive(Debug, Clone)]
pub enum ContentInput {
    Text(String),
    Blocks(Vec<Value>),
}

impl ContentInput {
    /// Build a `ContentInput` from an arbitrary JSON value the way it would
    /// arrive embedded in an event payload.
    pub fn from_value(value: &Value) -> ContentInput {
        match value {
            Value::String(s) => ContentInput::Text(s.clone()),
            Value::Array(items) => ContentInput::Blocks(items.clone()),
            other => ContentInput::Text(other.to_string()),
        }
    }
}

/// Collapse `content` into the canonical runtime form.
///
/// 1. A string passes through unchanged.
/// 2. An array where every block is a `text` block collapses into a single
///    concatenated string (downstream markdown rendering needs contiguous
///    text, not fragments).
/// 3. Otherwise each block is mapped to a [`ContentPart`]; unrecognized tags
///    are logged and dropped.
/// 4. A mapping that produces zero parts returns the empty string.
pub fn normalize(content: ContentInput) -> MessageContent {
    let blocks = match content {
        ContentInput::Text(s) => return MessageContent::Text(s),
        ContentInput::Blocks(blocks) => blocks,
    };

    if !blocks.is_empty() && blocks.iter().all(is_text_block) {
        let collapsed: String = blocks
            .iter()
            .map(|block| block.get("text").and_then(Value::as_str).unwrap_or(""))
            .collect();
        return MessageContent::Text(collapsed);
    }

    let parts: Vec<ContentPart> = blocks.iter().filter_map(map_block).collect();
    if parts.is_empty() {
        MessageContent::Text(String::new())
    } else {
        MessageContent::Parts(parts)
    }
}

fn is_text_block(block: &Value) -> bool {
    block.get("type").and_then(Value::as_str) == Some("text")
}

fn map_block(block: &Value) -> Option<ContentPart> {
    let tag = block.get("type").and_then(Value::as_str);
    match tag {
        Some("text") => Some(ContentPart::Text {
            text: block.get("text").and_then(Value::as_str).unwrap_or("").to_string(),
        }),
        Some("image") => map_anthropic_image(block),
        Some("image_url") => map_openai_image(block),
        Some("tool_use") => map_tool_use(block),
        Some("tool_result") => Some(map_tool_result(block)),
        Some("thinking") => {
            let thinking = block.get("thinking").and_then(Value::as_str).unwrap_or("");
            Some(ContentPart::Text {
                text: format!("[Thinking] {thinking}"),
            })
        }
        Some("document") => {
            let title = block.get("title").and_then(Value::as_str).unwrap_or("Untitled");
            Some(ContentPart::Text {
                text: format!("[Document: {title}]"),
            })
        }
        Some(other) => {
            log::debug!("content normalizer: skipping unrecognized block tag {other:?}");
            None
        }
        None => {
            log::debug!("content normalizer: skipping block with no type tag");
            None
        }
    }
}

fn map_anthropic_image(block: &Value) -> Option<ContentPart> {
    let source = block.get("source")?;
    let source_type = source.get("type").and_then(Value::as_str);
    let source = match source_type {
        Some("base64") => ImageSource::Base64 {
            media_type: source.get("media_type").and_then(Value::as_str).map(String::from),
            data: source.get("data").and_then(Value::as_str).map(String::from),
        },
        Some("url") => ImageSource::Url {
            url: source.get("url").and_then(Value::as_str)?.to_string(),
        },
        _ => {
            log::debug!("content normalizer: skipping image block with unrecognized source");
            return None;
        }
    };
    Some(ContentPart::Image { source })
}

fn map_openai_image(block: &Value) -> Option<ContentPart> {
    // data-URL strings carry through untouched, same as a hosted URL.
    let url = block
        .get("image_url")
        .and_then(|v| v.get("url"))
        .and_then(Value::as_str)?;
    Some(ContentPart::Image {
        source: ImageSource::Url { url: url.to_string() },
    })
}

fn map_tool_use(block: &Value) -> Option<ContentPart> {
    let id = block.get("id").and_then(Value::as_str)?;
    let name = block.get("name").and_then(Value::as_str)?;
    let input = block.get("input").cloned().unwrap_or(Value::Null);
    Some(ContentPart::ToolUse {
        id: id.to_string(),
        name: name.to_string(),
        input,
    })
}

fn map_tool_result(block: &Value) -> ContentPart {
    let tool_use_id = block
        .get("tool_use_id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    // Non-string nested content is rendered as an empty string; extracting
    // it is the UI's responsibility, not the normalizer's.
    let content = match block.get("content") {
        Some(Value::String(s)) => s.clone(),
        Some(_) => String::new(),
        None => String::new(),
    };
    let is_error = block.get("is_error").and_then(Value::as_bool);
    ContentPart::ToolResult {
        tool_use_id,
        content,
        is_error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn blocks(values: Vec<Value>) -> ContentInput {
        ContentInput::Blocks(values)
    }

    #[test]
    fn string_input_passes_through() {
        let result = normalize(ContentInput::Text("hello".into()));
        assert_eq!(result, MessageContent::Text("hello".into()));
    }

    #[test]
    fn all_text_blocks_collapse_to_a_single_string() {
        let input = blocks(vec![
            json!({"type": "text", "text": "Hello, "}),
            json!({"type": "text", "text": "world!"}),
        ]);
        assert_eq!(normalize(input), MessageContent::Text("Hello, world!".into()));
    }

    #[test]
    fn normalize_is_idempotent_on_collapsed_text() {
        let input = blocks(vec![json!({"type": "text", "text": "abc"})]);
        let once = normalize(input);
        let twice = match &once {
            MessageContent::Text(s) => normalize(ContentInput::Text(s.clone())),
            MessageContent::Parts(_) => unreachable!(),
        };
        assert_eq!(once, twice);
    }

    #[test]
    fn mixed_blocks_map_to_canonical_parts() {
        let input = blocks(vec![
            json!({"type": "tool_use", "id": "t1", "name": "workspace_read", "input": {"path": "a.rs"}}),
            json!({"type": "text", "text": "reading file"}),
        ]);
        let result = normalize(input);
        match result {
            MessageContent::Parts(parts) => {
                assert_eq!(parts.len(), 2);
                assert!(matches!(&parts[0], ContentPart::ToolUse { id, .. } if id == "t1"));
                assert!(matches!(&parts[1], ContentPart::Text { text } if text == "reading file"));
            }
            MessageContent::Text(_) => panic!("expected parts"),
        }
    }

    #[test]
    fn thinking_block_maps_to_prefixed_text() {
        let input = blocks(vec![json!({"type": "thinking", "thinking": "considering options"})]);
        match normalize(input) {
            MessageContent::Parts(parts) => {
                assert_eq!(parts.len(), 1);
                assert!(
                    matches!(&parts[0], ContentPart::Text { text } if text == "[Thinking] considering options")
                );
            }
            MessageContent::Text(_) => panic!("expected parts"),
        }
    }

    #[test]
    fn document_block_uses_untitled_fallback() {
        let input = blocks(vec![json!({"type": "document"})]);
        match normalize(input) {
            MessageContent::Parts(parts) => {
                assert!(matches!(&parts[0], ContentPart::Text { text } if text == "[Document: Untitled]"));
            }
            MessageContent::Text(_) => panic!("expected parts"),
        }
    }

    #[test]
    fn unrecognized_tag_is_dropped_not_errored() {
        let input = blocks(vec![
            json!({"type": "redacted_thinking"}),
            json!({"type": "text", "text": "visible"}),
        ]);
        // Mixed with a non-text block, so collapse doesn't apply; only the
        // recognized block survives.
        let with_tool = {
            let mut v = match &input {
                ContentInput::Blocks(b) => b.clone(),
                _ => unreachable!(),
            };
            v.push(json!({"type": "tool_use", "id": "t1", "name": "x", "input": {}}));
            blocks(v)
        };
        match normalize(with_tool) {
            MessageContent::Parts(parts) => assert_eq!(parts.len(), 2),
            MessageContent::Text(_) => panic!("expected parts"),
        }
    }

    #[test]
    fn openai_image_url_block_maps_to_image_part() {
        let input = blocks(vec![
            json!({"type": "image_url", "image_url": {"url": "data:image/png;base64,xyz"}}),
        ]);
        match normalize(input) {
            MessageContent::Parts(parts) => {
                assert!(matches!(
                    &parts[0],
                    ContentPart::Image { source: ImageSource::Url { url } } if url == "data:image/png;base64,xyz"
                ));
            }
            MessageContent::Text(_) => panic!("expected parts"),
        }
    }

    #[test]
    fn tool_result_with_nested_non_string_content_renders_empty() {
        let input = blocks(vec![
            json!({"type": "tool_result", "tool_use_id": "t1", "content": [{"type": "text", "text": "nested"}]}),
        ]);
        match normalize(input) {
            MessageContent::Parts(parts) => {
                assert!(matches!(&parts[0], ContentPart::ToolResult { content, .. } if content.is_empty()));
            }
            MessageContent::Text(_) => panic!("expected parts"),
        }
    }

    #[test]
    fn empty_mapping_yields_empty_string() {
        let input = blocks(vec![json!({"type": "redacted_thinking"})]);
        assert_eq!(normalize(input), MessageContent::Text(String::new()));
    }
}
