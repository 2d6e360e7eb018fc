//! Delegation-result grammar: extracts the assistant-facing text from a
//! delegation tool's `tool_result.content`.
//!
//! Three formats are tried in order: a JSON envelope (preferred), a
//! legacy YAML-lite envelope, and finally the raw content itself. Parsing
//! a delegation result never fails outright — an unparseable format just
//! falls through to the next, ending in the raw-content fallback, matching
//! the parse-error policy of falling back rather than throwing.
//!
//! The YAML-lite format is deliberately handled with a single-field
//! extractor rather than a full YAML parser: nested quoting inside block
//! scalars is ambiguous in the observed data, and the specification only
//! requires *a* reasonable parse, not a canonical one.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// Extract the assistant-facing text from a delegation tool's result
/// content. Always returns something — worst case, `raw` itself.
pub fn extract_delegation_text(raw: &str) -> String {
    if let Some(text) = try_json_envelope(raw) {
        return text;
    }
    if let Some(text) = try_yaml_lite(raw) {
        return text;
    }
    raw.to_string()
}

/// `{ notice?: string, agent_message: { role, content } }`. `content` may be
/// a plain string or an array of content blocks; in the array case only
/// `text`-tagged blocks contribute, concatenated in order.
fn try_json_envelope(raw: &str) -> Option<String> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let agent_message = value.get("agent_message")?;
    let content = agent_message.get("content")?;
    match content {
        Value::String(s) => Some(s.clone()),
        Value::Array(parts) => {
            let text: String = parts
                .iter()
                .filter(|part| part.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect();
            Some(text)
        }
        _ => None,
    }
}

fn preamble_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)^\s*\*\*IMPORTANT\*\*:.*?\n---\n").expect("valid regex")
    })
}

fn text_field_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^([ \t]*)text:[ \t]*(.*)$").expect("valid regex"))
}

/// Optionally prefixed with the literal `**IMPORTANT**: ... ---` preamble
/// (stripped), followed by a single `text:` field whose value is a quoted
/// scalar or a block scalar (`|`/`>`) with indented continuation lines.
fn try_yaml_lite(raw: &str) -> Option<String> {
    let body = preamble_re().replace(raw, "").into_owned();
    let captures = text_field_re().captures(&body)?;
    let indent = captures.get(1)?.as_str();
    let value = captures.get(2)?.as_str().trim();

    if value == "|" || value == ">" {
        return Some(extract_block_scalar(&body, &captures, indent));
    }
    if let Some(quoted) = extract_quoted_scalar(value) {
        return Some(quoted);
    }
    Some(value.to_string())
}

fn extract_quoted_scalar(value: &str) -> Option<String> {
    if value.len() >= 2 && value.starts_with('\'') && value.ends_with('\'') {
        let inner = &value[1..value.len() - 1];
        return Some(inner.replace("''", "'"));
    }
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        let inner = &value[1..value.len() - 1];
        return Some(inner.replace("\\\"", "\""));
    }
    None
}

fn extract_block_scalar(body: &str, captures: &regex::Captures, base_indent: &str) -> String {
    let match_end = captures.get(0).unwrap().end();
    let rest = &body[match_end..];

    // The indentation of the first non-blank line sets the block's margin;
    // every following line indented at least that much is content, stripped
    // back to that margin. A dedent below it, or below the key's own
    // indentation, ends the block.
    let mut indent_width: Option<usize> = None;
    let mut lines = Vec::new();
    for line in rest.lines() {
        if line.trim().is_empty() {
            lines.push(String::new());
            continue;
        }
        let this_indent = line.len() - line.trim_start().len();
        let width = *indent_width.get_or_insert(this_indent);
        if this_indent < width || this_indent <= base_indent.len() {
            break;
        }
        lines.push(line[width..].to_string());
    }
    while lines.first().is_some_and(|l| l.is_empty()) {
        lines.remove(0);
    }
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}
