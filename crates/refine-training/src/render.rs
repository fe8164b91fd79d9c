//! Turns stored inferences into chat fine-tuning examples.
//!
//! A record either renders completely or is dropped with a reason; a partial
//! example is never produced.

use crate::config::FunctionType;
use crate::content::{InputBlock, InputRole, JsonOutput, OutputBlock, StoredInput, StoredMessage, ToolCallBlock};
use crate::dataset::{ChatMessage, ContentPart, FunctionCall, MessageContent, Role, ToolCallEntry, TrainingExample};
use crate::query::InferenceRecord;
use crate::template::TemplateRenderer;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::io;
use tracing::warn;

/// Why a record was excluded from the dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    MalformedInput(String),
    MalformedOutput(String),
    UnsupportedInputBlock { role: InputRole, kind: String },
    UnsupportedOutputBlock { kind: String },
    Template(String),
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedInput(e) => write!(f, "malformed input: {e}"),
            Self::MalformedOutput(e) => write!(f, "malformed output: {e}"),
            Self::UnsupportedInputBlock { role, kind } => {
                let role = match role {
                    InputRole::User => "user",
                    InputRole::Assistant => "assistant",
                };
                write!(f, "unsupported content block type `{kind}` in {role} message")
            }
            Self::UnsupportedOutputBlock { kind } => write!(f, "unsupported content block type `{kind}` in output"),
            Self::Template(e) => write!(f, "template rendering failed: {e}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    Example(TrainingExample),
    Dropped(DropReason),
}

/// A rendered example together with the episode it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedRecord {
    pub episode_id: String,
    pub example: TrainingExample,
}

/// Serializes JSON with `": "` and `", "` separators, the spacing tool call
/// arguments are trained with. Non-ASCII characters are written as `\uXXXX`
/// escapes (surrogate pairs above the BMP), keeping the text pure ASCII.
struct SpacedFormatter;

impl serde_json::ser::Formatter for SpacedFormatter {
    fn begin_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_key<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W: ?Sized + io::Write>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()> {
        if fragment.is_ascii() {
            return writer.write_all(fragment.as_bytes());
        }
        for c in fragment.chars() {
            if c.is_ascii() {
                writer.write_all(c.encode_utf8(&mut [0u8; 4]).as_bytes())?;
            } else {
                for unit in c.encode_utf16(&mut [0u16; 2]) {
                    write!(writer, "\\u{unit:04x}")?;
                }
            }
        }
        Ok(())
    }
}

pub fn to_spaced_json(value: &Value) -> serde_json::Result<String> {
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, SpacedFormatter);
    value.serialize(&mut ser)?;
    // serde_json only ever writes UTF-8.
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn tool_call_entry(call: &ToolCallBlock) -> Result<ToolCallEntry, DropReason> {
    let arguments = match (&call.arguments, &call.raw_arguments) {
        (Value::Null, Some(raw)) => raw.clone(),
        (args, _) => to_spaced_json(args).map_err(|e| DropReason::MalformedInput(e.to_string()))?,
    };

    Ok(ToolCallEntry {
        id: call.id.clone(),
        kind: "function".to_string(),
        function: FunctionCall { name: call.name.clone(), arguments },
    })
}

fn think(text: &str) -> ContentPart {
    ContentPart::text(format!("<think>{text}</think>"))
}

fn assemble(role: Role, parts: Vec<ContentPart>, tool_calls: Vec<ToolCallEntry>) -> ChatMessage {
    ChatMessage {
        role,
        content: (!parts.is_empty()).then_some(MessageContent::Parts(parts)),
        tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
        tool_call_id: None,
    }
}

fn has_system_data(system: Option<&Value>) -> bool {
    match system {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(_) => true,
    }
}

/// Renders records of one function with one variant's templates.
pub struct ExampleRenderer<'a> {
    templates: &'a dyn TemplateRenderer,
    function_type: FunctionType,
}

impl<'a> ExampleRenderer<'a> {
    #[must_use]
    pub fn new(templates: &'a dyn TemplateRenderer, function_type: FunctionType) -> Self {
        Self { templates, function_type }
    }

    /// Render one stored input/output pair (both as the JSON text the store returns).
    #[must_use]
    pub fn render(&self, input: &str, output: &str) -> RenderOutcome {
        match self.try_render(input, output) {
            Ok(example) => RenderOutcome::Example(example),
            Err(reason) => RenderOutcome::Dropped(reason),
        }
    }

    /// Render every record, logging and skipping the ones that are dropped.
    pub fn render_records(&self, records: &[InferenceRecord]) -> (Vec<RenderedRecord>, usize) {
        let mut rendered = Vec::with_capacity(records.len());
        let mut dropped = 0;

        for record in records {
            match self.render(&record.input, &record.output) {
                RenderOutcome::Example(example) => {
                    rendered.push(RenderedRecord { episode_id: record.episode_id.clone(), example });
                }
                RenderOutcome::Dropped(reason) => {
                    warn!(
                        episode_id = %record.episode_id,
                        variant = %record.variant_name,
                        reason = %reason,
                        "Dropping example"
                    );
                    dropped += 1;
                }
            }
        }

        (rendered, dropped)
    }

    fn try_render(&self, input: &str, output: &str) -> Result<TrainingExample, DropReason> {
        let input: StoredInput =
            serde_json::from_str(input).map_err(|e| DropReason::MalformedInput(e.to_string()))?;

        let mut messages = Vec::new();
        if let Some(system) = self.render_system(input.system.as_ref())? {
            messages.push(system);
        }
        for message in &input.messages {
            messages.extend(self.render_message(message)?);
        }
        messages.push(self.render_output(output)?);

        Ok(TrainingExample { messages })
    }

    fn render_system(&self, system: Option<&Value>) -> Result<Option<ChatMessage>, DropReason> {
        let has_template = self.templates.has_template(Role::System);
        if !has_system_data(system) && !has_template {
            return Ok(None);
        }

        let content = match system {
            Some(Value::String(text)) if !text.is_empty() || !has_template => text.clone(),
            _ if has_template => {
                let empty = Value::Object(serde_json::Map::new());
                let args = system.filter(|v| !v.is_null()).unwrap_or(&empty);
                self.templates.render(Role::System, args).map_err(|e| DropReason::Template(e.to_string()))?
            }
            Some(data) => {
                warn!("System arguments given without a system template; using them as raw JSON");
                serde_json::to_string(data).map_err(|e| DropReason::MalformedInput(e.to_string()))?
            }
            None => String::new(),
        };

        Ok(Some(ChatMessage::text(Role::System, content)))
    }

    fn render_message(&self, message: &StoredMessage) -> Result<Vec<ChatMessage>, DropReason> {
        let role = match message.role {
            InputRole::User => Role::User,
            InputRole::Assistant => Role::Assistant,
        };
        let mut parts = Vec::new();
        let mut tool_calls = Vec::new();
        let mut rendered = Vec::new();

        for block in &message.content {
            match block {
                InputBlock::Text { value: Value::String(text) } => parts.push(ContentPart::text(text.clone())),
                InputBlock::Text { value } => {
                    let text =
                        self.templates.render(role, value).map_err(|e| DropReason::Template(e.to_string()))?;
                    parts.push(ContentPart::text(text));
                }
                InputBlock::RawText { value } => parts.push(ContentPart::text(value.clone())),
                InputBlock::Thought { text } => parts.push(think(text)),
                InputBlock::ToolCall(call) if message.role == InputRole::Assistant => {
                    tool_calls.push(tool_call_entry(call)?);
                }
                // Tool results follow the assistant's call directly; the rest of
                // the user turn comes after them.
                InputBlock::ToolResult(result) if message.role == InputRole::User => {
                    rendered.push(ChatMessage::tool_result(result.id.clone(), result.result.clone()));
                }
                other => {
                    return Err(DropReason::UnsupportedInputBlock { role: message.role, kind: other.kind().to_string() });
                }
            }
        }

        if !parts.is_empty() || !tool_calls.is_empty() {
            rendered.push(assemble(role, parts, tool_calls));
        }
        Ok(rendered)
    }

    fn render_output(&self, output: &str) -> Result<ChatMessage, DropReason> {
        match self.function_type {
            FunctionType::Json => {
                let output: JsonOutput =
                    serde_json::from_str(output).map_err(|e| DropReason::MalformedOutput(e.to_string()))?;
                Ok(ChatMessage::text(Role::Assistant, output.raw))
            }
            FunctionType::Chat => {
                let blocks: Vec<OutputBlock> =
                    serde_json::from_str(output).map_err(|e| DropReason::MalformedOutput(e.to_string()))?;
                let mut parts = Vec::new();
                let mut tool_calls = Vec::new();

                for block in &blocks {
                    match block {
                        OutputBlock::Text { text } => parts.push(ContentPart::text(text.clone())),
                        OutputBlock::Thought { text } => parts.push(think(text)),
                        OutputBlock::ToolCall(call) => tool_calls.push(tool_call_entry(call)?),
                        OutputBlock::Unsupported { kind } => {
                            return Err(DropReason::UnsupportedOutputBlock { kind: kind.clone() });
                        }
                    }
                }

                Ok(assemble(Role::Assistant, parts, tool_calls))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{JinjaTemplates, TemplateSources};
    use serde_json::json;

    fn templates(system: Option<&str>, user: Option<&str>) -> JinjaTemplates {
        JinjaTemplates::new(&TemplateSources {
            system: system.map(str::to_string),
            user: user.map(str::to_string),
            assistant: None,
        })
        .unwrap()
    }

    fn example(outcome: RenderOutcome) -> TrainingExample {
        match outcome {
            RenderOutcome::Example(example) => example,
            RenderOutcome::Dropped(reason) => panic!("unexpected drop: {reason}"),
        }
    }

    fn chat_output(blocks: &Value) -> String {
        blocks.to_string()
    }

    #[test]
    fn test_literal_user_text_is_not_templated() {
        let t = templates(None, Some("TEMPLATED {{name}}"));
        let renderer = ExampleRenderer::new(&t, FunctionType::Chat);
        let input = json!({"messages": [{"role": "user", "content": [{"type": "text", "value": "What is 2+2?"}]}]});
        let output = chat_output(&json!([{"type": "text", "text": "4"}]));

        let ex = example(renderer.render(&input.to_string(), &output));
        assert_eq!(ex.messages.len(), 2);
        assert_eq!(ex.messages[0].role, Role::User);
        assert_eq!(ex.messages[0].content, Some(MessageContent::Parts(vec![ContentPart::text("What is 2+2?")])));
        assert_eq!(ex.messages[1].role, Role::Assistant);
    }

    #[test]
    fn test_structured_user_text_goes_through_template() {
        let t = templates(None, Some("Extract from: {{article}}"));
        let renderer = ExampleRenderer::new(&t, FunctionType::Chat);
        let input = json!({"messages": [{"role": "user", "content": [{"type": "text", "value": {"article": "x & y"}}]}]});
        let output = chat_output(&json!([{"type": "text", "text": "ok"}]));

        let ex = example(renderer.render(&input.to_string(), &output));
        assert_eq!(ex.messages[0].content, Some(MessageContent::Parts(vec![ContentPart::text("Extract from: x & y")])));
    }

    #[test]
    fn test_output_tool_call_arguments_are_spaced_json() {
        let t = templates(None, None);
        let renderer = ExampleRenderer::new(&t, FunctionType::Chat);
        let input = json!({"messages": [{"role": "user", "content": [{"type": "text", "value": "look it up"}]}]});
        let output = chat_output(&json!([{"type": "tool_call", "id": "call_1", "name": "lookup", "arguments": {"x": 1}}]));

        let ex = example(renderer.render(&input.to_string(), &output));
        let last = ex.messages.last().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert!(last.content.is_none());
        let calls = last.tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].function.name, "lookup");
        assert_eq!(calls[0].function.arguments, r#"{"x": 1}"#);
        assert_eq!(calls[0].kind, "function");
        assert_eq!(calls[0].id, "call_1");
    }

    #[test]
    fn test_spaced_json_keeps_key_order_and_nesting() {
        let value: Value = serde_json::from_str(r#"{"b": [1, 2, {"c": null}], "a": "s"}"#).unwrap();
        assert_eq!(to_spaced_json(&value).unwrap(), r#"{"b": [1, 2, {"c": null}], "a": "s"}"#);
        assert_eq!(to_spaced_json(&json!({})).unwrap(), "{}");
    }

    #[test]
    fn test_spaced_json_escapes_non_ascii() {
        let value = json!({"city": "Zürich", "note": "tab\t", "emoji": "☀️🌧"});
        assert_eq!(
            to_spaced_json(&value).unwrap(),
            r#"{"city": "Z\u00fcrich", "note": "tab\t", "emoji": "\u2600\ufe0f\ud83c\udf27"}"#
        );
        assert_eq!(to_spaced_json(&json!({"Größe": 1})).unwrap(), r#"{"Gr\u00f6\u00dfe": 1}"#);
    }

    #[test]
    fn test_raw_arguments_used_when_arguments_null() {
        let t = templates(None, None);
        let renderer = ExampleRenderer::new(&t, FunctionType::Chat);
        let input = json!({"messages": []});
        let output = chat_output(&json!([{
            "type": "tool_call", "id": "c", "name": "f", "arguments": null, "raw_arguments": "{\"bad\": "
        }]));

        let ex = example(renderer.render(&input.to_string(), &output));
        assert_eq!(ex.messages[0].tool_calls.as_ref().unwrap()[0].function.arguments, "{\"bad\": ");
    }

    #[test]
    fn test_tool_result_precedes_rest_of_user_turn() {
        let t = templates(None, None);
        let renderer = ExampleRenderer::new(&t, FunctionType::Chat);
        let input = json!({"messages": [
            {"role": "user", "content": [{"type": "text", "value": "weather?"}]},
            {"role": "assistant", "content": [
                {"type": "text", "value": "checking"},
                {"type": "tool_call", "id": "call_1", "name": "weather", "arguments": {"city": "Paris"}}
            ]},
            {"role": "user", "content": [
                {"type": "text", "value": "also, thanks"},
                {"type": "tool_result", "id": "call_1", "name": "weather", "result": "sunny"}
            ]}
        ]});
        let output = chat_output(&json!([{"type": "text", "text": "It is sunny."}]));

        let ex = example(renderer.render(&input.to_string(), &output));
        let roles: Vec<Role> = ex.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, [Role::User, Role::Assistant, Role::Tool, Role::User, Role::Assistant]);

        let assistant = &ex.messages[1];
        assert!(assistant.content.is_some());
        assert_eq!(assistant.tool_calls.as_ref().unwrap()[0].function.arguments, r#"{"city": "Paris"}"#);

        let tool = &ex.messages[2];
        assert_eq!(tool.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(tool.content, Some(MessageContent::Text("sunny".to_string())));
    }

    #[test]
    fn test_thoughts_are_wrapped() {
        let t = templates(None, None);
        let renderer = ExampleRenderer::new(&t, FunctionType::Chat);
        let input = json!({"messages": [{"role": "assistant", "content": [{"type": "thought", "text": "plan"}]}]});
        let output = chat_output(&json!([{"type": "thought", "text": "a"}, {"type": "text", "text": "b"}]));

        let ex = example(renderer.render(&input.to_string(), &output));
        assert_eq!(ex.messages[0].content, Some(MessageContent::Parts(vec![ContentPart::text("<think>plan</think>")])));
        assert_eq!(
            ex.messages[1].content,
            Some(MessageContent::Parts(vec![ContentPart::text("<think>a</think>"), ContentPart::text("b")]))
        );
    }

    #[test]
    fn test_unsupported_blocks_drop_whole_example() {
        let t = templates(None, None);
        let renderer = ExampleRenderer::new(&t, FunctionType::Chat);
        let ok_output = chat_output(&json!([{"type": "text", "text": "ok"}]));

        let image = json!({"messages": [
            {"role": "user", "content": [{"type": "text", "value": "fine"}]},
            {"role": "user", "content": [{"type": "image", "url": "x"}]}
        ]});
        assert_eq!(
            renderer.render(&image.to_string(), &ok_output),
            RenderOutcome::Dropped(DropReason::UnsupportedInputBlock { role: InputRole::User, kind: "image".to_string() })
        );

        // Tool calls only belong to assistants, tool results only to users.
        let misplaced = json!({"messages": [{"role": "user", "content": [
            {"type": "tool_call", "id": "c", "name": "f", "arguments": {}}
        ]}]});
        assert!(matches!(renderer.render(&misplaced.to_string(), &ok_output), RenderOutcome::Dropped(_)));
        let misplaced = json!({"messages": [{"role": "assistant", "content": [
            {"type": "tool_result", "id": "c", "result": "r"}
        ]}]});
        assert!(matches!(renderer.render(&misplaced.to_string(), &ok_output), RenderOutcome::Dropped(_)));

        let fine = json!({"messages": [{"role": "user", "content": [{"type": "text", "value": "fine"}]}]});
        let bad_output = chat_output(&json!([{"type": "text", "text": "a"}, {"type": "unknown", "data": 1}]));
        assert_eq!(
            renderer.render(&fine.to_string(), &bad_output),
            RenderOutcome::Dropped(DropReason::UnsupportedOutputBlock { kind: "unknown".to_string() })
        );
        let tool_result_output = chat_output(&json!([{"type": "tool_result", "id": "c", "result": "r"}]));
        assert!(matches!(renderer.render(&fine.to_string(), &tool_result_output), RenderOutcome::Dropped(_)));
    }

    #[test]
    fn test_malformed_records_are_dropped() {
        let t = templates(None, None);
        let renderer = ExampleRenderer::new(&t, FunctionType::Chat);
        assert!(matches!(renderer.render("not json", "[]"), RenderOutcome::Dropped(DropReason::MalformedInput(_))));
        assert!(matches!(
            renderer.render(r#"{"messages": []}"#, r#"{"raw": "x"}"#),
            RenderOutcome::Dropped(DropReason::MalformedOutput(_))
        ));
    }

    #[test]
    fn test_structured_text_without_template_is_dropped() {
        let t = templates(None, None);
        let renderer = ExampleRenderer::new(&t, FunctionType::Chat);
        let input = json!({"messages": [{"role": "user", "content": [{"type": "text", "value": {"a": 1}}]}]});
        assert!(matches!(renderer.render(&input.to_string(), "[]"), RenderOutcome::Dropped(DropReason::Template(_))));
    }

    #[test]
    fn test_json_output_uses_raw_payload() {
        let t = templates(Some("Extract entities about {{topic}}."), None);
        let renderer = ExampleRenderer::new(&t, FunctionType::Json);
        let input = json!({"system": {"topic": "sports"}, "messages": [
            {"role": "user", "content": [{"type": "text", "value": "Messi scored."}]}
        ]});
        let output = json!({"raw": "{\"person\": [\"Messi\"]}", "parsed": {"person": ["Messi"]}});

        let ex = example(renderer.render(&input.to_string(), &output.to_string()));
        assert_eq!(ex.messages.len(), 3);
        assert_eq!(ex.messages[0], ChatMessage::text(Role::System, "Extract entities about sports."));
        assert_eq!(ex.messages[2], ChatMessage::text(Role::Assistant, "{\"person\": [\"Messi\"]}"));
    }

    #[test]
    fn test_system_template_renders_without_system_data() {
        let t = templates(Some("You are terse."), None);
        let renderer = ExampleRenderer::new(&t, FunctionType::Chat);
        let ex = example(renderer.render(r#"{"messages": []}"#, "[]"));
        assert_eq!(ex.messages[0], ChatMessage::text(Role::System, "You are terse."));
        assert_eq!(ex.messages[1].role, Role::Assistant);
    }

    #[test]
    fn test_system_handling_without_template() {
        let t = templates(None, None);
        let renderer = ExampleRenderer::new(&t, FunctionType::Chat);

        let ex = example(renderer.render(r#"{"system": "Be nice.", "messages": []}"#, "[]"));
        assert_eq!(ex.messages[0], ChatMessage::text(Role::System, "Be nice."));

        let ex = example(renderer.render(r#"{"system": {"tone": "dry"}, "messages": []}"#, "[]"));
        assert_eq!(ex.messages[0], ChatMessage::text(Role::System, r#"{"tone":"dry"}"#));

        let ex = example(renderer.render(r#"{"system": {}, "messages": []}"#, "[]"));
        assert_eq!(ex.messages.len(), 1);
        assert_eq!(ex.messages[0].role, Role::Assistant);
    }

    #[test]
    fn test_render_records_counts_drops() {
        let t = templates(None, None);
        let renderer = ExampleRenderer::new(&t, FunctionType::Chat);
        let good = InferenceRecord {
            variant_name: "v".to_string(),
            input: r#"{"messages": [{"role": "user", "content": [{"type": "text", "value": "hi"}]}]}"#.to_string(),
            output: r#"[{"type": "text", "text": "hello"}]"#.to_string(),
            value: crate::query::FeedbackValue::Boolean(true),
            episode_id: "e1".to_string(),
        };
        let bad = InferenceRecord { output: r#"[{"type": "unknown"}]"#.to_string(), ..good.clone() };

        let (rendered, dropped) = renderer.render_records(&[good, bad]);
        assert_eq!(rendered.len(), 1);
        assert_eq!(dropped, 1);
        assert_eq!(rendered[0].episode_id, "e1");
    }

    #[test]
    fn test_jsonl_round_trip_preserves_messages() {
        let t = templates(None, None);
        let renderer = ExampleRenderer::new(&t, FunctionType::Chat);
        let input = json!({"system": "s", "messages": [
            {"role": "user", "content": [{"type": "text", "value": "q"}]},
            {"role": "assistant", "content": [{"type": "tool_call", "id": "c", "name": "f", "arguments": {"k": [1]}}]},
            {"role": "user", "content": [{"type": "tool_result", "id": "c", "result": "r"}]}
        ]});
        let ex = example(renderer.render(&input.to_string(), r#"[{"type": "text", "text": "done"}]"#));

        let line = serde_json::to_string(&ex).unwrap();
        let parsed: TrainingExample = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed, ex);
    }
}
