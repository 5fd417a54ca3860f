use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};

use ovai_protocol::gemini::{Content, ContentRole, Part};
use ovai_protocol::native::{ChatMessage, GenerateRequest, ToolCall};
use ovai_protocol::openai::{CompletionsMessage, ContentParts};

use crate::error::TranslateError;

fn map_role(role: &str) -> Result<ContentRole, TranslateError> {
    match role {
        "user" | "tool" => Ok(ContentRole::User),
        "assistant" => Ok(ContentRole::Model),
        other => Err(TranslateError::InvalidRole(other.to_string())),
    }
}

/// Sniffs the MIME type from the decoded bytes; only images are accepted.
fn image_part(encoded: &str) -> Result<Part, TranslateError> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|err| TranslateError::InvalidImageData(err.to_string()))?;
    let mime = infer::get(&bytes)
        .map(|kind| kind.mime_type())
        .unwrap_or("application/octet-stream");
    if !mime.starts_with("image/") {
        return Err(TranslateError::InvalidImageType(mime.to_string()));
    }
    Ok(Part::inline_data(mime, encoded.trim()))
}

/// Accepts only `data:<mime>;base64,<payload>` URIs with an image MIME.
fn data_uri_part(url: &str) -> Result<Part, TranslateError> {
    let head = url.get(..5).unwrap_or(url).to_string();
    if !url.starts_with("data:") {
        return Err(TranslateError::InvalidDataUriPrefix(head));
    }
    let Some(semicolon) = url.find(';') else {
        return Err(TranslateError::MissingSemicolon(head));
    };
    let mime = &url[5..semicolon];
    if !mime.starts_with("image/") {
        return Err(TranslateError::InvalidImageType(mime.to_string()));
    }
    let Some(comma) = url[semicolon..].find(',').map(|pos| pos + semicolon) else {
        return Err(TranslateError::MissingComma(head));
    };
    let encoding = &url[semicolon + 1..comma];
    if encoding != "base64" {
        return Err(TranslateError::InvalidImageEncoding(encoding.to_string()));
    }
    Ok(Part::inline_data(mime, &url[comma + 1..]))
}

fn function_call_parts(calls: &[ToolCall]) -> Vec<Part> {
    calls
        .iter()
        .map(|call| {
            Part::function_call(
                call.function.name.clone(),
                Value::Object(call.function.arguments.clone()),
            )
        })
        .collect()
}

fn function_response_part(name: &str, result: String) -> Part {
    Part::function_response(name, json!({ "result": result }))
}

fn finish_contents(
    system_parts: Vec<Part>,
    mut contents: Vec<Content>,
) -> Result<Vec<Content>, TranslateError> {
    if contents.is_empty() {
        return Err(TranslateError::NoUserMessage);
    }
    if !system_parts.is_empty() {
        let first = &mut contents[0].parts;
        let mut parts = system_parts;
        parts.append(first);
        *first = parts;
    }
    Ok(contents)
}

/// Generate is a single user turn: optional system text, the prompt, then
/// one inline-data part per image.
pub fn convert_generate_prompt(input: &GenerateRequest) -> Result<Vec<Content>, TranslateError> {
    let mut parts = Vec::with_capacity(input.images.len() + 2);
    if let Some(system) = input.system.as_deref().filter(|text| !text.is_empty()) {
        parts.push(Part::text(system));
    }
    parts.push(Part::text(&input.prompt));
    for image in &input.images {
        parts.push(image_part(image)?);
    }
    Ok(vec![Content {
        role: ContentRole::User,
        parts,
    }])
}

/// Maps chat turns onto provider contents; system messages collect into
/// parts prepended to the first non-system turn.
pub fn convert_chat_messages(messages: &[ChatMessage]) -> Result<Vec<Content>, TranslateError> {
    let mut system_parts = Vec::new();
    let mut contents = Vec::with_capacity(messages.len());
    for message in messages {
        if message.role == "system" {
            system_parts.push(Part::text(&message.content));
            continue;
        }
        let role = map_role(&message.role)?;
        let mut parts = match message.tool_call_id.as_deref().filter(|id| !id.is_empty()) {
            Some(id) => vec![function_response_part(id, message.content.clone())],
            None if !message.tool_calls.is_empty() => function_call_parts(&message.tool_calls),
            None => vec![Part::text(&message.content)],
        };
        for image in &message.images {
            parts.push(image_part(image)?);
        }
        contents.push(Content { role, parts });
    }
    finish_contents(system_parts, contents)
}

fn content_parts(content: &ContentParts) -> Result<Vec<Part>, TranslateError> {
    let mut parts = Vec::with_capacity(content.0.len());
    for part in &content.0 {
        match part.kind.as_str() {
            "text" => parts.push(Part::text(&part.text)),
            "image_url" => parts.push(data_uri_part(&part.image_url.url)?),
            other => return Err(TranslateError::InvalidContentType(other.to_string())),
        }
    }
    Ok(parts)
}

fn tool_result_parts(content: &ContentParts, name: &str) -> Result<Vec<Part>, TranslateError> {
    let mut joined = String::new();
    for (index, part) in content.0.iter().enumerate() {
        if part.kind != "text" {
            return Err(TranslateError::InvalidToolContentType(part.kind.clone()));
        }
        if index > 0 {
            joined.push('\n');
        }
        joined.push_str(&part.text);
    }
    Ok(vec![function_response_part(name, joined)])
}

/// Maps OpenAI-style messages onto provider contents; `developer` counts as
/// a system role.
pub fn convert_completions_messages(
    messages: &[CompletionsMessage],
) -> Result<Vec<Content>, TranslateError> {
    let mut system_parts = Vec::new();
    let mut contents = Vec::with_capacity(messages.len());
    for message in messages {
        if message.role == "system" || message.role == "developer" {
            system_parts.extend(content_parts(&message.content)?);
            continue;
        }
        let role = map_role(&message.role)?;
        let parts = match message.tool_call_id.as_deref().filter(|id| !id.is_empty()) {
            Some(id) => tool_result_parts(&message.content, id)?,
            None if !message.tool_calls.is_empty() => function_call_parts(&message.tool_calls),
            None => content_parts(&message.content)?,
        };
        contents.push(Content { role, parts });
    }
    finish_contents(system_parts, contents)
}
