use anyhow::Result;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

#[derive(Serialize)]
struct PromptRequest<'a> {
    prompt: &'a str,
}

/// Shape of a reply body after one parse attempt. The endpoint is free to
/// answer with a JSON array of fragments, a JSON string, or anything else;
/// anything else is shown verbatim.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyBody {
    Fragments(Vec<Value>),
    Text(String),
    Raw(String),
}

impl ReplyBody {
    pub fn parse(raw: &str) -> Self {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Array(items)) => ReplyBody::Fragments(items),
            Ok(Value::String(text)) => ReplyBody::Text(text),
            _ => ReplyBody::Raw(raw.to_string()),
        }
    }

    /// Collapse the parsed body into the text shown in the transcript.
    /// Array fragments are joined with single spaces.
    pub fn into_display_text(self) -> String {
        match self {
            ReplyBody::Fragments(items) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(" "),
            ReplyBody::Text(text) => text,
            ReplyBody::Raw(raw) => raw,
        }
    }
}

#[derive(Clone)]
pub struct ChatClient {
    client: Client,
}

impl ChatClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    /// POST the prompt as `{"prompt": ...}` and return the reply's display
    /// text. Any response whose body can be read counts as a reply; the HTTP
    /// status is not inspected. Errors here are transport failures only.
    pub async fn send_prompt(&self, url: &str, prompt: &str) -> Result<String> {
        tracing::debug!(url, "sending prompt");

        let response = self
            .client
            .post(url)
            .json(&PromptRequest { prompt })
            .send()
            .await?;

        let body = response.text().await?;
        Ok(ReplyBody::parse(&body).into_display_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_body_joins_with_single_spaces() {
        let reply = ReplyBody::parse(r#"["a","b","c"]"#);
        assert_eq!(reply.into_display_text(), "a b c");
    }

    #[test]
    fn string_body_is_used_directly() {
        let reply = ReplyBody::parse(r#""hello""#);
        assert_eq!(reply.into_display_text(), "hello");
    }

    #[test]
    fn invalid_json_falls_back_to_raw_text() {
        let reply = ReplyBody::parse("plain text");
        assert_eq!(reply, ReplyBody::Raw("plain text".to_string()));
        assert_eq!(ReplyBody::parse("plain text").into_display_text(), "plain text");
    }

    #[test]
    fn other_json_shapes_fall_back_to_raw_text() {
        let body = r#"{"answer": "hidden"}"#;
        assert_eq!(ReplyBody::parse(body).into_display_text(), body);
        assert_eq!(ReplyBody::parse("42").into_display_text(), "42");
    }

    #[test]
    fn non_string_fragments_are_rendered_compactly() {
        let reply = ReplyBody::parse(r#"["a", 1, true]"#);
        assert_eq!(reply.into_display_text(), "a 1 true");
    }

    #[test]
    fn empty_array_produces_empty_text() {
        assert_eq!(ReplyBody::parse("[]").into_display_text(), "");
    }
}
