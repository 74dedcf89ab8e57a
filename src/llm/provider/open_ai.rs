use futures::StreamExt;
use serde::Serialize;
use serde_json::{Value, json};
use tokio::sync::mpsc;

use crate::{
    CHANNEL_BUFFER_DEFAULT,
    error::*,
    llm::{ChatCompletionEvent, ChatCompletionStream, provider::*},
    utils::net::join_url,
};

pub struct OpenAiProvider {
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiProvider {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    fn request_body(&self, messages: &[ChatMessage], options: &ChatCompletionOptions) -> Value {
        let mut messages_json_value = messages
            .iter()
            .map(chat_message_to_json_value)
            .collect::<Vec<_>>();
        if self.model.starts_with("qwen3") {
            if let Some(content) = messages_json_value
                .last_mut()
                .and_then(|message| message.get_mut("content"))
            {
                if let Some(content_str) = content.as_str() {
                    let instruction = if options.enable_think {
                        "/think"
                    } else {
                        "/no_think"
                    };
                    *content = format!("{content_str} {instruction}").into();
                }
            }
        }

        json!({
            "model": self.model,
            "messages": messages_json_value,
            "temperature": options.temperature,
            "stream": true,
        })
    }
}

impl ChatProvider for OpenAiProvider {
    async fn chat_completion(
        &self,
        messages: &[ChatMessage],
        options: &ChatCompletionOptions,
    ) -> FinvalResult<ChatMessage> {
        let mut content = String::new();
        let mut reasoning_content = String::new();

        let mut stream = self.chat_completion_stream(messages, options).await?;
        while let Some(event) = stream.next().await {
            match event {
                ChatCompletionEvent::Content(delta) => {
                    content.push_str(&delta);
                }
                ChatCompletionEvent::ReasoningContent(delta) => {
                    reasoning_content.push_str(&delta);
                }
                ChatCompletionEvent::Error(err) => {
                    return Err(err);
                }
            }
        }

        Ok(ChatMessage {
            role: Role::Bot,
            content,
            reasoning: if reasoning_content.is_empty() {
                None
            } else {
                Some(reasoning_content)
            },
        })
    }

    async fn chat_completion_stream(
        &self,
        messages: &[ChatMessage],
        options: &ChatCompletionOptions,
    ) -> FinvalResult<ChatCompletionStream> {
        let request_url = join_url(&self.base_url, "/chat/completions")?;
        let request_body = self.request_body(messages, options);

        let client = reqwest::Client::builder().build()?;

        let response = client
            .post(request_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await?;

        if response.status().is_success() {
            let (sender, receiver) = mpsc::channel(CHANNEL_BUFFER_DEFAULT);

            tokio::spawn(async move {
                let mut stream = response.bytes_stream();
                // A chunk may end in the middle of a line
                let mut pending = String::new();

                'chunks: while let Some(chunk) = stream.next().await {
                    match chunk {
                        Ok(chunk) => {
                            pending.push_str(&String::from_utf8_lossy(&chunk));

                            while let Some(pos) = pending.find('\n') {
                                let line: String = pending.drain(..=pos).collect();

                                match parse_stream_line(&line) {
                                    StreamLine::Done => break 'chunks,
                                    StreamLine::Event(event) => {
                                        if sender.send(event).await.is_err() {
                                            break 'chunks;
                                        }
                                    }
                                    StreamLine::Skip => {}
                                }
                            }
                        }
                        Err(err) => {
                            let _ = sender.send(ChatCompletionEvent::Error(err.into())).await;
                        }
                    }
                }
            });

            Ok(ChatCompletionStream::new(receiver))
        } else {
            Err(FinvalError::HttpStatusError(format!(
                "{} {}",
                response.status(),
                response.text().await.ok().unwrap_or_default()
            )))
        }
    }
}

enum StreamLine {
    Done,
    Event(ChatCompletionEvent),
    Skip,
}

fn parse_stream_line(line: &str) -> StreamLine {
    let Some(data) = line.trim_end().strip_prefix("data:") else {
        return StreamLine::Skip;
    };
    let data = data.trim_start();

    if data == "[DONE]" {
        return StreamLine::Done;
    }

    match serde_json::from_str::<Value>(data) {
        Ok(json) => {
            let delta = &json["choices"][0]["delta"];
            if let Some(content) = delta["content"].as_str() {
                StreamLine::Event(ChatCompletionEvent::Content(content.to_string()))
            } else if let Some(reasoning) = delta["reasoning_content"].as_str() {
                StreamLine::Event(ChatCompletionEvent::ReasoningContent(reasoning.to_string()))
            } else {
                StreamLine::Skip
            }
        }
        Err(err) => StreamLine::Event(ChatCompletionEvent::Error(err.into())),
    }
}

#[derive(strum::Display)]
enum OpenAiRole {
    #[strum(serialize = "user")]
    User,

    #[strum(serialize = "assistant")]
    Assistant,

    #[strum(serialize = "system")]
    System,
}

impl From<Role> for OpenAiRole {
    fn from(val: Role) -> Self {
        match val {
            Role::User => OpenAiRole::User,
            Role::Bot => OpenAiRole::Assistant,
            Role::System => OpenAiRole::System,
        }
    }
}

impl Serialize for OpenAiRole {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

fn chat_message_to_json_value(chat_message: &ChatMessage) -> Value {
    json!({
        "role": OpenAiRole::from(chat_message.role),
        "content": chat_message.content
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_stream_line() {
        let line = r#"data: {"choices":[{"delta":{"content":"Hi"}}]}"#;
        assert!(matches!(
            parse_stream_line(line),
            StreamLine::Event(ChatCompletionEvent::Content(s)) if s == "Hi"
        ));

        let line = r#"data: {"choices":[{"delta":{"reasoning_content":"hmm"}}]}"#;
        assert!(matches!(
            parse_stream_line(line),
            StreamLine::Event(ChatCompletionEvent::ReasoningContent(s)) if s == "hmm"
        ));

        assert!(matches!(parse_stream_line("data: [DONE]\n"), StreamLine::Done));
        assert!(matches!(parse_stream_line(": keep-alive"), StreamLine::Skip));
        assert!(matches!(
            parse_stream_line(r#"data: {"choices":[{"delta":{}}]}"#),
            StreamLine::Skip
        ));
        assert!(matches!(
            parse_stream_line("data: {broken"),
            StreamLine::Event(ChatCompletionEvent::Error(_))
        ));
    }

    #[test]
    fn test_request_body() {
        let provider = OpenAiProvider::new("https://example.com/v1", "key", "qwen3-8b");
        let messages = vec![
            ChatMessage {
                role: Role::System,
                content: "system".to_string(),
                reasoning: None,
            },
            ChatMessage {
                role: Role::User,
                content: "hello".to_string(),
                reasoning: None,
            },
        ];

        let body = provider.request_body(
            &messages,
            &ChatCompletionOptions::default().with_temperature(0.2),
        );
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hello /no_think");
        assert_eq!(body["temperature"], 0.2);
        assert_eq!(body["stream"], true);
    }
}
