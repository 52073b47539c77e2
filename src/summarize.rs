//! Standup summaries from a local Ollama server.
//!
//! The engine never calls into this module; the CLI hands it the plain-text
//! rendering of an [`ActivityRecord`](crate::model::ActivityRecord) once the
//! scan is complete.

use crate::error::SummarizeError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "llama3";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

const SYSTEM_PROMPT: &str = "You are a Scrum Master assistant. \
Given a developer's git activity across one or more repositories, write ONE concise \
standup summary (2-3 sentences) as if the developer is speaking. Group similar work \
together and highlight themes such as features, fixes and refactors. Avoid file paths, \
commit hashes, headings and bullet points.";

pub trait Summarizer {
    fn summarize(&self, activity_text: &str) -> Result<String, SummarizeError>;
}

pub struct OllamaSummarizer {
    endpoint: String,
    model: String,
    timeout: Duration,
    agent: ureq::Agent,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: Option<ReplyMessage>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct ReplyMessage {
    content: String,
}

impl OllamaSummarizer {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Self {
        let agent = ureq::config::Config::builder()
            .http_status_as_error(false)
            .timeout_global(Some(timeout))
            .build()
            .new_agent();
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            timeout,
            agent,
        }
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.endpoint)
    }

    fn map_transport(&self, err: ureq::Error) -> SummarizeError {
        match err {
            ureq::Error::Timeout(_) => SummarizeError::InferenceTimeout(self.timeout),
            ureq::Error::Io(io) if io.kind() == std::io::ErrorKind::TimedOut => {
                SummarizeError::InferenceTimeout(self.timeout)
            }
            other => SummarizeError::InferenceUnavailable {
                endpoint: self.endpoint.clone(),
                reason: other.to_string(),
            },
        }
    }
}

impl Default for OllamaSummarizer {
    fn default() -> Self {
        Self::new(DEFAULT_ENDPOINT, DEFAULT_MODEL, DEFAULT_TIMEOUT)
    }
}

impl Summarizer for OllamaSummarizer {
    fn summarize(&self, activity_text: &str) -> Result<String, SummarizeError> {
        let user_prompt = format!(
            "{}\n\nWrite one 2-3 sentence standup summary. No preface, no headers.",
            activity_text.trim()
        );
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &user_prompt,
                },
            ],
            stream: false,
        };

        debug!("asking {} ({}) for a summary", self.endpoint, self.model);
        let response = self
            .agent
            .post(self.chat_url().as_str())
            .header("Content-Type", "application/json")
            .send_json(&body)
            .map_err(|e| self.map_transport(e))?;

        let status = response.status().as_u16();
        let text = response
            .into_body()
            .read_to_string()
            .map_err(|e| self.map_transport(e))?;
        if status >= 400 {
            return Err(SummarizeError::BadResponse(format!("HTTP {status}: {}", text.trim())));
        }
        parse_reply(&text)
    }
}

fn parse_reply(text: &str) -> Result<String, SummarizeError> {
    let reply: ChatResponse =
        serde_json::from_str(text).map_err(|e| SummarizeError::BadResponse(e.to_string()))?;
    if let Some(error) = reply.error {
        return Err(SummarizeError::BadResponse(error));
    }
    let content = reply
        .message
        .map(|m| m.content.trim().to_string())
        .unwrap_or_default();
    if content.is_empty() {
        return Err(SummarizeError::BadResponse("empty reply".into()));
    }
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Serves exactly one HTTP request with a canned response.
    fn serve_once(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);
            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if line == "\r\n" || line.is_empty() {
                    break;
                }
                if let Some(value) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                    content_length = value.trim().parse().unwrap();
                }
            }
            let mut request_body = vec![0; content_length];
            reader.read_exact(&mut request_body).unwrap();
            let mut stream = reader.into_inner();
            write!(
                stream,
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            )
            .unwrap();
        });
        format!("http://{addr}")
    }

    #[test]
    fn reads_the_reply_content() {
        let endpoint = serve_once(
            "200 OK",
            r#"{"model":"llama3","message":{"role":"assistant","content":"  Shipped the parser and fixed CI.  "},"done":true}"#,
        );
        let summarizer = OllamaSummarizer::new(endpoint, "llama3", Duration::from_secs(5));
        let summary = summarizer.summarize("app: 2 commits").unwrap();
        assert_eq!(summary, "Shipped the parser and fixed CI.");
    }

    #[test]
    fn server_errors_are_bad_responses() {
        let endpoint = serve_once("404 Not Found", r#"{"error":"model 'llama3' not found"}"#);
        let summarizer = OllamaSummarizer::new(endpoint, "llama3", Duration::from_secs(5));
        let err = summarizer.summarize("app: 2 commits").unwrap_err();
        assert!(matches!(err, SummarizeError::BadResponse(ref m) if m.contains("404")));
    }

    #[test]
    fn unreachable_server_is_unavailable() {
        // bind then drop to get a port nobody listens on
        let port = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
        let summarizer = OllamaSummarizer::new(
            format!("http://127.0.0.1:{port}"),
            "llama3",
            Duration::from_secs(5),
        );
        let err = summarizer.summarize("anything").unwrap_err();
        assert!(matches!(err, SummarizeError::InferenceUnavailable { .. }));
    }

    #[test]
    fn reply_parsing() {
        assert_eq!(
            parse_reply(r#"{"message":{"content":"ok"}}"#).unwrap(),
            "ok"
        );
        assert!(parse_reply(r#"{"message":{"content":"   "}}"#).is_err());
        assert!(parse_reply(r#"{"error":"boom"}"#).is_err());
        assert!(parse_reply("not json").is_err());
    }
}
