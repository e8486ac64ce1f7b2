use crate::error::{AppError, Result};
use crate::infra::config::Config;
use crate::models::schema::{ChatRequestPayload, ChatResponseChunk};
use async_stream::try_stream;
use futures::{Stream, StreamExt, TryStreamExt};
use tracing::{debug, instrument};

/// Client for an Ollama-style `/api/chat` endpoint that streams NDJSON.
#[derive(Debug, Clone)]
pub struct ModelClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
}

impl ModelClient {
    pub fn new(config: &Config) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.model_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| AppError::Internal(format!("failed to build http client: {}", e)))?;

        Ok(Self {
            http,
            endpoint: config.model_endpoint.clone(),
            model: config.model_name.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Sends `prompt` as a single user message and yields the reply's content
    /// fragments in arrival order. Nothing is sent until the stream is polled;
    /// the stream ends when the endpoint closes the connection.
    pub fn fragments<'a>(
        &'a self,
        prompt: &'a str,
        model: &'a str,
    ) -> impl Stream<Item = Result<String>> + Send + 'a {
        try_stream! {
            let resp = self.send(prompt, model).await?;
            let mut body = resp.bytes_stream();
            let mut lines = LineBuffer::default();
            while let Some(chunk) = body.next().await {
                let chunk = chunk.map_err(AppError::from_transport)?;
                for line in lines.push(&chunk)? {
                    if let Some(fragment) = parse_chunk(&line)? {
                        yield fragment;
                    }
                }
            }
            if let Some(line) = lines.finish()? {
                if let Some(fragment) = parse_chunk(&line)? {
                    yield fragment;
                }
            }
        }
    }

    async fn send(&self, prompt: &str, model: &str) -> Result<reqwest::Response> {
        let payload = ChatRequestPayload::single_turn(model, prompt);
        let resp = self
            .http
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(AppError::from_transport)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AppError::ModelStatus {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }

    /// Full answer for `prompt` with the configured model.
    #[instrument(skip(self, prompt), fields(model = %self.model, prompt_len = prompt.len()))]
    pub async fn ask(&self, prompt: &str) -> Result<String> {
        let answer = collect_answer(self.fragments(prompt, &self.model)).await?;
        debug!(answer_len = answer.len(), "model reply complete");
        Ok(answer)
    }
}

/// Concatenates fragments in order. The first error ends the fold.
pub async fn collect_answer(fragments: impl Stream<Item = Result<String>>) -> Result<String> {
    fragments
        .try_fold(String::new(), |mut answer, fragment| async move {
            answer.push_str(&fragment);
            Ok(answer)
        })
        .await
}

/// Parses one NDJSON line. Returns `None` for the empty closing chunk.
fn parse_chunk(line: &str) -> Result<Option<String>> {
    let chunk: ChatResponseChunk = serde_json::from_str(line)
        .map_err(|e| AppError::ModelResponseMalformed(format!("{}: {}", e, line)))?;

    if let Some(message) = chunk.error {
        return Err(AppError::ModelReportedError(message));
    }

    match chunk.message.and_then(|m| m.content) {
        Some(content) if content.is_empty() => Ok(None),
        Some(content) => Ok(Some(content)),
        None if chunk.done => Ok(None),
        None => Err(AppError::ModelResponseMalformed(format!(
            "chunk without message.content: {}",
            line
        ))),
    }
}

/// Reassembles newline-delimited lines from arbitrarily split network chunks.
/// Lines are decoded only once complete, so a multi-byte character split
/// across chunks is fine; invalid UTF-8 is a malformed response.
#[derive(Debug, Default)]
struct LineBuffer {
    pending: Vec<u8>,
    /// Prefix of `pending` already known to hold no newline
    scanned: usize,
}

impl LineBuffer {
    fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        let mut start = 0;
        let mut from = self.scanned;
        while let Some(offset) = self.pending[from..].iter().position(|b| *b == b'\n') {
            let end = from + offset;
            if let Some(line) = decode_line(&self.pending[start..end])? {
                lines.push(line);
            }
            start = end + 1;
            from = start;
        }
        self.pending.drain(..start);
        self.scanned = self.pending.len();
        Ok(lines)
    }

    /// Whatever is left once the connection closes without a trailing newline.
    fn finish(self) -> Result<Option<String>> {
        decode_line(&self.pending)
    }
}

fn decode_line(raw: &[u8]) -> Result<Option<String>> {
    let line = std::str::from_utf8(raw)
        .map_err(|e| AppError::ModelResponseMalformed(format!("invalid utf-8 in stream: {}", e)))?
        .trim();
    Ok((!line.is_empty()).then(|| line.to_string()))
}
