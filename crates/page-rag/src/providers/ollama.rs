//! Ollama-based providers for embeddings and streaming generation

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use crate::config::LlmConfig;
use crate::error::{Error, Result};

use super::embedding::EmbeddingProvider;
use super::llm::{GenerationProvider, TextStream};

/// Ollama HTTP API client
pub struct OllamaClient {
    /// HTTP client
    client: Client,
    /// Configuration
    config: LlmConfig,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

/// One NDJSON line of `/api/generate` streaming output
#[derive(Debug, Deserialize, PartialEq)]
struct StreamChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

impl OllamaClient {
    /// Create a new Ollama client
    pub fn new(config: &LlmConfig) -> Result<Self> {
        // Idle-read timeout only; a streamed answer has no total deadline
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.timeout_secs))
            .read_timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(5)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Deadline for non-streaming requests
    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }

    /// Check if Ollama is available
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.config.base_url);

        match self.client.get(&url).timeout(self.request_timeout()).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    /// Generate an embedding
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.config.base_url);
        let request = EmbedRequest {
            model: &self.config.embed_model,
            prompt: text,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .timeout(self.request_timeout())
            .send()
            .await
            .map_err(|e| Error::embedding(format!("Embedding request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::embedding(format!(
                "Embedding failed: HTTP {}",
                response.status()
            )));
        }

        let embed_response: EmbedResponse = response
            .json()
            .await
            .map_err(|e| Error::embedding(format!("Failed to parse embedding response: {}", e)))?;

        if embed_response.embedding.is_empty() {
            return Err(Error::embedding("Provider returned an empty embedding"));
        }

        Ok(embed_response.embedding)
    }

    /// Start a streaming generation
    pub async fn generate_stream(&self, prompt: &str) -> Result<TextStream> {
        let url = format!("{}/api/generate", self.config.base_url);
        let request = GenerateRequest {
            model: &self.config.generate_model,
            prompt,
            stream: true,
            options: GenerateOptions {
                temperature: self.config.temperature,
            },
        };

        tracing::info!("Generating answer with model {}", self.config.generate_model);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::llm(format!("Stream request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::llm(format!("Stream failed: HTTP {}", response.status())));
        }

        Ok(decode_ndjson_stream(response.bytes_stream().boxed()))
    }
}

/// Splits a byte stream into NDJSON lines, keeping partial lines buffered
#[derive(Debug, Default)]
struct NdjsonDecoder {
    buffer: Vec<u8>,
}

impl NdjsonDecoder {
    /// Feed bytes and return every line completed by them
    fn push(&mut self, bytes: &[u8]) -> Result<Vec<StreamChunk>> {
        self.buffer.extend_from_slice(bytes);

        let mut chunks = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(chunk) = parse_line(&line)? {
                chunks.push(chunk);
            }
        }

        Ok(chunks)
    }

    /// Parse whatever is left once the byte stream has ended
    fn finish(&mut self) -> Result<Option<StreamChunk>> {
        let line = std::mem::take(&mut self.buffer);
        parse_line(&line)
    }
}

fn parse_line(line: &[u8]) -> Result<Option<StreamChunk>> {
    let line = std::str::from_utf8(line)
        .map_err(|e| Error::llm(format!("Stream line is not UTF-8: {}", e)))?
        .trim();

    if line.is_empty() {
        return Ok(None);
    }

    serde_json::from_str(line)
        .map(Some)
        .map_err(|e| Error::llm(format!("Malformed stream line: {}", e)))
}

struct DecodeState<E> {
    bytes: BoxStream<'static, std::result::Result<Bytes, E>>,
    decoder: NdjsonDecoder,
    ready: VecDeque<Result<String>>,
    finished: bool,
}

impl<E> DecodeState<E> {
    fn accept(&mut self, chunks: Vec<StreamChunk>) {
        for chunk in chunks {
            if let Some(message) = chunk.error {
                self.ready.push_back(Err(Error::llm(message)));
                self.finished = true;
                return;
            }
            if !chunk.response.is_empty() {
                self.ready.push_back(Ok(chunk.response));
            }
            if chunk.done {
                self.finished = true;
                return;
            }
        }
    }
}

/// Turn Ollama's NDJSON byte stream into answer fragments
///
/// The stream ends after a `done` line, an `error` line, or a transport
/// error (yielded as the last item).
fn decode_ndjson_stream<E>(bytes: BoxStream<'static, std::result::Result<Bytes, E>>) -> TextStream
where
    E: Display + Send + 'static,
{
    let state = DecodeState {
        bytes,
        decoder: NdjsonDecoder::default(),
        ready: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.ready.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }

            match state.bytes.next().await {
                Some(Ok(bytes)) => match state.decoder.push(&bytes) {
                    Ok(chunks) => state.accept(chunks),
                    Err(e) => {
                        state.ready.push_back(Err(e));
                        state.finished = true;
                    }
                },
                Some(Err(e)) => {
                    state
                        .ready
                        .push_back(Err(Error::llm(format!("Stream error: {}", e))));
                    state.finished = true;
                }
                None => {
                    match state.decoder.finish() {
                        Ok(Some(chunk)) => state.accept(vec![chunk]),
                        Ok(None) => {}
                        Err(e) => state.ready.push_back(Err(e)),
                    }
                    state.finished = true;
                }
            }
        }
    })
    .boxed()
}

/// Ollama embedding provider using nomic-embed-text or similar models
pub struct OllamaEmbedder {
    client: Arc<OllamaClient>,
}

impl OllamaEmbedder {
    /// Create a new Ollama embedder
    pub fn new(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            client: Arc::new(OllamaClient::new(config)?),
        })
    }

    /// Create from existing OllamaClient
    pub fn from_client(client: Arc<OllamaClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.client.embed(text).await
    }

    async fn health_check(&self) -> Result<bool> {
        self.client.health_check().await
    }

    fn name(&self) -> &'static str {
        "ollama"
    }
}

/// Ollama LLM provider for answer generation
pub struct OllamaLlm {
    client: Arc<OllamaClient>,
    model: String,
}

impl OllamaLlm {
    /// Create a new Ollama LLM provider
    pub fn new(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            client: Arc::new(OllamaClient::new(config)?),
            model: config.generate_model.clone(),
        })
    }

    /// Create from existing OllamaClient
    pub fn from_client(client: Arc<OllamaClient>, model: String) -> Self {
        Self { client, model }
    }
}

#[async_trait]
impl GenerationProvider for OllamaLlm {
    async fn generate_stream(&self, prompt: &str) -> Result<TextStream> {
        self.client.generate_stream(prompt).await
    }

    async fn health_check(&self) -> Result<bool> {
        self.client.health_check().await
    }

    fn name(&self) -> &'static str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Build both providers over one shared HTTP client
pub fn ollama_providers(config: &LlmConfig) -> Result<(OllamaEmbedder, OllamaLlm)> {
    let client = Arc::new(OllamaClient::new(config)?);
    Ok((
        OllamaEmbedder::from_client(Arc::clone(&client)),
        OllamaLlm::from_client(client, config.generate_model.clone()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn byte_stream(parts: Vec<&'static str>) -> BoxStream<'static, std::result::Result<Bytes, std::io::Error>> {
        stream::iter(parts.into_iter().map(|p| Ok(Bytes::from_static(p.as_bytes())))).boxed()
    }

    #[test]
    fn test_decoder_buffers_partial_lines() {
        let mut decoder = NdjsonDecoder::default();

        let first = decoder.push(br#"{"response":"Hel"#).unwrap();
        assert!(first.is_empty());

        let second = decoder
            .push(b"lo\",\"done\":false}\n{\"response\":\" world\",\"done\":false}\n")
            .unwrap();
        assert_eq!(second.len(), 2);
        assert_eq!(second[0].response, "Hello");
        assert_eq!(second[1].response, " world");
        assert!(decoder.finish().unwrap().is_none());
    }

    #[test]
    fn test_decoder_rejects_malformed_line() {
        let mut decoder = NdjsonDecoder::default();
        assert!(decoder.push(b"not json\n").is_err());
    }

    #[tokio::test]
    async fn test_stream_yields_fragments_until_done() {
        let bytes = byte_stream(vec![
            "{\"response\":\"The \",\"done\":false}\n{\"resp",
            "onse\":\"answer\",\"done\":false}\n",
            "{\"response\":\"\",\"done\":true}\n{\"response\":\"ignored\"}\n",
        ]);

        let fragments: Vec<String> = decode_ndjson_stream(bytes)
            .map(|r| r.unwrap())
            .collect()
            .await;

        assert_eq!(fragments, vec!["The ".to_string(), "answer".to_string()]);
    }

    #[tokio::test]
    async fn test_stream_surfaces_error_line() {
        let bytes = byte_stream(vec![
            "{\"response\":\"partial\"}\n",
            "{\"error\":\"model crashed\"}\n",
        ]);

        let items: Vec<Result<String>> = decode_ndjson_stream(bytes).collect().await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "partial");
        assert!(matches!(&items[1], Err(Error::Llm(msg)) if msg == "model crashed"));
    }

    /// Serve one chunked NDJSON response, writing a line every `gap`
    async fn serve_slow_ndjson(lines: Vec<String>, gap: Duration) -> std::net::SocketAddr {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();

            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if n == 0 || (text.contains("\r\n\r\n") && text.trim_end().ends_with('}')) {
                    break;
                }
            }

            socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\nContent-Type: application/x-ndjson\r\nTransfer-Encoding: chunked\r\n\r\n",
                )
                .await
                .unwrap();

            for line in lines {
                tokio::time::sleep(gap).await;
                let chunk = format!("{:x}\r\n{}\r\n", line.len(), line);
                socket.write_all(chunk.as_bytes()).await.unwrap();
                socket.flush().await.unwrap();
            }
            socket.write_all(b"0\r\n\r\n").await.unwrap();
            socket.flush().await.unwrap();
        });

        addr
    }

    #[tokio::test]
    async fn test_steady_stream_outlives_timeout() {
        let mut lines: Vec<String> = (0..6)
            .map(|i| format!("{{\"response\":\"part{} \",\"done\":false}}\n", i))
            .collect();
        lines.push("{\"response\":\"\",\"done\":true}\n".to_string());
        let addr = serve_slow_ndjson(lines, Duration::from_millis(300)).await;

        let config = LlmConfig {
            base_url: format!("http://{}", addr),
            timeout_secs: 1,
            ..LlmConfig::default()
        };
        let client = OllamaClient::new(&config).unwrap();

        let items: Vec<Result<String>> = client
            .generate_stream("question")
            .await
            .unwrap()
            .collect()
            .await;

        assert!(items.iter().all(|item| item.is_ok()), "stream was cut off: {:?}", items);
        assert_eq!(items.len(), 6);
    }

    #[tokio::test]
    async fn test_stream_parses_unterminated_last_line() {
        let bytes = byte_stream(vec!["{\"response\":\"tail\",\"done\":true}"]);
        let fragments: Vec<Result<String>> = decode_ndjson_stream(bytes).collect().await;

        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].as_ref().unwrap(), "tail");
    }
}
