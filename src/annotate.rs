use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::LlmConfig;
use crate::manifest::{self, AnnotatedEntry, AnnotationCache, ManifestEntry, VocabItem};

const SYSTEM_PROMPT: &str = "You are a language tutor helping an intermediate learner. \
For the given dialogue, provide:\n\
1. A natural English translation\n\
2. Key vocabulary an intermediate learner might not know (word - reading - meaning)\n\
3. Brief grammar notes if there's anything notable\n\
\n\
Format your response as JSON:\n\
{\n\
  \"translation\": \"English translation here\",\n\
  \"vocabulary\": [\n\
    {\"word\": \"...\", \"reading\": \"...\", \"meaning\": \"...\"}\n\
  ],\n\
  \"grammar\": \"Brief grammar notes or null if straightforward\"\n\
}\n\
\n\
Keep responses concise.";

/// Per-segment annotation returned by the language model
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Breakdown {
    #[serde(default)]
    pub translation: String,
    #[serde(default)]
    pub vocabulary: Vec<VocabItem>,
    #[serde(default)]
    pub grammar: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Chat-completions client for segment annotation
pub struct AnnotationClient {
    config: LlmConfig,
    client: reqwest::Client,
}

impl AnnotationClient {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self { config, client })
    }

    /// Annotate one segment text. Failures are caught here and produce
    /// an empty-but-well-formed breakdown so the output stays valid.
    pub async fn annotate(&self, text: &str) -> Breakdown {
        match self.request(text).await {
            Ok(breakdown) => breakdown,
            Err(e) => {
                warn!("Annotation failed for '{:.30}': {}", text, e);
                Breakdown::default()
            }
        }
    }

    async fn request(&self, text: &str) -> Result<Breakdown> {
        let user_content = match &self.config.content_hint {
            Some(hint) => format!("Analyze this dialogue from {}:\n\n{}", hint, text),
            None => format!("Analyze this dialogue:\n\n{}", text),
        };

        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user_content,
                },
            ],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        debug!("Sending annotation request to {}", self.config.endpoint);
        let mut builder = self.client.post(&self.config.endpoint).json(&request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Annotation API error {}: {}", status, body));
        }

        let chat: ChatResponse = response.json().await?;
        let content = &chat
            .choices
            .first()
            .ok_or_else(|| anyhow!("Empty response from annotation API"))?
            .message
            .content;

        Ok(serde_json::from_str(extract_json_block(content))?)
    }

    /// Annotate a whole manifest with resume support: cached segments
    /// are reused, a checkpoint of the full result set is rewritten
    /// every `checkpoint_interval` segments.
    pub async fn annotate_manifest(
        &self,
        segments: &[ManifestEntry],
        cache: &AnnotationCache,
        output_path: &Path,
    ) -> Result<Vec<AnnotatedEntry>> {
        let mut results = Vec::with_capacity(segments.len());

        for (i, segment) in segments.iter().enumerate() {
            if let Some(cached) = cache.get(&segment.text) {
                debug!(
                    "[{:03}/{}] Cached: {:.35}",
                    i + 1,
                    segments.len(),
                    segment.text
                );
                results.push(cached.clone());
                continue;
            }

            info!(
                "[{:03}/{}] Annotating: {:.35}",
                i + 1,
                segments.len(),
                segment.text
            );
            let breakdown = self.annotate(&segment.text).await;
            results.push(AnnotatedEntry {
                start: segment.start.clone(),
                end: segment.end.clone(),
                text: segment.text.clone(),
                audio_file: segment.audio_file.clone(),
                translation: breakdown.translation,
                vocabulary: breakdown.vocabulary,
                grammar: breakdown.grammar,
            });

            if (i + 1) % self.config.checkpoint_interval.max(1) == 0 {
                manifest::write_manifest(output_path, &results).await?;
                debug!("Checkpoint at {} segments", i + 1);
            }

            if i + 1 < segments.len() && self.config.request_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.request_delay_ms)).await;
            }
        }

        manifest::write_manifest(output_path, &results).await?;
        Ok(results)
    }
}

/// Strip a markdown code fence around a JSON body, if present
pub fn extract_json_block(content: &str) -> &str {
    let trimmed = content.trim();
    for fence in ["```json", "```"] {
        if let Some(rest) = trimmed.strip_prefix(fence) {
            if let Some(end) = rest.find("```") {
                return rest[..end].trim();
            }
            return rest.trim();
        }
    }
    trimmed
}
