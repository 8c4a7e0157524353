//! Decoder for streamed chat-completion chunks.
//!
//! The provider streams a JSON array of chunk objects. Each object carries a
//! list of `candidates` and, usually only on the last one, `usageMetadata`.
//! A top-level `error` object is reported as
//! [`JsonParserError::Upstream`] and ends the stream; an `error` key holding
//! any other value is ignored.

use serde::Deserialize;
use simd_json::OwnedValue;

use crate::{JsonParserError, PartDecoder};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatCompletionChunk {
    pub choices: Vec<Choice>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub delta: Delta,
    pub finish_reason: Option<String>,
    pub index: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Delta {
    pub content: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Usage {
    pub completion_tokens: u32,
    pub prompt_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawChunk {
    #[serde(default)]
    candidates: Vec<RawCandidate>,
    usage_metadata: Option<RawUsage>,
    // only an object is a provider error, anything else is ignored
    error: Option<OwnedValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCandidate {
    content: Option<RawContent>,
    finish_reason: Option<String>,
    #[serde(default)]
    index: u32,
}

#[derive(Debug, Deserialize)]
struct RawContent {
    role: Option<String>,
    #[serde(default)]
    parts: Vec<RawPart>,
}

#[derive(Debug, Deserialize)]
struct RawPart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawUsage {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

#[derive(Debug, Deserialize)]
struct RawError {
    #[serde(default)]
    code: u16,
    message: Option<String>,
    status: Option<String>,
}

impl RawError {
    fn into_error(self) -> JsonParserError {
        JsonParserError::Upstream {
            code: if self.code == 0 { 500 } else { self.code },
            message: self.message.unwrap_or_else(|| "Unknown error".to_string()),
            status: self.status,
        }
    }
}

impl RawCandidate {
    fn into_choice(self) -> Choice {
        // Only the first text part is streamed as the delta.
        let delta = match self.content {
            Some(content) if !content.parts.is_empty() => Delta {
                content: content.parts.into_iter().next().and_then(|part| part.text),
                role: content.role,
            },
            _ => Delta::default(),
        };
        Choice {
            delta,
            finish_reason: self.finish_reason,
            index: self.index,
        }
    }
}

/// Decodes one chunk object into a [`ChatCompletionChunk`].
///
/// Objects without candidates decode to nothing, even when they carry usage.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChatCompletionDecoder;

impl PartDecoder for ChatCompletionDecoder {
    type Output = ChatCompletionChunk;

    fn decode(&self, part: &[u8]) -> Result<Option<ChatCompletionChunk>, JsonParserError> {
        let mut buffer = part.to_vec();
        let raw: RawChunk = simd_json::from_slice(&mut buffer)?;

        if let Some(OwnedValue::Object(error)) = raw.error {
            let error: RawError = simd_json::serde::from_owned_value(OwnedValue::Object(error))?;
            return Err(error.into_error());
        }
        if raw.candidates.is_empty() {
            return Ok(None);
        }

        Ok(Some(ChatCompletionChunk {
            choices: raw.candidates.into_iter().map(RawCandidate::into_choice).collect(),
            usage: raw.usage_metadata.map(|usage| Usage {
                completion_tokens: usage.candidates_token_count,
                prompt_tokens: usage.prompt_token_count,
                total_tokens: usage.total_token_count,
            }),
        }))
    }
}
