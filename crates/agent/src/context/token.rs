//! Token counting.
//!
//! The budget manager never guesses at sizes on its own; it asks a
//! [`TokenCounter`]. By default that is a [`BpeCounter`] running the
//! deployed model's tiktoken encoding (`o200k_base` for the gpt-4o family,
//! `cl100k_base` otherwise). With the `hf-tokenizer` feature a
//! `tokenizer.json` can be loaded for other model families. The byte
//! heuristic is used only when configured explicitly, or logged as a last
//! resort when an encoding cannot be built.

use admitline_config::{AppConfig, TokenEncoding};
use admitline_core::message::Message;
use std::sync::Arc;

/// Framing cost of one chat message (role marker and delimiters).
pub const MESSAGE_OVERHEAD: usize = 3;

/// Tokens the reply is primed with.
pub const REPLY_PRIMING: usize = 3;

/// Counts tokens under one encoding scheme.
pub trait TokenCounter: Send + Sync {
    /// Scheme name, for logs and `doctor`.
    fn name(&self) -> &str;

    /// Tokens in a bare piece of text.
    fn count(&self, text: &str) -> usize;

    /// Tokens for a message including its framing overhead.
    fn count_message(&self, message: &Message) -> usize {
        MESSAGE_OVERHEAD + self.count(&message.content)
    }

    /// Token count of a message, reusing the cached count when present.
    fn message_tokens(&self, message: &Message) -> usize {
        if message.token_count > 0 {
            message.token_count
        } else {
            self.count_message(message)
        }
    }

    /// Sum over a slice of messages.
    fn count_messages(&self, messages: &[Message]) -> usize {
        messages.iter().map(|m| self.message_tokens(m)).sum()
    }
}

/// Character heuristic: 1 token ≈ 4 bytes, rounded up.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicCounter;

impl TokenCounter for HeuristicCounter {
    fn name(&self) -> &str {
        "heuristic"
    }

    fn count(&self, text: &str) -> usize {
        text.len().div_ceil(4)
    }
}

/// Exact counts from a HuggingFace `tokenizer.json`.
#[cfg(feature = "hf-tokenizer")]
pub struct HfTokenizerCounter {
    tokenizer: tokenizers::Tokenizer,
}

#[cfg(feature = "hf-tokenizer")]
impl HfTokenizerCounter {
    pub fn from_file(path: &std::path::Path) -> Result<Self, String> {
        let tokenizer = tokenizers::Tokenizer::from_file(path)
            .map_err(|e| format!("failed to load tokenizer {}: {e}", path.display()))?;
        Ok(Self { tokenizer })
    }
}

#[cfg(feature = "hf-tokenizer")]
impl TokenCounter for HfTokenizerCounter {
    fn name(&self) -> &str {
        "hf-tokenizer"
    }

    fn count(&self, text: &str) -> usize {
        match self.tokenizer.encode(text, false) {
            Ok(encoding) => encoding.len(),
            Err(e) => {
                tracing::warn!(error = %e, "tokenizer failed, using heuristic count");
                HeuristicCounter.count(text)
            }
        }
    }
}

/// Exact counts under a tiktoken BPE encoding.
pub struct BpeCounter {
    bpe: tiktoken_rs::CoreBPE,
    encoding: TokenEncoding,
}

impl BpeCounter {
    pub fn new(encoding: TokenEncoding) -> Result<Self, String> {
        let bpe = match encoding {
            TokenEncoding::O200kBase => tiktoken_rs::o200k_base(),
            TokenEncoding::Cl100kBase => tiktoken_rs::cl100k_base(),
            TokenEncoding::Heuristic => return Err("heuristic is not a BPE encoding".into()),
        }
        .map_err(|e| format!("failed to build {encoding} encoding: {e}"))?;
        Ok(Self { bpe, encoding })
    }
}

impl TokenCounter for BpeCounter {
    fn name(&self) -> &str {
        match self.encoding {
            TokenEncoding::O200kBase => "o200k_base",
            TokenEncoding::Cl100kBase => "cl100k_base",
            TokenEncoding::Heuristic => "heuristic",
        }
    }

    fn count(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }
}

/// Build the counter the config asks for.
///
/// A `tokenizer_path` wins when the `hf-tokenizer` feature is compiled in.
/// Otherwise the configured encoding (or the model's own) is used.
pub fn counter_for(config: &AppConfig) -> Arc<dyn TokenCounter> {
    if let Some(path) = config.context.tokenizer_path.as_deref() {
        #[cfg(feature = "hf-tokenizer")]
        {
            match HfTokenizerCounter::from_file(path) {
                Ok(counter) => return Arc::new(counter),
                Err(e) => tracing::warn!(error = %e, "tokenizer file unusable, using BPE encoding"),
            }
        }
        #[cfg(not(feature = "hf-tokenizer"))]
        {
            tracing::warn!(
                path = %path.display(),
                "tokenizer configured but the hf-tokenizer feature is disabled; using BPE encoding"
            );
        }
    }
    encoding_counter(config.token_encoding())
}

/// Counter for one encoding. Falls back to the heuristic, loudly, only when
/// the BPE tables cannot be built.
pub fn encoding_counter(encoding: TokenEncoding) -> Arc<dyn TokenCounter> {
    if encoding == TokenEncoding::Heuristic {
        return Arc::new(HeuristicCounter);
    }
    match BpeCounter::new(encoding) {
        Ok(counter) => Arc::new(counter),
        Err(e) => {
            tracing::error!(error = %e, "token counts fall back to the byte heuristic");
            Arc::new(HeuristicCounter)
        }
    }
}
