//! Token budget management for one generation request.
//!
//! The request is laid out as `[system: guardrails + grounding] + history +
//! [user]`, and the reply gets a fixed reservation. Everything except the
//! history is mandatory, so the history absorbs all trimming:
//!
//! | History usage (`h` vs available `a`) | Action |
//! |---|---|
//! | `h ≤ 0.7a` | full history kept |
//! | `h > 0.7a` | older turns summarized, last N kept verbatim |
//! | summary + last N still `> a` | last `fallback` messages only |
//! | even those `> a` | history dropped |
//!
//! Crossing 70% and 80% of `a` is logged and published on the event bus.
//! If the mandatory part alone exceeds the window the request fails with
//! [`Error::ContextOverflow`] before any collaborator is called.

use admitline_config::AppConfig;
use admitline_core::error::{Error, GeneratorError};
use admitline_core::event::{CapacityLevel, DomainEvent, EventBus};
use admitline_core::generator::{GenerationRequest, Generator};
use admitline_core::message::Message;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::context::token::{MESSAGE_OVERHEAD, REPLY_PRIMING, TokenCounter};

/// Prefix of the system message that stands in for summarized turns.
pub const SUMMARY_PREFIX: &str = "Previous conversation summary: ";

// ── Types ─────────────────────────────────────────────────────────────────

/// Limits and thresholds for context assembly.
#[derive(Debug, Clone)]
pub struct BudgetPolicy {
    /// Model context window.
    pub context_limit: usize,
    /// Tokens reserved for the reply.
    pub reserved_for_reply: usize,
    pub summarize_threshold: f64,
    pub warning_threshold: f64,
    /// Messages kept verbatim after summarization.
    pub recent_messages: usize,
    /// Messages kept when the summary does not fit.
    pub fallback_messages: usize,
    pub generation_timeout: Duration,
    pub temperature: f32,
}

impl BudgetPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            context_limit: config.context_limit(),
            reserved_for_reply: config.generator.max_response_tokens as usize,
            summarize_threshold: config.context.summarize_threshold,
            warning_threshold: config.context.warning_threshold,
            recent_messages: config.context.recent_messages,
            fallback_messages: config.context.fallback_messages,
            generation_timeout: Duration::from_secs(config.generator.timeout_secs),
            temperature: config.generator.temperature,
        }
    }

    /// Tokens the prompt may use: window minus the reply reservation.
    pub fn prompt_budget(&self) -> usize {
        self.context_limit.saturating_sub(self.reserved_for_reply)
    }
}

impl Default for BudgetPolicy {
    fn default() -> Self {
        Self {
            context_limit: 128_000,
            reserved_for_reply: 600,
            summarize_threshold: 0.7,
            warning_threshold: 0.8,
            recent_messages: 4,
            fallback_messages: 2,
            generation_timeout: Duration::from_secs(30),
            temperature: 0.3,
        }
    }
}

/// What happened to the conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum HistoryStrategy {
    Full,
    Summarized { summarized: usize, fallback_used: bool },
    Recent { kept: usize },
    Dropped,
}

/// Token accounting for one assembled request.
#[derive(Debug, Clone, Serialize)]
pub struct BudgetReport {
    pub context_limit: usize,
    pub reserved_for_reply: usize,
    /// Guardrails, user message and reply priming.
    pub fixed_tokens: usize,
    /// Room left for history.
    pub available: usize,
    pub history_tokens_before: usize,
    pub history_tokens: usize,
    /// Everything sent to the generator.
    pub total_tokens: usize,
    pub strategy: HistoryStrategy,
    /// Highest capacity threshold the original history crossed.
    pub crossed: Option<CapacityLevel>,
}

/// A request ready for the generator.
#[derive(Debug, Clone)]
pub struct AssembledContext {
    pub guardrails: String,
    /// History after budgeting, oldest first.
    pub history: Vec<Message>,
    pub user: Message,
    pub report: BudgetReport,
}

impl AssembledContext {
    /// History followed by the user message.
    pub fn messages(&self) -> Vec<Message> {
        let mut messages = self.history.clone();
        messages.push(self.user.clone());
        messages
    }
}

/// A generated reply with the context that produced it.
#[derive(Debug, Clone)]
pub struct Generated {
    pub text: String,
    pub context: AssembledContext,
    /// The provider rejected the first attempt as too long and the reply
    /// came from a retry without history.
    pub retried_without_history: bool,
}

// ── Manager ───────────────────────────────────────────────────────────────

/// Keeps every generation request inside the model's context window.
pub struct TokenBudgetManager {
    counter: Arc<dyn TokenCounter>,
    generator: Arc<dyn Generator>,
    events: Arc<EventBus>,
    policy: BudgetPolicy,
}

impl TokenBudgetManager {
    pub fn new(
        counter: Arc<dyn TokenCounter>,
        generator: Arc<dyn Generator>,
        events: Arc<EventBus>,
        policy: BudgetPolicy,
    ) -> Self {
        Self { counter, generator, events, policy }
    }

    pub fn policy(&self) -> &BudgetPolicy {
        &self.policy
    }

    pub fn counter(&self) -> &Arc<dyn TokenCounter> {
        &self.counter
    }

    /// Tokens for the parts that are never trimmed.
    fn fixed_tokens(&self, guardrails: &str, user: &Message) -> usize {
        MESSAGE_OVERHEAD
            + self.counter.count(guardrails)
            + self.counter.message_tokens(user)
            + REPLY_PRIMING
    }

    /// Fit `history` around the guardrails and the user message.
    pub async fn assemble(
        &self,
        session_id: &str,
        guardrails: &str,
        history: &[Message],
        user: &Message,
    ) -> Result<AssembledContext, Error> {
        let budget = self.policy.prompt_budget();
        let fixed = self.fixed_tokens(guardrails, user);
        if fixed > budget {
            let detail = format!(
                "guardrails and message need {fixed} tokens, only {budget} available"
            );
            warn!(session = session_id, fixed, budget, "context overflow before generation");
            self.events.publish(DomainEvent::ContextOverflow {
                session_id: session_id.to_string(),
                detail: detail.clone(),
                timestamp: Utc::now(),
            });
            return Err(Error::ContextOverflow(detail));
        }

        let available = budget - fixed;
        let history_tokens_before = self.counter.count_messages(history);
        let crossed = self.signal_capacity(session_id, history_tokens_before, available);

        let (kept, strategy) = if crossed.is_none() {
            (history.to_vec(), HistoryStrategy::Full)
        } else {
            self.shrink_history(session_id, history, available).await
        };

        let history_tokens = self.counter.count_messages(&kept);
        debug!(
            session = session_id,
            fixed,
            available,
            history_tokens_before,
            history_tokens,
            ?strategy,
            "context assembled"
        );

        Ok(AssembledContext {
            guardrails: guardrails.to_string(),
            history: kept,
            user: user.clone(),
            report: BudgetReport {
                context_limit: self.policy.context_limit,
                reserved_for_reply: self.policy.reserved_for_reply,
                fixed_tokens: fixed,
                available,
                history_tokens_before,
                history_tokens,
                total_tokens: fixed + history_tokens,
                strategy,
                crossed,
            },
        })
    }

    /// Log and publish threshold crossings. Returns the highest crossed.
    fn signal_capacity(
        &self,
        session_id: &str,
        history_tokens: usize,
        available: usize,
    ) -> Option<CapacityLevel> {
        let usage = history_tokens as f64;
        let mut crossed = None;
        for (level, threshold) in [
            (CapacityLevel::Summarize, self.policy.summarize_threshold),
            (CapacityLevel::Warning, self.policy.warning_threshold),
        ] {
            if usage <= threshold * available as f64 {
                break;
            }
            match level {
                CapacityLevel::Summarize => info!(
                    session = session_id,
                    history_tokens, available, "history past summarization threshold"
                ),
                CapacityLevel::Warning => warn!(
                    session = session_id,
                    history_tokens, available, "history past capacity warning threshold"
                ),
            }
            self.events.publish(DomainEvent::CapacityThreshold {
                session_id: session_id.to_string(),
                level,
                history_tokens,
                available_tokens: available,
                timestamp: Utc::now(),
            });
            crossed = Some(level);
        }
        crossed
    }

    async fn shrink_history(
        &self,
        session_id: &str,
        history: &[Message],
        available: usize,
    ) -> (Vec<Message>, HistoryStrategy) {
        let recent_n = self.policy.recent_messages;
        if history.len() > recent_n {
            let split = history.len() - recent_n;
            let (older, recent) = history.split_at(split);
            // Summaries are pointless when the verbatim tail cannot fit anyway.
            if self.counter.count_messages(recent) <= available {
                let (summary, fallback_used) = self.summarize(session_id, older).await;
                let mut candidate = Vec::with_capacity(recent_n + 1);
                candidate.push(summary);
                candidate.extend_from_slice(recent);
                if self.counter.count_messages(&candidate) <= available {
                    self.events.publish(DomainEvent::HistorySummarized {
                        session_id: session_id.to_string(),
                        summarized_messages: older.len(),
                        fallback_used,
                        timestamp: Utc::now(),
                    });
                    return (
                        candidate,
                        HistoryStrategy::Summarized { summarized: older.len(), fallback_used },
                    );
                }
            }
        } else if self.counter.count_messages(history) <= available {
            return (history.to_vec(), HistoryStrategy::Full);
        }

        let tail_start = history.len().saturating_sub(self.policy.fallback_messages);
        let tail = &history[tail_start..];
        if !tail.is_empty() && self.counter.count_messages(tail) <= available {
            warn!(session = session_id, kept = tail.len(), "history trimmed to most recent messages");
            return (tail.to_vec(), HistoryStrategy::Recent { kept: tail.len() });
        }

        warn!(session = session_id, "history dropped to fit the context window");
        (Vec::new(), HistoryStrategy::Dropped)
    }

    /// Summarize `older` into one system message. Falls back to a count of
    /// the dropped messages when the generator cannot help.
    async fn summarize(&self, session_id: &str, older: &[Message]) -> (Message, bool) {
        let result = tokio::time::timeout(
            self.policy.generation_timeout,
            self.generator.summarize(older),
        )
        .await
        .unwrap_or_else(|_| {
            Err(GeneratorError::Timeout(format!(
                "summary not ready within {}s",
                self.policy.generation_timeout.as_secs()
            )))
        });

        let (text, fallback_used) = match result {
            Ok(summary) if !summary.trim().is_empty() => (summary.trim().to_string(), false),
            Ok(_) => (fallback_summary(older.len()), true),
            Err(e) => {
                warn!(session = session_id, error = %e, "summarization failed, using fallback");
                (fallback_summary(older.len()), true)
            }
        };

        let mut message = Message::system(format!("{SUMMARY_PREFIX}{text}"));
        message.token_count = self.counter.count_message(&message);
        (message, fallback_used)
    }

    /// Assemble and generate. A provider-side overflow is retried once with
    /// no history before it is reported.
    pub async fn generate(
        &self,
        session_id: &str,
        guardrails: &str,
        history: &[Message],
        user: &Message,
    ) -> Result<Generated, Error> {
        let mut context = self.assemble(session_id, guardrails, history, user).await?;

        match self.complete(&context).await {
            Ok(text) => Ok(Generated { text, context, retried_without_history: false }),
            Err(e) if e.is_context_overflow() => {
                warn!(session = session_id, error = %e, "provider reported context overflow");
                self.events.publish(DomainEvent::ContextOverflow {
                    session_id: session_id.to_string(),
                    detail: e.to_string(),
                    timestamp: Utc::now(),
                });
                if context.history.is_empty() {
                    return Err(Error::ContextOverflow(e.to_string()));
                }

                context.history.clear();
                context.report.history_tokens = 0;
                context.report.total_tokens = context.report.fixed_tokens;
                context.report.strategy = HistoryStrategy::Dropped;

                match self.complete(&context).await {
                    Ok(text) => Ok(Generated { text, context, retried_without_history: true }),
                    Err(e) if e.is_context_overflow() => Err(Error::ContextOverflow(e.to_string())),
                    Err(e) => Err(Error::Generator(e)),
                }
            }
            Err(e) => Err(Error::Generator(e)),
        }
    }

    async fn complete(&self, context: &AssembledContext) -> Result<String, GeneratorError> {
        let request = GenerationRequest::new(context.guardrails.clone(), context.messages())
            .with_max_tokens(self.policy.reserved_for_reply as u32)
            .with_temperature(self.policy.temperature);

        tokio::time::timeout(self.policy.generation_timeout, self.generator.complete(request))
            .await
            .unwrap_or_else(|_| {
                Err(GeneratorError::Timeout(format!(
                    "no reply within {}s",
                    self.policy.generation_timeout.as_secs()
                )))
            })
    }
}

fn fallback_summary(count: usize) -> String {
    format!("Previous conversation included {count} messages.")
}
