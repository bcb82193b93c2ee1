//! Bounded context assembly.
//!
//! Every generation request must fit the model's context window with room
//! left for the reply. [`TokenBudgetManager`] lays the request out, trims or
//! summarizes history as needed, and owns the single overflow retry.

pub mod budget;
pub mod token;

pub use budget::{
    AssembledContext, BudgetPolicy, BudgetReport, Generated, HistoryStrategy, SUMMARY_PREFIX,
    TokenBudgetManager,
};
pub use token::{BpeCounter, HeuristicCounter, TokenCounter, counter_for, encoding_counter};

#[cfg(feature = "hf-tokenizer")]
pub use token::HfTokenizerCounter;
