//! Text-generation backends for admitline.
//!
//! All backends implement the `admitline_core::Generator` trait.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatGenerator;
