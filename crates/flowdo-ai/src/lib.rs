//! Gemini-backed implementation of the canvas AI client.

pub mod config;
pub mod gemini;

pub use config::AiConfig;
pub use gemini::GeminiClient;
