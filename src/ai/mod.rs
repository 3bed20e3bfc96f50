//! Health assistant backed by a hosted language model.

pub mod assistant;

pub use assistant::{
    ChatMessage, CompletionClient, Conversation, GeminiClient, HealthAssistant, Speaker,
};
