pub mod gemini;

pub use gemini::GeminiClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::GenerationError;
use crate::state::Role;

/// One prior turn of a chat, replayed to stateless upstream APIs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, text: text.into() }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self { role: Role::Model, text: text.into() }
    }
}

/// A fully resolved generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    pub model: String,
    pub system_instruction: String,
    pub temperature: f32,
    /// Prior turns followed by the new user turn.
    pub contents: Vec<Turn>,
}

/// A text-generation API the client can talk to.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Returns the generated text, or an empty string if the upstream
    /// response carried none.
    async fn generate(&self, request: &GenerateRequest) -> Result<String, GenerationError>;
}
