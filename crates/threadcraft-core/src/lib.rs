pub mod ai;
pub mod client;
pub mod config;
pub mod error;
pub mod presets;
pub mod saved;
pub mod session;
pub mod state;
pub mod templates;

// Re-export main types for convenience
pub use ai::{GeminiClient, GenerateRequest, GenerationBackend, Turn};
pub use client::{ClientSettings, GenerationClient, SessionId};
pub use config::Config;
pub use error::{GenerationError, SessionError, TemplateError, TurnFailure};
pub use saved::{SavedStore, SavedThread};
pub use session::{
    PendingTurn, SessionController, SessionOptions, Submission, TurnKind, TurnOutcome, TurnResult,
};
pub use state::{Message, Role};
pub use templates::{RenameOutcome, StyleKey, TemplateConfig, TemplateStore};
