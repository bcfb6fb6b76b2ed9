//! Session-oriented wrapper around a generation backend.
//!
//! The client binds one chat session at a time to a composed instruction.
//! Starting a new session replaces the old one; calls made with the old
//! session's id are rejected with [`GenerationError::StaleSession`].

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ai::{GeminiClient, GenerateRequest, GenerationBackend, Turn};
use crate::error::GenerationError;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Opaque handle naming one bound session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

/// Joins a persona prompt and its few-shot examples into one system instruction.
pub fn compose_instruction(system_prompt: &str, examples: &str) -> String {
    format!(
        "{}\n\n### EXAMPLES OF DESIRED OUTPUT ###\n{}\n\n### IMPORTANT ###\n\
         Always return the response in the style defined above. \
         Do not output conversational filler like 'Here is your thread'. \
         Just output the thread itself.",
        system_prompt, examples
    )
}

struct ChatSession {
    id: SessionId,
    instruction: String,
    history: Vec<Turn>,
}

/// A request snapshot that can be sent without borrowing the client.
pub struct PendingCall {
    session: SessionId,
    backend: Arc<dyn GenerationBackend>,
    request: GenerateRequest,
}

impl PendingCall {
    pub fn session(&self) -> SessionId {
        self.session
    }

    pub async fn execute(self) -> Result<String, GenerationError> {
        self.backend.generate(&self.request).await
    }
}

pub struct GenerationClient {
    backend: Option<Arc<dyn GenerationBackend>>,
    model: String,
    temperature: f32,
    session: Option<ChatSession>,
}

impl GenerationClient {
    /// Builds a Gemini-backed client. Without an API key every call fails
    /// with [`GenerationError::ClientUnavailable`].
    pub fn new(settings: ClientSettings) -> Self {
        let backend = settings
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .map(|key| Arc::new(GeminiClient::new(key)) as Arc<dyn GenerationBackend>);

        if backend.is_none() {
            tracing::warn!("no Gemini API key configured; generation is unavailable");
        }

        Self {
            backend,
            model: settings.model,
            temperature: settings.temperature,
            session: None,
        }
    }

    pub fn with_backend(backend: Arc<dyn GenerationBackend>, settings: ClientSettings) -> Self {
        Self {
            backend: Some(backend),
            model: settings.model,
            temperature: settings.temperature,
            session: None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn has_active_session(&self) -> bool {
        self.session.is_some()
    }

    pub fn active_session(&self) -> Option<SessionId> {
        self.session.as_ref().map(|s| s.id)
    }

    /// Binds a new session, discarding the previous one.
    pub fn start_session(
        &mut self,
        system_prompt: &str,
        examples: &str,
    ) -> Result<SessionId, GenerationError> {
        if self.backend.is_none() {
            return Err(GenerationError::ClientUnavailable);
        }

        let session = ChatSession {
            id: SessionId::new(),
            instruction: compose_instruction(system_prompt, examples),
            history: Vec::new(),
        };
        let id = session.id;
        if let Some(previous) = self.session.replace(session) {
            tracing::debug!(previous = %previous.id, session = %id, "rebound chat session");
        } else {
            tracing::debug!(session = %id, "started chat session");
        }
        Ok(id)
    }

    /// Drops the bound session, if any. Later calls fail with `SessionNotStarted`.
    pub fn end_session(&mut self) {
        if let Some(previous) = self.session.take() {
            tracing::debug!(session = %previous.id, "ended chat session");
        }
    }

    /// Snapshots a call for `text` within `session`.
    pub fn prepare(&self, session: SessionId, text: &str) -> Result<PendingCall, GenerationError> {
        let backend = self
            .backend
            .clone()
            .ok_or(GenerationError::ClientUnavailable)?;
        let current = self.current(session)?;

        let mut contents = current.history.clone();
        contents.push(Turn::user(text));

        Ok(PendingCall {
            session,
            backend,
            request: GenerateRequest {
                model: self.model.clone(),
                system_instruction: current.instruction.clone(),
                temperature: self.temperature,
                contents,
            },
        })
    }

    /// Records a completed exchange in the session history.
    pub fn commit(
        &mut self,
        session: SessionId,
        text: &str,
        reply: &str,
    ) -> Result<(), GenerationError> {
        self.current(session)?;
        if let Some(current) = self.session.as_mut() {
            current.history.push(Turn::user(text));
            current.history.push(Turn::model(reply));
        }
        Ok(())
    }

    /// Sends `text` within `session` and returns the reply.
    pub async fn send_message(
        &mut self,
        session: SessionId,
        text: &str,
    ) -> Result<String, GenerationError> {
        let call = self.prepare(session, text)?;
        let reply = call.execute().await?;
        self.commit(session, text, &reply)?;
        Ok(reply)
    }

    fn current(&self, session: SessionId) -> Result<&ChatSession, GenerationError> {
        let current = self.session.as_ref().ok_or(GenerationError::SessionNotStarted)?;
        if current.id != session {
            return Err(GenerationError::StaleSession {
                expected: session,
                current: current.id,
            });
        }
        Ok(current)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    /// Backend that replays scripted replies and records every request.
    #[derive(Default)]
    pub struct ScriptedBackend {
        replies: Mutex<VecDeque<Result<String, GenerationError>>>,
        requests: Mutex<Vec<GenerateRequest>>,
    }

    impl ScriptedBackend {
        pub fn new(replies: Vec<Result<String, GenerationError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        pub fn requests(&self) -> Vec<GenerateRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl GenerationBackend for ScriptedBackend {
        async fn generate(&self, request: &GenerateRequest) -> Result<String, GenerationError> {
            self.requests.lock().unwrap().push(request.clone());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(String::new()))
        }
    }

    pub fn upstream_failure() -> GenerationError {
        GenerationError::Upstream {
            status: 503,
            message: "UNAVAILABLE".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    fn client(backend: Arc<ScriptedBackend>) -> GenerationClient {
        GenerationClient::with_backend(backend, ClientSettings::default())
    }

    #[test]
    fn test_compose_instruction_layout() {
        let instruction = compose_instruction("Be kind.", "Input: a\nOutput: b");
        assert_eq!(
            instruction,
            "Be kind.\n\n### EXAMPLES OF DESIRED OUTPUT ###\nInput: a\nOutput: b\n\n### IMPORTANT ###\n\
             Always return the response in the style defined above. Do not output conversational \
             filler like 'Here is your thread'. Just output the thread itself."
        );
    }

    #[test]
    fn test_missing_key_is_unavailable() {
        let mut client = GenerationClient::new(ClientSettings::default());
        assert!(!client.is_available());
        assert!(matches!(
            client.start_session("p", "e"),
            Err(GenerationError::ClientUnavailable)
        ));
        assert!(!client.has_active_session());
    }

    #[test]
    fn test_blank_key_is_unavailable() {
        let client = GenerationClient::new(ClientSettings {
            api_key: Some("  ".to_string()),
            ..ClientSettings::default()
        });
        assert!(!client.is_available());
    }

    #[tokio::test]
    async fn test_send_before_start() {
        let mut client = client(ScriptedBackend::new(vec![]));
        let mut other = GenerationClient::with_backend(ScriptedBackend::new(vec![]), ClientSettings::default());
        let foreign = other.start_session("p", "e").unwrap();

        let result = client.send_message(foreign, "hi").await;
        assert!(matches!(result, Err(GenerationError::SessionNotStarted)));
    }

    #[tokio::test]
    async fn test_send_carries_instruction_and_history() {
        let backend = ScriptedBackend::new(vec![Ok("first".into()), Ok("second".into())]);
        let mut client = client(backend.clone());
        let session = client.start_session("Persona", "Examples").unwrap();

        assert_eq!(client.send_message(session, "one").await.unwrap(), "first");
        assert_eq!(client.send_message(session, "two").await.unwrap(), "second");

        let requests = backend.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].system_instruction, compose_instruction("Persona", "Examples"));
        assert_eq!(requests[0].model, DEFAULT_MODEL);
        assert_eq!(requests[0].contents, vec![Turn::user("one")]);
        assert_eq!(
            requests[1].contents,
            vec![Turn::user("one"), Turn::model("first"), Turn::user("two")]
        );
    }

    #[tokio::test]
    async fn test_failed_turn_not_recorded() {
        let backend = ScriptedBackend::new(vec![Err(upstream_failure()), Ok("ok".into())]);
        let mut client = client(backend.clone());
        let session = client.start_session("p", "e").unwrap();

        assert!(client.send_message(session, "one").await.is_err());
        client.send_message(session, "two").await.unwrap();

        assert_eq!(backend.requests()[1].contents, vec![Turn::user("two")]);
    }

    #[tokio::test]
    async fn test_rebind_invalidates_old_session() {
        let mut client = client(ScriptedBackend::new(vec![]));
        let old = client.start_session("p", "e").unwrap();
        let new = client.start_session("q", "f").unwrap();
        assert_ne!(old, new);
        assert_eq!(client.active_session(), Some(new));

        let result = client.send_message(old, "hi").await;
        assert!(matches!(
            result,
            Err(GenerationError::StaleSession { expected, current }) if expected == old && current == new
        ));
    }

    #[tokio::test]
    async fn test_commit_after_rebind_is_rejected() {
        let backend = ScriptedBackend::new(vec![Ok("late".into()), Ok("fresh".into())]);
        let mut client = client(backend.clone());
        let old = client.start_session("p", "e").unwrap();
        let call = client.prepare(old, "hello").unwrap();

        let new = client.start_session("q", "f").unwrap();
        let reply = call.execute().await.unwrap();
        assert!(client.commit(old, "hello", &reply).is_err());

        client.send_message(new, "again").await.unwrap();
        assert_eq!(backend.requests()[1].contents, vec![Turn::user("again")]);
    }

    #[tokio::test]
    async fn test_end_session_unbinds() {
        let mut client = client(ScriptedBackend::new(vec![]));
        let session = client.start_session("p", "e").unwrap();
        client.end_session();

        assert!(!client.has_active_session());
        let result = client.send_message(session, "hi").await;
        assert!(matches!(result, Err(GenerationError::SessionNotStarted)));
    }

    #[tokio::test]
    async fn test_empty_reply_passes_through() {
        let mut client = client(ScriptedBackend::new(vec![Ok(String::new())]));
        let session = client.start_session("p", "e").unwrap();
        assert_eq!(client.send_message(session, "hi").await.unwrap(), "");
    }
}
