//! Conversation controller.
//!
//! Sequences the two user-facing operations against the generation client:
//! `generate` starts a fresh session and replaces the transcript, `refine`
//! continues the bound session and appends to it. At most one turn is in
//! flight at a time; a second submission is rejected with
//! [`SessionError::Busy`] rather than racing the first.
//!
//! Front ends that must stay responsive while the network call runs use the
//! split form: `begin_*` returns a [`PendingTurn`] that can be moved onto a
//! task, and [`SessionController::complete`] applies its result.

use uuid::Uuid;

use crate::client::{GenerationClient, PendingCall, SessionId};
use crate::error::{GenerationError, SessionError, TurnFailure};
use crate::state::Message;
use crate::templates::{StyleKey, TemplateStore};

pub const GENERATE_FALLBACK: &str =
    "Sorry, I encountered an error generating the thread. Please try again.";
pub const REFINE_FALLBACK: &str = "Sorry, I couldn't apply that refinement. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnKind {
    Generate,
    Refine,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Append [`REFINE_FALLBACK`] when a refinement fails instead of leaving
    /// the user's turn unanswered.
    pub surface_refine_errors: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            surface_refine_errors: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Ticket {
    id: Uuid,
    kind: TurnKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    InFlight(Ticket),
}

/// A submitted turn whose network call has not run yet.
pub struct PendingTurn {
    ticket: Ticket,
    text: String,
    call: Result<PendingCall, TurnFailure>,
}

impl PendingTurn {
    pub fn id(&self) -> Uuid {
        self.ticket.id
    }

    pub fn kind(&self) -> TurnKind {
        self.ticket.kind
    }

    pub async fn run(self) -> TurnResult {
        let (session, reply) = match self.call {
            Ok(call) => {
                let session = call.session();
                (Some(session), call.execute().await.map_err(TurnFailure::from))
            }
            Err(failure) => (None, Err(failure)),
        };

        TurnResult {
            ticket: self.ticket,
            session,
            text: self.text,
            reply,
        }
    }
}

/// What a [`PendingTurn`] produced, to be handed back to the controller.
pub struct TurnResult {
    ticket: Ticket,
    session: Option<SessionId>,
    text: String,
    reply: Result<String, TurnFailure>,
}

impl TurnResult {
    pub fn id(&self) -> Uuid {
        self.ticket.id
    }
}

pub enum Submission {
    /// Blank input; nothing changed.
    Ignored,
    Started(PendingTurn),
}

#[derive(Debug)]
pub enum TurnOutcome {
    Ignored,
    Replied { kind: TurnKind },
    /// The failure was logged and, where configured, shown in the transcript.
    Failed { kind: TurnKind, error: TurnFailure },
}

impl TurnOutcome {
    /// Whether the front end should clear the input that produced this turn.
    pub fn input_consumed(&self) -> bool {
        matches!(self, TurnOutcome::Replied { kind: TurnKind::Generate })
    }
}

pub struct SessionController {
    client: GenerationClient,
    transcript: Vec<Message>,
    phase: Phase,
    options: SessionOptions,
}

impl SessionController {
    pub fn new(client: GenerationClient, options: SessionOptions) -> Self {
        Self {
            client,
            transcript: Vec::new(),
            phase: Phase::Idle,
            options,
        }
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(self.phase, Phase::InFlight(_))
    }

    /// Kind of the turn currently in flight, if any.
    pub fn in_flight(&self) -> Option<TurnKind> {
        match self.phase {
            Phase::InFlight(ticket) => Some(ticket.kind),
            Phase::Idle => None,
        }
    }

    pub fn has_active_session(&self) -> bool {
        self.client.has_active_session()
    }

    pub fn client(&self) -> &GenerationClient {
        &self.client
    }

    /// Most recent model reply in the transcript.
    pub fn last_reply(&self) -> Option<&Message> {
        self.transcript.iter().rev().find(|m| m.is_model())
    }

    /// Swaps in a new client, e.g. after the user supplies an API key.
    /// The old session is dropped along with the transcript.
    pub fn replace_client(&mut self, client: GenerationClient) -> Result<(), SessionError> {
        self.ensure_idle()?;
        self.client = client;
        self.transcript.clear();
        Ok(())
    }

    /// Starts a fresh session in `style` and submits `raw_input` as its first turn.
    pub fn begin_generate(
        &mut self,
        templates: &TemplateStore,
        style: &StyleKey,
        raw_input: &str,
    ) -> Result<Submission, SessionError> {
        if raw_input.trim().is_empty() {
            return Ok(Submission::Ignored);
        }
        let ticket = self.enter(TurnKind::Generate)?;
        self.transcript = vec![Message::user(raw_input)];

        // A new thread never continues the old context, even if it fails to start
        let client = &mut self.client;
        client.end_session();
        let call = templates
            .get(style)
            .map_err(TurnFailure::from)
            .and_then(|config| {
                let session = client.start_session(&config.system_prompt, &config.examples)?;
                Ok(client.prepare(session, raw_input)?)
            });

        tracing::debug!(turn = %ticket.id, style = %style, "generation submitted");
        Ok(Submission::Started(PendingTurn {
            ticket,
            text: raw_input.to_string(),
            call,
        }))
    }

    /// Submits `text` as a follow-up turn in the already bound session.
    pub fn begin_refine(&mut self, text: &str) -> Result<Submission, SessionError> {
        if text.trim().is_empty() {
            return Ok(Submission::Ignored);
        }
        let ticket = self.enter(TurnKind::Refine)?;
        self.transcript.push(Message::user(text));

        let call = self
            .client
            .active_session()
            .ok_or(GenerationError::SessionNotStarted)
            .and_then(|session| self.client.prepare(session, text))
            .map_err(TurnFailure::from);

        tracing::debug!(turn = %ticket.id, "refinement submitted");
        Ok(Submission::Started(PendingTurn {
            ticket,
            text: text.to_string(),
            call,
        }))
    }

    /// Applies the result of the turn currently in flight.
    pub fn complete(&mut self, result: TurnResult) -> Result<TurnOutcome, SessionError> {
        match self.phase {
            Phase::InFlight(ticket) if ticket == result.ticket => {}
            _ => {
                tracing::warn!(turn = %result.ticket.id, "dropping result for a turn that is no longer current");
                return Err(SessionError::StaleTurn(result.ticket.id));
            }
        }
        self.phase = Phase::Idle;

        let kind = result.ticket.kind;
        let reply = match (result.reply, result.session) {
            (Ok(reply), Some(session)) => self
                .client
                .commit(session, &result.text, &reply)
                .map(|_| reply)
                .map_err(TurnFailure::from),
            (reply, _) => reply,
        };

        match reply {
            Ok(reply) => {
                tracing::info!(turn = %result.ticket.id, ?kind, chars = reply.chars().count(), "turn completed");
                self.transcript.push(Message::model(reply));
                Ok(TurnOutcome::Replied { kind })
            }
            Err(error) => {
                tracing::error!(turn = %result.ticket.id, ?kind, %error, "turn failed");
                match kind {
                    TurnKind::Generate => self.transcript.push(Message::model(GENERATE_FALLBACK)),
                    TurnKind::Refine if self.options.surface_refine_errors => {
                        self.transcript.push(Message::model(REFINE_FALLBACK))
                    }
                    TurnKind::Refine => {}
                }
                Ok(TurnOutcome::Failed { kind, error })
            }
        }
    }

    /// Resolves the in-flight turn as failed when its task died without a result.
    pub fn abandon(&mut self) -> Option<TurnOutcome> {
        let Phase::InFlight(ticket) = self.phase else {
            return None;
        };
        let result = TurnResult {
            ticket,
            session: None,
            text: String::new(),
            reply: Err(TurnFailure::Interrupted),
        };
        self.complete(result).ok()
    }

    /// Runs a full generation turn.
    pub async fn generate(
        &mut self,
        templates: &TemplateStore,
        style: &StyleKey,
        raw_input: &str,
    ) -> Result<TurnOutcome, SessionError> {
        match self.begin_generate(templates, style, raw_input)? {
            Submission::Ignored => Ok(TurnOutcome::Ignored),
            Submission::Started(turn) => self.finish(turn).await,
        }
    }

    /// Runs a full refinement turn.
    pub async fn refine(&mut self, text: &str) -> Result<TurnOutcome, SessionError> {
        match self.begin_refine(text)? {
            Submission::Ignored => Ok(TurnOutcome::Ignored),
            Submission::Started(turn) => self.finish(turn).await,
        }
    }

    async fn finish(&mut self, turn: PendingTurn) -> Result<TurnOutcome, SessionError> {
        // Dropping this future mid-call must not leave the controller stuck in flight.
        let guard = IdleOnDrop(self);
        let result = turn.run().await;
        guard.0.complete(result)
    }

    fn enter(&mut self, kind: TurnKind) -> Result<Ticket, SessionError> {
        self.ensure_idle()?;
        let ticket = Ticket {
            id: Uuid::new_v4(),
            kind,
        };
        self.phase = Phase::InFlight(ticket);
        Ok(ticket)
    }

    fn ensure_idle(&self) -> Result<(), SessionError> {
        if self.is_in_flight() {
            return Err(SessionError::Busy);
        }
        Ok(())
    }
}

struct IdleOnDrop<'a>(&'a mut SessionController);

impl Drop for IdleOnDrop<'_> {
    fn drop(&mut self) {
        self.0.phase = Phase::Idle;
    }
}
