//! Chat state store: the ordered message list behind an incrementally
//! rendered conversation.
//!
//! ```text
//! Stream consumer ──dispatch──▶ Arc<Mutex<ChatState>> ◀──snapshot── renderer
//! ```
//!
//! All mutation goes through [`ChatState::apply`], a pure reducer over
//! [`ChatAction`] values: current state in, next state out, no hidden
//! shared fields. Content patches read the stored content for the target id
//! at apply time. Callers must never precompute "previous content plus
//! delta" from an earlier snapshot: patches for one streaming message
//! arrive asynchronously, and a stale read silently drops characters.
//!
//! Message lifecycle: appended with `streaming = true` and empty content,
//! grown by patch actions, then finalized exactly once. Content is
//! immutable after the streaming flag clears.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::warn;
use uuid::Uuid;

// ── Messages ──────────────────────────────────────────────────────

/// Who authored a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One chat message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Unique within a [`ChatState`] for its lifetime.
    pub id: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// Source citations, attached once a sync answer carries them.
    pub sources: Option<Vec<String>>,
    /// True while content is still growing.
    pub streaming: bool,
}

impl ChatMessage {
    /// A finalized user message with a fresh id.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: Role::User,
            content: content.into(),
            created_at: Utc::now(),
            sources: None,
            streaming: false,
        }
    }

    /// An empty assistant message awaiting streamed content.
    pub fn assistant_pending() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: Role::Assistant,
            content: String::new(),
            created_at: Utc::now(),
            sources: None,
            streaming: true,
        }
    }
}

// ── Actions ───────────────────────────────────────────────────────

/// How a patch changes message content.
#[derive(Clone, Debug, PartialEq)]
pub enum ContentPatch {
    /// Append to the current stored content.
    Append(String),
    /// Replace the content outright. Used for the error-rendering path,
    /// where an apology message overwrites a partial answer.
    Replace(String),
}

/// Session-level flags describing an in-flight send.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StateFlag {
    Streaming,
    Processing,
}

/// A state transition.
#[derive(Clone, Debug)]
pub enum ChatAction {
    /// Append a message to the end of the conversation.
    Append(ChatMessage),
    /// Patch the content of the message with the given id, optionally
    /// finalizing it.
    Patch {
        id: String,
        patch: ContentPatch,
        finalize: bool,
    },
    /// Set a session flag.
    SetFlag(StateFlag, bool),
    /// Drop all messages and reset both flags.
    Clear,
}

// ── State & reducer ───────────────────────────────────────────────

/// Ordered conversation (insertion order = display order) plus session
/// flags.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ChatState {
    pub messages: Vec<ChatMessage>,
    pub is_streaming: bool,
    pub is_processing: bool,
}

impl ChatState {
    /// Apply one action, returning the next state.
    ///
    /// Total over all actions: patching a missing id, patching a finalized
    /// message, and appending a duplicate id are logged no-ops, never
    /// panics.
    pub fn apply(mut self, action: ChatAction) -> ChatState {
        match action {
            ChatAction::Append(message) => {
                if self.messages.iter().any(|m| m.id == message.id) {
                    warn!(id = %message.id, "duplicate message id, append ignored");
                } else {
                    self.messages.push(message);
                }
            }
            ChatAction::Patch {
                id,
                patch,
                finalize,
            } => match self.messages.iter_mut().find(|m| m.id == id) {
                None => warn!(%id, "patch for unknown message id ignored"),
                Some(message) if !message.streaming => {
                    warn!(%id, "patch for finalized message ignored");
                }
                Some(message) => {
                    match patch {
                        // The authoritative current content, read here at
                        // apply time.
                        ContentPatch::Append(delta) => message.content.push_str(&delta),
                        ContentPatch::Replace(content) => message.content = content,
                    }
                    if finalize {
                        message.streaming = false;
                    }
                }
            },
            ChatAction::SetFlag(StateFlag::Streaming, value) => self.is_streaming = value,
            ChatAction::SetFlag(StateFlag::Processing, value) => self.is_processing = value,
            ChatAction::Clear => self = ChatState::default(),
        }
        self
    }
}

// ── Shared store ──────────────────────────────────────────────────

/// Shared handle to a [`ChatState`].
///
/// [`dispatch`](Self::dispatch) locks, runs the reducer, and stores the
/// result before releasing the lock. The reducer never suspends, so no
/// other task can observe or interleave a half-applied patch. Independent
/// streams patching different message ids interleave freely; patches to one
/// id apply in dispatch order.
#[derive(Clone, Default)]
pub struct ChatStore {
    inner: Arc<Mutex<ChatState>>,
}

impl ChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one action to the shared state.
    ///
    /// Poisoned locks are ignored the same way the action no-ops are: a
    /// panicking renderer should not take the conversation down with it.
    pub fn dispatch(&self, action: ChatAction) {
        if let Ok(mut state) = self.inner.lock() {
            let next = std::mem::take(&mut *state).apply(action);
            *state = next;
        }
    }

    /// Clone of the current state for rendering.
    pub fn snapshot(&self) -> ChatState {
        self.inner
            .lock()
            .map(|state| state.clone())
            .unwrap_or_default()
    }

    // ── Convenience dispatchers ───────────────────────────────────

    /// Append a finalized user message, returning its id.
    pub fn push_user(&self, content: &str) -> String {
        let message = ChatMessage::user(content);
        let id = message.id.clone();
        self.dispatch(ChatAction::Append(message));
        id
    }

    /// Append an empty streaming assistant message and raise the
    /// session streaming flag, returning the message id.
    pub fn begin_assistant(&self) -> String {
        let message = ChatMessage::assistant_pending();
        let id = message.id.clone();
        self.dispatch(ChatAction::Append(message));
        self.dispatch(ChatAction::SetFlag(StateFlag::Streaming, true));
        id
    }

    /// Append a streamed fragment to a message.
    pub fn push_delta(&self, id: &str, delta: &str) {
        self.dispatch(ChatAction::Patch {
            id: id.to_string(),
            patch: ContentPatch::Append(delta.to_string()),
            finalize: false,
        });
    }

    /// Stop content growth for a message and drop the session streaming
    /// flag.
    pub fn finalize(&self, id: &str) {
        self.dispatch(ChatAction::Patch {
            id: id.to_string(),
            patch: ContentPatch::Append(String::new()),
            finalize: true,
        });
        self.dispatch(ChatAction::SetFlag(StateFlag::Streaming, false));
    }

    /// Replace a streaming message's content with an error rendering and
    /// finalize it.
    pub fn fail(&self, id: &str, message: &str) {
        self.dispatch(ChatAction::Patch {
            id: id.to_string(),
            patch: ContentPatch::Replace(message.to_string()),
            finalize: true,
        });
        self.dispatch(ChatAction::SetFlag(StateFlag::Streaming, false));
    }

    pub fn set_processing(&self, value: bool) {
        self.dispatch(ChatAction::SetFlag(StateFlag::Processing, value));
    }

    /// Reset to an empty conversation.
    pub fn clear(&self) {
        self.dispatch(ChatAction::Clear);
    }
}

// ── Tests ─────────────────────────────────────────────────────────
