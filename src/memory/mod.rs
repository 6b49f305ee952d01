//! Append-only conversation memory.
//!
//! Every agent owns one [`Memory`]. Messages are only ever appended; the
//! caller may truncate from the front to bound context size, and a
//! Plan-Execute fork takes a [`Memory::snapshot`] to seed sub-executors.

mod message;

pub use message::{Message, Role, ToolArguments, ToolCall, STRUCT_PARSE_RESULT_MARKER};

use crate::agent::{AgentError, AgentResult};

/// Ordered, role-tagged message log.
#[derive(Debug, Clone, Default)]
pub struct Memory {
    messages: Vec<Message>,
}

impl Memory {
    /// Create an empty memory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a memory seeded with a copy of `messages`.
    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    /// Append a message.
    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Append several messages, preserving their order.
    pub fn extend<I: IntoIterator<Item = Message>>(&mut self, messages: I) {
        self.messages.extend(messages);
    }

    /// Most recent message.
    pub fn last(&self) -> AgentResult<&Message> {
        self.messages.last().ok_or(AgentError::EmptyMemory)
    }

    /// Replace the most recent message with `f(last)`.
    ///
    /// Used by the struct-parse calling convention, which folds tool
    /// output into the preceding assistant turn.
    pub fn amend_last<F>(&mut self, f: F) -> AgentResult<()>
    where
        F: FnOnce(&Message) -> Message,
    {
        let last = self.messages.last_mut().ok_or(AgentError::EmptyMemory)?;
        *last = f(last);
        Ok(())
    }

    /// All messages in insertion order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Messages appended after the first `offset` entries.
    pub fn messages_since(&self, offset: usize) -> &[Message] {
        self.messages.get(offset..).unwrap_or(&[])
    }

    /// Owned copy of the message list.
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    /// Number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the memory holds no messages.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Drop the oldest messages so that at most `keep` remain.
    pub fn truncate_front(&mut self, keep: usize) {
        if self.messages.len() > keep {
            let excess = self.messages.len() - keep;
            self.messages.drain(..excess);
        }
    }

    /// Remove every message.
    pub fn clear(&mut self) {
        self.messages.clear();
    }
}
