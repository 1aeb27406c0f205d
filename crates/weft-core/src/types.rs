// SPDX-FileCopyrightText: 2026 Weft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Data model shared by the reconciler, the transport, and the REST collaborator.
//!
//! Field names serialize in camelCase to match the session server's JSON.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

/// Unique identifier for a conversation session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        SessionId(value.to_string())
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        SessionId(value)
    }
}

/// Author of a message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// Generation status of a message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MessageStatus {
    #[default]
    Pending,
    Complete,
    Error,
}

/// Kind of content carried by a [`MessagePart`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PartType {
    Text,
    Reasoning,
    ToolCall,
    ToolResult,
    Image,
    File,
    Error,
}

/// One ordered unit of a message: a text run, a reasoning run, a tool call, etc.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    pub id: String,
    /// Back-reference to the owning message.
    pub message_id: String,
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub step_index: Option<u32>,
    #[serde(rename = "type")]
    pub part_type: PartType,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_json: Option<Value>,
    #[serde(default)]
    pub agent: String,
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub started_at: Option<i64>,
    #[serde(default)]
    pub completed_at: Option<i64>,
    #[serde(default)]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub tool_call_id: Option<String>,
    #[serde(default)]
    pub tool_duration_ms: Option<u64>,
    /// Locally synthesized preview that has no durable counterpart yet.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub ephemeral: bool,
}

impl MessagePart {
    /// Render order: `index` ascending, then `startedAt` ascending (unset first).
    pub fn render_order(&self, other: &MessagePart) -> Ordering {
        self.index
            .cmp(&other.index)
            .then_with(|| self.started_at.cmp(&other.started_at))
    }

    /// Returns the text carried by a text or reasoning part.
    ///
    /// Looks at `contentJson.text` first, then at `content` parsed as a JSON
    /// object with a string `text`, and finally at `content` verbatim.
    pub fn text(&self) -> String {
        if let Some(Value::Object(map)) = &self.content_json
            && let Some(text) = map.get("text")
        {
            return match text {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            };
        }
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&self.content)
            && let Some(Value::String(text)) = map.get("text")
        {
            return text.clone();
        }
        self.content.clone()
    }
}

/// A single conversational turn owned by a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    #[serde(default)]
    pub session_id: String,
    pub role: Role,
    #[serde(default)]
    pub status: MessageStatus,
    #[serde(default)]
    pub agent: String,
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub completed_at: Option<i64>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

impl Message {
    /// Creates an empty pending message. Mostly useful for tests and fixtures.
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            session_id: String::new(),
            role,
            status: MessageStatus::Pending,
            agent: String::new(),
            provider: String::new(),
            model: String::new(),
            created_at: 0,
            completed_at: None,
            error: None,
            parts: Vec::new(),
        }
    }

    /// Parts sorted in render order.
    pub fn ordered_parts(&self) -> Vec<&MessagePart> {
        let mut parts: Vec<&MessagePart> = self.parts.iter().collect();
        parts.sort_by(|a, b| a.render_order(b));
        parts
    }

    /// Finds a part by id.
    pub fn part(&self, part_id: &str) -> Option<&MessagePart> {
        self.parts.iter().find(|part| part.id == part_id)
    }

    /// True when any ephemeral preview is still attached.
    pub fn has_ephemeral_parts(&self) -> bool {
        self.parts.iter().any(|part| part.ephemeral)
    }
}

/// A tool invocation blocked until a human or policy approves or rejects it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingToolApproval {
    pub call_id: String,
    pub tool_name: String,
    #[serde(default)]
    pub args: Option<Value>,
    pub message_id: String,
    #[serde(default)]
    pub created_at: i64,
}

/// The outstanding balance top-up request for a session (at most one).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingTopupApproval {
    pub session_id: String,
    pub message_id: String,
    pub amount_usd: f64,
    pub current_balance: f64,
    pub min_topup_usd: f64,
    pub suggested_topup_usd: f64,
}

/// Funding path chosen for a top-up.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TopupMethod {
    Crypto,
    Fiat,
}

/// One waiting entry in the server-side message queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedMessage {
    pub message_id: String,
    pub position: u32,
}

/// Snapshot of the server-side message queue for a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueState {
    #[serde(default)]
    pub current_message_id: Option<String>,
    #[serde(default)]
    pub queued_messages: Vec<QueuedMessage>,
    #[serde(default)]
    pub queue_length: usize,
}

/// A named event with an opaque JSON payload, as delivered by the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEvent {
    pub event_type: String,
    pub payload: Value,
}

impl RawEvent {
    pub fn new(event_type: impl Into<String>, payload: Value) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
        }
    }
}
