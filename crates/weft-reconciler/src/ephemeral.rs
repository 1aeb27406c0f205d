// SPDX-FileCopyrightText: 2026 Weft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ephemeral tool-call previews.
//!
//! A preview is a locally synthesized `tool_call` part that shows a call while
//! its arguments stream in. It carries `ephemeral = true` and is removed, never
//! merged, once the durable result arrives or its message completes.
//!
//! Target message resolution, in order:
//! 1. the payload's explicit `messageId`, if that message is known locally;
//! 2. the active assistant message (from `message.created`), if known;
//! 3. the last assistant message that is not `complete`, scanning backward.
//!
//! With no candidate the event is dropped.

use serde_json::{Map, Value};
use weft_core::{MessagePart, PartType};

use crate::event::ToolCallPayload;
use crate::transcript::Transcript;

const PREVIEW_ID_PREFIX: &str = "ephemeral-tool-call-";

/// Picks the message a preview should attach to.
pub fn resolve_target(
    transcript: &Transcript,
    explicit: Option<&str>,
    active: Option<&str>,
) -> Option<usize> {
    explicit
        .and_then(|id| transcript.position(id))
        .or_else(|| active.and_then(|id| transcript.position(id)))
        .or_else(|| transcript.last_open_assistant())
}

/// Creates or refreshes the preview for `call`.
///
/// A payload with a `callId` only ever matches the preview with that exact
/// `callId`, wherever it lives in the session. Without a `callId` the preview
/// is matched by tool name within the target message.
pub fn upsert_ephemeral(
    transcript: &mut Transcript,
    call: &ToolCallPayload,
    active: Option<&str>,
    now_ms: i64,
) -> bool {
    if call.name.is_empty() {
        return false;
    }

    let existing = match call.call_id.as_deref() {
        Some(call_id) => find_by_call_id(transcript, call_id),
        None => None,
    };

    let (message_index, part_index) = match existing {
        Some((m, p)) => (m, Some(p)),
        None => {
            let Some(target) = resolve_target(transcript, call.message_id.as_deref(), active)
            else {
                tracing::debug!(tool = %call.name, "no message to attach tool preview to");
                return false;
            };
            let by_name = if call.call_id.is_none() {
                transcript.iter().nth(target).and_then(|message| {
                    message.parts.iter().position(|part| {
                        part.ephemeral && part.tool_name.as_deref() == Some(call.name.as_str())
                    })
                })
            } else {
                None
            };
            (target, by_name)
        }
    };

    let Some(message) = transcript.message_mut(message_index) else {
        return false;
    };

    match part_index {
        Some(p) => {
            let part = &mut message.parts[p];
            let mut content = match part.content_json.take() {
                Some(Value::Object(map)) => map,
                _ => Map::new(),
            };
            merge_call(&mut content, call);
            part.content = Value::Object(content.clone()).to_string();
            part.content_json = Some(Value::Object(content));
            part.tool_name = Some(call.name.clone());
            if call.call_id.is_some() {
                part.tool_call_id = call.call_id.clone();
            }
            if call.step_index.is_some() {
                part.step_index = call.step_index;
            }
        }
        None => {
            let id = match call.call_id.as_deref() {
                Some(call_id) => format!("{PREVIEW_ID_PREFIX}{call_id}"),
                None => format!("{PREVIEW_ID_PREFIX}{}-{now_ms}", call.name),
            };
            let mut content = Map::new();
            merge_call(&mut content, call);
            let part = MessagePart {
                id,
                message_id: message.id.clone(),
                index: message.parts.len() as u32,
                step_index: call.step_index,
                part_type: PartType::ToolCall,
                content: Value::Object(content.clone()).to_string(),
                content_json: Some(Value::Object(content)),
                agent: message.agent.clone(),
                provider: message.provider.clone(),
                model: message.model.clone(),
                started_at: Some(now_ms),
                completed_at: None,
                tool_name: Some(call.name.clone()),
                tool_call_id: call.call_id.clone(),
                tool_duration_ms: None,
                ephemeral: true,
            };
            message.parts.push(part);
        }
    }
    true
}

/// Removes the preview for `call_id` from whichever message holds it.
///
/// Removing a preview that is already gone is a no-op.
pub fn remove_ephemeral(transcript: &mut Transcript, call_id: &str) -> bool {
    let Some((message_index, part_index)) = find_by_call_id(transcript, call_id) else {
        return false;
    };
    match transcript.message_mut(message_index) {
        Some(message) => {
            message.parts.remove(part_index);
            true
        }
        None => false,
    }
}

/// Strips every remaining preview from `message_id`.
pub fn clear_ephemeral_for(transcript: &mut Transcript, message_id: &str) -> bool {
    let Some(index) = transcript.position(message_id) else {
        return false;
    };
    if !transcript
        .get(message_id)
        .is_some_and(|message| message.has_ephemeral_parts())
    {
        return false;
    }
    match transcript.message_mut(index) {
        Some(message) => {
            message.parts.retain(|part| !part.ephemeral);
            true
        }
        None => false,
    }
}

fn find_by_call_id(transcript: &Transcript, call_id: &str) -> Option<(usize, usize)> {
    transcript.iter().enumerate().find_map(|(m, message)| {
        message
            .parts
            .iter()
            .position(|part| part.ephemeral && part.tool_call_id.as_deref() == Some(call_id))
            .map(|p| (m, p))
    })
}

/// Overwrites `name`, `callId`, and `args` while keeping any other streamed keys.
fn merge_call(content: &mut Map<String, Value>, call: &ToolCallPayload) {
    content.insert("name".into(), Value::String(call.name.clone()));
    if let Some(call_id) = &call.call_id {
        content.insert("callId".into(), Value::String(call_id.clone()));
    }
    if let Some(args) = &call.args {
        content.insert("args".into(), args.clone());
    }
}
