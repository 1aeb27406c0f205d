// SPDX-FileCopyrightText: 2026 Weft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delta accumulator for streamed text and reasoning parts.

use serde_json::json;
use weft_core::{MessagePart, PartType};

use crate::event::{DeltaKind, DeltaPayload};
use crate::transcript::Transcript;

impl From<DeltaKind> for PartType {
    fn from(kind: DeltaKind) -> Self {
        match kind {
            DeltaKind::Text => PartType::Text,
            DeltaKind::Reasoning => PartType::Reasoning,
        }
    }
}

/// Appends `delta.delta` to the part `delta.part_id` of `delta.message_id`,
/// creating the part at the end of the message when it does not exist yet.
///
/// Returns `false` (no change) when the message is not known locally.
pub fn apply_delta(
    transcript: &mut Transcript,
    kind: DeltaKind,
    delta: &DeltaPayload,
    now_ms: i64,
) -> bool {
    let Some(index) = transcript.position(&delta.message_id) else {
        tracing::debug!(
            message_id = %delta.message_id,
            part_id = %delta.part_id,
            "delta for unknown message dropped"
        );
        return false;
    };
    let Some(message) = transcript.message_mut(index) else {
        return false;
    };

    if let Some(part) = message.parts.iter_mut().find(|p| p.id == delta.part_id) {
        let mut text = part.text();
        text.push_str(&delta.delta);
        set_text(part, text);
        if delta.step_index.is_some() {
            part.step_index = delta.step_index;
        }
        part.completed_at = None;
        return true;
    }

    let mut part = MessagePart {
        id: delta.part_id.clone(),
        message_id: delta.message_id.clone(),
        index: message.parts.len() as u32,
        step_index: delta.step_index,
        part_type: kind.into(),
        content: String::new(),
        content_json: None,
        agent: message.agent.clone(),
        provider: message.provider.clone(),
        model: message.model.clone(),
        started_at: Some(now_ms),
        completed_at: None,
        tool_name: None,
        tool_call_id: None,
        tool_duration_ms: None,
        ephemeral: false,
    };
    set_text(&mut part, delta.delta.clone());
    message.parts.push(part);
    true
}

fn set_text(part: &mut MessagePart, text: String) {
    let value = json!({ "text": text });
    part.content = value.to_string();
    part.content_json = Some(value);
}
