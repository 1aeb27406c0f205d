// SPDX-FileCopyrightText: 2026 Weft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed session events decoded from `(event_type, payload)` pairs.
//!
//! Decoding is the only place that looks at raw JSON. An unknown event type
//! decodes to `Ok(None)`; a known type with a payload missing a required
//! field decodes to `Err(WeftError::Decode)`. The dispatcher drops both.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use weft_core::{QueueState, Role, TopupMethod, WeftError};

/// Which accumulator a streamed fragment belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaKind {
    Text,
    Reasoning,
}

/// Payload of `message.part.delta` and `reasoning.delta`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeltaPayload {
    pub message_id: String,
    pub part_id: String,
    pub delta: String,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub step_index: Option<u32>,
}

/// Payload of `message.created`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageCreatedPayload {
    pub id: String,
    pub role: Role,
    #[serde(default, deserialize_with = "lenient_string")]
    pub agent: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub provider: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub model: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub created_at: Option<i64>,
}

/// Payload of `tool.call` and of `tool.delta` on the input channel.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallPayload {
    #[serde(default, deserialize_with = "lenient_string")]
    pub call_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub args: Option<Value>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub step_index: Option<u32>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub message_id: Option<String>,
}

/// Payload of `tool.approval.required`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequiredPayload {
    pub call_id: String,
    pub tool_name: String,
    pub message_id: String,
    #[serde(default)]
    pub args: Option<Value>,
}

/// Payload of `setu.topup.required`. Missing amounts are filled from config.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopupRequiredPayload {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub amount_usd: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub current_balance: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub min_topup_usd: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub suggested_topup_usd: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub message_id: Option<String>,
}

/// Payload of `setu.payment.complete`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentCompletePayload {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub amount_usd: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub new_balance: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub transaction_id: Option<String>,
}

/// The closed set of events the reconciler understands.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    MessageCreated(MessageCreatedPayload),
    MessageCompleted { id: String },
    PartDelta { kind: DeltaKind, delta: DeltaPayload },
    /// `tool.delta` (input channel) or `tool.call`.
    ToolInput(ToolCallPayload),
    ToolResult { call_id: String },
    StepFinished,
    ApprovalRequired(ApprovalRequiredPayload),
    ApprovalUpdated { call_id: String, args: Option<Value> },
    ApprovalResolved { call_id: String },
    TopupRequired(TopupRequiredPayload),
    TopupMethodSelected { method: TopupMethod },
    TopupCancelled { reason: Option<String> },
    PaymentRequired { amount_usd: Option<f64> },
    PaymentSigning,
    PaymentComplete(PaymentCompletePayload),
    PaymentError { error: Option<String> },
    FiatCheckoutCreated,
    Error { message_id: Option<String>, call_id: Option<String> },
    QueueUpdated(QueueState),
}

impl SessionEvent {
    /// Decodes a raw event.
    pub fn decode(event_type: &str, payload: &Value) -> Result<Option<Self>, WeftError> {
        let event = match event_type {
            "message.created" => SessionEvent::MessageCreated(parse(event_type, payload)?),
            "message.completed" => {
                let IdPayload { id } = parse(event_type, payload)?;
                SessionEvent::MessageCompleted { id }
            }
            "message.part.delta" => SessionEvent::PartDelta {
                kind: DeltaKind::Text,
                delta: parse(event_type, payload)?,
            },
            "reasoning.delta" => SessionEvent::PartDelta {
                kind: DeltaKind::Reasoning,
                delta: parse(event_type, payload)?,
            },
            "tool.delta" => {
                // Only argument streaming is reconciled locally.
                let channel = payload.get("channel").and_then(Value::as_str);
                if channel != Some("input") {
                    return Ok(None);
                }
                SessionEvent::ToolInput(parse(event_type, payload)?)
            }
            "tool.call" => SessionEvent::ToolInput(parse(event_type, payload)?),
            "tool.result" => {
                let CallPayload { call_id } = parse(event_type, payload)?;
                SessionEvent::ToolResult { call_id }
            }
            "finish-step" | "step.finished" => SessionEvent::StepFinished,
            "tool.approval.required" => SessionEvent::ApprovalRequired(parse(event_type, payload)?),
            "tool.approval.updated" => {
                let ArgsPayload { call_id, args } = parse(event_type, payload)?;
                SessionEvent::ApprovalUpdated { call_id, args }
            }
            "tool.approval.resolved" => {
                let CallPayload { call_id } = parse(event_type, payload)?;
                SessionEvent::ApprovalResolved { call_id }
            }
            "setu.topup.required" => SessionEvent::TopupRequired(parse(event_type, payload)?),
            "setu.topup.method_selected" => {
                let MethodPayload { method } = parse(event_type, payload)?;
                SessionEvent::TopupMethodSelected { method }
            }
            "setu.topup.cancelled" => {
                let ReasonPayload { reason } = parse(event_type, payload)?;
                SessionEvent::TopupCancelled { reason }
            }
            "setu.payment.required" => {
                let AmountPayload { amount_usd } = parse(event_type, payload)?;
                SessionEvent::PaymentRequired { amount_usd }
            }
            "setu.payment.signing" => SessionEvent::PaymentSigning,
            "setu.payment.complete" => SessionEvent::PaymentComplete(parse(event_type, payload)?),
            "setu.payment.error" => {
                let ErrorPayload { error } = parse(event_type, payload)?;
                SessionEvent::PaymentError { error }
            }
            "setu.fiat.checkout_created" => SessionEvent::FiatCheckoutCreated,
            "error" => {
                let StreamErrorPayload {
                    message_id,
                    call_id,
                } = parse(event_type, payload)?;
                SessionEvent::Error {
                    message_id,
                    call_id,
                }
            }
            "queue.updated" => SessionEvent::QueueUpdated(parse(event_type, payload)?),
            _ => return Ok(None),
        };
        Ok(Some(event))
    }

    /// True for events whose local derivation is backed by an authoritative resync.
    pub fn invalidates(&self) -> bool {
        matches!(
            self,
            SessionEvent::MessageCompleted { .. }
                | SessionEvent::ToolResult { .. }
                | SessionEvent::StepFinished
                | SessionEvent::Error { .. }
        )
    }
}

fn parse<T: DeserializeOwned>(event_type: &str, payload: &Value) -> Result<T, WeftError> {
    let result = if payload.is_null() {
        T::deserialize(&Value::Object(Default::default()))
    } else {
        T::deserialize(payload)
    };
    result.map_err(|e| WeftError::decode(event_type, e.to_string()))
}

#[derive(Deserialize)]
struct IdPayload {
    id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CallPayload {
    call_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArgsPayload {
    call_id: String,
    #[serde(default)]
    args: Option<Value>,
}

#[derive(Deserialize)]
struct MethodPayload {
    method: TopupMethod,
}

#[derive(Deserialize)]
struct ReasonPayload {
    #[serde(default, deserialize_with = "lenient_string")]
    reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AmountPayload {
    #[serde(default, deserialize_with = "lenient_f64")]
    amount_usd: Option<f64>,
}

#[derive(Deserialize)]
struct ErrorPayload {
    #[serde(default, deserialize_with = "lenient_string")]
    error: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamErrorPayload {
    #[serde(default, deserialize_with = "lenient_string")]
    message_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    call_id: Option<String>,
}

/// Accepts a JSON number or a numeric string; anything else is `None`.
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    })
}

/// Accepts a non-negative JSON integer that fits in `u32`; anything else is `None`.
fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(Value::as_u64)
        .and_then(|n| u32::try_from(n).ok()))
}

fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(Value::as_i64))
}

/// Optional identifiers and labels: a non-string value reads as absent.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        _ => None,
    })
}
