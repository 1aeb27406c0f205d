// SPDX-FileCopyrightText: 2026 Weft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Balance top-up negotiation.
//!
//! ```text
//! idle -> required -> crypto: processing -> signing -> complete | error -> idle
//!                  -> fiat:   checkout created (confirmed out of band)  -> idle
//! cancelled: from any phase -> idle
//! ```
//!
//! At most one request is outstanding per session; a new `required` replaces
//! the old one. The fiat path clears the pending request as soon as checkout
//! is created, the crypto path only on its terminal event.

use weft_config::TopupConfig;
use weft_core::{PendingTopupApproval, TopupMethod};

use crate::event::{PaymentCompletePayload, TopupRequiredPayload};
use crate::update::{Notice, NoticeLevel};

/// Reason reported when a cancellation does not carry one.
pub const DEFAULT_CANCEL_REASON: &str = "Request cancelled";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum PaymentPhase {
    #[default]
    Idle,
    Required,
    Processing,
    Signing,
    FiatCheckout,
}

/// Top-up state for one session.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TopupState {
    pub pending: Option<PendingTopupApproval>,
    pub phase: PaymentPhase,
    pub method: Option<TopupMethod>,
    /// A crypto payment is in flight.
    pub payment_pending: bool,
    /// Last balance reported by a completed payment.
    pub balance: Option<f64>,
}

impl TopupState {
    pub fn require(
        &mut self,
        session_id: &str,
        payload: &TopupRequiredPayload,
        defaults: &TopupConfig,
    ) {
        self.pending = Some(PendingTopupApproval {
            session_id: session_id.to_string(),
            message_id: payload.message_id.clone().unwrap_or_default(),
            amount_usd: payload.amount_usd.unwrap_or(0.0),
            current_balance: payload.current_balance.unwrap_or(0.0),
            min_topup_usd: payload.min_topup_usd.unwrap_or(defaults.default_min_usd),
            suggested_topup_usd: payload
                .suggested_topup_usd
                .unwrap_or(defaults.default_suggested_usd),
        });
        self.phase = PaymentPhase::Required;
        self.method = None;
    }

    /// Records the chosen funding path. The pending request stays visible.
    pub fn select_method(&mut self, method: TopupMethod) -> Option<Notice> {
        self.method = Some(method);
        match method {
            TopupMethod::Crypto => {
                let entering = !matches!(self.phase, PaymentPhase::Processing | PaymentPhase::Signing);
                self.payment_pending = true;
                if entering {
                    self.phase = PaymentPhase::Processing;
                    return Some(Notice::new(NoticeLevel::Loading, "Processing crypto payment"));
                }
                None
            }
            TopupMethod::Fiat => {
                self.phase = PaymentPhase::FiatCheckout;
                None
            }
        }
    }

    pub fn payment_required(&mut self, amount_usd: Option<f64>) -> Option<Notice> {
        let was_pending = self.payment_pending;
        self.payment_pending = true;
        if matches!(self.phase, PaymentPhase::Idle | PaymentPhase::Required) {
            self.phase = PaymentPhase::Processing;
        }
        if was_pending {
            return None;
        }
        let text = match amount_usd {
            Some(amount) => format!("Payment required: ${amount:.2}"),
            None => "Payment required".to_string(),
        };
        Some(Notice::new(NoticeLevel::Loading, text))
    }

    pub fn signing(&mut self) -> Notice {
        self.phase = PaymentPhase::Signing;
        self.payment_pending = true;
        Notice::new(NoticeLevel::Loading, "Signing transaction")
    }

    pub fn complete(&mut self, payload: &PaymentCompletePayload, config: &TopupConfig) -> Notice {
        if let Some(balance) = payload.new_balance {
            self.balance = Some(balance);
        }
        self.reset();

        let amount = payload.amount_usd.unwrap_or(0.0);
        let notice = Notice::new(NoticeLevel::Success, format!("Payment complete: ${amount:.2}"));
        match payload.transaction_id.as_deref() {
            Some(tx) if !tx.is_empty() => notice.with_link(config.explorer_link(tx)),
            _ => notice,
        }
    }

    pub fn fiat_checkout_created(&mut self) -> Notice {
        self.reset();
        Notice::new(
            NoticeLevel::Info,
            "Complete the payment in checkout, then retry your message",
        )
    }

    pub fn failed(&mut self, error: Option<&str>) -> Notice {
        self.reset();
        Notice::new(NoticeLevel::Error, error.unwrap_or("Payment failed"))
    }

    /// Clears any pending request and returns the reason to report.
    /// Safe when nothing is pending.
    pub fn cancel(&mut self, reason: Option<&str>) -> String {
        self.reset();
        reason
            .filter(|r| !r.is_empty())
            .unwrap_or(DEFAULT_CANCEL_REASON)
            .to_string()
    }

    fn reset(&mut self) {
        self.pending = None;
        self.phase = PaymentPhase::Idle;
        self.method = None;
        self.payment_pending = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn required(amount: f64, balance: f64) -> TopupRequiredPayload {
        TopupRequiredPayload {
            amount_usd: Some(amount),
            current_balance: Some(balance),
            min_topup_usd: None,
            suggested_topup_usd: None,
            message_id: Some("m1".into()),
        }
    }

    #[test]
    fn required_fills_defaults_from_config() {
        let mut state = TopupState::default();
        let payload = TopupRequiredPayload {
            amount_usd: None,
            current_balance: None,
            min_topup_usd: None,
            suggested_topup_usd: Some(20.0),
            message_id: None,
        };
        state.require("s1", &payload, &TopupConfig::default());

        let pending = state.pending.unwrap();
        assert_eq!(pending.session_id, "s1");
        assert_eq!(pending.message_id, "");
        assert_eq!(pending.amount_usd, 0.0);
        assert_eq!(pending.min_topup_usd, 5.0);
        assert_eq!(pending.suggested_topup_usd, 20.0);
        assert_eq!(state.phase, PaymentPhase::Required);
    }

    #[test]
    fn second_required_replaces_the_first() {
        let mut state = TopupState::default();
        let config = TopupConfig::default();
        state.require("s1", &required(0.5, 0.1), &config);
        state.require("s1", &required(2.0, 0.0), &config);
        assert_eq!(state.pending.as_ref().unwrap().amount_usd, 2.0);
    }

    #[test]
    fn crypto_path_keeps_pending_until_complete() {
        let mut state = TopupState::default();
        let config = TopupConfig::default();
        state.require("s1", &required(0.5, 0.1), &config);

        let notice = state.select_method(TopupMethod::Crypto).unwrap();
        assert_eq!(notice.level, NoticeLevel::Loading);
        assert!(state.pending.is_some());
        assert!(state.payment_pending);
        assert_eq!(state.select_method(TopupMethod::Crypto), None);

        state.signing();
        assert_eq!(state.phase, PaymentPhase::Signing);
        assert!(state.pending.is_some());

        let done = state.complete(
            &PaymentCompletePayload {
                amount_usd: Some(5.0),
                new_balance: Some(5.1),
                transaction_id: Some("abc".into()),
            },
            &config,
        );
        assert_eq!(done.text, "Payment complete: $5.00");
        assert_eq!(done.link.as_deref(), Some("https://orbmarkets.io/tx/abc"));
        assert!(state.pending.is_none());
        assert!(!state.payment_pending);
        assert_eq!(state.balance, Some(5.1));
        assert_eq!(state.phase, PaymentPhase::Idle);
    }

    #[test]
    fn fiat_path_clears_on_checkout_created() {
        let mut state = TopupState::default();
        state.require("s1", &required(0.5, 0.1), &TopupConfig::default());
        assert_eq!(state.select_method(TopupMethod::Fiat), None);
        assert!(state.pending.is_some());
        assert_eq!(state.phase, PaymentPhase::FiatCheckout);

        state.fiat_checkout_created();
        assert!(state.pending.is_none());
    }

    #[test]
    fn error_keeps_balance() {
        let mut state = TopupState {
            balance: Some(3.0),
            ..TopupState::default()
        };
        state.require("s1", &required(0.5, 3.0), &TopupConfig::default());
        let notice = state.failed(None);
        assert_eq!(notice.text, "Payment failed");
        assert_eq!(notice.level, NoticeLevel::Error);
        assert_eq!(state.balance, Some(3.0));
        assert!(state.pending.is_none());
    }

    #[test]
    fn cancel_reports_reason_and_is_safe_when_idle() {
        let mut state = TopupState::default();
        assert_eq!(state.cancel(None), DEFAULT_CANCEL_REASON);

        state.require("s1", &required(0.5, 0.1), &TopupConfig::default());
        assert_eq!(state.cancel(Some("user declined")), "user declined");
        assert!(state.pending.is_none());
    }

    #[test]
    fn payment_required_notices_once() {
        let mut state = TopupState::default();
        let first = state.payment_required(Some(1.5)).unwrap();
        assert_eq!(first.text, "Payment required: $1.50");
        assert_eq!(state.payment_required(Some(1.5)), None);
        assert_eq!(state.phase, PaymentPhase::Processing);
    }
}
