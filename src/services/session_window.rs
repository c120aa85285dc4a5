// src/services/session_window.rs

// Janela de atendimento de 24h do WhatsApp: depois da última mensagem do
// cliente, só dentro dela é permitido enviar mensagem livre (não-template).

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::models::lead::Lead;

pub const SESSION_WINDOW_SECONDS: i64 = 24 * 60 * 60;

pub fn is_within_window(last_inbound_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    let Some(t) = last_inbound_at else {
        return false;
    };
    let elapsed = now - t;
    // Timestamp no futuro (relógio do provedor adiantado) não abre a janela
    elapsed >= Duration::zero() && elapsed < Duration::seconds(SESSION_WINDOW_SECONDS)
}

pub fn can_send_freeform(lead: &Lead, now: DateTime<Utc>) -> bool {
    lead.has_replied && is_within_window(lead.last_inbound_at, now)
}

pub fn remaining_window_seconds(lead: &Lead, now: DateTime<Utc>) -> i64 {
    match lead.last_inbound_at {
        Some(t) if can_send_freeform(lead, now) => {
            (SESSION_WINDOW_SECONDS - (now - t).num_seconds()).max(0)
        }
        _ => 0,
    }
}

#[derive(Debug, Clone, Serialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub within_window: bool,
    pub can_send_freeform: bool,
    pub remaining_seconds: i64,
}

impl SessionState {
    pub fn evaluate(lead: &Lead, now: DateTime<Utc>) -> Self {
        Self {
            within_window: is_within_window(lead.last_inbound_at, now),
            can_send_freeform: can_send_freeform(lead, now),
            remaining_seconds: remaining_window_seconds(lead, now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::sample_lead;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap()
    }

    fn replied_lead(at: DateTime<Utc>) -> Lead {
        let mut lead = sample_lead("+919876543210");
        lead.has_replied = true;
        lead.last_inbound_at = Some(at);
        lead
    }

    #[test]
    fn absent_timestamp_is_outside() {
        assert!(!is_within_window(None, t0()));
    }

    #[test]
    fn window_is_half_open() {
        let t = t0();
        assert!(is_within_window(Some(t), t));
        assert!(is_within_window(Some(t), t + Duration::seconds(SESSION_WINDOW_SECONDS - 1)));
        assert!(!is_within_window(Some(t), t + Duration::hours(24)));
        assert!(!is_within_window(Some(t), t + Duration::hours(25)));
    }

    #[test]
    fn future_timestamp_is_outside() {
        let t = t0();
        assert!(!is_within_window(Some(t + Duration::minutes(5)), t));
    }

    #[test]
    fn freeform_requires_reply() {
        let now = t0();
        let mut lead = replied_lead(now - Duration::hours(1));
        assert!(can_send_freeform(&lead, now));

        lead.has_replied = false;
        assert!(!can_send_freeform(&lead, now));
        assert_eq!(remaining_window_seconds(&lead, now), 0);
    }

    #[test]
    fn remaining_seconds_counts_down() {
        let now = t0();
        let lead = replied_lead(now - Duration::hours(1));
        assert_eq!(remaining_window_seconds(&lead, now), SESSION_WINDOW_SECONDS - 3600);

        let expired = replied_lead(now - Duration::hours(25));
        assert_eq!(remaining_window_seconds(&expired, now), 0);
        assert_eq!(
            SessionState::evaluate(&expired, now),
            SessionState { within_window: false, can_send_freeform: false, remaining_seconds: 0 }
        );
    }
}
