// src/handlers/webhooks.rs

// Webhooks públicos da Meta. O POST sempre responde 200: a Meta reenviaria
// o lote inteiro a cada erro nosso.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::de::DeserializeOwned;
use tracing::{error, info, warn};

use crate::{
    config::AppState,
    models::whatsapp::{MetaLeadWebhook, VerifyQuery, WhatsappWebhook},
    services::webhook_service::{verify_signature, verify_subscription, WebhookService},
};

const SIGNATURE_HEADER: &str = "x-hub-signature-256";

fn verification_response(verify_token: Option<&str>, query: &VerifyQuery) -> Response {
    match verify_subscription(query, verify_token) {
        Some(challenge) => {
            info!("✅ Webhook verificado pela Meta");
            (StatusCode::OK, challenge).into_response()
        }
        None => {
            warn!("⛔ Verificação de webhook recusada");
            StatusCode::FORBIDDEN.into_response()
        }
    }
}

/// Confere a assinatura (quando há app secret) e desserializa o corpo.
fn authentic_payload<T: DeserializeOwned>(app_secret: Option<&str>, headers: &HeaderMap, body: &[u8]) -> Option<T> {
    if let Some(secret) = app_secret {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !verify_signature(body, signature, secret) {
            warn!("⛔ Assinatura do webhook inválida, lote ignorado");
            return None;
        }
    }

    match serde_json::from_slice::<T>(body) {
        Ok(payload) => Some(payload),
        Err(e) => {
            error!("🔥 Corpo de webhook inválido: {}", e);
            None
        }
    }
}

async fn accept_whatsapp(
    service: &WebhookService,
    app_secret: Option<&str>,
    headers: &HeaderMap,
    body: &[u8],
) -> StatusCode {
    if let Some(payload) = authentic_payload::<WhatsappWebhook>(app_secret, headers, body) {
        let report = service.process_whatsapp(payload).await;
        info!("📥 Webhook WhatsApp processado: {:?}", report);
    }
    StatusCode::OK
}

async fn accept_meta(
    service: &WebhookService,
    app_secret: Option<&str>,
    headers: &HeaderMap,
    body: &[u8],
) -> StatusCode {
    if let Some(payload) = authentic_payload::<MetaLeadWebhook>(app_secret, headers, body) {
        let report = service.process_meta(payload).await;
        info!("📥 Webhook Meta processado: {:?}", report);
    }
    StatusCode::OK
}

// GET /webhooks/meta
pub async fn verify_meta(State(app_state): State<AppState>, Query(query): Query<VerifyQuery>) -> Response {
    verification_response(app_state.config.meta.verify_token.as_deref(), &query)
}

// GET /webhooks/whatsapp
pub async fn verify_whatsapp(State(app_state): State<AppState>, Query(query): Query<VerifyQuery>) -> Response {
    verification_response(app_state.config.meta.verify_token.as_deref(), &query)
}

// POST /webhooks/meta
pub async fn receive_meta(State(app_state): State<AppState>, headers: HeaderMap, body: Bytes) -> StatusCode {
    accept_meta(
        &app_state.webhook_service,
        app_state.config.meta.app_secret.as_deref(),
        &headers,
        &body,
    )
    .await
}

// POST /webhooks/whatsapp
pub async fn receive_whatsapp(State(app_state): State<AppState>, headers: HeaderMap, body: Bytes) -> StatusCode {
    accept_whatsapp(
        &app_state.webhook_service,
        app_state.config.meta.app_secret.as_deref(),
        &headers,
        &body,
    )
    .await
}
