// src/handlers/whatsapp.rs

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, Query, State, WebSocketUpgrade,
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::auth::{bearer_token, AdminUser, AuthenticatedUser},
    models::{
        chat::ChatMessage,
        whatsapp::{SendWhatsappPayload, SyncNumbersResult, TemplateSummary, WhatsappNumber},
    },
};

// POST /api/leads/{id}/whatsapp/send
#[utoipa::path(
    post,
    path = "/api/leads/{id}/whatsapp/send",
    tag = "WhatsApp",
    params(("id" = Uuid, Path, description = "ID do lead")),
    request_body = SendWhatsappPayload,
    responses(
        (status = 201, description = "Mensagem enviada e registrada", body = ChatMessage),
        (status = 400, description = "Sessão expirada sem template"),
        (status = 422, description = "Lead sem número da empresa vinculado"),
        (status = 502, description = "Rejeitado pelo WhatsApp")
    ),
    security(("api_jwt" = []))
)]
pub async fn send_message(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<SendWhatsappPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    app_state.lead_service.editable_lead(id, &user).await?;

    let chat = app_state.whatsapp_service.send_from_ui(id, &payload).await?;
    Ok((StatusCode::CREATED, Json(chat)))
}

// GET /api/whatsapp/numbers
#[utoipa::path(
    get,
    path = "/api/whatsapp/numbers",
    tag = "WhatsApp",
    responses((status = 200, description = "Números ativos da empresa", body = Vec<WhatsappNumber>)),
    security(("api_jwt" = []))
)]
pub async fn list_numbers(
    State(app_state): State<AppState>,
    _user: AuthenticatedUser,
) -> Result<Json<Vec<WhatsappNumber>>, AppError> {
    Ok(Json(app_state.whatsapp_service.list_numbers().await?))
}

// POST /api/whatsapp/numbers/sync
#[utoipa::path(
    post,
    path = "/api/whatsapp/numbers/sync",
    tag = "WhatsApp",
    responses(
        (status = 200, description = "Números sincronizados com a WABA", body = SyncNumbersResult),
        (status = 403, description = "Apenas admins")
    ),
    security(("api_jwt" = []))
)]
pub async fn sync_numbers(
    State(app_state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<SyncNumbersResult>, AppError> {
    Ok(Json(app_state.whatsapp_service.sync_numbers().await?))
}

// GET /api/whatsapp/templates
#[utoipa::path(
    get,
    path = "/api/whatsapp/templates",
    tag = "WhatsApp",
    responses((status = 200, description = "Templates aprovados (nome + idioma)", body = Vec<TemplateSummary>)),
    security(("api_jwt" = []))
)]
pub async fn list_templates(
    State(app_state): State<AppState>,
    _user: AuthenticatedUser,
) -> Result<Json<Vec<TemplateSummary>>, AppError> {
    Ok(Json(app_state.whatsapp_service.list_templates().await?))
}

// =============================================================================
//  CHAT AO VIVO (WebSocket)
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct LiveQuery {
    // Navegadores não mandam headers no upgrade: o token pode vir na query
    pub token: Option<String>,
}

// GET /api/leads/{id}/live
pub async fn live_chat(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<LiveQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Result<Response, AppError> {
    let token = bearer_token(&headers)
        .map(str::to_string)
        .or(query.token)
        .ok_or(AppError::InvalidToken)?;
    let user = app_state.auth_service.validate_token(&token).await?;
    app_state.lead_service.editable_lead(id, &user).await?;

    Ok(ws.on_upgrade(move |socket| handle_live_socket(socket, app_state, id)))
}

async fn handle_live_socket(socket: WebSocket, app_state: AppState, lead_id: Uuid) {
    let mut updates = app_state.live_hub.subscribe(lead_id);
    let (mut ws_sender, mut ws_receiver) = socket.split();

    debug!("🔌 Cliente conectado ao chat do lead {}", lead_id);

    let send_task = tokio::spawn(async move {
        loop {
            let chat = match updates.recv().await {
                Ok(chat) => chat,
                // Cliente lento: perde mensagens, mas continua conectado
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Chat ao vivo do lead {} perdeu {} mensagens", lead_id, skipped);
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            let Ok(payload) = serde_json::to_string(&chat) else {
                continue;
            };
            if ws_sender.send(Message::Text(payload.into())).await.is_err() {
                break;
            }
        }
    });

    // O cliente só escuta; lemos até ele fechar
    while let Some(Ok(message)) = ws_receiver.next().await {
        if let Message::Close(_) = message {
            break;
        }
    }

    send_task.abort();
    // Espera o receiver ser dropado antes de liberar o canal
    let _ = send_task.await;
    app_state.live_hub.release(lead_id);
    debug!("🔌 Cliente desconectado do chat do lead {}", lead_id);
}
