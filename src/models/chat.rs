// src/models/chat.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "chat_direction", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ChatDirection {
    Inbound,
    Outbound,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "message_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    Document,
    Audio,
    Template,
    // video, sticker, location, interactive...
    Other,
}

impl MessageKind {
    // Tipo que chega no webhook ("text", "image", ...)
    pub fn from_wire(kind: &str) -> Self {
        match kind {
            "text" => MessageKind::Text,
            "image" => MessageKind::Image,
            "document" => MessageKind::Document,
            "audio" => MessageKind::Audio,
            "template" => MessageKind::Template,
            _ => MessageKind::Other,
        }
    }
}

// Um evento de mensagem (entrada ou saída) ligado a um Lead.
// Imutável depois de criado; só o status de entrega é atualizado.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub direction: ChatDirection,

    pub from_number: String,
    pub to_number: Option<String>,
    // phone_number_id do número da empresa
    pub wa_number_id: Option<String>,

    pub kind: MessageKind,
    // Corpo do texto, link da mídia ou nome do template
    pub content: String,
    pub caption: Option<String>,
    pub media_id: Option<String>,
    pub filename: Option<String>,

    // ID atribuído pelo WhatsApp (wamid...)
    pub wa_message_id: Option<String>,
    pub delivery_status: Option<String>,
    pub status_at: Option<DateTime<Utc>>,

    #[schema(value_type = Option<Object>)]
    pub raw: Option<Value>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewChatMessage {
    pub lead_id: Uuid,
    pub direction: ChatDirection,
    pub from_number: String,
    pub to_number: Option<String>,
    pub wa_number_id: Option<String>,
    pub kind: MessageKind,
    pub content: String,
    pub caption: Option<String>,
    pub media_id: Option<String>,
    pub filename: Option<String>,
    pub wa_message_id: Option<String>,
    pub raw: Option<Value>,
    pub timestamp: DateTime<Utc>,
}
