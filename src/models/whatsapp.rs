// src/models/whatsapp.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

// Número da empresa usado para enviar mensagens (dado de referência)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WhatsappNumber {
    #[schema(example = "1001")]
    pub phone_number_id: String,
    #[schema(example = "+91 22 5555 0100")]
    pub display_number: String,
    pub label: String,
    pub business_account_id: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSummary {
    pub name: String,
    pub language: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncNumbersResult {
    pub inserted: usize,
    pub already_known: usize,
}

// Envio pela tela do lead: mensagem livre (texto/mídia) ou template
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendWhatsappPayload {
    // Default: contact_number do lead
    pub to: Option<String>,
    #[validate(length(max = 4096, message = "Mensagem muito longa."))]
    pub body: Option<String>,
    #[schema(example = "image")]
    pub media_type: Option<String>,
    #[validate(url(message = "URL de mídia inválida."))]
    pub media_url: Option<String>,
    pub caption: Option<String>,
    pub filename: Option<String>,
    // Aceita "nome||idioma"
    #[schema(example = "welcome||en_US")]
    pub template_name: Option<String>,
    pub language_code: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub components: Option<Value>,
}

// =============================================================================
//  PAYLOADS DOS WEBHOOKS
// =============================================================================

/// Query do GET de verificação (`hub.mode`, `hub.verify_token`, `hub.challenge`).
#[derive(Debug, Default, Deserialize)]
pub struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// Envelope comum aos dois webhooks (`object` + `entry[].changes[]`).
#[derive(Debug, Deserialize)]
pub struct WebhookEnvelope<V> {
    #[serde(default)]
    pub object: String,
    #[serde(default = "Vec::new")]
    pub entry: Vec<WebhookEntry<V>>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEntry<V> {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default = "Vec::new")]
    pub changes: Vec<WebhookChange<V>>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookChange<V> {
    #[serde(default)]
    pub field: String,
    pub value: Option<V>,
}

// --- WhatsApp Business ---

pub type WhatsappWebhook = WebhookEnvelope<WhatsappChangeValue>;

#[derive(Debug, Default, Deserialize)]
pub struct WhatsappChangeValue {
    #[serde(default)]
    pub metadata: Option<WhatsappMetadata>,
    #[serde(default)]
    pub messages: Vec<InboundMessage>,
    #[serde(default)]
    pub statuses: Vec<MessageStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WhatsappMetadata {
    #[serde(default)]
    pub phone_number_id: Option<String>,
    #[serde(default)]
    pub display_phone_number: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InboundMessage {
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub id: Option<String>,
    // Unix timestamp em segundos, como string
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<TextBody>,
    #[serde(default)]
    pub image: Option<MediaBody>,
    #[serde(default)]
    pub document: Option<MediaBody>,
    #[serde(default)]
    pub audio: Option<MediaBody>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TextBody {
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MediaBody {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

// delivered, read, failed...
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MessageStatus {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub recipient_id: Option<String>,
}

// --- Lead Ads (Meta) ---

pub type MetaLeadWebhook = WebhookEnvelope<LeadgenChangeValue>;

#[derive(Debug, Default, Deserialize)]
pub struct LeadgenChangeValue {
    #[serde(default)]
    pub leadgen_id: Option<String>,
    #[serde(default)]
    pub page_id: Option<String>,
    #[serde(default)]
    pub form_id: Option<String>,
}

// Resposta do GET /{leadgen_id}
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LeadgenData {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub created_time: Option<String>,
    #[serde(default)]
    pub field_data: Vec<LeadgenField>,
    // Guardamos o resto do payload no source_meta do lead
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LeadgenField {
    pub name: String,
    #[serde(default)]
    pub values: Vec<String>,
}

impl LeadgenData {
    /// Primeiro valor do campo do formulário com esse nome.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.field_data
            .iter()
            .find(|f| f.name == name)
            .and_then(|f| f.values.first())
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }
}
