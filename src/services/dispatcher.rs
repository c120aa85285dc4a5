// src/services/dispatcher.rs

use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::{
    common::{error::AppError, phone::normalize_phone},
    db::stores::{ChatStore, LeadStore},
    models::chat::{ChatDirection, ChatMessage, MessageKind, NewChatMessage},
    services::{
        graph_client::GraphClient,
        live_hub::LiveHub,
        token_manager::{with_token_retry, TokenStore},
    },
};

/// Conteúdo de uma mensagem de saída.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    Text {
        body: String,
    },
    Image {
        link: String,
        caption: Option<String>,
    },
    Document {
        link: String,
        caption: Option<String>,
        filename: Option<String>,
    },
    Template {
        name: String,
        language: String,
        components: Option<Value>,
    },
}

impl OutboundMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            OutboundMessage::Text { .. } => MessageKind::Text,
            OutboundMessage::Image { .. } => MessageKind::Image,
            OutboundMessage::Document { .. } => MessageKind::Document,
            OutboundMessage::Template { .. } => MessageKind::Template,
        }
    }

    /// Texto que vai para `chats.content`: corpo, link da mídia ou nome do template.
    fn content(&self) -> &str {
        match self {
            OutboundMessage::Text { body } => body,
            OutboundMessage::Image { link, .. } | OutboundMessage::Document { link, .. } => link,
            OutboundMessage::Template { name, .. } => name,
        }
    }

    fn caption(&self) -> Option<String> {
        match self {
            OutboundMessage::Image { caption, .. } | OutboundMessage::Document { caption, .. } => {
                caption.clone()
            }
            _ => None,
        }
    }

    fn filename(&self) -> Option<String> {
        match self {
            OutboundMessage::Document { filename, .. } => filename.clone(),
            _ => None,
        }
    }

    /// Corpo do POST /{phone_number_id}/messages.
    pub fn payload(&self, to: &str) -> Value {
        let mut payload = json!({
            "messaging_product": "whatsapp",
            "recipient_type": "individual",
            "to": to,
        });

        let (kind, body) = match self {
            OutboundMessage::Text { body } => ("text", json!({ "preview_url": false, "body": body })),
            OutboundMessage::Image { link, caption } => {
                let mut image = json!({ "link": link });
                if let Some(c) = caption {
                    image["caption"] = json!(c);
                }
                ("image", image)
            }
            OutboundMessage::Document { link, caption, filename } => {
                let mut document = json!({ "link": link });
                if let Some(c) = caption {
                    document["caption"] = json!(c);
                }
                if let Some(f) = filename {
                    document["filename"] = json!(f);
                }
                ("document", document)
            }
            OutboundMessage::Template { name, language, components } => {
                let mut template = json!({ "name": name, "language": { "code": language } });
                if let Some(c) = components {
                    template["components"] = c.clone();
                }
                ("template", template)
            }
        };

        payload["type"] = json!(kind);
        payload[kind] = body;
        payload
    }
}

#[derive(Clone)]
pub struct MessageDispatcher {
    leads: Arc<dyn LeadStore>,
    chats: Arc<dyn ChatStore>,
    graph: Arc<GraphClient>,
    tokens: Arc<dyn TokenStore>,
    hub: LiveHub,
    default_country_code: String,
}

impl MessageDispatcher {
    pub fn new(
        leads: Arc<dyn LeadStore>,
        chats: Arc<dyn ChatStore>,
        graph: Arc<GraphClient>,
        tokens: Arc<dyn TokenStore>,
        hub: LiveHub,
        default_country_code: String,
    ) -> Self {
        Self { leads, chats, graph, tokens, hub, default_country_code }
    }

    /// Envia pelo número da empresa vinculado ao lead e registra o chat de saída.
    /// Não verifica a janela de 24h: isso é responsabilidade de quem chama.
    pub async fn send(
        &self,
        lead_id: Uuid,
        to: &str,
        message: OutboundMessage,
    ) -> Result<ChatMessage, AppError> {
        let lead = self
            .leads
            .find_lead(lead_id)
            .await?
            .ok_or(AppError::LeadNotFound)?;

        let wa_number_id = lead
            .whatsapp_number_id
            .ok_or(AppError::LeadWithoutWhatsappNumber)?;

        let to = normalize_phone(to, &self.default_country_code)
            .ok_or_else(|| AppError::InvalidPhoneNumber(to.to_string()))?;

        let payload = message.payload(&to);

        let tokens = self.tokens.as_ref();
        let graph = self.graph.as_ref();
        let phone_number_id = wa_number_id.as_str();
        let body = &payload;

        let provider_id = with_token_retry(tokens, || async move {
            let token = tokens.get_user_token()?;
            let proof = tokens.app_secret_proof(&token)?;
            graph
                .send_message(phone_number_id, &token, &proof, body)
                .await
                .map_err(AppError::from)
        })
        .await?;

        let chat = self
            .chats
            .insert_chat(NewChatMessage {
                lead_id,
                direction: ChatDirection::Outbound,
                from_number: wa_number_id.clone(),
                to_number: Some(to.clone()),
                wa_number_id: Some(wa_number_id.clone()),
                kind: message.kind(),
                content: message.content().to_string(),
                caption: message.caption(),
                media_id: None,
                filename: message.filename(),
                wa_message_id: provider_id,
                raw: Some(payload),
                timestamp: Utc::now(),
            })
            .await?;

        info!("📤 Mensagem {:?} enviada para o lead {} ({})", chat.kind, lead_id, to);

        self.hub.publish(&chat);
        Ok(chat)
    }
}
