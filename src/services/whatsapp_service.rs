// src/services/whatsapp_service.rs

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{stores::LeadStore, WhatsappNumberRepository},
    models::{
        chat::ChatMessage,
        lead::Lead,
        whatsapp::{SendWhatsappPayload, SyncNumbersResult, TemplateSummary, WhatsappNumber},
    },
    services::{
        dispatcher::{MessageDispatcher, OutboundMessage},
        graph_client::GraphClient,
        session_window::can_send_freeform,
        token_manager::{with_token_retry, TokenStore},
    },
};

pub const DEFAULT_TEMPLATE_LANGUAGE: &str = "en_US";

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Mensagem livre contida no payload (texto ou mídia), se houver.
/// Mídia só pode ser `image` (padrão) ou `document`.
fn freeform_message(payload: &SendWhatsappPayload) -> Result<Option<OutboundMessage>, AppError> {
    if let Some(link) = non_empty(&payload.media_url) {
        let caption = non_empty(&payload.caption).map(str::to_string);
        return match non_empty(&payload.media_type) {
            Some("image") | None => Ok(Some(OutboundMessage::Image { link: link.to_string(), caption })),
            Some("document") => Ok(Some(OutboundMessage::Document {
                link: link.to_string(),
                caption,
                filename: non_empty(&payload.filename).map(str::to_string),
            })),
            Some(other) => Err(AppError::BadRequest(format!(
                "mediaType '{}' não suportado com mediaUrl (use image ou document).",
                other
            ))),
        };
    }
    Ok(non_empty(&payload.body).map(|body| OutboundMessage::Text { body: body.to_string() }))
}

/// Template do payload. `templateName` pode vir como "nome||idioma".
fn template_message(payload: &SendWhatsappPayload) -> Option<OutboundMessage> {
    let raw = non_empty(&payload.template_name)?;
    let (name, inline_language) = match raw.split_once("||") {
        Some((name, lang)) => (name.trim(), Some(lang.trim()).filter(|l| !l.is_empty())),
        None => (raw, None),
    };
    if name.is_empty() {
        return None;
    }

    let language = inline_language
        .or_else(|| non_empty(&payload.language_code))
        .unwrap_or(DEFAULT_TEMPLATE_LANGUAGE)
        .to_string();

    Some(OutboundMessage::Template {
        name: name.to_string(),
        language,
        components: payload.components.clone(),
    })
}

/// Decide entre mensagem livre e template conforme a janela de 24h.
pub fn resolve_outbound(
    lead: &Lead,
    payload: &SendWhatsappPayload,
    now: DateTime<Utc>,
) -> Result<OutboundMessage, AppError> {
    let freeform = freeform_message(payload)?;
    if can_send_freeform(lead, now) {
        if let Some(message) = freeform {
            return Ok(message);
        }
    }
    template_message(payload).ok_or(AppError::TemplateRequired)
}

#[derive(Clone)]
pub struct WhatsappService {
    leads: Arc<dyn LeadStore>,
    dispatcher: MessageDispatcher,
    numbers: WhatsappNumberRepository,
    graph: Arc<GraphClient>,
    tokens: Arc<dyn TokenStore>,
    waba_id: Option<String>,
}

impl WhatsappService {
    pub fn new(
        leads: Arc<dyn LeadStore>,
        dispatcher: MessageDispatcher,
        numbers: WhatsappNumberRepository,
        graph: Arc<GraphClient>,
        tokens: Arc<dyn TokenStore>,
        waba_id: Option<String>,
    ) -> Self {
        Self { leads, dispatcher, numbers, graph, tokens, waba_id }
    }

    // =========================================================================
    //  ENVIO PELA TELA DO LEAD
    // =========================================================================

    pub async fn send_from_ui(
        &self,
        lead_id: Uuid,
        payload: &SendWhatsappPayload,
    ) -> Result<ChatMessage, AppError> {
        let lead = self
            .leads
            .find_lead(lead_id)
            .await?
            .ok_or(AppError::LeadNotFound)?;

        let message = resolve_outbound(&lead, payload, Utc::now())?;
        if matches!(message, OutboundMessage::Template { .. }) && !can_send_freeform(&lead, Utc::now()) {
            info!("⏳ Sessão de 24h fechada para o lead {}, enviando template", lead_id);
        }

        let to = non_empty(&payload.to)
            .map(str::to_string)
            .unwrap_or_else(|| lead.contact_number.clone());

        self.dispatcher.send(lead_id, &to, message).await
    }

    // =========================================================================
    //  NÚMEROS DA EMPRESA E TEMPLATES
    // =========================================================================

    fn waba_id(&self) -> Result<&str, AppError> {
        self.waba_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or(AppError::MissingMetaConfig("META_WABA_ID"))
    }

    pub async fn list_numbers(&self) -> Result<Vec<WhatsappNumber>, AppError> {
        self.numbers.list_active().await
    }

    /// Puxa os números da WABA e cadastra os que ainda não conhecemos.
    pub async fn sync_numbers(&self) -> Result<SyncNumbersResult, AppError> {
        let waba_id = self.waba_id()?;
        let tokens = self.tokens.as_ref();
        let graph = self.graph.as_ref();

        let remote = with_token_retry(tokens, || async move {
            let token = tokens.get_user_token()?;
            let proof = tokens.app_secret_proof(&token)?;
            graph
                .list_phone_numbers(waba_id, &token, &proof)
                .await
                .map_err(AppError::from)
        })
        .await?;

        let mut result = SyncNumbersResult { inserted: 0, already_known: 0 };
        for number in remote {
            let label = number.verified_name.clone().unwrap_or_default();
            if self
                .numbers
                .insert_if_missing(&number.id, &number.display_phone_number, &label, waba_id)
                .await?
            {
                info!("📱 Número do WhatsApp cadastrado: {} ({})", number.display_phone_number, number.id);
                result.inserted += 1;
            } else {
                result.already_known += 1;
            }
        }

        Ok(result)
    }

    pub async fn list_templates(&self) -> Result<Vec<TemplateSummary>, AppError> {
        let waba_id = self.waba_id()?;
        let tokens = self.tokens.as_ref();
        let graph = self.graph.as_ref();

        with_token_retry(tokens, || async move {
            let token = tokens.get_user_token()?;
            let proof = tokens.app_secret_proof(&token)?;
            graph
                .list_templates(waba_id, &token, &proof)
                .await
                .map_err(AppError::from)
        })
        .await
    }

    /// Vincula um número da empresa ao lead (precisa existir e estar ativo).
    pub async fn ensure_active_number(&self, phone_number_id: &str) -> Result<(), AppError> {
        match self.numbers.find(phone_number_id).await? {
            Some(number) if number.is_active => Ok(()),
            Some(_) => {
                warn!("Número {} está inativo", phone_number_id);
                Err(AppError::BadRequest(format!("Número {} está inativo.", phone_number_id)))
            }
            None => Err(AppError::NotFound("Número do WhatsApp".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::test_support::{sample_lead, test_graph, MemoryStore},
        services::live_hub::LiveHub,
    };
    use chrono::Duration;
    use mockito::Matcher;
    use serde_json::json;
    use sqlx::postgres::PgPoolOptions;

    fn lead_with_inbound(at: Option<DateTime<Utc>>) -> Lead {
        let mut lead = sample_lead("+919876543210");
        lead.whatsapp_number_id = Some("1001".into());
        lead.has_replied = at.is_some();
        lead.last_inbound_at = at;
        lead
    }

    fn text_payload(body: &str) -> SendWhatsappPayload {
        SendWhatsappPayload { body: Some(body.into()), ..Default::default() }
    }

    fn service(base_url: &str, store: &Arc<MemoryStore>) -> WhatsappService {
        let (graph, tokens) = test_graph(base_url, None);
        let dispatcher = MessageDispatcher::new(
            store.clone(),
            store.clone(),
            graph.clone(),
            tokens.clone(),
            LiveHub::new(),
            "91".into(),
        );
        // Pool preguiçoso: estes testes nunca tocam o banco
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        WhatsappService::new(
            store.clone(),
            dispatcher,
            WhatsappNumberRepository::new(pool),
            graph,
            tokens,
            Some("waba-1".into()),
        )
    }

    #[test]
    fn freeform_inside_window() {
        let now = Utc::now();
        let lead = lead_with_inbound(Some(now - Duration::hours(1)));
        let message = resolve_outbound(&lead, &text_payload("hello"), now).unwrap();
        assert_eq!(message, OutboundMessage::Text { body: "hello".into() });
    }

    #[test]
    fn expired_window_without_template_is_rejected() {
        let now = Utc::now();
        let lead = lead_with_inbound(Some(now - Duration::hours(25)));
        assert!(matches!(
            resolve_outbound(&lead, &text_payload("hello"), now),
            Err(AppError::TemplateRequired)
        ));
    }

    #[test]
    fn never_replied_lead_needs_a_template() {
        let lead = lead_with_inbound(None);
        assert!(matches!(
            resolve_outbound(&lead, &text_payload("hello"), Utc::now()),
            Err(AppError::TemplateRequired)
        ));
    }

    #[test]
    fn template_name_may_carry_language() {
        let lead = lead_with_inbound(None);
        let payload = SendWhatsappPayload {
            template_name: Some("welcome||hi".into()),
            language_code: Some("en_GB".into()),
            ..Default::default()
        };
        match resolve_outbound(&lead, &payload, Utc::now()).unwrap() {
            OutboundMessage::Template { name, language, .. } => {
                assert_eq!(name, "welcome");
                assert_eq!(language, "hi");
            }
            other => panic!("esperava template, veio {:?}", other),
        }
    }

    #[test]
    fn template_language_defaults_to_en_us() {
        let payload = SendWhatsappPayload { template_name: Some("welcome".into()), ..Default::default() };
        match template_message(&payload) {
            Some(OutboundMessage::Template { language, .. }) => assert_eq!(language, DEFAULT_TEMPLATE_LANGUAGE),
            other => panic!("esperava template, veio {:?}", other),
        }
    }

    #[test]
    fn media_url_takes_precedence_over_body() {
        let payload = SendWhatsappPayload {
            body: Some("ignored".into()),
            media_type: Some("document".into()),
            media_url: Some("https://cdn.example.com/catalog.pdf".into()),
            filename: Some("catalog.pdf".into()),
            ..Default::default()
        };
        assert!(matches!(
            freeform_message(&payload),
            Ok(Some(OutboundMessage::Document { filename: Some(_), .. }))
        ));
    }

    #[test]
    fn media_without_type_is_an_image() {
        let payload = SendWhatsappPayload {
            media_url: Some("https://cdn.example.com/chair.jpg".into()),
            caption: Some("Mesh back".into()),
            ..Default::default()
        };
        assert_eq!(
            freeform_message(&payload).unwrap(),
            Some(OutboundMessage::Image {
                link: "https://cdn.example.com/chair.jpg".into(),
                caption: Some("Mesh back".into()),
            })
        );
    }

    #[test]
    fn unsupported_media_type_is_rejected() {
        let now = Utc::now();
        let lead = lead_with_inbound(Some(now - Duration::hours(1)));
        for media_type in ["video", "audio", "text", "imgae"] {
            let payload = SendWhatsappPayload {
                media_type: Some(media_type.into()),
                media_url: Some("https://cdn.example.com/demo.mp4".into()),
                ..Default::default()
            };
            assert!(
                matches!(resolve_outbound(&lead, &payload, now), Err(AppError::BadRequest(_))),
                "mediaType {} deveria ser recusado",
                media_type
            );
        }
    }

    #[tokio::test]
    async fn expired_session_blocks_freeform_send_without_calling_provider() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("POST", Matcher::Any).expect(0).create_async().await;

        let store = Arc::new(MemoryStore::new());
        let lead_id = store.seed_lead(lead_with_inbound(Some(Utc::now() - Duration::hours(25))));

        let err = service(&server.url(), &store)
            .send_from_ui(lead_id, &text_payload("hello"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::TemplateRequired));
        assert!(store.chats_for(lead_id).is_empty());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn expired_session_with_template_sends_template() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/1001/messages")
            .match_query(Matcher::Any)
            .match_body(Matcher::PartialJson(json!({
                "type": "template",
                "template": {"name": "followup", "language": {"code": "en_US"}}
            })))
            .with_status(200)
            .with_body(json!({"messages": [{"id": "wamid.t"}]}).to_string())
            .create_async()
            .await;

        let store = Arc::new(MemoryStore::new());
        let lead_id = store.seed_lead(lead_with_inbound(Some(Utc::now() - Duration::hours(25))));
        let payload = SendWhatsappPayload {
            body: Some("hello".into()),
            template_name: Some("followup||en_US".into()),
            ..Default::default()
        };

        let chat = service(&server.url(), &store).send_from_ui(lead_id, &payload).await.unwrap();

        assert_eq!(chat.content, "followup");
        assert_eq!(chat.to_number.as_deref(), Some("+919876543210"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn templates_require_waba_id() {
        let server = mockito::Server::new_async().await;
        let store = Arc::new(MemoryStore::new());
        let mut svc = service(&server.url(), &store);
        svc.waba_id = None;

        assert!(matches!(
            svc.list_templates().await,
            Err(AppError::MissingMetaConfig("META_WABA_ID"))
        ));
    }
}
