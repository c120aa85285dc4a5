// src/services/webhook_service.rs

// Ingestão dos webhooks da Meta (Lead Ads) e do WhatsApp Business.
// Erros de um evento são logados e não interrompem o lote.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use tracing::{debug, error, info, warn};

use crate::{
    common::error::AppError,
    db::stores::{ChatStore, LeadStore},
    models::{
        chat::{ChatDirection, MessageKind, NewChatMessage},
        lead::{LeadSource, NewLead, STATUS_NEW},
        whatsapp::{
            InboundMessage, LeadgenData, MessageStatus, MetaLeadWebhook, VerifyQuery,
            WhatsappWebhook,
        },
    },
    services::{
        graph_client::GraphClient,
        lead_matcher::{canonical_sender, LeadMatcher},
        live_hub::LiveHub,
        token_manager::{with_token_retry, TokenStore},
    },
};

type HmacSha256 = Hmac<Sha256>;

pub const WHATSAPP_OBJECT: &str = "whatsapp_business_account";
pub const PAGE_OBJECT: &str = "page";
pub const LEADGEN_FIELD: &str = "leadgen";

const META_DEFAULT_NAME: &str = "Unknown";
const META_DEFAULT_REQUIREMENT: &str = "Meta Lead";

// =============================================================================
//  VERIFICAÇÃO (GET) E ASSINATURA (POST)
// =============================================================================

/// Devolve o `hub.challenge` quando a assinatura do webhook é válida.
pub fn verify_subscription(query: &VerifyQuery, expected_token: Option<&str>) -> Option<String> {
    let expected = expected_token.filter(|t| !t.is_empty())?;
    match (query.mode.as_deref(), query.verify_token.as_deref()) {
        (Some("subscribe"), Some(token)) if token == expected => {
            Some(query.challenge.clone().unwrap_or_default())
        }
        _ => None,
    }
}

/// Confere o header `X-Hub-Signature-256` (`sha256=<hex>`) do corpo cru.
pub fn verify_signature(body: &[u8], signature_header: &str, app_secret: &str) -> bool {
    let Some(expected) = signature_header.strip_prefix("sha256=") else {
        warn!("Header de assinatura sem o prefixo sha256=");
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(app_secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    let computed = hex::encode(mac.finalize().into_bytes());

    constant_time_eq(computed.as_bytes(), expected.as_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

// =============================================================================
//  RELATÓRIO DO LOTE
// =============================================================================

#[derive(Debug, Default, PartialEq)]
pub struct WebhookReport {
    pub messages_stored: usize,
    pub statuses_updated: usize,
    pub leads_created: usize,
    pub duplicates_skipped: usize,
    pub failures: usize,
}

// =============================================================================
//  SERVIÇO
// =============================================================================

#[derive(Clone)]
pub struct WebhookService {
    matcher: LeadMatcher,
    leads: Arc<dyn LeadStore>,
    chats: Arc<dyn ChatStore>,
    graph: Arc<GraphClient>,
    tokens: Arc<dyn TokenStore>,
    hub: LiveHub,
    default_country_code: String,
}

impl WebhookService {
    pub fn new(
        leads: Arc<dyn LeadStore>,
        chats: Arc<dyn ChatStore>,
        graph: Arc<GraphClient>,
        tokens: Arc<dyn TokenStore>,
        hub: LiveHub,
        default_country_code: String,
    ) -> Self {
        Self {
            matcher: LeadMatcher::new(leads.clone(), default_country_code.clone()),
            leads,
            chats,
            graph,
            tokens,
            hub,
            default_country_code,
        }
    }

    // --- WhatsApp Business ---

    pub async fn process_whatsapp(&self, payload: WhatsappWebhook) -> WebhookReport {
        let mut report = WebhookReport::default();

        if payload.object != WHATSAPP_OBJECT {
            debug!("Webhook do WhatsApp ignorado (object = '{}')", payload.object);
            return report;
        }

        for entry in payload.entry {
            for change in entry.changes {
                let Some(value) = change.value else { continue };

                let metadata = value.metadata.unwrap_or_default();
                let wa_number_id = metadata.phone_number_id.as_deref();
                let business_display = metadata.display_phone_number.as_deref();

                for message in &value.messages {
                    match self.handle_inbound(message, wa_number_id, business_display).await {
                        Ok(true) => report.messages_stored += 1,
                        Ok(false) => report.duplicates_skipped += 1,
                        Err(e) => {
                            report.failures += 1;
                            error!("❌ Falha ao processar mensagem recebida de {}: {}", message.from, e);
                        }
                    }
                }

                for status in &value.statuses {
                    match self.handle_status(status).await {
                        Ok(updated) => report.statuses_updated += updated as usize,
                        Err(e) => {
                            report.failures += 1;
                            error!("❌ Falha ao atualizar status da mensagem {}: {}", status.id, e);
                        }
                    }
                }
            }
        }

        report
    }

    async fn handle_inbound(
        &self,
        message: &InboundMessage,
        wa_number_id: Option<&str>,
        business_display: Option<&str>,
    ) -> Result<bool, AppError> {
        let lead_id = self
            .matcher
            .find_or_create_by_phone(&message.from, wa_number_id)
            .await?;

        let from_number = canonical_sender(&message.from, &self.default_country_code)
            .unwrap_or_else(|| message.from.clone());
        let timestamp = parse_unix_timestamp(message.timestamp.as_deref()).unwrap_or_else(Utc::now);

        let media = match message.kind.as_str() {
            "image" => message.image.as_ref(),
            "document" => message.document.as_ref(),
            "audio" => message.audio.as_ref(),
            _ => None,
        };

        let stored = self
            .chats
            .insert_inbound(NewChatMessage {
                lead_id,
                direction: ChatDirection::Inbound,
                from_number,
                to_number: business_display.map(str::to_string),
                wa_number_id: wa_number_id.map(str::to_string),
                kind: MessageKind::from_wire(&message.kind),
                content: inbound_content(message),
                caption: media.and_then(|m| m.caption.clone()),
                media_id: media.and_then(|m| m.id.clone()),
                filename: media.and_then(|m| m.filename.clone()),
                wa_message_id: message.id.clone(),
                raw: serde_json::to_value(message).ok(),
                timestamp,
            })
            .await?;

        let Some(chat) = stored else {
            info!("↩️ Mensagem {:?} já gravada, ignorando reentrega", message.id);
            return Ok(false);
        };
        self.hub.publish(&chat);

        info!("📥 Mensagem {} recebida para o lead {}", message.kind, lead_id);
        Ok(true)
    }

    async fn handle_status(&self, status: &MessageStatus) -> Result<u64, AppError> {
        if status.id.is_empty() || status.status.is_empty() {
            return Ok(0);
        }
        let at = parse_unix_timestamp(status.timestamp.as_deref()).unwrap_or_else(Utc::now);
        let updated = self
            .chats
            .update_delivery_status(&status.id, &status.status, at)
            .await?;
        if updated == 0 {
            debug!("Status '{}' para mensagem desconhecida {}", status.status, status.id);
        }
        Ok(updated)
    }

    // --- Lead Ads ---

    pub async fn process_meta(&self, payload: MetaLeadWebhook) -> WebhookReport {
        let mut report = WebhookReport::default();

        if payload.object != PAGE_OBJECT {
            debug!("Webhook da Meta ignorado (object = '{}')", payload.object);
            return report;
        }

        for entry in payload.entry {
            for change in entry.changes {
                if change.field != LEADGEN_FIELD {
                    continue;
                }
                let Some(leadgen_id) = change.value.and_then(|v| v.leadgen_id) else {
                    warn!("⚠️ Evento leadgen sem leadgen_id");
                    report.failures += 1;
                    continue;
                };

                match self.ingest_leadgen(&leadgen_id).await {
                    Ok(true) => report.leads_created += 1,
                    Ok(false) => report.duplicates_skipped += 1,
                    Err(e) => {
                        report.failures += 1;
                        error!("❌ Falha ao importar lead da Meta {}: {}", leadgen_id, e);
                    }
                }
            }
        }

        report
    }

    /// `Ok(false)` quando o leadgen já tinha sido importado.
    async fn ingest_leadgen(&self, leadgen_id: &str) -> Result<bool, AppError> {
        if self
            .leads
            .find_lead_by_external_id(LeadSource::Meta, leadgen_id)
            .await?
            .is_some()
        {
            info!("↩️ Leadgen {} já importado, ignorando reentrega", leadgen_id);
            return Ok(false);
        }

        let tokens = self.tokens.as_ref();
        let graph = self.graph.as_ref();
        let data = with_token_retry(tokens, || async move {
            let token = tokens.get_page_token().await?;
            let proof = tokens.app_secret_proof(&token)?;
            graph
                .fetch_leadgen(leadgen_id, &token, &proof)
                .await
                .map_err(AppError::from)
        })
        .await?;

        let new_lead = self.map_leadgen(leadgen_id, &data);
        match self.leads.insert_lead(new_lead).await {
            Ok(lead) => {
                info!("✅ Lead da Meta salvo: {} ({})", leadgen_id, lead.customer_name);
                Ok(true)
            }
            // Duas entregas simultâneas: o índice único segura a segunda
            Err(AppError::UniqueConstraintViolation(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn map_leadgen(&self, leadgen_id: &str, data: &LeadgenData) -> NewLead {
        // Mesma regra do remetente do WhatsApp; o valor cru fica no source_meta
        let raw_phone = data.field("phone_number").unwrap_or_default();
        let contact_number = canonical_sender(raw_phone, &self.default_country_code).unwrap_or_else(|| {
            warn!("⚠️ Leadgen {} sem telefone utilizável: '{}'", leadgen_id, raw_phone);
            String::new()
        });

        // created_time vem como "2025-06-01T10:00:00+0000"
        let date = data
            .created_time
            .as_deref()
            .and_then(|t| DateTime::parse_from_str(t, "%Y-%m-%dT%H:%M:%S%z").ok())
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        NewLead {
            date,
            customer_name: data.field("full_name").unwrap_or(META_DEFAULT_NAME).to_string(),
            contact_number,
            email_id: data.field("email").map(str::to_string),
            city: data.field("city").map(str::to_string),
            requirement: META_DEFAULT_REQUIREMENT.to_string(),
            status: STATUS_NEW.to_string(),
            source: LeadSource::Meta,
            source_meta: serde_json::to_value(data).unwrap_or_else(|_| json!({})),
            external_id: Some(leadgen_id.to_string()),
            assigned_to: None,
            whatsapp_number_id: None,
        }
    }
}

// Texto salvo em `chats.content` para mensagens recebidas
fn inbound_content(message: &InboundMessage) -> String {
    match message.kind.as_str() {
        "text" => message
            .text
            .as_ref()
            .map(|t| t.body.clone())
            .unwrap_or_default(),
        "image" => "[Image]".to_string(),
        "document" => "[Document]".to_string(),
        "audio" => "[Audio]".to_string(),
        other => format!("[{}]", other),
    }
}

fn parse_unix_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let secs = raw?.trim().parse::<i64>().ok()?;
    DateTime::from_timestamp(secs, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{sample_lead, test_graph, MemoryStore};
    use chrono::Duration;
    use crate::{
        models::whatsapp::SendWhatsappPayload,
        services::{dispatcher::OutboundMessage, whatsapp_service::resolve_outbound},
    };
    use mockito::Matcher;
    use serde_json::Value;

    fn service(base_url: &str, store: &Arc<MemoryStore>, hub: LiveHub) -> WebhookService {
        let (graph, tokens) = test_graph(base_url, Some("page-1"));
        WebhookService::new(store.clone(), store.clone(), graph, tokens, hub, "91".into())
    }

    fn whatsapp_payload(messages: Value, statuses: Value) -> WhatsappWebhook {
        serde_json::from_value(json!({
            "object": "whatsapp_business_account",
            "entry": [{
                "id": "waba-1",
                "changes": [{
                    "field": "messages",
                    "value": {
                        "messaging_product": "whatsapp",
                        "metadata": {"display_phone_number": "912255550100", "phone_number_id": "1001"},
                        "messages": messages,
                        "statuses": statuses
                    }
                }]
            }]
        }))
        .unwrap()
    }

    fn text_message(from: &str, id: &str, ts: i64, body: &str) -> Value {
        json!({"from": from, "id": id, "timestamp": ts.to_string(), "type": "text", "text": {"body": body}})
    }

    fn leadgen_payload(ids: &[&str]) -> MetaLeadWebhook {
        let changes: Vec<Value> = ids
            .iter()
            .map(|id| json!({"field": "leadgen", "value": {"leadgen_id": id, "page_id": "page-1", "form_id": "f1"}}))
            .collect();
        serde_json::from_value(json!({"object": "page", "entry": [{"id": "page-1", "changes": changes}]})).unwrap()
    }

    #[test]
    fn subscription_requires_mode_and_matching_token() {
        let ok = VerifyQuery {
            mode: Some("subscribe".into()),
            verify_token: Some("s3cret".into()),
            challenge: Some("42".into()),
        };
        assert_eq!(verify_subscription(&ok, Some("s3cret")).as_deref(), Some("42"));
        assert_eq!(verify_subscription(&ok, Some("other")), None);
        assert_eq!(verify_subscription(&ok, None), None);

        let wrong_mode = VerifyQuery { mode: Some("unsubscribe".into()), ..ok };
        assert_eq!(verify_subscription(&wrong_mode, Some("s3cret")), None);
    }

    #[test]
    fn signature_is_checked_against_raw_body() {
        let body = br#"{"object":"page"}"#;
        let mut mac = HmacSha256::new_from_slice(b"secret").unwrap();
        mac.update(body);
        let header = format!("sha256={}", hex::encode(mac.finalize().into_bytes()));

        assert!(verify_signature(body, &header, "secret"));
        assert!(!verify_signature(body, &header, "wrong"));
        assert!(!verify_signature(b"tampered", &header, "secret"));
        assert!(!verify_signature(body, "deadbeef", "secret"));
    }

    #[test]
    fn media_messages_get_placeholders() {
        let msg: InboundMessage = serde_json::from_value(
            json!({"from": "1", "type": "image", "image": {"id": "media-1", "caption": "chair"}}),
        )
        .unwrap();
        assert_eq!(inbound_content(&msg), "[Image]");

        let msg: InboundMessage = serde_json::from_value(json!({"from": "1", "type": "sticker"})).unwrap();
        assert_eq!(inbound_content(&msg), "[sticker]");
    }

    #[tokio::test]
    async fn inbound_text_creates_lead_chat_and_opens_window() {
        let server = mockito::Server::new_async().await;
        let store = Arc::new(MemoryStore::new());
        let ts = Utc::now().timestamp();

        let report = service(&server.url(), &store, LiveHub::new())
            .process_whatsapp(whatsapp_payload(
                json!([text_message("919876543210", "wamid.in1", ts, "Is the chair available?")]),
                json!([]),
            ))
            .await;

        assert_eq!(report.messages_stored, 1);
        assert_eq!(store.lead_count(), 1);

        let lead = store.leads.lock().unwrap()[0].clone();
        assert_eq!(lead.contact_number, "+919876543210");
        assert!(lead.has_replied);
        assert_eq!(lead.last_inbound_at.map(|t| t.timestamp()), Some(ts));

        let chats = store.chats_for(lead.id);
        assert_eq!(chats.len(), 1);
        assert_eq!(chats[0].direction, ChatDirection::Inbound);
        assert_eq!(chats[0].content, "Is the chair available?");
        assert_eq!(chats[0].wa_number_id.as_deref(), Some("1001"));
    }

    #[tokio::test]
    async fn last_inbound_never_moves_backwards() {
        let server = mockito::Server::new_async().await;
        let store = Arc::new(MemoryStore::new());
        let svc = service(&server.url(), &store, LiveHub::new());
        let newer = Utc::now().timestamp();
        let older = (Utc::now() - Duration::hours(2)).timestamp();

        svc.process_whatsapp(whatsapp_payload(
            json!([text_message("919876543210", "a", newer, "second")]),
            json!([]),
        ))
        .await;
        svc.process_whatsapp(whatsapp_payload(
            json!([text_message("919876543210", "b", older, "first, delivered late")]),
            json!([]),
        ))
        .await;

        let lead = store.leads.lock().unwrap()[0].clone();
        assert_eq!(lead.last_inbound_at.map(|t| t.timestamp()), Some(newer));
        assert_eq!(store.chats_for(lead.id).len(), 2);
    }

    #[tokio::test]
    async fn redelivered_message_is_stored_and_published_once() {
        let server = mockito::Server::new_async().await;
        let store = Arc::new(MemoryStore::new());
        let hub = LiveHub::new();
        let svc = service(&server.url(), &store, hub.clone());
        let ts = Utc::now().timestamp();
        let batch = || whatsapp_payload(json!([text_message("919876543210", "wamid.SAME", ts, "hi")]), json!([]));

        svc.process_whatsapp(batch()).await;
        let lead_id = store.leads.lock().unwrap()[0].id;
        let mut viewer = hub.subscribe(lead_id);

        let redelivery = svc.process_whatsapp(batch()).await;

        assert_eq!(redelivery.messages_stored, 0);
        assert_eq!(redelivery.duplicates_skipped, 1);
        assert_eq!(store.chats_for(lead_id).len(), 1);
        assert!(viewer.try_recv().is_err());
    }

    #[tokio::test]
    async fn failed_inbound_write_leaves_no_half_state() {
        let server = mockito::Server::new_async().await;
        let store = Arc::new(MemoryStore::new());
        let lead_id = store.seed_lead(sample_lead("+919876543210"));
        let svc = service(&server.url(), &store, LiveHub::new());
        let ts = Utc::now().timestamp();
        let batch = || whatsapp_payload(json!([text_message("919876543210", "wamid.retry", ts, "hello?")]), json!([]));

        store.fail_inbound.store(true, std::sync::atomic::Ordering::SeqCst);
        let failed = svc.process_whatsapp(batch()).await;

        assert_eq!(failed.failures, 1);
        assert!(store.chats_for(lead_id).is_empty());
        assert!(!store.lead(lead_id).has_replied);

        // A Meta reenvia o lote: agora grava uma única vez
        store.fail_inbound.store(false, std::sync::atomic::Ordering::SeqCst);
        let retried = svc.process_whatsapp(batch()).await;

        assert_eq!(retried.messages_stored, 1);
        assert_eq!(store.chats_for(lead_id).len(), 1);
        let lead = store.lead(lead_id);
        assert!(lead.has_replied);
        assert_eq!(lead.last_inbound_at.map(|t| t.timestamp()), Some(ts));
    }

    #[tokio::test]
    async fn bare_local_sender_opens_a_window_for_its_canonical_number() {
        let server = mockito::Server::new_async().await;
        let store = Arc::new(MemoryStore::new());
        let t = Utc::now() - Duration::minutes(5);

        assert_one_stored(
            service(&server.url(), &store, LiveHub::new())
                .process_whatsapp(whatsapp_payload(
                    json!([text_message("9876543210", "wamid.local", t.timestamp(), "Need 20 chairs")]),
                    json!([]),
                ))
                .await,
        );

        let lead = store.leads.lock().unwrap()[0].clone();
        assert_eq!(lead.contact_number, "+919876543210");
        assert_eq!(lead.whatsapp_number_id.as_deref(), Some("1001"));

        let send = SendWhatsappPayload {
            to: Some("+919876543210".into()),
            media_type: Some("text".into()),
            body: Some("Sharing the catalog".into()),
            ..Default::default()
        };
        assert!(matches!(
            resolve_outbound(&lead, &send, t + Duration::hours(1)),
            Ok(OutboundMessage::Text { .. })
        ));
        assert!(matches!(
            resolve_outbound(&lead, &send, t + Duration::hours(25)),
            Err(AppError::TemplateRequired)
        ));
    }

    fn assert_one_stored(report: WebhookReport) {
        assert_eq!(report.messages_stored, 1, "{:?}", report);
    }

    #[tokio::test]
    async fn one_bad_message_does_not_abort_the_batch() {
        let server = mockito::Server::new_async().await;
        let store = Arc::new(MemoryStore::new());
        let ts = Utc::now().timestamp();

        let report = service(&server.url(), &store, LiveHub::new())
            .process_whatsapp(whatsapp_payload(
                json!([
                    {"from": "", "id": "x", "timestamp": ts.to_string(), "type": "text", "text": {"body": "?"}},
                    text_message("919876543210", "y", ts, "ok")
                ]),
                json!([]),
            ))
            .await;

        assert_eq!(report.failures, 1);
        assert_eq!(report.messages_stored, 1);
    }

    #[tokio::test]
    async fn status_updates_mark_the_outbound_chat() {
        let server = mockito::Server::new_async().await;
        let store = Arc::new(MemoryStore::new());
        let lead_id = store.seed_lead(sample_lead("+919876543210"));
        store
            .insert_chat(NewChatMessage {
                lead_id,
                direction: ChatDirection::Outbound,
                from_number: "1001".into(),
                to_number: Some("+919876543210".into()),
                wa_number_id: Some("1001".into()),
                kind: MessageKind::Text,
                content: "hello".into(),
                caption: None,
                media_id: None,
                filename: None,
                wa_message_id: Some("wamid.out".into()),
                raw: None,
                timestamp: Utc::now(),
            })
            .await
            .unwrap();

        let ts = Utc::now().timestamp();
        let report = service(&server.url(), &store, LiveHub::new())
            .process_whatsapp(whatsapp_payload(
                json!([]),
                json!([{"id": "wamid.out", "status": "read", "timestamp": ts.to_string(), "recipient_id": "919876543210"}]),
            ))
            .await;

        assert_eq!(report.statuses_updated, 1);
        let chat = &store.chats_for(lead_id)[0];
        assert_eq!(chat.delivery_status.as_deref(), Some("read"));
        // Status não é mensagem do cliente
        assert!(!store.lead(lead_id).has_replied);
    }

    #[tokio::test]
    async fn other_objects_are_ignored() {
        let server = mockito::Server::new_async().await;
        let store = Arc::new(MemoryStore::new());
        let mut payload = whatsapp_payload(json!([text_message("919876543210", "a", 0, "hi")]), json!([]));
        payload.object = "instagram".into();

        let report = service(&server.url(), &store, LiveHub::new()).process_whatsapp(payload).await;
        assert_eq!(report, WebhookReport::default());
        assert_eq!(store.lead_count(), 0);
    }

    #[tokio::test]
    async fn leadgen_creates_a_meta_lead_once() {
        let mut server = mockito::Server::new_async().await;
        let _pages = server
            .mock("GET", "/me/accounts")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(json!({"data": [{"id": "page-1", "access_token": "page-token"}]}).to_string())
            .create_async()
            .await;
        let leadgen = server
            .mock("GET", "/lg-1")
            .match_query(Matcher::Any)
            .match_header("authorization", "Bearer page-token")
            .with_status(200)
            .with_body(
                json!({
                    "id": "lg-1",
                    "created_time": "2025-06-01T10:00:00+0000",
                    "field_data": [
                        {"name": "full_name", "values": ["Asha Rao"]},
                        {"name": "phone_number", "values": ["+91 98765 43210"]},
                        {"name": "email", "values": ["asha@example.com"]},
                        {"name": "city", "values": ["Pune"]}
                    ]
                })
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await;

        let store = Arc::new(MemoryStore::new());
        let svc = service(&server.url(), &store, LiveHub::new());

        let first = svc.process_meta(leadgen_payload(&["lg-1"])).await;
        let redelivery = svc.process_meta(leadgen_payload(&["lg-1"])).await;

        assert_eq!(first.leads_created, 1);
        assert_eq!(redelivery.duplicates_skipped, 1);
        assert_eq!(store.lead_count(), 1);

        let lead = store.leads.lock().unwrap()[0].clone();
        assert_eq!(lead.source, LeadSource::Meta);
        assert_eq!(lead.external_id.as_deref(), Some("lg-1"));
        assert_eq!(lead.customer_name, "Asha Rao");
        assert_eq!(lead.contact_number, "+919876543210");
        assert_eq!(lead.city.as_deref(), Some("Pune"));
        assert_eq!(lead.requirement, META_DEFAULT_REQUIREMENT);
        assert_eq!(lead.date.to_rfc3339(), "2025-06-01T10:00:00+00:00");
        leadgen.assert_async().await;
    }

    #[tokio::test]
    async fn failed_leadgen_fetch_does_not_stop_the_others() {
        let mut server = mockito::Server::new_async().await;
        let _pages = server
            .mock("GET", "/me/accounts")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(json!({"data": [{"id": "page-1", "access_token": "page-token"}]}).to_string())
            .create_async()
            .await;
        let _broken = server
            .mock("GET", "/lg-bad")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(json!({"error": {"message": "Unsupported get request", "code": 100}}).to_string())
            .create_async()
            .await;
        let _good = server
            .mock("GET", "/lg-good")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(json!({"id": "lg-good", "field_data": [{"name": "phone_number", "values": ["9876543210"]}]}).to_string())
            .create_async()
            .await;

        let store = Arc::new(MemoryStore::new());
        let report = service(&server.url(), &store, LiveHub::new())
            .process_meta(leadgen_payload(&["lg-bad", "lg-good"]))
            .await;

        assert_eq!(report.failures, 1);
        assert_eq!(report.leads_created, 1);
        let lead = store.leads.lock().unwrap()[0].clone();
        assert_eq!(lead.customer_name, META_DEFAULT_NAME);
    }

    #[tokio::test]
    async fn leadgen_phone_follows_the_sender_rule() {
        let mut server = mockito::Server::new_async().await;
        let _pages = server
            .mock("GET", "/me/accounts")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(json!({"data": [{"id": "page-1", "access_token": "page-token"}]}).to_string())
            .create_async()
            .await;
        let _intl = server
            .mock("GET", "/lg-intl")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(json!({"id": "lg-intl", "field_data": [{"name": "phone_number", "values": ["+44 7911 123456"]}]}).to_string())
            .create_async()
            .await;
        let _none = server
            .mock("GET", "/lg-none")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(json!({"id": "lg-none", "field_data": [{"name": "phone_number", "values": ["n/a"]}]}).to_string())
            .create_async()
            .await;

        let store = Arc::new(MemoryStore::new());
        let report = service(&server.url(), &store, LiveHub::new())
            .process_meta(leadgen_payload(&["lg-intl", "lg-none"]))
            .await;
        assert_eq!(report.leads_created, 2);

        let leads = store.leads.lock().unwrap().clone();
        let by_id = |id: &str| leads.iter().find(|l| l.external_id.as_deref() == Some(id)).cloned().unwrap();
        assert_eq!(by_id("lg-intl").contact_number, "+447911123456");

        let unusable = by_id("lg-none");
        assert_eq!(unusable.contact_number, "");
        assert_eq!(unusable.source_meta["field_data"][0]["values"][0], "n/a");
    }
}
