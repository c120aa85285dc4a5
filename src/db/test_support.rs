// src/db/test_support.rs

// Implementação em memória dos stores, usada pelos testes da mensageria.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::stores::{ChatStore, LeadStore},
    models::{
        chat::{ChatDirection, ChatMessage, NewChatMessage},
        lead::{Lead, LeadSource, NewLead, STATUS_NEW},
    },
    services::{
        graph_client::GraphClient,
        token_manager::{MetaTokenManager, TokenConfig},
    },
};

#[derive(Default)]
pub struct MemoryStore {
    pub leads: Mutex<Vec<Lead>>,
    pub chats: Mutex<Vec<ChatMessage>>,
    /// Simula a queda do banco no meio da gravação de uma mensagem recebida.
    pub fail_inbound: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insere um lead pronto e devolve o id.
    pub fn seed_lead(&self, lead: Lead) -> Uuid {
        let id = lead.id;
        self.leads.lock().unwrap().push(lead);
        id
    }

    pub fn lead(&self, id: Uuid) -> Lead {
        self.leads
            .lock()
            .unwrap()
            .iter()
            .find(|l| l.id == id)
            .cloned()
            .expect("lead inexistente no store")
    }

    pub fn lead_count(&self) -> usize {
        self.leads.lock().unwrap().len()
    }

    pub fn chats_for(&self, lead_id: Uuid) -> Vec<ChatMessage> {
        self.chats
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.lead_id == lead_id)
            .cloned()
            .collect()
    }
}

/// Lead mínimo para os testes.
pub fn sample_lead(contact_number: &str) -> Lead {
    let now = Utc::now();
    Lead {
        id: Uuid::new_v4(),
        date: now,
        customer_name: "Test Customer".into(),
        contact_number: contact_number.into(),
        alternate_number: None,
        email_id: None,
        city: None,
        requirement: "Office chairs".into(),
        status: STATUS_NEW.into(),
        source: LeadSource::Manual,
        source_meta: json!({}),
        external_id: None,
        assigned_to: None,
        whatsapp_number_id: None,
        has_replied: false,
        last_inbound_at: None,
        created_at: now,
        updated_at: now,
    }
}

/// Cliente da Graph API + token manager apontando para o servidor de teste.
/// Token de usuário inicial: "old"; app secret: "secret".
pub fn test_graph(base_url: &str, page_id: Option<&str>) -> (Arc<GraphClient>, Arc<MetaTokenManager>) {
    let graph = Arc::new(GraphClient::new(base_url).unwrap());
    let tokens = Arc::new(MetaTokenManager::new(
        graph.clone(),
        TokenConfig {
            app_id: Some("app".into()),
            app_secret: Some("secret".into()),
            user_access_token: Some("old".into()),
            page_id: page_id.map(str::to_string),
        },
    ));
    (graph, tokens)
}

#[async_trait]
impl LeadStore for MemoryStore {
    async fn find_lead(&self, id: Uuid) -> Result<Option<Lead>, AppError> {
        Ok(self.leads.lock().unwrap().iter().find(|l| l.id == id).cloned())
    }

    async fn find_lead_by_contact(&self, numbers: &[String]) -> Result<Option<Lead>, AppError> {
        let leads = self.leads.lock().unwrap();
        Ok(leads
            .iter()
            .filter(|l| numbers.contains(&l.contact_number))
            .min_by_key(|l| l.created_at)
            .cloned())
    }

    async fn find_lead_by_external_id(
        &self,
        source: LeadSource,
        external_id: &str,
    ) -> Result<Option<Lead>, AppError> {
        let leads = self.leads.lock().unwrap();
        Ok(leads
            .iter()
            .find(|l| l.source == source && l.external_id.as_deref() == Some(external_id))
            .cloned())
    }

    async fn insert_lead(&self, lead: NewLead) -> Result<Lead, AppError> {
        let mut leads = self.leads.lock().unwrap();

        // Mesmo comportamento do índice único (source, external_id)
        if let Some(external_id) = &lead.external_id {
            if leads
                .iter()
                .any(|l| l.source == lead.source && l.external_id.as_ref() == Some(external_id))
            {
                return Err(AppError::UniqueConstraintViolation("duplicado".into()));
            }
        }

        let now = Utc::now();
        let created = Lead {
            id: Uuid::new_v4(),
            date: lead.date,
            customer_name: lead.customer_name,
            contact_number: lead.contact_number,
            alternate_number: None,
            email_id: lead.email_id,
            city: lead.city,
            requirement: lead.requirement,
            status: lead.status,
            source: lead.source,
            source_meta: lead.source_meta,
            external_id: lead.external_id,
            assigned_to: lead.assigned_to,
            whatsapp_number_id: lead.whatsapp_number_id,
            has_replied: false,
            last_inbound_at: None,
            created_at: now,
            updated_at: now,
        };
        leads.push(created.clone());
        Ok(created)
    }

    async fn update_contact_link(
        &self,
        id: Uuid,
        contact_number: &str,
        whatsapp_number_id: Option<&str>,
    ) -> Result<(), AppError> {
        let mut leads = self.leads.lock().unwrap();
        if let Some(lead) = leads.iter_mut().find(|l| l.id == id) {
            lead.contact_number = contact_number.to_string();
            if lead.whatsapp_number_id.is_none() {
                lead.whatsapp_number_id = whatsapp_number_id.map(str::to_string);
            }
            lead.updated_at = Utc::now();
        }
        Ok(())
    }
}

#[async_trait]
impl ChatStore for MemoryStore {
    async fn insert_chat(&self, message: NewChatMessage) -> Result<ChatMessage, AppError> {
        let chat = chat_from(message);
        self.chats.lock().unwrap().push(chat.clone());
        Ok(chat)
    }

    async fn insert_inbound(&self, message: NewChatMessage) -> Result<Option<ChatMessage>, AppError> {
        // Transação que falha: nada é gravado
        if self.fail_inbound.load(Ordering::SeqCst) {
            return Err(AppError::DatabaseError(sqlx::Error::PoolTimedOut));
        }

        let mut chats = self.chats.lock().unwrap();
        if let Some(wamid) = &message.wa_message_id {
            if chats.iter().any(|c| c.wa_message_id.as_ref() == Some(wamid)) {
                return Ok(None);
            }
        }

        let chat = chat_from(message);
        let mut leads = self.leads.lock().unwrap();
        if let Some(lead) = leads.iter_mut().find(|l| l.id == chat.lead_id) {
            lead.has_replied = true;
            lead.last_inbound_at = Some(lead.last_inbound_at.map_or(chat.timestamp, |prev| prev.max(chat.timestamp)));
        }
        chats.push(chat.clone());
        Ok(Some(chat))
    }

    async fn list_chats(&self, lead_id: Uuid) -> Result<Vec<ChatMessage>, AppError> {
        let mut chats = self.chats_for(lead_id);
        chats.sort_by_key(|c| c.timestamp);
        Ok(chats)
    }

    async fn update_delivery_status(
        &self,
        wa_message_id: &str,
        status: &str,
        at: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        let mut chats = self.chats.lock().unwrap();
        let mut updated = 0;
        for chat in chats.iter_mut().filter(|c| {
            c.direction == ChatDirection::Outbound && c.wa_message_id.as_deref() == Some(wa_message_id)
        }) {
            chat.delivery_status = Some(status.to_string());
            chat.status_at = Some(at);
            updated += 1;
        }
        Ok(updated)
    }
}

fn chat_from(message: NewChatMessage) -> ChatMessage {
    ChatMessage {
        id: Uuid::new_v4(),
        lead_id: message.lead_id,
        direction: message.direction,
        from_number: message.from_number,
        to_number: message.to_number,
        wa_number_id: message.wa_number_id,
        kind: message.kind,
        content: message.content,
        caption: message.caption,
        media_id: message.media_id,
        filename: message.filename,
        wa_message_id: message.wa_message_id,
        delivery_status: None,
        status_at: None,
        raw: message.raw,
        timestamp: message.timestamp,
    }
}

/// Store cujo banco está fora do ar: toda operação falha.
pub struct UnavailableStore;

fn unavailable<T>() -> Result<T, AppError> {
    Err(AppError::DatabaseError(sqlx::Error::PoolTimedOut))
}

#[async_trait]
impl LeadStore for UnavailableStore {
    async fn find_lead(&self, _id: Uuid) -> Result<Option<Lead>, AppError> {
        unavailable()
    }

    async fn find_lead_by_contact(&self, _numbers: &[String]) -> Result<Option<Lead>, AppError> {
        unavailable()
    }

    async fn find_lead_by_external_id(
        &self,
        _source: LeadSource,
        _external_id: &str,
    ) -> Result<Option<Lead>, AppError> {
        unavailable()
    }

    async fn insert_lead(&self, _lead: NewLead) -> Result<Lead, AppError> {
        unavailable()
    }

    async fn update_contact_link(
        &self,
        _id: Uuid,
        _contact_number: &str,
        _whatsapp_number_id: Option<&str>,
    ) -> Result<(), AppError> {
        unavailable()
    }
}

#[async_trait]
impl ChatStore for UnavailableStore {
    async fn insert_chat(&self, _message: NewChatMessage) -> Result<ChatMessage, AppError> {
        unavailable()
    }

    async fn insert_inbound(&self, _message: NewChatMessage) -> Result<Option<ChatMessage>, AppError> {
        unavailable()
    }

    async fn list_chats(&self, _lead_id: Uuid) -> Result<Vec<ChatMessage>, AppError> {
        unavailable()
    }

    async fn update_delivery_status(
        &self,
        _wa_message_id: &str,
        _status: &str,
        _at: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        unavailable()
    }
}
