// src/db/stores.rs

// Contratos de persistência usados pelo núcleo de mensageria.
// O Postgres implementa em produção; os testes usam a versão em memória.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        chat::{ChatMessage, NewChatMessage},
        lead::{Lead, LeadSource, NewLead},
    },
};

#[async_trait]
pub trait LeadStore: Send + Sync {
    async fn find_lead(&self, id: Uuid) -> Result<Option<Lead>, AppError>;

    /// Primeiro lead cujo `contact_number` é qualquer um dos formatos informados.
    async fn find_lead_by_contact(&self, numbers: &[String]) -> Result<Option<Lead>, AppError>;

    async fn find_lead_by_external_id(
        &self,
        source: LeadSource,
        external_id: &str,
    ) -> Result<Option<Lead>, AppError>;

    async fn insert_lead(&self, lead: NewLead) -> Result<Lead, AppError>;

    /// Regrava o número canônico e vincula o número da empresa (se ainda não tiver).
    async fn update_contact_link(
        &self,
        id: Uuid,
        contact_number: &str,
        whatsapp_number_id: Option<&str>,
    ) -> Result<(), AppError>;
}

#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn insert_chat(&self, message: NewChatMessage) -> Result<ChatMessage, AppError>;

    /// Grava a mensagem recebida e, na mesma transação, marca `has_replied` e
    /// avança `last_inbound_at` do lead (nunca retrocede).
    /// `None` quando o `wa_message_id` já estava gravado.
    async fn insert_inbound(&self, message: NewChatMessage) -> Result<Option<ChatMessage>, AppError>;

    async fn list_chats(&self, lead_id: Uuid) -> Result<Vec<ChatMessage>, AppError>;

    /// Atualiza o status de entrega de uma mensagem enviada. Retorna as linhas afetadas.
    async fn update_delivery_status(
        &self,
        wa_message_id: &str,
        status: &str,
        at: DateTime<Utc>,
    ) -> Result<u64, AppError>;
}
