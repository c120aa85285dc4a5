// src/models/lead.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::chat::ChatMessage;
use crate::services::session_window::SessionState;

// --- STATUS ---
// Vocabulário aberto: cinco valores "conhecidos" + qualquer string customizada.

pub const STATUS_NEW: &str = "New";
pub const STATUS_IN_PROGRESS: &str = "In Progress";
pub const STATUS_ASSIGNED: &str = "Assigned";
pub const STATUS_DEAL_DROP: &str = "Deal Drop";
pub const STATUS_CLOSED: &str = "Closed";

pub const KNOWN_STATUSES: [&str; 5] = [
    STATUS_NEW,
    STATUS_IN_PROGRESS,
    STATUS_ASSIGNED,
    STATUS_DEAL_DROP,
    STATUS_CLOSED,
];

// Filtro especial da listagem: tudo que não é um dos status conhecidos
pub const STATUS_OTHER: &str = "Other";

pub fn is_known_status(status: &str) -> bool {
    KNOWN_STATUSES.contains(&status)
}

// --- ORIGEM ---

// Mapeia o CREATE TYPE lead_source do banco
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema)]
#[sqlx(type_name = "lead_source", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LeadSource {
    GoogleSheet,
    Meta,
    Indiamart,
    Manual,
    ExcelUpload,
}

impl LeadSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadSource::GoogleSheet => "google_sheet",
            LeadSource::Meta => "meta",
            LeadSource::Indiamart => "indiamart",
            LeadSource::Manual => "manual",
            LeadSource::ExcelUpload => "excel_upload",
        }
    }
}

// --- LEAD ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: Uuid,
    pub date: DateTime<Utc>,

    pub customer_name: String,
    // Sempre no formato canônico (+91XXXXXXXXXX)
    pub contact_number: String,
    pub alternate_number: Option<String>,
    pub email_id: Option<String>,
    pub city: Option<String>,
    pub requirement: String,

    pub status: String,
    pub source: LeadSource,

    // Linha crua da planilha, payload da Meta, quem criou...
    #[schema(value_type = Object)]
    pub source_meta: Value,
    // ID do evento no provedor (ex: leadgen_id)
    pub external_id: Option<String>,

    pub assigned_to: Option<Uuid>,

    // Estado da sessão do WhatsApp
    pub whatsapp_number_id: Option<String>,
    pub has_replied: bool,
    pub last_inbound_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Dados para inserir um lead, vindos de qualquer canal.
#[derive(Debug, Clone)]
pub struct NewLead {
    pub date: DateTime<Utc>,
    pub customer_name: String,
    pub contact_number: String,
    pub email_id: Option<String>,
    pub city: Option<String>,
    pub requirement: String,
    pub status: String,
    pub source: LeadSource,
    pub source_meta: Value,
    pub external_id: Option<String>,
    pub assigned_to: Option<Uuid>,
    pub whatsapp_number_id: Option<String>,
}

// --- FILHOS DO LEAD ---

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusHistoryEntry {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub status: String,
    pub changed_by: Option<Uuid>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeadNote {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub text: String,
    pub user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

// Item de requisito (cadeira + cor + preço)
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeadRequirement {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub chair_id: Uuid,
    pub color_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub shipping_unit: Decimal,
    pub gst_applicable: bool,
    pub total_price: Decimal,
    pub note: String,
    pub created_at: DateTime<Utc>,
}

// Requisito com os nomes do catálogo, para a tela de detalhe e a PI
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RequirementLine {
    pub id: Uuid,
    pub chair_id: Uuid,
    pub chair_model: String,
    pub color_id: Uuid,
    pub color_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub shipping_unit: Decimal,
    pub gst_applicable: bool,
    pub total_price: Decimal,
    pub note: String,
}

// --- LISTAGEM ---

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeadFilter {
    pub search: Option<String>,
    pub status: Option<String>,
    // UUID do usuário ou "unassigned"
    pub assigned_to: Option<String>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub sort_field: Option<String>,
    pub sort_order: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

impl LeadFilter {
    /// Coluna de ordenação a partir de uma whitelist (default: criação).
    pub fn sort_column(&self) -> &'static str {
        match self.sort_field.as_deref() {
            Some("date") => "date",
            Some("customerName") => "customer_name",
            Some("status") => "status",
            Some("city") => "city",
            Some("updatedAt") => "updated_at",
            _ => "created_at",
        }
    }

    pub fn sort_direction(&self) -> &'static str {
        match self.sort_order.as_deref() {
            Some("asc") | Some("ASC") => "ASC",
            _ => "DESC",
        }
    }

    /// (page, limit, offset) já saneados.
    pub fn pagination(&self) -> (i64, i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        (page, limit, (page - 1) * limit)
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeadPage {
    pub leads: Vec<Lead>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

// --- DETALHE ---

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeadDetail {
    pub lead: Lead,
    pub requirements: Vec<RequirementLine>,
    pub notes: Vec<LeadNote>,
    pub status_history: Vec<StatusHistoryEntry>,
    pub chats: Vec<ChatMessage>,
    pub session: SessionState,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkAssignResult {
    pub assigned: u64,
    pub skipped: usize,
    pub assigned_ids: Vec<Uuid>,
    pub skipped_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkDeleteResult {
    pub deleted: u64,
    pub skipped: usize,
    pub deleted_ids: Vec<Uuid>,
    pub skipped_ids: Vec<Uuid>,
}

// --- IMPORTAÇÃO ---

// Uma linha da planilha (Excel ou Google Sheets) já convertida em JSON
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImportLeadRow {
    // RFC 3339, AAAA-MM-DD ou DD/MM/AAAA
    #[schema(example = "14/06/2025")]
    pub date: Option<String>,
    #[serde(default)]
    pub customer_name: String,
    #[serde(default)]
    #[schema(example = "98765 43210")]
    pub contact_number: String,
    pub email_id: Option<String>,
    pub city: Option<String>,
    #[serde(default)]
    pub requirement: String,
    // Origem informada na própria planilha (ex.: "IndiaMART", "Feira")
    pub lead_source: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImportLeadsPayload {
    // excel_upload ou google_sheet
    pub source: LeadSource,
    #[schema(example = "leads-junho.xlsx")]
    pub file_name: Option<String>,
    #[validate(length(min = 1, max = 5000, message = "Envie entre 1 e 5000 linhas."))]
    pub rows: Vec<ImportLeadRow>,
}

#[derive(Debug, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
}

// Campos que uma reimportação pode sobrescrever
#[derive(Debug, Clone)]
pub struct ImportFields {
    pub customer_name: String,
    // None mantém o valor atual
    pub contact_number: Option<String>,
    pub email_id: Option<String>,
    pub city: Option<String>,
    pub requirement: String,
    pub source_meta: Value,
}

// --- EXPORTAÇÃO ---

#[derive(Debug, Clone, FromRow)]
pub struct LeadExportRow {
    #[sqlx(flatten)]
    pub lead: Lead,
    pub assignee_name: Option<String>,
}

// --- PAYLOADS ---

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateLeadPayload {
    pub date: Option<DateTime<Utc>>,
    #[validate(length(min = 1, message = "O nome do cliente é obrigatório."))]
    #[schema(example = "Asha Rao")]
    pub customer_name: String,
    #[validate(length(min = 1, message = "O telefone é obrigatório."))]
    #[schema(example = "98765 43210")]
    pub contact_number: String,
    #[validate(email(message = "O e-mail fornecido é inválido."))]
    pub email_id: Option<String>,
    pub city: Option<String>,
    #[serde(default)]
    pub requirement: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssignLeadPayload {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkAssignPayload {
    pub user_id: Uuid,
    #[serde(default)]
    pub lead_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkDeletePayload {
    #[serde(default)]
    pub lead_ids: Vec<Uuid>,
}

// "__other__" + customStatus permite um status livre
pub const STATUS_CUSTOM_MARKER: &str = "__other__";

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusPayload {
    #[schema(example = "In Progress")]
    pub status: String,
    pub custom_status: Option<String>,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AddNotePayload {
    #[validate(length(min = 1, max = 2000, message = "A nota deve ter entre 1 e 2000 caracteres."))]
    pub text: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AlternateNumberPayload {
    // Vazio/nulo remove o número alternativo
    pub alternate_number: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LinkWhatsappNumberPayload {
    #[schema(example = "1001")]
    pub phone_number_id: String,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RequirementInput {
    pub chair_id: Uuid,
    pub color_id: Uuid,
    #[validate(range(min = 1, message = "A quantidade deve ser positiva."))]
    pub quantity: Option<i32>,
    pub unit_price: Option<Decimal>,
    pub shipping_unit: Option<Decimal>,
    #[serde(default)]
    pub gst_applicable: bool,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AddRequirementsPayload {
    #[validate(nested)]
    pub requirements: Vec<RequirementInput>,
}

#[derive(Debug, Default, Serialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BackfillReport {
    pub scanned: usize,
    pub updated: usize,
    pub unrecognized: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_sort_field_falls_back_to_created_at() {
        let filter = LeadFilter {
            sort_field: Some("password_hash; DROP TABLE leads".into()),
            ..Default::default()
        };
        assert_eq!(filter.sort_column(), "created_at");
        assert_eq!(filter.sort_direction(), "DESC");
    }

    #[test]
    fn pagination_is_clamped() {
        let filter = LeadFilter { page: Some(0), limit: Some(500), ..Default::default() };
        assert_eq!(filter.pagination(), (1, MAX_PAGE_SIZE, 0));

        let filter = LeadFilter { page: Some(3), limit: Some(10), ..Default::default() };
        assert_eq!(filter.pagination(), (3, 10, 20));
    }

    #[test]
    fn other_is_not_a_known_status() {
        assert!(is_known_status("Deal Drop"));
        assert!(!is_known_status(STATUS_OTHER));
        assert!(!is_known_status("Follow up in March"));
    }
}
