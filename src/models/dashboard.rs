// src/models/dashboard.rs

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

// 1. Cards do topo: contagem por status
#[derive(Debug, Default, Serialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatusSummary {
    pub total_leads: i64,
    pub new_leads: i64,
    pub in_progress_leads: i64,
    pub assigned_leads: i64,
    pub deal_drop_leads: i64,
    pub closed_leads: i64,
    pub other_leads: i64,
}

// 2. Desempenho por usuário
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserPerformance {
    pub user_id: Uuid,
    pub full_name: String,
    pub summary: StatusSummary,
    // % de leads fechados
    pub conversion_rate: i64,
}

// 3. Cadeiras vendidas (apenas leads Closed)
#[derive(Debug, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChairSalesEntry {
    pub label: String,
    pub quantity: i64,
    pub revenue: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub summary: StatusSummary,
    pub by_source: BTreeMap<String, i64>,
    pub users: Vec<UserPerformance>,
    pub chairs_by_model: Vec<ChairSalesEntry>,
    pub chairs_by_user: Vec<ChairSalesEntry>,
}

// Linha agregada do banco: (status, assigned_to, quantidade)
#[derive(Debug, Clone, FromRow)]
pub struct StatusCountRow {
    pub status: String,
    pub assigned_to: Option<Uuid>,
    pub count: i64,
}
