// src/models/proforma.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "gst_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GstType {
    Igst,
    CgstSgst,
    None,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "pi_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum PiStatus {
    Active,
    Deleted,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub name: Option<String>,
    pub line1: Option<String>,
    pub line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub pincode: Option<String>,
    pub phone: Option<String>,
    pub gstin: Option<String>,
}

// Foto do requisito no momento da emissão (não muda se o catálogo mudar)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PiItem {
    pub chair_model: String,
    pub color_id: Uuid,
    pub color_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub shipping_unit: Decimal,
}

// Tipo de GST e valores de uma PI a partir dos itens congelados.
#[derive(Debug, Clone, PartialEq)]
pub struct PiTotals {
    pub gst_type: GstType,
    pub breakup: GstBreakup,
    pub taxable_amount: Decimal,
    pub gst_amount: Decimal,
    pub grand_total: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GstBreakup {
    pub igst: Decimal,
    pub cgst: Decimal,
    pub sgst: Decimal,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProformaInvoice {
    pub id: Uuid,
    pub lead_id: Uuid,
    #[schema(example = "PI-06-2025-001")]
    pub pi_number: String,

    #[schema(value_type = Address)]
    pub billing_address: sqlx::types::Json<Address>,
    #[schema(value_type = Address)]
    pub shipping_address: sqlx::types::Json<Address>,

    pub gst_enabled: bool,
    pub gst_type: GstType,
    pub igst: Decimal,
    pub cgst: Decimal,
    pub sgst: Decimal,

    #[schema(value_type = Vec<PiItem>)]
    pub items: sqlx::types::Json<Vec<PiItem>>,

    pub taxable_amount: Decimal,
    pub gst_amount: Decimal,
    pub grand_total: Decimal,

    pub payment_mode: Option<String>,
    pub estimated_delivery: Option<String>,
    pub notes: Option<String>,

    pub created_by: Option<Uuid>,
    pub status: PiStatus,
    pub deleted_at: Option<DateTime<Utc>>,
    pub delete_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Valores calculados de uma PI antes de ser persistida.
#[derive(Debug, Clone)]
pub struct NewProformaInvoice {
    pub lead_id: Uuid,
    pub pi_number: String,
    pub billing_address: Address,
    pub shipping_address: Address,
    pub gst_enabled: bool,
    pub gst_type: GstType,
    pub breakup: GstBreakup,
    pub items: Vec<PiItem>,
    pub taxable_amount: Decimal,
    pub gst_amount: Decimal,
    pub grand_total: Decimal,
    pub payment_mode: Option<String>,
    pub estimated_delivery: Option<String>,
    pub notes: Option<String>,
    pub created_by: Uuid,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateProformaPayload {
    #[serde(default)]
    pub billing_address: Address,
    // Ausente: usa o endereço de cobrança
    pub shipping_address: Option<Address>,
    #[serde(default)]
    pub gst_enabled: bool,
    #[validate(length(max = 100))]
    pub payment_mode: Option<String>,
    #[validate(length(max = 100))]
    pub estimated_delivery: Option<String>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct DeleteProformaPayload {
    #[validate(length(min = 1, max = 500, message = "Informe o motivo da exclusão."))]
    pub reason: String,
}
