// src/models/chair.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

// Modelo de cadeira do catálogo
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Chair {
    pub id: Uuid,
    #[schema(example = "Ergo Pro 300")]
    pub model_name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

// Cor de um modelo, cada uma com seu preço
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChairColor {
    pub id: Uuid,
    pub chair_id: Uuid,
    #[schema(example = "Preto")]
    pub name: String,
    pub base_price: Decimal,
    pub gst_applicable: bool,
    // base_price com GST (quando aplicável)
    pub final_price: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChairWithColors {
    #[serde(flatten)]
    pub chair: Chair,
    pub colors: Vec<ChairColor>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateChairPayload {
    #[validate(length(min = 1, max = 120, message = "O modelo é obrigatório."))]
    #[schema(example = "Ergo Pro 300")]
    pub model_name: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddColorPayload {
    #[validate(length(min = 1, max = 80, message = "O nome da cor é obrigatório."))]
    pub name: String,
    #[schema(value_type = f64, example = 4500.0)]
    pub base_price: Decimal,
    #[serde(default)]
    pub gst_applicable: bool,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateChairPayload {
    #[validate(length(min = 1, max = 120, message = "O modelo é obrigatório."))]
    pub model_name: String,
    pub is_active: bool,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateColorPayload {
    #[validate(length(min = 1, max = 80, message = "O nome da cor é obrigatório."))]
    pub name: String,
    #[schema(value_type = f64, example = 4800.0)]
    pub base_price: Decimal,
    #[serde(default)]
    pub gst_applicable: bool,
    pub is_active: bool,
}
