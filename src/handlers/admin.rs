// src/handlers/admin.rs

use axum::{extract::State, Json};

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::auth::AdminUser,
    models::lead::BackfillReport,
};

// POST /api/admin/backfill-phones
#[utoipa::path(
    post,
    path = "/api/admin/backfill-phones",
    tag = "Admin",
    responses(
        (status = 200, description = "Telefones normalizados", body = BackfillReport),
        (status = 403, description = "Apenas admins")
    ),
    security(("api_jwt" = []))
)]
pub async fn backfill_phones(
    State(app_state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<BackfillReport>, AppError> {
    Ok(Json(app_state.lead_service.backfill_contact_numbers().await?))
}
