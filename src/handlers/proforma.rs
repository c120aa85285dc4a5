// src/handlers/proforma.rs

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::auth::{AdminUser, AuthenticatedUser},
    models::proforma::{CreateProformaPayload, DeleteProformaPayload, ProformaInvoice},
};

// POST /api/leads/{id}/pi
#[utoipa::path(
    post,
    path = "/api/leads/{id}/pi",
    tag = "Proforma",
    params(("id" = Uuid, Path, description = "ID do lead")),
    request_body = CreateProformaPayload,
    responses(
        (status = 201, description = "PI emitida", body = ProformaInvoice),
        (status = 400, description = "Lead sem requisitos")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_pi(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreateProformaPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let pi = app_state.proforma_service.create(id, payload, &user).await?;
    Ok((StatusCode::CREATED, Json(pi)))
}

// PUT /api/leads/{id}/pi/{pi_id}
#[utoipa::path(
    put,
    path = "/api/leads/{id}/pi/{pi_id}",
    tag = "Proforma",
    params(
        ("id" = Uuid, Path, description = "ID do lead"),
        ("pi_id" = Uuid, Path, description = "ID da PI")
    ),
    request_body = CreateProformaPayload,
    responses(
        (status = 200, description = "PI atualizada com totais recalculados", body = ProformaInvoice),
        (status = 400, description = "PI excluída"),
        (status = 404, description = "PI não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_pi(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path((id, pi_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<CreateProformaPayload>,
) -> Result<Json<ProformaInvoice>, AppError> {
    payload.validate()?;
    Ok(Json(app_state.proforma_service.update(id, pi_id, payload, &user).await?))
}

// GET /api/leads/{id}/pi
#[utoipa::path(
    get,
    path = "/api/leads/{id}/pi",
    tag = "Proforma",
    params(("id" = Uuid, Path, description = "ID do lead")),
    responses((status = 200, description = "Histórico de PIs (ativas e excluídas)", body = Vec<ProformaInvoice>)),
    security(("api_jwt" = []))
)]
pub async fn list_pis(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ProformaInvoice>>, AppError> {
    Ok(Json(app_state.proforma_service.history(id, &user).await?))
}

// GET /api/leads/{id}/pi/{pi_id}/pdf
#[utoipa::path(
    get,
    path = "/api/leads/{id}/pi/{pi_id}/pdf",
    tag = "Proforma",
    params(
        ("id" = Uuid, Path, description = "ID do lead"),
        ("pi_id" = Uuid, Path, description = "ID da PI")
    ),
    responses(
        (status = 200, description = "PDF da PI", content_type = "application/pdf"),
        (status = 404, description = "PI não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn download_pdf(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path((id, pi_id)): Path<(Uuid, Uuid)>,
) -> Result<Response, AppError> {
    let (pi, lead) = app_state.proforma_service.find_for_pdf(id, pi_id, &user).await?;

    // genpdf é síncrono e faz I/O das fontes
    let document_service = app_state.document_service.clone();
    let filename = format!("{}.pdf", pi.pi_number);
    let pdf_bytes = tokio::task::spawn_blocking(move || document_service.generate_pi_pdf(&pi, &lead))
        .await
        .map_err(|e| anyhow::anyhow!("Falha na task do PDF: {}", e))??;

    // Configura os Headers para o navegador baixar o PDF
    let headers = [
        (header::CONTENT_TYPE, "application/pdf".to_string()),
        (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", filename)),
    ];

    Ok((headers, pdf_bytes).into_response())
}

// POST /api/leads/{id}/pi/{pi_id}/delete
#[utoipa::path(
    post,
    path = "/api/leads/{id}/pi/{pi_id}/delete",
    tag = "Proforma",
    params(
        ("id" = Uuid, Path, description = "ID do lead"),
        ("pi_id" = Uuid, Path, description = "ID da PI")
    ),
    request_body = DeleteProformaPayload,
    responses(
        (status = 200, description = "PI marcada como excluída", body = ProformaInvoice),
        (status = 403, description = "Apenas admins")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_pi(
    State(app_state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path((id, pi_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<DeleteProformaPayload>,
) -> Result<Json<ProformaInvoice>, AppError> {
    payload.validate()?;
    Ok(Json(app_state.proforma_service.soft_delete(id, pi_id, &payload.reason).await?))
}
