// src/handlers/leads.rs

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::auth::{AdminUser, AuthenticatedUser},
    models::lead::{
        AddNotePayload, AddRequirementsPayload, AlternateNumberPayload, AssignLeadPayload,
        BulkAssignPayload, BulkAssignResult, BulkDeletePayload, BulkDeleteResult, CreateLeadPayload,
        ImportLeadsPayload, ImportReport, Lead, LeadDetail, LeadFilter, LeadNote, LeadPage, LinkWhatsappNumberPayload,
        RequirementInput, UpdateStatusPayload,
    },
};

// =============================================================================
//  LISTAGEM E DETALHE
// =============================================================================

// GET /api/leads
#[utoipa::path(
    get,
    path = "/api/leads",
    tag = "Leads",
    params(
        ("search" = Option<String>, Query, description = "Busca em nome, e-mail, telefone, cidade e requisito"),
        ("status" = Option<String>, Query, description = "Status exato ou 'Other'"),
        ("assignedTo" = Option<String>, Query, description = "UUID do usuário ou 'unassigned'"),
        ("fromDate" = Option<String>, Query, description = "YYYY-MM-DD"),
        ("toDate" = Option<String>, Query, description = "YYYY-MM-DD (inclusivo)"),
        ("sortField" = Option<String>, Query),
        ("sortOrder" = Option<String>, Query),
        ("page" = Option<i64>, Query),
        ("limit" = Option<i64>, Query)
    ),
    responses(
        (status = 200, description = "Página de leads", body = LeadPage),
        (status = 400, description = "Filtro inválido")
    ),
    security(("api_jwt" = []))
)]
pub async fn list_leads(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(filter): Query<LeadFilter>,
) -> Result<Json<LeadPage>, AppError> {
    Ok(Json(app_state.lead_service.list(&filter, &user).await?))
}

// GET /api/leads/export/pdf
#[utoipa::path(
    get,
    path = "/api/leads/export/pdf",
    tag = "Leads",
    params(
        ("search" = Option<String>, Query, description = "Mesmos filtros da listagem"),
        ("status" = Option<String>, Query),
        ("assignedTo" = Option<String>, Query),
        ("fromDate" = Option<String>, Query),
        ("toDate" = Option<String>, Query),
        ("sortField" = Option<String>, Query),
        ("sortOrder" = Option<String>, Query)
    ),
    responses(
        (status = 200, description = "Relatório de leads", content_type = "application/pdf"),
        (status = 400, description = "Filtro inválido")
    ),
    security(("api_jwt" = []))
)]
pub async fn export_leads_pdf(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(filter): Query<LeadFilter>,
) -> Result<Response, AppError> {
    let rows = app_state.lead_service.export_rows(&filter, &user).await?;

    let document_service = app_state.document_service.clone();
    let pdf_bytes = tokio::task::spawn_blocking(move || document_service.generate_leads_pdf(&rows))
        .await
        .map_err(|e| anyhow::anyhow!("Falha na task do PDF: {}", e))??;

    let headers = [
        (header::CONTENT_TYPE, "application/pdf"),
        (header::CONTENT_DISPOSITION, "attachment; filename=\"leads.pdf\""),
    ];

    Ok((headers, pdf_bytes).into_response())
}

// GET /api/leads/{id}
#[utoipa::path(
    get,
    path = "/api/leads/{id}",
    tag = "Leads",
    params(("id" = Uuid, Path, description = "ID do lead")),
    responses(
        (status = 200, description = "Lead com requisitos, notas, histórico e chats", body = LeadDetail),
        (status = 403, description = "Lead de outro vendedor"),
        (status = 404, description = "Lead não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_lead(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<LeadDetail>, AppError> {
    Ok(Json(app_state.lead_service.detail(id, &user).await?))
}

// =============================================================================
//  CRIAÇÃO E ATRIBUIÇÃO
// =============================================================================

// POST /api/leads
#[utoipa::path(
    post,
    path = "/api/leads",
    tag = "Leads",
    request_body = CreateLeadPayload,
    responses(
        (status = 201, description = "Lead criado", body = Lead),
        (status = 400, description = "Dados ou telefone inválidos")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_lead(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(payload): Json<CreateLeadPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let lead = app_state.lead_service.create_manual(&payload, &user).await?;
    Ok((StatusCode::CREATED, Json(lead)))
}

// POST /api/leads/{id}/assign
#[utoipa::path(
    post,
    path = "/api/leads/{id}/assign",
    tag = "Leads",
    params(("id" = Uuid, Path, description = "ID do lead")),
    request_body = AssignLeadPayload,
    responses(
        (status = 200, description = "Lead atribuído", body = Lead),
        (status = 403, description = "Apenas admins"),
        (status = 404, description = "Lead ou usuário não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn assign_lead(
    State(app_state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignLeadPayload>,
) -> Result<Json<Lead>, AppError> {
    Ok(Json(app_state.lead_service.assign(id, payload.user_id, &admin).await?))
}

// POST /api/leads/bulk-assign
#[utoipa::path(
    post,
    path = "/api/leads/bulk-assign",
    tag = "Leads",
    request_body = BulkAssignPayload,
    responses(
        (status = 200, description = "Resultado da atribuição em lote", body = BulkAssignResult),
        (status = 403, description = "Apenas admins")
    ),
    security(("api_jwt" = []))
)]
pub async fn bulk_assign(
    State(app_state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(payload): Json<BulkAssignPayload>,
) -> Result<Json<BulkAssignResult>, AppError> {
    let result = app_state
        .lead_service
        .bulk_assign(&payload.lead_ids, payload.user_id, &admin)
        .await?;
    Ok(Json(result))
}

// =============================================================================
//  ATUALIZAÇÕES
// =============================================================================

// POST /api/leads/{id}/status
#[utoipa::path(
    post,
    path = "/api/leads/{id}/status",
    tag = "Leads",
    params(("id" = Uuid, Path, description = "ID do lead")),
    request_body = UpdateStatusPayload,
    responses(
        (status = 200, description = "Status atualizado", body = Lead),
        (status = 400, description = "Status vazio")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_status(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusPayload>,
) -> Result<Json<Lead>, AppError> {
    Ok(Json(app_state.lead_service.update_status(id, &payload, &user).await?))
}

// POST /api/leads/{id}/notes
#[utoipa::path(
    post,
    path = "/api/leads/{id}/notes",
    tag = "Leads",
    params(("id" = Uuid, Path, description = "ID do lead")),
    request_body = AddNotePayload,
    responses((status = 201, description = "Nota adicionada", body = LeadNote)),
    security(("api_jwt" = []))
)]
pub async fn add_note(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddNotePayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let note = app_state.lead_service.add_note(id, &payload, &user).await?;
    Ok((StatusCode::CREATED, Json(note)))
}

// POST /api/leads/{id}/alternate-number
#[utoipa::path(
    post,
    path = "/api/leads/{id}/alternate-number",
    tag = "Leads",
    params(("id" = Uuid, Path, description = "ID do lead")),
    request_body = AlternateNumberPayload,
    responses(
        (status = 204, description = "Número alternativo salvo (ou removido)"),
        (status = 400, description = "Telefone inválido")
    ),
    security(("api_jwt" = []))
)]
pub async fn set_alternate_number(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<AlternateNumberPayload>,
) -> Result<StatusCode, AppError> {
    app_state
        .lead_service
        .set_alternate_number(id, payload.alternate_number.as_deref(), &user)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// POST /api/leads/{id}/whatsapp-number
#[utoipa::path(
    post,
    path = "/api/leads/{id}/whatsapp-number",
    tag = "Leads",
    params(("id" = Uuid, Path, description = "ID do lead")),
    request_body = LinkWhatsappNumberPayload,
    responses(
        (status = 204, description = "Número da empresa vinculado"),
        (status = 404, description = "Número desconhecido")
    ),
    security(("api_jwt" = []))
)]
pub async fn link_whatsapp_number(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<LinkWhatsappNumberPayload>,
) -> Result<StatusCode, AppError> {
    let phone_number_id = payload.phone_number_id.trim();
    app_state.whatsapp_service.ensure_active_number(phone_number_id).await?;
    app_state
        .lead_service
        .link_whatsapp_number(id, phone_number_id, &user)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
//  EXCLUSÃO (apenas admin)
// =============================================================================

// DELETE /api/leads/{id}
#[utoipa::path(
    delete,
    path = "/api/leads/{id}",
    tag = "Leads",
    params(("id" = Uuid, Path, description = "ID do lead")),
    responses(
        (status = 204, description = "Lead excluído"),
        (status = 403, description = "Apenas admins"),
        (status = 404, description = "Lead não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_lead(
    State(app_state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    app_state.lead_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// POST /api/leads/bulk-delete
#[utoipa::path(
    post,
    path = "/api/leads/bulk-delete",
    tag = "Leads",
    request_body = BulkDeletePayload,
    responses(
        (status = 200, description = "Resultado da exclusão em lote", body = BulkDeleteResult),
        (status = 403, description = "Apenas admins")
    ),
    security(("api_jwt" = []))
)]
pub async fn bulk_delete(
    State(app_state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Json(payload): Json<BulkDeletePayload>,
) -> Result<Json<BulkDeleteResult>, AppError> {
    Ok(Json(app_state.lead_service.bulk_delete(&payload.lead_ids).await?))
}

// =============================================================================
//  REQUISITOS
// =============================================================================

// POST /api/leads/{id}/requirements
#[utoipa::path(
    post,
    path = "/api/leads/{id}/requirements",
    tag = "Leads",
    params(("id" = Uuid, Path, description = "ID do lead")),
    request_body = AddRequirementsPayload,
    responses(
        (status = 201, description = "Requisitos adicionados"),
        (status = 404, description = "Cadeira/cor não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn add_requirements(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddRequirementsPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    app_state
        .lead_service
        .add_requirements(id, &payload.requirements, &user)
        .await?;
    Ok((StatusCode::CREATED, Json(json!({ "added": payload.requirements.len() }))))
}

// PUT /api/leads/{id}/requirements/{req_id}
#[utoipa::path(
    put,
    path = "/api/leads/{id}/requirements/{req_id}",
    tag = "Leads",
    params(
        ("id" = Uuid, Path, description = "ID do lead"),
        ("req_id" = Uuid, Path, description = "ID do requisito")
    ),
    request_body = RequirementInput,
    responses((status = 204, description = "Requisito atualizado")),
    security(("api_jwt" = []))
)]
pub async fn update_requirement(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path((id, req_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<RequirementInput>,
) -> Result<StatusCode, AppError> {
    payload.validate()?;
    app_state
        .lead_service
        .update_requirement(id, req_id, &payload, &user)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// DELETE /api/leads/{id}/requirements/{req_id}
#[utoipa::path(
    delete,
    path = "/api/leads/{id}/requirements/{req_id}",
    tag = "Leads",
    params(
        ("id" = Uuid, Path, description = "ID do lead"),
        ("req_id" = Uuid, Path, description = "ID do requisito")
    ),
    responses((status = 204, description = "Requisito removido")),
    security(("api_jwt" = []))
)]
pub async fn delete_requirement(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path((id, req_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    app_state
        .lead_service
        .delete_requirement(id, req_id, &user)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
//  IMPORTAÇÃO
// =============================================================================

// POST /api/leads/import
#[utoipa::path(
    post,
    path = "/api/leads/import",
    tag = "Leads",
    request_body = ImportLeadsPayload,
    responses(
        (status = 200, description = "Resumo da importação", body = ImportReport),
        (status = 400, description = "Origem diferente de excel_upload/google_sheet"),
        (status = 403, description = "Apenas admins")
    ),
    security(("api_jwt" = []))
)]
pub async fn import_leads(
    State(app_state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(payload): Json<ImportLeadsPayload>,
) -> Result<Json<ImportReport>, AppError> {
    payload.validate()?;
    Ok(Json(app_state.lead_service.import_leads(&payload, &admin).await?))
}
