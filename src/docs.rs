// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use crate::handlers;
use crate::models;
use crate::services;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Auth ---
        handlers::auth::register,
        handlers::auth::login,

        // --- Users ---
        handlers::auth::get_me,
        handlers::auth::list_users,
        handlers::auth::update_user,
        handlers::auth::delete_user,

        // --- Leads ---
        handlers::leads::list_leads,
        handlers::leads::export_leads_pdf,
        handlers::leads::import_leads,
        handlers::leads::get_lead,
        handlers::leads::create_lead,
        handlers::leads::assign_lead,
        handlers::leads::bulk_assign,
        handlers::leads::update_status,
        handlers::leads::add_note,
        handlers::leads::set_alternate_number,
        handlers::leads::link_whatsapp_number,
        handlers::leads::delete_lead,
        handlers::leads::bulk_delete,
        handlers::leads::add_requirements,
        handlers::leads::update_requirement,
        handlers::leads::delete_requirement,

        // --- Chairs ---
        handlers::chairs::create_chair,
        handlers::chairs::list_chairs,
        handlers::chairs::add_color,
        handlers::chairs::update_chair,
        handlers::chairs::delete_chair,
        handlers::chairs::update_color,
        handlers::chairs::delete_color,

        // --- WhatsApp ---
        handlers::whatsapp::send_message,
        handlers::whatsapp::list_numbers,
        handlers::whatsapp::sync_numbers,
        handlers::whatsapp::list_templates,

        // --- Proforma ---
        handlers::proforma::create_pi,
        handlers::proforma::list_pis,
        handlers::proforma::update_pi,
        handlers::proforma::download_pdf,
        handlers::proforma::delete_pi,

        // --- Dashboard ---
        handlers::dashboard::get_dashboard,

        // --- Admin ---
        handlers::admin::backfill_phones,
    ),
    components(
        schemas(
            // --- Auth ---
            models::auth::UserRole,
            models::auth::User,
            models::auth::RegisterUserPayload,
            models::auth::UpdateUserPayload,
            models::auth::LoginUserPayload,
            models::auth::AuthResponse,

            // --- Leads ---
            models::lead::LeadSource,
            models::lead::Lead,
            models::lead::LeadNote,
            models::lead::StatusHistoryEntry,
            models::lead::RequirementLine,
            models::lead::LeadPage,
            models::lead::LeadDetail,
            models::lead::BulkAssignResult,
            models::lead::BulkDeleteResult,
            models::lead::BackfillReport,
            models::lead::ImportReport,
            services::session_window::SessionState,

            // --- Payloads ---
            models::lead::CreateLeadPayload,
            models::lead::AssignLeadPayload,
            models::lead::BulkAssignPayload,
            models::lead::BulkDeletePayload,
            models::lead::UpdateStatusPayload,
            models::lead::AddNotePayload,
            models::lead::AlternateNumberPayload,
            models::lead::LinkWhatsappNumberPayload,
            models::lead::RequirementInput,
            models::lead::AddRequirementsPayload,
            models::lead::ImportLeadRow,
            models::lead::ImportLeadsPayload,

            // --- Chairs ---
            models::chair::Chair,
            models::chair::ChairColor,
            models::chair::ChairWithColors,
            models::chair::CreateChairPayload,
            models::chair::AddColorPayload,
            models::chair::UpdateChairPayload,
            models::chair::UpdateColorPayload,

            // --- Chat / WhatsApp ---
            models::chat::ChatDirection,
            models::chat::MessageKind,
            models::chat::ChatMessage,
            models::whatsapp::WhatsappNumber,
            models::whatsapp::TemplateSummary,
            models::whatsapp::SyncNumbersResult,
            models::whatsapp::SendWhatsappPayload,

            // --- Proforma ---
            models::proforma::GstType,
            models::proforma::PiStatus,
            models::proforma::Address,
            models::proforma::PiItem,
            models::proforma::ProformaInvoice,
            models::proforma::CreateProformaPayload,
            models::proforma::DeleteProformaPayload,

            // --- Dashboard ---
            models::dashboard::StatusSummary,
            models::dashboard::UserPerformance,
            models::dashboard::ChairSalesEntry,
            models::dashboard::Dashboard,
        )
    ),
    tags(
        (name = "Auth", description = "Autenticação e Registro"),
        (name = "Users", description = "Dados do Usuário e Equipe"),
        (name = "Leads", description = "Gestão de Leads, Notas e Requisitos"),
        (name = "Chairs", description = "Catálogo de Cadeiras e Cores"),
        (name = "WhatsApp", description = "Envio de Mensagens, Números e Templates"),
        (name = "Proforma", description = "Proforma Invoices (PI)"),
        (name = "Dashboard", description = "Indicadores de Vendas"),
        (name = "Admin", description = "Manutenção")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
    }
}
