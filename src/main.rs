// src/main.rs

use axum::{
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod common;
mod config;
mod db;
mod docs;
mod handlers;
mod middleware;
mod models;
mod services;

use crate::config::AppState;
use crate::middleware::auth::auth_guard;

// Tarefas de inicialização: falhas são logadas e o servidor sobe mesmo assim
async fn run_startup_tasks(app_state: &AppState) {
    if let (Some(username), Some(password)) = (
        app_state.config.admin_username.as_deref(),
        app_state.config.admin_password.as_deref(),
    ) {
        if let Err(e) = app_state.auth_service.seed_admin(username, password).await {
            tracing::error!("🔥 Falha ao criar o admin inicial: {}", e);
        }
    }

    match app_state.lead_service.backfill_contact_numbers().await {
        Ok(report) => tracing::info!("☎️ Backfill inicial: {:?}", report),
        Err(e) => tracing::error!("🔥 Falha no backfill de telefones: {}", e),
    }

    if app_state.config.meta.waba_id.is_some() {
        match app_state.whatsapp_service.sync_numbers().await {
            Ok(result) => tracing::info!(
                "📱 Números do WhatsApp sincronizados: {} novos, {} já conhecidos",
                result.inserted,
                result.already_known
            ),
            Err(e) => tracing::warn!("⚠️ Não foi possível sincronizar os números do WhatsApp: {}", e),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    let app_state = AppState::new().await?;

    // Faz o app rodar as migrações do SQLx na inicialização
    sqlx::migrate!().run(&app_state.db_pool).await?;
    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    run_startup_tasks(&app_state).await;

    // Define as rotas de autenticação (públicas; o register confere o token quando há admins)
    let auth_routes = Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login));

    // Webhooks da Meta (públicos)
    let webhook_routes = Router::new()
        .route(
            "/meta",
            get(handlers::webhooks::verify_meta).post(handlers::webhooks::receive_meta),
        )
        .route(
            "/whatsapp",
            get(handlers::webhooks::verify_whatsapp).post(handlers::webhooks::receive_whatsapp),
        );

    let user_routes = Router::new()
        .route("/", get(handlers::auth::list_users))
        .route("/me", get(handlers::auth::get_me))
        .route(
            "/{id}",
            put(handlers::auth::update_user).delete(handlers::auth::delete_user),
        );

    let lead_routes = Router::new()
        .route(
            "/",
            get(handlers::leads::list_leads).post(handlers::leads::create_lead),
        )
        .route("/import", post(handlers::leads::import_leads))
        .route("/export/pdf", get(handlers::leads::export_leads_pdf))
        .route("/bulk-assign", post(handlers::leads::bulk_assign))
        .route("/bulk-delete", post(handlers::leads::bulk_delete))
        .route(
            "/{id}",
            get(handlers::leads::get_lead).delete(handlers::leads::delete_lead),
        )
        .route("/{id}/assign", post(handlers::leads::assign_lead))
        .route("/{id}/status", post(handlers::leads::update_status))
        .route("/{id}/notes", post(handlers::leads::add_note))
        .route("/{id}/alternate-number", post(handlers::leads::set_alternate_number))
        .route("/{id}/whatsapp-number", post(handlers::leads::link_whatsapp_number))
        .route("/{id}/requirements", post(handlers::leads::add_requirements))
        .route(
            "/{id}/requirements/{req_id}",
            put(handlers::leads::update_requirement).delete(handlers::leads::delete_requirement),
        )
        .route("/{id}/whatsapp/send", post(handlers::whatsapp::send_message))
        .route(
            "/{id}/pi",
            get(handlers::proforma::list_pis).post(handlers::proforma::create_pi),
        )
        .route("/{id}/pi/{pi_id}", put(handlers::proforma::update_pi))
        .route("/{id}/pi/{pi_id}/pdf", get(handlers::proforma::download_pdf))
        .route("/{id}/pi/{pi_id}/delete", post(handlers::proforma::delete_pi));

    let chair_routes = Router::new()
        .route(
            "/",
            get(handlers::chairs::list_chairs).post(handlers::chairs::create_chair),
        )
        .route(
            "/{id}",
            put(handlers::chairs::update_chair).delete(handlers::chairs::delete_chair),
        )
        .route("/{id}/colors", post(handlers::chairs::add_color))
        .route(
            "/{id}/colors/{color_id}",
            put(handlers::chairs::update_color).delete(handlers::chairs::delete_color),
        );

    let whatsapp_routes = Router::new()
        .route("/numbers", get(handlers::whatsapp::list_numbers))
        .route("/numbers/sync", post(handlers::whatsapp::sync_numbers))
        .route("/templates", get(handlers::whatsapp::list_templates));

    // Tudo aqui exige JWT
    let protected_routes = Router::new()
        .nest("/api/users", user_routes)
        .nest("/api/leads", lead_routes)
        .nest("/api/chairs", chair_routes)
        .nest("/api/whatsapp", whatsapp_routes)
        .route("/api/dashboard", get(handlers::dashboard::get_dashboard))
        .route("/api/admin/backfill-phones", post(handlers::admin::backfill_phones))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_guard,
        ));

    // Combina tudo no router principal
    let app = Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api/auth", auth_routes)
        .nest("/webhooks", webhook_routes)
        // O WebSocket faz a própria autenticação (header ou ?token=)
        .route("/api/leads/{id}/live", get(handlers::whatsapp::live_chat))
        .merge(protected_routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", docs::ApiDoc::openapi()))
        .with_state(app_state.clone());

    // Inicia o servidor
    let addr = format!("0.0.0.0:{}", app_state.config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
