// src/config.rs

use std::{env, sync::Arc, time::Duration};

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    db::{
        stores::{ChatStore, LeadStore},
        ChairRepository, ChatRepository, DashboardRepository, LeadRepository, ProformaRepository,
        UserRepository, WhatsappNumberRepository,
    },
    services::{
        auth::AuthService,
        chair_service::ChairService,
        dashboard_service::DashboardService,
        dispatcher::MessageDispatcher,
        document_service::DocumentService,
        graph_client::{GraphClient, DEFAULT_GRAPH_BASE_URL},
        lead_service::LeadService,
        live_hub::LiveHub,
        proforma_service::ProformaService,
        token_manager::{MetaTokenManager, TokenConfig, TokenStore},
        webhook_service::WebhookService,
        whatsapp_service::WhatsappService,
    },
};

pub const DEFAULT_COUNTRY_CODE: &str = "91";
pub const DEFAULT_COMPANY_STATE: &str = "Maharashtra";
pub const DEFAULT_COMPANY_NAME: &str = "Olive Seating";
pub const DEFAULT_PORT: u16 = 3000;

// Variável opcional: ausente ou vazia vira None
fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Credenciais e IDs da Meta (Graph API, WhatsApp Business, Lead Ads).
#[derive(Debug, Clone, Default)]
pub struct MetaConfig {
    pub app_id: Option<String>,
    pub app_secret: Option<String>,
    pub user_access_token: Option<String>,
    pub page_id: Option<String>,
    pub waba_id: Option<String>,
    pub verify_token: Option<String>,
    pub graph_base_url: String,
}

impl MetaConfig {
    pub fn from_env() -> Self {
        Self {
            app_id: optional_var("META_APP_ID"),
            app_secret: optional_var("META_APP_SECRET"),
            user_access_token: optional_var("META_USER_ACCESS_TOKEN"),
            page_id: optional_var("META_PAGE_ID"),
            waba_id: optional_var("META_WABA_ID"),
            verify_token: optional_var("META_VERIFY_TOKEN"),
            graph_base_url: optional_var("META_GRAPH_BASE_URL")
                .unwrap_or_else(|| DEFAULT_GRAPH_BASE_URL.to_string()),
        }
    }

    pub fn token_config(&self) -> TokenConfig {
        TokenConfig {
            app_id: self.app_id.clone(),
            app_secret: self.app_secret.clone(),
            user_access_token: self.user_access_token.clone(),
            page_id: self.page_id.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt_secret: String,
    pub default_country_code: String,
    pub company_state: String,
    pub company_name: String,
    pub port: u16,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
    pub meta: MetaConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL deve ser definida")?;
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET deve ser definido")?;

        let port = match optional_var("PORT") {
            Some(raw) => raw.parse().with_context(|| format!("PORT inválida: {}", raw))?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            database_url,
            jwt_secret,
            default_country_code: optional_var("DEFAULT_COUNTRY_CODE")
                .unwrap_or_else(|| DEFAULT_COUNTRY_CODE.to_string()),
            company_state: optional_var("COMPANY_STATE")
                .unwrap_or_else(|| DEFAULT_COMPANY_STATE.to_string()),
            company_name: optional_var("COMPANY_NAME")
                .unwrap_or_else(|| DEFAULT_COMPANY_NAME.to_string()),
            port,
            admin_username: optional_var("ADMIN_USERNAME"),
            admin_password: optional_var("ADMIN_PASSWORD"),
            meta: MetaConfig::from_env(),
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub config: Arc<AppConfig>,
    pub live_hub: LiveHub,

    pub auth_service: AuthService,
    pub lead_service: LeadService,
    pub chair_service: ChairService,
    pub proforma_service: ProformaService,
    pub document_service: DocumentService,
    pub dashboard_service: DashboardService,
    pub whatsapp_service: WhatsappService,
    pub webhook_service: WebhookService,
}

impl AppState {
    pub async fn new() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let config = AppConfig::from_env()?;

        // Conecta ao banco de dados, usando '?' para propagar erros
        let db_pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.database_url)
            .await?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        if config.meta.app_secret.is_none() {
            tracing::warn!("⚠️ META_APP_SECRET não configurado: envios pelo WhatsApp vão falhar");
        }

        Ok(Self::build(db_pool, config)?)
    }

    // --- Monta o gráfico de dependências ---
    pub fn build(db_pool: PgPool, config: AppConfig) -> Result<Self, crate::common::error::AppError> {
        let cc = config.default_country_code.clone();

        let user_repo = UserRepository::new(db_pool.clone());
        let lead_repo = LeadRepository::new(db_pool.clone());
        let chair_repo = ChairRepository::new(db_pool.clone());
        let numbers_repo = WhatsappNumberRepository::new(db_pool.clone());

        let leads: Arc<dyn LeadStore> = Arc::new(lead_repo.clone());
        let chats: Arc<dyn ChatStore> = Arc::new(ChatRepository::new(db_pool.clone()));

        let graph = Arc::new(GraphClient::new(&config.meta.graph_base_url)?);
        let tokens: Arc<dyn TokenStore> =
            Arc::new(MetaTokenManager::new(graph.clone(), config.meta.token_config()));
        let live_hub = LiveHub::new();

        let dispatcher = MessageDispatcher::new(
            leads.clone(),
            chats.clone(),
            graph.clone(),
            tokens.clone(),
            live_hub.clone(),
            cc.clone(),
        );

        Ok(Self {
            auth_service: AuthService::new(user_repo.clone(), config.jwt_secret.clone()),
            lead_service: LeadService::new(
                lead_repo.clone(),
                chats.clone(),
                user_repo.clone(),
                chair_repo.clone(),
                cc.clone(),
            ),
            chair_service: ChairService::new(chair_repo),
            proforma_service: ProformaService::new(
                lead_repo,
                ProformaRepository::new(db_pool.clone()),
                config.company_state.clone(),
            ),
            document_service: DocumentService::new(config.company_name.clone()),
            dashboard_service: DashboardService::new(DashboardRepository::new(db_pool.clone()), user_repo),
            whatsapp_service: WhatsappService::new(
                leads.clone(),
                dispatcher,
                numbers_repo,
                graph.clone(),
                tokens.clone(),
                config.meta.waba_id.clone(),
            ),
            webhook_service: WebhookService::new(leads, chats, graph, tokens, live_hub.clone(), cc),
            live_hub,
            db_pool,
            config: Arc::new(config),
        })
    }
}
