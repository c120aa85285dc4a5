use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// Nosso tipo de erro, com `thiserror` para melhor ergonomia.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Usuário já existe")]
    UsernameAlreadyExists,

    #[error("Credenciais inválidas")]
    InvalidCredentials,

    #[error("Token inválido")]
    InvalidToken,

    #[error("Usuário não encontrado")]
    UserNotFound,

    #[error("Acesso negado")]
    Forbidden,

    #[error("Lead não encontrado")]
    LeadNotFound,

    #[error("Recurso não encontrado: {0}")]
    NotFound(String),

    #[error("Número de telefone inválido: {0}")]
    InvalidPhoneNumber(String),

    #[error("Requisição inválida: {0}")]
    BadRequest(String),

    #[error("Violação de unicidade: {0}")]
    UniqueConstraintViolation(String),

    // --- Mensageria (WhatsApp / Graph API) ---

    // Erros de configuração: fatais para a operação, nunca são retentados
    #[error("Lead não está vinculado a um número do WhatsApp")]
    LeadWithoutWhatsappNumber,

    #[error("META_APP_SECRET não configurado")]
    MissingAppSecret,

    #[error("Configuração da Meta ausente: {0}")]
    MissingMetaConfig(&'static str),

    #[error("Sessão de 24h expirada: é obrigatório enviar um template")]
    TemplateRequired,

    // Token rejeitado mesmo depois do refresh + retry
    #[error("Provedor rejeitou a autorização: {0}")]
    ProviderUnauthorized(String),

    // Destinatário inválido, rate limit, payload malformado...
    #[error("Provedor rejeitou a requisição: {0}")]
    ProviderRejected(String),

    #[error("Falha de comunicação com o provedor: {0}")]
    ProviderUnavailable(String),

    // Variante para erros de banco de dados (exemplo com sqlx)
    #[error("Erro de banco de dados")]
    DatabaseError(#[from] sqlx::Error),

    // Variante genérica para qualquer outro erro inesperado
    // `anyhow::Error` é ótimo para capturar o contexto do erro.
    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),

    #[error("Erro de Bcrypt: {0}")]
    BcryptError(#[from] bcrypt::BcryptError),

    #[error("Erro de JWT: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    #[error("Erro do cliente HTTP: {0}")]
    HttpClientError(#[from] reqwest::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            // Retorna todos os detalhes da validação.
            AppError::ValidationError(errors) => {
                let mut details = std::collections::HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors.iter()
                        .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                let body = Json(json!({
                    "error": "Um ou mais campos são inválidos.",
                    "details": details,
                }));
                return (StatusCode::BAD_REQUEST, body).into_response();
            }
            AppError::UsernameAlreadyExists => (StatusCode::CONFLICT, "Este usuário já está em uso.".to_string()),
            AppError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "Usuário ou senha inválidos.".to_string()),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "Token de autenticação inválido ou ausente.".to_string()),
            AppError::UserNotFound => (StatusCode::NOT_FOUND, "Usuário não encontrado.".to_string()),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "Você não tem permissão para esta ação.".to_string()),
            AppError::LeadNotFound => (StatusCode::NOT_FOUND, "Lead não encontrado.".to_string()),
            AppError::NotFound(what) => (StatusCode::NOT_FOUND, format!("{} não encontrado.", what)),
            AppError::InvalidPhoneNumber(raw) => (StatusCode::BAD_REQUEST, format!("Número de telefone inválido: '{}'.", raw)),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::UniqueConstraintViolation(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::TemplateRequired => (StatusCode::BAD_REQUEST, "Template required when session is expired.".to_string()),
            AppError::LeadWithoutWhatsappNumber => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "Lead não está vinculado a um número do WhatsApp.".to_string(),
            ),
            AppError::ProviderUnauthorized(msg) | AppError::ProviderRejected(msg) => {
                tracing::warn!("⚠️ Envio rejeitado pelo provedor: {}", msg);
                (StatusCode::BAD_GATEWAY, format!("Falha ao enviar mensagem pelo WhatsApp: {}", msg))
            }
            AppError::ProviderUnavailable(msg) => {
                tracing::warn!("⚠️ Provedor indisponível: {}", msg);
                (StatusCode::BAD_GATEWAY, "Provedor do WhatsApp indisponível.".to_string())
            }

            // Todos os outros erros (configuração, banco, internos) viram 500.
            // O `tracing` loga a mensagem detalhada que `thiserror` nos deu.
            e => {
                tracing::error!("Erro Interno do Servidor: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Ocorreu um erro inesperado.".to_string())
            }
        };

        // Resposta padrão para erros simples que só têm uma mensagem.
        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}
