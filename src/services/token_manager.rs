// src/services/token_manager.rs

use std::{
    future::Future,
    sync::{Arc, PoisonError, RwLock},
};

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{info, warn};

use crate::{
    common::error::AppError,
    services::graph_client::{GraphClient, PageAccount},
};

type HmacSha256 = Hmac<Sha256>;

/// Fonte dos tokens da Meta. Uma instância por processo, compartilhada via `Arc`.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Token de usuário (long-lived) atual.
    fn get_user_token(&self) -> Result<String, AppError>;

    /// Token da página; busca via `/me/accounts` se ainda não houver.
    async fn get_page_token(&self) -> Result<String, AppError>;

    fn set_user_token(&self, token: String);

    fn set_page_token(&self, token: String);

    /// Troca o token de usuário por um novo. Em caso de falha mantém o antigo.
    async fn refresh_user_token(&self) -> Result<(), AppError>;

    /// Recarrega o token da página configurada a partir do token de usuário.
    async fn refresh_page_token(&self) -> Result<(), AppError>;

    /// HMAC-SHA256 (hex) do token com o app secret.
    fn app_secret_proof(&self, token: &str) -> Result<String, AppError>;
}

pub fn compute_app_secret_proof(app_secret: &str, token: &str) -> Result<String, AppError> {
    let mut mac = HmacSha256::new_from_slice(app_secret.as_bytes())
        .map_err(|e| AppError::InternalServerError(anyhow::anyhow!("HMAC inválido: {}", e)))?;
    mac.update(token.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

#[derive(Debug, Default)]
struct Tokens {
    user: Option<String>,
    page: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TokenConfig {
    pub app_id: Option<String>,
    pub app_secret: Option<String>,
    pub user_access_token: Option<String>,
    pub page_id: Option<String>,
}

pub struct MetaTokenManager {
    graph: Arc<GraphClient>,
    app_id: Option<String>,
    app_secret: Option<String>,
    page_id: Option<String>,
    // Nunca fica travado durante um .await
    tokens: RwLock<Tokens>,
}

impl MetaTokenManager {
    pub fn new(graph: Arc<GraphClient>, config: TokenConfig) -> Self {
        Self {
            graph,
            app_id: config.app_id,
            app_secret: config.app_secret,
            page_id: config.page_id,
            tokens: RwLock::new(Tokens {
                user: config.user_access_token,
                page: None,
            }),
        }
    }

    fn read_tokens<T>(&self, f: impl FnOnce(&Tokens) -> T) -> T {
        let guard = self.tokens.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    fn write_tokens(&self, f: impl FnOnce(&mut Tokens)) {
        let mut guard = self.tokens.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard);
    }
}

/// Escolhe a página: a configurada, ou a única existente quando não há configuração.
pub fn select_page(pages: Vec<PageAccount>, page_id: Option<&str>) -> Result<PageAccount, AppError> {
    match page_id {
        Some(wanted) => pages.into_iter().find(|p| p.id == wanted).ok_or_else(|| {
            AppError::ProviderRejected(format!("Página {} não acessível com o token atual.", wanted))
        }),
        None => {
            let mut pages = pages;
            match pages.len() {
                1 => Ok(pages.remove(0)),
                0 => Err(AppError::ProviderRejected(
                    "Nenhuma página acessível com o token atual.".into(),
                )),
                _ => Err(AppError::MissingMetaConfig("META_PAGE_ID")),
            }
        }
    }
}

#[async_trait]
impl TokenStore for MetaTokenManager {
    fn get_user_token(&self) -> Result<String, AppError> {
        self.read_tokens(|t| t.user.clone())
            .ok_or(AppError::MissingMetaConfig("META_USER_ACCESS_TOKEN"))
    }

    async fn get_page_token(&self) -> Result<String, AppError> {
        if let Some(token) = self.read_tokens(|t| t.page.clone()) {
            return Ok(token);
        }
        self.refresh_page_token().await?;
        self.read_tokens(|t| t.page.clone())
            .ok_or_else(|| AppError::ProviderRejected("Token da página indisponível.".into()))
    }

    fn set_user_token(&self, token: String) {
        self.write_tokens(|t| t.user = Some(token));
    }

    fn set_page_token(&self, token: String) {
        self.write_tokens(|t| t.page = Some(token));
    }

    async fn refresh_user_token(&self) -> Result<(), AppError> {
        let app_id = self.app_id.as_deref().ok_or(AppError::MissingMetaConfig("META_APP_ID"))?;
        let app_secret = self.app_secret.as_deref().ok_or(AppError::MissingAppSecret)?;
        let current = self.get_user_token()?;

        match self.graph.exchange_token(app_id, app_secret, &current).await {
            Ok(token) => {
                self.set_user_token(token);
                info!("🔑 Token de usuário da Meta renovado");
                Ok(())
            }
            Err(e) => {
                warn!("⚠️ Falha ao renovar o token de usuário (mantendo o anterior): {}", e);
                Err(e.into())
            }
        }
    }

    async fn refresh_page_token(&self) -> Result<(), AppError> {
        let user_token = self.get_user_token()?;
        let proof = self.app_secret_proof(&user_token)?;

        let pages = self.graph.list_pages(&user_token, &proof).await.map_err(|e| {
            warn!("⚠️ Falha ao listar páginas da Meta: {}", e);
            AppError::from(e)
        })?;

        let page = select_page(pages, self.page_id.as_deref())?;
        info!("🔑 Token da página {} carregado", page.id);
        self.set_page_token(page.access_token);
        Ok(())
    }

    fn app_secret_proof(&self, token: &str) -> Result<String, AppError> {
        let secret = self.app_secret.as_deref().ok_or(AppError::MissingAppSecret)?;
        compute_app_secret_proof(secret, token)
    }
}

/// Executa uma chamada autorizada. Se o provedor rejeitar o token, renova
/// usuário + página uma vez e tenta de novo exatamente uma vez.
pub async fn with_token_retry<T, F, Fut>(tokens: &dyn TokenStore, mut op: F) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    match op().await {
        Err(AppError::ProviderUnauthorized(reason)) => {
            warn!("⚠️ Token da Meta rejeitado ({}), renovando e tentando de novo", reason);

            if let Err(e) = tokens.refresh_user_token().await {
                warn!("Renovação do token de usuário falhou: {}", e);
            }
            if let Err(e) = tokens.refresh_page_token().await {
                warn!("Renovação do token da página falhou: {}", e);
            }

            op().await
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn manager(base_url: &str, page_id: Option<&str>) -> MetaTokenManager {
        let graph = Arc::new(GraphClient::new(base_url).unwrap());
        MetaTokenManager::new(
            graph,
            TokenConfig {
                app_id: Some("app".into()),
                app_secret: Some("secret".into()),
                user_access_token: Some("old".into()),
                page_id: page_id.map(str::to_string),
            },
        )
    }

    fn page(id: &str, token: &str) -> PageAccount {
        PageAccount { id: id.into(), name: None, access_token: token.into() }
    }

    #[test]
    fn proof_is_hex_hmac_sha256() {
        let proof = compute_app_secret_proof("key", "The quick brown fox jumps over the lazy dog").unwrap();
        assert_eq!(proof, "f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8");
    }

    #[test]
    fn missing_secret_is_a_configuration_error() {
        let graph = Arc::new(GraphClient::new("http://localhost").unwrap());
        let manager = MetaTokenManager::new(graph, TokenConfig::default());
        assert!(matches!(manager.app_secret_proof("tok"), Err(AppError::MissingAppSecret)));
        assert!(matches!(manager.get_user_token(), Err(AppError::MissingMetaConfig(_))));
    }

    #[test]
    fn configured_page_wins_over_order() {
        let pages = vec![page("1", "t1"), page("2", "t2")];
        let selected = select_page(pages, Some("2")).unwrap();
        assert_eq!(selected.access_token, "t2");
    }

    #[test]
    fn single_page_is_used_implicitly() {
        let selected = select_page(vec![page("9", "t9")], None).unwrap();
        assert_eq!(selected.id, "9");
    }

    #[test]
    fn multiple_pages_without_configuration_is_an_error() {
        let pages = vec![page("1", "t1"), page("2", "t2")];
        assert!(matches!(
            select_page(pages, None),
            Err(AppError::MissingMetaConfig("META_PAGE_ID"))
        ));
    }

    #[test]
    fn configured_page_missing_from_list_is_an_error() {
        assert!(select_page(vec![page("1", "t1")], Some("7")).is_err());
    }

    #[tokio::test]
    async fn refresh_replaces_user_token() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/oauth/access_token")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "fb_exchange_token".into()),
                Matcher::UrlEncoded("fb_exchange_token".into(), "old".into()),
            ]))
            .with_status(200)
            .with_body(json!({"access_token": "new", "token_type": "bearer"}).to_string())
            .create_async()
            .await;

        let manager = manager(&server.url(), None);
        manager.refresh_user_token().await.unwrap();
        assert_eq!(manager.get_user_token().unwrap(), "new");
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_token() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/oauth/access_token")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(json!({"error": {"message": "Error validating", "code": 190}}).to_string())
            .create_async()
            .await;

        let manager = manager(&server.url(), None);
        assert!(manager.refresh_user_token().await.is_err());
        assert_eq!(manager.get_user_token().unwrap(), "old");
    }

    #[tokio::test]
    async fn page_token_is_fetched_lazily_for_configured_page() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/me/accounts")
            .match_query(Matcher::Any)
            .match_header("authorization", "Bearer old")
            .with_status(200)
            .with_body(
                json!({"data": [
                    {"id": "p1", "name": "One", "access_token": "page-1"},
                    {"id": "p2", "name": "Two", "access_token": "page-2"}
                ]})
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await;

        let manager = manager(&server.url(), Some("p2"));
        assert_eq!(manager.get_page_token().await.unwrap(), "page-2");
        // Segunda chamada usa o cache
        assert_eq!(manager.get_page_token().await.unwrap(), "page-2");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn retry_happens_exactly_once() {
        let server = mockito::Server::new_async().await;
        let manager = manager(&server.url(), None);
        let calls = AtomicUsize::new(0);

        let result: Result<(), AppError> = with_token_retry(&manager, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AppError::ProviderUnauthorized("expired".into())) }
        })
        .await;

        assert!(matches!(result, Err(AppError::ProviderUnauthorized(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn rejections_are_not_retried() {
        let server = mockito::Server::new_async().await;
        let manager = manager(&server.url(), None);
        let calls = AtomicUsize::new(0);

        let result: Result<(), AppError> = with_token_retry(&manager, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AppError::ProviderRejected("bad recipient".into())) }
        })
        .await;

        assert!(matches!(result, Err(AppError::ProviderRejected(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
