// src/services/graph_client.rs

// Cliente fino da Graph API da Meta. Não guarda tokens: quem chama passa o
// token e o appsecret_proof de cada requisição (ver token_manager.rs).

use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use thiserror::Error;

use crate::{
    common::error::AppError,
    models::whatsapp::{LeadgenData, TemplateSummary},
};

pub const DEFAULT_GRAPH_BASE_URL: &str = "https://graph.facebook.com/v23.0";

// Código de erro da Graph API para token inválido/expirado
const OAUTH_EXCEPTION_CODE: i64 = 190;

const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("token rejeitado: {0}")]
    Unauthorized(String),

    #[error("requisição rejeitada ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("falha de transporte: {0}")]
    Transport(String),
}

impl GraphError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, GraphError::Unauthorized(_))
    }
}

impl From<GraphError> for AppError {
    fn from(err: GraphError) -> Self {
        match err {
            GraphError::Unauthorized(msg) => AppError::ProviderUnauthorized(msg),
            GraphError::Rejected { message, .. } => AppError::ProviderRejected(message),
            GraphError::Transport(msg) => AppError::ProviderUnavailable(msg),
        }
    }
}

// { "error": { "message", "type", "code" } }
#[derive(Debug, Deserialize)]
struct GraphErrorEnvelope {
    error: GraphErrorBody,
}

#[derive(Debug, Deserialize)]
struct GraphErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    code: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct DataList<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    messages: Vec<SentMessage>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ExchangeResponse {
    access_token: String,
}

/// Página retornada por `/me/accounts`.
#[derive(Debug, Clone, Deserialize)]
pub struct PageAccount {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub access_token: String,
}

/// Número retornado por `/{waba_id}/phone_numbers`.
#[derive(Debug, Clone, Deserialize)]
pub struct PhoneNumberInfo {
    pub id: String,
    #[serde(default)]
    pub display_phone_number: String,
    #[serde(default)]
    pub verified_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TemplateInfo {
    name: String,
    #[serde(default)]
    language: String,
}

#[derive(Clone)]
pub struct GraphClient {
    http: Client,
    base_url: String,
}

impl GraphClient {
    pub fn new(base_url: &str) -> Result<Self, AppError> {
        let http = Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorized(&self, req: RequestBuilder, token: &str, proof: &str) -> RequestBuilder {
        req.bearer_auth(token).query(&[("appsecret_proof", proof)])
    }

    // =========================================================================
    //  ENDPOINTS
    // =========================================================================

    /// POST /{phone_number_id}/messages. Retorna o id da mensagem (wamid).
    pub async fn send_message(
        &self,
        phone_number_id: &str,
        token: &str,
        proof: &str,
        payload: &Value,
    ) -> Result<Option<String>, GraphError> {
        let req = self.authorized(
            self.http.post(self.url(&format!("{}/messages", phone_number_id))),
            token,
            proof,
        );
        let response: SendResponse = self.execute(req.json(payload)).await?;
        Ok(response.messages.into_iter().next().map(|m| m.id))
    }

    /// Troca o token atual por um long-lived (`fb_exchange_token`).
    pub async fn exchange_token(
        &self,
        app_id: &str,
        app_secret: &str,
        current_token: &str,
    ) -> Result<String, GraphError> {
        let req = self.http.get(self.url("oauth/access_token")).query(&[
            ("grant_type", "fb_exchange_token"),
            ("client_id", app_id),
            ("client_secret", app_secret),
            ("fb_exchange_token", current_token),
        ]);
        let response: ExchangeResponse = self.execute(req).await?;
        Ok(response.access_token)
    }

    pub async fn list_pages(&self, user_token: &str, proof: &str) -> Result<Vec<PageAccount>, GraphError> {
        let req = self.authorized(self.http.get(self.url("me/accounts")), user_token, proof);
        let response: DataList<PageAccount> = self.execute(req).await?;
        Ok(response.data)
    }

    pub async fn fetch_leadgen(
        &self,
        leadgen_id: &str,
        page_token: &str,
        proof: &str,
    ) -> Result<LeadgenData, GraphError> {
        let req = self.authorized(self.http.get(self.url(leadgen_id)), page_token, proof);
        self.execute(req).await
    }

    pub async fn list_phone_numbers(
        &self,
        waba_id: &str,
        token: &str,
        proof: &str,
    ) -> Result<Vec<PhoneNumberInfo>, GraphError> {
        let req = self.authorized(
            self.http.get(self.url(&format!("{}/phone_numbers", waba_id))),
            token,
            proof,
        );
        let response: DataList<PhoneNumberInfo> = self.execute(req).await?;
        Ok(response.data)
    }

    pub async fn list_templates(
        &self,
        waba_id: &str,
        token: &str,
        proof: &str,
    ) -> Result<Vec<TemplateSummary>, GraphError> {
        let req = self.authorized(
            self.http.get(self.url(&format!("{}/message_templates", waba_id))),
            token,
            proof,
        );
        let response: DataList<TemplateInfo> = self.execute(req).await?;
        Ok(response
            .data
            .into_iter()
            .map(|t| TemplateSummary { name: t.name, language: t.language })
            .collect())
    }

    // =========================================================================
    //  EXECUÇÃO + CLASSIFICAÇÃO DE ERROS
    // =========================================================================

    async fn execute<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, GraphError> {
        let response = req
            .send()
            .await
            .map_err(|e| GraphError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GraphError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(classify_error(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| GraphError::Rejected {
            status: status.as_u16(),
            message: format!("resposta inesperada da Graph API: {}", e),
        })
    }
}

/// HTTP 401 ou código 190 = autorização; o resto é rejeição do provedor.
fn classify_error(status: StatusCode, body: &str) -> GraphError {
    let parsed = serde_json::from_str::<GraphErrorEnvelope>(body).ok();

    let message = parsed
        .as_ref()
        .map(|e| match &e.error.kind {
            Some(kind) => format!("{} ({})", e.error.message, kind),
            None => e.error.message.clone(),
        })
        .unwrap_or_else(|| format!("HTTP {}: {}", status.as_u16(), body));

    let code = parsed.as_ref().and_then(|e| e.error.code);

    if status == StatusCode::UNAUTHORIZED || code == Some(OAUTH_EXCEPTION_CODE) {
        GraphError::Unauthorized(message)
    } else {
        GraphError::Rejected { status: status.as_u16(), message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    #[test]
    fn expired_token_code_is_unauthorized_even_with_400() {
        let body = json!({"error": {"message": "Session has expired", "type": "OAuthException", "code": 190}});
        let err = classify_error(StatusCode::BAD_REQUEST, &body.to_string());
        assert!(err.is_unauthorized());
    }

    #[test]
    fn other_codes_are_rejections() {
        let body = json!({"error": {"message": "Invalid parameter", "type": "OAuthException", "code": 100}});
        match classify_error(StatusCode::BAD_REQUEST, &body.to_string()) {
            GraphError::Rejected { status, message } => {
                assert_eq!(status, 400);
                assert!(message.contains("Invalid parameter"));
            }
            other => panic!("esperava Rejected, veio {:?}", other),
        }
    }

    #[test]
    fn non_json_error_body_is_kept_in_message() {
        match classify_error(StatusCode::BAD_GATEWAY, "upstream down") {
            GraphError::Rejected { message, .. } => assert!(message.contains("upstream down")),
            other => panic!("esperava Rejected, veio {:?}", other),
        }
    }

    #[tokio::test]
    async fn send_message_returns_provider_id() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/1001/messages")
            .match_query(Matcher::UrlEncoded("appsecret_proof".into(), "proof".into()))
            .match_header("authorization", "Bearer tok")
            .match_body(Matcher::PartialJson(json!({"messaging_product": "whatsapp", "type": "text"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({"messages": [{"id": "wamid.ABC"}]}).to_string())
            .create_async()
            .await;

        let client = GraphClient::new(&server.url()).unwrap();
        let payload = json!({"messaging_product": "whatsapp", "to": "+919876543210", "type": "text", "text": {"body": "hi"}});
        let id = client.send_message("1001", "tok", "proof", &payload).await.unwrap();

        assert_eq!(id.as_deref(), Some("wamid.ABC"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn http_401_maps_to_unauthorized() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/me/accounts")
            .match_query(Matcher::Any)
            .with_status(401)
            .with_body(json!({"error": {"message": "bad token", "code": 190}}).to_string())
            .create_async()
            .await;

        let client = GraphClient::new(&server.url()).unwrap();
        let err = client.list_pages("tok", "proof").await.unwrap_err();
        assert!(err.is_unauthorized());
        assert!(matches!(AppError::from(err), AppError::ProviderUnauthorized(_)));
    }

    #[tokio::test]
    async fn templates_are_flattened_to_name_and_language() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/waba-1/message_templates")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                json!({"data": [
                    {"name": "welcome", "language": "en_US", "status": "APPROVED"},
                    {"name": "followup", "language": "hi", "status": "APPROVED"}
                ]})
                .to_string(),
            )
            .create_async()
            .await;

        let client = GraphClient::new(&server.url()).unwrap();
        let templates = client.list_templates("waba-1", "tok", "proof").await.unwrap();
        assert_eq!(templates.len(), 2);
        assert_eq!(templates[0].name, "welcome");
        assert_eq!(templates[1].language, "hi");
    }
}
