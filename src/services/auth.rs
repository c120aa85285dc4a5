// src/services/auth.rs

use bcrypt::{hash, verify};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use tracing::info;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::UserRepository,
    models::auth::{Claims, RegisterUserPayload, UpdateUserPayload, User, UserRole},
};

const TOKEN_TTL_DAYS: i64 = 7;

#[derive(Clone)]
pub struct AuthService {
    user_repo: UserRepository,
    jwt_secret: String,
}

impl AuthService {
    pub fn new(user_repo: UserRepository, jwt_secret: String) -> Self {
        Self { user_repo, jwt_secret }
    }

    async fn hash_password(password: &str) -> Result<String, AppError> {
        // Hashing é caro: roda fora do executor assíncrono
        let password_clone = password.to_owned();
        let hashed = tokio::task::spawn_blocking(move || hash(&password_clone, bcrypt::DEFAULT_COST))
            .await
            .map_err(|e| anyhow::anyhow!("Falha na task de hashing: {}", e))??;
        Ok(hashed)
    }

    /// Cadastra um usuário. Depois do primeiro usuário, só um admin pode cadastrar.
    pub async fn register_user(
        &self,
        requester: Option<&User>,
        payload: &RegisterUserPayload,
    ) -> Result<User, AppError> {
        let role = if self.user_repo.count_admins().await? == 0 {
            // Bootstrap: o primeiro usuário vira admin
            UserRole::Admin
        } else {
            match requester {
                Some(user) if user.is_admin() => payload.role.unwrap_or(UserRole::Agent),
                _ => return Err(AppError::Forbidden),
            }
        };

        let hashed_password = Self::hash_password(&payload.password).await?;
        let username = payload.username.trim().to_lowercase();

        let user = self
            .user_repo
            .create_user(
                self.user_repo.pool(),
                payload.full_name.trim(),
                &username,
                payload.email.as_deref(),
                &hashed_password,
                role,
            )
            .await?;

        info!("👤 Usuário '{}' cadastrado como {:?}", user.username, user.role);
        Ok(user)
    }

    pub async fn login_user(&self, username: &str, password: &str) -> Result<String, AppError> {
        let user = self
            .user_repo
            .find_by_username(username.trim())
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        let password_clone = password.to_owned();
        let password_hash_clone = user.password_hash.clone();

        // Executa a verificação em um thread separado
        let is_password_valid = tokio::task::spawn_blocking(move || verify(&password_clone, &password_hash_clone))
            .await
            .map_err(|e| anyhow::anyhow!("Falha na task de verificação de senha: {}", e))??;

        if !is_password_valid {
            return Err(AppError::InvalidCredentials);
        }

        self.create_token(user.id)
    }

    pub async fn validate_token(&self, token: &str) -> Result<User, AppError> {
        let claims = decode_token(token, &self.jwt_secret)?;

        self.user_repo
            .find_by_id(claims.sub)
            .await?
            .ok_or(AppError::UserNotFound)
    }

    pub async fn list_users(&self) -> Result<Vec<User>, AppError> {
        self.user_repo.list().await
    }

    pub async fn update_user(
        &self,
        requester: &User,
        user_id: Uuid,
        payload: &UpdateUserPayload,
    ) -> Result<User, AppError> {
        ensure_not_self_demotion(requester, user_id, payload.role)?;

        let password_hash = match new_password(payload.password.as_deref()) {
            Some(password) => Some(Self::hash_password(password).await?),
            None => None,
        };
        let email = payload.email.as_deref().map(str::trim).filter(|e| !e.is_empty());

        let user = self
            .user_repo
            .update_user(
                user_id,
                payload.full_name.trim(),
                email,
                payload.role,
                password_hash.as_deref(),
            )
            .await?
            .ok_or(AppError::UserNotFound)?;

        info!("👤 Usuário '{}' atualizado por {}", user.username, requester.username);
        Ok(user)
    }

    pub async fn delete_user(&self, requester: &User, user_id: Uuid) -> Result<(), AppError> {
        ensure_not_self_delete(requester, user_id)?;

        if !self.user_repo.delete_user(user_id).await? {
            return Err(AppError::UserNotFound);
        }

        info!("🗑️ Usuário {} removido por {}", user_id, requester.username);
        Ok(())
    }

    /// Cria o primeiro admin a partir do ambiente quando ainda não existe nenhum.
    pub async fn seed_admin(&self, username: &str, password: &str) -> Result<bool, AppError> {
        if self.user_repo.count_admins().await? > 0 {
            return Ok(false);
        }

        let hashed_password = Self::hash_password(password).await?;
        self.user_repo
            .create_user(
                self.user_repo.pool(),
                "Administrator",
                &username.trim().to_lowercase(),
                None,
                &hashed_password,
                UserRole::Admin,
            )
            .await?;

        info!("🔐 Admin inicial '{}' criado", username);
        Ok(true)
    }

    fn create_token(&self, user_id: Uuid) -> Result<String, AppError> {
        issue_token(user_id, &self.jwt_secret)
    }
}

/// Senha nova só quando preenchida; espaços em volta contam como vazio.
pub fn new_password(raw: Option<&str>) -> Option<&str> {
    raw.filter(|p| !p.trim().is_empty())
}

// O admin não pode tirar o próprio acesso
pub fn ensure_not_self_demotion(requester: &User, user_id: Uuid, role: UserRole) -> Result<(), AppError> {
    if requester.id == user_id && role != UserRole::Admin {
        return Err(AppError::BadRequest("Você não pode remover o próprio papel de admin.".into()));
    }
    Ok(())
}

pub fn ensure_not_self_delete(requester: &User, user_id: Uuid) -> Result<(), AppError> {
    if requester.id == user_id {
        return Err(AppError::BadRequest("Você não pode excluir o próprio usuário.".into()));
    }
    Ok(())
}

pub fn issue_token(user_id: Uuid, secret: &str) -> Result<String, AppError> {
    let now = Utc::now();
    let expires_at = now + chrono::Duration::days(TOKEN_TTL_DAYS);

    let claims = Claims {
        sub: user_id,
        exp: expires_at.timestamp() as usize,
        iat: now.timestamp() as usize,
    };

    Ok(encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )?)
}

pub fn decode_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_ref()), &Validation::default())
        .map(|data| data.claims)
        .map_err(|_| AppError::InvalidToken)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_decodes_with_same_secret() {
        let user_id = Uuid::new_v4();
        let token = issue_token(user_id, "s3cret").unwrap();

        let claims = decode_token(&token, "s3cret").unwrap();
        assert_eq!(claims.sub, user_id);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let token = issue_token(Uuid::new_v4(), "s3cret").unwrap();
        assert!(matches!(decode_token(&token, "other"), Err(AppError::InvalidToken)));
        assert!(matches!(decode_token("garbage", "s3cret"), Err(AppError::InvalidToken)));
    }

    fn admin() -> User {
        User {
            id: Uuid::new_v4(),
            full_name: "Admin".into(),
            username: "admin".into(),
            email: None,
            password_hash: String::new(),
            role: UserRole::Admin,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn blank_password_keeps_the_current_one() {
        assert_eq!(new_password(None), None);
        assert_eq!(new_password(Some("")), None);
        assert_eq!(new_password(Some("   ")), None);
        assert_eq!(new_password(Some("n3w-pass")), Some("n3w-pass"));
    }

    #[test]
    fn admin_cannot_lock_themselves_out() {
        let me = admin();
        let other = Uuid::new_v4();

        assert!(matches!(ensure_not_self_delete(&me, me.id), Err(AppError::BadRequest(_))));
        assert!(ensure_not_self_delete(&me, other).is_ok());

        assert!(matches!(
            ensure_not_self_demotion(&me, me.id, UserRole::Agent),
            Err(AppError::BadRequest(_))
        ));
        assert!(ensure_not_self_demotion(&me, me.id, UserRole::Admin).is_ok());
        assert!(ensure_not_self_demotion(&me, other, UserRole::Agent).is_ok());
    }
}
