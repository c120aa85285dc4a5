// src/db/whatsapp_repo.rs

use sqlx::PgPool;

use crate::{common::error::AppError, models::whatsapp::WhatsappNumber};

#[derive(Clone)]
pub struct WhatsappNumberRepository {
    pool: PgPool,
}

impl WhatsappNumberRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list_active(&self) -> Result<Vec<WhatsappNumber>, AppError> {
        let numbers = sqlx::query_as::<_, WhatsappNumber>(
            r#"
            SELECT phone_number_id, display_number, label, business_account_id, is_active, created_at
            FROM whatsapp_numbers
            WHERE is_active = TRUE
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(numbers)
    }

    pub async fn find(&self, phone_number_id: &str) -> Result<Option<WhatsappNumber>, AppError> {
        let number = sqlx::query_as::<_, WhatsappNumber>(
            r#"
            SELECT phone_number_id, display_number, label, business_account_id, is_active, created_at
            FROM whatsapp_numbers
            WHERE phone_number_id = $1
            "#,
        )
        .bind(phone_number_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(number)
    }

    /// Insere se ainda não existir. Retorna `true` quando o número é novo.
    pub async fn insert_if_missing(
        &self,
        phone_number_id: &str,
        display_number: &str,
        label: &str,
        business_account_id: &str,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO whatsapp_numbers (phone_number_id, display_number, label, business_account_id)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (phone_number_id) DO NOTHING
            "#,
        )
        .bind(phone_number_id)
        .bind(display_number)
        .bind(label)
        .bind(business_account_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
