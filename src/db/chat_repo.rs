// src/db/chat_repo.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::stores::ChatStore,
    models::chat::{ChatMessage, NewChatMessage},
};

const CHAT_COLUMNS: &str = r#"
    id, lead_id, direction, from_number, to_number, wa_number_id, kind, content,
    caption, media_id, filename, wa_message_id, delivery_status, status_at, raw, timestamp
"#;

#[derive(Clone)]
pub struct ChatRepository {
    pool: PgPool,
}

impl ChatRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChatStore for ChatRepository {
    async fn insert_chat(&self, message: NewChatMessage) -> Result<ChatMessage, AppError> {
        let chat = sqlx::query_as::<_, ChatMessage>(&format!(
            r#"
            INSERT INTO chats (
                lead_id, direction, from_number, to_number, wa_number_id, kind,
                content, caption, media_id, filename, wa_message_id, raw, timestamp
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {CHAT_COLUMNS}
            "#
        ))
        .bind(message.lead_id)
        .bind(message.direction)
        .bind(message.from_number)
        .bind(message.to_number)
        .bind(message.wa_number_id)
        .bind(message.kind)
        .bind(message.content)
        .bind(message.caption)
        .bind(message.media_id)
        .bind(message.filename)
        .bind(message.wa_message_id)
        .bind(message.raw)
        .bind(message.timestamp)
        .fetch_one(&self.pool)
        .await?;

        Ok(chat)
    }

    async fn insert_inbound(&self, message: NewChatMessage) -> Result<Option<ChatMessage>, AppError> {
        let mut tx = self.pool.begin().await?;

        // Reentrega do mesmo wamid cai no índice único parcial e não volta linha
        let chat = sqlx::query_as::<_, ChatMessage>(&format!(
            r#"
            INSERT INTO chats (
                lead_id, direction, from_number, to_number, wa_number_id, kind,
                content, caption, media_id, filename, wa_message_id, raw, timestamp
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (wa_message_id) WHERE wa_message_id IS NOT NULL DO NOTHING
            RETURNING {CHAT_COLUMNS}
            "#
        ))
        .bind(message.lead_id)
        .bind(message.direction)
        .bind(message.from_number)
        .bind(message.to_number)
        .bind(message.wa_number_id)
        .bind(message.kind)
        .bind(message.content)
        .bind(message.caption)
        .bind(message.media_id)
        .bind(message.filename)
        .bind(message.wa_message_id)
        .bind(message.raw)
        .bind(message.timestamp)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(chat) = chat else {
            tx.rollback().await?;
            return Ok(None);
        };

        // GREATEST ignora NULL: a primeira mensagem simplesmente define o valor
        sqlx::query(
            r#"
            UPDATE leads
            SET has_replied = TRUE,
                last_inbound_at = GREATEST(last_inbound_at, $2),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(chat.lead_id)
        .bind(chat.timestamp)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(chat))
    }

    async fn list_chats(&self, lead_id: Uuid) -> Result<Vec<ChatMessage>, AppError> {
        // Ordem cronológica; empate resolvido pelo id para ser estável
        let chats = sqlx::query_as::<_, ChatMessage>(&format!(
            "SELECT {CHAT_COLUMNS} FROM chats WHERE lead_id = $1 ORDER BY timestamp ASC, id ASC"
        ))
        .bind(lead_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(chats)
    }

    async fn update_delivery_status(
        &self,
        wa_message_id: &str,
        status: &str,
        at: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE chats
            SET delivery_status = $2, status_at = $3
            WHERE wa_message_id = $1 AND direction = 'outbound'
            "#,
        )
        .bind(wa_message_id)
        .bind(status)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
