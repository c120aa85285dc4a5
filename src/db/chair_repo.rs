// src/db/chair_repo.rs

use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::chair::{Chair, ChairColor},
};

const COLOR_COLUMNS: &str = "id, chair_id, name, base_price, gst_applicable, final_price, is_active, created_at";

fn duplicate_model(e: sqlx::Error, model_name: &str) -> AppError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            return AppError::UniqueConstraintViolation(format!("Já existe um modelo chamado '{}'.", model_name));
        }
    }
    e.into()
}

// Requisitos de leads apontam para a cadeira/cor sem cascata
fn still_referenced(e: sqlx::Error, what: &str) -> AppError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_foreign_key_violation() {
            return AppError::UniqueConstraintViolation(format!(
                "{} está em uso em requisitos de leads; desative em vez de excluir.",
                what
            ));
        }
    }
    e.into()
}

#[derive(Clone)]
pub struct ChairRepository {
    pool: PgPool,
}

impl ChairRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_chair(&self, model_name: &str) -> Result<Chair, AppError> {
        sqlx::query_as::<_, Chair>(
            r#"
            INSERT INTO chairs (model_name)
            VALUES ($1)
            RETURNING id, model_name, is_active, created_at
            "#,
        )
        .bind(model_name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| duplicate_model(e, model_name))
    }

    pub async fn update_chair(&self, id: Uuid, model_name: &str, is_active: bool) -> Result<Option<Chair>, AppError> {
        sqlx::query_as::<_, Chair>(
            r#"
            UPDATE chairs SET model_name = $2, is_active = $3
            WHERE id = $1
            RETURNING id, model_name, is_active, created_at
            "#,
        )
        .bind(id)
        .bind(model_name)
        .bind(is_active)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| duplicate_model(e, model_name))
    }

    /// Remove o modelo e suas cores (cascata).
    pub async fn delete_chair(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM chairs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| still_referenced(e, "O modelo"))?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn list_active_chairs(&self) -> Result<Vec<Chair>, AppError> {
        let chairs = sqlx::query_as::<_, Chair>(
            "SELECT id, model_name, is_active, created_at FROM chairs WHERE is_active = TRUE ORDER BY model_name ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(chairs)
    }

    pub async fn list_active_colors(&self) -> Result<Vec<ChairColor>, AppError> {
        let colors = sqlx::query_as::<_, ChairColor>(
            r#"
            SELECT id, chair_id, name, base_price, gst_applicable, final_price, is_active, created_at
            FROM chair_colors
            WHERE is_active = TRUE
            ORDER BY name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(colors)
    }

    pub async fn find_chair(&self, id: Uuid) -> Result<Option<Chair>, AppError> {
        let chair = sqlx::query_as::<_, Chair>(
            "SELECT id, model_name, is_active, created_at FROM chairs WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(chair)
    }

    /// Cor de um modelo específico (garante que a cor pertence à cadeira).
    pub async fn find_color(&self, chair_id: Uuid, color_id: Uuid) -> Result<Option<ChairColor>, AppError> {
        let color = sqlx::query_as::<_, ChairColor>(
            r#"
            SELECT id, chair_id, name, base_price, gst_applicable, final_price, is_active, created_at
            FROM chair_colors
            WHERE id = $1 AND chair_id = $2
            "#,
        )
        .bind(color_id)
        .bind(chair_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(color)
    }

    pub async fn add_color(
        &self,
        chair_id: Uuid,
        name: &str,
        base_price: Decimal,
        gst_applicable: bool,
        final_price: Decimal,
    ) -> Result<ChairColor, AppError> {
        sqlx::query_as::<_, ChairColor>(
            r#"
            INSERT INTO chair_colors (chair_id, name, base_price, gst_applicable, final_price)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, chair_id, name, base_price, gst_applicable, final_price, is_active, created_at
            "#,
        )
        .bind(chair_id)
        .bind(name)
        .bind(base_price)
        .bind(gst_applicable)
        .bind(final_price)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_foreign_key_violation() {
                    return AppError::NotFound("Cadeira".into());
                }
            }
            e.into()
        })
    }

    pub async fn update_color(
        &self,
        chair_id: Uuid,
        color_id: Uuid,
        name: &str,
        base_price: Decimal,
        gst_applicable: bool,
        final_price: Decimal,
        is_active: bool,
    ) -> Result<Option<ChairColor>, AppError> {
        let color = sqlx::query_as::<_, ChairColor>(&format!(
            r#"
            UPDATE chair_colors
            SET name = $3, base_price = $4, gst_applicable = $5, final_price = $6, is_active = $7
            WHERE id = $1 AND chair_id = $2
            RETURNING {COLOR_COLUMNS}
            "#
        ))
        .bind(color_id)
        .bind(chair_id)
        .bind(name)
        .bind(base_price)
        .bind(gst_applicable)
        .bind(final_price)
        .bind(is_active)
        .fetch_optional(&self.pool)
        .await?;

        Ok(color)
    }

    pub async fn delete_color(&self, chair_id: Uuid, color_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM chair_colors WHERE id = $1 AND chair_id = $2")
            .bind(color_id)
            .bind(chair_id)
            .execute(&self.pool)
            .await
            .map_err(|e| still_referenced(e, "A cor"))?;

        Ok(result.rows_affected() > 0)
    }
}
