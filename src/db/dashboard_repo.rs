// src/db/dashboard_repo.rs

use sqlx::{Acquire, Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::dashboard::{ChairSalesEntry, StatusCountRow},
};

/// Dados crus do dashboard; a agregação final acontece no serviço.
#[derive(Debug, Default)]
pub struct DashboardRaw {
    pub status_counts: Vec<StatusCountRow>,
    pub source_counts: Vec<(String, i64)>,
    pub chairs_by_model: Vec<ChairSalesEntry>,
    pub chairs_by_user: Vec<ChairSalesEntry>,
}

#[derive(Clone)]
pub struct DashboardRepository {
    pool: PgPool,
}

impl DashboardRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // `scope` = Some(user) restringe aos leads atribuídos a esse usuário
    pub async fn load<'e, E>(&self, executor: E, scope: Option<Uuid>) -> Result<DashboardRaw, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        // Snapshot consistente de todas as consultas
        let mut tx = executor.begin().await?;

        // A. Contagem por status e responsável
        let status_counts = sqlx::query_as::<_, StatusCountRow>(
            r#"
            SELECT status, assigned_to, COUNT(*) AS count
            FROM leads
            WHERE ($1::uuid IS NULL OR assigned_to = $1)
            GROUP BY status, assigned_to
            "#,
        )
        .bind(scope)
        .fetch_all(&mut *tx)
        .await?;

        // B. Contagem por origem
        let source_counts = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT source::text, COUNT(*)
            FROM leads
            WHERE ($1::uuid IS NULL OR assigned_to = $1)
            GROUP BY source
            "#,
        )
        .bind(scope)
        .fetch_all(&mut *tx)
        .await?;

        // C. Cadeiras vendidas por modelo (só negócios fechados)
        let chairs_by_model = sqlx::query_as::<_, ChairSalesEntry>(
            r#"
            SELECT
                c.model_name AS label,
                COALESCE(SUM(r.quantity), 0)::bigint AS quantity,
                COALESCE(SUM(r.total_price), 0) AS revenue
            FROM lead_requirements r
            JOIN leads l ON l.id = r.lead_id
            JOIN chairs c ON c.id = r.chair_id
            WHERE l.status = 'Closed'
              AND ($1::uuid IS NULL OR l.assigned_to = $1)
            GROUP BY c.model_name
            ORDER BY quantity DESC, label ASC
            "#,
        )
        .bind(scope)
        .fetch_all(&mut *tx)
        .await?;

        // D. Cadeiras vendidas por vendedor
        let chairs_by_user = sqlx::query_as::<_, ChairSalesEntry>(
            r#"
            SELECT
                u.full_name AS label,
                COALESCE(SUM(r.quantity), 0)::bigint AS quantity,
                COALESCE(SUM(r.total_price), 0) AS revenue
            FROM lead_requirements r
            JOIN leads l ON l.id = r.lead_id
            JOIN users u ON u.id = l.assigned_to
            WHERE l.status = 'Closed'
              AND ($1::uuid IS NULL OR l.assigned_to = $1)
            GROUP BY u.full_name
            ORDER BY quantity DESC, label ASC
            "#,
        )
        .bind(scope)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(DashboardRaw {
            status_counts,
            source_counts,
            chairs_by_model,
            chairs_by_user,
        })
    }
}
