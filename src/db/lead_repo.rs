// src/db/lead_repo.rs

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::stores::LeadStore,
    models::lead::{
        ImportFields, Lead, LeadExportRow, LeadFilter, LeadNote, LeadSource, NewLead, RequirementLine,
        StatusHistoryEntry, KNOWN_STATUSES, STATUS_OTHER,
    },
};

// Colunas explícitas (nada de SELECT *), na ordem da struct
macro_rules! lead_columns {
    () => {
        "id, date, customer_name, contact_number, alternate_number, email_id, city, \
         requirement, status, source, source_meta, external_id, assigned_to, \
         whatsapp_number_id, has_replied, last_inbound_at, created_at, updated_at"
    };
}

const LEAD_COLUMNS: &str = lead_columns!();

// Teto do relatório em PDF
const EXPORT_LIMIT: i64 = 5000;

const INSERT_LEAD_SQL: &str = concat!(
    "INSERT INTO leads (date, customer_name, contact_number, email_id, city, requirement, ",
    "status, source, source_meta, external_id, assigned_to, whatsapp_number_id) ",
    "VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) RETURNING ",
    lead_columns!()
);

/// Requisito já com o total calculado, pronto para gravar.
#[derive(Debug, Clone)]
pub struct RequirementRow {
    pub chair_id: Uuid,
    pub color_id: Uuid,
    pub quantity: i32,
    pub unit_price: rust_decimal::Decimal,
    pub shipping_unit: rust_decimal::Decimal,
    pub gst_applicable: bool,
    pub total_price: rust_decimal::Decimal,
    pub note: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AssignmentCandidate {
    pub id: Uuid,
    pub assigned_to: Option<Uuid>,
    pub status: String,
}

#[derive(Clone)]
pub struct LeadRepository {
    pool: PgPool,
}

impl LeadRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    //  LISTAGEM (filtro + ordenação + paginação)
    // =========================================================================

    pub async fn list(
        &self,
        filter: &LeadFilter,
        scope: Option<Uuid>,
    ) -> Result<(Vec<Lead>, i64), AppError> {
        let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM leads WHERE 1 = 1");
        push_lead_filters(&mut count_qb, filter, scope)?;
        let total: i64 = count_qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let (_, limit, offset) = filter.pagination();

        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(LEAD_COLUMNS).push(" FROM leads WHERE 1 = 1");
        push_lead_filters(&mut qb, filter, scope)?;
        // Coluna e direção vêm de whitelist, nunca do usuário
        qb.push(format!(
            " ORDER BY {} {}, id ASC",
            filter.sort_column(),
            filter.sort_direction()
        ));
        qb.push(" LIMIT ").push_bind(limit);
        qb.push(" OFFSET ").push_bind(offset);

        let leads = qb
            .build_query_as::<Lead>()
            .fetch_all(&self.pool)
            .await?;

        Ok((leads, total))
    }

    /// Mesmos filtros da listagem, sem paginação, com o nome do responsável.
    pub async fn list_for_export(
        &self,
        filter: &LeadFilter,
        scope: Option<Uuid>,
    ) -> Result<Vec<LeadExportRow>, AppError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(LEAD_COLUMNS).push(
            ", (SELECT COALESCE(NULLIF(u.full_name, ''), u.username) FROM users u \
             WHERE u.id = leads.assigned_to) AS assignee_name FROM leads WHERE 1 = 1",
        );
        push_lead_filters(&mut qb, filter, scope)?;
        qb.push(format!(
            " ORDER BY {} {}, id ASC",
            filter.sort_column(),
            filter.sort_direction()
        ));
        qb.push(" LIMIT ").push_bind(EXPORT_LIMIT);

        let rows = qb
            .build_query_as::<LeadExportRow>()
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    // =========================================================================
    //  IMPORTAÇÃO DE PLANILHAS
    // =========================================================================

    /// Lead da mesma origem com o mesmo telefone (qualquer formato salvo) ou e-mail.
    pub async fn find_import_match(
        &self,
        source: LeadSource,
        phones: &[String],
        email: Option<&str>,
    ) -> Result<Option<Lead>, AppError> {
        let lead = sqlx::query_as::<_, Lead>(&format!(
            r#"
            SELECT {LEAD_COLUMNS} FROM leads
            WHERE source = $1
              AND (contact_number = ANY($2) OR ($3::TEXT IS NOT NULL AND LOWER(email_id) = $3))
            ORDER BY created_at ASC
            LIMIT 1
            "#
        ))
        .bind(source)
        .bind(phones)
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(lead)
    }

    /// Reimportação: só os campos da planilha; status, responsável e notas ficam.
    pub async fn update_import_fields(&self, id: Uuid, fields: ImportFields) -> Result<Lead, AppError> {
        let lead = sqlx::query_as::<_, Lead>(&format!(
            r#"
            UPDATE leads
            SET customer_name = $2,
                contact_number = COALESCE($3, contact_number),
                email_id = COALESCE($4, email_id),
                city = $5,
                requirement = $6,
                source_meta = $7,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {LEAD_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(fields.customer_name)
        .bind(fields.contact_number)
        .bind(fields.email_id)
        .bind(fields.city)
        .bind(fields.requirement)
        .bind(fields.source_meta)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::LeadNotFound)?;

        Ok(lead)
    }

    // =========================================================================
    //  CRIAÇÃO MANUAL (lead + primeira entrada do histórico)
    // =========================================================================

    pub async fn create_with_history(
        &self,
        lead: NewLead,
        changed_by: Uuid,
    ) -> Result<Lead, AppError> {
        let mut tx = self.pool.begin().await?;

        let created = insert_lead_query(lead)
            .fetch_one(&mut *tx)
            .await
            .map_err(map_unique_violation)?;

        sqlx::query(
            "INSERT INTO lead_status_history (lead_id, status, changed_by) VALUES ($1, $2, $3)",
        )
        .bind(created.id)
        .bind(&created.status)
        .bind(changed_by)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(created)
    }

    // =========================================================================
    //  STATUS / ATRIBUIÇÃO / NOTAS
    // =========================================================================

    pub async fn update_status(
        &self,
        id: Uuid,
        status: &str,
        assigned_to: Option<Uuid>,
        changed_by: Uuid,
        note: Option<&str>,
    ) -> Result<Lead, AppError> {
        let mut tx = self.pool.begin().await?;

        let lead = sqlx::query_as::<_, Lead>(&format!(
            r#"
            UPDATE leads
            SET status = $2,
                assigned_to = COALESCE($3, assigned_to),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {LEAD_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(status)
        .bind(assigned_to)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::LeadNotFound)?;

        sqlx::query(
            "INSERT INTO lead_status_history (lead_id, status, changed_by, note) VALUES ($1, $2, $3, $4)",
        )
        .bind(id)
        .bind(status)
        .bind(changed_by)
        .bind(note)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(lead)
    }

    pub async fn find_assignment_candidates(
        &self,
        ids: &[Uuid],
    ) -> Result<Vec<AssignmentCandidate>, AppError> {
        let rows = sqlx::query_as::<_, AssignmentCandidate>(
            "SELECT id, assigned_to, status FROM leads WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Atribui em lote e registra o histórico de cada lead na mesma transação.
    pub async fn bulk_assign(
        &self,
        ids: &[Uuid],
        user_id: Uuid,
        changed_by: Uuid,
        status: &str,
    ) -> Result<u64, AppError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE leads SET assigned_to = $2, status = $3, updated_at = NOW() WHERE id = ANY($1)",
        )
        .bind(ids)
        .bind(user_id)
        .bind(status)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO lead_status_history (lead_id, status, changed_by, note)
            SELECT UNNEST($1::uuid[]), $2, $3, 'Bulk assignment'
            "#,
        )
        .bind(ids)
        .bind(status)
        .bind(changed_by)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(result.rows_affected())
    }

    pub async fn add_note(&self, lead_id: Uuid, text: &str, user_id: Uuid) -> Result<LeadNote, AppError> {
        sqlx::query_as::<_, LeadNote>(
            r#"
            INSERT INTO lead_notes (lead_id, text, user_id)
            VALUES ($1, $2, $3)
            RETURNING id, lead_id, text, user_id, created_at
            "#,
        )
        .bind(lead_id)
        .bind(text)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_foreign_key_to_not_found)
    }

    pub async fn list_notes(&self, lead_id: Uuid) -> Result<Vec<LeadNote>, AppError> {
        let notes = sqlx::query_as::<_, LeadNote>(
            "SELECT id, lead_id, text, user_id, created_at FROM lead_notes WHERE lead_id = $1 ORDER BY created_at ASC",
        )
        .bind(lead_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(notes)
    }

    pub async fn list_status_history(&self, lead_id: Uuid) -> Result<Vec<StatusHistoryEntry>, AppError> {
        let history = sqlx::query_as::<_, StatusHistoryEntry>(
            r#"
            SELECT id, lead_id, status, changed_by, note, created_at
            FROM lead_status_history
            WHERE lead_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(lead_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(history)
    }

    pub async fn set_alternate_number(&self, id: Uuid, number: Option<&str>) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE leads SET alternate_number = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(number)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::LeadNotFound);
        }
        Ok(())
    }

    pub async fn set_whatsapp_number(&self, id: Uuid, phone_number_id: &str) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE leads SET whatsapp_number_id = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(phone_number_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::LeadNotFound);
        }
        Ok(())
    }

    // =========================================================================
    //  EXCLUSÃO (única exclusão física, só admin)
    // =========================================================================

    pub async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM leads WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Apaga os leads existentes e devolve quais IDs foram de fato removidos.
    pub async fn bulk_delete(&self, ids: &[Uuid]) -> Result<Vec<Uuid>, AppError> {
        let deleted: Vec<Uuid> = sqlx::query_scalar("DELETE FROM leads WHERE id = ANY($1) RETURNING id")
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;

        Ok(deleted)
    }

    // =========================================================================
    //  REQUISITOS (cadeira + cor + preço)
    // =========================================================================

    pub async fn insert_requirements(&self, lead_id: Uuid, rows: &[RequirementRow]) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        for row in rows {
            sqlx::query(
                r#"
                INSERT INTO lead_requirements (
                    lead_id, chair_id, color_id, quantity, unit_price,
                    shipping_unit, gst_applicable, total_price, note
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(lead_id)
            .bind(row.chair_id)
            .bind(row.color_id)
            .bind(row.quantity)
            .bind(row.unit_price)
            .bind(row.shipping_unit)
            .bind(row.gst_applicable)
            .bind(row.total_price)
            .bind(&row.note)
            .execute(&mut *tx)
            .await
            .map_err(map_foreign_key_to_not_found)?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn update_requirement(
        &self,
        lead_id: Uuid,
        requirement_id: Uuid,
        row: &RequirementRow,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE lead_requirements
            SET chair_id = $3, color_id = $4, quantity = $5, unit_price = $6,
                shipping_unit = $7, gst_applicable = $8, total_price = $9, note = $10
            WHERE id = $2 AND lead_id = $1
            "#,
        )
        .bind(lead_id)
        .bind(requirement_id)
        .bind(row.chair_id)
        .bind(row.color_id)
        .bind(row.quantity)
        .bind(row.unit_price)
        .bind(row.shipping_unit)
        .bind(row.gst_applicable)
        .bind(row.total_price)
        .bind(&row.note)
        .execute(&self.pool)
        .await
        .map_err(map_foreign_key_to_not_found)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Requisito".into()));
        }
        Ok(())
    }

    pub async fn delete_requirement(&self, lead_id: Uuid, requirement_id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM lead_requirements WHERE id = $2 AND lead_id = $1")
            .bind(lead_id)
            .bind(requirement_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Requisito".into()));
        }
        Ok(())
    }

    pub async fn list_requirement_lines(&self, lead_id: Uuid) -> Result<Vec<RequirementLine>, AppError> {
        let lines = sqlx::query_as::<_, RequirementLine>(
            r#"
            SELECT
                r.id, r.chair_id, c.model_name AS chair_model,
                r.color_id, cc.name AS color_name,
                r.quantity, r.unit_price, r.shipping_unit,
                r.gst_applicable, r.total_price, r.note
            FROM lead_requirements r
            JOIN chairs c ON c.id = r.chair_id
            JOIN chair_colors cc ON cc.id = r.color_id
            WHERE r.lead_id = $1
            ORDER BY r.created_at ASC
            "#,
        )
        .bind(lead_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(lines)
    }

    // =========================================================================
    //  BACKFILL DE TELEFONES
    // =========================================================================

    pub async fn list_contact_numbers(&self) -> Result<Vec<(Uuid, String)>, AppError> {
        let rows = sqlx::query_as::<_, (Uuid, String)>("SELECT id, contact_number FROM leads")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    pub async fn set_contact_number(&self, id: Uuid, contact_number: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE leads SET contact_number = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(contact_number)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

// =============================================================================
//  CONTRATO USADO PELA MENSAGERIA
// =============================================================================

#[async_trait]
impl LeadStore for LeadRepository {
    async fn find_lead(&self, id: Uuid) -> Result<Option<Lead>, AppError> {
        let lead = sqlx::query_as::<_, Lead>(&format!("SELECT {LEAD_COLUMNS} FROM leads WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(lead)
    }

    async fn find_lead_by_contact(&self, numbers: &[String]) -> Result<Option<Lead>, AppError> {
        let lead = sqlx::query_as::<_, Lead>(&format!(
            "SELECT {LEAD_COLUMNS} FROM leads WHERE contact_number = ANY($1) ORDER BY created_at ASC LIMIT 1"
        ))
        .bind(numbers)
        .fetch_optional(&self.pool)
        .await?;

        Ok(lead)
    }

    async fn find_lead_by_external_id(
        &self,
        source: LeadSource,
        external_id: &str,
    ) -> Result<Option<Lead>, AppError> {
        let lead = sqlx::query_as::<_, Lead>(&format!(
            "SELECT {LEAD_COLUMNS} FROM leads WHERE source = $1 AND external_id = $2 LIMIT 1"
        ))
        .bind(source)
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(lead)
    }

    async fn insert_lead(&self, lead: NewLead) -> Result<Lead, AppError> {
        insert_lead_query(lead)
            .fetch_one(&self.pool)
            .await
            .map_err(map_unique_violation)
    }

    async fn update_contact_link(
        &self,
        id: Uuid,
        contact_number: &str,
        whatsapp_number_id: Option<&str>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE leads
            SET contact_number = $2,
                whatsapp_number_id = COALESCE(whatsapp_number_id, $3),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(contact_number)
        .bind(whatsapp_number_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// =============================================================================
//  HELPERS
// =============================================================================

fn insert_lead_query(
    lead: NewLead,
) -> sqlx::query::QueryAs<'static, Postgres, Lead, sqlx::postgres::PgArguments> {
    sqlx::query_as::<_, Lead>(INSERT_LEAD_SQL)
        .bind(lead.date)
        .bind(lead.customer_name)
        .bind(lead.contact_number)
        .bind(lead.email_id)
        .bind(lead.city)
        .bind(lead.requirement)
        .bind(lead.status)
        .bind(lead.source)
        .bind(lead.source_meta)
        .bind(lead.external_id)
        .bind(lead.assigned_to)
        .bind(lead.whatsapp_number_id)
}

fn push_lead_filters(
    qb: &mut QueryBuilder<'_, Postgres>,
    filter: &LeadFilter,
    scope: Option<Uuid>,
) -> Result<(), AppError> {
    // Agentes só enxergam os próprios leads
    if let Some(user_id) = scope {
        qb.push(" AND assigned_to = ").push_bind(user_id);
    }

    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", escape_like(search));
        qb.push(" AND (");
        for (i, column) in ["customer_name", "email_id", "contact_number", "city", "requirement"]
            .iter()
            .enumerate()
        {
            if i > 0 {
                qb.push(" OR ");
            }
            qb.push(*column).push(" ILIKE ").push_bind(pattern.clone());
        }
        qb.push(")");
    }

    match filter.status.as_deref().map(str::trim) {
        None | Some("") => {}
        Some(STATUS_OTHER) => {
            let known: Vec<String> = KNOWN_STATUSES.iter().map(|s| s.to_string()).collect();
            qb.push(" AND NOT (status = ANY(").push_bind(known).push("))");
        }
        Some(status) => {
            qb.push(" AND status = ").push_bind(status.to_string());
        }
    }

    match filter.assigned_to.as_deref().map(str::trim) {
        None | Some("") => {}
        Some("unassigned") => {
            qb.push(" AND assigned_to IS NULL");
        }
        Some(raw) => {
            let user_id = Uuid::parse_str(raw)
                .map_err(|_| AppError::BadRequest(format!("assignedTo inválido: '{}'", raw)))?;
            qb.push(" AND assigned_to = ").push_bind(user_id);
        }
    }

    if let Some(from) = filter.from_date {
        let start: DateTime<Utc> = from.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc();
        qb.push(" AND date >= ").push_bind(start);
    }
    if let Some(to) = filter.to_date {
        let end: DateTime<Utc> = to.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc() + Duration::days(1);
        qb.push(" AND date < ").push_bind(end);
    }

    Ok(())
}

fn escape_like(input: &str) -> String {
    input.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

fn map_unique_violation(e: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            return AppError::UniqueConstraintViolation("Lead já cadastrado para este evento.".to_string());
        }
    }
    e.into()
}

fn map_foreign_key_to_not_found(e: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_foreign_key_violation() {
            return AppError::NotFound("Registro relacionado".into());
        }
    }
    e.into()
}
