// src/db/proforma_repo.rs

use sqlx::{types::Json, PgPool};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::proforma::{Address, NewProformaInvoice, PiTotals, ProformaInvoice},
};

/// Campos editáveis de uma PI ativa, com os totais já recalculados.
#[derive(Debug, Clone)]
pub struct PiEdit {
    pub billing_address: Address,
    pub shipping_address: Address,
    pub gst_enabled: bool,
    pub totals: PiTotals,
    pub payment_mode: Option<String>,
    pub estimated_delivery: Option<String>,
    pub notes: Option<String>,
}

const PI_COLUMNS: &str = r#"
    id, lead_id, pi_number, billing_address, shipping_address, gst_enabled, gst_type,
    igst, cgst, sgst, items, taxable_amount, gst_amount, grand_total, payment_mode,
    estimated_delivery, notes, created_by, status, deleted_at, delete_reason, created_at
"#;

#[derive(Clone)]
pub struct ProformaRepository {
    pool: PgPool,
}

impl ProformaRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Quantas PIs já foram emitidas com esse prefixo (inclui as excluídas,
    /// para que um número nunca seja reaproveitado).
    pub async fn count_with_prefix(&self, prefix: &str) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM proforma_invoices WHERE pi_number LIKE $1")
            .bind(format!("{}%", prefix))
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    pub async fn insert(&self, pi: NewProformaInvoice) -> Result<ProformaInvoice, AppError> {
        sqlx::query_as::<_, ProformaInvoice>(&format!(
            r#"
            INSERT INTO proforma_invoices (
                lead_id, pi_number, billing_address, shipping_address, gst_enabled, gst_type,
                igst, cgst, sgst, items, taxable_amount, gst_amount, grand_total,
                payment_mode, estimated_delivery, notes, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            RETURNING {PI_COLUMNS}
            "#
        ))
        .bind(pi.lead_id)
        .bind(&pi.pi_number)
        .bind(Json(pi.billing_address))
        .bind(Json(pi.shipping_address))
        .bind(pi.gst_enabled)
        .bind(pi.gst_type)
        .bind(pi.breakup.igst)
        .bind(pi.breakup.cgst)
        .bind(pi.breakup.sgst)
        .bind(Json(pi.items))
        .bind(pi.taxable_amount)
        .bind(pi.gst_amount)
        .bind(pi.grand_total)
        .bind(pi.payment_mode)
        .bind(pi.estimated_delivery)
        .bind(pi.notes)
        .bind(pi.created_by)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    return AppError::UniqueConstraintViolation(format!(
                        "Número de PI já utilizado: {}",
                        pi.pi_number
                    ));
                }
            }
            e.into()
        })
    }

    pub async fn list_for_lead(&self, lead_id: Uuid) -> Result<Vec<ProformaInvoice>, AppError> {
        let invoices = sqlx::query_as::<_, ProformaInvoice>(&format!(
            "SELECT {PI_COLUMNS} FROM proforma_invoices WHERE lead_id = $1 ORDER BY created_at DESC"
        ))
        .bind(lead_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(invoices)
    }

    pub async fn find(&self, lead_id: Uuid, pi_id: Uuid) -> Result<Option<ProformaInvoice>, AppError> {
        let invoice = sqlx::query_as::<_, ProformaInvoice>(&format!(
            "SELECT {PI_COLUMNS} FROM proforma_invoices WHERE id = $1 AND lead_id = $2"
        ))
        .bind(pi_id)
        .bind(lead_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(invoice)
    }

    /// Só altera PIs ativas. Retorna `None` se a PI não existe ou foi excluída.
    pub async fn update(&self, lead_id: Uuid, pi_id: Uuid, edit: PiEdit) -> Result<Option<ProformaInvoice>, AppError> {
        let invoice = sqlx::query_as::<_, ProformaInvoice>(&format!(
            r#"
            UPDATE proforma_invoices
            SET billing_address = $3, shipping_address = $4, gst_enabled = $5, gst_type = $6,
                igst = $7, cgst = $8, sgst = $9, taxable_amount = $10, gst_amount = $11,
                grand_total = $12, payment_mode = $13, estimated_delivery = $14, notes = $15
            WHERE id = $1 AND lead_id = $2 AND status = 'ACTIVE'
            RETURNING {PI_COLUMNS}
            "#
        ))
        .bind(pi_id)
        .bind(lead_id)
        .bind(Json(edit.billing_address))
        .bind(Json(edit.shipping_address))
        .bind(edit.gst_enabled)
        .bind(edit.totals.gst_type)
        .bind(edit.totals.breakup.igst)
        .bind(edit.totals.breakup.cgst)
        .bind(edit.totals.breakup.sgst)
        .bind(edit.totals.taxable_amount)
        .bind(edit.totals.gst_amount)
        .bind(edit.totals.grand_total)
        .bind(edit.payment_mode)
        .bind(edit.estimated_delivery)
        .bind(edit.notes)
        .fetch_optional(&self.pool)
        .await?;

        Ok(invoice)
    }

    /// Exclusão lógica. Retorna `None` se a PI não existe ou já estava excluída.
    pub async fn soft_delete(
        &self,
        lead_id: Uuid,
        pi_id: Uuid,
        reason: &str,
    ) -> Result<Option<ProformaInvoice>, AppError> {
        let invoice = sqlx::query_as::<_, ProformaInvoice>(&format!(
            r#"
            UPDATE proforma_invoices
            SET status = 'DELETED', deleted_at = NOW(), delete_reason = $3
            WHERE id = $1 AND lead_id = $2 AND status = 'ACTIVE'
            RETURNING {PI_COLUMNS}
            "#
        ))
        .bind(pi_id)
        .bind(lead_id)
        .bind(reason)
        .fetch_optional(&self.pool)
        .await?;

        Ok(invoice)
    }
}
