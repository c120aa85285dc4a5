// src/services/proforma_service.rs

use chrono::{DateTime, Datelike, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::info;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{proforma_repo::PiEdit, stores::LeadStore, LeadRepository, ProformaRepository},
    models::{
        auth::User,
        lead::{Lead, RequirementLine},
        proforma::{
            CreateProformaPayload, GstBreakup, GstType, NewProformaInvoice, PiItem, PiStatus,
            PiTotals, ProformaInvoice,
        },
    },
    services::lead_service::can_edit,
};

// =============================================================================
//  CÁLCULOS (funções puras)
// =============================================================================

/// Prefixo mensal: `PI-MM-YYYY-`.
pub fn pi_prefix(now: DateTime<Utc>) -> String {
    format!("PI-{:02}-{}-", now.month(), now.year())
}

/// Próximo número da sequência do mês, com 3 dígitos.
pub fn pi_number(now: DateTime<Utc>, already_issued: i64) -> String {
    format!("{}{:03}", pi_prefix(now), already_issued + 1)
}

/// Mesma UF da empresa: CGST + SGST; outra UF: IGST.
pub fn gst_type_for(gst_enabled: bool, billing_state: Option<&str>, company_state: &str) -> GstType {
    if !gst_enabled {
        return GstType::None;
    }
    match billing_state.map(str::trim) {
        Some(state) if state.eq_ignore_ascii_case(company_state.trim()) => GstType::CgstSgst,
        _ => GstType::Igst,
    }
}

fn money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Σ (unitário + frete) × quantidade
pub fn taxable_amount(items: &[PiItem]) -> Decimal {
    money(
        items
            .iter()
            .map(|i| (i.unit_price + i.shipping_unit) * Decimal::from(i.quantity))
            .sum(),
    )
}

pub fn gst_breakup(gst_type: GstType, taxable: Decimal) -> GstBreakup {
    match gst_type {
        GstType::Igst => GstBreakup { igst: money(taxable * Decimal::new(18, 2)), ..Default::default() },
        GstType::CgstSgst => {
            let half = money(taxable * Decimal::new(9, 2));
            GstBreakup { igst: Decimal::ZERO, cgst: half, sgst: half }
        }
        GstType::None => GstBreakup::default(),
    }
}

pub fn pi_totals(items: &[PiItem], gst_enabled: bool, billing_state: Option<&str>, company_state: &str) -> PiTotals {
    let gst_type = gst_type_for(gst_enabled, billing_state, company_state);
    let taxable = taxable_amount(items);
    let breakup = gst_breakup(gst_type, taxable);
    let gst_amount = breakup.igst + breakup.cgst + breakup.sgst;

    PiTotals {
        gst_type,
        breakup,
        taxable_amount: taxable,
        gst_amount,
        grand_total: taxable + gst_amount,
    }
}

/// PI excluída é somente leitura.
pub fn ensure_editable(pi: &ProformaInvoice) -> Result<(), AppError> {
    if pi.status == PiStatus::Deleted {
        return Err(AppError::BadRequest("PI excluída não pode ser editada.".into()));
    }
    Ok(())
}

pub fn items_from_requirements(lines: &[RequirementLine]) -> Vec<PiItem> {
    lines
        .iter()
        .map(|r| PiItem {
            chair_model: r.chair_model.clone(),
            color_id: r.color_id,
            color_name: r.color_name.clone(),
            quantity: r.quantity,
            unit_price: r.unit_price,
            shipping_unit: r.shipping_unit,
        })
        .collect()
}

// =============================================================================
//  SERVIÇO
// =============================================================================

#[derive(Clone)]
pub struct ProformaService {
    lead_repo: LeadRepository,
    repo: ProformaRepository,
    company_state: String,
}

impl ProformaService {
    pub fn new(lead_repo: LeadRepository, repo: ProformaRepository, company_state: String) -> Self {
        Self { lead_repo, repo, company_state }
    }

    async fn visible_lead(&self, lead_id: Uuid, user: &User) -> Result<Lead, AppError> {
        let lead = self
            .lead_repo
            .find_lead(lead_id)
            .await?
            .ok_or(AppError::LeadNotFound)?;
        if !can_edit(&lead, user) {
            return Err(AppError::Forbidden);
        }
        Ok(lead)
    }

    pub async fn create(
        &self,
        lead_id: Uuid,
        payload: CreateProformaPayload,
        user: &User,
    ) -> Result<ProformaInvoice, AppError> {
        let lead = self.visible_lead(lead_id, user).await?;

        let lines = self.lead_repo.list_requirement_lines(lead.id).await?;
        if lines.is_empty() {
            return Err(AppError::BadRequest("O lead não possui requisitos para a PI.".into()));
        }

        let items = items_from_requirements(&lines);
        let totals = pi_totals(
            &items,
            payload.gst_enabled,
            payload.billing_address.state.as_deref(),
            &self.company_state,
        );

        let now = Utc::now();
        let issued = self.repo.count_with_prefix(&pi_prefix(now)).await?;
        let shipping_address = payload
            .shipping_address
            .unwrap_or_else(|| payload.billing_address.clone());

        let pi = self
            .repo
            .insert(NewProformaInvoice {
                lead_id: lead.id,
                pi_number: pi_number(now, issued),
                billing_address: payload.billing_address,
                shipping_address,
                gst_enabled: payload.gst_enabled,
                gst_type: totals.gst_type,
                breakup: totals.breakup,
                items,
                taxable_amount: totals.taxable_amount,
                gst_amount: totals.gst_amount,
                grand_total: totals.grand_total,
                payment_mode: payload.payment_mode,
                estimated_delivery: payload.estimated_delivery,
                notes: payload.notes,
                created_by: user.id,
            })
            .await?;

        info!("🧾 PI {} emitida para o lead {}", pi.pi_number, lead.id);
        Ok(pi)
    }

    /// Edita endereços, GST e condições. Os itens continuam os da emissão;
    /// o tipo de GST e os totais são recalculados.
    pub async fn update(
        &self,
        lead_id: Uuid,
        pi_id: Uuid,
        payload: CreateProformaPayload,
        user: &User,
    ) -> Result<ProformaInvoice, AppError> {
        self.visible_lead(lead_id, user).await?;
        let current = self
            .repo
            .find(lead_id, pi_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Proforma Invoice".into()))?;
        ensure_editable(&current)?;

        let totals = pi_totals(
            &current.items,
            payload.gst_enabled,
            payload.billing_address.state.as_deref(),
            &self.company_state,
        );
        let shipping_address = payload
            .shipping_address
            .unwrap_or_else(|| payload.billing_address.clone());

        let pi = self
            .repo
            .update(
                lead_id,
                pi_id,
                PiEdit {
                    billing_address: payload.billing_address,
                    shipping_address,
                    gst_enabled: payload.gst_enabled,
                    totals,
                    payment_mode: payload.payment_mode,
                    estimated_delivery: payload.estimated_delivery,
                    notes: payload.notes,
                },
            )
            .await?
            // Excluída entre a leitura e a gravação
            .ok_or_else(|| AppError::BadRequest("PI excluída não pode ser editada.".into()))?;

        info!("✏️ PI {} atualizada por {}", pi.pi_number, user.username);
        Ok(pi)
    }

    pub async fn history(&self, lead_id: Uuid, user: &User) -> Result<Vec<ProformaInvoice>, AppError> {
        self.visible_lead(lead_id, user).await?;
        self.repo.list_for_lead(lead_id).await
    }

    /// PI + lead, para a geração do PDF.
    pub async fn find_for_pdf(
        &self,
        lead_id: Uuid,
        pi_id: Uuid,
        user: &User,
    ) -> Result<(ProformaInvoice, Lead), AppError> {
        let lead = self.visible_lead(lead_id, user).await?;
        let pi = self
            .repo
            .find(lead_id, pi_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Proforma Invoice".into()))?;
        Ok((pi, lead))
    }

    pub async fn soft_delete(&self, lead_id: Uuid, pi_id: Uuid, reason: &str) -> Result<ProformaInvoice, AppError> {
        let pi = self
            .repo
            .soft_delete(lead_id, pi_id, reason.trim())
            .await?
            .ok_or_else(|| AppError::NotFound("Proforma Invoice ativa".into()))?;

        info!("🗑️ PI {} excluída: {}", pi.pi_number, reason.trim());
        Ok(pi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn item(unit: i64, ship: i64, qty: i32) -> PiItem {
        PiItem {
            chair_model: "Ergo".into(),
            color_id: Uuid::new_v4(),
            color_name: "Preto".into(),
            quantity: qty,
            unit_price: Decimal::new(unit, 0),
            shipping_unit: Decimal::new(ship, 0),
        }
    }

    #[test]
    fn numbering_is_monthly_and_zero_padded() {
        let june = Utc.with_ymd_and_hms(2025, 6, 15, 10, 0, 0).unwrap();
        assert_eq!(pi_prefix(june), "PI-06-2025-");
        assert_eq!(pi_number(june, 0), "PI-06-2025-001");
        assert_eq!(pi_number(june, 41), "PI-06-2025-042");
    }

    #[test]
    fn gst_type_depends_on_billing_state() {
        assert_eq!(gst_type_for(true, Some("Maharashtra"), "Maharashtra"), GstType::CgstSgst);
        assert_eq!(gst_type_for(true, Some(" maharashtra "), "Maharashtra"), GstType::CgstSgst);
        assert_eq!(gst_type_for(true, Some("Karnataka"), "Maharashtra"), GstType::Igst);
        assert_eq!(gst_type_for(true, None, "Maharashtra"), GstType::Igst);
        assert_eq!(gst_type_for(false, Some("Maharashtra"), "Maharashtra"), GstType::None);
    }

    #[test]
    fn taxable_includes_shipping_per_unit() {
        // (1000 + 100) * 2 + (500 + 0) * 1 = 2700
        let items = vec![item(1000, 100, 2), item(500, 0, 1)];
        assert_eq!(taxable_amount(&items), Decimal::new(2700, 0));
    }

    #[test]
    fn breakup_splits_intra_state_tax() {
        let taxable = Decimal::new(2700, 0);

        let igst = gst_breakup(GstType::Igst, taxable);
        assert_eq!(igst.igst, Decimal::new(486, 0));
        assert_eq!(igst.cgst, Decimal::ZERO);

        let split = gst_breakup(GstType::CgstSgst, taxable);
        assert_eq!(split.cgst, Decimal::new(243, 0));
        assert_eq!(split.sgst, Decimal::new(243, 0));
        assert_eq!(split.igst, Decimal::ZERO);

        assert_eq!(gst_breakup(GstType::None, taxable), GstBreakup::default());
    }

    #[test]
    fn totals_follow_the_billing_state() {
        let items = vec![item(1000, 100, 2), item(500, 0, 1)];

        let intra = pi_totals(&items, true, Some("Maharashtra"), "Maharashtra");
        assert_eq!(intra.gst_type, GstType::CgstSgst);
        assert_eq!(intra.gst_amount, Decimal::new(486, 0));
        assert_eq!(intra.grand_total, Decimal::new(3186, 0));

        // Mesma PI editada para outra UF
        let inter = pi_totals(&items, true, Some("Karnataka"), "Maharashtra");
        assert_eq!(inter.gst_type, GstType::Igst);
        assert_eq!(inter.breakup.igst, Decimal::new(486, 0));
        assert_eq!(inter.grand_total, intra.grand_total);

        let untaxed = pi_totals(&items, false, Some("Karnataka"), "Maharashtra");
        assert_eq!(untaxed.gst_amount, Decimal::ZERO);
        assert_eq!(untaxed.grand_total, Decimal::new(2700, 0));
    }

    #[test]
    fn deleted_pi_cannot_be_edited() {
        let mut pi = ProformaInvoice {
            id: Uuid::new_v4(),
            lead_id: Uuid::new_v4(),
            pi_number: "PI-06-2025-001".into(),
            billing_address: sqlx::types::Json(Default::default()),
            shipping_address: sqlx::types::Json(Default::default()),
            gst_enabled: false,
            gst_type: GstType::None,
            igst: Decimal::ZERO,
            cgst: Decimal::ZERO,
            sgst: Decimal::ZERO,
            items: sqlx::types::Json(vec![item(1000, 0, 1)]),
            taxable_amount: Decimal::new(1000, 0),
            gst_amount: Decimal::ZERO,
            grand_total: Decimal::new(1000, 0),
            payment_mode: None,
            estimated_delivery: None,
            notes: None,
            created_by: None,
            status: PiStatus::Active,
            deleted_at: None,
            delete_reason: None,
            created_at: Utc::now(),
        };
        assert!(ensure_editable(&pi).is_ok());

        pi.status = PiStatus::Deleted;
        assert!(matches!(ensure_editable(&pi), Err(AppError::BadRequest(_))));
    }
}
