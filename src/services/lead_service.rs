// src/services/lead_service.rs

use std::{collections::HashSet, sync::Arc};

use chrono::Utc;
use rust_decimal::{Decimal, RoundingStrategy};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    common::{
        error::AppError,
        phone::{normalize_phone, stored_variants},
    },
    db::{
        lead_repo::{AssignmentCandidate, RequirementRow},
        stores::{ChatStore, LeadStore},
        ChairRepository, LeadRepository, UserRepository,
    },
    models::{
        auth::User,
        lead::{
            AddNotePayload, BackfillReport, BulkAssignResult, BulkDeleteResult, CreateLeadPayload,
            ImportFields, ImportLeadRow, ImportLeadsPayload, ImportReport, Lead, LeadDetail,
            LeadExportRow, LeadFilter, LeadNote, LeadPage, LeadSource, NewLead, RequirementInput,
            UpdateStatusPayload, STATUS_ASSIGNED, STATUS_CLOSED, STATUS_CUSTOM_MARKER,
            STATUS_DEAL_DROP, STATUS_NEW,
        },
    },
    services::{
        lead_import::{
            ensure_import_source, import_external_id, import_key, parse_import_date, sheet_row_number,
        },
        session_window::SessionState,
    },
};

enum ImportOutcome {
    Created,
    Updated,
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

// GST padrão de 18% aplicado ao preço unitário
pub fn gst_multiplier() -> Decimal {
    Decimal::new(118, 2)
}

/// `round((unit * (1.18 se GST) + frete) * qtd)`, arredondando para inteiro.
pub fn requirement_total(unit_price: Decimal, shipping_unit: Decimal, quantity: i32, gst_applicable: bool) -> Decimal {
    let unit = if gst_applicable { unit_price * gst_multiplier() } else { unit_price };
    ((unit + shipping_unit) * Decimal::from(quantity))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

/// Separa os leads que podem ser atribuídos em lote (sem responsável e
/// não encerrados) dos que devem ser pulados. IDs inexistentes são pulados.
pub fn partition_assignable(requested: &[Uuid], found: &[AssignmentCandidate]) -> (Vec<Uuid>, Vec<Uuid>) {
    let mut assignable = Vec::new();
    let mut skipped = Vec::new();
    let mut seen = HashSet::new();

    for id in requested {
        if !seen.insert(*id) {
            continue;
        }
        match found.iter().find(|c| c.id == *id) {
            Some(c)
                if c.assigned_to.is_none()
                    && c.status != STATUS_CLOSED
                    && c.status != STATUS_DEAL_DROP =>
            {
                assignable.push(*id)
            }
            _ => skipped.push(*id),
        }
    }

    (assignable, skipped)
}

/// Status final a partir do formulário (`__other__` + customStatus vira status livre).
pub fn resolve_status(payload: &UpdateStatusPayload) -> Result<String, AppError> {
    let status = if payload.status == STATUS_CUSTOM_MARKER {
        payload.custom_status.as_deref().map(str::trim).unwrap_or_default()
    } else {
        payload.status.trim()
    };

    if status.is_empty() {
        return Err(AppError::BadRequest("Status é obrigatório.".into()));
    }
    Ok(status.to_string())
}

pub fn can_edit(lead: &Lead, user: &User) -> bool {
    user.is_admin() || lead.assigned_to == Some(user.id)
}

/// Números que o backfill precisa reescrever e quantos não foram reconhecidos.
pub fn plan_backfill(rows: &[(Uuid, String)], default_country_code: &str) -> (Vec<(Uuid, String)>, usize) {
    let mut updates = Vec::new();
    let mut unrecognized = 0;

    for (id, number) in rows {
        match normalize_phone(number, default_country_code) {
            Some(canonical) if canonical != *number => updates.push((*id, canonical)),
            Some(_) => {}
            None => unrecognized += 1,
        }
    }

    (updates, unrecognized)
}

#[derive(Clone)]
pub struct LeadService {
    lead_repo: LeadRepository,
    chats: Arc<dyn ChatStore>,
    user_repo: UserRepository,
    chair_repo: ChairRepository,
    default_country_code: String,
}

impl LeadService {
    pub fn new(
        lead_repo: LeadRepository,
        chats: Arc<dyn ChatStore>,
        user_repo: UserRepository,
        chair_repo: ChairRepository,
        default_country_code: String,
    ) -> Self {
        Self { lead_repo, chats, user_repo, chair_repo, default_country_code }
    }

    fn normalize(&self, raw: &str) -> Result<String, AppError> {
        normalize_phone(raw, &self.default_country_code)
            .ok_or_else(|| AppError::InvalidPhoneNumber(raw.to_string()))
    }

    /// Lead existente e editável pelo usuário (admin ou responsável).
    pub async fn editable_lead(&self, id: Uuid, user: &User) -> Result<Lead, AppError> {
        let lead = self
            .lead_repo
            .find_lead(id)
            .await?
            .ok_or(AppError::LeadNotFound)?;
        if !can_edit(&lead, user) {
            return Err(AppError::Forbidden);
        }
        Ok(lead)
    }

    // =========================================================================
    //  LEITURA
    // =========================================================================

    pub async fn list(&self, filter: &LeadFilter, viewer: &User) -> Result<LeadPage, AppError> {
        let scope = if viewer.is_admin() { None } else { Some(viewer.id) };
        let (leads, total) = self.lead_repo.list(filter, scope).await?;
        let (page, limit, _) = filter.pagination();

        Ok(LeadPage { leads, total, page, limit })
    }

    pub async fn detail(&self, id: Uuid, viewer: &User) -> Result<LeadDetail, AppError> {
        let lead = self.editable_lead(id, viewer).await?;

        let requirements = self.lead_repo.list_requirement_lines(id).await?;
        let notes = self.lead_repo.list_notes(id).await?;
        let status_history = self.lead_repo.list_status_history(id).await?;
        let chats = self.chats.list_chats(id).await?;
        let session = SessionState::evaluate(&lead, Utc::now());

        Ok(LeadDetail {
            lead,
            requirements,
            notes,
            status_history,
            chats,
            session,
        })
    }

    /// Linhas do relatório em PDF; agentes só exportam os próprios leads.
    pub async fn export_rows(&self, filter: &LeadFilter, viewer: &User) -> Result<Vec<LeadExportRow>, AppError> {
        let scope = if viewer.is_admin() { None } else { Some(viewer.id) };
        self.lead_repo.list_for_export(filter, scope).await
    }

    // =========================================================================
    //  ESCRITA
    // =========================================================================

    /// Admin cria como `New` sem responsável; agente cria já atribuído a si.
    pub async fn create_manual(&self, payload: &CreateLeadPayload, creator: &User) -> Result<Lead, AppError> {
        let contact_number = self.normalize(&payload.contact_number)?;
        let (status, assigned_to) = if creator.is_admin() {
            (STATUS_NEW, None)
        } else {
            (STATUS_ASSIGNED, Some(creator.id))
        };

        let lead = self
            .lead_repo
            .create_with_history(
                NewLead {
                    date: payload.date.unwrap_or_else(Utc::now),
                    customer_name: payload.customer_name.trim().to_string(),
                    contact_number,
                    email_id: payload.email_id.clone().filter(|e| !e.trim().is_empty()),
                    city: payload.city.clone().filter(|c| !c.trim().is_empty()),
                    requirement: payload.requirement.trim().to_string(),
                    status: status.to_string(),
                    source: LeadSource::Manual,
                    source_meta: json!({
                        "createdBy": creator.id,
                        "createdAt": Utc::now(),
                        "method": "manual_form",
                    }),
                    external_id: None,
                    assigned_to,
                    whatsapp_number_id: None,
                },
                creator.id,
            )
            .await?;

        info!("📝 Lead {} criado por {}", lead.id, creator.username);
        Ok(lead)
    }

    // =========================================================================
    //  IMPORTAÇÃO (Excel / Google Sheets)
    // =========================================================================

    /// Upsert por telefone ou e-mail dentro da mesma origem. Uma linha com
    /// erro é contada como falha e não interrompe as demais.
    pub async fn import_leads(&self, payload: &ImportLeadsPayload, admin: &User) -> Result<ImportReport, AppError> {
        ensure_import_source(payload.source)?;

        let mut report = ImportReport::default();
        for (index, row) in payload.rows.iter().enumerate() {
            let row_number = sheet_row_number(index);
            match self
                .import_row(payload.source, payload.file_name.as_deref(), row, row_number, admin)
                .await
            {
                Ok(ImportOutcome::Created) => report.created += 1,
                Ok(ImportOutcome::Updated) => report.updated += 1,
                Err(e) => {
                    warn!("⚠️ Linha {} da importação ignorada: {}", row_number, e);
                    report.failed += 1;
                }
            }
        }

        info!(
            "📄 Importação {} por {}: {} criados, {} atualizados, {} falhas",
            payload.source.as_str(),
            admin.username,
            report.created,
            report.updated,
            report.failed
        );
        Ok(report)
    }

    async fn import_row(
        &self,
        source: LeadSource,
        file_name: Option<&str>,
        row: &ImportLeadRow,
        row_number: usize,
        admin: &User,
    ) -> Result<ImportOutcome, AppError> {
        let key = import_key(row, &self.default_country_code);
        let fields = ImportFields {
            customer_name: row.customer_name.trim().to_string(),
            contact_number: key.phone.clone(),
            email_id: key.email.clone(),
            city: non_blank(row.city.as_deref()),
            requirement: row.requirement.trim().to_string(),
            source_meta: json!({
                "fileName": file_name,
                "row": row,
                "rowNumber": row_number,
                "importedBy": admin.id,
                "importedAt": Utc::now(),
                "leadSource": non_blank(row.lead_source.as_deref()),
            }),
        };

        // Sem telefone nem e-mail nunca sobrescreve: sempre cria
        if !key.is_empty() {
            let phones = key.phone.as_deref().map(stored_variants).unwrap_or_default();
            if let Some(existing) = self
                .lead_repo
                .find_import_match(source, &phones, key.email.as_deref())
                .await?
            {
                self.lead_repo.update_import_fields(existing.id, fields).await?;
                return Ok(ImportOutcome::Updated);
            }
        }

        let external_id = import_external_id(source, &key, file_name, row_number);
        let new_lead = NewLead {
            date: parse_import_date(row.date.as_deref()).unwrap_or_else(Utc::now),
            customer_name: fields.customer_name.clone(),
            contact_number: key.phone.clone().unwrap_or_default(),
            email_id: fields.email_id.clone(),
            city: fields.city.clone(),
            requirement: fields.requirement.clone(),
            status: STATUS_NEW.to_string(),
            source,
            source_meta: fields.source_meta.clone(),
            external_id: external_id.clone(),
            assigned_to: None,
            whatsapp_number_id: None,
        };

        match self.lead_repo.insert_lead(new_lead).await {
            Ok(_) => Ok(ImportOutcome::Created),
            // Mesma linha do mesmo arquivo reenviada: o external id já existe
            Err(AppError::UniqueConstraintViolation(msg)) => {
                let existing = match external_id.as_deref() {
                    Some(id) => self.lead_repo.find_lead_by_external_id(source, id).await?,
                    None => None,
                }
                .ok_or(AppError::UniqueConstraintViolation(msg))?;
                self.lead_repo.update_import_fields(existing.id, fields).await?;
                Ok(ImportOutcome::Updated)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn assign(&self, id: Uuid, user_id: Uuid, admin: &User) -> Result<Lead, AppError> {
        self.user_repo
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::UserNotFound)?;

        self.lead_repo
            .update_status(id, STATUS_ASSIGNED, Some(user_id), admin.id, None)
            .await
    }

    pub async fn bulk_assign(&self, ids: &[Uuid], user_id: Uuid, admin: &User) -> Result<BulkAssignResult, AppError> {
        self.user_repo
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::UserNotFound)?;

        if ids.is_empty() {
            return Ok(BulkAssignResult { assigned: 0, skipped: 0, assigned_ids: vec![], skipped_ids: vec![] });
        }

        let candidates = self.lead_repo.find_assignment_candidates(ids).await?;
        let (assignable, skipped) = partition_assignable(ids, &candidates);

        let assigned = if assignable.is_empty() {
            0
        } else {
            self.lead_repo
                .bulk_assign(&assignable, user_id, admin.id, STATUS_ASSIGNED)
                .await?
        };

        info!("👥 Atribuição em lote: {} atribuídos, {} pulados", assigned, skipped.len());
        Ok(BulkAssignResult {
            assigned,
            skipped: skipped.len(),
            assigned_ids: assignable,
            skipped_ids: skipped,
        })
    }

    pub async fn update_status(&self, id: Uuid, payload: &UpdateStatusPayload, user: &User) -> Result<Lead, AppError> {
        let status = resolve_status(payload)?;
        self.editable_lead(id, user).await?;

        self.lead_repo
            .update_status(id, &status, None, user.id, payload.note.as_deref())
            .await
    }

    pub async fn add_note(&self, id: Uuid, payload: &AddNotePayload, user: &User) -> Result<LeadNote, AppError> {
        self.editable_lead(id, user).await?;
        self.lead_repo.add_note(id, payload.text.trim(), user.id).await
    }

    pub async fn set_alternate_number(&self, id: Uuid, raw: Option<&str>, user: &User) -> Result<(), AppError> {
        self.editable_lead(id, user).await?;

        let number = match raw.map(str::trim).filter(|r| !r.is_empty()) {
            Some(r) => Some(self.normalize(r)?),
            None => None,
        };
        self.lead_repo.set_alternate_number(id, number.as_deref()).await
    }

    pub async fn link_whatsapp_number(&self, id: Uuid, phone_number_id: &str, user: &User) -> Result<(), AppError> {
        self.editable_lead(id, user).await?;
        self.lead_repo.set_whatsapp_number(id, phone_number_id).await
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        if !self.lead_repo.delete(id).await? {
            return Err(AppError::LeadNotFound);
        }
        info!("🗑️ Lead {} excluído", id);
        Ok(())
    }

    pub async fn bulk_delete(&self, ids: &[Uuid]) -> Result<BulkDeleteResult, AppError> {
        if ids.is_empty() {
            return Ok(BulkDeleteResult { deleted: 0, skipped: 0, deleted_ids: vec![], skipped_ids: vec![] });
        }

        let deleted_ids = self.lead_repo.bulk_delete(ids).await?;
        let deleted_set: HashSet<Uuid> = deleted_ids.iter().copied().collect();
        let skipped_ids: Vec<Uuid> = ids.iter().copied().filter(|id| !deleted_set.contains(id)).collect();

        Ok(BulkDeleteResult {
            deleted: deleted_ids.len() as u64,
            skipped: skipped_ids.len(),
            deleted_ids,
            skipped_ids,
        })
    }

    // =========================================================================
    //  REQUISITOS
    // =========================================================================

    async fn requirement_row(&self, input: &RequirementInput) -> Result<RequirementRow, AppError> {
        self.chair_repo
            .find_color(input.chair_id, input.color_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Cor da cadeira".into()))?;

        let quantity = input.quantity.unwrap_or(1).max(1);
        let unit_price = input.unit_price.unwrap_or_default();
        let shipping_unit = input.shipping_unit.unwrap_or_default();

        Ok(RequirementRow {
            chair_id: input.chair_id,
            color_id: input.color_id,
            quantity,
            unit_price,
            shipping_unit,
            gst_applicable: input.gst_applicable,
            total_price: requirement_total(unit_price, shipping_unit, quantity, input.gst_applicable),
            note: input.note.clone().unwrap_or_default(),
        })
    }

    pub async fn add_requirements(&self, id: Uuid, inputs: &[RequirementInput], user: &User) -> Result<(), AppError> {
        self.editable_lead(id, user).await?;

        let mut rows = Vec::with_capacity(inputs.len());
        for input in inputs {
            rows.push(self.requirement_row(input).await?);
        }
        if rows.is_empty() {
            return Ok(());
        }
        self.lead_repo.insert_requirements(id, &rows).await
    }

    pub async fn update_requirement(
        &self,
        id: Uuid,
        requirement_id: Uuid,
        input: &RequirementInput,
        user: &User,
    ) -> Result<(), AppError> {
        self.editable_lead(id, user).await?;
        let row = self.requirement_row(input).await?;
        self.lead_repo.update_requirement(id, requirement_id, &row).await
    }

    pub async fn delete_requirement(&self, id: Uuid, requirement_id: Uuid, user: &User) -> Result<(), AppError> {
        self.editable_lead(id, user).await?;
        self.lead_repo.delete_requirement(id, requirement_id).await
    }

    // =========================================================================
    //  BACKFILL
    // =========================================================================

    pub async fn backfill_contact_numbers(&self) -> Result<BackfillReport, AppError> {
        let rows = self.lead_repo.list_contact_numbers().await?;
        let (updates, unrecognized) = plan_backfill(&rows, &self.default_country_code);

        for (id, canonical) in &updates {
            self.lead_repo.set_contact_number(*id, canonical).await?;
        }

        if unrecognized > 0 {
            warn!("⚠️ Backfill: {} telefones não reconhecidos ficaram como estavam", unrecognized);
        }
        info!("☎️ Backfill de telefones: {} de {} normalizados", updates.len(), rows.len());

        Ok(BackfillReport { scanned: rows.len(), updated: updates.len(), unrecognized })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db::test_support::sample_lead, models::auth::UserRole};

    fn user(role: UserRole) -> User {
        User {
            id: Uuid::new_v4(),
            full_name: "Test".into(),
            username: "test".into(),
            email: None,
            password_hash: String::new(),
            role,
            created_at: Utc::now(),
        }
    }

    fn candidate(assigned: bool, status: &str) -> AssignmentCandidate {
        AssignmentCandidate {
            id: Uuid::new_v4(),
            assigned_to: assigned.then(Uuid::new_v4),
            status: status.into(),
        }
    }

    #[test]
    fn total_applies_gst_before_shipping() {
        // (1000 * 1.18 + 50) * 2 = 2460
        let total = requirement_total(Decimal::new(1000, 0), Decimal::new(50, 0), 2, true);
        assert_eq!(total, Decimal::new(2460, 0));

        let total = requirement_total(Decimal::new(999, 0), Decimal::ZERO, 1, false);
        assert_eq!(total, Decimal::new(999, 0));
    }

    #[test]
    fn total_is_rounded_to_whole_rupees() {
        // 10.5 * 1.18 = 12.39 -> 12
        assert_eq!(requirement_total(Decimal::new(105, 1), Decimal::ZERO, 1, true), Decimal::new(12, 0));
        // 0.5 -> 1 (meio arredonda para cima)
        assert_eq!(requirement_total(Decimal::new(5, 1), Decimal::ZERO, 1, false), Decimal::new(1, 0));
    }

    #[test]
    fn bulk_assign_skips_taken_and_finished_leads() {
        let open = candidate(false, STATUS_NEW);
        let taken = candidate(true, STATUS_ASSIGNED);
        let closed = candidate(false, STATUS_CLOSED);
        let dropped = candidate(false, STATUS_DEAL_DROP);
        let custom = candidate(false, "Call back in March");
        let missing = Uuid::new_v4();

        let requested = vec![open.id, taken.id, closed.id, dropped.id, custom.id, missing, open.id];
        let found = vec![open.clone(), taken.clone(), closed.clone(), dropped.clone(), custom.clone()];

        let (assignable, skipped) = partition_assignable(&requested, &found);
        assert_eq!(assignable, vec![open.id, custom.id]);
        assert_eq!(skipped, vec![taken.id, closed.id, dropped.id, missing]);
    }

    #[test]
    fn custom_status_marker_uses_free_text() {
        let payload = UpdateStatusPayload {
            status: STATUS_CUSTOM_MARKER.into(),
            custom_status: Some("  Follow up in March ".into()),
            note: None,
        };
        assert_eq!(resolve_status(&payload).unwrap(), "Follow up in March");

        let empty = UpdateStatusPayload { status: STATUS_CUSTOM_MARKER.into(), custom_status: None, note: None };
        assert!(matches!(resolve_status(&empty), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn only_admin_or_assignee_can_edit() {
        let admin = user(UserRole::Admin);
        let agent = user(UserRole::Agent);
        let mut lead = sample_lead("+919876543210");

        assert!(can_edit(&lead, &admin));
        assert!(!can_edit(&lead, &agent));

        lead.assigned_to = Some(agent.id);
        assert!(can_edit(&lead, &agent));
    }

    #[test]
    fn backfill_rewrites_only_non_canonical_numbers() {
        let rows = vec![
            (Uuid::new_v4(), "+919876543210".to_string()),
            (Uuid::new_v4(), "09876543211".to_string()),
            (Uuid::new_v4(), "98765 43212".to_string()),
            (Uuid::new_v4(), "12345".to_string()),
        ];
        let (updates, unrecognized) = plan_backfill(&rows, "91");

        assert_eq!(unrecognized, 1);
        assert_eq!(
            updates,
            vec![(rows[1].0, "+919876543211".to_string()), (rows[2].0, "+919876543212".to_string())]
        );
    }
}
