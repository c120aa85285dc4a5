// src/services/lead_matcher.rs

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::{
    common::{
        error::AppError,
        phone::{normalize_phone, stored_variants},
    },
    db::stores::LeadStore,
    models::lead::{LeadSource, NewLead, STATUS_NEW},
};

pub const WHATSAPP_DEFAULT_NAME: &str = "WhatsApp User";
pub const WHATSAPP_DEFAULT_REQUIREMENT: &str = "WhatsApp Lead";

/// Remetente do webhook em formato canônico. O `from` do WhatsApp já vem
/// com DDI e sem '+', então o que o normalizador não reconhece é tratado
/// como dígitos internacionais.
pub fn canonical_sender(raw: &str, default_country_code: &str) -> Option<String> {
    if let Some(canonical) = normalize_phone(raw, default_country_code) {
        return Some(canonical);
    }
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        None
    } else {
        Some(format!("+{}", digits))
    }
}

#[derive(Clone)]
pub struct LeadMatcher {
    leads: Arc<dyn LeadStore>,
    default_country_code: String,
}

impl LeadMatcher {
    pub fn new(leads: Arc<dyn LeadStore>, default_country_code: String) -> Self {
        Self { leads, default_country_code }
    }

    /// Resolve o remetente para exatamente um lead, criando se não existir.
    pub async fn find_or_create_by_phone(
        &self,
        sender: &str,
        wa_number_id: Option<&str>,
    ) -> Result<Uuid, AppError> {
        let canonical = canonical_sender(sender, &self.default_country_code)
            .ok_or_else(|| AppError::InvalidPhoneNumber(sender.to_string()))?;

        let variants = stored_variants(&canonical);

        if let Some(lead) = self.leads.find_lead_by_contact(&variants).await? {
            let needs_number = lead.whatsapp_number_id.is_none() && wa_number_id.is_some();
            if lead.contact_number != canonical || needs_number {
                self.leads
                    .update_contact_link(lead.id, &canonical, wa_number_id)
                    .await?;
            }
            return Ok(lead.id);
        }

        let lead = self
            .leads
            .insert_lead(NewLead {
                date: Utc::now(),
                customer_name: WHATSAPP_DEFAULT_NAME.to_string(),
                contact_number: canonical.clone(),
                email_id: None,
                city: None,
                requirement: WHATSAPP_DEFAULT_REQUIREMENT.to_string(),
                status: STATUS_NEW.to_string(),
                source: LeadSource::Manual,
                source_meta: json!({ "createdBy": "whatsapp_webhook" }),
                external_id: None,
                assigned_to: None,
                whatsapp_number_id: wa_number_id.map(str::to_string),
            })
            .await?;

        info!("📇 Novo lead criado a partir do WhatsApp: {} ({})", lead.id, canonical);
        Ok(lead.id)
    }
}
