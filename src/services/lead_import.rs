// src/services/lead_import.rs

// Regras puras da importação de planilhas: chave natural, external id e datas.

use chrono::{DateTime, NaiveDate, Utc};

use crate::{
    common::{error::AppError, phone::normalize_phone},
    models::lead::{ImportLeadRow, LeadSource},
};

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y"];

/// Telefone e e-mail que identificam a mesma pessoa entre importações.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportKey {
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl ImportKey {
    pub fn is_empty(&self) -> bool {
        self.phone.is_none() && self.email.is_none()
    }
}

pub fn ensure_import_source(source: LeadSource) -> Result<(), AppError> {
    match source {
        LeadSource::ExcelUpload | LeadSource::GoogleSheet => Ok(()),
        other => Err(AppError::BadRequest(format!(
            "Importação aceita apenas excel_upload ou google_sheet (recebido: {}).",
            other.as_str()
        ))),
    }
}

/// Telefone canônico quando reconhecido; senão o valor cru, sem espaços nas pontas.
pub fn import_key(row: &ImportLeadRow, default_country_code: &str) -> ImportKey {
    let raw_phone = row.contact_number.trim();
    let phone = if raw_phone.is_empty() {
        None
    } else {
        Some(normalize_phone(raw_phone, default_country_code).unwrap_or_else(|| raw_phone.to_string()))
    };

    let email = row
        .email_id
        .as_deref()
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty());

    ImportKey { phone, email }
}

/// Excel cai para nome do arquivo + linha; Google Sheets sem chave fica sem external id.
pub fn import_external_id(
    source: LeadSource,
    key: &ImportKey,
    file_name: Option<&str>,
    row_number: usize,
) -> Option<String> {
    let prefix = match source {
        LeadSource::ExcelUpload => "excel",
        _ => "gs",
    };

    if let Some(phone) = &key.phone {
        return Some(format!("{}_phone:{}", prefix, phone));
    }
    if let Some(email) = &key.email {
        return Some(format!("{}_email:{}", prefix, email));
    }

    match source {
        LeadSource::ExcelUpload => Some(format!(
            "excel_{}_row_{}",
            file_name.map(str::trim).filter(|f| !f.is_empty()).unwrap_or("upload"),
            row_number
        )),
        _ => None,
    }
}

pub fn parse_import_date(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw.map(str::trim).filter(|r| !r.is_empty())?;

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

// A primeira linha da planilha é o cabeçalho
pub fn sheet_row_number(index: usize) -> usize {
    index + 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row(phone: &str, email: Option<&str>) -> ImportLeadRow {
        ImportLeadRow {
            customer_name: "Asha Rao".into(),
            contact_number: phone.into(),
            email_id: email.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn key_prefers_canonical_phone_and_lowercase_email() {
        let key = import_key(&row(" 98765 43210 ", Some("  Asha@Example.COM ")), "91");
        assert_eq!(key.phone.as_deref(), Some("+919876543210"));
        assert_eq!(key.email.as_deref(), Some("asha@example.com"));

        // Não reconhecido: mantém o valor cru
        let odd = import_key(&row("ext. 42", None), "91");
        assert_eq!(odd.phone.as_deref(), Some("ext. 42"));

        assert!(import_key(&row("  ", Some(" ")), "91").is_empty());
    }

    #[test]
    fn external_id_follows_key_then_row() {
        let phone = ImportKey { phone: Some("+919876543210".into()), email: Some("a@b.com".into()) };
        let email = ImportKey { phone: None, email: Some("a@b.com".into()) };
        let none = ImportKey::default();

        assert_eq!(
            import_external_id(LeadSource::ExcelUpload, &phone, Some("june.xlsx"), 2).as_deref(),
            Some("excel_phone:+919876543210")
        );
        assert_eq!(
            import_external_id(LeadSource::GoogleSheet, &email, None, 2).as_deref(),
            Some("gs_email:a@b.com")
        );
        assert_eq!(
            import_external_id(LeadSource::ExcelUpload, &none, Some("june.xlsx"), 7).as_deref(),
            Some("excel_june.xlsx_row_7")
        );
        assert_eq!(import_external_id(LeadSource::GoogleSheet, &none, None, 7), None);
    }

    #[test]
    fn only_spreadsheet_sources_are_importable() {
        assert!(ensure_import_source(LeadSource::ExcelUpload).is_ok());
        assert!(ensure_import_source(LeadSource::GoogleSheet).is_ok());
        assert!(matches!(ensure_import_source(LeadSource::Meta), Err(AppError::BadRequest(_))));
        assert!(matches!(ensure_import_source(LeadSource::Manual), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn dates_accept_sheet_formats() {
        let june = Utc.with_ymd_and_hms(2025, 6, 14, 0, 0, 0).unwrap();
        assert_eq!(parse_import_date(Some("2025-06-14")), Some(june));
        assert_eq!(parse_import_date(Some("14/06/2025")), Some(june));
        assert_eq!(parse_import_date(Some("2025-06-14T00:00:00Z")), Some(june));
        assert_eq!(parse_import_date(Some("soon")), None);
        assert_eq!(parse_import_date(Some("  ")), None);
        assert_eq!(sheet_row_number(0), 2);
    }
}
