// src/services/document_service.rs

use genpdf::{elements, style, Alignment, Element};
use rust_decimal::Decimal;

use crate::{
    common::error::AppError,
    models::{
        lead::{Lead, LeadExportRow},
        proforma::{Address, GstType, PiStatus, ProformaInvoice},
    },
};

const FONTS_DIR: &str = "./fonts";
const FONT_FAMILY: &str = "Roboto";

fn pdf_error(e: impl std::fmt::Display) -> AppError {
    AppError::InternalServerError(anyhow::anyhow!("Falha ao montar o PDF: {}", e))
}

fn rupees(value: Decimal) -> String {
    format!("Rs. {:.2}", value)
}

/// Linhas do bloco de endereço, ignorando campos vazios.
pub fn address_lines(address: &Address) -> Vec<String> {
    let mut lines: Vec<String> = [&address.name, &address.line1, &address.line2]
        .into_iter()
        .flatten()
        .filter(|l| !l.trim().is_empty())
        .cloned()
        .collect();

    let locality: Vec<&str> = [&address.city, &address.state, &address.pincode]
        .into_iter()
        .flatten()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    if !locality.is_empty() {
        lines.push(locality.join(", "));
    }

    if let Some(phone) = address.phone.as_deref().filter(|p| !p.trim().is_empty()) {
        lines.push(format!("Phone: {}", phone));
    }
    if let Some(gstin) = address.gstin.as_deref().filter(|g| !g.trim().is_empty()) {
        lines.push(format!("GSTIN: {}", gstin));
    }
    lines
}

pub const EXPORT_HEADERS: [&str; 8] = ["#", "Date", "Name", "Contact", "City", "Requirement", "Status", "Assigned"];

/// Células de uma linha do relatório de leads (numeração a partir de 1).
pub fn export_cells(index: usize, row: &LeadExportRow) -> [String; 8] {
    let lead = &row.lead;
    [
        (index + 1).to_string(),
        lead.date.format("%d/%m/%Y").to_string(),
        lead.customer_name.clone(),
        lead.contact_number.clone(),
        lead.city.clone().unwrap_or_default(),
        lead.requirement.clone(),
        lead.status.clone(),
        row.assignee_name.clone().unwrap_or_default(),
    ]
}

#[derive(Clone)]
pub struct DocumentService {
    company_name: String,
}

impl DocumentService {
    pub fn new(company_name: String) -> Self {
        Self { company_name }
    }

    pub fn generate_pi_pdf(&self, pi: &ProformaInvoice, lead: &Lead) -> Result<Vec<u8>, AppError> {
        // Fontes ficam na pasta 'fonts/' (Roboto-Regular.ttf, Roboto-Bold.ttf...)
        let font_family = genpdf::fonts::from_files(FONTS_DIR, FONT_FAMILY, None).map_err(pdf_error)?;

        let mut doc = genpdf::Document::new(font_family);
        doc.set_title(format!("Proforma Invoice {}", pi.pi_number));
        let mut decorator = genpdf::SimplePageDecorator::new();
        decorator.set_margins(10);
        doc.set_page_decorator(decorator);

        let bold = style::Style::new().bold();

        // --- CABEÇALHO ---
        doc.push(elements::Paragraph::new(self.company_name.clone()).styled(bold.with_font_size(18)));
        doc.push(elements::Break::new(1));
        doc.push(
            elements::Paragraph::new(format!("PROFORMA INVOICE {}", pi.pi_number))
                .styled(style::Style::new().bold().with_font_size(14)),
        );
        doc.push(elements::Paragraph::new(format!("Date: {}", pi.created_at.format("%d/%m/%Y"))));
        doc.push(elements::Paragraph::new(format!(
            "Customer: {} ({})",
            lead.customer_name, lead.contact_number
        )));

        if pi.status == PiStatus::Deleted {
            doc.push(
                elements::Paragraph::new(format!(
                    "CANCELLED: {}",
                    pi.delete_reason.as_deref().unwrap_or("-")
                ))
                .styled(style::Style::new().bold().with_color(style::Color::Rgb(200, 0, 0))),
            );
        }
        doc.push(elements::Break::new(1.5));

        // --- ENDEREÇOS ---
        let mut addresses = elements::TableLayout::new(vec![1, 1]);
        addresses
            .row()
            .element(elements::Paragraph::new("Bill To").styled(bold))
            .element(elements::Paragraph::new("Ship To").styled(bold))
            .push()
            .map_err(pdf_error)?;

        let billing = address_lines(&pi.billing_address);
        let shipping = address_lines(&pi.shipping_address);
        for i in 0..billing.len().max(shipping.len()) {
            addresses
                .row()
                .element(elements::Paragraph::new(billing.get(i).cloned().unwrap_or_default()))
                .element(elements::Paragraph::new(shipping.get(i).cloned().unwrap_or_default()))
                .push()
                .map_err(pdf_error)?;
        }
        doc.push(addresses);
        doc.push(elements::Break::new(1.5));

        // --- TABELA DE ITENS ---
        // Pesos: Modelo (3), Cor (2), Qtd (1), Unitário (2), Frete (2), Total (2)
        let mut table = elements::TableLayout::new(vec![3, 2, 1, 2, 2, 2]);
        table.set_cell_decorator(elements::FrameCellDecorator::new(true, true, false));

        table
            .row()
            .element(elements::Paragraph::new("Model").styled(bold))
            .element(elements::Paragraph::new("Color").styled(bold))
            .element(elements::Paragraph::new("Qty").styled(bold))
            .element(elements::Paragraph::new("Unit").styled(bold))
            .element(elements::Paragraph::new("Shipping").styled(bold))
            .element(elements::Paragraph::new("Amount").styled(bold))
            .push()
            .map_err(pdf_error)?;

        for item in pi.items.iter() {
            let amount = (item.unit_price + item.shipping_unit) * Decimal::from(item.quantity);
            table
                .row()
                .element(elements::Paragraph::new(item.chair_model.clone()))
                .element(elements::Paragraph::new(item.color_name.clone()))
                .element(elements::Paragraph::new(item.quantity.to_string()))
                .element(elements::Paragraph::new(rupees(item.unit_price)))
                .element(elements::Paragraph::new(rupees(item.shipping_unit)))
                .element(elements::Paragraph::new(rupees(amount)))
                .push()
                .map_err(pdf_error)?;
        }

        doc.push(table);
        doc.push(elements::Break::new(1.5));

        // --- TOTAIS ---
        let mut totals = vec![format!("Taxable amount: {}", rupees(pi.taxable_amount))];
        match pi.gst_type {
            GstType::Igst => totals.push(format!("IGST (18%): {}", rupees(pi.igst))),
            GstType::CgstSgst => {
                totals.push(format!("CGST (9%): {}", rupees(pi.cgst)));
                totals.push(format!("SGST (9%): {}", rupees(pi.sgst)));
            }
            GstType::None => {}
        }
        for line in totals {
            let mut paragraph = elements::Paragraph::new(line);
            paragraph.set_alignment(Alignment::Right);
            doc.push(paragraph);
        }

        let mut grand_total = elements::Paragraph::new(format!("GRAND TOTAL: {}", rupees(pi.grand_total)));
        grand_total.set_alignment(Alignment::Right);
        doc.push(grand_total.styled(style::Style::new().bold().with_font_size(12)));

        // --- CONDIÇÕES ---
        doc.push(elements::Break::new(2));
        if let Some(mode) = &pi.payment_mode {
            doc.push(elements::Paragraph::new(format!("Payment mode: {}", mode)));
        }
        if let Some(delivery) = &pi.estimated_delivery {
            doc.push(elements::Paragraph::new(format!("Estimated delivery: {}", delivery)));
        }
        if let Some(notes) = &pi.notes {
            doc.push(elements::Paragraph::new(notes.clone()).styled(style::Style::new().italic().with_font_size(8)));
        }

        // Renderiza em memória
        let mut buffer = Vec::new();
        doc.render(&mut buffer).map_err(pdf_error)?;

        Ok(buffer)
    }

    pub fn generate_leads_pdf(&self, rows: &[LeadExportRow]) -> Result<Vec<u8>, AppError> {
        let font_family = genpdf::fonts::from_files(FONTS_DIR, FONT_FAMILY, None).map_err(pdf_error)?;

        let mut doc = genpdf::Document::new(font_family);
        doc.set_title("Leads Report");
        doc.set_font_size(8);
        let mut decorator = genpdf::SimplePageDecorator::new();
        decorator.set_margins(10);
        doc.set_page_decorator(decorator);

        let mut title = elements::Paragraph::new("Leads Report");
        title.set_alignment(Alignment::Center);
        doc.push(title.styled(style::Style::new().bold().with_font_size(16)));
        doc.push(elements::Break::new(1));

        // Pesos próximos das larguras do relatório original em A4
        let mut table = elements::TableLayout::new(vec![1, 2, 4, 4, 2, 4, 2, 3]);
        table.set_cell_decorator(elements::FrameCellDecorator::new(true, true, false));

        let bold = style::Style::new().bold();
        let mut header = table.row();
        for name in EXPORT_HEADERS {
            header.push_element(elements::Paragraph::new(name).styled(bold));
        }
        header.push().map_err(pdf_error)?;

        for (index, row) in rows.iter().enumerate() {
            let mut line = table.row();
            for cell in export_cells(index, row) {
                line.push_element(elements::Paragraph::new(cell));
            }
            line.push().map_err(pdf_error)?;
        }

        doc.push(table);

        let mut buffer = Vec::new();
        doc.render(&mut buffer).map_err(pdf_error)?;

        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_block_skips_empty_fields() {
        let address = Address {
            name: Some("Asha Rao".into()),
            line1: Some("12 MG Road".into()),
            line2: Some("  ".into()),
            city: Some("Pune".into()),
            state: Some("Maharashtra".into()),
            pincode: None,
            phone: None,
            gstin: Some("27ABCDE1234F1Z5".into()),
        };

        assert_eq!(
            address_lines(&address),
            vec!["Asha Rao", "12 MG Road", "Pune, Maharashtra", "GSTIN: 27ABCDE1234F1Z5"]
        );
    }

    #[test]
    fn amounts_use_two_decimals() {
        assert_eq!(rupees(Decimal::new(2460, 0)), "Rs. 2460.00");
    }

    #[test]
    fn export_row_formats_date_and_blanks() {
        use crate::models::lead::LeadSource;
        use chrono::{TimeZone, Utc};
        use uuid::Uuid;

        let at = Utc.with_ymd_and_hms(2025, 6, 4, 9, 30, 0).unwrap();
        let lead = Lead {
            id: Uuid::new_v4(),
            date: at,
            customer_name: "Asha Rao".into(),
            contact_number: "+919876543210".into(),
            alternate_number: None,
            email_id: None,
            city: None,
            requirement: "10 chairs".into(),
            status: "New".into(),
            source: LeadSource::ExcelUpload,
            source_meta: serde_json::json!({}),
            external_id: None,
            assigned_to: None,
            whatsapp_number_id: None,
            has_replied: false,
            last_inbound_at: None,
            created_at: at,
            updated_at: at,
        };

        let unassigned = LeadExportRow { lead: lead.clone(), assignee_name: None };
        assert_eq!(
            export_cells(0, &unassigned),
            ["1", "04/06/2025", "Asha Rao", "+919876543210", "", "10 chairs", "New", ""].map(String::from)
        );

        let assigned = LeadExportRow { lead, assignee_name: Some("Priya Sharma".into()) };
        let cells = export_cells(4, &assigned);
        assert_eq!(cells[0], "5");
        assert_eq!(cells[7], "Priya Sharma");
    }
}
