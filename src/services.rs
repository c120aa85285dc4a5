pub mod auth;
pub mod chair_service;
pub mod dashboard_service;
pub mod document_service;
pub mod lead_import;
pub mod lead_service;
pub mod proforma_service;

// Mensageria (WhatsApp / Meta)
pub mod dispatcher;
pub mod graph_client;
pub mod lead_matcher;
pub mod live_hub;
pub mod session_window;
pub mod token_manager;
pub mod webhook_service;
pub mod whatsapp_service;
