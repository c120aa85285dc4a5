pub mod admin;
pub mod auth;
pub mod chairs;
pub mod dashboard;
pub mod leads;
pub mod proforma;
pub mod webhooks;
pub mod whatsapp;
