pub mod auth;
pub mod chair;
pub mod chat;
pub mod dashboard;
pub mod lead;
pub mod proforma;
pub mod whatsapp;
