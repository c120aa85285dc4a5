pub mod stores;
pub use stores::{ChatStore, LeadStore};

pub mod user_repo;
pub use user_repo::UserRepository;
pub mod lead_repo;
pub use lead_repo::LeadRepository;
pub mod chat_repo;
pub use chat_repo::ChatRepository;
pub mod whatsapp_repo;
pub use whatsapp_repo::WhatsappNumberRepository;
pub mod chair_repo;
pub use chair_repo::ChairRepository;
pub mod proforma_repo;
pub use proforma_repo::ProformaRepository;
pub mod dashboard_repo;
pub use dashboard_repo::DashboardRepository;

#[cfg(test)]
pub mod test_support;
