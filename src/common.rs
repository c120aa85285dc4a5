pub mod error;
pub mod phone;
