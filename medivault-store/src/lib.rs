pub mod app_config;
pub mod database;
pub mod memory_repo;
pub mod prescription_repo;

pub use database::DbClient;
pub use memory_repo::{FailurePoint, MemoryPrescriptionStore};
pub use prescription_repo::PgPrescriptionStore;
