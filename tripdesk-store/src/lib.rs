pub mod app_config;
pub mod database;
pub mod agent_repo;
pub mod booking_repo;
pub mod payment_repo;
pub mod role_repo;
pub mod memory;

pub use database::DbClient;
pub use agent_repo::StoreAgentRepository;
pub use booking_repo::StoreBookingRepository;
pub use payment_repo::StorePaymentRepository;
pub use role_repo::StoreRoleRepository;
pub use memory::InMemoryStore;
