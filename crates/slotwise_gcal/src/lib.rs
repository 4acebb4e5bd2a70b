// --- File: crates/slotwise_gcal/src/lib.rs ---
pub mod auth;
pub mod memory;
pub mod service;

pub use memory::MemoryCalendarService;
pub use service::GoogleCalendarService;
