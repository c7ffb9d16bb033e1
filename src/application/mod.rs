// Application layer - Use cases and the ports they depend on
pub mod alert_service;
pub mod error;
pub mod history_service;
pub mod log_store;
pub mod messages;
pub mod monitor_service;
pub mod notifier;
pub mod sensor;
pub mod snapshot_store;

#[cfg(test)]
pub mod testing;
