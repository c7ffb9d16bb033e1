// Infrastructure layer - External dependencies and adapters
pub mod config;
pub mod file_log_store;
pub mod json_store;
pub mod redfish_sensor;
pub mod smtp_notifier;
