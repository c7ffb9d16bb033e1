// Domain layer - Pure models and state transitions
pub mod aggregate;
pub mod alert;
pub mod reading;
pub mod severity;
