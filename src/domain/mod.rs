pub mod models;
pub mod notifications;
