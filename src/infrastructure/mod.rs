pub mod config;
pub mod error;
pub mod http;
pub mod notification_client;
pub mod notification_mapper;
pub mod payload;
pub mod schedule_mapper;
pub mod scheduling_client;
