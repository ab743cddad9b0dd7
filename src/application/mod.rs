pub mod bootstrap;
pub mod notification_center;
pub mod retry;
pub mod scheduling_controller;
pub mod status_poller;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;
