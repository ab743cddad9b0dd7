pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::bootstrap::{ConsoleServices, bootstrap_console};
pub use application::notification_center::{NotificationCenter, NotificationState};
pub use application::retry::RetryPolicy;
pub use application::scheduling_controller::{
    Focus, SchedulingController, SchedulingState, TelemetryState, rebase_selection,
};
pub use application::status_poller::{RefreshMode, StatusPoller};
pub use application::store::Store;
pub use infrastructure::config::ConsoleConfig;
pub use infrastructure::error::{InfraError, extract_error_message};
pub use infrastructure::notification_client::NotificationApi;
pub use infrastructure::scheduling_client::{ReqwestConsoleClient, SchedulingApi};
