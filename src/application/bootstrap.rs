use crate::application::notification_center::NotificationCenter;
use crate::application::retry::RetryPolicy;
use crate::application::scheduling_controller::{SchedulingController, SchedulingState};
use crate::application::status_poller::StatusPoller;
use crate::application::store::Store;
use crate::infrastructure::config::{ConsoleConfig, ensure_default_config, load_config};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::scheduling_client::ReqwestConsoleClient;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct ConsoleServices {
    pub config_dir: PathBuf,
    pub config: ConsoleConfig,
    pub scheduling: SchedulingController<ReqwestConsoleClient>,
    pub poller: StatusPoller<ReqwestConsoleClient>,
    pub notifications: NotificationCenter<ReqwestConsoleClient>,
}

pub fn bootstrap_console(workspace_root: &Path) -> Result<ConsoleServices, InfraError> {
    let config_dir = workspace_root.join("config");
    ensure_default_config(&config_dir)?;
    let config = load_config(&config_dir)?;
    wire_services(config_dir, config)
}

fn wire_services(config_dir: PathBuf, config: ConsoleConfig) -> Result<ConsoleServices, InfraError> {
    let client = Arc::new(ReqwestConsoleClient::new(&config.http_settings())?);
    let retry_policy = RetryPolicy::from(config.retry);
    let store = Arc::new(Store::new(SchedulingState {
        active_only: config.active_only,
        ..SchedulingState::default()
    }));

    let scheduling = SchedulingController::new(Arc::clone(&client), Arc::clone(&store))
        .with_retry_policy(retry_policy);
    let poller = StatusPoller::new(Arc::clone(&client), store, config.poll_interval());
    let notifications = NotificationCenter::new(client).with_retry_policy(retry_policy);

    Ok(ConsoleServices {
        config_dir,
        config,
        scheduling,
        poller,
        notifications,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::config::CONSOLE_JSON;
    use std::fs;

    #[test]
    fn wiring_shares_one_store_and_honours_config() {
        let config = ConsoleConfig {
            active_only: true,
            ..ConsoleConfig::default()
        };
        let services = wire_services(PathBuf::from("config"), config).expect("wire");

        assert!(services.scheduling.snapshot().active_only);
        assert!(!services.poller.is_running());
        services
            .scheduling
            .store()
            .update(|state| state.error = Some("shared".to_string()));
        assert_eq!(
            services.scheduling.snapshot().error.as_deref(),
            Some("shared")
        );
    }

    #[test]
    fn bad_base_url_fails_wiring() {
        let config = ConsoleConfig {
            base_url: "not a url".to_string(),
            ..ConsoleConfig::default()
        };
        assert!(matches!(
            wire_services(PathBuf::from("config"), config),
            Err(InfraError::InvalidConfig(_))
        ));
    }

    #[test]
    fn bootstrap_writes_default_config() {
        let root = std::env::temp_dir().join(format!("labconsole-bootstrap-{}", std::process::id()));
        let _ = fs::remove_dir_all(&root);

        let services = bootstrap_console(&root).expect("bootstrap");
        assert!(root.join("config").join(CONSOLE_JSON).exists());
        assert_eq!(services.config_dir, root.join("config"));
        let _ = fs::remove_dir_all(&root);
    }
}
