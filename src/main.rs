use labconsole_sync::{Focus, SchedulingState, bootstrap_console};
use log::{error, info, warn};
use std::path::PathBuf;
use std::process::ExitCode;

fn describe(state: &SchedulingState) -> String {
    let telemetry = &state.telemetry;
    let queue = telemetry
        .queue
        .as_ref()
        .map(|queue| format!("queued={} running={}", queue.queued, queue.running))
        .unwrap_or_else(|| "queue=unknown".to_string());
    let robot = telemetry
        .hamilton
        .as_ref()
        .map(|hamilton| format!("{:?}", hamilton.availability).to_ascii_lowercase())
        .unwrap_or_else(|| "unknown".to_string());
    let scheduler = telemetry
        .scheduler
        .as_ref()
        .map(|scheduler| if scheduler.is_running { "running" } else { "stopped" })
        .unwrap_or("unknown");
    let recovery = state
        .manual_recovery
        .as_ref()
        .filter(|recovery| recovery.active)
        .map(|recovery| {
            format!(
                " manual-recovery({})",
                recovery.note.as_deref().unwrap_or("no note")
            )
        })
        .unwrap_or_default();
    let awaiting = match state.schedules_requiring_recovery().len() {
        0 => String::new(),
        count => format!(" awaiting-recovery={count}"),
    };
    format!("{queue} robot={robot} scheduler={scheduler}{recovery}{awaiting}")
}

#[tokio::main]
async fn main() -> ExitCode {
    let workspace_root = match std::env::args_os().nth(1) {
        Some(path) => PathBuf::from(path),
        None => match std::env::current_dir() {
            Ok(path) => path,
            Err(err) => {
                eprintln!("failed to resolve current directory: {err}");
                return ExitCode::FAILURE;
            }
        },
    };

    let mut services = match bootstrap_console(&workspace_root) {
        Ok(services) => services,
        Err(err) => {
            eprintln!("failed to start lab console sync: {err}");
            return ExitCode::FAILURE;
        }
    };

    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(services.config.log_filter.as_str()),
    )
    .try_init();
    info!(
        "lab console sync using {} (config: {})",
        services.config.base_url,
        services.config_dir.display()
    );

    let active_only = services.config.active_only;
    if let Err(err) = services
        .scheduling
        .load_schedules(active_only, Focus::Keep)
        .await
    {
        warn!("initial schedule load failed: {err}");
    } else {
        info!(
            "loaded {} schedule(s)",
            services.scheduling.snapshot().schedules.len()
        );
    }

    let mut updates = services.scheduling.subscribe();
    services.poller.start();

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut last_update = None;
    loop {
        tokio::select! {
            signal = &mut shutdown => {
                if let Err(err) = signal {
                    error!("failed to listen for shutdown signal: {err}");
                }
                break;
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = updates.borrow_and_update().clone();
                if state.telemetry.last_update != last_update {
                    last_update = state.telemetry.last_update;
                    info!("status: {}", describe(&state));
                }
            }
        }
    }

    services.poller.stop().await;
    info!("lab console sync stopped");
    ExitCode::SUCCESS
}
