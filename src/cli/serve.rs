//! Serve command implementation

use crate::api::{create_router, AppState};
use crate::call_control::HttpCallControl;
use crate::cli::ServeArgs;
use crate::config::{DistributorConfig, LogFormat};
use crate::events::{EventPayload, EventPipeline, EventType};
use crate::failover::{FailoverEvaluator, FailoverScheduler};
use crate::registry::{QueueId, Registry};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Load configuration with CLI overrides
pub fn load_config_with_overrides(
    args: &ServeArgs,
) -> Result<DistributorConfig, Box<dyn std::error::Error>> {
    let mut config = if args.config.exists() {
        DistributorConfig::load(Some(&args.config))?
    } else {
        tracing::debug!("Config file not found, using defaults");
        DistributorConfig::default()
    };

    config = config.with_env_overrides();

    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(ref host) = args.host {
        config.server.host = host.clone();
    }
    if let Some(ref log_level) = args.log_level {
        config.logging.level = log_level.clone();
    }
    if args.no_failover_scheduler {
        config.failover.enabled = false;
    }

    Ok(config)
}

/// Initialize tracing based on configuration
pub fn init_tracing(
    config: &crate::config::LoggingConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let filter_str = crate::logging::build_filter_directives(config);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    match config.format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init()?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()?;
        }
    }

    Ok(())
}

/// Load the configured queues and members into the registry.
///
/// Queues are added first and overflow targets set afterwards, so a queue may
/// overflow into one listed after it.
pub fn load_queues_from_config(
    config: &DistributorConfig,
    registry: &Registry,
) -> Result<(), Box<dyn std::error::Error>> {
    for queue_config in &config.queues {
        registry.add_queue(queue_config.to_queue()?)?;
    }

    for queue_config in &config.queues {
        let queue_id = QueueId(queue_config.id);
        if let Some(target) = queue_config.overflow_queue_id {
            registry.set_overflow(
                &queue_config.tenant,
                queue_id,
                Some(QueueId(target)),
                queue_config.overflow_timeout,
            )?;
        }

        for member_config in &queue_config.members {
            let member = registry.add_member(
                queue_id,
                member_config.agent_id.as_str().into(),
                member_config.penalty,
            )?;
            if !member_config.available {
                registry.set_available(member.id, false)?;
            }
        }

        tracing::info!(
            queue_id = %queue_id,
            tenant = %queue_config.tenant,
            name = %queue_config.name,
            strategy = %queue_config.strategy,
            members = queue_config.members.len(),
            "Loaded queue from config"
        );
    }

    Ok(())
}

/// Record an `agent_login` for every member that starts available, so the
/// realtime agent counters match the registry.
pub fn announce_available_members(
    config: &DistributorConfig,
    events: &EventPipeline,
) -> Result<(), Box<dyn std::error::Error>> {
    for queue_config in &config.queues {
        for member_config in queue_config.members.iter().filter(|m| m.available) {
            events.record_event(
                &queue_config.tenant,
                EventType::Agent,
                "agent_login",
                EventPayload::new()
                    .queue(QueueId(queue_config.id))
                    .agent(member_config.agent_id.as_str()),
            )?;
        }
    }
    Ok(())
}

/// Load the configured failover rules.
pub fn load_failover_from_config(
    config: &DistributorConfig,
    evaluator: &FailoverEvaluator,
) -> Result<(), Box<dyn std::error::Error>> {
    for rule in &config.failover_configs {
        let added = evaluator.add_config(rule.clone())?;
        tracing::debug!(failover_id = %added.id, queue_id = %added.queue_id, "Loaded failover rule");
    }
    Ok(())
}

/// Wait for shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal(cancel_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install CTRL+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, shutting down...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        }
    }

    cancel_token.cancel();
}

/// Main serve command handler
pub async fn run_serve(args: ServeArgs) -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load, merge and validate configuration
    let config = load_config_with_overrides(&args)?;
    config.validate()?;

    // 2. Initialize tracing
    init_tracing(&config.logging)?;

    tracing::info!("Starting distributor");
    tracing::debug!(?config, "Loaded configuration");

    // 3. Provision queues and members
    let registry = Arc::new(Registry::new());
    load_queues_from_config(&config, &registry)?;

    // 4. Wire the core and the optional call-control collaborator
    let config = Arc::new(config);
    let mut state = AppState::new(Arc::clone(&config), Arc::clone(&registry));
    if config.call_control.enabled {
        let call_control = HttpCallControl::from_config(&config.call_control)?;
        tracing::info!(base_url = %config.call_control.base_url, "Call control enabled");
        state = state.with_call_control(Arc::new(call_control));
    }
    load_failover_from_config(&config, &state.failover)?;
    announce_available_members(&config, &state.events)?;

    let state = Arc::new(state);
    let app = create_router(Arc::clone(&state));

    // 5. Start the failover scheduler (if enabled)
    let cancel_token = CancellationToken::new();
    let scheduler_handle = if config.failover.enabled {
        let scheduler = FailoverScheduler::new(
            Arc::clone(&state.failover),
            Duration::from_secs(config.failover.interval_seconds),
        );
        Some(scheduler.start(cancel_token.clone()))
    } else {
        tracing::info!("Failover scheduler disabled");
        None
    };

    // 6. Bind and serve
    let addr = config.server.bind_address();
    tracing::info!(addr = %addr, queues = registry.queue_count(), "Distributor listening");

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel_token.clone()))
        .await?;

    // 7. Cleanup
    if let Some(handle) = scheduler_handle {
        tracing::info!("Waiting for failover scheduler to stop");
        handle.await?;
    }

    tracing::info!("Distributor stopped");
    Ok(())
}
