use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_DIRECTIVES: &str = "info,sqlx=warn,tokio_cron_scheduler=warn";

/// Installs the global subscriber for `service`. `RUST_LOG` replaces the
/// default directives. Later calls are no-ops.
pub fn init_logging(service: &'static str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    let installed = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init()
        .is_ok();

    if installed {
        tracing::info!(service, "Logging initialised");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_a_noop() {
        init_logging("test");
        init_logging("test");
        tracing::debug!("still logging");
    }
}
