use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_FILTER: &str = "roster_client=debug,roster_store=info,warn";

/// Install the global `fmt` subscriber. `RUST_LOG` overrides the default
/// filter. When a global subscriber is already installed it is kept and
/// this call only logs that fact.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let installed = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();

    if let Err(e) = installed {
        tracing::debug!(error = %e, "tracing subscriber already installed, keeping it");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_keeps_the_first_subscriber() {
        init_tracing();
        init_tracing();
        tracing::info!("still logging");
    }
}
