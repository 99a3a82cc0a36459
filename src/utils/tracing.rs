use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable holding the log filter (e.g. `palaver=debug`).
pub const LOG_ENV: &str = "PALAVER_LOG";

/// Install a stderr subscriber filtered by `PALAVER_LOG`, defaulting to `warn`.
///
/// Calling it twice is harmless; the second install is ignored.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));

    let subscriber = tracing_subscriber::registry()
        .with(
            fmt::Layer::default()
                .with_writer(std::io::stderr)
                .with_target(true),
        )
        .with(filter);

    if tracing::subscriber::set_global_default(subscriber).is_ok() {
        tracing::debug!(
            target: "palaver::utils::tracing",
            "Tracing initialized. Filter configured via {LOG_ENV}."
        );
    }
}
