use tracing_subscriber::{fmt, EnvFilter};

/// Initializes tracing from `RUST_LOG`, defaulting to info for our crate.
/// Generated SQL and engine errors are logged here and never sent to users.
pub fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("nl_vidstats=info,info"));

    fmt().with_env_filter(env_filter).with_target(true).init();
}
