use tracing_subscriber::EnvFilter;

/// Install structured JSON logging. `RUST_LOG` takes precedence; `directive`
/// (e.g. `"tidemark=info"`) is added on top. Returns `false` when a global
/// subscriber was already installed.
pub fn init_tracing(directive: &str) -> anyhow::Result<bool> {
    let filter = EnvFilter::from_default_env().add_directive(directive.parse()?);
    Ok(tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .try_init()
        .is_ok())
}
