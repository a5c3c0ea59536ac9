use anyhow::Result;
use tracing::Level;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize logging for the CLI
///
/// Logs go to stderr so command output on stdout stays machine readable.
/// `RUST_LOG` takes precedence over `log_level`.
pub fn init_logging(log_level: Level, json: bool) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_directives(log_level).into());

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()?;
    }

    Ok(())
}

fn default_directives(level: Level) -> String {
    let level = level.as_str().to_lowercase();
    format!("medicat={level},medicat_http={level},medicat_core={level}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_directives_cover_workspace_crates() {
        assert_eq!(
            default_directives(Level::DEBUG),
            "medicat=debug,medicat_http=debug,medicat_core=debug"
        );
    }
}
