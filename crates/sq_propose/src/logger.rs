use {
    anyhow::{Context, Result},
    std::str::FromStr,
    tracing_subscriber::{filter::LevelFilter, prelude::*, EnvFilter, Layer},
};

pub struct LogOpts {
    pub level: String,
    /// when non-empty, json formatted logs are appended to this file
    pub file: String,
}

/// initializes console logging with the file+line which sourced the log, an optional json
/// file sink, and log-level filtration on top of RUST_LOG
pub fn init_log(opts: LogOpts) -> Result<()> {
    let mut layers = Vec::with_capacity(2);
    let level = tracing::Level::from_str(&opts.level)
        .with_context(|| format!("invalid log level {}", opts.level))?;
    let level_filter = LevelFilter::from_level(level);

    layers.push(
        tracing_subscriber::fmt::layer()
            .with_level(true)
            .with_line_number(true)
            .with_file(true)
            .with_writer(std::io::stderr)
            .with_filter(EnvFilter::from_default_env().add_directive(level_filter.into()))
            .boxed(),
    );
    if !opts.file.is_empty() {
        let log_file = std::fs::File::options()
            .create(true)
            .append(true)
            .open(&opts.file)
            .with_context(|| format!("failed to open log file {}", opts.file))?;
        layers.push(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(log_file)
                .with_filter(EnvFilter::from_default_env().add_directive(level_filter.into()))
                .boxed(),
        );
    }
    if let Err(err) = tracing_subscriber::registry().with(layers).try_init() {
        log::warn!("global subscriber already registered {err:#?}");
    }
    Ok(())
}

/// only preserve logs from the single most recent execution
pub async fn rotate_log_file(file: &str) {
    if file.is_empty() {
        return;
    }
    if let Ok(true) = tokio::fs::try_exists(file).await {
        if let Err(err) = tokio::fs::rename(file, format!("{file}.old")).await {
            log::error!("failed to rotate log file {err:#?}");
        }
    }
}
