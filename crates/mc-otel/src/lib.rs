use once_cell::sync::OnceCell;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::{
    fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
    EnvFilter,
};

static FILE_GUARD: OnceCell<tracing_appender::non_blocking::WorkerGuard> = OnceCell::new();

/// Install the global subscriber: console output filtered by `RUST_LOG`
/// (default `info`), plus a rolling file of `mc::*` events when `MC_LOG_ROLL=1`.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(fmt::layer().with_filter(filter));

    if std::env::var("MC_LOG_ROLL").ok().as_deref() != Some("1") {
        let _ = registry.try_init();
        return;
    }
    let dir = std::env::var("MC_LOG_DIR").unwrap_or_else(|_| "logs".to_string());
    let prefix = std::env::var("MC_LOG_PREFIX").unwrap_or_else(|_| "mission-control".into());
    let rotation = std::env::var("MC_LOG_ROTATION").unwrap_or_else(|_| "daily".into());
    if std::fs::create_dir_all(&dir).is_err() {
        eprintln!("failed to create log directory {dir}; file logging disabled");
        let _ = registry.try_init();
        return;
    }
    let writer = match Rotation::parse(&rotation) {
        Rotation::Hourly => tracing_appender::rolling::hourly(&dir, &prefix),
        Rotation::Minutely => tracing_appender::rolling::minutely(&dir, &prefix),
        Rotation::Daily => tracing_appender::rolling::daily(&dir, &prefix),
    };
    let (nb, guard) = tracing_appender::non_blocking(writer);
    let _ = FILE_GUARD.set(guard);
    let targets = Targets::new().with_target("mc", tracing::Level::INFO);
    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_writer(nb)
        .with_filter(targets);
    let _ = registry.with(file_layer).try_init();
    tracing::info!(directory = %dir, %rotation, "file logging enabled");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rotation {
    Minutely,
    Hourly,
    Daily,
}

impl Rotation {
    fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "hourly" => Rotation::Hourly,
            "minutely" => Rotation::Minutely,
            _ => Rotation::Daily,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Rotation;

    #[test]
    fn rotation_defaults_to_daily() {
        assert_eq!(Rotation::parse("HOURLY"), Rotation::Hourly);
        assert_eq!(Rotation::parse("minutely"), Rotation::Minutely);
        assert_eq!(Rotation::parse("weekly"), Rotation::Daily);
        assert_eq!(Rotation::parse(""), Rotation::Daily);
    }
}
