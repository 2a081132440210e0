use std::path::Path;

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter};

use crate::config::LoggingConfig;

pub struct LoggingGuards {
    _file_guard: Option<WorkerGuard>,
}

impl LoggingGuards {
    pub fn file_logging(&self) -> bool {
        self._file_guard.is_some()
    }
}

pub fn init(component: &str, cfg: &LoggingConfig) -> Result<LoggingGuards> {
    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .compact();

    let base = tracing_subscriber::registry()
        .with(build_filter(cfg))
        .with(stderr_layer);

    let Some(log_dir) = cfg.log_dir.as_deref() else {
        base.try_init().ok();
        return Ok(LoggingGuards { _file_guard: None });
    };

    if let Err(err) = prepare_log_dir(log_dir) {
        base.try_init().ok();
        tracing::warn!("File logging disabled ({}): {}", log_dir.display(), err);
        return Ok(LoggingGuards { _file_guard: None });
    }

    let appender = tracing_appender::rolling::daily(log_dir, component_log_name(component));
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let file_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_line_number(true)
        .with_ansi(false)
        .compact()
        .with_writer(writer);

    base.with(file_layer).try_init().ok();
    Ok(LoggingGuards {
        _file_guard: Some(guard),
    })
}

fn build_filter(cfg: &LoggingConfig) -> EnvFilter {
    if !cfg.enabled {
        return EnvFilter::new("off");
    }
    EnvFilter::try_new(cfg.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"))
}

fn prepare_log_dir(log_dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(log_dir)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(log_dir, std::fs::Permissions::from_mode(0o750))?;
    }
    Ok(())
}

fn component_log_name(component: &str) -> String {
    match component {
        "" => "hotspot-enabler.log".to_string(),
        other => format!("{other}.log"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_level_falls_back_to_info() {
        let cfg = LoggingConfig::default().with_level("hotspot_core=loud");
        let filter = build_filter(&cfg);
        assert_eq!(filter.to_string(), "info");
    }

    #[test]
    fn disabled_config_turns_everything_off() {
        let cfg = LoggingConfig {
            enabled: false,
            ..LoggingConfig::default()
        };
        assert_eq!(build_filter(&cfg).to_string(), "off");
    }

    #[test]
    fn log_name_follows_component() {
        assert_eq!(component_log_name("hotspot-enabler"), "hotspot-enabler.log");
        assert_eq!(component_log_name(""), "hotspot-enabler.log");
    }

    #[test]
    fn prepare_log_dir_creates_nested_directory() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dir = tmp.path().join("logs").join("nested");
        prepare_log_dir(&dir).unwrap();
        assert!(dir.is_dir());
    }
}
