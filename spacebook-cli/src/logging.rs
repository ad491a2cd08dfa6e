use anyhow::{Result, anyhow};
use tracing_subscriber::{EnvFilter, fmt};

/// Как запущен процесс: разовая команда или фоновая публикация.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogMode {
    Command,
    Daemon,
}

/// HTTP-стек шумит на debug, его уровень поднимается отдельно.
const QUIET_DEPENDENCIES: &[&str] = &["hyper=warn", "hyper_util=warn", "reqwest=warn"];

/// Логи идут в stderr, чтобы не смешиваться с выводом команд. Разовой
/// команде время в строке не нужно, демону нужно.
pub fn init_logging(level: &str, mode: LogMode) -> Result<()> {
    let filter = build_filter(level);
    let builder = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact();

    let installed = match mode {
        LogMode::Command => builder.without_time().with_target(false).try_init(),
        LogMode::Daemon => builder.with_target(true).try_init(),
    };
    installed.map_err(|e| anyhow!("failed to init logging: {e}"))
}

fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(directives(level)).unwrap_or_else(|err| {
        eprintln!("LOG_LEVEL `{level}` ignored: {err}");
        EnvFilter::new(directives("info"))
    })
}

fn directives(level: &str) -> String {
    let level = level.trim();
    let level = if level.is_empty() { "info" } else { level };

    std::iter::once(level)
        .chain(QUIET_DEPENDENCIES.iter().copied())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_keep_user_level_first() {
        assert_eq!(
            directives("spacebook_client=debug"),
            "spacebook_client=debug,hyper=warn,hyper_util=warn,reqwest=warn"
        );
    }

    #[test]
    fn blank_level_means_info() {
        assert!(directives("  ").starts_with("info,"));
    }

    #[test]
    fn invalid_level_falls_back_to_info() {
        let filter = build_filter("spacebook_client=loud");
        assert!(filter.to_string().contains("info"));
    }
}
