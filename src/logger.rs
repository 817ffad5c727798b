//! 控制台日志
//!
//! 级别由环境变量 `NNACCEL_LOG` 指定 (`error`/`warn`/`info`/`debug`/`trace`/`off`)，
//! 默认 `info`。

use log::{LevelFilter, Log, Metadata, Record};

const LOG_ENV: &str = "NNACCEL_LOG";

struct ConsoleLogger;

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        eprintln!(
            "[{:>5} {}] {}",
            record.level(),
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {}
}

static LOGGER: ConsoleLogger = ConsoleLogger;

fn level_from_env() -> LevelFilter {
    std::env::var(LOG_ENV)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(LevelFilter::Info)
}

/// 安装全局 logger，重复调用无效
pub fn init() {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level_from_env());
    }
}
