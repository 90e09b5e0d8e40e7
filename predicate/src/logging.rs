//! A [`predicate_ir::Logger`] implementation over `tracing` (spec §6
//! "Logger"): numeric syslog-style levels collapse onto `tracing`'s five
//! severities, the same translation the host surfaces doc comment in
//! `predicate-ir` describes. Installing a global subscriber is left to
//! whoever embeds this crate (`predicate-cli` does it for its own process);
//! this type only emits events, it never configures a subscriber itself.

use predicate_ir::Logger;

/// Syslog-style level, per spec §6: emergency(0), alert(1), critical(2),
/// error(3), warning(4), notice(5), info(6), debug(7...9).
const EMERGENCY: u8 = 0;
const ERROR: u8 = 3;
const WARNING: u8 = 4;
const NOTICE: u8 = 5;
const INFO: u8 = 6;

/// Routes [`Logger::log`] calls into `tracing` events under the
/// `predicate::host` target, collapsing levels 0–3 onto `ERROR` (`tracing`
/// has no emergency/alert/critical distinction).
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, level: u8, file: &str, line: u32, message: &str) {
        match level {
            EMERGENCY..=ERROR => tracing::error!(target: "predicate::host", file, line, "{message}"),
            WARNING => tracing::warn!(target: "predicate::host", file, line, "{message}"),
            NOTICE | INFO => tracing::info!(target: "predicate::host", file, line, "{message}"),
            _ => tracing::debug!(target: "predicate::host", file, line, "{message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logs_at_every_level_without_panicking() {
        let logger = TracingLogger;
        for level in 0..=9u8 {
            logger.log(level, "test.rs", 1, "hello");
        }
    }
}
