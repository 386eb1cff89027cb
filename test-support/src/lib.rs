pub mod fake_mail_api;
pub mod fake_smtp;

use simplelog::{ColorChoice, CombinedLogger, Config, LevelFilter, TermLogger, TerminalMode};
use std::sync::Once;

/// Routes `log` output from the fakes to the terminal. Safe to call from every test.
pub fn setup_logging() {
    static LOGGING: Once = Once::new();
    LOGGING.call_once(|| {
        let _ = CombinedLogger::init(vec![TermLogger::new(
            LevelFilter::Debug,
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        )]);
    });
}
