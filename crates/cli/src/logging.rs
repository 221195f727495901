use tracing_subscriber::EnvFilter;

/// Env var that overrides the `-v` derived filter (`EnvFilter` syntax).
pub const LOG_ENV: &str = "LOCUS_LOG";

/// Install the stderr subscriber. `log` records from the library crates are
/// bridged through tracing-log.
pub fn init(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
