//! stderr logging for the binary.

use tracing::Level;

pub fn level_for(verbose: bool, quiet: bool) -> Level {
    match (verbose, quiet) {
        (true, _) => Level::DEBUG,
        (false, true) => Level::WARN,
        (false, false) => Level::INFO,
    }
}

/// Installs the global fmt subscriber. A second call is a no-op.
pub fn init(verbose: bool, quiet: bool) {
    let _ = tracing_subscriber::fmt()
        .with_max_level(level_for(verbose, quiet))
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
