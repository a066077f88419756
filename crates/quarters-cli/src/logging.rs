use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Filter directive forced by flags; `None` defers to `RUST_LOG`
fn flag_directive(debug: bool, verbose: bool) -> Option<&'static str> {
    if debug {
        Some("debug")
    } else if verbose {
        Some("info")
    } else {
        None
    }
}

/// Install the global subscriber
///
/// Filter priority: --debug > --verbose > RUST_LOG > "warn". Logs go to
/// stderr so command output on stdout stays machine readable.
pub fn init(debug: bool, verbose: bool, json: bool) {
    let filter = match flag_directive(debug, verbose) {
        Some(directive) => EnvFilter::new(directive),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };

    if json {
        let layer = fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(filter);
        tracing_subscriber::registry().with(layer).init();
    } else {
        let layer = fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .with_filter(filter);
        tracing_subscriber::registry().with(layer).init();
    }
}
