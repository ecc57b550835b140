use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// `level` is either a bare level (`info`) or a full filter directive
/// (`info,pp_recalc=debug`). Falls back to `info` when it does not parse.
pub fn init_tracing(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    let indicatif_layer = IndicatifLayer::new();

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(indicatif_layer.get_stderr_writer()))
        .with(indicatif_layer)
        .try_init();
}

/// Filter directive for the given verbosity flags
pub fn filter_directive(log_level: &str, debug: bool) -> String {
    if debug {
        format!("{},pp_recalc=debug", log_level)
    } else {
        log_level.to_string()
    }
}
