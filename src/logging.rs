use std::io::IsTerminal;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "wake_focus_sync=info,reqwest=warn";
const DEBUG_FILTER: &str = "wake_focus_sync=debug,reqwest=warn";

fn debug_requested(raw: Option<&str>) -> bool {
    matches!(
        raw.map(str::trim),
        Some("1" | "true" | "TRUE" | "yes" | "on")
    )
}

fn default_filter(debug: bool) -> &'static str {
    if debug { DEBUG_FILTER } else { DEFAULT_FILTER }
}

pub fn init() {
    let debug = debug_requested(std::env::var("DEBUG").ok().as_deref());
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(debug)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .try_init();
}
