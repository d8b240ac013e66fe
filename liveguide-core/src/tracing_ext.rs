use std::fmt;

use is_terminal::IsTerminal;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::fmt::time::FormatTime;

/// Installs the global subscriber.
///
/// `format` is either `json` or `text`.  Anything else falls back to `text`.
pub fn init_tracing(format: &str) {
    match format {
        "json" => init_json_tracing(),
        _ => init_text_tracing(),
    }
}

fn init_json_tracing() {
    tracing_subscriber::fmt()
        .json()
        .with_timer(HrTime)
        .with_env_filter(EnvFilter::from_default_env())
        .with_ansi(std::io::stdout().is_terminal())
        .init();
}

fn init_text_tracing() {
    tracing_subscriber::fmt()
        .with_timer(ChronoLocal::rfc_3339())
        .with_env_filter(EnvFilter::from_default_env())
        .with_ansi(std::io::stdout().is_terminal())
        .init();
}

struct HrTime;

impl FormatTime for HrTime {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        write!(w, "{}", format_hr_time(chrono::Utc::now()))
    }
}

// `<secs>.<nanos>`
fn format_hr_time(now: chrono::DateTime<chrono::Utc>) -> String {
    format!("{}.{:09}", now.timestamp(), now.timestamp_subsec_nanos())
}

// </coverage:exclude>
