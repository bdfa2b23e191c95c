use crate::ProgressState;
use std::time::Duration;
use url::Url;

pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    let millis = duration.subsec_millis();

    if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else if seconds > 0 {
        format!("{}.{}s", seconds, millis / 100)
    } else {
        format!("{millis}ms")
    }
}

/// One-line progress summary, with throughput and ETA once anything finished.
pub fn format_progress(state: &ProgressState, elapsed: Duration) -> String {
    let total = state.total.unwrap_or_default();
    let processed = state.processed();
    let mut line = format!(
        "Progress: {}/{} ({:.1}%) - Success: {}, Errors: {}",
        processed,
        total,
        state.percentage(),
        state.succeeded,
        state.failed
    );

    let secs = elapsed.as_secs_f64();
    if processed > 0 && secs > 0.0 {
        let rate = processed as f64 / secs;
        line.push_str(&format!(", Rate: {rate:.2}/s"));
        if total > processed {
            let eta = Duration::from_secs_f64((total - processed) as f64 / rate);
            line.push_str(&format!(", ETA: {}", format_duration(eta)));
        }
    }
    line
}

/// Parses a navigable address, accepting only HTTP and HTTPS.
pub fn validate_url(url: &str) -> Result<Url, url::ParseError> {
    let parsed = Url::parse(url)?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        _ => Err(url::ParseError::RelativeUrlWithoutBase),
    }
}
