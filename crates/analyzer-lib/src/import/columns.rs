//! Column discovery in vCenter performance exports

use std::sync::OnceLock;

use regex::Regex;

/// Hostname used when a ready column names no recognisable host
pub const UNKNOWN_HOST: &str = "Unknown-Host";

const TIME_KEYWORDS: &[&str] = &["time", "timestamp", "date"];
const READY_KEYWORDS: &[&str] = &["ready for", "cpu ready", "cpuready"];

struct Patterns {
    variable: Regex,
    ready_for: Regex,
    cpu_ready: Regex,
    ipv4: Regex,
}

// Literal patterns, compiled once
fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        variable: Regex::new(r"\$(\w+)").expect("literal regex"),
        ready_for: Regex::new(r"(?i)ready for\s+(.+)").expect("literal regex"),
        cpu_ready: Regex::new(r"(?i)cpu\s*ready\s*[:\-]?\s*(.*)").expect("literal regex"),
        ipv4: Regex::new(r"^\d+\.\d+\.\d+\.\d+$").expect("literal regex"),
    })
}

/// Index of the first header that looks like a timestamp column
pub fn find_time_column<S: AsRef<str>>(headers: &[S]) -> Option<usize> {
    headers.iter().position(|h| {
        let lower = h.as_ref().to_lowercase();
        TIME_KEYWORDS.iter().any(|k| lower.contains(k))
    })
}

/// Indices of every CPU Ready column
pub fn find_ready_columns<S: AsRef<str>>(headers: &[S]) -> Vec<usize> {
    headers
        .iter()
        .enumerate()
        .filter(|(_, h)| {
            let lower = h.as_ref().to_lowercase();
            READY_KEYWORDS.iter().any(|k| lower.contains(k))
        })
        .map(|(i, _)| i)
        .collect()
}

/// Derive a short hostname from a ready column header
///
/// * `Ready for $esx01` gives `esx01`
/// * `Ready for esx01.lab.local` gives `esx01`
/// * `Ready for 10.0.0.5` keeps the address
pub fn extract_hostname(column: &str) -> String {
    let p = patterns();

    if column.contains('$') {
        return p
            .variable
            .captures(column)
            .map(|c| c[1].to_string())
            .unwrap_or_else(|| UNKNOWN_HOST.to_string());
    }

    let target = p
        .ready_for
        .captures(column)
        .or_else(|| p.cpu_ready.captures(column))
        .map(|c| c[1].trim().to_string())
        .unwrap_or_default();

    if target.is_empty() {
        return UNKNOWN_HOST.to_string();
    }
    if p.ipv4.is_match(&target) {
        return target;
    }
    target
        .split('.')
        .next()
        .filter(|label| !label.is_empty())
        .unwrap_or(UNKNOWN_HOST)
        .to_string()
}
