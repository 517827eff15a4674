// src/utils/log.rs

//! Console framing for batch jobs.
//!
//! Thin helpers over the `log` facade so job output reads as sections
//! (header, numbered steps, summary) whatever logger the binary installs.

/// Log a step in a process.
pub fn step(step_num: usize, total: usize, message: &str) {
    log::info!("[STEP {step_num}/{total}] {message}");
}

/// Log a separator line.
pub fn separator() {
    log::info!("{}", "─".repeat(60));
}

/// Log a header.
pub fn header(title: &str) {
    let border = "═".repeat(60);
    log::info!("{border}");
    log::info!("  {title}");
    log::info!("{border}");
}

/// Log a sub-item (indented).
pub fn sub_item(message: &str) {
    log::info!("    {message}");
}

/// Log a summary section.
pub fn summary(title: &str, items: &[(&str, String)]) {
    log::info!("[SUMMARY] {title}");
    for line in summary_lines(items) {
        log::info!("{line}");
    }
}

fn summary_lines(items: &[(&str, String)]) -> Vec<String> {
    let width = items.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
    items
        .iter()
        .map(|(key, value)| format!("    {key:<width$} : {value}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_lines_align_keys() {
        let lines = summary_lines(&[("Found", "3".into()), ("Skipped", "10".into())]);
        assert_eq!(lines, vec!["    Found   : 3", "    Skipped : 10"]);
    }
}
