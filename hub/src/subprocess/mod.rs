//! External processes launched by the hub.

pub mod retrain;

/// Last `n` lines of process output, joined with newlines.
pub fn tail_lines(output: &[u8], n: usize) -> String {
    let text = String::from_utf8_lossy(output);
    let lines: Vec<&str> = text.lines().collect();
    lines[lines.len().saturating_sub(n)..].join("\n")
}
