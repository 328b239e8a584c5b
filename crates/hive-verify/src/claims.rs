//! Claim extraction from Markdown-style paper content.
//!
//! A claim is a line of prose inside a "Results" or "Conclusion" section that
//! is long enough to state something checkable. The verifier pays proof-search
//! cost per claim, so output is capped at [`MAX_CLAIMS`].

use crate::types::MAX_CLAIMS;

/// Lines at or below this length are never claims.
pub const MIN_CLAIM_CHARS: usize = 20;

const HEADER_MARKER: char = '#';
const CLAIM_SECTIONS: [&str; 2] = ["Results", "Conclusion"];

fn is_header(line: &str) -> bool {
    line.starts_with(HEADER_MARKER)
}

fn opens_claim_section(header: &str) -> bool {
    let text = header.trim_start_matches(HEADER_MARKER);
    CLAIM_SECTIONS.iter().any(|s| text.contains(s))
}

/// Extract up to [`MAX_CLAIMS`] claims, in document order.
pub fn extract(content: &str) -> Vec<String> {
    let mut claims = Vec::new();
    let mut in_section = false;

    for line in content.lines().map(str::trim) {
        if is_header(line) {
            in_section = opens_claim_section(line);
            continue;
        }
        if !in_section || line.chars().count() <= MIN_CLAIM_CHARS {
            continue;
        }
        claims.push(line.to_string());
        if claims.len() == MAX_CLAIMS {
            break;
        }
    }

    claims
}
