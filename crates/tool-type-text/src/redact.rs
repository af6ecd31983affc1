use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// First `max_chars` characters of `raw`, with an ellipsis when cut.
pub fn preview(raw: &str, max_chars: usize) -> String {
    let mut chars = raw.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

/// Short stable tag for correlating a message across log lines without
/// logging its content.
pub fn fingerprint(raw: &str) -> String {
    let mut hasher = DefaultHasher::new();
    raw.hash(&mut hasher);
    format!("{:08x}", hasher.finish() as u32)
}
