/// Turns successive full-text snapshots into forward-only fragments.
///
/// The fragment for a snapshot is whatever follows the length of the last
/// emitted snapshot. Pages that shrink or rewrite earlier text are not
/// corrected for: the suffix past the old length is emitted as is, and a
/// rewrite that does not grow the text yields nothing.
#[derive(Debug, Default, Clone)]
pub struct StreamDiffer {
    emitted: String,
    emitted_chars: usize,
}

impl StreamDiffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fragment for `snapshot`, or `None` when it adds nothing visible.
    /// Whitespace-only growth is held back and delivered with the next
    /// visible fragment.
    pub fn push(&mut self, snapshot: &str) -> Option<String> {
        if snapshot == self.emitted {
            return None;
        }
        let delta: String = snapshot.chars().skip(self.emitted_chars).collect();
        if delta.trim().is_empty() {
            return None;
        }
        self.emitted_chars = snapshot.chars().count();
        self.emitted = snapshot.to_string();
        Some(delta)
    }

    /// Text covered by the fragments emitted so far.
    pub fn emitted(&self) -> &str {
        &self.emitted
    }

    pub fn has_emitted(&self) -> bool {
        !self.emitted.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragments(snapshots: &[&str]) -> Vec<String> {
        let mut differ = StreamDiffer::new();
        snapshots.iter().filter_map(|s| differ.push(s)).collect()
    }

    #[test]
    fn growing_snapshots_yield_suffixes() {
        let out = fragments(&["", "Hel", "Hello", "Hello world"]);
        assert_eq!(out, vec!["Hel", "lo", " world"]);
        assert_eq!(out.concat(), "Hello world");
    }

    #[test]
    fn unchanged_snapshots_yield_nothing() {
        assert_eq!(fragments(&["Hi", "Hi", "Hi"]), vec!["Hi"]);
    }

    #[test]
    fn whitespace_growth_rides_with_next_fragment() {
        let out = fragments(&["Hello", "Hello ", "Hello \n", "Hello \nworld"]);
        assert_eq!(out, vec!["Hello", " \nworld"]);
    }

    #[test]
    fn multibyte_text_is_sliced_by_chars() {
        assert_eq!(fragments(&["你好", "你好，世界"]), vec!["你好", "，世界"]);
    }

    #[test]
    fn shrinking_page_emits_only_past_old_length() {
        assert_eq!(
            fragments(&["abcdef", "xyz", "xyzuvw!"]),
            vec!["abcdef", "!"]
        );
    }
}
