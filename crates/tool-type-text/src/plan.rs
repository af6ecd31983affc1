use std::ops::RangeInclusive;
use std::time::Duration;

use rand::Rng;

/// One keystroke and the pause that follows it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TypingStep {
    pub ch: char,
    pub delay_ms: u64,
}

impl TypingStep {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Per-character keystrokes with independently drawn delays.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TypingPlan {
    pub steps: Vec<TypingStep>,
}

impl TypingPlan {
    pub fn generate<R: Rng>(text: &str, range: RangeInclusive<u64>, rng: &mut R) -> Self {
        let steps = text
            .chars()
            .map(|ch| TypingStep {
                ch,
                delay_ms: rng.gen_range(range.clone()),
            })
            .collect();
        Self { steps }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn total_delay(&self) -> Duration {
        Duration::from_millis(self.steps.iter().map(|step| step.delay_ms).sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn one_step_per_char_with_delay_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let text = "héllo, 世界";
        let plan = TypingPlan::generate(text, 50..=150, &mut rng);
        assert_eq!(plan.len(), text.chars().count());
        assert!(plan.steps.iter().all(|s| (50..=150).contains(&s.delay_ms)));
        let typed: String = plan.steps.iter().map(|s| s.ch).collect();
        assert_eq!(typed, text);
    }

    #[test]
    fn delays_vary_per_character() {
        let mut rng = StdRng::seed_from_u64(42);
        let plan = TypingPlan::generate(&"x".repeat(64), 50..=150, &mut rng);
        let first = plan.steps[0].delay_ms;
        assert!(plan.steps.iter().any(|s| s.delay_ms != first));
    }

    #[test]
    fn same_seed_same_plan() {
        let a = TypingPlan::generate("abc", 10..=20, &mut StdRng::seed_from_u64(3));
        let b = TypingPlan::generate("abc", 10..=20, &mut StdRng::seed_from_u64(3));
        assert_eq!(a, b);
    }
}
