use std::sync::Arc;

use cdp_adapter::{KeyInput, PageHandle};
use chatrelay_core_types::ChatContext;
use parking_lot::Mutex;
use rand::{rngs::StdRng, SeedableRng};
use tracing::{debug, instrument};

use crate::context::render_context_block;
use crate::errors::TypeTextError;
use crate::plan::TypingPlan;
use crate::policy::TypingPolicy;
use crate::redact;

/// Keystrokes dispatched by one typing call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TypingReport {
    pub keystrokes: usize,
    pub total_delay_ms: u64,
}

impl TypingReport {
    fn absorb(&mut self, other: TypingReport) {
        self.keystrokes += other.keystrokes;
        self.total_delay_ms += other.total_delay_ms;
    }
}

/// Types text into the focused element one key event per character, with
/// a uniformly random pause after each key.
pub struct TypingSimulator {
    policy: TypingPolicy,
    rng: Mutex<StdRng>,
}

impl TypingSimulator {
    pub fn new(policy: TypingPolicy) -> Result<Self, TypeTextError> {
        policy.validate()?;
        let rng = match policy.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            policy,
            rng: Mutex::new(rng),
        })
    }

    pub fn policy(&self) -> &TypingPolicy {
        &self.policy
    }

    pub fn plan(&self, text: &str) -> Result<TypingPlan, TypeTextError> {
        let len = text.chars().count();
        if len > self.policy.max_text_len {
            return Err(TypeTextError::TextTooLong(self.policy.max_text_len));
        }
        let range = self.policy.delay_range()?;
        let mut rng = self.rng.lock();
        Ok(TypingPlan::generate(text, range, &mut *rng))
    }

    /// Select-all then Backspace, so the page's input listeners see a
    /// user clearing the field.
    pub async fn clear_field(&self, page: &Arc<dyn PageHandle>) -> Result<(), TypeTextError> {
        page.press_key(&KeyInput::select_all()).await?;
        page.press_key(&KeyInput::named("Backspace")).await?;
        Ok(())
    }

    pub async fn type_text(
        &self,
        page: &Arc<dyn PageHandle>,
        text: &str,
    ) -> Result<TypingReport, TypeTextError> {
        let plan = self.plan(text)?;
        self.run_plan(page, &plan).await
    }

    pub async fn run_plan(
        &self,
        page: &Arc<dyn PageHandle>,
        plan: &TypingPlan,
    ) -> Result<TypingReport, TypeTextError> {
        let mut report = TypingReport::default();
        for step in &plan.steps {
            page.press_key(&KeyInput::char(step.ch)).await?;
            page.sleep(step.delay()).await;
            report.keystrokes += 1;
            report.total_delay_ms += step.delay_ms;
        }
        Ok(report)
    }

    /// Clear (when enabled), type `message`, then the rendered code context
    /// if `context` carries code. Focus is the caller's job.
    #[instrument(skip_all, fields(len = message.chars().count(), tag = %redact::fingerprint(message)))]
    pub async fn type_message(
        &self,
        page: &Arc<dyn PageHandle>,
        message: &str,
        context: Option<&ChatContext>,
    ) -> Result<TypingReport, TypeTextError> {
        let block = context.and_then(render_context_block);
        let total = message.chars().count() + block.as_deref().map_or(0, |b| b.chars().count());
        if total > self.policy.max_text_len {
            return Err(TypeTextError::TextTooLong(self.policy.max_text_len));
        }

        if self.policy.clear_before_typing {
            self.clear_field(page).await?;
        }
        let mut report = self.type_text(page, message).await?;
        if let Some(block) = block {
            debug!(context_len = block.chars().count(), "typing code context");
            report.absorb(self.type_text(page, &block).await?);
        }
        debug!(
            keystrokes = report.keystrokes,
            total_delay_ms = report.total_delay_ms,
            preview = %redact::preview(message, 24),
            "message typed"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverted_range_is_rejected() {
        let policy = TypingPolicy {
            min_delay_ms: 200,
            max_delay_ms: 100,
            ..TypingPolicy::default()
        };
        assert!(matches!(
            TypingSimulator::new(policy),
            Err(TypeTextError::InvalidDelayRange { min: 200, max: 100 })
        ));
    }

    #[test]
    fn plan_enforces_max_length() {
        let sim = TypingSimulator::new(TypingPolicy {
            max_text_len: 3,
            ..TypingPolicy::default()
        })
        .unwrap();
        assert!(sim.plan("abc").is_ok());
        assert!(matches!(sim.plan("abcd"), Err(TypeTextError::TextTooLong(3))));
    }
}
