//! CAPTCHA verification collaborator.
//!
//! Image generation and serving live outside this crate; handlers only ask
//! whether an `(id, answer)` pair is correct.

use dashmap::DashMap;

pub trait CaptchaVerifier: Send + Sync {
    /// Check the answer for a challenge. A challenge can be checked once.
    fn verify(&self, id: &str, answer: &str) -> bool;
}

/// Verifier used when no CAPTCHA service is mounted: every answer fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledCaptcha;

impl CaptchaVerifier for DisabledCaptcha {
    fn verify(&self, _id: &str, _answer: &str) -> bool {
        false
    }
}

/// Pre-seeded one-time challenges.
#[derive(Debug, Default)]
pub struct FixedCaptcha {
    answers: DashMap<String, String>,
}

impl FixedCaptcha {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(self, id: &str, answer: &str) -> Self {
        self.answers.insert(id.to_string(), answer.to_string());
        self
    }
}

impl CaptchaVerifier for FixedCaptcha {
    fn verify(&self, id: &str, answer: &str) -> bool {
        self.answers.remove(id).is_some_and(|(_, expected)| {
            !answer.is_empty() && expected.eq_ignore_ascii_case(answer)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_answers_are_single_use() {
        let captcha = FixedCaptcha::new().with("c1", "4821").with("c2", "7777");
        assert!(captcha.verify("c1", "4821"));
        assert!(!captcha.verify("c1", "4821"));
        assert!(!captcha.verify("c2", "0000"));
        assert!(!captcha.verify("c2", "7777"));
        assert!(!DisabledCaptcha.verify("c1", "4821"));
    }
}
