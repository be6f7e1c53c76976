//! Member response and token accounting value objects.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt: u32,
    pub completion: u32,
    pub total: u32,
}

impl TokenUsage {
    pub fn new(prompt: u32, completion: u32) -> Self {
        Self { prompt, completion, total: prompt + completion }
    }
}

impl std::ops::Add for TokenUsage {
    type Output = TokenUsage;

    fn add(self, rhs: Self) -> Self::Output {
        TokenUsage {
            prompt: self.prompt + rhs.prompt,
            completion: self.completion + rhs.completion,
            total: self.total + rhs.total,
        }
    }
}

/// One member's completed contribution to a stage (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberResponse {
    pub member_id: String,
    pub member_name: String,
    pub model_id: String,
    pub content: String,
    pub token_usage: TokenUsage,
    pub latency_ms: u64,
    /// Milliseconds since the session's `createdAt` instant, used to check
    /// ordering invariants without depending on wall-clock in tests.
    pub timestamp: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_usage_add() {
        let a = TokenUsage::new(10, 5);
        let b = TokenUsage::new(3, 7);
        let sum = a + b;
        assert_eq!(sum.prompt, 13);
        assert_eq!(sum.completion, 12);
        assert_eq!(sum.total, 25);
    }
}
