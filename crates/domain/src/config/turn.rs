use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Turn budgets
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Budgets enforced on every agent turn, all simultaneously. Hitting any
/// one stops the loop with a `budget_exhausted` run status rather than
/// running forever on a confused model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnBudgetConfig {
    /// Tool-call loop iterations before the turn is force-stopped.
    #[serde(default = "d_max_turns")]
    pub max_turns: u32,
    /// Sum of input+output tokens across the whole turn.
    #[serde(default = "d_max_tokens")]
    pub max_tokens: u32,
    /// Wall-clock budget for the entire turn, start to final answer.
    #[serde(default = "d_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for TurnBudgetConfig {
    fn default() -> Self {
        Self {
            max_turns: d_max_turns(),
            max_tokens: d_max_tokens(),
            timeout_ms: d_timeout_ms(),
        }
    }
}

impl TurnBudgetConfig {
    /// Hard ceiling on `max_turns` regardless of what config or a
    /// sub-agent override asks for.
    pub const MAX_TURNS_CEILING: u32 = 100;

    /// Clamp `max_turns` to the hard ceiling.
    pub fn clamped_max_turns(&self) -> u32 {
        self.max_turns.min(Self::MAX_TURNS_CEILING)
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_max_turns() -> u32 {
    30
}
fn d_max_tokens() -> u32 {
    200_000
}
fn d_timeout_ms() -> u64 {
    600_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_budget_table() {
        let b = TurnBudgetConfig::default();
        assert_eq!(b.max_turns, 30);
        assert_eq!(b.max_tokens, 200_000);
        assert_eq!(b.timeout_ms, 600_000);
    }

    #[test]
    fn clamps_to_hard_ceiling() {
        let b = TurnBudgetConfig {
            max_turns: 500,
            ..TurnBudgetConfig::default()
        };
        assert_eq!(b.clamped_max_turns(), 100);
    }
}
