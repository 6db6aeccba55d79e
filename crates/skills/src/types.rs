use serde::{Deserialize, Serialize};
use std::fmt;

/// Risk tier for a skill — controls permission prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskTier {
    Pure,
    Io,
    Net,
    Admin,
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskTier::Pure => write!(f, "PURE"),
            RiskTier::Io => write!(f, "IO"),
            RiskTier::Net => write!(f, "NET"),
            RiskTier::Admin => write!(f, "ADMIN"),
        }
    }
}

/// Invocation mode for a skill — whether it drives its own agent loop or
/// runs as a single deterministic handler call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillType {
    Autonomous,
    Procedural,
}

impl Default for SkillType {
    fn default() -> Self {
        SkillType::Procedural
    }
}

/// A skill definition loaded from `skill.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillEntry {
    pub name: String,
    pub description: String,
    pub location: String,
    pub risk: RiskTier,
    #[serde(default)]
    pub inputs: Option<String>,
    #[serde(default)]
    pub outputs: Option<String>,
    #[serde(default)]
    pub permission_scope: Option<String>,
    /// Parsed SKILL.md frontmatter, if present. Computed at load time,
    /// never itself (de)serialized from `skill.toml`.
    #[serde(default, skip)]
    pub manifest: Option<crate::manifest::SkillManifest>,
    /// Dependency/platform readiness, computed at load time.
    #[serde(default, skip)]
    pub readiness: Option<crate::manifest::SkillReadiness>,
    /// How the Inbox Dispatcher routes a matching task: a full agent loop
    /// (`autonomous`) or a single handler call (`procedural`).
    #[serde(default)]
    pub skill_type: SkillType,
    /// Trigger patterns (regex or bare keyword) the dispatcher matches a
    /// task's `message` against when no explicit `params.skill` is given.
    #[serde(default)]
    pub triggers: Vec<String>,
    /// Registry tool names this skill is allowed to call, mirrors
    /// `SkillManifest::tools` but kept denormalized for fast policy checks.
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub max_turns: Option<u32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl SkillEntry {
    pub fn render_index_line(&self) -> String {
        let mut line = format!("- {}: {}", self.name, self.description);
        line.push_str(&format!(" location={}", self.location));
        line.push_str(&format!(" risk={}", self.risk));
        if let Some(ref inputs) = self.inputs {
            line.push_str(&format!(" inputs={inputs}"));
        }
        if let Some(ref outputs) = self.outputs {
            line.push_str(&format!(" outputs={outputs}"));
        }
        line
    }

    /// Whether this skill's dependencies/platform checks passed. A skill
    /// with no computed readiness (legacy `skill.toml`-only entries) is
    /// treated as ready.
    pub fn is_ready(&self) -> bool {
        self.readiness
            .as_ref()
            .map(|r| r.status == crate::manifest::ReadinessStatus::Ready)
            .unwrap_or(true)
    }

    /// Does this task message match one of the skill's trigger patterns?
    /// Each trigger is tried first as a regex, falling back to a
    /// case-insensitive substring match if it doesn't compile.
    pub fn matches_trigger(&self, message: &str) -> bool {
        let lower = message.to_lowercase();
        self.triggers.iter().any(|pat| {
            regex::Regex::new(pat)
                .map(|re| re.is_match(message))
                .unwrap_or_else(|_| lower.contains(&pat.to_lowercase()))
        })
    }
}
