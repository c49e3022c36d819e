//! Effective branch resolution.
//!
//! A run can learn which branch to build from three places: the webhook that
//! triggered it, the branch reported by source control, and the fallback
//! parameter supplied by whoever started the run. The first non-empty signal
//! wins and must be on the allow-list before anything is built.

use serde::{Deserialize, Serialize};

/// Branches that are allowed to produce an image.
pub const ALLOWED_BRANCHES: [&str; 5] = ["main", "master", "uat", "feature/dev", "feature/dc"];

const HEADS_PREFIX: &str = "refs/heads/";
const ORIGIN_PREFIX: &str = "origin/";

/// Raw branch signals available at run start.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BranchSignals {
    /// Reference from a push webhook, e.g. `refs/heads/main`.
    pub webhook_ref: Option<String>,
    /// Branch reported by source control, e.g. `origin/main`.
    pub scm_branch: Option<String>,
    /// User-supplied fallback parameter.
    pub fallback: Option<String>,
}

/// Where the effective branch came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchSource {
    Webhook,
    Scm,
    Parameter,
    /// No signal carried a branch.
    None,
}

impl BranchSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            BranchSource::Webhook => "webhook",
            BranchSource::Scm => "scm",
            BranchSource::Parameter => "parameter",
            BranchSource::None => "none",
        }
    }
}

/// The single branch built by every repository task in a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EffectiveBranch(String);

impl EffectiveBranch {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EffectiveBranch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of branch resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchDecision {
    /// The branch is allowed; the run proceeds.
    Build {
        branch: EffectiveBranch,
        source: BranchSource,
    },
    /// The resolved branch is not on the allow-list. Not an error: the run
    /// ends as "not built".
    NotAllowed {
        candidate: String,
        source: BranchSource,
    },
}

impl BranchDecision {
    pub fn branch(&self) -> Option<&EffectiveBranch> {
        match self {
            BranchDecision::Build { branch, .. } => Some(branch),
            BranchDecision::NotAllowed { .. } => None,
        }
    }
}

/// Strip every leading `refs/heads/` from a webhook reference.
pub fn strip_webhook_ref(reference: &str) -> &str {
    let mut rest = reference.trim();
    while let Some(stripped) = rest.strip_prefix(HEADS_PREFIX) {
        rest = stripped;
    }
    rest
}

/// Strip leading `origin/` and `refs/heads/` prefixes from an SCM branch.
///
/// Applied until no prefix remains so the result is stable under repeated
/// stripping.
pub fn strip_scm_branch(branch: &str) -> &str {
    let mut rest = branch.trim();
    loop {
        if let Some(stripped) = rest.strip_prefix(ORIGIN_PREFIX) {
            rest = stripped;
        } else if let Some(stripped) = rest.strip_prefix(HEADS_PREFIX) {
            rest = stripped;
        } else {
            return rest;
        }
    }
}

pub fn is_allowed(branch: &str) -> bool {
    ALLOWED_BRANCHES.contains(&branch)
}

/// Resolve the effective branch. Precedence: webhook, then SCM, then the
/// fallback parameter.
pub fn resolve_branch(signals: &BranchSignals) -> BranchDecision {
    let candidates = [
        (
            BranchSource::Webhook,
            signals.webhook_ref.as_deref().map(strip_webhook_ref),
        ),
        (
            BranchSource::Scm,
            signals.scm_branch.as_deref().map(strip_scm_branch),
        ),
        (
            BranchSource::Parameter,
            signals.fallback.as_deref().map(str::trim),
        ),
    ];

    let (source, candidate) = candidates
        .into_iter()
        .find_map(|(source, value)| value.filter(|v| !v.is_empty()).map(|v| (source, v)))
        .unwrap_or((BranchSource::None, ""));

    if is_allowed(candidate) {
        BranchDecision::Build {
            branch: EffectiveBranch(candidate.to_string()),
            source,
        }
    } else {
        BranchDecision::NotAllowed {
            candidate: candidate.to_string(),
            source,
        }
    }
}
