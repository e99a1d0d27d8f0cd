use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize};

/// A single version-control change record from the CI event payload.
#[derive(Debug, Clone, Deserialize)]
pub struct Commit {
    pub id: String,
    pub message: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub added: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub modified: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub removed: Vec<String>,
}

impl Commit {
    /// All changed paths in this commit: added, then modified, then removed.
    pub fn changed_files(&self) -> impl Iterator<Item = &str> {
        self.added
            .iter()
            .chain(&self.modified)
            .chain(&self.removed)
            .map(String::as_str)
    }
}

/// CI payloads carry `null` for a change kind a commit has none of; treat it
/// like an absent field.
fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// The set of deployment targets derived from a batch of commits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentPlan {
    /// Function names in order of first insertion, deduplicated.
    pub functions: Vec<String>,
    /// Whether the client bundle needs a deploy.
    pub client: bool,
}

impl DeploymentPlan {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty() && !self.client
    }

    pub(crate) fn add_function(&mut self, name: &str) {
        if !self.functions.iter().any(|existing| existing == name) {
            self.functions.push(name.to_string());
        }
    }
}

/// Where the raw commits payload comes from.
#[derive(Debug, Clone)]
pub enum PayloadSource {
    /// Payload passed directly as a string.
    Inline(String),
    /// Payload read from a file.
    File(PathBuf),
    /// Payload read from a named environment variable, the CI event channel.
    Env(String),
}

/// A deployable unit addressed by one executor invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployTarget {
    Functions(Vec<String>),
    Client,
}

/// Result of one attempted deployment action.
#[derive(Debug)]
pub struct ActionOutcome {
    pub target: DeployTarget,
    pub success: bool,
    pub error: Option<String>,
}

impl ActionOutcome {
    pub(crate) fn succeeded(target: DeployTarget) -> Self {
        Self {
            target,
            success: true,
            error: None,
        }
    }

    pub(crate) fn failed(target: DeployTarget, error: &crate::Error) -> Self {
        Self {
            target,
            success: false,
            error: Some(error.to_string()),
        }
    }
}

/// Aggregated result of one executor run.
#[derive(Debug, Default)]
pub struct DeploymentReport {
    pub actions: Vec<ActionOutcome>,
}

impl DeploymentReport {
    /// Logical AND over the attempted actions; vacuously true when nothing ran.
    #[must_use]
    pub fn overall_success(&self) -> bool {
        self.actions.iter().all(|action| action.success)
    }

    #[must_use]
    pub fn nothing_attempted(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Outcome of one full deploy run, as consumed by the CLI for its exit status.
#[derive(Debug)]
pub enum RunOutcome {
    /// The payload was missing or unusable; nothing was attempted.
    Skipped { reason: String },
    /// Classification produced an empty plan; nothing was attempted.
    NothingToDeploy { plan: DeploymentPlan },
    /// Classification ran in plan-only mode; the deploy tool was not invoked.
    Planned { plan: DeploymentPlan },
    /// At least one deployment action was attempted.
    Completed {
        plan: DeploymentPlan,
        report: DeploymentReport,
    },
}

impl RunOutcome {
    /// Whether the run should terminate the process successfully.
    ///
    /// Skipped, planned and empty runs are successes; a completed run succeeds
    /// only if every attempted action did.
    #[must_use]
    pub fn success(&self) -> bool {
        match self {
            Self::Skipped { .. } | Self::NothingToDeploy { .. } | Self::Planned { .. } => true,
            Self::Completed { report, .. } => report.overall_success(),
        }
    }

    #[must_use]
    pub fn plan(&self) -> Option<&DeploymentPlan> {
        match self {
            Self::Skipped { .. } => None,
            Self::NothingToDeploy { plan }
            | Self::Planned { plan }
            | Self::Completed { plan, .. } => Some(plan),
        }
    }
}
