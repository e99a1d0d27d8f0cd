use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::types::{Commit, DeploymentPlan};

const FUNCTIONS_PREFIX: &str = "functions/";
const CLIENT_PREFIX: &str = "client/";

/// Parses a raw CI payload into commit records.
///
/// An unparsable payload and a parsed payload of the wrong shape are reported
/// as distinct errors so callers can log them separately.
///
/// # Errors
///
/// Returns an error if the payload is not valid JSON, is not a JSON array, or
/// contains commit objects without the required fields.
pub fn parse_commits(payload: &str) -> Result<Vec<Commit>> {
    let value: serde_json::Value = serde_json::from_str(payload)?;
    if !value.is_array() {
        return Err(Error::PayloadShapeError(json_type_name(&value).to_string()));
    }
    Ok(serde_json::from_value(value)?)
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// Derives the deployment plan from a batch of commits.
///
/// Every path in added, modified and removed is checked against both rules;
/// a path matching neither contributes nothing and raises no error.
#[instrument(skip(commits), fields(commits = commits.len()))]
#[must_use]
pub fn classify(commits: &[Commit]) -> DeploymentPlan {
    let mut plan = DeploymentPlan::default();

    for commit in commits {
        debug!(id = %commit.id, message = %commit.message, "Processing commit");
        for path in commit.changed_files() {
            debug!(path = %path, "Checking file");

            if let Some(name) = function_target(path) {
                plan.add_function(name);
            }
            if path.starts_with(CLIENT_PREFIX) {
                plan.client = true;
            }
        }
    }

    plan
}

/// Extracts `<name>` from `functions/<name>/...` paths.
///
/// The captured segment must be non-empty and must be followed by a further
/// separator, so `functions/foo` and `functions.js` never match.
fn function_target(path: &str) -> Option<&str> {
    let rest = path.strip_prefix(FUNCTIONS_PREFIX)?;
    let (name, _) = rest.split_once('/')?;
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}
