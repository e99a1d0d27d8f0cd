pub use error::{Error, Result};
pub use types::{
    ActionOutcome, Commit, DeployTarget, DeploymentPlan, DeploymentReport, PayloadSource,
    RunOutcome,
};

pub mod catalyst;
pub mod classifier;
pub mod datastore;
mod error;
pub mod news;
pub mod newsapi;
pub mod processor;
pub mod server;
mod types;

/// Derives a deployment plan from a raw JSON commits payload.
///
/// # Errors
///
/// Returns an error if the payload is not valid JSON or is not a JSON array.
pub fn plan_from_payload(payload: &str) -> Result<DeploymentPlan> {
    let commits = classifier::parse_commits(payload)?;
    Ok(classifier::classify(&commits))
}

/// Creates a `DeployProcessor` that deploys through the given CLI program.
///
/// The processor classifies commit payloads and issues one blocking deploy
/// invocation per applicable target kind.
#[must_use]
pub fn new_deployer(program: &str) -> processor::DeployProcessor<catalyst::CatalystCli> {
    processor::DeployProcessor::with_program(program)
}
