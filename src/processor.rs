use std::env;
use std::fs;

use tracing::{debug, error, info, instrument};

use crate::catalyst::{CatalystCli, DeployTool};
use crate::classifier;
use crate::error::Result;
use crate::types::{
    ActionOutcome, DeployTarget, DeploymentPlan, DeploymentReport, PayloadSource, RunOutcome,
};

/// Reads the raw commits payload named by a source.
///
/// An unset environment variable is not an error: the CI channel simply has
/// nothing for this run. An unreadable payload file is.
///
/// # Errors
///
/// Returns an error if the payload file cannot be read.
pub fn resolve_payload(source: &PayloadSource) -> Result<Option<String>> {
    match source {
        PayloadSource::Inline(payload) => Ok(Some(payload.clone())),
        PayloadSource::File(path) => {
            debug!(path = %path.display(), "Reading commits payload from file");
            Ok(Some(fs::read_to_string(path)?))
        }
        PayloadSource::Env(name) => {
            debug!(name = %name, "Reading commits payload from environment");
            Ok(env::var(name).ok())
        }
    }
}

/// Drives a change-driven deployment run: payload to plan to subprocesses.
pub struct DeployProcessor<T> {
    tool: T,
}

impl DeployProcessor<CatalystCli> {
    /// Creates a processor that deploys through the named CLI program.
    #[must_use]
    pub fn with_program(program: impl Into<String>) -> Self {
        Self::new(CatalystCli::new(program))
    }
}

impl Default for DeployProcessor<CatalystCli> {
    fn default() -> Self {
        Self::new(CatalystCli::default())
    }
}

impl<T: DeployTool> DeployProcessor<T> {
    #[must_use]
    pub fn new(tool: T) -> Self {
        Self { tool }
    }

    /// Classifies a raw commits payload into a deployment plan without
    /// touching the deploy tool.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be parsed or has the wrong
    /// shape.
    pub fn plan(&self, payload: &str) -> Result<DeploymentPlan> {
        let commits = classifier::parse_commits(payload)?;
        Ok(classifier::classify(&commits))
    }

    /// Executes every applicable action in the plan.
    ///
    /// The functions batch and the client bundle are independent: a failure
    /// in one never prevents attempting the other. Each action's result is
    /// collected into the report.
    #[instrument(skip(self, plan), fields(functions = plan.functions.len(), client = plan.client))]
    pub fn execute(&self, plan: &DeploymentPlan) -> DeploymentReport {
        let mut report = DeploymentReport::default();

        if !plan.functions.is_empty() {
            let target = DeployTarget::Functions(plan.functions.clone());
            info!(functions = ?plan.functions, "Deploying functions");
            let outcome = match self.tool.deploy_functions(&plan.functions) {
                Ok(()) => {
                    info!(functions = ?plan.functions, "Functions deployed successfully");
                    ActionOutcome::succeeded(target)
                }
                Err(e) => {
                    error!(error = %e, "Failed to deploy functions");
                    ActionOutcome::failed(target, &e)
                }
            };
            report.actions.push(outcome);
        }

        if plan.client {
            info!("Deploying client");
            let outcome = match self.tool.deploy_client() {
                Ok(()) => {
                    info!("Client deployed successfully");
                    ActionOutcome::succeeded(DeployTarget::Client)
                }
                Err(e) => {
                    error!(error = %e, "Failed to deploy client");
                    ActionOutcome::failed(DeployTarget::Client, &e)
                }
            };
            report.actions.push(outcome);
        }

        report
    }

    /// Classifies the payload named by a source without touching the deploy
    /// tool.
    ///
    /// A missing, unreadable, unparsable or wrongly shaped payload degrades
    /// to a skipped outcome: logged, nothing attempted, and still a success.
    #[instrument(skip(self, source))]
    pub fn plan_from_source(&self, source: &PayloadSource) -> RunOutcome {
        let payload = match resolve_payload(source) {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                info!("No commits payload found");
                return RunOutcome::Skipped {
                    reason: "no commits payload found".to_string(),
                };
            }
            Err(e) => {
                error!(error = %e, "Could not read commits payload");
                return RunOutcome::Skipped {
                    reason: e.to_string(),
                };
            }
        };

        match self.plan(&payload) {
            Ok(plan) => {
                info!(functions = ?plan.functions, client = plan.client, "Deployment plan derived");
                RunOutcome::Planned { plan }
            }
            Err(e) => {
                error!(error = %e, "Ignoring unusable commits payload");
                RunOutcome::Skipped {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Runs the whole flow for a payload source: resolve, classify, deploy.
    ///
    /// Only failed deployment actions make the outcome a failure; an unusable
    /// payload is a skipped run.
    #[instrument(skip(self, source))]
    pub fn run_from_source(&self, source: &PayloadSource) -> RunOutcome {
        match self.plan_from_source(source) {
            RunOutcome::Planned { plan } => self.deploy(plan),
            other => other,
        }
    }

    /// Runs the whole flow for an optional raw payload.
    pub fn run(&self, payload: Option<&str>) -> RunOutcome {
        match payload {
            Some(payload) => self.run_from_source(&PayloadSource::Inline(payload.to_string())),
            None => {
                info!("No commits payload found");
                RunOutcome::Skipped {
                    reason: "no commits payload found".to_string(),
                }
            }
        }
    }

    fn deploy(&self, plan: DeploymentPlan) -> RunOutcome {
        if plan.is_empty() {
            info!("No deployment needed - no function or client changes detected");
            return RunOutcome::NothingToDeploy { plan };
        }

        let report = self.execute(&plan);
        debug!(
            attempted = report.actions.len(),
            success = report.overall_success(),
            "Deployment run finished"
        );
        RunOutcome::Completed { plan, report }
    }
}
