use std::process::Command;

use tracing::{debug, instrument};

use crate::error::{Error, Result};

/// Trait defining the deployment operations required by the executor
pub trait DeployTool {
    /// Deploy the named functions in a single invocation
    ///
    /// # Errors
    ///
    /// Returns an error if the deploy command cannot be launched or exits
    /// non-zero
    fn deploy_functions(&self, names: &[String]) -> Result<()>;

    /// Deploy the client bundle
    ///
    /// # Errors
    ///
    /// Returns an error if the deploy command cannot be launched or exits
    /// non-zero
    fn deploy_client(&self) -> Result<()>;
}

/// Joins function names into the `--only` argument the deploy CLI expects,
/// e.g. `functions: foo, bar`. Each name appears once, in classifier order.
#[must_use]
pub fn functions_only_arg(names: &[String]) -> String {
    format!("functions: {}", names.join(", "))
}

/// Implementation of deployment operations using the Catalyst CLI
pub struct CatalystCli {
    program: String,
}

impl CatalystCli {
    /// Creates a new `CatalystCli` invoking the given program
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Runs a deploy subcommand as a blocking subprocess with inherited
    /// standard streams, so the tool's own output stays visible.
    #[instrument(skip(self), fields(program = %self.program, args = ?args))]
    fn run_deploy(&self, args: &[&str]) -> Result<()> {
        let status = Command::new(&self.program)
            .args(args)
            .status()
            .map_err(|e| Error::DeployCommandError(e.to_string()))?;

        if !status.success() {
            debug!(status = %status, "Deploy command failed");
            return Err(Error::DeployCommandError(format!(
                "`{} {}` exited with {status}",
                self.program,
                args.join(" ")
            )));
        }

        debug!("Deploy command completed successfully");
        Ok(())
    }
}

impl Default for CatalystCli {
    fn default() -> Self {
        Self::new("catalyst")
    }
}

impl DeployTool for CatalystCli {
    #[instrument(skip(self), fields(functions = ?names))]
    fn deploy_functions(&self, names: &[String]) -> Result<()> {
        let only = functions_only_arg(names);
        self.run_deploy(&["deploy", "--only", &only])
    }

    #[instrument(skip(self))]
    fn deploy_client(&self) -> Result<()> {
        self.run_deploy(&["deploy", "--only", "client"])
    }
}
