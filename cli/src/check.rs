use std::path::PathBuf;

use anyhow::Context as AnyhowContext;
use clap::{self, Args};

use garlic::{Context, DeviceSnapshot};

use crate::utils::policy_context;

#[derive(Args)]
pub struct Check {
    /// Package name of the installer, leave out for an unknown caller
    package: Option<String>,

    /// TOML snapshot of the device state
    #[arg(short = 'S', long)]
    snapshot: PathBuf,

    /// Policy config file, otherwise one is searched for
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Print the decision as JSON
    #[arg(short = 'j', long)]
    json: bool,
}

impl Check {
    /// Prints the decision and returns whether the package is trusted
    pub fn run(&self) -> anyhow::Result<bool> {
        let ctx = policy_context(self.config.as_ref());
        let policy = ctx
            .get_policy()
            .with_context(|| "loading trusted installer policy")?;
        let device = DeviceSnapshot::parse(&self.snapshot).with_context(|| {
            format!("reading device snapshot {}", self.snapshot.display())
        })?;

        let decision = policy.evaluate(&device, self.package.as_deref());

        if self.json {
            println!("{}", serde_json::to_string_pretty(&decision)?);
        } else {
            println!("{}", decision);
        }

        Ok(decision.is_trusted())
    }
}
