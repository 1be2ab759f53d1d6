use std::path::PathBuf;

use anyhow::Context as AnyhowContext;
use clap::{self, Args};
use itertools::Itertools;
use serde_json::json;

use garlic::cert::{bounce, subject};
use garlic::utils::path_lossy;
use garlic::{Context, TrustedInstaller};

use crate::utils::policy_context;

#[derive(Args)]
pub struct List {
    /// Policy config file, otherwise one is searched for
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Print the allow-list as JSON
    #[arg(short = 'j', long)]
    json: bool,
}

fn describe_subject(installer: &TrustedInstaller) -> String {
    match bounce(installer.certificate().as_bytes()) {
        Ok(cert) => subject(&cert),
        Err(e) => format!("<{}>", e),
    }
}

impl List {
    pub fn run(&self) -> anyhow::Result<()> {
        let ctx = policy_context(self.config.as_ref());
        let cfg = ctx
            .get_policy_config()
            .with_context(|| "loading trusted installer policy")?;

        if self.json {
            let installers = cfg
                .installers()
                .iter()
                .map(|it| {
                    json!({
                        "package": it.package(),
                        "sha256": it.certificate().fingerprint(),
                        "subject": describe_subject(it),
                    })
                })
                .collect::<Vec<_>>();
            let out = json!({
                "config": cfg.path().map(|p| path_lossy(p).into_owned()),
                "designated-owner": cfg.designated_owner(),
                "trusted-installers": installers,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
            return Ok(());
        }

        let source = cfg
            .path()
            .map(|p| path_lossy(p).into_owned())
            .unwrap_or_else(|| String::from("<built-in>"));
        println!("config: {}", source);
        println!("designated owner: {}", cfg.designated_owner());

        let width = cfg
            .installers()
            .iter()
            .map(|it| it.package().len())
            .max()
            .unwrap_or(0);

        let lines = cfg
            .installers()
            .iter()
            .map(|it| {
                format!(
                    "{:width$}  {}  {}",
                    it.package(),
                    it.certificate().fingerprint(),
                    describe_subject(it),
                    width = width
                )
            })
            .join("\n");

        if !lines.is_empty() {
            println!("{}", lines);
        }
        Ok(())
    }
}
