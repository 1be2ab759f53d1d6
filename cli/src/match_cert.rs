use anyhow::Context as AnyhowContext;
use clap::{self, Args};

use garlic::Signature;

use crate::utils::read_certificate;

#[derive(Args)]
pub struct MatchCert {
    /// First certificate, a DER file
    first: String,

    /// Second certificate, a DER file
    second: String,

    /// Treat both arguments as hex instead of file paths
    #[arg(short = 'x', long)]
    hex: bool,
}

impl MatchCert {
    pub fn run(&self) -> anyhow::Result<bool> {
        let first = read_certificate(&self.first, self.hex)?;
        let second = read_certificate(&self.second, self.hex)?;

        log::debug!("comparing {:?} with {:?}", first, second);

        let matched = Signature::are_effective_match(&first, &second)
            .with_context(|| "comparing certificates")?;

        println!("{}", if matched { "match" } else { "no match" });
        Ok(matched)
    }
}
