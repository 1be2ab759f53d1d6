use std::fs;
use std::path::PathBuf;

use anyhow::Context as AnyhowContext;

use garlic::{DefaultContext, Signature};

/// A context that uses `config` when given and otherwise searches for one
pub fn policy_context(config: Option<&PathBuf>) -> DefaultContext {
    let mut ctx = DefaultContext::new();
    if let Some(path) = config {
        ctx.set_config_file(path.clone());
    }
    ctx
}

/// Read a certificate given on the command line, either as hex or as the
/// path of a DER file
pub fn read_certificate(arg: &str, hex: bool) -> anyhow::Result<Signature> {
    if hex {
        return Signature::from_hex(arg).with_context(|| "parsing hex certificate");
    }
    let bytes = fs::read(arg).with_context(|| format!("reading certificate file {}", arg))?;
    Ok(Signature::from(bytes))
}
