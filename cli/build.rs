use std::borrow::Cow;
use std::{
    env,
    fs::{self, File},
    io::{self, Write},
    path::{Path, PathBuf},
    process::Command,
};

const GIT_REVISION_ENV: &str = "GARLIC_GIT_REVISION";

fn main() {
    println!("cargo:rerun-if-env-changed={}", GIT_REVISION_ENV);
    if let Err(e) = write_version_files() {
        panic!("Failed to create the version files: {:?}", e);
    }
}

fn env_var(key: &str) -> io::Result<String> {
    env::var(key).map_err(|e| io::Error::new(io::ErrorKind::NotFound, format!("{key}: {e}")))
}

fn out_file(name: &str) -> io::Result<File> {
    let out_dir = PathBuf::from(env_var("OUT_DIR")?);
    File::create(out_dir.join(name))
}

fn write_version_files() -> io::Result<()> {
    let version = env_var("CARGO_PKG_VERSION")?;
    let target = env_var("TARGET")?;

    write!(out_file("simple_version_string")?, "\"{}\"", version)?;

    let git_rev = match get_git_rev() {
        Ok(v) => Cow::Owned(v),
        Err(_) => Cow::Borrowed("unknown"),
    };
    write!(
        out_file("version_string")?,
        "r#\"garlic {} ({})\nrev {}\"#",
        version,
        target,
        git_rev.trim(),
    )?;
    Ok(())
}

fn get_git_rev() -> io::Result<String> {
    if let Ok(rev) = env::var(GIT_REVISION_ENV) {
        return Ok(rev);
    }
    Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .and_then(|out| {
            if !out.status.success() {
                return Err(io::Error::new(io::ErrorKind::Other, "git rev-parse failed"));
            }
            String::from_utf8(out.stdout).map_err(|_| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    "git rev-parse HEAD output was not UTF-8",
                )
            })
        })
        .or_else(|_| git_rev_from_file())
}

fn git_rev_from_file() -> io::Result<String> {
    let manifest_dir = env_var("CARGO_MANIFEST_DIR")?;
    let git_file = Path::new(&manifest_dir).join("../.git/refs/heads/main");
    fs::read_to_string(git_file)
}
