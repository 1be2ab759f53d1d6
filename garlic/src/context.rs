use std::env;
use std::path::PathBuf;

use blanket::blanket;
use directories::BaseDirs;
use once_cell::sync::OnceCell;

use crate::config::PolicyConfig;
use crate::policy::TrustedInstallerPolicy;
use crate::utils::path_lossy;
use crate::Error;

pub const CONFIG_ENV: &str = "GARLIC_CONFIG";
pub const PROJECT_HOME_ENV: &str = "GARLIC_PROJECT_HOME";
pub const CONFIG_FILE_NAME: &str = "garlic.toml";

/// Context is a trait for an object that can help standardize file locations
/// and lookup env vars.
///
/// Most methods on this trait have a default implementation that is perfectly
/// safe to leave unchanged.
#[blanket(derive(Ref, Box))]
pub trait Context: Send + Sync {
    fn maybe_get_env(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }

    fn has_env(&self, key: &str) -> bool {
        self.maybe_get_env(key).is_some()
    }

    fn get_env(&self, key: &str) -> crate::Result<String> {
        self.maybe_get_env(key)
            .ok_or_else(|| Error::MissingEnv(key.into()))
    }

    fn get_project_dir(&self) -> crate::Result<PathBuf> {
        let home = self.get_env(PROJECT_HOME_ENV).map(PathBuf::from)?;
        if !home.exists() {
            return Err(Error::Generic(format!(
                "{} set to {}, but that directory doesn't exist",
                PROJECT_HOME_ENV,
                path_lossy(&home)
            )));
        }
        Ok(home)
    }

    fn get_project_dir_child(&self, child: &str) -> crate::Result<PathBuf> {
        self.get_project_dir().map(|x| x.join(child))
    }

    fn get_output_dir(&self) -> crate::Result<PathBuf> {
        self.get_project_dir_child("garlic_out")
    }

    fn get_output_dir_child(&self, child: &str) -> crate::Result<PathBuf> {
        self.get_output_dir().map(|x| x.join(child))
    }

    fn get_user_config_dir(&self) -> crate::Result<PathBuf> {
        let bd = BaseDirs::new().ok_or(Error::NoBaseDirs)?;
        Ok(bd.config_dir().join("garlic"))
    }

    /// Find the policy config file.
    ///
    /// `GARLIC_CONFIG` wins and must point at a file. Otherwise `garlic.toml`
    /// is looked for in the project dir and then the user config dir.
    fn find_config_file(&self) -> crate::Result<Option<PathBuf>> {
        if let Some(explicit) = self.maybe_get_env(CONFIG_ENV) {
            let path = PathBuf::from(explicit);
            if !path.is_file() {
                return Err(Error::MissingFile(path_lossy(&path).into_owned()));
            }
            return Ok(Some(path));
        }

        let candidates = [
            self.get_project_dir_child(CONFIG_FILE_NAME),
            self.get_user_config_dir().map(|d| d.join(CONFIG_FILE_NAME)),
        ];

        Ok(candidates
            .into_iter()
            .filter_map(|it| it.ok())
            .find(|it| it.is_file()))
    }

    fn get_policy_config<'a>(&'a self) -> crate::Result<&'a PolicyConfig>;

    fn get_policy(&self) -> crate::Result<TrustedInstallerPolicy> {
        Ok(TrustedInstallerPolicy::from_config(self.get_policy_config()?))
    }
}

/// Load the config the context points at, or the defaults if there isn't one
pub fn load_policy_config(
    ctx: &dyn Context,
    explicit: Option<&PathBuf>,
) -> crate::Result<PolicyConfig> {
    let path = match explicit {
        Some(p) => Some(p.clone()),
        None => ctx.find_config_file()?,
    };

    match path {
        Some(p) => {
            log::info!("loading policy config from {}", path_lossy(&p));
            PolicyConfig::parse(&p)
        }
        None => {
            log::debug!("no policy config found, using defaults");
            Ok(PolicyConfig::default())
        }
    }
}

#[derive(Clone, Default)]
pub struct DefaultContext {
    config_file: Option<PathBuf>,
    policy_config: OnceCell<PolicyConfig>,
}

impl DefaultContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the given config file instead of searching for one
    pub fn set_config_file(&mut self, path: PathBuf) -> &mut Self {
        self.config_file = Some(path);
        self.policy_config = OnceCell::new();
        self
    }
}

impl Context for DefaultContext {
    fn get_policy_config<'a>(&'a self) -> crate::Result<&'a PolicyConfig> {
        self.policy_config
            .get_or_try_init(|| load_policy_config(self, self.config_file.as_ref()))
    }
}

#[cfg(test)]
mod test {
    use std::fs;

    use super::*;
    use crate::installers::{TrustedInstallers, AURORA_STORE_CERT};
    use crate::testing::{tmp_context, TestContext};
    use rstest::*;

    fn write_config(ctx: &TestContext, name: &str, owner: &str) -> PathBuf {
        let path = ctx.to_abs(name);
        fs::write(
            &path,
            format!(
                "designated-owner = \"{owner}\"\n[[trusted-installer]]\npackage = \"pkg.a\"\ncertificate = \"{AURORA_STORE_CERT}\"\n"
            ),
        )
        .expect("writing config");
        path
    }

    #[rstest]
    fn test_defaults_without_config(tmp_context: TestContext) {
        let cfg = tmp_context.get_policy_config().expect("default config");
        assert_eq!(cfg.path(), None);
        assert_eq!(cfg.installers(), &TrustedInstallers::defaults());
    }

    #[rstest]
    fn test_project_config(tmp_context: TestContext) {
        let path = write_config(&tmp_context, CONFIG_FILE_NAME, "org.project");
        assert_eq!(tmp_context.find_config_file().unwrap(), Some(path));
        let policy = tmp_context.get_policy().expect("policy");
        assert_eq!(policy.designated_owner(), "org.project");
        assert_eq!(policy.installers().len(), 1);
    }

    #[rstest]
    fn test_env_config_wins(mut tmp_context: TestContext) {
        write_config(&tmp_context, CONFIG_FILE_NAME, "org.project");
        let explicit = write_config(&tmp_context, "other.toml", "org.explicit");
        tmp_context.set_env(CONFIG_ENV, explicit.to_string_lossy());
        assert_eq!(
            tmp_context.get_policy().unwrap().designated_owner(),
            "org.explicit"
        );
    }

    #[rstest]
    fn test_env_config_missing(mut tmp_context: TestContext) {
        let missing = tmp_context.to_abs("missing.toml");
        tmp_context.set_env(CONFIG_ENV, missing.to_string_lossy());
        assert!(matches!(
            tmp_context.get_policy_config(),
            Err(Error::MissingFile(_))
        ));
    }

    #[rstest]
    fn test_missing_project_dir(mut tmp_context: TestContext) {
        let missing = tmp_context.to_abs("nope");
        tmp_context.set_env(PROJECT_HOME_ENV, missing.to_string_lossy());
        assert!(tmp_context.get_project_dir().is_err());
        assert!(tmp_context.get_output_dir_child("log").is_err());
    }

    #[rstest]
    fn test_explicit_config_file(tmp_context: TestContext) {
        let path = write_config(&tmp_context, "explicit.toml", "org.explicit");
        let cfg = load_policy_config(&tmp_context, Some(&path)).expect("config");
        assert_eq!(cfg.designated_owner(), "org.explicit");
    }
}
