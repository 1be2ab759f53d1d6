use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::{env, fs};

use once_cell::sync::OnceCell;
use rand::Rng;
use rstest::fixture;

use crate::config::PolicyConfig;
use crate::context::{load_policy_config, PROJECT_HOME_ENV};
use crate::Context;

#[fixture]
pub fn tmp_context() -> TestContext {
    TestContext::default()
}

#[fixture]
#[once]
pub fn global_tmp_context() -> TestContext {
    TestContext::default()
}

fn random_name() -> String {
    rand::thread_rng().gen::<u64>().to_string()
}

/// A context rooted in a fresh temp dir that acts as the project dir. The
/// process environment is never consulted.
pub struct TestContext {
    project_dir: PathBuf,
    env: HashMap<String, String>,
    policy_config: OnceCell<PolicyConfig>,
}

impl TestContext {
    pub fn set_env<K: AsRef<str>, V: AsRef<str>>(&mut self, key: K, value: V) -> &mut Self {
        self.env.insert(key.as_ref().into(), value.as_ref().into());
        self
    }

    /// `path` inside the project dir
    pub fn to_abs<P: AsRef<Path> + ?Sized>(&self, path: &P) -> PathBuf {
        self.project_dir.join(path)
    }

    /// A path in the project dir that doesn't exist yet
    pub fn get_temp_path(&self, extension: Option<&str>) -> PathBuf {
        let path = self.project_dir.join(random_name());
        match extension {
            Some(ext) => path.with_extension(ext),
            None => path,
        }
    }

    pub fn get_temp_dir(&self) -> PathBuf {
        self.get_temp_path(None)
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        if self.project_dir.exists() {
            let _ = fs::remove_dir_all(&self.project_dir);
        }
    }
}

impl Default for TestContext {
    fn default() -> Self {
        let project_dir = env::temp_dir().join(format!("garlic_test_{}", random_name()));
        fs::create_dir_all(&project_dir).expect("creating test project dir");

        let env = HashMap::from([(
            PROJECT_HOME_ENV.to_string(),
            project_dir.to_string_lossy().into_owned(),
        )]);

        Self {
            project_dir,
            env,
            policy_config: OnceCell::new(),
        }
    }
}

impl Context for TestContext {
    fn maybe_get_env(&self, key: &str) -> Option<String> {
        self.env.get(key).cloned()
    }

    fn get_user_config_dir(&self) -> crate::Result<PathBuf> {
        Ok(self.to_abs("config"))
    }

    fn get_policy_config<'a>(&'a self) -> crate::Result<&'a PolicyConfig> {
        self.policy_config
            .get_or_try_init(|| load_policy_config(self, None))
    }
}
