use std::borrow::Cow;
use std::fmt::Display;
use std::path::{Path, PathBuf};

use toml::{Table, Value};

use crate::installers::{TrustedInstaller, TrustedInstallers, BELLIS_PACKAGE_NAME};
use crate::utils::{path_lossy, read_file, read_file_bytes, relative_to_file};
use crate::Signature;

#[derive(Debug)]
pub enum Error {
    InvalidType,
    MissingKey,
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::InvalidType => "InvalidType",
                Self::MissingKey => "MissingKey",
            }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// A view of one table in a config file that knows its dotted key path, so
/// errors can point at the offending key
pub struct ConfigMap<'c> {
    path: &'c Path,
    name: Option<Cow<'c, str>>,
    table: &'c Table,
}

pub fn parse_config<R, F>(file: &Path, f: F) -> crate::Result<R>
where
    F: FnOnce(&ConfigMap) -> crate::Result<R>,
{
    let as_str = read_file(file)?;
    parse_config_str(file, &as_str, f)
}

/// Same as [parse_config] for content that was already read. `file` is only
/// used to report errors and resolve relative paths.
pub fn parse_config_str<R, F>(file: &Path, content: &str, f: F) -> crate::Result<R>
where
    F: FnOnce(&ConfigMap) -> crate::Result<R>,
{
    let table: Table = match toml::from_str(content) {
        Ok(v) => v,
        Err(e) => return Err(crate::Error::new_cfg(file, &e)),
    };

    let base = ConfigMap {
        name: None,
        path: file,
        table: &table,
    };

    f(&base)
}

impl<'c> ConfigMap<'c> {
    fn get_full_path<'a>(&'a self) -> Option<&'a str> {
        self.name.as_ref().map(|it| it.as_ref())
    }

    fn key_path<'a>(&self, key: &'a str) -> Cow<'a, str> {
        match self.get_full_path() {
            None => Cow::Borrowed(key),
            Some(v) => Cow::Owned(format!("{}.{}", v, key)),
        }
    }

    fn child_name(&self, key: &str) -> Cow<'c, str> {
        match self.get_full_path() {
            Some(parents) => Cow::Owned(format!("{parents}.{key}")),
            None => Cow::Owned(key.to_string()),
        }
    }

    /// The file this config came from
    pub fn file(&self) -> &Path {
        self.path
    }

    /// Helper to create a crate::Error for a missing key
    pub fn missing_key(&self, key: &str) -> crate::Error {
        let path = self.key_path(key);
        crate::Error::InvalidConfig(
            path_lossy(self.path).into_owned(),
            format!("missing key: {}", path),
        )
    }

    /// Helper to create a crate::Error for an invalid key
    pub fn invalid_key(&self, key: &str, expected: &str) -> crate::Error {
        let path = self.key_path(key);
        crate::Error::InvalidConfig(
            path_lossy(self.path).into_owned(),
            format!(
                "invalid value for key: {} (expected type: {})",
                path, expected
            ),
        )
    }

    /// Helper to create a crate::Error for a key that has the right type but
    /// an unusable value
    pub fn invalid_value<S: Display + ?Sized>(&self, key: &str, msg: &S) -> crate::Error {
        let path = self.key_path(key);
        crate::Error::InvalidConfig(path_lossy(self.path).into_owned(), format!("{path}: {msg}"))
    }

    fn get(&self, key: &str) -> Option<&'c Value> {
        self.table.get(key)
    }

    pub fn get_str(&self, key: &str) -> Result<&'c str> {
        self.maybe_get_str(key)?.ok_or(Error::MissingKey)
    }

    pub fn maybe_get_str(&self, key: &str) -> Result<Option<&'c str>> {
        match self.get(key) {
            Some(v) => match v.as_str() {
                Some(v) => Ok(Some(v)),
                None => Err(Error::InvalidType),
            },
            None => Ok(None),
        }
    }

    pub fn maybe_get_str_typecheck(&self, key: &str) -> crate::Result<Option<&'c str>> {
        self.maybe_get_str(key)
            .map_err(|_| self.invalid_key(key, "string"))
    }

    pub fn must_get_str(&self, key: &str) -> crate::Result<&'c str> {
        match self.get_str(key) {
            Err(Error::InvalidType) => Err(self.invalid_key(key, "string")),
            Err(Error::MissingKey) => Err(self.missing_key(key)),
            Ok(v) => Ok(v),
        }
    }

    pub fn maybe_get_bool(&self, key: &str) -> Result<Option<bool>> {
        match self.get(key) {
            Some(v) => v.as_bool().map(Some).ok_or(Error::InvalidType),
            None => Ok(None),
        }
    }

    pub fn maybe_get_bool_typecheck(&self, key: &str) -> crate::Result<Option<bool>> {
        self.maybe_get_bool(key)
            .map_err(|_| self.invalid_key(key, "bool"))
    }

    /// Get an array of tables, i.e. `[[key]]` entries. Each returned map is
    /// named `key[i]` for error messages.
    pub fn maybe_get_map_list(&self, key: &str) -> Result<Option<Vec<ConfigMap<'c>>>> {
        let arr = match self.get(key) {
            Some(v) => v.as_array().ok_or(Error::InvalidType)?,
            None => return Ok(None),
        };

        let mut maps = Vec::with_capacity(arr.len());
        for (i, v) in arr.iter().enumerate() {
            let table = v.as_table().ok_or(Error::InvalidType)?;
            maps.push(ConfigMap {
                name: Some(self.child_name(&format!("{key}[{i}]"))),
                path: self.path,
                table,
            });
        }
        Ok(Some(maps))
    }

    pub fn maybe_get_map_list_typecheck(
        &self,
        key: &str,
    ) -> crate::Result<Option<Vec<ConfigMap<'c>>>> {
        self.maybe_get_map_list(key)
            .map_err(|_| self.invalid_key(key, "array of tables"))
    }
}

pub const DESIGNATED_OWNER_KEY: &str = "designated-owner";
pub const EXTEND_DEFAULTS_KEY: &str = "extend-defaults";
pub const TRUSTED_INSTALLER_KEY: &str = "trusted-installer";

/// Trusted installer policy configuration.
///
/// ```toml
/// designated-owner = "org.calyxos.bellis"
/// extend-defaults = false
///
/// [[trusted-installer]]
/// package = "com.aurora.store"
/// certificate = "3082035f..."
///
/// [[trusted-installer]]
/// package = "org.example.store"
/// certificate-file = "certs/example.der"
/// ```
///
/// Without any `[[trusted-installer]]` entries the built-in list is used.
/// Listing installers replaces the built-in list unless `extend-defaults`
/// is set.
#[derive(Debug, Clone)]
pub struct PolicyConfig {
    path: Option<PathBuf>,
    designated_owner: String,
    installers: TrustedInstallers,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            path: None,
            designated_owner: BELLIS_PACKAGE_NAME.into(),
            installers: TrustedInstallers::defaults(),
        }
    }
}

impl PolicyConfig {
    pub fn parse(source: &Path) -> crate::Result<Self> {
        parse_config(source, Self::from_map)
    }

    pub fn from_toml_str(source: &Path, content: &str) -> crate::Result<Self> {
        parse_config_str(source, content, Self::from_map)
    }

    fn from_map(map: &ConfigMap) -> crate::Result<Self> {
        let designated_owner = map
            .maybe_get_str_typecheck(DESIGNATED_OWNER_KEY)?
            .unwrap_or(BELLIS_PACKAGE_NAME);

        if designated_owner.is_empty() {
            return Err(map.invalid_value(DESIGNATED_OWNER_KEY, "must not be empty"));
        }

        let extend = map
            .maybe_get_bool_typecheck(EXTEND_DEFAULTS_KEY)?
            .unwrap_or(false);

        let installers = match map.maybe_get_map_list_typecheck(TRUSTED_INSTALLER_KEY)? {
            None => TrustedInstallers::defaults(),
            Some(entries) => {
                let mut installers = if extend {
                    TrustedInstallers::defaults()
                } else {
                    TrustedInstallers::new()
                };
                for entry in &entries {
                    let installer = installer_from_map(entry)?;
                    installers
                        .push(installer)
                        .map_err(|e| entry.invalid_value("package", &e))?;
                }
                installers
            }
        };

        log::debug!(
            "policy config from {}: owner {}, {} trusted installers",
            path_lossy(map.file()),
            designated_owner,
            installers.len()
        );

        Ok(Self {
            path: Some(map.file().to_path_buf()),
            designated_owner: designated_owner.into(),
            installers,
        })
    }

    /// The file the config was read from, `None` for the defaults
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn designated_owner(&self) -> &str {
        &self.designated_owner
    }

    pub fn installers(&self) -> &TrustedInstallers {
        &self.installers
    }
}

fn installer_from_map(map: &ConfigMap) -> crate::Result<TrustedInstaller> {
    let package = map.must_get_str("package")?;
    if package.is_empty() {
        return Err(map.invalid_value("package", "must not be empty"));
    }

    let certificate = match (
        map.maybe_get_str_typecheck("certificate")?,
        map.maybe_get_str_typecheck("certificate-file")?,
    ) {
        (Some(_), Some(_)) => {
            return Err(map.invalid_value(
                "certificate",
                "only one of certificate and certificate-file may be set",
            ))
        }
        (Some(hex), None) => {
            Signature::from_hex(hex).map_err(|e| map.invalid_value("certificate", &e))?
        }
        (None, Some(file)) => Signature::new(read_file_bytes(&relative_to_file(map.file(), file))?),
        (None, None) => return Err(map.missing_key("certificate")),
    };

    if certificate.is_empty() {
        return Err(map.invalid_value("certificate", "must not be empty"));
    }

    Ok(TrustedInstaller::new(package, certificate))
}
