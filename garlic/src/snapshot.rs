//! A device described by a TOML file instead of queried live.
//!
//! ```toml
//! org-owned-with-managed-profile = true
//! restrictions = ["no_install_unknown_sources_globally"]
//!
//! [[profile]]
//! id = 10
//! managed = true
//! owner = "org.calyxos.bellis/.BellisDeviceAdminReceiver"
//!
//! [packages."com.aurora.store"]
//! certificates = ["3082035f..."]
//! certificate-files = ["certs/aurora.der"]
//! ```
//!
//! Certificate files are raw DER and resolved relative to the snapshot file.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::Deserialize;

use crate::device::{
    ComponentName, DevicePolicy, LookupError, PackageManager, UserId, UserManager,
    UserRestriction,
};
use crate::utils::{read_file, read_file_bytes, relative_to_file};
use crate::Signature;

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RawSnapshot {
    #[serde(default)]
    org_owned_with_managed_profile: bool,
    #[serde(default)]
    restrictions: Vec<String>,
    #[serde(default, rename = "profile")]
    profiles: Vec<RawProfile>,
    #[serde(default)]
    packages: HashMap<String, RawPackage>,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RawProfile {
    id: i32,
    #[serde(default)]
    parent: i32,
    #[serde(default)]
    managed: bool,
    #[serde(default = "default_enabled")]
    enabled: bool,
    owner: Option<String>,
}

fn default_enabled() -> bool {
    true
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RawPackage {
    #[serde(default)]
    certificates: Vec<String>,
    #[serde(default)]
    certificate_files: Vec<String>,
}

/// A profile belonging to some parent user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub id: UserId,
    pub parent: UserId,
    pub managed: bool,
    pub enabled: bool,
    pub owner: Option<ComponentName>,
}

/// Profile owners may be given as `pkg/class` or just a package name
fn owner_component(owner: &str) -> ComponentName {
    ComponentName::unflatten(owner).unwrap_or_else(|| ComponentName::new(owner, ""))
}

/// Fixed device state implementing all of the device capabilities
#[derive(Debug, Clone, Default)]
pub struct DeviceSnapshot {
    org_owned_with_managed_profile: bool,
    restrictions: HashSet<UserRestriction>,
    profiles: Vec<Profile>,
    packages: HashMap<String, Vec<Signature>>,
}

impl DeviceSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a snapshot from a TOML file
    pub fn parse(path: &Path) -> crate::Result<Self> {
        let content = read_file(path)?;
        Self::from_toml_str(&content, path)
    }

    /// Parse snapshot TOML. `path` is used for error messages and to
    /// resolve `certificate-files`.
    pub fn from_toml_str(content: &str, path: &Path) -> crate::Result<Self> {
        let raw: RawSnapshot = match toml::from_str(content) {
            Ok(v) => v,
            Err(e) => return Err(crate::Error::new_cfg(path, &e)),
        };

        let mut it = Self::new();
        it.set_org_owned_with_managed_profile(raw.org_owned_with_managed_profile);

        for r in &raw.restrictions {
            it.restrict(UserRestriction::from(r.as_str()));
        }

        for p in raw.profiles {
            it.upsert_profile(Profile {
                id: UserId(p.id),
                parent: UserId(p.parent),
                managed: p.managed,
                enabled: p.enabled,
                owner: p.owner.as_deref().map(owner_component),
            });
        }

        for (name, pkg) in raw.packages {
            let mut certs = Vec::with_capacity(pkg.certificates.len() + pkg.certificate_files.len());
            for (i, hex) in pkg.certificates.iter().enumerate() {
                let sig = Signature::from_hex(hex).map_err(|e| {
                    crate::Error::new_cfg(
                        path,
                        &format!("packages.\"{name}\".certificates[{i}]: {e}"),
                    )
                })?;
                certs.push(sig);
            }
            for file in &pkg.certificate_files {
                let full = relative_to_file(path, file);
                certs.push(Signature::new(read_file_bytes(&full)?));
            }
            it.package(&name, certs);
        }

        log::debug!(
            "loaded device snapshot with {} profiles and {} packages",
            it.profiles.len(),
            it.packages.len()
        );

        Ok(it)
    }

    pub fn set_org_owned_with_managed_profile(&mut self, value: bool) -> &mut Self {
        self.org_owned_with_managed_profile = value;
        self
    }

    pub fn restrict(&mut self, restriction: UserRestriction) -> &mut Self {
        self.restrictions.insert(restriction);
        self
    }

    pub fn clear_restrictions(&mut self) -> &mut Self {
        self.restrictions.clear();
        self
    }

    /// Add a profile, replacing any existing profile with the same id
    pub fn upsert_profile(&mut self, profile: Profile) -> &mut Self {
        match self.profiles.iter_mut().find(|p| p.id == profile.id) {
            Some(existing) => *existing = profile,
            None => self.profiles.push(profile),
        }
        self
    }

    /// Add an enabled profile of the system user
    pub fn add_profile(&mut self, id: i32, managed: bool, owner: Option<&str>) -> &mut Self {
        self.upsert_profile(Profile {
            id: UserId(id),
            parent: UserId::SYSTEM,
            managed,
            enabled: true,
            owner: owner.map(owner_component),
        })
    }

    /// Shorthand for an enabled managed profile of the system user
    pub fn managed_profile(&mut self, id: i32, owner: &str) -> &mut Self {
        self.add_profile(id, true, Some(owner))
    }

    pub fn clear_profiles(&mut self) -> &mut Self {
        self.profiles.clear();
        self
    }

    /// Install (or replace) a package with the given signers
    pub fn package(&mut self, name: &str, signers: Vec<Signature>) -> &mut Self {
        self.packages.insert(name.into(), signers);
        self
    }

    pub fn remove_package(&mut self, name: &str) -> &mut Self {
        self.packages.remove(name);
        self
    }

    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    fn find_profile(&self, id: UserId) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.id == id)
    }
}

impl DevicePolicy for DeviceSnapshot {
    fn is_org_owned_with_managed_profile(&self) -> crate::Result<bool> {
        Ok(self.org_owned_with_managed_profile)
    }

    fn profile_owner(&self, profile: UserId) -> crate::Result<Option<ComponentName>> {
        Ok(self.find_profile(profile).and_then(|p| p.owner.clone()))
    }
}

impl UserManager for DeviceSnapshot {
    fn profile_ids(&self, user: UserId, enabled_only: bool) -> crate::Result<Vec<UserId>> {
        if user != UserId::SYSTEM && self.find_profile(user).is_none() {
            return Ok(Vec::new());
        }

        let mut ids = vec![user];
        ids.extend(
            self.profiles
                .iter()
                .filter(|p| p.parent == user && p.id != user)
                .filter(|p| !enabled_only || p.enabled)
                .map(|p| p.id),
        );
        Ok(ids)
    }

    fn is_managed_profile(&self, profile: UserId) -> crate::Result<bool> {
        Ok(self.find_profile(profile).map_or(false, |p| p.managed))
    }

    fn has_user_restriction(&self, restriction: &UserRestriction) -> crate::Result<bool> {
        Ok(self.restrictions.contains(restriction))
    }
}

impl PackageManager for DeviceSnapshot {
    fn signing_certificates(&self, package: &str) -> Result<Vec<Signature>, LookupError> {
        self.packages
            .get(package)
            .cloned()
            .ok_or_else(|| LookupError::NameNotFound(package.into()))
    }
}

#[cfg(test)]
mod test {
    use std::path::PathBuf;

    use super::*;
    use crate::installers::{AURORA_STORE_CERT, AURORA_STORE_PACKAGE};
    use crate::testing::certs::aurora_cert;
    use crate::testing::{tmp_context, TestContext};
    use rstest::*;

    fn parse(content: &str) -> crate::Result<DeviceSnapshot> {
        DeviceSnapshot::from_toml_str(content, &PathBuf::from("/tmp/device.toml"))
    }

    #[test]
    fn test_parse() {
        let content = format!(
            r#"
org-owned-with-managed-profile = true
restrictions = ["no_install_unknown_sources_globally", "no_sms"]

[[profile]]
id = 10
managed = true
owner = "org.calyxos.bellis/.BellisDeviceAdminReceiver"

[[profile]]
id = 11
enabled = false

[packages."{AURORA_STORE_PACKAGE}"]
certificates = ["{AURORA_STORE_CERT}"]
"#
        );
        let snap = parse(&content).expect("should parse");

        assert!(snap.is_org_owned_with_managed_profile().unwrap());
        assert!(snap
            .has_user_restriction(&UserRestriction::DisallowInstallUnknownSourcesGlobally)
            .unwrap());
        assert!(snap
            .has_user_restriction(&UserRestriction::Other("no_sms".into()))
            .unwrap());
        assert!(!snap
            .has_user_restriction(&UserRestriction::DisallowInstallUnknownSources)
            .unwrap());

        assert_eq!(
            snap.profile_ids(UserId::SYSTEM, false).unwrap(),
            vec![UserId(0), UserId(10), UserId(11)]
        );
        assert_eq!(
            snap.profile_ids(UserId::SYSTEM, true).unwrap(),
            vec![UserId(0), UserId(10)]
        );
        assert!(snap.is_managed_profile(UserId(10)).unwrap());
        assert!(!snap.is_managed_profile(UserId(11)).unwrap());
        assert!(!snap.is_managed_profile(UserId(0)).unwrap());

        let owner = snap.profile_owner(UserId(10)).unwrap().expect("owner");
        assert_eq!(owner.package_name(), "org.calyxos.bellis");
        assert_eq!(owner.class, "org.calyxos.bellis.BellisDeviceAdminReceiver");
        assert_eq!(snap.profile_owner(UserId(11)).unwrap(), None);

        assert_eq!(
            snap.signing_certificates(AURORA_STORE_PACKAGE).unwrap(),
            vec![aurora_cert()]
        );
        assert!(matches!(
            snap.signing_certificates("com.example"),
            Err(LookupError::NameNotFound(p)) if p == "com.example"
        ));
    }

    #[test]
    fn test_empty_snapshot() {
        let snap = parse("").expect("empty snapshot is valid");
        assert!(!snap.is_org_owned_with_managed_profile().unwrap());
        assert_eq!(
            snap.profile_ids(UserId::SYSTEM, false).unwrap(),
            vec![UserId::SYSTEM]
        );
        assert!(snap.profile_ids(UserId(42), false).unwrap().is_empty());
    }

    #[test]
    fn test_bare_package_owner() {
        let snap = parse("[[profile]]\nid = 10\nmanaged = true\nowner = \"org.mgmt\"\n").unwrap();
        let owner = snap.profile_owner(UserId(10)).unwrap().unwrap();
        assert_eq!(owner.package_name(), "org.mgmt");
    }

    #[rstest]
    #[case::unknown_key("org-owned = true")]
    #[case::wrong_type("restrictions = \"no_sms\"")]
    #[case::bad_hex("[packages.\"a.b\"]\ncertificates = [\"xyz\"]")]
    fn test_parse_errors(#[case] content: &str) {
        match parse(content) {
            Err(crate::Error::InvalidConfig(path, _)) => assert_eq!(path, "/tmp/device.toml"),
            other => panic!("unexpected result {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_bad_hex_names_package() {
        let err = parse("[packages.\"a.b\"]\ncertificates = [\"00\", \"xyz\"]").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("packages.\"a.b\".certificates[1]"), "{msg}");
    }

    #[rstest]
    fn test_certificate_files(tmp_context: TestContext) {
        let dir = tmp_context.get_temp_dir();
        std::fs::create_dir_all(dir.join("certs")).unwrap();
        std::fs::write(dir.join("certs").join("aurora.der"), aurora_cert().as_bytes()).unwrap();
        let snapshot = dir.join("device.toml");
        std::fs::write(
            &snapshot,
            "[packages.\"com.aurora.store\"]\ncertificate-files = [\"certs/aurora.der\"]\n",
        )
        .unwrap();

        let snap = DeviceSnapshot::parse(&snapshot).expect("should parse");
        assert_eq!(
            snap.signing_certificates("com.aurora.store").unwrap(),
            vec![aurora_cert()]
        );
    }

    #[rstest]
    fn test_missing_certificate_file(tmp_context: TestContext) {
        let snapshot = tmp_context.get_temp_path(Some("toml"));
        std::fs::write(
            &snapshot,
            "[packages.\"a.b\"]\ncertificate-files = [\"nope.der\"]\n",
        )
        .unwrap();
        assert!(matches!(
            DeviceSnapshot::parse(&snapshot),
            Err(crate::Error::MissingFile(_))
        ));
    }

    #[test]
    fn test_upsert_profile() {
        let mut snap = DeviceSnapshot::new();
        snap.managed_profile(10, "a.b/.C").managed_profile(10, "d.e/.F");
        assert_eq!(snap.profiles().len(), 1);
        assert_eq!(
            snap.profile_owner(UserId(10)).unwrap().unwrap().package_name(),
            "d.e"
        );
    }
}
