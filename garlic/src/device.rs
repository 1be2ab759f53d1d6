use std::fmt::{Display, Formatter};
use std::io;
use std::str::FromStr;

use blanket::blanket;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cert::CertificateError;
use crate::Signature;

/// An Android user or profile id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i32);

impl UserId {
    /// The system user, always user 0
    pub const SYSTEM: UserId = UserId(0);
}

impl Display for UserId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A `package/class` pair identifying a component such as a device admin
/// receiver
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComponentName {
    pub package: String,
    pub class: String,
}

impl ComponentName {
    pub fn new<P: Into<String>, C: Into<String>>(package: P, class: C) -> Self {
        Self {
            package: package.into(),
            class: class.into(),
        }
    }

    pub fn package_name(&self) -> &str {
        &self.package
    }

    /// Parse the flattened `pkg/class` form. A class starting with `.` is
    /// relative to the package, as in `org.calyxos.bellis/.BellisDeviceAdminReceiver`.
    pub fn unflatten(flat: &str) -> Option<Self> {
        let (pkg, class) = flat.split_once('/')?;
        if pkg.is_empty() || class.is_empty() {
            return None;
        }
        let class = if class.starts_with('.') {
            format!("{pkg}{class}")
        } else {
            class.to_string()
        };
        Some(Self::new(pkg, class))
    }
}

impl Display for ComponentName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.package, self.class)
    }
}

/// User restrictions the policy cares about
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UserRestriction {
    DisallowInstallUnknownSources,
    DisallowInstallUnknownSourcesGlobally,
    /// Any restriction we don't have a name for
    Other(String),
}

impl UserRestriction {
    pub fn key(&self) -> &str {
        match self {
            Self::DisallowInstallUnknownSources => "no_install_unknown_sources",
            Self::DisallowInstallUnknownSourcesGlobally => "no_install_unknown_sources_globally",
            Self::Other(s) => s.as_str(),
        }
    }
}

impl From<&str> for UserRestriction {
    fn from(s: &str) -> Self {
        match s {
            "no_install_unknown_sources" => Self::DisallowInstallUnknownSources,
            "no_install_unknown_sources_globally" => Self::DisallowInstallUnknownSourcesGlobally,
            other => Self::Other(other.into()),
        }
    }
}

impl FromStr for UserRestriction {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl Display for UserRestriction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Failure to get the signing certificates of a package
#[derive(Error, Debug)]
pub enum LookupError {
    #[error("package {0} not found")]
    NameNotFound(String),

    #[error("{0}")]
    Io(#[from] io::Error),

    #[error("{0}")]
    Certificate(#[from] CertificateError),
}

/// Device policy queries
#[blanket(derive(Ref, Box))]
pub trait DevicePolicy: Send + Sync {
    /// Whether the device is organization owned and has a managed profile
    fn is_org_owned_with_managed_profile(&self) -> crate::Result<bool>;

    /// The profile owner of the given profile, if there is one
    fn profile_owner(&self, profile: UserId) -> crate::Result<Option<ComponentName>>;
}

/// User and profile queries
#[blanket(derive(Ref, Box))]
pub trait UserManager: Send + Sync {
    /// Ids of the profiles of `user`, in the order the platform enumerates
    /// them. The user itself is included.
    fn profile_ids(&self, user: UserId, enabled_only: bool) -> crate::Result<Vec<UserId>>;

    fn is_managed_profile(&self, profile: UserId) -> crate::Result<bool>;

    fn has_user_restriction(&self, restriction: &UserRestriction) -> crate::Result<bool>;
}

/// Package queries
#[blanket(derive(Ref, Box))]
pub trait PackageManager: Send + Sync {
    /// The current signers of `package`, in signer order
    fn signing_certificates(&self, package: &str) -> Result<Vec<Signature>, LookupError>;
}

/// Everything the trusted installer policy needs to know about a device
pub trait Device: DevicePolicy + UserManager + PackageManager {}

impl<T: DevicePolicy + UserManager + PackageManager + ?Sized> Device for T {}
