//! Decide whether an unknown installation source may install packages while
//! the device is at garlic level Safest.
//!
//! Safest is assumed when the device is organization owned, the system
//! user's first managed profile is owned by the designated management app and
//! installs from unknown sources are disallowed globally. Only then is the
//! calling package looked up in the trusted installer allow-list and its
//! signers compared against the pinned certificate.

use std::fmt::{Display, Formatter};

use serde::Serialize;

use crate::device::{Device, DevicePolicy, LookupError, UserId, UserManager, UserRestriction};
use crate::installers::{TrustedInstaller, TrustedInstallers, BELLIS_PACKAGE_NAME};
use crate::PolicyConfig;

/// Why a package was not trusted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "kebab-case")]
pub enum Reason {
    NotOrganizationOwned,
    NoManagedProfile,
    ProfileOwnerMismatch { found: Option<String> },
    RestrictionInactive,
    NotAllowListed,
    SignatureMismatch,
    QueryFailed { message: String },
}

impl Display for Reason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotOrganizationOwned => {
                f.write_str("device is not organization owned with a managed profile")
            }
            Self::NoManagedProfile => f.write_str("system user has no managed profile"),
            Self::ProfileOwnerMismatch { found: Some(pkg) } => {
                write!(f, "managed profile is owned by {pkg}")
            }
            Self::ProfileOwnerMismatch { found: None } => {
                f.write_str("managed profile has no profile owner")
            }
            Self::RestrictionInactive => write!(
                f,
                "{} is not set",
                UserRestriction::DisallowInstallUnknownSourcesGlobally
            ),
            Self::NotAllowListed => f.write_str("package is not a trusted installer"),
            Self::SignatureMismatch => {
                f.write_str("package is not signed with the pinned certificate")
            }
            Self::QueryFailed { message } => write!(f, "device query failed: {message}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "kebab-case")]
pub enum Decision {
    Trusted,
    Untrusted(Reason),
}

impl Decision {
    #[inline]
    pub fn is_trusted(&self) -> bool {
        matches!(self, Self::Trusted)
    }

    pub fn reason(&self) -> Option<&Reason> {
        match self {
            Self::Trusted => None,
            Self::Untrusted(r) => Some(r),
        }
    }
}

impl Display for Decision {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trusted => f.write_str("trusted"),
            Self::Untrusted(r) => write!(f, "untrusted: {r}"),
        }
    }
}

/// The first managed profile of `user`, in the order the platform lists the
/// user's profiles. Later managed profiles are never considered.
pub fn first_managed_profile<D: UserManager + ?Sized>(
    device: &D,
    user: UserId,
) -> crate::Result<Option<UserId>> {
    for profile in device.profile_ids(user, false)? {
        if device.is_managed_profile(profile)? {
            return Ok(Some(profile));
        }
    }
    Ok(None)
}

/// Package of the profile owner of the first managed profile of `user`
pub fn first_managed_profile_owner<D: DevicePolicy + UserManager + ?Sized>(
    device: &D,
    user: UserId,
) -> crate::Result<Option<String>> {
    let profile = match first_managed_profile(device, user)? {
        Some(p) => p,
        None => return Ok(None),
    };
    Ok(device.profile_owner(profile)?.map(|cn| cn.package))
}

/// The trusted installer policy.
///
/// Holds no state besides its configuration: every call queries the device
/// again, so one policy can be shared by any number of threads.
#[derive(Debug, Clone)]
pub struct TrustedInstallerPolicy {
    designated_owner: String,
    installers: TrustedInstallers,
}

impl Default for TrustedInstallerPolicy {
    fn default() -> Self {
        Self::new(BELLIS_PACKAGE_NAME, TrustedInstallers::defaults())
    }
}

impl TrustedInstallerPolicy {
    pub fn new<S: Into<String>>(designated_owner: S, installers: TrustedInstallers) -> Self {
        Self {
            designated_owner: designated_owner.into(),
            installers,
        }
    }

    pub fn from_config(cfg: &PolicyConfig) -> Self {
        Self::new(cfg.designated_owner(), cfg.installers().clone())
    }

    pub fn designated_owner(&self) -> &str {
        &self.designated_owner
    }

    pub fn installers(&self) -> &TrustedInstallers {
        &self.installers
    }

    /// Returns true if `calling_package` should be allowed to install
    /// packages even though garlic level Safest disallows unknown sources.
    pub fn is_trusted_source_for_garlic_level(
        &self,
        device: &dyn Device,
        calling_package: Option<&str>,
    ) -> bool {
        self.evaluate(device, calling_package).is_trusted()
    }

    /// Same as [TrustedInstallerPolicy::is_trusted_source_for_garlic_level]
    /// but says why a package wasn't trusted.
    ///
    /// A failed device query fails closed.
    pub fn evaluate(&self, device: &dyn Device, calling_package: Option<&str>) -> Decision {
        let decision = match self.check_garlic_level(device) {
            Ok(None) => self.check_installer(device, calling_package),
            Ok(Some(reason)) => Decision::Untrusted(reason),
            Err(e) => {
                log::warn!("device query failed, not trusting {calling_package:?}: {e}");
                Decision::Untrusted(Reason::QueryFailed {
                    message: e.to_string(),
                })
            }
        };

        match &decision {
            Decision::Trusted => log::info!("{calling_package:?} is a trusted installer"),
            Decision::Untrusted(r) => log::debug!("{calling_package:?} untrusted: {r}"),
        }

        decision
    }

    /// Returns the reason the device is not at garlic level Safest, if any
    fn check_garlic_level(&self, device: &dyn Device) -> crate::Result<Option<Reason>> {
        if !device.is_org_owned_with_managed_profile()? {
            return Ok(Some(Reason::NotOrganizationOwned));
        }

        let profile = match first_managed_profile(device, UserId::SYSTEM)? {
            Some(p) => p,
            None => return Ok(Some(Reason::NoManagedProfile)),
        };

        let owner = device.profile_owner(profile)?;
        log::debug!("first managed profile {profile} is owned by {owner:?}");
        match owner {
            Some(cn) if cn.package == self.designated_owner => {}
            other => {
                return Ok(Some(Reason::ProfileOwnerMismatch {
                    found: other.map(|cn| cn.package),
                }))
            }
        }

        if !device.has_user_restriction(&UserRestriction::DisallowInstallUnknownSourcesGlobally)? {
            return Ok(Some(Reason::RestrictionInactive));
        }

        Ok(None)
    }

    fn check_installer(&self, device: &dyn Device, calling_package: Option<&str>) -> Decision {
        let mut candidates = self.installers.matching(calling_package).peekable();
        if candidates.peek().is_none() {
            return Decision::Untrusted(Reason::NotAllowListed);
        }

        let matched = candidates.any(|installer| {
            check_signers(device, installer).unwrap_or_else(|e| {
                log::debug!(
                    "ignoring trusted installer entry for {}: {e}",
                    installer.package()
                );
                false
            })
        });

        if matched {
            Decision::Trusted
        } else {
            Decision::Untrusted(Reason::SignatureMismatch)
        }
    }
}

fn check_signers(device: &dyn Device, installer: &TrustedInstaller) -> Result<bool, LookupError> {
    let signers = device.signing_certificates(installer.package())?;
    Ok(installer.is_signed_by(&signers)?)
}
