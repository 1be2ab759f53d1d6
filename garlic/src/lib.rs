pub mod cert;

pub mod config;
pub use config::PolicyConfig;

pub mod context;
pub use context::{Context, DefaultContext};

pub mod device;
pub use device::{
    ComponentName, Device, DevicePolicy, LookupError, PackageManager, UserId, UserManager,
    UserRestriction,
};

pub mod errors;
pub use errors::{Error, Result};

pub mod installers;
pub use installers::{TrustedInstaller, TrustedInstallers};

pub mod policy;
pub use policy::{Decision, Reason, TrustedInstallerPolicy};

pub mod signature;
pub use signature::Signature;

pub mod snapshot;
pub use snapshot::DeviceSnapshot;

pub mod utils;

#[cfg(test)]
pub mod testing;
