use mockall::mock;
use rstest::fixture;

use crate::device::{
    ComponentName, DevicePolicy, LookupError, PackageManager, UserId, UserManager,
    UserRestriction,
};
use crate::installers::{AURORA_STORE_PACKAGE, BELLIS_PACKAGE_NAME, FDROID_BASIC_PACKAGE};
use crate::{DeviceSnapshot, Signature};

use super::certs::{aurora_cert, fdroid_cert};

mock! {
    pub Device {}

    impl DevicePolicy for Device {
        fn is_org_owned_with_managed_profile(&self) -> crate::Result<bool>;
        fn profile_owner(&self, profile: UserId) -> crate::Result<Option<ComponentName>>;
    }

    impl UserManager for Device {
        fn profile_ids(&self, user: UserId, enabled_only: bool) -> crate::Result<Vec<UserId>>;
        fn is_managed_profile(&self, profile: UserId) -> crate::Result<bool>;
        fn has_user_restriction(&self, restriction: &UserRestriction) -> crate::Result<bool>;
    }

    impl PackageManager for Device {
        fn signing_certificates(&self, package: &str) -> Result<Vec<Signature>, LookupError>;
    }
}

#[fixture]
pub fn mock_device() -> MockDevice {
    MockDevice::new()
}

/// A device at garlic level Safest with both built-in installers present
/// and correctly signed
#[fixture]
pub fn safest_device() -> DeviceSnapshot {
    let mut dev = DeviceSnapshot::new();
    dev.set_org_owned_with_managed_profile(true)
        .managed_profile(
            10,
            &format!("{BELLIS_PACKAGE_NAME}/.BellisDeviceAdminReceiver"),
        )
        .restrict(UserRestriction::DisallowInstallUnknownSourcesGlobally)
        .package(AURORA_STORE_PACKAGE, vec![aurora_cert()])
        .package(FDROID_BASIC_PACKAGE, vec![fdroid_cert()]);
    dev
}
