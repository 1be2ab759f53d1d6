use std::fmt::{Debug, Formatter};

use lazy_static::lazy_static;

use crate::cert::CertificateError;
use crate::Signature;

/// Package of the management app that owns the managed profile when the
/// device runs at garlic level Safest
pub const BELLIS_PACKAGE_NAME: &str = "org.calyxos.bellis";

pub const AURORA_STORE_PACKAGE: &str = "com.aurora.store";

/// Signing certificate of the F-Droid built Aurora Store
pub const AURORA_STORE_CERT: &str = "3082035F30820247A0030201020204746B1B22300D06092A864886F70D01010B05003060310B300906035504061302554B310C300A060355040813034F5247310C300A060355040713034F524731133011060355040A130A6664726F69642E6F7267310F300D060355040B13064644726F6964310F300D060355040313064644726F6964301E170D3139303431333035343835355A170D3436303832393035343835355A3060310B300906035504061302554B310C300A060355040813034F5247310C300A060355040713034F524731133011060355040A130A6664726F69642E6F7267310F300D060355040B13064644726F6964310F300D060355040313064644726F696430820122300D06092A864886F70D01010105000382010F003082010A0282010100C21FFD1B6D1DCAF1AF18F4AD483714A2261BB8A71465CF5D831C3DC0383AF949B8BDE433594C4476CC9E6EC5EA21DF3147BBAB13305AC22A841BBCEBF0192A00A19EB79C1F1117F4CFDCA9B05A38EE24AC737906470BA7193A9981BF3BB413790A99D7CC11F878CE4885123434C86EF22DE4DDD396821B5211B168862D37EB11705F41DC493CF9F5B28FA7F8E64578D32BAFBC0C817742E58779746012445C8D716BC9170B225E64F3EFE6F0534E8E464C13180DEB0AC719E8EA75D003798AF44848FF1253263A4B1DF9D522E4D4699E04F4F5DCF1E7C56615AD76ED821033852CC521CA69BFE3FD9C2B2867663BE303BB936111638FF9A8241F8FCC8D66E1290203010001A321301F301D0603551D0E0416041402443ECFB8376A2F8356212A3B4FD7B3987BBEBE300D06092A864886F70D01010B050003820101008E8FE70E2A156F4A22FB2A20C4C7ED2D680B379E71A5D19FB51E380674AD94CD27DD36FB77A781E1E23616FF30CC35A280EC824E7E392F6868FFD7C21252EFD86226621CB01D8271E0D9646AA529C184D796F189F20C6595AA4A5E9EE748BBF589A1D48B0BC71B54E053E5093ABD64B85D8933BCBD8315A5522D98797D2BF2DA15FC1DAE043C9983AB85C9D1A120336591E7105CCD71EC244EA9D744DE70BE167F17CBF8EC50F7A794FF027F94591CA37B689912027EE6BFD3660CA924294BC9C0C30067D4169B44E513FA086C4763EAFF90B05A66993045BFC28032FF8122E38A31E9467D06BD5E0BCEEC8DFA811FBCAD29915126A69327D98F0E655D1CDB1B";

pub const FDROID_BASIC_PACKAGE: &str = "org.fdroid.basic";

/// Signing certificate of F-Droid Basic
pub const FDROID_BASIC_CERT: &str = "3082036130820249A00302010202042A3D3590300D06092A864886F70D01010B05003060310B300906035504061302554B310C300A060355040813034F5247310C300A060355040713034F524731133011060355040A130A6664726F69642E6F7267310F300D060355040B13064644726F6964310F300D060355040313064644726F69643020170D3233303430353038303235315A180F32303530303832313038303235315A3060310B300906035504061302554B310C300A060355040813034F5247310C300A060355040713034F524731133011060355040A130A6664726F69642E6F7267310F300D060355040B13064644726F6964310F300D060355040313064644726F696430820122300D06092A864886F70D01010105000382010F003082010A02820101009B339156D36085FC67EDD920F8278D01D65DD9EFF64042560D0F6C440FFD1E1A3478B35138B46403E1D79C48ACDBE6D8BE37D112F70DF948DBA16BE82E3A1112AA07E280C5EF25D3F82FB1F0E7CD2FE53D263517C5E5C9EFB871975E61EA581E887D6FABBA7A02E6574D38BB3D7979770C91D521E98C00A8C8872E6B44D5BB7581B73D99E7528083488B6DF374B2C1DAD0FFC58B593DE0EEF0BE07F349541AEE69843F18730412FDC6B7D6ABD9B951643C6289D5EB39934A53F296836A95472982A83B478F0FB094CFF373489214413A90C84D01F281AC5BD90C0BDDD29321CFAD48F5B68F68FE9C207EB12478BAF1EB2A2C29385DA1F9C92554C8E7320190E50203010001A321301F301D0603551D0E041604149E71EB04BCBA667200CBD1400EC41C6CF0FE9BD3300D06092A864886F70D01010B050003820101001B005117E824AF14A43543373AD3A20D998390EC11C188AC762045AC7291C5BC1FFB4577BA74BB30873F2EBE9930DF0E51830B57FD4147FE7389EB414607FB7F698CD1E8D1BAE46AC38B9280B6B36FF2E40C0C4E128EFCDA6EA06427BC0BAFD0A322B2E5329BFEEC71BF5EDC2D91DBFEEC33463E17E6D74F548548FA3B9CEF3BEB32965EF4EDC885241256CFE4DA81AB1C5CAAA315E3D4ADD23C7A2C98E0D099BA16269E58374D44DD9FE548D97CB3A225D9F89EC8CA41A14D912A09457C47C42FC03048E7C163B2355E005A4954B009EFDDEDD8EC525685E5AD8BC4DD617C819D11606B639FEE49BD356C9288DBE458104CF36A4AF9DEBF2A342370E4243E65";

/// Built-in installers allowed to install packages when garlic level Safest
/// would otherwise prevent it, as `(package, hex certificate)`
pub const DEFAULT_TRUSTED_INSTALLERS: &[(&str, &str)] = &[
    (AURORA_STORE_PACKAGE, AURORA_STORE_CERT),
    (FDROID_BASIC_PACKAGE, FDROID_BASIC_CERT),
];

lazy_static! {
    static ref DEFAULT_INSTALLERS: TrustedInstallers =
        TrustedInstallers::from_hex_table(DEFAULT_TRUSTED_INSTALLERS)
            .expect("built-in trusted installer table is invalid");
}

/// A package allowed to act as an installation source, pinned to the
/// certificate it must be signed with
#[derive(Clone, PartialEq, Eq)]
pub struct TrustedInstaller {
    package: String,
    certificate: Signature,
}

impl TrustedInstaller {
    pub fn new<S: Into<String>>(package: S, certificate: Signature) -> Self {
        Self {
            package: package.into(),
            certificate,
        }
    }

    pub fn from_hex<S: Into<String>>(package: S, certificate: &str) -> crate::Result<Self> {
        Ok(Self::new(package, Signature::from_hex(certificate)?))
    }

    #[inline]
    pub fn package(&self) -> &str {
        &self.package
    }

    #[inline]
    pub fn certificate(&self) -> &Signature {
        &self.certificate
    }

    /// Check the current signers of the package against the pinned
    /// certificate. All signers are joined in order before comparing.
    pub fn is_signed_by(&self, signers: &[Signature]) -> Result<bool, CertificateError> {
        let current = Signature::concat(signers);
        Signature::are_effective_match(&self.certificate, &current)
    }
}

impl Debug for TrustedInstaller {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrustedInstaller")
            .field("package", &self.package)
            .field("certificate", &self.certificate)
            .finish()
    }
}

/// The allow-list of trusted installers.
///
/// Entries are unique as `(package, certificate)` pairs, a package may be
/// pinned to more than one certificate (e.g. across a key rotation). The
/// list is only ever built up front and then read, so sharing it between
/// threads needs nothing more than a reference.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct TrustedInstallers {
    entries: Vec<TrustedInstaller>,
}

impl Debug for TrustedInstallers {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.entries.fmt(f)
    }
}

impl TrustedInstallers {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in allow-list
    pub fn defaults() -> Self {
        DEFAULT_INSTALLERS.clone()
    }

    /// Build an allow-list from `(package, hex certificate)` pairs
    pub fn from_hex_table(table: &[(&str, &str)]) -> crate::Result<Self> {
        let mut it = Self::new();
        for (package, cert) in table {
            it.push(TrustedInstaller::from_hex(*package, cert)?)?;
        }
        Ok(it)
    }

    /// Add an installer, refusing an exact duplicate of an existing entry
    pub fn push(&mut self, installer: TrustedInstaller) -> crate::Result<()> {
        if self.entries.contains(&installer) {
            return Err(crate::Error::DuplicateInstaller(installer.package));
        }
        self.entries.push(installer);
        Ok(())
    }

    pub fn contains_package(&self, package: &str) -> bool {
        self.entries.iter().any(|it| it.package == package)
    }

    /// All entries for `package`, in list order
    pub fn matching<'a>(
        &'a self,
        package: Option<&'a str>,
    ) -> impl Iterator<Item = &'a TrustedInstaller> + 'a {
        self.entries
            .iter()
            .filter(move |it| package.map_or(false, |p| it.package == p))
    }

    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, TrustedInstaller> {
        self.entries.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a TrustedInstallers {
    type Item = &'a TrustedInstaller;
    type IntoIter = std::slice::Iter<'a, TrustedInstaller>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl TryFrom<Vec<TrustedInstaller>> for TrustedInstallers {
    type Error = crate::Error;

    fn try_from(value: Vec<TrustedInstaller>) -> Result<Self, Self::Error> {
        let mut it = Self::new();
        for installer in value {
            it.push(installer)?;
        }
        Ok(it)
    }
}
