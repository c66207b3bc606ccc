//! Identity model: value types created fresh per mount invocation.

use std::fmt;
use std::str::FromStr;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use secrecy::{ExposeSecret, SecretString};

use crate::error::{
    AuthConfigError, DecodeError, FieldViolation, InvalidVersionNumber, ResolutionError,
    UnknownPrincipalTypeError, UnknownStageError,
};

/// Rotation stage attached to a secret version.
///
/// `None` means "not specified"; it renders as an empty string and is never
/// sent to the vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Stage {
    #[default]
    None,
    Current,
    Pending,
    Latest,
    Previous,
    Deprecated,
}

impl Stage {
    /// Every stage, `None` included.
    pub const ALL: [Self; 6] = [
        Self::None,
        Self::Current,
        Self::Pending,
        Self::Latest,
        Self::Previous,
        Self::Deprecated,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "",
            Self::Current => "CURRENT",
            Self::Pending => "PENDING",
            Self::Latest => "LATEST",
            Self::Previous => "PREVIOUS",
            Self::Deprecated => "DEPRECATED",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = UnknownStageError;

    /// Tokens are case-sensitive; the empty string maps to [`Stage::None`].
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "" => Ok(Self::None),
            "CURRENT" => Ok(Self::Current),
            "PENDING" => Ok(Self::Pending),
            "LATEST" => Ok(Self::Latest),
            "PREVIOUS" => Ok(Self::Previous),
            "DEPRECATED" => Ok(Self::Deprecated),
            other => Err(UnknownStageError(other.to_owned())),
        }
    }
}

/// Strictly positive secret version number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VersionNumber(i64);

impl VersionNumber {
    /// # Errors
    /// Returns [`InvalidVersionNumber`] when `value` is zero or negative.
    pub const fn new(value: i64) -> Result<Self, InvalidVersionNumber> {
        if value <= 0 {
            Err(InvalidVersionNumber(value))
        } else {
            Ok(Self(value))
        }
    }

    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for VersionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a single bundle is identified on the remote side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleSelector {
    Stage(Stage),
    Version(VersionNumber),
}

impl fmt::Display for BundleSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stage(stage) => write!(f, "stage={stage}"),
            Self::Version(version) => write!(f, "version={version}"),
        }
    }
}

/// Output path for a secret: the trimmed alias when it is not blank, otherwise
/// the trimmed secret name.
fn effective_path(name: &str, alias: Option<&str>) -> String {
    alias
        .map(str::trim)
        .filter(|alias| !alias.is_empty())
        .unwrap_or_else(|| name.trim())
        .to_owned()
}

/// A single requested secret, as declared in the `secrets` attribute.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SecretReference {
    pub name: String,
    pub stage: Stage,
    pub version_number: Option<VersionNumber>,
    pub file_alias: Option<String>,
}

impl SecretReference {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stage = stage;
        self
    }

    #[must_use]
    pub fn with_version(mut self, version: VersionNumber) -> Self {
        self.version_number = Some(version);
        self
    }

    #[must_use]
    pub fn with_file_alias(mut self, alias: impl Into<String>) -> Self {
        self.file_alias = Some(alias.into());
        self
    }

    #[must_use]
    pub fn effective_path(&self) -> String {
        effective_path(&self.name, self.file_alias.as_deref())
    }

    /// Validates the reference on its own and derives the remote selector.
    ///
    /// A reference with neither stage nor version selects [`Stage::Current`].
    ///
    /// # Errors
    /// - [`ResolutionError::MissingName`] when the name is blank.
    /// - [`ResolutionError::AmbiguousIdentifier`] when both stage and version are set.
    pub fn selector(&self) -> Result<BundleSelector, ResolutionError> {
        if self.name.trim().is_empty() {
            return Err(ResolutionError::MissingName);
        }
        match (self.stage, self.version_number) {
            (Stage::None, None) => Ok(BundleSelector::Stage(Stage::Current)),
            (Stage::None, Some(version)) => Ok(BundleSelector::Version(version)),
            (stage, None) => Ok(BundleSelector::Stage(stage)),
            (_, Some(_)) => Err(ResolutionError::AmbiguousIdentifier {
                name: self.name.clone(),
            }),
        }
    }
}

impl fmt::Display for SecretReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{name={}, version={}, stage={}}}",
            self.name,
            self.version_number.map_or(0, VersionNumber::get),
            self.stage
        )
    }
}

/// Encodings the vault may declare for bundle content. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentEncoding {
    Base64,
}

impl ContentEncoding {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Base64 => "BASE64",
        }
    }
}

impl fmt::Display for ContentEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentEncoding {
    type Err = DecodeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "BASE64" => Ok(Self::Base64),
            other => Err(DecodeError::UnsupportedEncoding(other.to_owned())),
        }
    }
}

/// Encoded secret content together with its declared encoding token.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretBundleContent {
    content_type: String,
    raw: String,
}

impl SecretBundleContent {
    #[must_use]
    pub fn new(encoding: ContentEncoding, raw: impl Into<String>) -> Self {
        Self {
            content_type: encoding.as_str().to_owned(),
            raw: raw.into(),
        }
    }

    /// Keeps the declared token as-is; it is checked by [`Self::decode`].
    #[must_use]
    pub fn with_content_type(content_type: impl Into<String>, raw: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            raw: raw.into(),
        }
    }

    /// # Errors
    /// Returns [`DecodeError::UnsupportedEncoding`] for any token outside the supported set.
    pub fn encoding(&self) -> Result<ContentEncoding, DecodeError> {
        self.content_type.parse()
    }

    /// Decodes the content into plaintext bytes.
    ///
    /// # Errors
    /// - [`DecodeError::EmptyContent`] when there is no content, whatever the encoding.
    /// - [`DecodeError::UnsupportedEncoding`] for an unrecognized encoding.
    /// - [`DecodeError::MalformedEncoding`] when the content is not valid for its encoding.
    pub fn decode(&self) -> Result<Vec<u8>, DecodeError> {
        if self.raw.is_empty() {
            return Err(DecodeError::EmptyContent);
        }
        match self.encoding()? {
            ContentEncoding::Base64 => STANDARD
                .decode(self.raw.as_bytes())
                .map_err(|e| DecodeError::MalformedEncoding(e.to_string())),
        }
    }
}

impl fmt::Debug for SecretBundleContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretBundleContent")
            .field("content_type", &self.content_type)
            .field("raw", &"[REDACTED]")
            .finish()
    }
}

/// A resolved secret bundle. `id` and `version_number` always come from the vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretBundle {
    pub id: String,
    pub name: String,
    pub version_number: i64,
    pub stages: Vec<Stage>,
    pub file_alias: Option<String>,
    pub content: SecretBundleContent,
}

impl SecretBundle {
    #[must_use]
    pub fn effective_path(&self) -> String {
        effective_path(&self.name, self.file_alias.as_deref())
    }
}

/// Vault identifier (an OCID).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VaultId(String);

impl VaultId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VaultId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of the pod a volume is mounted for.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PodIdentity {
    pub name: String,
    pub namespace: String,
    pub uid: String,
    pub service_account: String,
}

/// Discriminator selecting the authentication principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrincipalKind {
    Instance,
    User,
    Workload,
}

impl PrincipalKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Instance => "instance",
            Self::User => "user",
            Self::Workload => "workload",
        }
    }
}

impl fmt::Display for PrincipalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrincipalKind {
    type Err = UnknownPrincipalTypeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "instance" => Ok(Self::Instance),
            "user" => Ok(Self::User),
            "workload" => Ok(Self::Workload),
            other => Err(UnknownPrincipalTypeError(other.to_owned())),
        }
    }
}

/// API-key credentials of a user principal.
pub struct AuthConfig {
    pub tenancy: String,
    pub user: String,
    pub region: String,
    pub fingerprint: String,
    pub private_key: SecretString,
    pub passphrase: Option<SecretString>,
}

impl AuthConfig {
    /// Checks every required field and reports all violations at once.
    ///
    /// # Errors
    /// Returns [`AuthConfigError`] listing each missing field.
    pub fn validate(&self) -> Result<(), AuthConfigError> {
        let mut violations = Vec::new();
        if self.tenancy.is_empty() {
            violations.push(FieldViolation::required(
                "auth.tenancy",
                "Tenancy is required for user principal",
            ));
        }
        if self.region.is_empty() {
            violations.push(FieldViolation::required(
                "auth.region",
                "Region is required for user principal",
            ));
        }
        if self.fingerprint.is_empty() {
            violations.push(FieldViolation::required(
                "auth.fingerprint",
                "Fingerprint is required for user principal",
            ));
        }
        if self.user.is_empty() {
            violations.push(FieldViolation::required(
                "auth.user",
                "UserID is required for user principal",
            ));
        }
        if self.private_key.expose_secret().is_empty() {
            violations.push(FieldViolation::required(
                "auth.privateKey",
                "PrivateKey is required for user principal",
            ));
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(AuthConfigError { violations })
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("tenancy", &self.tenancy)
            .field("user", &self.user)
            .field("region", &self.region)
            .field("fingerprint", &self.fingerprint)
            .field("private_key", &"[REDACTED]")
            .field("passphrase", &self.passphrase.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// The principal the vault is accessed under.
#[derive(Debug)]
pub enum AuthPrincipal {
    /// Ambient identity of the compute instance.
    Instance,
    /// API-key user credentials read from a cluster secret.
    User(AuthConfig),
    /// Short-lived service-account token bound to the calling pod.
    Workload {
        service_account_token: SecretString,
        pod: PodIdentity,
    },
}

impl AuthPrincipal {
    #[must_use]
    pub const fn kind(&self) -> PrincipalKind {
        match self {
            Self::Instance => PrincipalKind::Instance,
            Self::User(_) => PrincipalKind::User,
            Self::Workload { .. } => PrincipalKind::Workload,
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn version(n: i64) -> VersionNumber {
        VersionNumber::new(n).unwrap()
    }

    #[test]
    fn stage_tokens_parse_exactly() {
        for stage in Stage::ALL {
            assert_eq!(stage.as_str().parse::<Stage>().unwrap(), stage);
        }
        assert_eq!("".parse::<Stage>().unwrap(), Stage::None);
        assert_eq!(
            "current".parse::<Stage>().unwrap_err(),
            UnknownStageError("current".to_owned())
        );
        assert!("FOO".parse::<Stage>().is_err());
    }

    #[test]
    fn version_number_must_be_positive() {
        assert_eq!(VersionNumber::new(0), Err(InvalidVersionNumber(0)));
        assert_eq!(VersionNumber::new(-3), Err(InvalidVersionNumber(-3)));
        assert_eq!(version(7).get(), 7);
    }

    #[test]
    fn selector_defaults_to_current_stage() {
        let reference = SecretReference::new("db-password");
        assert_eq!(
            reference.selector().unwrap(),
            BundleSelector::Stage(Stage::Current)
        );
    }

    #[test]
    fn selector_prefers_explicit_stage_or_version() {
        let by_stage = SecretReference::new("a").with_stage(Stage::Previous);
        assert_eq!(
            by_stage.selector().unwrap(),
            BundleSelector::Stage(Stage::Previous)
        );

        let by_version = SecretReference::new("a").with_version(version(2));
        assert_eq!(
            by_version.selector().unwrap(),
            BundleSelector::Version(version(2))
        );
    }

    #[test]
    fn selector_rejects_stage_and_version_together() {
        let reference = SecretReference::new("a")
            .with_stage(Stage::Latest)
            .with_version(version(1));
        assert!(matches!(
            reference.selector(),
            Err(ResolutionError::AmbiguousIdentifier { name }) if name == "a"
        ));
    }

    #[test]
    fn selector_rejects_blank_name() {
        assert!(matches!(
            SecretReference::new("  ").selector(),
            Err(ResolutionError::MissingName)
        ));
    }

    #[test]
    fn effective_path_uses_trimmed_alias_when_present() {
        assert_eq!(SecretReference::new(" a ").effective_path(), "a");
        assert_eq!(
            SecretReference::new("a").with_file_alias(" b ").effective_path(),
            "b"
        );
        assert_eq!(
            SecretReference::new("a").with_file_alias("   ").effective_path(),
            "a"
        );
    }

    #[test]
    fn reference_display_lists_identifiers() {
        let reference = SecretReference::new("a").with_version(version(3));
        assert_eq!(reference.to_string(), "{name=a, version=3, stage=}");
    }

    #[test]
    fn decode_base64_content() {
        let content = SecretBundleContent::new(ContentEncoding::Base64, "c2VjcmV0");
        assert_eq!(content.decode().unwrap(), b"secret");
    }

    #[test]
    fn decode_is_binary_safe() {
        let content = SecretBundleContent::new(ContentEncoding::Base64, "AP+A");
        assert_eq!(content.decode().unwrap(), vec![0x00, 0xff, 0x80]);
    }

    #[test]
    fn decode_reports_empty_content_before_encoding() {
        let content = SecretBundleContent::with_content_type("TEXT", "");
        assert_eq!(content.decode(), Err(DecodeError::EmptyContent));
    }

    #[test]
    fn decode_rejects_unknown_encoding() {
        let content = SecretBundleContent::with_content_type("TEXT", "abc");
        assert_eq!(
            content.decode(),
            Err(DecodeError::UnsupportedEncoding("TEXT".to_owned()))
        );
    }

    #[test]
    fn decode_rejects_malformed_base64() {
        let content = SecretBundleContent::new(ContentEncoding::Base64, "not base64!");
        assert!(matches!(
            content.decode(),
            Err(DecodeError::MalformedEncoding(_))
        ));
    }

    #[test]
    #[allow(clippy::use_debug)]
    fn content_debug_redacts_raw_value() {
        let content = SecretBundleContent::new(ContentEncoding::Base64, "c2VjcmV0");
        let rendered = format!("{content:?}");
        assert!(!rendered.contains("c2VjcmV0"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn principal_kind_parses_known_tokens() {
        assert_eq!(
            "instance".parse::<PrincipalKind>().unwrap(),
            PrincipalKind::Instance
        );
        assert_eq!("user".parse::<PrincipalKind>().unwrap(), PrincipalKind::User);
        assert_eq!(
            "workload".parse::<PrincipalKind>().unwrap(),
            PrincipalKind::Workload
        );
        assert_eq!(
            "Instance".parse::<PrincipalKind>().unwrap_err(),
            UnknownPrincipalTypeError("Instance".to_owned())
        );
    }

    fn auth_config(tenancy: &str, user: &str, key: &str) -> AuthConfig {
        AuthConfig {
            tenancy: tenancy.to_owned(),
            user: user.to_owned(),
            region: "us-ashburn-1".to_owned(),
            fingerprint: "aa:bb".to_owned(),
            private_key: SecretString::from(key.to_owned()),
            passphrase: None,
        }
    }

    #[test]
    fn auth_config_validation_reports_every_missing_field() {
        let err = auth_config("", "", "").validate().unwrap_err();
        assert_eq!(
            err.fields(),
            vec!["auth.tenancy", "auth.user", "auth.privateKey"]
        );
        assert!(err.to_string().contains("Tenancy is required"));
    }

    #[test]
    fn auth_config_validation_passes_complete_config() {
        auth_config("t", "u", "key").validate().unwrap();
    }

    #[test]
    #[allow(clippy::use_debug)]
    fn auth_config_debug_redacts_key() {
        let config = auth_config("t", "u", "very-secret");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("very-secret"));
    }
}
