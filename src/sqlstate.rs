//! SQL status codes reported by the query engine.
//!
//! Every statement result carries a five-character status code. `00000` is
//! the only success code; any other terminal code becomes a
//! [`SqlError`](crate::error::SqlError). Codes the driver does not know are
//! preserved verbatim in [`SqlState::Other`].

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! sql_states {
    ($($(#[$meta:meta])* $variant:ident => $code:literal,)+) => {
        /// Engine status code.
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(from = "String", into = "String")]
        pub enum SqlState {
            $($(#[$meta])* $variant,)+
            /// Code not known to this driver
            Other(String),
        }

        impl SqlState {
            /// Wire representation of the code.
            pub fn as_str(&self) -> &str {
                match self {
                    $(SqlState::$variant => $code,)+
                    SqlState::Other(code) => code.as_str(),
                }
            }

            /// Look up a code, falling back to [`SqlState::Other`].
            pub fn from_code(code: &str) -> Self {
                match code {
                    $($code => SqlState::$variant,)+
                    other => SqlState::Other(other.to_string()),
                }
            }
        }
    };
}

sql_states! {
    // Class 00
    SuccessfulCompletion => "00000",

    // Class 01
    Warning => "01000",
    StringDataRightTruncation => "01004",
    PrivilegeNotRevoked => "01006",
    PrivilegeNotGranted => "01007",
    DeprecatedFeature => "01P01",

    // Class 02
    NoData => "02000",

    // Class 03
    SqlStatementNotYetComplete => "03000",

    // Class 0A
    FeatureNotSupported => "0A000",

    // Class 0L
    InvalidGrantor => "0L000",
    InvalidGrantOperation => "0LP01",

    // Class 2B
    DependentObjectsStillExist => "2BP01",

    // Class 3D
    InvalidUser => "3D000",
    InvalidRole => "3D001",
    InvalidDatabase => "3D002",
    InvalidSchema => "3D003",
    InvalidOrganization => "3D004",
    InvalidRegion => "3D005",
    InvalidStore => "3D006",
    InvalidTopic => "3D007",
    InvalidParameter => "3D008",
    InvalidSchemaRegistry => "3D009",
    InvalidDescriptor => "3D010",
    InvalidDescriptorSource => "3D011",
    InvalidApiToken => "3D012",
    InvalidSecurityIntegration => "3D013",
    InvalidMetricsIntegration => "3D014",
    InvalidSandbox => "3D015",
    InvalidSecret => "3D016",
    InvalidFunction => "3D017",
    InvalidFunctionSource => "3D018",
    InvalidQuery => "3D019",
    InvalidRelation => "3D020",
    MissingParameter => "3D021",
    InvalidPrivateLink => "3D022",
    InvalidComputePool => "3D023",
    InvalidUserdata => "3D024",
    InvalidDataplane => "3D025",
    InvalidPlaybook => "3D026",

    // Class 3E
    StoreNotReady => "3E001",
    SchemaRegistryNotReady => "3E002",
    RelationNotReady => "3E003",
    ComputePoolNotReady => "3E004",

    // Class 42
    InsufficientPrivilege => "42501",
    SyntaxError => "42601",
    NameTooLong => "42622",
    DuplicateObject => "42710",
    DuplicateDatabase => "42P04",
    DuplicateStore => "42P05",
    DuplicateSchema => "42P06",
    DuplicateUser => "42P07",
    DuplicateTopicDescriptor => "42P08",
    DuplicateApiToken => "42P09",
    // The service emits six-character codes for these.
    DuplicateSecurityIntegration => "42P010",
    DuplicateRole => "42P011",
    DuplicateMetricsIntegration => "42P012",
    DuplicateSandbox => "42P013",
    DuplicateSecret => "42P014",
    DuplicateFunction => "42P015",
    DuplicateFunctionSource => "42P016",
    DuplicateRelation => "42P017",
    DuplicateSchemaRegistry => "42P018",
    DuplicateComputePool => "42P019",
    AmbiguousOrganization => "42P001",
    AmbiguousStore => "42P002",

    // Class 53
    ConfigurationLimitExceeded => "53000",

    // Class 57
    Cancelled => "57000",
    Timeout => "57014",
    RemoteUnavailable => "57015",

    // Class XX
    InternalError => "XX000",
    Undefined => "XX001",
}

impl SqlState {
    /// Two-character class prefix, e.g. `"3D"`.
    pub fn class(&self) -> &str {
        let code = self.as_str();
        code.get(..2).unwrap_or(code)
    }

    /// Check if this is the success code.
    pub fn is_success(&self) -> bool {
        matches!(self, SqlState::SuccessfulCompletion)
    }

    /// Check if the code belongs to the warning classes `01` or `02`.
    pub fn is_warning(&self) -> bool {
        matches!(self.class(), "01" | "02")
    }
}

impl From<String> for SqlState {
    fn from(code: String) -> Self {
        SqlState::from_code(&code)
    }
}

impl From<&str> for SqlState {
    fn from(code: &str) -> Self {
        SqlState::from_code(code)
    }
}

impl From<SqlState> for String {
    fn from(state: SqlState) -> Self {
        state.as_str().to_string()
    }
}

impl fmt::Display for SqlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_code_lookup() {
        assert_eq!(SqlState::from_code("00000"), SqlState::SuccessfulCompletion);
        assert_eq!(SqlState::from_code("42601"), SqlState::SyntaxError);
        assert_eq!(SqlState::from_code("42P019"), SqlState::DuplicateComputePool);
        assert_eq!(SqlState::InvalidStore.as_str(), "3D006");
    }

    #[test]
    fn test_unknown_code_preserved() {
        let state = SqlState::from_code("99999");
        assert_eq!(state, SqlState::Other("99999".to_string()));
        assert_eq!(state.to_string(), "99999");
    }

    #[test]
    fn test_classes() {
        assert_eq!(SqlState::InvalidComputePool.class(), "3D");
        assert_eq!(SqlState::FeatureNotSupported.class(), "0A");
        assert!(SqlState::NoData.is_warning());
        assert!(!SqlState::InternalError.is_warning());
        assert!(SqlState::SuccessfulCompletion.is_success());
    }

    #[test]
    fn test_serde_as_string() {
        let state: SqlState = serde_json::from_str("\"3E004\"").unwrap();
        assert_eq!(state, SqlState::ComputePoolNotReady);
        assert_eq!(serde_json::to_string(&state).unwrap(), "\"3E004\"");
    }
}
