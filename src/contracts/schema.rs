use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::contracts::error::UnknownVariant;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wraps an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0.as_hyphenated())
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

define_id!(
    /// Top-level customer partition of the platform.
    TenantId
);
define_id!(
    /// Product offered under a tenant.
    ProductId
);

/// Deployment stage that further partitions tenant data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    /// Stable lowercase name used in storage keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "staging" => Ok(Self::Staging),
            "production" | "prod" => Ok(Self::Production),
            _ => Err(UnknownVariant {
                kind: "environment",
                value: s.to_string(),
            }),
        }
    }
}

/// Kind of pre-loaded reference number. One pool implementation serves all kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    Policy,
    Invoice,
    Claim,
    CreditNote,
}

impl ReferenceKind {
    pub const ALL: [ReferenceKind; 4] = [Self::Policy, Self::Invoice, Self::Claim, Self::CreditNote];

    /// Stable name used in storage keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Policy => "policy",
            Self::Invoice => "invoice",
            Self::Claim => "claim",
            Self::CreditNote => "credit_note",
        }
    }
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReferenceKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "policy" => Ok(Self::Policy),
            "invoice" => Ok(Self::Invoice),
            "claim" => Ok(Self::Claim),
            "credit_note" | "creditnote" => Ok(Self::CreditNote),
            _ => Err(UnknownVariant {
                kind: "reference kind",
                value: s.to_string(),
            }),
        }
    }
}

/// Logical purpose of a sequence counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UseCase {
    QuoteNumber,
}

impl UseCase {
    /// Stable name used in storage keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QuoteNumber => "quote_number",
        }
    }
}

impl fmt::Display for UseCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UseCase {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "quote_number" | "quote" => Ok(Self::QuoteNumber),
            _ => Err(UnknownVariant {
                kind: "use case",
                value: s.to_string(),
            }),
        }
    }
}

/// The (tenant, product, environment) partition that keys pools and counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Scope {
    pub tenant: TenantId,
    pub product: ProductId,
    pub environment: Environment,
}

impl Scope {
    pub fn new(tenant: TenantId, product: ProductId, environment: Environment) -> Self {
        Self {
            tenant,
            product,
            environment,
        }
    }

    /// Same tenant and product under a different environment.
    pub fn with_environment(&self, environment: Environment) -> Self {
        Self {
            environment,
            ..*self
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}, {}", self.tenant, self.product, self.environment)
    }
}

/// Logical tables of the backing store, each with its own uniqueness constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    ReferenceNumbers,
    SequenceCounters,
    IssuedNumbers,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReferenceNumbers => "reference_numbers",
            Self::SequenceCounters => "sequence_counters",
            Self::IssuedNumbers => "issued_numbers",
        }
    }

    /// Columns of the table's unique key, in key order.
    pub fn key_columns(&self) -> &'static str {
        match self {
            Self::ReferenceNumbers => "tenant_id, product_id, environment, kind, number",
            Self::SequenceCounters => "tenant_id, product_id, environment, use_case",
            Self::IssuedNumbers => "tenant_id, product_id, environment, use_case, number",
        }
    }

    /// Name of the uniqueness constraint as rendered in diagnostics.
    pub fn constraint_name(&self) -> String {
        format!("{}_pkey", self.as_str())
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pre-loaded reference number and its assignment state.
///
/// `(tenant, product, environment, kind, number)` is unique across records and
/// `is_assigned` never goes back to false once set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceNumberRecord {
    pub tenant: TenantId,
    pub product: ProductId,
    pub environment: Environment,
    pub kind: ReferenceKind,
    pub number: String,
    pub is_assigned: bool,
}

impl ReferenceNumberRecord {
    pub fn unassigned(scope: &Scope, kind: ReferenceKind, number: impl Into<String>) -> Self {
        Self {
            tenant: scope.tenant,
            product: scope.product,
            environment: scope.environment,
            kind,
            number: number.into(),
            is_assigned: false,
        }
    }

    pub fn scope(&self) -> Scope {
        Scope::new(self.tenant, self.product, self.environment)
    }
}

/// Current state of one per-key sequence counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceCounterRecord {
    pub tenant: TenantId,
    pub product: ProductId,
    pub environment: Environment,
    pub use_case: UseCase,
    pub seed: u64,
}

/// A code reserved by the generator, or imported by an operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedNumberRecord {
    pub number: String,
    /// Seed the code was derived from; `None` for imported numbers.
    pub seed: Option<u64>,
}

/// Outcome of interpreting a storage failure as a uniqueness conflict.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConflictDescriptor {
    pub succeeded: bool,
    pub conflicting_value: Option<String>,
}

impl ConflictDescriptor {
    pub fn conflict(value: impl Into<String>) -> Self {
        Self {
            succeeded: true,
            conflicting_value: Some(value.into()),
        }
    }

    pub fn unrecognized() -> Self {
        Self::default()
    }
}
