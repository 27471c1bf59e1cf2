use soroban_sdk::{contracttype, Address, Map, String, Symbol, Vec};

/// Capability levels a grant can carry.
///
/// The discriminant is the level's rank in the permission hierarchy
/// (`Read < Share < Write < Admin`). Ranks are only used to compare a held
/// level against a required one; a grant never expands into other grants.
#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum AccessAction {
    Read = 1,
    Share = 2,
    Write = 3,
    Admin = 4,
}

impl AccessAction {
    pub fn rank(&self) -> u32 {
        *self as u32
    }

    /// Whether holding `self` is enough for an operation requiring `required`.
    pub fn satisfies(&self, required: &AccessAction) -> bool {
        self.rank() >= required.rank()
    }
}

/// On-ledger anchor for an off-ledger medical record.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MedicalRecord {
    pub record_id: String,
    pub patient: Address,
    pub creator: Address,
    /// Pointer into the external content-addressed store.
    pub content_address: String,
    /// Integrity digest of the off-ledger payload.
    pub content_hash: String,
    pub version_hash: Option<String>,
    /// Ledger seconds; set at creation, bumped on every content change.
    pub timestamp: u64,
}

/// Caller-supplied fields for `create_medical_record`.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RecordInput {
    pub record_id: String,
    pub patient: Address,
    pub creator: Address,
    pub content_address: String,
    pub content_hash: String,
    pub version_hash: Option<String>,
    /// Defaults to the ledger timestamp when absent.
    pub timestamp: Option<u64>,
}

/// One grantee's rights on one record.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AccessPermission {
    pub record_id: String,
    pub grantee: Address,
    pub action: AccessAction,
    pub granted_by: Address,
    pub granted_at: u64,
    /// `None` never expires.
    pub expires_at: Option<u64>,
    pub is_active: bool,
}

/// Per-record access list. `permissions` is keyed by grantee and is the
/// single source of truth for explicit grants.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AccessList {
    pub record_id: String,
    pub owner: Address,
    pub permissions: Map<Address, AccessPermission>,
    pub updated_at: u64,
}

/// Metadata projection of a record without the content pointer.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RecordMetadata {
    pub record_id: String,
    pub patient: Address,
    pub creator: Address,
    pub content_hash: String,
    pub timestamp: u64,
    pub has_content_address: bool,
}

/// Owner-facing snapshot of a record's grants.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PermissionHistory {
    pub record_id: String,
    pub owner: Address,
    /// Ordered by grantee.
    pub permissions: Vec<AccessPermission>,
    pub last_updated: u64,
    pub retrieved_by: Address,
    pub retrieved_at: u64,
}

/// Why `validate_access_with_reason` decided the way it did.
#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum AccessReason {
    RecordNotFound = 1,
    OwnerAccess = 2,
    CreatorAccess = 3,
    NoPermission = 4,
    PermissionInactive = 5,
    PermissionExpired = 6,
    InsufficientLevel = 7,
    PermissionGranted = 8,
}

/// The standing under which a principal holds access.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum HolderLevel {
    /// Unknown record, or no effective grant.
    NoAccess,
    Owner,
    Creator,
    Grant(AccessAction),
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AccessDecision {
    pub has_access: bool,
    pub reason: AccessReason,
    pub details: String,
    pub level: HolderLevel,
    pub required: AccessAction,
    pub granted_by: Option<Address>,
    pub granted_at: Option<u64>,
    pub expires_at: Option<u64>,
}

/// Per-record outcome inside `batch_validate_access`.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BatchAccessResult {
    pub has_access: bool,
    /// `ContractError` code when the check itself failed.
    pub error: Option<u32>,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PermissionLevelInfo {
    pub action: AccessAction,
    pub rank: u32,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ContractInfo {
    pub name: String,
    pub version: u32,
    pub permission_levels: Vec<PermissionLevelInfo>,
    pub supported_events: Vec<Symbol>,
}
