#![allow(clippy::arithmetic_side_effects)]
use soroban_sdk::{contracttype, symbol_short, Address, Env, String, Symbol, Vec};

use crate::types::AccessAction;

pub const ERROR_LOG_KEY: Symbol = symbol_short!("ERR_LOG");
pub const ERROR_COUNT_KEY: Symbol = symbol_short!("ERR_CNT");
pub const MAX_ERROR_LOG_SIZE: u32 = 100;

const TTL_THRESHOLD: u32 = 5184000;
const TTL_EXTEND_TO: u32 = 10368000;

fn extend_ttl_instance(env: &Env) {
    env.storage()
        .instance()
        .extend_ttl(TTL_THRESHOLD, TTL_EXTEND_TO);
}

/// Error taxonomy every `ContractError` falls into.
#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum ErrorCategory {
    /// Malformed identifiers, bad hashes, unusable expirations.
    InvalidInput = 1,
    /// Record or permission absent.
    NotFound = 2,
    /// Duplicate record id.
    AlreadyExists = 3,
    /// Caller failed an ownership or permission-level check.
    Unauthorized = 4,
}

/// Error severity levels indicating the impact and urgency of errors
#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum ErrorSeverity {
    Low = 1,
    Medium = 2,
    High = 3,
}

#[soroban_sdk::contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum ContractError {
    InvalidInput = 1,
    InvalidIdentifier = 2,
    InvalidContentHash = 3,
    InvalidContentAddress = 4,
    InvalidExpiration = 5,
    InvalidTimestamp = 6,
    BatchTooLarge = 7,
    RecordNotFound = 8,
    PermissionNotFound = 9,
    RecordAlreadyExists = 10,
    Unauthorized = 11,
}

impl ContractError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ContractError::InvalidInput
            | ContractError::InvalidIdentifier
            | ContractError::InvalidContentHash
            | ContractError::InvalidContentAddress
            | ContractError::InvalidExpiration
            | ContractError::InvalidTimestamp
            | ContractError::BatchTooLarge => ErrorCategory::InvalidInput,
            ContractError::RecordNotFound | ContractError::PermissionNotFound => {
                ErrorCategory::NotFound
            }
            ContractError::RecordAlreadyExists => ErrorCategory::AlreadyExists,
            ContractError::Unauthorized => ErrorCategory::Unauthorized,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::InvalidInput | ErrorCategory::NotFound => ErrorSeverity::Low,
            ErrorCategory::AlreadyExists => ErrorSeverity::Medium,
            ErrorCategory::Unauthorized => ErrorSeverity::High,
        }
    }

    /// Returns a human-readable error message for this error.
    pub fn message(&self) -> &'static str {
        match self {
            ContractError::InvalidInput => "Invalid input parameters provided",
            ContractError::InvalidIdentifier => "Identifier is empty, too short or malformed",
            ContractError::InvalidContentHash => "Content hash is empty or malformed",
            ContractError::InvalidContentAddress => "Content address is empty or malformed",
            ContractError::InvalidExpiration => "Expiration must lie strictly in the future",
            ContractError::InvalidTimestamp => "Timestamp lies after the current ledger time",
            ContractError::BatchTooLarge => "Batch is empty or exceeds the maximum size",
            ContractError::RecordNotFound => "Record not found",
            ContractError::PermissionNotFound => "No permission exists for this grantee",
            ContractError::RecordAlreadyExists => "Record with this ID already exists",
            ContractError::Unauthorized => "Caller is not authorized for this operation",
        }
    }
}

/// Everything an operator needs to diagnose a failure without replaying
/// the ledger.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ErrorContext {
    pub category: ErrorCategory,
    pub severity: ErrorSeverity,
    pub message: String,
    pub user: Option<Address>,
    pub resource_id: Option<String>,
    /// Rank of the level the operation required, for permission failures.
    pub required: Option<u32>,
    /// Rank of the level the caller held, if any.
    pub held: Option<u32>,
    pub timestamp: u64,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ErrorLogEntry {
    pub error_code: u32,
    pub context: ErrorContext,
}

/// Builds an `ErrorContext` for `error`, stamped with the ledger time.
pub fn create_error_context(
    env: &Env,
    error: ContractError,
    user: Option<Address>,
    resource_id: Option<String>,
    required: Option<AccessAction>,
    held: Option<AccessAction>,
) -> ErrorContext {
    ErrorContext {
        category: error.category(),
        severity: error.severity(),
        message: String::from_str(env, error.message()),
        user,
        resource_id,
        required: required.map(|action| action.rank()),
        held: held.map(|action| action.rank()),
        timestamp: env.ledger().timestamp(),
    }
}

/// Appends an entry to the bounded error log and bumps the error counter.
/// Only the most recent `MAX_ERROR_LOG_SIZE` entries are kept.
pub fn log_error(env: &Env, error: ContractError, context: ErrorContext) {
    let entry = ErrorLogEntry {
        error_code: error as u32,
        context,
    };

    let mut error_log: Vec<ErrorLogEntry> = env
        .storage()
        .instance()
        .get(&ERROR_LOG_KEY)
        .unwrap_or(Vec::new(env));

    error_log.push_back(entry);

    while error_log.len() > MAX_ERROR_LOG_SIZE {
        error_log.pop_front();
    }

    env.storage().instance().set(&ERROR_LOG_KEY, &error_log);

    let error_count: u64 = env.storage().instance().get(&ERROR_COUNT_KEY).unwrap_or(0);
    env.storage()
        .instance()
        .set(&ERROR_COUNT_KEY, &error_count.saturating_add(1));

    extend_ttl_instance(env);
}

/// Returns an empty vector if no errors have been logged.
pub fn get_error_log(env: &Env) -> Vec<ErrorLogEntry> {
    env.storage()
        .instance()
        .get(&ERROR_LOG_KEY)
        .unwrap_or(Vec::new(env))
}

/// Total errors ever logged; not reduced when old entries are trimmed.
pub fn get_error_count(env: &Env) -> u64 {
    env.storage().instance().get(&ERROR_COUNT_KEY).unwrap_or(0)
}
