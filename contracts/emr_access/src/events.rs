//! Audit events.
//!
//! Topics are `(EVENT_SYMBOL, record_id)` so consumers can filter a single
//! record's trail; payloads are `#[contracttype]` structs. Publishing either
//! succeeds or traps the invocation, so no state change commits without its
//! event.

use soroban_sdk::{symbol_short, Address, BytesN, Env, String, Symbol};

use crate::errors::ErrorContext;
use crate::types::{AccessAction, MedicalRecord};

pub const RECORD_CREATED: Symbol = symbol_short!("REC_CRT");
pub const ACCESS_GRANTED: Symbol = symbol_short!("ACC_GRT");
pub const ACCESS_REVOKED: Symbol = symbol_short!("ACC_REV");
pub const RECORD_ACCESSED: Symbol = symbol_short!("REC_ACC");
pub const RECORD_UPDATED: Symbol = symbol_short!("REC_UPD");
pub const ACCESS_AUDIT: Symbol = symbol_short!("ACC_AUD");
pub const ERROR: Symbol = symbol_short!("ERROR");

/// Event published when a record anchor is created.
#[soroban_sdk::contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RecordCreatedEvent {
    pub record_id: String,
    pub patient: Address,
    pub creator: Address,
    pub content_address: String,
    pub content_hash: String,
    pub timestamp: u64,
    pub caller: Address,
}

/// Event published when a grant is issued or replaced.
#[soroban_sdk::contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AccessGrantedEvent {
    pub record_id: String,
    pub grantee: Address,
    pub action: AccessAction,
    pub granted_by: Address,
    pub granted_at: u64,
    pub expires_at: Option<u64>,
}

#[soroban_sdk::contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AccessRevokedEvent {
    pub record_id: String,
    pub grantee: Address,
    pub revoked_by: Address,
    pub revoked_at: u64,
}

/// Event published for every read attempt, successful or not.
#[soroban_sdk::contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RecordAccessedEvent {
    pub record_id: String,
    pub accessor: Address,
    pub action: Symbol,
    pub accessed_at: u64,
    pub success: bool,
}

#[soroban_sdk::contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RecordUpdatedEvent {
    pub record_id: String,
    pub updated_by: Address,
    pub new_content_hash: String,
    pub new_content_address: String,
    pub updated_at: u64,
}

/// Generic audit entry. `ledger_sequence` and `network_id` locate the
/// transaction the way a transaction id and channel would.
#[soroban_sdk::contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AccessAuditEvent {
    pub record_id: String,
    pub accessor: Address,
    pub action: Symbol,
    pub success: bool,
    pub reason: String,
    pub timestamp: u64,
    pub ledger_sequence: u32,
    pub network_id: BytesN<32>,
}

pub fn record_created_event(record: &MedicalRecord, caller: Address) -> RecordCreatedEvent {
    RecordCreatedEvent {
        record_id: record.record_id.clone(),
        patient: record.patient.clone(),
        creator: record.creator.clone(),
        content_address: record.content_address.clone(),
        content_hash: record.content_hash.clone(),
        timestamp: record.timestamp,
        caller,
    }
}

pub fn publish_record_created(env: &Env, record: &MedicalRecord, caller: Address) {
    let topics = (RECORD_CREATED, record.record_id.clone());
    env.events()
        .publish(topics, record_created_event(record, caller));
}

pub fn publish_access_granted(
    env: &Env,
    record_id: String,
    grantee: Address,
    action: AccessAction,
    granted_by: Address,
    granted_at: u64,
    expires_at: Option<u64>,
) {
    let topics = (ACCESS_GRANTED, record_id.clone(), grantee.clone());
    let data = AccessGrantedEvent {
        record_id,
        grantee,
        action,
        granted_by,
        granted_at,
        expires_at,
    };
    env.events().publish(topics, data);
}

pub fn publish_access_revoked(env: &Env, record_id: String, grantee: Address, revoked_by: Address) {
    let topics = (ACCESS_REVOKED, record_id.clone(), grantee.clone());
    let data = AccessRevokedEvent {
        record_id,
        grantee,
        revoked_by,
        revoked_at: env.ledger().timestamp(),
    };
    env.events().publish(topics, data);
}

pub fn record_accessed_event(
    env: &Env,
    record_id: String,
    accessor: Address,
    action: Symbol,
    success: bool,
) -> RecordAccessedEvent {
    RecordAccessedEvent {
        record_id,
        accessor,
        action,
        accessed_at: env.ledger().timestamp(),
        success,
    }
}

pub fn publish_record_accessed(
    env: &Env,
    record_id: String,
    accessor: Address,
    action: Symbol,
    success: bool,
) {
    let topics = (RECORD_ACCESSED, record_id.clone());
    env.events().publish(
        topics,
        record_accessed_event(env, record_id, accessor, action, success),
    );
}

pub fn publish_record_updated(env: &Env, record: &MedicalRecord, updated_by: Address) {
    let topics = (RECORD_UPDATED, record.record_id.clone());
    let data = RecordUpdatedEvent {
        record_id: record.record_id.clone(),
        updated_by,
        new_content_hash: record.content_hash.clone(),
        new_content_address: record.content_address.clone(),
        updated_at: record.timestamp,
    };
    env.events().publish(topics, data);
}

pub fn access_audit_event(
    env: &Env,
    record_id: String,
    accessor: Address,
    action: Symbol,
    success: bool,
    reason: String,
) -> AccessAuditEvent {
    AccessAuditEvent {
        record_id,
        accessor,
        action,
        success,
        reason,
        timestamp: env.ledger().timestamp(),
        ledger_sequence: env.ledger().sequence(),
        network_id: env.ledger().network_id(),
    }
}

pub fn publish_access_audit(
    env: &Env,
    record_id: String,
    accessor: Address,
    action: Symbol,
    success: bool,
    reason: String,
) {
    let topics = (ACCESS_AUDIT, record_id.clone());
    env.events().publish(
        topics,
        access_audit_event(env, record_id, accessor, action, success, reason),
    );
}

pub fn publish_error(env: &Env, error_code: u32, context: ErrorContext) {
    let topics = (ERROR, error_code);
    env.events().publish(topics, context);
}
