//! Access decisions over a record's grants.
//!
//! Expiry is never stored as a state: a grant is effective or not purely as
//! a function of the grant and the ledger time of the current transaction.

use soroban_sdk::{Address, Env, String};

use crate::storage::PermissionStore;
use crate::types::{
    AccessAction, AccessDecision, AccessList, AccessPermission, AccessReason, HolderLevel,
    MedicalRecord,
};

/// A grant counts when it is active and `now` is strictly before its expiry.
pub fn is_effective(perm: &AccessPermission, now: u64) -> bool {
    perm.is_active && perm.expires_at.map_or(true, |at| now < at)
}

/// The first effective explicit grant for `user`: AccessList map first,
/// then the legacy per-pair record.
pub fn effective_grant(
    store: &PermissionStore,
    list: &AccessList,
    user: &Address,
    now: u64,
) -> Option<AccessPermission> {
    if let Some(perm) = list.permissions.get(user.clone()) {
        if is_effective(&perm, now) {
            return Some(perm);
        }
    }
    store
        .legacy_permission(&list.record_id, user)
        .filter(|perm| is_effective(perm, now))
}

/// Patient and creator pass unconditionally; everyone else needs an
/// effective explicit grant of any level.
pub fn has_access(
    store: &PermissionStore,
    record: &MedicalRecord,
    user: &Address,
    now: u64,
) -> bool {
    if *user == record.patient || *user == record.creator {
        return true;
    }
    let list = store.access_list_or_empty(record);
    effective_grant(store, &list, user, now).is_some()
}

/// The patient satisfies every level. Anyone else, the creator included,
/// must hold an effective grant ranked at or above `required`.
pub fn has_level(
    store: &PermissionStore,
    record: &MedicalRecord,
    user: &Address,
    required: &AccessAction,
    now: u64,
) -> bool {
    if *user == record.patient {
        return true;
    }
    held_level(store, record, user, now).map_or(false, |held| held.satisfies(required))
}

/// Level of the effective explicit grant `user` holds, if any.
pub fn held_level(
    store: &PermissionStore,
    record: &MedicalRecord,
    user: &Address,
    now: u64,
) -> Option<AccessAction> {
    let list = store.access_list_or_empty(record);
    effective_grant(store, &list, user, now).map(|perm| perm.action)
}

fn denied(
    env: &Env,
    reason: AccessReason,
    details: &str,
    required: AccessAction,
) -> AccessDecision {
    AccessDecision {
        has_access: false,
        reason,
        details: String::from_str(env, details),
        level: HolderLevel::NoAccess,
        required,
        granted_by: None,
        granted_at: None,
        expires_at: None,
    }
}

/// Full decision with the reason behind it. A missing record is a denial,
/// not an error.
pub fn decide(
    env: &Env,
    store: &PermissionStore,
    record: Option<&MedicalRecord>,
    user: &Address,
    required: AccessAction,
    now: u64,
) -> AccessDecision {
    let record = match record {
        Some(record) => record,
        None => {
            return denied(
                env,
                AccessReason::RecordNotFound,
                "Record does not exist",
                required,
            )
        }
    };

    if *user == record.patient {
        return AccessDecision {
            has_access: true,
            reason: AccessReason::OwnerAccess,
            details: String::from_str(env, "User is the patient (owner) of the record"),
            level: HolderLevel::Owner,
            required,
            granted_by: None,
            granted_at: None,
            expires_at: None,
        };
    }

    if *user == record.creator {
        return AccessDecision {
            has_access: true,
            reason: AccessReason::CreatorAccess,
            details: String::from_str(env, "User is the creator of the record"),
            level: HolderLevel::Creator,
            required,
            granted_by: None,
            granted_at: None,
            expires_at: None,
        };
    }

    let list = store.access_list_or_empty(record);
    let grant = match effective_grant(store, &list, user, now) {
        Some(grant) => grant,
        None => {
            return match store.stored_permission(&list, user) {
                None => denied(
                    env,
                    AccessReason::NoPermission,
                    "User has no explicit permission for this record",
                    required,
                ),
                Some(perm) if !perm.is_active => denied(
                    env,
                    AccessReason::PermissionInactive,
                    "User's permission has been deactivated",
                    required,
                ),
                Some(perm) => AccessDecision {
                    expires_at: perm.expires_at,
                    ..denied(
                        env,
                        AccessReason::PermissionExpired,
                        "User's permission has expired",
                        required,
                    )
                },
            };
        }
    };

    if !grant.action.satisfies(&required) {
        return AccessDecision {
            level: HolderLevel::Grant(grant.action),
            ..denied(
                env,
                AccessReason::InsufficientLevel,
                "User's permission level is below the required level",
                required,
            )
        };
    }

    AccessDecision {
        has_access: true,
        reason: AccessReason::PermissionGranted,
        details: String::from_str(env, "User holds a valid explicit permission"),
        level: HolderLevel::Grant(grant.action),
        required,
        granted_by: Some(grant.granted_by),
        granted_at: Some(grant.granted_at),
        expires_at: grant.expires_at,
    }
}
