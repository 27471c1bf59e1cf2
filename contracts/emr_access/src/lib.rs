#![no_std]
#![allow(clippy::too_many_arguments)]

pub mod access;
pub mod errors;
pub mod events;
pub mod storage;
pub mod types;
pub mod validation;

use soroban_sdk::{contract, contractimpl, symbol_short, Address, Env, Map, String, Symbol, Vec};

pub use errors::{
    create_error_context, ContractError, ErrorCategory, ErrorContext, ErrorLogEntry,
    ErrorSeverity,
};
pub use storage::{DataKey, PermissionStore};
pub use types::{
    AccessAction, AccessDecision, AccessList, AccessPermission, AccessReason, BatchAccessResult,
    ContractInfo, HolderLevel, MedicalRecord, PermissionHistory, PermissionLevelInfo,
    RecordInput, RecordMetadata,
};

const CONTRACT_NAME: &str = "EMR Access Control";
const CONTRACT_VERSION: u32 = 1;

#[contract]
pub struct EmrAccessContract;

#[contractimpl]
impl EmrAccessContract {
    // ── Record registry ──────────────────────────────────────────────────────

    /// Anchor a new medical record and create its access list.
    ///
    /// The caller must be the record's patient or creator. When the creator
    /// differs from the patient, the list is seeded with a permanent `Write`
    /// grant for the creator, issued by the patient.
    pub fn create_medical_record(
        env: Env,
        caller: Address,
        input: RecordInput,
    ) -> Result<String, ContractError> {
        caller.require_auth();

        let record_id = input.record_id.clone();
        Self::checked(&env, validation::validate_identifier(&record_id), &record_id)?;
        Self::checked(
            &env,
            validation::validate_content_hash(&input.content_hash),
            &record_id,
        )?;
        Self::checked(
            &env,
            validation::validate_content_address(&input.content_address),
            &record_id,
        )?;
        if let Some(version_hash) = &input.version_hash {
            Self::checked(&env, validation::validate_content_hash(version_hash), &record_id)?;
        }
        if let Some(timestamp) = input.timestamp {
            Self::checked(&env, validation::validate_timestamp(&env, timestamp), &record_id)?;
        }

        if caller != input.patient && caller != input.creator {
            return Err(Self::fail(
                &env,
                ContractError::Unauthorized,
                Some(caller),
                Some(record_id),
            ));
        }

        let store = PermissionStore::new(&env);
        if store.has_record(&record_id) {
            return Err(Self::fail(
                &env,
                ContractError::RecordAlreadyExists,
                Some(caller),
                Some(record_id),
            ));
        }

        let timestamp = input.timestamp.unwrap_or(env.ledger().timestamp());
        let record = MedicalRecord {
            record_id: record_id.clone(),
            patient: input.patient.clone(),
            creator: input.creator.clone(),
            content_address: input.content_address,
            content_hash: input.content_hash,
            version_hash: input.version_hash,
            timestamp,
        };
        store.save_record(&record);

        let mut list = AccessList {
            record_id: record_id.clone(),
            owner: record.patient.clone(),
            permissions: Map::new(&env),
            updated_at: timestamp,
        };
        if record.creator != record.patient {
            let seed = AccessPermission {
                record_id: record_id.clone(),
                grantee: record.creator.clone(),
                action: AccessAction::Write,
                granted_by: record.patient.clone(),
                granted_at: timestamp,
                expires_at: None,
                is_active: true,
            };
            list.permissions.set(record.creator.clone(), seed);
            store.index_grantee_record(&record.creator, &record_id);
        }
        store.save_access_list(&list);
        store.index_patient_record(&record.patient, &record_id);

        events::publish_record_created(&env, &record, caller);

        Ok(record_id)
    }

    /// Return the full record. Every attempt, allowed or denied, emits a
    /// `RecordAccessed` event.
    pub fn read_record(
        env: Env,
        caller: Address,
        record_id: String,
    ) -> Result<MedicalRecord, ContractError> {
        caller.require_auth();
        Self::checked(&env, validation::validate_identifier(&record_id), &record_id)?;

        let store = PermissionStore::new(&env);
        let action = symbol_short!("read");

        let record = match store.record(&record_id) {
            Some(record) => record,
            None => {
                events::publish_record_accessed(
                    &env,
                    record_id.clone(),
                    caller.clone(),
                    action,
                    false,
                );
                return Err(Self::fail(
                    &env,
                    ContractError::RecordNotFound,
                    Some(caller),
                    Some(record_id),
                ));
            }
        };

        if !access::has_access(&store, &record, &caller, env.ledger().timestamp()) {
            events::publish_record_accessed(
                &env,
                record_id.clone(),
                caller.clone(),
                action,
                false,
            );
            return Err(Self::fail(
                &env,
                ContractError::Unauthorized,
                Some(caller),
                Some(record_id),
            ));
        }

        events::publish_record_accessed(&env, record_id, caller, action, true);
        Ok(record)
    }

    /// Alias of `read_record`.
    pub fn get_record(
        env: Env,
        caller: Address,
        record_id: String,
    ) -> Result<MedicalRecord, ContractError> {
        Self::read_record(env, caller, record_id)
    }

    /// Replace a record's content pointer and hash in place.
    ///
    /// Allowed for the patient, the creator, or any principal holding an
    /// effective grant at `Write` or above.
    pub fn update_medical_record(
        env: Env,
        caller: Address,
        record_id: String,
        new_content_hash: String,
        new_content_address: String,
    ) -> Result<(), ContractError> {
        caller.require_auth();
        Self::checked(&env, validation::validate_identifier(&record_id), &record_id)?;
        Self::checked(
            &env,
            validation::validate_content_hash(&new_content_hash),
            &record_id,
        )?;
        Self::checked(
            &env,
            validation::validate_content_address(&new_content_address),
            &record_id,
        )?;

        let store = PermissionStore::new(&env);
        let mut record = Self::load_record(&env, &store, &record_id, &caller)?;
        let now = env.ledger().timestamp();

        let required = AccessAction::Write;
        let authorized = caller == record.patient
            || caller == record.creator
            || access::has_level(&store, &record, &caller, &required, now);
        if !authorized {
            let held = access::held_level(&store, &record, &caller, now);
            return Err(Self::fail_with_levels(
                &env,
                ContractError::Unauthorized,
                Some(caller),
                Some(record_id),
                Some(required),
                held,
            ));
        }

        record.content_hash = new_content_hash;
        record.content_address = new_content_address;
        record.timestamp = now;
        store.save_record(&record);

        events::publish_record_updated(&env, &record, caller.clone());
        events::publish_record_accessed(
            &env,
            record_id,
            caller,
            symbol_short!("update"),
            true,
        );

        Ok(())
    }

    /// Metadata without the content pointer. Requires the same access as
    /// `read_record`.
    pub fn get_record_metadata(
        env: Env,
        caller: Address,
        record_id: String,
    ) -> Result<RecordMetadata, ContractError> {
        caller.require_auth();
        Self::checked(&env, validation::validate_identifier(&record_id), &record_id)?;

        let store = PermissionStore::new(&env);
        let record = Self::load_record(&env, &store, &record_id, &caller)?;
        let action = symbol_short!("metadata");

        if !access::has_access(&store, &record, &caller, env.ledger().timestamp()) {
            events::publish_record_accessed(
                &env,
                record_id.clone(),
                caller.clone(),
                action,
                false,
            );
            return Err(Self::fail(
                &env,
                ContractError::Unauthorized,
                Some(caller),
                Some(record_id),
            ));
        }

        events::publish_record_accessed(&env, record_id, caller, action, true);

        Ok(RecordMetadata {
            record_id: record.record_id,
            patient: record.patient,
            creator: record.creator,
            content_hash: record.content_hash,
            timestamp: record.timestamp,
            has_content_address: !record.content_address.is_empty(),
        })
    }

    /// All records anchored for `patient`. Only the patient may enumerate
    /// their own records.
    pub fn list_records_by_patient(
        env: Env,
        caller: Address,
        patient: Address,
    ) -> Result<Vec<MedicalRecord>, ContractError> {
        caller.require_auth();

        if caller != patient {
            return Err(Self::fail(&env, ContractError::Unauthorized, Some(caller), None));
        }

        let store = PermissionStore::new(&env);
        let mut records = Vec::new(&env);
        for record_id in store.patient_records(&patient).iter() {
            if let Some(record) = store.record(&record_id) {
                records.push_back(record);
            }
        }
        Ok(records)
    }

    /// Whether `content_hash` matches the hash anchored for the record.
    pub fn validate_record_integrity(
        env: Env,
        record_id: String,
        content_hash: String,
    ) -> Result<bool, ContractError> {
        Self::checked(&env, validation::validate_identifier(&record_id), &record_id)?;
        Self::checked(&env, validation::validate_content_hash(&content_hash), &record_id)?;

        let store = PermissionStore::new(&env);
        let record = store.record(&record_id).ok_or_else(|| {
            Self::fail(&env, ContractError::RecordNotFound, None, Some(record_id.clone()))
        })?;
        Ok(record.content_hash == content_hash)
    }

    /// True only for the record's patient.
    pub fn is_record_owner(
        env: Env,
        record_id: String,
        user: Address,
    ) -> Result<bool, ContractError> {
        Self::checked(&env, validation::validate_identifier(&record_id), &record_id)?;
        let store = PermissionStore::new(&env);
        let record = Self::load_record(&env, &store, &record_id, &user)?;
        Ok(record.patient == user)
    }

    // ── Access control ───────────────────────────────────────────────────────

    /// Issue or replace `grantee`'s grant on the record. Patient only.
    pub fn grant_access(
        env: Env,
        caller: Address,
        record_id: String,
        grantee: Address,
        action: AccessAction,
        expires_at: Option<u64>,
    ) -> Result<(), ContractError> {
        caller.require_auth();
        Self::checked(&env, validation::validate_identifier(&record_id), &record_id)?;

        let store = PermissionStore::new(&env);
        let record = Self::load_record(&env, &store, &record_id, &caller)?;
        Self::require_patient(&env, &record, &caller)?;

        if grantee == record.patient {
            return Err(Self::fail(
                &env,
                ContractError::InvalidInput,
                Some(grantee),
                Some(record_id),
            ));
        }
        Self::checked(&env, validation::validate_expiration(&env, expires_at), &record_id)?;

        let now = env.ledger().timestamp();
        let perm = AccessPermission {
            record_id: record_id.clone(),
            grantee: grantee.clone(),
            action,
            granted_by: caller.clone(),
            granted_at: now,
            expires_at,
            is_active: true,
        };

        let mut list = store.access_list_or_empty(&record);
        list.permissions.set(grantee.clone(), perm.clone());
        list.updated_at = now;
        store.save_access_list(&list);
        store.put_legacy_permission(&perm);
        store.index_grantee_record(&grantee, &record_id);

        events::publish_access_granted(&env, record_id, grantee, action, caller, now, expires_at);

        Ok(())
    }

    /// Remove `grantee`'s grant from the access list and the legacy mirror.
    /// Patient only; revoking a grant that does not exist is an error.
    pub fn revoke_access(
        env: Env,
        caller: Address,
        record_id: String,
        grantee: Address,
    ) -> Result<(), ContractError> {
        caller.require_auth();
        Self::checked(&env, validation::validate_identifier(&record_id), &record_id)?;

        let store = PermissionStore::new(&env);
        let record = Self::load_record(&env, &store, &record_id, &caller)?;
        Self::require_patient(&env, &record, &caller)?;

        let mut list = store.access_list_or_empty(&record);
        let in_map = list.permissions.contains_key(grantee.clone());
        let in_legacy = store.legacy_permission(&record_id, &grantee).is_some();
        if !in_map && !in_legacy {
            return Err(Self::fail(
                &env,
                ContractError::PermissionNotFound,
                Some(grantee),
                Some(record_id),
            ));
        }

        if in_map {
            list.permissions.remove(grantee.clone());
            list.updated_at = env.ledger().timestamp();
            store.save_access_list(&list);
        }
        store.remove_legacy_permission(&record_id, &grantee);
        store.unindex_grantee_record(&grantee, &record_id);

        events::publish_access_revoked(&env, record_id, grantee, caller);

        Ok(())
    }

    /// Whether `user` may touch the record at all: patient or creator
    /// first, then the access list, then the legacy mirror.
    pub fn check_access(env: Env, record_id: String, user: Address) -> Result<bool, ContractError> {
        Self::checked(&env, validation::validate_identifier(&record_id), &record_id)?;
        let store = PermissionStore::new(&env);
        let record = Self::load_record(&env, &store, &record_id, &user)?;
        Ok(access::has_access(
            &store,
            &record,
            &user,
            env.ledger().timestamp(),
        ))
    }

    /// Whether `user` holds at least `required` on the record.
    pub fn validate_permission_level(
        env: Env,
        record_id: String,
        user: Address,
        required: AccessAction,
    ) -> Result<bool, ContractError> {
        Self::checked(&env, validation::validate_identifier(&record_id), &record_id)?;
        let store = PermissionStore::new(&env);
        let record = Self::load_record(&env, &store, &record_id, &user)?;
        Ok(access::has_level(
            &store,
            &record,
            &user,
            &required,
            env.ledger().timestamp(),
        ))
    }

    /// Access decision for `action` together with the reason behind it.
    /// Emits an `AccessAudit` event describing the outcome.
    pub fn validate_access_with_reason(
        env: Env,
        record_id: String,
        user: Address,
        action: AccessAction,
    ) -> Result<AccessDecision, ContractError> {
        Self::checked(&env, validation::validate_identifier(&record_id), &record_id)?;
        let store = PermissionStore::new(&env);
        let record = store.record(&record_id);

        let decision = access::decide(
            &env,
            &store,
            record.as_ref(),
            &user,
            action,
            env.ledger().timestamp(),
        );

        events::publish_access_audit(
            &env,
            record_id,
            user,
            symbol_short!("validate"),
            decision.has_access,
            decision.details.clone(),
        );

        Ok(decision)
    }

    /// `check_access` over many records. Per-record failures are reported
    /// in the result instead of aborting the batch; like `check_access`,
    /// nothing is written or published.
    pub fn batch_validate_access(
        env: Env,
        record_ids: Vec<String>,
        user: Address,
    ) -> Result<Map<String, BatchAccessResult>, ContractError> {
        if let Err(error) = validation::validate_batch(&record_ids) {
            return Err(Self::fail(&env, error, Some(user), None));
        }

        let store = PermissionStore::new(&env);
        let now = env.ledger().timestamp();
        let mut results = Map::new(&env);

        for record_id in record_ids.iter() {
            let result = match store.record(&record_id) {
                Some(record) => BatchAccessResult {
                    has_access: access::has_access(&store, &record, &user, now),
                    error: None,
                },
                None => BatchAccessResult {
                    has_access: false,
                    error: Some(ContractError::RecordNotFound as u32),
                },
            };
            results.set(record_id, result);
        }

        Ok(results)
    }

    /// The record's access list. Patient only; a record without any grants
    /// yields an empty list.
    pub fn get_access_list(
        env: Env,
        caller: Address,
        record_id: String,
    ) -> Result<AccessList, ContractError> {
        caller.require_auth();
        Self::checked(&env, validation::validate_identifier(&record_id), &record_id)?;

        let store = PermissionStore::new(&env);
        let record = Self::load_record(&env, &store, &record_id, &caller)?;
        Self::require_patient(&env, &record, &caller)?;

        Ok(store.access_list_or_empty(&record))
    }

    /// Owner-facing snapshot of the record's grants, ordered by grantee.
    pub fn get_permission_history(
        env: Env,
        caller: Address,
        record_id: String,
    ) -> Result<PermissionHistory, ContractError> {
        caller.require_auth();
        Self::checked(&env, validation::validate_identifier(&record_id), &record_id)?;

        let store = PermissionStore::new(&env);
        let record = Self::load_record(&env, &store, &record_id, &caller)?;
        Self::require_patient(&env, &record, &caller)?;

        let list = store.access_list_or_empty(&record);
        Ok(PermissionHistory {
            record_id,
            owner: list.owner,
            permissions: list.permissions.values(),
            last_updated: list.updated_at,
            retrieved_by: caller,
            retrieved_at: env.ledger().timestamp(),
        })
    }

    /// Every grant held by `user`, across records. Users may only list
    /// their own grants.
    pub fn get_user_permissions(
        env: Env,
        caller: Address,
        user: Address,
    ) -> Result<Vec<AccessPermission>, ContractError> {
        caller.require_auth();

        if caller != user {
            return Err(Self::fail(&env, ContractError::Unauthorized, Some(caller), None));
        }

        let store = PermissionStore::new(&env);
        let mut permissions = Vec::new(&env);
        for record_id in store.grantee_records(&user).iter() {
            if let Some(record) = store.record(&record_id) {
                let list = store.access_list_or_empty(&record);
                if let Some(perm) = store.stored_permission(&list, &user) {
                    permissions.push_back(perm);
                }
            }
        }
        Ok(permissions)
    }

    /// Copy a grant that only exists as a legacy per-pair record into the
    /// access list. Returns `false` when the map already holds an entry.
    pub fn migrate_legacy_permission(
        env: Env,
        caller: Address,
        record_id: String,
        grantee: Address,
    ) -> Result<bool, ContractError> {
        caller.require_auth();
        Self::checked(&env, validation::validate_identifier(&record_id), &record_id)?;

        let store = PermissionStore::new(&env);
        let record = Self::load_record(&env, &store, &record_id, &caller)?;
        Self::require_patient(&env, &record, &caller)?;

        let mut list = store.access_list_or_empty(&record);
        if list.permissions.contains_key(grantee.clone()) {
            return Ok(false);
        }

        let perm = store.legacy_permission(&record_id, &grantee).ok_or_else(|| {
            Self::fail(
                &env,
                ContractError::PermissionNotFound,
                Some(grantee.clone()),
                Some(record_id.clone()),
            )
        })?;

        list.permissions.set(grantee.clone(), perm);
        list.updated_at = env.ledger().timestamp();
        store.save_access_list(&list);
        store.index_grantee_record(&grantee, &record_id);

        events::publish_access_audit(
            &env,
            record_id,
            caller,
            symbol_short!("migrate"),
            true,
            String::from_str(&env, "Legacy permission moved into the access list"),
        );

        Ok(true)
    }

    // ── Audit ────────────────────────────────────────────────────────────────

    /// File an explicit `AccessAudit` entry for an access attempt.
    pub fn audit_access_attempt(
        env: Env,
        caller: Address,
        record_id: String,
        action: Symbol,
        success: bool,
        reason: String,
    ) -> Result<(), ContractError> {
        caller.require_auth();
        Self::checked(&env, validation::validate_identifier(&record_id), &record_id)?;

        events::publish_access_audit(&env, record_id, caller, action, success, reason);
        Ok(())
    }

    pub fn get_error_log(env: Env) -> Vec<ErrorLogEntry> {
        errors::get_error_log(&env)
    }

    pub fn get_error_count(env: Env) -> u64 {
        errors::get_error_count(&env)
    }

    // ── Info ─────────────────────────────────────────────────────────────────

    pub fn get_contract_info(env: Env) -> ContractInfo {
        let mut permission_levels = Vec::new(&env);
        for action in [
            AccessAction::Read,
            AccessAction::Share,
            AccessAction::Write,
            AccessAction::Admin,
        ] {
            permission_levels.push_back(PermissionLevelInfo {
                action,
                rank: action.rank(),
            });
        }

        let mut supported_events = Vec::new(&env);
        for event in [
            events::RECORD_CREATED,
            events::ACCESS_GRANTED,
            events::ACCESS_REVOKED,
            events::RECORD_ACCESSED,
            events::RECORD_UPDATED,
            events::ACCESS_AUDIT,
        ] {
            supported_events.push_back(event);
        }

        ContractInfo {
            name: String::from_str(&env, CONTRACT_NAME),
            version: CONTRACT_VERSION,
            permission_levels,
            supported_events,
        }
    }

    /// Contract version
    pub fn version() -> u32 {
        CONTRACT_VERSION
    }

    // ── Internal Helpers ─────────────────────────────────────────────────────

    fn load_record(
        env: &Env,
        store: &PermissionStore,
        record_id: &String,
        user: &Address,
    ) -> Result<MedicalRecord, ContractError> {
        store.record(record_id).ok_or_else(|| {
            Self::fail(
                env,
                ContractError::RecordNotFound,
                Some(user.clone()),
                Some(record_id.clone()),
            )
        })
    }

    /// Ownership check for policy operations: only the patient qualifies.
    fn require_patient(
        env: &Env,
        record: &MedicalRecord,
        caller: &Address,
    ) -> Result<(), ContractError> {
        if *caller != record.patient {
            return Err(Self::fail(
                env,
                ContractError::Unauthorized,
                Some(caller.clone()),
                Some(record.record_id.clone()),
            ));
        }
        Ok(())
    }

    fn checked(
        env: &Env,
        result: Result<(), ContractError>,
        resource_id: &String,
    ) -> Result<(), ContractError> {
        result.map_err(|error| Self::fail(env, error, None, Some(resource_id.clone())))
    }

    fn fail(
        env: &Env,
        error: ContractError,
        user: Option<Address>,
        resource_id: Option<String>,
    ) -> ContractError {
        Self::fail_with_levels(env, error, user, resource_id, None, None)
    }

    /// Logs the error with its context and publishes an `ERROR` event.
    /// Returns `error` so call sites can write `Err(Self::fail(..))`.
    fn fail_with_levels(
        env: &Env,
        error: ContractError,
        user: Option<Address>,
        resource_id: Option<String>,
        required: Option<AccessAction>,
        held: Option<AccessAction>,
    ) -> ContractError {
        let context = create_error_context(env, error, user, resource_id, required, held);
        errors::log_error(env, error, context.clone());
        events::publish_error(env, error as u32, context);
        error
    }
}


#[cfg(test)]
mod test_access;
