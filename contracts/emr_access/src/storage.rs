//! Persisted key layout and the `PermissionStore` wrapper.
//!
//! | Key                          | Value                    |
//! |------------------------------|--------------------------|
//! | `Record(record_id)`          | `MedicalRecord`          |
//! | `Access(record_id)`          | `AccessList`             |
//! | `Perm(record_id, grantee)`   | `AccessPermission` (legacy mirror) |
//! | `PatientRecords(patient)`    | `Vec<String>` record ids |
//! | `GranteeRecords(grantee)`    | `Vec<String>` record ids |
//!
//! Every read and write touches only the keys of the invocation that asked
//! for them; nothing is cached across calls.

use soroban_sdk::{contracttype, Address, Env, Map, String, Vec};

use crate::types::{AccessList, AccessPermission, MedicalRecord};

const TTL_THRESHOLD: u32 = 5184000;
const TTL_EXTEND_TO: u32 = 10368000;

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DataKey {
    Record(String),
    Access(String),
    Perm(String, Address),
    PatientRecords(Address),
    GranteeRecords(Address),
}

/// Typed access to engine state. The AccessList map and the legacy
/// per-pair records are both reached through here so callers never touch
/// raw keys.
pub struct PermissionStore<'a> {
    env: &'a Env,
}

impl<'a> PermissionStore<'a> {
    pub fn new(env: &'a Env) -> Self {
        Self { env }
    }

    fn get<V: soroban_sdk::TryFromVal<Env, soroban_sdk::Val>>(&self, key: &DataKey) -> Option<V> {
        let value = self.env.storage().persistent().get(key);
        if value.is_some() {
            self.extend_ttl(key);
        }
        value
    }

    fn put<V: soroban_sdk::IntoVal<Env, soroban_sdk::Val>>(&self, key: &DataKey, value: &V) {
        self.env.storage().persistent().set(key, value);
        self.extend_ttl(key);
    }

    fn extend_ttl(&self, key: &DataKey) {
        self.env
            .storage()
            .persistent()
            .extend_ttl(key, TTL_THRESHOLD, TTL_EXTEND_TO);
    }

    // ── Records ──────────────────────────────────────────────────────────────

    pub fn has_record(&self, record_id: &String) -> bool {
        self.env
            .storage()
            .persistent()
            .has(&DataKey::Record(record_id.clone()))
    }

    pub fn record(&self, record_id: &String) -> Option<MedicalRecord> {
        self.get(&DataKey::Record(record_id.clone()))
    }

    pub fn save_record(&self, record: &MedicalRecord) {
        self.put(&DataKey::Record(record.record_id.clone()), record);
    }

    // ── Access lists ─────────────────────────────────────────────────────────

    pub fn access_list(&self, record_id: &String) -> Option<AccessList> {
        self.get(&DataKey::Access(record_id.clone()))
    }

    /// The stored list, or an empty one owned by the record's patient.
    pub fn access_list_or_empty(&self, record: &MedicalRecord) -> AccessList {
        self.access_list(&record.record_id)
            .unwrap_or_else(|| AccessList {
                record_id: record.record_id.clone(),
                owner: record.patient.clone(),
                permissions: Map::new(self.env),
                updated_at: record.timestamp,
            })
    }

    pub fn save_access_list(&self, list: &AccessList) {
        self.put(&DataKey::Access(list.record_id.clone()), list);
    }

    // ── Legacy per-pair mirror ───────────────────────────────────────────────

    pub fn legacy_permission(
        &self,
        record_id: &String,
        grantee: &Address,
    ) -> Option<AccessPermission> {
        self.get(&DataKey::Perm(record_id.clone(), grantee.clone()))
    }

    pub fn put_legacy_permission(&self, perm: &AccessPermission) {
        self.put(
            &DataKey::Perm(perm.record_id.clone(), perm.grantee.clone()),
            perm,
        );
    }

    pub fn remove_legacy_permission(&self, record_id: &String, grantee: &Address) {
        self.env
            .storage()
            .persistent()
            .remove(&DataKey::Perm(record_id.clone(), grantee.clone()));
    }

    /// Map entry first, legacy mirror second.
    pub fn stored_permission(
        &self,
        list: &AccessList,
        grantee: &Address,
    ) -> Option<AccessPermission> {
        list.permissions
            .get(grantee.clone())
            .or_else(|| self.legacy_permission(&list.record_id, grantee))
    }

    // ── Secondary indexes ────────────────────────────────────────────────────

    pub fn patient_records(&self, patient: &Address) -> Vec<String> {
        self.get(&DataKey::PatientRecords(patient.clone()))
            .unwrap_or(Vec::new(self.env))
    }

    pub fn index_patient_record(&self, patient: &Address, record_id: &String) {
        let key = DataKey::PatientRecords(patient.clone());
        self.index_insert(&key, record_id);
    }

    pub fn grantee_records(&self, grantee: &Address) -> Vec<String> {
        self.get(&DataKey::GranteeRecords(grantee.clone()))
            .unwrap_or(Vec::new(self.env))
    }

    pub fn index_grantee_record(&self, grantee: &Address, record_id: &String) {
        let key = DataKey::GranteeRecords(grantee.clone());
        self.index_insert(&key, record_id);
    }

    pub fn unindex_grantee_record(&self, grantee: &Address, record_id: &String) {
        let key = DataKey::GranteeRecords(grantee.clone());
        let mut ids: Vec<String> = match self.get(&key) {
            Some(ids) => ids,
            None => return,
        };
        if let Some(pos) = ids.first_index_of(record_id.clone()) {
            ids.remove(pos);
        }
        if ids.is_empty() {
            self.env.storage().persistent().remove(&key);
        } else {
            self.put(&key, &ids);
        }
    }

    fn index_insert(&self, key: &DataKey, record_id: &String) {
        let mut ids: Vec<String> = self.get(key).unwrap_or(Vec::new(self.env));
        if !ids.contains(record_id.clone()) {
            ids.push_back(record_id.clone());
            self.put(key, &ids);
        }
    }
}
