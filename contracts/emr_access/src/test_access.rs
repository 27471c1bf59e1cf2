#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::arithmetic_side_effects
)]

use super::*;
use crate::access::is_effective;
use soroban_sdk::testutils::{Address as _, Ledger};
use soroban_sdk::{symbol_short, Address, Env, String, Vec};

const NOW: u64 = 1_700_000_000;
const YEAR_2099: u64 = 4_070_908_800;

struct Fixture {
    env: Env,
    contract_id: Address,
    client: EmrAccessContractClient<'static>,
    patient: Address,
    doctor: Address,
    record_id: String,
}

/// One record for `patient`, created by `doctor`.
fn setup() -> Fixture {
    let env = Env::default();
    env.mock_all_auths();
    env.ledger().set_timestamp(NOW);

    let contract_id = env.register(EmrAccessContract, ());
    let client = EmrAccessContractClient::new(&env, &contract_id);

    let patient = Address::generate(&env);
    let doctor = Address::generate(&env);
    let record_id = create(&env, &client, "rec-001", &patient, &doctor);

    Fixture {
        env,
        contract_id,
        client,
        patient,
        doctor,
        record_id,
    }
}

fn create(
    env: &Env,
    client: &EmrAccessContractClient,
    id: &str,
    patient: &Address,
    creator: &Address,
) -> String {
    let input = RecordInput {
        record_id: String::from_str(env, id),
        patient: patient.clone(),
        creator: creator.clone(),
        content_address: String::from_str(env, "ipfs://bafkreirecordcontent"),
        content_hash: String::from_str(env, "sha256:0123456789abcdef"),
        version_hash: None,
        timestamp: None,
    };
    client.create_medical_record(creator, &input)
}

/// Writes a grant straight into the legacy per-pair store, bypassing the
/// access list.
fn put_legacy(f: &Fixture, grantee: &Address, action: AccessAction, is_active: bool) {
    let perm = AccessPermission {
        record_id: f.record_id.clone(),
        grantee: grantee.clone(),
        action,
        granted_by: f.patient.clone(),
        granted_at: NOW,
        expires_at: None,
        is_active,
    };
    f.env.as_contract(&f.contract_id, || {
        PermissionStore::new(&f.env).put_legacy_permission(&perm);
    });
}

// ── Pure helpers ─────────────────────────────────────────────────────────────

#[test]
fn test_action_hierarchy() {
    assert!(AccessAction::Admin.satisfies(&AccessAction::Read));
    assert!(AccessAction::Write.satisfies(&AccessAction::Share));
    assert!(AccessAction::Share.satisfies(&AccessAction::Share));
    assert!(!AccessAction::Read.satisfies(&AccessAction::Share));
    assert!(!AccessAction::Write.satisfies(&AccessAction::Admin));
}

#[test]
fn test_expiry_boundary_is_exclusive() {
    let env = Env::default();
    let perm = AccessPermission {
        record_id: String::from_str(&env, "rec-001"),
        grantee: Address::generate(&env),
        action: AccessAction::Read,
        granted_by: Address::generate(&env),
        granted_at: NOW,
        expires_at: Some(NOW + 10),
        is_active: true,
    };

    assert!(is_effective(&perm, NOW + 9));
    assert!(!is_effective(&perm, NOW + 10));

    let inactive = AccessPermission {
        is_active: false,
        expires_at: None,
        ..perm
    };
    assert!(!is_effective(&inactive, NOW));
}

#[test]
fn test_validation_helpers() {
    let env = Env::default();
    env.ledger().set_timestamp(NOW);

    assert_eq!(
        validation::validate_identifier(&String::from_str(&env, "patient:42.rec_7-b")),
        Ok(())
    );
    assert_eq!(
        validation::validate_identifier(&String::from_str(&env, "rec/001")),
        Err(ContractError::InvalidIdentifier)
    );
    assert_eq!(
        validation::validate_expiration(&env, Some(NOW)),
        Err(ContractError::InvalidExpiration)
    );
    assert_eq!(validation::validate_expiration(&env, Some(NOW + 1)), Ok(()));
    assert_eq!(validation::validate_expiration(&env, None), Ok(()));
}

// ── Grant ────────────────────────────────────────────────────────────────────

#[test]
fn test_grant_read_then_check() {
    let f = setup();
    let nurse = Address::generate(&f.env);

    assert!(!f.client.check_access(&f.record_id, &nurse));
    f.client
        .grant_access(&f.patient, &f.record_id, &nurse, &AccessAction::Read, &Some(YEAR_2099));

    assert!(f.client.check_access(&f.record_id, &nurse));
    assert!(f
        .client
        .validate_permission_level(&f.record_id, &nurse, &AccessAction::Read));
    assert!(!f
        .client
        .validate_permission_level(&f.record_id, &nurse, &AccessAction::Write));

    let list = f.client.get_access_list(&f.patient, &f.record_id);
    let perm = list.permissions.get(nurse.clone()).unwrap();
    assert_eq!(perm.granted_by, f.patient);
    assert_eq!(perm.granted_at, NOW);
    assert_eq!(perm.expires_at, Some(YEAR_2099));
    assert_eq!(list.updated_at, NOW);
}

#[test]
fn test_admin_grant_satisfies_every_level() {
    let f = setup();
    let admin = Address::generate(&f.env);
    f.client
        .grant_access(&f.patient, &f.record_id, &admin, &AccessAction::Admin, &None);

    for level in [
        AccessAction::Read,
        AccessAction::Share,
        AccessAction::Write,
        AccessAction::Admin,
    ] {
        assert!(f.client.validate_permission_level(&f.record_id, &admin, &level));
    }
}

#[test]
fn test_patient_and_creator_levels() {
    let f = setup();

    assert!(f.client.check_access(&f.record_id, &f.patient));
    assert!(f.client.check_access(&f.record_id, &f.doctor));
    assert!(f
        .client
        .validate_permission_level(&f.record_id, &f.patient, &AccessAction::Admin));

    // The creator's standing comes from the seeded write grant.
    assert!(f
        .client
        .validate_permission_level(&f.record_id, &f.doctor, &AccessAction::Write));
    assert!(!f
        .client
        .validate_permission_level(&f.record_id, &f.doctor, &AccessAction::Admin));
}

#[test]
fn test_regrant_replaces_previous_grant() {
    let f = setup();
    let nurse = Address::generate(&f.env);

    f.client
        .grant_access(&f.patient, &f.record_id, &nurse, &AccessAction::Read, &None);
    f.env.ledger().set_timestamp(NOW + 60);
    f.client
        .grant_access(&f.patient, &f.record_id, &nurse, &AccessAction::Write, &Some(YEAR_2099));

    let list = f.client.get_access_list(&f.patient, &f.record_id);
    // doctor's seed plus the nurse
    assert_eq!(list.permissions.len(), 2);
    let perm = list.permissions.get(nurse.clone()).unwrap();
    assert_eq!(perm.action, AccessAction::Write);
    assert_eq!(perm.granted_at, NOW + 60);
    assert_eq!(list.updated_at, NOW + 60);
}

#[test]
fn test_grant_only_by_patient() {
    let f = setup();
    let nurse = Address::generate(&f.env);

    let result =
        f.client
            .try_grant_access(&f.doctor, &f.record_id, &nurse, &AccessAction::Read, &None);
    assert_eq!(result, Err(Ok(ContractError::Unauthorized)));
}

#[test]
fn test_grant_rejects_self_grant_and_past_expiry() {
    let f = setup();
    let nurse = Address::generate(&f.env);

    assert_eq!(
        f.client
            .try_grant_access(&f.patient, &f.record_id, &f.patient, &AccessAction::Read, &None),
        Err(Ok(ContractError::InvalidInput))
    );
    assert_eq!(
        f.client
            .try_grant_access(&f.patient, &f.record_id, &nurse, &AccessAction::Read, &Some(NOW)),
        Err(Ok(ContractError::InvalidExpiration))
    );
    assert!(!f.client.check_access(&f.record_id, &nurse));
}

#[test]
#[should_panic(expected = "Error(Contract, #8)")]
fn test_grant_on_missing_record() {
    let f = setup();
    let nurse = Address::generate(&f.env);
    f.client.grant_access(
        &f.patient,
        &String::from_str(&f.env, "missing-1"),
        &nurse,
        &AccessAction::Read,
        &None,
    );
}

// ── Expiry ───────────────────────────────────────────────────────────────────

#[test]
fn test_grant_lapses_at_expiry() {
    let f = setup();
    let nurse = Address::generate(&f.env);
    f.client
        .grant_access(&f.patient, &f.record_id, &nurse, &AccessAction::Read, &Some(NOW + 100));

    f.env.ledger().set_timestamp(NOW + 99);
    assert!(f.client.check_access(&f.record_id, &nurse));

    f.env.ledger().set_timestamp(NOW + 100);
    assert!(!f.client.check_access(&f.record_id, &nurse));
    assert_eq!(
        f.client.try_read_record(&nurse, &f.record_id),
        Err(Ok(ContractError::Unauthorized))
    );

    let decision =
        f.client
            .validate_access_with_reason(&f.record_id, &nurse, &AccessAction::Read);
    assert!(!decision.has_access);
    assert_eq!(decision.reason, AccessReason::PermissionExpired);
    assert_eq!(decision.expires_at, Some(NOW + 100));

    // Expiry is evaluated, never written: the stored grant is unchanged.
    let perm = f
        .client
        .get_access_list(&f.patient, &f.record_id)
        .permissions
        .get(nurse.clone())
        .unwrap();
    assert!(perm.is_active);
}

// ── Revoke ───────────────────────────────────────────────────────────────────

#[test]
fn test_revoke_removes_access() {
    let f = setup();
    let nurse = Address::generate(&f.env);
    f.client
        .grant_access(&f.patient, &f.record_id, &nurse, &AccessAction::Share, &None);

    f.env.ledger().set_timestamp(NOW + 30);
    f.client.revoke_access(&f.patient, &f.record_id, &nurse);

    assert!(!f.client.check_access(&f.record_id, &nurse));
    let list = f.client.get_access_list(&f.patient, &f.record_id);
    assert!(!list.permissions.contains_key(nurse.clone()));
    assert_eq!(list.updated_at, NOW + 30);

    assert_eq!(
        f.client.try_revoke_access(&f.patient, &f.record_id, &nurse),
        Err(Ok(ContractError::PermissionNotFound))
    );
}

#[test]
fn test_revoke_only_by_patient() {
    let f = setup();
    let nurse = Address::generate(&f.env);
    f.client
        .grant_access(&f.patient, &f.record_id, &nurse, &AccessAction::Read, &None);

    assert_eq!(
        f.client.try_revoke_access(&f.doctor, &f.record_id, &nurse),
        Err(Ok(ContractError::Unauthorized))
    );
    assert!(f.client.check_access(&f.record_id, &nurse));
}

#[test]
fn test_revoking_creator_seed_keeps_creator_standing() {
    let f = setup();

    f.client.revoke_access(&f.patient, &f.record_id, &f.doctor);

    assert!(f.client.check_access(&f.record_id, &f.doctor));
    assert!(!f
        .client
        .validate_permission_level(&f.record_id, &f.doctor, &AccessAction::Read));
}

// ── Decisions with reasons ───────────────────────────────────────────────────

#[test]
fn test_reason_for_each_standing() {
    let f = setup();
    let reader = Address::generate(&f.env);
    let stranger = Address::generate(&f.env);
    f.client
        .grant_access(&f.patient, &f.record_id, &reader, &AccessAction::Read, &None);

    let owner = f
        .client
        .validate_access_with_reason(&f.record_id, &f.patient, &AccessAction::Admin);
    assert!(owner.has_access);
    assert_eq!(owner.reason, AccessReason::OwnerAccess);
    assert_eq!(owner.level, HolderLevel::Owner);

    let creator = f
        .client
        .validate_access_with_reason(&f.record_id, &f.doctor, &AccessAction::Admin);
    assert!(creator.has_access);
    assert_eq!(creator.reason, AccessReason::CreatorAccess);

    let none = f
        .client
        .validate_access_with_reason(&f.record_id, &stranger, &AccessAction::Read);
    assert!(!none.has_access);
    assert_eq!(none.reason, AccessReason::NoPermission);
    assert_eq!(none.level, HolderLevel::NoAccess);

    let low = f
        .client
        .validate_access_with_reason(&f.record_id, &reader, &AccessAction::Write);
    assert!(!low.has_access);
    assert_eq!(low.reason, AccessReason::InsufficientLevel);
    assert_eq!(low.level, HolderLevel::Grant(AccessAction::Read));
    assert_eq!(low.required, AccessAction::Write);

    let granted = f
        .client
        .validate_access_with_reason(&f.record_id, &reader, &AccessAction::Read);
    assert!(granted.has_access);
    assert_eq!(granted.reason, AccessReason::PermissionGranted);
    assert_eq!(granted.granted_by, Some(f.patient.clone()));
    assert_eq!(granted.granted_at, Some(NOW));
}

#[test]
fn test_reason_for_missing_record_is_not_an_error() {
    let f = setup();

    let decision = f.client.validate_access_with_reason(
        &String::from_str(&f.env, "missing-1"),
        &f.patient,
        &AccessAction::Read,
    );
    assert!(!decision.has_access);
    assert_eq!(decision.reason, AccessReason::RecordNotFound);
    assert_eq!(decision.level, HolderLevel::NoAccess);
}

#[test]
fn test_reason_for_inactive_legacy_grant() {
    let f = setup();
    let nurse = Address::generate(&f.env);
    put_legacy(&f, &nurse, AccessAction::Read, false);

    let decision =
        f.client
            .validate_access_with_reason(&f.record_id, &nurse, &AccessAction::Read);
    assert!(!decision.has_access);
    assert_eq!(decision.reason, AccessReason::PermissionInactive);
}

// ── Legacy mirror ────────────────────────────────────────────────────────────

#[test]
fn test_legacy_grant_is_honored_and_migrated() {
    let f = setup();
    let nurse = Address::generate(&f.env);
    put_legacy(&f, &nurse, AccessAction::Share, true);

    assert!(f.client.check_access(&f.record_id, &nurse));
    assert!(f
        .client
        .validate_permission_level(&f.record_id, &nurse, &AccessAction::Share));
    assert!(!f
        .client
        .get_access_list(&f.patient, &f.record_id)
        .permissions
        .contains_key(nurse.clone()));

    assert!(f
        .client
        .migrate_legacy_permission(&f.patient, &f.record_id, &nurse));
    let list = f.client.get_access_list(&f.patient, &f.record_id);
    assert_eq!(
        list.permissions.get(nurse.clone()).unwrap().action,
        AccessAction::Share
    );

    // Already in the map.
    assert!(!f
        .client
        .migrate_legacy_permission(&f.patient, &f.record_id, &nurse));
}

#[test]
fn test_migrate_without_legacy_grant() {
    let f = setup();
    let nurse = Address::generate(&f.env);

    assert_eq!(
        f.client
            .try_migrate_legacy_permission(&f.patient, &f.record_id, &nurse),
        Err(Ok(ContractError::PermissionNotFound))
    );
}

#[test]
fn test_revoke_clears_legacy_only_grant() {
    let f = setup();
    let nurse = Address::generate(&f.env);
    put_legacy(&f, &nurse, AccessAction::Read, true);

    f.client.revoke_access(&f.patient, &f.record_id, &nurse);
    assert!(!f.client.check_access(&f.record_id, &nurse));
}

// ── Listings ─────────────────────────────────────────────────────────────────

#[test]
fn test_permission_history() {
    let f = setup();
    let nurse = Address::generate(&f.env);
    f.client
        .grant_access(&f.patient, &f.record_id, &nurse, &AccessAction::Read, &None);

    f.env.ledger().set_timestamp(NOW + 5);
    let history = f.client.get_permission_history(&f.patient, &f.record_id);
    assert_eq!(history.owner, f.patient);
    assert_eq!(history.permissions.len(), 2);
    assert_eq!(history.last_updated, NOW);
    assert_eq!(history.retrieved_by, f.patient);
    assert_eq!(history.retrieved_at, NOW + 5);

    assert_eq!(
        f.client.try_get_permission_history(&f.doctor, &f.record_id),
        Err(Ok(ContractError::Unauthorized))
    );
}

#[test]
fn test_user_permissions_follow_grants() {
    let f = setup();
    let nurse = Address::generate(&f.env);
    let second = create(&f.env, &f.client, "rec-002", &f.patient, &f.patient);

    f.client
        .grant_access(&f.patient, &f.record_id, &nurse, &AccessAction::Read, &None);
    f.client
        .grant_access(&f.patient, &second, &nurse, &AccessAction::Write, &None);
    assert_eq!(f.client.get_user_permissions(&nurse, &nurse).len(), 2);

    f.client.revoke_access(&f.patient, &f.record_id, &nurse);
    let remaining = f.client.get_user_permissions(&nurse, &nurse);
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining.get(0).unwrap().record_id, second);

    // The creator's seed is listed too.
    assert_eq!(f.client.get_user_permissions(&f.doctor, &f.doctor).len(), 1);

    assert_eq!(
        f.client.try_get_user_permissions(&f.patient, &nurse),
        Err(Ok(ContractError::Unauthorized))
    );
}

// ── Batch ────────────────────────────────────────────────────────────────────

#[test]
fn test_batch_reports_per_record_outcome() {
    let f = setup();
    let nurse = Address::generate(&f.env);
    let second = create(&f.env, &f.client, "rec-002", &f.patient, &f.patient);
    let missing = String::from_str(&f.env, "missing-1");
    f.client
        .grant_access(&f.patient, &second, &nurse, &AccessAction::Read, &None);

    let mut ids = Vec::new(&f.env);
    ids.push_back(f.record_id.clone());
    ids.push_back(second.clone());
    ids.push_back(missing.clone());

    let results = f.client.batch_validate_access(&ids, &nurse);
    assert_eq!(results.len(), 3);
    assert!(!results.get(f.record_id.clone()).unwrap().has_access);
    assert_eq!(results.get(f.record_id.clone()).unwrap().error, None);
    assert!(results.get(second).unwrap().has_access);

    let failed = results.get(missing.clone()).unwrap();
    assert!(!failed.has_access);
    assert_eq!(failed.error, Some(ContractError::RecordNotFound as u32));

    assert_eq!(f.client.get_error_count(), 0);
    assert!(f.client.get_error_log().is_empty());
}

#[test]
fn test_full_batch_of_missing_records() {
    let f = setup();
    let nurse = Address::generate(&f.env);
    f.env.cost_estimate().budget().reset_unlimited();

    let mut ids = Vec::new(&f.env);
    for i in 0..validation::MAX_BATCH_SIZE {
        let mut id = *b"absent-00";
        id[7] = b'0' + (i / 10) as u8;
        id[8] = b'0' + (i % 10) as u8;
        ids.push_back(String::from_bytes(&f.env, &id));
    }

    let results = f.client.batch_validate_access(&ids, &nurse);
    assert_eq!(results.len(), validation::MAX_BATCH_SIZE);
    for id in ids.iter() {
        let result = results.get(id).unwrap();
        assert!(!result.has_access);
        assert_eq!(result.error, Some(ContractError::RecordNotFound as u32));
    }

    assert_eq!(f.client.get_error_count(), 0);
    assert!(f.client.get_error_log().is_empty());
}

#[test]
fn test_batch_size_limits() {
    let f = setup();

    let empty: Vec<String> = Vec::new(&f.env);
    assert_eq!(
        f.client.try_batch_validate_access(&empty, &f.patient),
        Err(Ok(ContractError::BatchTooLarge))
    );

    let mut oversized = Vec::new(&f.env);
    for _ in 0..=validation::MAX_BATCH_SIZE {
        oversized.push_back(f.record_id.clone());
    }
    assert_eq!(
        f.client.try_batch_validate_access(&oversized, &f.patient),
        Err(Ok(ContractError::BatchTooLarge))
    );
}

// ── Audit ────────────────────────────────────────────────────────────────────

#[test]
fn test_audit_access_attempt() {
    let f = setup();

    f.client.audit_access_attempt(
        &f.doctor,
        &f.record_id,
        &symbol_short!("export"),
        &false,
        &String::from_str(&f.env, "Export blocked by ward policy"),
    );

    assert_eq!(
        f.client.try_audit_access_attempt(
            &f.doctor,
            &String::from_str(&f.env, "x"),
            &symbol_short!("export"),
            &false,
            &String::from_str(&f.env, "bad id"),
        ),
        Err(Ok(ContractError::InvalidIdentifier))
    );
}

#[test]
fn test_error_context_records_level_ranks() {
    let f = setup();
    let reader = Address::generate(&f.env);

    f.env.as_contract(&f.contract_id, || {
        let context = create_error_context(
            &f.env,
            ContractError::Unauthorized,
            Some(reader.clone()),
            Some(f.record_id.clone()),
            Some(AccessAction::Write),
            Some(AccessAction::Read),
        );
        errors::log_error(&f.env, ContractError::Unauthorized, context.clone());
        events::publish_error(&f.env, ContractError::Unauthorized as u32, context);
    });

    let log = f.client.get_error_log();
    assert_eq!(log.len(), 1);
    let entry = log.get(0).unwrap();
    assert_eq!(entry.error_code, ContractError::Unauthorized as u32);
    assert_eq!(entry.context.user, Some(reader));
    assert_eq!(entry.context.required, Some(AccessAction::Write.rank()));
    assert_eq!(entry.context.held, Some(AccessAction::Read.rank()));
    assert_eq!(entry.context.category, ErrorCategory::Unauthorized);
}

#[test]
fn test_failed_invocation_leaves_no_state() {
    let f = setup();
    let stranger = Address::generate(&f.env);
    let before = f.client.get_access_list(&f.patient, &f.record_id);

    let _ = f
        .client
        .try_grant_access(&stranger, &f.record_id, &stranger, &AccessAction::Admin, &None);
    let _ = f.client.try_read_record(&stranger, &f.record_id);

    assert_eq!(f.client.get_access_list(&f.patient, &f.record_id), before);
    assert_eq!(f.client.get_error_count(), 0);
}
