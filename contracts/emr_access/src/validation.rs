//! Input validation for identifiers, content pointers and expirations.
//!
//! Everything here is a pure function of its arguments and the ledger
//! timestamp, so every validating node reaches the same verdict.

use soroban_sdk::{Env, String, Vec};

use crate::errors::ContractError;

/// Minimum length for record identifiers
pub const MIN_ID_LENGTH: u32 = 3;
/// Maximum length for record identifiers
pub const MAX_ID_LENGTH: u32 = 64;

/// Minimum length for content and version hashes
pub const MIN_HASH_LENGTH: u32 = 8;
/// Maximum length for content and version hashes
pub const MAX_HASH_LENGTH: u32 = 128;

/// Maximum length for content addresses (CIDs, `ipfs://` URIs and similar)
pub const MAX_ADDRESS_LENGTH: u32 = 256;

/// Maximum number of records checked by one `batch_validate_access` call
pub const MAX_BATCH_SIZE: u32 = 50;

const BUF_LEN: usize = MAX_ADDRESS_LENGTH as usize;

fn is_identifier_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b':' | b'-')
}

fn is_address_byte(b: u8) -> bool {
    b.is_ascii_graphic()
}

/// Checks the length bounds and then every byte of `value` against `allowed`.
fn check_chars(
    value: &String,
    min_length: u32,
    max_length: u32,
    allowed: fn(u8) -> bool,
    error: ContractError,
) -> Result<(), ContractError> {
    let len = value.len();
    if len == 0 || len < min_length || len > max_length {
        return Err(error);
    }

    let mut buf = [0u8; BUF_LEN];
    let bytes = &mut buf[..len as usize];
    value.copy_into_slice(bytes);

    if bytes.iter().all(|b| allowed(*b)) {
        Ok(())
    } else {
        Err(error)
    }
}

/// Record identifiers: 3..=64 bytes of `[A-Za-z0-9._:-]`.
pub fn validate_identifier(id: &String) -> Result<(), ContractError> {
    check_chars(
        id,
        MIN_ID_LENGTH,
        MAX_ID_LENGTH,
        is_identifier_byte,
        ContractError::InvalidIdentifier,
    )
}

pub fn validate_content_hash(hash: &String) -> Result<(), ContractError> {
    check_chars(
        hash,
        MIN_HASH_LENGTH,
        MAX_HASH_LENGTH,
        is_identifier_byte,
        ContractError::InvalidContentHash,
    )
}

/// Content addresses: any printable, non-space ASCII up to 256 bytes.
pub fn validate_content_address(address: &String) -> Result<(), ContractError> {
    check_chars(
        address,
        1,
        MAX_ADDRESS_LENGTH,
        is_address_byte,
        ContractError::InvalidContentAddress,
    )
}

/// An expiration must lie strictly after the current ledger time.
pub fn validate_expiration(env: &Env, expires_at: Option<u64>) -> Result<(), ContractError> {
    match expires_at {
        Some(at) if at <= env.ledger().timestamp() => Err(ContractError::InvalidExpiration),
        _ => Ok(()),
    }
}

/// A caller-supplied creation time may not run ahead of the ledger.
pub fn validate_timestamp(env: &Env, timestamp: u64) -> Result<(), ContractError> {
    if timestamp > env.ledger().timestamp() {
        return Err(ContractError::InvalidTimestamp);
    }
    Ok(())
}

pub fn validate_batch(record_ids: &Vec<String>) -> Result<(), ContractError> {
    if record_ids.is_empty() || record_ids.len() > MAX_BATCH_SIZE {
        return Err(ContractError::BatchTooLarge);
    }
    for id in record_ids.iter() {
        validate_identifier(&id)?;
    }
    Ok(())
}
