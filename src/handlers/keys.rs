//! Key inspection, signing and verification for a single operator key.

use alloy_primitives::keccak256;
use anyhow::{Context, Result};
use serde_json::{Value, json};

use crate::crypto::{G2Point, KeyPair, Signature};

fn key_pair(private_key: &str) -> Result<KeyPair> {
    KeyPair::from_hex(private_key).context("invalid BLS private key")
}

/// Public keys and registry operator id derived from a private key.
///
/// # Errors
///
/// Fails on a malformed private key.
pub fn describe_key(private_key: &str) -> Result<Value> {
    let key_pair = key_pair(private_key)?;
    Ok(json!({
        "operatorId": key_pair.operator_id(),
        "g1PubKey": key_pair.pub_g1(),
        "g2PubKey": key_pair.pub_g2(),
    }))
}

/// Signs the keccak256 digest of `message`.
///
/// # Errors
///
/// Fails on a malformed private key.
pub fn sign(private_key: &str, message: &str) -> Result<Value> {
    let key_pair = key_pair(private_key)?;
    let digest = keccak256(message.as_bytes());
    Ok(json!({
        "digest": digest,
        "signature": key_pair.sign_message(digest.as_slice()),
    }))
}

/// Checks a JSON signature against a JSON G2 key over the keccak256 digest of `message`.
///
/// # Errors
///
/// Fails if either JSON value does not decode to a valid point.
pub fn verify(public_key_g2: &str, message: &str, signature: &str) -> Result<bool> {
    let public_key: G2Point =
        serde_json::from_str(public_key_g2).context("invalid G2 public key")?;
    let signature: Signature = serde_json::from_str(signature).context("invalid signature")?;
    Ok(signature.verify(&public_key, keccak256(message.as_bytes()).as_slice()))
}
