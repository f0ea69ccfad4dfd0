//! BLS signatures over BN254 with signatures in G1 and verification keys in G2.

use std::fmt;

use alloy_primitives::{B256, U256, hex, keccak256};
use ark_bn254::Fr;
use ark_ff::{BigInt, PrimeField, Zero};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::CryptoError;
use super::bn254::{G1Point, G2Point, fq_to_u256, map_to_curve, pairing_eq};
use crate::types::OperatorId;

/// Secret scalar of a BLS key.
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey(Fr);

impl PrivateKey {
    /// Parses a hex scalar (optionally `0x`-prefixed, at most 64 digits).
    ///
    /// # Errors
    ///
    /// Rejects empty or over-long strings, non-hex input, zero, and values not below the
    /// scalar field order.
    pub fn from_hex(value: &str) -> Result<Self, CryptoError> {
        let digits = value
            .strip_prefix("0x")
            .or_else(|| value.strip_prefix("0X"))
            .unwrap_or(value);
        if digits.is_empty() || digits.len() > 64 {
            return Err(CryptoError::InvalidPrivateKey(format!(
                "expected 1 to 64 hex digits, got {}",
                digits.len()
            )));
        }
        let scalar = U256::from_str_radix(digits, 16)
            .map_err(|e| CryptoError::InvalidPrivateKey(e.to_string()))?;
        Self::from_u256(scalar)
    }

    /// Reads a 32-byte big-endian scalar.
    ///
    /// # Errors
    ///
    /// Rejects any other length, zero, and values not below the scalar field order.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let bytes: [u8; 32] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidPrivateKey(format!("expected 32 bytes, got {}", bytes.len()))
        })?;
        Self::from_u256(U256::from_be_bytes(bytes))
    }

    fn from_u256(value: U256) -> Result<Self, CryptoError> {
        let scalar = Fr::from_bigint(BigInt::new(value.into_limbs())).ok_or_else(|| {
            CryptoError::InvalidPrivateKey("scalar is not below the group order".to_string())
        })?;
        if scalar.is_zero() {
            return Err(CryptoError::InvalidPrivateKey("scalar is zero".to_string()));
        }
        Ok(Self(scalar))
    }

    /// Draws a fresh non-zero scalar.
    pub fn random() -> Self {
        loop {
            let bytes: [u8; 32] = rand::random();
            let scalar = Fr::from_be_bytes_mod_order(&bytes);
            if !scalar.is_zero() {
                return Self(scalar);
            }
        }
    }

    /// 64 lowercase hex digits, zero padded.
    pub fn to_hex(&self) -> String {
        hex::encode(U256::from_limbs(self.0.into_bigint().0).to_be_bytes::<32>())
    }

    pub const fn scalar(&self) -> &Fr {
        &self.0
    }
}

impl From<Fr> for PrivateKey {
    fn from(scalar: Fr) -> Self {
        Self(scalar)
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(..)")
    }
}

/// A private key together with its G1 and G2 public keys.
#[derive(Clone, Debug)]
pub struct KeyPair {
    priv_key: PrivateKey,
    pub_g1: G1Point,
    pub_g2: G2Point,
}

impl KeyPair {
    /// Derives `sk·G1` and `sk·G2`. The same scalar always yields the same pair.
    pub fn new(priv_key: PrivateKey) -> Self {
        let pub_g1 = G1Point::generator().mul(priv_key.scalar());
        let pub_g2 = G2Point::generator().mul(priv_key.scalar());
        Self {
            priv_key,
            pub_g1,
            pub_g2,
        }
    }

    /// # Errors
    ///
    /// See [`PrivateKey::from_hex`].
    pub fn from_hex(value: &str) -> Result<Self, CryptoError> {
        PrivateKey::from_hex(value).map(Self::new)
    }

    pub fn random() -> Self {
        Self::new(PrivateKey::random())
    }

    /// Signs a message digest: `sk · H(message)`.
    pub fn sign_message(&self, message: &[u8]) -> Signature {
        self.sign_hashed_to_curve_message(&map_to_curve(message))
    }

    pub fn sign_hashed_to_curve_message(&self, point: &G1Point) -> Signature {
        Signature(point.mul(self.priv_key.scalar()))
    }

    pub const fn priv_key(&self) -> &PrivateKey {
        &self.priv_key
    }

    pub const fn pub_g1(&self) -> &G1Point {
        &self.pub_g1
    }

    pub const fn pub_g2(&self) -> &G2Point {
        &self.pub_g2
    }

    /// Registry id derived from the G1 public key.
    pub fn operator_id(&self) -> OperatorId {
        operator_id_from_g1(&self.pub_g1)
    }
}

/// A BLS signature, a point on G1.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Signature(G1Point);

impl Signature {
    pub fn zero() -> Self {
        Self(G1Point::zero())
    }

    /// # Errors
    ///
    /// Fails on malformed coordinates or an invalid point.
    pub fn from_strs(x: &str, y: &str) -> Result<Self, CryptoError> {
        G1Point::from_strs(x, y).map(Self)
    }

    #[must_use]
    pub fn add(&self, other: &Self) -> Self {
        Self(self.0.add(&other.0))
    }

    /// Checks `e(H(message), pubkey) == e(self, G2)`.
    ///
    /// The identity key is never accepted: it would validate the identity signature for
    /// any message.
    pub fn verify(&self, pubkey: &G2Point, message: &[u8]) -> bool {
        if pubkey.is_zero() {
            return false;
        }
        pairing_eq(
            &map_to_curve(message),
            pubkey,
            &self.0,
            &G2Point::generator(),
        )
    }

    pub const fn point(&self) -> &G1Point {
        &self.0
    }
}

impl From<G1Point> for Signature {
    fn from(point: G1Point) -> Self {
        Self(point)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        G1Point::deserialize(deserializer).map(Self)
    }
}

pub fn aggregate_signatures<'a>(signatures: impl IntoIterator<Item = &'a Signature>) -> Signature {
    signatures
        .into_iter()
        .fold(Signature::zero(), |acc, sig| acc.add(sig))
}

pub fn aggregate_pub_keys_g1<'a>(keys: impl IntoIterator<Item = &'a G1Point>) -> G1Point {
    keys.into_iter()
        .fold(G1Point::zero(), |acc, key| acc.add(key))
}

pub fn aggregate_pub_keys_g2<'a>(keys: impl IntoIterator<Item = &'a G2Point>) -> G2Point {
    keys.into_iter()
        .fold(G2Point::zero(), |acc, key| acc.add(key))
}

/// `keccak256(x || y)` over the 32-byte big-endian coordinates of a G1 key.
pub fn operator_id_from_g1(pubkey: &G1Point) -> B256 {
    let (x, y) = pubkey.coordinates();
    let mut encoded = [0u8; 64];
    let (x_bytes, y_bytes) = encoded.split_at_mut(32);
    x_bytes.copy_from_slice(&fq_to_u256(&x).to_be_bytes::<32>());
    y_bytes.copy_from_slice(&fq_to_u256(&y).to_be_bytes::<32>());
    keccak256(encoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest(text: &str) -> B256 {
        keccak256(text.as_bytes())
    }

    #[test]
    fn test_private_key_hex_round_trip() {
        let hex_key = "0000000000000000000000000000000000000000000000000000000012345678";
        let key = PrivateKey::from_hex(hex_key).unwrap();
        assert_eq!(key.to_hex(), hex_key);
        assert_eq!(PrivateKey::from_hex("0x12345678").unwrap(), key);
        assert_eq!(PrivateKey::from_hex("12345678").unwrap(), key);
    }

    #[test]
    fn test_private_key_rejects_malformed_input() {
        assert!(PrivateKey::from_hex("").is_err());
        assert!(PrivateKey::from_hex("0").is_err());
        assert!(PrivateKey::from_hex("zz").is_err());
        assert!(PrivateKey::from_hex(&"1".repeat(65)).is_err());
        // The scalar field order itself.
        assert!(
            PrivateKey::from_hex(
                "30644e72e131a029b85045b68181585d2833e84879b9709143e1f593f0000001"
            )
            .is_err()
        );
        assert!(PrivateKey::from_bytes(&[1u8; 31]).is_err());
        assert!(PrivateKey::from_bytes(&[1u8; 33]).is_err());

        let mut bytes = [0u8; 32];
        bytes[31] = 1;
        assert_eq!(
            PrivateKey::from_bytes(&bytes).unwrap(),
            PrivateKey::from_hex("01").unwrap()
        );
    }

    #[test]
    fn test_key_derivation_is_deterministic() {
        let first = KeyPair::from_hex("01").unwrap();
        assert_eq!(first.pub_g1(), &G1Point::generator());
        assert_eq!(first.pub_g2(), &G2Point::generator());

        let a = KeyPair::from_hex("abcdef").unwrap();
        let b = KeyPair::from_hex("0xabcdef").unwrap();
        assert_eq!(a.pub_g1(), b.pub_g1());
        assert_eq!(a.pub_g2(), b.pub_g2());
        assert!(a.pub_g1().verify_equivalence(a.pub_g2()));
    }

    #[test]
    fn test_sign_and_verify() {
        let key = KeyPair::from_hex("02").unwrap();
        let message = digest("sample text response");
        let signature = key.sign_message(message.as_slice());
        assert!(signature.verify(key.pub_g2(), message.as_slice()));

        let other = KeyPair::from_hex("03").unwrap();
        assert!(!signature.verify(other.pub_g2(), message.as_slice()));
        assert!(!signature.verify(key.pub_g2(), digest("another response").as_slice()));
    }

    #[test]
    fn test_verify_rejects_identity_key() {
        let message = digest("anything");
        assert!(!Signature::zero().verify(&G2Point::zero(), message.as_slice()));
    }

    #[test]
    fn test_aggregation_is_order_independent() {
        let message = digest("aggregate me");
        let keys: Vec<KeyPair> = ["01", "02", "03", "04"]
            .iter()
            .map(|k| KeyPair::from_hex(k).unwrap())
            .collect();
        let sigs: Vec<Signature> = keys
            .iter()
            .map(|k| k.sign_message(message.as_slice()))
            .collect();

        let forward = aggregate_signatures(&sigs);
        let backward = aggregate_signatures(sigs.iter().rev());
        let shuffled = aggregate_signatures([&sigs[2], &sigs[0], &sigs[3], &sigs[1]]);
        assert_eq!(forward, backward);
        assert_eq!(forward, shuffled);

        let apk = aggregate_pub_keys_g2(keys.iter().map(KeyPair::pub_g2));
        let apk_rev = aggregate_pub_keys_g2(keys.iter().rev().map(KeyPair::pub_g2));
        assert_eq!(apk, apk_rev);
        assert!(forward.verify(&apk, message.as_slice()));

        let apk_g1 = aggregate_pub_keys_g1(keys.iter().map(KeyPair::pub_g1));
        assert!(apk_g1.verify_equivalence(&apk));
    }

    #[test]
    fn test_empty_aggregation_is_identity() {
        let no_sigs: [Signature; 0] = [];
        let no_g1: [G1Point; 0] = [];
        let no_g2: [G2Point; 0] = [];
        assert_eq!(aggregate_signatures(&no_sigs), Signature::zero());
        assert!(aggregate_pub_keys_g1(&no_g1).is_zero());
        assert!(aggregate_pub_keys_g2(&no_g2).is_zero());
    }

    #[test]
    fn test_signature_json() {
        let key = KeyPair::from_hex("05").unwrap();
        let signature = key.sign_message(digest("json").as_slice());
        let json = serde_json::to_value(signature).unwrap();
        let (x, y) = signature.point().to_tuple();
        assert_eq!(json["x"], x.to_string());
        assert_eq!(json["y"], y.to_string());
        let back: Signature = serde_json::from_value(json).unwrap();
        assert_eq!(back, signature);
    }

    #[test]
    fn test_operator_id_from_generator() {
        let mut encoded = [0u8; 64];
        encoded[31] = 1;
        encoded[63] = 2;
        assert_eq!(operator_id_from_g1(&G1Point::generator()), keccak256(encoded));
        assert_eq!(
            KeyPair::from_hex("01").unwrap().operator_id(),
            keccak256(encoded)
        );
    }
}
