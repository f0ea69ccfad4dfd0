//! BN254 curve arithmetic and the BLS signature scheme built on top of it.

pub mod bls;
pub mod bn254;

pub use bls::{
    KeyPair, PrivateKey, Signature, aggregate_pub_keys_g1, aggregate_pub_keys_g2,
    aggregate_signatures, operator_id_from_g1,
};
pub use bn254::{G1Point, G2CoordinateOrder, G2Point, map_to_curve, verify_equivalence};

use thiserror::Error;

/// Errors raised when decoding or constructing curve values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid field element: {0}")]
    InvalidFieldElement(String),

    #[error("point is not on the curve or not in the prime-order subgroup")]
    InvalidPoint,

    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("point encoding error: {0}")]
    Encoding(String),
}
