//! Group arithmetic over BN254 (alt_bn128), the curve behind the EVM pairing precompiles.
//!
//! Points are kept in affine form. The identity travels on the wire as all-zero
//! coordinates, every other point must be on the curve and inside the prime-order
//! subgroup before it is accepted.

use std::fmt;

use alloy_primitives::U256;
use ark_bn254::{Bn254, Fq, Fq2, Fr, G1Affine, G1Projective, G2Affine, G2Projective};
use ark_ec::{AffineRepr, CurveGroup, pairing::Pairing};
use ark_ff::{BigInt, Field, One, PrimeField, Zero};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use super::CryptoError;
use crate::types::parse_u256;

/// `(p + 1) / 4` as little-endian limbs, the square-root exponent used by `map_to_curve`.
const SQRT_EXPONENT: [u64; 4] = [
    0x4f08_2305_b61f_3f52,
    0x65e0_5aa4_5a1c_72a3,
    0x6e14_116d_a060_5617,
    0x0c19_139c_b84c_680a,
];

/// Curve constant `b` in `y^2 = x^3 + b`.
const CURVE_B: u64 = 3;

/// Parses a base-field element from a decimal or `0x`-prefixed hex string.
///
/// # Errors
///
/// Fails if the string is not a number or the value is not below the field modulus.
pub fn fq_from_str(value: &str) -> Result<Fq, CryptoError> {
    let parsed =
        parse_u256(value).ok_or_else(|| CryptoError::InvalidFieldElement(value.to_string()))?;
    Fq::from_bigint(BigInt::new(parsed.into_limbs()))
        .ok_or_else(|| CryptoError::InvalidFieldElement(value.to_string()))
}

/// Canonical integer value of a base-field element.
pub fn fq_to_u256(value: &Fq) -> U256 {
    U256::from_limbs(value.into_bigint().0)
}

/// Decimal string encoding of a base-field element.
pub fn fq_to_string(value: &Fq) -> String {
    fq_to_u256(value).to_string()
}

/// A point on the G1 group of BN254.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct G1Point(G1Affine);

impl G1Point {
    /// The identity element, used to seed aggregations.
    pub fn zero() -> Self {
        Self(G1Affine::zero())
    }

    /// The fixed generator `(1, 2)`.
    pub fn generator() -> Self {
        Self(G1Affine::generator())
    }

    /// Builds a point from affine coordinates. `(0, 0)` yields the identity.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidPoint`] if the coordinates do not describe a
    /// point of the prime-order subgroup.
    pub fn from_coordinates(x: Fq, y: Fq) -> Result<Self, CryptoError> {
        if x.is_zero() && y.is_zero() {
            return Ok(Self::zero());
        }
        let point = G1Affine::new_unchecked(x, y);
        if !point.is_on_curve() || !point.is_in_correct_subgroup_assuming_on_curve() {
            return Err(CryptoError::InvalidPoint);
        }
        Ok(Self(point))
    }

    /// Builds a point from decimal or hex coordinate strings.
    ///
    /// # Errors
    ///
    /// Fails on malformed numbers, values outside the field, or off-curve points.
    pub fn from_strs(x: &str, y: &str) -> Result<Self, CryptoError> {
        Self::from_coordinates(fq_from_str(x)?, fq_from_str(y)?)
    }

    /// Affine coordinates, `(0, 0)` for the identity.
    pub fn coordinates(&self) -> (Fq, Fq) {
        if self.0.infinity {
            (Fq::zero(), Fq::zero())
        } else {
            (self.0.x, self.0.y)
        }
    }

    pub fn is_zero(&self) -> bool {
        self.0.infinity
    }

    #[must_use]
    pub fn add(&self, other: &Self) -> Self {
        Self((G1Projective::from(self.0) + G1Projective::from(other.0)).into_affine())
    }

    #[must_use]
    pub fn sub(&self, other: &Self) -> Self {
        Self((G1Projective::from(self.0) - G1Projective::from(other.0)).into_affine())
    }

    #[must_use]
    pub fn neg(&self) -> Self {
        Self(-self.0)
    }

    #[must_use]
    pub fn mul(&self, scalar: &Fr) -> Self {
        Self((G1Projective::from(self.0) * scalar).into_affine())
    }

    /// The `(x, y)` pair in the layout the on-chain `BN254.G1Point` struct expects.
    pub fn to_tuple(&self) -> (U256, U256) {
        let (x, y) = self.coordinates();
        (fq_to_u256(&x), fq_to_u256(&y))
    }

    /// Compressed 32-byte encoding.
    ///
    /// # Errors
    ///
    /// Propagates serializer failures.
    pub fn to_compressed(&self) -> Result<Vec<u8>, CryptoError> {
        let mut bytes = Vec::with_capacity(self.0.compressed_size());
        self.0
            .serialize_compressed(&mut bytes)
            .map_err(|e| CryptoError::Encoding(e.to_string()))?;
        Ok(bytes)
    }

    /// Decodes and validates a compressed point.
    ///
    /// # Errors
    ///
    /// Fails if the bytes do not encode a valid subgroup point.
    pub fn from_compressed(bytes: &[u8]) -> Result<Self, CryptoError> {
        G1Affine::deserialize_compressed(bytes)
            .map(Self)
            .map_err(|e| CryptoError::Encoding(e.to_string()))
    }

    /// Checks `e(self, G2) == e(G1, other)`, i.e. both points share one discrete log.
    pub fn verify_equivalence(&self, other: &G2Point) -> bool {
        verify_equivalence(self, other)
    }

    pub(crate) const fn inner(&self) -> &G1Affine {
        &self.0
    }
}

impl Default for G1Point {
    fn default() -> Self {
        Self::zero()
    }
}

impl fmt::Display for G1Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (x, y) = self.coordinates();
        write!(f, "G1({}, {})", fq_to_string(&x), fq_to_string(&y))
    }
}

/// Wire form of a G1 point: decimal coordinates.
#[derive(Serialize, Deserialize)]
struct G1Wire {
    x: String,
    y: String,
}

impl Serialize for G1Point {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let (x, y) = self.coordinates();
        G1Wire {
            x: fq_to_string(&x),
            y: fq_to_string(&y),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for G1Point {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = G1Wire::deserialize(deserializer)?;
        Self::from_strs(&wire.x, &wire.y).map_err(de::Error::custom)
    }
}

/// Component order used when flattening a G2 point into integers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum G2CoordinateOrder {
    /// Real part first.
    #[default]
    Ab,
    /// Imaginary part first, the order of the EVM pairing precompile.
    Ba,
}

/// A point on the G2 group of BN254. Coordinates live in `Fq2 = a + b·u`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct G2Point(G2Affine);

impl G2Point {
    pub fn zero() -> Self {
        Self(G2Affine::zero())
    }

    pub fn generator() -> Self {
        Self(G2Affine::generator())
    }

    /// Builds a point from `x = xa + xb·u`, `y = ya + yb·u`. All zeros yield the identity.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidPoint`] for anything outside the prime-order subgroup.
    pub fn from_coordinates(xa: Fq, xb: Fq, ya: Fq, yb: Fq) -> Result<Self, CryptoError> {
        if xa.is_zero() && xb.is_zero() && ya.is_zero() && yb.is_zero() {
            return Ok(Self::zero());
        }
        let point = G2Affine::new_unchecked(Fq2::new(xa, xb), Fq2::new(ya, yb));
        if !point.is_on_curve() || !point.is_in_correct_subgroup_assuming_on_curve() {
            return Err(CryptoError::InvalidPoint);
        }
        Ok(Self(point))
    }

    /// # Errors
    ///
    /// Fails on malformed numbers, values outside the field, or invalid points.
    pub fn from_strs(xa: &str, xb: &str, ya: &str, yb: &str) -> Result<Self, CryptoError> {
        Self::from_coordinates(
            fq_from_str(xa)?,
            fq_from_str(xb)?,
            fq_from_str(ya)?,
            fq_from_str(yb)?,
        )
    }

    /// `(x, y)` as `Fq2` elements, zero for the identity.
    pub fn coordinates(&self) -> (Fq2, Fq2) {
        if self.0.infinity {
            (Fq2::zero(), Fq2::zero())
        } else {
            (self.0.x, self.0.y)
        }
    }

    pub fn is_zero(&self) -> bool {
        self.0.infinity
    }

    #[must_use]
    pub fn add(&self, other: &Self) -> Self {
        Self((G2Projective::from(self.0) + G2Projective::from(other.0)).into_affine())
    }

    #[must_use]
    pub fn sub(&self, other: &Self) -> Self {
        Self((G2Projective::from(self.0) - G2Projective::from(other.0)).into_affine())
    }

    #[must_use]
    pub fn neg(&self) -> Self {
        Self(-self.0)
    }

    #[must_use]
    pub fn mul(&self, scalar: &Fr) -> Self {
        Self((G2Projective::from(self.0) * scalar).into_affine())
    }

    /// Flattens the point into `([x0, x1], [y0, y1])` in the requested component order.
    pub fn to_tuple(&self, order: G2CoordinateOrder) -> ([U256; 2], [U256; 2]) {
        let (x, y) = self.coordinates();
        let pair = |v: Fq2| match order {
            G2CoordinateOrder::Ab => [fq_to_u256(&v.c0), fq_to_u256(&v.c1)],
            G2CoordinateOrder::Ba => [fq_to_u256(&v.c1), fq_to_u256(&v.c0)],
        };
        (pair(x), pair(y))
    }

    /// # Errors
    ///
    /// Propagates serializer failures.
    pub fn to_compressed(&self) -> Result<Vec<u8>, CryptoError> {
        let mut bytes = Vec::with_capacity(self.0.compressed_size());
        self.0
            .serialize_compressed(&mut bytes)
            .map_err(|e| CryptoError::Encoding(e.to_string()))?;
        Ok(bytes)
    }

    /// # Errors
    ///
    /// Fails if the bytes do not encode a valid subgroup point.
    pub fn from_compressed(bytes: &[u8]) -> Result<Self, CryptoError> {
        G2Affine::deserialize_compressed(bytes)
            .map(Self)
            .map_err(|e| CryptoError::Encoding(e.to_string()))
    }

    pub fn verify_equivalence(&self, other: &G1Point) -> bool {
        verify_equivalence(other, self)
    }

    pub(crate) const fn inner(&self) -> &G2Affine {
        &self.0
    }
}

impl Default for G2Point {
    fn default() -> Self {
        Self::zero()
    }
}

impl fmt::Display for G2Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (x, y) = self.coordinates();
        write!(
            f,
            "G2(({}, {}), ({}, {}))",
            fq_to_string(&x.c0),
            fq_to_string(&x.c1),
            fq_to_string(&y.c0),
            fq_to_string(&y.c1)
        )
    }
}

#[derive(Serialize, Deserialize)]
struct G2Wire {
    x: [String; 2],
    y: [String; 2],
}

impl Serialize for G2Point {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let (x, y) = self.coordinates();
        G2Wire {
            x: [fq_to_string(&x.c0), fq_to_string(&x.c1)],
            y: [fq_to_string(&y.c0), fq_to_string(&y.c1)],
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for G2Point {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let G2Wire {
            x: [xa, xb],
            y: [ya, yb],
        } = G2Wire::deserialize(deserializer)?;
        Self::from_strs(&xa, &xb, &ya, &yb).map_err(de::Error::custom)
    }
}

/// Returns true when `e(a, b) == e(c, d)`.
pub fn pairing_eq(a: &G1Point, b: &G2Point, c: &G1Point, d: &G2Point) -> bool {
    Bn254::pairing(*a.inner(), *b.inner()) == Bn254::pairing(*c.inner(), *d.inner())
}

/// Checks that a G1 and a G2 point are multiples of their generators by the same scalar.
pub fn verify_equivalence(g1: &G1Point, g2: &G2Point) -> bool {
    pairing_eq(g1, &G2Point::generator(), &G1Point::generator(), g2)
}

/// Try-and-increment hash-to-curve.
///
/// The message is read as a big-endian integer and reduced into the base field to get the
/// first candidate `x`. For each candidate, `beta = x^3 + 3` and `y = beta^((p+1)/4)`; the
/// first `x` for which `y^2 == beta` is returned. Every party signing or verifying the same
/// digest must land on exactly this point.
pub fn map_to_curve(message: &[u8]) -> G1Point {
    let b = Fq::from(CURVE_B);
    let mut x = Fq::from_be_bytes_mod_order(message);
    loop {
        let beta = x.square() * x + b;
        let y = beta.pow(SQRT_EXPONENT);
        if y.square() == beta {
            return G1Point(G1Affine::new_unchecked(x, y));
        }
        x += Fq::one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FQ_MODULUS: &str =
        "21888242871839275222246405745257275088696311157297823662689037894645226208583";

    #[test]
    fn test_generator_coordinates() {
        let (x, y) = G1Point::generator().coordinates();
        assert_eq!(fq_to_string(&x), "1");
        assert_eq!(fq_to_string(&y), "2");

        let g2 = G2Point::from_strs(
            "0x1800deef121f1e76426a00665e5c4479674322d4f75edadd46debd5cd992f6ed",
            "0x198e9393920d483a7260bfb731fb5d25f1aa493335a9e71297e485b7aef312c2",
            "0x12c85ea5db8c6deb4aab71808dcb408fe3d1e7690c43d37b4ce6cc0166fa7daa",
            "0x090689d0585ff075ec9e99ad690c3395bc4b313370b38ef355acdadcd122975b",
        )
        .unwrap();
        assert_eq!(g2, G2Point::generator());
    }

    #[test]
    fn test_zero_coordinates_are_identity() {
        let zero = G1Point::from_strs("0", "0").unwrap();
        assert!(zero.is_zero());
        assert_eq!(zero, G1Point::zero());
        assert_eq!(zero.coordinates(), (Fq::zero(), Fq::zero()));

        let zero = G2Point::from_strs("0", "0", "0", "0").unwrap();
        assert!(zero.is_zero());

        let g = G1Point::generator();
        assert_eq!(g.add(&G1Point::zero()), g);
        assert_eq!(g.sub(&g), G1Point::zero());
    }

    #[test]
    fn test_rejects_off_curve_points() {
        assert_eq!(G1Point::from_strs("1", "3"), Err(CryptoError::InvalidPoint));
        assert_eq!(
            G2Point::from_strs("1", "2", "3", "4"),
            Err(CryptoError::InvalidPoint)
        );
    }

    #[test]
    fn test_rejects_out_of_range_coordinates() {
        assert!(matches!(
            fq_from_str(FQ_MODULUS),
            Err(CryptoError::InvalidFieldElement(_))
        ));
        assert!(matches!(
            fq_from_str("not a number"),
            Err(CryptoError::InvalidFieldElement(_))
        ));
        assert!(matches!(
            fq_from_str(""),
            Err(CryptoError::InvalidFieldElement(_))
        ));
    }

    #[test]
    fn test_coordinate_strings_round_trip() {
        let point = G1Point::generator().mul(&Fr::from(123_456_789u64));
        let (x, y) = point.coordinates();
        let decimal = G1Point::from_strs(&fq_to_string(&x), &fq_to_string(&y)).unwrap();
        assert_eq!(decimal, point);

        let (hx, hy) = point.to_tuple();
        let to_hex = |v: U256| format!("0x{}", alloy_primitives::hex::encode(v.to_be_bytes::<32>()));
        let hex = G1Point::from_strs(&to_hex(hx), &to_hex(hy)).unwrap();
        assert_eq!(hex, point);
    }

    #[test]
    fn test_pairing_bilinearity() {
        let a = Fr::from(7u64);
        let p = G1Point::generator().mul(&Fr::from(11u64));
        let q = G2Point::generator().mul(&Fr::from(13u64));
        assert!(pairing_eq(&p.mul(&a), &q, &p, &q.mul(&a)));
        assert!(!pairing_eq(&p.mul(&a), &q, &p, &q));
    }

    #[test]
    fn test_verify_equivalence() {
        let scalar = Fr::from(42u64);
        let g1 = G1Point::generator().mul(&scalar);
        let g2 = G2Point::generator().mul(&scalar);
        assert!(g1.verify_equivalence(&g2));
        assert!(g2.verify_equivalence(&g1));
        assert!(!g1.verify_equivalence(&G2Point::generator()));
    }

    #[test]
    fn test_map_to_curve_known_points() {
        // x = 1 is already on the curve with y = 2.
        let mut one = [0u8; 32];
        one[31] = 1;
        assert_eq!(map_to_curve(&one), G1Point::generator());

        // x = 0 has no root, the next candidate is x = 1.
        assert_eq!(map_to_curve(&[0u8; 32]), G1Point::generator());

        let mut two = [0u8; 32];
        two[31] = 2;
        let expected = G1Point::from_strs(
            "2",
            "16059845205665218889595687631975406613746683471807856151558479858750240882195",
        )
        .unwrap();
        assert_eq!(map_to_curve(&two), expected);
    }

    #[test]
    fn test_map_to_curve_reduces_modulo_field() {
        // p + 5 reduces to x = 5, which is on the curve.
        let above_modulus: [u8; 32] = alloy_primitives::hex::decode(
            "30644e72e131a029b85045b68181585d97816a916871ca8d3c208c16d87cfd4c",
        )
        .unwrap()
        .try_into()
        .unwrap();
        let expected = G1Point::from_strs(
            "5",
            "12018145221906193280709297956955491909525805305027991674545581949749903546958",
        )
        .unwrap();
        assert_eq!(map_to_curve(&above_modulus), expected);
    }

    #[test]
    fn test_compressed_round_trip() {
        let g1 = G1Point::generator().mul(&Fr::from(99u64));
        assert_eq!(
            G1Point::from_compressed(&g1.to_compressed().unwrap()).unwrap(),
            g1
        );
        let g2 = G2Point::generator().mul(&Fr::from(99u64));
        assert_eq!(
            G2Point::from_compressed(&g2.to_compressed().unwrap()).unwrap(),
            g2
        );
        assert!(G1Point::from_compressed(&[0xffu8; 32]).is_err());
    }

    #[test]
    fn test_g2_tuple_order() {
        let g2 = G2Point::generator();
        let (ab_x, ab_y) = g2.to_tuple(G2CoordinateOrder::Ab);
        let (ba_x, ba_y) = g2.to_tuple(G2CoordinateOrder::Ba);
        assert_eq!(ab_x, [ba_x[1], ba_x[0]]);
        assert_eq!(ab_y, [ba_y[1], ba_y[0]]);
    }

    #[test]
    fn test_json_encoding() {
        let json = serde_json::to_value(G1Point::generator()).unwrap();
        assert_eq!(json, serde_json::json!({ "x": "1", "y": "2" }));
        let back: G1Point = serde_json::from_value(json).unwrap();
        assert_eq!(back, G1Point::generator());

        let g2 = G2Point::generator().mul(&Fr::from(5u64));
        let back: G2Point = serde_json::from_str(&serde_json::to_string(&g2).unwrap()).unwrap();
        assert_eq!(back, g2);

        let bad = serde_json::json!({ "x": "1", "y": "3" });
        assert!(serde_json::from_value::<G1Point>(bad).is_err());
    }
}
