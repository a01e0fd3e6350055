//! Group operations over BLS12-381.
//!
//! Public keys live in G1 (48 bytes compressed) and signatures in G2 (96 bytes
//! compressed). Every deserialization checks that the decoded point is not the
//! point at infinity and belongs to the prime-order subgroup, so points received
//! from untrusted members can be used directly.

use blst::{
    blst_bendian_from_scalar, blst_final_exp, blst_fp12, blst_fp12_is_equal, blst_fr,
    blst_fr_add, blst_fr_from_scalar, blst_fr_from_uint64, blst_fr_inverse, blst_fr_mul,
    blst_fr_sub, blst_hash_to_g2, blst_keygen_v3, blst_miller_loop, blst_p1,
    blst_p1_add_or_double, blst_p1_affine, blst_p1_compress, blst_p1_from_affine,
    blst_p1_in_g1, blst_p1_is_equal, blst_p1_is_inf, blst_p1_mult, blst_p1_to_affine,
    blst_p1_uncompress, blst_p2, blst_p2_add_or_double, blst_p2_affine, blst_p2_compress,
    blst_p2_from_affine, blst_p2_in_g2, blst_p2_is_equal, blst_p2_is_inf, blst_p2_mult,
    blst_p2_to_affine, blst_p2_uncompress, blst_scalar, blst_scalar_fr_check,
    blst_scalar_from_bendian, blst_scalar_from_fr, BLS12_381_G1, BLS12_381_G2, BLST_ERROR,
};
use rand::RngCore;
use std::ptr;
use zeroize::Zeroize;

/// An element of a group (or of the scalar field) that can be added to
/// itself and multiplied by a [Scalar].
pub trait Element: Copy + Clone + Eq + PartialEq + Send + Sync {
    /// Returns the additive identity.
    fn zero() -> Self;

    /// Returns the generator (or multiplicative identity for scalars).
    fn one() -> Self;

    /// Adds to self in-place.
    fn add(&mut self, rhs: &Self);

    /// Multiplies self by a scalar in-place.
    fn mul(&mut self, rhs: &Scalar);

    /// Canonically serializes the element.
    fn serialize(&self) -> Vec<u8>;

    /// Deserializes a canonically encoded element.
    fn deserialize(bytes: &[u8]) -> Option<Self>;

    /// Serialized size of the element.
    fn size() -> usize;
}

/// An element of the BLS12-381 scalar field.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[repr(transparent)]
pub struct Scalar(blst_fr);

/// Length of a serialized [Scalar].
pub const SCALAR_LENGTH: usize = 32;

/// `R = 2^256 mod q` (1 in Montgomery form).
// Reference: https://github.com/filecoin-project/blstrs/blob/ffbb41d1495d84e40a712583346439924603b49a/src/scalar.rs#L77-L89
const BLST_FR_ONE: Scalar = Scalar(blst_fr {
    l: [
        0x0000_0001_ffff_fffe,
        0x5884_b7fa_0003_4802,
        0x998c_4fef_ecbc_4ff5,
        0x1824_b159_acc5_056f,
    ],
});

/// A point on the G1 curve (used for public keys and commitments).
#[derive(Debug, Clone, Copy)]
#[repr(transparent)]
pub struct G1(blst_p1);

/// Length of a compressed [G1] point.
pub const G1_ELEMENT_BYTE_LENGTH: usize = 48;

/// A point on the G2 curve (used for signatures).
#[derive(Debug, Clone, Copy)]
#[repr(transparent)]
pub struct G2(blst_p2);

/// Length of a compressed [G2] point.
pub const G2_ELEMENT_BYTE_LENGTH: usize = 96;

/// Domain separation tag for hashing a message to G2.
pub const DST_G2: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_NUL_";

/// An element of the pairing target group.
#[derive(Debug, Clone, Copy)]
struct GT(blst_fp12);

impl PartialEq for GT {
    fn eq(&self, other: &Self) -> bool {
        unsafe { blst_fp12_is_equal(&self.0, &other.0) }
    }
}

/// Secret key (or secret key share).
pub type Private = Scalar;

/// Public key (or public key share / commitment).
pub type Public = G1;

/// Signature (or partial signature).
pub type Signature = G2;

/// Length of a serialized [Private].
pub const PRIVATE_KEY_LENGTH: usize = SCALAR_LENGTH;

/// Length of a serialized [Public].
pub const PUBLIC_KEY_LENGTH: usize = G1_ELEMENT_BYTE_LENGTH;

/// Length of a serialized [Signature].
pub const SIGNATURE_LENGTH: usize = G2_ELEMENT_BYTE_LENGTH;

/// Returns the number of significant bits of a little-endian `blst_scalar`.
fn bits(scalar: &blst_scalar) -> usize {
    let mut bits = SCALAR_LENGTH * 8;
    for byte in scalar.b.iter().rev() {
        let leading = byte.leading_zeros();
        bits -= leading as usize;
        if leading < 8 {
            break;
        }
    }
    bits
}

impl Scalar {
    /// Generates a random scalar using the provided RNG.
    pub fn rand<R: RngCore>(rng: &mut R) -> Self {
        let mut ikm = [0u8; 64];
        rng.fill_bytes(&mut ikm);

        let mut ret = blst_fr::default();
        unsafe {
            let mut sc = blst_scalar::default();
            blst_keygen_v3(&mut sc, ikm.as_ptr(), ikm.len(), ptr::null(), 0);
            blst_fr_from_scalar(&mut ret, &sc);
        }
        ikm.zeroize();
        Self(ret)
    }

    /// Returns the scalar representing the provided integer.
    pub fn from_u64(i: u64) -> Self {
        // blst reads 4 limbs from the provided buffer.
        let buffer = [i, 0, 0, 0];
        let mut ret = blst_fr::default();
        unsafe { blst_fr_from_uint64(&mut ret, buffer.as_ptr()) };
        Self(ret)
    }

    /// Returns the multiplicative inverse, or `None` for zero.
    pub fn inverse(&self) -> Option<Self> {
        if *self == Self::zero() {
            return None;
        }
        let mut ret = blst_fr::default();
        unsafe { blst_fr_inverse(&mut ret, &self.0) };
        Some(Self(ret))
    }

    /// Subtracts the provided scalar from self in-place.
    pub fn sub(&mut self, rhs: &Self) {
        unsafe { blst_fr_sub(&mut self.0, &self.0, &rhs.0) }
    }

    /// Returns true if the scalar is zero.
    pub fn is_zero(&self) -> bool {
        *self == Self::zero()
    }
}

impl Zeroize for Scalar {
    fn zeroize(&mut self) {
        self.0.l.zeroize();
    }
}

impl Element for Scalar {
    fn zero() -> Self {
        Self(blst_fr::default())
    }

    fn one() -> Self {
        BLST_FR_ONE
    }

    fn add(&mut self, rhs: &Self) {
        unsafe { blst_fr_add(&mut self.0, &self.0, &rhs.0) }
    }

    fn mul(&mut self, rhs: &Self) {
        unsafe { blst_fr_mul(&mut self.0, &self.0, &rhs.0) }
    }

    fn serialize(&self) -> Vec<u8> {
        let mut bytes = [0u8; SCALAR_LENGTH];
        unsafe {
            let mut scalar = blst_scalar::default();
            blst_scalar_from_fr(&mut scalar, &self.0);
            blst_bendian_from_scalar(bytes.as_mut_ptr(), &scalar);
        }
        bytes.to_vec()
    }

    fn deserialize(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != SCALAR_LENGTH {
            return None;
        }
        let mut ret = blst_fr::default();
        unsafe {
            let mut scalar = blst_scalar::default();
            blst_scalar_from_bendian(&mut scalar, bytes.as_ptr());
            if !blst_scalar_fr_check(&scalar) {
                return None;
            }
            blst_fr_from_scalar(&mut ret, &scalar);
        }
        Some(Self(ret))
    }

    fn size() -> usize {
        SCALAR_LENGTH
    }
}

impl PartialEq for G1 {
    fn eq(&self, other: &Self) -> bool {
        unsafe { blst_p1_is_equal(&self.0, &other.0) }
    }
}

impl Eq for G1 {}

impl Element for G1 {
    fn zero() -> Self {
        Self(blst_p1::default())
    }

    fn one() -> Self {
        let mut ret = blst_p1::default();
        unsafe { blst_p1_from_affine(&mut ret, &BLS12_381_G1) };
        Self(ret)
    }

    fn add(&mut self, rhs: &Self) {
        unsafe { blst_p1_add_or_double(&mut self.0, &self.0, &rhs.0) }
    }

    fn mul(&mut self, rhs: &Scalar) {
        let mut scalar = blst_scalar::default();
        unsafe { blst_scalar_from_fr(&mut scalar, &rhs.0) };
        let nbits = bits(&scalar);
        if nbits == 0 {
            *self = Self::zero();
            return;
        }
        unsafe { blst_p1_mult(&mut self.0, &self.0, scalar.b.as_ptr(), nbits) }
    }

    fn serialize(&self) -> Vec<u8> {
        let mut bytes = [0u8; G1_ELEMENT_BYTE_LENGTH];
        unsafe { blst_p1_compress(bytes.as_mut_ptr(), &self.0) };
        bytes.to_vec()
    }

    fn deserialize(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != G1_ELEMENT_BYTE_LENGTH {
            return None;
        }
        let mut ret = blst_p1::default();
        unsafe {
            let mut affine = blst_p1_affine::default();
            if blst_p1_uncompress(&mut affine, bytes.as_ptr()) != BLST_ERROR::BLST_SUCCESS {
                return None;
            }
            blst_p1_from_affine(&mut ret, &affine);
            if blst_p1_is_inf(&ret) || !blst_p1_in_g1(&ret) {
                return None;
            }
        }
        Some(Self(ret))
    }

    fn size() -> usize {
        G1_ELEMENT_BYTE_LENGTH
    }
}

impl PartialEq for G2 {
    fn eq(&self, other: &Self) -> bool {
        unsafe { blst_p2_is_equal(&self.0, &other.0) }
    }
}

impl Eq for G2 {}

impl G2 {
    /// Maps the provided message to a point on G2 (using [DST_G2]).
    pub fn map(message: &[u8]) -> Self {
        let mut ret = blst_p2::default();
        unsafe {
            blst_hash_to_g2(
                &mut ret,
                message.as_ptr(),
                message.len(),
                DST_G2.as_ptr(),
                DST_G2.len(),
                ptr::null(),
                0,
            );
        }
        Self(ret)
    }
}

impl Element for G2 {
    fn zero() -> Self {
        Self(blst_p2::default())
    }

    fn one() -> Self {
        let mut ret = blst_p2::default();
        unsafe { blst_p2_from_affine(&mut ret, &BLS12_381_G2) };
        Self(ret)
    }

    fn add(&mut self, rhs: &Self) {
        unsafe { blst_p2_add_or_double(&mut self.0, &self.0, &rhs.0) }
    }

    fn mul(&mut self, rhs: &Scalar) {
        let mut scalar = blst_scalar::default();
        unsafe { blst_scalar_from_fr(&mut scalar, &rhs.0) };
        let nbits = bits(&scalar);
        if nbits == 0 {
            *self = Self::zero();
            return;
        }
        unsafe { blst_p2_mult(&mut self.0, &self.0, scalar.b.as_ptr(), nbits) }
    }

    fn serialize(&self) -> Vec<u8> {
        let mut bytes = [0u8; G2_ELEMENT_BYTE_LENGTH];
        unsafe { blst_p2_compress(bytes.as_mut_ptr(), &self.0) };
        bytes.to_vec()
    }

    fn deserialize(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != G2_ELEMENT_BYTE_LENGTH {
            return None;
        }
        let mut ret = blst_p2::default();
        unsafe {
            let mut affine = blst_p2_affine::default();
            if blst_p2_uncompress(&mut affine, bytes.as_ptr()) != BLST_ERROR::BLST_SUCCESS {
                return None;
            }
            blst_p2_from_affine(&mut ret, &affine);
            if blst_p2_is_inf(&ret) || !blst_p2_in_g2(&ret) {
                return None;
            }
        }
        Some(Self(ret))
    }

    fn size() -> usize {
        G2_ELEMENT_BYTE_LENGTH
    }
}

fn pairing(p: &G1, q: &G2) -> GT {
    // Reference: https://github.com/MystenLabs/fastcrypto/blob/bd4999bd3e901eab34ae3dd96dbe38b86ac646a7/fastcrypto/src/groups/bls12381.rs#L223-L234
    let mut pa = blst_p1_affine::default();
    let mut qa = blst_p2_affine::default();
    let mut res = blst_fp12::default();
    unsafe {
        blst_p1_to_affine(&mut pa, &p.0);
        blst_p2_to_affine(&mut qa, &q.0);
        blst_miller_loop(&mut res, &qa, &pa);
        blst_final_exp(&mut res, &res);
    }
    GT(res)
}

/// Checks `e(G1, sig) == e(public, hm)`.
pub(super) fn equal(public: &G1, sig: &G2, hm: &G2) -> bool {
    pairing(&G1::one(), sig) == pairing(public, hm)
}
