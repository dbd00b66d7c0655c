use std::ops::Mul;

use num::BigUint;
use serde::{Deserialize, Serialize};

use crate::crypto::dlog::discrete_log;
use crate::crypto::group::{g_pow_p, mult_p, rand_range_q, ElementModP, ElementModQ};
use crate::errors::{Error, Result};
use crate::hash_elems;

/// An ElGamal secret/public key pair: `public_key = g^secret_key mod P`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPair {
    pub secret_key: ElementModQ,
    pub public_key: ElementModP,
}

impl KeyPair {
    /// Build a key pair from a given secret, which must be in `[2, Q)`.
    pub fn from_secret(secret_key: ElementModQ) -> Result<KeyPair> {
        if secret_key.as_uint() < &BigUint::from(2_u8) {
            return Err(Error::OutOfRange(
                "elgamal secret key must be in [2, Q)".to_string(),
            ));
        }
        let public_key = g_pow_p(&secret_key);
        Ok(KeyPair {
            secret_key,
            public_key,
        })
    }

    /// A fresh random key pair.
    pub fn random() -> KeyPair {
        KeyPair::from_secret(rand_range_q(&ElementModQ::from(2_u64)))
            .expect("sampled secret is in range")
    }
}

/// An exponential ElGamal ciphertext: the plaintext rides in the exponent so
/// that component-wise multiplication of ciphertexts adds the plaintexts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ciphertext {
    /// `g^nonce mod P` (alpha).
    pub pad: ElementModP,
    /// `g^message * K^nonce mod P` (beta).
    pub data: ElementModP,
}

impl Ciphertext {
    /// The identity ciphertext `(1, 1)`: a valid encryption of zero with a
    /// zero nonce, and the unit of homomorphic addition.
    pub fn identity() -> Ciphertext {
        Ciphertext {
            pad: num::One::one(),
            data: num::One::one(),
        }
    }

    pub fn crypto_hash(&self) -> ElementModQ {
        hash_elems!(&self.pad, &self.data)
    }

    /// Decrypt with a known blinding factor (`K^nonce`, `pad^secret`, or a
    /// product of partial decryptions): divide it out of `data` and recover
    /// the exponent by bounded brute-force search.
    pub fn decrypt_known_product(&self, product: &ElementModP) -> Result<u64> {
        discrete_log(&(&self.data / product)).ok_or(Error::DlogExceeded)
    }

    /// Decrypt with the ElGamal secret key.
    pub fn decrypt(&self, secret_key: &ElementModQ) -> Result<u64> {
        self.decrypt_known_product(&self.pad.pow(secret_key))
    }

    /// Decrypt with the nonce used at encryption time and the public key.
    pub fn decrypt_known_nonce(&self, public_key: &ElementModP, nonce: &ElementModQ) -> Result<u64> {
        self.decrypt_known_product(&public_key.pow(nonce))
    }

    /// A guardian's share of a decryption: `M_i = pad^secret mod P`.
    pub fn partial_decrypt(&self, secret_key: &ElementModQ) -> ElementModP {
        self.pad.pow(secret_key)
    }
}

impl Mul for &Ciphertext {
    type Output = Ciphertext;
    /// Homomorphic accumulation: component-wise multiplication adds the
    /// encrypted plaintexts.
    fn mul(self, other: &Ciphertext) -> Ciphertext {
        Ciphertext {
            pad: &self.pad * &other.pad,
            data: &self.data * &other.data,
        }
    }
}

/// Encrypt a small non-negative integer. Fails on the zero nonce (which
/// would leak `g^m` directly).
pub fn encrypt(message: u64, nonce: &ElementModQ, public_key: &ElementModP) -> Result<Ciphertext> {
    if num::Zero::is_zero(nonce) {
        return Err(Error::OutOfRange(
            "elgamal encryption requires a non-zero nonce".to_string(),
        ));
    }
    let m = ElementModQ::new(BigUint::from(message))
        .ok_or_else(|| Error::OutOfRange("elgamal message must be in [0, Q)".to_string()))?;
    Ok(Ciphertext {
        pad: g_pow_p(nonce),
        data: &g_pow_p(&m) * &public_key.pow(nonce),
    })
}

/// Homomorphically accumulate ciphertexts by pairwise multiplication; the
/// encrypted vote counters add. Fails on an empty input.
pub fn elgamal_add<'a>(ciphertexts: impl IntoIterator<Item = &'a Ciphertext>) -> Result<Ciphertext> {
    let mut iter = ciphertexts.into_iter();
    let first = iter
        .next()
        .ok_or_else(|| Error::OutOfRange("elgamal_add requires at least one ciphertext".to_string()))?;
    let mut sum = first.clone();
    for next in iter {
        sum = Ciphertext {
            pad: &sum.pad * &next.pad,
            data: &sum.data * &next.data,
        };
    }
    Ok(sum)
}

/// Combine guardian public keys into the joint election key: their product
/// mod `P`, i.e. `g` raised to the sum of all secrets.
pub fn combine_public_keys<'a>(keys: impl IntoIterator<Item = &'a ElementModP>) -> ElementModP {
    mult_p(keys)
}
