use serde::{Deserialize, Serialize};

use crate::crypto::elgamal::KeyPair;
use crate::crypto::group::{a_plus_bc_q, g_pow_p, ElementModP, ElementModQ};
use crate::hash_elems;

/// A non-interactive zero-knowledge proof of knowledge of the secret key `s`
/// behind a public key `k = g^s`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchnorrProof {
    /// The public key `k` the proof is about.
    pub public_key: ElementModP,
    /// The one-time commitment `h = g^r`.
    pub commitment: ElementModP,
    /// The Fiat-Shamir challenge `c = hash(k, h)`.
    pub challenge: ElementModQ,
    /// The response `u = r + c*s mod Q`.
    pub response: ElementModQ,
}

impl SchnorrProof {
    /// Prove knowledge of `keypair.secret_key` using a one-time nonce `r`.
    pub fn make(keypair: &KeyPair, nonce: &ElementModQ) -> SchnorrProof {
        let k = keypair.public_key.clone();
        let h = g_pow_p(nonce);
        let c = hash_elems!(&k, &h);
        let u = a_plus_bc_q(nonce, &keypair.secret_key, &c);
        SchnorrProof {
            public_key: k,
            commitment: h,
            challenge: c,
            response: u,
        }
    }

    /// Verify the proof against its embedded public key: the key is a valid
    /// residue, the commitment and response are in bounds, the challenge is
    /// the hash of `(k, h)`, and `g^u = h * k^c`.
    pub fn is_valid(&self) -> bool {
        let k = &self.public_key;
        let h = &self.commitment;
        let c = &self.challenge;
        let u = &self.response;

        let valid_public_key = k.is_valid_residue();
        let in_bounds_h = h.is_in_bounds();
        let in_bounds_u = u.is_in_bounds();
        let valid_challenge = *c == hash_elems!(k, h);
        let valid_response = g_pow_p(u) == h * &k.pow(c);

        valid_public_key && in_bounds_h && in_bounds_u && valid_challenge && valid_response
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::group::rand_q;

    #[test]
    fn prove_and_verify() {
        let keys = KeyPair::from_secret(ElementModQ::from(5821_u64)).unwrap();
        let proof = SchnorrProof::make(&keys, &ElementModQ::from(407_u64));
        assert!(proof.is_valid());
    }

    #[test]
    fn random_nonces_still_verify() {
        let keys = KeyPair::random();
        let proof = SchnorrProof::make(&keys, &rand_q());
        assert!(proof.is_valid());
    }

    #[test]
    fn tampered_public_key_fails() {
        let keys = KeyPair::from_secret(ElementModQ::from(5821_u64)).unwrap();
        let mut proof = SchnorrProof::make(&keys, &ElementModQ::from(407_u64));
        proof.public_key = g_pow_p(&ElementModQ::from(9_u64));
        assert!(!proof.is_valid());
    }

    #[test]
    fn tampered_challenge_fails() {
        let keys = KeyPair::from_secret(ElementModQ::from(5821_u64)).unwrap();
        let mut proof = SchnorrProof::make(&keys, &ElementModQ::from(407_u64));
        proof.challenge = &proof.challenge + &ElementModQ::from(1_u64);
        assert!(!proof.is_valid());
    }

    #[test]
    fn tampered_response_fails() {
        let keys = KeyPair::from_secret(ElementModQ::from(5821_u64)).unwrap();
        let mut proof = SchnorrProof::make(&keys, &ElementModQ::from(407_u64));
        proof.response = &proof.response + &ElementModQ::from(1_u64);
        assert!(!proof.is_valid());
    }

    #[test]
    fn proof_for_wrong_secret_fails() {
        let keys = KeyPair::from_secret(ElementModQ::from(5821_u64)).unwrap();
        let wrong = KeyPair {
            secret_key: ElementModQ::from(1234_u64),
            public_key: keys.public_key.clone(),
        };
        let proof = SchnorrProof::make(&wrong, &ElementModQ::from(407_u64));
        assert!(!proof.is_valid());
    }
}
