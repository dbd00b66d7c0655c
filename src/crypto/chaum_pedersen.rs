use num::BigUint;
use serde::{Deserialize, Serialize};

use crate::crypto::elgamal::Ciphertext;
use crate::crypto::group::{
    a_plus_bc_q, g_pow_p, mult_p, ElementModP, ElementModQ,
};
use crate::crypto::nonces::Nonces;
use crate::errors::{Error, Result};
use crate::hash_elems;

/// A proof that a ciphertext encrypts zero or one, without revealing which.
///
/// One branch is constructed honestly from a fresh blinding exponent; the
/// other is simulated backwards from a freely-chosen challenge and response.
/// The two branch challenges are forced to sum to the Fiat-Shamir hash of
/// both commitments, so a verifier cannot tell which branch was real.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisjunctiveChaumPedersenProof {
    /// `a0`: commitment pad of the zero branch.
    pub proof_zero_pad: ElementModP,
    /// `b0`: commitment data of the zero branch.
    pub proof_zero_data: ElementModP,
    /// `a1`: commitment pad of the one branch.
    pub proof_one_pad: ElementModP,
    /// `b1`: commitment data of the one branch.
    pub proof_one_data: ElementModP,
    /// `c0`: challenge of the zero branch.
    pub proof_zero_challenge: ElementModQ,
    /// `c1`: challenge of the one branch.
    pub proof_one_challenge: ElementModQ,
    /// `c = hash(qbar, alpha, beta, a0, b0, a1, b1)`; always `c0 + c1 mod Q`.
    pub challenge: ElementModQ,
    /// `v0`: response of the zero branch.
    pub proof_zero_response: ElementModQ,
    /// `v1`: response of the one branch.
    pub proof_one_response: ElementModQ,
}

/// A proof that a guardian's (partial) decryption share was derived from the
/// same secret as a known public value: `m = alpha^s` and `k = g^s`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChaumPedersenProof {
    /// `a = g^u`.
    pub pad: ElementModP,
    /// `b = alpha^u`.
    pub data: ElementModP,
    /// `c = hash(qbar, alpha, beta, a, b, m)`.
    pub challenge: ElementModQ,
    /// `v = u + c*s mod Q`.
    pub response: ElementModQ,
}

/// A proof that an accumulated ciphertext encrypts a known public constant
/// (a contest's selection limit).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstantChaumPedersenProof {
    /// `a = g^u`.
    pub pad: ElementModP,
    /// `b = k^u`.
    pub data: ElementModP,
    /// `c = hash(qbar, alpha, beta, a, b)`.
    pub challenge: ElementModQ,
    /// `v = u + c*r mod Q` over the aggregate nonce `r`.
    pub response: ElementModQ,
    /// The claimed plaintext constant.
    pub constant: u64,
}

/// Any of the three proof shapes, dispatched by tag. Stored artifacts that
/// may carry a proof of any shape use this; verification matches on the
/// variant so there is a single entry point rather than virtual dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Proof {
    Disjunctive(DisjunctiveChaumPedersenProof),
    Constant(ConstantChaumPedersenProof),
    Generic(ChaumPedersenProof),
}

impl Proof {
    /// Verify whichever proof shape is present against the same public
    /// inputs. `decryption` is only consulted by the generic shape (it is
    /// the value `m` a decryption-share proof speaks about).
    pub fn verify(
        &self,
        message: &Ciphertext,
        public_key: &ElementModP,
        decryption: Option<&ElementModP>,
        extended_base_hash: &ElementModQ,
    ) -> bool {
        match self {
            Proof::Disjunctive(p) => p.is_valid(message, public_key, extended_base_hash),
            Proof::Constant(p) => p.is_valid(message, public_key, extended_base_hash),
            Proof::Generic(p) => match decryption {
                Some(m) => p.is_valid(message, public_key, m, extended_base_hash),
                None => false,
            },
        }
    }
}

/// The sanity bound on provable constants, keeping later brute-force
/// discrete-log decryption tractable.
pub const MAX_CONSTANT: u64 = 1_000_000_000;

const DISJUNCTIVE_PROOF_HEADER: &str = "disjoint-chaum-pedersen-proof";
const CONSTANT_PROOF_HEADER: &str = "constant-chaum-pedersen-proof";

/// Produce a disjunctive proof for a ciphertext known to encrypt `plaintext`,
/// which must be zero or one. `r` is the encryption nonce, `seed` drives the
/// deterministic choice of the proof's internal randomness.
pub fn make_disjunctive_chaum_pedersen(
    message: &Ciphertext,
    r: &ElementModQ,
    k: &ElementModP,
    qbar: &ElementModQ,
    seed: &ElementModQ,
    plaintext: u64,
) -> Result<DisjunctiveChaumPedersenProof> {
    match plaintext {
        0 => Ok(make_disjunctive_chaum_pedersen_zero(message, r, k, qbar, seed)),
        1 => Ok(make_disjunctive_chaum_pedersen_one(message, r, k, qbar, seed)),
        other => Err(Error::OutOfRange(format!(
            "disjunctive proof only supports plaintexts of 0 or 1, got {}",
            other
        ))),
    }
}

/// Disjunctive proof for an encryption of zero: the one branch is simulated,
/// the zero branch is real.
pub fn make_disjunctive_chaum_pedersen_zero(
    message: &Ciphertext,
    r: &ElementModQ,
    k: &ElementModP,
    qbar: &ElementModQ,
    seed: &ElementModQ,
) -> DisjunctiveChaumPedersenProof {
    let alpha = &message.pad;
    let beta = &message.data;

    let nonces = Nonces::seeded(seed, DISJUNCTIVE_PROOF_HEADER.into());
    let c1 = nonces.get(0);
    let v1 = nonces.get(1);
    let u0 = nonces.get(2);

    let a0 = g_pow_p(&u0);
    let b0 = k.pow(&u0);
    let q_minus_c1 = -&c1;
    // a1 = g^v1 * alpha^-c1, b1 = k^v1 * g^c1 * beta^-c1: algebra that makes
    // the simulated one-branch equations check out for the chosen (c1, v1)
    let a1 = &g_pow_p(&v1) * &alpha.pow(&q_minus_c1);
    let b1 = mult_p([&k.pow(&v1), &g_pow_p(&c1), &beta.pow(&q_minus_c1)].iter().copied());
    let c = hash_elems!(qbar, alpha, beta, &a0, &b0, &a1, &b1);
    let c0 = &c - &c1;
    let v0 = a_plus_bc_q(&u0, &c0, r);

    DisjunctiveChaumPedersenProof {
        proof_zero_pad: a0,
        proof_zero_data: b0,
        proof_one_pad: a1,
        proof_one_data: b1,
        proof_zero_challenge: c0,
        proof_one_challenge: c1,
        challenge: c,
        proof_zero_response: v0,
        proof_one_response: v1,
    }
}

/// Disjunctive proof for an encryption of one: the zero branch is simulated,
/// the one branch is real.
pub fn make_disjunctive_chaum_pedersen_one(
    message: &Ciphertext,
    r: &ElementModQ,
    k: &ElementModP,
    qbar: &ElementModQ,
    seed: &ElementModQ,
) -> DisjunctiveChaumPedersenProof {
    let alpha = &message.pad;
    let beta = &message.data;

    let nonces = Nonces::seeded(seed, DISJUNCTIVE_PROOF_HEADER.into());
    let c0 = nonces.get(0);
    let v0 = nonces.get(1);
    let u1 = nonces.get(2);

    let q_minus_c0 = -&c0;
    let a0 = &g_pow_p(&v0) * &alpha.pow(&q_minus_c0);
    let b0 = &k.pow(&v0) * &beta.pow(&q_minus_c0);
    let a1 = g_pow_p(&u1);
    let b1 = k.pow(&u1);
    let c = hash_elems!(qbar, alpha, beta, &a0, &b0, &a1, &b1);
    let c1 = &c - &c0;
    let v1 = a_plus_bc_q(&u1, &c1, r);

    DisjunctiveChaumPedersenProof {
        proof_zero_pad: a0,
        proof_zero_data: b0,
        proof_one_pad: a1,
        proof_one_data: b1,
        proof_zero_challenge: c0,
        proof_one_challenge: c1,
        challenge: c,
        proof_zero_response: v0,
        proof_one_response: v1,
    }
}

impl DisjunctiveChaumPedersenProof {
    /// Validate the proof against the ciphertext it speaks about.
    ///
    /// Checks every bound (`alpha`, `beta` and all four commitments are valid
    /// residues; both challenges and responses in `[0, Q)`), the challenge
    /// consistency `c0 + c1 = c = hash(qbar, alpha, beta, a0, b0, a1, b1)`,
    /// and the four branch equations `g^v0 = a0*alpha^c0`,
    /// `g^v1 = a1*alpha^c1`, `k^v0 = b0*beta^c0`, `g^c1*k^v1 = b1*beta^c1`.
    pub fn is_valid(&self, message: &Ciphertext, k: &ElementModP, qbar: &ElementModQ) -> bool {
        let alpha = &message.pad;
        let beta = &message.data;
        let a0 = &self.proof_zero_pad;
        let b0 = &self.proof_zero_data;
        let a1 = &self.proof_one_pad;
        let b1 = &self.proof_one_data;
        let c0 = &self.proof_zero_challenge;
        let c1 = &self.proof_one_challenge;
        let c = &self.challenge;
        let v0 = &self.proof_zero_response;
        let v1 = &self.proof_one_response;

        let in_bounds = alpha.is_valid_residue()
            && beta.is_valid_residue()
            && a0.is_valid_residue()
            && b0.is_valid_residue()
            && a1.is_valid_residue()
            && b1.is_valid_residue()
            && c0.is_in_bounds()
            && c1.is_in_bounds()
            && v0.is_in_bounds()
            && v1.is_in_bounds();

        let consistent_c =
            &(c0 + c1) == c && *c == hash_elems!(qbar, alpha, beta, a0, b0, a1, b1);
        let consistent_gv0 = g_pow_p(v0) == a0 * &alpha.pow(c0);
        let consistent_gv1 = g_pow_p(v1) == a1 * &alpha.pow(c1);
        let consistent_kv0 = k.pow(v0) == b0 * &beta.pow(c0);
        let consistent_gc1kv1 = &g_pow_p(c1) * &k.pow(v1) == b1 * &beta.pow(c1);

        in_bounds
            && consistent_c
            && consistent_gv0
            && consistent_gv1
            && consistent_kv0
            && consistent_gc1kv1
    }
}

/// Produce a proof that a decryption share `m = alpha^s` was computed with
/// the secret `s` behind a known public value `g^s`.
pub fn make_chaum_pedersen(
    message: &Ciphertext,
    s: &ElementModQ,
    m: &ElementModP,
    seed: &ElementModQ,
    qbar: &ElementModQ,
) -> ChaumPedersenProof {
    let alpha = &message.pad;
    let beta = &message.data;

    let u = Nonces::seeded(seed, CONSTANT_PROOF_HEADER.into()).get(0);
    let a = g_pow_p(&u);
    let b = alpha.pow(&u);
    let c = hash_elems!(qbar, alpha, beta, &a, &b, m);
    let v = a_plus_bc_q(&u, &c, s);

    ChaumPedersenProof {
        pad: a,
        data: b,
        challenge: c,
        response: v,
    }
}

impl ChaumPedersenProof {
    /// Validate the proof: all elements are residues / in bounds, the
    /// challenge is `hash(qbar, alpha, beta, a, b, m)`, and both equations
    /// `g^v = a*k^c` and `alpha^v = b*m^c` hold.
    pub fn is_valid(
        &self,
        message: &Ciphertext,
        k: &ElementModP,
        m: &ElementModP,
        qbar: &ElementModQ,
    ) -> bool {
        let alpha = &message.pad;
        let beta = &message.data;
        let a = &self.pad;
        let b = &self.data;
        let c = &self.challenge;
        let v = &self.response;

        let in_bounds = alpha.is_valid_residue()
            && beta.is_valid_residue()
            && k.is_valid_residue()
            && m.is_valid_residue()
            && a.is_valid_residue()
            && b.is_valid_residue()
            && c.is_in_bounds()
            && v.is_in_bounds()
            && qbar.is_in_bounds();

        let same_c = *c == hash_elems!(qbar, alpha, beta, a, b, m);
        let consistent_gv = g_pow_p(v) == a * &k.pow(c);
        let consistent_av = alpha.pow(v) == b * &m.pow(c);

        in_bounds && same_c && consistent_gv && consistent_av
    }
}

/// Produce a proof that an accumulated ciphertext encrypts exactly
/// `constant`, using the aggregate nonce `r` of the accumulation.
pub fn make_constant_chaum_pedersen(
    message: &Ciphertext,
    constant: u64,
    r: &ElementModQ,
    k: &ElementModP,
    seed: &ElementModQ,
    qbar: &ElementModQ,
) -> Result<ConstantChaumPedersenProof> {
    if constant >= MAX_CONSTANT {
        return Err(Error::OutOfRange(format!(
            "constant {} exceeds the provable maximum",
            constant
        )));
    }
    let alpha = &message.pad;
    let beta = &message.data;

    let u = Nonces::seeded(seed, CONSTANT_PROOF_HEADER.into()).get(0);
    let a = g_pow_p(&u);
    let b = k.pow(&u);
    let c = hash_elems!(qbar, alpha, beta, &a, &b);
    let v = a_plus_bc_q(&u, &c, r);

    Ok(ConstantChaumPedersenProof {
        pad: a,
        data: b,
        challenge: c,
        response: v,
        constant,
    })
}

impl ConstantChaumPedersenProof {
    /// Validate the proof: bounds and residues, the constant within the
    /// tractability bound and `[0, Q)`, the challenge recomputation, and the
    /// equations `g^v = a*alpha^c` and `g^(c*constant)*k^v = b*beta^c`.
    pub fn is_valid(&self, message: &Ciphertext, k: &ElementModP, qbar: &ElementModQ) -> bool {
        let alpha = &message.pad;
        let beta = &message.data;
        let a = &self.pad;
        let b = &self.data;
        let c = &self.challenge;
        let v = &self.response;

        let constant_q = match ElementModQ::new(BigUint::from(self.constant)) {
            Some(q) => q,
            None => return false,
        };
        let sane_constant = self.constant < MAX_CONSTANT;

        let in_bounds = alpha.is_valid_residue()
            && beta.is_valid_residue()
            && a.is_valid_residue()
            && b.is_valid_residue()
            && c.is_in_bounds()
            && v.is_in_bounds();

        let same_c = *c == hash_elems!(qbar, alpha, beta, a, b);
        let consistent_gv = g_pow_p(v) == a * &alpha.pow(c);
        let consistent_kv =
            &g_pow_p(&(c * &constant_q)) * &k.pow(v) == b * &beta.pow(c);

        in_bounds && sane_constant && same_c && consistent_gv && consistent_kv
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::elgamal::{elgamal_add, encrypt, KeyPair};

    fn context() -> (KeyPair, ElementModQ) {
        let keys = KeyPair::from_secret(ElementModQ::from(31809_u64)).unwrap();
        let qbar = ElementModQ::from(40961_u64);
        (keys, qbar)
    }

    #[test]
    fn disjunctive_zero_proves_and_verifies() {
        let (keys, qbar) = context();
        let nonce = ElementModQ::from(1025_u64);
        let message = encrypt(0, &nonce, &keys.public_key).unwrap();
        let seed = ElementModQ::from(777_u64);
        let proof =
            make_disjunctive_chaum_pedersen(&message, &nonce, &keys.public_key, &qbar, &seed, 0)
                .unwrap();
        assert!(proof.is_valid(&message, &keys.public_key, &qbar));
    }

    #[test]
    fn disjunctive_one_proves_and_verifies() {
        let (keys, qbar) = context();
        let nonce = ElementModQ::from(1025_u64);
        let message = encrypt(1, &nonce, &keys.public_key).unwrap();
        let seed = ElementModQ::from(777_u64);
        let proof =
            make_disjunctive_chaum_pedersen(&message, &nonce, &keys.public_key, &qbar, &seed, 1)
                .unwrap();
        assert!(proof.is_valid(&message, &keys.public_key, &qbar));
    }

    #[test]
    fn disjunctive_rejects_other_plaintexts() {
        let (keys, qbar) = context();
        let nonce = ElementModQ::from(1025_u64);
        let message = encrypt(2, &nonce, &keys.public_key).unwrap();
        let seed = ElementModQ::from(777_u64);
        assert!(make_disjunctive_chaum_pedersen(
            &message,
            &nonce,
            &keys.public_key,
            &qbar,
            &seed,
            2
        )
        .is_err());
    }

    #[test]
    fn disjunctive_proof_of_two_fails_verification() {
        // force a zero-shaped proof onto an encryption of two
        let (keys, qbar) = context();
        let nonce = ElementModQ::from(1025_u64);
        let message = encrypt(2, &nonce, &keys.public_key).unwrap();
        let seed = ElementModQ::from(777_u64);
        let proof = make_disjunctive_chaum_pedersen_zero(
            &message,
            &nonce,
            &keys.public_key,
            &qbar,
            &seed,
        );
        assert!(!proof.is_valid(&message, &keys.public_key, &qbar));
    }

    #[test]
    fn disjunctive_wrong_branch_fails() {
        let (keys, qbar) = context();
        let nonce = ElementModQ::from(1025_u64);
        let message = encrypt(0, &nonce, &keys.public_key).unwrap();
        let seed = ElementModQ::from(777_u64);
        let proof =
            make_disjunctive_chaum_pedersen_one(&message, &nonce, &keys.public_key, &qbar, &seed);
        assert!(!proof.is_valid(&message, &keys.public_key, &qbar));
    }

    #[test]
    fn disjunctive_tampered_fields_fail() {
        let (keys, qbar) = context();
        let nonce = ElementModQ::from(1025_u64);
        let message = encrypt(1, &nonce, &keys.public_key).unwrap();
        let seed = ElementModQ::from(777_u64);
        let proof =
            make_disjunctive_chaum_pedersen(&message, &nonce, &keys.public_key, &qbar, &seed, 1)
                .unwrap();

        let mut bad = proof.clone();
        bad.challenge = &bad.challenge + &ElementModQ::from(1_u64);
        assert!(!bad.is_valid(&message, &keys.public_key, &qbar));

        let mut bad = proof.clone();
        bad.proof_one_response = &bad.proof_one_response + &ElementModQ::from(1_u64);
        assert!(!bad.is_valid(&message, &keys.public_key, &qbar));

        let mut tampered_message = message.clone();
        tampered_message.data = &tampered_message.data * crate::crypto::group::generator();
        assert!(!proof.is_valid(&tampered_message, &keys.public_key, &qbar));
    }

    #[test]
    fn disjunctive_is_deterministic_in_the_seed() {
        let (keys, qbar) = context();
        let nonce = ElementModQ::from(1025_u64);
        let message = encrypt(1, &nonce, &keys.public_key).unwrap();
        let seed = ElementModQ::from(777_u64);
        let p1 =
            make_disjunctive_chaum_pedersen(&message, &nonce, &keys.public_key, &qbar, &seed, 1)
                .unwrap();
        let p2 =
            make_disjunctive_chaum_pedersen(&message, &nonce, &keys.public_key, &qbar, &seed, 1)
                .unwrap();
        assert_eq!(p1, p2);
    }

    #[test]
    fn generic_proof_for_partial_decryption() {
        let (keys, qbar) = context();
        let message = encrypt(3, &ElementModQ::from(4242_u64), &keys.public_key).unwrap();
        let m = message.partial_decrypt(&keys.secret_key);
        let proof = make_chaum_pedersen(
            &message,
            &keys.secret_key,
            &m,
            &ElementModQ::from(55_u64),
            &qbar,
        );
        assert!(proof.is_valid(&message, &keys.public_key, &m, &qbar));
    }

    #[test]
    fn generic_proof_with_wrong_share_fails() {
        let (keys, qbar) = context();
        let message = encrypt(3, &ElementModQ::from(4242_u64), &keys.public_key).unwrap();
        let m = message.partial_decrypt(&keys.secret_key);
        let proof = make_chaum_pedersen(
            &message,
            &keys.secret_key,
            &m,
            &ElementModQ::from(55_u64),
            &qbar,
        );
        let wrong_m = &m * crate::crypto::group::generator();
        assert!(!proof.is_valid(&message, &keys.public_key, &wrong_m, &qbar));
    }

    #[test]
    fn constant_proof_for_selection_limit() {
        let (keys, qbar) = context();
        let n1 = ElementModQ::from(1111_u64);
        let n2 = ElementModQ::from(2222_u64);
        let c1 = encrypt(1, &n1, &keys.public_key).unwrap();
        let c2 = encrypt(0, &n2, &keys.public_key).unwrap();
        let sum = elgamal_add([&c1, &c2].iter().copied()).unwrap();
        let aggregate = &n1 + &n2;
        let proof = make_constant_chaum_pedersen(
            &sum,
            1,
            &aggregate,
            &keys.public_key,
            &ElementModQ::from(88_u64),
            &qbar,
        )
        .unwrap();
        assert!(proof.is_valid(&sum, &keys.public_key, &qbar));
    }

    #[test]
    fn constant_proof_with_wrong_constant_fails() {
        let (keys, qbar) = context();
        let n = ElementModQ::from(1111_u64);
        let message = encrypt(1, &n, &keys.public_key).unwrap();
        let proof = make_constant_chaum_pedersen(
            &message,
            2,
            &n,
            &keys.public_key,
            &ElementModQ::from(88_u64),
            &qbar,
        )
        .unwrap();
        assert!(!proof.is_valid(&message, &keys.public_key, &qbar));
    }

    #[test]
    fn constant_proof_rejects_oversized_constant() {
        let (keys, qbar) = context();
        let n = ElementModQ::from(1111_u64);
        let message = encrypt(1, &n, &keys.public_key).unwrap();
        assert!(make_constant_chaum_pedersen(
            &message,
            MAX_CONSTANT,
            &n,
            &keys.public_key,
            &ElementModQ::from(88_u64),
            &qbar,
        )
        .is_err());
    }

    #[test]
    fn tagged_union_dispatches_by_shape() {
        let (keys, qbar) = context();
        let nonce = ElementModQ::from(1025_u64);
        let message = encrypt(1, &nonce, &keys.public_key).unwrap();
        let seed = ElementModQ::from(777_u64);
        let disjunctive =
            make_disjunctive_chaum_pedersen(&message, &nonce, &keys.public_key, &qbar, &seed, 1)
                .unwrap();
        assert!(Proof::Disjunctive(disjunctive).verify(&message, &keys.public_key, None, &qbar));

        let m = message.partial_decrypt(&keys.secret_key);
        let generic = make_chaum_pedersen(&message, &keys.secret_key, &m, &seed, &qbar);
        assert!(Proof::Generic(generic.clone()).verify(&message, &keys.public_key, Some(&m), &qbar));
        // the generic shape is unverifiable without the decryption value
        assert!(!Proof::Generic(generic).verify(&message, &keys.public_key, None, &qbar));
    }
}
