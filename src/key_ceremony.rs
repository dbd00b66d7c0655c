//! The value types and pure operations of the threshold key ceremony.
//!
//! Each guardian generates a secret sharing polynomial whose zeroth
//! coefficient is its election secret key, backs up one polynomial
//! coordinate to every other guardian (encrypted for transport), and
//! verifies the backups it receives against the senders' public
//! commitments. Once everything verifies, the joint election key is the
//! product of all guardian public keys.

use serde::{Deserialize, Serialize};

use crate::auxiliary::{AuxiliaryDecryptor, AuxiliaryEncryptor, AuxiliaryKeyPair, AuxiliaryPublicKey, ByteString};
use crate::crypto::elgamal::{self, KeyPair};
use crate::crypto::group::{rand_q, ElementModP, ElementModQ};
use crate::crypto::schnorr::SchnorrProof;
use crate::errors::{Error, Result};
use crate::polynomial::{
    compute_polynomial_coordinate, verify_polynomial_coordinate, ElectionPolynomial,
};

/// The shape of a ceremony: how many guardians, and how many are enough to
/// decrypt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CeremonyDetails {
    pub number_of_guardians: u32,
    pub quorum: u32,
}

impl CeremonyDetails {
    pub fn new(number_of_guardians: u32, quorum: u32) -> Result<CeremonyDetails> {
        if quorum == 0 || quorum > number_of_guardians {
            return Err(Error::ProtocolState(format!(
                "quorum {} must be in [1, {}]",
                quorum, number_of_guardians
            )));
        }
        Ok(CeremonyDetails {
            number_of_guardians,
            quorum,
        })
    }
}

/// A guardian's election key material: the key pair (the polynomial's zeroth
/// coefficient and commitment), a proof of possession, and the polynomial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionKeyPair {
    pub key_pair: KeyPair,
    pub proof: SchnorrProof,
    pub polynomial: ElectionPolynomial,
}

/// A guardian's public election key with its ownership and proof, as shared
/// with peers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionPublicKey {
    pub owner_id: String,
    pub sequence_order: u32,
    pub proof: SchnorrProof,
    pub key: ElementModP,
}

/// Everything a guardian announces at ceremony start: identity, transport
/// key, election key and its proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeySet {
    pub owner_id: String,
    pub sequence_order: u32,
    pub auxiliary_public_key: ByteString,
    pub election_public_key: ElementModP,
    pub election_public_key_proof: SchnorrProof,
}

/// An ordered (owner, designated) pair of guardians in a sharing exchange.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GuardianPair {
    pub owner_id: String,
    pub designated_id: String,
}

impl GuardianPair {
    pub fn new(owner_id: &str, designated_id: &str) -> GuardianPair {
        GuardianPair {
            owner_id: owner_id.to_string(),
            designated_id: designated_id.to_string(),
        }
    }
}

/// One guardian's polynomial evaluated at another guardian's coordinate,
/// encrypted for that recipient, alongside the sender's public commitments
/// and proofs so the recipient can verify it without learning the secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionPartialKeyBackup {
    /// The guardian that generated this backup.
    pub owner_id: String,
    /// The guardian the backup is for.
    pub designated_id: String,
    /// The designated guardian's sequence order (the polynomial coordinate).
    pub designated_sequence_order: u32,
    /// The encrypted coordinate `P_owner(designated_sequence_order)`.
    pub encrypted_value: ByteString,
    pub coefficient_commitments: Vec<ElementModP>,
    pub coefficient_proofs: Vec<SchnorrProof>,
}

/// The outcome of one guardian checking one received backup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionPartialKeyVerification {
    pub owner_id: String,
    pub designated_id: String,
    pub verifier_id: String,
    pub verified: bool,
}

/// A sender's rebuttal to a failed verification: the coordinate in the
/// clear, for anyone to re-check against the public commitments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionPartialKeyChallenge {
    pub owner_id: String,
    pub designated_id: String,
    pub designated_sequence_order: u32,
    pub value: ElementModQ,
    pub coefficient_commitments: Vec<ElementModP>,
    pub coefficient_proofs: Vec<SchnorrProof>,
}

/// A guardian's published commitments and proofs; everything a verifier
/// needs, and nothing secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoefficientValidationSet {
    pub owner_id: String,
    pub coefficient_commitments: Vec<ElementModP>,
    pub coefficient_proofs: Vec<SchnorrProof>,
}

/// The published record for one guardian: identity, election public key,
/// and the full commitment/proof sets for independent re-verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardianRecord {
    pub guardian_id: String,
    pub sequence_order: u32,
    pub election_public_key: ElementModP,
    pub election_commitments: Vec<ElementModP>,
    pub election_proofs: Vec<SchnorrProof>,
}

/// Generate a guardian's election key material: a quorum-degree polynomial,
/// the key pair from its zeroth coefficient, and a proof of possession.
pub fn generate_election_key_pair(
    quorum: u32,
    nonce: Option<&ElementModQ>,
) -> Result<ElectionKeyPair> {
    let polynomial = ElectionPolynomial::generate(quorum as usize, nonce)?;
    let key_pair = KeyPair {
        secret_key: polynomial.coefficients[0].clone(),
        public_key: polynomial.coefficient_commitments[0].clone(),
    };
    let proof = SchnorrProof::make(&key_pair, &rand_q());
    Ok(ElectionKeyPair {
        key_pair,
        proof,
        polynomial,
    })
}

/// Generate the backup of `polynomial` for the guardian owning
/// `auxiliary_public_key`: evaluate at their sequence order and seal the
/// coordinate under their transport key.
pub fn generate_election_partial_key_backup(
    owner_id: &str,
    polynomial: &ElectionPolynomial,
    auxiliary_public_key: &AuxiliaryPublicKey,
    encryptor: &dyn AuxiliaryEncryptor,
) -> Result<ElectionPartialKeyBackup> {
    let value = compute_polynomial_coordinate(
        u64::from(auxiliary_public_key.sequence_order),
        polynomial,
    )?;
    let encrypted_value = encryptor
        .encrypt(&value.to_hex(), &auxiliary_public_key.key)
        .ok_or_else(|| Error::Auxiliary {
            guardian_id: auxiliary_public_key.owner_id.clone(),
        })?;
    Ok(ElectionPartialKeyBackup {
        owner_id: owner_id.to_string(),
        designated_id: auxiliary_public_key.owner_id.clone(),
        designated_sequence_order: auxiliary_public_key.sequence_order,
        encrypted_value,
        coefficient_commitments: polynomial.coefficient_commitments.clone(),
        coefficient_proofs: polynomial.coefficient_proofs.clone(),
    })
}

/// Verify a received backup: decrypt the coordinate with the recipient's
/// auxiliary secret and check `g^coordinate` against the sender's
/// commitments. A failed decryption verifies as false rather than erroring;
/// the sender can still be challenged.
pub fn verify_election_partial_key_backup(
    verifier_id: &str,
    backup: &ElectionPartialKeyBackup,
    auxiliary_keys: &AuxiliaryKeyPair,
    decryptor: &dyn AuxiliaryDecryptor,
) -> ElectionPartialKeyVerification {
    let verified = decryptor
        .decrypt(&backup.encrypted_value, &auxiliary_keys.secret_key)
        .and_then(|hex| ElementModQ::from_hex(&hex))
        .map(|value| {
            verify_polynomial_coordinate(
                &value,
                u64::from(backup.designated_sequence_order),
                &backup.coefficient_commitments,
            )
        })
        .unwrap_or(false);

    ElectionPartialKeyVerification {
        owner_id: backup.owner_id.clone(),
        designated_id: backup.designated_id.clone(),
        verifier_id: verifier_id.to_string(),
        verified,
    }
}

/// Publish the cleartext coordinate of a disputed backup so any guardian can
/// re-verify it.
pub fn generate_election_partial_key_challenge(
    backup: &ElectionPartialKeyBackup,
    polynomial: &ElectionPolynomial,
) -> Result<ElectionPartialKeyChallenge> {
    Ok(ElectionPartialKeyChallenge {
        owner_id: backup.owner_id.clone(),
        designated_id: backup.designated_id.clone(),
        designated_sequence_order: backup.designated_sequence_order,
        value: compute_polynomial_coordinate(
            u64::from(backup.designated_sequence_order),
            polynomial,
        )?,
        coefficient_commitments: backup.coefficient_commitments.clone(),
        coefficient_proofs: backup.coefficient_proofs.clone(),
    })
}

/// Verify a challenge: the published coordinate must lie on the curve the
/// commitments describe. Needs no secrets at all.
pub fn verify_election_partial_key_challenge(
    verifier_id: &str,
    challenge: &ElectionPartialKeyChallenge,
) -> ElectionPartialKeyVerification {
    ElectionPartialKeyVerification {
        owner_id: challenge.owner_id.clone(),
        designated_id: challenge.designated_id.clone(),
        verifier_id: verifier_id.to_string(),
        verified: verify_polynomial_coordinate(
            &challenge.value,
            u64::from(challenge.designated_sequence_order),
            &challenge.coefficient_commitments,
        ),
    }
}

/// The joint election key: the product of all guardian public keys.
pub fn combine_election_public_keys<'a>(
    election_public_keys: impl IntoIterator<Item = &'a ElectionPublicKey>,
) -> ElementModP {
    elgamal::combine_public_keys(election_public_keys.into_iter().map(|k| &k.key))
}

impl GuardianRecord {
    /// The publishable record derived from a guardian's public key material.
    pub fn publish(
        public_key: &ElectionPublicKey,
        coefficients: &CoefficientValidationSet,
    ) -> GuardianRecord {
        GuardianRecord {
            guardian_id: public_key.owner_id.clone(),
            sequence_order: public_key.sequence_order,
            election_public_key: public_key.key.clone(),
            election_commitments: coefficients.coefficient_commitments.clone(),
            election_proofs: coefficients.coefficient_proofs.clone(),
        }
    }

    /// Re-verify a published record: non-empty matching commitment/proof
    /// lists, the public key equal to the zeroth commitment, and every
    /// Schnorr proof valid against its commitment.
    pub fn is_valid(&self) -> bool {
        if self.election_commitments.is_empty()
            || self.election_commitments.len() != self.election_proofs.len()
        {
            return false;
        }
        if self.election_public_key != self.election_commitments[0] {
            return false;
        }
        self.election_proofs.iter().zip(&self.election_commitments).all(
            |(proof, commitment)| proof.public_key == *commitment && proof.is_valid(),
        )
    }
}
