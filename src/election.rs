//! The cryptographic context shared by every operation in an election.

use serde::{Deserialize, Serialize};

use crate::crypto::group::{
    generator, large_prime, small_prime, ElementModP, ElementModQ,
};
use crate::hash_elems;

/// Everything the encryption and decryption sides agree on once the key
/// ceremony completes: how many guardians exist, how many are needed to
/// decrypt, the joint public key, and the hash chain roots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiphertextElectionContext {
    /// The number of guardians `n` that hold shares of the election secret.
    pub number_of_guardians: u32,
    /// The quorum `k` of guardians required to decrypt; at most `n`.
    pub quorum: u32,
    /// The joint public key `K`, the product of all guardian public keys.
    pub elgamal_public_key: ElementModP,
    /// The hash of the external election manifest.
    pub description_hash: ElementModQ,
    /// The base hash `Q`: group constants, guardian counts and the manifest.
    pub crypto_base_hash: ElementModQ,
    /// The extended base hash `Q̄ = hash(Q, commitment_hash)`; the header of
    /// every Fiat-Shamir challenge in the election.
    pub crypto_extended_base_hash: ElementModQ,
}

/// The base hash commits to the group constants, the guardian arithmetic and
/// the election manifest, so ballots from different configurations can never
/// share proofs.
pub fn make_crypto_base_hash(
    number_of_guardians: u32,
    quorum: u32,
    description_hash: &ElementModQ,
) -> ElementModQ {
    let p = ElementModP::unchecked(large_prime().clone());
    let q = ElementModQ::unchecked(small_prime().clone());
    hash_elems!(
        &p,
        &q,
        generator(),
        number_of_guardians,
        quorum,
        description_hash
    )
}

/// Assemble the full context once the joint key and the hash of all guardian
/// commitments are known.
pub fn make_ciphertext_election_context(
    number_of_guardians: u32,
    quorum: u32,
    elgamal_public_key: ElementModP,
    commitment_hash: &ElementModQ,
    description_hash: ElementModQ,
) -> CiphertextElectionContext {
    let crypto_base_hash =
        make_crypto_base_hash(number_of_guardians, quorum, &description_hash);
    let crypto_extended_base_hash = hash_elems!(&crypto_base_hash, commitment_hash);
    CiphertextElectionContext {
        number_of_guardians,
        quorum,
        elgamal_public_key,
        description_hash,
        crypto_base_hash,
        crypto_extended_base_hash,
    }
}
