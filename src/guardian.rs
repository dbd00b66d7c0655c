//! One key-ceremony and decryption participant.

use std::collections::HashMap;

use crate::auxiliary::{AuxiliaryDecryptor, AuxiliaryEncryptor, AuxiliaryKeyPair, AuxiliaryPublicKey};
use crate::crypto::chaum_pedersen::{make_chaum_pedersen, ChaumPedersenProof};
use crate::crypto::elgamal::Ciphertext;
use crate::crypto::group::{rand_q, ElementModP, ElementModQ};
use crate::errors::{Error, Result};
use crate::key_ceremony::{
    generate_election_key_pair, generate_election_partial_key_backup,
    generate_election_partial_key_challenge, verify_election_partial_key_backup,
    verify_election_partial_key_challenge, CeremonyDetails, CoefficientValidationSet,
    ElectionKeyPair, ElectionPartialKeyBackup, ElectionPartialKeyChallenge,
    ElectionPartialKeyVerification, ElectionPublicKey, GuardianRecord, PublicKeySet,
};
use crate::polynomial::compute_g_pow_coordinate;

/// A guardian's own partial decryption of one ciphertext, with the proof
/// tying it to the guardian's key.
#[derive(Debug, Clone)]
pub struct DecryptionProofTuple {
    pub decryption: ElementModP,
    pub proof: ChaumPedersenProof,
}

/// A guardian: immutable identity and key material, plus the accumulating
/// maps of peer material received during the ceremony.
#[derive(Debug, Clone)]
pub struct Guardian {
    pub object_id: String,
    /// The polynomial x-coordinate of this guardian; unique, in `[1, 256)`.
    sequence_order: u32,
    ceremony_details: CeremonyDetails,
    auxiliary_keys: AuxiliaryKeyPair,
    election_keys: ElectionKeyPair,

    /// The backups this guardian generated for its peers, by recipient id.
    backups_to_share: HashMap<String, ElectionPartialKeyBackup>,
    /// Peer transport keys, by owner id (this guardian's own included).
    other_guardian_auxiliary_keys: HashMap<String, AuxiliaryPublicKey>,
    /// Peer election keys, by owner id (this guardian's own included).
    other_guardian_election_keys: HashMap<String, ElectionPublicKey>,
    /// Backups received from peers, by owner id.
    other_guardian_partial_key_backups: HashMap<String, ElectionPartialKeyBackup>,
}

impl Guardian {
    /// Create a guardian with freshly generated election keys. The
    /// `nonce_seed` makes key generation deterministic for tests.
    pub fn new(
        object_id: &str,
        sequence_order: u32,
        number_of_guardians: u32,
        quorum: u32,
        auxiliary_keys: AuxiliaryKeyPair,
        nonce_seed: Option<&ElementModQ>,
    ) -> Result<Guardian> {
        if sequence_order == 0 || sequence_order >= 256 {
            return Err(Error::OutOfRange(format!(
                "guardian sequence order {} must be in [1, 256)",
                sequence_order
            )));
        }
        let ceremony_details = CeremonyDetails::new(number_of_guardians, quorum)?;
        let election_keys = generate_election_key_pair(quorum, nonce_seed)?;

        let mut guardian = Guardian {
            object_id: object_id.to_string(),
            sequence_order,
            ceremony_details,
            auxiliary_keys,
            election_keys,
            backups_to_share: HashMap::new(),
            other_guardian_auxiliary_keys: HashMap::new(),
            other_guardian_election_keys: HashMap::new(),
            other_guardian_partial_key_backups: HashMap::new(),
        };
        // a guardian knows its own keys
        guardian.save_auxiliary_public_key(guardian.share_auxiliary_public_key());
        guardian.save_election_public_key(guardian.share_election_public_key());
        Ok(guardian)
    }

    pub fn sequence_order(&self) -> u32 {
        self.sequence_order
    }

    pub fn ceremony_details(&self) -> CeremonyDetails {
        self.ceremony_details
    }

    /// The public announcement this guardian makes to the ceremony.
    pub fn share_public_keys(&self) -> PublicKeySet {
        PublicKeySet {
            owner_id: self.object_id.clone(),
            sequence_order: self.sequence_order,
            auxiliary_public_key: self.auxiliary_keys.public_key.clone(),
            election_public_key: self.election_keys.key_pair.public_key.clone(),
            election_public_key_proof: self.election_keys.proof.clone(),
        }
    }

    /// Record a peer's announced keys.
    pub fn save_guardian_public_keys(&mut self, public_key_set: &PublicKeySet) {
        self.save_auxiliary_public_key(AuxiliaryPublicKey {
            owner_id: public_key_set.owner_id.clone(),
            sequence_order: public_key_set.sequence_order,
            key: public_key_set.auxiliary_public_key.clone(),
        });
        self.save_election_public_key(ElectionPublicKey {
            owner_id: public_key_set.owner_id.clone(),
            sequence_order: public_key_set.sequence_order,
            proof: public_key_set.election_public_key_proof.clone(),
            key: public_key_set.election_public_key.clone(),
        });
    }

    pub fn share_auxiliary_public_key(&self) -> AuxiliaryPublicKey {
        AuxiliaryPublicKey {
            owner_id: self.object_id.clone(),
            sequence_order: self.sequence_order,
            key: self.auxiliary_keys.public_key.clone(),
        }
    }

    pub fn save_auxiliary_public_key(&mut self, key: AuxiliaryPublicKey) {
        self.other_guardian_auxiliary_keys
            .insert(key.owner_id.clone(), key);
    }

    pub fn share_election_public_key(&self) -> ElectionPublicKey {
        ElectionPublicKey {
            owner_id: self.object_id.clone(),
            sequence_order: self.sequence_order,
            proof: self.election_keys.proof.clone(),
            key: self.election_keys.key_pair.public_key.clone(),
        }
    }

    pub fn save_election_public_key(&mut self, key: ElectionPublicKey) {
        self.other_guardian_election_keys
            .insert(key.owner_id.clone(), key);
    }

    pub fn all_public_keys_received(&self) -> bool {
        let expected = self.ceremony_details.number_of_guardians as usize;
        self.other_guardian_auxiliary_keys.len() == expected
            && self.other_guardian_election_keys.len() == expected
    }

    /// The election public keys of peers this guardian has seen, by owner id.
    pub fn other_guardian_election_keys(&self) -> &HashMap<String, ElectionPublicKey> {
        &self.other_guardian_election_keys
    }

    /// Generate a partial key backup for every peer whose auxiliary key has
    /// been received.
    pub fn generate_election_partial_key_backups(
        &mut self,
        encryptor: &dyn AuxiliaryEncryptor,
    ) -> Result<()> {
        if !self.all_public_keys_received() {
            return Err(Error::ProtocolState(format!(
                "guardian {} cannot generate backups before all public keys arrive",
                self.object_id
            )));
        }
        let auxiliary_keys: Vec<AuxiliaryPublicKey> = self
            .other_guardian_auxiliary_keys
            .values()
            .filter(|key| key.owner_id != self.object_id)
            .cloned()
            .collect();
        for auxiliary_key in auxiliary_keys {
            let backup = generate_election_partial_key_backup(
                &self.object_id,
                &self.election_keys.polynomial,
                &auxiliary_key,
                encryptor,
            )?;
            self.backups_to_share
                .insert(auxiliary_key.owner_id.clone(), backup);
        }
        Ok(())
    }

    /// The backup destined for one specific peer.
    pub fn share_election_partial_key_backup(
        &self,
        designated_id: &str,
    ) -> Option<&ElectionPartialKeyBackup> {
        self.backups_to_share.get(designated_id)
    }

    /// Record a backup received from a peer.
    pub fn save_election_partial_key_backup(&mut self, backup: ElectionPartialKeyBackup) {
        self.other_guardian_partial_key_backups
            .insert(backup.owner_id.clone(), backup);
    }

    pub fn all_election_partial_key_backups_received(&self) -> bool {
        self.other_guardian_partial_key_backups.len()
            == self.ceremony_details.number_of_guardians as usize - 1
    }

    /// Verify the backup received from `guardian_id` against that guardian's
    /// public commitments.
    pub fn verify_election_partial_key_backup(
        &self,
        guardian_id: &str,
        decryptor: &dyn AuxiliaryDecryptor,
    ) -> Option<ElectionPartialKeyVerification> {
        self.other_guardian_partial_key_backups
            .get(guardian_id)
            .map(|backup| {
                verify_election_partial_key_backup(
                    &self.object_id,
                    backup,
                    &self.auxiliary_keys,
                    decryptor,
                )
            })
    }

    /// Answer a failed verification of a backup this guardian generated by
    /// publishing the coordinate in the clear.
    pub fn publish_election_backup_challenge(
        &self,
        guardian_id: &str,
    ) -> Result<ElectionPartialKeyChallenge> {
        let backup = self.backups_to_share.get(guardian_id).ok_or_else(|| {
            Error::ProtocolState(format!(
                "guardian {} holds no backup for {}",
                self.object_id, guardian_id
            ))
        })?;
        generate_election_partial_key_challenge(backup, &self.election_keys.polynomial)
    }

    /// Re-verify a challenged backup from its published coordinate.
    pub fn verify_election_partial_key_challenge(
        &self,
        challenge: &ElectionPartialKeyChallenge,
    ) -> ElectionPartialKeyVerification {
        verify_election_partial_key_challenge(&self.object_id, challenge)
    }

    /// The commitments and proofs this guardian publishes for post-election
    /// verification.
    pub fn share_coefficient_validation_set(&self) -> CoefficientValidationSet {
        CoefficientValidationSet {
            owner_id: self.object_id.clone(),
            coefficient_commitments: self.election_keys.polynomial.coefficient_commitments.clone(),
            coefficient_proofs: self.election_keys.polynomial.coefficient_proofs.clone(),
        }
    }

    /// The full published record for this guardian.
    pub fn publish_guardian_record(&self) -> GuardianRecord {
        GuardianRecord::publish(
            &self.share_election_public_key(),
            &self.share_coefficient_validation_set(),
        )
    }

    // ------------------------------------------------------------------
    // decryption

    /// This guardian's partial decryption of a ciphertext, with a proof
    /// against its own public key: `M_i = A^s_i mod P`.
    pub fn partially_decrypt(
        &self,
        elgamal: &Ciphertext,
        extended_base_hash: &ElementModQ,
        nonce_seed: Option<&ElementModQ>,
    ) -> DecryptionProofTuple {
        let seed = match nonce_seed {
            Some(seed) => seed.clone(),
            None => rand_q(),
        };
        let partial_decryption = elgamal.partial_decrypt(&self.election_keys.key_pair.secret_key);
        let proof = make_chaum_pedersen(
            elgamal,
            &self.election_keys.key_pair.secret_key,
            &partial_decryption,
            &seed,
            extended_base_hash,
        );
        DecryptionProofTuple {
            decryption: partial_decryption,
            proof,
        }
    }

    /// A compensated partial decryption on behalf of `missing_guardian_id`,
    /// computed from the portion of the missing guardian's polynomial this
    /// guardian received during the ceremony: `M_il = A^P_i(l) mod P`.
    pub fn compensate_decrypt(
        &self,
        missing_guardian_id: &str,
        elgamal: &Ciphertext,
        extended_base_hash: &ElementModQ,
        nonce_seed: Option<&ElementModQ>,
        decryptor: &dyn AuxiliaryDecryptor,
    ) -> Result<DecryptionProofTuple> {
        let backup = self
            .other_guardian_partial_key_backups
            .get(missing_guardian_id)
            .ok_or_else(|| {
                Error::ProtocolState(format!(
                    "guardian {} holds no backup for missing guardian {}",
                    self.object_id, missing_guardian_id
                ))
            })?;

        let partial_secret = decryptor
            .decrypt(&backup.encrypted_value, &self.auxiliary_keys.secret_key)
            .and_then(|hex| ElementModQ::from_hex(&hex))
            .ok_or_else(|| Error::Auxiliary {
                guardian_id: self.object_id.clone(),
            })?;

        let seed = match nonce_seed {
            Some(seed) => seed.clone(),
            None => rand_q(),
        };
        let partial_decryption = elgamal.partial_decrypt(&partial_secret);
        let proof = make_chaum_pedersen(
            elgamal,
            &partial_secret,
            &partial_decryption,
            &seed,
            extended_base_hash,
        );
        Ok(DecryptionProofTuple {
            decryption: partial_decryption,
            proof,
        })
    }

    /// The recovery public key for a missing guardian: `g^P_i(l)` computed
    /// from the missing guardian's public commitments at this guardian's own
    /// coordinate `l`. Compensated shares verify against this key, not the
    /// missing guardian's own key.
    pub fn recovery_public_key_for(&self, missing_guardian_id: &str) -> Result<ElementModP> {
        let backup = self
            .other_guardian_partial_key_backups
            .get(missing_guardian_id)
            .ok_or_else(|| {
                Error::ProtocolState(format!(
                    "guardian {} holds no backup for missing guardian {}",
                    self.object_id, missing_guardian_id
                ))
            })?;
        Ok(compute_g_pow_coordinate(
            u64::from(self.sequence_order),
            &backup.coefficient_commitments,
        ))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::auxiliary::IdentityAuxiliary;
    use crate::crypto::elgamal;

    fn guardian(id: &str, order: u32, seed: u64) -> Guardian {
        Guardian::new(
            id,
            order,
            2,
            2,
            IdentityAuxiliary::key_pair(id),
            Some(&ElementModQ::from(seed)),
        )
        .unwrap()
    }

    #[test]
    fn sequence_order_must_be_in_range() {
        let aux = IdentityAuxiliary::key_pair("g");
        assert!(Guardian::new("g", 0, 3, 2, aux.clone(), None).is_err());
        assert!(Guardian::new("g", 256, 3, 2, aux.clone(), None).is_err());
        assert!(Guardian::new("g", 255, 3, 2, aux, None).is_ok());
    }

    #[test]
    fn guardians_exchange_keys_and_backups() {
        let mut g1 = guardian("guardian-1", 1, 11);
        let mut g2 = guardian("guardian-2", 2, 22);

        g1.save_guardian_public_keys(&g2.share_public_keys());
        g2.save_guardian_public_keys(&g1.share_public_keys());
        assert!(g1.all_public_keys_received());
        assert!(g2.all_public_keys_received());

        g1.generate_election_partial_key_backups(&IdentityAuxiliary).unwrap();
        g2.generate_election_partial_key_backups(&IdentityAuxiliary).unwrap();

        let backup_for_g2 = g1
            .share_election_partial_key_backup("guardian-2")
            .unwrap()
            .clone();
        g2.save_election_partial_key_backup(backup_for_g2);
        assert!(g2.all_election_partial_key_backups_received());

        let verification = g2
            .verify_election_partial_key_backup("guardian-1", &IdentityAuxiliary)
            .unwrap();
        assert!(verification.verified);
    }

    #[test]
    fn backups_require_all_public_keys_first() {
        let mut g1 = guardian("guardian-1", 1, 11);
        assert!(g1
            .generate_election_partial_key_backups(&IdentityAuxiliary)
            .is_err());
    }

    #[test]
    fn partial_decryption_carries_a_valid_proof() {
        let g1 = guardian("guardian-1", 1, 11);
        let public_key = g1.share_election_public_key().key;
        let qbar = ElementModQ::from(40961_u64);
        let ct = elgamal::encrypt(1, &ElementModQ::from(3131_u64), &public_key).unwrap();

        let tuple = g1.partially_decrypt(&ct, &qbar, Some(&ElementModQ::from(5_u64)));
        assert!(tuple
            .proof
            .is_valid(&ct, &public_key, &tuple.decryption, &qbar));
    }

    #[test]
    fn compensated_decryption_verifies_against_the_recovery_key() {
        let mut g1 = guardian("guardian-1", 1, 11);
        let mut g2 = guardian("guardian-2", 2, 22);
        g1.save_guardian_public_keys(&g2.share_public_keys());
        g2.save_guardian_public_keys(&g1.share_public_keys());
        g1.generate_election_partial_key_backups(&IdentityAuxiliary).unwrap();
        g2.generate_election_partial_key_backups(&IdentityAuxiliary).unwrap();
        let backup = g1
            .share_election_partial_key_backup("guardian-2")
            .unwrap()
            .clone();
        g2.save_election_partial_key_backup(backup);

        // a ciphertext under any key will do for the proof relation
        let qbar = ElementModQ::from(40961_u64);
        let joint = crate::key_ceremony::combine_election_public_keys(
            [&g1.share_election_public_key(), &g2.share_election_public_key()]
                .iter()
                .copied(),
        );
        let ct = elgamal::encrypt(1, &ElementModQ::from(3131_u64), &joint).unwrap();

        // g2 compensates for missing g1
        let tuple = g2
            .compensate_decrypt(
                "guardian-1",
                &ct,
                &qbar,
                Some(&ElementModQ::from(6_u64)),
                &IdentityAuxiliary,
            )
            .unwrap();
        let recovery_key = g2.recovery_public_key_for("guardian-1").unwrap();
        assert!(tuple.proof.is_valid(&ct, &recovery_key, &tuple.decryption, &qbar));
        // and not against the missing guardian's own key
        let own_key = g1.share_election_public_key().key;
        assert!(!tuple.proof.is_valid(&ct, &own_key, &tuple.decryption, &qbar));
    }

    #[test]
    fn compensation_without_a_backup_fails() {
        let g1 = guardian("guardian-1", 1, 11);
        let qbar = ElementModQ::from(40961_u64);
        let key = g1.share_election_public_key().key;
        let ct = elgamal::encrypt(0, &ElementModQ::from(77_u64), &key).unwrap();
        assert!(g1
            .compensate_decrypt("nobody", &ct, &qbar, None, &IdentityAuxiliary)
            .is_err());
    }
}
