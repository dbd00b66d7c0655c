//! Orchestration of the key ceremony.
//!
//! The mediator is an explicit state value owned by the orchestrator; each
//! phase reads messages from the guardians and returns the outgoing
//! material. The ceremony is all-or-nothing: no joint key exists until
//! every guardian announced and every one of the `N*(N-1)` backups verified.

use std::collections::HashMap;

use crate::auxiliary::{AuxiliaryDecryptor, AuxiliaryEncryptor, AuxiliaryPublicKey};
use crate::crypto::group::ElementModP;
use crate::errors::{Error, Result};
use crate::guardian::Guardian;
use crate::key_ceremony::{
    combine_election_public_keys, CeremonyDetails, ElectionPartialKeyBackup,
    ElectionPartialKeyChallenge, ElectionPartialKeyVerification, ElectionPublicKey, GuardianPair,
    PublicKeySet,
};

/// The accumulated state of one key ceremony.
#[derive(Debug, Default)]
pub struct KeyCeremonyMediator {
    ceremony_details: Option<CeremonyDetails>,
    auxiliary_public_keys: HashMap<String, AuxiliaryPublicKey>,
    election_public_keys: HashMap<String, ElectionPublicKey>,
    partial_key_backups: HashMap<GuardianPair, ElectionPartialKeyBackup>,
    partial_key_verifications: HashMap<GuardianPair, ElectionPartialKeyVerification>,
    partial_key_challenges: HashMap<GuardianPair, ElectionPartialKeyChallenge>,
}

impl KeyCeremonyMediator {
    pub fn new(ceremony_details: CeremonyDetails) -> KeyCeremonyMediator {
        KeyCeremonyMediator {
            ceremony_details: Some(ceremony_details),
            ..KeyCeremonyMediator::default()
        }
    }

    fn details(&self) -> CeremonyDetails {
        self.ceremony_details
            .expect("mediator constructed without ceremony details")
    }

    /// Phase 1: a guardian announces itself by sharing its public key set,
    /// and learns the key sets of everyone who announced before it. Once the
    /// last guardian announces, the orchestrator cross-shares all key sets.
    pub fn announce(&mut self, public_key_set: &PublicKeySet) {
        self.auxiliary_public_keys.insert(
            public_key_set.owner_id.clone(),
            AuxiliaryPublicKey {
                owner_id: public_key_set.owner_id.clone(),
                sequence_order: public_key_set.sequence_order,
                key: public_key_set.auxiliary_public_key.clone(),
            },
        );
        self.election_public_keys.insert(
            public_key_set.owner_id.clone(),
            ElectionPublicKey {
                owner_id: public_key_set.owner_id.clone(),
                sequence_order: public_key_set.sequence_order,
                proof: public_key_set.election_public_key_proof.clone(),
                key: public_key_set.election_public_key.clone(),
            },
        );
    }

    pub fn all_guardians_announced(&self) -> bool {
        let expected = self.details().number_of_guardians as usize;
        self.auxiliary_public_keys.len() == expected
            && self.election_public_keys.len() == expected
    }

    pub fn guardians_in_attendance(&self) -> impl Iterator<Item = &String> {
        self.election_public_keys.keys()
    }

    pub fn share_auxiliary_public_keys(&self) -> impl Iterator<Item = &AuxiliaryPublicKey> {
        self.auxiliary_public_keys.values()
    }

    pub fn share_election_public_keys(&self) -> impl Iterator<Item = &ElectionPublicKey> {
        self.election_public_keys.values()
    }

    /// Receive one backup in transit from its owner to its designee.
    /// Self-addressed backups are rejected.
    pub fn receive_election_partial_key_backup(
        &mut self,
        backup: ElectionPartialKeyBackup,
    ) -> Result<()> {
        if backup.owner_id == backup.designated_id {
            return Err(Error::ProtocolState(format!(
                "guardian {} may not back up to itself",
                backup.owner_id
            )));
        }
        self.partial_key_backups.insert(
            GuardianPair::new(&backup.owner_id, &backup.designated_id),
            backup,
        );
        Ok(())
    }

    pub fn all_election_partial_key_backups_available(&self) -> bool {
        let n = self.details().number_of_guardians as usize;
        self.partial_key_backups.len() == n * (n - 1)
    }

    /// The backups addressed to one guardian, from every other guardian in
    /// attendance.
    pub fn share_election_partial_key_backups_to_guardian(
        &self,
        guardian_id: &str,
    ) -> Vec<ElectionPartialKeyBackup> {
        self.election_public_keys
            .keys()
            .filter(|owner| owner.as_str() != guardian_id)
            .filter_map(|owner| {
                self.partial_key_backups
                    .get(&GuardianPair::new(owner, guardian_id))
                    .cloned()
            })
            .collect()
    }

    /// Record the outcome of a guardian verifying a received backup.
    pub fn receive_election_partial_key_verification(
        &mut self,
        verification: ElectionPartialKeyVerification,
    ) {
        if verification.owner_id != verification.designated_id {
            self.partial_key_verifications.insert(
                GuardianPair::new(&verification.owner_id, &verification.designated_id),
                verification,
            );
        }
    }

    pub fn all_election_partial_key_verifications_received(&self) -> bool {
        let n = self.details().number_of_guardians as usize;
        self.partial_key_verifications.len() == n * (n - 1)
    }

    pub fn all_election_partial_key_backups_verified(&self) -> bool {
        self.all_election_partial_key_verifications_received()
            && self
                .partial_key_verifications
                .values()
                .all(|verification| verification.verified)
    }

    /// The guardian pairs whose backup verification failed.
    pub fn share_failed_partial_key_verifications(&self) -> Vec<GuardianPair> {
        self.partial_key_verifications
            .iter()
            .filter(|(_, verification)| !verification.verified)
            .map(|(pair, _)| pair.clone())
            .collect()
    }

    /// Failed pairs that have not yet been answered with a challenge.
    pub fn share_missing_election_partial_key_challenges(&self) -> Vec<GuardianPair> {
        self.share_failed_partial_key_verifications()
            .into_iter()
            .filter(|pair| !self.partial_key_challenges.contains_key(pair))
            .collect()
    }

    /// Receive an owner's challenge answering a failed verification; a
    /// subsequent re-verification replaces the failed one.
    pub fn receive_election_partial_key_challenge(
        &mut self,
        challenge: ElectionPartialKeyChallenge,
    ) {
        self.partial_key_challenges.insert(
            GuardianPair::new(&challenge.owner_id, &challenge.designated_id),
            challenge,
        );
    }

    pub fn share_open_election_partial_key_challenges(
        &self,
    ) -> Vec<ElectionPartialKeyChallenge> {
        self.partial_key_challenges.values().cloned().collect()
    }

    /// Phase 2: generate and route every backup among the announced
    /// guardians. Fails closed if any guardian cannot produce or share a
    /// backup.
    pub fn orchestrate(
        &mut self,
        guardians: &mut [Guardian],
        encryptor: &dyn AuxiliaryEncryptor,
    ) -> Result<()> {
        if !self.all_guardians_announced() {
            return Err(Error::ProtocolState(
                "cannot orchestrate before all guardians announce".to_string(),
            ));
        }

        // every guardian learns every other guardian's keys
        let key_sets: Vec<PublicKeySet> =
            guardians.iter().map(Guardian::share_public_keys).collect();
        for guardian in guardians.iter_mut() {
            for key_set in &key_sets {
                if key_set.owner_id != guardian.object_id {
                    guardian.save_guardian_public_keys(key_set);
                }
            }
        }

        for guardian in guardians.iter_mut() {
            guardian.generate_election_partial_key_backups(encryptor)?;
        }

        // route all N*(N-1) backups through the mediator
        let ids: Vec<String> = guardians.iter().map(|g| g.object_id.clone()).collect();
        for sender in guardians.iter() {
            for recipient_id in &ids {
                if *recipient_id == sender.object_id {
                    continue;
                }
                let backup = sender
                    .share_election_partial_key_backup(recipient_id)
                    .ok_or_else(|| {
                        Error::ProtocolState(format!(
                            "guardian {} could not share a backup with {}",
                            sender.object_id, recipient_id
                        ))
                    })?
                    .clone();
                self.receive_election_partial_key_backup(backup)?;
            }
        }

        // deliver
        for guardian in guardians.iter_mut() {
            for backup in self.share_election_partial_key_backups_to_guardian(&guardian.object_id)
            {
                guardian.save_election_partial_key_backup(backup);
            }
        }
        Ok(())
    }

    /// Phase 3: every guardian verifies every backup it received. A failed
    /// check raises a challenge against the sender, which every guardian can
    /// re-verify from public data alone.
    pub fn verify(
        &mut self,
        guardians: &[Guardian],
        decryptor: &dyn AuxiliaryDecryptor,
    ) -> Result<bool> {
        for recipient in guardians {
            for sender in guardians {
                if sender.object_id == recipient.object_id {
                    continue;
                }
                let verification = recipient
                    .verify_election_partial_key_backup(&sender.object_id, decryptor)
                    .ok_or_else(|| {
                        Error::ProtocolState(format!(
                            "guardian {} never received a backup from {}",
                            recipient.object_id, sender.object_id
                        ))
                    })?;
                self.receive_election_partial_key_verification(verification);
            }
        }

        // resolve failures through the challenge path
        for pair in self.share_missing_election_partial_key_challenges() {
            let owner = guardians
                .iter()
                .find(|g| g.object_id == pair.owner_id)
                .ok_or_else(|| {
                    Error::ProtocolState(format!("no guardian with id {}", pair.owner_id))
                })?;
            let challenge = owner.publish_election_backup_challenge(&pair.designated_id)?;
            self.receive_election_partial_key_challenge(challenge);
        }
        for challenge in self.share_open_election_partial_key_challenges() {
            // any guardian can re-verify; take the first as the arbiter
            if let Some(verifier) = guardians.first() {
                let verification = verifier.verify_election_partial_key_challenge(&challenge);
                self.receive_election_partial_key_verification(verification);
            }
        }

        Ok(self.all_election_partial_key_backups_verified())
    }

    /// Phase 4: the joint election key, available only once everyone
    /// announced and every backup verified.
    pub fn publish_joint_key(&self) -> Result<ElementModP> {
        if !self.all_guardians_announced() {
            return Err(Error::ProtocolState(
                "cannot publish a joint key before all guardians announce".to_string(),
            ));
        }
        if !self.all_election_partial_key_backups_verified() {
            return Err(Error::ProtocolState(
                "cannot publish a joint key before all backups verify".to_string(),
            ));
        }
        Ok(combine_election_public_keys(
            self.election_public_keys.values(),
        ))
    }
}
