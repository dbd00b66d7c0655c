//! The decryption state machine over a fixed tally and spoiled-ballot set.
//!
//! Guardians announce themselves one by one; each announcement computes and
//! stores that guardian's direct share. If fewer than quorum ever announce,
//! decryption fails. If some (but at least quorum) announced, every missing
//! guardian's share is reconstructed from compensated shares before the
//! tally is decrypted.

use std::collections::BTreeMap;

use crate::auxiliary::AuxiliaryDecryptor;
use crate::ballot::SubmittedBallot;
use crate::decryption::compute::{
    compute_compensated_decryption_share, compute_decryption_share,
    compute_lagrange_coefficients_for_guardians, reconstruct_missing_decryption_shares,
};
use crate::decryption::decrypt::{decrypt_spoiled_ballots, decrypt_tally};
use crate::decryption::share::{CompensatedDecryptionShare, DecryptionShare};
use crate::election::CiphertextElectionContext;
use crate::errors::{Error, Result};
use crate::guardian::Guardian;
use crate::key_ceremony::ElectionPublicKey;
use crate::tally::{CiphertextTally, GuardianState, PlaintextTally};

/// Composes guardians' partial (or compensated) decryptions into the
/// plaintext tally.
pub struct DecryptionMediator<'a> {
    context: &'a CiphertextElectionContext,
    tally: &'a CiphertextTally,
    spoiled_ballots: &'a [SubmittedBallot],

    available_guardians: BTreeMap<String, Guardian>,
    /// Guardians reported missing, with the public key their peers vouch for.
    missing_guardians: BTreeMap<String, ElectionPublicKey>,
    /// Direct shares, keyed by available guardian id.
    decryption_shares: BTreeMap<String, DecryptionShare>,
    /// Compensated shares: missing guardian id -> available guardian id.
    compensated_decryption_shares: BTreeMap<String, BTreeMap<String, CompensatedDecryptionShare>>,

    decrypted_tally: Option<PlaintextTally>,
    decrypted_spoiled_ballots: Option<BTreeMap<String, PlaintextTally>>,
}

impl<'a> DecryptionMediator<'a> {
    pub fn new(
        context: &'a CiphertextElectionContext,
        tally: &'a CiphertextTally,
        spoiled_ballots: &'a [SubmittedBallot],
    ) -> DecryptionMediator<'a> {
        DecryptionMediator {
            context,
            tally,
            spoiled_ballots,
            available_guardians: BTreeMap::new(),
            missing_guardians: BTreeMap::new(),
            decryption_shares: BTreeMap::new(),
            compensated_decryption_shares: BTreeMap::new(),
            decrypted_tally: None,
            decrypted_spoiled_ballots: None,
        }
    }

    /// Announce a guardian as present: compute and store its direct share.
    /// Announcing twice is a no-op. The guardian's view of which peers are
    /// missing is folded in; two guardians disagreeing about a missing
    /// peer's public key aborts the announcement.
    pub fn announce(&mut self, guardian: &Guardian) -> Result<()> {
        if self.available_guardians.contains_key(&guardian.object_id) {
            return Ok(());
        }

        let share = compute_decryption_share(
            guardian,
            self.tally,
            self.context,
            self.spoiled_ballots,
        )?;
        self.decryption_shares
            .insert(guardian.object_id.clone(), share);
        self.available_guardians
            .insert(guardian.object_id.clone(), guardian.clone());

        // this guardian is certainly not missing
        self.missing_guardians.remove(&guardian.object_id);

        // fold in this guardian's view of the absent peers
        for (peer_id, public_key) in guardian.other_guardian_election_keys() {
            if self.available_guardians.contains_key(peer_id) {
                continue;
            }
            match self.missing_guardians.get(peer_id) {
                Some(known) if known.key != public_key.key => {
                    return Err(Error::ProtocolState(format!(
                        "guardian {} reports a conflicting public key for missing guardian {}",
                        guardian.object_id, peer_id
                    )));
                }
                Some(_) => {}
                None => {
                    self.missing_guardians
                        .insert(peer_id.clone(), public_key.clone());
                }
            }
        }
        Ok(())
    }

    pub fn available_guardian_count(&self) -> usize {
        self.available_guardians.len()
    }

    /// Compensate for one missing guardian: every available guardian
    /// contributes a compensated share, or the whole compensation fails.
    /// Compensating twice is a no-op.
    pub fn compensate(
        &mut self,
        missing_guardian_id: &str,
        decryptor: &dyn AuxiliaryDecryptor,
    ) -> Result<()> {
        if self
            .compensated_decryption_shares
            .contains_key(missing_guardian_id)
        {
            return Ok(());
        }
        if self.available_guardians.contains_key(missing_guardian_id) {
            return Err(Error::ProtocolState(format!(
                "guardian {} announced; it needs no compensation",
                missing_guardian_id
            )));
        }

        let mut shares = BTreeMap::new();
        for guardian in self.available_guardians.values() {
            let share = compute_compensated_decryption_share(
                guardian,
                missing_guardian_id,
                self.tally,
                self.spoiled_ballots,
                self.context,
                decryptor,
            )?;
            shares.insert(guardian.object_id.clone(), share);
        }

        if shares.len() != self.available_guardians.len() {
            return Err(Error::ProtocolState(format!(
                "compensation for {} produced {} shares from {} available guardians",
                missing_guardian_id,
                shares.len(),
                self.available_guardians.len()
            )));
        }
        self.compensated_decryption_shares
            .insert(missing_guardian_id.to_string(), shares);
        Ok(())
    }

    /// Decrypt the tally (and the spoiled ballots along with it).
    ///
    /// Fails if fewer than quorum guardians announced. With everyone present
    /// the stored direct shares decrypt the tally; otherwise every missing
    /// guardian is compensated for, its share reconstructed, and the merged
    /// set of exactly `number_of_guardians` shares does the decryption.
    pub fn decrypt_tally(
        &mut self,
        decryptor: &dyn AuxiliaryDecryptor,
    ) -> Result<PlaintextTally> {
        if let Some(tally) = &self.decrypted_tally {
            return Ok(tally.clone());
        }

        if (self.available_guardians.len() as u32) < self.context.quorum {
            return Err(Error::ProtocolState(format!(
                "cannot decrypt with {} of quorum {} guardians",
                self.available_guardians.len(),
                self.context.quorum
            )));
        }

        let available: Vec<(String, u32)> = self
            .available_guardians
            .values()
            .map(|g| (g.object_id.clone(), g.sequence_order()))
            .collect();
        let lagrange_coefficients = compute_lagrange_coefficients_for_guardians(&available);

        let mut guardian_states: Vec<GuardianState> = self
            .available_guardians
            .values()
            .map(|g| GuardianState {
                guardian_id: g.object_id.clone(),
                sequence_order: g.sequence_order(),
                is_missing: false,
            })
            .collect();
        for key in self.missing_guardians.values() {
            guardian_states.push(GuardianState {
                guardian_id: key.owner_id.clone(),
                sequence_order: key.sequence_order,
                is_missing: true,
            });
        }

        let all_present =
            self.available_guardians.len() as u32 == self.context.number_of_guardians;

        let merged_shares: BTreeMap<String, DecryptionShare> = if all_present {
            self.decryption_shares.clone()
        } else {
            let missing_ids: Vec<String> = self.missing_guardians.keys().cloned().collect();
            for missing_id in &missing_ids {
                self.compensate(missing_id, decryptor)?;
            }
            let reconstructed = reconstruct_missing_decryption_shares(
                self.tally,
                &self.missing_guardians,
                &self.compensated_decryption_shares,
                &lagrange_coefficients,
                self.spoiled_ballots,
            )?;
            if reconstructed.len() != self.missing_guardians.len() {
                return Err(Error::ProtocolState(
                    "reconstruction did not cover every missing guardian".to_string(),
                ));
            }
            let mut merged = self.decryption_shares.clone();
            merged.extend(reconstructed);
            merged
        };

        if merged_shares.len() as u32 != self.context.number_of_guardians {
            return Err(Error::ProtocolState(format!(
                "have {} shares for {} guardians",
                merged_shares.len(),
                self.context.number_of_guardians
            )));
        }

        let spoiled = decrypt_spoiled_ballots(self.spoiled_ballots, &merged_shares, self.context)?;
        let tally = decrypt_tally(
            self.tally,
            &merged_shares,
            self.context,
            lagrange_coefficients,
            guardian_states,
        )?;

        self.decrypted_spoiled_ballots = Some(spoiled);
        self.decrypted_tally = Some(tally.clone());
        Ok(tally)
    }

    /// The decrypted spoiled ballots, keyed by ballot id; present once
    /// `decrypt_tally` has succeeded.
    pub fn decrypted_spoiled_ballots(&self) -> Option<&BTreeMap<String, PlaintextTally>> {
        self.decrypted_spoiled_ballots.as_ref()
    }
}
