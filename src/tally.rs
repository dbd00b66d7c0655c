//! Homomorphic accumulation of cast ballots into an encrypted tally, and the
//! decrypted tally that eventually comes back out.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::ballot::{BallotBoxState, CiphertextSelection, SubmittedBallot};
use crate::crypto::elgamal::{elgamal_add, Ciphertext};
use crate::crypto::group::{ElementModP, ElementModQ};
use crate::decryption::share::CiphertextDecryptionSelection;
use crate::election::CiphertextElectionContext;
use crate::errors::{Error, Result};
use crate::manifest::InternalManifest;
use crate::scheduler;

/// The accumulation of one selection across every cast ballot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiphertextTallySelection {
    /// The `SelectionDescription.object_id`.
    pub object_id: String,
    pub description_hash: ElementModQ,
    /// The running homomorphic sum; `(1, 1)` before any ballot arrives.
    pub ciphertext: Ciphertext,
}

impl CiphertextSelection for CiphertextTallySelection {
    fn object_id(&self) -> &str {
        &self.object_id
    }
    fn description_hash(&self) -> &ElementModQ {
        &self.description_hash
    }
    fn ciphertext(&self) -> &Ciphertext {
        &self.ciphertext
    }
    fn is_placeholder(&self) -> bool {
        false
    }
}

/// The accumulations for every real selection of one contest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiphertextTallyContest {
    /// The `ContestDescription.object_id`.
    pub object_id: String,
    pub description_hash: ElementModQ,
    /// Keyed by selection id.
    pub selections: BTreeMap<String, CiphertextTallySelection>,
}

/// The frozen encrypted tally of an election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiphertextTally {
    pub object_id: String,
    /// Keyed by contest id.
    pub contests: BTreeMap<String, CiphertextTallyContest>,
}

/// Check a submitted ballot's structure against the election it claims to
/// belong to: known style, the manifest hash it was encrypted under, and
/// contests/selections that exist in the manifest.
pub fn ballot_is_valid_for_election(
    ballot: &SubmittedBallot,
    manifest: &InternalManifest,
    _context: &CiphertextElectionContext,
) -> bool {
    if manifest.get_ballot_style(&ballot.ballot_style).is_none() {
        return false;
    }
    if ballot.description_hash != manifest.manifest_hash {
        return false;
    }
    for contest in &ballot.contests {
        let description = match manifest.contest_for(&contest.object_id) {
            Some(description) => description,
            None => return false,
        };
        if contest.contest_hash != description.contest.crypto_hash() {
            return false;
        }
    }
    true
}

/// The mutable accumulator that folds cast ballots into a tally.
///
/// Batch accumulation is data-parallel per selection: the per-selection sums
/// are computed on the pool, and only the owning thread folds them into the
/// running accumulators after the join.
#[derive(Debug)]
pub struct CiphertextTallyBuilder<'a> {
    object_id: String,
    manifest: &'a InternalManifest,
    context: &'a CiphertextElectionContext,
    /// Ballot ids already folded in; the double-count guard.
    cast_ballot_ids: HashSet<String>,
    spoiled_ballot_ids: HashSet<String>,
    /// Spoiled ballots kept verbatim for later individual decryption.
    spoiled_ballots: Vec<SubmittedBallot>,
    contests: BTreeMap<String, CiphertextTallyContest>,
}

impl<'a> CiphertextTallyBuilder<'a> {
    /// An empty tally shaped by the manifest: one `(1,1)` accumulator per
    /// real selection; placeholders are never tallied.
    pub fn new(
        object_id: &str,
        manifest: &'a InternalManifest,
        context: &'a CiphertextElectionContext,
    ) -> CiphertextTallyBuilder<'a> {
        let contests = manifest
            .contests
            .iter()
            .map(|description| {
                let selections = description
                    .contest
                    .ballot_selections
                    .iter()
                    .map(|selection| {
                        (
                            selection.object_id.clone(),
                            CiphertextTallySelection {
                                object_id: selection.object_id.clone(),
                                description_hash: selection.crypto_hash(),
                                ciphertext: Ciphertext::identity(),
                            },
                        )
                    })
                    .collect();
                (
                    description.contest.object_id.clone(),
                    CiphertextTallyContest {
                        object_id: description.contest.object_id.clone(),
                        description_hash: description.contest.crypto_hash(),
                        selections,
                    },
                )
            })
            .collect();
        CiphertextTallyBuilder {
            object_id: object_id.to_string(),
            manifest,
            context,
            cast_ballot_ids: HashSet::new(),
            spoiled_ballot_ids: HashSet::new(),
            spoiled_ballots: Vec::new(),
            contests,
        }
    }

    pub fn spoiled_ballots(&self) -> &[SubmittedBallot] {
        &self.spoiled_ballots
    }

    /// Append a batch of ballots. Cast ballots that validate and have not
    /// been counted are accumulated, in parallel per selection; spoiled
    /// ballots are retained; everything else is skipped. Returns how many
    /// cast ballots were folded in.
    pub fn batch_append<'b>(
        &mut self,
        ballots: impl IntoIterator<Item = &'b SubmittedBallot>,
    ) -> usize {
        // group the qualifying ballots' ciphertexts by selection id
        let mut per_selection: BTreeMap<String, Vec<Ciphertext>> = BTreeMap::new();
        let mut count = 0;
        for ballot in ballots {
            match ballot.state {
                BallotBoxState::Cast => {
                    if self.cast_ballot_ids.contains(&ballot.object_id)
                        || self.spoiled_ballot_ids.contains(&ballot.object_id)
                        || !ballot_is_valid_for_election(ballot, self.manifest, self.context)
                    {
                        continue;
                    }
                    for contest in &ballot.contests {
                        for selection in &contest.ballot_selections {
                            if selection.is_placeholder_selection {
                                continue;
                            }
                            per_selection
                                .entry(selection.object_id.clone())
                                .or_insert_with(Vec::new)
                                .push(selection.ciphertext.clone());
                        }
                    }
                    self.cast_ballot_ids.insert(ballot.object_id.clone());
                    count += 1;
                }
                BallotBoxState::Spoiled => {
                    let _ = self.append(ballot);
                }
                BallotBoxState::Unknown => {}
            }
        }

        // per-selection sums on the pool; fold in after the join
        let tasks: Vec<_> = per_selection
            .into_iter()
            .map(|(selection_id, ciphertexts)| {
                move || {
                    let sum = elgamal_add(ciphertexts.iter())
                        .expect("batch grouping never produces an empty selection");
                    (selection_id, sum)
                }
            })
            .collect();
        let sums = scheduler::schedule(tasks);

        let mut batch: BTreeMap<String, Ciphertext> = sums.into_iter().collect();
        for contest in self.contests.values_mut() {
            for (selection_id, selection) in contest.selections.iter_mut() {
                if let Some(sum) = batch.remove(selection_id) {
                    selection.ciphertext = &selection.ciphertext * &sum;
                }
            }
        }
        count
    }

    /// Append a single ballot: cast ballots accumulate, spoiled ballots are
    /// retained, unknown-state and duplicate ballots are rejected.
    pub fn append(&mut self, ballot: &SubmittedBallot) -> Result<()> {
        if ballot.state == BallotBoxState::Unknown {
            return Err(Error::invalid(
                &ballot.object_id,
                "cannot tally a ballot in the unknown state",
            ));
        }
        if self.cast_ballot_ids.contains(&ballot.object_id)
            || self.spoiled_ballot_ids.contains(&ballot.object_id)
        {
            return Err(Error::invalid(&ballot.object_id, "ballot already tallied"));
        }
        if !ballot_is_valid_for_election(ballot, self.manifest, self.context) {
            return Err(Error::invalid(
                &ballot.object_id,
                "ballot does not match the election",
            ));
        }
        match ballot.state {
            BallotBoxState::Cast => self.add_cast(ballot),
            BallotBoxState::Spoiled => {
                self.spoiled_ballot_ids.insert(ballot.object_id.clone());
                self.spoiled_ballots.push(ballot.clone());
                Ok(())
            }
            BallotBoxState::Unknown => unreachable!("rejected above"),
        }
    }

    fn add_cast(&mut self, ballot: &SubmittedBallot) -> Result<()> {
        for contest in &ballot.contests {
            let accumulator = self.contests.get_mut(&contest.object_id).ok_or_else(|| {
                Error::invalid(&contest.object_id, "contest is not part of the tally")
            })?;

            // the ballot's real selections must line up exactly with the
            // accumulators for this contest
            let ballot_selection_ids: HashSet<&str> = contest
                .ballot_selections
                .iter()
                .filter(|s| !s.is_placeholder_selection)
                .map(|s| s.object_id.as_str())
                .collect();
            let tally_selection_ids: HashSet<&str> = accumulator
                .selections
                .keys()
                .map(String::as_str)
                .collect();
            if ballot_selection_ids != tally_selection_ids {
                return Err(Error::invalid(
                    &contest.object_id,
                    "ballot selections do not match the tally selections",
                ));
            }

            for selection in &contest.ballot_selections {
                if selection.is_placeholder_selection {
                    continue;
                }
                let running = accumulator
                    .selections
                    .get_mut(&selection.object_id)
                    .expect("id sets were just compared");
                running.ciphertext = &running.ciphertext * &selection.ciphertext;
            }
        }
        self.cast_ballot_ids.insert(ballot.object_id.clone());
        Ok(())
    }

    /// Freeze the accumulation into an immutable tally.
    pub fn build(&self) -> CiphertextTally {
        CiphertextTally {
            object_id: self.object_id.clone(),
            contests: self.contests.clone(),
        }
    }
}

/// Whether a guardian was present or compensated for during decryption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardianState {
    pub guardian_id: String,
    pub sequence_order: u32,
    pub is_missing: bool,
}

/// The decrypted count for one selection, with everything needed to audit
/// it: the decrypted value `g^tally`, the encrypted message it came from,
/// and every guardian's share.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaintextTallySelection {
    pub object_id: String,
    /// The actual count.
    pub tally: u64,
    /// `g^tally`, or `M` in the protocol equations.
    pub value: ElementModP,
    /// The encrypted count this was recovered from.
    pub message: Ciphertext,
    /// One share per guardian (quorum or more).
    pub shares: Vec<CiphertextDecryptionSelection>,
}

/// The decrypted counts of one contest, keyed by selection id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaintextTallyContest {
    pub object_id: String,
    pub selections: BTreeMap<String, PlaintextTallySelection>,
}

/// The decrypted tally (or one decrypted spoiled ballot), with the Lagrange
/// coefficients and guardian states retained for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaintextTally {
    pub object_id: String,
    pub contests: BTreeMap<String, PlaintextTallyContest>,
    /// Keyed by available guardian id; empty when decryption used secrets
    /// directly.
    pub lagrange_coefficients: BTreeMap<String, ElementModQ>,
    pub guardian_states: Vec<GuardianState>,
}
