//! Computing decryption shares: directly for a present guardian, and
//! compensated on behalf of a missing one; plus the Lagrange reconstruction
//! that turns compensated parts back into the missing guardian's share.

use std::collections::BTreeMap;

use crate::auxiliary::AuxiliaryDecryptor;
use crate::ballot::{CiphertextSelection, SubmittedBallot};
use crate::crypto::elgamal::Ciphertext;
use crate::crypto::group::{mult_p, ElementModP, ElementModQ};
use crate::decryption::share::{
    CiphertextCompensatedDecryptionContest, CiphertextCompensatedDecryptionSelection,
    CiphertextDecryptionContest, CiphertextDecryptionSelection, CompensatedDecryptionShare,
    DecryptionShare, SharePayload,
};
use crate::election::CiphertextElectionContext;
use crate::errors::{Error, Result};
use crate::guardian::Guardian;
use crate::key_ceremony::ElectionPublicKey;
use crate::polynomial::compute_lagrange_coefficient;
use crate::scheduler;
use crate::tally::CiphertextTally;

/// A selection's id, description hash and ciphertext, detached from whichever
/// structure held it, so a worker task owns all of its inputs.
#[derive(Debug, Clone)]
struct SelectionJob {
    object_id: String,
    ciphertext: Ciphertext,
}

fn selection_jobs<'a, S: CiphertextSelection + 'a>(
    selections: impl IntoIterator<Item = &'a S>,
) -> Vec<SelectionJob> {
    selections
        .into_iter()
        .map(|selection| SelectionJob {
            object_id: selection.object_id().to_string(),
            ciphertext: selection.ciphertext().clone(),
        })
        .collect()
}

/// Compute one guardian's full decryption share for a tally and its spoiled
/// ballots. Fails closed if any single selection fails, naming the guardian
/// and selection.
pub fn compute_decryption_share(
    guardian: &Guardian,
    tally: &CiphertextTally,
    context: &CiphertextElectionContext,
    spoiled_ballots: &[SubmittedBallot],
) -> Result<DecryptionShare> {
    let mut contests = BTreeMap::new();
    for tally_contest in tally.contests.values() {
        let selections = compute_selections_for_guardian(
            guardian,
            context,
            selection_jobs(tally_contest.selections.values()),
        )?;
        contests.insert(
            tally_contest.object_id.clone(),
            CiphertextDecryptionContest {
                object_id: tally_contest.object_id.clone(),
                guardian_id: guardian.object_id.clone(),
                description_hash: tally_contest.description_hash.clone(),
                selections,
            },
        );
    }

    let mut spoiled_ballot_shares = BTreeMap::new();
    for ballot in spoiled_ballots {
        let share = compute_decryption_share_for_ballot(guardian, ballot, context)?;
        spoiled_ballot_shares.insert(ballot.object_id.clone(), share);
    }

    Ok(DecryptionShare {
        object_id: tally.object_id.clone(),
        guardian_id: guardian.object_id.clone(),
        public_key: guardian.share_election_public_key().key,
        contests,
        spoiled_ballots: spoiled_ballot_shares,
    })
}

/// One guardian's decryption share for a single (spoiled) ballot.
pub fn compute_decryption_share_for_ballot(
    guardian: &Guardian,
    ballot: &SubmittedBallot,
    context: &CiphertextElectionContext,
) -> Result<DecryptionShare> {
    let mut contests = BTreeMap::new();
    for contest in &ballot.contests {
        let selections = compute_selections_for_guardian(
            guardian,
            context,
            selection_jobs(contest.ballot_selections.iter()),
        )?;
        contests.insert(
            contest.object_id.clone(),
            CiphertextDecryptionContest {
                object_id: contest.object_id.clone(),
                guardian_id: guardian.object_id.clone(),
                description_hash: contest.contest_hash.clone(),
                selections,
            },
        );
    }
    Ok(DecryptionShare {
        object_id: ballot.object_id.clone(),
        guardian_id: guardian.object_id.clone(),
        public_key: guardian.share_election_public_key().key,
        contests,
        spoiled_ballots: BTreeMap::new(),
    })
}

/// Partially decrypt every selection in a batch, one pool task per
/// selection, and self-check every proof before accepting the batch.
fn compute_selections_for_guardian(
    guardian: &Guardian,
    context: &CiphertextElectionContext,
    jobs: Vec<SelectionJob>,
) -> Result<BTreeMap<String, CiphertextDecryptionSelection>> {
    let tasks: Vec<_> = jobs
        .into_iter()
        .map(|job| {
            move || {
                compute_decryption_share_for_selection(
                    guardian,
                    &job.object_id,
                    &job.ciphertext,
                    context,
                )
            }
        })
        .collect();

    let mut selections = BTreeMap::new();
    for result in scheduler::schedule(tasks) {
        let selection = result?;
        selections.insert(selection.object_id.clone(), selection);
    }
    Ok(selections)
}

/// A guardian's partial decryption of one selection, proof self-checked.
pub fn compute_decryption_share_for_selection(
    guardian: &Guardian,
    selection_id: &str,
    ciphertext: &Ciphertext,
    context: &CiphertextElectionContext,
) -> Result<CiphertextDecryptionSelection> {
    let tuple =
        guardian.partially_decrypt(ciphertext, &context.crypto_extended_base_hash, None);
    let public_key = guardian.share_election_public_key().key;
    if !tuple.proof.is_valid(
        ciphertext,
        &public_key,
        &tuple.decryption,
        &context.crypto_extended_base_hash,
    ) {
        return Err(Error::proof(
            selection_id,
            format!(
                "guardian {} produced an invalid decryption-share proof",
                guardian.object_id
            ),
        ));
    }
    Ok(CiphertextDecryptionSelection {
        object_id: selection_id.to_string(),
        guardian_id: guardian.object_id.clone(),
        share: tuple.decryption,
        payload: SharePayload::Proof(tuple.proof),
    })
}

/// Compute an available guardian's compensated share on behalf of a missing
/// guardian, over the whole tally and its spoiled ballots.
pub fn compute_compensated_decryption_share(
    guardian: &Guardian,
    missing_guardian_id: &str,
    tally: &CiphertextTally,
    spoiled_ballots: &[SubmittedBallot],
    context: &CiphertextElectionContext,
    decryptor: &dyn AuxiliaryDecryptor,
) -> Result<CompensatedDecryptionShare> {
    let mut contests = BTreeMap::new();
    for tally_contest in tally.contests.values() {
        let selections = compute_compensated_selections(
            guardian,
            missing_guardian_id,
            context,
            decryptor,
            selection_jobs(tally_contest.selections.values()),
        )?;
        contests.insert(
            tally_contest.object_id.clone(),
            CiphertextCompensatedDecryptionContest {
                object_id: tally_contest.object_id.clone(),
                guardian_id: guardian.object_id.clone(),
                missing_guardian_id: missing_guardian_id.to_string(),
                description_hash: tally_contest.description_hash.clone(),
                selections,
            },
        );
    }

    let mut spoiled_ballot_shares = BTreeMap::new();
    for ballot in spoiled_ballots {
        let mut ballot_contests = BTreeMap::new();
        for contest in &ballot.contests {
            let selections = compute_compensated_selections(
                guardian,
                missing_guardian_id,
                context,
                decryptor,
                selection_jobs(contest.ballot_selections.iter()),
            )?;
            ballot_contests.insert(
                contest.object_id.clone(),
                CiphertextCompensatedDecryptionContest {
                    object_id: contest.object_id.clone(),
                    guardian_id: guardian.object_id.clone(),
                    missing_guardian_id: missing_guardian_id.to_string(),
                    description_hash: contest.contest_hash.clone(),
                    selections,
                },
            );
        }
        spoiled_ballot_shares.insert(
            ballot.object_id.clone(),
            CompensatedDecryptionShare {
                object_id: ballot.object_id.clone(),
                guardian_id: guardian.object_id.clone(),
                missing_guardian_id: missing_guardian_id.to_string(),
                public_key: guardian.share_election_public_key().key,
                contests: ballot_contests,
                spoiled_ballots: BTreeMap::new(),
            },
        );
    }

    Ok(CompensatedDecryptionShare {
        object_id: tally.object_id.clone(),
        guardian_id: guardian.object_id.clone(),
        missing_guardian_id: missing_guardian_id.to_string(),
        public_key: guardian.share_election_public_key().key,
        contests,
        spoiled_ballots: spoiled_ballot_shares,
    })
}

fn compute_compensated_selections(
    guardian: &Guardian,
    missing_guardian_id: &str,
    context: &CiphertextElectionContext,
    decryptor: &dyn AuxiliaryDecryptor,
    jobs: Vec<SelectionJob>,
) -> Result<BTreeMap<String, CiphertextCompensatedDecryptionSelection>> {
    let tasks: Vec<_> = jobs
        .into_iter()
        .map(|job| {
            move || {
                compute_compensated_decryption_share_for_selection(
                    guardian,
                    missing_guardian_id,
                    &job.object_id,
                    &job.ciphertext,
                    context,
                    decryptor,
                )
            }
        })
        .collect();

    let mut selections = BTreeMap::new();
    for result in scheduler::schedule(tasks) {
        let selection = result?;
        selections.insert(selection.object_id.clone(), selection);
    }
    Ok(selections)
}

/// An available guardian's compensated part for one selection, proved and
/// self-checked against the recovery public key.
pub fn compute_compensated_decryption_share_for_selection(
    guardian: &Guardian,
    missing_guardian_id: &str,
    selection_id: &str,
    ciphertext: &Ciphertext,
    context: &CiphertextElectionContext,
    decryptor: &dyn AuxiliaryDecryptor,
) -> Result<CiphertextCompensatedDecryptionSelection> {
    let tuple = guardian.compensate_decrypt(
        missing_guardian_id,
        ciphertext,
        &context.crypto_extended_base_hash,
        None,
        decryptor,
    )?;
    let recovery_key = guardian.recovery_public_key_for(missing_guardian_id)?;
    if !tuple.proof.is_valid(
        ciphertext,
        &recovery_key,
        &tuple.decryption,
        &context.crypto_extended_base_hash,
    ) {
        return Err(Error::proof(
            selection_id,
            format!(
                "guardian {} produced an invalid compensated proof for missing guardian {}",
                guardian.object_id, missing_guardian_id
            ),
        ));
    }
    Ok(CiphertextCompensatedDecryptionSelection {
        object_id: selection_id.to_string(),
        guardian_id: guardian.object_id.clone(),
        missing_guardian_id: missing_guardian_id.to_string(),
        share: tuple.decryption,
        recovery_key,
        proof: tuple.proof,
    })
}

/// The Lagrange coefficient of every available guardian against the rest of
/// the available set, keyed by guardian id.
pub fn compute_lagrange_coefficients_for_guardians(
    available_guardians: &[(String, u32)],
) -> BTreeMap<String, ElementModQ> {
    available_guardians
        .iter()
        .map(|(guardian_id, sequence_order)| {
            let other_orders: Vec<u64> = available_guardians
                .iter()
                .filter(|(other_id, _)| other_id != guardian_id)
                .map(|(_, order)| u64::from(*order))
                .collect();
            (
                guardian_id.clone(),
                compute_lagrange_coefficient(u64::from(*sequence_order), &other_orders),
            )
        })
        .collect()
}

/// Reconstruct the full decryption share of every missing guardian from the
/// compensated shares: for each selection, the reconstructed share is
/// `prod (M_il)^(w_l)` over the available guardians `l`.
pub fn reconstruct_missing_decryption_shares(
    tally: &CiphertextTally,
    missing_guardians: &BTreeMap<String, ElectionPublicKey>,
    compensated_shares: &BTreeMap<String, BTreeMap<String, CompensatedDecryptionShare>>,
    lagrange_coefficients: &BTreeMap<String, ElementModQ>,
    spoiled_ballots: &[SubmittedBallot],
) -> Result<BTreeMap<String, DecryptionShare>> {
    let mut reconstructed = BTreeMap::new();
    for (missing_guardian_id, shares) in compensated_shares {
        let public_key = missing_guardians.get(missing_guardian_id).ok_or_else(|| {
            Error::ProtocolState(format!(
                "no public key for missing guardian {}",
                missing_guardian_id
            ))
        })?;

        let contests =
            reconstruct_decryption_contests(missing_guardian_id, tally, shares, lagrange_coefficients)?;

        let mut ballot_shares = BTreeMap::new();
        for ballot in spoiled_ballots {
            let mut shares_for_ballot = BTreeMap::new();
            for (available_guardian_id, compensated_share) in shares {
                let ballot_share = compensated_share
                    .spoiled_ballots
                    .get(&ballot.object_id)
                    .ok_or_else(|| {
                        Error::ProtocolState(format!(
                            "guardian {} has no compensated share for spoiled ballot {}",
                            available_guardian_id, ballot.object_id
                        ))
                    })?;
                shares_for_ballot.insert(available_guardian_id.clone(), ballot_share.clone());
            }
            let share = reconstruct_decryption_ballot(
                missing_guardian_id,
                public_key,
                ballot,
                &shares_for_ballot,
                lagrange_coefficients,
            )?;
            ballot_shares.insert(ballot.object_id.clone(), share);
        }

        reconstructed.insert(
            missing_guardian_id.clone(),
            DecryptionShare {
                object_id: tally.object_id.clone(),
                guardian_id: missing_guardian_id.clone(),
                public_key: public_key.key.clone(),
                contests,
                spoiled_ballots: ballot_shares,
            },
        );
    }
    Ok(reconstructed)
}

fn reconstruct_decryption_contests(
    missing_guardian_id: &str,
    tally: &CiphertextTally,
    shares: &BTreeMap<String, CompensatedDecryptionShare>,
    lagrange_coefficients: &BTreeMap<String, ElementModQ>,
) -> Result<BTreeMap<String, CiphertextDecryptionContest>> {
    let mut contests = BTreeMap::new();
    for (contest_id, tally_contest) in &tally.contests {
        let mut selections = BTreeMap::new();
        for selection_id in tally_contest.selections.keys() {
            let parts = collect_compensated_parts(
                missing_guardian_id,
                contest_id,
                selection_id,
                shares,
            )?;
            let share = interpolate_share(&parts, lagrange_coefficients)?;
            selections.insert(
                selection_id.clone(),
                CiphertextDecryptionSelection {
                    object_id: selection_id.clone(),
                    guardian_id: missing_guardian_id.to_string(),
                    share,
                    payload: SharePayload::Recovered(parts),
                },
            );
        }
        contests.insert(
            contest_id.clone(),
            CiphertextDecryptionContest {
                object_id: contest_id.clone(),
                guardian_id: missing_guardian_id.to_string(),
                description_hash: tally_contest.description_hash.clone(),
                selections,
            },
        );
    }
    Ok(contests)
}

/// Reconstruct a missing guardian's share for one spoiled ballot.
pub fn reconstruct_decryption_ballot(
    missing_guardian_id: &str,
    public_key: &ElectionPublicKey,
    ballot: &SubmittedBallot,
    shares: &BTreeMap<String, CompensatedDecryptionShare>,
    lagrange_coefficients: &BTreeMap<String, ElementModQ>,
) -> Result<DecryptionShare> {
    let mut contests = BTreeMap::new();
    for contest in &ballot.contests {
        let mut selections = BTreeMap::new();
        for selection in &contest.ballot_selections {
            let parts = collect_compensated_parts(
                missing_guardian_id,
                &contest.object_id,
                &selection.object_id,
                shares,
            )?;
            let share = interpolate_share(&parts, lagrange_coefficients)?;
            selections.insert(
                selection.object_id.clone(),
                CiphertextDecryptionSelection {
                    object_id: selection.object_id.clone(),
                    guardian_id: missing_guardian_id.to_string(),
                    share,
                    payload: SharePayload::Recovered(parts),
                },
            );
        }
        contests.insert(
            contest.object_id.clone(),
            CiphertextDecryptionContest {
                object_id: contest.object_id.clone(),
                guardian_id: missing_guardian_id.to_string(),
                description_hash: contest.contest_hash.clone(),
                selections,
            },
        );
    }
    Ok(DecryptionShare {
        object_id: ballot.object_id.clone(),
        guardian_id: missing_guardian_id.to_string(),
        public_key: public_key.key.clone(),
        contests,
        spoiled_ballots: BTreeMap::new(),
    })
}

/// Pull each available guardian's compensated part for one selection.
fn collect_compensated_parts(
    missing_guardian_id: &str,
    contest_id: &str,
    selection_id: &str,
    shares: &BTreeMap<String, CompensatedDecryptionShare>,
) -> Result<BTreeMap<String, CiphertextCompensatedDecryptionSelection>> {
    let mut parts = BTreeMap::new();
    for (available_guardian_id, compensated_share) in shares {
        let part = compensated_share
            .contests
            .get(contest_id)
            .and_then(|contest| contest.selections.get(selection_id))
            .ok_or_else(|| {
                Error::ProtocolState(format!(
                    "guardian {} is missing a compensated part for {} on behalf of {}",
                    available_guardian_id, selection_id, missing_guardian_id
                ))
            })?;
        parts.insert(available_guardian_id.clone(), part.clone());
    }
    Ok(parts)
}

/// `prod (M_il)^(w_l)`: the Lagrange interpolation of the compensated parts
/// back to the missing guardian's own share.
fn interpolate_share(
    parts: &BTreeMap<String, CiphertextCompensatedDecryptionSelection>,
    lagrange_coefficients: &BTreeMap<String, ElementModQ>,
) -> Result<ElementModP> {
    let mut factors = Vec::with_capacity(parts.len());
    for (available_guardian_id, part) in parts {
        let coefficient = lagrange_coefficients.get(available_guardian_id).ok_or_else(|| {
            Error::ProtocolState(format!(
                "no lagrange coefficient for guardian {}",
                available_guardian_id
            ))
        })?;
        factors.push(part.share.pow(coefficient));
    }
    Ok(mult_p(factors.iter()))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn lagrange_coefficients_cover_every_available_guardian() {
        let available = vec![
            ("guardian-1".to_string(), 1_u32),
            ("guardian-3".to_string(), 3),
            ("guardian-5".to_string(), 5),
        ];
        let coefficients = compute_lagrange_coefficients_for_guardians(&available);
        assert_eq!(coefficients.len(), 3);
        for (id, _) in &available {
            assert!(coefficients.contains_key(id));
        }
        // weights for a threshold set must sum to one
        let sum = crate::crypto::group::add_q(coefficients.values());
        assert_eq!(sum, num::One::one());
    }
}
