//! Composing guardians' shares into plaintext results.

use std::collections::BTreeMap;

use crate::ballot::{CiphertextSelection, SubmittedBallot};
use crate::crypto::group::{mult_p, ElementModQ};
use crate::decryption::share::{get_tally_shares_for_selection, DecryptionShare, KeyAndSelection};
use crate::election::CiphertextElectionContext;
use crate::errors::{Error, Result};
use crate::tally::{
    CiphertextTally, GuardianState, PlaintextTally, PlaintextTallyContest, PlaintextTallySelection,
};

/// Decrypt one selection from the assembled shares: verify each share (or
/// its recovered parts), divide the ciphertext's data by the product of all
/// shares, and recover the count by bounded discrete log.
pub fn decrypt_selection_with_decryption_shares<S: CiphertextSelection + ?Sized>(
    selection: &S,
    shares: &BTreeMap<String, KeyAndSelection<'_>>,
    extended_base_hash: &ElementModQ,
    suppress_validity_check: bool,
) -> Result<PlaintextTallySelection> {
    if !suppress_validity_check {
        for (guardian_id, tuple) in shares {
            if !tuple.decryption.is_valid(
                selection.ciphertext(),
                &tuple.public_key,
                extended_base_hash,
            ) {
                return Err(Error::proof(
                    selection.object_id(),
                    format!("share from guardian {} is invalid", guardian_id),
                ));
            }
        }
    }

    // M = B / prod(M_i) mod P
    let all_shares_product = mult_p(shares.values().map(|tuple| &tuple.decryption.share));
    let decrypted_value = &selection.ciphertext().data / &all_shares_product;
    let tally = crate::crypto::dlog::discrete_log(&decrypted_value).ok_or(Error::DlogExceeded)?;

    Ok(PlaintextTallySelection {
        object_id: selection.object_id().to_string(),
        tally,
        value: decrypted_value,
        message: selection.ciphertext().clone(),
        shares: shares
            .values()
            .map(|tuple| tuple.decryption.clone())
            .collect(),
    })
}

/// Decrypt every real selection of a contest. Placeholder selections are
/// skipped: their counts are structural, not votes.
fn decrypt_contest_selections<'a, S: CiphertextSelection + 'a>(
    contest_id: &str,
    selections: impl IntoIterator<Item = &'a S>,
    shares: &BTreeMap<String, DecryptionShare>,
    extended_base_hash: &ElementModQ,
) -> Result<PlaintextTallyContest> {
    let mut plaintext_selections = BTreeMap::new();
    for selection in selections {
        if selection.is_placeholder() {
            continue;
        }
        let selection_shares = get_tally_shares_for_selection(selection.object_id(), shares);
        let plaintext = decrypt_selection_with_decryption_shares(
            selection,
            &selection_shares,
            extended_base_hash,
            false,
        )
        .map_err(|e| match e {
            Error::ProofFailure { object_id, reason } => Error::ProofFailure {
                object_id,
                reason: format!("in contest {}: {}", contest_id, reason),
            },
            other => other,
        })?;
        plaintext_selections.insert(plaintext.object_id.clone(), plaintext);
    }
    Ok(PlaintextTallyContest {
        object_id: contest_id.to_string(),
        selections: plaintext_selections,
    })
}

/// Decrypt a whole ciphertext tally from the given full set of shares.
pub fn decrypt_tally(
    tally: &CiphertextTally,
    shares: &BTreeMap<String, DecryptionShare>,
    context: &CiphertextElectionContext,
    lagrange_coefficients: BTreeMap<String, ElementModQ>,
    guardian_states: Vec<GuardianState>,
) -> Result<PlaintextTally> {
    let mut contests = BTreeMap::new();
    for tally_contest in tally.contests.values() {
        let contest = decrypt_contest_selections(
            &tally_contest.object_id,
            tally_contest.selections.values(),
            shares,
            &context.crypto_extended_base_hash,
        )?;
        contests.insert(tally_contest.object_id.clone(), contest);
    }
    Ok(PlaintextTally {
        object_id: tally.object_id.clone(),
        contests,
        lagrange_coefficients,
        guardian_states,
    })
}

/// Decrypt one (spoiled) ballot into its own per-ballot tally. Here the
/// shares are the per-ballot shares, and placeholders are skipped the same
/// way.
pub fn decrypt_ballot(
    ballot: &SubmittedBallot,
    ballot_shares: &BTreeMap<String, DecryptionShare>,
    extended_base_hash: &ElementModQ,
) -> Result<PlaintextTally> {
    let mut contests = BTreeMap::new();
    for contest in &ballot.contests {
        let plaintext_contest = decrypt_contest_selections(
            &contest.object_id,
            contest.ballot_selections.iter(),
            ballot_shares,
            extended_base_hash,
        )?;
        contests.insert(contest.object_id.clone(), plaintext_contest);
    }
    Ok(PlaintextTally {
        object_id: ballot.object_id.clone(),
        contests,
        lagrange_coefficients: BTreeMap::new(),
        guardian_states: Vec::new(),
    })
}

/// Decrypt every spoiled ballot, keyed by ballot id. Each guardian's full
/// share must carry a nested share for every spoiled ballot.
pub fn decrypt_spoiled_ballots(
    ballots: &[SubmittedBallot],
    shares: &BTreeMap<String, DecryptionShare>,
    context: &CiphertextElectionContext,
) -> Result<BTreeMap<String, PlaintextTally>> {
    let mut result = BTreeMap::new();
    for ballot in ballots {
        let mut ballot_shares = BTreeMap::new();
        for (guardian_id, share) in shares {
            let ballot_share =
                share.spoiled_ballots.get(&ballot.object_id).ok_or_else(|| {
                    Error::ProtocolState(format!(
                        "guardian {} has no share for spoiled ballot {}",
                        guardian_id, ballot.object_id
                    ))
                })?;
            ballot_shares.insert(guardian_id.clone(), ballot_share.clone());
        }
        let decrypted = decrypt_ballot(
            ballot,
            &ballot_shares,
            &context.crypto_extended_base_hash,
        )?;
        result.insert(ballot.object_id.clone(), decrypted);
    }
    Ok(result)
}
