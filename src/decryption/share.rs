use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::crypto::chaum_pedersen::ChaumPedersenProof;
use crate::crypto::elgamal::Ciphertext;
use crate::crypto::group::{ElementModP, ElementModQ};

/// How a guardian's share of one selection is vouched for: either the
/// guardian was present and proved its own partial decryption, or the share
/// was reconstructed and carries the compensated parts it came from. Exactly
/// one of the two, by construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SharePayload {
    /// A direct share, proved against the guardian's own public key.
    Proof(ChaumPedersenProof),
    /// A reconstructed share: the compensated parts, keyed by the available
    /// guardian that computed each, each proved against its recovery key.
    Recovered(BTreeMap<String, CiphertextCompensatedDecryptionSelection>),
}

/// One guardian's share of the decryption of one selection, `M_i`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiphertextDecryptionSelection {
    /// The selection this share decrypts.
    pub object_id: String,
    /// The guardian this share belongs to, present or missing.
    pub guardian_id: String,
    /// The share itself.
    pub share: ElementModP,
    pub payload: SharePayload,
}

impl CiphertextDecryptionSelection {
    /// Check this share against the ciphertext it decrypts. A direct share
    /// must verify against the guardian's own public key; a reconstructed
    /// share is checked part by part, each against its recovery key.
    pub fn is_valid(
        &self,
        message: &Ciphertext,
        election_public_key: &ElementModP,
        extended_base_hash: &ElementModQ,
    ) -> bool {
        match &self.payload {
            SharePayload::Proof(proof) => {
                proof.is_valid(message, election_public_key, &self.share, extended_base_hash)
            }
            SharePayload::Recovered(parts) => parts.values().all(|part| {
                part.proof
                    .is_valid(message, &part.recovery_key, &part.share, extended_base_hash)
            }),
        }
    }
}

/// One guardian's shares for every selection of one contest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiphertextDecryptionContest {
    /// The contest id.
    pub object_id: String,
    pub guardian_id: String,
    pub description_hash: ElementModQ,
    /// Keyed by selection id.
    pub selections: BTreeMap<String, CiphertextDecryptionSelection>,
}

/// A compensated part: one available guardian's contribution toward a
/// missing guardian's share of one selection, `M_il`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiphertextCompensatedDecryptionSelection {
    /// The selection id.
    pub object_id: String,
    /// The available guardian that computed this part.
    pub guardian_id: String,
    /// The missing guardian the part stands in for.
    pub missing_guardian_id: String,
    pub share: ElementModP,
    /// `g^P_missing(l)`: the public image of the backup coordinate the part
    /// was computed from. The proof verifies against this, not against the
    /// missing guardian's own key.
    pub recovery_key: ElementModP,
    pub proof: ChaumPedersenProof,
}

/// An available guardian's compensated parts for every selection of one
/// contest, on behalf of one missing guardian.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiphertextCompensatedDecryptionContest {
    /// The contest id.
    pub object_id: String,
    pub guardian_id: String,
    pub missing_guardian_id: String,
    pub description_hash: ElementModQ,
    /// Keyed by selection id.
    pub selections: BTreeMap<String, CiphertextCompensatedDecryptionSelection>,
}

/// Everything one guardian contributes to decrypting a tally: a share per
/// cast selection, plus a nested share per spoiled ballot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptionShare {
    /// The tally (or, for nested shares, ballot) this decrypts.
    pub object_id: String,
    pub guardian_id: String,
    /// The guardian's election public key.
    pub public_key: ElementModP,
    /// Keyed by contest id.
    pub contests: BTreeMap<String, CiphertextDecryptionContest>,
    /// Keyed by ballot id; empty on the nested per-ballot shares.
    pub spoiled_ballots: BTreeMap<String, DecryptionShare>,
}

/// Everything one available guardian contributes on behalf of one missing
/// guardian.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompensatedDecryptionShare {
    pub object_id: String,
    /// The available guardian that computed this share.
    pub guardian_id: String,
    pub missing_guardian_id: String,
    /// The available guardian's election public key.
    pub public_key: ElementModP,
    pub contests: BTreeMap<String, CiphertextCompensatedDecryptionContest>,
    pub spoiled_ballots: BTreeMap<String, CompensatedDecryptionShare>,
}

/// A guardian's public key paired with its share for one selection; the unit
/// the share-product decryption consumes.
#[derive(Debug, Clone)]
pub struct KeyAndSelection<'a> {
    pub public_key: ElementModP,
    pub decryption: &'a CiphertextDecryptionSelection,
}

/// Collect, from every guardian's full share, the piece that speaks about
/// one selection. Keyed by guardian id.
pub fn get_tally_shares_for_selection<'a>(
    selection_id: &str,
    shares: &'a BTreeMap<String, DecryptionShare>,
) -> BTreeMap<String, KeyAndSelection<'a>> {
    let mut collected = BTreeMap::new();
    for share in shares.values() {
        for contest in share.contests.values() {
            if let Some(selection) = contest.selections.get(selection_id) {
                collected.insert(
                    share.guardian_id.clone(),
                    KeyAndSelection {
                        public_key: share.public_key.clone(),
                        decryption: selection,
                    },
                );
            }
        }
    }
    collected
}
