//! Plaintext ballots as voters fill them in, encrypted ballots as the
//! encryption device emits them, and submitted (cast or spoiled) ballots as
//! the ballot box retains them.

use serde::{Deserialize, Serialize};

use crate::crypto::chaum_pedersen::{
    make_constant_chaum_pedersen, make_disjunctive_chaum_pedersen, ConstantChaumPedersenProof,
    DisjunctiveChaumPedersenProof,
};
use crate::crypto::elgamal::{elgamal_add, Ciphertext};
use crate::crypto::group::{add_q, ElementModP, ElementModQ};
use crate::errors::{Error, Result};
use crate::hash_elems;

/// Arbitrary voter-supplied data attached to a selection (in practice, a
/// write-in candidate). Discarded at encryption time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendedData {
    pub value: String,
    pub length: u32,
}

/// One plaintext selection: a 0/1 vote for a selection description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaintextBallotSelection {
    /// Matches `SelectionDescription.object_id`.
    pub selection_id: String,
    pub vote: u32,
    pub is_placeholder_selection: bool,
    pub extended_data: Option<ExtendedData>,
}

impl PlaintextBallotSelection {
    pub fn new(selection_id: &str, vote: u32) -> PlaintextBallotSelection {
        PlaintextBallotSelection {
            selection_id: selection_id.to_string(),
            vote,
            is_placeholder_selection: false,
            extended_data: None,
        }
    }

    /// A selection is valid input when it names the expected description and
    /// its vote is zero or one.
    pub fn is_valid(&self, expected_selection_id: &str) -> bool {
        self.selection_id == expected_selection_id && self.vote <= 1
    }
}

/// The selections a voter made in one contest. May be partial: listing only
/// the affirmative votes is legal, the encryptor fills in the rest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaintextBallotContest {
    /// Matches `ContestDescription.object_id`.
    pub contest_id: String,
    pub ballot_selections: Vec<PlaintextBallotSelection>,
}

impl PlaintextBallotContest {
    pub fn new(
        contest_id: &str,
        selections: Vec<PlaintextBallotSelection>,
    ) -> PlaintextBallotContest {
        PlaintextBallotContest {
            contest_id: contest_id.to_string(),
            ballot_selections: selections,
        }
    }

    /// Valid input: right contest, no more selections than the description
    /// offers, and the over-vote limits respected. Undervotes are fine.
    pub fn is_valid(
        &self,
        expected_contest_id: &str,
        expected_number_selections: usize,
        expected_number_elected: u32,
        votes_allowed: Option<u32>,
    ) -> bool {
        if self.contest_id != expected_contest_id {
            return false;
        }
        if self.ballot_selections.len() > expected_number_selections {
            return false;
        }
        let mut number_elected = 0;
        let mut votes = 0;
        for selection in &self.ballot_selections {
            votes += selection.vote;
            if selection.vote >= 1 {
                number_elected += 1;
            }
        }
        if number_elected > expected_number_elected {
            return false;
        }
        if let Some(allowed) = votes_allowed {
            if votes > allowed {
                return false;
            }
        }
        true
    }
}

/// A voter's filled-in ballot, before encryption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaintextBallot {
    /// Unique ballot id assigned by the external system.
    pub object_id: String,
    /// Matches `BallotStyle.object_id`.
    pub ballot_style: String,
    pub contests: Vec<PlaintextBallotContest>,
}

impl PlaintextBallot {
    pub fn new(
        object_id: &str,
        ballot_style: &str,
        contests: Vec<PlaintextBallotContest>,
    ) -> PlaintextBallot {
        PlaintextBallot {
            object_id: object_id.to_string(),
            ballot_style: ballot_style.to_string(),
            contests,
        }
    }

    pub fn is_valid(&self, expected_ballot_style_id: &str) -> bool {
        self.ballot_style == expected_ballot_style_id
    }
}

/// Common view of anything that pairs a selection id with a ciphertext: an
/// encrypted ballot selection or a tally accumulation. Decryption operates
/// through this seam.
pub trait CiphertextSelection {
    fn object_id(&self) -> &str;
    fn description_hash(&self) -> &ElementModQ;
    fn ciphertext(&self) -> &Ciphertext;
    fn is_placeholder(&self) -> bool;
}

/// One encrypted selection with its proof of well-formedness.
///
/// The `nonce` is sensitive: it is carried so proofs can be regenerated from
/// the ballot's master nonce, and stripped when the ballot is submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiphertextBallotSelection {
    pub object_id: String,
    /// The `SelectionDescription.crypto_hash()` this encryption responds to.
    pub description_hash: ElementModQ,
    pub ciphertext: Ciphertext,
    pub crypto_hash: ElementModQ,
    pub is_placeholder_selection: bool,
    pub nonce: Option<ElementModQ>,
    pub proof: Option<DisjunctiveChaumPedersenProof>,
    /// Encrypted write-in payload; carried opaquely.
    pub extended_data: Option<Ciphertext>,
}

impl CiphertextSelection for CiphertextBallotSelection {
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
        self.is_placeholder_selection
    }
}

impl CiphertextBallotSelection {
    /// Assemble an encrypted selection: compute its crypto hash and its
    /// disjunctive proof from the encryption nonce and proof seed.
    pub fn create(
        object_id: &str,
        description_hash: ElementModQ,
        ciphertext: Ciphertext,
        elgamal_public_key: &ElementModP,
        crypto_extended_base_hash: &ElementModQ,
        proof_seed: &ElementModQ,
        selection_vote: u32,
        is_placeholder_selection: bool,
        nonce: ElementModQ,
        extended_data: Option<Ciphertext>,
    ) -> Result<CiphertextBallotSelection> {
        let crypto_hash = selection_crypto_hash(object_id, &description_hash, &ciphertext);
        let proof = make_disjunctive_chaum_pedersen(
            &ciphertext,
            &nonce,
            elgamal_public_key,
            crypto_extended_base_hash,
            proof_seed,
            u64::from(selection_vote),
        )?;
        Ok(CiphertextBallotSelection {
            object_id: object_id.to_string(),
            description_hash,
            ciphertext,
            crypto_hash,
            is_placeholder_selection,
            nonce: Some(nonce),
            proof: Some(proof),
            extended_data,
        })
    }

    /// Recompute the rolling hash against a given seed; uses the ciphertext
    /// but not the proof, so hashes survive proof-later workflows.
    pub fn crypto_hash_with(&self, seed_hash: &ElementModQ) -> ElementModQ {
        selection_crypto_hash(&self.object_id, seed_hash, &self.ciphertext)
    }

    /// Validate the encryption: the description hash matches the seed, the
    /// stored crypto hash recomputes, and the disjunctive proof verifies.
    pub fn is_valid_encryption(
        &self,
        seed_hash: &ElementModQ,
        elgamal_public_key: &ElementModP,
        crypto_extended_base_hash: &ElementModQ,
    ) -> bool {
        if *seed_hash != self.description_hash {
            return false;
        }
        if self.crypto_hash_with(seed_hash) != self.crypto_hash {
            return false;
        }
        match &self.proof {
            None => false,
            Some(proof) => proof.is_valid(
                &self.ciphertext,
                elgamal_public_key,
                crypto_extended_base_hash,
            ),
        }
    }

    /// The same selection with its nonce discarded.
    pub fn remove_nonce(&self) -> CiphertextBallotSelection {
        CiphertextBallotSelection {
            nonce: None,
            ..self.clone()
        }
    }
}

fn selection_crypto_hash(
    object_id: &str,
    seed_hash: &ElementModQ,
    ciphertext: &Ciphertext,
) -> ElementModQ {
    let ciphertext_hash = ciphertext.crypto_hash();
    hash_elems!(object_id, seed_hash, &ciphertext_hash)
}

/// An encrypted contest: every selection (real and placeholder), their
/// homomorphic accumulation, and the proof that the accumulation encrypts
/// exactly `number_elected`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiphertextBallotContest {
    pub object_id: String,
    /// The `ContestDescription.crypto_hash()`.
    pub contest_hash: ElementModQ,
    pub ballot_selections: Vec<CiphertextBallotSelection>,
    pub crypto_hash: ElementModQ,
    /// The accumulation of all selection ciphertexts, `(A, B)`.
    pub encrypted_total: Ciphertext,
    /// The aggregate of the selection nonces; sensitive, stripped on submit.
    pub nonce: Option<ElementModQ>,
    pub proof: Option<ConstantChaumPedersenProof>,
}

impl CiphertextBallotContest {
    /// Assemble an encrypted contest from its encrypted selections: compute
    /// the rolling hash, the homomorphic total, the aggregate nonce, and the
    /// selection-limit proof.
    pub fn create(
        object_id: &str,
        contest_hash: ElementModQ,
        ballot_selections: Vec<CiphertextBallotSelection>,
        elgamal_public_key: &ElementModP,
        crypto_extended_base_hash: &ElementModQ,
        proof_seed: &ElementModQ,
        number_elected: u32,
        nonce: Option<ElementModQ>,
    ) -> Result<CiphertextBallotContest> {
        let crypto_hash = contest_crypto_hash(object_id, &ballot_selections, &contest_hash);
        let encrypted_total = contest_accumulation(&ballot_selections)?;
        let aggregate_nonce = contest_aggregate_nonce(object_id, &ballot_selections)?;

        let proof = make_constant_chaum_pedersen(
            &encrypted_total,
            u64::from(number_elected),
            &aggregate_nonce,
            elgamal_public_key,
            proof_seed,
            crypto_extended_base_hash,
        )?;

        Ok(CiphertextBallotContest {
            object_id: object_id.to_string(),
            contest_hash,
            ballot_selections,
            crypto_hash,
            encrypted_total,
            nonce,
            proof: Some(proof),
        })
    }

    pub fn crypto_hash_with(&self, seed_hash: &ElementModQ) -> ElementModQ {
        contest_crypto_hash(&self.object_id, &self.ballot_selections, seed_hash)
    }

    /// Recompute the homomorphic sum of the selection ciphertexts.
    pub fn elgamal_accumulate(&self) -> Result<Ciphertext> {
        contest_accumulation(&self.ballot_selections)
    }

    /// Validate the contest encryption: hash consistency, the stored total
    /// equals the recomputed accumulation, and the selection-limit proof
    /// verifies. Individual selection proofs are checked separately by the
    /// ballot-level validation.
    pub fn is_valid_encryption(
        &self,
        seed_hash: &ElementModQ,
        elgamal_public_key: &ElementModP,
        crypto_extended_base_hash: &ElementModQ,
    ) -> bool {
        if *seed_hash != self.contest_hash {
            return false;
        }
        if self.crypto_hash_with(seed_hash) != self.crypto_hash {
            return false;
        }
        let accumulation = match self.elgamal_accumulate() {
            Ok(accumulation) => accumulation,
            Err(_) => return false,
        };
        if accumulation != self.encrypted_total {
            return false;
        }
        match &self.proof {
            None => false,
            Some(proof) => {
                proof.is_valid(&accumulation, elgamal_public_key, crypto_extended_base_hash)
            }
        }
    }

    /// The same contest with every nonce discarded.
    pub fn remove_nonces(&self) -> CiphertextBallotContest {
        CiphertextBallotContest {
            nonce: None,
            ballot_selections: self
                .ballot_selections
                .iter()
                .map(CiphertextBallotSelection::remove_nonce)
                .collect(),
            ..self.clone()
        }
    }
}

fn contest_crypto_hash(
    object_id: &str,
    ballot_selections: &[CiphertextBallotSelection],
    seed_hash: &ElementModQ,
) -> ElementModQ {
    let selection_hashes: Vec<ElementModQ> = ballot_selections
        .iter()
        .map(|s| s.crypto_hash.clone())
        .collect();
    hash_elems!(object_id, seed_hash, &selection_hashes)
}

fn contest_accumulation(ballot_selections: &[CiphertextBallotSelection]) -> Result<Ciphertext> {
    elgamal_add(ballot_selections.iter().map(|s| &s.ciphertext))
}

fn contest_aggregate_nonce(
    object_id: &str,
    ballot_selections: &[CiphertextBallotSelection],
) -> Result<ElementModQ> {
    let mut nonces = Vec::with_capacity(ballot_selections.len());
    for selection in ballot_selections {
        match &selection.nonce {
            Some(nonce) => nonces.push(nonce),
            None => {
                return Err(Error::invalid(
                    object_id,
                    "missing selection nonce, cannot compute the aggregate nonce",
                ))
            }
        }
    }
    Ok(add_q(nonces.into_iter()))
}

/// The starting hash for a device's ballot chain.
pub fn get_hash_for_device(
    uuid: u64,
    session_id: &str,
    launch_code: u64,
    location: &str,
) -> ElementModQ {
    hash_elems!(uuid, session_id, launch_code, location)
}

/// The rotated tracking hash chaining one encrypted ballot to the previous
/// one on the same device.
pub fn get_rotating_tracker_hash(
    prev_hash: &ElementModQ,
    timestamp: u64,
    ballot_hash: &ElementModQ,
) -> ElementModQ {
    hash_elems!(prev_hash, timestamp, ballot_hash)
}

/// Render a tracking hash as a human-checkable code: the hex digits in
/// dash-separated groups.
pub fn tracker_hash_to_code(tracker_hash: &ElementModQ) -> String {
    let hex = tracker_hash.to_hex();
    hex.as_bytes()
        .chunks(8)
        .map(|chunk| std::str::from_utf8(chunk).expect("hex is ascii"))
        .collect::<Vec<&str>>()
        .join("-")
}

/// A fully encrypted ballot, chained to its predecessor by the rotating
/// tracking hash. The `nonce` is the master nonce from which every other
/// nonce on the ballot derives; it is sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiphertextBallot {
    pub object_id: String,
    pub ballot_style: String,
    /// Hash of the election manifest this ballot was encrypted under.
    pub description_hash: ElementModQ,
    /// The previous ballot's tracking hash, or the device hash for the first.
    pub previous_tracking_hash: ElementModQ,
    pub contests: Vec<CiphertextBallotContest>,
    pub tracking_hash: ElementModQ,
    /// Seconds since the epoch at encryption time.
    pub timestamp: u64,
    pub crypto_hash: ElementModQ,
    pub nonce: Option<ElementModQ>,
}

impl CiphertextBallot {
    /// Assemble an encrypted ballot: compute its crypto hash and rotate the
    /// tracking chain. A `timestamp` or `tracking_hash` can be supplied for
    /// deterministic tests; both default to the real values.
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        object_id: &str,
        ballot_style: &str,
        description_hash: ElementModQ,
        previous_tracking_hash: ElementModQ,
        contests: Vec<CiphertextBallotContest>,
        nonce: Option<ElementModQ>,
        timestamp: Option<u64>,
        tracking_hash: Option<ElementModQ>,
    ) -> CiphertextBallot {
        let crypto_hash = ballot_crypto_hash(object_id, &contests, &description_hash);
        let timestamp = timestamp.unwrap_or_else(|| chrono::Utc::now().timestamp() as u64);
        let tracking_hash = tracking_hash.unwrap_or_else(|| {
            get_rotating_tracker_hash(&previous_tracking_hash, timestamp, &crypto_hash)
        });
        CiphertextBallot {
            object_id: object_id.to_string(),
            ballot_style: ballot_style.to_string(),
            description_hash,
            previous_tracking_hash,
            contests,
            tracking_hash,
            timestamp,
            crypto_hash,
            nonce,
        }
    }

    /// The seed from which a ballot's contest and selection nonces derive:
    /// `hash(description_hash, ballot_id, master_nonce)`.
    pub fn nonce_seed(
        description_hash: &ElementModQ,
        object_id: &str,
        nonce: &ElementModQ,
    ) -> ElementModQ {
        hash_elems!(description_hash, object_id, nonce)
    }

    /// The nonce seed reconstructed from this ballot's own master nonce, if
    /// it still carries one.
    pub fn hashed_ballot_nonce(&self) -> Option<ElementModQ> {
        self.nonce.as_ref().map(|nonce| {
            CiphertextBallot::nonce_seed(&self.description_hash, &self.object_id, nonce)
        })
    }

    pub fn crypto_hash_with(&self, seed_hash: &ElementModQ) -> ElementModQ {
        ballot_crypto_hash(&self.object_id, &self.contests, seed_hash)
    }

    /// The tracking code voters take home.
    pub fn tracker_code(&self) -> String {
        tracker_hash_to_code(&self.tracking_hash)
    }

    /// Validate the whole encrypted ballot: hash consistency at the ballot
    /// level, then every selection proof and every contest proof.
    pub fn is_valid_encryption(
        &self,
        seed_hash: &ElementModQ,
        elgamal_public_key: &ElementModP,
        crypto_extended_base_hash: &ElementModQ,
    ) -> bool {
        if *seed_hash != self.description_hash {
            return false;
        }
        if self.crypto_hash_with(seed_hash) != self.crypto_hash {
            return false;
        }
        for contest in &self.contests {
            for selection in &contest.ballot_selections {
                if !selection.is_valid_encryption(
                    &selection.description_hash,
                    elgamal_public_key,
                    crypto_extended_base_hash,
                ) {
                    return false;
                }
            }
            if !contest.is_valid_encryption(
                &contest.contest_hash,
                elgamal_public_key,
                crypto_extended_base_hash,
            ) {
                return false;
            }
        }
        true
    }

    /// Convert into a `SubmittedBallot` with the given state, stripping all
    /// nonces.
    pub fn accept_with_state(&self, state: BallotBoxState) -> SubmittedBallot {
        SubmittedBallot {
            object_id: self.object_id.clone(),
            ballot_style: self.ballot_style.clone(),
            description_hash: self.description_hash.clone(),
            previous_tracking_hash: self.previous_tracking_hash.clone(),
            contests: self
                .contests
                .iter()
                .map(CiphertextBallotContest::remove_nonces)
                .collect(),
            tracking_hash: self.tracking_hash.clone(),
            timestamp: self.timestamp,
            crypto_hash: self.crypto_hash.clone(),
            state,
        }
    }
}

fn ballot_crypto_hash(
    object_id: &str,
    contests: &[CiphertextBallotContest],
    seed_hash: &ElementModQ,
) -> ElementModQ {
    let contest_hashes: Vec<ElementModQ> = contests.iter().map(|c| c.crypto_hash.clone()).collect();
    hash_elems!(object_id, seed_hash, &contest_hashes)
}

/// What the ballot box decided about a ballot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BallotBoxState {
    /// Counted in the tally.
    Cast,
    /// Decrypted individually for audit, never counted.
    Spoiled,
    /// Not yet decided; never accepted into a tally.
    Unknown,
}

/// An encrypted ballot accepted for inclusion in the election record: cast
/// or spoiled, all proofs retained, every nonce removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedBallot {
    pub object_id: String,
    pub ballot_style: String,
    pub description_hash: ElementModQ,
    pub previous_tracking_hash: ElementModQ,
    pub contests: Vec<CiphertextBallotContest>,
    pub tracking_hash: ElementModQ,
    pub timestamp: u64,
    pub crypto_hash: ElementModQ,
    pub state: BallotBoxState,
}

impl SubmittedBallot {
    pub fn is_valid_encryption(
        &self,
        seed_hash: &ElementModQ,
        elgamal_public_key: &ElementModP,
        crypto_extended_base_hash: &ElementModQ,
    ) -> bool {
        let as_ballot = CiphertextBallot {
            object_id: self.object_id.clone(),
            ballot_style: self.ballot_style.clone(),
            description_hash: self.description_hash.clone(),
            previous_tracking_hash: self.previous_tracking_hash.clone(),
            contests: self.contests.clone(),
            tracking_hash: self.tracking_hash.clone(),
            timestamp: self.timestamp,
            crypto_hash: self.crypto_hash.clone(),
            nonce: None,
        };
        as_ballot.is_valid_encryption(seed_hash, elgamal_public_key, crypto_extended_base_hash)
    }
}
