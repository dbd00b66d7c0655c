//! Turning plaintext ballots into proof-carrying ciphertext ballots.
//!
//! All randomness on a ballot flows from one master nonce: the ballot derives
//! a nonce seed, each contest derives its nonce from the seed and its own
//! description hash, and each selection derives its nonce from the contest's.
//! Re-encrypting with the same master nonce reproduces the ballot bit for
//! bit, proofs included.

use std::collections::HashMap;

use crate::ballot::{
    get_hash_for_device, CiphertextBallot, CiphertextBallotContest, CiphertextBallotSelection,
    PlaintextBallot, PlaintextBallotContest, PlaintextBallotSelection,
};
use crate::crypto::elgamal;
use crate::crypto::group::{rand_q, ElementModP, ElementModQ};
use crate::crypto::nonces::Nonces;
use crate::election::CiphertextElectionContext;
use crate::errors::{Error, Result};
use crate::manifest::{
    ContestDescription, ContestWithPlaceholders, InternalManifest, SelectionDescription,
};

/// The device performing encryption; its hash starts the tracking chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionDevice {
    pub uuid: u64,
    /// Identifies the session and protects the timestamp.
    pub session_id: String,
    /// Election initialization value.
    pub launch_code: u64,
    pub location: String,
}

impl EncryptionDevice {
    pub fn new(uuid: u64, session_id: &str, launch_code: u64, location: &str) -> EncryptionDevice {
        EncryptionDevice {
            uuid,
            session_id: session_id.to_string(),
            launch_code,
            location: location.to_string(),
        }
    }

    pub fn get_hash(&self) -> ElementModQ {
        get_hash_for_device(self.uuid, &self.session_id, self.launch_code, &self.location)
    }
}

/// Orchestrates ballot encryption on one device, keeping the previous
/// tracking hash so successive ballots chain together.
#[derive(Debug)]
pub struct EncryptionMediator<'a> {
    manifest: &'a InternalManifest,
    context: &'a CiphertextElectionContext,
    previous_tracking_hash: ElementModQ,
}

impl<'a> EncryptionMediator<'a> {
    pub fn new(
        manifest: &'a InternalManifest,
        context: &'a CiphertextElectionContext,
        device: &EncryptionDevice,
    ) -> EncryptionMediator<'a> {
        EncryptionMediator {
            manifest,
            context,
            previous_tracking_hash: device.get_hash(),
        }
    }

    /// Encrypt a ballot under the joint election key, advancing the tracking
    /// chain only when encryption succeeds.
    pub fn encrypt(&mut self, ballot: &PlaintextBallot) -> Result<CiphertextBallot> {
        let encrypted = encrypt_ballot(
            ballot,
            self.manifest,
            self.context,
            &self.previous_tracking_hash,
            None,
            true,
        )?;
        self.previous_tracking_hash = encrypted.tracking_hash.clone();
        Ok(encrypted)
    }
}

/// A `PlaintextBallotSelection` for a description the voter left blank (or a
/// placeholder), explicitly affirmative or negative.
pub fn selection_from(
    description: &SelectionDescription,
    is_placeholder: bool,
    is_affirmative: bool,
) -> PlaintextBallotSelection {
    PlaintextBallotSelection {
        selection_id: description.object_id.clone(),
        vote: if is_affirmative { 1 } else { 0 },
        is_placeholder_selection: is_placeholder,
        extended_data: None,
    }
}

/// An all-false `PlaintextBallotContest` for a contest the voter skipped.
pub fn contest_from(description: &ContestDescription) -> PlaintextBallotContest {
    PlaintextBallotContest {
        contest_id: description.object_id.clone(),
        ballot_selections: description
            .ballot_selections
            .iter()
            .map(|selection| selection_from(selection, false, false))
            .collect(),
    }
}

/// Encrypt a single selection against its description.
///
/// The selection's nonce is drawn from a sequence seeded by the description
/// hash and the contest nonce, at the selection's declared sequence order;
/// the proof nonce is index 0 of the same sequence. The result self-verifies
/// before it is returned.
pub fn encrypt_selection(
    selection: &PlaintextBallotSelection,
    description: &SelectionDescription,
    elgamal_public_key: &ElementModP,
    crypto_extended_base_hash: &ElementModQ,
    nonce_seed: &ElementModQ,
    is_placeholder: bool,
    should_verify_proofs: bool,
) -> Result<CiphertextBallotSelection> {
    if !selection.is_valid(&description.object_id) {
        return Err(Error::invalid(
            &selection.selection_id,
            "selection does not match its description or has a vote outside {0,1}",
        ));
    }

    let description_hash = description.crypto_hash();
    let nonce_sequence = Nonces::seeded(&description_hash, nonce_seed.into());
    let selection_nonce = nonce_sequence.get(u64::from(description.sequence_order));
    let proof_nonce = nonce_sequence.get(0);

    let ciphertext = elgamal::encrypt(
        u64::from(selection.vote),
        &selection_nonce,
        elgamal_public_key,
    )?;

    let encrypted = CiphertextBallotSelection::create(
        &selection.selection_id,
        description_hash.clone(),
        ciphertext,
        elgamal_public_key,
        crypto_extended_base_hash,
        &proof_nonce,
        selection.vote,
        is_placeholder,
        selection_nonce,
        None,
    )?;

    if should_verify_proofs
        && !encrypted.is_valid_encryption(
            &description_hash,
            elgamal_public_key,
            crypto_extended_base_hash,
        )
    {
        return Err(Error::proof(
            &encrypted.object_id,
            "freshly encrypted selection failed self-verification",
        ));
    }
    Ok(encrypted)
}

/// Encrypt a contest against its padded description.
///
/// Selections the voter did not mention are encrypted as explicit false
/// votes; then exactly `number_elected` placeholder selections are appended,
/// as many of them true as needed to bring the total affirmative count up to
/// `number_elected`. This turns undervotes into well-formed n-of-m contests
/// without revealing which real selections were skipped.
pub fn encrypt_contest(
    contest: &PlaintextBallotContest,
    description: &ContestWithPlaceholders,
    elgamal_public_key: &ElementModP,
    crypto_extended_base_hash: &ElementModQ,
    nonce_seed: &ElementModQ,
    should_verify_proofs: bool,
) -> Result<CiphertextBallotContest> {
    let contest_description = &description.contest;
    if !contest.is_valid(
        &contest_description.object_id,
        contest_description.ballot_selections.len(),
        contest_description.number_elected,
        contest_description.votes_allowed,
    ) {
        return Err(Error::invalid(
            &contest.contest_id,
            "contest does not satisfy its description",
        ));
    }
    if !description.is_valid() {
        return Err(Error::invalid(
            &contest_description.object_id,
            "contest description is not valid",
        ));
    }

    let contest_description_hash = contest_description.crypto_hash();
    let nonce_sequence = Nonces::seeded(&contest_description_hash, nonce_seed.into());
    let contest_nonce = nonce_sequence.get(u64::from(contest_description.sequence_order));
    let proof_nonce = nonce_sequence.get(0);

    let plaintext_selections: HashMap<&str, &PlaintextBallotSelection> = contest
        .ballot_selections
        .iter()
        .map(|s| (s.selection_id.as_str(), s))
        .collect();

    let mut selection_count: u32 = 0;
    let mut encrypted_selections = Vec::new();

    // only descriptions from the manifest are encrypted; stray selections on
    // the input contest never make it into the ciphertext
    for selection_description in &contest_description.ballot_selections {
        let encrypted = match plaintext_selections.get(selection_description.object_id.as_str()) {
            Some(plaintext) => {
                selection_count += plaintext.vote;
                encrypt_selection(
                    plaintext,
                    selection_description,
                    elgamal_public_key,
                    crypto_extended_base_hash,
                    &contest_nonce,
                    false,
                    should_verify_proofs,
                )?
            }
            None => encrypt_selection(
                &selection_from(selection_description, false, false),
                selection_description,
                elgamal_public_key,
                crypto_extended_base_hash,
                &contest_nonce,
                false,
                should_verify_proofs,
            )?,
        };
        encrypted_selections.push(encrypted);
    }

    // placeholders soak up the remaining seats
    for placeholder in &description.placeholder_selections {
        let select_placeholder = selection_count < contest_description.number_elected;
        if select_placeholder {
            selection_count += 1;
        }
        let encrypted = encrypt_selection(
            &selection_from(placeholder, true, select_placeholder),
            placeholder,
            elgamal_public_key,
            crypto_extended_base_hash,
            &contest_nonce,
            true,
            should_verify_proofs,
        )?;
        encrypted_selections.push(encrypted);
    }

    let encrypted_contest = CiphertextBallotContest::create(
        &contest.contest_id,
        contest_description_hash.clone(),
        encrypted_selections,
        elgamal_public_key,
        crypto_extended_base_hash,
        &proof_nonce,
        contest_description.number_elected,
        Some(contest_nonce),
    )?;

    if should_verify_proofs
        && !encrypted_contest.is_valid_encryption(
            &contest_description_hash,
            elgamal_public_key,
            crypto_extended_base_hash,
        )
    {
        return Err(Error::proof(
            &encrypted_contest.object_id,
            "freshly encrypted contest failed self-verification",
        ));
    }
    Ok(encrypted_contest)
}

/// Encrypt a whole ballot against the manifest and context.
///
/// Contests the voter skipped entirely are encrypted as all-false contests
/// (whose placeholders then all read true). A ballot that fails any
/// validation or self-verification step produces an error and no partial
/// output.
pub fn encrypt_ballot(
    ballot: &PlaintextBallot,
    manifest: &InternalManifest,
    context: &CiphertextElectionContext,
    previous_tracking_hash: &ElementModQ,
    nonce: Option<ElementModQ>,
    should_verify_proofs: bool,
) -> Result<CiphertextBallot> {
    let style = manifest.get_ballot_style(&ballot.ballot_style).ok_or_else(|| {
        Error::invalid(
            &ballot.object_id,
            format!("ballot style '{}' does not exist in election", ballot.ballot_style),
        )
    })?;
    if !ballot.is_valid(&style.object_id) {
        return Err(Error::invalid(&ballot.object_id, "ballot is not valid"));
    }

    let random_master_nonce = nonce.unwrap_or_else(rand_q);
    let nonce_seed = CiphertextBallot::nonce_seed(
        &manifest.manifest_hash,
        &ballot.object_id,
        &random_master_nonce,
    );

    let plaintext_contests: HashMap<&str, &PlaintextBallotContest> = ballot
        .contests
        .iter()
        .map(|c| (c.contest_id.as_str(), c))
        .collect();

    let mut encrypted_contests = Vec::new();
    for description in manifest.get_contests_for_style(&ballot.ballot_style) {
        let synthesized;
        let use_contest = match plaintext_contests.get(description.contest.object_id.as_str()) {
            Some(contest) => *contest,
            None => {
                synthesized = contest_from(&description.contest);
                &synthesized
            }
        };
        encrypted_contests.push(encrypt_contest(
            use_contest,
            description,
            &context.elgamal_public_key,
            &context.crypto_extended_base_hash,
            &nonce_seed,
            should_verify_proofs,
        )?);
    }

    let encrypted_ballot = CiphertextBallot::create(
        &ballot.object_id,
        &ballot.ballot_style,
        manifest.manifest_hash.clone(),
        previous_tracking_hash.clone(),
        encrypted_contests,
        Some(random_master_nonce),
        None,
        None,
    );

    if should_verify_proofs
        && !encrypted_ballot.is_valid_encryption(
            &manifest.manifest_hash,
            &context.elgamal_public_key,
            &context.crypto_extended_base_hash,
        )
    {
        return Err(Error::proof(
            &encrypted_ballot.object_id,
            "freshly encrypted ballot failed self-verification",
        ));
    }
    Ok(encrypted_ballot)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ballot::CiphertextSelection;
    use crate::crypto::elgamal::KeyPair;
    use crate::election::make_ciphertext_election_context;
    use crate::manifest::{BallotStyle, VoteVariation};

    pub fn simple_manifest() -> InternalManifest {
        let contest = ContestDescription {
            object_id: "contest-1".to_string(),
            electoral_district_id: "district-9".to_string(),
            sequence_order: 0,
            vote_variation: VoteVariation::OneOfM,
            number_elected: 1,
            votes_allowed: Some(1),
            name: "Mayor".to_string(),
            ballot_selections: vec![
                SelectionDescription::new("selection-a", "candidate-a", 0),
                SelectionDescription::new("selection-b", "candidate-b", 1),
            ],
        };
        InternalManifest::new(
            ElementModQ::from(4242_u64),
            vec![BallotStyle {
                object_id: "style-1".to_string(),
                geopolitical_unit_ids: vec!["district-9".to_string()],
            }],
            vec![contest],
        )
    }

    pub fn simple_context(keys: &KeyPair) -> CiphertextElectionContext {
        make_ciphertext_election_context(
            1,
            1,
            keys.public_key.clone(),
            &ElementModQ::from(12_u64),
            ElementModQ::from(4242_u64),
        )
    }

    fn ballot_voting_for_a() -> PlaintextBallot {
        PlaintextBallot::new(
            "ballot-1",
            "style-1",
            vec![PlaintextBallotContest::new(
                "contest-1",
                vec![
                    PlaintextBallotSelection::new("selection-a", 1),
                    PlaintextBallotSelection::new("selection-b", 0),
                ],
            )],
        )
    }

    #[test]
    fn one_of_two_contest_gets_a_true_placeholder_only_on_undervote() {
        let keys = KeyPair::from_secret(ElementModQ::from(31809_u64)).unwrap();
        let context = simple_context(&keys);
        let manifest = simple_manifest();

        let encrypted = encrypt_ballot(
            &ballot_voting_for_a(),
            &manifest,
            &context,
            &ElementModQ::from(1_u64),
            Some(ElementModQ::from(777_u64)),
            true,
        )
        .unwrap();

        let contest = &encrypted.contests[0];
        // two real selections plus number_elected placeholders
        assert_eq!(contest.ballot_selections.len(), 3);
        assert!(contest.ballot_selections[2].is_placeholder());

        // voter chose A, so the placeholder stays false: total is exactly 1
        let total = contest.elgamal_accumulate().unwrap();
        assert_eq!(total.decrypt(&keys.secret_key).unwrap(), 1);

        // selection A decrypts to 1, selection B to 0, placeholder to 0
        let votes: Vec<u64> = contest
            .ballot_selections
            .iter()
            .map(|s| s.ciphertext.decrypt(&keys.secret_key).unwrap())
            .collect();
        assert_eq!(votes, vec![1, 0, 0]);
    }

    #[test]
    fn undervote_fills_placeholder_to_reach_the_limit() {
        let keys = KeyPair::from_secret(ElementModQ::from(31809_u64)).unwrap();
        let context = simple_context(&keys);
        let manifest = simple_manifest();

        // voter made no selection at all in the contest
        let ballot = PlaintextBallot::new("ballot-2", "style-1", vec![]);
        let encrypted = encrypt_ballot(
            &ballot,
            &manifest,
            &context,
            &ElementModQ::from(1_u64),
            Some(ElementModQ::from(778_u64)),
            true,
        )
        .unwrap();

        let contest = &encrypted.contests[0];
        let votes: Vec<u64> = contest
            .ballot_selections
            .iter()
            .map(|s| s.ciphertext.decrypt(&keys.secret_key).unwrap())
            .collect();
        // both real selections false, the placeholder absorbs the seat
        assert_eq!(votes, vec![0, 0, 1]);
        assert!(encrypted.is_valid_encryption(
            &manifest.manifest_hash,
            &keys.public_key,
            &context.crypto_extended_base_hash
        ));
    }

    #[test]
    fn same_master_nonce_reproduces_the_ballot() {
        let keys = KeyPair::from_secret(ElementModQ::from(31809_u64)).unwrap();
        let context = simple_context(&keys);
        let manifest = simple_manifest();
        let nonce = ElementModQ::from(999_u64);
        let prev = ElementModQ::from(1_u64);

        let one = encrypt_ballot(
            &ballot_voting_for_a(),
            &manifest,
            &context,
            &prev,
            Some(nonce.clone()),
            true,
        )
        .unwrap();
        let two = encrypt_ballot(
            &ballot_voting_for_a(),
            &manifest,
            &context,
            &prev,
            Some(nonce),
            true,
        )
        .unwrap();

        assert_eq!(one.crypto_hash, two.crypto_hash);
        assert_eq!(one.contests, two.contests);
        // timestamps may differ, so compare the chain at fixed timestamps
        assert_eq!(
            crate::ballot::get_rotating_tracker_hash(&prev, 7, &one.crypto_hash),
            crate::ballot::get_rotating_tracker_hash(&prev, 7, &two.crypto_hash),
        );
    }

    #[test]
    fn overvote_is_rejected_before_encryption() {
        let keys = KeyPair::from_secret(ElementModQ::from(31809_u64)).unwrap();
        let context = simple_context(&keys);
        let manifest = simple_manifest();

        let ballot = PlaintextBallot::new(
            "ballot-3",
            "style-1",
            vec![PlaintextBallotContest::new(
                "contest-1",
                vec![
                    PlaintextBallotSelection::new("selection-a", 1),
                    PlaintextBallotSelection::new("selection-b", 1),
                ],
            )],
        );
        assert!(encrypt_ballot(
            &ballot,
            &manifest,
            &context,
            &ElementModQ::from(1_u64),
            None,
            true
        )
        .is_err());
    }

    #[test]
    fn unknown_ballot_style_is_rejected() {
        let keys = KeyPair::from_secret(ElementModQ::from(31809_u64)).unwrap();
        let context = simple_context(&keys);
        let manifest = simple_manifest();
        let ballot = PlaintextBallot::new("ballot-4", "no-such-style", vec![]);
        assert!(encrypt_ballot(
            &ballot,
            &manifest,
            &context,
            &ElementModQ::from(1_u64),
            None,
            true
        )
        .is_err());
    }

    #[test]
    fn tampered_ballot_fails_validation() {
        let keys = KeyPair::from_secret(ElementModQ::from(31809_u64)).unwrap();
        let context = simple_context(&keys);
        let manifest = simple_manifest();
        let encrypted = encrypt_ballot(
            &ballot_voting_for_a(),
            &manifest,
            &context,
            &ElementModQ::from(1_u64),
            Some(ElementModQ::from(555_u64)),
            true,
        )
        .unwrap();
        assert!(encrypted.is_valid_encryption(
            &manifest.manifest_hash,
            &keys.public_key,
            &context.crypto_extended_base_hash
        ));

        // flip the ciphertext of one selection
        let mut tampered = encrypted.clone();
        let target = &mut tampered.contests[0].ballot_selections[0];
        target.ciphertext.data = &target.ciphertext.data * crate::crypto::group::generator();
        assert!(!tampered.is_valid_encryption(
            &manifest.manifest_hash,
            &keys.public_key,
            &context.crypto_extended_base_hash
        ));

        // flip a proof challenge
        let mut tampered = encrypted.clone();
        let proof = tampered.contests[0].ballot_selections[1].proof.as_mut().unwrap();
        proof.challenge = &proof.challenge + &ElementModQ::from(1_u64);
        assert!(!tampered.is_valid_encryption(
            &manifest.manifest_hash,
            &keys.public_key,
            &context.crypto_extended_base_hash
        ));

        // swap the contest's stored total for a different valid ciphertext
        let mut tampered = encrypted;
        tampered.contests[0].encrypted_total = crate::crypto::elgamal::encrypt(
            1,
            &ElementModQ::from(31_u64),
            &keys.public_key,
        )
        .unwrap();
        assert!(!tampered.is_valid_encryption(
            &manifest.manifest_hash,
            &keys.public_key,
            &context.crypto_extended_base_hash
        ));
    }

    #[test]
    fn mediator_chains_tracking_hashes() {
        let keys = KeyPair::from_secret(ElementModQ::from(31809_u64)).unwrap();
        let context = simple_context(&keys);
        let manifest = simple_manifest();
        let device = EncryptionDevice::new(1, "session-1", 1221, "precinct-12");
        let mut mediator = EncryptionMediator::new(&manifest, &context, &device);

        let first = mediator.encrypt(&ballot_voting_for_a()).unwrap();
        assert_eq!(first.previous_tracking_hash, device.get_hash());

        let mut second_ballot = ballot_voting_for_a();
        second_ballot.object_id = "ballot-2".to_string();
        let second = mediator.encrypt(&second_ballot).unwrap();
        assert_eq!(second.previous_tracking_hash, first.tracking_hash);
        assert_ne!(first.tracking_hash, second.tracking_hash);
    }
}
