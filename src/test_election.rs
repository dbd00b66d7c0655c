//! Whole-protocol tests: ceremony, encryption, accumulation, decryption,
//! with and without missing guardians.

use std::collections::BTreeMap;

use crate::auxiliary::IdentityAuxiliary;
use crate::ballot::{
    BallotBoxState, PlaintextBallot, PlaintextBallotContest, PlaintextBallotSelection,
    SubmittedBallot,
};
use crate::crypto::group::ElementModQ;
use crate::decryption::mediator::DecryptionMediator;
use crate::election::{make_ciphertext_election_context, CiphertextElectionContext};
use crate::encrypt::{encrypt_ballot, EncryptionDevice, EncryptionMediator};
use crate::guardian::Guardian;
use crate::hash_elems;
use crate::key_ceremony::CeremonyDetails;
use crate::key_ceremony_mediator::KeyCeremonyMediator;
use crate::manifest::{
    BallotStyle, ContestDescription, InternalManifest, SelectionDescription, VoteVariation,
};
use crate::tally::{CiphertextTally, CiphertextTallyBuilder, PlaintextTally};

fn two_contest_manifest() -> InternalManifest {
    let mayor = ContestDescription {
        object_id: "mayor".to_string(),
        electoral_district_id: "district-9".to_string(),
        sequence_order: 0,
        vote_variation: VoteVariation::OneOfM,
        number_elected: 1,
        votes_allowed: Some(1),
        name: "Mayor".to_string(),
        ballot_selections: vec![
            SelectionDescription::new("mayor-alice", "alice", 0),
            SelectionDescription::new("mayor-bob", "bob", 1),
        ],
    };
    let council = ContestDescription {
        object_id: "council".to_string(),
        electoral_district_id: "district-9".to_string(),
        sequence_order: 1,
        vote_variation: VoteVariation::NOfM,
        number_elected: 2,
        votes_allowed: Some(2),
        name: "City Council".to_string(),
        ballot_selections: vec![
            SelectionDescription::new("council-carol", "carol", 0),
            SelectionDescription::new("council-dave", "dave", 1),
            SelectionDescription::new("council-erin", "erin", 2),
        ],
    };
    InternalManifest::new(
        ElementModQ::from(36000_u64),
        vec![BallotStyle {
            object_id: "style-1".to_string(),
            geopolitical_unit_ids: vec!["district-9".to_string()],
        }],
        vec![mayor, council],
    )
}

struct TestElection {
    guardians: Vec<Guardian>,
    manifest: InternalManifest,
    context: CiphertextElectionContext,
}

/// Run the key ceremony and assemble the election context.
fn setup_election(number_of_guardians: u32, quorum: u32) -> TestElection {
    let details = CeremonyDetails::new(number_of_guardians, quorum).unwrap();
    let mut mediator = KeyCeremonyMediator::new(details);
    let mut guardians: Vec<Guardian> = (1..=number_of_guardians)
        .map(|order| {
            Guardian::new(
                &format!("guardian-{}", order),
                order,
                number_of_guardians,
                quorum,
                IdentityAuxiliary::key_pair(&format!("guardian-{}", order)),
                Some(&ElementModQ::from(2000 + 97 * u64::from(order))),
            )
            .unwrap()
        })
        .collect();

    for guardian in &guardians {
        mediator.announce(&guardian.share_public_keys());
    }
    mediator
        .orchestrate(&mut guardians, &IdentityAuxiliary)
        .unwrap();
    assert!(mediator.verify(&guardians, &IdentityAuxiliary).unwrap());
    let joint_key = mediator.publish_joint_key().unwrap();

    // hash of all guardian commitments, as the publisher would compute it
    let commitment_hashes: Vec<ElementModQ> = guardians
        .iter()
        .map(|g| {
            let set = g.share_coefficient_validation_set();
            hash_elems!(&set.owner_id, &set.coefficient_commitments)
        })
        .collect();
    let commitment_hash = hash_elems!(&commitment_hashes);

    let manifest = two_contest_manifest();
    let context = make_ciphertext_election_context(
        number_of_guardians,
        quorum,
        joint_key,
        &commitment_hash,
        manifest.manifest_hash.clone(),
    );
    TestElection {
        guardians,
        manifest,
        context,
    }
}

fn vote(
    ballot_id: &str,
    mayor_choice: &str,
    council_choices: &[&str],
) -> PlaintextBallot {
    let mayor_selections = vec![PlaintextBallotSelection::new(mayor_choice, 1)];
    let council_selections = council_choices
        .iter()
        .map(|choice| PlaintextBallotSelection::new(choice, 1))
        .collect();
    PlaintextBallot::new(
        ballot_id,
        "style-1",
        vec![
            PlaintextBallotContest::new("mayor", mayor_selections),
            PlaintextBallotContest::new("council", council_selections),
        ],
    )
}

/// Encrypt and cast a fixed slate of ballots, spoil one, and build the tally.
fn cast_and_tally(election: &TestElection) -> (CiphertextTally, Vec<SubmittedBallot>) {
    let device = EncryptionDevice::new(42, "session-1", 1221, "precinct-7");
    let mut encrypter = EncryptionMediator::new(&election.manifest, &election.context, &device);

    let ballots = vec![
        vote("ballot-1", "mayor-alice", &["council-carol", "council-dave"]),
        vote("ballot-2", "mayor-alice", &["council-carol"]),
        vote("ballot-3", "mayor-bob", &["council-erin", "council-carol"]),
    ];
    let mut submitted: Vec<SubmittedBallot> = ballots
        .iter()
        .map(|ballot| {
            encrypter
                .encrypt(ballot)
                .unwrap()
                .accept_with_state(BallotBoxState::Cast)
        })
        .collect();

    // one spoiled ballot, never counted
    let spoiled = encrypter
        .encrypt(&vote(
            "ballot-spoiled",
            "mayor-bob",
            &["council-dave", "council-erin"],
        ))
        .unwrap()
        .accept_with_state(BallotBoxState::Spoiled);
    submitted.push(spoiled);

    let mut builder =
        CiphertextTallyBuilder::new("tally-1", &election.manifest, &election.context);
    assert_eq!(builder.batch_append(submitted.iter()), 3);
    let spoiled_ballots = builder.spoiled_ballots().to_vec();
    (builder.build(), spoiled_ballots)
}

fn counts(tally: &PlaintextTally) -> BTreeMap<String, u64> {
    tally
        .contests
        .values()
        .flat_map(|contest| {
            contest
                .selections
                .values()
                .map(|s| (s.object_id.clone(), s.tally))
        })
        .collect()
}

fn expected_counts() -> BTreeMap<String, u64> {
    vec![
        ("mayor-alice", 2_u64),
        ("mayor-bob", 1),
        ("council-carol", 3),
        ("council-dave", 1),
        ("council-erin", 1),
    ]
    .into_iter()
    .map(|(id, count)| (id.to_string(), count))
    .collect()
}

#[test]
fn all_guardians_present_decrypt_the_tally() {
    let election = setup_election(3, 2);
    let (tally, spoiled) = cast_and_tally(&election);

    let mut mediator = DecryptionMediator::new(&election.context, &tally, &spoiled);
    for guardian in &election.guardians {
        mediator.announce(guardian).unwrap();
    }
    let plaintext = mediator.decrypt_tally(&IdentityAuxiliary).unwrap();
    assert_eq!(counts(&plaintext), expected_counts());
    assert!(plaintext.guardian_states.iter().all(|s| !s.is_missing));
}

#[test]
fn missing_guardians_are_compensated() {
    let election = setup_election(5, 3);
    let (tally, spoiled) = cast_and_tally(&election);

    // everyone present
    let mut full = DecryptionMediator::new(&election.context, &tally, &spoiled);
    for guardian in &election.guardians {
        full.announce(guardian).unwrap();
    }
    let with_all = full.decrypt_tally(&IdentityAuxiliary).unwrap();

    // guardians 2 and 4 never show up
    let mut partial = DecryptionMediator::new(&election.context, &tally, &spoiled);
    for guardian in &election.guardians {
        if guardian.object_id == "guardian-2" || guardian.object_id == "guardian-4" {
            continue;
        }
        partial.announce(guardian).unwrap();
    }
    assert_eq!(partial.available_guardian_count(), 3);
    let with_missing = partial.decrypt_tally(&IdentityAuxiliary).unwrap();

    // the compensated decryption agrees exactly with the full one
    assert_eq!(counts(&with_missing), counts(&with_all));
    assert_eq!(counts(&with_missing), expected_counts());

    let missing: Vec<&str> = with_missing
        .guardian_states
        .iter()
        .filter(|s| s.is_missing)
        .map(|s| s.guardian_id.as_str())
        .collect();
    assert_eq!(missing, vec!["guardian-2", "guardian-4"]);
    assert_eq!(with_missing.lagrange_coefficients.len(), 3);
}

#[test]
fn below_quorum_decryption_fails() {
    let election = setup_election(5, 3);
    let (tally, spoiled) = cast_and_tally(&election);

    let mut mediator = DecryptionMediator::new(&election.context, &tally, &spoiled);
    for guardian in election.guardians.iter().take(2) {
        mediator.announce(guardian).unwrap();
    }
    assert!(mediator.decrypt_tally(&IdentityAuxiliary).is_err());
}

#[test]
fn spoiled_ballots_decrypt_individually() {
    let election = setup_election(3, 2);
    let (tally, spoiled) = cast_and_tally(&election);

    let mut mediator = DecryptionMediator::new(&election.context, &tally, &spoiled);
    for guardian in &election.guardians {
        mediator.announce(guardian).unwrap();
    }
    mediator.decrypt_tally(&IdentityAuxiliary).unwrap();

    let decrypted = mediator.decrypted_spoiled_ballots().unwrap();
    let ballot_tally = &decrypted["ballot-spoiled"];
    let ballot_counts = counts(ballot_tally);
    assert_eq!(ballot_counts["mayor-bob"], 1);
    assert_eq!(ballot_counts["mayor-alice"], 0);
    assert_eq!(ballot_counts["council-dave"], 1);
    assert_eq!(ballot_counts["council-erin"], 1);
    assert_eq!(ballot_counts["council-carol"], 0);
}

#[test]
fn announcing_twice_is_idempotent() {
    let election = setup_election(3, 2);
    let (tally, spoiled) = cast_and_tally(&election);

    let mut mediator = DecryptionMediator::new(&election.context, &tally, &spoiled);
    mediator.announce(&election.guardians[0]).unwrap();
    mediator.announce(&election.guardians[0]).unwrap();
    assert_eq!(mediator.available_guardian_count(), 1);
}

#[test]
fn ballot_round_trip_with_known_nonce() {
    let election = setup_election(3, 3);
    let ballot = vote("rt-ballot", "mayor-alice", &["council-dave", "council-erin"]);
    let nonce = ElementModQ::from(4321_u64);

    let encrypted = encrypt_ballot(
        &ballot,
        &election.manifest,
        &election.context,
        &ElementModQ::from(9_u64),
        Some(nonce),
        true,
    )
    .unwrap();

    // with every guardian present the ballot decrypts back to the votes cast
    let submitted = encrypted.accept_with_state(BallotBoxState::Spoiled);
    let mut builder =
        CiphertextTallyBuilder::new("tally-rt", &election.manifest, &election.context);
    builder.append(&submitted).unwrap();
    let tally = builder.build();
    let spoiled = builder.spoiled_ballots().to_vec();

    let mut mediator = DecryptionMediator::new(&election.context, &tally, &spoiled);
    for guardian in &election.guardians {
        mediator.announce(guardian).unwrap();
    }
    mediator.decrypt_tally(&IdentityAuxiliary).unwrap();
    let decrypted = &mediator.decrypted_spoiled_ballots().unwrap()["rt-ballot"];
    let ballot_counts = counts(decrypted);
    assert_eq!(ballot_counts["mayor-alice"], 1);
    assert_eq!(ballot_counts["mayor-bob"], 0);
    assert_eq!(ballot_counts["council-dave"], 1);
    assert_eq!(ballot_counts["council-erin"], 1);
    assert_eq!(ballot_counts["council-carol"], 0);
}

#[test]
fn guardian_records_publish_and_verify() {
    let election = setup_election(3, 2);
    for guardian in &election.guardians {
        let record = guardian.publish_guardian_record();
        assert!(record.is_valid());
        assert_eq!(record.election_commitments.len(), 2);
    }
}
