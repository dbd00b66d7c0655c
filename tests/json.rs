//! JSON round-trips for the published artifact types, under the full-size
//! group constants.

use std::collections::BTreeMap;
use std::error::Error;

use electionguard::crypto::chaum_pedersen::{
    make_chaum_pedersen, make_disjunctive_chaum_pedersen, DisjunctiveChaumPedersenProof, Proof,
};
use electionguard::crypto::elgamal::{encrypt, Ciphertext, KeyPair};
use electionguard::crypto::group::{g_pow_p, ElementModP, ElementModQ};
use electionguard::crypto::schnorr::SchnorrProof;
use electionguard::decryption::share::{
    CiphertextDecryptionContest, CiphertextDecryptionSelection, DecryptionShare, SharePayload,
};
use electionguard::election::make_ciphertext_election_context;

fn keypair() -> KeyPair {
    KeyPair::from_secret(ElementModQ::from(1_000_003_u64)).unwrap()
}

#[test]
fn group_elements_round_trip_as_hex() -> Result<(), Box<dyn Error>> {
    let p = g_pow_p(&ElementModQ::from(123_456_u64));
    let encoded = serde_json::to_string(&p)?;
    // hex string form, uppercase
    assert!(encoded.starts_with('"') && encoded.ends_with('"'));
    assert!(!encoded.contains(char::is_lowercase));
    let decoded: ElementModP = serde_json::from_str(&encoded)?;
    assert_eq!(p, decoded);

    let q = ElementModQ::from(98_765_u64);
    let decoded: ElementModQ = serde_json::from_str(&serde_json::to_string(&q)?)?;
    assert_eq!(q, decoded);
    Ok(())
}

#[test]
fn ciphertext_round_trips() -> Result<(), Box<dyn Error>> {
    let keys = keypair();
    let ct = encrypt(1, &ElementModQ::from(777_u64), &keys.public_key).unwrap();
    let decoded: Ciphertext = serde_json::from_str(&serde_json::to_string(&ct)?)?;
    assert_eq!(ct, decoded);
    Ok(())
}

#[test]
fn schnorr_proof_survives_serialization() -> Result<(), Box<dyn Error>> {
    let keys = keypair();
    let proof = SchnorrProof::make(&keys, &ElementModQ::from(5_432_u64));
    let decoded: SchnorrProof = serde_json::from_str(&serde_json::to_string(&proof)?)?;
    assert_eq!(proof, decoded);
    assert!(decoded.is_valid());
    Ok(())
}

#[test]
fn disjunctive_proof_survives_serialization() -> Result<(), Box<dyn Error>> {
    let keys = keypair();
    let qbar = ElementModQ::from(11_111_u64);
    let nonce = ElementModQ::from(13_579_u64);
    let message = encrypt(0, &nonce, &keys.public_key).unwrap();
    let proof = make_disjunctive_chaum_pedersen(
        &message,
        &nonce,
        &keys.public_key,
        &qbar,
        &ElementModQ::from(888_u64),
        0,
    )
    .unwrap();

    let decoded: DisjunctiveChaumPedersenProof =
        serde_json::from_str(&serde_json::to_string(&proof)?)?;
    assert_eq!(proof, decoded);
    assert!(decoded.is_valid(&message, &keys.public_key, &qbar));

    // the tagged union round-trips with its tag
    let tagged = Proof::Disjunctive(proof);
    let json = serde_json::to_string(&tagged)?;
    assert!(json.contains("\"type\""));
    let decoded: Proof = serde_json::from_str(&json)?;
    assert_eq!(tagged, decoded);
    Ok(())
}

#[test]
fn election_context_round_trips() -> Result<(), Box<dyn Error>> {
    let keys = keypair();
    let context = make_ciphertext_election_context(
        5,
        3,
        keys.public_key,
        &ElementModQ::from(99_u64),
        ElementModQ::from(1_234_u64),
    );
    let decoded: electionguard::election::CiphertextElectionContext =
        serde_json::from_str(&serde_json::to_string(&context)?)?;
    assert_eq!(context, decoded);
    Ok(())
}

#[test]
fn decryption_share_round_trips() -> Result<(), Box<dyn Error>> {
    let keys = keypair();
    let qbar = ElementModQ::from(11_111_u64);
    let ct = encrypt(1, &ElementModQ::from(246_u64), &keys.public_key).unwrap();
    let partial = ct.partial_decrypt(&keys.secret_key);
    let proof = make_chaum_pedersen(
        &ct,
        &keys.secret_key,
        &partial,
        &ElementModQ::from(3_u64),
        &qbar,
    );

    let mut selections = BTreeMap::new();
    selections.insert(
        "selection-a".to_string(),
        CiphertextDecryptionSelection {
            object_id: "selection-a".to_string(),
            guardian_id: "guardian-1".to_string(),
            share: partial,
            payload: SharePayload::Proof(proof),
        },
    );
    let mut contests = BTreeMap::new();
    contests.insert(
        "contest-1".to_string(),
        CiphertextDecryptionContest {
            object_id: "contest-1".to_string(),
            guardian_id: "guardian-1".to_string(),
            description_hash: ElementModQ::from(55_u64),
            selections,
        },
    );
    let share = DecryptionShare {
        object_id: "tally-1".to_string(),
        guardian_id: "guardian-1".to_string(),
        public_key: keys.public_key.clone(),
        contests,
        spoiled_ballots: BTreeMap::new(),
    };

    let decoded: DecryptionShare = serde_json::from_str(&serde_json::to_string(&share)?)?;
    assert_eq!(share, decoded);
    Ok(())
}
