//! An end-to-end-verifiable election cryptography engine.
//!
//! The pipeline: a quorum-tolerant [key ceremony](key_ceremony) establishes a
//! joint ElGamal key from independent guardians; [ballot
//! encryption](encrypt) produces proof-carrying ciphertext ballots chained by
//! a rotating tracking hash; cast ballots accumulate homomorphically into a
//! [ciphertext tally](tally); and a quorum of guardians (tolerating any
//! minority being absent) [decrypts](decryption) the tally, reconstructing
//! missing guardians' contributions by Lagrange interpolation over
//! compensated shares.
//!
//! Election manifests, wire serialization, the RSA transport wrapper and all
//! orchestration live outside this crate; the [`manifest`] and [`auxiliary`]
//! modules carry just the interfaces the protocol consumes.

pub mod auxiliary;
pub mod ballot;
pub mod crypto;
pub mod decryption;
pub mod election;
pub mod encrypt;
pub mod errors;
pub mod guardian;
pub mod key_ceremony;
pub mod key_ceremony_mediator;
pub mod manifest;
pub mod polynomial;
pub mod scheduler;
mod serialize;
pub mod tally;

#[cfg(test)]
mod test_election;
