//! Distributed decryption: per-guardian shares, compensated reconstruction
//! for missing guardians, and the composition of shares into plaintext
//! tallies.

pub mod compute;
pub mod decrypt;
pub mod mediator;
pub mod share;
