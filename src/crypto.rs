//! The cryptographic protocol layer: modular group arithmetic, the
//! Fiat-Shamir hash, deterministic nonces, exponential ElGamal, and the
//! Schnorr / Chaum-Pedersen proof system.

pub mod chaum_pedersen;
pub mod dlog;
pub mod elgamal;
pub mod group;
pub mod hash;
pub mod nonces;
pub mod schnorr;
