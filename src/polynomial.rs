use num::BigUint;
use serde::{Deserialize, Serialize};

use crate::crypto::elgamal::KeyPair;
use crate::crypto::group::{
    g_pow_p, mult_p, rand_q, small_prime, ElementModP, ElementModQ,
};
use crate::crypto::schnorr::SchnorrProof;
use crate::errors::{Error, Result};

/// A guardian's secret sharing polynomial over `Z_Q`, of degree quorum-1.
///
/// The zeroth coefficient is the guardian's election secret key; evaluations
/// at the other guardians' sequence orders become the partial key backups.
/// The commitments `g^a_j` and per-coefficient Schnorr proofs are public.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionPolynomial {
    /// The secret coefficients `a_j`, lowest degree first.
    pub coefficients: Vec<ElementModQ>,
    /// The public commitments `K_j = g^a_j`.
    pub coefficient_commitments: Vec<ElementModP>,
    /// A proof of possession for each secret coefficient.
    pub coefficient_proofs: Vec<SchnorrProof>,
}

impl ElectionPolynomial {
    /// Generate a polynomial with `number_of_coefficients` (= quorum) secret
    /// coefficients. A `nonce` makes generation deterministic for tests;
    /// production callers pass `None` for random coefficients.
    pub fn generate(
        number_of_coefficients: usize,
        nonce: Option<&ElementModQ>,
    ) -> Result<ElectionPolynomial> {
        if number_of_coefficients == 0 {
            return Err(Error::ProtocolState(
                "a sharing polynomial needs at least one coefficient".to_string(),
            ));
        }
        let mut coefficients = Vec::with_capacity(number_of_coefficients);
        let mut commitments = Vec::with_capacity(number_of_coefficients);
        let mut proofs = Vec::with_capacity(number_of_coefficients);

        for i in 0..number_of_coefficients {
            let coefficient = match nonce {
                Some(seed) => seed + &ElementModQ::from(i as u64),
                None => rand_q(),
            };
            let commitment = g_pow_p(&coefficient);
            let proof = SchnorrProof::make(
                &KeyPair {
                    secret_key: coefficient.clone(),
                    public_key: commitment.clone(),
                },
                &rand_q(),
            );
            coefficients.push(coefficient);
            commitments.push(commitment);
            proofs.push(proof);
        }

        Ok(ElectionPolynomial {
            coefficients,
            coefficient_commitments: commitments,
            coefficient_proofs: proofs,
        })
    }
}

/// Evaluate the polynomial at `exponent_modifier` (a guardian's sequence
/// order): `P(x) = sum a_j * x^j mod Q`. The coordinate must be in `[1, Q)`.
pub fn compute_polynomial_coordinate(
    exponent_modifier: u64,
    polynomial: &ElectionPolynomial,
) -> Result<ElementModQ> {
    if exponent_modifier == 0 || BigUint::from(exponent_modifier) >= *small_prime() {
        return Err(Error::OutOfRange(format!(
            "polynomial coordinate {} out of range",
            exponent_modifier
        )));
    }
    let x = ElementModQ::from(exponent_modifier);
    let mut computed: ElementModQ = num::Zero::zero();
    for (j, coefficient) in polynomial.coefficients.iter().enumerate() {
        computed = &computed + &(coefficient * &x.pow_u64(j as u64));
    }
    Ok(computed)
}

/// `g^P(coordinate)` computed only from the public commitments:
/// `prod K_j^(coordinate^j) mod P`.
pub fn compute_g_pow_coordinate(
    coordinate: u64,
    coefficient_commitments: &[ElementModP],
) -> ElementModP {
    let x = BigUint::from(coordinate);
    // the exponent x^j is a plain integer; the commitments have order Q, so
    // the reduction mod Q happens in the group
    let mut exponent = BigUint::from(1_u8);
    let mut powers = Vec::with_capacity(coefficient_commitments.len());
    for commitment in coefficient_commitments {
        powers.push(ElementModP::unchecked(
            commitment
                .as_uint()
                .modpow(&exponent, crate::crypto::group::large_prime()),
        ));
        exponent *= &x;
    }
    mult_p(powers.iter())
}

/// Verify that `expected` is the polynomial's value at `coordinate`, using
/// only the public commitments: `g^expected == prod K_j^(coordinate^j)`.
pub fn verify_polynomial_coordinate(
    expected: &ElementModQ,
    coordinate: u64,
    coefficient_commitments: &[ElementModP],
) -> bool {
    g_pow_p(expected) == compute_g_pow_coordinate(coordinate, coefficient_commitments)
}

/// The Lagrange coefficient for `coordinate` against the other guardians'
/// `degrees`: `prod degrees / prod (degree - coordinate) mod Q`. This is the
/// weight that interpolates the sharing polynomial back to `x = 0`.
pub fn compute_lagrange_coefficient(coordinate: u64, degrees: &[u64]) -> ElementModQ {
    let mut numerator: ElementModQ = num::One::one();
    let mut denominator: ElementModQ = num::One::one();
    for &degree in degrees {
        numerator = &numerator * &ElementModQ::from(degree);
        let difference = &ElementModQ::from(degree) - &ElementModQ::from(coordinate);
        denominator = &denominator * &difference;
    }
    &numerator / &denominator
}

#[cfg(test)]
mod test {
    use super::*;
    use num::Zero;

    #[test]
    fn generated_polynomial_is_consistent() {
        let polynomial = ElectionPolynomial::generate(3, None).unwrap();
        assert_eq!(polynomial.coefficients.len(), 3);
        assert_eq!(polynomial.coefficient_commitments.len(), 3);
        for (j, proof) in polynomial.coefficient_proofs.iter().enumerate() {
            assert!(proof.is_valid(), "coefficient {} proof invalid", j);
            assert_eq!(proof.public_key, polynomial.coefficient_commitments[j]);
        }
    }

    #[test]
    fn zero_coefficients_rejected() {
        assert!(ElectionPolynomial::generate(0, None).is_err());
    }

    #[test]
    fn coordinate_zero_rejected() {
        let polynomial = ElectionPolynomial::generate(2, None).unwrap();
        assert!(compute_polynomial_coordinate(0, &polynomial).is_err());
    }

    #[test]
    fn coordinates_verify_against_commitments() {
        let seed = ElementModQ::from(10007_u64);
        let polynomial = ElectionPolynomial::generate(3, Some(&seed)).unwrap();
        for order in 1..=5_u64 {
            let value = compute_polynomial_coordinate(order, &polynomial).unwrap();
            assert!(verify_polynomial_coordinate(
                &value,
                order,
                &polynomial.coefficient_commitments
            ));
        }
    }

    #[test]
    fn wrong_coordinate_fails_verification() {
        let polynomial = ElectionPolynomial::generate(3, None).unwrap();
        let value = compute_polynomial_coordinate(2, &polynomial).unwrap();
        assert!(!verify_polynomial_coordinate(
            &(&value + &ElementModQ::from(1_u64)),
            2,
            &polynomial.coefficient_commitments
        ));
        assert!(!verify_polynomial_coordinate(
            &value,
            3,
            &polynomial.coefficient_commitments
        ));
    }

    #[test]
    fn lagrange_interpolation_recovers_the_secret() {
        // quorum 3: any 3 of the 5 coordinates reconstruct P(0)
        let polynomial = ElectionPolynomial::generate(3, None).unwrap();
        let secret = polynomial.coefficients[0].clone();

        for orders in &[[1_u64, 2, 3], [1, 3, 5], [2, 4, 5]] {
            let mut reconstructed = ElementModQ::zero();
            for &order in orders.iter() {
                let others: Vec<u64> =
                    orders.iter().copied().filter(|&o| o != order).collect();
                let weight = compute_lagrange_coefficient(order, &others);
                let value = compute_polynomial_coordinate(order, &polynomial).unwrap();
                reconstructed = &reconstructed + &(&weight * &value);
            }
            assert_eq!(reconstructed, secret, "orders {:?}", orders);
        }
    }

    #[test]
    fn lagrange_coefficients_sum_to_one_for_degree_zero() {
        // constant polynomial: every coordinate equals the secret, so the
        // weights must sum to 1
        let orders = [2_u64, 3, 7];
        let mut sum = ElementModQ::zero();
        for &order in &orders {
            let others: Vec<u64> = orders.iter().copied().filter(|&o| o != order).collect();
            sum = &sum + &compute_lagrange_coefficient(order, &others);
        }
        assert_eq!(sum, num::One::one());
    }
}
