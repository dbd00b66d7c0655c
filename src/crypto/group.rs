use lazy_static::lazy_static;
use num::bigint::RandBigInt;
use num::traits::{One, Zero};
use num::BigUint;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// An element of the large prime field: an integer in `[0, P)`.
///
/// Pads, ciphertext data, public keys, commitments and decryption shares all
/// live here. Elements that are additionally quadratic residues of order `Q`
/// can be recognized with [`ElementModP::is_valid_residue`].
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementModP {
    #[serde(with = "crate::serialize::big_uint")]
    elem: BigUint,
}

/// An element of the prime-order subgroup domain: an integer in `[0, Q)`.
///
/// Secrets, nonces, challenges, responses, polynomial coefficients and hash
/// outputs all live here; every exponent in the protocol is reduced mod `Q`.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementModQ {
    #[serde(with = "crate::serialize::big_uint")]
    elem: BigUint,
}

impl fmt::Debug for ElementModP {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ElementModP({})", self.to_hex())
    }
}

impl fmt::Debug for ElementModQ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ElementModQ({})", self.to_hex())
    }
}

fn to_even_hex(value: &BigUint) -> String {
    let mut hex = value.to_str_radix(16).to_uppercase();
    if hex.len() % 2 == 1 {
        hex.insert(0, '0');
    }
    hex
}

impl ElementModP {
    /// Inject an integer into `[0, P)`. Out-of-range values are rejected,
    /// never wrapped.
    pub fn new(value: BigUint) -> Option<ElementModP> {
        if value < *LARGE_PRIME {
            Some(ElementModP { elem: value })
        } else {
            None
        }
    }

    /// Construct without the range check. For constants, arithmetic results
    /// already reduced mod `P`, and tests.
    pub fn unchecked(value: BigUint) -> ElementModP {
        ElementModP { elem: value }
    }

    pub fn from_hex(input: &str) -> Option<ElementModP> {
        let value = BigUint::parse_bytes(input.as_bytes(), 16)?;
        ElementModP::new(value)
    }

    pub fn as_uint(&self) -> &BigUint {
        &self.elem
    }

    /// Upper-case hex with an even number of digits, the canonical string
    /// form fed to the hash function.
    pub fn to_hex(&self) -> String {
        to_even_hex(&self.elem)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.elem.to_bytes_be()
    }

    /// Is the element within `[0, P)`?
    pub fn is_in_bounds(&self) -> bool {
        self.elem < *LARGE_PRIME
    }

    /// Is the element in the order-`Q` subgroup `Z^r_p`?
    /// `y ∈ Z^r_p` if and only if `1 <= y < P` and `y^Q mod P = 1`.
    pub fn is_valid_residue(&self) -> bool {
        let in_bounds = !self.elem.is_zero() && self.elem < *LARGE_PRIME;
        in_bounds && self.elem.modpow(&SMALL_PRIME, &LARGE_PRIME).is_one()
    }

    /// The multiplicative inverse mod `P`.
    pub fn inverse(&self) -> ElementModP {
        // P is prime, so a^-1 = a^(P-2) mod P.
        ElementModP::unchecked(self.elem.modpow(&(&*LARGE_PRIME - 2_u8), &LARGE_PRIME))
    }

    /// `self^exponent mod P`.
    pub fn pow(&self, exponent: &ElementModQ) -> ElementModP {
        ElementModP::unchecked(self.elem.modpow(&exponent.elem, &LARGE_PRIME))
    }

    /// `self^exponent mod P` for a plain integer exponent.
    pub fn pow_u64(&self, exponent: u64) -> ElementModP {
        ElementModP::unchecked(self.elem.modpow(&BigUint::from(exponent), &LARGE_PRIME))
    }
}

impl ElementModQ {
    /// Inject an integer into `[0, Q)`. Out-of-range values are rejected,
    /// never wrapped.
    pub fn new(value: BigUint) -> Option<ElementModQ> {
        if value < *SMALL_PRIME {
            Some(ElementModQ { elem: value })
        } else {
            None
        }
    }

    /// Construct without the range check.
    pub fn unchecked(value: BigUint) -> ElementModQ {
        ElementModQ { elem: value }
    }

    pub fn from_hex(input: &str) -> Option<ElementModQ> {
        let value = BigUint::parse_bytes(input.as_bytes(), 16)?;
        ElementModQ::new(value)
    }

    pub fn as_uint(&self) -> &BigUint {
        &self.elem
    }

    pub fn to_hex(&self) -> String {
        to_even_hex(&self.elem)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.elem.to_bytes_be()
    }

    /// Is the element within `[0, Q)`?
    pub fn is_in_bounds(&self) -> bool {
        self.elem < *SMALL_PRIME
    }

    /// The multiplicative inverse mod `Q`.
    pub fn inverse(&self) -> ElementModQ {
        ElementModQ::unchecked(self.elem.modpow(&(&*SMALL_PRIME - 2_u8), &SMALL_PRIME))
    }

    /// `self^exponent mod Q`.
    pub fn pow_u64(&self, exponent: u64) -> ElementModQ {
        ElementModQ::unchecked(self.elem.modpow(&BigUint::from(exponent), &SMALL_PRIME))
    }
}

// Multiplicative operations mod P.

impl One for ElementModP {
    fn one() -> ElementModP {
        ElementModP::unchecked(BigUint::one())
    }
}

impl Mul for &ElementModP {
    type Output = ElementModP;
    fn mul(self, other: &ElementModP) -> ElementModP {
        ElementModP::unchecked(&self.elem * &other.elem % &*LARGE_PRIME)
    }
}

impl Mul for ElementModP {
    type Output = ElementModP;
    fn mul(self, other: ElementModP) -> ElementModP {
        &self * &other
    }
}

impl Div for &ElementModP {
    type Output = ElementModP;
    /// Division mod `P`, via the multiplicative inverse of the divisor.
    fn div(self, other: &ElementModP) -> ElementModP {
        self * &other.inverse()
    }
}

impl Div for ElementModP {
    type Output = ElementModP;
    fn div(self, other: ElementModP) -> ElementModP {
        &self / &other
    }
}

// Additive (and ring) operations mod Q.

impl Zero for ElementModQ {
    fn zero() -> ElementModQ {
        ElementModQ::unchecked(BigUint::zero())
    }
    fn is_zero(&self) -> bool {
        self.elem.is_zero()
    }
}

impl One for ElementModQ {
    fn one() -> ElementModQ {
        ElementModQ::unchecked(BigUint::one())
    }
}

impl Add for &ElementModQ {
    type Output = ElementModQ;
    fn add(self, other: &ElementModQ) -> ElementModQ {
        ElementModQ::unchecked((&self.elem + &other.elem) % &*SMALL_PRIME)
    }
}

impl Add for ElementModQ {
    type Output = ElementModQ;
    fn add(self, other: ElementModQ) -> ElementModQ {
        &self + &other
    }
}

impl Sub for &ElementModQ {
    type Output = ElementModQ;
    fn sub(self, other: &ElementModQ) -> ElementModQ {
        ElementModQ::unchecked((&self.elem + &*SMALL_PRIME - &other.elem) % &*SMALL_PRIME)
    }
}

impl Sub for ElementModQ {
    type Output = ElementModQ;
    fn sub(self, other: ElementModQ) -> ElementModQ {
        &self - &other
    }
}

impl Neg for &ElementModQ {
    type Output = ElementModQ;
    /// `(Q - self) mod Q`.
    fn neg(self) -> ElementModQ {
        if self.elem.is_zero() {
            self.clone()
        } else {
            ElementModQ::unchecked(&*SMALL_PRIME - &self.elem)
        }
    }
}

impl Neg for ElementModQ {
    type Output = ElementModQ;
    fn neg(self) -> ElementModQ {
        -&self
    }
}

impl Mul for &ElementModQ {
    type Output = ElementModQ;
    fn mul(self, other: &ElementModQ) -> ElementModQ {
        ElementModQ::unchecked(&self.elem * &other.elem % &*SMALL_PRIME)
    }
}

impl Mul for ElementModQ {
    type Output = ElementModQ;
    fn mul(self, other: ElementModQ) -> ElementModQ {
        &self * &other
    }
}

impl Div for &ElementModQ {
    type Output = ElementModQ;
    fn div(self, other: &ElementModQ) -> ElementModQ {
        self * &other.inverse()
    }
}

impl Div for ElementModQ {
    type Output = ElementModQ;
    fn div(self, other: ElementModQ) -> ElementModQ {
        &self / &other
    }
}

impl From<u64> for ElementModQ {
    fn from(number: u64) -> ElementModQ {
        ElementModQ::new(BigUint::from(number)).expect("argument out of range for ElementModQ")
    }
}

impl From<u64> for ElementModP {
    fn from(number: u64) -> ElementModP {
        ElementModP::new(BigUint::from(number)).expect("argument out of range for ElementModP")
    }
}

/// `g^exponent mod P`.
pub fn g_pow_p(exponent: &ElementModQ) -> ElementModP {
    generator().pow(exponent)
}

/// The product mod `P` of zero or more elements.
pub fn mult_p<'a>(elems: impl IntoIterator<Item = &'a ElementModP>) -> ElementModP {
    let mut product = BigUint::one();
    for x in elems {
        product = product * &x.elem % &*LARGE_PRIME;
    }
    ElementModP::unchecked(product)
}

/// The sum mod `Q` of zero or more elements.
pub fn add_q<'a>(elems: impl IntoIterator<Item = &'a ElementModQ>) -> ElementModQ {
    let mut sum = BigUint::zero();
    for x in elems {
        sum = (sum + &x.elem) % &*SMALL_PRIME;
    }
    ElementModQ::unchecked(sum)
}

/// `(a + b*c) mod Q`, the Schnorr/Chaum-Pedersen response form.
pub fn a_plus_bc_q(a: &ElementModQ, b: &ElementModQ, c: &ElementModQ) -> ElementModQ {
    ElementModQ::unchecked((&a.elem + &b.elem * &c.elem) % &*SMALL_PRIME)
}

/// Uniformly random element of `[0, Q)`.
pub fn rand_q() -> ElementModQ {
    let mut rng = rand::thread_rng();
    ElementModQ::unchecked(rng.gen_biguint_below(&SMALL_PRIME))
}

/// Uniformly random element of `[start, Q)`.
pub fn rand_range_q(start: &ElementModQ) -> ElementModQ {
    let mut rng = rand::thread_rng();
    let span = &*SMALL_PRIME - &start.elem;
    ElementModQ::unchecked(&start.elem + rng.gen_biguint_below(&span))
}

pub fn large_prime() -> &'static BigUint {
    &LARGE_PRIME
}

pub fn small_prime() -> &'static BigUint {
    &SMALL_PRIME
}

pub fn cofactor() -> &'static BigUint {
    &COFACTOR
}

pub fn generator() -> &'static ElementModP {
    &GENERATOR_ELEMENT
}

/// `Q - 1`, the modulus the hash function reduces into.
pub fn small_prime_minus_one() -> &'static BigUint {
    &SMALL_PRIME_MINUS_ONE
}

lazy_static! {
    static ref GENERATOR_ELEMENT: ElementModP = ElementModP::unchecked(GENERATOR.clone());
    static ref SMALL_PRIME_MINUS_ONE: BigUint = &*SMALL_PRIME - BigUint::one();
}

#[cfg(not(test))]
lazy_static! {
    /// The large prime `P`, 4096 bits, with `P = Q*R + 1`.
    static ref LARGE_PRIME: BigUint = parse_hex_or_panic(LARGE_PRIME_HEX);
    /// The small prime `Q = 2^256 - 189`.
    static ref SMALL_PRIME: BigUint = parse_hex_or_panic(SMALL_PRIME_HEX);
    /// The cofactor `R = (P - 1) / Q`.
    static ref COFACTOR: BigUint = parse_hex_or_panic(COFACTOR_HEX);
    /// The generator `G = 2^R mod P`, of multiplicative order exactly `Q`.
    static ref GENERATOR: BigUint = parse_hex_or_panic(GENERATOR_HEX);
}

// Small primes of the identical algebraic shape (P = Q*R + 1, G = 2^R mod P
// of order Q) so tests can run whole-protocol flows quickly.
#[cfg(test)]
lazy_static! {
    static ref LARGE_PRIME: BigUint = BigUint::from(68703748097_u64);
    static ref SMALL_PRIME: BigUint = BigUint::from(65521_u64);
    static ref COFACTOR: BigUint = BigUint::from(1048576_u64);
    static ref GENERATOR: BigUint = BigUint::from(31405367415_u64);
}

/// Parse a hex string (which may contain spaces or newlines) into a BigUint,
/// panicking on failure; only used for the hard-coded constants.
fn parse_hex_or_panic(hex: &str) -> BigUint {
    let cleaned: String = hex.chars().filter(|c| !c.is_whitespace()).collect();
    BigUint::parse_bytes(cleaned.as_bytes(), 16).expect("invalid hex in group constant")
}

#[cfg(not(test))]
const LARGE_PRIME_HEX: &str = "FFFFFFFF FFFFFFFF FFFFFFFF FFFFFFFF FFFFFFFF FFFFFFFF
     FFFFFFFF FFFFFF43 00000000 00000000 00000000 00000000
     00000000 00000000 00000000 00000000 00000000 00000000
     00000000 00000000 00000000 00000000 00000000 00000000
     00000000 00000000 00000000 00000000 00000000 00000000
     00000000 00000000 00000000 00000000 00000000 00000000
     00000000 00000000 00000000 00000000 00000000 00000000
     00000000 00000000 00000000 00000000 00000000 00000000
     00000000 00000000 00000000 00000000 00000000 00000000
     00000000 00000000 00000000 00000000 00000000 00000000
     00000000 00000000 00000000 00000000 00000000 00000000
     00000000 00000000 00000000 00000000 00000000 00000000
     00000000 00000000 00000000 00000000 00000000 00000000
     00000000 00000000 00000000 00000000 00000000 00000000
     00000000 00000000 00000000 00000000 00000000 00000000
     00000000 00000000 00000000 00000000 00000000 00000000
     00000000 00000000 00000000 00000000 00000000 00000000
     00000000 00000000 00000000 00000000 00000000 00000000
     00000000 00000000 00000000 00000000 00000000 00000000
     00000000 00000000 00000000 00000000 00000000 00000089
     FFFFFFFF FFFFFFFF FFFFFFFF FFFFFFFF FFFFFFFF FFFFFFFF
     FFFFFFFF FFFF9A1F";

#[cfg(not(test))]
const SMALL_PRIME_HEX: &str = "FFFFFFFF FFFFFFFF FFFFFFFF FFFFFFFF FFFFFFFF FFFFFFFF
     FFFFFFFF FFFFFF43";

#[cfg(not(test))]
const COFACTOR_HEX: &str = "00000001 00000000 00000000 00000000 00000000 00000000
     00000000 00000000 00000000 00000000 00000000 00000000
     00000000 00000000 00000000 00000000 00000000 00000000
     00000000 00000000 00000000 00000000 00000000 00000000
     00000000 00000000 00000000 00000000 00000000 00000000
     00000000 00000000 00000000 00000000 00000000 00000000
     00000000 00000000 00000000 00000000 00000000 00000000
     00000000 00000000 00000000 00000000 00000000 00000000
     00000000 00000000 00000000 00000000 00000000 00000000
     00000000 00000000 00000000 00000000 00000000 00000000
     00000000 00000000 00000000 00000000 00000000 00000000
     00000000 00000000 00000000 00000000 00000000 00000000
     00000000 00000000 00000000 00000000 00000000 00000000
     00000000 00000000 00000000 00000000 00000000 00000000
     00000000 00000000 00000000 00000000 00000000 00000000
     00000000 00000000 00000000 00000000 00000000 00000000
     00000000 00000000 00000000 00000000 00000000 00000000
     00000000 00000000 00000000 00000000 00000000 00000000
     00000000 00000000 00000000 00000000 00000000 00000000
     00000000 00000000 00000000 00000000 00000000 00000000
     0000008A";

#[cfg(not(test))]
const GENERATOR_HEX: &str = "3E7F4FEB 036520E4 0C90F977 01E41368 0F56BFA2 9DEBDB83
     230D3AE2 3C48E716 A26A12C8 6C792969 60132A36 766D047A
     8A9EFE6F 0DA35D99 DAE8D8DE 48F3396C 8C70CEB3 EAEEF92F
     A9D5CF0D EAD56B97 BDADA636 2A82616C 1390DA0A 3257B4AB
     A8D1ACF0 A42F3D44 D3DD4A0B 9EB91687 42D10E50 F2482052
     1B6D9167 B216E169 B8B9C909 F1120853 DA1160A1 E44C3A6C
     9CC1663C 895B1CB5 575C4654 7CFC32B5 7F078629 97D3116C
     9F495A40 47467720 BD18873C 336A6C54 BFF8D71F 1CE17A27
     293E2BFA 1A670722 463FB8E5 8773CF2A C49904CD 5BA7E802
     30439A23 563EE7AE C07570E1 95184D3C C7C5E05C CB8B5BF4
     12FCB1C2 DF110D8B 24B00E71 E36A87F0 BEF1F1F5 EB4250D0
     1923F14B 082FDC15 9700D305 B742E312 D00025CA E8E7741A
     DCB059A6 516C677C FD5848B7 BAD54675 FC7496A7 3B76F58A
     6AB6BA78 636D6EFD 2C70BC72 2DB14E63 72A5420A 32966163
     AA3E70F2 5E5E7B3C 3C503B84 D8266FA7 A15DD6A2 50774A72
     1342000E B51ED9BE F89029EC 6123A81C 830FD308 88B2D1F3
     1D626095 C64426C5 5B3B57E4 4A7FFFF4 AB04625A 608DE998
     1D16DBD1 E99529CF 3D1C25B0 80397C9E 469CAFE7 D4B73981
     29BFE1AF 4C4D1AD5 AE494825 EF076259 491FB658 E32A5C8B
     2894F8D5 C0EA5530 985117E9 E5D80170 D5619AA8 70E935AF
     284931DB 30E89C70 1204A972 269B9357 1DC44DC8 334328E6
     5CE2EB1F 5844864C";

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn constants_form_a_prime_order_subgroup() {
        // P = Q * R + 1
        assert_eq!(
            &*SMALL_PRIME * &*COFACTOR + BigUint::one(),
            *LARGE_PRIME,
            "P != Q * R + 1"
        );
        // G has order Q: G != 1 and G^Q = 1 mod P
        assert!(!GENERATOR.is_one());
        assert!(generator().is_valid_residue());
    }

    #[test]
    fn generator_powers_are_valid_residues() {
        for exp in &[1_u64, 2, 3, 12345] {
            let x = g_pow_p(&ElementModQ::from(*exp));
            assert!(x.is_valid_residue(), "g^{} is not a residue", exp);
        }
    }

    #[test]
    fn in_bounds_construction() {
        assert!(ElementModQ::new(&*SMALL_PRIME - 1_u8).is_some());
        assert!(ElementModQ::new(SMALL_PRIME.clone()).is_none());
        assert!(ElementModP::new(&*LARGE_PRIME - 1_u8).is_some());
        assert!(ElementModP::new(LARGE_PRIME.clone()).is_none());
    }

    #[test]
    fn q_arithmetic_wraps() {
        let max = ElementModQ::unchecked(&*SMALL_PRIME - 1_u8);
        let one = ElementModQ::one();
        assert_eq!(&max + &one, ElementModQ::zero());
        assert_eq!(ElementModQ::zero() - one.clone(), max);
        assert_eq!(-&one, max);
        assert_eq!(-&ElementModQ::zero(), ElementModQ::zero());
    }

    #[test]
    fn p_division_inverts_multiplication() {
        let a = g_pow_p(&ElementModQ::from(200_u64));
        let b = g_pow_p(&ElementModQ::from(37_u64));
        assert_eq!(&(&a * &b) / &b, a);
    }

    #[test]
    fn q_division_inverts_multiplication() {
        let a = ElementModQ::from(4049_u64);
        let b = ElementModQ::from(221_u64);
        assert_eq!(&(&a * &b) / &b, a);
    }

    #[test]
    fn a_plus_bc_matches_operators() {
        let a = ElementModQ::from(101_u64);
        let b = ElementModQ::from(77_u64);
        let c = ElementModQ::from(999_u64);
        assert_eq!(a_plus_bc_q(&a, &b, &c), &a + &(&b * &c));
    }

    #[test]
    fn rand_range_respects_lower_bound() {
        let start = ElementModQ::from(60000_u64);
        for _ in 0..20 {
            let x = rand_range_q(&start);
            assert!(x >= start && x.is_in_bounds());
        }
    }
}
