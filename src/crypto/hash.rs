use num::BigUint;
use sha2::{Digest, Sha256};

use crate::crypto::group::{small_prime_minus_one, ElementModP, ElementModQ};

/// One input to the Fiat-Shamir hash. The hash is order-sensitive over a
/// heterogeneous sequence: group elements, integers, strings, nested
/// sequences, and explicitly-absent values all hash distinctly.
#[derive(Clone, Debug)]
pub enum HashInput<'a> {
    Int(u64),
    Text(&'a str),
    ElemP(&'a ElementModP),
    ElemQ(&'a ElementModQ),
    List(Vec<HashInput<'a>>),
    Absent,
}

impl HashInput<'_> {
    /// The canonical string contribution of this input. Each variant maps to
    /// a distinct encoding so `hash(a)`, `hash(a, Absent)` and
    /// `hash(a, List([]))` never collide.
    fn hash_string(&self) -> String {
        match self {
            HashInput::Int(i) => i.to_string(),
            HashInput::Text(s) => (*s).to_string(),
            HashInput::ElemP(e) => e.to_hex(),
            HashInput::ElemQ(e) => e.to_hex(),
            HashInput::List(items) => hash_elems(items).to_hex(),
            HashInput::Absent => "null".to_string(),
        }
    }
}

/// Hash an ordered sequence of heterogeneous inputs into an `ElementModQ`.
///
/// Each input contributes its canonical string followed by a `|` delimiter to
/// a single SHA-256 digest; the digest is reduced mod `Q - 1`, so the result
/// is always a valid element of `[0, Q)`.
pub fn hash_elems(inputs: &[HashInput]) -> ElementModQ {
    let mut digest = Sha256::new();
    for input in inputs {
        digest.update(input.hash_string().as_bytes());
        digest.update(b"|");
    }
    let reduced = BigUint::from_bytes_be(digest.finalize().as_slice()) % small_prime_minus_one();
    ElementModQ::unchecked(reduced)
}

/// Conversion from a macro argument into a [`HashInput`].
///
/// The `hash_elems!` macro routes each argument through this dedicated trait
/// rather than `From`/`Into`. The recursive container conversions bound on
/// `&T: IntoHashInput` do not interact with the standard-library
/// `Into`→`From` blanket, so the trait solver resolves each call directly
/// instead of diverging through an unbounded `&[&[&[..]]]` search. The
/// `From` impls below are kept for API compatibility and produce identical
/// `HashInput` values.
pub trait IntoHashInput<'a> {
    fn into_hash_input(self) -> HashInput<'a>;
}

/// Hash a sequence of inputs, converting each argument with
/// [`IntoHashInput::into_hash_input`]. Reads like the protocol equations:
/// `hash_elems!(qbar, alpha, beta, a0, b0, a1, b1)`.
#[macro_export]
macro_rules! hash_elems {
    ( $( $x:expr ),+ $(,)? ) => {
        $crate::crypto::hash::hash_elems(&[ $( $crate::crypto::hash::IntoHashInput::into_hash_input($x) ),+ ])
    };
}

impl<'a> IntoHashInput<'a> for &'a ElementModP {
    fn into_hash_input(self) -> HashInput<'a> {
        HashInput::ElemP(self)
    }
}

impl<'a> IntoHashInput<'a> for &'a ElementModQ {
    fn into_hash_input(self) -> HashInput<'a> {
        HashInput::ElemQ(self)
    }
}

impl<'a> IntoHashInput<'a> for &'a str {
    fn into_hash_input(self) -> HashInput<'a> {
        HashInput::Text(self)
    }
}

impl<'a> IntoHashInput<'a> for &'a String {
    fn into_hash_input(self) -> HashInput<'a> {
        HashInput::Text(self)
    }
}

impl IntoHashInput<'_> for u64 {
    fn into_hash_input(self) -> HashInput<'static> {
        HashInput::Int(self)
    }
}

impl IntoHashInput<'_> for u32 {
    fn into_hash_input(self) -> HashInput<'static> {
        HashInput::Int(u64::from(self))
    }
}

impl IntoHashInput<'_> for &u64 {
    fn into_hash_input(self) -> HashInput<'static> {
        HashInput::Int(*self)
    }
}

impl IntoHashInput<'_> for &u32 {
    fn into_hash_input(self) -> HashInput<'static> {
        HashInput::Int(u64::from(*self))
    }
}

impl<'a, T> IntoHashInput<'a> for &'a [T]
where
    &'a T: IntoHashInput<'a>,
{
    fn into_hash_input(self) -> HashInput<'a> {
        HashInput::List(self.iter().map(IntoHashInput::into_hash_input).collect())
    }
}

impl<'a, T> IntoHashInput<'a> for &'a Vec<T>
where
    &'a T: IntoHashInput<'a>,
{
    fn into_hash_input(self) -> HashInput<'a> {
        HashInput::List(self.iter().map(IntoHashInput::into_hash_input).collect())
    }
}

impl<'a, T> IntoHashInput<'a> for &'a Option<T>
where
    &'a T: IntoHashInput<'a>,
{
    /// Absent values hash as the literal `"null"`; present values hash as the
    /// hash of the single inner value.
    fn into_hash_input(self) -> HashInput<'a> {
        match self {
            None => HashInput::Absent,
            Some(inner) => HashInput::List(vec![inner.into_hash_input()]),
        }
    }
}

impl<'a> From<&'a ElementModP> for HashInput<'a> {
    fn from(elem: &'a ElementModP) -> Self {
        HashInput::ElemP(elem)
    }
}

impl<'a> From<&'a ElementModQ> for HashInput<'a> {
    fn from(elem: &'a ElementModQ) -> Self {
        HashInput::ElemQ(elem)
    }
}

impl<'a> From<&'a str> for HashInput<'a> {
    fn from(s: &'a str) -> Self {
        HashInput::Text(s)
    }
}

impl<'a> From<&'a String> for HashInput<'a> {
    fn from(s: &'a String) -> Self {
        HashInput::Text(s)
    }
}

impl From<u64> for HashInput<'_> {
    fn from(i: u64) -> Self {
        HashInput::Int(i)
    }
}

impl From<u32> for HashInput<'_> {
    fn from(i: u32) -> Self {
        HashInput::Int(u64::from(i))
    }
}

impl From<&u64> for HashInput<'_> {
    fn from(i: &u64) -> Self {
        HashInput::Int(*i)
    }
}

impl From<&u32> for HashInput<'_> {
    fn from(i: &u32) -> Self {
        HashInput::Int(u64::from(*i))
    }
}

impl<'a, T> From<&'a [T]> for HashInput<'a>
where
    &'a T: Into<HashInput<'a>>,
{
    fn from(items: &'a [T]) -> Self {
        HashInput::List(items.iter().map(Into::into).collect())
    }
}

impl<'a, T> From<&'a Vec<T>> for HashInput<'a>
where
    &'a T: Into<HashInput<'a>>,
{
    fn from(items: &'a Vec<T>) -> Self {
        HashInput::List(items.iter().map(Into::into).collect())
    }
}

impl<'a, T> From<&'a Option<T>> for HashInput<'a>
where
    &'a T: Into<HashInput<'a>>,
{
    /// Absent values hash as the literal `"null"`; present values hash as the
    /// hash of the single inner value.
    fn from(opt: &'a Option<T>) -> Self {
        match opt {
            None => HashInput::Absent,
            Some(inner) => HashInput::List(vec![inner.into()]),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::group::g_pow_p;

    #[test]
    fn deterministic_and_in_bounds() {
        let e = g_pow_p(&ElementModQ::from(42_u64));
        let h1 = hash_elems!(&e, "fixed-header", 3_u64);
        let h2 = hash_elems!(&e, "fixed-header", 3_u64);
        assert_eq!(h1, h2);
        assert!(h1.is_in_bounds());
    }

    #[test]
    fn order_sensitive() {
        assert_ne!(hash_elems!("a", "b"), hash_elems!("b", "a"));
    }

    #[test]
    fn absent_and_empty_hash_distinctly() {
        let base = ElementModQ::from(7_u64);
        let none: Option<ElementModQ> = None;
        let empty: Vec<ElementModQ> = Vec::new();
        let with_absent = hash_elems!(&base, &none);
        let with_empty = hash_elems!(&base, &empty);
        let omitted = hash_elems!(&base);
        assert_ne!(with_absent, with_empty);
        assert_ne!(with_absent, omitted);
        assert_ne!(with_empty, omitted);
    }

    #[test]
    fn present_option_differs_from_bare_value() {
        let x = ElementModQ::from(19_u64);
        let some = Some(x.clone());
        assert_ne!(hash_elems!(&some), hash_elems!(&x));
    }

    #[test]
    fn nested_sequences_recurse() {
        let xs = vec![ElementModQ::from(1_u64), ElementModQ::from(2_u64)];
        let flat = hash_elems!(&xs[0], &xs[1]);
        let nested = hash_elems!(&xs);
        assert_ne!(flat, nested);
        // the nested form commits to the inner hash
        let inner = hash_elems!(&xs[0], &xs[1]);
        assert_eq!(nested, hash_elems!(&inner), "list hashes as its own hash");
    }

    #[test]
    fn canonical_strings_drive_the_digest() {
        // "12" as text and 12 as a number share a canonical string; the
        // delimiter layout still keeps multi-input sequences unambiguous
        assert_eq!(hash_elems!(12_u64), hash_elems!("12"));
        assert_ne!(hash_elems!(1_u64, 2_u64), hash_elems!(12_u64));
    }
}
