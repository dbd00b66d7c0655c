use lazy_static::lazy_static;
use num::BigUint;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::crypto::group::{generator, ElementModP};

/// The largest plaintext the brute-force search will recover. This matches
/// the sanity bound the constant Chaum-Pedersen proof enforces on its
/// constant: plaintexts are vote counts, so anything larger than this is
/// either corruption or a misuse of the API.
#[cfg(not(test))]
pub const DLOG_MAX: u64 = 1_000_000_000;
/// Under the test primes the whole subgroup has fewer than 2^16 elements,
/// so a tight cap keeps the not-found path fast.
#[cfg(test)]
pub const DLOG_MAX: u64 = 100_000;

struct DlogCache {
    /// g^k -> k for every k computed so far.
    table: HashMap<BigUint, u64>,
    /// g^max, the frontier of the table.
    frontier: ElementModP,
    max: u64,
}

lazy_static! {
    static ref CACHE: Mutex<DlogCache> = {
        let mut table = HashMap::new();
        table.insert(BigUint::from(1_u8), 0);
        Mutex::new(DlogCache {
            table,
            frontier: ElementModP::unchecked(BigUint::from(1_u8)),
            max: 0,
        })
    };
}

/// Recover `m` from `g^m mod P` by incremental search, memoizing every power
/// seen so far. Returns `None` once the search passes [`DLOG_MAX`]; the
/// caller decides whether that is corruption or an out-of-contract tally.
pub fn discrete_log(element: &ElementModP) -> Option<u64> {
    let mut cache = CACHE.lock().expect("dlog cache poisoned");
    while !cache.table.contains_key(element.as_uint()) {
        if cache.max >= DLOG_MAX {
            return None;
        }
        let next = &cache.frontier * generator();
        let exp = cache.max + 1;
        cache.table.insert(next.as_uint().clone(), exp);
        cache.frontier = next;
        cache.max = exp;
    }
    cache.table.get(element.as_uint()).copied()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::group::{g_pow_p, ElementModQ};

    #[test]
    fn recovers_small_exponents() {
        for m in &[0_u64, 1, 2, 17, 100, 99, 3] {
            let e = g_pow_p(&ElementModQ::from(*m));
            assert_eq!(discrete_log(&e), Some(*m));
        }
    }

    #[test]
    fn value_outside_the_subgroup_is_never_found() {
        // 0 is not a power of g, so the search exhausts the cap and gives up.
        let zero = ElementModP::unchecked(BigUint::from(0_u8));
        assert_eq!(discrete_log(&zero), None);
    }
}
