//! Serde helpers for the numeric wire representations.

/// Serialize a `BigUint` as an upper-case hex string (even number of digits),
/// matching the canonical form used by the hash function.
pub mod big_uint {
    use num::{BigUint, Num};
    use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(value: &BigUint, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut hex = value.to_str_radix(16).to_uppercase();
        if hex.len() % 2 == 1 {
            hex.insert(0, '0');
        }
        hex.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BigUint, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = Deserialize::deserialize(deserializer)?;
        BigUint::from_str_radix(&s, 16).map_err(de::Error::custom)
    }
}
