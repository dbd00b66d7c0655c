//! The auxiliary (transport) encryption boundary.
//!
//! Polynomial coordinates move between guardians encrypted under each
//! recipient's auxiliary key. The cipher itself (RSA in the reference
//! deployment) lives outside this crate; the core consumes it through the
//! [`AuxiliaryEncryptor`] / [`AuxiliaryDecryptor`] capabilities and treats
//! keys and ciphertexts as opaque bytes.

use serde::{Deserialize, Serialize};

/// An opaque, immutable byte string: an auxiliary ciphertext or key blob.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ByteString {
    #[serde(with = "hex_bytes")]
    bytes: Vec<u8>,
}

impl ByteString {
    pub fn new(bytes: Vec<u8>) -> ByteString {
        ByteString { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl From<&[u8]> for ByteString {
    fn from(bytes: &[u8]) -> ByteString {
        ByteString::new(bytes.to_vec())
    }
}

mod hex_bytes {
    use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        hex::encode(bytes).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s: String = Deserialize::deserialize(deserializer)?;
        hex::decode(&s).map_err(de::Error::custom)
    }
}

/// A guardian's transport key pair. Key material is opaque to this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuxiliaryKeyPair {
    pub secret_key: ByteString,
    pub public_key: ByteString,
}

/// Another guardian's transport public key, tagged with its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuxiliaryPublicKey {
    /// The unique identifier of the owning guardian.
    pub owner_id: String,
    /// The owning guardian's sequence order.
    pub sequence_order: u32,
    pub key: ByteString,
}

/// The auxiliary encryption capability: seal a hex-encoded message to a
/// recipient's public key. `None` means the codec refused. Codecs are
/// stateless and get shared across worker threads.
pub trait AuxiliaryEncryptor: Sync {
    fn encrypt(&self, message_hex: &str, public_key: &ByteString) -> Option<ByteString>;
}

/// The auxiliary decryption capability: open a ciphertext with the holder's
/// secret key, recovering the hex-encoded message.
pub trait AuxiliaryDecryptor: Sync {
    fn decrypt(&self, encrypted: &ByteString, secret_key: &ByteString) -> Option<String>;
}

/// A pass-through codec for tests: "encrypts" by encoding the message bytes
/// directly. Deployments supply a real cipher.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityAuxiliary;

impl IdentityAuxiliary {
    /// A matching key pair for tests.
    pub fn key_pair(owner_id: &str) -> AuxiliaryKeyPair {
        let tag = format!("aux-{}", owner_id);
        AuxiliaryKeyPair {
            secret_key: ByteString::new(tag.as_bytes().to_vec()),
            public_key: ByteString::new(tag.as_bytes().to_vec()),
        }
    }
}

impl AuxiliaryEncryptor for IdentityAuxiliary {
    fn encrypt(&self, message_hex: &str, _public_key: &ByteString) -> Option<ByteString> {
        Some(ByteString::new(message_hex.as_bytes().to_vec()))
    }
}

impl AuxiliaryDecryptor for IdentityAuxiliary {
    fn decrypt(&self, encrypted: &ByteString, _secret_key: &ByteString) -> Option<String> {
        String::from_utf8(encrypted.as_bytes().to_vec()).ok()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn identity_codec_round_trips() {
        let keys = IdentityAuxiliary::key_pair("guardian-1");
        let sealed = IdentityAuxiliary.encrypt("0AFF", &keys.public_key).unwrap();
        assert_eq!(
            IdentityAuxiliary.decrypt(&sealed, &keys.secret_key).unwrap(),
            "0AFF"
        );
    }

    #[test]
    fn byte_string_hides_representation() {
        let b = ByteString::from(&b"abc"[..]);
        assert_eq!(b.as_bytes(), b"abc");
    }
}
