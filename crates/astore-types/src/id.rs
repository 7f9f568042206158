use std::fmt;
use std::sync::Mutex;

use data_encoding::{Encoding, Specification};
use lazy_static::lazy_static;
use rand::rngs::{OsRng, StdRng};
use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Number of random bytes behind every identifier (160 bits).
pub const ID_BYTES: usize = 20;

/// Length of an encoded [`Uid`].
pub const UID_LEN: usize = 32;

/// Length of an encoded [`Sid`], fan-out separators included.
pub const SID_LEN: usize = UID_LEN + 2;

/// Base32 alphabet without visually confusable characters (no `0 1 l 9`).
pub const ID_ALPHABET: &str = "abcdefghijkmnopqrstuvwxyz2345678";

lazy_static! {
    /// Fixed-length encoding used for both storage and unique identifiers.
    ///
    /// 160 bits is a multiple of 5, so encoded identifiers never need padding.
    static ref ID_ENCODING: Encoding = id_encoding();
}

fn id_encoding() -> Encoding {
    let mut spec = Specification::new();
    spec.symbols.push_str(ID_ALPHABET);
    spec.encoding()
        .expect("identifier alphabet has 32 distinct symbols")
}

fn check_alphabet(value: &str, encoded: &str) -> Result<(), TypeError> {
    if let Some(c) = encoded.chars().find(|c| !ID_ALPHABET.contains(*c)) {
        return Err(TypeError::InvalidIdentifier {
            value: value.to_string(),
            reason: format!("character {c:?} is not in the identifier alphabet"),
        });
    }
    Ok(())
}

/// Globally unique identifier of a committed artifact.
///
/// Assigned once at commit time, never reused, never treated as a [`Sid`].
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Uid(String);

impl Uid {
    fn from_bytes(bytes: &[u8; ID_BYTES]) -> Self {
        Self(ID_ENCODING.encode(bytes))
    }

    /// Parse and validate an encoded uid.
    pub fn parse(value: &str) -> Result<Self, TypeError> {
        if value.len() != UID_LEN {
            return Err(TypeError::InvalidIdentifier {
                value: value.to_string(),
                reason: format!("expected {UID_LEN} characters, got {}", value.len()),
            });
        }
        check_alphabet(value, value)?;
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Uid({})", self.0)
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Uid {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Uid> for String {
    fn from(uid: Uid) -> Self {
        uid.0
    }
}

/// Storage identifier of an uploaded blob.
///
/// Encoded as `xx/yy/rest`: the two leading two-character segments fan the
/// blob store out into directories instead of one flat namespace.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Sid(String);

impl Sid {
    fn from_bytes(bytes: &[u8; ID_BYTES]) -> Self {
        let encoded = ID_ENCODING.encode(bytes);
        Self(format!("{}/{}/{}", &encoded[0..2], &encoded[2..4], &encoded[4..]))
    }

    /// Parse and validate an encoded sid, separators included.
    pub fn parse(value: &str) -> Result<Self, TypeError> {
        if value.len() != SID_LEN {
            return Err(TypeError::InvalidIdentifier {
                value: value.to_string(),
                reason: format!("expected {SID_LEN} characters, got {}", value.len()),
            });
        }
        let bytes = value.as_bytes();
        if bytes[2] != b'/' || bytes[5] != b'/' {
            return Err(TypeError::InvalidIdentifier {
                value: value.to_string(),
                reason: "expected separators at positions 2 and 5".into(),
            });
        }
        let encoded: String = value.chars().filter(|c| *c != '/').collect();
        if encoded.len() != UID_LEN {
            return Err(TypeError::InvalidIdentifier {
                value: value.to_string(),
                reason: "unexpected separator".into(),
            });
        }
        check_alphabet(value, &encoded)?;
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path of the blob backing this sid inside the bucket.
    pub fn object_path(&self) -> String {
        format!("upload/{}", self.0)
    }
}

impl fmt::Debug for Sid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sid({})", self.0)
    }
}

impl fmt::Display for Sid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Sid {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Sid> for String {
    fn from(sid: Sid) -> Self {
        sid.0
    }
}

enum Source {
    Os,
    Seeded(Mutex<StdRng>),
}

/// Mints [`Sid`] and [`Uid`] values.
///
/// Shared by every concurrent request. The default source draws from the
/// operating system CSPRNG on each call, so no generator state is shared;
/// the seeded source serializes access behind a mutex.
pub struct IdGenerator {
    source: Source,
}

impl IdGenerator {
    /// Generator backed by the operating system random source.
    pub fn new() -> Self {
        Self { source: Source::Os }
    }

    /// Deterministic generator for tests and reproducible fixtures.
    pub fn seeded(seed: u64) -> Self {
        Self {
            source: Source::Seeded(Mutex::new(StdRng::seed_from_u64(seed))),
        }
    }

    fn random_bytes(&self) -> Result<[u8; ID_BYTES], TypeError> {
        let mut bytes = [0u8; ID_BYTES];
        match &self.source {
            Source::Os => OsRng
                .try_fill_bytes(&mut bytes)
                .map_err(|e| TypeError::Random(e.to_string()))?,
            Source::Seeded(rng) => rng
                .lock()
                .map_err(|e| TypeError::Random(format!("lock poisoned: {e}")))?
                .try_fill_bytes(&mut bytes)
                .map_err(|e| TypeError::Random(e.to_string()))?,
        }
        Ok(bytes)
    }

    /// Generate a fresh storage identifier.
    pub fn sid(&self) -> Result<Sid, TypeError> {
        Ok(Sid::from_bytes(&self.random_bytes()?))
    }

    /// Generate a fresh unique identifier.
    pub fn uid(&self) -> Result<Uid, TypeError> {
        Ok(Uid::from_bytes(&self.random_bytes()?))
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for IdGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = match self.source {
            Source::Os => "os",
            Source::Seeded(_) => "seeded",
        };
        f.debug_struct("IdGenerator").field("source", &source).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn uid_has_fixed_shape() {
        let uid = IdGenerator::new().uid().unwrap();
        assert_eq!(uid.as_str().len(), UID_LEN);
        assert!(uid.as_str().chars().all(|c| ID_ALPHABET.contains(c)));
    }

    #[test]
    fn sid_has_fanout_prefix() {
        let sid = IdGenerator::new().sid().unwrap();
        let s = sid.as_str();
        assert_eq!(s.len(), SID_LEN);
        assert_eq!(s.matches('/').count(), 2);
        assert_eq!(&s[2..3], "/");
        assert_eq!(&s[5..6], "/");
        assert!(sid.object_path().starts_with("upload/"));
    }

    #[test]
    fn seeded_generator_is_reproducible() {
        let a = IdGenerator::seeded(7);
        let b = IdGenerator::seeded(7);
        assert_eq!(a.uid().unwrap(), b.uid().unwrap());
        assert_eq!(a.sid().unwrap(), b.sid().unwrap());
    }

    #[test]
    fn generated_ids_do_not_repeat() {
        let ids = IdGenerator::new();
        let seen: HashSet<Uid> = (0..1000).map(|_| ids.uid().unwrap()).collect();
        assert_eq!(seen.len(), 1000);
    }

    #[test]
    fn concurrent_generation_is_safe() {
        let ids = std::sync::Arc::new(IdGenerator::seeded(3));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ids = ids.clone();
                std::thread::spawn(move || (0..100).map(|_| ids.uid().unwrap()).collect::<Vec<_>>())
            })
            .collect();
        let mut seen = HashSet::new();
        for h in handles {
            for uid in h.join().unwrap() {
                assert!(seen.insert(uid));
            }
        }
        assert_eq!(seen.len(), 800);
    }

    #[test]
    fn uid_is_not_a_sid() {
        let ids = IdGenerator::new();
        let uid = ids.uid().unwrap();
        assert!(Sid::parse(uid.as_str()).is_err());
        let sid = ids.sid().unwrap();
        assert!(Uid::parse(sid.as_str()).is_err());
    }

    #[test]
    fn parse_rejects_confusable_characters() {
        let bad = "l".repeat(UID_LEN);
        assert!(matches!(
            Uid::parse(&bad),
            Err(TypeError::InvalidIdentifier { .. })
        ));
        let bad_sid = format!("ab/cd/{}", "0".repeat(28));
        assert!(Sid::parse(&bad_sid).is_err());
    }

    #[test]
    fn serde_uses_plain_strings() {
        let uid = IdGenerator::seeded(1).uid().unwrap();
        let json = serde_json::to_string(&uid).unwrap();
        assert_eq!(json, format!("\"{uid}\""));
        let parsed: Uid = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, uid);
        assert!(serde_json::from_str::<Uid>("\"short\"").is_err());
    }

    proptest! {
        #[test]
        fn seeded_ids_always_parse(seed in any::<u64>()) {
            let ids = IdGenerator::seeded(seed);
            let uid = ids.uid().unwrap();
            let sid = ids.sid().unwrap();
            prop_assert_eq!(Uid::parse(uid.as_str()).unwrap(), uid);
            prop_assert_eq!(Sid::parse(sid.as_str()).unwrap(), sid);
        }
    }
}
