use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{de::Error as DeError, Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

static ASSETS: Lazy<RwLock<AssetRegistry>> = Lazy::new(|| RwLock::new(AssetRegistry::default()));

/// Exchange-assigned order identifier. Market orders are prioritised by it.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct OrderId(pub u64);

impl OrderId {
    #[must_use]
    pub const fn as_raw(self) -> u64 {
        self.0
    }

    /// Identifier immediately following this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for OrderId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Identifier of the trade that groups one or more orders.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TradeId(pub u64);

impl fmt::Display for TradeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for TradeId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Interned asset code (e.g. `BTC`, `USDT`).
///
/// Codes are trimmed and upper-cased before interning, so `"btc"` and `"BTC"`
/// resolve to the same identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetId(u32);

impl AssetId {
    pub const UNSPECIFIED: Self = Self(0);

    pub fn from_code(code: impl AsRef<str>) -> Self {
        let code = canonicalize_asset(code.as_ref());
        if code.is_empty() {
            return Self::UNSPECIFIED;
        }
        if let Some(existing) = ASSETS.read().code_to_id.get(&code) {
            return Self(*existing);
        }
        let mut registry = ASSETS.write();
        if let Some(existing) = registry.code_to_id.get(&code) {
            return Self(*existing);
        }
        registry.next_id = registry.next_id.saturating_add(1);
        let id = registry.next_id;
        registry.id_to_code.insert(id, leak_string(code.clone()));
        registry.code_to_id.insert(code, id);
        Self(id)
    }

    #[must_use]
    pub fn code(self) -> &'static str {
        if self == Self::UNSPECIFIED {
            return "UNKNOWN";
        }
        ASSETS
            .read()
            .id_to_code
            .get(&self.0)
            .copied()
            .unwrap_or("UNKNOWN")
    }

    #[must_use]
    pub fn is_specified(self) -> bool {
        self != Self::UNSPECIFIED
    }
}

impl Default for AssetId {
    fn default() -> Self {
        Self::UNSPECIFIED
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for AssetId {
    type Err = IdentifierParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let asset = Self::from_code(s);
        if asset.is_specified() {
            Ok(asset)
        } else {
            Err(IdentifierParseError::new("asset", s))
        }
    }
}

impl Serialize for AssetId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.code())
    }
}

impl<'de> Deserialize<'de> for AssetId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }
}

impl From<&str> for AssetId {
    fn from(value: &str) -> Self {
        Self::from_code(value)
    }
}

impl From<String> for AssetId {
    fn from(value: String) -> Self {
        Self::from_code(value)
    }
}

impl AsRef<str> for AssetId {
    fn as_ref(&self) -> &str {
        self.code()
    }
}

#[derive(Debug, Clone)]
pub struct IdentifierParseError {
    msg: String,
}

impl IdentifierParseError {
    fn new(kind: &str, raw: impl AsRef<str>) -> Self {
        Self {
            msg: format!("invalid {kind} identifier: '{}'", raw.as_ref()),
        }
    }
}

impl fmt::Display for IdentifierParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.msg)
    }
}

impl std::error::Error for IdentifierParseError {}

#[derive(Default)]
struct AssetRegistry {
    code_to_id: HashMap<String, u32>,
    id_to_code: HashMap<u32, &'static str>,
    next_id: u32,
}

fn canonicalize_asset(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

fn leak_string(value: String) -> &'static str {
    Box::leak(value.into_boxed_str())
}
