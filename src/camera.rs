use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::OnceLock;

use crate::error::{MonitorError, Result};

/// Path segment reserved by `POST /stop/all`.
const RESERVED_ID: &str = "all";

/// Stable camera identifier. Integers and strings are both accepted on the
/// wire and normalised to their string form.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CameraId(String);

impl CameraId {
    pub fn parse(raw: &str) -> Result<Self> {
        static CAMERA_ID_RE: OnceLock<regex::Regex> = OnceLock::new();
        let re = CAMERA_ID_RE
            .get_or_init(|| regex::Regex::new(r"^[A-Za-z0-9_.:-]{1,64}$").unwrap());
        let trimmed = raw.trim();
        if !re.is_match(trimmed) {
            return Err(MonitorError::invalid(format!(
                "camera_id '{}' must match [A-Za-z0-9_.:-]{{1,64}}",
                raw
            )));
        }
        if trimmed.eq_ignore_ascii_case(RESERVED_ID) {
            return Err(MonitorError::invalid("camera_id 'all' is reserved"));
        }
        Ok(CameraId(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CameraId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for CameraId {
    fn from(value: u64) -> Self {
        CameraId(value.to_string())
    }
}

impl Serialize for CameraId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        // Numeric ids round-trip as numbers so existing clients see the type they sent.
        match self.0.parse::<u64>() {
            Ok(n) if n.to_string() == self.0 => serializer.serialize_u64(n),
            _ => serializer.serialize_str(&self.0),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawCameraId {
    Int(u64),
    Text(String),
}

impl<'de> Deserialize<'de> for CameraId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match RawCameraId::deserialize(deserializer)? {
            RawCameraId::Int(n) => Ok(CameraId::from(n)),
            RawCameraId::Text(s) => CameraId::parse(&s).map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_integers_and_strings() {
        let a: CameraId = serde_json::from_str("12").unwrap();
        let b: CameraId = serde_json::from_str("\"12\"").unwrap();
        let c: CameraId = serde_json::from_str("\"lobby-cam.1\"").unwrap();
        assert_eq!(a, b);
        assert_eq!(c.as_str(), "lobby-cam.1");
    }

    #[test]
    fn numeric_ids_serialize_as_numbers() {
        assert_eq!(serde_json::to_string(&CameraId::from(3)).unwrap(), "3");
        let named = CameraId::parse("gate").unwrap();
        assert_eq!(serde_json::to_string(&named).unwrap(), "\"gate\"");
    }

    #[test]
    fn rejects_reserved_and_malformed_ids() {
        assert!(CameraId::parse("all").is_err());
        assert!(CameraId::parse("ALL").is_err());
        assert!(CameraId::parse("").is_err());
        assert!(CameraId::parse("a/b").is_err());
        assert!(serde_json::from_str::<CameraId>("\"x y\"").is_err());
    }
}
