//! Serialize a `u64` as a decimal string so JSON consumers that truncate
//! large integers to f64 cannot corrupt seeds. Accepts both forms on read.

use serde::de::Error;
use serde::{Deserialize, Deserializer, Serializer};

pub fn serialize<S>(value: &u64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_str(value)
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Value(u64),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Text(text) => text
            .parse::<u64>()
            .map_err(|err| D::Error::custom(format!("invalid u64 string: {err}"))),
        Raw::Value(value) => Ok(value),
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
    struct Seeded {
        #[serde(with = "super")]
        seed: u64,
    }

    #[test]
    fn writes_string_form() {
        let encoded = serde_json::to_string(&Seeded { seed: 42 }).expect("serialize");
        assert_eq!(encoded, r#"{"seed":"42"}"#);
    }

    #[test]
    fn reads_both_forms() {
        let from_text: Seeded = serde_json::from_str(r#"{"seed":"42"}"#).expect("string seed");
        let from_number: Seeded = serde_json::from_str(r#"{"seed":42}"#).expect("number seed");
        assert_eq!(from_text, from_number);
    }

    #[test]
    fn rejects_garbage_text() {
        let parsed = serde_json::from_str::<Seeded>(r#"{"seed":"not-a-number"}"#);
        assert!(parsed.is_err());
    }
}
