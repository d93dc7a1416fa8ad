//! Monetary amounts are currency minor units carried as `i64` end to end.
//! The JSON boundary exchanges them as decimal strings so 64-bit values
//! survive clients whose number type is a double.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoneyParseError {
    pub input: String,
}

impl fmt::Display for MoneyParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' is not a valid amount", self.input)
    }
}

impl std::error::Error for MoneyParseError {}

/// Parses a display-formatted amount ("1.500.000" or "1,500,000") into
/// minor units. Plain digit strings are accepted as well. Separators must
/// delimit groups of exactly three digits, so a stray "12.5" is an error
/// rather than a lossy 125.
pub fn parse_display(input: &str) -> Result<i64, MoneyParseError> {
    let error = || MoneyParseError {
        input: input.to_string(),
    };

    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(error());
    }

    let groups: Vec<&str> = trimmed.split(['.', ',']).collect();
    if groups
        .iter()
        .any(|group| group.is_empty() || !group.chars().all(|ch| ch.is_ascii_digit()))
    {
        return Err(error());
    }
    if groups.len() > 1
        && (groups[0].len() > 3 || groups[1..].iter().any(|group| group.len() != 3))
    {
        return Err(error());
    }

    groups.concat().parse::<i64>().map_err(|_| error())
}

/// Formats minor units with '.' thousand separators ("1500000" -> "1.500.000").
pub fn format_display(amount: i64) -> String {
    let raw = amount.abs().to_string();
    let mut grouped = String::with_capacity(raw.len() + raw.len() / 3);
    for (i, ch) in raw.chars().enumerate() {
        if i > 0 && (raw.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    if amount < 0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

/// Serde codec for a required monetary field: serialized as a decimal
/// string, accepted as either a string or a bare integer.
pub mod as_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(amount: &i64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&amount.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<i64, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Int(value) => Ok(value),
            Raw::Text(text) => text
                .trim()
                .parse::<i64>()
                .map_err(|_| serde::de::Error::custom(format!("invalid amount '{}'", text))),
        }
    }
}

/// Same codec for optional fields; pair with `#[serde(default)]`.
pub mod as_string_opt {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(amount: &Option<i64>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match amount {
            Some(value) => serializer.serialize_str(&value.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Text(String),
        }

        match Option::<Raw>::deserialize(deserializer)? {
            None => Ok(None),
            Some(Raw::Int(value)) => Ok(Some(value)),
            Some(Raw::Text(text)) => text
                .trim()
                .parse::<i64>()
                .map(Some)
                .map_err(|_| serde::de::Error::custom(format!("invalid amount '{}'", text))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Payload {
        #[serde(with = "as_string")]
        amount: i64,
    }

    #[test]
    fn parses_display_format() {
        assert_eq!(parse_display("1.500.000"), Ok(1_500_000));
        assert_eq!(parse_display("1,500,000"), Ok(1_500_000));
        assert_eq!(parse_display("300000"), Ok(300_000));
        assert_eq!(parse_display(" 42 "), Ok(42));
    }

    #[test]
    fn rejects_malformed_display_input() {
        assert!(parse_display("").is_err());
        assert!(parse_display("abc").is_err());
        assert!(parse_display("12x00").is_err());
        assert!(parse_display("-500").is_err());
        assert!(parse_display("1.5e3").is_err());
    }

    #[test]
    fn rejects_misplaced_separators() {
        assert!(parse_display("12.5").is_err());
        assert!(parse_display("1.50.000").is_err());
        assert!(parse_display("1500.000").is_err());
        assert!(parse_display("1..000").is_err());
        assert!(parse_display("1.000.").is_err());
    }

    #[test]
    fn formats_display_with_separators() {
        assert_eq!(format_display(1_500_000), "1.500.000");
        assert_eq!(format_display(300_000), "300.000");
        assert_eq!(format_display(999), "999");
        assert_eq!(format_display(0), "0");
        assert_eq!(format_display(-1_234_567), "-1.234.567");
    }

    #[test]
    fn display_round_trip_is_lossless() {
        let parsed = parse_display("1.500.000").unwrap();
        assert_eq!(parsed, 1_500_000);
        assert_eq!(format_display(parsed), "1.500.000");
    }

    #[test]
    fn serializes_amount_as_string() {
        let json = serde_json::to_string(&Payload { amount: 1_500_000 }).unwrap();
        assert_eq!(json, r#"{"amount":"1500000"}"#);
    }

    #[test]
    fn deserializes_from_string_or_integer() {
        let from_string: Payload = serde_json::from_str(r#"{"amount":"1500000"}"#).unwrap();
        assert_eq!(from_string.amount, 1_500_000);

        let from_int: Payload = serde_json::from_str(r#"{"amount":1500000}"#).unwrap();
        assert_eq!(from_int.amount, 1_500_000);
    }

    #[test]
    fn rejects_fractional_and_garbage_amounts() {
        assert!(serde_json::from_str::<Payload>(r#"{"amount":"12.5"}"#).is_err());
        assert!(serde_json::from_str::<Payload>(r#"{"amount":"abc"}"#).is_err());
        assert!(serde_json::from_str::<Payload>(r#"{"amount":12.5}"#).is_err());
    }

    #[test]
    fn survives_i64_extremes() {
        let max = Payload { amount: i64::MAX };
        let json = serde_json::to_string(&max).unwrap();
        let back: Payload = serde_json::from_str(&json).unwrap();
        assert_eq!(back, max);
    }
}
