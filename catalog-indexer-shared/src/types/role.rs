//! Participation roles linking people to films.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// The closed set of roles a person can hold on a film.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Actor,
    Writer,
    Director,
}

impl Role {
    /// The lowercase tag stored in the catalog.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Actor => "actor",
            Role::Writer => "writer",
            Role::Director => "director",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "actor" => Ok(Role::Actor),
            "writer" => Ok(Role::Writer),
            "director" => Ok(Role::Director),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// Deserialize a role tag leniently.
///
/// Missing, null and unrecognised tags all become `None`, so an association
/// with an unspecified role never fails the surrounding record.
pub fn deserialize_optional_role<'de, D>(deserializer: D) -> Result<Option<Role>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|tag| tag.parse().ok()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Holder {
        #[serde(default, deserialize_with = "deserialize_optional_role")]
        role: Option<Role>,
    }

    #[test]
    fn test_parse_known_roles() {
        assert_eq!("actor".parse::<Role>(), Ok(Role::Actor));
        assert_eq!("Writer".parse::<Role>(), Ok(Role::Writer));
        assert_eq!(" director ".parse::<Role>(), Ok(Role::Director));
    }

    #[test]
    fn test_parse_unknown_role() {
        assert!("producer".parse::<Role>().is_err());
    }

    #[test]
    fn test_lenient_deserialization() {
        let known: Holder = serde_json::from_str(r#"{"role": "actor"}"#).unwrap();
        assert_eq!(known.role, Some(Role::Actor));

        let unknown: Holder = serde_json::from_str(r#"{"role": "composer"}"#).unwrap();
        assert_eq!(unknown.role, None);

        let null: Holder = serde_json::from_str(r#"{"role": null}"#).unwrap();
        assert_eq!(null.role, None);

        let missing: Holder = serde_json::from_str("{}").unwrap();
        assert_eq!(missing.role, None);
    }

    #[test]
    fn test_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Director).unwrap(), "\"director\"");
        assert_eq!(Role::Writer.to_string(), "writer");
    }
}
