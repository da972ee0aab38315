//  IDENTIFIER.rs
//
//  Description:
//!   Defines [`Identifier`], a validated string used for driver-tree
//!   child names and the mandatory `name` label (§3 "Driver node").
//

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FResult};
use std::ops::Deref;
use std::str::FromStr;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};

/// Defines the errors that may occur when parsing [`Identifier`]s.
#[derive(Debug)]
pub enum IdentifierParseError {
    Empty { raw: String },
    IllegalChar { raw: String, c: char },
}
impl Display for IdentifierParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        use IdentifierParseError::*;
        match self {
            Empty { raw } => write!(f, "identifier '{raw}' is empty"),
            IllegalChar { raw, c } => {
                write!(f, "identifier '{raw}' cannot contain character '{c}', only alphanumerical characters, '-' and '_' are allowed")
            },
        }
    }
}
impl Error for IdentifierParseError {}

/// An owned string that is guaranteed to be a valid driver-tree child
/// name: non-empty, and containing only alphanumerics, `-` and `_`.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Identifier(String);
impl Identifier {
    fn find_illegal_char(s: &str) -> Option<char> { s.chars().find(|c| !c.is_alphanumeric() && *c != '-' && *c != '_') }

    pub fn as_str(&self) -> &str { &self.0 }
}
impl Display for Identifier {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult { write!(f, "{}", self.0) }
}
impl Deref for Identifier {
    type Target = str;

    #[inline]
    fn deref(&self) -> &Self::Target { &self.0 }
}
impl AsRef<str> for Identifier {
    #[inline]
    fn as_ref(&self) -> &str { &self.0 }
}
impl FromStr for Identifier {
    type Err = IdentifierParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(IdentifierParseError::Empty { raw: s.into() });
        }
        if let Some(c) = Self::find_illegal_char(s) {
            return Err(IdentifierParseError::IllegalChar { raw: s.into(), c });
        }
        Ok(Self(s.into()))
    }
}
impl TryFrom<String> for Identifier {
    type Error = IdentifierParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        if s.is_empty() {
            return Err(IdentifierParseError::Empty { raw: s });
        }
        if let Some(c) = Self::find_illegal_char(&s) {
            return Err(IdentifierParseError::IllegalChar { raw: s, c });
        }
        Ok(Self(s))
    }
}
impl<'de> Deserialize<'de> for Identifier {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct IdentifierVisitor;
        impl<'de> Visitor<'de> for IdentifierVisitor {
            type Value = Identifier;

            fn expecting(&self, f: &mut Formatter<'_>) -> FResult { write!(f, "an alphanumeric identifier") }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Identifier::from_str(v).map_err(E::custom)
            }
        }
        deserializer.deserialize_str(IdentifierVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_alphanumeric_dash_underscore() {
        assert!(Identifier::from_str("power0").is_ok());
        assert!(Identifier::from_str("power-0_a").is_ok());
    }

    #[test]
    fn rejects_empty_and_illegal_chars() {
        assert!(Identifier::from_str("").is_err());
        assert!(Identifier::from_str("power.0").is_err());
        assert!(Identifier::from_str("power 0").is_err());
    }
}
