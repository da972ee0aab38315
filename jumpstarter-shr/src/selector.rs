//  SELECTOR.rs
//
//  Description:
//!   Implements Kubernetes-style label selectors (§4.9, §8 property 7):
//!   a comma-separated list of requirements matched against a label map
//!   using subset-match semantics. Supports equality (`k=v`, `k==v`),
//!   inequality (`k!=v`), set membership (`k in (a,b)`), set exclusion
//!   (`k notin (a,b)`), existence (`k`) and non-existence (`!k`).
//

use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter, Result as FResult};
use std::str::FromStr;

use enum_debug::EnumDebug;

/// Defines the errors that may occur when parsing a [`Selector`].
#[derive(Debug)]
pub enum SelectorParseError {
    EmptyRequirement { raw: String },
    EmptyKey { raw: String },
    MalformedSet { raw: String },
    EmptySetValue { raw: String },
}
impl Display for SelectorParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        use SelectorParseError::*;
        match self {
            EmptyRequirement { raw } => write!(f, "empty requirement in selector '{raw}'"),
            EmptyKey { raw } => write!(f, "requirement '{raw}' has an empty key"),
            MalformedSet { raw } => write!(f, "requirement '{raw}' has a malformed 'in (...)'/'notin (...)' set"),
            EmptySetValue { raw } => write!(f, "requirement '{raw}' contains an empty value in its set"),
        }
    }
}
impl Error for SelectorParseError {}

/// A single label requirement, one comma-separated clause of a [`Selector`].
#[derive(Clone, Debug, EnumDebug, Eq, PartialEq)]
pub enum Requirement {
    /// `key=value` or `key==value`
    Equals { key: String, value: String },
    /// `key!=value`
    NotEquals { key: String, value: String },
    /// `key in (v1, v2, ...)`
    In { key: String, values: Vec<String> },
    /// `key notin (v1, v2, ...)`
    NotIn { key: String, values: Vec<String> },
    /// `key`
    Exists { key: String },
    /// `!key`
    NotExists { key: String },
}
impl Requirement {
    /// Returns whether `labels` satisfies this requirement.
    pub fn matches(&self, labels: &HashMap<String, String>) -> bool {
        match self {
            Requirement::Equals { key, value } => labels.get(key).map(|v| v == value).unwrap_or(false),
            Requirement::NotEquals { key, value } => labels.get(key).map(|v| v != value).unwrap_or(true),
            Requirement::In { key, values } => labels.get(key).map(|v| values.contains(v)).unwrap_or(false),
            Requirement::NotIn { key, values } => labels.get(key).map(|v| !values.contains(v)).unwrap_or(true),
            Requirement::Exists { key } => labels.contains_key(key),
            Requirement::NotExists { key } => !labels.contains_key(key),
        }
    }
}
impl FromStr for Requirement {
    type Err = SelectorParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let clause = raw.trim();
        if clause.is_empty() {
            return Err(SelectorParseError::EmptyRequirement { raw: raw.into() });
        }

        if let Some(key) = clause.strip_prefix('!') {
            let key = key.trim();
            if key.is_empty() {
                return Err(SelectorParseError::EmptyKey { raw: raw.into() });
            }
            return Ok(Requirement::NotExists { key: key.into() });
        }

        if let Some(rest) = clause.strip_suffix(')') {
            if let Some((key, kind, set)) = split_set_clause(rest) {
                let key = key.trim();
                if key.is_empty() {
                    return Err(SelectorParseError::EmptyKey { raw: raw.into() });
                }
                let set = set.trim_start_matches('(');
                let values: Vec<String> = set.split(',').map(str::trim).map(String::from).collect();
                if values.is_empty() {
                    return Err(SelectorParseError::MalformedSet { raw: raw.into() });
                }
                if values.iter().any(String::is_empty) {
                    return Err(SelectorParseError::EmptySetValue { raw: raw.into() });
                }
                return Ok(match kind {
                    SetKind::In => Requirement::In { key: key.into(), values },
                    SetKind::NotIn => Requirement::NotIn { key: key.into(), values },
                });
            }
            return Err(SelectorParseError::MalformedSet { raw: raw.into() });
        }

        if let Some((key, value)) = clause.split_once("!=") {
            let key = key.trim();
            if key.is_empty() {
                return Err(SelectorParseError::EmptyKey { raw: raw.into() });
            }
            return Ok(Requirement::NotEquals { key: key.into(), value: value.trim().into() });
        }
        if let Some((key, value)) = clause.split_once("==") {
            let key = key.trim();
            if key.is_empty() {
                return Err(SelectorParseError::EmptyKey { raw: raw.into() });
            }
            return Ok(Requirement::Equals { key: key.into(), value: value.trim().into() });
        }
        if let Some((key, value)) = clause.split_once('=') {
            let key = key.trim();
            if key.is_empty() {
                return Err(SelectorParseError::EmptyKey { raw: raw.into() });
            }
            return Ok(Requirement::Equals { key: key.into(), value: value.trim().into() });
        }

        Ok(Requirement::Exists { key: clause.into() })
    }
}

enum SetKind {
    In,
    NotIn,
}

/// Splits `"key in (a, b"` / `"key notin (a, b"` (closing paren already
/// stripped by the caller) into `(key, kind, "(a, b")`.
fn split_set_clause(rest: &str) -> Option<(&str, SetKind, &str)> {
    if let Some(idx) = rest.find(" notin ") {
        let (key, tail) = rest.split_at(idx);
        return Some((key, SetKind::NotIn, tail.trim_start_matches(" notin ").trim_start()));
    }
    if let Some(idx) = rest.find(" in ") {
        let (key, tail) = rest.split_at(idx);
        return Some((key, SetKind::In, tail.trim_start_matches(" in ").trim_start()));
    }
    None
}

/// A full label selector: a conjunction of [`Requirement`]s (§4.9).
/// `labels` satisfy the selector iff they satisfy every requirement
/// (subset-match semantics).
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Selector {
    requirements: Vec<Requirement>,
}
impl Selector {
    /// A selector with no requirements matches any label set.
    pub fn empty() -> Self { Self { requirements: Vec::new() } }

    pub fn requirements(&self) -> &[Requirement] { &self.requirements }

    /// Returns whether `labels` satisfies every requirement in this selector.
    pub fn matches(&self, labels: &HashMap<String, String>) -> bool { self.requirements.iter().all(|r| r.matches(labels)) }

    /// Returns whether `self` (a filter selector) is satisfied by `other`
    /// (a lease's selector) — §4.9/§8 property 7: every requirement in
    /// the filter must also be present in the lease's selector. An empty
    /// filter is contained by any selector.
    pub fn contains(&self, other: &Selector) -> bool { self.requirements.iter().all(|r| other.requirements.contains(r)) }
}
impl FromStr for Selector {
    type Err = SelectorParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(Self::empty());
        }

        let mut requirements = Vec::new();
        let mut depth = 0usize;
        let mut start = 0usize;
        let bytes = trimmed.as_bytes();
        for (i, b) in bytes.iter().enumerate() {
            match b {
                b'(' => depth += 1,
                b')' => depth = depth.saturating_sub(1),
                b',' if depth == 0 => {
                    requirements.push(trimmed[start..i].parse()?);
                    start = i + 1;
                },
                _ => {},
            }
        }
        requirements.push(trimmed[start..].parse()?);

        Ok(Self { requirements })
    }
}
impl Display for Selector {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        let parts: Vec<String> = self
            .requirements
            .iter()
            .map(|r| match r {
                Requirement::Equals { key, value } => format!("{key}={value}"),
                Requirement::NotEquals { key, value } => format!("{key}!={value}"),
                Requirement::In { key, values } => format!("{key} in ({})", values.join(",")),
                Requirement::NotIn { key, values } => format!("{key} notin ({})", values.join(",")),
                Requirement::Exists { key } => key.clone(),
                Requirement::NotExists { key } => format!("!{key}"),
            })
            .collect();
        write!(f, "{}", parts.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> HashMap<String, String> { pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect() }

    #[test]
    fn equality_matches() {
        let sel: Selector = "board=rpi".parse().unwrap();
        assert!(sel.matches(&labels(&[("board", "rpi")])));
        assert!(!sel.matches(&labels(&[("board", "qemu")])));
    }

    #[test]
    fn set_membership_matches() {
        let sel: Selector = "firmware in (v2,v3)".parse().unwrap();
        assert!(sel.matches(&labels(&[("firmware", "v3")])));
        assert!(!sel.matches(&labels(&[("firmware", "v1")])));
    }

    #[test]
    fn conjunction_is_subset_match() {
        let sel: Selector = "board=rpi,firmware in (v2,v3)".parse().unwrap();
        assert!(sel.matches(&labels(&[("board", "rpi"), ("firmware", "v2"), ("site", "lab1")])));
        assert!(!sel.matches(&labels(&[("board", "rpi"), ("firmware", "v1")])));
    }

    #[test]
    fn existence_and_negation() {
        let sel: Selector = "gpu,!legacy".parse().unwrap();
        assert!(sel.matches(&labels(&[("gpu", "")])));
        assert!(!sel.matches(&labels(&[("gpu", ""), ("legacy", "true")])));
    }

    #[test]
    fn inequality_and_notin() {
        let eq: Selector = "env!=prod".parse().unwrap();
        assert!(eq.matches(&labels(&[("env", "dev")])));
        assert!(!eq.matches(&labels(&[("env", "prod")])));

        let notin: Selector = "region notin (us,eu)".parse().unwrap();
        assert!(notin.matches(&labels(&[("region", "apac")])));
        assert!(!notin.matches(&labels(&[("region", "us")])));
    }

    #[test]
    fn whitespace_is_tolerated() {
        let sel: Selector = " board = rpi , firmware in ( v2 , v3 ) ".parse().unwrap();
        assert!(sel.matches(&labels(&[("board", "rpi"), ("firmware", "v2")])));
    }

    #[test]
    fn empty_selector_matches_anything() {
        let sel: Selector = "".parse().unwrap();
        assert!(sel.matches(&labels(&[])));
    }

    #[test]
    fn malformed_set_is_rejected() {
        assert!("firmware in (".parse::<Selector>().is_err());
        assert!("firmware in (v2,)".parse::<Selector>().is_err());
    }

    /// §8 scenario (e): lease selector `"board=rpi,firmware in (v2,v3)"`.
    #[test]
    fn selector_containment_subset_semantics() {
        let lease: Selector = "board=rpi,firmware in (v2,v3)".parse().unwrap();

        let board_only: Selector = "board=rpi".parse().unwrap();
        assert!(board_only.contains(&lease));

        let firmware_only: Selector = "firmware in (v2,v3)".parse().unwrap();
        assert!(firmware_only.contains(&lease));

        let wrong_firmware: Selector = "firmware in (v4)".parse().unwrap();
        assert!(!wrong_firmware.contains(&lease));

        let empty = Selector::empty();
        assert!(empty.contains(&lease));

        let extra_requirement: Selector = "!experimental".parse().unwrap();
        assert!(!extra_requirement.contains(&lease));
        let lease_with_negation: Selector = "board=rpi,firmware in (v2,v3),!experimental".parse().unwrap();
        assert!(extra_requirement.contains(&lease_with_negation));
    }

    #[test]
    fn selector_contains_itself() {
        let sel: Selector = "board=rpi,firmware in (v2,v3)".parse().unwrap();
        assert!(sel.contains(&sel));
    }
}
