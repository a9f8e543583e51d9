//! # Function Signatures
//!
//! Parsing and canonicalisation of function signatures such as
//! `transfer(address,uint256)`. Canonical text is what gets hashed into a
//! [`FunctionFingerprint`], so two spellings that differ only in whitespace
//! around parameters produce the same fingerprint.

use crate::domain::services::compute_fingerprint;
use crate::domain::value_objects::FunctionFingerprint;
use crate::errors::AssemblyError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A validated, canonical function signature.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct FunctionSignature {
    name: String,
    params: Vec<String>,
}

impl FunctionSignature {
    /// Parses and validates a signature.
    ///
    /// # Errors
    ///
    /// Returns [`AssemblyError::MalformedSignature`] when the name is not an
    /// identifier, parentheses are missing or unbalanced, a parameter slot is
    /// empty, or a parameter type is not a base type or tuple followed by
    /// `[]`/`[N]` array suffixes.
    pub fn parse(input: &str) -> Result<Self, AssemblyError> {
        let malformed = |reason: &str| AssemblyError::MalformedSignature {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = input.trim();
        let open = trimmed
            .find('(')
            .ok_or_else(|| malformed("missing '('"))?;
        if !trimmed.ends_with(')') {
            return Err(malformed("missing trailing ')'"));
        }

        let name = &trimmed[..open];
        if !is_identifier(name) {
            return Err(malformed("name is not a valid identifier"));
        }

        let inner = &trimmed[open + 1..trimmed.len() - 1];
        let params = split_params(inner).map_err(malformed)?;
        for param in &params {
            validate_type(param).map_err(malformed)?;
        }

        Ok(Self {
            name: name.to_string(),
            params,
        })
    }

    /// Function name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ordered parameter types.
    #[must_use]
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Canonical text: name plus comma-joined parameter types, no spaces.
    #[must_use]
    pub fn canonical(&self) -> String {
        format!("{}({})", self.name, self.params.join(","))
    }

    /// Fingerprint of the canonical text.
    #[must_use]
    pub fn fingerprint(&self) -> FunctionFingerprint {
        compute_fingerprint(&self.canonical())
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Splits the parameter list on top-level commas so tuple types stay whole.
fn split_params(inner: &str) -> Result<Vec<String>, &'static str> {
    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut params = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for c in inner.chars() {
        match c {
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth = depth.checked_sub(1).ok_or("unbalanced ')'")?;
                current.push(c);
            }
            ',' if depth == 0 => {
                params.push(std::mem::take(&mut current).trim().to_string());
            }
            _ => current.push(c),
        }
    }
    if depth != 0 {
        return Err("unbalanced '('");
    }
    params.push(current.trim().to_string());
    Ok(params)
}

/// A type is a base type or a tuple, followed by any number of `[]`/`[N]`.
fn validate_type(param: &str) -> Result<(), &'static str> {
    if param.is_empty() {
        return Err("empty parameter type");
    }
    if param.chars().any(char::is_whitespace) {
        return Err("whitespace inside parameter type");
    }
    if !param
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '[' | ']' | '(' | ')' | ','))
    {
        return Err("illegal character in parameter type");
    }

    let suffixes = if let Some(rest) = param.strip_prefix('(') {
        let close = closing_paren(rest).ok_or("unterminated tuple type")?;
        for component in split_params(&rest[..close])? {
            validate_type(&component)?;
        }
        &rest[close + 1..]
    } else {
        let end = param.find('[').unwrap_or(param.len());
        let base = &param[..end];
        if !base.starts_with(|c: char| c.is_ascii_alphabetic())
            || !base.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err("invalid base type");
        }
        &param[end..]
    };
    validate_array_suffixes(suffixes)
}

/// Byte offset of the `)` closing a tuple whose `(` was already consumed.
fn closing_paren(rest: &str) -> Option<usize> {
    let mut depth = 1usize;
    for (i, c) in rest.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn validate_array_suffixes(mut suffixes: &str) -> Result<(), &'static str> {
    while !suffixes.is_empty() {
        let body = suffixes
            .strip_prefix('[')
            .ok_or("unexpected text after type")?;
        let (len, rest) = body.split_once(']').ok_or("unterminated array suffix")?;
        if !len.chars().all(|c| c.is_ascii_digit()) {
            return Err("array length is not a number");
        }
        suffixes = rest;
    }
    Ok(())
}

impl fmt::Display for FunctionSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

impl fmt::Debug for FunctionSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FunctionSignature({})", self.canonical())
    }
}

impl FromStr for FunctionSignature {
    type Err = AssemblyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for FunctionSignature {
    type Error = AssemblyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<FunctionSignature> for String {
    fn from(sig: FunctionSignature) -> Self {
        sig.canonical()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let sig = FunctionSignature::parse("transfer(address,uint256)").unwrap();
        assert_eq!(sig.name(), "transfer");
        assert_eq!(sig.params(), ["address", "uint256"]);
        assert_eq!(sig.canonical(), "transfer(address,uint256)");
    }

    #[test]
    fn test_parse_no_params() {
        let sig = FunctionSignature::parse("totalSupply()").unwrap();
        assert!(sig.params().is_empty());
        assert_eq!(sig.canonical(), "totalSupply()");
    }

    #[test]
    fn test_whitespace_between_params_is_canonicalised() {
        let spaced = FunctionSignature::parse(" transfer( address , uint256 ) ").unwrap();
        let tight = FunctionSignature::parse("transfer(address,uint256)").unwrap();
        assert_eq!(spaced, tight);
        assert_eq!(spaced.fingerprint(), tight.fingerprint());
    }

    #[test]
    fn test_tuple_params_stay_whole() {
        let sig = FunctionSignature::parse("init((address,uint256),bool)").unwrap();
        assert_eq!(sig.params(), ["(address,uint256)", "bool"]);
    }

    #[test]
    fn test_tuple_array_param() {
        let sig = FunctionSignature::parse("batch((address,bytes4[])[])").unwrap();
        assert_eq!(sig.params(), ["(address,bytes4[])[]"]);
    }

    #[test]
    fn test_malformed_inputs_rejected() {
        for bad in [
            "",
            "transfer",
            "transfer(address",
            "(address)",
            "1transfer(address)",
            "trans fer(address)",
            "transfer(address,)",
            "transfer(,uint256)",
            "transfer(uint 256)",
            "transfer((address,uint256)",
            "transfer(address))",
            "transfer(addr-ess)",
            "f(]])",
            "f(uint256(address))",
            "f((address)uint256)",
            "f(uint256[)",
            "f(uint256])",
            "f(uint256[x])",
            "f([]uint256)",
            "f(uint256[2][)",
        ] {
            let err = FunctionSignature::parse(bad).unwrap_err();
            assert!(
                matches!(err, AssemblyError::MalformedSignature { .. }),
                "expected malformed for {bad:?}, got {err:?}"
            );
        }
    }

    #[test]
    fn test_array_suffixes_accepted() {
        let sig = FunctionSignature::parse("f(uint256[2][],(bool,address[3])[4])").unwrap();
        assert_eq!(sig.params(), ["uint256[2][]", "(bool,address[3])[4]"]);
    }

    #[test]
    fn test_serde_uses_canonical_text() {
        let sig: FunctionSignature = serde_json::from_str("\"balanceOf( address )\"").unwrap();
        assert_eq!(serde_json::to_string(&sig).unwrap(), "\"balanceOf(address)\"");
    }
}
