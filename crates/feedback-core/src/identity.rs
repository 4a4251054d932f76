//! Identity keys: the digits of a respondent's phone number.
//!
//! The same key addresses the survey record and the prize claim, so every
//! path that derives one (pre-check, survey write, claim, prize update, API
//! rule checks) goes through [`normalize`]. A second derivation that kept a
//! country code or a separator would silently split one person into two
//! identities.

use std::{fmt, sync::LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{Error, FieldError, Result};

/// Mobile numbers as typed into the survey: two-digit area code, then a
/// nine-digit number starting with 9. Parentheses, a space or a dash, and the
/// inner dash are all optional.
static PHONE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"^\(?([0-9]{2})\)?(\s|-)?(9[0-9]{4})-?([0-9]{4})$")
    .expect("phone pattern is a valid regex")
});

/// Number of digits in a complete mobile number (area code included).
pub const PHONE_DIGITS: usize = 11;

// ─── IdentityKey ─────────────────────────────────────────────────────────────

/// A digits-only phone number used as the primary key of both the survey
/// record and the prize claim.
///
/// Built with [`normalize`] from raw input, or with [`IdentityKey::parse`]
/// from a key that is already normalized (URL paths, stored documents).
#[derive(
  Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct IdentityKey(String);

impl IdentityKey {
  /// Accept `s` only if it is a non-empty string of ASCII digits.
  pub fn parse(s: &str) -> Result<Self> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
      return Err(Error::InvalidKey(s.to_owned()));
    }
    Ok(Self(s.to_owned()))
  }

  pub fn as_str(&self) -> &str { &self.0 }

  /// True when the raw input contained no digits at all.
  pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

impl fmt::Display for IdentityKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl AsRef<str> for IdentityKey {
  fn as_ref(&self) -> &str { &self.0 }
}

impl TryFrom<String> for IdentityKey {
  type Error = Error;

  fn try_from(s: String) -> Result<Self> { Self::parse(&s) }
}

impl From<IdentityKey> for String {
  fn from(k: IdentityKey) -> Self { k.0 }
}

/// Strip every character that is not an ASCII decimal digit.
///
/// Total over all strings; formatting punctuation never changes the result.
pub fn normalize(raw: &str) -> IdentityKey {
  IdentityKey(raw.chars().filter(|c| c.is_ascii_digit()).collect())
}

// ─── Input helpers ───────────────────────────────────────────────────────────

/// Check `raw` against the accepted mobile number shape.
pub fn validate_phone(raw: &str) -> Result<(), FieldError> {
  if PHONE_PATTERN.is_match(raw.trim()) {
    Ok(())
  } else {
    Err(FieldError::new("phone", "expected format: (99) 99999-9999"))
  }
}

/// Apply the `(DD) DDDDD-DDDD` display mask to whatever digits `raw` holds.
///
/// Partial input is masked progressively and digits beyond the eleventh are
/// dropped, so the result is suitable for echoing back while typing.
pub fn format_phone(raw: &str) -> String {
  let digits: String = raw
    .chars()
    .filter(|c| c.is_ascii_digit())
    .take(PHONE_DIGITS)
    .collect();
  let n = digits.len();

  let mut out = String::with_capacity(15);
  if n > 0 {
    out.push('(');
    out.push_str(&digits[..n.min(2)]);
  }
  if n > 2 {
    out.push_str(") ");
    out.push_str(&digits[2..n.min(7)]);
    if n > 7 {
      out.push('-');
      out.push_str(&digits[7..]);
    }
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn punctuation_does_not_change_the_key() {
    let variants = [
      "(11) 91234-5678",
      "11912345678",
      "11 91234 5678",
      "(11)91234-5678",
      " 11-91234-5678 ",
    ];
    for v in variants {
      assert_eq!(normalize(v).as_str(), "11912345678", "input {v:?}");
    }
  }

  #[test]
  fn normalize_is_total() {
    assert!(normalize("").is_empty());
    assert!(normalize("no digits here").is_empty());
    // Non-ASCII digits are not decimal digits for key purposes.
    assert_eq!(normalize("١٢3").as_str(), "3");
  }

  #[test]
  fn parse_rejects_non_digits() {
    assert!(IdentityKey::parse("11999990000").is_ok());
    assert!(IdentityKey::parse("").is_err());
    assert!(IdentityKey::parse("(11) 99999-0000").is_err());
  }

  #[test]
  fn key_roundtrips_through_json_as_a_string() {
    let key = normalize("(11) 99999-0000");
    let json = serde_json::to_string(&key).unwrap();
    assert_eq!(json, "\"11999990000\"");
    let back: IdentityKey = serde_json::from_str(&json).unwrap();
    assert_eq!(back, key);
    assert!(serde_json::from_str::<IdentityKey>("\"11-9\"").is_err());
  }

  #[test]
  fn phone_validation_accepts_masked_and_bare_numbers() {
    assert!(validate_phone("(11) 91234-5678").is_ok());
    assert!(validate_phone("11912345678").is_ok());
    assert!(validate_phone("11-91234-5678").is_ok());
    assert!(validate_phone("(11) 81234-5678").is_err());
    assert!(validate_phone("1191234567").is_err());
    assert!(validate_phone("").is_err());
  }

  #[test]
  fn format_applies_mask_progressively() {
    assert_eq!(format_phone(""), "");
    assert_eq!(format_phone("1"), "(1");
    assert_eq!(format_phone("11"), "(11");
    assert_eq!(format_phone("119"), "(11) 9");
    assert_eq!(format_phone("1191234"), "(11) 91234");
    assert_eq!(format_phone("11912345"), "(11) 91234-5");
    assert_eq!(format_phone("11912345678"), "(11) 91234-5678");
    assert_eq!(format_phone("(11) 91234-567899"), "(11) 91234-5678");
  }
}
