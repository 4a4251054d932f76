//! Survey answers and the stored survey record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::{
  FieldError, IdentityKey, Result, ValidationErrors,
  identity::{format_phone, normalize, validate_phone},
  store::{Document, Fields, to_fields},
};

// ─── Answer enums ────────────────────────────────────────────────────────────

/// How the respondent found the restaurant.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  EnumIter,
)]
#[strum(ascii_case_insensitive)]
pub enum DiscoveryChannel {
  Google,
  #[serde(rename = "In-person")]
  #[strum(to_string = "In-person")]
  InPerson,
  /// Through a delivery app or its driver.
  #[serde(rename = "Delivery-driven")]
  #[strum(to_string = "Delivery-driven")]
  DeliveryDriven,
  Instagram,
  /// Recommended by an influencer; the survey then asks which one.
  Influencer,
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  EnumIter,
)]
#[strum(ascii_case_insensitive)]
pub enum ServiceQuality {
  Excellent,
  Good,
  Regular,
  Poor,
}

/// How quickly the order was prepared.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  EnumIter,
)]
#[strum(ascii_case_insensitive)]
pub enum PrepSpeed {
  #[serde(rename = "Very fast")]
  #[strum(to_string = "Very fast")]
  VeryFast,
  #[serde(rename = "As expected")]
  #[strum(to_string = "As expected")]
  AsExpected,
  Slow,
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  EnumIter,
)]
#[strum(ascii_case_insensitive)]
pub enum FoodQuality {
  Perfect,
  Good,
  /// The survey then asks what could be better.
  #[serde(rename = "Could improve")]
  #[strum(to_string = "Could improve")]
  CouldImprove,
}

// ─── Form input ──────────────────────────────────────────────────────────────

/// First step of the survey: who is answering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Respondent {
  pub name:  String,
  /// Raw phone input; masked and normalized on the way to the store.
  pub phone: String,
}

impl Respondent {
  pub fn new(name: impl Into<String>, phone: impl Into<String>) -> Self {
    Self { name: name.into(), phone: phone.into() }
  }

  /// The identity key for this respondent.
  pub fn key(&self) -> IdentityKey { normalize(&self.phone) }

  /// Check the name and phone before anything touches the store.
  pub fn validate(&self) -> Result<(), ValidationErrors> {
    let mut errors = Vec::new();
    check_name(&self.name, &mut errors);
    if let Err(e) = validate_phone(&self.phone) {
      errors.push(e);
    }
    ValidationErrors::check(errors)
  }
}

fn check_name(name: &str, errors: &mut Vec<FieldError>) {
  if name.trim().chars().count() < 2 {
    errors.push(FieldError::new("name", "must be at least 2 characters"));
  }
}

/// The questionnaire answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveyAnswers {
  pub discovery_channel: DiscoveryChannel,
  pub influencer_name:   Option<String>,
  /// 1 to 5 stars.
  pub overall_rating:    u8,
  pub service:           ServiceQuality,
  pub speed:             PrepSpeed,
  pub food:              FoodQuality,
  pub food_improvement:  Option<String>,
  pub suggestion:        Option<String>,
}

// ─── Stored record ───────────────────────────────────────────────────────────

/// One survey response, stored under the respondent's identity key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyRecord {
  pub uid:               IdentityKey,
  pub name:              String,
  /// Display form, e.g. `(11) 91234-5678`.
  pub phone:             String,
  pub discovery_channel: DiscoveryChannel,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub influencer_name:   Option<String>,
  pub overall_rating:    u8,
  pub service:           ServiceQuality,
  pub speed:             PrepSpeed,
  pub food:              FoodQuality,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub food_improvement:  Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub suggestion:        Option<String>,
  /// Server-assigned; taken from the document envelope, never from the
  /// client.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub created_at:        Option<DateTime<Utc>>,
}

/// Trim and drop blank optional text.
fn non_blank(s: &Option<String>) -> Option<String> {
  s.as_deref()
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(str::to_owned)
}

impl SurveyRecord {
  /// Assemble the record the survey flow writes for `key`.
  ///
  /// Conditional answers are only kept when their trigger answer is set:
  /// the influencer name for [`DiscoveryChannel::Influencer`], the
  /// improvement note for [`FoodQuality::CouldImprove`].
  pub fn new(
    key: IdentityKey,
    respondent: &Respondent,
    answers: &SurveyAnswers,
  ) -> Self {
    let influencer_name = match answers.discovery_channel {
      DiscoveryChannel::Influencer => non_blank(&answers.influencer_name),
      _ => None,
    };
    let food_improvement = match answers.food {
      FoodQuality::CouldImprove => non_blank(&answers.food_improvement),
      _ => None,
    };

    Self {
      uid: key,
      name: respondent.name.trim().to_owned(),
      phone: format_phone(&respondent.phone),
      discovery_channel: answers.discovery_channel,
      influencer_name,
      overall_rating: answers.overall_rating,
      service: answers.service,
      speed: answers.speed,
      food: answers.food,
      food_improvement,
      suggestion: non_blank(&answers.suggestion),
      created_at: None,
    }
  }

  /// Check every field, collecting all failures.
  pub fn validate(&self) -> Result<(), ValidationErrors> {
    let mut errors = Vec::new();

    check_name(&self.name, &mut errors);
    if let Err(e) = validate_phone(&self.phone) {
      errors.push(e);
    } else if normalize(&self.phone) != self.uid {
      errors.push(FieldError::new(
        "phone",
        "does not match the respondent's identity key",
      ));
    }
    if !(1..=5).contains(&self.overall_rating) {
      errors.push(FieldError::new("overallRating", "must be between 1 and 5"));
    }
    if self.discovery_channel == DiscoveryChannel::Influencer
      && non_blank(&self.influencer_name).is_none()
    {
      errors.push(FieldError::new("influencerName", "required for influencer"));
    }
    if self.food == FoodQuality::CouldImprove
      && non_blank(&self.food_improvement).is_none()
    {
      errors.push(FieldError::new(
        "foodImprovement",
        "tell us what could be better",
      ));
    }

    ValidationErrors::check(errors)
  }

  /// The field map written to the store. The creation timestamp is left out;
  /// the store assigns it.
  pub fn to_fields(&self) -> Result<Fields> {
    let mut fields = to_fields(self)?;
    fields.remove("createdAt");
    Ok(fields)
  }

  /// Decode a stored survey document, taking `created_at` from the envelope.
  pub fn from_document(doc: &Document) -> Result<Self> {
    let mut record: Self = doc.decode()?;
    record.created_at = Some(doc.created_at);
    Ok(record)
  }
}

#[cfg(test)]
mod tests {
  use std::str::FromStr;

  use serde_json::json;

  use super::*;

  fn answers() -> SurveyAnswers {
    SurveyAnswers {
      discovery_channel: DiscoveryChannel::Instagram,
      influencer_name:   None,
      overall_rating:    5,
      service:           ServiceQuality::Excellent,
      speed:             PrepSpeed::AsExpected,
      food:              FoodQuality::Perfect,
      food_improvement:  None,
      suggestion:        Some("  more sauce  ".into()),
    }
  }

  fn respondent() -> Respondent { Respondent::new(" Maria ", "11999990000") }

  #[test]
  fn enums_use_display_labels_on_the_wire() {
    assert_eq!(
      serde_json::to_value(DiscoveryChannel::DeliveryDriven).unwrap(),
      json!("Delivery-driven")
    );
    assert_eq!(PrepSpeed::VeryFast.to_string(), "Very fast");
    assert_eq!(
      FoodQuality::from_str("could improve").unwrap(),
      FoodQuality::CouldImprove
    );
    assert_eq!(
      DiscoveryChannel::from_str("in-person").unwrap(),
      DiscoveryChannel::InPerson
    );
  }

  #[test]
  fn new_record_masks_phone_and_trims_text() {
    let key = respondent().key();
    let record = SurveyRecord::new(key.clone(), &respondent(), &answers());
    assert_eq!(record.uid, key);
    assert_eq!(record.name, "Maria");
    assert_eq!(record.phone, "(11) 99999-0000");
    assert_eq!(record.suggestion.as_deref(), Some("more sauce"));
    assert!(record.validate().is_ok());
  }

  #[test]
  fn conditional_fields_are_dropped_when_not_triggered() {
    let mut a = answers();
    a.influencer_name = Some("someone".into());
    a.food_improvement = Some("less salt".into());
    let record = SurveyRecord::new(respondent().key(), &respondent(), &a);
    assert_eq!(record.influencer_name, None);
    assert_eq!(record.food_improvement, None);
  }

  #[test]
  fn influencer_requires_a_name() {
    let mut a = answers();
    a.discovery_channel = DiscoveryChannel::Influencer;
    a.influencer_name = Some("   ".into());
    let record = SurveyRecord::new(respondent().key(), &respondent(), &a);
    let err = record.validate().unwrap_err();
    assert!(err.contains("influencerName"));

    a.influencer_name = Some("@burgerlover".into());
    let record = SurveyRecord::new(respondent().key(), &respondent(), &a);
    assert!(record.validate().is_ok());
  }

  #[test]
  fn could_improve_requires_a_note() {
    let mut a = answers();
    a.food = FoodQuality::CouldImprove;
    let record = SurveyRecord::new(respondent().key(), &respondent(), &a);
    assert!(record.validate().unwrap_err().contains("foodImprovement"));
  }

  #[test]
  fn all_field_errors_are_reported_together() {
    let mut a = answers();
    a.overall_rating = 0;
    let who = Respondent::new("M", "1234");
    let record = SurveyRecord::new(who.key(), &who, &a);
    let err = record.validate().unwrap_err();
    let fields: Vec<_> = err.fields().collect();
    assert_eq!(fields, ["name", "phone", "overallRating"]);
  }

  #[test]
  fn respondent_is_checked_on_its_own() {
    assert!(respondent().validate().is_ok());

    let err = Respondent::new("Maria", "(11) 9999").validate().unwrap_err();
    assert_eq!(err.fields().collect::<Vec<_>>(), ["phone"]);

    let err = Respondent::new(" M ", "").validate().unwrap_err();
    assert_eq!(err.fields().collect::<Vec<_>>(), ["name", "phone"]);
  }

  #[test]
  fn mismatched_key_is_a_phone_error() {
    let record = SurveyRecord::new(
      IdentityKey::parse("5511999990000").unwrap(),
      &respondent(),
      &answers(),
    );
    assert!(record.validate().unwrap_err().contains("phone"));
  }

  #[test]
  fn fields_omit_created_at_and_use_camel_case() {
    let mut record =
      SurveyRecord::new(respondent().key(), &respondent(), &answers());
    record.created_at = Some(Utc::now());
    let fields = record.to_fields().unwrap();
    assert!(!fields.contains_key("createdAt"));
    assert_eq!(fields["discoveryChannel"], json!("Instagram"));
    assert_eq!(fields["overallRating"], json!(5));
    assert!(!fields.contains_key("influencerName"));
  }
}
