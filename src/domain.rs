//! Domain models: experience level, the mini-course and its lessons/quizzes/resources.
//!
//! The model's JSON is untyped. Past the title/lessons shape check done by the
//! parser, a field of the wrong type decodes to its empty default rather than
//! failing the course. Counts accept numeric strings; unknown fields are dropped.

use std::{fmt, str::FromStr};

use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Audience level the course is written for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperienceLevel {
  #[default]
  Beginner,
  Intermediate,
  Advanced,
}

impl ExperienceLevel {
  pub fn as_str(&self) -> &'static str {
    match self {
      ExperienceLevel::Beginner => "beginner",
      ExperienceLevel::Intermediate => "intermediate",
      ExperienceLevel::Advanced => "advanced",
    }
  }
}

impl fmt::Display for ExperienceLevel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for ExperienceLevel {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "beginner" => Ok(ExperienceLevel::Beginner),
      "intermediate" => Ok(ExperienceLevel::Intermediate),
      "advanced" => Ok(ExperienceLevel::Advanced),
      other => Err(format!("unknown experience level '{other}'")),
    }
  }
}

// Unknown strings fall back to the default level instead of failing the whole course.
impl<'de> Deserialize<'de> for ExperienceLevel {
  fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
    let s = String::deserialize(d)?;
    Ok(s.parse().unwrap_or_default())
  }
}

/// A titled link attached to a course. Only ever built by the sanitizer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
  pub title: String,
  pub url: String,
}

/// Untrusted `{title, url}` pair as emitted by the model.
/// Fields that are missing or not strings are kept as `None`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResourceCandidate {
  pub title: Option<String>,
  pub url: Option<String>,
}

impl ResourceCandidate {
  #[cfg(test)]
  pub fn new(title: &str, url: &str) -> Self {
    Self { title: Some(title.to_string()), url: Some(url.to_string()) }
  }
}

impl From<&Value> for ResourceCandidate {
  fn from(v: &Value) -> Self {
    let text = |key: &str| v.get(key).and_then(Value::as_str).map(str::to_string);
    Self { title: text("title"), url: text("url") }
  }
}

impl From<&Resource> for ResourceCandidate {
  fn from(r: &Resource) -> Self {
    Self { title: Some(r.title.clone()), url: Some(r.url.clone()) }
  }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
  #[serde(default, deserialize_with = "lenient_text")]
  pub question: String,
  #[serde(default, deserialize_with = "lenient_list")]
  pub options: Vec<String>,
  #[serde(default, deserialize_with = "lenient_index")]
  pub answer_index: usize,
  #[serde(default, deserialize_with = "lenient_text")]
  pub explanation: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
  #[serde(default, deserialize_with = "lenient_text")]
  pub title: String,
  #[serde(default, deserialize_with = "lenient_text")]
  pub summary: String,
  #[serde(default, deserialize_with = "lenient_minutes")]
  pub duration_minutes: u32,
  #[serde(default, deserialize_with = "lenient_list")]
  pub objectives: Vec<String>,
  #[serde(default, deserialize_with = "lenient_list")]
  pub outline: Vec<String>,
  #[serde(default, deserialize_with = "lenient_text")]
  pub activity: String,
  #[serde(default, deserialize_with = "lenient_option", skip_serializing_if = "Option::is_none")]
  pub quiz: Option<Quiz>,
}

/// The structured lesson plan returned to the client.
///
/// `resources` is never read from the model directly: the parser hands the raw
/// entries to the sanitizer as [`ResourceCandidate`]s and only sanitized
/// [`Resource`]s end up here.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MiniCourse {
  #[serde(default, deserialize_with = "lenient_text")]
  pub topic: String,
  #[serde(default, deserialize_with = "lenient_text")]
  pub title: String,
  #[serde(default, deserialize_with = "lenient_text")]
  pub overview: String,
  #[serde(default, deserialize_with = "lenient_text")]
  pub estimated_duration: String,
  #[serde(default, deserialize_with = "or_default")]
  pub level: ExperienceLevel,
  #[serde(default, deserialize_with = "lenient_list")]
  pub prerequisites: Vec<String>,
  #[serde(default, deserialize_with = "lenient_items")]
  pub lessons: Vec<Lesson>,
  #[serde(default, skip_deserializing)]
  pub resources: Vec<Resource>,
}

/// Decode `T`, or `T::default()` when the value has another shape.
fn or_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
  D: Deserializer<'de>,
  T: DeserializeOwned + Default,
{
  Ok(T::deserialize(Value::deserialize(d)?).unwrap_or_default())
}

fn lenient_option<'de, D, T>(d: D) -> Result<Option<T>, D::Error>
where
  D: Deserializer<'de>,
  T: DeserializeOwned,
{
  Ok(T::deserialize(Value::deserialize(d)?).ok())
}

/// Arrays decode item by item; an item of the wrong shape becomes `T::default()`.
fn lenient_items<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
where
  D: Deserializer<'de>,
  T: DeserializeOwned + Default,
{
  let items = match Value::deserialize(d)? {
    Value::Array(items) => items,
    _ => return Ok(Vec::new()),
  };
  Ok(items.into_iter().map(|v| T::deserialize(v).unwrap_or_default()).collect())
}

fn scalar_text(v: &Value) -> Option<String> {
  match v {
    Value::String(s) => Some(s.clone()),
    Value::Number(n) => Some(n.to_string()),
    Value::Bool(b) => Some(b.to_string()),
    _ => None,
  }
}

fn lenient_text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
  Ok(scalar_text(&Value::deserialize(d)?).unwrap_or_default())
}

fn lenient_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
  Ok(match Value::deserialize(d)? {
    Value::Array(items) => items.iter().filter_map(scalar_text).collect(),
    _ => Vec::new(),
  })
}

fn lenient_minutes<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
  Ok(lenient_count(d)?.and_then(|n| u32::try_from(n).ok()).unwrap_or_default())
}

fn lenient_index<'de, D: Deserializer<'de>>(d: D) -> Result<usize, D::Error> {
  Ok(lenient_count(d)?.and_then(|n| usize::try_from(n).ok()).unwrap_or_default())
}

/// Integers, non-negative floats (rounded) and numeric strings. Anything else is `None`.
fn lenient_count<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
  fn from_float(f: f64) -> Option<u64> {
    (f.is_finite() && f >= 0.0).then(|| f.round() as u64)
  }

  Ok(match Value::deserialize(d)? {
    Value::Number(n) => n.as_u64().or_else(|| n.as_f64().and_then(from_float)),
    Value::String(s) => s.trim().parse::<f64>().ok().and_then(from_float),
    _ => None,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn level_parsing_is_case_insensitive_and_lenient() {
    assert_eq!("Advanced".parse::<ExperienceLevel>(), Ok(ExperienceLevel::Advanced));
    assert!("expert".parse::<ExperienceLevel>().is_err());
    let lvl: ExperienceLevel = serde_json::from_value(json!("expert")).unwrap();
    assert_eq!(lvl, ExperienceLevel::Beginner);
    assert_eq!(serde_json::to_value(ExperienceLevel::Intermediate).unwrap(), json!("intermediate"));
  }

  #[test]
  fn lesson_decodes_loose_numbers_and_nulls() {
    let lesson: Lesson = serde_json::from_value(json!({
      "title": "What is an ETF",
      "summary": null,
      "durationMinutes": "12",
      "objectives": ["a"],
      "quiz": { "question": "q", "options": ["x", "y"], "answerIndex": 1.0, "explanation": "e" }
    }))
    .unwrap();
    assert_eq!(lesson.duration_minutes, 12);
    assert_eq!(lesson.summary, "");
    assert!(lesson.outline.is_empty());
    assert_eq!(lesson.quiz.unwrap().answer_index, 1);
  }

  #[test]
  fn bad_counts_decode_as_zero() {
    let lesson: Lesson = serde_json::from_value(json!({
      "durationMinutes": "about 10",
      "quiz": { "answerIndex": -1 }
    }))
    .unwrap();
    assert_eq!(lesson.duration_minutes, 0);
    assert_eq!(lesson.quiz.unwrap().answer_index, 0);

    let lesson: Lesson = serde_json::from_value(json!({ "durationMinutes": -3 })).unwrap();
    assert_eq!(lesson.duration_minutes, 0);
  }

  #[test]
  fn mistyped_fields_fall_back_to_defaults() {
    let course: MiniCourse = serde_json::from_value(json!({
      "title": "T",
      "estimatedDuration": 35,
      "level": 3,
      "prerequisites": "none",
      "overview": { "nested": true },
      "lessons": ["just a string", { "title": "L", "objectives": ["a", 2, null], "quiz": "soon" }]
    }))
    .unwrap();
    assert_eq!(course.estimated_duration, "35");
    assert_eq!(course.level, ExperienceLevel::Beginner);
    assert!(course.prerequisites.is_empty());
    assert_eq!(course.overview, "");
    assert_eq!(course.lessons.len(), 2);
    assert_eq!(course.lessons[0], Lesson::default());
    assert_eq!(course.lessons[1].objectives, vec!["a", "2"]);
    assert!(course.lessons[1].quiz.is_none());
  }

  #[test]
  fn course_serializes_camel_case_and_skips_absent_quiz() {
    let course = MiniCourse {
      title: "ETF Basics".into(),
      estimated_duration: "30 min".into(),
      lessons: vec![Lesson { duration_minutes: 5, ..Default::default() }],
      ..Default::default()
    };
    let v = serde_json::to_value(&course).unwrap();
    assert_eq!(v["estimatedDuration"], "30 min");
    assert_eq!(v["lessons"][0]["durationMinutes"], 5);
    assert!(v["lessons"][0].get("quiz").is_none());
    assert_eq!(v["resources"], json!([]));
  }

  #[test]
  fn candidate_keeps_only_string_fields() {
    let c = ResourceCandidate::from(&json!({ "title": 42, "url": "https://sec.gov" }));
    assert_eq!(c.title, None);
    assert_eq!(c.url.as_deref(), Some("https://sec.gov"));
  }
}
