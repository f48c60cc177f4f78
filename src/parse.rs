//! Parsing the model's text into a course draft.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::domain::{MiniCourse, Resource, ResourceCandidate};
use crate::error::{CourseError, Result};

static OPENING_FENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^```(json)?").expect("opening fence regex"));
static CLOSING_FENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"```$").expect("closing fence regex"));

/// A validated course whose resources still need sanitizing.
#[derive(Debug)]
pub struct CourseDraft {
  pub course: MiniCourse,
  pub resources: Vec<ResourceCandidate>,
}

impl CourseDraft {
  pub fn finish(self, resources: Vec<Resource>) -> MiniCourse {
    MiniCourse { resources, ..self.course }
  }
}

/// Remove a surrounding Markdown code fence (with or without a `json` tag).
pub fn strip_code_fence(raw: &str) -> String {
  let s = OPENING_FENCE.replace(raw.trim(), "");
  let s = CLOSING_FENCE.replace(&s, "");
  s.trim().to_string()
}

/// Parse and minimally validate model output.
///
/// Invalid JSON yields [`CourseError::Parse`] with the original text; JSON
/// without a non-blank `title` or with a non-array `lessons` yields
/// [`CourseError::Schema`] with the parsed document. Other fields of the wrong
/// type decode to their defaults.
pub fn parse_course_json(raw: &str) -> Result<CourseDraft> {
  let value: Value = serde_json::from_str(&strip_code_fence(raw)).map_err(|e| CourseError::Parse {
    message: e.to_string(),
    raw: raw.to_string(),
  })?;

  if let Err(reason) = check_shape(&value) {
    return Err(CourseError::Schema { reason: reason.into(), value });
  }

  let resources = value
    .get("resources")
    .and_then(Value::as_array)
    .map(|items| items.iter().map(ResourceCandidate::from).collect())
    .unwrap_or_default();

  let decoded = MiniCourse::deserialize(&value);
  match decoded {
    Ok(course) => Ok(CourseDraft { course, resources }),
    Err(e) => Err(CourseError::Schema { reason: e.to_string(), value }),
  }
}

fn check_shape(value: &Value) -> std::result::Result<(), &'static str> {
  let has_title = value
    .get("title")
    .and_then(Value::as_str)
    .is_some_and(|t| !t.trim().is_empty());
  if !has_title {
    return Err("missing or empty 'title'");
  }
  if !value.get("lessons").is_some_and(Value::is_array) {
    return Err("'lessons' is not an array");
  }
  Ok(())
}
