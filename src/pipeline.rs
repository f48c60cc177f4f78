//! Course generation, end to end.
//!
//! Stages run strictly in order and the first failure short-circuits:
//!   validate input → build prompt → call model → extract text →
//!   parse + validate → sanitize resources → respond
//!
//! Sanitization is the one stage whose failure is recovered locally: the
//! course is returned with an empty resource list instead.

use std::time::Instant;

use tracing::{debug, info, instrument, warn};

use crate::domain::{ExperienceLevel, MiniCourse};
use crate::error::{CourseError, Result};
use crate::gemini::extract_text;
use crate::parse::parse_course_json;
use crate::prompt::build_prompt;
use crate::protocol::CourseRequestIn;
use crate::sanitize::recover_or;
use crate::state::AppState;
use crate::telemetry::targets;
use crate::util::trunc_for_log;

/// A validated course request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CourseRequest {
  pub topic: String,
  pub level: ExperienceLevel,
}

impl CourseRequest {
  /// Trim the topic and reject it when blank. Unknown levels fall back to beginner.
  pub fn from_input(input: CourseRequestIn) -> Result<Self> {
    let topic = input.topic.as_deref().map(str::trim).unwrap_or_default();
    if topic.is_empty() {
      return Err(CourseError::Input);
    }
    let level = match input.level.as_deref() {
      None => ExperienceLevel::default(),
      Some(raw) => raw.parse::<ExperienceLevel>().unwrap_or_else(|e: String| {
        warn!(target: targets::COURSE, error = %e, "Unrecognized level; using beginner");
        ExperienceLevel::default()
      }),
    };
    Ok(Self { topic: topic.to_string(), level })
  }
}

#[instrument(level = "info", skip(state), fields(topic = %req.topic, level = %req.level))]
pub async fn generate_course(state: &AppState, req: &CourseRequest) -> Result<MiniCourse> {
  let gemini = state.gemini.as_ref().ok_or(CourseError::Config)?;
  let start = Instant::now();

  let prompt = build_prompt(&state.prompts, &req.topic, req.level);
  debug!(target: targets::COURSE, prompt_len = prompt.len(), "Prompt built");

  let envelope = gemini.generate(&prompt).await?;

  let text = extract_text(&envelope).ok_or(CourseError::EmptyResponse)?;
  debug!(target: targets::COURSE, text_len = text.len(), preview = %trunc_for_log(&text, 80), "Model text extracted");

  let draft = parse_course_json(&text)?;
  let candidates = draft.resources.len();

  let resources = recover_or(state.resources.sanitize(&draft.resources), Vec::new);
  let course = draft.finish(resources);

  info!(
    target: targets::COURSE,
    elapsed = ?start.elapsed(),
    title = %course.title,
    lessons = course.lessons.len(),
    candidates,
    resources = course.resources.len(),
    "Mini-course generated"
  );
  Ok(course)
}
