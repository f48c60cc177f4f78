//! Resource URL sanitization.
//!
//! Links suggested by the model are untrusted: they may be Markdown, bare
//! domains, made-up hosts or non-web schemes. Only http(s) URLs whose host is
//! on the allow-list survive, aliased hosts are rewritten to their canonical
//! form, and the result is never empty (fallbacks) nor longer than the cap.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use reqwest::Url;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::domain::{Resource, ResourceCandidate};
use crate::error::{CourseError, Result};
use crate::telemetry::targets;

static MARKDOWN_LINK: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"\((https?://[^)]+)\)").expect("markdown link regex"));
static WWW_PREFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^www\.").expect("www regex"));
static BARE_DOMAIN: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?i)^[a-z0-9.-]+\.[a-z]{2,}($|/)").expect("bare domain regex"));
static HAS_WEB_SCHEME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^https?://").expect("scheme regex"));

const DEFAULT_TITLE: &str = "Resource";

/// Rewrites `from` to `to` after the allow-list check.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct HostAlias {
  pub from: String,
  pub to: String,
}

/// Which hosts are trusted, how they are canonicalized, and what to serve when
/// nothing survives.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ResourcePolicy {
  pub allowed_hosts: BTreeSet<String>,
  pub aliases: Vec<HostAlias>,
  pub fallbacks: Vec<Resource>,
  pub max_resources: usize,
}

impl Default for ResourcePolicy {
  fn default() -> Self {
    let bare = [
      "investopedia.com",
      "rbcroyalbank.com",
      "canada.ca",
      "irs.gov",
      "sec.gov",
      "bankofengland.co.uk",
      "investor.gov",
    ];
    let allowed_hosts = bare
      .iter()
      .flat_map(|h| [h.to_string(), format!("www.{h}")])
      .collect();
    let aliases = ["investopedia.com", "rbcroyalbank.com"]
      .iter()
      .map(|h| HostAlias { from: h.to_string(), to: format!("www.{h}") })
      .collect();
    let fallbacks = vec![
      Resource {
        title: "What Is an ETF?".into(),
        url: "https://www.investopedia.com/terms/e/etf.asp".into(),
      },
      Resource {
        title: "Dollar-Cost Averaging".into(),
        url: "https://www.investopedia.com/terms/d/dollarcostaveraging.asp".into(),
      },
    ];
    Self { allowed_hosts, aliases, fallbacks, max_resources: 4 }
  }
}

impl ResourcePolicy {
  /// Check the policy can keep its promises: a positive cap, alias targets on
  /// the allow-list, and at least one fallback that is itself accepted unchanged.
  pub fn validate(&self) -> Result<()> {
    if self.max_resources == 0 {
      return Err(CourseError::Sanitization("max_resources must be at least 1".into()));
    }
    if let Some(a) = self.aliases.iter().find(|a| !self.is_allowed(&a.to)) {
      return Err(CourseError::Sanitization(format!("alias target '{}' is not an allowed host", a.to)));
    }
    if self.fallbacks.is_empty() {
      return Err(CourseError::Sanitization("no fallback resources configured".into()));
    }
    for f in &self.fallbacks {
      if self.accept_url(&f.url).as_deref() != Some(f.url.as_str()) {
        return Err(CourseError::Sanitization(format!("fallback '{}' is not a canonical allowed URL", f.url)));
      }
    }
    Ok(())
  }

  /// Validate the policy, then filter, canonicalize, fall back and cap.
  ///
  /// Errors only come from the policy itself; with a valid policy (the built-in
  /// default is one) the output is non-empty, capped, and a fixed point.
  pub fn sanitize(&self, candidates: &[ResourceCandidate]) -> Result<Vec<Resource>> {
    self.validate()?;
    Ok(self.apply(candidates))
  }

  fn apply(&self, candidates: &[ResourceCandidate]) -> Vec<Resource> {
    let mut cleaned = Vec::new();
    for (idx, c) in candidates.iter().enumerate() {
      let (Some(title), Some(raw_url)) = (&c.title, &c.url) else {
        debug!(target: targets::COURSE, idx, "Skipping resource without text title/url");
        continue;
      };
      let Some(url) = self.accept_url(raw_url) else {
        debug!(target: targets::COURSE, idx, url = %crate::util::trunc_for_log(raw_url, 120), "Dropping disallowed resource URL");
        continue;
      };
      let title = match title.trim() {
        "" => DEFAULT_TITLE.to_string(),
        t => t.to_string(),
      };
      cleaned.push(Resource { title, url });
    }

    if cleaned.is_empty() {
      debug!(target: targets::COURSE, candidates = candidates.len(), "No resource survived; serving fallbacks");
      cleaned = self.fallbacks.clone();
    }
    cleaned.truncate(self.max_resources);
    cleaned
  }

  /// Canonical URL string if `raw` points at an allowed host over http(s).
  pub fn accept_url(&self, raw: &str) -> Option<String> {
    let mut url = canonicalize_url(raw)?;
    if !matches!(url.scheme(), "http" | "https") {
      return None;
    }
    let host = url.host_str()?.to_ascii_lowercase();
    if !self.is_allowed(&host) {
      return None;
    }
    if let Some(alias) = self.aliases.iter().find(|a| a.from.eq_ignore_ascii_case(&host)) {
      url.set_host(Some(&alias.to)).ok()?;
    }
    Some(url.to_string())
  }

  fn is_allowed(&self, host: &str) -> bool {
    self.allowed_hosts.iter().any(|h| h.eq_ignore_ascii_case(host))
  }
}

/// Turn loose model output into a parsed http(s) URL with a host.
///
/// Handles `[text](https://...)`, `www.example.com/...` and
/// `example.com/...`; anything else must already be a full URL.
pub fn canonicalize_url(raw: &str) -> Option<Url> {
  // The URL parser drops these anyway; removing them first keeps the Markdown
  // match stable across repeated passes.
  let mut s: String = raw.chars().filter(|c| !matches!(c, '\t' | '\n' | '\r')).collect();
  s = s.trim().to_string();
  if s.is_empty() {
    return None;
  }
  if let Some(inner) = MARKDOWN_LINK.captures(&s).and_then(|c| c.get(1)) {
    s = inner.as_str().to_string();
  }
  if WWW_PREFIX.is_match(&s) || (BARE_DOMAIN.is_match(&s) && !HAS_WEB_SCHEME.is_match(&s)) {
    s = format!("https://{s}");
  }

  let url = Url::parse(&s).ok()?;
  let has_host = url.host_str().is_some_and(|h| !h.is_empty());
  (matches!(url.scheme(), "http" | "https") && has_host).then_some(url)
}

/// Bounded-failure boundary: log the error and use `fallback` instead.
pub fn recover_or<T>(result: Result<T>, fallback: impl FnOnce() -> T) -> T {
  match result {
    Ok(v) => v,
    Err(e) => {
      warn!(target: targets::COURSE, kind = e.kind(), error = %e, "Recovered locally; using fallback value");
      fallback()
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sanitize_resources(candidates: &[ResourceCandidate]) -> Vec<Resource> {
    ResourcePolicy::default().sanitize(candidates).unwrap()
  }

  fn cands(urls: &[&str]) -> Vec<ResourceCandidate> {
    urls.iter().map(|u| ResourceCandidate::new("Read this", u)).collect()
  }

  fn host_of(r: &Resource) -> String {
    Url::parse(&r.url).unwrap().host_str().unwrap().to_string()
  }

  fn messy_inputs() -> Vec<Vec<ResourceCandidate>> {
    vec![
      vec![],
      cands(&["https://evil.example.com/x", "javascript:alert(1)", "not a url"]),
      cands(&[
        "investopedia.com/terms/e/etf.asp",
        "[SEC](https://www.sec.gov/investor)",
        "www.irs.gov/individuals",
        "http://canada.ca/en/services/finance.html",
        "https://rbcroyalbank.com/learn/",
        "https://investor.gov/introduction-investing",
      ]),
      cands(&["https://www.sec.gov/a(ht\ntps://www.irs.gov/b)", "https://www.sec.\tgov/c"]),
      vec![
        ResourceCandidate { title: None, url: Some("https://www.sec.gov/".into()) },
        ResourceCandidate { title: Some("  ".into()), url: Some("https://www.sec.gov/edgar".into()) },
        ResourceCandidate { title: Some("x".into()), url: None },
      ],
    ]
  }

  #[test]
  fn sanitization_is_idempotent() {
    for input in messy_inputs() {
      let once = sanitize_resources(&input);
      let again: Vec<ResourceCandidate> = once.iter().map(ResourceCandidate::from).collect();
      assert_eq!(sanitize_resources(&again), once);
    }
  }

  #[test]
  fn every_output_is_allowed_and_web_scheme() {
    let policy = ResourcePolicy::default();
    for input in messy_inputs() {
      for r in sanitize_resources(&input) {
        let u = Url::parse(&r.url).unwrap();
        assert!(matches!(u.scheme(), "http" | "https"), "{}", r.url);
        assert!(policy.allowed_hosts.contains(u.host_str().unwrap()), "{}", r.url);
      }
    }
  }

  #[test]
  fn output_is_never_empty_and_capped() {
    for input in messy_inputs() {
      let out = sanitize_resources(&input);
      assert!(!out.is_empty());
      assert!(out.len() <= 4);
    }
  }

  #[test]
  fn all_disallowed_serves_fallbacks() {
    let out = sanitize_resources(&cands(&["https://example.com/a", "https://investopedia.com.evil.io/"]));
    assert_eq!(out, ResourcePolicy::default().fallbacks);
  }

  #[test]
  fn bare_aliases_are_rewritten_to_www() {
    let out = sanitize_resources(&cands(&[
      "https://investopedia.com/terms/b/bond.asp",
      "rbcroyalbank.com/learn/",
    ]));
    assert_eq!(host_of(&out[0]), "www.investopedia.com");
    assert_eq!(out[0].url, "https://www.investopedia.com/terms/b/bond.asp");
    assert_eq!(host_of(&out[1]), "www.rbcroyalbank.com");
  }

  #[test]
  fn non_aliased_bare_hosts_stay_bare() {
    let out = sanitize_resources(&cands(&["https://sec.gov/investor"]));
    assert_eq!(out[0].url, "https://sec.gov/investor");
  }

  #[test]
  fn truncates_to_four_preserving_order() {
    let out = sanitize_resources(&cands(&[
      "https://www.sec.gov/1",
      "https://www.irs.gov/2",
      "https://www.canada.ca/3",
      "https://www.investor.gov/4",
      "https://www.bankofengland.co.uk/5",
    ]));
    let paths: Vec<_> = out.iter().map(|r| Url::parse(&r.url).unwrap().path().to_string()).collect();
    assert_eq!(paths, ["/1", "/2", "/3", "/4"]);
  }

  #[test]
  fn blank_titles_become_resource_and_non_text_is_skipped() {
    let input = messy_inputs().pop().unwrap();
    let out = sanitize_resources(&input);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].title, "Resource");
    assert_eq!(out[0].url, "https://www.sec.gov/edgar");
  }

  #[test]
  fn canonicalize_handles_loose_forms() {
    let u = canonicalize_url("See [the guide](https://www.sec.gov/guide) here").unwrap();
    assert_eq!(u.as_str(), "https://www.sec.gov/guide");
    assert_eq!(canonicalize_url("www.irs.gov").unwrap().as_str(), "https://www.irs.gov/");
    assert_eq!(canonicalize_url("canada.ca/en").unwrap().as_str(), "https://canada.ca/en");
    assert!(canonicalize_url("ftp://sec.gov/file").is_none());
    assert!(canonicalize_url("mailto:someone@sec.gov").is_none());
    assert!(canonicalize_url("   ").is_none());
  }

  #[test]
  fn embedded_line_breaks_do_not_hide_a_markdown_link() {
    let once = canonicalize_url("https://www.sec.gov/a(ht\ntps://www.irs.gov/b)").unwrap();
    assert_eq!(once.as_str(), "https://www.irs.gov/b");
    assert_eq!(canonicalize_url(once.as_str()).unwrap(), once);
    assert_eq!(canonicalize_url("https://www.sec.\r\ngov/c").unwrap().as_str(), "https://www.sec.gov/c");
  }

  #[test]
  fn invalid_policies_are_reported() {
    let mut p = ResourcePolicy::default();
    p.fallbacks.clear();
    assert!(matches!(p.sanitize(&[]), Err(CourseError::Sanitization(_))));

    let mut p = ResourcePolicy::default();
    p.max_resources = 0;
    assert!(p.validate().is_err());

    let mut p = ResourcePolicy::default();
    p.fallbacks[0].url = "https://example.com/".into();
    assert!(p.validate().is_err());

    let mut p = ResourcePolicy::default();
    p.aliases.push(HostAlias { from: "sec.gov".into(), to: "sec.example".into() });
    assert!(p.validate().is_err());

    assert!(ResourcePolicy::default().validate().is_ok());
  }

  #[test]
  fn recover_or_substitutes_on_error() {
    let mut p = ResourcePolicy::default();
    p.fallbacks.clear();
    let out = recover_or(p.sanitize(&cands(&["https://example.com"])), Vec::new);
    assert!(out.is_empty());

    let ok = recover_or(ResourcePolicy::default().sanitize(&cands(&["https://www.sec.gov/a"])), Vec::new);
    assert_eq!(ok.len(), 1);
  }
}
