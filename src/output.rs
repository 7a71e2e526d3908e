//! Data model for a verification run.
//!
//! Every type here is created exactly once per run and never mutated after
//! the stage that produced it hands it on:
//!
//! ```text
//! Extraction { transcript, postmark }  ← extractor
//! TriangulationResult                  ← navigator
//! AuditResult                          ← auditor (or the skip-audit branch)
//! PostcardReport                       ← verifier, returned to the caller
//! ```
//!
//! JSON field names are camelCase so reports are drop-in compatible with
//! web front-ends that consume them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ── Postmark ─────────────────────────────────────────────────────────────

/// Platform a screenshot was taken from.
///
/// Closed set: the extractor rejects any other value instead of guessing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Platform {
    X,
    YouTube,
    Reddit,
    Instagram,
    #[default]
    Other,
}

impl Platform {
    /// Name as it appears in the postmark schema.
    pub fn name(self) -> &'static str {
        match self {
            Platform::X => "X",
            Platform::YouTube => "YouTube",
            Platform::Reddit => "Reddit",
            Platform::Instagram => "Instagram",
            Platform::Other => "Other",
        }
    }

    /// `site:` restriction used to bias search queries, if any.
    pub fn site_hint(self) -> Option<&'static str> {
        match self {
            Platform::X => Some("site:x.com"),
            Platform::YouTube => Some("site:youtube.com"),
            Platform::Reddit => Some("site:reddit.com"),
            Platform::Instagram => Some("site:instagram.com"),
            Platform::Other => None,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A salient UI element the model located on the screenshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiAnchor {
    /// e.g. "retweet button", "verified badge".
    pub element: String,
    /// Free-form position, e.g. "bottom left".
    pub position: String,
    /// Model confidence in `[0, 1]`.
    pub confidence: f64,
}

/// Structured metadata extracted from a screenshot.
///
/// Only `main_text` is required; everything else reflects what was legible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Postmark {
    #[serde(default)]
    pub platform: Platform,

    /// Handle as displayed, e.g. "@jack".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Timestamp exactly as displayed ("2h ago", "Oct 12, 2025"). Never
    /// normalised: the auditor matches it verbatim against the live page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_text: Option<String>,

    /// Named counters as displayed ("1.2K"), e.g. likes / retweets / views.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engagement: Option<BTreeMap<String, String>>,

    /// The dominant visible content.
    pub main_text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui_anchors: Option<Vec<UiAnchor>>,
}

impl Postmark {
    /// A postmark with only the required field set.
    pub fn new(main_text: impl Into<String>) -> Self {
        Self {
            platform: Platform::Other,
            username: None,
            timestamp_text: None,
            engagement: None,
            main_text: main_text.into(),
            ui_anchors: None,
        }
    }

    /// Check constraints serde cannot express.
    pub fn validate(&self) -> Result<(), String> {
        for (i, anchor) in self.ui_anchors.iter().flatten().enumerate() {
            if !anchor.confidence.is_finite() || !(0.0..=1.0).contains(&anchor.confidence) {
                return Err(format!(
                    "uiAnchors[{i}].confidence must be within [0, 1], got {}",
                    anchor.confidence
                ));
            }
        }
        Ok(())
    }

    /// The timestamp text, if present and non-blank.
    pub fn timestamp(&self) -> Option<&str> {
        self.timestamp_text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

/// Output of the extractor: transcript and postmark, paired 1:1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extraction {
    /// All legible text as interleaved Markdown, in reading order.
    pub transcript: String,
    pub postmark: Postmark,
}

// ── Triangulation ────────────────────────────────────────────────────────

/// Result of the navigator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriangulationResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate_url: Option<String>,
    /// Every search query that was issued, in order, resolved or not.
    #[serde(default)]
    pub queries: Vec<String>,
}

impl TriangulationResult {
    /// The result of a triangulation that issued nothing.
    pub fn empty() -> Self {
        Self::default()
    }
}

// ── Audit ────────────────────────────────────────────────────────────────

pub const ORIGIN_WEIGHT: f64 = 0.4;
pub const TEMPORAL_WEIGHT: f64 = 0.3;
pub const VISUAL_WEIGHT: f64 = 0.3;

/// Coarse reading of a total score, for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    /// Total ≥ 0.8.
    Corroborated,
    /// Total ≥ 0.5.
    Plausible,
    /// Total < 0.5.
    Unverified,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Verdict::Corroborated => "CORROBORATED",
            Verdict::Plausible => "PLAUSIBLE",
            Verdict::Unverified => "UNVERIFIED",
        })
    }
}

/// Three-factor trust score plus the evidence that produced it.
///
/// `total_score` is derived from the three sub-scores on construction and on
/// deserialisation; there is no way to set it independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "AuditRecord")]
pub struct AuditResult {
    origin_score: u8,
    temporal_score: f64,
    visual_score: f64,
    total_score: f64,
    audit_log: Vec<String>,
}

/// Wire shape accepted when deserialising; any `totalScore` is ignored.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuditRecord {
    origin_score: u8,
    temporal_score: f64,
    visual_score: f64,
    #[serde(default)]
    audit_log: Vec<String>,
}

impl From<AuditRecord> for AuditResult {
    fn from(r: AuditRecord) -> Self {
        AuditResult::new(r.origin_score > 0, r.temporal_score, r.visual_score, r.audit_log)
    }
}

impl AuditResult {
    /// Build a result, clamping sub-scores to `[0, 1]` and computing the total.
    pub fn new(reachable: bool, temporal: f64, visual: f64, audit_log: Vec<String>) -> Self {
        let origin_score = u8::from(reachable);
        let temporal_score = clamp_unit(temporal);
        let visual_score = clamp_unit(visual);
        Self {
            origin_score,
            temporal_score,
            visual_score,
            total_score: weighted_total(origin_score, temporal_score, visual_score),
            audit_log,
        }
    }

    /// All-zero result with a single explanatory entry, used when there is
    /// nothing to audit.
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::new(false, 0.0, 0.0, vec![reason.into()])
    }

    /// 1 when the candidate page was reachable, else 0.
    pub fn origin_score(&self) -> u8 {
        self.origin_score
    }

    pub fn temporal_score(&self) -> f64 {
        self.temporal_score
    }

    pub fn visual_score(&self) -> f64 {
        self.visual_score
    }

    /// `0.4·origin + 0.3·temporal + 0.3·visual`.
    pub fn total_score(&self) -> f64 {
        self.total_score
    }

    /// Evidence entries in the order they were gathered.
    pub fn audit_log(&self) -> &[String] {
        &self.audit_log
    }

    pub fn verdict(&self) -> Verdict {
        if self.total_score >= 0.8 {
            Verdict::Corroborated
        } else if self.total_score >= 0.5 {
            Verdict::Plausible
        } else {
            Verdict::Unverified
        }
    }
}

fn clamp_unit(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

fn weighted_total(origin: u8, temporal: f64, visual: f64) -> f64 {
    ORIGIN_WEIGHT * f64::from(origin) + TEMPORAL_WEIGHT * temporal + VISUAL_WEIGHT * visual
}

// ── Report ───────────────────────────────────────────────────────────────

/// Wall-clock time spent per stage, in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStats {
    pub preprocess_ms: u64,
    pub extract_ms: u64,
    pub triangulate_ms: u64,
    pub audit_ms: u64,
    pub total_ms: u64,
}

/// The terminal artifact of one verification run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostcardReport {
    pub transcript: String,
    pub postmark: Postmark,
    pub triangulation: TriangulationResult,
    pub audit: AuditResult,
    /// When the report was generated.
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub stats: PipelineStats,
}

impl PostcardReport {
    /// Render the report as a human-readable Markdown document.
    pub fn to_markdown(&self) -> String {
        let audit = &self.audit;
        let pm = &self.postmark;
        let mut md = String::new();

        md.push_str(&format!(
            "# Postcard verdict: {} ({:.2})\n\n",
            audit.verdict(),
            audit.total_score()
        ));
        md.push_str(&format!("_Generated {}_\n\n", self.timestamp.to_rfc3339()));

        md.push_str("## Scores\n\n");
        md.push_str("| Factor | Weight | Score |\n|:---|---:|---:|\n");
        md.push_str(&format!(
            "| Origin | {ORIGIN_WEIGHT:.1} | {} |\n",
            audit.origin_score()
        ));
        md.push_str(&format!(
            "| Temporal | {TEMPORAL_WEIGHT:.1} | {:.2} |\n",
            audit.temporal_score()
        ));
        md.push_str(&format!(
            "| Visual | {VISUAL_WEIGHT:.1} | {:.2} |\n",
            audit.visual_score()
        ));
        md.push_str(&format!(
            "| **Total** | | **{:.2}** |\n\n",
            audit.total_score()
        ));

        md.push_str("## Postmark\n\n");
        md.push_str(&format!("- **Platform:** {}\n", pm.platform));
        if let Some(ref u) = pm.username {
            md.push_str(&format!("- **Username:** {u}\n"));
        }
        if let Some(ref t) = pm.timestamp_text {
            md.push_str(&format!("- **Timestamp:** {t}\n"));
        }
        if let Some(ref counters) = pm.engagement {
            let joined = counters
                .iter()
                .map(|(k, v)| format!("{k} {v}"))
                .collect::<Vec<_>>()
                .join(", ");
            md.push_str(&format!("- **Engagement:** {joined}\n"));
        }
        md.push('\n');

        md.push_str("## Triangulation\n\n");
        match self.triangulation.candidate_url {
            Some(ref url) => md.push_str(&format!("- **Candidate URL:** <{url}>\n")),
            None => md.push_str("- **Candidate URL:** none identified\n"),
        }
        for q in &self.triangulation.queries {
            md.push_str(&format!("- `{q}`\n"));
        }
        md.push('\n');

        md.push_str("## Evidence log\n\n");
        for (i, entry) in audit.audit_log().iter().enumerate() {
            md.push_str(&format!("{}. {}\n", i + 1, entry));
        }
        md.push('\n');

        md.push_str("## Transcript\n\n");
        md.push_str(self.transcript.trim_end());
        md.push('\n');
        md
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn total_is_weighted_sum() {
        let r = AuditResult::new(true, 1.0, 0.9, vec!["x".into()]);
        assert!((r.total_score() - 0.97).abs() < EPS);
        let r = AuditResult::new(true, 0.5, 0.4, vec!["x".into()]);
        assert!((r.total_score() - (0.4 + 0.15 + 0.12)).abs() < EPS);
    }

    #[test]
    fn total_stays_in_unit_interval() {
        for reachable in [false, true] {
            for t in [0.0, 0.5, 1.0, 7.0, -3.0, f64::NAN] {
                for v in [0.0, 0.4, 0.9, 1.0, 2.0] {
                    let r = AuditResult::new(reachable, t, v, vec![]);
                    assert!((0.0..=1.0).contains(&r.total_score()), "{r:?}");
                    let expected = 0.4 * f64::from(r.origin_score())
                        + 0.3 * r.temporal_score()
                        + 0.3 * r.visual_score();
                    assert!((r.total_score() - expected).abs() < EPS);
                }
            }
        }
    }

    #[test]
    fn skipped_is_all_zero_with_one_entry() {
        let r = AuditResult::skipped("no target URL identified");
        assert_eq!(r.origin_score(), 0);
        assert_eq!(r.temporal_score(), 0.0);
        assert_eq!(r.visual_score(), 0.0);
        assert_eq!(r.total_score(), 0.0);
        assert_eq!(r.audit_log().len(), 1);
        assert_eq!(r.verdict(), Verdict::Unverified);
    }

    #[test]
    fn deserialising_recomputes_total() {
        let json = r#"{"originScore":1,"temporalScore":1.0,"visualScore":0.9,
                       "totalScore":0.1,"auditLog":["a"]}"#;
        let r: AuditResult = serde_json::from_str(json).unwrap();
        assert!((r.total_score() - 0.97).abs() < EPS);
        assert_eq!(r.audit_log(), ["a".to_string()]);
    }

    #[test]
    fn audit_serialises_camel_case_with_total() {
        let r = AuditResult::new(true, 1.0, 0.9, vec!["ok".into()]);
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["originScore"], 1);
        assert!(v.get("totalScore").is_some());
        assert_eq!(v["auditLog"][0], "ok");
    }

    #[test]
    fn postmark_defaults_platform_and_requires_main_text() {
        let pm: Postmark = serde_json::from_str(r#"{"mainText":"hello"}"#).unwrap();
        assert_eq!(pm.platform, Platform::Other);
        assert!(pm.username.is_none());

        let missing = serde_json::from_str::<Postmark>(r#"{"platform":"X"}"#);
        assert!(missing.is_err());
    }

    #[test]
    fn postmark_rejects_unknown_platform_and_numeric_counters() {
        let bad_platform =
            serde_json::from_str::<Postmark>(r#"{"platform":"TikTok","mainText":"hi"}"#);
        assert!(bad_platform.is_err());

        let numeric =
            serde_json::from_str::<Postmark>(r#"{"mainText":"hi","engagement":{"likes":1200}}"#);
        assert!(numeric.is_err());
    }

    #[test]
    fn validate_rejects_out_of_range_confidence() {
        let mut pm = Postmark::new("hi");
        pm.ui_anchors = Some(vec![UiAnchor {
            element: "logo".into(),
            position: "top left".into(),
            confidence: 1.5,
        }]);
        let err = pm.validate().unwrap_err();
        assert!(err.contains("uiAnchors[0]"), "got: {err}");

        pm.ui_anchors.as_mut().unwrap()[0].confidence = 0.8;
        assert!(pm.validate().is_ok());
    }

    #[test]
    fn blank_timestamp_counts_as_absent() {
        let mut pm = Postmark::new("hi");
        pm.timestamp_text = Some("   ".into());
        assert_eq!(pm.timestamp(), None);
        pm.timestamp_text = Some("2h ago".into());
        assert_eq!(pm.timestamp(), Some("2h ago"));
    }

    #[test]
    fn site_hints() {
        assert_eq!(Platform::X.site_hint(), Some("site:x.com"));
        assert_eq!(Platform::YouTube.site_hint(), Some("site:youtube.com"));
        assert_eq!(Platform::Other.site_hint(), None);
    }

    #[test]
    fn markdown_report_lists_evidence_in_order() {
        let report = PostcardReport {
            transcript: "**@jack** just setting up my twttr\n".into(),
            postmark: Postmark::new("just setting up my twttr"),
            triangulation: TriangulationResult {
                candidate_url: Some("https://x.com/jack/status/20".into()),
                queries: vec!["site:x.com \"just setting up my twttr\"".into()],
            },
            audit: AuditResult::new(true, 1.0, 0.9, vec!["first".into(), "second".into()]),
            timestamp: Utc::now(),
            stats: PipelineStats::default(),
        };
        let md = report.to_markdown();
        assert!(md.starts_with("# Postcard verdict: CORROBORATED (0.97)"));
        let first = md.find("1. first").unwrap();
        let second = md.find("2. second").unwrap();
        assert!(first < second);
        assert!(md.contains("<https://x.com/jack/status/20>"));
    }
}
