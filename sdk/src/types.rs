//! Research backend wire types
//!
//! Request and response bodies exchanged with the research backend. All
//! optional fields tolerate both absence and an explicit JSON `null`, and
//! unknown fields are ignored, since a status snapshot is a partial view of
//! server-side state.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Server-side status of a research process
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ResearchStatus {
    /// The backend is drafting a plan
    Planning,
    /// A plan exists and the user must confirm or cancel it
    WaitingConfirmation,
    /// Searching and collecting sources
    Researching,
    /// Analysing collected material
    Analyzing,
    /// Writing the final report
    Reporting,
    /// Finished; the report is available
    Completed,
    /// Failed inside the research workflow
    Error,
    /// Cancelled by the user or the backend
    Cancelled,
    /// Any status string this client does not know about
    #[default]
    #[serde(other)]
    Unknown,
}

impl ResearchStatus {
    /// Terminal statuses stop polling permanently
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error | Self::Cancelled)
    }

    /// Terminal statuses that tear the session down
    pub fn resets_session(self) -> bool {
        matches!(self, Self::Error | Self::Cancelled)
    }

    /// Wire name of the status
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Planning => "planning",
            Self::WaitingConfirmation => "waiting_confirmation",
            Self::Researching => "researching",
            Self::Analyzing => "analyzing",
            Self::Reporting => "reporting",
            Self::Completed => "completed",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ResearchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One web source gathered for a research step
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,

    /// Human-readable source name
    #[serde(default, rename = "name", deserialize_with = "null_as_default")]
    pub source: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub url: String,

    /// Emoji the backend uses for the source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// One step of the research plan as executed by the backend
///
/// Steps carry no stable identifier; they are addressed by position.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResearchStep {
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub completed: bool,

    #[serde(default, deserialize_with = "null_as_default")]
    pub search_results: Vec<SearchResult>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub findings: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<String>,

    /// Verbatim excerpt of the plan this step was derived from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_content: Option<String>,
}

/// One status poll response
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_id: Option<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub status: ResearchStatus,

    /// Percentage as reported by the server, not clamped
    #[serde(default, deserialize_with = "percent")]
    pub progress: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_step_index: Option<usize>,

    /// Research plan as markdown
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub research_steps: Option<Vec<ResearchStep>>,

    /// Sources across all steps; older backends report only these three
    /// aggregate lists instead of `research_steps`
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub research_sites: Vec<SearchResult>,

    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub research_findings: Vec<String>,

    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub analysis_results: Vec<String>,

    /// Final report as markdown
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements: Option<String>,

    /// Seconds since the backend created the process
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_time: Option<f64>,
}

impl Snapshot {
    /// Create an otherwise empty snapshot with the given status
    pub fn with_status(status: ResearchStatus) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    /// Plan text, if present and non-empty
    pub fn plan(&self) -> Option<&str> {
        non_empty(self.plan.as_deref())
    }

    /// Report text, if present and non-empty
    pub fn report(&self) -> Option<&str> {
        non_empty(self.report.as_deref())
    }

    /// Step list, if present and non-empty
    pub fn steps(&self) -> Option<&[ResearchStep]> {
        self.research_steps.as_deref().filter(|steps| !steps.is_empty())
    }
}

/// Body of `POST /research/start`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StartRequest {
    pub topic: String,
    pub requirements: String,
}

/// Response of `POST /research/start`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StartResponse {
    pub process_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Acknowledgement returned by confirm and cancel
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ack {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_id: Option<String>,
}

/// Body of `POST /chat/question`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatRequest {
    pub question: String,

    /// Contents of prior non-system messages, oldest first
    pub conversation_history: Vec<String>,
}

/// Response of `POST /chat/question`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<String>,
}

impl ChatResponse {
    /// First non-empty text among answer, plan and report
    pub fn content(&self) -> Option<&str> {
        non_empty(self.answer.as_deref())
            .or_else(|| non_empty(self.plan.as_deref()))
            .or_else(|| non_empty(self.report.as_deref()))
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.trim().is_empty())
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn percent<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<f64>::deserialize(deserializer)?;
    Ok(value.map(|v| v.max(0.0).round() as u32).unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_snapshot_tolerates_nulls_and_unknown_fields() {
        let raw = json!({
            "process_id": "1712",
            "status": "researching",
            "progress": 35,
            "plan": null,
            "current_step": "搜索: 新能源汽车",
            "current_step_index": 1,
            "research_steps": [{
                "title": "市场规模",
                "description": "收集销量数据",
                "completed": false,
                "search_results": null,
                "findings": ["销量增长"],
                "analysis": null
            }],
            "research_sites": [],
            "report": null,
            "error": null,
            "elapsed_time": 12.5
        });

        let snapshot: Snapshot = serde_json::from_value(raw).unwrap();
        assert_eq!(snapshot.status, ResearchStatus::Researching);
        assert_eq!(snapshot.progress, 35);
        assert!(snapshot.plan().is_none());
        let steps = snapshot.steps().unwrap();
        assert_eq!(steps.len(), 1);
        assert!(steps[0].search_results.is_empty());
        assert_eq!(steps[0].findings, vec!["销量增长".to_string()]);
    }

    #[test]
    fn test_snapshot_carries_aggregate_lists() {
        let raw = json!({
            "status": "analyzing",
            "research_sites": [{
                "name": "新华网",
                "url": "https://example.com/a",
                "title": "行业报告",
                "snippet": null,
                "icon": "📰"
            }],
            "research_findings": ["销量增长"],
            "analysis_results": null
        });

        let snapshot: Snapshot = serde_json::from_value(raw).unwrap();
        assert_eq!(snapshot.research_sites.len(), 1);
        assert_eq!(snapshot.research_sites[0].source, "新华网");
        assert_eq!(snapshot.research_sites[0].icon.as_deref(), Some("📰"));
        assert_eq!(snapshot.research_findings, vec!["销量增长".to_string()]);
        assert!(snapshot.analysis_results.is_empty());
    }

    #[test]
    fn test_unknown_status_is_not_terminal() {
        let snapshot: Snapshot = serde_json::from_value(json!({"status": "paused"})).unwrap();
        assert_eq!(snapshot.status, ResearchStatus::Unknown);
        assert!(!snapshot.status.is_terminal());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(ResearchStatus::Completed.is_terminal());
        assert!(ResearchStatus::Error.is_terminal());
        assert!(ResearchStatus::Cancelled.is_terminal());
        assert!(!ResearchStatus::WaitingConfirmation.is_terminal());
        assert!(!ResearchStatus::Completed.resets_session());
        assert!(ResearchStatus::Error.resets_session());
    }

    #[test]
    fn test_fractional_progress_is_rounded() {
        let snapshot: Snapshot =
            serde_json::from_value(json!({"status": "analyzing", "progress": 66.6})).unwrap();
        assert_eq!(snapshot.progress, 67);
    }

    #[test]
    fn test_search_result_source_uses_name_on_the_wire() {
        let result: SearchResult = serde_json::from_value(json!({
            "title": "Report",
            "name": "example.com",
            "url": "https://example.com/r"
        }))
        .unwrap();
        assert_eq!(result.source, "example.com");
        assert!(result.snippet.is_none());

        let back = serde_json::to_value(&result).unwrap();
        assert_eq!(back["name"], "example.com");
    }

    #[test]
    fn test_empty_strings_count_as_absent() {
        let snapshot = Snapshot {
            plan: Some("   ".into()),
            report: Some(String::new()),
            research_steps: Some(Vec::new()),
            ..Snapshot::with_status(ResearchStatus::Planning)
        };
        assert!(snapshot.plan().is_none());
        assert!(snapshot.report().is_none());
        assert!(snapshot.steps().is_none());
    }

    #[test]
    fn test_chat_response_content_fallback_order() {
        let response = ChatResponse {
            answer: None,
            plan: Some("## plan".into()),
            report: Some("# report".into()),
        };
        assert_eq!(response.content(), Some("## plan"));
        assert_eq!(ChatResponse::default().content(), None);
    }
}
