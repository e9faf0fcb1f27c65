//! History reconciliation
//!
//! Snapshots are partial views: a field missing from one poll response does
//! not mean the data is gone server-side. `merge` folds each snapshot into the
//! client-held `History` so that once-seen data never regresses:
//!
//! - `plan`, `report` (and `topic`): first non-empty value wins, never overwritten
//! - `research_steps` and the aggregate site/finding/analysis lists: replaced
//!   only by a non-empty list
//! - everything else: the latest snapshot's value, as-is
//!
//! `merge` is pure. Applying the same snapshot twice yields the same history.

use sdk::types::{ResearchStatus, ResearchStep, SearchResult, Snapshot};

/// Client-side accumulation of what the backend has told us about one session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct History {
    /// First non-empty plan seen
    pub plan: Option<String>,

    /// First non-empty report seen
    pub report: Option<String>,

    /// Most recent non-empty step list
    pub research_steps: Option<Vec<ResearchStep>>,

    /// Aggregate lists reported by backends that predate `research_steps`
    pub research_sites: Vec<SearchResult>,
    pub research_findings: Vec<String>,
    pub analysis_results: Vec<String>,

    /// First non-empty topic seen
    pub topic: Option<String>,

    /// Latest status; `None` until the first snapshot is merged
    pub status: Option<ResearchStatus>,

    pub progress: u32,
    pub current_step: Option<String>,
    pub current_step_index: Option<usize>,
    pub error: Option<String>,
}

impl History {
    pub fn has_plan(&self) -> bool {
        self.plan.is_some()
    }

    pub fn has_report(&self) -> bool {
        self.report.is_some()
    }

    /// Known steps, empty if none have been reported yet
    pub fn steps(&self) -> &[ResearchStep] {
        self.research_steps.as_deref().unwrap_or_default()
    }

    /// Whether the latest status is terminal
    pub fn is_terminal(&self) -> bool {
        self.status.is_some_and(ResearchStatus::is_terminal)
    }

    /// Whether only the aggregate lists are known, with no per-step detail
    pub fn has_aggregate_only(&self) -> bool {
        self.research_steps.is_none()
            && !(self.research_sites.is_empty()
                && self.research_findings.is_empty()
                && self.analysis_results.is_empty())
    }
}

fn latest_non_empty<T: Clone>(current: &[T], next: &[T]) -> Vec<T> {
    let latest = if next.is_empty() { current } else { next };
    latest.to_vec()
}

/// Fold `snapshot` into `history`, returning the new history
pub fn merge(history: &History, snapshot: &Snapshot) -> History {
    History {
        plan: history
            .plan
            .clone()
            .or_else(|| snapshot.plan().map(String::from)),
        report: history
            .report
            .clone()
            .or_else(|| snapshot.report().map(String::from)),
        research_steps: snapshot
            .steps()
            .map(<[ResearchStep]>::to_vec)
            .or_else(|| history.research_steps.clone()),
        research_sites: latest_non_empty(&history.research_sites, &snapshot.research_sites),
        research_findings: latest_non_empty(
            &history.research_findings,
            &snapshot.research_findings,
        ),
        analysis_results: latest_non_empty(&history.analysis_results, &snapshot.analysis_results),
        topic: history.topic.clone().or_else(|| {
            snapshot
                .topic
                .as_deref()
                .filter(|t| !t.trim().is_empty())
                .map(String::from)
        }),
        status: Some(snapshot.status),
        progress: snapshot.progress,
        current_step: snapshot.current_step.clone(),
        current_step_index: snapshot.current_step_index,
        error: snapshot.error.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(title: &str) -> ResearchStep {
        ResearchStep {
            title: title.to_string(),
            ..ResearchStep::default()
        }
    }

    #[test]
    fn test_plan_is_write_once() {
        let s1 = Snapshot {
            plan: Some("## 研究目标\n第一版".into()),
            ..Snapshot::with_status(ResearchStatus::WaitingConfirmation)
        };
        let s2 = Snapshot {
            plan: Some("## 研究目标\n第二版".into()),
            ..Snapshot::with_status(ResearchStatus::Researching)
        };

        let h = merge(&merge(&History::default(), &s1), &s2);
        assert_eq!(h.plan.as_deref(), Some("## 研究目标\n第一版"));
    }

    #[test]
    fn test_absent_plan_does_not_regress() {
        let s1 = Snapshot {
            plan: Some("plan".into()),
            ..Snapshot::with_status(ResearchStatus::WaitingConfirmation)
        };
        let s2 = Snapshot::with_status(ResearchStatus::Researching);

        let h = merge(&merge(&History::default(), &s1), &s2);
        assert_eq!(h.plan.as_deref(), Some("plan"));
        assert_eq!(h.status, Some(ResearchStatus::Researching));
    }

    #[test]
    fn test_empty_plan_does_not_set_history() {
        let s1 = Snapshot {
            plan: Some(String::new()),
            ..Snapshot::with_status(ResearchStatus::Planning)
        };
        let h = merge(&History::default(), &s1);
        assert!(!h.has_plan());
    }

    #[test]
    fn test_steps_last_non_empty_wins() {
        let s1 = Snapshot {
            research_steps: Some(vec![step("a")]),
            ..Snapshot::with_status(ResearchStatus::Researching)
        };
        let s2 = Snapshot {
            research_steps: Some(vec![step("a"), step("b")]),
            ..Snapshot::with_status(ResearchStatus::Researching)
        };
        let s3 = Snapshot {
            research_steps: Some(Vec::new()),
            ..Snapshot::with_status(ResearchStatus::Analyzing)
        };

        let h = merge(&History::default(), &s1);
        assert_eq!(h.steps().len(), 1);
        let h = merge(&h, &s2);
        assert_eq!(h.steps().len(), 2);
        let h = merge(&h, &s3);
        assert_eq!(h.steps().len(), 2);
    }

    #[test]
    fn test_aggregate_lists_only_replaced_by_non_empty_list() {
        let s1 = Snapshot {
            research_findings: vec!["发现一".into()],
            analysis_results: vec!["分析一".into()],
            ..Snapshot::with_status(ResearchStatus::Analyzing)
        };
        let s2 = Snapshot {
            research_findings: vec!["发现一".into(), "发现二".into()],
            ..Snapshot::with_status(ResearchStatus::Reporting)
        };

        let h = merge(&History::default(), &s1);
        assert!(h.has_aggregate_only());
        let h = merge(&h, &s2);
        assert_eq!(h.research_findings.len(), 2);
        assert_eq!(h.analysis_results, vec!["分析一".to_string()]);
        assert!(h.research_sites.is_empty());

        let with_steps = Snapshot {
            research_steps: Some(vec![step("a")]),
            ..Snapshot::with_status(ResearchStatus::Reporting)
        };
        assert!(!merge(&h, &with_steps).has_aggregate_only());
    }

    #[test]
    fn test_pass_through_fields_take_latest_value() {
        let s1 = Snapshot {
            progress: 40,
            current_step: Some("搜索".into()),
            current_step_index: Some(1),
            error: Some("transient".into()),
            ..Snapshot::with_status(ResearchStatus::Researching)
        };
        let s2 = Snapshot {
            progress: 60,
            ..Snapshot::with_status(ResearchStatus::Analyzing)
        };

        let h = merge(&merge(&History::default(), &s1), &s2);
        assert_eq!(h.progress, 60);
        assert_eq!(h.current_step, None);
        assert_eq!(h.current_step_index, None);
        assert_eq!(h.error, None);
        assert_eq!(h.status, Some(ResearchStatus::Analyzing));
    }

    #[test]
    fn test_merge_is_idempotent() {
        let s = Snapshot {
            plan: Some("plan".into()),
            report: Some("# Report".into()),
            research_steps: Some(vec![step("a")]),
            progress: 100,
            ..Snapshot::with_status(ResearchStatus::Completed)
        };
        let once = merge(&History::default(), &s);
        let twice = merge(&once, &s);
        assert_eq!(once, twice);
        assert!(twice.is_terminal());
    }
}
