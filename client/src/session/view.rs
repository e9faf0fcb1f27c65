//! View selection
//!
//! Decides which panel the front end shows. Auto-navigation fires at most
//! once per session for each trigger; explicit navigation sticks until the
//! next trigger fires.

use super::history::History;
use sdk::errors::ClientError;
use sdk::types::ResearchStatus;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Panels the front end can render
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Panel {
    #[default]
    Conversation,
    Plan,
    Progress,
    Report,
}

impl Panel {
    pub fn as_str(self) -> &'static str {
        match self {
            Panel::Conversation => "chat",
            Panel::Plan => "plan",
            Panel::Progress => "progress",
            Panel::Report => "report",
        }
    }
}

impl fmt::Display for Panel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Panel {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "chat" | "conversation" => Ok(Panel::Conversation),
            "plan" => Ok(Panel::Plan),
            "progress" | "process" => Ok(Panel::Progress),
            "report" => Ok(Panel::Report),
            other => Err(ClientError::InvalidState(format!(
                "Unknown panel '{}'. Use chat, plan, progress or report",
                other
            ))),
        }
    }
}

/// Which panels currently have something to show
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PanelAvailability {
    pub plan: bool,
    pub progress: bool,
    pub report: bool,
}

impl PanelAvailability {
    pub fn new(history: &History, session_active: bool) -> Self {
        Self {
            plan: history.has_plan(),
            progress: session_active,
            report: history.has_report(),
        }
    }

    /// The conversation panel is always available
    pub fn allows(&self, panel: Panel) -> bool {
        match panel {
            Panel::Conversation => true,
            Panel::Plan => self.plan,
            Panel::Progress => self.progress,
            Panel::Report => self.report,
        }
    }
}

/// Selected panel plus the once-per-session auto-navigation bookkeeping
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewSelector {
    selected: Panel,
    navigated_manually: bool,
    plan_trigger_fired: bool,
    report_trigger_fired: bool,
    /// Expanded steps in the progress panel, by position
    expanded_steps: BTreeSet<usize>,
}

impl ViewSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate auto-navigation after a snapshot has been merged.
    ///
    /// Returns the newly selected panel when a trigger fired.
    pub fn observe(&mut self, history: &History) -> Option<Panel> {
        let status = history.status?;

        if status == ResearchStatus::WaitingConfirmation
            && history.has_plan()
            && !self.plan_trigger_fired
        {
            self.plan_trigger_fired = true;
            if !self.navigated_manually {
                self.selected = Panel::Plan;
                return Some(Panel::Plan);
            }
        }

        if status == ResearchStatus::Completed && history.has_report() && !self.report_trigger_fired
        {
            self.report_trigger_fired = true;
            self.selected = Panel::Report;
            self.navigated_manually = false;
            return Some(Panel::Report);
        }

        None
    }

    /// Explicit user navigation
    pub fn navigate(
        &mut self,
        panel: Panel,
        availability: PanelAvailability,
    ) -> Result<Panel, ClientError> {
        if !availability.allows(panel) {
            return Err(ClientError::InvalidState(format!(
                "The {} panel has nothing to show yet",
                panel
            )));
        }
        self.selected = panel;
        self.navigated_manually = true;
        Ok(panel)
    }

    /// Panel to render; falls back to the conversation when the selected
    /// panel lost its content
    pub fn current(&self, availability: PanelAvailability) -> Panel {
        if availability.allows(self.selected) {
            self.selected
        } else {
            Panel::Conversation
        }
    }

    /// Flip the expanded state of a step; returns the new state
    pub fn toggle_step(&mut self, index: usize) -> bool {
        if self.expanded_steps.remove(&index) {
            false
        } else {
            self.expanded_steps.insert(index);
            true
        }
    }

    pub fn is_expanded(&self, index: usize) -> bool {
        self.expanded_steps.contains(&index)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
