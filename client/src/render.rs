//! Plain-text rendering of the client panels
//!
//! Markdown from the backend is printed as-is, except for plain-text
//! exports which drop heading and emphasis markers.

use crate::conversation::{Message, Role};
use crate::session::{History, Panel, SessionState};
use sdk::types::{ResearchStatus, ResearchStep, SearchResult, Snapshot};
use std::fmt::Write;

const BAR_WIDTH: usize = 20;

/// Progress panel label for a status
pub fn status_label(status: ResearchStatus) -> &'static str {
    match status {
        ResearchStatus::Planning => "正在规划研究方案...",
        ResearchStatus::WaitingConfirmation => "等待确认研究计划",
        ResearchStatus::Researching => "正在收集研究数据...",
        ResearchStatus::Analyzing => "正在分析研究数据...",
        ResearchStatus::Reporting => "正在生成研究报告...",
        ResearchStatus::Completed => "研究已完成",
        ResearchStatus::Error => "研究过程出错",
        ResearchStatus::Cancelled => "研究已取消",
        ResearchStatus::Unknown => "正在处理...",
    }
}

/// `[#####---------------]  25%`
pub fn progress_bar(progress: u32) -> String {
    let clamped = progress.min(100) as usize;
    let filled = clamped * BAR_WIDTH / 100;
    format!(
        "[{}{}] {:>3}%",
        "#".repeat(filled),
        "-".repeat(BAR_WIDTH - filled),
        progress
    )
}

pub fn render_message(message: &Message) -> String {
    let speaker = match message.role {
        Role::User => "你",
        Role::Assistant => "助手",
        Role::System => "系统",
    };
    format!("{}: {}", speaker, message.content)
}

/// Panel tabs, current panel in brackets, unavailable panels hidden
pub fn render_tabs(state: &SessionState) -> String {
    let availability = state.availability();
    let current = state.current_panel();
    [Panel::Conversation, Panel::Plan, Panel::Progress, Panel::Report]
        .into_iter()
        .filter(|p| availability.allows(*p))
        .map(|p| {
            if p == current {
                format!("[{}]", p)
            } else {
                p.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("  ")
}

/// Render `panel`, or the conversation if it is not available
pub fn render_panel(state: &SessionState, panel: Panel) -> String {
    let panel = if state.availability().allows(panel) {
        panel
    } else {
        Panel::Conversation
    };
    match panel {
        Panel::Conversation => render_conversation(state),
        Panel::Plan => render_plan(state),
        Panel::Progress => render_progress(state),
        Panel::Report => render_report(state.history()),
    }
}

/// The transient error banner, while it has not expired
pub fn render_banner(state: &SessionState) -> Option<String> {
    state
        .conversation()
        .active_error()
        .map(|message| format!("⚠ {}", message))
}

pub fn render_conversation(state: &SessionState) -> String {
    let mut out = String::new();
    for message in state.conversation().messages() {
        let _ = writeln!(out, "{}", render_message(message));
    }
    if let Some(failure) = state.failure() {
        let _ = writeln!(out, "\n✗ {}", failure);
    }
    if let Some(banner) = render_banner(state) {
        let _ = writeln!(out, "\n{}", banner);
    }
    out
}

pub fn render_plan(state: &SessionState) -> String {
    let mut out = String::from("== 研究计划 ==\n\n");
    out.push_str(state.history().plan.as_deref().unwrap_or_default());
    out.push('\n');

    let awaiting = state.session().is_some_and(|s| !s.confirmed) && !state.history().is_terminal();
    if awaiting {
        out.push_str("\n输入 /confirm 开始研究，或输入 /cancel 取消。\n");
    }
    out
}

pub fn render_progress(state: &SessionState) -> String {
    let history = state.history();
    let mut out = String::from("== 研究过程 ==\n\n");

    if let Some(session) = state.session() {
        let _ = writeln!(out, "主题: {}", session.topic);
        let _ = writeln!(out, "进程: {}", session.process_id);
    }
    let status = history.status.unwrap_or(ResearchStatus::Planning);
    let _ = writeln!(out, "状态: {}", status_label(status));
    let _ = writeln!(out, "{}", progress_bar(history.progress));
    if let Some(step) = history.current_step.as_deref() {
        let _ = writeln!(out, "当前步骤: {}", step);
    }

    if !history.steps().is_empty() {
        out.push('\n');
    }
    for (index, step) in history.steps().iter().enumerate() {
        let active = history.current_step_index == Some(index) && !step.completed;
        render_step(&mut out, index, step, active, state.view().is_expanded(index));
    }
    if history.has_aggregate_only() {
        render_aggregates(&mut out, history);
    }
    out
}

/// Site, finding and analysis lists from backends without per-step detail
fn render_aggregates(out: &mut String, history: &History) {
    if !history.research_sites.is_empty() {
        let _ = writeln!(out, "\n研究网站:");
        for site in &history.research_sites {
            let _ = writeln!(out, "  {}", site_label(site));
        }
    }
    if !history.research_findings.is_empty() {
        let _ = writeln!(out, "\n主要研究发现:");
        for finding in &history.research_findings {
            let _ = writeln!(out, "  - {}", finding);
        }
    }
    if !history.analysis_results.is_empty() {
        let _ = writeln!(out, "\n分析结果:");
        for result in &history.analysis_results {
            let _ = writeln!(out, "  - {}", result);
        }
    }
}

fn site_label(site: &SearchResult) -> String {
    let name = if site.source.is_empty() {
        &site.title
    } else {
        &site.source
    };
    match site.icon.as_deref() {
        Some(icon) => format!("{} {}", icon, name),
        None => name.clone(),
    }
}

fn render_step(out: &mut String, index: usize, step: &ResearchStep, active: bool, expanded: bool) {
    let mark = if step.completed {
        "✓"
    } else if active {
        "▶"
    } else {
        "○"
    };
    let _ = writeln!(out, "{} {}. {}", mark, index + 1, step.title);
    if !step.description.is_empty() {
        let _ = writeln!(out, "     {}", step.description);
    }
    if !expanded {
        return;
    }

    if !step.search_results.is_empty() {
        let _ = writeln!(out, "     搜索结果:");
        for result in &step.search_results {
            let _ = writeln!(out, "       - {} ({})", result.title, result.source);
            if let Some(snippet) = result.snippet.as_deref() {
                let _ = writeln!(out, "         {}", snippet);
            }
            if !result.url.is_empty() {
                let _ = writeln!(out, "         {}", result.url);
            }
        }
    }
    if !step.findings.is_empty() {
        let _ = writeln!(out, "     发现:");
        for finding in &step.findings {
            let _ = writeln!(out, "       - {}", finding);
        }
    }
    if let Some(analysis) = step.analysis.as_deref() {
        let _ = writeln!(out, "     分析: {}", analysis);
    }
}

pub fn render_report(history: &History) -> String {
    let mut out = String::from("== 研究报告 ==\n\n");
    out.push_str(history.report.as_deref().unwrap_or_default());
    out.push('\n');
    out
}

/// Report text with Markdown heading, emphasis and code markers removed
pub fn plain_text(markdown: &str) -> String {
    let mut out = String::with_capacity(markdown.len());
    for line in markdown.lines() {
        let trimmed = line.trim_start();
        let line = match trimmed.trim_start_matches('#') {
            rest if rest.len() < trimmed.len() && (rest.is_empty() || rest.starts_with(' ')) => {
                rest.trim_start()
            }
            _ => line,
        };
        let line = line.replace("**", "").replace("__", "").replace('`', "");
        out.push_str(&line);
        out.push('\n');
    }
    out
}

/// One-off status view of a raw snapshot
pub fn render_snapshot(snapshot: &Snapshot) -> String {
    let mut out = String::new();
    if let Some(id) = snapshot.process_id.as_deref() {
        let _ = writeln!(out, "进程: {}", id);
    }
    if let Some(topic) = snapshot.topic.as_deref() {
        let _ = writeln!(out, "主题: {}", topic);
    }
    let _ = writeln!(out, "状态: {} ({})", status_label(snapshot.status), snapshot.status);
    let _ = writeln!(out, "{}", progress_bar(snapshot.progress));
    if let Some(step) = snapshot.current_step.as_deref() {
        let _ = writeln!(out, "当前步骤: {}", step);
    }
    if let Some(elapsed) = snapshot.elapsed_time {
        let _ = writeln!(out, "耗时: {:.0}s", elapsed);
    }
    if let Some(error) = snapshot.error.as_deref() {
        let _ = writeln!(out, "错误: {}", error);
    }
    if let Some(steps) = snapshot.steps() {
        let done = steps.iter().filter(|s| s.completed).count();
        let _ = writeln!(out, "步骤: {}/{}", done, steps.len());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_bar() {
        assert_eq!(progress_bar(0), format!("[{}]   0%", "-".repeat(20)));
        assert_eq!(progress_bar(50), format!("[{}{}]  50%", "#".repeat(10), "-".repeat(10)));
        assert_eq!(progress_bar(140), format!("[{}] 140%", "#".repeat(20)));
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(status_label(ResearchStatus::WaitingConfirmation), "等待确认研究计划");
        assert_eq!(status_label(ResearchStatus::Unknown), "正在处理...");
    }

    #[test]
    fn test_progress_panel_marks_active_step() {
        let mut state = SessionState::default();
        state.begin("p1", "新能源汽车", "详细全面");
        let ticket = state.issue_ticket("p1").unwrap();
        state.apply(
            &ticket,
            &Snapshot {
                progress: 40,
                current_step_index: Some(1),
                research_steps: Some(vec![
                    ResearchStep {
                        title: "市场规模".into(),
                        completed: true,
                        ..ResearchStep::default()
                    },
                    ResearchStep {
                        title: "竞争格局".into(),
                        findings: vec!["头部集中".into()],
                        ..ResearchStep::default()
                    },
                ]),
                ..Snapshot::with_status(ResearchStatus::Researching)
            },
        );

        let collapsed = render_progress(&state);
        assert!(collapsed.contains("✓ 1. 市场规模"));
        assert!(collapsed.contains("▶ 2. 竞争格局"));
        assert!(!collapsed.contains("头部集中"));

        state.view_mut().toggle_step(1);
        assert!(render_progress(&state).contains("头部集中"));
    }

    #[test]
    fn test_progress_panel_falls_back_to_aggregate_lists() {
        let mut state = SessionState::default();
        state.begin("p1", "新能源汽车", "详细全面");
        let ticket = state.issue_ticket("p1").unwrap();
        state.apply(
            &ticket,
            &Snapshot {
                research_sites: vec![SearchResult {
                    source: "Wikipedia".into(),
                    icon: Some("📚".into()),
                    ..SearchResult::default()
                }],
                research_findings: vec!["电池成本下降".into()],
                analysis_results: vec!["市场持续增长".into()],
                ..Snapshot::with_status(ResearchStatus::Analyzing)
            },
        );

        let out = render_progress(&state);
        assert!(out.contains("研究网站:\n  📚 Wikipedia"));
        assert!(out.contains("主要研究发现:\n  - 电池成本下降"));
        assert!(out.contains("分析结果:\n  - 市场持续增长"));
    }

    #[test]
    fn test_plain_text_strips_markdown_markers() {
        let report = "# 研究报告\n\n## 结论\n**电池**成本下降 `42%`\n#hashtag";
        assert_eq!(
            plain_text(report),
            "研究报告\n\n结论\n电池成本下降 42%\n#hashtag\n"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_banner_shown_until_it_expires() {
        let mut state = SessionState::new(std::time::Duration::from_secs(3));
        state
            .conversation_mut()
            .raise_error("Network error: connection refused");

        assert_eq!(
            render_banner(&state).as_deref(),
            Some("⚠ Network error: connection refused")
        );
        assert!(render_conversation(&state).contains("⚠ Network error: connection refused"));

        tokio::time::advance(std::time::Duration::from_secs(4)).await;
        assert!(render_banner(&state).is_none());
        assert!(!render_conversation(&state).contains("⚠"));
    }

    #[test]
    fn test_unavailable_panel_renders_conversation() {
        let state = SessionState::default();
        let out = render_panel(&state, Panel::Report);
        assert!(out.contains("欢迎使用 DeepResearch"));
        assert_eq!(render_tabs(&state), "[chat]");
    }
}
