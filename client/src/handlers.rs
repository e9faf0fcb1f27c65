//! Command handlers for CLI operations
//!
//! This module implements the handlers for all CLI commands:
//! - chat: interactive session with slash commands
//! - research: one research session from start to report
//! - status: show one status snapshot
//! - cancel: best-effort backend cancel
//! - ask: one ordinary chat question

use anyhow::{bail, Context, Result};
use sdk::errors::{ClientError, ClientErrorExt};
use serde_json::json;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::api::{HttpResearchApi, ResearchApi};
use crate::config::Config;
use crate::controller::{InputOutcome, SessionController};
use crate::conversation::{notes, Role};
use crate::message_bus::{Event, EventType, MessageBus, ResetReason, StopReason};
use crate::render;
use crate::session::{Panel, Phase};

/// Output format for command results
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine consumption
    Json,
}

const HELP: &str = "\
可用命令:
  /confirm            确认研究计划并开始研究
  /cancel             取消当前研究
  /view <panel>       切换面板: chat, plan, progress, report
  /status             立即刷新研究状态
  /toggle <N>         展开或收起第 N 个研究步骤
  /export <PATH>      保存研究报告 (.txt 为纯文本，其他为 Markdown)
  /help               显示帮助
  /quit               退出
其他输入将作为聊天消息发送。";

/// One line of REPL input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Confirm,
    Cancel,
    /// `/view` without an argument shows the current panel
    View(Option<Panel>),
    Status,
    /// 1-based step number
    Toggle(usize),
    Export(PathBuf),
    Help,
    Quit,
    Text(String),
    Invalid(String),
}

impl ReplCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let Some(command) = line.strip_prefix('/') else {
            return ReplCommand::Text(line.to_string());
        };

        let (name, arg) = match command.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (command, ""),
        };

        match (name.to_lowercase().as_str(), arg) {
            ("confirm", _) => ReplCommand::Confirm,
            ("cancel", _) => ReplCommand::Cancel,
            ("view", "") => ReplCommand::View(None),
            ("view", panel) => match panel.parse() {
                Ok(panel) => ReplCommand::View(Some(panel)),
                Err(e) => ReplCommand::Invalid(e.to_string()),
            },
            ("status", _) => ReplCommand::Status,
            ("toggle", n) => match n.parse::<usize>() {
                Ok(n) if n > 0 => ReplCommand::Toggle(n),
                _ => ReplCommand::Invalid("用法: /toggle <步骤编号，从 1 开始>".to_string()),
            },
            ("export", "") => ReplCommand::Invalid("用法: /export <文件路径>".to_string()),
            ("export", path) => ReplCommand::Export(PathBuf::from(path)),
            ("help", _) => ReplCommand::Help,
            ("quit" | "exit", _) => ReplCommand::Quit,
            (other, _) => ReplCommand::Invalid(format!("未知命令: /{}，输入 /help 查看可用命令。", other)),
        }
    }
}

fn build_api(config: &Config) -> Result<Arc<dyn ResearchApi>> {
    let api = HttpResearchApi::new(&config.api).context("Failed to create research API client")?;
    tracing::debug!("Research backend: {}", api.base_url());
    Ok(Arc::new(api))
}

/// Interactive chat
pub async fn handle_chat(config: &Config) -> Result<()> {
    let bus = Arc::new(MessageBus::new());
    let mut events = bus.subscribe(EventType::All).await;
    let controller = SessionController::new(build_api(config)?, Arc::clone(&bus), config);

    let mut printed = print_new_messages(&controller, 0).await;
    println!("输入 /help 查看可用命令。");
    prompt()?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read from stdin")? else {
                    break;
                };
                let command = ReplCommand::parse(&line);
                if command == ReplCommand::Quit {
                    break;
                }
                run_command(&controller, command).await;
                printed = print_new_messages(&controller, printed).await;
                print_banner(&controller).await;
                prompt()?;
            }
            Some(event) = events.recv() => {
                printed = print_new_messages(&controller, printed).await;
                if on_event(&controller, event).await {
                    prompt()?;
                }
            }
        }
    }

    controller.shutdown().await;
    Ok(())
}

async fn run_command(controller: &SessionController, command: ReplCommand) {
    match command {
        ReplCommand::Confirm => {
            if let Err(e) = controller.confirm().await {
                print_hint(&e);
            }
        }
        ReplCommand::Cancel => {
            if controller.cancel().await.is_none() {
                println!("当前没有进行中的研究。");
            }
        }
        ReplCommand::View(None) => {
            let state = controller.store().lock().await;
            println!("{}", render::render_tabs(&state));
            println!("{}", render::render_panel(&state, state.current_panel()));
        }
        ReplCommand::View(Some(panel)) => match controller.navigate(panel).await {
            Ok(panel) => {
                let state = controller.store().lock().await;
                println!("{}", render::render_tabs(&state));
                println!("{}", render::render_panel(&state, panel));
            }
            Err(e) => print_error(&e),
        },
        ReplCommand::Status => {
            if !controller.store().lock().await.is_active() {
                println!("当前没有进行中的研究。");
                return;
            }
            match controller.refresh().await {
                Ok(_) => {
                    let state = controller.store().lock().await;
                    if state.is_active() {
                        println!("{}", render::render_progress(&state));
                    }
                }
                Err(e) => print_hint(&e),
            }
        }
        ReplCommand::Toggle(n) => match controller.toggle_step(n - 1).await {
            Ok(_) => {
                let state = controller.store().lock().await;
                println!("{}", render::render_progress(&state));
            }
            Err(e) => print_error(&e),
        },
        ReplCommand::Export(path) => {
            let report = controller.store().lock().await.history().report.clone();
            match export_report(report.as_deref(), &path).await {
                Ok(()) => println!("研究报告已保存到 {}", path.display()),
                Err(e) => print_error(&e),
            }
        }
        ReplCommand::Help => println!("{}", HELP),
        ReplCommand::Invalid(message) => println!("{}", message),
        ReplCommand::Text(text) => match controller.handle_input(&text).await {
            InputOutcome::Failed(e) => tracing::debug!("Input failed: {}", e),
            outcome => tracing::debug!("Input handled: {:?}", outcome),
        },
        ReplCommand::Quit => {}
    }
}

/// Print bus events that are not already visible as conversation notes.
///
/// Returns whether anything was printed.
async fn on_event(controller: &SessionController, event: Event) -> bool {
    match event {
        Event::PanelChanged { panel } => {
            let state = controller.store().lock().await;
            println!("\n{}", render::render_tabs(&state));
            println!("{}", render::render_panel(&state, panel));
            true
        }
        Event::PollFailed {
            error, consecutive, ..
        } => {
            println!("\n⚠ 获取研究状态失败 (连续 {} 次): {}", consecutive, error);
            true
        }
        Event::PollingStopped {
            reason: StopReason::TooManyFailures(n),
            ..
        } => {
            println!("\n✗ 连续 {} 次获取研究状态失败，已停止自动刷新。输入 /status 手动刷新。", n);
            true
        }
        _ => false,
    }
}

/// Print assistant and system messages newer than `after`; returns the new
/// high-water mark
async fn print_new_messages(controller: &SessionController, after: u64) -> u64 {
    let state = controller.store().lock().await;
    let conversation = state.conversation();
    let fresh = conversation.messages_after(after);
    if fresh.iter().any(|m| m.role != Role::User) {
        println!();
    }
    for message in fresh.iter().filter(|m| m.role != Role::User) {
        println!("{}", render::render_message(message));
    }
    conversation.last_id()
}

fn prompt() -> Result<()> {
    print!("> ");
    std::io::stdout().flush().context("Failed to flush stdout")
}

/// Print the error banner once, then dismiss it
async fn print_banner(controller: &SessionController) {
    let mut state = controller.store().lock().await;
    if let Some(banner) = render::render_banner(&state) {
        println!("{}", banner);
    }
    state.conversation_mut().dismiss_error();
}

fn print_error(e: &ClientError) {
    println!("✗ {}", e);
    print_hint(e);
}

/// Hint for an error whose message is already on the banner
fn print_hint(e: &ClientError) {
    println!("{}", error_hint(e));
}

fn error_hint(e: &ClientError) -> String {
    if e.is_recoverable() {
        format!("  {}\n  {}", e.user_hint(), RETRY_HINT)
    } else {
        format!("  {}", e.user_hint())
    }
}

const RETRY_HINT: &str = "Retrying the same command may succeed";

/// File contents for a report saved to `path`: plain text for `.txt`,
/// Markdown otherwise
fn export_contents(report: &str, path: &Path) -> String {
    let plain = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"));
    if plain {
        render::plain_text(report)
    } else {
        report.to_string()
    }
}

async fn export_report(report: Option<&str>, path: &Path) -> Result<(), ClientError> {
    let report =
        report.ok_or_else(|| ClientError::InvalidState("No report to export yet".to_string()))?;
    tokio::fs::write(path, export_contents(report, path)).await?;
    tracing::info!("Report exported to {}", path.display());
    Ok(())
}

/// Run one research session from start to report
pub async fn handle_research(
    topic: String,
    requirements: Option<String>,
    yes: bool,
    output: Option<PathBuf>,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    let bus = Arc::new(MessageBus::new());
    let mut events = bus.subscribe(EventType::All).await;
    let controller = SessionController::new(build_api(config)?, Arc::clone(&bus), config);
    let requirements = requirements.unwrap_or_else(|| config.chat.default_requirements.clone());

    let process_id = controller
        .start(&topic, &requirements)
        .await
        .context("Failed to start research")?;

    if let OutputFormat::Text = format {
        println!("Research started: {}", process_id);
        println!("{}", notes::PLANNING);
    }

    let result = wait_for_report(&controller, &mut events, yes, format).await;
    controller.shutdown().await;
    let report = result?;

    if let Some(path) = &output {
        tokio::fs::write(path, export_contents(&report, path))
            .await
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
    }

    match format {
        OutputFormat::Text => match &output {
            Some(path) => println!("✓ 研究报告已保存到 {}", path.display()),
            None => println!("\n{}", report),
        },
        OutputFormat::Json => {
            let saved_to = output.as_ref().map(|p| p.display().to_string());
            let body = json!({
                "process_id": process_id,
                "topic": topic,
                "requirements": requirements,
                "status": "completed",
                "report": if saved_to.is_none() { Some(&report) } else { None },
                "output": saved_to,
            });
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
    }
    Ok(())
}

async fn wait_for_report(
    controller: &SessionController,
    events: &mut mpsc::Receiver<Event>,
    yes: bool,
    format: OutputFormat,
) -> Result<String> {
    let text = matches!(format, OutputFormat::Text);

    while let Some(event) = events.recv().await {
        match event {
            Event::PlanReady { .. } => {
                if text {
                    let state = controller.store().lock().await;
                    println!("\n{}", render::render_plan(&state));
                }
                if !yes && !ask_yes_no("确认并开始研究? [y/N] ").await? {
                    controller.cancel().await;
                    bail!("Research cancelled before it started");
                }
                controller.confirm().await.context("Failed to confirm plan")?;
                if text {
                    println!("{}", notes::CONFIRMED);
                }
                if let Some(report) = finished_report(controller).await? {
                    return Ok(report);
                }
            }
            Event::SnapshotApplied {
                status, progress, ..
            } if text => {
                eprintln!("{} {}", render::progress_bar(progress), render::status_label(status));
            }
            Event::PollFailed { error, .. } if text => {
                eprintln!("⚠ 获取研究状态失败: {}", error);
            }
            Event::ReportReady { .. } => {
                let state = controller.store().lock().await;
                return state
                    .history()
                    .report
                    .clone()
                    .context("Report announced but missing");
            }
            Event::SessionReset { reason, .. } => match reason {
                ResetReason::ServerError(error) => bail!(notes::server_error(Some(&error))),
                ResetReason::ServerCancelled => bail!(notes::SERVER_CANCELLED),
                ResetReason::UserCancelled | ResetReason::Superseded => {
                    bail!("Research session ended")
                }
            },
            Event::PollingStopped { reason, .. } => match reason {
                StopReason::TooManyFailures(n) => {
                    bail!("Stopped after {} consecutive failed status fetches", n)
                }
                StopReason::Terminal(_) | StopReason::SessionGone => {
                    if let Some(report) = finished_report(controller).await? {
                        return Ok(report);
                    }
                    bail!("Research finished without a report")
                }
            },
            _ => {}
        }
    }
    bail!("Event stream closed before the report was ready")
}

/// The report if the session already completed with one
async fn finished_report(controller: &SessionController) -> Result<Option<String>> {
    let state = controller.store().lock().await;
    if state.phase() != Phase::Finished {
        return Ok(None);
    }
    match state.history().report.clone() {
        Some(report) => Ok(Some(report)),
        None => bail!("Research finished without a report"),
    }
}

async fn ask_yes_no(question: &str) -> Result<bool> {
    print!("{}", question);
    std::io::stdout().flush().context("Failed to flush stdout")?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let answer = lines
        .next_line()
        .await
        .context("Failed to read from stdin")?
        .unwrap_or_default();
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes" | "是"))
}

/// Show one status snapshot
pub async fn handle_status(process_id: String, config: &Config, format: OutputFormat) -> Result<()> {
    let api = build_api(config)?;
    let snapshot = api
        .status(&process_id)
        .await
        .map_err(ClientError::from)
        .with_context(|| format!("Failed to fetch status of {}", process_id))?;

    match format {
        OutputFormat::Text => print!("{}", render::render_snapshot(&snapshot)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&snapshot)?),
    }
    Ok(())
}

/// Ask the backend to cancel a process
pub async fn handle_cancel(process_id: String, config: &Config, format: OutputFormat) -> Result<()> {
    let api = build_api(config)?;
    let ack = api
        .cancel(&process_id)
        .await
        .map_err(ClientError::from)
        .with_context(|| format!("Failed to cancel {}", process_id))?;

    match format {
        OutputFormat::Text => println!(
            "✓ {}",
            ack.message.as_deref().unwrap_or(notes::SERVER_CANCELLED)
        ),
        OutputFormat::Json => {
            let output = json!({
                "process_id": process_id,
                "cancelled": true,
                "message": ack.message,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}

/// One ordinary chat question
pub async fn handle_ask(question: String, config: &Config, format: OutputFormat) -> Result<()> {
    let bus = Arc::new(MessageBus::new());
    let controller = SessionController::new(build_api(config)?, bus, config);
    let answer = controller
        .ask(&question)
        .await
        .context("Chat request failed")?;

    match format {
        OutputFormat::Text => println!("{}", answer),
        OutputFormat::Json => {
            let output = json!({
                "question": question,
                "answer": answer,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_text() {
        assert_eq!(
            ReplCommand::parse("  帮我研究一下量子计算  "),
            ReplCommand::Text("帮我研究一下量子计算".to_string())
        );
    }

    #[test]
    fn test_parse_slash_commands() {
        assert_eq!(ReplCommand::parse("/confirm"), ReplCommand::Confirm);
        assert_eq!(ReplCommand::parse("/CANCEL"), ReplCommand::Cancel);
        assert_eq!(ReplCommand::parse("/view report"), ReplCommand::View(Some(Panel::Report)));
        assert_eq!(ReplCommand::parse("/view"), ReplCommand::View(None));
        assert_eq!(ReplCommand::parse("/toggle 2"), ReplCommand::Toggle(2));
        assert_eq!(
            ReplCommand::parse("/export out/report.md"),
            ReplCommand::Export(PathBuf::from("out/report.md"))
        );
        assert_eq!(ReplCommand::parse("/exit"), ReplCommand::Quit);
    }

    #[test]
    fn test_parse_invalid_commands() {
        assert!(matches!(ReplCommand::parse("/toggle 0"), ReplCommand::Invalid(_)));
        assert!(matches!(ReplCommand::parse("/toggle x"), ReplCommand::Invalid(_)));
        assert!(matches!(ReplCommand::parse("/view sidebar"), ReplCommand::Invalid(_)));
        assert!(matches!(ReplCommand::parse("/export"), ReplCommand::Invalid(_)));
        assert!(matches!(ReplCommand::parse("/frobnicate"), ReplCommand::Invalid(_)));
    }

    #[test]
    fn test_retry_suggested_only_for_recoverable_errors() {
        let network = ClientError::from(sdk::errors::TransportError::Network("refused".into()));
        let state = ClientError::InvalidState("No active research session".into());

        assert!(error_hint(&network).ends_with(RETRY_HINT));
        assert!(!error_hint(&state).contains(RETRY_HINT));
        assert!(error_hint(&state).contains(state.user_hint()));
    }

    #[tokio::test]
    async fn test_export_requires_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.md");
        let err = export_report(None, &path).await.unwrap_err();
        assert!(err.is_invalid_state());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_export_format_follows_extension() {
        let dir = tempfile::tempdir().unwrap();
        let report = "# 研究报告\n\n**结论**: 成本下降";
        let markdown = dir.path().join("report.md");
        let text = dir.path().join("report.TXT");

        export_report(Some(report), &markdown).await.unwrap();
        export_report(Some(report), &text).await.unwrap();

        assert_eq!(std::fs::read_to_string(&markdown).unwrap(), report);
        assert_eq!(
            std::fs::read_to_string(&text).unwrap(),
            "研究报告\n\n结论: 成本下降\n"
        );
    }

    #[tokio::test]
    async fn test_export_does_not_hold_the_store() {
        let store = crate::session::SessionStore::default();
        {
            let mut state = store.lock().await;
            state.begin("p1", "topic", "详细全面");
            let ticket = state.issue_ticket("p1").unwrap();
            state.apply(
                &ticket,
                &sdk::types::Snapshot {
                    report: Some("# Report".into()),
                    ..sdk::types::Snapshot::with_status(sdk::types::ResearchStatus::Completed)
                },
            );
        }
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.md");

        let report = store.lock().await.history().report.clone();
        // The write completes while someone else holds the store
        let held = store.lock().await;
        export_report(report.as_deref(), &path).await.unwrap();
        drop(held);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# Report");
    }
}
