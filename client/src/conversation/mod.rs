//! Conversation transcript
//!
//! Holds the chat messages shown in the conversation panel and the transient
//! error banner. Messages get increasing ids so a front end can print only
//! what it has not shown yet.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// System message every transcript starts with
pub const WELCOME_MESSAGE: &str =
    "欢迎使用 DeepResearch 研究助手。请告诉我您想研究的主题，我将帮助您规划研究方案并生成研究报告。";

/// Assistant notes appended by the session state machine
pub mod notes {
    pub const PLANNING: &str = "正在规划研究方案，这可能需要几分钟时间...";
    pub const PLAN_READY: &str = "我已经编写好了研究计划，请查看并确认开始执行。";
    pub const CONFIRMED: &str = "研究计划已确认，正在执行研究...";
    pub const CONFIRM_REMINDER: &str =
        "请先确认当前的研究计划，输入 /confirm 开始研究，或输入 /cancel 取消。";
    pub const REPORT_READY: &str =
        "研究报告已生成完成！您可以输入 /view report 查看详细内容，或继续在聊天中提问。";
    pub const CANCELLED: &str = "研究已取消。您可以开始新的对话。";
    pub const SERVER_CANCELLED: &str = "研究已被取消。";
    pub const NO_ANSWER: &str = "抱歉，我无法处理您的请求。";

    pub fn progress(progress: u32, current_step: Option<&str>) -> String {
        format!(
            "研究正在进行中 (进度: {}%)\n当前步骤: {}\n请稍候，您可以在研究过程面板中查看每个步骤的详细结果和分析。",
            progress,
            current_step.filter(|s| !s.trim().is_empty()).unwrap_or("正在处理")
        )
    }

    pub fn server_error(error: Option<&str>) -> String {
        format!(
            "研究过程出错: {}",
            error.filter(|e| !e.trim().is_empty()).unwrap_or("未知错误")
        )
    }

    pub fn transport_error(message: &str) -> String {
        format!("抱歉，发生了错误: {}", message)
    }
}

/// A single transcript entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub id: u64,
    pub role: Role,
    pub content: String,
}

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::System => write!(f, "system"),
        }
    }
}

#[derive(Debug, Clone)]
struct Banner {
    message: String,
    raised_at: Instant,
}

/// Chat transcript plus the transient error banner
#[derive(Debug, Clone)]
pub struct Conversation {
    messages: Vec<Message>,
    next_id: u64,
    banner: Option<Banner>,
    dismiss_after: Duration,
}

impl Conversation {
    /// New transcript holding only the welcome message
    pub fn new(dismiss_after: Duration) -> Self {
        let mut conversation = Self {
            messages: Vec::new(),
            next_id: 0,
            banner: None,
            dismiss_after,
        };
        conversation.push(Role::System, WELCOME_MESSAGE);
        conversation
    }

    pub fn push_user(&mut self, content: impl Into<String>) -> u64 {
        self.push(Role::User, content)
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) -> u64 {
        self.push(Role::Assistant, content)
    }

    fn push(&mut self, role: Role, content: impl Into<String>) -> u64 {
        self.next_id += 1;
        self.messages.push(Message {
            id: self.next_id,
            role,
            content: content.into(),
        });
        self.next_id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Messages with an id greater than `id`
    pub fn messages_after(&self, id: u64) -> &[Message] {
        let start = self.messages.partition_point(|m| m.id <= id);
        &self.messages[start..]
    }

    /// Id of the newest message
    pub fn last_id(&self) -> u64 {
        self.next_id
    }

    /// Contents of all non-system messages, oldest first
    pub fn chat_history(&self) -> Vec<String> {
        self.messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| m.content.clone())
            .collect()
    }

    /// Show a transient error; replaces any banner already showing
    pub fn raise_error(&mut self, message: impl Into<String>) {
        self.banner = Some(Banner {
            message: message.into(),
            raised_at: Instant::now(),
        });
    }

    /// The banner text, if it has not expired yet
    pub fn active_error(&self) -> Option<&str> {
        self.banner
            .as_ref()
            .filter(|b| b.raised_at.elapsed() < self.dismiss_after)
            .map(|b| b.message.as_str())
    }

    pub fn dismiss_error(&mut self) {
        self.banner = None;
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new(Duration::from_secs(3))
    }
}
