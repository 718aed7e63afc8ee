//! After a mutation the list page is reloaded through one redirect that
//! carries the outcome as a notice.

use axum::response::Redirect;
use serde::Deserialize;
use tracing::{info, warn};

use crate::session::SessionContext;
use crate::source::{Command, ListSource, SourceError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    Registered,
    RegistrationCancelled,
    ActivityApproved,
    ActivityRejected,
    Approved,
    Rejected,
    BulkApproved,
    UserCreated,
    UserLocked,
    UserUnlocked,
    UserDeleted,
    Error,
}

impl Notice {
    const ALL: [Notice; 12] = [
        Notice::Registered,
        Notice::RegistrationCancelled,
        Notice::ActivityApproved,
        Notice::ActivityRejected,
        Notice::Approved,
        Notice::Rejected,
        Notice::BulkApproved,
        Notice::UserCreated,
        Notice::UserLocked,
        Notice::UserUnlocked,
        Notice::UserDeleted,
        Notice::Error,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Notice::Registered => "registered",
            Notice::RegistrationCancelled => "registration_cancelled",
            Notice::ActivityApproved => "activity_approved",
            Notice::ActivityRejected => "activity_rejected",
            Notice::Approved => "approved",
            Notice::Rejected => "rejected",
            Notice::BulkApproved => "bulk_approved",
            Notice::UserCreated => "user_created",
            Notice::UserLocked => "user_locked",
            Notice::UserUnlocked => "user_unlocked",
            Notice::UserDeleted => "user_deleted",
            Notice::Error => "error",
        }
    }

    pub fn from_key(key: &str) -> Option<Notice> {
        Notice::ALL.into_iter().find(|n| n.key() == key.trim())
    }

    pub fn message(self) -> &'static str {
        match self {
            Notice::Registered => "Đăng ký hoạt động thành công.",
            Notice::RegistrationCancelled => "Đã hủy đăng ký.",
            Notice::ActivityApproved => "Đã duyệt hoạt động.",
            Notice::ActivityRejected => "Đã từ chối hoạt động.",
            Notice::Approved => "Đã duyệt đăng ký.",
            Notice::Rejected => "Đã từ chối đăng ký.",
            Notice::BulkApproved => "Đã duyệt các đăng ký đã chọn.",
            Notice::UserCreated => "Đã tạo tài khoản.",
            Notice::UserLocked => "Đã khóa tài khoản.",
            Notice::UserUnlocked => "Đã mở khóa tài khoản.",
            Notice::UserDeleted => "Đã xóa tài khoản.",
            Notice::Error => "Đã có lỗi xảy ra.",
        }
    }

    pub fn is_error(self) -> bool {
        self == Notice::Error
    }
}

/// Why a command did not go through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFailure {
    pub message: String,
}

impl From<SourceError> for CommandFailure {
    fn from(err: SourceError) -> Self {
        CommandFailure {
            message: err.user_message(),
        }
    }
}

impl CommandFailure {
    pub fn new(message: impl Into<String>) -> Self {
        CommandFailure {
            message: message.into(),
        }
    }
}

pub type CommandOutcome = Result<Notice, CommandFailure>;

/// Executes `command` against the source and maps the result to the notice
/// shown after the list is refreshed.
pub async fn apply(
    source: &dyn ListSource,
    session: &SessionContext,
    command: Command,
    notice: Notice,
) -> CommandOutcome {
    let name = command.name();
    match source.execute(session, command).await {
        Ok(()) => {
            info!(user_id = %session.user_id, command = name, "command applied");
            Ok(notice)
        }
        Err(e) => {
            warn!(user_id = %session.user_id, command = name, error = %e, "command rejected");
            Err(e.into())
        }
    }
}

/// Query parameters a page reads to show the outcome of the last command.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NoticeParams {
    pub notice: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoticeView {
    pub text: String,
    pub is_error: bool,
}

impl NoticeParams {
    pub fn view(&self) -> Option<NoticeView> {
        let notice = Notice::from_key(self.notice.as_deref()?)?;
        let text = self
            .message
            .as_deref()
            .map(str::trim)
            .filter(|m| notice.is_error() && !m.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| notice.message().to_string());
        Some(NoticeView {
            text,
            is_error: notice.is_error(),
        })
    }
}

/// Same-site path, or `None` for anything that could leave the site.
pub fn sanitize_return_to(value: &str) -> Option<&str> {
    let v = value.trim();
    if !v.starts_with('/') {
        return None;
    }
    if v.starts_with("//") || v.contains("://") || v.contains('\\') {
        return None;
    }
    Some(v)
}

/// Redirect back to the list so it is fetched again with the outcome shown.
/// `return_to` wins over `fallback` when it is a safe local path.
pub fn refresh(fallback: &str, return_to: Option<&str>, outcome: CommandOutcome) -> Redirect {
    let target = return_to.and_then(sanitize_return_to).unwrap_or(fallback);
    let target = strip_notice(target);
    let sep = if target.contains('?') { "&" } else { "?" };

    let query = match outcome {
        Ok(notice) => format!("notice={}", notice.key()),
        Err(failure) => {
            warn!(target = %target, message = %failure.message, "command failed");
            url::form_urlencoded::Serializer::new(String::new())
                .append_pair("notice", Notice::Error.key())
                .append_pair("message", &failure.message)
                .finish()
        }
    };
    Redirect::to(&format!("{target}{sep}{query}"))
}

/// Drops a previous outcome so notices do not pile up across commands.
fn strip_notice(target: &str) -> String {
    let Some((path, query)) = target.split_once('?') else {
        return target.to_string();
    };
    let kept: Vec<&str> = query
        .split('&')
        .filter(|pair| {
            let key = pair.split('=').next().unwrap_or_default();
            !pair.is_empty() && key != "notice" && key != "message"
        })
        .collect();
    if kept.is_empty() {
        path.to_string()
    } else {
        format!("{path}?{}", kept.join("&"))
    }
}
