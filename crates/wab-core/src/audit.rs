use std::{
    fs::{self, OpenOptions},
    io::{BufRead, BufReader, Write},
    path::{Path, PathBuf},
};

use chrono::{Local, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::{domain::UserId, errors::Error, messaging::types::TextMessage, Result};

const LOG_MAX_TEXT: usize = 500;

// ============== Timestamp Helpers ==============

/// RFC3339 timestamp in UTC (for logs).
pub fn iso_timestamp_utc() -> String {
    Utc::now().to_rfc3339()
}

pub fn truncate_text(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let mut out = s.chars().take(max_len).collect::<String>();
    out.push_str("...");
    out
}

fn append_json_line<T: Serialize>(path: &Path, record: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let line = serde_json::to_string(record)?;
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{line}")?;
    Ok(())
}

// ============== Error Log ==============

/// One adapter-level failure: what went wrong, where, and for which input.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorEvent {
    pub timestamp: String,
    pub level: String,
    pub event: String,
    pub operation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_input: Option<String>,
}

impl ErrorEvent {
    pub fn new(err: &Error, operation: &str, user_input: Option<&str>) -> Self {
        let level = if err.is_not_found() { "warn" } else { "error" };
        Self {
            timestamp: iso_timestamp_utc(),
            level: level.to_string(),
            event: err.to_string(),
            operation: operation.to_string(),
            user_input: user_input.map(|s| truncate_text(s, LOG_MAX_TEXT)),
        }
    }
}

/// Diagnostic sink for failures recovered at an adapter boundary.
///
/// Every record goes to `tracing`; when a path is configured it is also appended
/// to a JSON-lines file. Writing the file is best-effort and never fails the
/// caller.
#[derive(Clone, Debug, Default)]
pub struct ErrorLogger {
    path: Option<PathBuf>,
}

impl ErrorLogger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// Log to `tracing` only.
    pub fn tracing_only() -> Self {
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn log(&self, err: &Error, operation: &str, user_input: Option<&str>) {
        let ev = ErrorEvent::new(err, operation, user_input);

        if err.is_not_found() {
            warn!(
                operation = %ev.operation,
                user_input = ev.user_input.as_deref().unwrap_or(""),
                "{}",
                ev.event
            );
        } else {
            error!(
                operation = %ev.operation,
                user_input = ev.user_input.as_deref().unwrap_or(""),
                "{}",
                ev.event
            );
        }

        let Some(path) = &self.path else {
            return;
        };
        if let Err(e) = append_json_line(path, &ev) {
            warn!(path = %path.display(), error = %e, "failed to append to error log");
        }
    }

    /// Move the log aside as `<stem>_<timestamp>.<ext>` once it exceeds `max_bytes`.
    pub fn rotate_if_larger(&self, max_bytes: u64) -> Result<Option<PathBuf>> {
        let Some(path) = &self.path else {
            return Ok(None);
        };
        let size = match fs::metadata(path) {
            Ok(md) => md.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if size <= max_bytes {
            return Ok(None);
        }

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "error".to_string());
        let ext = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let ts = Local::now().format("%Y%m%d_%H%M%S");
        let backup = path.with_file_name(format!("{stem}_{ts}{ext}"));

        fs::rename(path, &backup)?;
        Ok(Some(backup))
    }
}

// ============== Request Log ==============

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequestUser {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequestChat {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequestMessage {
    pub text: String,
}

/// What a user asked for, as stored in the request log.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserRequest {
    pub timestamp: String,
    pub user: RequestUser,
    pub chat: RequestChat,
    pub message: RequestMessage,
}

impl UserRequest {
    pub fn from_message(msg: &TextMessage) -> Self {
        Self {
            timestamp: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            user: RequestUser {
                id: msg.user_id.0,
                username: msg.username.clone(),
                first_name: msg.first_name.clone(),
                last_name: msg.last_name.clone(),
            },
            chat: RequestChat {
                id: msg.chat_id.0,
                kind: msg.chat_type.clone(),
            },
            message: RequestMessage {
                text: truncate_text(&msg.text, LOG_MAX_TEXT),
            },
        }
    }
}

/// Append-only JSON-lines log of incoming user requests.
#[derive(Clone, Debug)]
pub struct RequestLogger {
    path: PathBuf,
    enabled: bool,
}

impl RequestLogger {
    pub fn new(path: impl Into<PathBuf>, enabled: bool) -> Self {
        Self {
            path: path.into(),
            enabled,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record a request. Failures are warned about and otherwise ignored.
    pub fn log(&self, msg: &TextMessage) {
        if !self.enabled {
            return;
        }
        let req = UserRequest::from_message(msg);
        if let Err(e) = append_json_line(&self.path, &req) {
            warn!(path = %self.path.display(), error = %e, "failed to log user request");
        }
    }

    /// All logged requests of one user, oldest first. Unparseable lines are skipped.
    pub fn history(&self, user_id: UserId) -> Result<Vec<UserRequest>> {
        let file = match fs::File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut out = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let Ok(req) = serde_json::from_str::<UserRequest>(&line) else {
                continue;
            };
            if req.user.id == user_id.0 {
                out.push(req);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ChatId;

    fn text_message(user: i64, text: &str) -> TextMessage {
        TextMessage {
            chat_id: ChatId(user * 10),
            user_id: UserId(user),
            username: Some(format!("user{user}")),
            first_name: Some("Ada".to_string()),
            last_name: None,
            chat_type: "private".to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn truncate_text_adds_ellipsis() {
        let s = "a".repeat(LOG_MAX_TEXT + 10);
        let t = truncate_text(&s, LOG_MAX_TEXT);
        assert!(t.ends_with("..."));
        assert_eq!(t.chars().count(), LOG_MAX_TEXT + 3);
        assert_eq!(truncate_text("short", LOG_MAX_TEXT), "short");
    }

    #[test]
    fn error_log_records_operation_and_input() {
        let dir = tempfile::tempdir().unwrap();
        let log = ErrorLogger::new(dir.path().join("error_logs/error.logs"));

        log.log(
            &Error::upstream(Some(500), "city: 500 Internal Server Error"),
            "get_city_record",
            Some("London"),
        );
        log.log(&Error::CityNotFound("Atlantis".into()), "get_city_record", Some("Atlantis"));

        let written = std::fs::read_to_string(log.path().unwrap()).unwrap();
        let events: Vec<ErrorEvent> = written
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].operation, "get_city_record");
        assert_eq!(events[0].user_input.as_deref(), Some("London"));
        assert_eq!(events[0].level, "error");
        assert_eq!(events[1].level, "warn");
    }

    #[test]
    fn rotation_moves_large_log_aside() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("error.logs");
        std::fs::write(&path, "x".repeat(64)).unwrap();
        let log = ErrorLogger::new(&path);

        assert!(log.rotate_if_larger(1024).unwrap().is_none());
        let backup = log.rotate_if_larger(16).unwrap().unwrap();
        assert!(backup.is_file());
        assert!(!path.exists());
        let name = backup.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("error_") && name.ends_with(".logs"));
    }

    #[test]
    fn request_history_filters_by_user() {
        let dir = tempfile::tempdir().unwrap();
        let log = RequestLogger::new(dir.path().join("logs/user_requests.jsonl"), true);

        log.log(&text_message(1, "London"));
        log.log(&text_message(2, "Paris"));
        log.log(&text_message(1, "Minsk"));

        let h = log.history(UserId(1)).unwrap();
        assert_eq!(h.len(), 2);
        assert_eq!(h[0].message.text, "London");
        assert_eq!(h[1].message.text, "Minsk");
        assert_eq!(h[0].chat.kind, "private");
        assert!(log.history(UserId(3)).unwrap().is_empty());
    }

    #[test]
    fn disabled_request_log_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let log = RequestLogger::new(dir.path().join("requests.jsonl"), false);
        log.log(&text_message(1, "London"));
        assert!(!log.path().exists());
        assert!(log.history(UserId(1)).unwrap().is_empty());
    }
}
