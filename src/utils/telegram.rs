use std::time::Duration;

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, FileId, User};
use tokio::task::JoinHandle;
use tracing::warn;

use crate::config::CONFIG;

const CHAT_ACTION_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(4);

/// Keeps a chat action ("typing", "uploading a photo") alive for as long as
/// the value is held; Telegram drops the indicator after a few seconds
/// otherwise. Aborts the refresh task on drop.
pub struct ChatActionHeartbeat {
    task_handle: Option<JoinHandle<()>>,
}

impl Drop for ChatActionHeartbeat {
    fn drop(&mut self) {
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }
    }
}

pub fn start_chat_action_heartbeat(
    bot: Bot,
    chat_id: ChatId,
    action: ChatAction,
) -> ChatActionHeartbeat {
    let task_handle = tokio::spawn(async move {
        loop {
            if let Err(err) = bot.send_chat_action(chat_id, action.clone()).await {
                warn!("send_chat_action failed: {err}");
            }
            tokio::time::sleep(CHAT_ACTION_HEARTBEAT_INTERVAL).await;
        }
    });

    ChatActionHeartbeat {
        task_handle: Some(task_handle),
    }
}

/// Resolves a Telegram file reference to its direct download URL.
pub async fn get_file_url(bot: &Bot, file_id: &FileId) -> Result<String> {
    let file = bot.get_file(file_id.clone()).await?;
    Ok(format!(
        "https://api.telegram.org/file/bot{}/{}",
        CONFIG.bot_token, file.path
    ))
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Human-readable identity used in the owner mirror caption.
pub fn requester_label(user: &User) -> String {
    let username = user
        .username
        .as_deref()
        .map(|name| format!("@{name}"))
        .unwrap_or_else(|| "no username".to_string());
    format!("{} ({}, ID: {})", user.first_name, username, user.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use teloxide::types::UserId;

    fn user(first_name: &str, username: Option<&str>) -> User {
        User {
            id: UserId(42),
            is_bot: false,
            first_name: first_name.to_string(),
            last_name: None,
            username: username.map(|name| name.to_string()),
            language_code: None,
            is_premium: false,
            added_to_attachment_menu: false,
        }
    }

    #[test]
    fn requester_label_includes_username_and_id() {
        let label = requester_label(&user("Alice", Some("alice_w")));
        assert_eq!(label, "Alice (@alice_w, ID: 42)");
    }

    #[test]
    fn requester_label_survives_missing_username() {
        let label = requester_label(&user("Bob", None));
        assert_eq!(label, "Bob (no username, ID: 42)");
    }

    #[test]
    fn escape_html_neutralizes_markup() {
        assert_eq!(
            escape_html("<b>\"bold\" & 'loud'</b>"),
            "&lt;b&gt;&quot;bold&quot; &amp; &#39;loud&#39;&lt;/b&gt;"
        );
    }
}
