use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, MediaGroupId, ReplyParameters};
use tracing::{info, warn};

use crate::handlers::pipeline::{run_edit_pipeline, MODEL_UNAVAILABLE_TEXT};
use crate::state::{AppState, PendingPhoto};

const SINGLE_PHOTO_ACK: &str =
    "Nice photo! Now tell me in your next message what I should do with it.";
const ALBUM_PHOTO_ACK: &str = "You sent several photos. I will work with the last one.\n\n\
    Now tell me in your next message what I should do with it.";
const TEXT_FAILURE_TEXT: &str =
    "😥 I couldn't process your message. Please try again later.";

/// Acknowledgment for a photo stored without a caption, or `None` when the
/// photo silently overwrites an earlier item of the same album.
fn pending_ack(
    media_group_id: Option<&MediaGroupId>,
    replaced: Option<&PendingPhoto>,
) -> Option<&'static str> {
    match media_group_id {
        Some(group_id) => {
            let same_album = replaced
                .and_then(|previous| previous.media_group_id.as_ref())
                .is_some_and(|previous_group| previous_group == group_id);
            if same_album {
                None
            } else {
                Some(ALBUM_PHOTO_ACK)
            }
        }
        None => Some(SINGLE_PHOTO_ACK),
    }
}

pub async fn photo_handler(bot: Bot, state: AppState, message: Message) -> Result<()> {
    let Some(user) = message.from.as_ref() else {
        return Ok(());
    };
    let Some(photo) = message.photo().and_then(|sizes| sizes.last()) else {
        return Ok(());
    };

    if state.gemini.is_none() {
        bot.send_message(message.chat.id, MODEL_UNAVAILABLE_TEXT)
            .reply_parameters(ReplyParameters::new(message.id))
            .await?;
        return Ok(());
    }

    let caption = message
        .caption()
        .map(str::trim)
        .filter(|caption| !caption.is_empty());

    if let Some(instruction) = caption {
        return run_edit_pipeline(&bot, &state, &message, photo.file.id.clone(), instruction)
            .await;
    }

    let media_group_id = message.media_group_id().cloned();
    let replaced = state.sessions.set_pending(
        user.id,
        PendingPhoto {
            file_id: photo.file.id.clone(),
            media_group_id: media_group_id.clone(),
        },
    );
    info!(
        "Stored pending photo for user {} (replaced: {})",
        user.id,
        replaced.is_some()
    );

    if let Some(ack) = pending_ack(media_group_id.as_ref(), replaced.as_ref()) {
        bot.send_message(message.chat.id, ack)
            .reply_parameters(ReplyParameters::new(message.id))
            .await?;
    }
    Ok(())
}

pub async fn text_handler(bot: Bot, state: AppState, message: Message) -> Result<()> {
    let Some(user) = message.from.as_ref() else {
        return Ok(());
    };
    let Some(text) = message.text() else {
        return Ok(());
    };

    // Any text following a pending photo is treated as the edit instruction,
    // even an unrelated question. Matches the interaction the bot documents.
    if let Some(pending) = state.sessions.take_pending(user.id) {
        return run_edit_pipeline(&bot, &state, &message, pending.file_id, text).await;
    }

    let Some(gemini) = state.gemini.as_ref() else {
        bot.send_message(message.chat.id, MODEL_UNAVAILABLE_TEXT)
            .reply_parameters(ReplyParameters::new(message.id))
            .await?;
        return Ok(());
    };

    if let Err(err) = bot.send_chat_action(message.chat.id, ChatAction::Typing).await {
        warn!("send_chat_action failed: {err}");
    }

    info!("Text question from user {}", user.id);
    match gemini.generate_text(text).await {
        Ok(answer) => {
            bot.send_message(message.chat.id, answer)
                .reply_parameters(ReplyParameters::new(message.id))
                .await?;
        }
        Err(err) => {
            warn!("Text question failed: {err}");
            bot.send_message(message.chat.id, TEXT_FAILURE_TEXT)
                .reply_parameters(ReplyParameters::new(message.id))
                .await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::SessionStore;
    use teloxide::types::{FileId, UserId};

    fn pending(file_id: &str, group: Option<&str>) -> PendingPhoto {
        PendingPhoto {
            file_id: FileId(file_id.to_string()),
            media_group_id: group.map(|id| MediaGroupId(id.to_string())),
        }
    }

    #[test]
    fn lone_photo_gets_the_single_photo_ack() {
        assert_eq!(pending_ack(None, None), Some(SINGLE_PHOTO_ACK));
        // A leftover pending photo from an earlier exchange does not change it.
        assert_eq!(
            pending_ack(None, Some(&pending("old", None))),
            Some(SINGLE_PHOTO_ACK)
        );
    }

    #[test]
    fn first_album_item_gets_the_album_ack() {
        let group = MediaGroupId("album-1".to_string());
        assert_eq!(pending_ack(Some(&group), None), Some(ALBUM_PHOTO_ACK));
    }

    #[test]
    fn later_album_items_overwrite_silently() {
        let group = MediaGroupId("album-1".to_string());
        assert_eq!(
            pending_ack(Some(&group), Some(&pending("first", Some("album-1")))),
            None
        );
        // A different album is a fresh conversation turn.
        assert_eq!(
            pending_ack(Some(&group), Some(&pending("first", Some("album-0")))),
            Some(ALBUM_PHOTO_ACK)
        );
    }

    #[test]
    fn pending_photo_is_consumed_by_exactly_one_instruction() {
        let store = SessionStore::default();
        let user = UserId(5);
        store.set_pending(user, pending("photo-a", None));

        // The first text message consumes the photo; the next one finds none
        // and would route to the plain-question path.
        assert_eq!(store.take_pending(user), Some(pending("photo-a", None)));
        assert_eq!(store.take_pending(user), None);
    }

    #[test]
    fn back_to_back_photos_keep_only_the_last() {
        let store = SessionStore::default();
        let user = UserId(5);
        store.set_pending(user, pending("photo-a", None));
        store.set_pending(user, pending("photo-b", None));

        assert_eq!(store.take_pending(user), Some(pending("photo-b", None)));
    }
}
