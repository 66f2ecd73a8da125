use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, FileId, InputFile, MessageId, ParseMode, ReplyParameters, User};
use tracing::{info, warn};

use crate::config::CONFIG;
use crate::llm::gemini::{EditOutcome, GeminiError};
use crate::llm::media::download_media;
use crate::state::AppState;
use crate::utils::telegram::{
    escape_html, get_file_url, requester_label, start_chat_action_heartbeat,
};

pub const MODEL_UNAVAILABLE_TEXT: &str =
    "Sorry, the Gemini model is not available right now. Please try again later.";

const STATUS_RECEIVED: &str = "✅ Got it. Starting on your photo...";
const STATUS_SENDING: &str =
    "⏳ Sending everything to Gemini... This can take up to a minute.";
const STATUS_ANALYZING: &str = "🎨 The model finished. Checking the response...";
const STATUS_DELIVERING: &str = "✅ Image received! Preparing to send it...";
const GENERATED_MIRROR_CAPTION: &str = "✅ Generation result for the user.";

fn bad_request_text() -> String {
    "😥 <b>The request was rejected (400 Bad Request).</b>\n\n\
    This usually means <b>your location is not supported</b> for this API.\n\n\
    ➡️ <b>Fix:</b> try a VPN connected to the US or another supported country."
        .to_string()
}

fn generic_failure_text() -> String {
    "😥 I couldn't process your photo.\n\n\
    Possible reasons:\n\
    - The request violates the safety policy.\n\
    - The model hit an internal error.\n\n\
    Try rephrasing the request or using a different photo."
        .to_string()
}

/// Shown when the pipeline dies on a platform call after the status message
/// went up, e.g. Telegram rejecting the generated photo on delivery.
fn pipeline_abort_text() -> String {
    generic_failure_text()
}

fn no_image_text(explanation: &str) -> String {
    format!(
        "😥 <b>The model couldn't generate an image.</b>\n\n\
        <b>Model's answer:</b>\n<i>{}</i>\n\n\
        Try rephrasing your request to make it simpler.",
        escape_html(explanation)
    )
}

fn success_caption(instruction: &str) -> String {
    format!("Done! ✨\nYour request: '{instruction}'")
}

fn owner_mirror_caption(user: &User, instruction: &str) -> String {
    format!(
        "{} sent a photo with the request:\n\n'{}'",
        requester_label(user),
        instruction
    )
}

/// Best-effort side channel: a failed mirror is logged and never reaches the
/// user or aborts the pipeline.
async fn mirror_photo_to_owner(bot: &Bot, photo: Vec<u8>, caption: String) {
    let owner = ChatId(CONFIG.owner_id);
    match bot
        .send_photo(owner, InputFile::memory(photo))
        .caption(caption)
        .await
    {
        Ok(_) => info!("Photo mirrored to owner chat {owner}"),
        Err(err) => warn!("Failed to mirror photo to owner chat {owner}: {err}"),
    }
}

/// Downloads the photo, sends it with the instruction to Gemini and delivers
/// the result, keeping the user's chat at exactly one live status message.
pub async fn run_edit_pipeline(
    bot: &Bot,
    state: &AppState,
    message: &Message,
    file_id: FileId,
    instruction: &str,
) -> Result<()> {
    let Some(user) = message.from.as_ref() else {
        return Ok(());
    };

    let status = bot
        .send_message(message.chat.id, STATUS_RECEIVED)
        .reply_parameters(ReplyParameters::new(message.id))
        .await?;
    let _chat_action =
        start_chat_action_heartbeat(bot.clone(), message.chat.id, ChatAction::UploadPhoto);

    // Once the status message exists the user must always end up with a final
    // message state, even when a later platform call fails mid-flight.
    if let Err(err) =
        edit_pipeline_steps(bot, state, message, status.id, user, file_id, instruction).await
    {
        warn!("Edit pipeline aborted after the status message: {err}");
        let _ = bot
            .edit_message_text(message.chat.id, status.id, pipeline_abort_text())
            .await;
    }
    Ok(())
}

async fn edit_pipeline_steps(
    bot: &Bot,
    state: &AppState,
    message: &Message,
    status_id: MessageId,
    user: &User,
    file_id: FileId,
    instruction: &str,
) -> Result<()> {
    info!("Edit request from {}: '{instruction}'", requester_label(user));

    let Some(gemini) = state.gemini.as_ref() else {
        let _ = bot
            .edit_message_text(message.chat.id, status_id, MODEL_UNAVAILABLE_TEXT)
            .await;
        return Ok(());
    };

    let file_url = match get_file_url(bot, &file_id).await {
        Ok(url) => url,
        Err(err) => {
            warn!("Failed to resolve Telegram file {file_id:?}: {err}");
            let _ = bot
                .edit_message_text(message.chat.id, status_id, generic_failure_text())
                .await;
            return Ok(());
        }
    };
    let Some(photo_bytes) = download_media(&file_url).await else {
        let _ = bot
            .edit_message_text(message.chat.id, status_id, generic_failure_text())
            .await;
        return Ok(());
    };

    mirror_photo_to_owner(
        bot,
        photo_bytes.clone(),
        owner_mirror_caption(user, instruction),
    )
    .await;

    if let Err(err) = image::load_from_memory(&photo_bytes) {
        warn!("Downloaded photo did not decode as an image: {err}");
        let _ = bot
            .edit_message_text(message.chat.id, status_id, generic_failure_text())
            .await;
        return Ok(());
    }

    bot.edit_message_text(message.chat.id, status_id, STATUS_SENDING)
        .await?;

    let outcome = gemini.edit_image(&photo_bytes, instruction).await;
    if outcome.is_ok() {
        bot.edit_message_text(message.chat.id, status_id, STATUS_ANALYZING)
            .await?;
    }

    match outcome {
        Ok(EditOutcome::Image(generated)) => {
            bot.edit_message_text(message.chat.id, status_id, STATUS_DELIVERING)
                .await?;

            mirror_photo_to_owner(bot, generated.clone(), GENERATED_MIRROR_CAPTION.to_string())
                .await;

            bot.send_photo(message.chat.id, InputFile::memory(generated))
                .reply_parameters(ReplyParameters::new(message.id))
                .caption(success_caption(instruction))
                .await?;
            let _ = bot.delete_message(message.chat.id, status_id).await;
            info!("Edited image delivered to {}", requester_label(user));
        }
        Ok(EditOutcome::Text(explanation)) => {
            info!("No image generated; model answered: '{explanation}'");
            let _ = bot
                .edit_message_text(message.chat.id, status_id, no_image_text(&explanation))
                .parse_mode(ParseMode::Html)
                .await;
        }
        Err(GeminiError::BadRequest(detail)) => {
            warn!("Gemini rejected the edit request: {detail}");
            let _ = bot
                .edit_message_text(message.chat.id, status_id, bad_request_text())
                .parse_mode(ParseMode::Html)
                .await;
        }
        Err(GeminiError::Other(detail)) => {
            warn!("Edit request failed: {detail}");
            let _ = bot
                .edit_message_text(message.chat.id, status_id, generic_failure_text())
                .await;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use teloxide::types::UserId;

    fn user() -> User {
        User {
            id: UserId(99),
            is_bot: false,
            first_name: "Alice".to_string(),
            last_name: None,
            username: Some("alice_w".to_string()),
            language_code: None,
            is_premium: false,
            added_to_attachment_menu: false,
        }
    }

    #[test]
    fn owner_caption_names_the_requester_and_instruction() {
        let caption = owner_mirror_caption(&user(), "make the sky purple");
        assert_eq!(
            caption,
            "Alice (@alice_w, ID: 99) sent a photo with the request:\n\n'make the sky purple'"
        );
    }

    #[test]
    fn success_caption_echoes_the_instruction() {
        assert_eq!(
            success_caption("make the sky purple"),
            "Done! ✨\nYour request: 'make the sky purple'"
        );
    }

    #[test]
    fn no_image_text_escapes_the_model_answer() {
        let text = no_image_text("try <b>less</b>");
        assert!(text.contains("try &lt;b&gt;less&lt;/b&gt;"));
        assert!(text.contains("make it simpler"));
    }

    #[test]
    fn delivery_abort_falls_back_to_the_generic_failure_text() {
        // A failed send_photo or status edit must still leave the user with
        // the generic explanation, not the region-specific one and not a
        // dangling "preparing to send" status.
        let text = pipeline_abort_text();
        assert_eq!(text, generic_failure_text());
        assert!(text.contains("couldn't process your photo"));
        assert_ne!(text, bad_request_text());
        assert_ne!(text, STATUS_DELIVERING);
    }
}
