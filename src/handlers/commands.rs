use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{ParseMode, ReplyParameters};

use crate::utils::telegram::escape_html;

pub async fn start_handler(bot: Bot, message: Message) -> Result<()> {
    let first_name = message
        .from
        .as_ref()
        .map(|user| escape_html(&user.first_name))
        .unwrap_or_else(|| "there".to_string());

    let welcome_text = format!(
        "👋 Hi, {first_name}!\n\n\
        I am an assistant built on Google's Gemini models. \
        I can answer questions and <b>edit photos</b>.\n\n\
        ➡️ <b>For text:</b> just ask me anything.\n\
        🖼️ <b>For photos:</b> send me a picture and I will ask what to do with it."
    );

    bot.send_message(message.chat.id, welcome_text)
        .reply_parameters(ReplyParameters::new(message.id))
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

pub async fn help_handler(bot: Bot, message: Message) -> Result<()> {
    let help_text = "🤖 <b>How to use me:</b>\n\n\
        1. <b>Questions:</b>\n\
        Just send me your question as a text message.\n\n\
        2. <b>Photo editing:</b>\n\
        - <b>Option 1:</b> send a photo with a caption saying what to do with it.\n\
        - <b>Option 2:</b> send a photo first. I will receive it and ask you to \
        describe the edit in your next message.";

    bot.send_message(message.chat.id, help_text)
        .reply_parameters(ReplyParameters::new(message.id))
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}
