use std::error::Error;

use dotenvy::dotenv;
use teloxide::dispatching::UpdateFilterExt;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tracing::{error, info};

mod config;
mod handlers;
mod llm;
mod state;
mod utils;

use config::CONFIG;
use handlers::{commands, messages};
use llm::gemini::GeminiClient;
use state::AppState;
use utils::logging::init_logging;

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase")]
enum Command {
    Start,
    Help,
}

type HandlerResult = Result<(), Box<dyn Error + Send + Sync>>;

fn is_plain_text(message: &Message) -> bool {
    message
        .text()
        .map(|text| !text.trim_start().starts_with('/'))
        .unwrap_or(false)
}

#[tokio::main]
async fn main() -> HandlerResult {
    dotenv().ok();
    let _guards = init_logging();

    let missing = CONFIG.missing_required();
    if !missing.is_empty() {
        eprintln!(
            "Cannot start: {} not configured.\n\
            Set BOT_TOKEN, GEMINI_API_KEY and OWNER_ID in the environment or a .env file.",
            missing.join(", ")
        );
        return Err(format!("missing required settings: {}", missing.join(", ")).into());
    }

    let gemini = match GeminiClient::new() {
        Ok(client) => {
            info!("Gemini client initialized.");
            Some(client)
        }
        Err(err) => {
            // Degrade instead of exiting: handlers answer with a "not
            // available" message until the process is restarted.
            error!("Failed to initialize Gemini client: {err}");
            None
        }
    };

    let bot = Bot::new(CONFIG.bot_token.clone());
    let state = AppState::new(gemini);
    info!("Starting gemini_photo_edit_bot");

    let command_handler = dptree::entry()
        .filter_command::<Command>()
        .endpoint(handle_command);

    let handler = Update::filter_message()
        .branch(command_handler)
        .branch(dptree::filter(|msg: Message| msg.photo().is_some()).endpoint(handle_photo))
        .branch(dptree::filter(|msg: Message| is_plain_text(&msg)).endpoint(handle_text))
        .endpoint(ignore_message);

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_command(bot: Bot, message: Message, command: Command) -> HandlerResult {
    match command {
        Command::Start => commands::start_handler(bot, message).await?,
        Command::Help => commands::help_handler(bot, message).await?,
    }
    Ok(())
}

async fn handle_photo(bot: Bot, state: AppState, message: Message) -> HandlerResult {
    // Spawned so a slow download or model call never stalls update dispatch.
    // Trade-off: a photo and an immediately-following text from the same user
    // run as independent tasks, so the text can win the race to the session
    // store and route to the plain-question path instead.
    tokio::spawn(async move {
        if let Err(err) = messages::photo_handler(bot, state, message).await {
            error!("photo handler failed: {err}");
        }
    });
    Ok(())
}

async fn handle_text(bot: Bot, state: AppState, message: Message) -> HandlerResult {
    tokio::spawn(async move {
        if let Err(err) = messages::text_handler(bot, state, message).await {
            error!("text handler failed: {err}");
        }
    });
    Ok(())
}

async fn ignore_message(_message: Message) -> HandlerResult {
    Ok(())
}
