mod app;
mod chat;
mod completion;
mod config;
mod conversation;
mod event;
mod extract;
mod theme;

use app::ChatApp;
use chat::ChatSession;
use completion::CompletionClient;
use config::Settings;
use conversation::Conversation;
use dotenv::dotenv;
use eframe::egui;
use log::{info, warn};
use std::sync::mpsc;

const MISSING_KEY_NOTICE: &str = "GROQ_API_KEY is not set; requests will be rejected by the API.";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let settings = Settings::from_env()?;
    info!(
        "starting chat client: endpoint={} model={}",
        settings.endpoint, settings.model
    );

    let mut session = ChatSession::new(Conversation::default());
    if !settings.has_api_key() {
        warn!("{MISSING_KEY_NOTICE}");
        session.push_system(MISSING_KEY_NOTICE);
    }

    let (tx, rx) = mpsc::channel();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("docchat-runtime")
        .build()?;

    let client = runtime.block_on(async move { CompletionClient::new(settings, tx) })?;
    let app = ChatApp::new(rx, client, session);
    let _runtime = runtime;

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Groq Chat Assistant")
            .with_inner_size([800.0, 600.0])
            .with_min_inner_size([480.0, 360.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Groq Chat Assistant",
        native_options,
        Box::new(move |_creation_context| Ok(Box::new(app))),
    )?;

    Ok(())
}
