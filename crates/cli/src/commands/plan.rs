//! `plotmaster plan` — run one message through the generation pipeline.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use clap::Args;
use plotmaster_config::{Settings, SettingsHandle};
use plotmaster_core::event::{EventBus, HostEvent, NoticeLevel};
use plotmaster_core::host::{InMemoryCharacterStore, StaticTables};
use plotmaster_core::message::{Conversation, Message};
use plotmaster_core::Result as CoreResult;
use plotmaster_providers::HttpCharacterStore;
use plotmaster_planner::{
    ChatSession, GenerateHandler, GenerateOptions, GenerationPipeline, Planner, PlanningStage,
    SessionRegistry, StaticWorldbook,
};

#[derive(Args, Debug)]
pub struct PlanArgs {
    /// The user message to plan
    #[arg(short, long)]
    pub message: String,

    /// Chat history (JSON conversation)
    #[arg(long)]
    pub chat: Option<PathBuf>,

    /// Memory-table export (JSON)
    #[arg(long)]
    pub tables: Option<PathBuf>,

    /// Worldbook (JSON)
    #[arg(long)]
    pub worldbook: Option<PathBuf>,

    /// Character extension data, keyed by avatar (JSON)
    #[arg(long, conflicts_with = "host_url")]
    pub characters: Option<PathBuf>,

    /// Read character extension data from a running host instead
    #[arg(long)]
    pub host_url: Option<String>,

    /// CSRF token for --host-url
    #[arg(long, requires = "host_url", env = "PLOTMASTER_CSRF_TOKEN")]
    pub csrf_token: Option<String>,

    /// Assistant reply to record after the message; receives the plot
    #[arg(long)]
    pub reply: Option<String>,

    /// Save the updated chat back to --chat
    #[arg(long, requires = "chat")]
    pub write_chat: bool,
}

/// Stands in for the host's generator: records the outgoing user turn.
struct RecordingGenerator {
    session: Arc<ChatSession>,
}

#[async_trait]
impl GenerateHandler for RecordingGenerator {
    async fn generate(&self, options: GenerateOptions) -> CoreResult<String> {
        let text = options.source_text().unwrap_or_default().to_string();
        self.session
            .conversation_mut()
            .await
            .push(Message::user(text.clone()));
        Ok(text)
    }
}

pub async fn run(settings_path: &Path, args: PlanArgs) -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::load_with_env(settings_path)?;
    if !settings.api_settings.has_backend() {
        eprintln!("  ⚠️  No API URL configured; the message will pass through unchanged.");
        eprintln!("     Set PLOTMASTER_API_URL or apiUrl in {}", settings_path.display());
    }

    let conversation = match &args.chat {
        Some(path) => serde_json::from_str::<Conversation>(&std::fs::read_to_string(path)?)?,
        None => Conversation::new(),
    };

    let events = Arc::new(EventBus::default());
    let mut notices = events.subscribe();
    let mut planner = Planner::new(SettingsHandle::in_memory(settings), events);

    if let Some(path) = &args.tables {
        let export: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        planner = planner.with_tables(Arc::new(StaticTables::new(export)));
    }
    if let Some(path) = &args.worldbook {
        planner = planner.with_worldbook(Arc::new(StaticWorldbook::load(path)?));
    }
    if let Some(path) = &args.characters {
        let cards: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        planner = planner.with_character_store(Arc::new(InMemoryCharacterStore::from_value(cards)?));
    }
    if let Some(url) = &args.host_url {
        let mut store = HttpCharacterStore::new(url.as_str());
        if let Some(token) = &args.csrf_token {
            store = store.with_csrf_token(token)?;
        }
        planner = planner.with_character_store(Arc::new(store));
    }
    let planner = Arc::new(planner);

    let session = Arc::new(ChatSession::new(conversation));
    let sessions = Arc::new(SessionRegistry::new());
    sessions.insert(session.clone()).await;
    sessions.activate(session.id()).await;

    let pipeline = GenerationPipeline::new(Arc::new(RecordingGenerator {
        session: session.clone(),
    }))
    .with(Arc::new(PlanningStage::new(planner.clone(), sessions)));

    let options = GenerateOptions {
        user_input: Some(args.message.clone()),
        ..Default::default()
    };
    let sent = pipeline.generate(options).await?;

    if let Some(reply) = &args.reply {
        session.conversation_mut().await.push(Message::assistant(reply.clone()));
        if planner.on_generation_ended(&session).await {
            tracing::info!("Plot attached to the recorded reply");
        }
    }

    while let Ok(event) = notices.try_recv() {
        if let HostEvent::Notice { level, message, .. } = event.as_ref() {
            let icon = match level {
                NoticeLevel::Info => "ℹ️ ",
                NoticeLevel::Success => "✅",
                NoticeLevel::Warning => "⚠️ ",
                NoticeLevel::Error => "❌",
            };
            eprintln!("  {icon} {message}");
        }
    }

    println!("{sent}");

    if args.write_chat {
        if let Some(path) = &args.chat {
            let json = serde_json::to_string_pretty(&session.snapshot().await)?;
            std::fs::write(path, json)?;
            eprintln!("  💾 Chat saved to {}", path.display());
        }
    }

    Ok(())
}
