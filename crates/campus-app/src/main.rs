//! Campus assistant binary - composition root.
//!
//! Ties the campus crates together into a single executable:
//! 1. Load configuration from TOML
//! 2. Open storage (SQLite)
//! 3. Build the capabilities (embedding backend, language classifier, translator)
//! 4. Build the turn engine and, where needed, the FAQ index
//! 5. Run the requested command

mod cli;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use uuid::Uuid;

use campus_chat::{
    EngineServices, HttpTranslator, NullTranslator, ScriptClassifier, Translator, TurnEngine,
    TurnRequest,
};
use campus_core::config::CampusConfig;
use campus_storage::{import_faqs_json, SqliteStore};
use campus_vector::embedding::{DynEmbeddingService, OnnxEmbeddingService, TokenHashEmbedding};

use cli::{expand_home, CliArgs, Command};

type AppResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Pick the embedding backend: the ONNX model when configured and loadable,
/// otherwise the offline token-hash embedder.
fn build_embedder(config: &CampusConfig) -> Arc<dyn DynEmbeddingService> {
    if let Some(dir) = &config.nlp.model_dir {
        let dir = expand_home(dir);
        match OnnxEmbeddingService::from_directory(&dir) {
            Ok(service) => {
                tracing::info!(path = %dir.display(), "ONNX embedding model loaded");
                return Arc::new(service);
            }
            Err(e) => {
                tracing::warn!(error = %e, "ONNX model unavailable, using token-hash embeddings");
            }
        }
    }
    Arc::new(TokenHashEmbedding::default())
}

fn build_translator(config: &CampusConfig) -> AppResult<Arc<dyn Translator>> {
    match &config.translation.endpoint {
        Some(endpoint) => {
            let translator = HttpTranslator::new(
                endpoint,
                config.translation.api_key.clone(),
                Duration::from_millis(config.nlp.translate_timeout_ms),
            )?;
            tracing::info!(url = %translator.url(), "Translation service configured");
            Ok(Arc::new(translator))
        }
        None => {
            tracing::info!("No translation service configured; answers stay untranslated");
            Ok(Arc::new(NullTranslator))
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> AppResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn import(store: &SqliteStore, path: &Path) -> AppResult<()> {
    let faqs = import_faqs_json(path)?;
    let saved = store.save_faqs(faqs).await?;
    println!("Imported {} FAQ entries from {}", saved, path.display());
    Ok(())
}

async fn chat(engine: Arc<TurnEngine>, language: String, user: Option<String>) -> AppResult<()> {
    let refresh_secs = engine.config().nlp.refresh_interval_secs;
    let refresh = (refresh_secs > 0)
        .then(|| engine.spawn_refresh_task(Duration::from_secs(refresh_secs)));

    let session_id = Uuid::new_v4().to_string();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    stdout.write_all(b"> ").await?;
    stdout.flush().await?;
    while let Some(line) = lines.next_line().await? {
        let message = line.trim();
        if message.is_empty() {
            stdout.write_all(b"> ").await?;
            stdout.flush().await?;
            continue;
        }

        let mut request = TurnRequest::new(message)
            .with_language(&language)
            .with_session(&session_id);
        if let Some(user) = &user {
            request = request.with_user(user);
        }
        let result = engine.process_turn(request).await;

        let mut out = format!("{}\n", result.response);
        for question in &result.suggested_questions {
            out.push_str(&format!("  - {}\n", question));
        }
        stdout.write_all(out.as_bytes()).await?;

        if engine.session_context(&session_id).is_none() {
            break;
        }
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
    }

    if let Some(task) = refresh {
        task.abort();
    }
    engine.flush().await;
    Ok(())
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = CampusConfig::load_or_default(&config_file);
    if let Some(dir) = args.resolve_data_dir() {
        config.general.data_dir = dir;
    }
    if let Some(level) = args.resolve_log_level() {
        config.general.log_level = level;
    }

    // Tracing.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .init();

    tracing::debug!(path = %config_file.display(), "Configuration resolved");

    // Storage.
    let data_dir = expand_home(&config.general.data_dir);
    let store = Arc::new(SqliteStore::open(&data_dir)?);

    if let Command::Import { path } = &args.command {
        return import(&store, path).await;
    }
    if let Command::Stats { days } = &args.command {
        let conversations = store.conversation_stats(*days).await?;
        let feedback = store.feedback_stats().await?;
        return print_json(&serde_json::json!({
            "days": days,
            "conversations": conversations,
            "feedback": feedback,
        }));
    }

    // Engine.
    let services = EngineServices {
        embedder: build_embedder(&config),
        classifier: Arc::new(ScriptClassifier::new()),
        translator: build_translator(&config)?,
        faq_source: store.clone(),
        store: store.clone(),
    };
    let engine = Arc::new(TurnEngine::new(config, services));

    match args.command {
        Command::Ask {
            message,
            language,
            session,
            user,
        } => {
            engine.refresh_index().await?;
            let mut request = TurnRequest::new(&message).with_language(&language);
            if let Some(session) = &session {
                request = request.with_session(session);
            }
            if let Some(user) = &user {
                request = request.with_user(user);
            }
            let result = engine.process_turn(request).await;
            engine.flush().await;
            print_json(&result)?;
        }
        Command::Chat { language, user } => {
            let stats = engine.refresh_index().await?;
            tracing::info!(
                faqs = stats.faq_count,
                variants = stats.variant_count,
                "Chat ready"
            );
            chat(engine, language, user).await?;
        }
        Command::History { session } => {
            print_json(&engine.get_session_history(&session).await?)?;
        }
        Command::Feedback {
            session,
            message,
            rating,
            comment,
            user,
        } => {
            engine
                .submit_feedback(&session, &message, rating, comment, user)
                .await?;
            println!("Feedback recorded");
        }
        Command::Languages => {
            for language in engine.supported_languages() {
                println!("{}\t{}", language.code, language.name);
            }
        }
        Command::Detect { text } => {
            print_json(&engine.detect_language(&text))?;
        }
        Command::Import { .. } | Command::Stats { .. } => {}
    }

    Ok(())
}
