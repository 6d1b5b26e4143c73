// main.rs - Command-line entry point for the affgen production pipeline
use std::path::Path;
use std::sync::Arc;

use affgen::{
    CredentialStore, Credentials, FirstClipAssembler, GeminiClient, ModelSelection,
    ProductionOrchestrator, ProgressUpdate, ReferenceImage, RenderProfile, VeoClient,
};

fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cfg!(debug_assertions) {
            "debug,affgen=trace,reqwest=info,hyper=info".to_string()
        } else {
            "info,affgen=info,reqwest=warn,hyper=warn".to_string()
        }
    });

    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&log_level))?;

    let fmt_layer = if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        // JSON logging for production (easier for log aggregation)
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .boxed()
    } else {
        // Human-readable logging for development
        fmt::layer()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("🎬 affgen starting up...");
    tracing::info!("Version: {}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Log level: {}", log_level);

    Ok(())
}

fn mime_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "image/jpeg",
    }
}

fn load_reference_image(path: &Path) -> Result<ReferenceImage, Box<dyn std::error::Error>> {
    let data = std::fs::read(path)?;
    Ok(ReferenceImage {
        mime_type: mime_for(path).to_string(),
        data,
    })
}

/// Credentials come from the persisted record, with `GEMINI_API_KEY` /
/// `VEO_API_KEY` filling any keys the record leaves blank.
fn resolve_credentials(store: &CredentialStore) -> Credentials {
    let mut credentials = store.load();
    if credentials.gemini.trim().is_empty() {
        if let Ok(key) = std::env::var("GEMINI_API_KEY") {
            credentials.gemini = key;
        }
    }
    if credentials.veo.trim().is_empty() {
        if let Ok(key) = std::env::var("VEO_API_KEY") {
            credentials.veo = key;
        }
    }
    credentials
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    init_logging()?;

    let mut args = std::env::args().skip(1);
    let product_url = match args.next() {
        Some(url) => url,
        None => {
            eprintln!("usage: affgen <product-url> [reference-image]");
            std::process::exit(2);
        }
    };
    let reference_image = match args.next() {
        Some(path) => Some(load_reference_image(Path::new(&path))?),
        None => None,
    };

    let store = CredentialStore::from_env();
    let credentials = resolve_credentials(&store);
    let models = ModelSelection::from_env();

    let reasoning_key = match credentials.reasoning_key() {
        Some(key) => key.to_string(),
        None => {
            eprintln!(
                "No Gemini key configured. Set GEMINI_API_KEY or add \"gemini\" to {}.",
                store.path().display()
            );
            std::process::exit(2);
        }
    };
    let video_key = credentials
        .video_key(models.video)
        .unwrap_or_default()
        .to_string();

    tracing::info!(
        "models: reasoning={:?}, video={}",
        models.reasoning,
        models.video.label()
    );

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<ProgressUpdate>();
    let progress_task = tokio::spawn(async move {
        while let Some(update) = rx.recv().await {
            tracing::info!(
                "[{:?}] {} ({}/{})",
                update.status,
                update.message,
                update.clips_ready,
                update.total_scenes
            );
        }
    });

    let mut orchestrator = ProductionOrchestrator::new(
        Arc::new(GeminiClient::new(reasoning_key)),
        Arc::new(VeoClient::new(video_key)),
        Arc::new(FirstClipAssembler::new()),
        credentials,
        models,
    )
    .with_profile(RenderProfile::default())
    .with_progress(tx);

    orchestrator.start_analysis(&product_url, reference_image).await?;

    if let Some(board) = orchestrator.storyboard() {
        tracing::info!(
            "storyboard ready: {} scenes, style \"{}\"",
            board.scenes.len(),
            board.global_style
        );
    }

    let master = orchestrator.execute_production().await?;
    drop(orchestrator);
    progress_task.await?;

    println!("master: {} ({} clips)", master.path.display(), master.clip_count);
    Ok(())
}
