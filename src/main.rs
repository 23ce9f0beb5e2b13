use std::sync::Arc;

use support_relay::channels::{ReplySender, WebhookState, WhatsAppSender, cli, webhook_routes};
use support_relay::config::{AppConfig, LlmSettings};
use support_relay::llm::create_provider;
use support_relay::pipeline::{Classifier, InboundDispatcher};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Values from .env are only defaults; real environment wins
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    match std::env::args().nth(1).as_deref() {
        None | Some("serve") => serve().await,
        Some("classify") => classify_once().await,
        Some(other) => {
            eprintln!("Unknown command: {other}");
            eprintln!("Usage: support-relay [serve | classify]");
            std::process::exit(2);
        }
    }
}

async fn serve() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  required: OPENAI_API_KEY, WHATSAPP_TOKEN, PHONE_NUMBER_ID, VERIFY_TOKEN");
        std::process::exit(1);
    });

    eprintln!("📨 Support Relay v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.llm.model);
    eprintln!("   Phone number id: {}", config.whatsapp.phone_number_id);
    eprintln!("   Webhook: http://0.0.0.0:{}/webhook", config.server.port);
    eprintln!(
        "   Signature check: {}",
        if config.whatsapp.app_secret.is_some() { "on" } else { "off" }
    );
    if let Some(ref recipient) = config.whatsapp.test_recipient {
        eprintln!("   Test recipient: {recipient}");
    }

    let llm = create_provider(&config.llm)?;
    let classifier = Arc::new(Classifier::new(llm));
    let sender: Arc<dyn ReplySender> = Arc::new(WhatsAppSender::new(
        config.whatsapp.clone(),
        config.server.http_timeout,
    )?);
    let dispatcher = Arc::new(InboundDispatcher::new(classifier, Arc::clone(&sender)));

    let state = WebhookState::new(dispatcher, sender, &config.whatsapp);
    let app = webhook_routes(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.server.port)).await?;
    tracing::info!(port = config.server.port, "Webhook server started");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Webhook server stopped");
    Ok(())
}

async fn classify_once() -> Result<(), Box<dyn std::error::Error>> {
    let settings = LlmSettings::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  export OPENAI_API_KEY=sk-...");
        std::process::exit(1);
    });

    let llm = create_provider(&settings)?;
    let classifier = Classifier::new(llm);
    cli::run_stdio(&classifier).await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
