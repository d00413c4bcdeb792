use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use prompt_playbook::{
    providers::azure_openai::AzureOpenAI,
    samples::{report_failure, run_chat_demo},
    LLMProvider, SettingsLoader,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "chat-example")]
#[command(about = "Run the Azure OpenAI chat, summarization and classification examples")]
struct Args {
    /// Directory holding appsettings.json and appsettings.<environment>.json
    #[arg(long, default_value = ".")]
    config_dir: PathBuf,

    /// Environment name selecting the environment-specific settings file
    #[arg(long, default_value = "Development")]
    environment: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut stdout = std::io::stdout().lock();

    let loader = match SettingsLoader::standard(&args.config_dir, &args.environment) {
        Ok(loader) => loader,
        Err(error) => {
            report_failure(error.into(), &mut stdout)?;
            return Ok(());
        }
    };

    run_chat_demo(
        &loader,
        |settings| Ok(Arc::new(AzureOpenAI::from_settings(settings)?) as Arc<dyn LLMProvider>),
        &mut stdout,
    )
    .await?;

    Ok(())
}
