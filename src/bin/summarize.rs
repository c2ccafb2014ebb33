use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let settings = powermix_rs::config::Settings::from_env()?;
    powermix_rs::logging::init(&settings.log_level);

    powermix_rs::app::run_summarizer(settings).await
}
