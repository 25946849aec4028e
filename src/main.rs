use workflow_mirror::config::SyncConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = SyncConfig::load()?;
    println!(
        "Configuration loaded: demo board={}, prefetch refresh={}s, valid={}s",
        config.demo.board_id, config.prefetch.refresh_after_secs, config.prefetch.valid_for_secs
    );

    let state = workflow_mirror::run_demo(&config).await?;
    println!("{}", serde_json::to_string_pretty(&state)?);

    Ok(())
}
