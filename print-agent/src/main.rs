use print_agent::{Config, Server, ServerState, print_banner, setup_environment};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Environment (dotenv, work dir, logging)
    setup_environment()?;

    print_banner();

    tracing::info!("🦀 Crab print agent starting...");

    // 2. Configuration
    let config = Config::from_env();
    tracing::info!(
        agent_id = %config.agent_id,
        environment = %config.environment,
        timezone = %config.timezone,
        "Configuration loaded"
    );

    // 3. Job store and print pipeline
    let state = ServerState::initialize(&config).await?;

    // 4. HTTP server (Server::run starts the dispatcher)
    let server = Server::with_state(config, state);

    if let Err(e) = server.run().await {
        tracing::error!("Server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}
