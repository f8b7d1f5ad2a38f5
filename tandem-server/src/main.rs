use log::info;
use tandem_collab::{CollabServer, ServerConfig, ServerError};

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    env_logger::init();

    let config = ServerConfig::from_env();
    info!(
        "Starting Tandem (ws {}, http {})...",
        config.ws_addr, config.http_addr
    );

    CollabServer::new(config).run().await
}
