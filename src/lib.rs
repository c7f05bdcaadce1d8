pub mod commands;
pub mod config;
pub mod db;
pub mod deadlines;
pub mod llm;
pub mod logging;
pub mod server;
pub mod widget;

use config::Credentials;
use llm::assistant::{Assistant, PollPolicy};
use llm::openai::OpenAiAssistants;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Bind the relay and serve until ctrl-c. Missing credentials do not stop
/// the server; every assist request then answers with the configuration error.
pub async fn run(
    listen_addr: SocketAddr,
    credentials: Result<Credentials, llm::AssistError>,
    poll: PollPolicy,
) -> std::io::Result<()> {
    let assistant = match credentials {
        Ok(creds) => {
            info!("Assistant configured: {creds:?}");
            Some(
                Assistant::new(OpenAiAssistants::new(creds.openai_config()), creds.assistant_id)
                    .with_poll_policy(poll),
            )
        }
        Err(err) => {
            warn!("{err}; the assist endpoint is disabled");
            None
        }
    };

    let listener = TcpListener::bind(listen_addr).await?;
    server::serve(listener, server::router(assistant)).await
}
