use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Local overrides are read first; dotenvy never replaces a variable that is already set.
const DOTENV_FILES: &[&str] = &[".env.local", ".env"];

pub fn init_logging() {
    // Writes to STDERR, filtered by RUST_LOG (default "info")
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_file(true)
        .with_line_number(true)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // load dotenv files
    for file in DOTENV_FILES {
        match dotenvy::from_filename(file) {
            Ok(path) => info!("Read dotenv file from: {}", path.display()),
            Err(dotenvy::Error::Io(io_error)) if io_error.kind() == std::io::ErrorKind::NotFound => {
                info!("Couldn't find dotenv file {file}");
            }
            Err(err) => warn!("Error reading dotenv file {file}: {err}"),
        }
    }
}
