//! Tablero HTTP server
//!
//! Serves the Pagos and Finanzas reports as JSON, plus the Finanzas detail
//! export as an XLSX download.

use tablero::config::Config;
use tablero::server::run_server;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    // Defaults, then TABLERO_CONFIG, then HOST/PORT
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("{}", e);
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()));
        }
    };

    run_server(config).await
}
