use std::sync::Arc;

use tracing::{error, info};

use bottlemail::bottle::BottleSettings;
use bottlemail::web::AppState;
use bottlemail::{build_mailer, start_reconciler, Config, Database, WebServer};

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    // Load configuration
    let config = match Config::load_with_env(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {config_path}: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    // Initialize logging
    if let Err(e) = bottlemail::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        bottlemail::logging::init_console_only(&config.logging.level);
    }

    if let Err(e) = run(config).await {
        error!("Fatal: {}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> bottlemail::Result<()> {
    config.validate()?;

    info!("bottlemail {}", env!("CARGO_PKG_VERSION"));

    let db = Arc::new(Database::open(&config.database.path).await?);
    let mailer = build_mailer(&config.mail)?;
    info!(provider = %config.mail.provider, "Mailer ready");

    if config.reconciler.enabled {
        start_reconciler(
            db.clone(),
            mailer.clone(),
            config.mail.clone(),
            config.reconciler.clone(),
        );
    } else {
        info!("Delivery reconciler disabled");
    }

    let state = Arc::new(AppState::new(
        db,
        mailer,
        BottleSettings::from_config(&config),
    ));
    let server = WebServer::new(&config.server, &config.web, state)?;
    info!(
        "Server configured on {}:{}",
        config.server.host, config.server.port
    );

    server.run().await
}
