use std::env;
use std::io;
use std::process::ExitCode;

use cart_eng::config::Settings;
use cart_eng::csv::{read_actions, write_cart};
use cart_eng::service::{HttpApi, SettingsProvider};
use cart_eng::{CartEngine, FileStore};
use tokio_stream::wrappers::ReceiverStream;
use tracing::level_filters::LevelFilter;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::WARN.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    let Some(path) = env::args().nth(1) else {
        eprintln!("usage: cart-eng <actions.csv>");
        return ExitCode::from(2);
    };

    if !path.ends_with(".csv") {
        warn!(path, "input file seems to not be a csv file");
    }

    let settings = Settings::from_env();

    let store = match FileStore::open(&settings.store_dir) {
        Ok(store) => store,
        Err(e) => {
            error!(dir = %settings.store_dir.display(), reason = %e, "cannot open cart store");
            return ExitCode::FAILURE;
        }
    };

    let config = match &settings.api_url {
        Some(url) => match HttpApi::new(url.as_str()).store_config().await {
            Ok(config) => config,
            Err(e) => {
                warn!(url = %url, reason = %e, "store settings unavailable, using environment");
                settings.store
            }
        },
        None => settings.store,
    };

    // owned path: the iterator moves into the reader task
    let actions = match read_actions(path) {
        Ok(actions) => actions,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let mut engine = CartEngine::open(store);
    if let Err(e) = engine.merge_pending_reorder() {
        warn!(reason = %e, "could not merge reorder items");
    }

    let (action_sender, action_receiver) = tokio::sync::mpsc::channel(16);

    tokio::spawn(async move {
        for result in actions {
            match result {
                Ok(action) => {
                    if action_sender.send(action).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("{e}");
                }
            }
        }
    });

    engine.run(ReceiverStream::new(action_receiver)).await;

    if let Err(e) = write_cart(io::stdout().lock(), &engine, &config) {
        error!("{e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
