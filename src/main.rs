use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use log::{info, warn};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;

use pow_ledger::api::{self, ApiDoc, AppState};
use pow_ledger::blockchain::{Ledger, ProofOfWork};
use pow_ledger::config::NodeConfig;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = NodeConfig::from_env().context("Failed to load configuration")?;

    // Unique address for this node, credited with mining rewards
    let node_id = Uuid::new_v4().simple().to_string();

    let ledger = Ledger::with_pow(ProofOfWork::new(config.difficulty));
    let state = web::Data::new(AppState::new(ledger, node_id.clone(), config.mining_reward));

    info!(
        "Node {} using proof-of-work difficulty {}",
        state.miner.node_id(),
        config.difficulty
    );
    info!("Starting HTTP server at http://{}:{}", config.host, config.port);

    // actix waits for in-flight requests on shutdown, so a blocked /mine has
    // to be released as soon as the signal arrives
    let miner = state.miner.clone();
    actix_web::rt::spawn(async move { miner.cancel_when(shutdown_signal()).await });

    let server_state = state.clone();
    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        let openapi = ApiDoc::openapi();

        App::new()
            .wrap(middleware::Logger::default())
            .wrap(cors)
            .app_data(server_state.clone())
            .configure(api::configure_routes)
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", openapi.clone())
            )
    })
    .bind((config.host.as_str(), config.port))
    .with_context(|| format!("Failed to bind {}:{}", config.host, config.port))?
    .run()
    .await
    .context("HTTP server error")?;

    info!("Node {} stopped", node_id);

    Ok(())
}

/// Resolves on the first interrupt or terminate signal
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use actix_web::rt::signal::unix::{signal, SignalKind};
        use std::future::Future;
        use std::task::Poll;

        let mut interrupt = std::pin::pin!(actix_web::rt::signal::ctrl_c());
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                std::future::poll_fn(|cx| {
                    if interrupt.as_mut().poll(cx).is_ready() || terminate.poll_recv(cx).is_ready() {
                        Poll::Ready(())
                    } else {
                        Poll::Pending
                    }
                })
                .await
            }
            Err(err) => {
                warn!("Failed to listen for SIGTERM: {}", err);
                let _ = interrupt.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = actix_web::rt::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", err);
        }
    }
}
