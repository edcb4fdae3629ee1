// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use ofslicer_http::config::ListenConfig;
use ofslicer_http::{api, Controller, LoggingDriver};

#[tokio::main]
async fn main() {
    enable_logging();

    let listen = ListenConfig::from_env();
    let controller = Arc::new(Controller::new(Arc::new(LoggingDriver)));
    let app = api::build_router(controller);

    log::info!("ofslicer-http listening on {}", listen.addr);
    let listener = tokio::net::TcpListener::bind(listen.addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {e}", listen.addr));
    axum::serve(listener, app)
        .await
        .unwrap_or_else(|e| log::error!("server exited: {e}"));
}

fn enable_logging() {
    let mut log_builder = env_logger::Builder::new();
    log_builder.filter(Some("ofslicer"), log::LevelFilter::Info);
    log_builder.filter(Some("ofslicer_http"), log::LevelFilter::Info);
    log_builder.init();
}
