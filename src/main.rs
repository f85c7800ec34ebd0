// Módulos de la aplicación
mod analytics;
mod api;
mod app_state;
mod config;
mod ingest;
mod models;
mod neo4j_client;
mod store;

use std::sync::Arc;

use axum::http::HeaderValue;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;

#[tokio::main]
async fn main() {
    // 1. Cargar .env e inicializar logging
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // 2. Cargar configuración
    let cfg = config::AppConfig::from_env().expect("Error al cargar la configuración");

    // 3. Conectar a Neo4j y asegurar el esquema
    let graph = neo4j_client::connect_from_config(&cfg)
        .await
        .expect("Error conectando a Neo4j");
    neo4j_client::ensure_schema(&graph)
        .await
        .expect("Error asegurando el esquema de Neo4j");

    // 4. Crear estado compartido de la aplicación
    let app_state = AppState {
        config: cfg.clone(),
        graph: Arc::new(graph),
    };

    // 5. CORS: origen fijo si está configurado, abierto en caso contrario
    let cors = match cfg.cors_origin.as_deref() {
        Some(origen) => match origen.parse::<HeaderValue>() {
            Ok(valor) => CorsLayer::new()
                .allow_origin(valor)
                .allow_methods(Any)
                .allow_headers(Any),
            Err(_) => {
                warn!("CORS_ORIGIN inválido ({origen}); se permite cualquier origen.");
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any)
            }
        },
        None => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    };

    // 6. Configurar el router de la API
    let app = api::create_router(app_state.clone()).layer(cors);

    // 7. Iniciar el servidor
    let server_addr = &app_state.config.server_addr;
    let listener = tokio::net::TcpListener::bind(server_addr)
        .await
        .expect("No se pudo abrir el puerto del servidor");
    info!("🚀 Servidor de analítica escuchando en http://{server_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Señal de apagado recibida, iniciando cierre del servidor.");
        })
        .await
        .expect("Error del servidor HTTP");

    info!("✅ Servidor cerrado correctamente.");
}
