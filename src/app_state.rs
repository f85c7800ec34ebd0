use std::sync::Arc;
use neo4rs::Graph;
use crate::config::AppConfig;

/// Estado compartido de la aplicación: la configuración y el handle del
/// grafo, inyectado en cada handler (nada de estado global del driver).
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub graph: Arc<Graph>,
}
