use crate::config::AppConfig;
use anyhow::Result;
use neo4rs::{query, Graph};
use tracing::info;
use url::Url;

pub async fn connect_from_config(cfg: &AppConfig) -> Result<Graph> {
    let url = Url::parse(&cfg.neo4j_uri)?;
    let host = url.host_str().unwrap_or("localhost");
    let port = url.port().unwrap_or(7687);
    let addr = format!("{host}:{port}");

    info!("Conectando a Neo4j en {addr}...");
    let graph = Graph::new(&addr, &cfg.neo4j_user, &cfg.neo4j_password).await?;
    info!("Conexión a Neo4j OK");
    Ok(graph)
}

/// Crea constraints de unicidad para las etiquetas del grafo de cobranzas:
/// :Cliente, :Agente, :Deuda, :Interaccion, :Promesa y :PlanRenegociacion.
pub async fn ensure_schema(graph: &Graph) -> Result<()> {
    let statements = [
        "CREATE CONSTRAINT cliente_id IF NOT EXISTS
         FOR (c:Cliente)
         REQUIRE c.id IS UNIQUE",
        "CREATE CONSTRAINT agente_id IF NOT EXISTS
         FOR (a:Agente)
         REQUIRE a.id IS UNIQUE",
        "CREATE CONSTRAINT deuda_id IF NOT EXISTS
         FOR (d:Deuda)
         REQUIRE d.id IS UNIQUE",
        "CREATE CONSTRAINT interaccion_id IF NOT EXISTS
         FOR (i:Interaccion)
         REQUIRE i.id IS UNIQUE",
        "CREATE CONSTRAINT promesa_id IF NOT EXISTS
         FOR (p:Promesa)
         REQUIRE p.id IS UNIQUE",
        "CREATE CONSTRAINT plan_id IF NOT EXISTS
         FOR (pl:PlanRenegociacion)
         REQUIRE pl.id IS UNIQUE",
    ];

    for stmt in statements {
        graph.run(query(stmt)).await?;
    }

    info!("Esquema de Neo4j asegurado (constraints básicos creados).");
    Ok(())
}
