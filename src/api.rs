//! Rutas y handlers de la API de analítica. La validación de parámetros
//! ocurre aquí, antes de tocar el grafo (422); un fallo del store se
//! devuelve tal cual como error interno (500).

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Router,
};
use neo4rs::query;
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use crate::{
    analytics::{self, Modo},
    app_state::AppState,
    ingest,
    models::{parse_timestamp, Dataset},
    store,
};

type ApiError = (StatusCode, Json<serde_json::Value>);

fn error_interno(err: anyhow::Error) -> ApiError {
    error!("Error consultando el grafo: {err}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": err.to_string()})),
    )
}

fn parametro_invalido(detalle: String) -> ApiError {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({"error": detalle})),
    )
}

// --- Router ---

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/clientes/:id/timeline", get(timeline_handler))
        .route("/agentes/:id/efectividad", get(efectividad_handler))
        .route(
            "/analytics/promesas-incumplidas",
            get(promesas_incumplidas_handler),
        )
        .route("/analytics/mejores-horarios", get(mejores_horarios_handler))
        .route("/admin/ingest", post(ingest_handler))
        .route("/admin/datos", delete(limpiar_handler))
        .route("/health", get(health_handler))
        .with_state(app_state)
}

// --- Handlers ---

#[axum::debug_handler]
async fn timeline_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<analytics::EntradaTimeline>>, ApiError> {
    let filas = store::filas_timeline(&state.graph, &id)
        .await
        .map_err(error_interno)?;
    // Cliente desconocido o sin interacciones: lista vacía, no error.
    Ok(Json(analytics::reconstruir_timeline(filas)))
}

#[axum::debug_handler]
async fn efectividad_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<analytics::EfectividadAgente>, ApiError> {
    let llamadas = store::llamadas_de_agente(&state.graph, &id)
        .await
        .map_err(error_interno)?;
    Ok(Json(analytics::efectividad_agente(&llamadas)))
}

#[derive(Deserialize)]
struct PromesasParams {
    hasta: Option<String>,
    #[serde(rename = "ventanaDias")]
    ventana_dias: Option<i64>,
    modo: Option<String>,
}

#[axum::debug_handler]
async fn promesas_incumplidas_handler(
    State(state): State<AppState>,
    Query(params): Query<PromesasParams>,
) -> Result<Json<Vec<analytics::PromesaIncumplida>>, ApiError> {
    let hasta = params
        .hasta
        .ok_or_else(|| parametro_invalido("Falta el parámetro 'hasta'".to_string()))?;
    let hasta = parse_timestamp(&hasta)
        .ok_or_else(|| parametro_invalido(format!("'hasta' no es una fecha válida: {hasta}")))?;

    let ventana_dias = params.ventana_dias.unwrap_or(14);
    if ventana_dias < 1 {
        return Err(parametro_invalido(format!(
            "'ventanaDias' debe ser >= 1 (recibido {ventana_dias})"
        )));
    }

    let modo = match params.modo.as_deref() {
        None => Modo::Acumulado,
        Some(s) => Modo::from_str(s).map_err(|e| parametro_invalido(e.to_string()))?,
    };

    let promesas = store::promesas_con_pagos(&state.graph)
        .await
        .map_err(error_interno)?;
    Ok(Json(analytics::detectar_promesas_incumplidas(
        promesas,
        hasta,
        ventana_dias,
        modo,
    )))
}

#[derive(Deserialize)]
struct HorariosParams {
    min_llamadas: Option<i64>,
    top_k: Option<i64>,
    alpha: Option<f64>,
}

#[axum::debug_handler]
async fn mejores_horarios_handler(
    State(state): State<AppState>,
    Query(params): Query<HorariosParams>,
) -> Result<Json<Vec<analytics::FranjaRankeada>>, ApiError> {
    let min_llamadas = params.min_llamadas.unwrap_or(10);
    if min_llamadas < 1 {
        return Err(parametro_invalido(format!(
            "'min_llamadas' debe ser >= 1 (recibido {min_llamadas})"
        )));
    }
    let top_k = params.top_k.unwrap_or(20);
    if top_k < 1 {
        return Err(parametro_invalido(format!(
            "'top_k' debe ser >= 1 (recibido {top_k})"
        )));
    }
    let alpha = params.alpha.unwrap_or(0.5);
    if !(0.0..=1.0).contains(&alpha) {
        return Err(parametro_invalido(format!(
            "'alpha' debe estar en [0, 1] (recibido {alpha})"
        )));
    }

    let registros = store::registros_de_llamadas(&state.graph)
        .await
        .map_err(error_interno)?;
    Ok(Json(analytics::mejores_horarios(
        &registros,
        min_llamadas as u64,
        top_k as usize,
        alpha,
    )))
}

#[axum::debug_handler]
async fn ingest_handler(
    State(state): State<AppState>,
    Json(dataset): Json<Dataset>,
) -> Result<impl IntoResponse, ApiError> {
    dataset
        .validar()
        .map_err(|err| parametro_invalido(format!("Dataset inválido: {err}")))?;
    let resumen = ingest::ingest_dataset(&state.graph, &dataset)
        .await
        .map_err(error_interno)?;
    Ok((StatusCode::OK, Json(json!({"message": resumen.to_string()}))))
}

#[axum::debug_handler]
async fn limpiar_handler(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    ingest::limpiar_grafo(&state.graph)
        .await
        .map_err(error_interno)?;
    Ok((
        StatusCode::OK,
        Json(json!({"message": "Grafo de cobranzas vaciado."})),
    ))
}

#[axum::debug_handler]
async fn health_handler(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .graph
        .run(query("RETURN 1"))
        .await
        .map_err(|e| error_interno(e.into()))?;
    Ok(Json(json!({"status": "ok"})))
}
