//! Ingesta del dataset plano de cobranzas en Neo4j: clientes, agentes
//! derivados, deudas, interacciones con sus propiedades por variante y los
//! nodos derivados (:Promesa, :PlanRenegociacion) con todas sus aristas.
//! Todos los upserts usan MERGE por id, así reejecutar no duplica nada.

use std::collections::{BTreeSet, HashMap};

use anyhow::Result;
use neo4rs::{query, Graph, Txn};
use tracing::info;

use crate::models::{
    deuda_id, dia_semana, hora_del_dia, plan_id, promesa_id, Dataset, Interaccion, Llamada, Pago,
    RESULTADO_PROMESA, RESULTADO_RENEGOCIACION,
};

/// Resumen de los resultados de una operación de ingesta.
#[derive(Debug, Default)]
pub struct ResumenIngesta {
    pub clientes: usize,
    pub agentes: usize,
    pub deudas: usize,
    pub interacciones: usize,
    pub promesas: usize,
    pub planes: usize,
    pub pagos_que_cumplen: usize,
    pub sigue_a: usize,
}

impl std::fmt::Display for ResumenIngesta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Resumen: {} clientes, {} agentes, {} deudas, {} interacciones, {} promesas, {} planes, {} aristas de cumplimiento, {} aristas SIGUE_A.",
            self.clientes,
            self.agentes,
            self.deudas,
            self.interacciones,
            self.promesas,
            self.planes,
            self.pagos_que_cumplen,
            self.sigue_a
        )
    }
}

/// Persiste el dataset completo en una única transacción. El llamante es
/// responsable de validarlo antes (ver `Dataset::validar`).
pub async fn ingest_dataset(graph: &Graph, dataset: &Dataset) -> Result<ResumenIngesta> {
    info!(
        "Ingesta del dataset (periodo {}): {} clientes y {} interacciones declaradas.",
        dataset.metadata.periodo,
        dataset.metadata.total_clientes,
        dataset.metadata.total_interacciones
    );

    let mut resumen = ResumenIngesta::default();

    // Índices en memoria: tipo de deuda por cliente (resuelve APLICADO_A en
    // el momento de escritura) y pagos por cliente (aristas CUMPLIDA_POR).
    let tipo_deuda: HashMap<&str, Option<&str>> = dataset
        .clientes
        .iter()
        .map(|c| (c.id.as_str(), c.tipo_deuda.as_deref()))
        .collect();
    let mut pagos_por_cliente: HashMap<&str, Vec<&Pago>> = HashMap::new();
    for i in &dataset.interacciones {
        if let Interaccion::Pago(p) = i {
            pagos_por_cliente
                .entry(p.cliente_id.as_str())
                .or_default()
                .push(p);
        }
    }

    // Agentes derivados de las llamadas, como en el dataset original.
    let agentes: BTreeSet<&str> = dataset
        .interacciones
        .iter()
        .filter_map(|i| match i {
            Interaccion::Llamada(l) => Some(l.agente_id.as_str()),
            _ => None,
        })
        .collect();

    let tx = graph.start_txn().await?;

    for c in &dataset.clientes {
        tx.run(
            query(
                "MERGE (x:Cliente {id: $id})
                 SET x.nombre = $nombre, x.telefono = $telefono,
                     x.tipo_deuda = $tipo_deuda, x.monto_deuda_inicial = $monto,
                     x.fecha_prestamo = $fecha",
            )
            .param("id", c.id.clone())
            .param("nombre", c.nombre.clone())
            .param("telefono", c.telefono.clone().unwrap_or_default())
            .param("tipo_deuda", c.tipo_deuda.clone().unwrap_or_default())
            .param("monto", c.monto_deuda_inicial)
            .param("fecha", c.fecha_prestamo.clone().unwrap_or_default()),
        )
        .await?;
        resumen.clientes += 1;
    }

    for agente in &agentes {
        tx.run(query("MERGE (a:Agente {id: $id})").param("id", agente.to_string()))
            .await?;
        resumen.agentes += 1;
    }

    // Una deuda por cliente, derivada de su tipo_deuda.
    for c in &dataset.clientes {
        let id = deuda_id(&c.id, c.tipo_deuda.as_deref());
        tx.run(
            query(
                "MERGE (d:Deuda {id: $id})
                 SET d.tipo = $tipo, d.monto_inicial = $monto
                 WITH d
                 MATCH (c:Cliente {id: $cid})
                 MERGE (c)-[:POSEE]->(d)",
            )
            .param("id", id)
            .param("tipo", c.tipo_deuda.clone().unwrap_or_else(|| "desconocida".to_string()))
            .param("monto", c.monto_deuda_inicial)
            .param("cid", c.id.clone()),
        )
        .await?;
        resumen.deudas += 1;
    }

    for interaccion in &dataset.interacciones {
        upsert_interaccion(&tx, interaccion, &tipo_deuda, &mut resumen).await?;
    }

    resumen.pagos_que_cumplen = upsert_cumplimientos(&tx, dataset, &pagos_por_cliente).await?;
    resumen.sigue_a = upsert_sigue_a(&tx, dataset).await?;

    tx.commit().await?;

    info!("Ingesta completada. {resumen}");
    Ok(resumen)
}

async fn upsert_interaccion(
    tx: &Txn,
    interaccion: &Interaccion,
    tipo_deuda: &HashMap<&str, Option<&str>>,
    resumen: &mut ResumenIngesta,
) -> Result<()> {
    let ts = interaccion.timestamp();

    // Nodo base + arista TUVO. Día y hora se toman del registro si vienen
    // declarados; si no, se derivan del timestamp.
    let dia = interaccion
        .dia_semana()
        .map(str::to_string)
        .unwrap_or_else(|| dia_semana(&ts).to_string());
    let hora = interaccion.hora_del_dia().unwrap_or_else(|| hora_del_dia(&ts));
    tx.run(
        query(
            "MERGE (ev:Interaccion {id: $id})
             SET ev.tipo = $tipo, ev.timestamp = $ts,
                 ev.dia_semana = $dia, ev.hora_del_dia = $hora
             WITH ev
             MATCH (c:Cliente {id: $cid})
             MERGE (c)-[:TUVO]->(ev)",
        )
        .param("id", interaccion.id().to_string())
        .param("tipo", interaccion.tipo().to_string())
        .param("ts", ts.to_rfc3339())
        .param("dia", dia)
        .param("hora", hora)
        .param("cid", interaccion.cliente_id().to_string()),
    )
    .await?;
    resumen.interacciones += 1;

    match interaccion {
        Interaccion::Llamada(l) => {
            tx.run(
                query(
                    "MATCH (ev:Interaccion {id: $id})
                     SET ev.duracion_segundos = $dur, ev.resultado = $res,
                         ev.sentimiento = $sent, ev.es_contacto = $contacto",
                )
                .param("id", l.id.clone())
                .param("dur", l.duracion_segundos)
                .param("res", l.resultado.clone())
                .param("sent", l.sentimiento.as_str().to_string())
                .param("contacto", l.es_contacto.unwrap_or(false)),
            )
            .await?;

            tx.run(
                query(
                    "MATCH (ev:Interaccion {id: $iid})
                     MERGE (a:Agente {id: $aid})
                     MERGE (ev)-[:ATENDIDA_POR]->(a)",
                )
                .param("iid", l.id.clone())
                .param("aid", l.agente_id.clone()),
            )
            .await?;

            if l.resultado == RESULTADO_PROMESA {
                upsert_promesa(tx, l).await?;
                resumen.promesas += 1;
            }
            if l.resultado == RESULTADO_RENEGOCIACION {
                upsert_plan(tx, l).await?;
                resumen.planes += 1;
            }
        }
        Interaccion::Pago(p) => {
            tx.run(
                query(
                    "MATCH (ev:Interaccion {id: $id})
                     SET ev.monto = $monto, ev.metodo_pago = $metodo,
                         ev.pago_completo = $completo",
                )
                .param("id", p.id.clone())
                .param("monto", p.monto)
                .param("metodo", p.metodo_pago.as_str().to_string())
                .param("completo", p.pago_completo),
            )
            .await?;

            // La deuda destino se resuelve con el tipo_deuda del cliente
            // pagador en el momento de escritura.
            let tipo = tipo_deuda.get(p.cliente_id.as_str()).copied().flatten();
            tx.run(
                query(
                    "MATCH (ev:Interaccion {id: $iid}), (d:Deuda {id: $did})
                     MERGE (ev)-[:APLICADO_A]->(d)",
                )
                .param("iid", p.id.clone())
                .param("did", deuda_id(&p.cliente_id, tipo)),
            )
            .await?;
        }
        Interaccion::Mensaje(m) => {
            tx.run(
                query("MATCH (ev:Interaccion {id: $id}) SET ev.asunto = $asunto")
                    .param("id", m.id.clone())
                    .param("asunto", m.asunto.clone().unwrap_or_default()),
            )
            .await?;
        }
    }
    Ok(())
}

async fn upsert_promesa(tx: &Txn, llamada: &Llamada) -> Result<()> {
    // SET ... = NULL elimina la propiedad, así una promesa sin monto o sin
    // fecha queda con la propiedad ausente en lugar de un valor centinela.
    tx.run(
        query(
            "MERGE (p:Promesa {id: $pid})
             SET p.monto_prometido = CASE WHEN $tiene_monto THEN $monto ELSE NULL END,
                 p.fecha_promesa   = CASE WHEN $tiene_fecha THEN $fecha ELSE NULL END
             WITH p
             MATCH (ev:Interaccion {id: $iid})
             MERGE (ev)-[:RESULTA_EN]->(p)",
        )
        .param("pid", promesa_id(&llamada.id))
        .param("tiene_monto", llamada.monto_prometido.is_some())
        .param("monto", llamada.monto_prometido.unwrap_or(0.0))
        .param("tiene_fecha", llamada.fecha_promesa.is_some())
        .param(
            "fecha",
            llamada
                .fecha_promesa
                .map(|f| f.to_rfc3339())
                .unwrap_or_default(),
        )
        .param("iid", llamada.id.clone()),
    )
    .await?;
    Ok(())
}

async fn upsert_plan(tx: &Txn, llamada: &Llamada) -> Result<()> {
    let (cuotas, monto_mensual) = match &llamada.nuevo_plan_pago {
        Some(plan) => (plan.cuotas, plan.monto_mensual),
        None => (0, 0.0),
    };
    tx.run(
        query(
            "MERGE (pl:PlanRenegociacion {id: $plid})
             SET pl.cuotas = $cuotas, pl.monto_mensual = $monto
             WITH pl
             MATCH (ev:Interaccion {id: $iid})
             MERGE (ev)-[:RESULTA_EN]->(pl)",
        )
        .param("plid", plan_id(&llamada.id))
        .param("cuotas", cuotas)
        .param("monto", monto_mensual)
        .param("iid", llamada.id.clone()),
    )
    .await?;
    Ok(())
}

/// Aristas (:Promesa)-[:CUMPLIDA_POR]->(:Interaccion): un pago cumple una
/// promesa si es del mismo cliente, posterior a la fecha prometida y cubre
/// por sí solo el monto prometido.
async fn upsert_cumplimientos(
    tx: &Txn,
    dataset: &Dataset,
    pagos_por_cliente: &HashMap<&str, Vec<&Pago>>,
) -> Result<usize> {
    let mut creadas = 0;
    for interaccion in &dataset.interacciones {
        let Interaccion::Llamada(l) = interaccion else {
            continue;
        };
        if l.resultado != RESULTADO_PROMESA {
            continue;
        }
        let Some(fecha) = l.fecha_promesa else {
            continue;
        };
        let monto_prometido = l.monto_prometido.unwrap_or(0.0);
        let Some(pagos) = pagos_por_cliente.get(l.cliente_id.as_str()) else {
            continue;
        };
        for pago in pagos {
            if pago.timestamp >= fecha && pago.monto >= monto_prometido {
                tx.run(
                    query(
                        "MATCH (p:Promesa {id: $pid}), (ev:Interaccion {id: $iid})
                         MERGE (p)-[:CUMPLIDA_POR]->(ev)",
                    )
                    .param("pid", promesa_id(&l.id))
                    .param("iid", pago.id.clone()),
                )
                .await?;
                creadas += 1;
            }
        }
    }
    Ok(creadas)
}

/// Arista derivada (:Interaccion)-[:SIGUE_A]->(:Interaccion): el sucesor
/// cronológico dentro del historial de cada cliente.
async fn upsert_sigue_a(tx: &Txn, dataset: &Dataset) -> Result<usize> {
    let mut por_cliente: HashMap<&str, Vec<&Interaccion>> = HashMap::new();
    for i in &dataset.interacciones {
        por_cliente.entry(i.cliente_id()).or_default().push(i);
    }

    let mut creadas = 0;
    for interacciones in por_cliente.values_mut() {
        interacciones.sort_by_key(|i| i.timestamp());
        for par in interacciones.windows(2) {
            tx.run(
                query(
                    "MATCH (a:Interaccion {id: $aid}), (b:Interaccion {id: $bid})
                     MERGE (a)-[:SIGUE_A]->(b)",
                )
                .param("aid", par[0].id().to_string())
                .param("bid", par[1].id().to_string()),
            )
            .await?;
            creadas += 1;
        }
    }
    Ok(creadas)
}

/// Borra todo el subgrafo de cobranzas. Pensado para reiniciar el entorno
/// antes de una nueva ingesta completa.
pub async fn limpiar_grafo(graph: &Graph) -> Result<()> {
    graph
        .run(query(
            "MATCH (n)
             WHERE n:Cliente OR n:Agente OR n:Deuda OR n:Interaccion
                OR n:Promesa OR n:PlanRenegociacion
             DETACH DELETE n",
        ))
        .await?;
    info!("Grafo de cobranzas vaciado.");
    Ok(())
}
