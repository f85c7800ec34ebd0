//! Adaptador de consultas al grafo: una consulta Cypher de lectura por
//! operación analítica, devolviendo filas planas. Las ramas opcionales se
//! resuelven como OPTIONAL MATCH (outer-join) y las colecciones anidadas se
//! reagrupan aquí fila a fila; el negocio vive en `analytics`.

use std::collections::HashMap;

use anyhow::Result;
use neo4rs::{query, Graph};

use crate::analytics::{FilaTimeline, LlamadaDeAgente, PromesaConPagos, RegistroLlamada};

/// Interacciones de un cliente con agente, deuda, promesa, plan y pagos que
/// cumplen. Cada pago que cumple llega en su propia fila y se reagrupa por
/// interacción, de modo que una rama ausente nunca descarta la fila base.
pub async fn filas_timeline(graph: &Graph, cliente_id: &str) -> Result<Vec<FilaTimeline>> {
    let cypher = "
        MATCH (c:Cliente {id: $id})-[:TUVO]->(i:Interaccion)
        OPTIONAL MATCH (i)-[:ATENDIDA_POR]->(a:Agente)
        OPTIONAL MATCH (i)-[:RESULTA_EN]->(pr:Promesa)
        OPTIONAL MATCH (i)-[:RESULTA_EN]->(pl:PlanRenegociacion)
        OPTIONAL MATCH (pr)-[:CUMPLIDA_POR]->(pc:Interaccion {tipo: 'pago_recibido'})
        OPTIONAL MATCH (i)-[:APLICADO_A]->(d:Deuda)
        RETURN
          i.id                AS interaccion_id,
          i.tipo              AS tipo,
          i.timestamp         AS timestamp,
          i.resultado         AS resultado,
          i.sentimiento       AS sentimiento,
          i.duracion_segundos AS duracion_segundos,
          a.id                AS agente_id,
          i.monto             AS monto,
          i.metodo_pago       AS metodo_pago,
          i.pago_completo     AS pago_completo,
          d.id                AS deuda_id,
          d.tipo              AS deuda_tipo,
          pr.id               AS promesa_id,
          pr.monto_prometido  AS monto_prometido,
          pr.fecha_promesa    AS fecha_promesa,
          pl.id               AS plan_id,
          pl.cuotas           AS cuotas,
          pl.monto_mensual    AS monto_mensual,
          pc.id               AS pago_cumple_id,
          pc.timestamp        AS pago_cumple_timestamp,
          coalesce(pc.monto, 0.0) AS pago_cumple_monto";

    let mut cursor = graph
        .execute(query(cypher).param("id", cliente_id.to_string()))
        .await?;

    // Reagrupado por interacción preservando el orden de llegada.
    let mut filas: Vec<FilaTimeline> = Vec::new();
    let mut indices: HashMap<String, usize> = HashMap::new();

    while let Some(row) = cursor.next().await? {
        let interaccion_id = row.get::<String>("interaccion_id").unwrap_or_default();
        let indice = *indices
            .entry(interaccion_id.clone())
            .or_insert_with(|| {
                filas.push(FilaTimeline {
                    interaccion_id,
                    tipo: row.get::<String>("tipo").unwrap_or_default(),
                    timestamp: row.get::<String>("timestamp").unwrap_or_default(),
                    resultado: row.get("resultado"),
                    sentimiento: row.get("sentimiento"),
                    duracion_segundos: row.get("duracion_segundos"),
                    agente_id: row.get("agente_id"),
                    monto: row.get("monto"),
                    metodo_pago: row.get("metodo_pago"),
                    pago_completo: row.get("pago_completo"),
                    deuda_id: row.get("deuda_id"),
                    deuda_tipo: row.get("deuda_tipo"),
                    promesa_id: row.get("promesa_id"),
                    monto_prometido: row.get("monto_prometido"),
                    fecha_promesa: row.get("fecha_promesa"),
                    plan_id: row.get("plan_id"),
                    cuotas: row.get("cuotas"),
                    monto_mensual: row.get("monto_mensual"),
                    pagos_ids: Vec::new(),
                    pagos_timestamps: Vec::new(),
                    pagos_montos: Vec::new(),
                });
                filas.len() - 1
            });

        if let Some(pago_id) = row.get::<String>("pago_cumple_id") {
            let fila = &mut filas[indice];
            fila.pagos_ids.push(pago_id);
            fila.pagos_timestamps
                .push(row.get::<String>("pago_cumple_timestamp").unwrap_or_default());
            fila.pagos_montos
                .push(row.get::<f64>("pago_cumple_monto").unwrap_or(0.0));
        }
    }
    Ok(filas)
}

/// Llamadas atendidas por un agente, con la promesa generada (si existe) y
/// si esa promesa tiene algún pago que la cumple.
pub async fn llamadas_de_agente(graph: &Graph, agente_id: &str) -> Result<Vec<LlamadaDeAgente>> {
    let cypher = "
        MATCH (i:Interaccion)-[:ATENDIDA_POR]->(:Agente {id: $id})
        OPTIONAL MATCH (i)-[:RESULTA_EN]->(p:Promesa)
        RETURN
          i.dia_semana                     AS dia_semana,
          i.hora_del_dia                   AS hora_del_dia,
          coalesce(i.es_contacto, false)   AS es_contacto,
          i.resultado                      AS resultado,
          coalesce(i.duracion_segundos, 0) AS duracion_segundos,
          p.id                             AS promesa_id,
          size([(p)-[:CUMPLIDA_POR]->(pc:Interaccion {tipo: 'pago_recibido'}) | pc]) > 0
                                           AS promesa_cumplida";

    let mut cursor = graph
        .execute(query(cypher).param("id", agente_id.to_string()))
        .await?;

    let mut llamadas = Vec::new();
    while let Some(row) = cursor.next().await? {
        llamadas.push(LlamadaDeAgente {
            dia_semana: row.get("dia_semana"),
            hora_del_dia: row.get("hora_del_dia"),
            es_contacto: row.get::<bool>("es_contacto").unwrap_or(false),
            resultado: row.get("resultado"),
            duracion_segundos: row.get::<i64>("duracion_segundos").unwrap_or(0),
            promesa_id: row.get("promesa_id"),
            promesa_cumplida: row.get::<bool>("promesa_cumplida").unwrap_or(false),
        });
    }
    Ok(llamadas)
}

/// Todas las promesas del grafo junto a los pagos de su cliente, un pago por
/// fila, reagrupados por promesa. Promesas sin fecha no se pueden ventanear
/// y quedan fuera, igual que en el filtrado por fecha de la consulta original.
pub async fn promesas_con_pagos(graph: &Graph) -> Result<Vec<PromesaConPagos>> {
    let cypher = "
        MATCH (c:Cliente)-[:TUVO]->(:Interaccion)-[:RESULTA_EN]->(p:Promesa)
        OPTIONAL MATCH (c)-[:TUVO]->(pay:Interaccion {tipo: 'pago_recibido'})
        RETURN
          c.id                      AS cliente_id,
          p.id                      AS promesa_id,
          p.fecha_promesa           AS fecha_promesa,
          p.monto_prometido         AS monto_prometido,
          pay.timestamp             AS pago_timestamp,
          coalesce(pay.monto, 0.0)  AS pago_monto";

    let mut cursor = graph.execute(query(cypher)).await?;

    let mut promesas: Vec<PromesaConPagos> = Vec::new();
    let mut indices: HashMap<String, usize> = HashMap::new();

    while let Some(row) = cursor.next().await? {
        let Some(promesa_id) = row.get::<String>("promesa_id") else {
            continue;
        };
        let Some(fecha_promesa) = row.get::<String>("fecha_promesa") else {
            continue;
        };
        let indice = *indices.entry(promesa_id.clone()).or_insert_with(|| {
            promesas.push(PromesaConPagos {
                cliente_id: row.get::<String>("cliente_id").unwrap_or_default(),
                promesa_id,
                fecha_promesa,
                monto_prometido: row.get("monto_prometido"),
                pagos: Vec::new(),
            });
            promesas.len() - 1
        });

        if let Some(pago_timestamp) = row.get::<String>("pago_timestamp") {
            promesas[indice]
                .pagos
                .push((pago_timestamp, row.get::<f64>("pago_monto").unwrap_or(0.0)));
        }
    }
    Ok(promesas)
}

/// Todas las interacciones de tipo llamada, para el ranking de franjas.
pub async fn registros_de_llamadas(graph: &Graph) -> Result<Vec<RegistroLlamada>> {
    let cypher = "
        MATCH (i:Interaccion)
        WHERE i.tipo STARTS WITH 'llamada'
        RETURN
          i.dia_semana                   AS dia_semana,
          i.hora_del_dia                 AS hora_del_dia,
          coalesce(i.es_contacto, false) AS es_contacto,
          i.resultado                    AS resultado";

    let mut cursor = graph.execute(query(cypher)).await?;

    let mut registros = Vec::new();
    while let Some(row) = cursor.next().await? {
        registros.push(RegistroLlamada {
            dia_semana: row.get("dia_semana"),
            hora_del_dia: row.get("hora_del_dia"),
            es_contacto: row.get::<bool>("es_contacto").unwrap_or(false),
            resultado: row.get("resultado"),
        });
    }
    Ok(registros)
}
