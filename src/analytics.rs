//! Los cuatro algoritmos analíticos sobre el grafo de cobranzas. Operan sobre
//! filas ya traídas por `store` (joins opcionales resueltos allí) y hacen en
//! memoria el ventaneo, las tasas, el score y el orden de salida.

use std::collections::{BTreeMap, HashSet};

use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::warn;

use crate::models::{
    parse_timestamp, RESULTADO_PAGO_INMEDIATO, RESULTADO_PROMESA, RESULTADO_RENEGOCIACION,
    TIPO_PAGO,
};

/// Resultados que cuentan como "éxito" en tasa_exito y score de horarios.
pub const RESULTADOS_EXITO: [&str; 3] = [
    RESULTADO_PROMESA,
    RESULTADO_PAGO_INMEDIATO,
    RESULTADO_RENEGOCIACION,
];

fn es_exito(resultado: Option<&str>) -> bool {
    resultado.is_some_and(|r| RESULTADOS_EXITO.contains(&r))
}

fn tasa(numerador: u64, denominador: u64) -> f64 {
    if denominador == 0 {
        0.0
    } else {
        numerador as f64 / denominador as f64
    }
}

// ---------------------------------------------------------------------------
// Timeline del cliente
// ---------------------------------------------------------------------------

/// Fila cruda del timeline: la interacción con todas sus ramas opcionales
/// (agente, deuda, promesa, plan) ya resueltas como outer-join.
#[derive(Debug, Clone, Default)]
pub struct FilaTimeline {
    pub interaccion_id: String,
    pub tipo: String,
    pub timestamp: String,
    pub resultado: Option<String>,
    pub sentimiento: Option<String>,
    pub duracion_segundos: Option<i64>,
    pub agente_id: Option<String>,
    pub monto: Option<f64>,
    pub metodo_pago: Option<String>,
    pub pago_completo: Option<bool>,
    pub deuda_id: Option<String>,
    pub deuda_tipo: Option<String>,
    pub promesa_id: Option<String>,
    pub monto_prometido: Option<f64>,
    pub fecha_promesa: Option<String>,
    pub plan_id: Option<String>,
    pub cuotas: Option<i64>,
    pub monto_mensual: Option<f64>,
    /// Pagos que cumplen la promesa, como listas paralelas (id, ts, monto).
    pub pagos_ids: Vec<String>,
    pub pagos_timestamps: Vec<String>,
    pub pagos_montos: Vec<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeudaTimeline {
    pub id: String,
    pub tipo: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PromesaTimeline {
    pub id: String,
    pub monto_prometido: Option<f64>,
    pub fecha_promesa: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanTimeline {
    pub id: String,
    pub cuotas: Option<i64>,
    pub monto_mensual: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PagoQueCumple {
    pub id: String,
    pub timestamp: String,
    pub monto: f64,
}

/// Entrada enriquecida del timeline, con los nombres de campo de la API.
#[derive(Debug, Clone, Serialize)]
pub struct EntradaTimeline {
    pub interaccion_id: String,
    pub tipo: String,
    pub timestamp: String,
    pub resultado: Option<String>,
    pub sentimiento: Option<String>,
    pub duracion_segundos: Option<i64>,
    pub agente_id: Option<String>,
    pub monto_pago: Option<f64>,
    pub metodo_pago: Option<String>,
    pub pago_completo: Option<bool>,
    pub deuda: Option<DeudaTimeline>,
    pub promesa: Option<PromesaTimeline>,
    pub plan: Option<PlanTimeline>,
    pub pagos_que_cumplen: Vec<PagoQueCumple>,
}

/// Reconstruye el timeline de un cliente: enriquece cada fila y ordena
/// ascendente por timestamp (orden estable; los empates no se desempatan).
pub fn reconstruir_timeline(filas: Vec<FilaTimeline>) -> Vec<EntradaTimeline> {
    let mut entradas: Vec<EntradaTimeline> = filas.into_iter().map(enriquecer_fila).collect();
    entradas.sort_by_key(|e| clave_temporal(&e.timestamp));
    entradas
}

fn clave_temporal(ts: &str) -> DateTime<Utc> {
    parse_timestamp(ts).unwrap_or_else(|| {
        warn!("Timestamp no interpretable en el grafo: {ts}");
        DateTime::<Utc>::MIN_UTC
    })
}

fn enriquecer_fila(fila: FilaTimeline) -> EntradaTimeline {
    let es_pago = fila.tipo == TIPO_PAGO;

    let mut pagos_que_cumplen: Vec<PagoQueCumple> = fila
        .pagos_ids
        .into_iter()
        .zip(fila.pagos_timestamps)
        .zip(fila.pagos_montos)
        .map(|((id, timestamp), monto)| PagoQueCumple {
            id,
            timestamp,
            monto,
        })
        .collect();
    pagos_que_cumplen.sort_by_key(|p| clave_temporal(&p.timestamp));

    EntradaTimeline {
        interaccion_id: fila.interaccion_id,
        tipo: fila.tipo,
        timestamp: fila.timestamp,
        resultado: fila.resultado,
        sentimiento: fila.sentimiento,
        duracion_segundos: fila.duracion_segundos,
        agente_id: fila.agente_id,
        // Los campos de pago solo aplican a la variante pago_recibido.
        monto_pago: if es_pago { fila.monto } else { None },
        metodo_pago: if es_pago { fila.metodo_pago } else { None },
        pago_completo: if es_pago { fila.pago_completo } else { None },
        deuda: fila.deuda_id.map(|id| DeudaTimeline {
            id,
            tipo: fila.deuda_tipo,
        }),
        promesa: fila.promesa_id.map(|id| PromesaTimeline {
            id,
            monto_prometido: fila.monto_prometido,
            fecha_promesa: fila.fecha_promesa,
        }),
        plan: fila.plan_id.map(|id| PlanTimeline {
            id,
            cuotas: fila.cuotas,
            monto_mensual: fila.monto_mensual,
        }),
        pagos_que_cumplen,
    }
}

// ---------------------------------------------------------------------------
// Efectividad del agente
// ---------------------------------------------------------------------------

/// Una llamada atendida por el agente, con su promesa (si la generó) y si
/// esa promesa tiene algún pago que la cumpla.
#[derive(Debug, Clone, Default)]
pub struct LlamadaDeAgente {
    pub dia_semana: Option<String>,
    pub hora_del_dia: Option<i64>,
    pub es_contacto: bool,
    pub resultado: Option<String>,
    pub duracion_segundos: i64,
    pub promesa_id: Option<String>,
    pub promesa_cumplida: bool,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ResumenAgente {
    pub total_llamadas: u64,
    pub tasa_contacto: f64,
    pub promesas: u64,
    pub tasa_promesa_sobre_llamadas: f64,
    pub promesas_cumplidas: u64,
    pub tasa_cumplimiento_sobre_promesas: f64,
    pub pagos_inmediatos: u64,
    pub tasa_pago_inmediato: f64,
    pub renegociaciones: u64,
    pub duracion_media_seg: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FranjaHoraria {
    pub dia_semana: Option<String>,
    pub hora_del_dia: Option<i64>,
    pub llamadas: u64,
    pub tasa_contacto: f64,
    pub tasa_exito: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EfectividadAgente {
    pub resumen: ResumenAgente,
    pub por_horario: Vec<FranjaHoraria>,
}

/// Calcula el resumen de efectividad y el desglose por (día, hora).
/// Sin llamadas devuelve resumen a cero y desglose vacío, nunca error.
pub fn efectividad_agente(llamadas: &[LlamadaDeAgente]) -> EfectividadAgente {
    let total = llamadas.len() as u64;
    let contactos = llamadas.iter().filter(|l| l.es_contacto).count() as u64;
    let promesas = llamadas
        .iter()
        .filter(|l| l.resultado.as_deref() == Some(RESULTADO_PROMESA))
        .count() as u64;
    let pagos_inmediatos = llamadas
        .iter()
        .filter(|l| l.resultado.as_deref() == Some(RESULTADO_PAGO_INMEDIATO))
        .count() as u64;
    let renegociaciones = llamadas
        .iter()
        .filter(|l| l.resultado.as_deref() == Some(RESULTADO_RENEGOCIACION))
        .count() as u64;
    let duracion_total: i64 = llamadas.iter().map(|l| l.duracion_segundos).sum();

    // Promesas distintas del agente con al menos un pago que las cumple.
    let cumplidas: HashSet<&str> = llamadas
        .iter()
        .filter(|l| l.promesa_cumplida)
        .filter_map(|l| l.promesa_id.as_deref())
        .collect();
    let promesas_cumplidas = cumplidas.len() as u64;

    let resumen = ResumenAgente {
        total_llamadas: total,
        tasa_contacto: tasa(contactos, total),
        promesas,
        tasa_promesa_sobre_llamadas: tasa(promesas, total),
        promesas_cumplidas,
        tasa_cumplimiento_sobre_promesas: tasa(promesas_cumplidas, promesas),
        pagos_inmediatos,
        tasa_pago_inmediato: tasa(pagos_inmediatos, total),
        renegociaciones,
        duracion_media_seg: if total == 0 {
            0.0
        } else {
            duracion_total as f64 / total as f64
        },
    };

    // Desglose por franja. BTreeMap deja la salida ordenada por (día, hora),
    // así la misma consulta produce siempre la misma respuesta.
    let mut franjas: BTreeMap<(Option<String>, Option<i64>), (u64, u64, u64)> = BTreeMap::new();
    for l in llamadas {
        let grupo = franjas
            .entry((l.dia_semana.clone(), l.hora_del_dia))
            .or_default();
        grupo.0 += 1;
        if l.es_contacto {
            grupo.1 += 1;
        }
        if es_exito(l.resultado.as_deref()) {
            grupo.2 += 1;
        }
    }
    let por_horario = franjas
        .into_iter()
        .map(
            |((dia_semana, hora_del_dia), (llamadas, contactos, exitos))| FranjaHoraria {
                dia_semana,
                hora_del_dia,
                llamadas,
                tasa_contacto: tasa(contactos, llamadas),
                tasa_exito: tasa(exitos, llamadas),
            },
        )
        .collect();

    EfectividadAgente {
        resumen,
        por_horario,
    }
}

// ---------------------------------------------------------------------------
// Promesas incumplidas
// ---------------------------------------------------------------------------

/// Modo de cumplimiento de una promesa dentro de la ventana.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modo {
    /// Los pagos de la ventana se suman (tolera pagos parciales).
    Acumulado,
    /// Cuenta solo el mayor pago individual de la ventana.
    Estricto,
}

impl Modo {
    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "acumulado" => Ok(Self::Acumulado),
            "estricto" => Ok(Self::Estricto),
            other => Err(anyhow!(
                "Modo no soportado: {other} (se espera 'acumulado' o 'estricto')"
            )),
        }
    }
}

/// Una promesa con todos los pagos del mismo cliente (timestamp crudo, monto).
#[derive(Debug, Clone, Default)]
pub struct PromesaConPagos {
    pub cliente_id: String,
    pub promesa_id: String,
    pub fecha_promesa: String,
    pub monto_prometido: Option<f64>,
    pub pagos: Vec<(String, f64)>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PromesaIncumplida {
    pub cliente_id: String,
    pub promesa_id: String,
    pub fecha_promesa: String,
    pub monto_prometido: Option<f64>,
    pub monto_pagado_en_ventana: f64,
    pub dias_vencida: i64,
}

/// Detecta las promesas con fecha anterior a `hasta` que no quedaron
/// cubiertas por los pagos de su ventana de cumplimiento.
pub fn detectar_promesas_incumplidas(
    promesas: Vec<PromesaConPagos>,
    hasta: DateTime<Utc>,
    ventana_dias: i64,
    modo: Modo,
) -> Vec<PromesaIncumplida> {
    let mut incumplidas = Vec::new();

    for promesa in promesas {
        let Some(fecha) = parse_timestamp(&promesa.fecha_promesa) else {
            warn!(
                "Promesa {} con fecha_promesa no interpretable: {}",
                promesa.promesa_id, promesa.fecha_promesa
            );
            continue;
        };
        if fecha >= hasta {
            continue;
        }

        // Pagos dentro de [fecha_promesa, fecha_promesa + ventana], inclusive.
        // Una ventana que desborda el calendario se trata como ilimitada.
        let fin_ventana = Duration::try_days(ventana_dias)
            .and_then(|d| fecha.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let mut monto_sum = 0.0_f64;
        let mut monto_max = 0.0_f64;
        for (ts, monto) in &promesa.pagos {
            let Some(ts_pago) = parse_timestamp(ts) else {
                continue;
            };
            if ts_pago >= fecha && ts_pago <= fin_ventana {
                monto_sum += monto;
                monto_max = monto_max.max(*monto);
            }
        }

        let monto_en_ventana = match modo {
            Modo::Acumulado => monto_sum,
            Modo::Estricto => monto_max,
        };
        let cumplida = monto_en_ventana >= promesa.monto_prometido.unwrap_or(0.0);
        if cumplida {
            continue;
        }

        incumplidas.push(PromesaIncumplida {
            cliente_id: promesa.cliente_id,
            promesa_id: promesa.promesa_id,
            fecha_promesa: promesa.fecha_promesa,
            monto_prometido: promesa.monto_prometido,
            monto_pagado_en_ventana: monto_en_ventana,
            dias_vencida: (hasta - fecha).num_days(),
        });
    }

    // Más vencidas primero; a igualdad, la promesa más antigua antes.
    incumplidas.sort_by(|a, b| {
        b.dias_vencida
            .cmp(&a.dias_vencida)
            .then_with(|| a.fecha_promesa.cmp(&b.fecha_promesa))
    });
    incumplidas
}

// ---------------------------------------------------------------------------
// Mejores horarios
// ---------------------------------------------------------------------------

/// Registro mínimo de una llamada para el ranking de franjas.
#[derive(Debug, Clone, Default)]
pub struct RegistroLlamada {
    pub dia_semana: Option<String>,
    pub hora_del_dia: Option<i64>,
    pub es_contacto: bool,
    pub resultado: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FranjaRankeada {
    pub dia: Option<String>,
    pub hora: Option<i64>,
    pub llamadas: u64,
    pub tasa_contacto: f64,
    pub tasa_exito: f64,
    pub score: f64,
}

/// Agrupa las llamadas por (día, hora), descarta franjas con menos de
/// `min_llamadas` y devuelve las `top_k` mejores por score ponderado
/// `alpha * tasa_exito + (1 - alpha) * tasa_contacto`.
pub fn mejores_horarios(
    llamadas: &[RegistroLlamada],
    min_llamadas: u64,
    top_k: usize,
    alpha: f64,
) -> Vec<FranjaRankeada> {
    let mut franjas: BTreeMap<(Option<String>, Option<i64>), (u64, u64, u64)> = BTreeMap::new();
    for l in llamadas {
        let grupo = franjas
            .entry((l.dia_semana.clone(), l.hora_del_dia))
            .or_default();
        grupo.0 += 1;
        if l.es_contacto {
            grupo.1 += 1;
        }
        if es_exito(l.resultado.as_deref()) {
            grupo.2 += 1;
        }
    }

    let mut ranking: Vec<FranjaRankeada> = franjas
        .into_iter()
        .filter(|(_, (total, _, _))| *total >= min_llamadas)
        .map(|((dia, hora), (total, contactos, exitos))| {
            let tasa_contacto = tasa(contactos, total);
            let tasa_exito = tasa(exitos, total);
            FranjaRankeada {
                dia,
                hora,
                llamadas: total,
                tasa_contacto,
                tasa_exito,
                score: alpha * tasa_exito + (1.0 - alpha) * tasa_contacto,
            }
        })
        .collect();

    // Score descendente, empates por número de llamadas descendente; el
    // BTreeMap de partida hace el resto del orden determinista.
    ranking.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.llamadas.cmp(&a.llamadas))
    });
    ranking.truncate(top_k);
    ranking
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fila(id: &str, tipo: &str, ts: &str) -> FilaTimeline {
        FilaTimeline {
            interaccion_id: id.to_string(),
            tipo: tipo.to_string(),
            timestamp: ts.to_string(),
            ..FilaTimeline::default()
        }
    }

    #[test]
    fn timeline_ordenado_ascendente_por_timestamp() {
        let filas = vec![
            fila("I3", "llamada_saliente", "2024-03-01T10:00:00"),
            fila("I1", "sms", "2024-01-01T10:00:00"),
            fila("I2", "pago_recibido", "2024-02-01T10:00:00"),
        ];
        let timeline = reconstruir_timeline(filas);
        let ids: Vec<&str> = timeline.iter().map(|e| e.interaccion_id.as_str()).collect();
        assert_eq!(ids, vec!["I1", "I2", "I3"]);
    }

    #[test]
    fn timeline_vacio_para_cliente_sin_interacciones() {
        assert!(reconstruir_timeline(Vec::new()).is_empty());
    }

    #[test]
    fn timeline_enriquece_solo_la_variante_pago() {
        let mut llamada = fila("L1", "llamada_saliente", "2024-01-01T10:00:00");
        llamada.monto = Some(99.0); // ruido: una llamada no tiene monto de pago
        llamada.promesa_id = Some("promesa:L1".to_string());
        llamada.monto_prometido = Some(100.0);
        llamada.pagos_ids = vec!["P2".to_string(), "P1".to_string()];
        llamada.pagos_timestamps = vec![
            "2024-01-10T09:00:00".to_string(),
            "2024-01-05T09:00:00".to_string(),
        ];
        llamada.pagos_montos = vec![50.0, 60.0];

        let mut pago = fila("P1", "pago_recibido", "2024-01-05T09:00:00");
        pago.monto = Some(60.0);
        pago.metodo_pago = Some("transferencia".to_string());
        pago.pago_completo = Some(false);

        let timeline = reconstruir_timeline(vec![llamada, pago]);

        let entrada_llamada = &timeline[0];
        assert_eq!(entrada_llamada.monto_pago, None);
        let promesa = entrada_llamada.promesa.as_ref().unwrap();
        assert_eq!(promesa.monto_prometido, Some(100.0));
        // Los pagos que cumplen quedan ordenados cronológicamente.
        let ids: Vec<&str> = entrada_llamada
            .pagos_que_cumplen
            .iter()
            .map(|p| p.id.as_str())
            .collect();
        assert_eq!(ids, vec!["P1", "P2"]);

        let entrada_pago = &timeline[1];
        assert_eq!(entrada_pago.monto_pago, Some(60.0));
        assert_eq!(entrada_pago.metodo_pago.as_deref(), Some("transferencia"));
        assert!(entrada_pago.promesa.is_none());
    }

    fn llamada_agente(
        dia: &str,
        hora: i64,
        contacto: bool,
        resultado: Option<&str>,
        duracion: i64,
    ) -> LlamadaDeAgente {
        LlamadaDeAgente {
            dia_semana: Some(dia.to_string()),
            hora_del_dia: Some(hora),
            es_contacto: contacto,
            resultado: resultado.map(str::to_string),
            duracion_segundos: duracion,
            promesa_id: None,
            promesa_cumplida: false,
        }
    }

    #[test]
    fn efectividad_escenario_de_referencia() {
        // 4 llamadas, 2 contactos, 1 promesa, duraciones [30,0,45,25].
        let llamadas = vec![
            llamada_agente("lunes", 10, true, Some("promesa_pago"), 30),
            llamada_agente("lunes", 10, false, Some("no_contesta"), 0),
            llamada_agente("martes", 16, true, Some("sin_acuerdo"), 45),
            llamada_agente("martes", 16, false, Some("no_contesta"), 25),
        ];
        let ef = efectividad_agente(&llamadas);
        assert_eq!(ef.resumen.total_llamadas, 4);
        assert_eq!(ef.resumen.tasa_contacto, 0.5);
        assert_eq!(ef.resumen.promesas, 1);
        assert_eq!(ef.resumen.tasa_promesa_sobre_llamadas, 0.25);
        assert_eq!(ef.resumen.duracion_media_seg, 25.0);
        // Sin promesas cumplidas la tasa es 0.0, nunca NaN.
        assert_eq!(ef.resumen.tasa_cumplimiento_sobre_promesas, 0.0);

        assert_eq!(ef.por_horario.len(), 2);
        let lunes = &ef.por_horario[0];
        assert_eq!(lunes.dia_semana.as_deref(), Some("lunes"));
        assert_eq!(lunes.llamadas, 2);
        assert_eq!(lunes.tasa_contacto, 0.5);
        assert_eq!(lunes.tasa_exito, 0.5); // solo la promesa_pago cuenta
    }

    #[test]
    fn efectividad_sin_llamadas_devuelve_ceros() {
        let ef = efectividad_agente(&[]);
        assert_eq!(ef.resumen, ResumenAgente::default());
        assert!(ef.por_horario.is_empty());
    }

    #[test]
    fn efectividad_cuenta_promesas_cumplidas_distintas() {
        let mut l1 = llamada_agente("lunes", 10, true, Some("promesa_pago"), 30);
        l1.promesa_id = Some("promesa:L1".to_string());
        l1.promesa_cumplida = true;
        let mut l2 = llamada_agente("lunes", 11, true, Some("promesa_pago"), 30);
        l2.promesa_id = Some("promesa:L2".to_string());
        l2.promesa_cumplida = false;

        let ef = efectividad_agente(&[l1, l2]);
        assert_eq!(ef.resumen.promesas, 2);
        assert_eq!(ef.resumen.promesas_cumplidas, 1);
        assert_eq!(ef.resumen.tasa_cumplimiento_sobre_promesas, 0.5);
    }

    fn promesa_c1() -> PromesaConPagos {
        PromesaConPagos {
            cliente_id: "C1".to_string(),
            promesa_id: "promesa:L1".to_string(),
            fecha_promesa: "2024-01-01T00:00:00".to_string(),
            monto_prometido: Some(100.0),
            pagos: vec![
                ("2024-01-05T09:00:00".to_string(), 60.0),
                ("2024-01-10T09:00:00".to_string(), 50.0),
            ],
        }
    }

    fn hasta(dia: &str) -> DateTime<Utc> {
        parse_timestamp(dia).unwrap()
    }

    #[test]
    fn promesa_cubierta_en_modo_acumulado_pero_no_estricto() {
        // Escenario de referencia: 60 + 50 = 110 >= 100, max = 60 < 100.
        let acumulado = detectar_promesas_incumplidas(
            vec![promesa_c1()],
            hasta("2024-02-01T00:00:00"),
            14,
            Modo::Acumulado,
        );
        assert!(acumulado.is_empty());

        let estricto = detectar_promesas_incumplidas(
            vec![promesa_c1()],
            hasta("2024-02-01T00:00:00"),
            14,
            Modo::Estricto,
        );
        assert_eq!(estricto.len(), 1);
        assert_eq!(estricto[0].monto_pagado_en_ventana, 60.0);
        assert_eq!(estricto[0].dias_vencida, 31);
    }

    #[test]
    fn promesa_en_o_despues_del_corte_queda_fuera() {
        let mut promesa = promesa_c1();
        promesa.pagos.clear();
        // fecha_promesa == hasta: el límite queda excluido.
        let resultado = detectar_promesas_incumplidas(
            vec![promesa],
            hasta("2024-01-01T00:00:00"),
            14,
            Modo::Acumulado,
        );
        assert!(resultado.is_empty());
    }

    #[test]
    fn ventana_incluye_su_ultimo_dia() {
        let mut promesa = promesa_c1();
        promesa.pagos = vec![("2024-01-15T00:00:00".to_string(), 100.0)];
        // Con ventana de 14 días el 15 de enero a las 00:00 aún cuenta.
        let resultado = detectar_promesas_incumplidas(
            vec![promesa],
            hasta("2024-02-01T00:00:00"),
            14,
            Modo::Acumulado,
        );
        assert!(resultado.is_empty());
    }

    #[test]
    fn pago_fuera_de_ventana_no_cuenta() {
        let mut promesa = promesa_c1();
        promesa.pagos = vec![("2024-01-16T00:00:01".to_string(), 500.0)];
        let resultado = detectar_promesas_incumplidas(
            vec![promesa],
            hasta("2024-02-01T00:00:00"),
            14,
            Modo::Acumulado,
        );
        assert_eq!(resultado.len(), 1);
        assert_eq!(resultado[0].monto_pagado_en_ventana, 0.0);
    }

    #[test]
    fn ventana_gigante_se_trata_como_ilimitada() {
        // Un valor extremo de ventana no debe desbordar la aritmética de
        // fechas: todos los pagos posteriores a la promesa cuentan.
        let resultado = detectar_promesas_incumplidas(
            vec![promesa_c1()],
            hasta("2024-02-01T00:00:00"),
            i64::MAX,
            Modo::Acumulado,
        );
        assert!(resultado.is_empty());

        let estricto = detectar_promesas_incumplidas(
            vec![promesa_c1()],
            hasta("2024-02-01T00:00:00"),
            i64::MAX,
            Modo::Estricto,
        );
        assert_eq!(estricto.len(), 1);
        assert_eq!(estricto[0].monto_pagado_en_ventana, 60.0);
    }

    #[test]
    fn monto_prometido_nulo_se_trata_como_cero() {
        let mut promesa = promesa_c1();
        promesa.monto_prometido = None;
        promesa.pagos.clear();
        // 0.0 >= 0.0: cumplida aun sin pagos.
        let resultado = detectar_promesas_incumplidas(
            vec![promesa],
            hasta("2024-02-01T00:00:00"),
            14,
            Modo::Acumulado,
        );
        assert!(resultado.is_empty());
    }

    #[test]
    fn incumplidas_ordenadas_por_dias_vencida_y_fecha() {
        let vieja = PromesaConPagos {
            cliente_id: "C2".to_string(),
            promesa_id: "promesa:L2".to_string(),
            fecha_promesa: "2023-12-01T00:00:00".to_string(),
            monto_prometido: Some(50.0),
            pagos: Vec::new(),
        };
        let reciente = PromesaConPagos {
            promesa_id: "promesa:L3".to_string(),
            fecha_promesa: "2024-01-20T00:00:00".to_string(),
            ..promesa_c1()
        };
        let mut sin_pagos = promesa_c1();
        sin_pagos.pagos.clear();

        let resultado = detectar_promesas_incumplidas(
            vec![reciente, sin_pagos, vieja],
            hasta("2024-02-01T00:00:00"),
            14,
            Modo::Acumulado,
        );
        let ids: Vec<&str> = resultado.iter().map(|p| p.promesa_id.as_str()).collect();
        assert_eq!(ids, vec!["promesa:L2", "promesa:L1", "promesa:L3"]);
    }

    #[test]
    fn estricto_nunca_reporta_menos_que_acumulado() {
        let promesas = vec![promesa_c1(), {
            let mut p = promesa_c1();
            p.promesa_id = "promesa:L9".to_string();
            p.pagos = vec![("2024-01-02T00:00:00".to_string(), 120.0)];
            p
        }];
        let corte = hasta("2024-02-01T00:00:00");
        let acumulado =
            detectar_promesas_incumplidas(promesas.clone(), corte, 14, Modo::Acumulado);
        let estricto = detectar_promesas_incumplidas(promesas, corte, 14, Modo::Estricto);
        assert!(estricto.len() >= acumulado.len());
    }

    fn registro(dia: &str, hora: i64, contacto: bool, resultado: &str) -> RegistroLlamada {
        RegistroLlamada {
            dia_semana: Some(dia.to_string()),
            hora_del_dia: Some(hora),
            es_contacto: contacto,
            resultado: Some(resultado.to_string()),
        }
    }

    #[test]
    fn horarios_respetan_minimo_topk_y_orden() {
        let mut llamadas = Vec::new();
        // martes 10h: 3 llamadas, todas contacto, 2 éxitos.
        llamadas.push(registro("martes", 10, true, "promesa_pago"));
        llamadas.push(registro("martes", 10, true, "pago_inmediato"));
        llamadas.push(registro("martes", 10, true, "no_contesta"));
        // jueves 16h: 2 llamadas, 1 contacto, 1 éxito.
        llamadas.push(registro("jueves", 16, true, "renegociacion"));
        llamadas.push(registro("jueves", 16, false, "no_contesta"));
        // viernes 9h: solo 1 llamada, queda bajo el mínimo.
        llamadas.push(registro("viernes", 9, true, "promesa_pago"));

        let ranking = mejores_horarios(&llamadas, 2, 20, 0.5);
        assert_eq!(ranking.len(), 2);
        assert!(ranking.iter().all(|f| f.llamadas >= 2));
        assert_eq!(ranking[0].dia.as_deref(), Some("martes"));
        assert!(ranking[0].score >= ranking[1].score);

        let solo_uno = mejores_horarios(&llamadas, 2, 1, 0.5);
        assert_eq!(solo_uno.len(), 1);
    }

    #[test]
    fn alpha_en_los_extremos_degenera_en_una_sola_tasa() {
        let llamadas = vec![
            registro("lunes", 10, true, "no_contesta"),
            registro("lunes", 10, false, "promesa_pago"),
        ];
        let solo_contacto = mejores_horarios(&llamadas, 1, 10, 0.0);
        assert_eq!(solo_contacto[0].score, solo_contacto[0].tasa_contacto);
        let solo_exito = mejores_horarios(&llamadas, 1, 10, 1.0);
        assert_eq!(solo_exito[0].score, solo_exito[0].tasa_exito);
    }

    #[test]
    fn empate_de_score_se_desempata_por_llamadas() {
        let mut llamadas = Vec::new();
        // Dos franjas con tasas idénticas pero distinto volumen.
        for _ in 0..4 {
            llamadas.push(registro("lunes", 9, true, "promesa_pago"));
        }
        for _ in 0..2 {
            llamadas.push(registro("martes", 15, true, "promesa_pago"));
        }
        let ranking = mejores_horarios(&llamadas, 1, 10, 0.5);
        assert_eq!(ranking[0].score, ranking[1].score);
        assert_eq!(ranking[0].dia.as_deref(), Some("lunes"));
        assert_eq!(ranking[0].llamadas, 4);
    }

    #[test]
    fn modo_from_str() {
        assert_eq!(Modo::from_str("acumulado").unwrap(), Modo::Acumulado);
        assert_eq!(Modo::from_str("estricto").unwrap(), Modo::Estricto);
        assert!(Modo::from_str("laxo").is_err());
    }
}
