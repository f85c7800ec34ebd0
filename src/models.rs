//! Modelos de dominio: dataset de entrada y entidades del grafo de cobranzas
//! (:Cliente, :Agente, :Deuda, :Interaccion, :Promesa, :PlanRenegociacion).

use anyhow::{bail, Result};
use chrono::{DateTime, Datelike, NaiveDateTime, Timelike, Utc, Weekday};
use serde::Deserialize;

/// Resultados de llamada con semántica propia en las analíticas.
pub const RESULTADO_PROMESA: &str = "promesa_pago";
pub const RESULTADO_PAGO_INMEDIATO: &str = "pago_inmediato";
pub const RESULTADO_RENEGOCIACION: &str = "renegociacion";

/// Valor del campo `tipo` de los pagos, usado como filtro en varias consultas.
pub const TIPO_PAGO: &str = "pago_recibido";

// --- Identificadores derivados ---
// La ingesta y las consultas deben coincidir en la identidad de los nodos
// derivados sin tabla de correspondencia; por eso la derivación vive aquí.

/// Id de la deuda de un cliente: `<cliente_id>:<tipo_deuda>`.
pub fn deuda_id(cliente_id: &str, tipo_deuda: Option<&str>) -> String {
    format!("{}:{}", cliente_id, tipo_deuda.unwrap_or("desconocida"))
}

/// Id de la promesa generada por una llamada: `promesa:<llamada_id>`.
pub fn promesa_id(llamada_id: &str) -> String {
    format!("promesa:{llamada_id}")
}

/// Id del plan generado por una llamada de renegociación: `plan:<llamada_id>`.
pub fn plan_id(llamada_id: &str) -> String {
    format!("plan:{llamada_id}")
}

// --- Fechas ---

/// Interpreta un timestamp del dataset o del grafo. Acepta RFC 3339 con
/// offset o fecha-hora "naive", que se asume UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

fn deserialize_fecha<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_timestamp(&s)
        .ok_or_else(|| serde::de::Error::custom(format!("timestamp inválido: {s}")))
}

fn deserialize_fecha_opcional<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(s) => parse_timestamp(&s)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("timestamp inválido: {s}"))),
    }
}

/// Día de la semana en minúsculas, tal como se guarda en `dia_semana`.
pub fn dia_semana(ts: &DateTime<Utc>) -> &'static str {
    match ts.weekday() {
        Weekday::Mon => "lunes",
        Weekday::Tue => "martes",
        Weekday::Wed => "miercoles",
        Weekday::Thu => "jueves",
        Weekday::Fri => "viernes",
        Weekday::Sat => "sabado",
        Weekday::Sun => "domingo",
    }
}

/// Hora del día (0-23) almacenada en `hora_del_dia`.
pub fn hora_del_dia(ts: &DateTime<Utc>) -> i64 {
    i64::from(ts.hour())
}

// --- Dataset de ingesta ---

#[derive(Debug, Clone, Deserialize)]
pub struct Metadata {
    pub total_clientes: i64,
    pub total_interacciones: i64,
    pub periodo: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Cliente {
    pub id: String,
    pub nombre: String,
    pub monto_deuda_inicial: i64,
    #[serde(default)]
    pub telefono: Option<String>,
    #[serde(default)]
    pub tipo_deuda: Option<String>,
    #[serde(default)]
    pub fecha_prestamo: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum TipoLlamada {
    #[serde(rename = "llamada_saliente")]
    Saliente,
    #[serde(rename = "llamada_entrante")]
    Entrante,
}

impl TipoLlamada {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Saliente => "llamada_saliente",
            Self::Entrante => "llamada_entrante",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentimiento {
    Cooperativo,
    Neutral,
    Frustrado,
    Hostil,
    #[serde(rename = "n/a")]
    NoAplica,
}

impl Sentimiento {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cooperativo => "cooperativo",
            Self::Neutral => "neutral",
            Self::Frustrado => "frustrado",
            Self::Hostil => "hostil",
            Self::NoAplica => "n/a",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Renegociacion {
    pub cuotas: i64,
    pub monto_mensual: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Llamada {
    pub tipo: TipoLlamada,
    pub id: String,
    pub cliente_id: String,
    #[serde(deserialize_with = "deserialize_fecha")]
    pub timestamp: DateTime<Utc>,
    pub duracion_segundos: i64,
    pub agente_id: String,
    pub resultado: String,
    pub sentimiento: Sentimiento,
    #[serde(default)]
    pub es_contacto: Option<bool>,
    pub monto_prometido: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_fecha_opcional")]
    pub fecha_promesa: Option<DateTime<Utc>>,
    #[serde(default)]
    pub nuevo_plan_pago: Option<Renegociacion>,
    #[serde(default)]
    pub dia_semana: Option<String>,
    #[serde(default)]
    pub hora_del_dia: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetodoPago {
    Transferencia,
    Tarjeta,
    Efectivo,
}

impl MetodoPago {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transferencia => "transferencia",
            Self::Tarjeta => "tarjeta",
            Self::Efectivo => "efectivo",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum TipoPago {
    #[serde(rename = "pago_recibido")]
    PagoRecibido,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Pago {
    pub tipo: TipoPago,
    pub id: String,
    pub cliente_id: String,
    #[serde(deserialize_with = "deserialize_fecha")]
    pub timestamp: DateTime<Utc>,
    pub monto: f64,
    pub metodo_pago: MetodoPago,
    pub pago_completo: bool,
    #[serde(default)]
    pub dia_semana: Option<String>,
    #[serde(default)]
    pub hora_del_dia: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TipoMensaje {
    Email,
    Sms,
}

impl TipoMensaje {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Sms => "sms",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Mensaje {
    pub tipo: TipoMensaje,
    pub id: String,
    pub cliente_id: String,
    #[serde(deserialize_with = "deserialize_fecha")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub asunto: Option<String>,
    #[serde(default)]
    pub dia_semana: Option<String>,
    #[serde(default)]
    pub hora_del_dia: Option<i64>,
}

/// Interacción polimórfica. El campo `tipo` de cada variante actúa como
/// discriminador, igual que la unión discriminada del dataset original.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Interaccion {
    Llamada(Llamada),
    Pago(Pago),
    Mensaje(Mensaje),
}

impl Interaccion {
    pub fn id(&self) -> &str {
        match self {
            Self::Llamada(l) => &l.id,
            Self::Pago(p) => &p.id,
            Self::Mensaje(m) => &m.id,
        }
    }

    pub fn cliente_id(&self) -> &str {
        match self {
            Self::Llamada(l) => &l.cliente_id,
            Self::Pago(p) => &p.cliente_id,
            Self::Mensaje(m) => &m.cliente_id,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Llamada(l) => l.timestamp,
            Self::Pago(p) => p.timestamp,
            Self::Mensaje(m) => m.timestamp,
        }
    }

    /// Día de la semana declarado en el registro, si lo trae.
    pub fn dia_semana(&self) -> Option<&str> {
        match self {
            Self::Llamada(l) => l.dia_semana.as_deref(),
            Self::Pago(p) => p.dia_semana.as_deref(),
            Self::Mensaje(m) => m.dia_semana.as_deref(),
        }
    }

    /// Hora del día declarada en el registro, si la trae.
    pub fn hora_del_dia(&self) -> Option<i64> {
        match self {
            Self::Llamada(l) => l.hora_del_dia,
            Self::Pago(p) => p.hora_del_dia,
            Self::Mensaje(m) => m.hora_del_dia,
        }
    }

    /// Valor del campo `tipo` tal como se guarda en el nodo.
    pub fn tipo(&self) -> &'static str {
        match self {
            Self::Llamada(l) => l.tipo.as_str(),
            Self::Pago(_) => TIPO_PAGO,
            Self::Mensaje(m) => m.tipo.as_str(),
        }
    }
}

/// Dataset plano de entrada de la ingesta.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Dataset {
    pub metadata: Metadata,
    pub clientes: Vec<Cliente>,
    pub interacciones: Vec<Interaccion>,
}

impl Dataset {
    /// Comprueba los rangos numéricos antes de escribir nada en el grafo.
    pub fn validar(&self) -> Result<()> {
        for c in &self.clientes {
            if c.monto_deuda_inicial < 0 {
                bail!(
                    "Cliente {}: monto_deuda_inicial negativo ({})",
                    c.id,
                    c.monto_deuda_inicial
                );
            }
        }
        for i in &self.interacciones {
            match i {
                Interaccion::Llamada(l) if l.duracion_segundos < 0 => {
                    bail!(
                        "Llamada {}: duracion_segundos negativa ({})",
                        l.id,
                        l.duracion_segundos
                    );
                }
                Interaccion::Pago(p) if p.monto <= 0.0 => {
                    bail!("Pago {}: monto debe ser positivo ({})", p.id, p.monto);
                }
                _ => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_derivados() {
        assert_eq!(deuda_id("C1", Some("hipotecaria")), "C1:hipotecaria");
        assert_eq!(deuda_id("C1", None), "C1:desconocida");
        assert_eq!(promesa_id("L42"), "promesa:L42");
        assert_eq!(plan_id("L42"), "plan:L42");
    }

    #[test]
    fn parse_timestamp_acepta_rfc3339_y_naive() {
        let con_offset = parse_timestamp("2024-01-01T10:00:00+00:00").unwrap();
        let naive = parse_timestamp("2024-01-01T10:00:00").unwrap();
        assert_eq!(con_offset, naive);
        assert!(parse_timestamp("no-es-fecha").is_none());
    }

    #[test]
    fn dia_y_hora_derivados() {
        // 2024-01-01 fue lunes.
        let ts = parse_timestamp("2024-01-01T18:30:00").unwrap();
        assert_eq!(dia_semana(&ts), "lunes");
        assert_eq!(hora_del_dia(&ts), 18);
    }

    #[test]
    fn interaccion_se_discrimina_por_tipo() {
        let json = r#"[
            {"tipo": "llamada_saliente", "id": "L1", "cliente_id": "C1",
             "timestamp": "2024-01-01T10:00:00", "duracion_segundos": 30,
             "agente_id": "A1", "resultado": "promesa_pago",
             "sentimiento": "cooperativo", "monto_prometido": 100.0,
             "fecha_promesa": "2024-01-01T00:00:00"},
            {"tipo": "pago_recibido", "id": "P1", "cliente_id": "C1",
             "timestamp": "2024-01-05T09:00:00", "monto": 60.0,
             "metodo_pago": "transferencia", "pago_completo": false},
            {"tipo": "sms", "id": "M1", "cliente_id": "C1",
             "timestamp": "2024-01-06T09:00:00"}
        ]"#;
        let parsed: Vec<Interaccion> = serde_json::from_str(json).unwrap();
        assert!(matches!(parsed[0], Interaccion::Llamada(_)));
        assert!(matches!(parsed[1], Interaccion::Pago(_)));
        assert!(matches!(parsed[2], Interaccion::Mensaje(_)));
        assert_eq!(parsed[0].tipo(), "llamada_saliente");
        assert_eq!(parsed[1].tipo(), "pago_recibido");
        assert_eq!(parsed[2].cliente_id(), "C1");
    }

    #[test]
    fn interaccion_acepta_dia_y_hora_declarados() {
        // Los datasets originales ya traen dia_semana y hora_del_dia
        // precalculados; el parser los conserva en lugar de rechazarlos.
        let json = r#"{"tipo": "llamada_saliente", "id": "L1", "cliente_id": "C1",
             "timestamp": "2024-01-01T10:00:00", "duracion_segundos": 30,
             "agente_id": "A1", "resultado": "sin_respuesta",
             "sentimiento": "n/a", "monto_prometido": null,
             "dia_semana": "lunes", "hora_del_dia": 10}"#;
        let parsed: Interaccion = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.dia_semana(), Some("lunes"));
        assert_eq!(parsed.hora_del_dia(), Some(10));

        let sin_campos = r#"{"tipo": "sms", "id": "M1", "cliente_id": "C1",
             "timestamp": "2024-01-06T09:00:00"}"#;
        let parsed: Interaccion = serde_json::from_str(sin_campos).unwrap();
        assert_eq!(parsed.dia_semana(), None);
        assert_eq!(parsed.hora_del_dia(), None);
    }

    #[test]
    fn validar_rechaza_montos_invalidos() {
        let json = r#"{
            "metadata": {"total_clientes": 1, "total_interacciones": 1, "periodo": "2024-01"},
            "clientes": [{"id": "C1", "nombre": "Ana", "monto_deuda_inicial": 1000}],
            "interacciones": [
                {"tipo": "pago_recibido", "id": "P1", "cliente_id": "C1",
                 "timestamp": "2024-01-05T09:00:00", "monto": 0.0,
                 "metodo_pago": "tarjeta", "pago_completo": false}
            ]
        }"#;
        let dataset: Dataset = serde_json::from_str(json).unwrap();
        assert!(dataset.validar().is_err());
    }
}
