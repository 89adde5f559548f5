use chrono::{Duration, NaiveDate};

/// add days to a date
pub fn sumar_dias(fecha: NaiveDate, dias: i64) -> NaiveDate {
    fecha + Duration::days(dias)
}

/// maturity date of a loan: start plus term in days
pub fn fecha_vencimiento(fecha_inicio: NaiveDate, plazo_dias: u32) -> NaiveDate {
    sumar_dias(fecha_inicio, plazo_dias as i64)
}

/// inclusive date-range filter used by the commission and metrics reports
pub fn en_rango(fecha: NaiveDate, desde: Option<NaiveDate>, hasta: Option<NaiveDate>) -> bool {
    if let Some(d) = desde {
        if fecha < d {
            return false;
        }
    }
    if let Some(h) = hasta {
        if fecha > h {
            return false;
        }
    }
    true
}
