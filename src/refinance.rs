use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::dates::fecha_vencimiento;
use crate::decimal::{Money, Rate};
use crate::errors::{GestorError, Result};
use crate::model::Prestamo;
use crate::types::{EstadoPrestamo, FrecuenciaPago};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolicitudRefinanciacion {
    /// percentage points added over the outstanding balance
    pub interes_adicional: Decimal,
    pub cuotas: i64,
    pub frecuencia_pago: FrecuenciaPago,
    pub fecha_inicio: NaiveDate,
}

/// fully computed terms for the replacement loan. the additional interest is
/// folded into the new principal, so `monto_total == monto` and the nominal
/// `tasa_interes` is informational only and never compounds again.
#[derive(Debug, Clone)]
pub struct TerminosRefinanciacion {
    pub monto: Money,
    pub monto_total: Money,
    pub tasa_interes: Rate,
    pub plazo_dias: u32,
    pub frecuencia_pago: FrecuenciaPago,
    pub cuotas_totales: u32,
    pub valor_cuota: Money,
    pub fecha_inicio: NaiveDate,
    pub fecha_vencimiento: NaiveDate,
}

/// validate the source loan and compute the replacement terms. nothing is
/// mutated here; the engine commits both sides only after this succeeds.
pub fn preparar(
    origen: &Prestamo,
    solicitud: &SolicitudRefinanciacion,
    hoy: NaiveDate,
) -> Result<TerminosRefinanciacion> {
    let estado = origen.derivar_estado(hoy);
    if estado == EstadoPrestamo::Refinanciado {
        return Err(GestorError::LoanClosed {
            id: origen.id,
            estado,
        });
    }
    if !origen.saldo_pendiente.is_positive() {
        return Err(GestorError::NothingToRefinance { id: origen.id });
    }
    if solicitud.interes_adicional.is_sign_negative() {
        return Err(GestorError::InvalidRate {
            tasa: Rate::from_percentage(solicitud.interes_adicional),
        });
    }
    if solicitud.cuotas <= 0 {
        return Err(GestorError::InvalidTerm {
            plazo_dias: solicitud.cuotas,
        });
    }

    let tasa = Rate::from_percentage(solicitud.interes_adicional);
    let monto = origen.saldo_pendiente.with_rate(tasa);
    let cuotas_totales = solicitud.cuotas as u32;
    let plazo_dias = cuotas_totales * solicitud.frecuencia_pago.paso_dias();

    Ok(TerminosRefinanciacion {
        monto,
        monto_total: monto,
        tasa_interes: tasa,
        plazo_dias,
        frecuencia_pago: solicitud.frecuencia_pago,
        cuotas_totales,
        valor_cuota: monto / Decimal::from(cuotas_totales),
        fecha_inicio: solicitud.fecha_inicio,
        fecha_vencimiento: fecha_vencimiento(solicitud.fecha_inicio, plazo_dias),
    })
}
