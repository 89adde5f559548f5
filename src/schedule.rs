use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::dates::sumar_dias;
use crate::decimal::{Money, Rate};
use crate::errors::{GestorError, Result};
use crate::model::Prestamo;
use crate::types::{EstadoCuota, EstadoPrestamo, FrecuenciaPago};

/// one scheduled installment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cuota {
    pub numero: u32,
    pub fecha: NaiveDate,
    pub monto: Money,
}

/// generated payment plan for a loan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanPago {
    pub monto_total: Money,
    pub cuotas_totales: u32,
    pub valor_cuota: Money,
    pub cuotas: Vec<Cuota>,
}

/// installment row served to the amortization view, state derived at read time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmortizacionRow {
    pub numero: u32,
    pub fecha: NaiveDate,
    pub monto: Money,
    pub estado: EstadoCuota,
}

/// generate the installment plan for a loan.
///
/// the total owed is principal plus flat interest; installments split it
/// evenly and the LAST installment absorbs the cent rounding remainder, so
/// the rows always sum to `monto_total` exactly.
pub fn generar_plan(
    monto: Money,
    tasa_interes: Rate,
    plazo_dias: i64,
    frecuencia_pago: FrecuenciaPago,
    fecha_inicio: NaiveDate,
) -> Result<PlanPago> {
    if !monto.is_positive() {
        return Err(GestorError::InvalidPrincipal { monto });
    }
    if tasa_interes.is_negative() {
        return Err(GestorError::InvalidRate { tasa: tasa_interes });
    }
    if plazo_dias <= 0 {
        return Err(GestorError::InvalidTerm { plazo_dias });
    }

    let monto_total = monto.with_rate(tasa_interes);
    let cuotas_totales = frecuencia_pago.cuotas_para(plazo_dias as u32);
    let valor_cuota = monto_total / Decimal::from(cuotas_totales);

    let cuotas = filas_plan(
        monto_total,
        cuotas_totales,
        valor_cuota,
        frecuencia_pago,
        fecha_inicio,
    );

    Ok(PlanPago {
        monto_total,
        cuotas_totales,
        valor_cuota,
        cuotas,
    })
}

/// amortization table for a stored loan. tolerates legacy rows missing
/// `cuotas_totales` or `valor_cuota` by recomputing them from the term, the
/// same fallback the frontend applied client-side.
pub fn tabla_amortizacion(prestamo: &Prestamo, total_pagado: Money, hoy: NaiveDate) -> Vec<AmortizacionRow> {
    let cuotas_totales = if prestamo.cuotas_totales > 0 {
        prestamo.cuotas_totales
    } else {
        prestamo.frecuencia_pago.cuotas_para(prestamo.plazo_dias)
    };
    if cuotas_totales == 0 {
        return Vec::new();
    }

    let valor_cuota = if prestamo.valor_cuota.is_positive() {
        prestamo.valor_cuota
    } else {
        prestamo.monto_total / Decimal::from(cuotas_totales)
    };

    let filas = filas_plan(
        prestamo.monto_total,
        cuotas_totales,
        valor_cuota,
        prestamo.frecuencia_pago,
        prestamo.fecha_inicio,
    );

    let pagado_todo = prestamo.derivar_estado(hoy) == EstadoPrestamo::Pagado;
    let mut esperado_acumulado = Money::ZERO;

    filas
        .into_iter()
        .map(|cuota| {
            esperado_acumulado += cuota.monto;
            let estado = if pagado_todo || total_pagado >= esperado_acumulado {
                EstadoCuota::Pagado
            } else if cuota.fecha < hoy {
                EstadoCuota::Vencido
            } else {
                EstadoCuota::Pendiente
            };
            AmortizacionRow {
                numero: cuota.numero,
                fecha: cuota.fecha,
                monto: cuota.monto,
                estado,
            }
        })
        .collect()
}

fn filas_plan(
    monto_total: Money,
    cuotas_totales: u32,
    valor_cuota: Money,
    frecuencia_pago: FrecuenciaPago,
    fecha_inicio: NaiveDate,
) -> Vec<Cuota> {
    let paso = frecuencia_pago.paso_dias() as i64;
    let mut cuotas = Vec::with_capacity(cuotas_totales as usize);

    for numero in 1..=cuotas_totales {
        let monto = if numero == cuotas_totales {
            // remainder lands here
            monto_total - valor_cuota * Decimal::from(cuotas_totales - 1)
        } else {
            valor_cuota
        };
        cuotas.push(Cuota {
            numero,
            fecha: sumar_dias(fecha_inicio, numero as i64 * paso),
            monto,
        });
    }

    cuotas
}
