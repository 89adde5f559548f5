use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{ComisionPago, PrestamoVendedor};
use crate::decimal::Money;
use crate::types::{ClienteId, EmpleadoId, EstadoPrestamo, PrestamoId};

/// expected vs collected seller commissions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumenVendedor {
    pub comisiones_esperadas: Money,
    pub comisiones_cobradas: Money,
    pub comisiones_pendientes: Money,
    pub porcentaje_cobrado: Decimal,
}

/// collector commissions are purely historical, there is no expected side
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumenCobrador {
    pub comisiones_cobradas: Money,
    pub cantidad_pagos: usize,
    pub promedio_por_pago: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetalleVendedorPrestamo {
    pub prestamo_id: PrestamoId,
    pub cliente_id: ClienteId,
    pub monto_prestamo: Money,
    pub monto_total: Money,
    pub cuotas_totales: u32,
    pub cuotas_pagadas: u32,
    pub estado: EstadoPrestamo,
    pub porcentaje_vendedor: Decimal,
    pub comision_esperada: Money,
    pub comision_cobrada: Money,
    pub comision_pendiente: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetalleVendedor {
    pub empleado_id: EmpleadoId,
    pub nombre: String,
    pub prestamos: Vec<DetalleVendedorPrestamo>,
    pub comision_esperada_total: Money,
    pub comision_cobrada_total: Money,
    pub comision_pendiente_total: Money,
}

/// commission totals for one day of payments
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComisionesDia {
    pub fecha: NaiveDate,
    pub total_pagos_cobrados: Money,
    pub vendedor: Money,
    pub cobrador: Money,
    pub total: Money,
    pub ingreso_neto: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntradaRanking {
    pub empleado_id: EmpleadoId,
    pub nombre: String,
    pub total_comisiones: Money,
    pub cantidad_pagos: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingEmpleados {
    pub vendedores: Vec<EntradaRanking>,
    pub cobradores: Vec<EntradaRanking>,
}

/// summarize seller commissions; the caller pre-filters by seller and by
/// payment date window
pub fn resumen_vendedor(
    esperadas: &[&PrestamoVendedor],
    cobradas: &[&ComisionPago],
) -> ResumenVendedor {
    let comisiones_esperadas: Money = esperadas.iter().map(|pv| pv.monto_comision).sum();
    let comisiones_cobradas: Money = cobradas.iter().map(|c| c.monto_comision).sum();
    let comisiones_pendientes = comisiones_esperadas - comisiones_cobradas;

    let porcentaje_cobrado = if comisiones_esperadas.is_positive() {
        (comisiones_cobradas.as_decimal() / comisiones_esperadas.as_decimal()
            * Decimal::from(100))
        .round_dp(2)
    } else {
        Decimal::ZERO
    };

    ResumenVendedor {
        comisiones_esperadas,
        comisiones_cobradas,
        comisiones_pendientes,
        porcentaje_cobrado,
    }
}

pub fn resumen_cobrador(cobradas: &[&ComisionPago]) -> ResumenCobrador {
    let comisiones_cobradas: Money = cobradas.iter().map(|c| c.monto_comision).sum();
    let cantidad_pagos = cobradas.len();
    let promedio_por_pago = if cantidad_pagos > 0 {
        comisiones_cobradas / Decimal::from(cantidad_pagos as u64)
    } else {
        Money::ZERO
    };

    ResumenCobrador {
        comisiones_cobradas,
        cantidad_pagos,
        promedio_por_pago,
    }
}

pub fn comisiones_dia(
    fecha: NaiveDate,
    total_pagos_cobrados: Money,
    vendedor: Money,
    cobrador: Money,
) -> ComisionesDia {
    let total = vendedor + cobrador;
    ComisionesDia {
        fecha,
        total_pagos_cobrados,
        vendedor,
        cobrador,
        total,
        ingreso_neto: total_pagos_cobrados - total,
    }
}

/// group per-payment commissions by employee, ordered by total descending.
/// totals equal the sum of the individual rows for the same window.
pub fn ranking(registros: &[&ComisionPago]) -> Vec<EntradaRanking> {
    let mut entradas: Vec<EntradaRanking> = Vec::new();

    for registro in registros {
        match entradas
            .iter_mut()
            .find(|e| e.empleado_id == registro.empleado_id)
        {
            Some(entrada) => {
                entrada.total_comisiones += registro.monto_comision;
                entrada.cantidad_pagos += 1;
            }
            None => entradas.push(EntradaRanking {
                empleado_id: registro.empleado_id,
                nombre: registro.empleado_nombre.clone(),
                total_comisiones: registro.monto_comision,
                cantidad_pagos: 1,
            }),
        }
    }

    entradas.sort_by(|a, b| b.total_comisiones.cmp(&a.total_comisiones));
    entradas
}
