use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::dates::sumar_dias;
use crate::decimal::Money;
use crate::model::{Cliente, Pago, Prestamo};
use crate::schedule::tabla_amortizacion;
use crate::types::{ClienteId, EstadoCuota, EstadoPrestamo, PrestamoId};

/// portfolio summary for the dashboard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumenGeneral {
    pub total_clientes: usize,
    pub total_prestamos: usize,
    pub total_pagos: usize,
    pub monto_total_prestado: Money,
    pub monto_total_recaudado: Money,
    pub monto_total_esperado: Money,
    pub saldo_pendiente_total: Money,
    pub prestamos_activos: usize,
    pub prestamos_vencidos: usize,
    pub pagos_hoy: usize,
    /// collected over expected, capped at 1.0
    pub tasa_recaudo: Decimal,
    pub average_loan_size: Money,
    pub ticket_promedio_pago: Money,
    pub clientes_activos: usize,
}

pub fn resumen_general(
    total_clientes: usize,
    prestamos: &[&Prestamo],
    pagos: &[&Pago],
    hoy: NaiveDate,
) -> ResumenGeneral {
    let total_prestamos = prestamos.len();
    let total_pagos = pagos.len();

    let monto_total_prestado: Money = prestamos.iter().map(|p| p.monto).sum();
    let monto_total_recaudado: Money = pagos.iter().map(|p| p.monto).sum();
    let monto_total_esperado: Money = prestamos.iter().map(|p| p.monto_total).sum();
    let saldo_pendiente_total: Money = prestamos.iter().map(|p| p.saldo_pendiente).sum();

    let prestamos_activos = prestamos
        .iter()
        .filter(|p| p.derivar_estado(hoy) == EstadoPrestamo::Activo)
        .count();
    let prestamos_vencidos = prestamos
        .iter()
        .filter(|p| p.saldo_pendiente.is_positive() && p.fecha_vencimiento < hoy)
        .count();
    let pagos_hoy = pagos.iter().filter(|p| p.fecha_pago == hoy).count();

    let tasa_recaudo = if monto_total_esperado.is_positive() {
        (monto_total_recaudado.as_decimal() / monto_total_esperado.as_decimal())
            .min(Decimal::ONE)
            .round_dp(4)
    } else {
        Decimal::ZERO
    };

    let average_loan_size = if total_prestamos > 0 {
        monto_total_prestado / Decimal::from(total_prestamos as u64)
    } else {
        Money::ZERO
    };
    let ticket_promedio_pago = if total_pagos > 0 {
        monto_total_recaudado / Decimal::from(total_pagos as u64)
    } else {
        Money::ZERO
    };

    let clientes_activos: BTreeSet<ClienteId> = prestamos
        .iter()
        .filter(|p| p.saldo_pendiente.is_positive())
        .map(|p| p.cliente_id)
        .collect();

    ResumenGeneral {
        total_clientes,
        total_prestamos,
        total_pagos,
        monto_total_prestado,
        monto_total_recaudado,
        monto_total_esperado,
        saldo_pendiente_total,
        prestamos_activos,
        prestamos_vencidos,
        pagos_hoy,
        tasa_recaudo,
        average_loan_size,
        ticket_promedio_pago,
        clientes_activos: clientes_activos.len(),
    }
}

/// pending installment inside the lookahead window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CuotaPorVencer {
    pub prestamo_id: PrestamoId,
    pub cliente_id: ClienteId,
    pub numero: u32,
    pub fecha: NaiveDate,
    pub monto: Money,
}

/// pending installments due between today and today + dias, inclusive.
/// `dias = 0` is the due-today view.
pub fn cuotas_por_vencer(
    prestamos: &[(&Prestamo, Money)],
    hoy: NaiveDate,
    dias: i64,
) -> Vec<CuotaPorVencer> {
    let limite = sumar_dias(hoy, dias);
    let mut resultado = Vec::new();

    for (prestamo, total_pagado) in prestamos {
        if prestamo.derivar_estado(hoy).es_terminal() {
            continue;
        }
        for fila in tabla_amortizacion(prestamo, *total_pagado, hoy) {
            if fila.estado == EstadoCuota::Pendiente && fila.fecha >= hoy && fila.fecha <= limite {
                resultado.push(CuotaPorVencer {
                    prestamo_id: prestamo.id,
                    cliente_id: prestamo.cliente_id,
                    numero: fila.numero,
                    fecha: fila.fecha,
                    monto: fila.monto,
                });
            }
        }
    }

    resultado.sort_by_key(|c| (c.fecha, c.prestamo_id, c.numero));
    resultado
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopCliente {
    pub cliente_id: ClienteId,
    pub nombre: String,
    pub total_prestado: Money,
    pub cantidad_prestamos: usize,
}

/// clients ranked by total principal borrowed
pub fn top_clientes(
    clientes: &[&Cliente],
    prestamos: &[&Prestamo],
    limite: usize,
) -> Vec<TopCliente> {
    let mut entradas: Vec<TopCliente> = clientes
        .iter()
        .map(|cliente| {
            let del_cliente: Vec<&&Prestamo> = prestamos
                .iter()
                .filter(|p| p.cliente_id == cliente.id)
                .collect();
            TopCliente {
                cliente_id: cliente.id,
                nombre: cliente.nombre.clone(),
                total_prestado: del_cliente.iter().map(|p| p.monto).sum(),
                cantidad_prestamos: del_cliente.len(),
            }
        })
        .filter(|t| t.cantidad_prestamos > 0)
        .collect();

    entradas.sort_by(|a, b| b.total_prestado.cmp(&a.total_prestado));
    entradas.truncate(limite);
    entradas
}
