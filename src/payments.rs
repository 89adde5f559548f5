use chrono::NaiveDate;

use crate::decimal::Money;
use crate::errors::{GestorError, Result};
use crate::model::Prestamo;
use crate::types::EstadoPrestamo;

/// validate a payment against the loan before anything is persisted
pub fn validar_pago(prestamo: &Prestamo, monto: Money, hoy: NaiveDate) -> Result<()> {
    let estado = prestamo.derivar_estado(hoy);
    if estado.es_terminal() {
        return Err(GestorError::LoanClosed {
            id: prestamo.id,
            estado,
        });
    }
    if !monto.is_positive() {
        return Err(GestorError::InvalidAmount { monto });
    }
    if monto > prestamo.saldo_pendiente {
        // explicit rejection instead of clipping; the caller decides what
        // to tell the operator
        tracing::warn!(
            prestamo_id = prestamo.id,
            %monto,
            saldo_pendiente = %prestamo.saldo_pendiente,
            "pago rechazado por sobrepago"
        );
        return Err(GestorError::Overpayment {
            saldo_pendiente: prestamo.saldo_pendiente,
            monto,
        });
    }
    Ok(())
}

/// apply an already validated payment. `cuotas_pagadas` is the payment count
/// after the insert, kept in sync with `pagos.len()` so legacy consumers that
/// fall back to counting rows agree with the stored field.
pub fn aplicar_pago(prestamo: &mut Prestamo, monto: Money, cuotas_pagadas: u32) {
    prestamo.saldo_pendiente = (prestamo.saldo_pendiente - monto).max(Money::ZERO);
    prestamo.cuotas_pagadas = cuotas_pagadas;

    if prestamo.saldo_pendiente.is_zero() {
        prestamo.estado = EstadoPrestamo::Pagado;
        tracing::info!(prestamo_id = prestamo.id, "préstamo liquidado");
    } else if !prestamo.estado.es_terminal() {
        prestamo.estado = EstadoPrestamo::Activo;
    }
}

/// exact inverse of `aplicar_pago`: restores the balance, re-counts
/// installments and reopens a settled loan
pub fn revertir_pago(prestamo: &mut Prestamo, monto: Money, cuotas_pagadas: u32) {
    prestamo.saldo_pendiente += monto;
    prestamo.cuotas_pagadas = cuotas_pagadas;

    if prestamo.estado == EstadoPrestamo::Pagado && prestamo.saldo_pendiente.is_positive() {
        prestamo.estado = EstadoPrestamo::Activo;
    }
}
