pub mod reportes;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::errors::{GestorError, Result};
use crate::model::{Empleado, Prestamo};
use crate::types::{BaseComision, ComisionId, EmpleadoId, PagoId, PrestamoId};

pub use reportes::{
    ComisionesDia, DetalleVendedor, DetalleVendedorPrestamo, EntradaRanking, RankingEmpleados,
    ResumenCobrador, ResumenVendedor,
};

/// seller origination commission, one per loan, written at approval
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrestamoVendedor {
    pub prestamo_id: PrestamoId,
    pub empleado_id: EmpleadoId,
    pub empleado_nombre: String,
    pub base_tipo: BaseComision,
    pub porcentaje: Decimal,
    pub monto_base: Money,
    pub monto_comision: Money,
    pub created_at: DateTime<Utc>,
}

impl PrestamoVendedor {
    /// compute the record for a loan approval. re-approving a loan builds a
    /// fresh record that replaces the previous one, the pair stays one-to-one.
    pub fn calcular(
        prestamo: &Prestamo,
        empleado: &Empleado,
        base_tipo: BaseComision,
        porcentaje: Decimal,
        created_at: DateTime<Utc>,
    ) -> Result<Self> {
        validar_porcentaje(porcentaje)?;

        let monto_base = match base_tipo {
            BaseComision::Total => prestamo.monto_total,
            BaseComision::Interes => prestamo.interes(),
        };

        Ok(Self {
            prestamo_id: prestamo.id,
            empleado_id: empleado.id,
            empleado_nombre: empleado.nombre.clone(),
            base_tipo,
            porcentaje,
            monto_base,
            monto_comision: monto_base.percentage(porcentaje),
            created_at,
        })
    }
}

/// per-payment commission record, used for both the collector and the
/// seller share of a payment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComisionPago {
    pub id: ComisionId,
    pub pago_id: PagoId,
    pub empleado_id: EmpleadoId,
    pub empleado_nombre: String,
    pub porcentaje: Decimal,
    pub monto_comision: Money,
    pub aprobado: bool,
    pub created_at: DateTime<Utc>,
}

/// commission earned over a single payment
pub fn comision_sobre_pago(monto: Money, porcentaje: Decimal) -> Result<Money> {
    validar_porcentaje(porcentaje)?;
    Ok(monto.percentage(porcentaje))
}

fn validar_porcentaje(porcentaje: Decimal) -> Result<()> {
    if porcentaje.is_sign_negative() || porcentaje > Decimal::from(100) {
        return Err(GestorError::InvalidPercentage { porcentaje });
    }
    Ok(())
}
