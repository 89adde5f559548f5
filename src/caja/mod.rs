pub mod empleado;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::types::{MovimientoId, TipoMovimiento};

pub use empleado::{MovimientoCajaEmpleado, ResumenCajaEmpleado, CATEGORIA_DEPOSITO};

pub const CATEGORIA_DESEMBOLSO: &str = "desembolso_prestamo";
pub const CATEGORIA_PAGO_CUOTA: &str = "pago_cuota";

/// one cash-ledger entry, append-only while the day is open
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovimientoCaja {
    pub id: MovimientoId,
    pub fecha: NaiveDate,
    pub tipo: TipoMovimiento,
    pub monto: Money,
    pub categoria: String,
    pub descripcion: String,
    pub referencia_tipo: Option<String>,
    pub referencia_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NuevoMovimiento {
    pub fecha: NaiveDate,
    pub tipo: TipoMovimiento,
    pub monto: Money,
    pub categoria: String,
    pub descripcion: String,
    pub referencia_tipo: Option<String>,
    pub referencia_id: Option<i64>,
}

/// persisted open/close state of one business day
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EstadoDia {
    pub cerrado: bool,
    pub saldo_final: Option<Money>,
}

/// daily reconciliation view for the admin register
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CierreCaja {
    pub fecha: NaiveDate,
    pub ingresos: Money,
    pub egresos: Money,
    pub comisiones_total: Money,
    pub saldo_esperado: Money,
    pub saldo_final: Option<Money>,
    pub cerrado: bool,
}

/// reconcile a day against its movement rows. the expected balance is what
/// the register should hold after paying out the day's commissions:
/// ingresos - egresos - comisiones.
pub fn calcular_cierre(
    fecha: NaiveDate,
    movimientos: &[&MovimientoCaja],
    comisiones_total: Money,
    estado: &EstadoDia,
) -> CierreCaja {
    let ingresos: Money = movimientos
        .iter()
        .filter(|m| m.tipo == TipoMovimiento::Ingreso)
        .map(|m| m.monto)
        .sum();
    let egresos: Money = movimientos
        .iter()
        .filter(|m| m.tipo == TipoMovimiento::Egreso)
        .map(|m| m.monto)
        .sum();

    CierreCaja {
        fecha,
        ingresos,
        egresos,
        comisiones_total,
        saldo_esperado: ingresos - egresos - comisiones_total,
        saldo_final: estado.saldo_final,
        cerrado: estado.cerrado,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn mov(id: i64, tipo: TipoMovimiento, monto: i64) -> MovimientoCaja {
        MovimientoCaja {
            id,
            fecha: d(2024, 1, 8),
            tipo,
            monto: Money::from_major(monto),
            categoria: "otros".to_string(),
            descripcion: String::new(),
            referencia_tipo: None,
            referencia_id: None,
        }
    }

    #[test]
    fn test_saldo_esperado() {
        let a = mov(1, TipoMovimiento::Ingreso, 3_000);
        let b = mov(2, TipoMovimiento::Ingreso, 500);
        let c = mov(3, TipoMovimiento::Egreso, 1_000);
        let cierre = calcular_cierre(
            d(2024, 1, 8),
            &[&a, &b, &c],
            Money::from_major(200),
            &EstadoDia::default(),
        );

        assert_eq!(cierre.ingresos, Money::from_major(3_500));
        assert_eq!(cierre.egresos, Money::from_major(1_000));
        assert_eq!(cierre.saldo_esperado, Money::from_major(2_300));
        assert!(!cierre.cerrado);
        assert_eq!(cierre.saldo_final, None);
    }

    #[test]
    fn test_dia_sin_movimientos() {
        let cierre = calcular_cierre(d(2024, 1, 8), &[], Money::ZERO, &EstadoDia::default());
        assert_eq!(cierre.saldo_esperado, Money::ZERO);
    }
}
