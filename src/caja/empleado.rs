use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::EstadoDia;
use crate::decimal::Money;
use crate::types::{EmpleadoId, MovimientoId, TipoMovimiento};

/// deposits move cash from the employee pouch back into the house register
pub const CATEGORIA_DEPOSITO: &str = "deposito";

/// employee-scoped ledger entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovimientoCajaEmpleado {
    pub id: MovimientoId,
    pub fecha: NaiveDate,
    pub empleado_id: EmpleadoId,
    pub tipo: TipoMovimiento,
    pub monto: Money,
    pub categoria: String,
    pub descripcion: String,
}

/// daily reconciliation for one employee: what they collected, what they
/// earned and what they still owe the house
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumenCajaEmpleado {
    pub fecha: NaiveDate,
    pub empleado_id: EmpleadoId,
    pub ingresos_cobrados: Money,
    pub comision_ganada: Money,
    pub depositos: Money,
    pub saldo_esperado_entregar: Money,
    pub entregado: Option<Money>,
    pub cerrado: bool,
}

pub fn calcular_resumen(
    fecha: NaiveDate,
    empleado_id: EmpleadoId,
    ingresos_cobrados: Money,
    comision_ganada: Money,
    movimientos: &[&MovimientoCajaEmpleado],
    estado: &EstadoDia,
) -> ResumenCajaEmpleado {
    let depositos: Money = movimientos
        .iter()
        .filter(|m| m.categoria == CATEGORIA_DEPOSITO)
        .map(|m| m.monto)
        .sum();

    ResumenCajaEmpleado {
        fecha,
        empleado_id,
        ingresos_cobrados,
        comision_ganada,
        depositos,
        saldo_esperado_entregar: ingresos_cobrados + comision_ganada - depositos,
        entregado: estado.saldo_final,
        cerrado: estado.cerrado,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn deposito(monto: i64) -> MovimientoCajaEmpleado {
        MovimientoCajaEmpleado {
            id: 1,
            fecha: d(2024, 1, 8),
            empleado_id: 5,
            tipo: TipoMovimiento::Egreso,
            monto: Money::from_major(monto),
            categoria: CATEGORIA_DEPOSITO.to_string(),
            descripcion: String::new(),
        }
    }

    #[test]
    fn test_saldo_a_entregar() {
        let mov = deposito(1_000);
        let resumen = calcular_resumen(
            d(2024, 1, 8),
            5,
            Money::from_major(3_000),
            Money::from_major(60),
            &[&mov],
            &EstadoDia::default(),
        );

        assert_eq!(resumen.depositos, Money::from_major(1_000));
        assert_eq!(resumen.saldo_esperado_entregar, Money::from_major(2_060));
        assert!(!resumen.cerrado);
    }

    #[test]
    fn test_sin_depositos() {
        let resumen = calcular_resumen(
            d(2024, 1, 8),
            5,
            Money::from_major(3_000),
            Money::from_major(60),
            &[],
            &EstadoDia::default(),
        );
        assert_eq!(resumen.saldo_esperado_entregar, Money::from_major(3_060));
    }
}
