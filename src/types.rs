use serde::{Deserialize, Serialize};

/// relational-style identifiers, assigned by the store
pub type ClienteId = i64;
pub type PrestamoId = i64;
pub type PagoId = i64;
pub type EmpleadoId = i64;
pub type MovimientoId = i64;
pub type ComisionId = i64;

/// payment frequency of a loan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrecuenciaPago {
    Semanal,
    Mensual,
    Diario,
}

impl FrecuenciaPago {
    /// days between consecutive installments
    pub fn paso_dias(&self) -> u32 {
        match self {
            FrecuenciaPago::Semanal => 7,
            FrecuenciaPago::Mensual => 30,
            FrecuenciaPago::Diario => 1,
        }
    }

    /// number of installments for a term, rounding the last partial period up
    pub fn cuotas_para(&self, plazo_dias: u32) -> u32 {
        let paso = self.paso_dias();
        plazo_dias.div_ceil(paso)
    }
}

/// loan state; `vencido` survives in legacy rows, the unified derivation
/// emits `impago` for term-elapsed loans with balance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EstadoPrestamo {
    Activo,
    Pagado,
    Impago,
    Vencido,
    Refinanciado,
}

impl EstadoPrestamo {
    /// terminal states accept no further payments
    pub fn es_terminal(&self) -> bool {
        matches!(self, EstadoPrestamo::Pagado | EstadoPrestamo::Refinanciado)
    }
}

/// derived installment state, wire values capitalized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EstadoCuota {
    Pendiente,
    Pagado,
    Vencido,
}

/// cash-ledger movement direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TipoMovimiento {
    Ingreso,
    Egreso,
}

/// base over which the seller commission is computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaseComision {
    /// principal plus interest
    Total,
    /// interest only
    Interes,
}

/// employee position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Puesto {
    Cobrador,
    Vendedor,
    Otro,
}

/// system role mapped from the employee position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rol {
    Admin,
    Vendedor,
    Cobrador,
}

impl From<Puesto> for Rol {
    fn from(puesto: Puesto) -> Self {
        match puesto {
            Puesto::Cobrador => Rol::Cobrador,
            Puesto::Vendedor => Rol::Vendedor,
            Puesto::Otro => Rol::Admin,
        }
    }
}
