use chrono::NaiveDate;
use thiserror::Error;

use crate::decimal::{Money, Rate};
use crate::types::{EstadoPrestamo, PagoId, PrestamoId};

/// engine error taxonomy; `status_code` gives the HTTP mapping the REST
/// layer must surface, `detail` strings are the machine-readable payload
#[derive(Error, Debug)]
pub enum GestorError {
    #[error("monto de préstamo inválido: {monto}")]
    InvalidPrincipal { monto: Money },

    #[error("tasa de interés inválida: {tasa}")]
    InvalidRate { tasa: Rate },

    #[error("plazo o número de cuotas inválido: {plazo_dias}")]
    InvalidTerm { plazo_dias: i64 },

    #[error("monto de pago inválido: {monto}")]
    InvalidAmount { monto: Money },

    #[error("porcentaje de comisión inválido: {porcentaje}")]
    InvalidPercentage { porcentaje: rust_decimal::Decimal },

    #[error("cliente no encontrado: {id}")]
    ClienteNotFound { id: i64 },

    #[error("préstamo no encontrado: {id}")]
    PrestamoNotFound { id: PrestamoId },

    #[error("pago no encontrado: {id}")]
    PagoNotFound { id: PagoId },

    #[error("empleado no encontrado: {id}")]
    EmpleadoNotFound { id: i64 },

    #[error("el préstamo {id} está cerrado: estado {estado:?}")]
    LoanClosed {
        id: PrestamoId,
        estado: EstadoPrestamo,
    },

    #[error("el pago {monto} excede el saldo pendiente ({saldo_pendiente})")]
    Overpayment {
        saldo_pendiente: Money,
        monto: Money,
    },

    #[error("el préstamo {id} no tiene saldo pendiente para refinanciar")]
    NothingToRefinance { id: PrestamoId },

    #[error("el día {fecha} está cerrado")]
    DayClosed { fecha: NaiveDate },

    #[error("el cliente {id} tiene préstamos asociados")]
    ClienteConPrestamos { id: i64 },

    #[error("el préstamo {id} tiene pagos registrados")]
    PrestamoConPagos { id: PrestamoId },

    #[error("no autorizado: {detalle}")]
    Unauthorized { detalle: String },
}

impl GestorError {
    /// HTTP status the REST layer maps this error to
    pub fn status_code(&self) -> u16 {
        match self {
            GestorError::InvalidPrincipal { .. }
            | GestorError::InvalidRate { .. }
            | GestorError::InvalidTerm { .. }
            | GestorError::InvalidAmount { .. }
            | GestorError::InvalidPercentage { .. } => 400,

            GestorError::ClienteNotFound { .. }
            | GestorError::PrestamoNotFound { .. }
            | GestorError::PagoNotFound { .. }
            | GestorError::EmpleadoNotFound { .. } => 404,

            GestorError::LoanClosed { .. }
            | GestorError::Overpayment { .. }
            | GestorError::NothingToRefinance { .. }
            | GestorError::DayClosed { .. }
            | GestorError::ClienteConPrestamos { .. }
            | GestorError::PrestamoConPagos { .. } => 409,

            GestorError::Unauthorized { .. } => 401,
        }
    }

    /// machine-readable detail payload
    pub fn detail(&self) -> String {
        self.to_string()
    }
}

pub type Result<T> = std::result::Result<T, GestorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            GestorError::InvalidAmount {
                monto: Money::ZERO
            }
            .status_code(),
            400
        );
        assert_eq!(GestorError::PrestamoNotFound { id: 7 }.status_code(), 404);
        assert_eq!(
            GestorError::Overpayment {
                saldo_pendiente: Money::from_major(100),
                monto: Money::from_major(200),
            }
            .status_code(),
            409
        );
        assert_eq!(
            GestorError::Unauthorized {
                detalle: "rol cobrador".to_string()
            }
            .status_code(),
            401
        );
    }

    #[test]
    fn test_detail_carries_values() {
        let err = GestorError::Overpayment {
            saldo_pendiente: Money::from_major(900),
            monto: Money::from_major(1000),
        };
        let detalle = err.detail();
        assert!(detalle.contains("900"));
        assert!(detalle.contains("1000"));
    }
}
