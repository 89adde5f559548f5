use serde::{Deserialize, Serialize};

use crate::errors::{GestorError, Result};
use crate::types::{EmpleadoId, Rol};

/// request-scoped session, built by the HTTP layer from the bearer token and
/// passed explicitly into every operation that needs authorization. there is
/// no ambient session state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sesion {
    pub usuario_id: i64,
    pub username: String,
    pub rol: Rol,
    pub empleado_id: Option<EmpleadoId>,
}

impl Sesion {
    pub fn new(usuario_id: i64, username: impl Into<String>, rol: Rol, empleado_id: Option<EmpleadoId>) -> Self {
        Self {
            usuario_id,
            username: username.into(),
            rol,
            empleado_id,
        }
    }

    /// the employee this session is linked to; employee-scoped operations
    /// require the linkage
    pub fn empleado(&self) -> Result<EmpleadoId> {
        self.empleado_id.ok_or_else(|| GestorError::Unauthorized {
            detalle: "el usuario no está asociado a un empleado".to_string(),
        })
    }
}

/// operations gated by role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accion {
    /// admin register: movements, close and reopen
    GestionarCajaAdmin,
    /// seller approval on loans, collector approval on payments
    AprobarComisiones,
    /// deposit entries in the employee ledger; collectors reconcile
    /// commission-only and never deposit
    RegistrarDeposito,
}

/// single authorization policy, evaluated per operation instead of being
/// duplicated in every page of the consuming UI
pub fn autorizar(sesion: &Sesion, accion: Accion) -> Result<()> {
    let permitido = match accion {
        Accion::GestionarCajaAdmin | Accion::AprobarComisiones => sesion.rol == Rol::Admin,
        Accion::RegistrarDeposito => sesion.rol != Rol::Cobrador,
    };

    if permitido {
        Ok(())
    } else {
        Err(GestorError::Unauthorized {
            detalle: format!("rol {:?} no puede ejecutar {:?}", sesion.rol, accion),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sesion(rol: Rol) -> Sesion {
        Sesion::new(1, "test", rol, Some(5))
    }

    #[test]
    fn test_admin_todo_permitido() {
        let s = sesion(Rol::Admin);
        assert!(autorizar(&s, Accion::GestionarCajaAdmin).is_ok());
        assert!(autorizar(&s, Accion::AprobarComisiones).is_ok());
        assert!(autorizar(&s, Accion::RegistrarDeposito).is_ok());
    }

    #[test]
    fn test_cobrador_no_deposita() {
        let s = sesion(Rol::Cobrador);
        assert!(matches!(
            autorizar(&s, Accion::RegistrarDeposito),
            Err(GestorError::Unauthorized { .. })
        ));
    }

    #[test]
    fn test_vendedor_no_gestiona_caja_admin() {
        let s = sesion(Rol::Vendedor);
        assert!(autorizar(&s, Accion::GestionarCajaAdmin).is_err());
        assert!(autorizar(&s, Accion::RegistrarDeposito).is_ok());
    }

    #[test]
    fn test_sesion_sin_empleado() {
        let s = Sesion::new(1, "admin", Rol::Admin, None);
        assert!(s.empleado().is_err());
        assert_eq!(sesion(Rol::Admin).empleado().unwrap(), 5);
    }
}
