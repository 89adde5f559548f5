use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::Money;
use crate::types::{EmpleadoId, PagoId, PrestamoId, TipoMovimiento};

/// all events emitted by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // loan lifecycle
    PrestamoCreado {
        prestamo_id: PrestamoId,
        cliente_id: i64,
        monto: Money,
        timestamp: DateTime<Utc>,
    },
    PrestamoAprobado {
        prestamo_id: PrestamoId,
        empleado_id: EmpleadoId,
        monto_comision: Money,
        timestamp: DateTime<Utc>,
    },
    PrestamoLiquidado {
        prestamo_id: PrestamoId,
        timestamp: DateTime<Utc>,
    },
    PrestamoRefinanciado {
        prestamo_id: PrestamoId,
        nuevo_prestamo_id: PrestamoId,
        saldo_congelado: Money,
        monto_nuevo: Money,
        timestamp: DateTime<Utc>,
    },

    // payment events
    PagoRegistrado {
        pago_id: PagoId,
        prestamo_id: PrestamoId,
        monto: Money,
        saldo_pendiente: Money,
        timestamp: DateTime<Utc>,
    },
    PagoEliminado {
        pago_id: PagoId,
        prestamo_id: PrestamoId,
        monto: Money,
        saldo_pendiente: Money,
        timestamp: DateTime<Utc>,
    },
    ComisionRegistrada {
        pago_id: PagoId,
        empleado_id: EmpleadoId,
        monto_comision: Money,
        timestamp: DateTime<Utc>,
    },

    // cash register events
    MovimientoRegistrado {
        fecha: NaiveDate,
        tipo: TipoMovimiento,
        monto: Money,
        categoria: String,
    },
    DiaCerrado {
        fecha: NaiveDate,
        saldo_final: Money,
    },
    DiaReabierto {
        fecha: NaiveDate,
    },
    DiaEmpleadoCerrado {
        fecha: NaiveDate,
        empleado_id: EmpleadoId,
        entregado: Money,
    },
    DiaEmpleadoReabierto {
        fecha: NaiveDate,
        empleado_id: EmpleadoId,
    },
}

/// event with its audit identifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistroEvento {
    pub id: Uuid,
    pub evento: Event,
}

/// event store for collecting events during operations
#[derive(Debug, Default)]
pub struct EventStore {
    eventos: Vec<RegistroEvento>,
}

impl EventStore {
    pub fn new() -> Self {
        Self {
            eventos: Vec::new(),
        }
    }

    pub fn emit(&mut self, evento: Event) {
        self.eventos.push(RegistroEvento {
            id: Uuid::new_v4(),
            evento,
        });
    }

    pub fn take_events(&mut self) -> Vec<RegistroEvento> {
        std::mem::take(&mut self.eventos)
    }

    pub fn events(&self) -> &[RegistroEvento] {
        &self.eventos
    }

    pub fn clear(&mut self) {
        self.eventos.clear();
    }
}
