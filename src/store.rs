use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::caja::{EstadoDia, MovimientoCaja, MovimientoCajaEmpleado};
use crate::comisiones::{ComisionPago, PrestamoVendedor};
use crate::model::{Cliente, Empleado, Pago, Prestamo};
use crate::types::{ClienteId, ComisionId, EmpleadoId, MovimientoId, PagoId, PrestamoId};

/// per-employee day state; a flat list because composite keys do not
/// serialize as JSON map keys
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiaEmpleado {
    pub fecha: NaiveDate,
    pub empleado_id: EmpleadoId,
    pub estado: EstadoDia,
}

/// the in-process relational store. BTreeMaps keep listings ordered by id,
/// matching what the SQL layer this mirrors would return.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Almacen {
    pub clientes: BTreeMap<ClienteId, Cliente>,
    pub prestamos: BTreeMap<PrestamoId, Prestamo>,
    pub pagos: BTreeMap<PagoId, Pago>,
    pub empleados: BTreeMap<EmpleadoId, Empleado>,

    pub prestamo_vendedor: BTreeMap<PrestamoId, PrestamoVendedor>,
    pub pago_cobrador: BTreeMap<PagoId, ComisionPago>,
    pub pago_vendedor: BTreeMap<PagoId, ComisionPago>,

    pub movimientos: Vec<MovimientoCaja>,
    pub movimientos_empleado: Vec<MovimientoCajaEmpleado>,
    pub dias: BTreeMap<NaiveDate, EstadoDia>,
    pub dias_empleado: Vec<DiaEmpleado>,

    ultimo_cliente: i64,
    ultimo_prestamo: i64,
    ultimo_pago: i64,
    ultimo_empleado: i64,
    ultimo_movimiento: i64,
    ultima_comision: i64,
}

impl Almacen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn siguiente_cliente_id(&mut self) -> ClienteId {
        self.ultimo_cliente += 1;
        self.ultimo_cliente
    }

    pub fn siguiente_prestamo_id(&mut self) -> PrestamoId {
        self.ultimo_prestamo += 1;
        self.ultimo_prestamo
    }

    pub fn siguiente_pago_id(&mut self) -> PagoId {
        self.ultimo_pago += 1;
        self.ultimo_pago
    }

    pub fn siguiente_empleado_id(&mut self) -> EmpleadoId {
        self.ultimo_empleado += 1;
        self.ultimo_empleado
    }

    pub fn siguiente_movimiento_id(&mut self) -> MovimientoId {
        self.ultimo_movimiento += 1;
        self.ultimo_movimiento
    }

    pub fn siguiente_comision_id(&mut self) -> ComisionId {
        self.ultima_comision += 1;
        self.ultima_comision
    }

    /// day state for the admin register; unknown dates are open
    pub fn estado_dia(&self, fecha: NaiveDate) -> EstadoDia {
        self.dias.get(&fecha).cloned().unwrap_or_default()
    }

    pub fn estado_dia_mut(&mut self, fecha: NaiveDate) -> &mut EstadoDia {
        self.dias.entry(fecha).or_default()
    }

    pub fn estado_dia_empleado(&self, fecha: NaiveDate, empleado_id: EmpleadoId) -> EstadoDia {
        self.dias_empleado
            .iter()
            .find(|d| d.fecha == fecha && d.empleado_id == empleado_id)
            .map(|d| d.estado.clone())
            .unwrap_or_default()
    }

    pub fn estado_dia_empleado_mut(
        &mut self,
        fecha: NaiveDate,
        empleado_id: EmpleadoId,
    ) -> &mut EstadoDia {
        let pos = self
            .dias_empleado
            .iter()
            .position(|d| d.fecha == fecha && d.empleado_id == empleado_id);
        let idx = match pos {
            Some(idx) => idx,
            None => {
                self.dias_empleado.push(DiaEmpleado {
                    fecha,
                    empleado_id,
                    estado: EstadoDia::default(),
                });
                self.dias_empleado.len() - 1
            }
        };
        &mut self.dias_empleado[idx].estado
    }

    /// serialize the full store, the persistence boundary of the engine
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
