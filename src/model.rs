use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::types::{
    ClienteId, EmpleadoId, EstadoPrestamo, FrecuenciaPago, PagoId, PrestamoId, Puesto,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cliente {
    pub id: ClienteId,
    pub nombre: String,
    pub dni: String,
    pub telefono: String,
    pub email: Option<String>,
    pub direccion: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NuevoCliente {
    pub nombre: String,
    pub dni: String,
    pub telefono: String,
    pub email: Option<String>,
    pub direccion: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Empleado {
    pub id: EmpleadoId,
    pub nombre: String,
    pub puesto: Puesto,
    pub dni: String,
    pub telefono: Option<String>,
    pub email: Option<String>,
    pub direccion: Option<String>,
    pub fecha_nacimiento: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NuevoEmpleado {
    pub nombre: String,
    pub puesto: Puesto,
    pub dni: String,
    pub telefono: Option<String>,
    pub email: Option<String>,
    pub direccion: Option<String>,
    pub fecha_nacimiento: Option<NaiveDate>,
}

/// loan row; `saldo_pendiente` and `cuotas_pagadas` are maintained by the
/// payment ledger, `estado` is persisted but re-derived on read
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prestamo {
    pub id: PrestamoId,
    pub cliente_id: ClienteId,
    pub monto: Money,
    pub tasa_interes: Rate,
    pub monto_total: Money,
    pub plazo_dias: u32,
    pub frecuencia_pago: FrecuenciaPago,
    pub cuotas_totales: u32,
    pub cuotas_pagadas: u32,
    pub valor_cuota: Money,
    pub saldo_pendiente: Money,
    pub fecha_inicio: NaiveDate,
    pub fecha_vencimiento: NaiveDate,
    pub estado: EstadoPrestamo,
    pub created_at: DateTime<Utc>,
}

impl Prestamo {
    /// single source of truth for the loan state. works for legacy rows
    /// whose stored `estado` predates the impago flag: terminal states are
    /// kept as persisted, everything else is recomputed from balance and
    /// maturity.
    pub fn derivar_estado(&self, hoy: NaiveDate) -> EstadoPrestamo {
        if self.estado.es_terminal() {
            return self.estado;
        }
        if self.saldo_pendiente.is_zero() {
            return EstadoPrestamo::Pagado;
        }
        if self.fecha_vencimiento < hoy {
            return EstadoPrestamo::Impago;
        }
        EstadoPrestamo::Activo
    }

    /// interest portion of the total
    pub fn interes(&self) -> Money {
        self.monto_total - self.monto
    }

    pub fn total_pagado(&self) -> Money {
        self.monto_total - self.saldo_pendiente
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NuevoPrestamo {
    pub cliente_id: ClienteId,
    pub monto: Money,
    /// percentage points, e.g. 20 for 20%
    pub tasa_interes: Decimal,
    pub plazo_dias: i64,
    pub frecuencia_pago: FrecuenciaPago,
    pub fecha_inicio: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pago {
    pub id: PagoId,
    pub prestamo_id: PrestamoId,
    pub monto: Money,
    pub fecha_pago: NaiveDate,
    pub metodo_pago: Option<String>,
    pub notas: Option<String>,
    pub tipo_pago: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// collector attribution attached to a payment at registration time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CobradorPago {
    pub empleado_id: EmpleadoId,
    pub porcentaje: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NuevoPago {
    pub prestamo_id: PrestamoId,
    pub monto: Money,
    pub fecha_pago: NaiveDate,
    pub metodo_pago: Option<String>,
    pub notas: Option<String>,
    pub tipo_pago: Option<String>,
    pub cobrador: Option<CobradorPago>,
}
