pub mod caja;
pub mod comisiones;
pub mod dates;
pub mod decimal;
pub mod engine;
pub mod errors;
pub mod events;
pub mod metrics;
pub mod model;
pub mod payments;
pub mod refinance;
pub mod schedule;
pub mod session;
pub mod store;
pub mod types;

// re-export key types
pub use decimal::{Money, Rate};
pub use engine::Gestor;
pub use errors::{GestorError, Result};
pub use events::{Event, EventStore, RegistroEvento};
pub use caja::{
    CierreCaja, MovimientoCaja, MovimientoCajaEmpleado, NuevoMovimiento, ResumenCajaEmpleado,
};
pub use comisiones::{
    ComisionPago, ComisionesDia, DetalleVendedor, PrestamoVendedor, RankingEmpleados,
    ResumenCobrador, ResumenVendedor,
};
pub use metrics::{CuotaPorVencer, ResumenGeneral, TopCliente};
pub use model::{
    Cliente, CobradorPago, Empleado, NuevoCliente, NuevoEmpleado, NuevoPago, NuevoPrestamo, Pago,
    Prestamo,
};
pub use refinance::SolicitudRefinanciacion;
pub use schedule::{AmortizacionRow, Cuota, PlanPago};
pub use session::{autorizar, Accion, Sesion};
pub use store::Almacen;
pub use types::{
    BaseComision, ClienteId, EmpleadoId, EstadoCuota, EstadoPrestamo, FrecuenciaPago, PagoId,
    PrestamoId, Puesto, Rol, TipoMovimiento,
};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
