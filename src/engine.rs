use chrono::NaiveDate;
use hourglass_rs::SafeTimeProvider;
use rust_decimal::Decimal;

use crate::caja::{
    self, CierreCaja, MovimientoCaja, MovimientoCajaEmpleado, NuevoMovimiento,
    ResumenCajaEmpleado, CATEGORIA_DEPOSITO, CATEGORIA_DESEMBOLSO, CATEGORIA_PAGO_CUOTA,
};
use crate::comisiones::{
    self, reportes, ComisionPago, ComisionesDia, DetalleVendedor, DetalleVendedorPrestamo,
    PrestamoVendedor, RankingEmpleados, ResumenCobrador, ResumenVendedor,
};
use crate::dates::{en_rango, fecha_vencimiento};
use crate::decimal::{Money, Rate};
use crate::errors::{GestorError, Result};
use crate::events::{Event, EventStore, RegistroEvento};
use crate::metrics::{self, CuotaPorVencer, ResumenGeneral, TopCliente};
use crate::model::{
    Cliente, Empleado, NuevoCliente, NuevoEmpleado, NuevoPago, NuevoPrestamo, Pago, Prestamo,
};
use crate::payments;
use crate::refinance::{self, SolicitudRefinanciacion};
use crate::schedule::{self, AmortizacionRow};
use crate::session::{autorizar, Accion, Sesion};
use crate::store::Almacen;
use crate::types::{
    BaseComision, ClienteId, EmpleadoId, EstadoPrestamo, PagoId, PrestamoId, TipoMovimiento,
};

/// the engine facade. every REST route of the consuming frontend maps to one
/// method here; operations validate against the current snapshot and only
/// then mutate, so an error leaves the store untouched. `&mut self` keeps
/// mutations serialized, callers sharing the engine across threads wrap it
/// in a lock.
#[derive(Debug, Default)]
pub struct Gestor {
    almacen: Almacen,
    eventos: EventStore,
}

impl Gestor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_almacen(almacen: Almacen) -> Self {
        Self {
            almacen,
            eventos: EventStore::new(),
        }
    }

    pub fn almacen(&self) -> &Almacen {
        &self.almacen
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        self.almacen.to_json()
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        Ok(Self::from_almacen(Almacen::from_json(json)?))
    }

    /// drain events emitted since the last call
    pub fn take_events(&mut self) -> Vec<RegistroEvento> {
        self.eventos.take_events()
    }

    // ----- clientes -----

    pub fn crear_cliente(&mut self, nuevo: NuevoCliente, time: &SafeTimeProvider) -> Cliente {
        let id = self.almacen.siguiente_cliente_id();
        let cliente = Cliente {
            id,
            nombre: nuevo.nombre,
            dni: nuevo.dni,
            telefono: nuevo.telefono,
            email: nuevo.email,
            direccion: nuevo.direccion,
            created_at: time.now(),
        };
        self.almacen.clientes.insert(id, cliente.clone());
        cliente
    }

    pub fn cliente(&self, id: ClienteId) -> Result<&Cliente> {
        self.almacen
            .clientes
            .get(&id)
            .ok_or(GestorError::ClienteNotFound { id })
    }

    pub fn clientes(&self) -> Vec<&Cliente> {
        self.almacen.clientes.values().collect()
    }

    pub fn actualizar_cliente(&mut self, id: ClienteId, datos: NuevoCliente) -> Result<Cliente> {
        let cliente = self
            .almacen
            .clientes
            .get_mut(&id)
            .ok_or(GestorError::ClienteNotFound { id })?;
        cliente.nombre = datos.nombre;
        cliente.dni = datos.dni;
        cliente.telefono = datos.telefono;
        cliente.email = datos.email;
        cliente.direccion = datos.direccion;
        Ok(cliente.clone())
    }

    pub fn eliminar_cliente(&mut self, id: ClienteId) -> Result<()> {
        if !self.almacen.clientes.contains_key(&id) {
            return Err(GestorError::ClienteNotFound { id });
        }
        if self.almacen.prestamos.values().any(|p| p.cliente_id == id) {
            return Err(GestorError::ClienteConPrestamos { id });
        }
        self.almacen.clientes.remove(&id);
        Ok(())
    }

    // ----- empleados -----

    pub fn crear_empleado(&mut self, nuevo: NuevoEmpleado, time: &SafeTimeProvider) -> Empleado {
        let id = self.almacen.siguiente_empleado_id();
        let empleado = Empleado {
            id,
            nombre: nuevo.nombre,
            puesto: nuevo.puesto,
            dni: nuevo.dni,
            telefono: nuevo.telefono,
            email: nuevo.email,
            direccion: nuevo.direccion,
            fecha_nacimiento: nuevo.fecha_nacimiento,
            created_at: time.now(),
        };
        self.almacen.empleados.insert(id, empleado.clone());
        empleado
    }

    pub fn empleado(&self, id: EmpleadoId) -> Result<&Empleado> {
        self.almacen
            .empleados
            .get(&id)
            .ok_or(GestorError::EmpleadoNotFound { id })
    }

    pub fn empleados(&self) -> Vec<&Empleado> {
        self.almacen.empleados.values().collect()
    }

    pub fn actualizar_empleado(&mut self, id: EmpleadoId, datos: NuevoEmpleado) -> Result<Empleado> {
        let empleado = self
            .almacen
            .empleados
            .get_mut(&id)
            .ok_or(GestorError::EmpleadoNotFound { id })?;
        empleado.nombre = datos.nombre;
        empleado.puesto = datos.puesto;
        empleado.dni = datos.dni;
        empleado.telefono = datos.telefono;
        empleado.email = datos.email;
        empleado.direccion = datos.direccion;
        empleado.fecha_nacimiento = datos.fecha_nacimiento;
        Ok(empleado.clone())
    }

    // ----- prestamos -----

    /// create a loan: generates the installment plan and registers the
    /// disbursement as a cash egreso for the start date
    pub fn crear_prestamo(
        &mut self,
        nuevo: NuevoPrestamo,
        time: &SafeTimeProvider,
    ) -> Result<Prestamo> {
        if !self.almacen.clientes.contains_key(&nuevo.cliente_id) {
            return Err(GestorError::ClienteNotFound {
                id: nuevo.cliente_id,
            });
        }

        let plan = schedule::generar_plan(
            nuevo.monto,
            Rate::from_percentage(nuevo.tasa_interes),
            nuevo.plazo_dias,
            nuevo.frecuencia_pago,
            nuevo.fecha_inicio,
        )?;

        if self.almacen.estado_dia(nuevo.fecha_inicio).cerrado {
            return Err(GestorError::DayClosed {
                fecha: nuevo.fecha_inicio,
            });
        }

        let ahora = time.now();
        let id = self.almacen.siguiente_prestamo_id();
        let plazo_dias = nuevo.plazo_dias as u32;
        let prestamo = Prestamo {
            id,
            cliente_id: nuevo.cliente_id,
            monto: nuevo.monto,
            tasa_interes: Rate::from_percentage(nuevo.tasa_interes),
            monto_total: plan.monto_total,
            plazo_dias,
            frecuencia_pago: nuevo.frecuencia_pago,
            cuotas_totales: plan.cuotas_totales,
            cuotas_pagadas: 0,
            valor_cuota: plan.valor_cuota,
            saldo_pendiente: plan.monto_total,
            fecha_inicio: nuevo.fecha_inicio,
            fecha_vencimiento: fecha_vencimiento(nuevo.fecha_inicio, plazo_dias),
            estado: EstadoPrestamo::Activo,
            created_at: ahora,
        };
        self.almacen.prestamos.insert(id, prestamo.clone());

        let mov_id = self.almacen.siguiente_movimiento_id();
        self.almacen.movimientos.push(MovimientoCaja {
            id: mov_id,
            fecha: nuevo.fecha_inicio,
            tipo: TipoMovimiento::Egreso,
            monto: nuevo.monto,
            categoria: CATEGORIA_DESEMBOLSO.to_string(),
            descripcion: format!("Desembolso préstamo #{} cliente {}", id, nuevo.cliente_id),
            referencia_tipo: Some("prestamo".to_string()),
            referencia_id: Some(id),
        });

        self.eventos.emit(Event::PrestamoCreado {
            prestamo_id: id,
            cliente_id: nuevo.cliente_id,
            monto: nuevo.monto,
            timestamp: ahora,
        });
        tracing::info!(prestamo_id = id, monto = %nuevo.monto, "préstamo creado");

        Ok(prestamo)
    }

    /// loan with its state re-derived for the current date
    pub fn prestamo(&self, id: PrestamoId, time: &SafeTimeProvider) -> Result<Prestamo> {
        let hoy = time.now().date_naive();
        let mut prestamo = self
            .almacen
            .prestamos
            .get(&id)
            .ok_or(GestorError::PrestamoNotFound { id })?
            .clone();
        prestamo.estado = prestamo.derivar_estado(hoy);
        Ok(prestamo)
    }

    pub fn prestamos(&self, time: &SafeTimeProvider) -> Vec<Prestamo> {
        let hoy = time.now().date_naive();
        self.almacen
            .prestamos
            .values()
            .map(|p| {
                let mut p = p.clone();
                p.estado = p.derivar_estado(hoy);
                p
            })
            .collect()
    }

    pub fn prestamos_de_cliente(
        &self,
        cliente_id: ClienteId,
        time: &SafeTimeProvider,
    ) -> Result<Vec<Prestamo>> {
        self.cliente(cliente_id)?;
        Ok(self
            .prestamos(time)
            .into_iter()
            .filter(|p| p.cliente_id == cliente_id)
            .collect())
    }

    pub fn eliminar_prestamo(&mut self, id: PrestamoId) -> Result<()> {
        let prestamo = self
            .almacen
            .prestamos
            .get(&id)
            .ok_or(GestorError::PrestamoNotFound { id })?;
        if self.almacen.pagos.values().any(|p| p.prestamo_id == id) {
            return Err(GestorError::PrestamoConPagos { id });
        }
        let fecha_inicio = prestamo.fecha_inicio;
        if self.almacen.estado_dia(fecha_inicio).cerrado {
            return Err(GestorError::DayClosed {
                fecha: fecha_inicio,
            });
        }

        self.almacen.prestamos.remove(&id);
        self.almacen.prestamo_vendedor.remove(&id);
        self.almacen.movimientos.retain(|m| {
            !(m.referencia_tipo.as_deref() == Some("prestamo") && m.referencia_id == Some(id))
        });
        Ok(())
    }

    /// amortization table with per-row state for the current date
    pub fn tabla_amortizacion(
        &self,
        id: PrestamoId,
        time: &SafeTimeProvider,
    ) -> Result<Vec<AmortizacionRow>> {
        let prestamo = self
            .almacen
            .prestamos
            .get(&id)
            .ok_or(GestorError::PrestamoNotFound { id })?;
        let hoy = time.now().date_naive();
        Ok(schedule::tabla_amortizacion(
            prestamo,
            self.total_pagado(id),
            hoy,
        ))
    }

    /// approve a loan sale: writes the seller commission record. approving
    /// again overwrites it, the pair loan/seller stays one-to-one.
    pub fn aprobar_prestamo(
        &mut self,
        sesion: &Sesion,
        prestamo_id: PrestamoId,
        empleado_id: EmpleadoId,
        base_tipo: BaseComision,
        porcentaje: Decimal,
        time: &SafeTimeProvider,
    ) -> Result<PrestamoVendedor> {
        autorizar(sesion, Accion::AprobarComisiones)?;
        let prestamo = self
            .almacen
            .prestamos
            .get(&prestamo_id)
            .ok_or(GestorError::PrestamoNotFound { id: prestamo_id })?;
        let empleado = self
            .almacen
            .empleados
            .get(&empleado_id)
            .ok_or(GestorError::EmpleadoNotFound { id: empleado_id })?;

        let registro =
            PrestamoVendedor::calcular(prestamo, empleado, base_tipo, porcentaje, time.now())?;
        self.almacen
            .prestamo_vendedor
            .insert(prestamo_id, registro.clone());

        self.eventos.emit(Event::PrestamoAprobado {
            prestamo_id,
            empleado_id,
            monto_comision: registro.monto_comision,
            timestamp: time.now(),
        });
        Ok(registro)
    }

    /// seller record of a loan; `None` is the legitimate "no commission" answer
    pub fn vendedor_de_prestamo(&self, id: PrestamoId) -> Result<Option<&PrestamoVendedor>> {
        if !self.almacen.prestamos.contains_key(&id) {
            return Err(GestorError::PrestamoNotFound { id });
        }
        Ok(self.almacen.prestamo_vendedor.get(&id))
    }

    /// commission preview used by the loan and payment forms
    pub fn preview_comision(&self, monto: Money, porcentaje: Decimal) -> Result<Money> {
        comisiones::comision_sobre_pago(monto, porcentaje)
    }

    // ----- pagos -----

    /// register a payment against a loan. validation happens before any
    /// write; the payment, the loan balance, the cash ingreso and the
    /// commission rows commit together.
    pub fn registrar_pago(&mut self, nuevo: NuevoPago, time: &SafeTimeProvider) -> Result<Pago> {
        let ahora = time.now();
        let hoy = ahora.date_naive();

        let prestamo = self
            .almacen
            .prestamos
            .get(&nuevo.prestamo_id)
            .ok_or(GestorError::PrestamoNotFound {
                id: nuevo.prestamo_id,
            })?;
        payments::validar_pago(prestamo, nuevo.monto, hoy)?;

        if self.almacen.estado_dia(nuevo.fecha_pago).cerrado {
            return Err(GestorError::DayClosed {
                fecha: nuevo.fecha_pago,
            });
        }

        // resolve commission rows up front so a bad collector reference
        // cannot leave a half-applied payment behind
        let comision_cobrador = match &nuevo.cobrador {
            Some(cobrador) => {
                let empleado = self
                    .almacen
                    .empleados
                    .get(&cobrador.empleado_id)
                    .ok_or(GestorError::EmpleadoNotFound {
                        id: cobrador.empleado_id,
                    })?;
                let monto_comision =
                    comisiones::comision_sobre_pago(nuevo.monto, cobrador.porcentaje)?;
                Some((
                    cobrador.empleado_id,
                    empleado.nombre.clone(),
                    cobrador.porcentaje,
                    monto_comision,
                ))
            }
            None => None,
        };
        let comision_vendedor = match self.almacen.prestamo_vendedor.get(&nuevo.prestamo_id) {
            Some(pv) => Some((
                pv.empleado_id,
                pv.empleado_nombre.clone(),
                pv.porcentaje,
                comisiones::comision_sobre_pago(nuevo.monto, pv.porcentaje)?,
            )),
            None => None,
        };

        let pago_id = self.almacen.siguiente_pago_id();
        let pago = Pago {
            id: pago_id,
            prestamo_id: nuevo.prestamo_id,
            monto: nuevo.monto,
            fecha_pago: nuevo.fecha_pago,
            metodo_pago: nuevo.metodo_pago,
            notas: nuevo.notas,
            tipo_pago: nuevo.tipo_pago,
            created_at: ahora,
        };
        self.almacen.pagos.insert(pago_id, pago.clone());

        let cuotas_pagadas = self.contar_pagos(nuevo.prestamo_id);
        let prestamo = self
            .almacen
            .prestamos
            .get_mut(&nuevo.prestamo_id)
            .ok_or(GestorError::PrestamoNotFound {
                id: nuevo.prestamo_id,
            })?;
        payments::aplicar_pago(prestamo, nuevo.monto, cuotas_pagadas);
        let saldo_pendiente = prestamo.saldo_pendiente;
        let liquidado = saldo_pendiente.is_zero();

        let mov_id = self.almacen.siguiente_movimiento_id();
        self.almacen.movimientos.push(MovimientoCaja {
            id: mov_id,
            fecha: nuevo.fecha_pago,
            tipo: TipoMovimiento::Ingreso,
            monto: nuevo.monto,
            categoria: CATEGORIA_PAGO_CUOTA.to_string(),
            descripcion: format!("Pago #{} préstamo {}", pago_id, nuevo.prestamo_id),
            referencia_tipo: Some("pago".to_string()),
            referencia_id: Some(pago_id),
        });

        if let Some((empleado_id, empleado_nombre, porcentaje, monto_comision)) = comision_cobrador
        {
            let id = self.almacen.siguiente_comision_id();
            self.almacen.pago_cobrador.insert(
                pago_id,
                ComisionPago {
                    id,
                    pago_id,
                    empleado_id,
                    empleado_nombre,
                    porcentaje,
                    monto_comision,
                    aprobado: false,
                    created_at: ahora,
                },
            );
            self.eventos.emit(Event::ComisionRegistrada {
                pago_id,
                empleado_id,
                monto_comision,
                timestamp: ahora,
            });
        }
        if let Some((empleado_id, empleado_nombre, porcentaje, monto_comision)) = comision_vendedor
        {
            let id = self.almacen.siguiente_comision_id();
            self.almacen.pago_vendedor.insert(
                pago_id,
                ComisionPago {
                    id,
                    pago_id,
                    empleado_id,
                    empleado_nombre,
                    porcentaje,
                    monto_comision,
                    aprobado: false,
                    created_at: ahora,
                },
            );
            self.eventos.emit(Event::ComisionRegistrada {
                pago_id,
                empleado_id,
                monto_comision,
                timestamp: ahora,
            });
        }

        self.eventos.emit(Event::PagoRegistrado {
            pago_id,
            prestamo_id: nuevo.prestamo_id,
            monto: nuevo.monto,
            saldo_pendiente,
            timestamp: ahora,
        });
        if liquidado {
            self.eventos.emit(Event::PrestamoLiquidado {
                prestamo_id: nuevo.prestamo_id,
                timestamp: ahora,
            });
        }
        tracing::info!(
            pago_id,
            prestamo_id = nuevo.prestamo_id,
            monto = %nuevo.monto,
            saldo = %saldo_pendiente,
            "pago registrado"
        );

        Ok(pago)
    }

    pub fn pago(&self, id: PagoId) -> Result<&Pago> {
        self.almacen
            .pagos
            .get(&id)
            .ok_or(GestorError::PagoNotFound { id })
    }

    pub fn pagos(&self) -> Vec<&Pago> {
        self.almacen.pagos.values().collect()
    }

    pub fn pagos_de_prestamo(&self, prestamo_id: PrestamoId) -> Result<Vec<&Pago>> {
        if !self.almacen.prestamos.contains_key(&prestamo_id) {
            return Err(GestorError::PrestamoNotFound { id: prestamo_id });
        }
        Ok(self
            .almacen
            .pagos
            .values()
            .filter(|p| p.prestamo_id == prestamo_id)
            .collect())
    }

    /// delete a payment, exact inverse of registering it: balance restored,
    /// installment count recounted, settled loan reopened, cash ingreso and
    /// commission rows removed
    pub fn eliminar_pago(&mut self, id: PagoId, time: &SafeTimeProvider) -> Result<()> {
        let pago = self
            .almacen
            .pagos
            .get(&id)
            .cloned()
            .ok_or(GestorError::PagoNotFound { id })?;
        if self.almacen.estado_dia(pago.fecha_pago).cerrado {
            return Err(GestorError::DayClosed {
                fecha: pago.fecha_pago,
            });
        }

        self.almacen.pagos.remove(&id);
        let cuotas_pagadas = self.contar_pagos(pago.prestamo_id);
        let saldo_pendiente = match self.almacen.prestamos.get_mut(&pago.prestamo_id) {
            Some(prestamo) => {
                payments::revertir_pago(prestamo, pago.monto, cuotas_pagadas);
                prestamo.saldo_pendiente
            }
            None => Money::ZERO,
        };

        self.almacen.pago_cobrador.remove(&id);
        self.almacen.pago_vendedor.remove(&id);
        self.almacen.movimientos.retain(|m| {
            !(m.referencia_tipo.as_deref() == Some("pago") && m.referencia_id == Some(id))
        });

        self.eventos.emit(Event::PagoEliminado {
            pago_id: id,
            prestamo_id: pago.prestamo_id,
            monto: pago.monto,
            saldo_pendiente,
            timestamp: time.now(),
        });
        Ok(())
    }

    /// collector commission of a payment; `None` means no commission exists
    pub fn comision_cobrador(&self, pago_id: PagoId) -> Result<Option<&ComisionPago>> {
        self.pago(pago_id)?;
        Ok(self.almacen.pago_cobrador.get(&pago_id))
    }

    pub fn comision_vendedor(&self, pago_id: PagoId) -> Result<Option<&ComisionPago>> {
        self.pago(pago_id)?;
        Ok(self.almacen.pago_vendedor.get(&pago_id))
    }

    /// post-hoc approval: fixes the collector and percentage of a payment
    /// commission and recomputes the amount
    pub fn aprobar_pago_cobrador(
        &mut self,
        sesion: &Sesion,
        pago_id: PagoId,
        empleado_id: EmpleadoId,
        porcentaje: Decimal,
        time: &SafeTimeProvider,
    ) -> Result<ComisionPago> {
        autorizar(sesion, Accion::AprobarComisiones)?;
        let pago = self
            .almacen
            .pagos
            .get(&pago_id)
            .ok_or(GestorError::PagoNotFound { id: pago_id })?;
        let monto_pago = pago.monto;
        let empleado_nombre = self
            .almacen
            .empleados
            .get(&empleado_id)
            .ok_or(GestorError::EmpleadoNotFound { id: empleado_id })?
            .nombre
            .clone();
        let monto_comision = comisiones::comision_sobre_pago(monto_pago, porcentaje)?;

        let ahora = time.now();
        let id = match self.almacen.pago_cobrador.get(&pago_id) {
            Some(existente) => existente.id,
            None => self.almacen.siguiente_comision_id(),
        };
        let registro = ComisionPago {
            id,
            pago_id,
            empleado_id,
            empleado_nombre,
            porcentaje,
            monto_comision,
            aprobado: true,
            created_at: ahora,
        };
        self.almacen.pago_cobrador.insert(pago_id, registro.clone());

        self.eventos.emit(Event::ComisionRegistrada {
            pago_id,
            empleado_id,
            monto_comision,
            timestamp: ahora,
        });
        Ok(registro)
    }

    // ----- refinanciacion -----

    /// roll the outstanding balance of an impaired loan into a new one. the
    /// source loan freezes at its current balance; both sides commit
    /// together or not at all.
    pub fn refinanciar(
        &mut self,
        prestamo_id: PrestamoId,
        solicitud: SolicitudRefinanciacion,
        time: &SafeTimeProvider,
    ) -> Result<Prestamo> {
        let ahora = time.now();
        let hoy = ahora.date_naive();

        let origen = self
            .almacen
            .prestamos
            .get(&prestamo_id)
            .ok_or(GestorError::PrestamoNotFound { id: prestamo_id })?;
        let cliente_id = origen.cliente_id;
        let saldo_congelado = origen.saldo_pendiente;
        let terminos = refinance::preparar(origen, &solicitud, hoy)?;

        let nuevo_id = self.almacen.siguiente_prestamo_id();
        let nuevo = Prestamo {
            id: nuevo_id,
            cliente_id,
            monto: terminos.monto,
            tasa_interes: terminos.tasa_interes,
            monto_total: terminos.monto_total,
            plazo_dias: terminos.plazo_dias,
            frecuencia_pago: terminos.frecuencia_pago,
            cuotas_totales: terminos.cuotas_totales,
            cuotas_pagadas: 0,
            valor_cuota: terminos.valor_cuota,
            saldo_pendiente: terminos.monto_total,
            fecha_inicio: terminos.fecha_inicio,
            fecha_vencimiento: terminos.fecha_vencimiento,
            estado: EstadoPrestamo::Activo,
            created_at: ahora,
        };
        self.almacen.prestamos.insert(nuevo_id, nuevo.clone());

        if let Some(origen) = self.almacen.prestamos.get_mut(&prestamo_id) {
            origen.estado = EstadoPrestamo::Refinanciado;
        }

        self.eventos.emit(Event::PrestamoRefinanciado {
            prestamo_id,
            nuevo_prestamo_id: nuevo_id,
            saldo_congelado,
            monto_nuevo: nuevo.monto,
            timestamp: ahora,
        });
        tracing::info!(
            prestamo_id,
            nuevo_prestamo_id = nuevo_id,
            saldo = %saldo_congelado,
            monto = %nuevo.monto,
            "préstamo refinanciado"
        );

        Ok(nuevo)
    }

    // ----- caja admin -----

    pub fn registrar_movimiento(
        &mut self,
        sesion: &Sesion,
        nuevo: NuevoMovimiento,
    ) -> Result<MovimientoCaja> {
        autorizar(sesion, Accion::GestionarCajaAdmin)?;
        if !nuevo.monto.is_positive() {
            return Err(GestorError::InvalidAmount { monto: nuevo.monto });
        }
        if self.almacen.estado_dia(nuevo.fecha).cerrado {
            tracing::warn!(fecha = %nuevo.fecha, "movimiento rechazado, día cerrado");
            return Err(GestorError::DayClosed { fecha: nuevo.fecha });
        }

        let id = self.almacen.siguiente_movimiento_id();
        let movimiento = MovimientoCaja {
            id,
            fecha: nuevo.fecha,
            tipo: nuevo.tipo,
            monto: nuevo.monto,
            categoria: nuevo.categoria,
            descripcion: nuevo.descripcion,
            referencia_tipo: nuevo.referencia_tipo,
            referencia_id: nuevo.referencia_id,
        };
        self.almacen.movimientos.push(movimiento.clone());

        self.eventos.emit(Event::MovimientoRegistrado {
            fecha: movimiento.fecha,
            tipo: movimiento.tipo,
            monto: movimiento.monto,
            categoria: movimiento.categoria.clone(),
        });
        Ok(movimiento)
    }

    pub fn movimientos(&self, fecha: NaiveDate) -> Vec<&MovimientoCaja> {
        self.almacen
            .movimientos
            .iter()
            .filter(|m| m.fecha == fecha)
            .collect()
    }

    /// reconciliation view for a date, always recomputed from the rows
    pub fn cierre_caja(&self, fecha: NaiveDate) -> CierreCaja {
        let movimientos = self.movimientos(fecha);
        let (_, _, comisiones_total) = self.totales_comisiones_fecha(fecha);
        let estado = self.almacen.estado_dia(fecha);
        caja::calcular_cierre(fecha, &movimientos, comisiones_total, &estado)
    }

    /// close the day: freezes movements for the date and persists the
    /// expected balance as the final one
    pub fn cerrar_dia(&mut self, sesion: &Sesion, fecha: NaiveDate) -> Result<CierreCaja> {
        autorizar(sesion, Accion::GestionarCajaAdmin)?;
        if self.almacen.estado_dia(fecha).cerrado {
            return Err(GestorError::DayClosed { fecha });
        }

        let mut cierre = self.cierre_caja(fecha);
        let estado = self.almacen.estado_dia_mut(fecha);
        estado.cerrado = true;
        estado.saldo_final = Some(cierre.saldo_esperado);
        cierre.cerrado = true;
        cierre.saldo_final = Some(cierre.saldo_esperado);

        self.eventos.emit(Event::DiaCerrado {
            fecha,
            saldo_final: cierre.saldo_esperado,
        });
        tracing::info!(%fecha, saldo_final = %cierre.saldo_esperado, "día cerrado");
        Ok(cierre)
    }

    /// reopen the day for more movements; idempotent
    pub fn abrir_dia(&mut self, sesion: &Sesion, fecha: NaiveDate) -> Result<CierreCaja> {
        autorizar(sesion, Accion::GestionarCajaAdmin)?;
        let estado = self.almacen.estado_dia_mut(fecha);
        estado.cerrado = false;
        estado.saldo_final = None;

        self.eventos.emit(Event::DiaReabierto { fecha });
        Ok(self.cierre_caja(fecha))
    }

    // ----- caja empleado -----

    pub fn registrar_movimiento_empleado(
        &mut self,
        sesion: &Sesion,
        fecha: NaiveDate,
        tipo: TipoMovimiento,
        monto: Money,
        categoria: String,
        descripcion: String,
    ) -> Result<MovimientoCajaEmpleado> {
        let empleado_id = sesion.empleado()?;
        if categoria == CATEGORIA_DEPOSITO {
            autorizar(sesion, Accion::RegistrarDeposito)?;
        }
        if !monto.is_positive() {
            return Err(GestorError::InvalidAmount { monto });
        }
        if self.almacen.estado_dia_empleado(fecha, empleado_id).cerrado {
            return Err(GestorError::DayClosed { fecha });
        }

        let id = self.almacen.siguiente_movimiento_id();
        let movimiento = MovimientoCajaEmpleado {
            id,
            fecha,
            empleado_id,
            tipo,
            monto,
            categoria,
            descripcion,
        };
        self.almacen.movimientos_empleado.push(movimiento.clone());

        self.eventos.emit(Event::MovimientoRegistrado {
            fecha,
            tipo,
            monto,
            categoria: movimiento.categoria.clone(),
        });
        Ok(movimiento)
    }

    pub fn movimientos_empleado(
        &self,
        sesion: &Sesion,
        fecha: NaiveDate,
    ) -> Result<Vec<&MovimientoCajaEmpleado>> {
        let empleado_id = sesion.empleado()?;
        Ok(self
            .almacen
            .movimientos_empleado
            .iter()
            .filter(|m| m.fecha == fecha && m.empleado_id == empleado_id)
            .collect())
    }

    /// what the employee collected, earned and still owes the house that day
    pub fn resumen_caja_empleado(
        &self,
        sesion: &Sesion,
        fecha: NaiveDate,
    ) -> Result<ResumenCajaEmpleado> {
        let empleado_id = sesion.empleado()?;
        Ok(self.calcular_resumen_empleado(fecha, empleado_id))
    }

    pub fn cerrar_dia_empleado(
        &mut self,
        sesion: &Sesion,
        fecha: NaiveDate,
    ) -> Result<ResumenCajaEmpleado> {
        let empleado_id = sesion.empleado()?;
        if self.almacen.estado_dia_empleado(fecha, empleado_id).cerrado {
            return Err(GestorError::DayClosed { fecha });
        }

        let mut resumen = self.calcular_resumen_empleado(fecha, empleado_id);
        let estado = self.almacen.estado_dia_empleado_mut(fecha, empleado_id);
        estado.cerrado = true;
        estado.saldo_final = Some(resumen.saldo_esperado_entregar);
        resumen.cerrado = true;
        resumen.entregado = Some(resumen.saldo_esperado_entregar);

        self.eventos.emit(Event::DiaEmpleadoCerrado {
            fecha,
            empleado_id,
            entregado: resumen.saldo_esperado_entregar,
        });
        Ok(resumen)
    }

    pub fn abrir_dia_empleado(
        &mut self,
        sesion: &Sesion,
        fecha: NaiveDate,
    ) -> Result<ResumenCajaEmpleado> {
        let empleado_id = sesion.empleado()?;
        let estado = self.almacen.estado_dia_empleado_mut(fecha, empleado_id);
        estado.cerrado = false;
        estado.saldo_final = None;

        self.eventos.emit(Event::DiaEmpleadoReabierto { fecha, empleado_id });
        Ok(self.calcular_resumen_empleado(fecha, empleado_id))
    }

    // ----- comisiones -----

    pub fn resumen_comisiones_vendedor(
        &self,
        vendedor_id: Option<EmpleadoId>,
        desde: Option<NaiveDate>,
        hasta: Option<NaiveDate>,
    ) -> ResumenVendedor {
        let esperadas: Vec<&PrestamoVendedor> = self
            .almacen
            .prestamo_vendedor
            .values()
            .filter(|pv| vendedor_id.map_or(true, |v| pv.empleado_id == v))
            .collect();
        let cobradas = self.comisiones_en_rango(&self.almacen.pago_vendedor, vendedor_id, desde, hasta);
        reportes::resumen_vendedor(&esperadas, &cobradas)
    }

    pub fn detalle_comisiones_vendedor(&self, vendedor_id: EmpleadoId) -> Result<DetalleVendedor> {
        let vendedor = self.empleado(vendedor_id)?;

        let mut prestamos = Vec::new();
        for pv in self
            .almacen
            .prestamo_vendedor
            .values()
            .filter(|pv| pv.empleado_id == vendedor_id)
        {
            let prestamo = match self.almacen.prestamos.get(&pv.prestamo_id) {
                Some(p) => p,
                None => continue,
            };
            let comision_cobrada: Money = self
                .almacen
                .pago_vendedor
                .values()
                .filter(|c| c.empleado_id == vendedor_id)
                .filter(|c| {
                    self.almacen
                        .pagos
                        .get(&c.pago_id)
                        .map_or(false, |p| p.prestamo_id == prestamo.id)
                })
                .map(|c| c.monto_comision)
                .sum();

            prestamos.push(DetalleVendedorPrestamo {
                prestamo_id: prestamo.id,
                cliente_id: prestamo.cliente_id,
                monto_prestamo: prestamo.monto,
                monto_total: prestamo.monto_total,
                cuotas_totales: prestamo.cuotas_totales,
                cuotas_pagadas: prestamo.cuotas_pagadas,
                estado: prestamo.estado,
                porcentaje_vendedor: pv.porcentaje,
                comision_esperada: pv.monto_comision,
                comision_cobrada,
                comision_pendiente: pv.monto_comision - comision_cobrada,
            });
        }

        Ok(DetalleVendedor {
            empleado_id: vendedor_id,
            nombre: vendedor.nombre.clone(),
            comision_esperada_total: prestamos.iter().map(|p| p.comision_esperada).sum(),
            comision_cobrada_total: prestamos.iter().map(|p| p.comision_cobrada).sum(),
            comision_pendiente_total: prestamos.iter().map(|p| p.comision_pendiente).sum(),
            prestamos,
        })
    }

    pub fn resumen_comisiones_cobrador(
        &self,
        cobrador_id: Option<EmpleadoId>,
        desde: Option<NaiveDate>,
        hasta: Option<NaiveDate>,
    ) -> ResumenCobrador {
        let cobradas = self.comisiones_en_rango(&self.almacen.pago_cobrador, cobrador_id, desde, hasta);
        reportes::resumen_cobrador(&cobradas)
    }

    pub fn comisiones_dia(&self, fecha: NaiveDate) -> ComisionesDia {
        let (vendedor, cobrador, _) = self.totales_comisiones_fecha(fecha);
        let total_pagos: Money = self
            .almacen
            .pagos
            .values()
            .filter(|p| p.fecha_pago == fecha)
            .map(|p| p.monto)
            .sum();
        reportes::comisiones_dia(fecha, total_pagos, vendedor, cobrador)
    }

    pub fn ranking_empleados(
        &self,
        desde: Option<NaiveDate>,
        hasta: Option<NaiveDate>,
    ) -> RankingEmpleados {
        let vendedores = self.comisiones_en_rango(&self.almacen.pago_vendedor, None, desde, hasta);
        let cobradores = self.comisiones_en_rango(&self.almacen.pago_cobrador, None, desde, hasta);
        RankingEmpleados {
            vendedores: reportes::ranking(&vendedores),
            cobradores: reportes::ranking(&cobradores),
        }
    }

    // ----- metrics -----

    pub fn resumen_general(&self, time: &SafeTimeProvider) -> ResumenGeneral {
        let hoy = time.now().date_naive();
        let prestamos: Vec<&Prestamo> = self.almacen.prestamos.values().collect();
        let pagos: Vec<&Pago> = self.almacen.pagos.values().collect();
        metrics::resumen_general(self.almacen.clientes.len(), &prestamos, &pagos, hoy)
    }

    /// installments due between today and today + dias
    pub fn cuotas_por_vencer(&self, dias: i64, time: &SafeTimeProvider) -> Vec<CuotaPorVencer> {
        let hoy = time.now().date_naive();
        let pares: Vec<(&Prestamo, Money)> = self
            .almacen
            .prestamos
            .values()
            .map(|p| (p, self.total_pagado(p.id)))
            .collect();
        metrics::cuotas_por_vencer(&pares, hoy, dias)
    }

    pub fn top_clientes(&self, limite: usize) -> Vec<TopCliente> {
        let clientes: Vec<&Cliente> = self.almacen.clientes.values().collect();
        let prestamos: Vec<&Prestamo> = self.almacen.prestamos.values().collect();
        metrics::top_clientes(&clientes, &prestamos, limite)
    }

    // ----- helpers -----

    fn contar_pagos(&self, prestamo_id: PrestamoId) -> u32 {
        self.almacen
            .pagos
            .values()
            .filter(|p| p.prestamo_id == prestamo_id)
            .count() as u32
    }

    fn total_pagado(&self, prestamo_id: PrestamoId) -> Money {
        self.almacen
            .pagos
            .values()
            .filter(|p| p.prestamo_id == prestamo_id)
            .map(|p| p.monto)
            .sum()
    }

    /// (vendedor, cobrador, total) commission sums for payments of a date
    fn totales_comisiones_fecha(&self, fecha: NaiveDate) -> (Money, Money, Money) {
        let mut vendedor = Money::ZERO;
        let mut cobrador = Money::ZERO;
        for pago in self.almacen.pagos.values().filter(|p| p.fecha_pago == fecha) {
            if let Some(c) = self.almacen.pago_vendedor.get(&pago.id) {
                vendedor += c.monto_comision;
            }
            if let Some(c) = self.almacen.pago_cobrador.get(&pago.id) {
                cobrador += c.monto_comision;
            }
        }
        (vendedor, cobrador, vendedor + cobrador)
    }

    fn comisiones_en_rango<'a>(
        &'a self,
        mapa: &'a std::collections::BTreeMap<PagoId, ComisionPago>,
        empleado_id: Option<EmpleadoId>,
        desde: Option<NaiveDate>,
        hasta: Option<NaiveDate>,
    ) -> Vec<&'a ComisionPago> {
        mapa.values()
            .filter(|c| empleado_id.map_or(true, |e| c.empleado_id == e))
            .filter(|c| {
                self.almacen
                    .pagos
                    .get(&c.pago_id)
                    .map_or(false, |p| en_rango(p.fecha_pago, desde, hasta))
            })
            .collect()
    }

    fn calcular_resumen_empleado(
        &self,
        fecha: NaiveDate,
        empleado_id: EmpleadoId,
    ) -> ResumenCajaEmpleado {
        let mut ingresos_cobrados = Money::ZERO;
        let mut comision_ganada = Money::ZERO;
        for pago in self.almacen.pagos.values().filter(|p| p.fecha_pago == fecha) {
            if let Some(c) = self.almacen.pago_cobrador.get(&pago.id) {
                if c.empleado_id == empleado_id {
                    ingresos_cobrados += pago.monto;
                    comision_ganada += c.monto_comision;
                }
            }
            if let Some(c) = self.almacen.pago_vendedor.get(&pago.id) {
                if c.empleado_id == empleado_id {
                    comision_ganada += c.monto_comision;
                }
            }
        }

        let movimientos: Vec<&MovimientoCajaEmpleado> = self
            .almacen
            .movimientos_empleado
            .iter()
            .filter(|m| m.fecha == fecha && m.empleado_id == empleado_id)
            .collect();
        ingresos_cobrados += movimientos
            .iter()
            .filter(|m| m.tipo == TipoMovimiento::Ingreso)
            .map(|m| m.monto)
            .sum::<Money>();

        let estado = self.almacen.estado_dia_empleado(fecha, empleado_id);
        caja::empleado::calcular_resumen(
            fecha,
            empleado_id,
            ingresos_cobrados,
            comision_ganada,
            &movimientos,
            &estado,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CobradorPago;
    use crate::types::{EstadoCuota, Puesto, Rol};
    use chrono::{TimeZone, Utc};
    use hourglass_rs::TimeSource;
    use rust_decimal_macros::dec;
    use std::sync::{Arc, Mutex};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn reloj(y: i32, m: u32, day: u32) -> SafeTimeProvider {
        SafeTimeProvider::new(TimeSource::Test(
            Utc.with_ymd_and_hms(y, m, day, 12, 0, 0).unwrap(),
        ))
    }

    fn admin() -> Sesion {
        Sesion::new(1, "admin", Rol::Admin, None)
    }

    fn nuevo_cliente(nombre: &str) -> NuevoCliente {
        NuevoCliente {
            nombre: nombre.to_string(),
            dni: "12345678".to_string(),
            telefono: "555-0100".to_string(),
            email: None,
            direccion: None,
        }
    }

    fn nuevo_empleado(nombre: &str, puesto: Puesto) -> NuevoEmpleado {
        NuevoEmpleado {
            nombre: nombre.to_string(),
            puesto,
            dni: "87654321".to_string(),
            telefono: None,
            email: None,
            direccion: None,
            fecha_nacimiento: None,
        }
    }

    fn prestamo_de_referencia(gestor: &mut Gestor, time: &SafeTimeProvider) -> Prestamo {
        let cliente = gestor.crear_cliente(nuevo_cliente("Juan"), time);
        gestor
            .crear_prestamo(
                NuevoPrestamo {
                    cliente_id: cliente.id,
                    monto: Money::from_major(10_000),
                    tasa_interes: dec!(20),
                    plazo_dias: 28,
                    frecuencia_pago: crate::types::FrecuenciaPago::Semanal,
                    fecha_inicio: d(2024, 1, 1),
                },
                time,
            )
            .unwrap()
    }

    fn pago_simple(prestamo_id: PrestamoId, monto: i64, fecha: NaiveDate) -> NuevoPago {
        NuevoPago {
            prestamo_id,
            monto: Money::from_major(monto),
            fecha_pago: fecha,
            metodo_pago: Some("efectivo".to_string()),
            notas: None,
            tipo_pago: None,
            cobrador: None,
        }
    }

    #[test]
    fn test_crear_prestamo_calcula_totales() {
        let time = reloj(2024, 1, 1);
        let mut gestor = Gestor::new();
        let prestamo = prestamo_de_referencia(&mut gestor, &time);

        assert_eq!(prestamo.monto_total, Money::from_major(12_000));
        assert_eq!(prestamo.cuotas_totales, 4);
        assert_eq!(prestamo.valor_cuota, Money::from_major(3_000));
        assert_eq!(prestamo.saldo_pendiente, Money::from_major(12_000));
        assert_eq!(prestamo.fecha_vencimiento, d(2024, 1, 29));

        // disbursement lands in the cash ledger
        let movimientos = gestor.movimientos(d(2024, 1, 1));
        assert_eq!(movimientos.len(), 1);
        assert_eq!(movimientos[0].tipo, TipoMovimiento::Egreso);
        assert_eq!(movimientos[0].monto, Money::from_major(10_000));
        assert_eq!(movimientos[0].categoria, CATEGORIA_DESEMBOLSO);
    }

    #[test]
    fn test_crear_prestamo_cliente_inexistente() {
        let time = reloj(2024, 1, 1);
        let mut gestor = Gestor::new();
        let err = gestor
            .crear_prestamo(
                NuevoPrestamo {
                    cliente_id: 99,
                    monto: Money::from_major(1_000),
                    tasa_interes: dec!(10),
                    plazo_dias: 14,
                    frecuencia_pago: crate::types::FrecuenciaPago::Semanal,
                    fecha_inicio: d(2024, 1, 1),
                },
                &time,
            )
            .unwrap_err();
        assert!(matches!(err, GestorError::ClienteNotFound { id: 99 }));
    }

    #[test]
    fn test_pago_actualiza_prestamo_y_caja() {
        let time = reloj(2024, 1, 8);
        let mut gestor = Gestor::new();
        let prestamo = prestamo_de_referencia(&mut gestor, &time);

        gestor
            .registrar_pago(pago_simple(prestamo.id, 3_000, d(2024, 1, 8)), &time)
            .unwrap();

        let actualizado = gestor.prestamo(prestamo.id, &time).unwrap();
        assert_eq!(actualizado.saldo_pendiente, Money::from_major(9_000));
        assert_eq!(actualizado.cuotas_pagadas, 1);
        assert_eq!(actualizado.estado, EstadoPrestamo::Activo);

        let movimientos = gestor.movimientos(d(2024, 1, 8));
        assert_eq!(movimientos.len(), 1);
        assert_eq!(movimientos[0].tipo, TipoMovimiento::Ingreso);
        assert_eq!(movimientos[0].categoria, CATEGORIA_PAGO_CUOTA);
    }

    #[test]
    fn test_secuencia_completa_liquida_prestamo() {
        let time = reloj(2024, 1, 8);
        let mut gestor = Gestor::new();
        let prestamo = prestamo_de_referencia(&mut gestor, &time);

        for semana in 0..4 {
            gestor
                .registrar_pago(
                    pago_simple(prestamo.id, 3_000, d(2024, 1, 8 + semana * 7)),
                    &time,
                )
                .unwrap();
        }

        let final_ = gestor.prestamo(prestamo.id, &time).unwrap();
        assert_eq!(final_.saldo_pendiente, Money::ZERO);
        assert_eq!(final_.estado, EstadoPrestamo::Pagado);
        assert_eq!(final_.cuotas_pagadas, 4);

        // a fifth payment hits a closed loan
        let err = gestor
            .registrar_pago(pago_simple(prestamo.id, 100, d(2024, 2, 5)), &time)
            .unwrap_err();
        assert!(matches!(err, GestorError::LoanClosed { .. }));
    }

    #[test]
    fn test_sobrepago_rechazado() {
        let time = reloj(2024, 1, 8);
        let mut gestor = Gestor::new();
        let prestamo = prestamo_de_referencia(&mut gestor, &time);

        let err = gestor
            .registrar_pago(pago_simple(prestamo.id, 13_000, d(2024, 1, 8)), &time)
            .unwrap_err();
        assert!(matches!(err, GestorError::Overpayment { .. }));
        assert_eq!(err.status_code(), 409);

        // nothing was written
        let intacto = gestor.prestamo(prestamo.id, &time).unwrap();
        assert_eq!(intacto.saldo_pendiente, Money::from_major(12_000));
        assert!(gestor.movimientos(d(2024, 1, 8)).is_empty());
        assert!(gestor.pagos().is_empty());
    }

    #[test]
    fn test_eliminar_pago_es_inverso() {
        let time = reloj(2024, 1, 8);
        let mut gestor = Gestor::new();
        let prestamo = prestamo_de_referencia(&mut gestor, &time);
        let antes = gestor.prestamo(prestamo.id, &time).unwrap();

        let pago = gestor
            .registrar_pago(pago_simple(prestamo.id, 3_000, d(2024, 1, 8)), &time)
            .unwrap();
        gestor.eliminar_pago(pago.id, &time).unwrap();

        let despues = gestor.prestamo(prestamo.id, &time).unwrap();
        assert_eq!(despues.saldo_pendiente, antes.saldo_pendiente);
        assert_eq!(despues.cuotas_pagadas, antes.cuotas_pagadas);
        assert_eq!(despues.estado, antes.estado);
        // cash ingreso gone too
        assert!(gestor.movimientos(d(2024, 1, 8)).is_empty());
    }

    #[test]
    fn test_eliminar_pago_reabre_prestamo_pagado() {
        let time = reloj(2024, 1, 8);
        let mut gestor = Gestor::new();
        let prestamo = prestamo_de_referencia(&mut gestor, &time);

        let pago = gestor
            .registrar_pago(pago_simple(prestamo.id, 12_000, d(2024, 1, 8)), &time)
            .unwrap();
        assert_eq!(
            gestor.prestamo(prestamo.id, &time).unwrap().estado,
            EstadoPrestamo::Pagado
        );

        gestor.eliminar_pago(pago.id, &time).unwrap();
        assert_eq!(
            gestor.prestamo(prestamo.id, &time).unwrap().estado,
            EstadoPrestamo::Activo
        );
    }

    #[test]
    fn test_comisiones_de_pago() {
        let time = reloj(2024, 1, 8);
        let mut gestor = Gestor::new();
        let prestamo = prestamo_de_referencia(&mut gestor, &time);
        let vendedor = gestor.crear_empleado(nuevo_empleado("Ana", Puesto::Vendedor), &time);
        let cobrador = gestor.crear_empleado(nuevo_empleado("Luis", Puesto::Cobrador), &time);

        let pv = gestor
            .aprobar_prestamo(
                &admin(),
                prestamo.id,
                vendedor.id,
                BaseComision::Total,
                dec!(5),
                &time,
            )
            .unwrap();
        assert_eq!(pv.monto_comision, Money::from_major(600));

        let mut nuevo = pago_simple(prestamo.id, 3_000, d(2024, 1, 8));
        nuevo.cobrador = Some(CobradorPago {
            empleado_id: cobrador.id,
            porcentaje: dec!(2),
        });
        let pago = gestor.registrar_pago(nuevo, &time).unwrap();

        let cc = gestor.comision_cobrador(pago.id).unwrap().unwrap();
        assert_eq!(cc.monto_comision, Money::from_major(60));
        let cv = gestor.comision_vendedor(pago.id).unwrap().unwrap();
        assert_eq!(cv.monto_comision, Money::from_major(150));

        // a payment without collector attribution has no record, not an error
        let sin = gestor
            .registrar_pago(pago_simple(prestamo.id, 1_000, d(2024, 1, 9)), &time)
            .unwrap();
        assert!(gestor.comision_cobrador(sin.id).unwrap().is_none());
    }

    #[test]
    fn test_aprobar_prestamo_sobreescribe() {
        let time = reloj(2024, 1, 8);
        let mut gestor = Gestor::new();
        let prestamo = prestamo_de_referencia(&mut gestor, &time);
        let vendedor = gestor.crear_empleado(nuevo_empleado("Ana", Puesto::Vendedor), &time);

        gestor
            .aprobar_prestamo(
                &admin(),
                prestamo.id,
                vendedor.id,
                BaseComision::Total,
                dec!(5),
                &time,
            )
            .unwrap();
        let corregido = gestor
            .aprobar_prestamo(
                &admin(),
                prestamo.id,
                vendedor.id,
                BaseComision::Interes,
                dec!(10),
                &time,
            )
            .unwrap();

        // one record per loan, the later approval wins
        assert_eq!(corregido.monto_base, Money::from_major(2_000));
        let guardado = gestor.vendedor_de_prestamo(prestamo.id).unwrap().unwrap();
        assert_eq!(guardado.monto_comision, Money::from_major(200));
    }

    #[test]
    fn test_aprobar_requiere_admin() {
        let time = reloj(2024, 1, 8);
        let mut gestor = Gestor::new();
        let prestamo = prestamo_de_referencia(&mut gestor, &time);
        let vendedor = gestor.crear_empleado(nuevo_empleado("Ana", Puesto::Vendedor), &time);

        let sesion = Sesion::new(2, "ana", Rol::Vendedor, Some(vendedor.id));
        let err = gestor
            .aprobar_prestamo(
                &sesion,
                prestamo.id,
                vendedor.id,
                BaseComision::Total,
                dec!(5),
                &time,
            )
            .unwrap_err();
        assert_eq!(err.status_code(), 401);
    }

    #[test]
    fn test_aprobar_pago_cobrador_corrige() {
        let time = reloj(2024, 1, 8);
        let mut gestor = Gestor::new();
        let prestamo = prestamo_de_referencia(&mut gestor, &time);
        let cobrador = gestor.crear_empleado(nuevo_empleado("Luis", Puesto::Cobrador), &time);

        let mut nuevo = pago_simple(prestamo.id, 3_000, d(2024, 1, 8));
        nuevo.cobrador = Some(CobradorPago {
            empleado_id: cobrador.id,
            porcentaje: dec!(2),
        });
        let pago = gestor.registrar_pago(nuevo, &time).unwrap();

        let aprobado = gestor
            .aprobar_pago_cobrador(&admin(), pago.id, cobrador.id, dec!(3), &time)
            .unwrap();
        assert!(aprobado.aprobado);
        assert_eq!(aprobado.monto_comision, Money::from_major(90));
        assert_eq!(
            gestor
                .comision_cobrador(pago.id)
                .unwrap()
                .unwrap()
                .monto_comision,
            Money::from_major(90)
        );
    }

    #[test]
    fn test_refinanciar_congela_origen() {
        let time = reloj(2024, 2, 5);
        let mut gestor = Gestor::new();
        let prestamo = prestamo_de_referencia(&mut gestor, &time);
        gestor
            .registrar_pago(pago_simple(prestamo.id, 6_000, d(2024, 1, 8)), &time)
            .unwrap();

        let nuevo = gestor
            .refinanciar(
                prestamo.id,
                SolicitudRefinanciacion {
                    interes_adicional: dec!(10),
                    cuotas: 4,
                    frecuencia_pago: crate::types::FrecuenciaPago::Semanal,
                    fecha_inicio: d(2024, 2, 5),
                },
                &time,
            )
            .unwrap();

        // 6000 * 1.10, interest folded into principal
        assert_eq!(nuevo.monto, Money::from_major(6_600));
        assert_eq!(nuevo.monto_total, nuevo.monto);
        assert_eq!(nuevo.saldo_pendiente, Money::from_major(6_600));
        assert_eq!(nuevo.valor_cuota, Money::from_major(1_650));

        let origen = gestor.prestamo(prestamo.id, &time).unwrap();
        assert_eq!(origen.estado, EstadoPrestamo::Refinanciado);
        assert_eq!(origen.saldo_pendiente, Money::from_major(6_000));

        // frozen: no more payments on the source
        let err = gestor
            .registrar_pago(pago_simple(prestamo.id, 100, d(2024, 2, 5)), &time)
            .unwrap_err();
        assert!(matches!(err, GestorError::LoanClosed { .. }));
    }

    #[test]
    fn test_refinanciar_sin_saldo_falla_sin_tocar_origen() {
        let time = reloj(2024, 1, 8);
        let mut gestor = Gestor::new();
        let prestamo = prestamo_de_referencia(&mut gestor, &time);
        gestor
            .registrar_pago(pago_simple(prestamo.id, 12_000, d(2024, 1, 8)), &time)
            .unwrap();

        let err = gestor
            .refinanciar(
                prestamo.id,
                SolicitudRefinanciacion {
                    interes_adicional: dec!(10),
                    cuotas: 4,
                    frecuencia_pago: crate::types::FrecuenciaPago::Semanal,
                    fecha_inicio: d(2024, 2, 5),
                },
                &time,
            )
            .unwrap_err();
        assert!(matches!(err, GestorError::NothingToRefinance { .. }));
        assert_eq!(gestor.prestamos(&time).len(), 1);
        assert_eq!(
            gestor.prestamo(prestamo.id, &time).unwrap().estado,
            EstadoPrestamo::Pagado
        );
    }

    #[test]
    fn test_tabla_amortizacion_del_prestamo() {
        let time = reloj(2024, 1, 17);
        let mut gestor = Gestor::new();
        let prestamo = prestamo_de_referencia(&mut gestor, &time);
        gestor
            .registrar_pago(pago_simple(prestamo.id, 3_000, d(2024, 1, 8)), &time)
            .unwrap();

        let tabla = gestor.tabla_amortizacion(prestamo.id, &time).unwrap();
        assert_eq!(tabla.len(), 4);
        assert_eq!(tabla[0].estado, EstadoCuota::Pagado);
        assert_eq!(tabla[1].estado, EstadoCuota::Vencido);
        assert_eq!(tabla[2].estado, EstadoCuota::Pendiente);
    }

    #[test]
    fn test_cierre_caja_formula() {
        let time = reloj(2024, 1, 8);
        let mut gestor = Gestor::new();
        let prestamo = prestamo_de_referencia(&mut gestor, &time);
        let cobrador = gestor.crear_empleado(nuevo_empleado("Luis", Puesto::Cobrador), &time);

        let mut nuevo = pago_simple(prestamo.id, 3_000, d(2024, 1, 8));
        nuevo.cobrador = Some(CobradorPago {
            empleado_id: cobrador.id,
            porcentaje: dec!(2),
        });
        gestor.registrar_pago(nuevo, &time).unwrap();

        gestor
            .registrar_movimiento(
                &admin(),
                NuevoMovimiento {
                    fecha: d(2024, 1, 8),
                    tipo: TipoMovimiento::Egreso,
                    monto: Money::from_major(500),
                    categoria: "gastos".to_string(),
                    descripcion: "papelería".to_string(),
                    referencia_tipo: None,
                    referencia_id: None,
                },
            )
            .unwrap();

        let cierre = gestor.cierre_caja(d(2024, 1, 8));
        assert_eq!(cierre.ingresos, Money::from_major(3_000));
        assert_eq!(cierre.egresos, Money::from_major(500));
        assert_eq!(cierre.comisiones_total, Money::from_major(60));
        // ingresos - egresos - comisiones
        assert_eq!(cierre.saldo_esperado, Money::from_major(2_440));
        assert!(!cierre.cerrado);
    }

    #[test]
    fn test_cerrar_dia_congela_y_reabrir_es_idempotente() {
        let mut gestor = Gestor::new();
        let sesion = admin();

        let cierre = gestor.cerrar_dia(&sesion, d(2024, 1, 8)).unwrap();
        assert!(cierre.cerrado);
        assert_eq!(cierre.saldo_final, Some(cierre.saldo_esperado));

        // second close conflicts
        let err = gestor.cerrar_dia(&sesion, d(2024, 1, 8)).unwrap_err();
        assert!(matches!(err, GestorError::DayClosed { .. }));

        // movements rejected while closed
        let err = gestor
            .registrar_movimiento(
                &sesion,
                NuevoMovimiento {
                    fecha: d(2024, 1, 8),
                    tipo: TipoMovimiento::Ingreso,
                    monto: Money::from_major(100),
                    categoria: "otros".to_string(),
                    descripcion: String::new(),
                    referencia_tipo: None,
                    referencia_id: None,
                },
            )
            .unwrap_err();
        assert!(matches!(err, GestorError::DayClosed { .. }));

        // reopen any number of times
        gestor.abrir_dia(&sesion, d(2024, 1, 8)).unwrap();
        let reabierto = gestor.abrir_dia(&sesion, d(2024, 1, 8)).unwrap();
        assert!(!reabierto.cerrado);
        assert_eq!(reabierto.saldo_final, None);

        // and the ledger accepts movements again
        gestor
            .registrar_movimiento(
                &sesion,
                NuevoMovimiento {
                    fecha: d(2024, 1, 8),
                    tipo: TipoMovimiento::Ingreso,
                    monto: Money::from_major(100),
                    categoria: "otros".to_string(),
                    descripcion: String::new(),
                    referencia_tipo: None,
                    referencia_id: None,
                },
            )
            .unwrap();
    }

    #[test]
    fn test_pago_en_dia_cerrado_rechazado() {
        let time = reloj(2024, 1, 8);
        let mut gestor = Gestor::new();
        let prestamo = prestamo_de_referencia(&mut gestor, &time);

        gestor.cerrar_dia(&admin(), d(2024, 1, 8)).unwrap();
        let err = gestor
            .registrar_pago(pago_simple(prestamo.id, 3_000, d(2024, 1, 8)), &time)
            .unwrap_err();
        assert!(matches!(err, GestorError::DayClosed { .. }));
    }

    #[test]
    fn test_caja_empleado_resumen_y_cierre() {
        let time = reloj(2024, 1, 8);
        let mut gestor = Gestor::new();
        let prestamo = prestamo_de_referencia(&mut gestor, &time);
        let cobrador = gestor.crear_empleado(nuevo_empleado("Luis", Puesto::Cobrador), &time);
        let sesion = Sesion::new(3, "luis", Rol::Cobrador, Some(cobrador.id));

        let mut nuevo = pago_simple(prestamo.id, 3_000, d(2024, 1, 8));
        nuevo.cobrador = Some(CobradorPago {
            empleado_id: cobrador.id,
            porcentaje: dec!(2),
        });
        gestor.registrar_pago(nuevo, &time).unwrap();

        let resumen = gestor.resumen_caja_empleado(&sesion, d(2024, 1, 8)).unwrap();
        assert_eq!(resumen.ingresos_cobrados, Money::from_major(3_000));
        assert_eq!(resumen.comision_ganada, Money::from_major(60));
        assert_eq!(resumen.depositos, Money::ZERO);
        assert_eq!(resumen.saldo_esperado_entregar, Money::from_major(3_060));

        let cerrado = gestor.cerrar_dia_empleado(&sesion, d(2024, 1, 8)).unwrap();
        assert!(cerrado.cerrado);
        assert_eq!(cerrado.entregado, Some(Money::from_major(3_060)));

        // the employee ledger is frozen, the admin one is not
        let err = gestor
            .registrar_movimiento_empleado(
                &sesion,
                d(2024, 1, 8),
                TipoMovimiento::Ingreso,
                Money::from_major(50),
                "otros".to_string(),
                String::new(),
            )
            .unwrap_err();
        assert!(matches!(err, GestorError::DayClosed { .. }));
        assert!(!gestor.cierre_caja(d(2024, 1, 8)).cerrado);

        gestor.abrir_dia_empleado(&sesion, d(2024, 1, 8)).unwrap();
        gestor
            .registrar_movimiento_empleado(
                &sesion,
                d(2024, 1, 8),
                TipoMovimiento::Ingreso,
                Money::from_major(50),
                "otros".to_string(),
                String::new(),
            )
            .unwrap();
    }

    #[test]
    fn test_cobrador_no_registra_depositos() {
        let time = reloj(2024, 1, 8);
        let mut gestor = Gestor::new();
        let cobrador = gestor.crear_empleado(nuevo_empleado("Luis", Puesto::Cobrador), &time);
        let vendedor = gestor.crear_empleado(nuevo_empleado("Ana", Puesto::Vendedor), &time);

        let sesion_cobrador = Sesion::new(3, "luis", Rol::Cobrador, Some(cobrador.id));
        let err = gestor
            .registrar_movimiento_empleado(
                &sesion_cobrador,
                d(2024, 1, 8),
                TipoMovimiento::Egreso,
                Money::from_major(1_000),
                CATEGORIA_DEPOSITO.to_string(),
                String::new(),
            )
            .unwrap_err();
        assert_eq!(err.status_code(), 401);

        // a seller session can deposit and it reduces what they owe
        let sesion_vendedor = Sesion::new(4, "ana", Rol::Vendedor, Some(vendedor.id));
        gestor
            .registrar_movimiento_empleado(
                &sesion_vendedor,
                d(2024, 1, 8),
                TipoMovimiento::Egreso,
                Money::from_major(1_000),
                CATEGORIA_DEPOSITO.to_string(),
                String::new(),
            )
            .unwrap();
        let resumen = gestor
            .resumen_caja_empleado(&sesion_vendedor, d(2024, 1, 8))
            .unwrap();
        assert_eq!(resumen.depositos, Money::from_major(1_000));
        assert_eq!(
            resumen.saldo_esperado_entregar,
            Money::from_major(-1_000)
        );
    }

    #[test]
    fn test_ranking_cuadra_con_filas() {
        let time = reloj(2024, 1, 8);
        let mut gestor = Gestor::new();
        let prestamo = prestamo_de_referencia(&mut gestor, &time);
        let luis = gestor.crear_empleado(nuevo_empleado("Luis", Puesto::Cobrador), &time);
        let marta = gestor.crear_empleado(nuevo_empleado("Marta", Puesto::Cobrador), &time);

        for (empleado_id, monto, dia) in [(luis.id, 3_000, 8), (marta.id, 2_000, 9), (luis.id, 1_000, 10)] {
            let mut nuevo = pago_simple(prestamo.id, monto, d(2024, 1, dia));
            nuevo.cobrador = Some(CobradorPago {
                empleado_id,
                porcentaje: dec!(2),
            });
            gestor.registrar_pago(nuevo, &time).unwrap();
        }

        let ranking = gestor.ranking_empleados(None, None);
        assert_eq!(ranking.cobradores.len(), 2);
        assert_eq!(ranking.cobradores[0].empleado_id, luis.id);
        assert_eq!(
            ranking.cobradores[0].total_comisiones,
            Money::from_major(80)
        );
        assert_eq!(ranking.cobradores[0].cantidad_pagos, 2);

        let suma_filas = gestor.resumen_comisiones_cobrador(None, None, None).comisiones_cobradas;
        let suma_ranking: Money = ranking
            .cobradores
            .iter()
            .map(|e| e.total_comisiones)
            .sum();
        assert_eq!(suma_filas, suma_ranking);

        // the date window filters both views the same way
        let ventana = gestor.ranking_empleados(Some(d(2024, 1, 9)), Some(d(2024, 1, 10)));
        let resumen_ventana =
            gestor.resumen_comisiones_cobrador(None, Some(d(2024, 1, 9)), Some(d(2024, 1, 10)));
        let suma_ventana: Money = ventana
            .cobradores
            .iter()
            .map(|e| e.total_comisiones)
            .sum();
        assert_eq!(resumen_ventana.comisiones_cobradas, suma_ventana);
    }

    #[test]
    fn test_resumen_vendedor_esperadas_vs_cobradas() {
        let time = reloj(2024, 1, 8);
        let mut gestor = Gestor::new();
        let prestamo = prestamo_de_referencia(&mut gestor, &time);
        let ana = gestor.crear_empleado(nuevo_empleado("Ana", Puesto::Vendedor), &time);

        gestor
            .aprobar_prestamo(&admin(), prestamo.id, ana.id, BaseComision::Total, dec!(5), &time)
            .unwrap();
        gestor
            .registrar_pago(pago_simple(prestamo.id, 3_000, d(2024, 1, 8)), &time)
            .unwrap();

        let resumen = gestor.resumen_comisiones_vendedor(Some(ana.id), None, None);
        assert_eq!(resumen.comisiones_esperadas, Money::from_major(600));
        assert_eq!(resumen.comisiones_cobradas, Money::from_major(150));
        assert_eq!(resumen.comisiones_pendientes, Money::from_major(450));
        assert_eq!(resumen.porcentaje_cobrado, dec!(25));

        let detalle = gestor.detalle_comisiones_vendedor(ana.id).unwrap();
        assert_eq!(detalle.prestamos.len(), 1);
        assert_eq!(detalle.comision_pendiente_total, Money::from_major(450));
    }

    #[test]
    fn test_comisiones_dia_e_ingreso_neto() {
        let time = reloj(2024, 1, 8);
        let mut gestor = Gestor::new();
        let prestamo = prestamo_de_referencia(&mut gestor, &time);
        let cobrador = gestor.crear_empleado(nuevo_empleado("Luis", Puesto::Cobrador), &time);

        let mut nuevo = pago_simple(prestamo.id, 3_000, d(2024, 1, 8));
        nuevo.cobrador = Some(CobradorPago {
            empleado_id: cobrador.id,
            porcentaje: dec!(2),
        });
        gestor.registrar_pago(nuevo, &time).unwrap();

        let dia = gestor.comisiones_dia(d(2024, 1, 8));
        assert_eq!(dia.total_pagos_cobrados, Money::from_major(3_000));
        assert_eq!(dia.cobrador, Money::from_major(60));
        assert_eq!(dia.total, Money::from_major(60));
        assert_eq!(dia.ingreso_neto, Money::from_major(2_940));
    }

    #[test]
    fn test_resumen_general_del_gestor() {
        let time = reloj(2024, 1, 8);
        let mut gestor = Gestor::new();
        let prestamo = prestamo_de_referencia(&mut gestor, &time);
        gestor
            .registrar_pago(pago_simple(prestamo.id, 3_000, d(2024, 1, 8)), &time)
            .unwrap();

        let resumen = gestor.resumen_general(&time);
        assert_eq!(resumen.total_clientes, 1);
        assert_eq!(resumen.total_prestamos, 1);
        assert_eq!(resumen.monto_total_recaudado, Money::from_major(3_000));
        assert_eq!(resumen.saldo_pendiente_total, Money::from_major(9_000));
        assert_eq!(resumen.prestamos_activos, 1);
        assert_eq!(resumen.pagos_hoy, 1);
    }

    #[test]
    fn test_eliminar_con_referencias() {
        let time = reloj(2024, 1, 8);
        let mut gestor = Gestor::new();
        let prestamo = prestamo_de_referencia(&mut gestor, &time);

        let err = gestor.eliminar_cliente(prestamo.cliente_id).unwrap_err();
        assert!(matches!(err, GestorError::ClienteConPrestamos { .. }));

        gestor
            .registrar_pago(pago_simple(prestamo.id, 3_000, d(2024, 1, 8)), &time)
            .unwrap();
        let err = gestor.eliminar_prestamo(prestamo.id).unwrap_err();
        assert!(matches!(err, GestorError::PrestamoConPagos { .. }));
    }

    #[test]
    fn test_estado_persistido_via_json() {
        let time = reloj(2024, 1, 8);
        let mut gestor = Gestor::new();
        let prestamo = prestamo_de_referencia(&mut gestor, &time);
        gestor
            .registrar_pago(pago_simple(prestamo.id, 3_000, d(2024, 1, 8)), &time)
            .unwrap();

        let json = gestor.to_json().unwrap();
        let restaurado = Gestor::from_json(&json).unwrap();

        let p = restaurado.prestamo(prestamo.id, &time).unwrap();
        assert_eq!(p.saldo_pendiente, Money::from_major(9_000));
        assert_eq!(restaurado.pagos().len(), 1);
        assert_eq!(restaurado.movimientos(d(2024, 1, 8)).len(), 1);
    }

    #[test]
    fn test_pagos_concurrentes_serializan() {
        let time = reloj(2024, 1, 8);
        let mut gestor = Gestor::new();
        let prestamo = prestamo_de_referencia(&mut gestor, &time);
        let prestamo_id = prestamo.id;

        let compartido = Arc::new(Mutex::new(gestor));
        std::thread::scope(|scope| {
            for _ in 0..4 {
                let gestor = Arc::clone(&compartido);
                scope.spawn(move || {
                    let time = reloj(2024, 1, 8);
                    let mut gestor = gestor.lock().unwrap();
                    gestor
                        .registrar_pago(
                            pago_simple(prestamo_id, 3_000, d(2024, 1, 8)),
                            &time,
                        )
                        .unwrap();
                });
            }
        });

        let gestor = compartido.lock().unwrap();
        let final_ = gestor.prestamo(prestamo_id, &reloj(2024, 1, 8)).unwrap();
        assert_eq!(final_.saldo_pendiente, Money::ZERO);
        assert_eq!(final_.cuotas_pagadas, 4);
        assert_eq!(final_.estado, EstadoPrestamo::Pagado);
    }

    #[test]
    fn test_eventos_emitidos() {
        let time = reloj(2024, 1, 8);
        let mut gestor = Gestor::new();
        let prestamo = prestamo_de_referencia(&mut gestor, &time);
        gestor
            .registrar_pago(pago_simple(prestamo.id, 12_000, d(2024, 1, 8)), &time)
            .unwrap();

        let eventos = gestor.take_events();
        assert!(eventos
            .iter()
            .any(|e| matches!(e.evento, Event::PrestamoCreado { .. })));
        assert!(eventos
            .iter()
            .any(|e| matches!(e.evento, Event::PagoRegistrado { .. })));
        assert!(eventos
            .iter()
            .any(|e| matches!(e.evento, Event::PrestamoLiquidado { .. })));
        assert!(gestor.take_events().is_empty());
    }
}
