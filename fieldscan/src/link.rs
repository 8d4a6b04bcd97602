//! Transport seam between the engine and the concrete Modbus clients.
//!
//! The scan path only ever talks to the [`Transport`]/[`Link`] trait pair;
//! [`ModbusTransport`] is the production implementation over tokio-modbus,
//! one TCP or RTU client per endpoint. Tests substitute a scripted
//! transport and drive the whole engine without a bus.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use tokio_modbus::client::{rtu, tcp, Client, Context, Reader};
use tokio_modbus::slave::{Slave, SlaveContext};
use tokio_serial::{DataBits, SerialStream, StopBits};

use fieldscan_config::{
    Connection, FunctionCode, Parity, Transport as TransportKind,
};

use crate::error::LinkError;

/// Default Modbus/TCP port, used when `src` does not carry one.
const MODBUS_TCP_PORT: u16 = 502;

/// Raw payload of one successful read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawResponse {
    /// Function 1/2 payload.
    Bits(Vec<bool>),
    /// Function 3/4 payload.
    Words(Vec<u16>),
}

/// One established client channel. Implementations are not reentrant; the
/// pool wraps every link in a mutex.
#[async_trait]
pub trait Link: Send {
    /// Issue one typed read against the given slave.
    async fn read(
        &mut self,
        function: FunctionCode,
        address: u16,
        count: u16,
        slave: u8,
    ) -> Result<RawResponse, LinkError>;

    /// Release the underlying channel. Errors at teardown are moot.
    async fn close(&mut self);
}

/// Factory for links, one per distinct endpoint `src`.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Concrete client type produced by this transport.
    type Link: Link;

    /// Establish the channel described by `connection`.
    async fn connect(&self, connection: &Connection) -> Result<Self::Link, LinkError>;
}

/// Production transport: Modbus/TCP and Modbus RTU via tokio-modbus.
#[derive(Debug, Default, Clone, Copy)]
pub struct ModbusTransport;

/// A connected tokio-modbus client plus its per-request timeout.
pub struct ModbusLink {
    context: Context,
    timeout: Duration,
}

#[async_trait]
impl Transport for ModbusTransport {
    type Link = ModbusLink;

    async fn connect(&self, connection: &Connection) -> Result<ModbusLink, LinkError> {
        let timeout = connection.timeout();
        let slave = Slave(connection.config.address);
        let context = match connection.transport {
            TransportKind::Tcp => {
                let target = if connection.src.contains(':') {
                    connection.src.clone()
                } else {
                    format!("{}:{MODBUS_TCP_PORT}", connection.src)
                };
                let address = tokio::net::lookup_host(&target)
                    .await
                    .map_err(|source| connect_error(&connection.src, source))?
                    .next()
                    .ok_or_else(|| {
                        connect_error(
                            &connection.src,
                            io::Error::new(
                                io::ErrorKind::NotFound,
                                "hostname resolved to no address",
                            ),
                        )
                    })?;
                tokio::time::timeout(timeout, tcp::connect_slave(address, slave))
                    .await
                    .map_err(|_| LinkError::Timeout(timeout))?
                    .map_err(|source| connect_error(&connection.src, source))?
            }
            TransportKind::Serial => {
                // Line parameters are guaranteed by config validation; the
                // fallbacks are unreachable.
                let channel = &connection.config;
                let builder = tokio_serial::new(
                    connection.src.as_str(),
                    channel.baudrate.unwrap_or(9600),
                )
                .data_bits(match channel.bytesize {
                    Some(7) => DataBits::Seven,
                    _ => DataBits::Eight,
                })
                .parity(match channel.parity {
                    Some(Parity::O) => tokio_serial::Parity::Odd,
                    Some(Parity::E) => tokio_serial::Parity::Even,
                    _ => tokio_serial::Parity::None,
                })
                .stop_bits(match channel.stopbits {
                    Some(2) => StopBits::Two,
                    _ => StopBits::One,
                })
                .timeout(timeout);
                let port = SerialStream::open(&builder)
                    .map_err(|source| connect_error(&connection.src, source))?;
                rtu::attach_slave(port, slave)
            }
        };
        Ok(ModbusLink { context, timeout })
    }
}

#[async_trait]
impl Link for ModbusLink {
    async fn read(
        &mut self,
        function: FunctionCode,
        address: u16,
        count: u16,
        slave: u8,
    ) -> Result<RawResponse, LinkError> {
        self.context.set_slave(Slave(slave));
        let context = &mut self.context;
        let response = tokio::time::timeout(self.timeout, async move {
            match function {
                FunctionCode::Coils => context
                    .read_coils(address, count)
                    .await
                    .map(|inner| inner.map(RawResponse::Bits)),
                FunctionCode::DiscreteInputs => context
                    .read_discrete_inputs(address, count)
                    .await
                    .map(|inner| inner.map(RawResponse::Bits)),
                FunctionCode::HoldingRegisters => context
                    .read_holding_registers(address, count)
                    .await
                    .map(|inner| inner.map(RawResponse::Words)),
                FunctionCode::InputRegisters => context
                    .read_input_registers(address, count)
                    .await
                    .map(|inner| inner.map(RawResponse::Words)),
            }
        })
        .await
        .map_err(|_| LinkError::Timeout(self.timeout))?;

        match response {
            Ok(Ok(raw)) => Ok(raw),
            Ok(Err(exception)) => Err(LinkError::Protocol(format!("{exception:?}"))),
            Err(error) => Err(LinkError::Io(io::Error::new(
                io::ErrorKind::Other,
                error,
            ))),
        }
    }

    async fn close(&mut self) {
        let _ = self.context.disconnect().await;
    }
}

fn connect_error(
    endpoint: &str,
    source: impl std::error::Error + Send + Sync + 'static,
) -> LinkError {
    LinkError::Connect {
        endpoint: endpoint.to_owned(),
        source: io::Error::new(io::ErrorKind::Other, source),
    }
}
