//! The Modbus TCP/RTU service exposed to downstream clients, backed by
//! [`crate::registers::Registers`].

use std::future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio_modbus::prelude::*;
use tokio_modbus::server::tcp::{accept_tcp_connection, Server as TcpServer};

use crate::registers::Registers;

#[derive(Clone)]
struct GatewayService {
    registers: Arc<Registers>,
}

impl tokio_modbus::server::Service for GatewayService {
    type Request = SlaveRequest<'static>;
    type Response = Response;
    type Exception = ExceptionCode;
    type Future = future::Ready<Result<Self::Response, Self::Exception>>;

    fn call(&self, req: Self::Request) -> Self::Future {
        let result = match req.request {
            Request::ReadHoldingRegisters(addr, count) => self
                .registers
                .read(addr, count)
                .map(Response::ReadHoldingRegisters)
                .ok_or(ExceptionCode::IllegalDataAddress),
            Request::WriteSingleRegister(addr, value) => {
                if self.registers.write_single(addr, value) {
                    Ok(Response::WriteSingleRegister(addr, value))
                } else {
                    Err(ExceptionCode::IllegalDataAddress)
                }
            }
            _ => Err(ExceptionCode::IllegalFunction),
        };
        future::ready(result)
    }
}

pub async fn serve_tcp(addr: SocketAddr, registers: Arc<Registers>) {
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            log::error!("ModBusServer: couldn't listen on {} [TCP]: {}", addr, e);
            return;
        }
    };
    log::info!("ModBusServer: began listening on {} [TCP]", addr);

    let server = TcpServer::new(listener);
    let new_service = move |_socket_addr| Ok(Some(GatewayService { registers: registers.clone() }));
    let on_connected = |stream, socket_addr| async move { accept_tcp_connection(stream, socket_addr, new_service) };
    let on_process_error = |err| log::error!("ModBusServer: TCP connection error: {}", err);

    if let Err(e) = server.serve(&on_connected, on_process_error).await {
        log::error!("ModBusServer: TCP server exited: {}", e);
    }
}

pub async fn serve_rtu(serial_device: String, baud_rate: u32, slave_id: u8, registers: Arc<Registers>) {
    let builder = tokio_serial::new(&serial_device, baud_rate);
    let port = match tokio_serial::SerialStream::open(&builder) {
        Ok(p) => p,
        Err(e) => {
            log::error!("ModBusServer: couldn't open {} [Serial]: {}", serial_device, e);
            return;
        }
    };
    log::info!("ModBusServer: began listening on {} [Serial]", serial_device);

    let server = tokio_modbus::server::rtu::Server::new(port);
    let service = GatewayService { registers };
    if let Err(e) = server.serve_forever(service.clone()).await {
        log::error!("ModBusServer: RTU server exited for slave {}: {}", slave_id, e);
    }
}
