/*
 * Copyright (C) 2026 the udpsweep contributors
 *
 * This file is part of udpsweep.
 *
 * udpsweep is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * udpsweep is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with udpsweep.  If not, see <https://www.gnu.org/licenses/>.
 */

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};

use crate::BoxResult;

/// outbound half of the datagram transport; the remote endpoint is fixed at
/// construction time
pub trait PacketSink: Send {
    fn send(&self, payload: &[u8]) -> io::Result<usize>;
}

/// inbound half of the datagram transport, already bound to its port;
/// `recv` blocks with no timeout
pub trait PacketSource: Send {
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

pub struct UdpSink {
    socket: UdpSocket,
    remote: SocketAddr,
}

impl UdpSink {
    pub fn new(remote: SocketAddr, send_buffer: usize) -> BoxResult<UdpSink> {
        let socket = match remote.ip() {
            IpAddr::V6(_) => UdpSocket::bind(SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0))?,
            IpAddr::V4(_) => UdpSocket::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0))?,
        };

        let _send_buffer = send_buffer;

        // NOTE: features unsupported on Windows
        #[cfg(unix)]
        if _send_buffer != 0 {
            log::debug!("setting send-buffer to {}...", _send_buffer);
            let raw_socket = socket2::SockRef::from(&socket);
            raw_socket.set_send_buffer_size(_send_buffer)?;
        }
        log::debug!("UDP send socket bound to {}, transmitting to {}", socket.local_addr()?, remote);

        Ok(UdpSink { socket, remote })
    }
}

impl PacketSink for UdpSink {
    fn send(&self, payload: &[u8]) -> io::Result<usize> {
        self.socket.send_to(payload, self.remote)
    }
}

pub struct UdpSource {
    socket: UdpSocket,
}

impl UdpSource {
    /// binds the listening socket on the unspecified address of the peer's
    /// family; port 0 requests OS assignment
    pub fn bind(peer_ip: IpAddr, port: u16, receive_buffer: usize) -> BoxResult<UdpSource> {
        let socket = match peer_ip {
            IpAddr::V6(_) => UdpSocket::bind(SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), port))?,
            IpAddr::V4(_) => UdpSocket::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port))?,
        };

        let _receive_buffer = receive_buffer;

        // NOTE: features unsupported on Windows
        #[cfg(unix)]
        if _receive_buffer != 0 {
            log::debug!("setting receive-buffer to {}...", _receive_buffer);
            let raw_socket = socket2::SockRef::from(&socket);
            raw_socket.set_recv_buffer_size(_receive_buffer)?;
        }
        log::debug!("UDP listening socket bound to {}", socket.local_addr()?);

        Ok(UdpSource { socket })
    }

    pub fn local_port(&self) -> io::Result<u16> {
        Ok(self.socket.local_addr()?.port())
    }
}

impl PacketSource for UdpSource {
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let (packet_size, _peer_addr) = self.socket.recv_from(buf)?;
        Ok(packet_size)
    }
}
