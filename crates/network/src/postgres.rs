// SPDX-License-Identifier: LGPL-2.1-or-later
// Copyright (C) 2025 Shahzad A. Bhatti <bhatti@plexobject.com>
//
// This file is part of PlexGate.
//
// PlexGate is free software: you can redistribute it and/or modify
// it under the terms of the GNU Lesser General Public License as published by
// the Free Software Foundation, either version 2.1 of the License, or
// (at your option) any later version.
//
// PlexGate is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public License
// along with PlexGate. If not, see <https://www.gnu.org/licenses/>.

//! PostgreSQL wire-format packet builders
//!
//! Fixtures for exercising the proxy with realistic traffic. The gateway
//! core never parses these; protocol framing is the plugins' concern.

/// PostgreSQL protocol 3.0, as sent in a startup message.
const PROTOCOL_VERSION: u32 = 196_608;

/// Build a startup message: 4-byte length, protocol version, then
/// null-terminated `key\0value\0` pairs and a trailing null.
pub fn create_pg_startup_packet() -> Vec<u8> {
    let mut parameters = Vec::new();
    for (key, value) in [("user", "postgres"), ("database", "postgres")] {
        parameters.extend_from_slice(key.as_bytes());
        parameters.push(0);
        parameters.extend_from_slice(value.as_bytes());
        parameters.push(0);
    }
    parameters.push(0);

    let length = 4 + 4 + parameters.len();
    let mut packet = Vec::with_capacity(length);
    packet.extend_from_slice(&(length as u32).to_be_bytes());
    packet.extend_from_slice(&PROTOCOL_VERSION.to_be_bytes());
    packet.extend_from_slice(&parameters);
    packet
}

/// Build a typed backend packet: tag byte, 4-byte length (self-inclusive),
/// then the body.
pub fn create_postgresql_packet(tag: u8, body: &[u8]) -> Vec<u8> {
    let mut packet = Vec::with_capacity(1 + 4 + body.len());
    packet.push(tag);
    packet.extend_from_slice(&((4 + body.len()) as u32).to_be_bytes());
    packet.extend_from_slice(body);
    packet
}

/// The SASL authentication-request body used by the round-trip tests:
/// auth type 10 (SASL) plus the `SCRAM-SHA-256` mechanism list.
pub fn scram_auth_request_body() -> Vec<u8> {
    let mut body = vec![0x00, 0x00, 0x00, 0x0a];
    body.extend_from_slice(b"SCRAM-SHA-256");
    body.push(0);
    body.push(0);
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_startup_packet_layout() {
        let packet = create_pg_startup_packet();
        let length = u32::from_be_bytes(packet[0..4].try_into().unwrap()) as usize;
        assert_eq!(length, packet.len());
        let version = u32::from_be_bytes(packet[4..8].try_into().unwrap());
        assert_eq!(version, PROTOCOL_VERSION);
        // Parameters end with a double null.
        assert_eq!(packet[packet.len() - 1], 0);
        assert_eq!(packet[packet.len() - 2], 0);
    }

    #[test]
    fn test_typed_packet_layout() {
        let body = scram_auth_request_body();
        let packet = create_postgresql_packet(b'R', &body);
        assert_eq!(packet.len(), 24);
        assert_eq!(packet[0], 0x52);
        let length = u32::from_be_bytes(packet[1..5].try_into().unwrap()) as usize;
        assert_eq!(length, 23);
        assert_eq!(&packet[5..], body.as_slice());
    }
}
