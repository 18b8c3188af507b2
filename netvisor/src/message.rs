// NetVisor: Network Hypervisor for Virtual Big Switches
// Copyright (C) 2021  Tibor Schneider
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! # OpenFlow Messages
//!
//! The hypervisor does not parse the wire format. It only needs to know the transaction id of a
//! message, the ports it references, and in which direction it may cross the boundary between the
//! physical and the virtual layer:
//!
//! - *virtualize*: from a physical switch towards a tenant controller,
//! - *devirtualize*: from a tenant controller towards the physical network.

use crate::types::{PortNumber, Xid};
use serde::{Deserialize, Serialize};

/// OpenFlow 1.0 message type codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// Connection setup
    Hello,
    /// Error notification
    Error,
    /// Keep-alive request
    EchoRequest,
    /// Keep-alive reply
    EchoReply,
    /// Request of the switch features
    FeaturesRequest,
    /// Switch features, sent during the handshake
    FeaturesReply,
    /// Packet sent to the controller
    PacketIn,
    /// Port was added, removed or modified
    PortStatus,
    /// Packet sent by the controller
    PacketOut,
    /// Flow table modification
    FlowMod,
    /// Statistics request
    StatsRequest,
    /// Statistics reply
    StatsReply,
    /// Barrier request
    BarrierRequest,
    /// Barrier reply
    BarrierReply,
}

impl MessageType {
    /// Returns true if a message of this type may travel from the physical network towards a
    /// tenant controller.
    pub fn is_virtualizable(&self) -> bool {
        matches!(
            self,
            Self::Error
                | Self::EchoReply
                | Self::PacketIn
                | Self::PortStatus
                | Self::StatsReply
                | Self::BarrierReply
        )
    }

    /// Returns true if a message of this type may travel from a tenant controller towards the
    /// physical network.
    pub fn is_devirtualizable(&self) -> bool {
        matches!(self, Self::PacketOut | Self::FlowMod | Self::StatsRequest | Self::BarrierRequest)
    }

    /// Returns true if the message is a reply to a request with the same transaction id.
    pub fn is_reply(&self) -> bool {
        matches!(self, Self::Error | Self::EchoReply | Self::StatsReply | Self::BarrierReply)
    }
}

/// Reason of a port status message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortReason {
    /// The port was added
    Add,
    /// The port was removed
    Delete,
    /// Some attribute of the port has changed
    Modify,
}

/// Description of a physical port, as announced by the switch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortDesc {
    /// Port number
    pub port_no: PortNumber,
    /// Hardware address
    #[serde(default)]
    pub hw_addr: [u8; 6],
    /// Human readable name of the interface
    #[serde(default)]
    pub name: String,
}

impl PortDesc {
    /// Port description with only the port number set
    pub fn new(port_no: PortNumber) -> Self {
        Self { port_no, hw_addr: [0; 6], name: format!("eth{}", port_no) }
    }
}

/// Counters of a single port
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PortStatistics {
    /// Number of received packets
    pub rx_packets: u64,
    /// Number of transmitted packets
    pub tx_packets: u64,
    /// Number of received bytes
    pub rx_bytes: u64,
    /// Number of transmitted bytes
    pub tx_bytes: u64,
    /// Number of packets dropped by RX
    pub rx_dropped: u64,
    /// Number of packets dropped by TX
    pub tx_dropped: u64,
    /// Number of receive errors
    pub rx_errors: u64,
    /// Number of transmit errors
    pub tx_errors: u64,
}

/// Body of a statistics request
#[derive(Debug, Clone, PartialEq)]
pub enum StatsRequest {
    /// Switch description
    Desc,
    /// Port counters of a single port, or of all ports if `None`.
    Port(Option<PortNumber>),
}

/// Body of a statistics reply
#[derive(Debug, Clone, PartialEq)]
pub enum StatsReply {
    /// Switch description
    Desc {
        /// Hardware description
        hw_desc: String,
        /// Software description
        sw_desc: String,
    },
    /// Port counters
    Port(Vec<(PortNumber, PortStatistics)>),
}

/// Payload of an OpenFlow message
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Connection setup
    Hello,
    /// Error notification
    Error {
        /// Error type
        err_type: u16,
        /// Error code
        code: u16,
    },
    /// Keep-alive request
    EchoRequest(Vec<u8>),
    /// Keep-alive reply
    EchoReply(Vec<u8>),
    /// Request of the switch features
    FeaturesRequest,
    /// Switch features
    FeaturesReply {
        /// Datapath id
        datapath_id: u64,
        /// All ports of the switch
        ports: Vec<PortDesc>,
    },
    /// Packet sent to the controller
    PacketIn {
        /// Port on which the packet was received
        in_port: PortNumber,
        /// Buffer on the switch, if the packet is buffered
        buffer_id: Option<u32>,
        /// Packet data
        data: Vec<u8>,
    },
    /// Port status change
    PortStatus {
        /// What has changed
        reason: PortReason,
        /// The (new) description of the port
        desc: PortDesc,
    },
    /// Packet sent by the controller
    PacketOut {
        /// Port on which the packet was received, if any
        in_port: Option<PortNumber>,
        /// Ports to which the packet is sent
        out_ports: Vec<PortNumber>,
        /// Packet data
        data: Vec<u8>,
    },
    /// Flow table modification
    FlowMod {
        /// Ingress port matched by the rule
        in_port: Option<PortNumber>,
        /// Ports to which matching packets are sent
        out_ports: Vec<PortNumber>,
        /// Priority of the rule
        priority: u16,
    },
    /// Statistics request
    StatsRequest(StatsRequest),
    /// Statistics reply
    StatsReply(StatsReply),
    /// Barrier request
    BarrierRequest,
    /// Barrier reply
    BarrierReply,
}

/// OpenFlow message, consisting of the transaction id and the payload.
#[derive(Debug, Clone, PartialEq)]
pub struct OfMessage {
    /// Transaction id
    pub xid: Xid,
    /// Message body
    pub payload: Payload,
}

impl OfMessage {
    /// Create a new message
    pub fn new(xid: Xid, payload: Payload) -> Self {
        Self { xid, payload }
    }

    /// Returns the type code of the message
    pub fn msg_type(&self) -> MessageType {
        match &self.payload {
            Payload::Hello => MessageType::Hello,
            Payload::Error { .. } => MessageType::Error,
            Payload::EchoRequest(_) => MessageType::EchoRequest,
            Payload::EchoReply(_) => MessageType::EchoReply,
            Payload::FeaturesRequest => MessageType::FeaturesRequest,
            Payload::FeaturesReply { .. } => MessageType::FeaturesReply,
            Payload::PacketIn { .. } => MessageType::PacketIn,
            Payload::PortStatus { .. } => MessageType::PortStatus,
            Payload::PacketOut { .. } => MessageType::PacketOut,
            Payload::FlowMod { .. } => MessageType::FlowMod,
            Payload::StatsRequest(_) => MessageType::StatsRequest,
            Payload::StatsReply(_) => MessageType::StatsReply,
            Payload::BarrierRequest => MessageType::BarrierRequest,
            Payload::BarrierReply => MessageType::BarrierReply,
        }
    }

    /// Returns the ingress port of a message sent by a tenant controller. This port determines the
    /// physical switch to which the message is sent.
    pub fn in_port(&self) -> Option<PortNumber> {
        match &self.payload {
            Payload::PacketOut { in_port, .. } | Payload::FlowMod { in_port, .. } => *in_port,
            Payload::StatsRequest(StatsRequest::Port(port)) => *port,
            _ => None,
        }
    }

    /// Returns a mutable reference to all output ports of the message.
    pub(crate) fn out_ports_mut(&mut self) -> Option<&mut Vec<PortNumber>> {
        match &mut self.payload {
            Payload::PacketOut { out_ports, .. } | Payload::FlowMod { out_ports, .. } => {
                Some(out_ports)
            }
            _ => None,
        }
    }

    /// Overwrite the ingress port of the message, if it has one.
    pub(crate) fn set_in_port(&mut self, port: PortNumber) {
        match &mut self.payload {
            Payload::PacketOut { in_port, .. } | Payload::FlowMod { in_port, .. } => {
                *in_port = Some(port)
            }
            Payload::StatsRequest(StatsRequest::Port(p)) => *p = Some(port),
            Payload::PacketIn { in_port, .. } => *in_port = port,
            _ => {}
        }
    }
}
