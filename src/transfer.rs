//! USB transfer types and request model
//!
//! Transfer requests are transient, stack-scoped values: the facade
//! builds a [`Transfer`] per operation (or per control stage), the
//! segmenting engine drives it to completion, and the PID and completed
//! byte count flow back out through it.

pub mod bulk;
pub mod control;
pub mod engine;

pub use crate::dwc::channel::Pid;

/// Transfer direction, encoded as the HCCHAR endpoint direction bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Direction {
    /// Host to device
    Out = 0,
    /// Device to host
    In = 1,
}

/// USB device speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Speed {
    /// 1.5 Mbps
    Low,
    /// 12 Mbps
    Full,
    /// 480 Mbps
    High,
    /// 5 Gbps (not reachable through this controller)
    Super,
}

/// Endpoint type, encoded as the HCCHAR endpoint type field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum EndpointType {
    /// Control endpoint
    Control = 0,
    /// Isochronous endpoint
    Isochronous = 1,
    /// Bulk endpoint
    Bulk = 2,
    /// Interrupt endpoint
    Interrupt = 3,
}

/// Transaction translator position for a low-/full-speed device reached
/// through a high-speed hub.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Translator {
    /// Address of the hub containing the translator
    pub hub_address: u8,
    /// Downstream hub port the device hangs off
    pub port: u8,
}

/// USB SETUP packet for control transfers.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SetupPacket {
    /// bmRequestType
    pub request_type: u8,
    /// bRequest
    pub request: u8,
    /// wValue
    pub value: u16,
    /// wIndex
    pub index: u16,
    /// wLength
    pub length: u16,
}

impl SetupPacket {
    /// Create a GET_DESCRIPTOR request.
    pub const fn get_descriptor(desc_type: u8, desc_index: u8, language_id: u16, length: u16) -> Self {
        Self {
            request_type: 0x80, // Device-to-host, standard, device
            request: 0x06,      // GET_DESCRIPTOR
            value: ((desc_type as u16) << 8) | (desc_index as u16),
            index: language_id,
            length,
        }
    }

    /// Create a SET_ADDRESS request.
    pub const fn set_address(address: u8) -> Self {
        Self {
            request_type: 0x00, // Host-to-device, standard, device
            request: 0x05,      // SET_ADDRESS
            value: address as u16,
            index: 0,
            length: 0,
        }
    }

    /// Create a SET_CONFIGURATION request.
    pub const fn set_configuration(configuration: u8) -> Self {
        Self {
            request_type: 0x00, // Host-to-device, standard, device
            request: 0x09,      // SET_CONFIGURATION
            value: configuration as u16,
            index: 0,
            length: 0,
        }
    }

    /// Check if the data stage of this request is device-to-host.
    pub const fn is_in(&self) -> bool {
        (self.request_type & 0x80) != 0
    }

    /// Wire encoding (little-endian, 8 bytes).
    pub const fn to_bytes(&self) -> [u8; 8] {
        [
            self.request_type,
            self.request,
            self.value as u8,
            (self.value >> 8) as u8,
            self.index as u8,
            (self.index >> 8) as u8,
            self.length as u8,
            (self.length >> 8) as u8,
        ]
    }
}

/// Data buffer of a transfer, carrying the direction with it.
pub enum XferBuf<'a> {
    /// Device-to-host: received bytes land here
    In(&'a mut [u8]),
    /// Host-to-device: bytes are sent from here
    Out(&'a [u8]),
}

impl XferBuf<'_> {
    /// Requested transfer length in bytes.
    pub fn len(&self) -> usize {
        match self {
            Self::In(buf) => buf.len(),
            Self::Out(buf) => buf.len(),
        }
    }

    /// Whether the request carries no data (still a valid transfer: the
    /// status stage of a control transfer is zero-length).
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Direction implied by the buffer variant.
    pub fn direction(&self) -> Direction {
        match self {
            Self::In(_) => Direction::In,
            Self::Out(_) => Direction::Out,
        }
    }
}

/// One logical transfer request, driven to completion by the segmenting
/// engine.
pub struct Transfer<'a> {
    /// Device address (0-127)
    pub device_address: u8,
    /// Device speed
    pub speed: Speed,
    /// Endpoint number without the direction bit
    pub endpoint: u8,
    /// Endpoint type
    pub ep_type: EndpointType,
    /// Maximum packet size of the endpoint
    pub max_packet: u16,
    /// Data PID for the first packet; updated by the engine as packets
    /// complete so the caller can continue the toggle sequence
    pub pid: Pid,
    /// Data buffer and direction
    pub buf: XferBuf<'a>,
    /// Transaction translator position, when the device sits behind a
    /// high-speed hub
    pub translator: Option<Translator>,
    /// Bytes actually moved, valid after the engine returns (also on
    /// failure: partial completion is never rolled back)
    pub completed: usize,
}
