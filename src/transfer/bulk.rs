//! USB bulk transfer dispatch
//!
//! A bulk transfer is a single segmenting-engine run on the synchronous
//! channel. The data toggle is threaded in and out so the caller can keep
//! the endpoint's DATA0/DATA1 sequence going across calls; it is written
//! back even when the transfer fails partway.

use crate::dma::DmaBuffer;
use crate::dwc::register::UsbRegisters;
use crate::dwc::SYNC_CHANNEL;
use crate::error::{Result, UsbError};
use crate::transfer::engine::execute_transfer;
use crate::transfer::{EndpointType, Pid, Speed, Transfer, Translator, XferBuf};

/// Largest bulk packet a full-speed endpoint may declare.
pub const FULL_SPEED_MAX_PACKET: u16 = 64;
/// Largest bulk packet a high-speed endpoint may declare.
pub const HIGH_SPEED_MAX_PACKET: u16 = 512;

fn validate(speed: Speed, max_packet: u16, data: &XferBuf<'_>, toggle: u8) -> Result<()> {
    if data.is_empty() || toggle > 1 || max_packet == 0 {
        return Err(UsbError::InvalidParameter);
    }
    match speed {
        // this controller cannot reach low-speed bulk endpoints (they do
        // not exist) nor super-speed devices
        Speed::Low | Speed::Super => Err(UsbError::InvalidParameter),
        Speed::Full if max_packet > FULL_SPEED_MAX_PACKET => Err(UsbError::InvalidParameter),
        Speed::High if max_packet > HIGH_SPEED_MAX_PACKET => Err(UsbError::InvalidParameter),
        _ => Ok(()),
    }
}

/// Run one bulk transfer; returns the byte count actually moved.
#[allow(clippy::too_many_arguments)]
pub(crate) fn execute_bulk<R: UsbRegisters>(
    regs: &mut R,
    dma: &mut DmaBuffer,
    device_address: u8,
    endpoint: u8,
    speed: Speed,
    max_packet: u16,
    data: XferBuf<'_>,
    toggle: &mut u8,
    translator: Option<Translator>,
) -> Result<usize> {
    validate(speed, max_packet, &data, *toggle)?;

    let mut xfer = Transfer {
        device_address,
        speed,
        endpoint,
        ep_type: EndpointType::Bulk,
        max_packet,
        pid: Pid::from_toggle(*toggle),
        buf: data,
        translator,
        completed: 0,
    };
    let result = execute_transfer(regs, dma, SYNC_CHANNEL, &mut xfer, true);

    // hand the toggle sequence back whatever happened
    *toggle = xfer.pid.toggle();

    result
}
