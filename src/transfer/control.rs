//! USB control transfer sequencing
//!
//! A control transfer is up to three engine runs on the synchronous
//! channel: a SETUP stage (fixed 8 bytes), an optional data stage, and a
//! status stage in the opposite direction with zero length. Any stage
//! failure aborts the remaining stages.

use crate::dma::DmaBuffer;
use crate::dwc::register::UsbRegisters;
use crate::dwc::SYNC_CHANNEL;
use crate::error::{Result, UsbError};
use crate::transfer::engine::execute_transfer;
use crate::transfer::{EndpointType, Pid, SetupPacket, Speed, Transfer, Translator, XferBuf};

/// Data stage of a control transfer.
pub enum ControlData<'a> {
    /// Device-to-host data stage
    In(&'a mut [u8]),
    /// Host-to-device data stage
    Out(&'a [u8]),
    /// No data stage (the transfer is setup + status only)
    None,
}

/// Validate control transfer parameters and derive the effective maximum
/// packet size. Low-speed control endpoints always use 8-byte packets.
fn validate(speed: Speed, max_packet: u16, data: &ControlData<'_>) -> Result<u16> {
    if !matches!(max_packet, 8 | 16 | 32 | 64) {
        return Err(UsbError::InvalidParameter);
    }
    match data {
        ControlData::In(buf) if buf.is_empty() => return Err(UsbError::InvalidParameter),
        ControlData::Out(buf) if buf.is_empty() => return Err(UsbError::InvalidParameter),
        _ => {}
    }
    Ok(if speed == Speed::Low { 8 } else { max_packet })
}

/// Run a complete control transfer; returns the data stage byte count
/// (zero when there is no data stage).
#[allow(clippy::too_many_arguments)]
pub(crate) fn execute_control<R: UsbRegisters>(
    regs: &mut R,
    dma: &mut DmaBuffer,
    status_buf: &mut [u8],
    device_address: u8,
    speed: Speed,
    max_packet: u16,
    request: &SetupPacket,
    data: ControlData<'_>,
    translator: Option<Translator>,
) -> Result<usize> {
    let max_packet = validate(speed, max_packet, &data)?;

    let setup_bytes = request.to_bytes();
    let mut setup = Transfer {
        device_address,
        speed,
        endpoint: 0,
        ep_type: EndpointType::Control,
        max_packet,
        pid: Pid::Setup,
        buf: XferBuf::Out(&setup_bytes),
        translator,
        completed: 0,
    };
    execute_transfer(regs, dma, SYNC_CHANNEL, &mut setup, true)?;

    let mut data_len = 0;
    let status_in = !matches!(data, ControlData::In(_));

    match data {
        ControlData::In(buf) => {
            let mut stage = Transfer {
                device_address,
                speed,
                endpoint: 0,
                ep_type: EndpointType::Control,
                max_packet,
                pid: Pid::Data1,
                buf: XferBuf::In(buf),
                translator,
                completed: 0,
            };
            data_len = execute_transfer(regs, dma, SYNC_CHANNEL, &mut stage, false)?;
        }
        ControlData::Out(buf) => {
            let mut stage = Transfer {
                device_address,
                speed,
                endpoint: 0,
                ep_type: EndpointType::Control,
                max_packet,
                pid: Pid::Data1,
                buf: XferBuf::Out(buf),
                translator,
                completed: 0,
            };
            data_len = execute_transfer(regs, dma, SYNC_CHANNEL, &mut stage, false)?;
        }
        ControlData::None => {}
    }

    // Zero-length handshake in the opposite direction of the data stage.
    let mut status = Transfer {
        device_address,
        speed,
        endpoint: 0,
        ep_type: EndpointType::Control,
        max_packet,
        pid: Pid::Data1,
        buf: if status_in {
            XferBuf::In(&mut status_buf[..0])
        } else {
            XferBuf::Out(&status_buf[..0])
        },
        translator,
        completed: 0,
    };
    execute_transfer(regs, dma, SYNC_CHANNEL, &mut status, false)?;

    Ok(data_len)
}
