//! Host channel programming and halt classification
//!
//! A DWC2 host channel executes one programmed burst at a time and raises
//! a halt interrupt when it stops. The classifier here turns the raw
//! HCINT pattern into a transfer-level outcome, including the split
//! transaction handshakes used to reach low-/full-speed devices behind a
//! high-speed hub's transaction translator: an ACK on the start-split
//! phase means "advance to complete-split", a NYET on the complete-split
//! phase means "ask the translator again". Neither is an error.

use super::register::{wait_for_bit, UsbRegisters};
use super::{
    hcchar, hcint, hcsplt, hctsiz, Hcint, HCCHAR_CHDIS, HCCHAR_CHEN, HCCHAR_DEVADDR_SHIFT,
    HCCHAR_EPDIR_SHIFT, HCCHAR_EPNUM_SHIFT, HCCHAR_EPTYPE_SHIFT, HCCHAR_LSPDDEV, HCCHAR_MPS_SHIFT,
    HCCHAR_MULTICNT_MASK, HCCHAR_MULTICNT_SHIFT, HCINT_CLEAR_ALL, HCSPLT_COMPSPLT,
    HCSPLT_HUBADDR_SHIFT, HCSPLT_PRTADDR_SHIFT, HCSPLT_SPLTENA, HCTSIZ_PID_MASK, HCTSIZ_PID_SHIFT,
    HCTSIZ_XFERSIZE_MASK, HCTSIZ_XFERSIZE_SHIFT,
};
use crate::error::UsbError;
use crate::transfer::{Speed, Transfer};

/// Data packet identifier programmed into the HCTSIZ PID field.
///
/// The toggle bit of the DATA0/DATA1 sequence is the high bit of the
/// encoding, so `pid.toggle()` recovers the USB data toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum Pid {
    /// DATA0
    Data0 = 0,
    /// DATA2
    Data2 = 1,
    /// DATA1
    Data1 = 2,
    /// SETUP (control transfers only)
    Setup = 3,
}

impl Pid {
    /// Raw HCTSIZ field encoding.
    pub const fn bits(self) -> u32 {
        self as u32
    }

    /// Decode the HCTSIZ field value read back from hardware.
    pub const fn from_bits(value: u32) -> Self {
        match value & 0x3 {
            0 => Self::Data0,
            1 => Self::Data2,
            2 => Self::Data1,
            _ => Self::Setup,
        }
    }

    /// PID for a given data toggle value (0 ⇒ DATA0, otherwise DATA1).
    pub const fn from_toggle(toggle: u8) -> Self {
        if toggle == 0 {
            Self::Data0
        } else {
            Self::Data1
        }
    }

    /// Data toggle value carried by this PID.
    pub const fn toggle(self) -> u8 {
        (self as u32 >> 1) as u8
    }
}

/// Split transaction phase tracking for one transfer attempt.
///
/// Initialized at the top of every segment, mutated only by the halt
/// classifier, never persisted across transfers.
#[derive(Debug, Clone, Copy)]
pub struct SplitControl {
    /// Transfer is tunneled through a transaction translator
    pub splitting: bool,
    /// Currently in the start-split sub-phase
    pub split_start: bool,
}

impl SplitControl {
    /// Split state for a fresh transfer attempt at the given device speed.
    /// Low- and full-speed devices are reached through the hub's
    /// transaction translator and always use split transactions.
    pub fn for_speed(speed: Speed) -> Self {
        let splitting = matches!(speed, Speed::Low | Speed::Full);
        Self {
            splitting,
            split_start: splitting,
        }
    }
}

/// Outcome of one channel halt, classified from HCINT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelHalt {
    /// Segment completed; `remaining` untransferred bytes and the next
    /// PID were read back from HCTSIZ.
    Done {
        /// Bytes of the programmed size the hardware did not transfer
        remaining: u32,
        /// PID the hardware expects for the next packet
        pid: Pid,
    },
    /// Endpoint deferred the transaction
    Nak,
    /// Endpoint rejected the transaction
    Stall,
    /// Reissue the identical channel program (split phase advance, split
    /// retry, or frame overrun)
    Restart,
    /// Unrecoverable: halt-wait timeout or an interrupt pattern outside
    /// every known-good combination
    Error(UsbError),
}

/// Program a channel for one transaction attempt.
///
/// Clears stale interrupt latches, then writes the characteristics and
/// split registers. Pure configuration; nothing is enabled yet.
pub fn program<R: UsbRegisters>(regs: &mut R, ch: u8, xfer: &Transfer<'_>, split: &SplitControl) {
    let mut characteristics = (xfer.device_address as u32) << HCCHAR_DEVADDR_SHIFT
        | (xfer.endpoint as u32) << HCCHAR_EPNUM_SHIFT
        | (xfer.buf.direction() as u32) << HCCHAR_EPDIR_SHIFT
        | (xfer.ep_type as u32) << HCCHAR_EPTYPE_SHIFT
        | (xfer.max_packet as u32) << HCCHAR_MPS_SHIFT;
    if xfer.speed == Speed::Low {
        characteristics |= HCCHAR_LSPDDEV;
    }

    regs.write32(hcint(ch), HCINT_CLEAR_ALL);
    regs.write32(hcchar(ch), characteristics);

    let mut split_ctl = 0;
    if split.splitting {
        let tt = xfer.translator.unwrap_or_default();
        split_ctl = HCSPLT_SPLTENA
            | (tt.port as u32) << HCSPLT_PRTADDR_SHIFT
            | (tt.hub_address as u32) << HCSPLT_HUBADDR_SHIFT;
        if !split.split_start {
            split_ctl |= HCSPLT_COMPSPLT;
        }
    }
    regs.write32(hcsplt(ch), split_ctl);
}

/// Arm a programmed channel: one packet per frame, channel enabled.
pub fn enable<R: UsbRegisters>(regs: &mut R, ch: u8) {
    regs.modify32(
        hcchar(ch),
        HCCHAR_MULTICNT_MASK | HCCHAR_CHEN | HCCHAR_CHDIS,
        (1 << HCCHAR_MULTICNT_SHIFT) | HCCHAR_CHEN,
    );
}

/// Wait for the channel to halt and classify the outcome.
///
/// `split` is mutated when a start-split phase completes: the caller must
/// reissue the identical program with the updated phase on
/// [`ChannelHalt::Restart`].
pub fn wait_for_halt<R: UsbRegisters>(
    regs: &mut R,
    ch: u8,
    ignore_ack: bool,
    split: &mut SplitControl,
) -> ChannelHalt {
    let mut comp_hlt_ack = Hcint::XFERCOMP | Hcint::CHHLTD;
    let mut split_start_ack = Hcint::CHHLTD;
    let split_nyet = Hcint::CHHLTD | Hcint::NYET;

    regs.delay_us(100);
    if wait_for_bit(regs, hcint(ch), Hcint::CHHLTD.bits(), true).is_err() {
        return ChannelHalt::Error(UsbError::Timeout);
    }

    regs.delay_us(100);
    let mut status = Hcint::from_bits_retain(regs.read32(hcint(ch)));

    if status.contains(Hcint::NAK) {
        return ChannelHalt::Nak;
    }
    if status.contains(Hcint::STALL) {
        return ChannelHalt::Stall;
    }
    if status.contains(Hcint::FRMOVRUN) {
        // transient scheduling miss, just try again
        return ChannelHalt::Restart;
    }

    if ignore_ack {
        status.remove(Hcint::ACK);
    } else {
        comp_hlt_ack |= Hcint::ACK;
        split_start_ack |= Hcint::ACK;
    }

    if split.splitting {
        if split.split_start && status == split_start_ack {
            split.split_start = false;
            return ChannelHalt::Restart;
        }
        if !split.split_start && status == split_nyet {
            return ChannelHalt::Restart;
        }
    }

    if status != comp_hlt_ack {
        #[cfg(feature = "defmt")]
        defmt::error!(
            "channel {}: unexpected HCINT {:#x} ({})",
            ch,
            status.bits(),
            if split.split_start {
                "split start"
            } else if split.splitting {
                "split complete"
            } else {
                "no split"
            }
        );
        return ChannelHalt::Error(UsbError::TransactionError);
    }

    let size = regs.read32(hctsiz(ch));
    ChannelHalt::Done {
        remaining: (size & HCTSIZ_XFERSIZE_MASK) >> HCTSIZ_XFERSIZE_SHIFT,
        pid: Pid::from_bits((size & HCTSIZ_PID_MASK) >> HCTSIZ_PID_SHIFT),
    }
}
