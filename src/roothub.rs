//! Root hub port status and feature operations
//!
//! The controller exposes a single root port through HPRT0. These
//! operations mirror bits between that register and the standard USB
//! port-status/feature vocabulary; there is no state machine here, just
//! pass-through with care taken around the write-one-to-clear latches.

use bitflags::bitflags;

use crate::dwc::register::UsbRegisters;
use crate::dwc::{
    HPRT0, HPRT0_PRTCONNDET, HPRT0_PRTCONNSTS, HPRT0_PRTENA, HPRT0_PRTENCHNG,
    HPRT0_PRTOVRCURRACT, HPRT0_PRTOVRCURRCHNG, HPRT0_PRTPWR, HPRT0_PRTRES, HPRT0_PRTRST,
    HPRT0_PRTSUSP, HPRT0_W1C_MASK, PCGCCTL,
};
use crate::error::{Result, UsbError};

bitflags! {
    /// USB port status word (wPortStatus)
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct PortStatus: u16 {
        /// A device is connected
        const CONNECTION = 0x0001;
        /// Port is enabled
        const ENABLE = 0x0002;
        /// Port is suspended
        const SUSPEND = 0x0004;
        /// Overcurrent condition is active
        const OVERCURRENT = 0x0008;
        /// Port reset signalling is asserted
        const RESET = 0x0010;
        /// Port power is on
        const POWER = 0x0100;
        /// Attached device is low-speed
        const LOW_SPEED = 0x0200;
        /// Attached device is high-speed
        const HIGH_SPEED = 0x0400;
    }
}

bitflags! {
    /// USB port change word (wPortChange)
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct PortChange: u16 {
        /// Connect status changed
        const CONNECTION = 0x0001;
        /// Enable status changed
        const ENABLE = 0x0002;
        /// Suspend status changed
        const SUSPEND = 0x0004;
        /// Overcurrent status changed
        const OVERCURRENT = 0x0008;
        /// Reset signalling completed
        const RESET = 0x0010;
    }
}

/// Standard USB port features.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PortFeature {
    /// Port enable
    Enable,
    /// Port suspend
    Suspend,
    /// Port reset
    Reset,
    /// Port power
    Power,
    /// Port ownership (companion controller hand-off; no-op here)
    Owner,
    /// Connect change latch
    ConnectChange,
    /// Enable change latch
    EnableChange,
    /// Suspend change latch
    SuspendChange,
    /// Reset change latch
    ResetChange,
    /// Overcurrent change latch
    OverCurrentChange,
}

/// Decode an HPRT0 value into the standard status/change words.
///
/// The root port always runs at high speed; low-/full-speed devices hang
/// off the onboard hub's transaction translator.
pub fn decode_hprt(hprt0: u32) -> (PortStatus, PortChange) {
    let mut status = PortStatus::HIGH_SPEED;
    let mut change = PortChange::empty();

    if hprt0 & HPRT0_PRTCONNSTS != 0 {
        status |= PortStatus::CONNECTION;
    }
    if hprt0 & HPRT0_PRTENA != 0 {
        status |= PortStatus::ENABLE;
    }
    if hprt0 & HPRT0_PRTSUSP != 0 {
        status |= PortStatus::SUSPEND;
    }
    if hprt0 & HPRT0_PRTOVRCURRACT != 0 {
        status |= PortStatus::OVERCURRENT;
    }
    if hprt0 & HPRT0_PRTRST != 0 {
        status |= PortStatus::RESET;
    }
    if hprt0 & HPRT0_PRTPWR != 0 {
        status |= PortStatus::POWER;
    }

    if hprt0 & HPRT0_PRTCONNDET != 0 {
        change |= PortChange::CONNECTION;
    }
    if hprt0 & HPRT0_PRTOVRCURRCHNG != 0 {
        change |= PortChange::OVERCURRENT;
    }

    (status, change)
}

/// Read the root port state.
pub(crate) fn port_status<R: UsbRegisters>(regs: &R) -> (PortStatus, PortChange) {
    decode_hprt(regs.read32(HPRT0))
}

/// Assert a port feature.
pub(crate) fn set_feature<R: UsbRegisters>(regs: &mut R, feature: PortFeature) -> Result<()> {
    match feature {
        PortFeature::Enable | PortFeature::Owner => {}
        PortFeature::Suspend => {
            regs.modify32(HPRT0, HPRT0_W1C_MASK, HPRT0_PRTSUSP);
        }
        PortFeature::Reset => {
            regs.modify32(HPRT0, HPRT0_W1C_MASK, HPRT0_PRTRST);
            regs.delay_us(50_000);
            regs.modify32(HPRT0, HPRT0_PRTRST, 0);
        }
        PortFeature::Power => {
            regs.modify32(HPRT0, HPRT0_W1C_MASK, HPRT0_PRTPWR);
        }
        _ => return Err(UsbError::InvalidParameter),
    }
    Ok(())
}

/// Deassert a port feature or acknowledge a change latch.
pub(crate) fn clear_feature<R: UsbRegisters>(regs: &mut R, feature: PortFeature) -> Result<()> {
    match feature {
        PortFeature::Enable => {
            // the enable latch is write-one-to-clear: setting it disables
            regs.modify32(HPRT0, HPRT0_W1C_MASK, HPRT0_PRTENA);
        }
        PortFeature::Reset => {
            regs.modify32(HPRT0, HPRT0_W1C_MASK, HPRT0_PRTRST);
            regs.delay_us(50_000);
            regs.modify32(HPRT0, HPRT0_PRTRST, 0);
        }
        PortFeature::Suspend => {
            // wake the PHY clock, then drive resume signalling
            regs.write32(PCGCCTL, 0);
            regs.delay_us(40_000);
            let mut hprt0 = regs.read32(HPRT0);
            hprt0 &= !HPRT0_W1C_MASK;
            hprt0 |= HPRT0_PRTRES;
            regs.write32(HPRT0, hprt0);
            hprt0 &= !HPRT0_PRTSUSP;
            regs.delay_us(150_000);
            hprt0 &= !HPRT0_PRTRES;
            regs.write32(HPRT0, hprt0);
        }
        PortFeature::Power => {
            regs.modify32(HPRT0, HPRT0_W1C_MASK | HPRT0_PRTPWR, 0);
        }
        PortFeature::Owner | PortFeature::ResetChange | PortFeature::SuspendChange => {}
        PortFeature::ConnectChange => {
            regs.modify32(HPRT0, HPRT0_PRTCONNDET, 0);
        }
        PortFeature::EnableChange => {
            regs.modify32(HPRT0, HPRT0_PRTENCHNG, 0);
        }
        PortFeature::OverCurrentChange => {
            regs.modify32(HPRT0, HPRT0_PRTOVRCURRCHNG, 0);
        }
    }
    Ok(())
}
