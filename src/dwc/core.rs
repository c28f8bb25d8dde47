//! Core and host bring-up sequences
//!
//! One-time initialization executed at attach and on explicit reset: PHY
//! and AHB configuration with the double soft reset the core requires,
//! FIFO sizing, a disable sweep over every host channel, and root-port
//! power-up. All channels are disabled and both FIFO directions flushed
//! before any transfer is attempted.

use super::register::{wait_for_bit, UsbRegisters};
use super::*;
use crate::error::Result;

/// Soft-reset the core and wait for it to settle.
pub fn core_reset<R: UsbRegisters>(regs: &mut R) -> Result<()> {
    wait_for_bit(regs, GRSTCTL, GRSTCTL_AHBIDLE, true)?;

    regs.write32(GRSTCTL, GRSTCTL_CSFTRST);
    wait_for_bit(regs, GRSTCTL, GRSTCTL_CSFTRST, false)?;

    regs.delay_us(100_000);
    Ok(())
}

/// Configure the PHY interface and AHB DMA mode.
///
/// The core latches GUSBCFG changes across a soft reset, hence the
/// reset-configure-reset dance.
pub fn core_init<R: UsbRegisters>(regs: &mut R) -> Result<()> {
    let mut usbcfg = regs.read32(GUSBCFG);
    usbcfg |= GUSBCFG_ULPI_EXT_VBUS_DRV;
    usbcfg &= !GUSBCFG_TERM_SEL_DL_PULSE;
    regs.write32(GUSBCFG, usbcfg);

    core_reset(regs)?;

    // UTMI+ 8-bit PHY
    usbcfg &= !(GUSBCFG_ULPI_UTMI_SEL | GUSBCFG_PHYIF);
    usbcfg &= !GUSBCFG_DDRSEL;
    regs.write32(GUSBCFG, usbcfg);

    core_reset(regs)?;

    let mut usbcfg = regs.read32(GUSBCFG);
    usbcfg &= !(GUSBCFG_ULPI_FSLS | GUSBCFG_ULPI_CLK_SUS_M);
    regs.write32(GUSBCFG, usbcfg);

    regs.write32(GAHBCFG, GAHBCFG_DMAENABLE | GAHBCFG_WAIT_AXI_WRITES);
    regs.modify32(GUSBCFG, GUSBCFG_HNPCAP | GUSBCFG_SRPCAP, 0);

    Ok(())
}

/// Flush one transmit FIFO (or all of them with
/// [`FLUSH_ALL_TX_FIFOS`]).
pub fn flush_tx_fifo<R: UsbRegisters>(regs: &mut R, num: u32) -> Result<()> {
    regs.write32(GRSTCTL, GRSTCTL_TXFFLSH | num << GRSTCTL_TXFNUM_SHIFT);
    wait_for_bit(regs, GRSTCTL, GRSTCTL_TXFFLSH, false)?;
    regs.delay_us(1);
    Ok(())
}

/// Flush the receive FIFO.
pub fn flush_rx_fifo<R: UsbRegisters>(regs: &mut R) -> Result<()> {
    regs.write32(GRSTCTL, GRSTCTL_RXFFLSH);
    wait_for_bit(regs, GRSTCTL, GRSTCTL_RXFFLSH, false)?;
    regs.delay_us(1);
    Ok(())
}

/// Host-mode initialization: clock gating off, FS/LS clock select, FIFO
/// geometry, FIFO flush, channel disable sweep, root-port power.
pub fn host_init<R: UsbRegisters>(regs: &mut R) -> Result<()> {
    regs.write32(PCGCCTL, 0);

    regs.modify32(HCFG, HCFG_FSLSPCLKSEL_MASK, HCFG_FSLSPCLKSEL_30_60_MHZ);

    regs.write32(GRXFSIZ, HOST_RX_FIFO_SIZE);
    regs.write32(
        GNPTXFSIZ,
        HOST_NPERIO_TX_FIFO_SIZE << FIFOSIZE_DEPTH_SHIFT
            | HOST_RX_FIFO_SIZE << FIFOSIZE_STARTADDR_SHIFT,
    );
    regs.write32(
        HPTXFSIZ,
        HOST_PERIO_TX_FIFO_SIZE << FIFOSIZE_DEPTH_SHIFT
            | (HOST_RX_FIFO_SIZE + HOST_NPERIO_TX_FIFO_SIZE) << FIFOSIZE_STARTADDR_SHIFT,
    );

    regs.modify32(GOTGCTL, GOTGCTL_HSTSETHNPEN, 0);

    flush_tx_fifo(regs, FLUSH_ALL_TX_FIFOS)?;
    flush_rx_fifo(regs)?;

    let channels =
        ((regs.read32(GHWCFG2) & GHWCFG2_NUM_HOST_CHAN_MASK) >> GHWCFG2_NUM_HOST_CHAN_SHIFT) + 1;

    #[cfg(feature = "defmt")]
    defmt::info!("host has {} channels", channels);

    for ch in 0..channels as u8 {
        regs.modify32(hcchar(ch), HCCHAR_CHEN | HCCHAR_EPDIR, HCCHAR_CHDIS);
    }
    for ch in 0..channels as u8 {
        regs.modify32(hcchar(ch), HCCHAR_EPDIR, HCCHAR_CHEN | HCCHAR_CHDIS);
        wait_for_bit(regs, hcchar(ch), HCCHAR_CHEN, false)?;
    }

    if regs.read32(GINTSTS) & GINTSTS_CURMODE_HOST != 0 {
        let mut hprt0 = regs.read32(HPRT0);
        hprt0 &= !HPRT0_W1C_MASK;
        if hprt0 & HPRT0_PRTPWR == 0 {
            hprt0 |= HPRT0_PRTPWR;
            regs.write32(HPRT0, hprt0);
        }
    }

    Ok(())
}
