//! DWC2 (DesignWare Hi-Speed USB 2.0 OTG) controller interface
//!
//! This module provides the memory-mapped register layout and bit
//! definitions for the DWC2 host controller block found in BCM283x-class
//! SoCs, plus the channel programming and core bring-up sequences built
//! on top of them.
//!
//! # Register Memory Layout
//!
//! The controller registers are divided into:
//! - Core Global Registers (offset 0x000-0x0FF)
//! - Host Mode Registers (offset 0x400-0x4FF)
//! - Host Channel Registers (offset 0x500 + 0x20 per channel)
//! - Power and Clock Gating (offset 0xE00)

pub mod channel;
pub mod core;
pub mod register;

pub use channel::{ChannelHalt, Pid, SplitControl};
pub use register::{wait_for_bit, MmioRegisters, UsbRegisters};

use bitflags::bitflags;

// === Core Global Registers ===

/// OTG Control and Status
pub const GOTGCTL: u32 = 0x000;
/// AHB Configuration
pub const GAHBCFG: u32 = 0x008;
/// USB Configuration
pub const GUSBCFG: u32 = 0x00C;
/// Reset Control
pub const GRSTCTL: u32 = 0x010;
/// Core Interrupt Status
pub const GINTSTS: u32 = 0x014;
/// Receive FIFO Size
pub const GRXFSIZ: u32 = 0x024;
/// Non-Periodic Transmit FIFO Size
pub const GNPTXFSIZ: u32 = 0x028;
/// Hardware Configuration 2
pub const GHWCFG2: u32 = 0x048;
/// Host Periodic Transmit FIFO Size
pub const HPTXFSIZ: u32 = 0x100;

// === Host Mode Registers ===

/// Host Configuration
pub const HCFG: u32 = 0x400;
/// Host Port Control and Status
pub const HPRT0: u32 = 0x440;
/// Power and Clock Gating Control
pub const PCGCCTL: u32 = 0xE00;

/// Host Channel Characteristics for channel `ch`
pub const fn hcchar(ch: u8) -> u32 {
    0x500 + 0x20 * ch as u32
}

/// Host Channel Split Control for channel `ch`
pub const fn hcsplt(ch: u8) -> u32 {
    0x504 + 0x20 * ch as u32
}

/// Host Channel Interrupt for channel `ch`
pub const fn hcint(ch: u8) -> u32 {
    0x508 + 0x20 * ch as u32
}

/// Host Channel Interrupt Mask for channel `ch`
pub const fn hcintmsk(ch: u8) -> u32 {
    0x50C + 0x20 * ch as u32
}

/// Host Channel Transfer Size for channel `ch`
pub const fn hctsiz(ch: u8) -> u32 {
    0x510 + 0x20 * ch as u32
}

/// Host Channel DMA Address for channel `ch`
pub const fn hcdma(ch: u8) -> u32 {
    0x514 + 0x20 * ch as u32
}

// === GOTGCTL bits ===

/// Host Set HNP Enable
pub const GOTGCTL_HSTSETHNPEN: u32 = 1 << 10;

// === GAHBCFG bits ===

/// Burst length field
pub const GAHBCFG_HBURSTLEN_MASK: u32 = 0xF << 1;
/// Wait for AXI writes to complete before starting new ones
pub const GAHBCFG_WAIT_AXI_WRITES: u32 = 1 << 4;
/// Core operates in DMA mode
pub const GAHBCFG_DMAENABLE: u32 = 1 << 5;

// === GUSBCFG bits ===

/// UTMI+ PHY interface width (8/16 bit)
pub const GUSBCFG_PHYIF: u32 = 1 << 3;
/// ULPI or UTMI+ PHY select
pub const GUSBCFG_ULPI_UTMI_SEL: u32 = 1 << 4;
/// ULPI DDR select
pub const GUSBCFG_DDRSEL: u32 = 1 << 7;
/// SRP capable
pub const GUSBCFG_SRPCAP: u32 = 1 << 8;
/// HNP capable
pub const GUSBCFG_HNPCAP: u32 = 1 << 9;
/// ULPI FS/LS select
pub const GUSBCFG_ULPI_FSLS: u32 = 1 << 17;
/// ULPI clock suspend mode
pub const GUSBCFG_ULPI_CLK_SUS_M: u32 = 1 << 19;
/// PHY drives VBUS through external supply
pub const GUSBCFG_ULPI_EXT_VBUS_DRV: u32 = 1 << 20;
/// Termination select to drive data line pulse during SRP
pub const GUSBCFG_TERM_SEL_DL_PULSE: u32 = 1 << 22;

// === GRSTCTL bits ===

/// Core soft reset (self-clearing)
pub const GRSTCTL_CSFTRST: u32 = 1 << 0;
/// RxFIFO flush (self-clearing)
pub const GRSTCTL_RXFFLSH: u32 = 1 << 4;
/// TxFIFO flush (self-clearing)
pub const GRSTCTL_TXFFLSH: u32 = 1 << 5;
/// TxFIFO number field for flush
pub const GRSTCTL_TXFNUM_SHIFT: u32 = 6;
/// AHB master is idle
pub const GRSTCTL_AHBIDLE: u32 = 1 << 31;

/// TXFNUM value that flushes all transmit FIFOs at once
pub const FLUSH_ALL_TX_FIFOS: u32 = 0x10;

// === GINTSTS bits ===

/// Current mode of operation (set = host)
pub const GINTSTS_CURMODE_HOST: u32 = 1 << 0;

// === GHWCFG2 fields ===

/// Number of host channels minus one
pub const GHWCFG2_NUM_HOST_CHAN_MASK: u32 = 0xF << 14;
/// Shift for the host channel count field
pub const GHWCFG2_NUM_HOST_CHAN_SHIFT: u32 = 14;

// === HCFG fields ===

/// FS/LS PHY clock select
pub const HCFG_FSLSPCLKSEL_MASK: u32 = 0x3;
/// 30/60 MHz PHY clock (UTMI+/ULPI)
pub const HCFG_FSLSPCLKSEL_30_60_MHZ: u32 = 0;

// === HPRT0 bits ===

/// Port connect status
pub const HPRT0_PRTCONNSTS: u32 = 1 << 0;
/// Port connect detected (write 1 to clear)
pub const HPRT0_PRTCONNDET: u32 = 1 << 1;
/// Port enable (write 1 to clear)
pub const HPRT0_PRTENA: u32 = 1 << 2;
/// Port enable changed (write 1 to clear)
pub const HPRT0_PRTENCHNG: u32 = 1 << 3;
/// Port overcurrent active
pub const HPRT0_PRTOVRCURRACT: u32 = 1 << 4;
/// Port overcurrent changed (write 1 to clear)
pub const HPRT0_PRTOVRCURRCHNG: u32 = 1 << 5;
/// Port resume signalling
pub const HPRT0_PRTRES: u32 = 1 << 6;
/// Port suspend
pub const HPRT0_PRTSUSP: u32 = 1 << 7;
/// Port reset
pub const HPRT0_PRTRST: u32 = 1 << 8;
/// Port power
pub const HPRT0_PRTPWR: u32 = 1 << 12;
/// Port speed field
pub const HPRT0_PRTSPD_MASK: u32 = 0x3 << 17;
/// Shift for the port speed field
pub const HPRT0_PRTSPD_SHIFT: u32 = 17;

/// Write-one-to-clear HPRT0 bits, masked out of every read-modify-write
/// so a plain write-back does not acknowledge pending change latches.
pub const HPRT0_W1C_MASK: u32 =
    HPRT0_PRTENA | HPRT0_PRTCONNDET | HPRT0_PRTENCHNG | HPRT0_PRTOVRCURRCHNG;

// === HCCHAR fields ===

/// Maximum packet size field shift
pub const HCCHAR_MPS_SHIFT: u32 = 0;
/// Endpoint number field shift
pub const HCCHAR_EPNUM_SHIFT: u32 = 11;
/// Endpoint direction field shift (set = IN)
pub const HCCHAR_EPDIR_SHIFT: u32 = 15;
/// Endpoint direction bit
pub const HCCHAR_EPDIR: u32 = 1 << 15;
/// Target is a low-speed device
pub const HCCHAR_LSPDDEV: u32 = 1 << 17;
/// Endpoint type field shift
pub const HCCHAR_EPTYPE_SHIFT: u32 = 18;
/// Packets-per-frame field
pub const HCCHAR_MULTICNT_MASK: u32 = 0x3 << 20;
/// Shift for the packets-per-frame field
pub const HCCHAR_MULTICNT_SHIFT: u32 = 20;
/// Device address field shift
pub const HCCHAR_DEVADDR_SHIFT: u32 = 22;
/// Channel disable
pub const HCCHAR_CHDIS: u32 = 1 << 30;
/// Channel enable
pub const HCCHAR_CHEN: u32 = 1 << 31;

// === HCSPLT fields ===

/// Translator port number field shift
pub const HCSPLT_PRTADDR_SHIFT: u32 = 0;
/// Translator hub address field shift
pub const HCSPLT_HUBADDR_SHIFT: u32 = 7;
/// Complete-split phase
pub const HCSPLT_COMPSPLT: u32 = 1 << 16;
/// Split transactions enabled for this channel
pub const HCSPLT_SPLTENA: u32 = 1 << 31;

// === HCTSIZ fields ===

/// Transfer size field
pub const HCTSIZ_XFERSIZE_MASK: u32 = 0x7FFFF;
/// Shift for the transfer size field
pub const HCTSIZ_XFERSIZE_SHIFT: u32 = 0;
/// Packet count field
pub const HCTSIZ_PKTCNT_MASK: u32 = 0x3FF << 19;
/// Shift for the packet count field
pub const HCTSIZ_PKTCNT_SHIFT: u32 = 19;
/// PID field
pub const HCTSIZ_PID_MASK: u32 = 0x3 << 29;
/// Shift for the PID field
pub const HCTSIZ_PID_SHIFT: u32 = 29;

bitflags! {
    /// Host Channel Interrupt (HCINT) bit definitions
    ///
    /// The halt classifier compares these against exact expected patterns,
    /// so values are kept as raw retained bits rather than truncated.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Hcint: u32 {
        /// Transfer completed
        const XFERCOMP = 1 << 0;
        /// Channel halted
        const CHHLTD = 1 << 1;
        /// AHB error during DMA
        const AHBERR = 1 << 2;
        /// STALL response received
        const STALL = 1 << 3;
        /// NAK response received
        const NAK = 1 << 4;
        /// ACK response received
        const ACK = 1 << 5;
        /// NYET response received (transaction translator not ready)
        const NYET = 1 << 6;
        /// Transaction error (CRC, timeout, bit stuffing, bad EOP)
        const XACTERR = 1 << 7;
        /// Babble error
        const BBLERR = 1 << 8;
        /// Frame overrun
        const FRMOVRUN = 1 << 9;
        /// Data toggle error
        const DATATGLERR = 1 << 10;
    }
}

/// Mask covering every channel interrupt latch, used to clear stale
/// status before a channel is programmed.
pub const HCINT_CLEAR_ALL: u32 = 0x3FFF;

// === Transfer geometry ===

/// Largest value the HCTSIZ transfer size field accepts
pub const MAX_TRANSFER_SIZE: usize = 65535;
/// Largest value the HCTSIZ packet count field accepts
pub const MAX_PACKET_COUNT: usize = 511;
/// Recommended DMA scratch buffer size (one full HCTSIZ window)
pub const DATA_BUF_SIZE: usize = 64 * 1024;
/// Size of the status-stage scratch buffer
pub const STATUS_BUF_SIZE: usize = 64;

/// Channel reserved for synchronous (control/bulk) transfers
pub const SYNC_CHANNEL: u8 = 0;
/// Channel reserved for deferred periodic (interrupt) polling
pub const PERIODIC_CHANNEL: u8 = 1;

// === FIFO geometry (in 32-bit words, BCM283x defaults) ===

/// Receive FIFO depth
pub const HOST_RX_FIFO_SIZE: u32 = 774;
/// Non-periodic transmit FIFO depth
pub const HOST_NPERIO_TX_FIFO_SIZE: u32 = 256;
/// Periodic transmit FIFO depth
pub const HOST_PERIO_TX_FIFO_SIZE: u32 = 512;
/// FIFO depth field shift in GNPTXFSIZ/HPTXFSIZ
pub const FIFOSIZE_DEPTH_SHIFT: u32 = 16;
/// FIFO start address field shift in GNPTXFSIZ/HPTXFSIZ
pub const FIFOSIZE_STARTADDR_SHIFT: u32 = 0;
