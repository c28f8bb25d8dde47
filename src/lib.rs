#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

//! USB 2.0 host driver for DesignWare DWC2 OTG controllers
//!
//! This driver targets the DWC2 host block found in BCM283x-class SoCs
//! (Raspberry Pi and friends): control, bulk and asynchronous interrupt
//! transfers over the controller's DMA channels, including the split
//! transactions needed to reach low-/full-speed devices through a
//! high-speed hub's transaction translator.
//!
//! # Core Components
//!
//! - [`host`] - the [`DwUsbHost`] facade owning the controller
//! - [`dwc`] - register map, channel programming, halt classification,
//!   core bring-up
//! - [`transfer`] - transfer request model and the segmenting engine
//! - [`periodic`] - deferred interrupt-endpoint polling
//! - [`dma`] - DMA scratch buffer handling
//! - [`roothub`] - root port status/feature pass-through
//! - [`error`] - error types
//!
//! # Hardware model
//!
//! Exactly two channels are used: channel 0 for all synchronous
//! transfers, channel 1 for all periodic polling, so transfers never
//! contend for hardware by construction. Register access is abstracted
//! behind [`UsbRegisters`], with [`MmioRegisters`] as the real
//! memory-mapped implementation; every hardware wait is a bounded poll.
//!
//! # Bring-up
//!
//! ```no_run
//! use dwc2_usbh::{DwUsbHost, MmioRegisters};
//!
//! static mut DMA: dwc2_usbh::DmaRegion = dwc2_usbh::DmaRegion::new();
//!
//! # fn main() -> dwc2_usbh::Result<()> {
//! let regs = unsafe { MmioRegisters::new(0x3F98_0000, 1_000_000_000) };
//! let dma = unsafe { (*core::ptr::addr_of_mut!(DMA)).buffer() };
//! let mut host: DwUsbHost<'_, _> = DwUsbHost::new(regs, dma)?;
//! host.reset()?;
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "defmt")]
use defmt as _;

pub mod dma;
pub mod dwc;
pub mod error;
pub mod host;
pub mod periodic;
pub mod roothub;
pub mod transfer;

pub use dma::{DmaBuffer, DmaRegion};
pub use dwc::channel::Pid;
pub use dwc::register::{MmioRegisters, UsbRegisters};
pub use error::{Result, UsbError};
pub use host::{Capability, DwUsbHost, HostState};
pub use periodic::{EndpointKey, PollCallback, PERIODIC_BUF_CAPACITY};
pub use roothub::{PortChange, PortFeature, PortStatus};
pub use transfer::control::ControlData;
pub use transfer::{Direction, EndpointType, SetupPacket, Speed, Translator, XferBuf};
