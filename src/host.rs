//! Host controller facade
//!
//! [`DwUsbHost`] is the single owner of the controller: the register
//! backend, the DMA scratch buffer, the status-stage scratch, the two
//! reserved hardware channels and the periodic request registry. All
//! synchronous transfers run to completion on channel 0; all periodic
//! polling runs on channel 1. One caller context at a time, by `&mut`
//! construction.

use crate::dma::DmaBuffer;
use crate::dwc::core::{core_init, core_reset, host_init};
use crate::dwc::register::UsbRegisters;
use crate::dwc::{HPRT0, HPRT0_PRTRST, HPRT0_W1C_MASK, STATUS_BUF_SIZE};
use crate::error::{Result, UsbError};
use crate::periodic::{EndpointKey, PeriodicScheduler, PollCallback};
use crate::roothub::{self, PortChange, PortFeature, PortStatus};
use crate::transfer::control::{execute_control, ControlData};
use crate::transfer::{bulk, SetupPacket, Speed, Translator, XferBuf};
use crate::transfer::Direction;

/// Endpoint address direction bit (set = device-to-host).
const ENDPOINT_DIR_IN: u8 = 0x80;

/// Index of the single root hub port.
const ROOT_PORT: u8 = 0;

/// Smallest usable DMA scratch buffer: the segment caps subtract one
/// maximum packet from the capacity, so it must comfortably exceed the
/// largest packet size.
const MIN_DMA_BUF_SIZE: usize = 4096;

/// Reported operational state of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HostState {
    /// Controller halted
    Halted,
    /// Controller running
    Operational,
    /// Controller suspended
    Suspended,
}

/// Static capabilities of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Capability {
    /// Fastest speed the root port runs at
    pub max_speed: Speed,
    /// Number of root hub ports
    pub ports: u8,
}

/// DWC2 host controller instance.
///
/// `MAX_PERIODIC` bounds the number of concurrently polled interrupt
/// endpoints and must be a power of two. The `'cb` lifetime covers the
/// poll callbacks handed to [`Self::interrupt_poll_start`].
pub struct DwUsbHost<'cb, R: UsbRegisters, const MAX_PERIODIC: usize = 8> {
    regs: R,
    dma: DmaBuffer,
    status_buf: [u8; STATUS_BUF_SIZE],
    state: HostState,
    periodic: PeriodicScheduler<'cb, MAX_PERIODIC>,
}

impl<'cb, R: UsbRegisters, const MAX_PERIODIC: usize> DwUsbHost<'cb, R, MAX_PERIODIC> {
    /// Create a host over a register backend and a mapped DMA scratch
    /// buffer of at least 4 KiB (64 KiB recommended, one full transfer
    /// window). No hardware is touched until [`Self::reset`].
    pub fn new(regs: R, dma: DmaBuffer) -> Result<Self> {
        if dma.len() < MIN_DMA_BUF_SIZE {
            return Err(UsbError::InvalidParameter);
        }
        Ok(Self {
            regs,
            dma,
            status_buf: [0; STATUS_BUF_SIZE],
            state: HostState::Halted,
            periodic: PeriodicScheduler::new(),
        })
    }

    /// Static controller capabilities.
    pub fn capability(&self) -> Capability {
        Capability {
            max_speed: Speed::High,
            ports: 1,
        }
    }

    /// Reported controller state.
    pub fn state(&self) -> HostState {
        self.state
    }

    /// Set the reported controller state.
    pub fn set_state(&mut self, state: HostState) {
        self.state = state;
    }

    /// Bring the controller up: core and host initialization followed by
    /// a root-port reset pulse. Must run once before any transfer and
    /// may be repeated to recover the controller. Leaves the state
    /// [`HostState::Operational`].
    pub fn reset(&mut self) -> Result<()> {
        core_init(&mut self.regs)?;
        host_init(&mut self.regs)?;

        self.regs.modify32(HPRT0, HPRT0_W1C_MASK, HPRT0_PRTRST);
        self.regs.delay_us(50_000);
        self.regs.modify32(HPRT0, HPRT0_W1C_MASK | HPRT0_PRTRST, 0);

        self.state = HostState::Operational;
        Ok(())
    }

    /// Run a control transfer: SETUP stage, optional data stage, status
    /// stage. Returns the data-stage byte count (zero without a data
    /// stage). `translator` must be supplied when the device is
    /// low-/full-speed behind a high-speed hub.
    pub fn control_transfer(
        &mut self,
        device_address: u8,
        speed: Speed,
        max_packet: u16,
        request: &SetupPacket,
        data: ControlData<'_>,
        translator: Option<Translator>,
    ) -> Result<usize> {
        let Self {
            regs,
            dma,
            status_buf,
            ..
        } = self;
        execute_control(
            regs,
            dma,
            status_buf,
            device_address,
            speed,
            max_packet,
            request,
            data,
            translator,
        )
    }

    /// Run a bulk transfer on `endpoint` (number only, direction comes
    /// from the buffer variant). The data toggle threads in and out so
    /// consecutive calls continue the DATA0/DATA1 sequence; it is updated
    /// even when the transfer fails partway. Returns the byte count
    /// actually moved; on failure, inbound bytes already received remain
    /// in the buffer.
    #[allow(clippy::too_many_arguments)]
    pub fn bulk_transfer(
        &mut self,
        device_address: u8,
        endpoint: u8,
        speed: Speed,
        max_packet: u16,
        data: XferBuf<'_>,
        toggle: &mut u8,
        translator: Option<Translator>,
    ) -> Result<usize> {
        let Self { regs, dma, .. } = self;
        bulk::execute_bulk(
            regs,
            dma,
            device_address,
            endpoint,
            speed,
            max_packet,
            data,
            toggle,
            translator,
        )
    }

    /// Start polling an interrupt IN endpoint every `interval_ms`
    /// milliseconds. `endpoint_address` must carry the direction bit
    /// (device-to-host only). The first poll runs before this returns;
    /// afterwards polls fire from [`Self::poll_periodic`]. `length`
    /// bytes are requested on every poll into a privately owned buffer;
    /// results reach `callback` as described in [`crate::periodic`].
    #[allow(clippy::too_many_arguments)]
    pub fn interrupt_poll_start(
        &mut self,
        device_address: u8,
        endpoint_address: u8,
        speed: Speed,
        max_packet: u16,
        toggle: u8,
        interval_ms: u32,
        length: usize,
        translator: Option<Translator>,
        callback: PollCallback<'cb>,
        now_ms: u64,
    ) -> Result<()> {
        if endpoint_address & ENDPOINT_DIR_IN == 0 {
            return Err(UsbError::InvalidParameter);
        }
        let Self {
            regs,
            dma,
            periodic,
            ..
        } = self;
        periodic.start(
            regs,
            dma,
            endpoint_key(device_address, endpoint_address),
            speed,
            max_packet,
            toggle,
            interval_ms,
            length,
            translator,
            callback,
            now_ms,
        )
    }

    /// Stop polling an interrupt endpoint, returning the final data
    /// toggle so a later restart can continue the sequence.
    pub fn interrupt_poll_stop(&mut self, device_address: u8, endpoint_address: u8) -> Result<u8> {
        self.periodic
            .stop(endpoint_key(device_address, endpoint_address))
    }

    /// Periodic dispatch point: run every due interrupt poll.
    ///
    /// Call at millisecond granularity with a monotonic timestamp; the
    /// same timebase must feed [`Self::interrupt_poll_start`].
    pub fn poll_periodic(&mut self, now_ms: u64) {
        let Self {
            regs,
            dma,
            periodic,
            ..
        } = self;
        periodic.service(regs, dma, now_ms);
    }

    /// Number of interrupt endpoints currently being polled.
    pub fn active_polls(&self) -> usize {
        self.periodic.active_count()
    }

    /// Read the root port status and change words.
    pub fn port_status(&self, port: u8) -> Result<(PortStatus, PortChange)> {
        if port > ROOT_PORT {
            return Err(UsbError::InvalidParameter);
        }
        Ok(roothub::port_status(&self.regs))
    }

    /// Assert a root port feature.
    pub fn set_port_feature(&mut self, port: u8, feature: PortFeature) -> Result<()> {
        if port > ROOT_PORT {
            return Err(UsbError::InvalidParameter);
        }
        roothub::set_feature(&mut self.regs, feature)
    }

    /// Deassert a root port feature or acknowledge a change latch.
    pub fn clear_port_feature(&mut self, port: u8, feature: PortFeature) -> Result<()> {
        if port > ROOT_PORT {
            return Err(UsbError::InvalidParameter);
        }
        roothub::clear_feature(&mut self.regs, feature)
    }

    /// Tear the controller down: cancel every periodic request so no poll
    /// can fire into dead state, hold the root port in reset, soft-reset
    /// the core, and hand the register backend and DMA buffer back for
    /// unmapping.
    pub fn shutdown(mut self) -> (R, DmaBuffer) {
        self.periodic.cancel_all();

        self.regs.modify32(HPRT0, HPRT0_W1C_MASK, HPRT0_PRTRST);
        self.regs.delay_us(50_000);

        // best effort: the controller is going away regardless
        let _ = core_reset(&mut self.regs);

        self.state = HostState::Halted;
        (self.regs, self.dma)
    }
}

/// Split an endpoint address into the registry identity.
fn endpoint_key(device_address: u8, endpoint_address: u8) -> EndpointKey {
    EndpointKey {
        device_address,
        endpoint: endpoint_address & 0x0F,
        direction: if endpoint_address & ENDPOINT_DIR_IN != 0 {
            Direction::In
        } else {
            Direction::Out
        },
    }
}
