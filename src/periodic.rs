//! Deferred periodic transfer scheduler
//!
//! Interrupt endpoints are polled on a timer: the platform calls the
//! service entry point at millisecond granularity and each registered
//! request re-runs the segmenting engine on the dedicated periodic
//! channel when its interval elapses. A NAK from the endpoint is the
//! normal "nothing to report yet" outcome and is swallowed; every other
//! outcome reaches the caller's callback exactly once per poll.
//!
//! Requests own a private copy of their data buffer because they outlive
//! the caller's stack frame. At most one request may be active per
//! (device, endpoint, direction) identity.
//!
//! Registry mutation and tick delivery are mutually exclusive by
//! construction: every entry point takes `&mut self`. A platform that
//! drives [`PeriodicScheduler::service`] from an interrupt handler must
//! wrap the owning host in its own critical-section primitive.

use heapless::FnvIndexMap;

use crate::dma::DmaBuffer;
use crate::dwc::channel::Pid;
use crate::dwc::register::UsbRegisters;
use crate::dwc::PERIODIC_CHANNEL;
use crate::error::{Result, UsbError};
use crate::transfer::engine::execute_transfer;
use crate::transfer::{Direction, EndpointType, Speed, Transfer, Translator, XferBuf};

/// Size of the private data buffer owned by each deferred request; poll
/// lengths beyond this are rejected with [`UsbError::NoResources`].
pub const PERIODIC_BUF_CAPACITY: usize = 1024;

/// Completion callback for one poll: the received bytes and the transfer
/// result. Invoked from the service dispatch point; it must not reenter
/// the scheduler.
pub type PollCallback<'cb> = &'cb mut dyn FnMut(&[u8], Result<()>);

/// Identity of a periodic polling request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EndpointKey {
    /// Device address
    pub device_address: u8,
    /// Endpoint number without the direction bit
    pub endpoint: u8,
    /// Endpoint direction
    pub direction: Direction,
}

/// One registered polling request.
struct DeferredRequest<'cb> {
    speed: Speed,
    max_packet: u16,
    pid: Pid,
    interval_ms: u32,
    next_due_ms: u64,
    length: usize,
    translator: Option<Translator>,
    buffer: [u8; PERIODIC_BUF_CAPACITY],
    callback: PollCallback<'cb>,
}

/// Registry of active interrupt-endpoint polling requests.
///
/// `N` is the registry capacity and must be a power of two.
pub struct PeriodicScheduler<'cb, const N: usize = 8> {
    requests: FnvIndexMap<EndpointKey, DeferredRequest<'cb>, N>,
}

impl<'cb, const N: usize> PeriodicScheduler<'cb, N> {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            requests: FnvIndexMap::new(),
        }
    }

    /// Number of active requests.
    pub fn active_count(&self) -> usize {
        self.requests.len()
    }

    /// Register a new polling request and run its first poll immediately.
    ///
    /// Rejected with [`UsbError::InvalidParameter`] when a request with
    /// the same identity is already active, the length is zero, the
    /// toggle is not 0 or 1, or the interval is outside 1..=255 ms; with
    /// [`UsbError::NoResources`] when the length exceeds
    /// [`PERIODIC_BUF_CAPACITY`] or the registry is full. No state is
    /// left behind on rejection and no hardware is touched.
    #[allow(clippy::too_many_arguments)]
    pub fn start<R: UsbRegisters>(
        &mut self,
        regs: &mut R,
        dma: &mut DmaBuffer,
        key: EndpointKey,
        speed: Speed,
        max_packet: u16,
        toggle: u8,
        interval_ms: u32,
        length: usize,
        translator: Option<Translator>,
        callback: PollCallback<'cb>,
        now_ms: u64,
    ) -> Result<()> {
        if self.requests.contains_key(&key) {
            return Err(UsbError::InvalidParameter);
        }
        if length == 0 || toggle > 1 || !(1..=255).contains(&interval_ms) || max_packet == 0 {
            return Err(UsbError::InvalidParameter);
        }
        if length > PERIODIC_BUF_CAPACITY {
            #[cfg(feature = "defmt")]
            defmt::error!("periodic start: poll length {} exceeds buffer", length);
            return Err(UsbError::NoResources);
        }

        let request = DeferredRequest {
            speed,
            max_packet,
            pid: Pid::from_toggle(toggle),
            interval_ms,
            next_due_ms: now_ms + interval_ms as u64,
            length,
            translator,
            buffer: [0; PERIODIC_BUF_CAPACITY],
            callback,
        };
        if self.requests.insert(key, request).is_err() {
            #[cfg(feature = "defmt")]
            defmt::error!("periodic start: registry full");
            return Err(UsbError::NoResources);
        }

        // first poll runs right away; the timer cadence takes over after
        if let Some(request) = self.requests.get_mut(&key) {
            run_tick(regs, dma, key, request);
        }

        Ok(())
    }

    /// Cancel an active request, handing back its final data toggle.
    ///
    /// Rejected with [`UsbError::InvalidParameter`] when no request with
    /// this identity is active (never started, or already stopped).
    pub fn stop(&mut self, key: EndpointKey) -> Result<u8> {
        match self.requests.remove(&key) {
            Some(request) => Ok(request.pid.toggle()),
            None => {
                #[cfg(feature = "defmt")]
                defmt::warn!(
                    "not ending periodic transfer {}:{} - not found",
                    key.device_address,
                    key.endpoint
                );
                Err(UsbError::InvalidParameter)
            }
        }
    }

    /// Run every request whose interval has elapsed at `now_ms`.
    ///
    /// Requests are visited in registration order; each due request polls
    /// once and is rescheduled one interval ahead.
    pub fn service<R: UsbRegisters>(&mut self, regs: &mut R, dma: &mut DmaBuffer, now_ms: u64) {
        for (key, request) in self.requests.iter_mut() {
            if now_ms >= request.next_due_ms {
                request.next_due_ms = now_ms + request.interval_ms as u64;
                run_tick(regs, dma, *key, request);
            }
        }
    }

    /// Drop every active request without invoking callbacks.
    ///
    /// Called at teardown before the hardware is reset, so no poll can
    /// fire into a dead controller.
    pub fn cancel_all(&mut self) {
        #[cfg(feature = "defmt")]
        for (key, _) in self.requests.iter() {
            defmt::info!(
                "cancelling periodic access to {:#x}:{:#x}",
                key.device_address,
                key.endpoint
            );
        }
        self.requests.clear();
    }
}

impl<const N: usize> Default for PeriodicScheduler<'_, N> {
    fn default() -> Self {
        Self::new()
    }
}

/// One poll of one interrupt endpoint on the periodic channel.
fn run_tick<R: UsbRegisters>(
    regs: &mut R,
    dma: &mut DmaBuffer,
    key: EndpointKey,
    request: &mut DeferredRequest<'_>,
) {
    let mut xfer = Transfer {
        device_address: key.device_address,
        speed: request.speed,
        endpoint: key.endpoint,
        ep_type: EndpointType::Interrupt,
        max_packet: request.max_packet,
        pid: request.pid,
        // the requested length never shrinks across polls, whatever the
        // previous poll returned
        buf: XferBuf::In(&mut request.buffer[..request.length]),
        translator: request.translator,
        completed: 0,
    };
    // interrupt polling does not use the ACK-gated split handshake
    let result = execute_transfer(regs, dma, PERIODIC_CHANNEL, &mut xfer, true);

    // continue the toggle sequence on the next poll
    request.pid = xfer.pid;
    let completed = xfer.completed;

    match result {
        // nothing available yet; the endpoint gets polled again next tick
        Err(UsbError::Nak) => {}
        Ok(received) => (request.callback)(&request.buffer[..received], Ok(())),
        Err(e) => (request.callback)(&request.buffer[..completed], Err(e)),
    }
}
