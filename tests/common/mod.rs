//! Shared test infrastructure: a scripted DWC2 register model
//!
//! The mock backs the `UsbRegisters` trait with a plain register file
//! plus just enough behavior to drive the transfer engine: self-clearing
//! reset/flush bits, channel-enable detection, and a script of halt
//! outcomes that are surfaced through HCINT/HCTSIZ exactly the way the
//! hardware reports them. Each channel enable consumes one script entry
//! and snapshots the registers the driver programmed, so tests can assert
//! on what actually reached the hardware.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::ptr::NonNull;
use std::rc::Rc;

use dwc2_usbh::dwc;
use dwc2_usbh::{DmaBuffer, UsbRegisters};

/// Outcome of one channel enable, as the hardware would report it.
pub struct HaltScript {
    /// HCINT value observed after the halt
    pub hcint: u32,
    /// HCTSIZ transfer-size readback (bytes not transferred)
    pub remaining: u32,
    /// HCTSIZ PID readback
    pub pid: u32,
    /// Bytes the device "sent", placed in the DMA buffer at enable time
    pub data: Vec<u8>,
}

impl HaltScript {
    pub fn done(remaining: u32, pid: u32) -> Self {
        Self {
            hcint: (dwc::Hcint::CHHLTD | dwc::Hcint::XFERCOMP | dwc::Hcint::ACK).bits(),
            remaining,
            pid,
            data: Vec::new(),
        }
    }

    pub fn done_with_data(remaining: u32, pid: u32, data: &[u8]) -> Self {
        Self {
            data: data.to_vec(),
            ..Self::done(remaining, pid)
        }
    }

    pub fn raw(hcint: u32) -> Self {
        Self {
            hcint,
            remaining: 0,
            pid: 0,
            data: Vec::new(),
        }
    }

    pub fn nak() -> Self {
        Self::raw((dwc::Hcint::CHHLTD | dwc::Hcint::NAK).bits())
    }

    pub fn stall() -> Self {
        Self::raw((dwc::Hcint::CHHLTD | dwc::Hcint::STALL).bits())
    }
}

/// Register values snapshotted at channel-enable time.
#[derive(Debug, Clone, Copy)]
pub struct ChannelProgram {
    pub channel: u8,
    pub hcchar: u32,
    pub hcsplt: u32,
    pub hctsiz: u32,
    pub hcdma: u32,
}

impl ChannelProgram {
    pub fn size(&self) -> u32 {
        (self.hctsiz & dwc::HCTSIZ_XFERSIZE_MASK) >> dwc::HCTSIZ_XFERSIZE_SHIFT
    }

    pub fn packets(&self) -> u32 {
        (self.hctsiz & dwc::HCTSIZ_PKTCNT_MASK) >> dwc::HCTSIZ_PKTCNT_SHIFT
    }

    pub fn pid(&self) -> u32 {
        (self.hctsiz & dwc::HCTSIZ_PID_MASK) >> dwc::HCTSIZ_PID_SHIFT
    }

    pub fn max_packet(&self) -> u32 {
        (self.hcchar >> dwc::HCCHAR_MPS_SHIFT) & 0x7FF
    }

    pub fn device_address(&self) -> u32 {
        (self.hcchar >> dwc::HCCHAR_DEVADDR_SHIFT) & 0x7F
    }

    pub fn endpoint(&self) -> u32 {
        (self.hcchar >> dwc::HCCHAR_EPNUM_SHIFT) & 0xF
    }

    pub fn is_in(&self) -> bool {
        self.hcchar & dwc::HCCHAR_EPDIR != 0
    }

    pub fn is_low_speed(&self) -> bool {
        self.hcchar & dwc::HCCHAR_LSPDDEV != 0
    }

    pub fn split_enabled(&self) -> bool {
        self.hcsplt & dwc::HCSPLT_SPLTENA != 0
    }

    pub fn complete_split(&self) -> bool {
        self.hcsplt & dwc::HCSPLT_COMPSPLT != 0
    }

    pub fn hub_address(&self) -> u32 {
        (self.hcsplt >> dwc::HCSPLT_HUBADDR_SHIFT) & 0x7F
    }

    pub fn hub_port(&self) -> u32 {
        (self.hcsplt >> dwc::HCSPLT_PRTADDR_SHIFT) & 0x7F
    }
}

struct Inner {
    regs: RefCell<Vec<u32>>,
    scripts: RefCell<VecDeque<HaltScript>>,
    programs: RefCell<Vec<ChannelProgram>>,
    writes: RefCell<Vec<(u32, u32)>>,
    delay_us: Cell<u64>,
    dma_ptr: Cell<*mut u8>,
    dma_len: Cell<usize>,
}

/// Cloneable handle to the shared register model; the clone given to the
/// host and the one kept by the test observe the same state.
#[derive(Clone)]
pub struct MockDwc(Rc<Inner>);

const REG_SPACE_WORDS: usize = 0x1000 / 4;

impl MockDwc {
    pub fn new() -> Self {
        let mut regs = vec![0u32; REG_SPACE_WORDS];
        // reset defaults: AHB idle, 8 host channels, host mode
        regs[(dwc::GRSTCTL / 4) as usize] = dwc::GRSTCTL_AHBIDLE;
        regs[(dwc::GHWCFG2 / 4) as usize] = 7 << dwc::GHWCFG2_NUM_HOST_CHAN_SHIFT;
        regs[(dwc::GINTSTS / 4) as usize] = dwc::GINTSTS_CURMODE_HOST;

        Self(Rc::new(Inner {
            regs: RefCell::new(regs),
            scripts: RefCell::new(VecDeque::new()),
            programs: RefCell::new(Vec::new()),
            writes: RefCell::new(Vec::new()),
            delay_us: Cell::new(0),
            dma_ptr: Cell::new(std::ptr::null_mut()),
            dma_len: Cell::new(0),
        }))
    }

    /// Allocate a DMA scratch region shared between the returned handle
    /// and the mock's device side.
    pub fn make_dma(&self, len: usize) -> DmaBuffer {
        let mem: &'static mut [u8] = Box::leak(vec![0u8; len].into_boxed_slice());
        self.0.dma_ptr.set(mem.as_mut_ptr());
        self.0.dma_len.set(len);
        unsafe { DmaBuffer::new(NonNull::new(mem.as_mut_ptr()).unwrap(), len, 0x1000_0000) }
    }

    pub fn push(&self, script: HaltScript) {
        self.0.scripts.borrow_mut().push_back(script);
    }

    /// Channel programs observed so far (one per channel enable).
    pub fn programs(&self) -> Vec<ChannelProgram> {
        self.0.programs.borrow().clone()
    }

    pub fn enables(&self) -> usize {
        self.0.programs.borrow().len()
    }

    pub fn pending_scripts(&self) -> usize {
        self.0.scripts.borrow().len()
    }

    pub fn reg(&self, offset: u32) -> u32 {
        self.0.regs.borrow()[(offset / 4) as usize]
    }

    pub fn total_delay_us(&self) -> u64 {
        self.0.delay_us.get()
    }

    pub fn wrote(&self, offset: u32, value: u32) -> bool {
        self.0.writes.borrow().iter().any(|&(o, v)| o == offset && v == value)
    }

    /// Every value written to `offset`, in order.
    pub fn writes_to(&self, offset: u32) -> Vec<u32> {
        self.0
            .writes
            .borrow()
            .iter()
            .filter(|&&(o, _)| o == offset)
            .map(|&(_, v)| v)
            .collect()
    }

    /// Bytes currently in the shared DMA region.
    pub fn dma_bytes(&self, len: usize) -> Vec<u8> {
        let ptr = self.0.dma_ptr.get();
        assert!(!ptr.is_null() && len <= self.0.dma_len.get());
        unsafe { std::slice::from_raw_parts(ptr, len).to_vec() }
    }

    fn channel_of(offset: u32) -> Option<(u8, u32)> {
        if (0x500..0x700).contains(&offset) {
            Some((((offset - 0x500) / 0x20) as u8, (offset - 0x500) % 0x20))
        } else {
            None
        }
    }

    fn fire_channel(&self, ch: u8) {
        let script = self
            .0
            .scripts
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected enable of channel {ch}: script exhausted"));

        // device-to-host data lands in the DMA region
        if !script.data.is_empty() {
            let ptr = self.0.dma_ptr.get();
            assert!(
                !ptr.is_null() && script.data.len() <= self.0.dma_len.get(),
                "scripted data does not fit the DMA region"
            );
            unsafe {
                std::ptr::copy_nonoverlapping(script.data.as_ptr(), ptr, script.data.len());
            }
        }

        let mut regs = self.0.regs.borrow_mut();
        let snapshot = ChannelProgram {
            channel: ch,
            hcchar: regs[(dwc::hcchar(ch) / 4) as usize],
            hcsplt: regs[(dwc::hcsplt(ch) / 4) as usize],
            hctsiz: regs[(dwc::hctsiz(ch) / 4) as usize],
            hcdma: regs[(dwc::hcdma(ch) / 4) as usize],
        };
        regs[(dwc::hcint(ch) / 4) as usize] = script.hcint;
        regs[(dwc::hctsiz(ch) / 4) as usize] = script.remaining << dwc::HCTSIZ_XFERSIZE_SHIFT
            | script.pid << dwc::HCTSIZ_PID_SHIFT;
        drop(regs);

        self.0.programs.borrow_mut().push(snapshot);
    }
}

impl UsbRegisters for MockDwc {
    fn read32(&self, offset: u32) -> u32 {
        self.0.regs.borrow()[(offset / 4) as usize]
    }

    fn write32(&mut self, offset: u32, value: u32) {
        self.0.writes.borrow_mut().push((offset, value));

        let mut stored = value;
        if offset == dwc::GRSTCTL {
            // self-clearing reset and flush bits, AHB always idle again
            stored &= !(dwc::GRSTCTL_CSFTRST | dwc::GRSTCTL_RXFFLSH | dwc::GRSTCTL_TXFFLSH);
            stored |= dwc::GRSTCTL_AHBIDLE;
        }

        let fire = match Self::channel_of(offset) {
            Some((ch, 0)) => {
                // HCCHAR: the channel "runs" when enabled without disable
                let enabled =
                    value & dwc::HCCHAR_CHEN != 0 && value & dwc::HCCHAR_CHDIS == 0;
                stored &= !dwc::HCCHAR_CHEN;
                enabled.then_some(ch)
            }
            _ => None,
        };

        self.0.regs.borrow_mut()[(offset / 4) as usize] = stored;

        if let Some(ch) = fire {
            self.fire_channel(ch);
        }
    }

    fn delay_us(&mut self, us: u32) {
        self.0.delay_us.set(self.0.delay_us.get() + us as u64);
    }

    fn dma_barrier(&mut self) {}
}
