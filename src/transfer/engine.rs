//! Segmenting transfer engine
//!
//! Drives one logical transfer (a control stage, a bulk transfer, or one
//! interrupt poll) to completion by repeatedly programming the channel,
//! classifying the halt, and advancing a byte offset. An arbitrary-length
//! request becomes a sequence of hardware-sized bursts, each bounded by
//! the HCTSIZ transfer-size field, the DMA scratch capacity and the
//! HCTSIZ packet-count field.

use crate::dma::DmaBuffer;
use crate::dwc::channel::{self, ChannelHalt, SplitControl};
use crate::dwc::register::UsbRegisters;
use crate::dwc::{
    hcdma, hcint, hcintmsk, hctsiz, HCTSIZ_PID_SHIFT, HCTSIZ_PKTCNT_SHIFT, HCTSIZ_XFERSIZE_SHIFT,
    MAX_PACKET_COUNT, MAX_TRANSFER_SIZE,
};
use crate::error::{Result, UsbError};
use crate::transfer::{Direction, Transfer, XferBuf};

/// Byte count and packet count of one hardware burst.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Segment {
    pub len: usize,
    pub packets: u32,
}

/// Compute the next burst for a transfer with `remaining` bytes left.
///
/// The hardware caps are each reduced by one packet so a capped burst
/// still ends on a packet boundary. Split transactions carry exactly one
/// packet per burst. Inbound bursts always program whole packets: the
/// transfer-size field must be a packet multiple for IN, and the actual
/// received length is recovered from the remaining-count readback.
pub(crate) fn segment_size(
    remaining: usize,
    max_packet: usize,
    dma_capacity: usize,
    splitting: bool,
    direction: Direction,
) -> Segment {
    let mut len = remaining;

    if len > MAX_TRANSFER_SIZE {
        len = MAX_TRANSFER_SIZE - max_packet + 1;
    }
    if len > dma_capacity {
        len = dma_capacity - max_packet + 1;
    }

    let packets = if splitting || len == 0 {
        1
    } else {
        let mut packets = (len + max_packet - 1) / max_packet;
        if packets > MAX_PACKET_COUNT {
            packets = MAX_PACKET_COUNT;
            len = packets * max_packet;
        }
        packets as u32
    };

    if direction == Direction::In {
        len = packets as usize * max_packet;
    }

    Segment { len, packets }
}

/// Drive `xfer` to completion on `channel`.
///
/// Returns the number of bytes actually moved; on failure the error code
/// reflects the halt classification and `xfer.completed` still holds the
/// byte count of the segments that finished — partial completion is never
/// rolled back. A short inbound packet terminates the transfer early, per
/// USB semantics. Restart classifications (split phase advances, NYET
/// retries, frame overruns) are retried in place, bounded only by the
/// halt-wait timeout inside the classifier. Whatever the outcome, the
/// channel's interrupt state is masked and cleared so the next transfer
/// starts clean.
pub(crate) fn execute_transfer<R: UsbRegisters>(
    regs: &mut R,
    dma: &mut DmaBuffer,
    channel: u8,
    xfer: &mut Transfer<'_>,
    ignore_ack: bool,
) -> Result<usize> {
    let total = xfer.buf.len();
    let max_packet = xfer.max_packet as usize;
    let mut done = 0usize;
    let mut short_packet = false;

    let status = loop {
        // Split phase restarts from start-split on every new segment;
        // within a segment only the classifier advances it.
        let mut split = SplitControl::for_speed(xfer.speed);

        let seg = segment_size(
            total - done,
            max_packet,
            dma.len(),
            split.splitting,
            xfer.buf.direction(),
        );

        regs.write32(
            hctsiz(channel),
            (seg.len as u32) << HCTSIZ_XFERSIZE_SHIFT
                | seg.packets << HCTSIZ_PKTCNT_SHIFT
                | xfer.pid.bits() << HCTSIZ_PID_SHIFT,
        );

        if let XferBuf::Out(data) = &xfer.buf {
            dma.as_mut_slice()[..seg.len].copy_from_slice(&data[done..done + seg.len]);
            regs.dma_barrier();
        }
        regs.write32(hcdma(channel), dma.bus_addr());

        let outcome = loop {
            channel::program(regs, channel, xfer, &split);
            channel::enable(regs, channel);

            match channel::wait_for_halt(regs, channel, ignore_ack, &mut split) {
                ChannelHalt::Restart => continue,
                ChannelHalt::Done { remaining, pid } => break Ok((remaining as usize, pid)),
                ChannelHalt::Nak => break Err(UsbError::Nak),
                ChannelHalt::Stall => break Err(UsbError::Stall),
                ChannelHalt::Error(e) => break Err(e),
            }
        };

        let (remaining, pid) = match outcome {
            Ok(done_halt) => done_halt,
            Err(e) => break Err(e),
        };
        xfer.pid = pid;

        let mut moved = seg.len;
        if let XferBuf::In(data) = &mut xfer.buf {
            regs.dma_barrier();
            // Inbound bursts are programmed in whole packets; the device
            // may fill them past the caller's request, so clamp.
            moved = seg.len.saturating_sub(remaining).min(total - done);
            data[done..done + moved].copy_from_slice(&dma.as_slice()[..moved]);
            if remaining != 0 {
                short_packet = true;
            }
        }

        done += moved;
        if done >= total || short_packet {
            break Ok(());
        }
    };

    // Leave the channel quiescent for its next user.
    regs.write32(hcintmsk(channel), 0);
    regs.write32(hcint(channel), 0xFFFF_FFFF);

    xfer.completed = done;
    status.map(|()| done)
}
