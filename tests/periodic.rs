//! Deferred periodic scheduler scenarios against the scripted register
//! model.

mod common;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use common::{HaltScript, MockDwc};
use dwc2_usbh::dwc::{self, Hcint};
use dwc2_usbh::{DwUsbHost, Pid, Result, Speed, UsbError};

const DATA0: u32 = Pid::Data0 as u32;
const DATA1: u32 = Pid::Data1 as u32;

fn make_host<'cb>(mock: &MockDwc) -> DwUsbHost<'cb, MockDwc> {
    let dma = mock.make_dma(dwc::DATA_BUF_SIZE);
    DwUsbHost::new(mock.clone(), dma).expect("host creation failed")
}

/// Callback recorder shared between the test and the closure handed to
/// the scheduler.
#[derive(Clone, Default)]
struct Recorder {
    calls: Rc<Cell<usize>>,
    last_data: Rc<RefCell<Vec<u8>>>,
    last_status: Rc<RefCell<Option<Result<()>>>>,
}

impl Recorder {
    fn callback(&self) -> impl FnMut(&[u8], Result<()>) + 'static {
        let recorder = self.clone();
        move |data: &[u8], status: Result<()>| {
            recorder.calls.set(recorder.calls.get() + 1);
            *recorder.last_data.borrow_mut() = data.to_vec();
            *recorder.last_status.borrow_mut() = Some(status);
        }
    }
}

#[test]
fn test_naks_are_swallowed_until_data_arrives() {
    let recorder = Recorder::default();
    let mut cb = recorder.callback();
    let mock = MockDwc::new();
    let mut host = make_host(&mock);

    // the immediate poll plus four timer polls all NAK
    for _ in 0..5 {
        mock.push(HaltScript::nak());
    }

    host.interrupt_poll_start(1, 0x81, Speed::High, 8, 0, 10, 8, None, &mut cb, 0)
        .expect("poll start failed");
    assert_eq!(host.active_polls(), 1);

    for now in [10, 20, 30, 40] {
        host.poll_periodic(now);
    }
    assert_eq!(mock.enables(), 5);
    assert_eq!(recorder.calls.get(), 0);

    // the sixth poll returns four bytes
    mock.push(HaltScript::done_with_data(8 - 4, DATA1, &[1, 2, 3, 4]));
    host.poll_periodic(50);

    assert_eq!(recorder.calls.get(), 1);
    assert_eq!(*recorder.last_data.borrow(), vec![1, 2, 3, 4]);
    assert_eq!(*recorder.last_status.borrow(), Some(Ok(())));
}

#[test]
fn test_duplicate_start_is_rejected_while_active() {
    let recorder = Recorder::default();
    let mut cb = recorder.callback();
    let mut cb2 = recorder.callback();
    let mock = MockDwc::new();
    let mut host = make_host(&mock);

    mock.push(HaltScript::nak());
    host.interrupt_poll_start(1, 0x81, Speed::High, 8, 0, 10, 8, None, &mut cb, 0)
        .expect("poll start failed");

    let result =
        host.interrupt_poll_start(1, 0x81, Speed::High, 8, 0, 10, 8, None, &mut cb2, 0);
    assert_eq!(result, Err(UsbError::InvalidParameter));

    // the first request is still active and no extra poll ran
    assert_eq!(host.active_polls(), 1);
    assert_eq!(mock.enables(), 1);
}

#[test]
fn test_stop_returns_final_toggle() {
    let recorder = Recorder::default();
    let mut cb = recorder.callback();
    let mock = MockDwc::new();
    let mut host = make_host(&mock);

    // the immediate poll completes and advances the toggle to DATA1
    mock.push(HaltScript::done_with_data(0, DATA1, &[0xAA; 8]));
    host.interrupt_poll_start(1, 0x81, Speed::High, 8, 0, 10, 8, None, &mut cb, 0)
        .expect("poll start failed");

    assert_eq!(host.interrupt_poll_stop(1, 0x81), Ok(1));
    assert_eq!(host.active_polls(), 0);

    // stopping twice is rejected
    assert_eq!(
        host.interrupt_poll_stop(1, 0x81),
        Err(UsbError::InvalidParameter)
    );
}

#[test]
fn test_stop_without_start_is_rejected() {
    let mock = MockDwc::new();
    let mut host = make_host(&mock);

    assert_eq!(
        host.interrupt_poll_stop(1, 0x81),
        Err(UsbError::InvalidParameter)
    );
}

#[test]
fn test_out_endpoint_is_rejected() {
    let recorder = Recorder::default();
    let mut cb = recorder.callback();
    let mock = MockDwc::new();
    let mut host = make_host(&mock);

    // interrupt polling is device-to-host only
    let result = host.interrupt_poll_start(1, 0x01, Speed::High, 8, 0, 10, 8, None, &mut cb, 0);
    assert_eq!(result, Err(UsbError::InvalidParameter));
    assert_eq!(mock.enables(), 0);
}

#[test]
fn test_error_outcomes_reach_the_callback() {
    let recorder = Recorder::default();
    let mut cb = recorder.callback();
    let mock = MockDwc::new();
    let mut host = make_host(&mock);

    // the immediate poll halts with a pattern outside every known-good
    // combination
    mock.push(HaltScript::raw(
        (Hcint::CHHLTD | Hcint::XFERCOMP | Hcint::BBLERR).bits(),
    ));
    host.interrupt_poll_start(1, 0x81, Speed::High, 8, 0, 10, 8, None, &mut cb, 0)
        .expect("poll start failed");

    assert_eq!(recorder.calls.get(), 1);
    assert_eq!(
        *recorder.last_status.borrow(),
        Some(Err(UsbError::TransactionError))
    );

    // a stall on a later poll is forwarded too
    mock.push(HaltScript::stall());
    host.poll_periodic(10);
    assert_eq!(recorder.calls.get(), 2);
    assert_eq!(*recorder.last_status.borrow(), Some(Err(UsbError::Stall)));
}

#[test]
fn test_toggle_persists_across_polls() {
    let recorder = Recorder::default();
    let mut cb = recorder.callback();
    let mock = MockDwc::new();
    let mut host = make_host(&mock);

    // immediate poll: completes, hardware hands back DATA1
    mock.push(HaltScript::done_with_data(0, DATA1, &[1; 8]));
    host.interrupt_poll_start(1, 0x81, Speed::High, 8, 0, 10, 8, None, &mut cb, 0)
        .expect("poll start failed");

    // next poll must be programmed with DATA1, and hands back DATA0
    mock.push(HaltScript::done_with_data(0, DATA0, &[2; 8]));
    host.poll_periodic(10);

    // and the one after continues from DATA0
    mock.push(HaltScript::done_with_data(0, DATA1, &[3; 8]));
    host.poll_periodic(20);

    let programs = mock.programs();
    assert_eq!(programs.len(), 3);
    assert_eq!(programs[0].pid(), DATA0);
    assert_eq!(programs[1].pid(), DATA1);
    assert_eq!(programs[2].pid(), DATA0);
    // every poll ran on the dedicated periodic channel
    for program in &programs {
        assert_eq!(program.channel, dwc::PERIODIC_CHANNEL);
    }
}

#[test]
fn test_polls_wait_for_their_interval() {
    let recorder = Recorder::default();
    let mut cb = recorder.callback();
    let mock = MockDwc::new();
    let mut host = make_host(&mock);

    mock.push(HaltScript::nak());
    host.interrupt_poll_start(1, 0x81, Speed::High, 8, 0, 10, 8, None, &mut cb, 0)
        .expect("poll start failed");
    assert_eq!(mock.enables(), 1);

    // not due yet: nothing runs
    host.poll_periodic(5);
    host.poll_periodic(9);
    assert_eq!(mock.enables(), 1);

    mock.push(HaltScript::nak());
    host.poll_periodic(10);
    assert_eq!(mock.enables(), 2);
}

#[test]
fn test_registry_capacity_is_bounded() {
    let recorder = Recorder::default();
    let mut cb1 = recorder.callback();
    let mut cb2 = recorder.callback();
    let mut cb3 = recorder.callback();
    let mock = MockDwc::new();
    let dma = mock.make_dma(dwc::DATA_BUF_SIZE);
    let mut host: DwUsbHost<'_, MockDwc, 2> =
        DwUsbHost::new(mock.clone(), dma).expect("host creation failed");

    mock.push(HaltScript::nak());
    host.interrupt_poll_start(1, 0x81, Speed::High, 8, 0, 10, 8, None, &mut cb1, 0)
        .expect("poll start failed");
    mock.push(HaltScript::nak());
    host.interrupt_poll_start(2, 0x81, Speed::High, 8, 0, 10, 8, None, &mut cb2, 0)
        .expect("poll start failed");

    let result = host.interrupt_poll_start(3, 0x81, Speed::High, 8, 0, 10, 8, None, &mut cb3, 0);
    assert_eq!(result, Err(UsbError::NoResources));
    assert_eq!(host.active_polls(), 2);
}

#[test]
fn test_oversized_poll_length_is_rejected() {
    let recorder = Recorder::default();
    let mut cb = recorder.callback();
    let mock = MockDwc::new();
    let mut host = make_host(&mock);

    let result = host.interrupt_poll_start(
        1,
        0x81,
        Speed::High,
        8,
        0,
        10,
        dwc2_usbh::PERIODIC_BUF_CAPACITY + 1,
        None,
        &mut cb,
        0,
    );
    assert_eq!(result, Err(UsbError::NoResources));
    assert_eq!(mock.enables(), 0);
}

#[test]
fn test_shutdown_cancels_polls_and_resets_core() {
    let recorder = Recorder::default();
    let mut cb = recorder.callback();
    let mock = MockDwc::new();
    let mut host = make_host(&mock);

    mock.push(HaltScript::nak());
    host.interrupt_poll_start(1, 0x81, Speed::High, 8, 0, 10, 8, None, &mut cb, 0)
        .expect("poll start failed");

    let calls_before = recorder.calls.get();
    let enables_before = mock.enables();
    let (_regs, _dma) = host.shutdown();

    // teardown never fires callbacks and never runs another poll
    assert_eq!(recorder.calls.get(), calls_before);
    assert_eq!(mock.enables(), enables_before);
    // the port was held in reset and the core soft-reset
    assert!(mock
        .writes_to(dwc::HPRT0)
        .iter()
        .any(|v| v & dwc::HPRT0_PRTRST != 0));
    assert!(mock.wrote(dwc::GRSTCTL, dwc::GRSTCTL_CSFTRST));
}
