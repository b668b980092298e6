use super::*;
use crate::input::events::{ContactId, ToolHint};

const MS: u64 = 1_000;
const STYLUS: DeviceId = DeviceId(1);
const TOUCH: DeviceId = DeviceId(2);
const MOUSE: DeviceId = DeviceId(3);

fn arbiter() -> PalmArbiter {
    let mut arbiter = PalmArbiter::new(ArbiterSettings::default());
    arbiter.register_device(STYLUS, DeviceKind::Stylus);
    arbiter.register_device(TOUCH, DeviceKind::Touch);
    arbiter.register_device(MOUSE, DeviceKind::Mouse);
    arbiter
}

fn sample(device: DeviceId, contact: u32, phase: Phase, t: u64, x: f64, y: f64) -> InputEvent {
    InputEvent::Sample(PointerSample {
        device,
        contact: ContactId(contact),
        phase,
        timestamp_us: t,
        x,
        y,
        pressure: None,
        tilt: None,
        contact_size: None,
        tool: ToolHint::Pen,
    })
}

fn sized(device: DeviceId, contact: u32, phase: Phase, t: u64, size: f64) -> InputEvent {
    let InputEvent::Sample(mut s) = sample(device, contact, phase, t, 100.0, 100.0) else {
        unreachable!()
    };
    s.contact_size = Some(size);
    InputEvent::Sample(s)
}

fn key(device: DeviceId, contact: u32) -> ContactKey {
    ContactKey::new(device, contact)
}

fn verdict(arbiter: &PalmArbiter, key: ContactKey) -> Option<Verdict> {
    arbiter.contact(key).map(|contact| contact.verdict().clone())
}

/// Stylus dot at t=0 (down and up), leaving only the rolling window active.
fn stylus_dot(arbiter: &mut PalmArbiter) {
    arbiter.handle(&sample(STYLUS, 0, Phase::Down, 0, 500.0, 500.0));
    arbiter.handle(&sample(STYLUS, 0, Phase::Up, 0, 500.0, 500.0));
}

#[test]
fn test_stylus_is_accepted_immediately() {
    let mut arbiter = arbiter();
    let decisions = arbiter.handle(&sample(STYLUS, 0, Phase::Down, 0, 10.0, 10.0));
    assert_eq!(decisions.len(), 1);
    assert!(matches!(&decisions[0], Decision::Forward { samples, .. } if samples.len() == 1));
    assert_eq!(verdict(&arbiter, key(STYLUS, 0)), Some(Verdict::Accepted));
}

#[test]
fn test_touch_during_stylus_is_rejected() {
    let mut arbiter = arbiter();
    arbiter.handle(&sample(STYLUS, 0, Phase::Down, 0, 500.0, 500.0));

    let decisions = arbiter.handle(&sample(TOUCH, 7, Phase::Down, 50 * MS, 520.0, 510.0));
    assert_eq!(
        decisions,
        vec![Decision::Rejected {
            key: key(TOUCH, 7),
            reason: RejectReason::StylusActive
        }]
    );

    // Later samples of a rejected contact go nowhere.
    assert!(
        arbiter
            .handle(&sample(TOUCH, 7, Phase::Move, 900 * MS, 530.0, 510.0))
            .is_empty()
    );
    assert!(
        arbiter
            .handle(&sample(TOUCH, 7, Phase::Up, 950 * MS, 530.0, 510.0))
            .is_empty()
    );
    assert!(arbiter.contact(key(TOUCH, 7)).is_none());
}

#[test]
fn test_touch_alone_accepted_after_confirmation_delay() {
    let mut arbiter = arbiter();
    assert!(
        arbiter
            .handle(&sample(TOUCH, 1, Phase::Down, 0, 100.0, 100.0))
            .is_empty()
    );
    assert!(matches!(
        verdict(&arbiter, key(TOUCH, 1)),
        Some(Verdict::Pending { .. })
    ));

    assert!(arbiter.tick(19 * MS).is_empty());
    let decisions = arbiter.tick(20 * MS);
    assert_eq!(decisions.len(), 1);
    match &decisions[0] {
        Decision::Forward { key: k, samples } => {
            assert_eq!(*k, key(TOUCH, 1));
            assert_eq!(samples.len(), 1);
            assert_eq!(samples[0].phase, Phase::Down);
        }
        other => panic!("unexpected decision {:?}", other),
    }
    assert_eq!(verdict(&arbiter, key(TOUCH, 1)), Some(Verdict::Accepted));
}

#[test]
fn test_buffered_samples_forwarded_in_order() {
    let mut arbiter = arbiter();
    arbiter.handle(&sample(TOUCH, 1, Phase::Down, 0, 100.0, 100.0));
    arbiter.handle(&sample(TOUCH, 1, Phase::Move, 8 * MS, 110.0, 100.0));
    let decisions = arbiter.handle(&sample(TOUCH, 1, Phase::Move, 25 * MS, 120.0, 100.0));

    let Decision::Forward { samples, .. } = &decisions[0] else {
        panic!("expected forward, got {:?}", decisions);
    };
    let xs: Vec<f64> = samples.iter().map(|s| s.x).collect();
    assert_eq!(xs, vec![100.0, 110.0, 120.0]);
}

#[test]
fn test_palm_sized_touch_rejected_immediately() {
    let mut arbiter = arbiter();
    let decisions = arbiter.handle(&sized(TOUCH, 3, Phase::Down, 0, 80.0));
    assert_eq!(
        decisions,
        vec![Decision::Rejected {
            key: key(TOUCH, 3),
            reason: RejectReason::PalmSize
        }]
    );
    assert_eq!(arbiter.stats().rejected_palm_size, 1);
}

#[test]
fn test_small_touch_below_threshold_not_rejected() {
    let mut arbiter = arbiter();
    assert!(arbiter.handle(&sized(TOUCH, 3, Phase::Down, 0, 30.0)).is_empty());
    assert!(arbiter.contact(key(TOUCH, 3)).unwrap().is_pending());
}

#[test]
fn test_tap_decided_at_lift() {
    let mut arbiter = arbiter();
    arbiter.handle(&sample(TOUCH, 4, Phase::Down, 0, 100.0, 100.0));
    let decisions = arbiter.handle(&sample(TOUCH, 4, Phase::Up, 10 * MS, 100.0, 100.0));

    assert!(matches!(&decisions[0], Decision::Forward { samples, .. } if samples.len() == 2));
    assert_eq!(
        decisions[1],
        Decision::Ended {
            key: key(TOUCH, 4),
            provisional: true
        }
    );
    assert_eq!(arbiter.stats().taps, 1);
}

#[test]
fn test_stylus_window_boundary() {
    // Touch beginning 499 ms and 500 ms after the stylus is vetoed; 501 ms is not.
    for (offset, rejected) in [(499, true), (500, true), (501, false)] {
        let mut arbiter = arbiter();
        stylus_dot(&mut arbiter);
        let decisions = arbiter.handle(&sample(TOUCH, 1, Phase::Down, offset * MS, 10.0, 10.0));
        assert_eq!(
            decisions.iter().any(|d| matches!(d, Decision::Rejected { .. })),
            rejected,
            "touch at {} ms",
            offset
        );
    }
}

#[test]
fn test_hover_counts_as_activity() {
    let mut arbiter = arbiter();
    arbiter.handle(&InputEvent::Proximity {
        device: STYLUS,
        timestamp_us: 0,
        in_range: true,
    });
    let decisions = arbiter.handle(&sample(TOUCH, 1, Phase::Down, 2_000 * MS, 10.0, 10.0));
    assert!(matches!(decisions[0], Decision::Rejected { .. }));
}

#[test]
fn test_hover_ignored_when_disabled() {
    let settings = ArbiterSettings {
        hover_counts_as_activity: false,
        ..ArbiterSettings::default()
    };
    let mut arbiter = PalmArbiter::new(settings);
    arbiter.register_device(STYLUS, DeviceKind::Stylus);
    arbiter.register_device(TOUCH, DeviceKind::Touch);
    arbiter.handle(&InputEvent::Proximity {
        device: STYLUS,
        timestamp_us: 0,
        in_range: true,
    });
    assert!(
        arbiter
            .handle(&sample(TOUCH, 1, Phase::Down, 2_000 * MS, 10.0, 10.0))
            .is_empty()
    );
}

#[test]
fn test_stylus_override_retracts_overlapping_touch() {
    let mut arbiter = arbiter();
    arbiter.handle(&sample(TOUCH, 1, Phase::Down, 0, 100.0, 100.0));
    arbiter.tick(20 * MS);
    arbiter.handle(&sample(TOUCH, 1, Phase::Move, 30 * MS, 140.0, 120.0));

    let decisions = arbiter.handle(&sample(STYLUS, 0, Phase::Down, 100 * MS, 200.0, 150.0));
    assert_eq!(decisions[0], Decision::Retracted { key: key(TOUCH, 1) });
    assert!(matches!(decisions[1], Decision::Forward { .. }));
    assert_eq!(
        verdict(&arbiter, key(TOUCH, 1)),
        Some(Verdict::Rejected {
            reason: RejectReason::Retracted
        })
    );

    // The retracted contact produces nothing further and never comes back.
    assert!(
        arbiter
            .handle(&sample(TOUCH, 1, Phase::Move, 120 * MS, 150.0, 120.0))
            .is_empty()
    );
    assert_eq!(arbiter.stats().retracted, 1);
}

#[test]
fn test_stylus_override_skips_distant_touch() {
    let mut arbiter = arbiter();
    arbiter.handle(&sample(TOUCH, 1, Phase::Down, 0, 100.0, 100.0));
    arbiter.tick(20 * MS);

    let decisions = arbiter.handle(&sample(STYLUS, 0, Phase::Down, 100 * MS, 1500.0, 900.0));
    assert!(!decisions.iter().any(|d| matches!(d, Decision::Retracted { .. })));
    assert_eq!(verdict(&arbiter, key(TOUCH, 1)), Some(Verdict::Accepted));
}

#[test]
fn test_stylus_override_skips_touch_older_than_window() {
    let mut arbiter = arbiter();
    arbiter.handle(&sample(TOUCH, 1, Phase::Down, 0, 100.0, 100.0));
    arbiter.tick(20 * MS);

    let decisions = arbiter.handle(&sample(STYLUS, 0, Phase::Down, 600 * MS, 100.0, 100.0));
    assert!(!decisions.iter().any(|d| matches!(d, Decision::Retracted { .. })));
}

#[test]
fn test_ended_touch_is_provisional_until_settled() {
    let mut arbiter = arbiter();
    arbiter.handle(&sample(TOUCH, 1, Phase::Down, 0, 100.0, 100.0));
    arbiter.tick(20 * MS);
    let decisions = arbiter.handle(&sample(TOUCH, 1, Phase::Up, 40 * MS, 100.0, 100.0));
    assert_eq!(
        decisions.last(),
        Some(&Decision::Ended {
            key: key(TOUCH, 1),
            provisional: true
        })
    );

    assert!(arbiter.tick(500 * MS).is_empty());
    assert_eq!(
        arbiter.tick(501 * MS),
        vec![Decision::Settled { key: key(TOUCH, 1) }]
    );
    assert!(arbiter.contact(key(TOUCH, 1)).is_none());
}

#[test]
fn test_ended_touch_retracted_before_settling() {
    let mut arbiter = arbiter();
    arbiter.handle(&sample(TOUCH, 1, Phase::Down, 0, 100.0, 100.0));
    arbiter.tick(20 * MS);
    arbiter.handle(&sample(TOUCH, 1, Phase::Up, 40 * MS, 100.0, 100.0));

    let decisions = arbiter.handle(&sample(STYLUS, 0, Phase::Down, 60 * MS, 110.0, 100.0));
    assert_eq!(decisions[0], Decision::Retracted { key: key(TOUCH, 1) });
    assert!(arbiter.contact(key(TOUCH, 1)).is_none());
    assert!(!arbiter.tick(1_000 * MS).iter().any(|d| matches!(d, Decision::Settled { .. })));
}

#[test]
fn test_mouse_and_unknown_always_accepted() {
    let mut arbiter = arbiter();
    arbiter.handle(&sample(STYLUS, 0, Phase::Down, 0, 10.0, 10.0));

    let decisions = arbiter.handle(&sample(MOUSE, 0, Phase::Down, 10 * MS, 10.0, 10.0));
    assert!(matches!(decisions[0], Decision::Forward { .. }));

    // Never registered: treated as Unknown.
    let decisions = arbiter.handle(&sample(DeviceId(42), 0, Phase::Down, 10 * MS, 10.0, 10.0));
    assert!(matches!(decisions[0], Decision::Forward { .. }));
    assert_eq!(arbiter.device_kind(DeviceId(42)), DeviceKind::Unknown);
}

#[test]
fn test_stylus_up_ends_without_provisional() {
    let mut arbiter = arbiter();
    arbiter.handle(&sample(STYLUS, 0, Phase::Down, 0, 10.0, 10.0));
    let decisions = arbiter.handle(&sample(STYLUS, 0, Phase::Up, 5 * MS, 10.0, 10.0));
    assert_eq!(
        decisions.last(),
        Some(&Decision::Ended {
            key: key(STYLUS, 0),
            provisional: false
        })
    );
}

#[test]
fn test_pending_touch_rejected_on_tick_when_stylus_arrives() {
    let mut arbiter = arbiter();
    arbiter.handle(&sample(TOUCH, 1, Phase::Down, 0, 10.0, 10.0));
    arbiter.handle(&sample(STYLUS, 0, Phase::Down, 5 * MS, 800.0, 800.0));
    let decisions = arbiter.tick(20 * MS);
    assert_eq!(
        decisions,
        vec![Decision::Rejected {
            key: key(TOUCH, 1),
            reason: RejectReason::StylusActive
        }]
    );
}

#[test]
fn test_repeated_down_aborts_live_contact() {
    let mut arbiter = arbiter();
    arbiter.handle(&sample(STYLUS, 0, Phase::Down, 0, 10.0, 10.0));
    let decisions = arbiter.handle(&sample(STYLUS, 0, Phase::Down, 5 * MS, 20.0, 20.0));
    assert_eq!(decisions[0], Decision::Aborted { key: key(STYLUS, 0) });
    assert!(matches!(decisions[1], Decision::Forward { .. }));
}

#[test]
fn test_abort_device_drops_its_contacts() {
    let mut arbiter = arbiter();
    arbiter.handle(&sample(TOUCH, 1, Phase::Down, 0, 10.0, 10.0));
    arbiter.handle(&sample(TOUCH, 2, Phase::Down, 0, 50.0, 10.0));
    arbiter.handle(&sample(MOUSE, 0, Phase::Down, 0, 10.0, 10.0));

    let dropped = arbiter.abort_device(TOUCH);
    assert_eq!(dropped, vec![key(TOUCH, 1), key(TOUCH, 2)]);
    assert!(arbiter.contact(key(MOUSE, 0)).is_some());
    assert!(arbiter.tick(100 * MS).is_empty());
}

#[test]
fn test_finish_resolves_every_contact() {
    let mut arbiter = arbiter();
    arbiter.handle(&sample(MOUSE, 0, Phase::Down, 0, 10.0, 10.0));
    arbiter.handle(&sample(TOUCH, 1, Phase::Down, 0, 10.0, 10.0));

    let decisions = arbiter.finish();
    assert!(decisions.contains(&Decision::Ended {
        key: key(MOUSE, 0),
        provisional: false
    }));
    assert!(decisions.contains(&Decision::Aborted { key: key(TOUCH, 1) }));
    assert_eq!(arbiter.contacts().count(), 0);
}
