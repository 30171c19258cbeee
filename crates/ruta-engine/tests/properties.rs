//! Property-based tests for the stream state machine and switch planning.
//!
//! Lifecycle sequences are checked against a small reference model; switch
//! plans are checked for set semantics and backend-sharing coverage over
//! randomly routed streams.

mod common;

use std::collections::HashSet;
use std::sync::Arc;

use common::{dev, running, setup};
use proptest::prelude::*;
use ruta_core::{DeviceId, Error, StreamState, StreamType};
use ruta_engine::Stream;

#[derive(Debug, Clone, Copy)]
enum Op {
    Open,
    Start,
    Pause,
    Resume,
    Stop,
    Close,
    Write,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Open),
        Just(Op::Start),
        Just(Op::Pause),
        Just(Op::Resume),
        Just(Op::Stop),
        Just(Op::Close),
        Just(Op::Write),
    ]
}

/// Reference model: the state after `op`, or `None` if `op` is illegal.
fn expected(state: StreamState, op: Op) -> Option<StreamState> {
    use StreamState::{Idle, Initialized, Paused, Running, Stopped};
    match (op, state) {
        (Op::Open, Idle | Initialized) => Some(Initialized),
        (Op::Start, Initialized | Stopped | Running) => Some(Running),
        (Op::Pause, Running | Paused) => Some(Paused),
        (Op::Resume, Paused | Running) => Some(Running),
        (Op::Stop, Running | Paused | Stopped) => Some(Stopped),
        (Op::Stop, Idle) => Some(Idle),
        (Op::Close, _) => Some(Idle),
        (Op::Write, Initialized | Running) => Some(Running),
        _ => None,
    }
}

fn apply(stream: &Stream, op: Op) -> Result<(), Error> {
    match op {
        Op::Open => stream.open(),
        Op::Start => stream.start(),
        Op::Pause => stream.pause(),
        Op::Resume => stream.resume(),
        Op::Stop => stream.stop(),
        Op::Close => stream.close(),
        Op::Write => stream.write(&[0; 16]).map(|_| ()),
    }
}

const OUTPUTS: [DeviceId; 6] = [
    DeviceId::OutSpeaker,
    DeviceId::OutHandset,
    DeviceId::OutWiredHeadset,
    DeviceId::OutWiredHeadphone,
    DeviceId::OutLineOut,
    DeviceId::OutHdmi,
];

fn output() -> impl Strategy<Value = DeviceId> {
    prop::sample::select(OUTPUTS.to_vec())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Every sequence of lifecycle calls follows the reference model, and
    /// rejected calls change neither state nor device list.
    #[test]
    fn lifecycle_follows_model(ops in prop::collection::vec(op(), 1..40)) {
        let (rm, _sim) = setup();
        let stream = common::playback(&rm, StreamType::LowLatency, &[DeviceId::OutSpeaker]);
        let mut state = StreamState::Idle;
        let mut started = false;

        for op in ops {
            let devices = stream.device_ids();
            let result = apply(&stream, op);
            match expected(state, op) {
                Some(next) => {
                    prop_assert!(result.is_ok(), "{:?} from {} failed: {:?}", op, state, result);
                    match (op, state) {
                        (Op::Start, StreamState::Initialized | StreamState::Stopped | StreamState::Running) => {
                            started = true
                        }
                        (Op::Stop | Op::Close, _) => started = false,
                        _ => {}
                    }
                    state = next;
                }
                None => {
                    let rejected = matches!(result, Err(Error::InvalidState { .. }));
                    prop_assert!(rejected, "{:?} from {} gave {:?}", op, state, result);
                    prop_assert_eq!(stream.device_ids(), devices);
                }
            }

            prop_assert_eq!(stream.state(), state);
            prop_assert_eq!(stream.has_session(), state != StreamState::Idle);
            prop_assert_eq!(rm.is_device_active(DeviceId::OutSpeaker), started);
            let expected_opens = usize::from(state != StreamState::Idle);
            for device in stream.devices() {
                prop_assert_eq!(device.open_count(), expected_opens);
            }
        }

        stream.close().unwrap();
        prop_assert!(rm.active_bindings().is_empty());
        prop_assert!(!stream.has_session());
    }

    /// Plans never repeat a pair, only connect requested devices, and
    /// disconnect every started binding on a target's backend.
    #[test]
    fn plans_cover_backend_sharers(
        routes in prop::collection::vec(output(), 1..5),
        targets in prop::collection::vec(output(), 1..4),
    ) {
        let (rm, _sim) = setup();
        let streams: Vec<Arc<Stream>> = routes.iter().map(|&id| running(&rm, &[id])).collect();
        let initiator = &streams[0];
        let requested: Vec<_> = targets.iter().copied().map(dev).collect();

        let plan = initiator.plan_switch(&requested).unwrap();
        let disconnect = plan.disconnect_pairs();
        let connect = plan.connect_pairs();

        let unique: HashSet<_> = disconnect.iter().collect();
        prop_assert_eq!(unique.len(), disconnect.len());
        let unique: HashSet<_> = connect.iter().collect();
        prop_assert_eq!(unique.len(), connect.len());

        prop_assert!(!connect.is_empty());
        prop_assert!(connect.iter().all(|(_, id)| targets.contains(id)));

        let bindings = rm.active_bindings();
        for &(stream, device) in &disconnect {
            prop_assert!(bindings.iter().any(|b| b.stream == stream && b.device == device));
        }
        for binding in &bindings {
            let shares = targets
                .iter()
                .any(|&t| rm.backend_of(t) == rm.backend_of(binding.device));
            if shares {
                prop_assert!(disconnect.contains(&(binding.stream, binding.device)));
            }
        }
    }

    /// Submitting a plan leaves every affected stream bound to targets only.
    #[test]
    fn switch_moves_every_planned_stream(
        routes in prop::collection::vec(output(), 1..5),
        target in output(),
    ) {
        let (rm, _sim) = setup();
        let streams: Vec<Arc<Stream>> = routes.iter().map(|&id| running(&rm, &[id])).collect();
        let target_busy = rm
            .active_bindings()
            .iter()
            .any(|b| rm.backend_of(b.device) == rm.backend_of(target));
        let plan = streams[0].plan_switch(&[dev(target)]).unwrap();
        let moved: HashSet<_> = plan.connect_pairs().into_iter().map(|(s, _)| s).collect();

        streams[0].switch_device(&[dev(target)]).unwrap();
        for stream in &streams {
            prop_assert_eq!(stream.state(), StreamState::Running);
            if moved.contains(&stream.id()) {
                prop_assert_eq!(stream.device_ids(), vec![target]);
            }
        }
        if !target_busy {
            prop_assert!(moved.contains(&streams[0].id()));
        }
    }
}
