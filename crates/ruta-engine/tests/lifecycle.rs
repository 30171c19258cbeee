//! Stream lifecycle against the simulated backend.

mod common;

use std::sync::Arc;

use common::{capture, dev, device, playback, running, session, setup};
use parking_lot::Mutex;
use ruta_core::{
    AudioFormat, BufferRequest, DeviceId, DrainType, EcInfo, Error, GraphKey, KeyValue,
    MediaConfig, StreamAttributes, StreamEvent, StreamId, StreamState, StreamType, VolumeData,
};
use ruta_engine::{StreamKind, create_stream};
use ruta_hal::FaultMode;

#[test]
fn full_lifecycle_call_order() {
    let (rm, sim) = setup();
    let stream = playback(&rm, StreamType::LowLatency, &[DeviceId::OutSpeaker]);
    assert_eq!(stream.state(), StreamState::Idle);
    assert!(sim.journal().is_empty());

    stream.open().unwrap();
    assert_eq!(stream.state(), StreamState::Initialized);
    stream.start().unwrap();
    assert_eq!(stream.state(), StreamState::Running);
    stream.pause().unwrap();
    assert_eq!(stream.state(), StreamState::Paused);
    stream.resume().unwrap();
    assert_eq!(stream.state(), StreamState::Running);
    stream.stop().unwrap();
    assert_eq!(stream.state(), StreamState::Stopped);
    stream.close().unwrap();
    assert_eq!(stream.state(), StreamState::Idle);

    let journal = sim.journal();
    assert_eq!(
        journal.ops_for(session(&stream)),
        vec![
            "open",
            "setup(out_speaker)",
            "prepare",
            "start",
            "set_config(module,pause)",
            "set_config(module,resume)",
            "stop",
            "close",
        ]
    );
    assert_eq!(
        journal.ops_for(device(DeviceId::OutSpeaker)),
        vec!["open", "start", "stop", "close"]
    );
    assert!(rm.active_bindings().is_empty());
    assert!(stream.devices().is_empty());
    assert!(!stream.has_session());
}

#[test]
fn devices_start_before_session_and_bind_after() {
    let (rm, sim) = setup();
    let stream = running(&rm, &[DeviceId::OutSpeaker]);

    let journal = sim.journal();
    let dev_start = journal
        .position(device(DeviceId::OutSpeaker), "start")
        .unwrap();
    let prepare = journal.position(session(&stream), "prepare").unwrap();
    let sess_start = journal.position(session(&stream), "start").unwrap();
    assert!(dev_start < prepare);
    assert!(prepare < sess_start);
    assert!(rm.is_device_active(DeviceId::OutSpeaker));
}

#[test]
fn repeated_calls_are_idempotent() {
    let (rm, sim) = setup();
    let stream = playback(&rm, StreamType::DeepBuffer, &[DeviceId::OutSpeaker]);

    stream.open().unwrap();
    stream.open().unwrap();
    stream.start().unwrap();
    stream.start().unwrap();
    stream.pause().unwrap();
    stream.pause().unwrap();
    stream.resume().unwrap();
    stream.resume().unwrap();
    stream.stop().unwrap();
    stream.stop().unwrap();

    let journal = sim.journal();
    assert_eq!(journal.count(session(&stream), "open"), 1);
    assert_eq!(journal.count(session(&stream), "start"), 1);
    assert_eq!(journal.count(session(&stream), "set_config(module,pause)"), 1);
    assert_eq!(journal.count(session(&stream), "stop"), 1);
    assert_eq!(journal.count(device(DeviceId::OutSpeaker), "stop"), 1);
}

#[test]
fn illegal_transitions_are_rejected() {
    let (rm, _sim) = setup();
    let stream = playback(&rm, StreamType::LowLatency, &[DeviceId::OutSpeaker]);

    assert!(matches!(
        stream.start(),
        Err(Error::InvalidState { op: "start", state: StreamState::Idle })
    ));
    assert!(matches!(stream.pause(), Err(Error::InvalidState { .. })));

    stream.open().unwrap();
    assert!(matches!(stream.stop(), Err(Error::InvalidState { .. })));
    assert!(matches!(stream.resume(), Err(Error::InvalidState { .. })));

    stream.start().unwrap();
    stream.pause().unwrap();
    assert!(matches!(
        stream.start(),
        Err(Error::InvalidState { state: StreamState::Paused, .. })
    ));
    assert!(matches!(stream.open(), Err(Error::InvalidState { .. })));
    assert_eq!(stream.state(), StreamState::Paused);
}

#[test]
fn stopped_stream_restarts() {
    let (rm, sim) = setup();
    let stream = running(&rm, &[DeviceId::OutSpeaker]);
    stream.stop().unwrap();
    assert!(rm.active_bindings().is_empty());

    stream.start().unwrap();
    assert_eq!(stream.state(), StreamState::Running);
    assert!(rm.is_device_active(DeviceId::OutSpeaker));
    assert_eq!(sim.journal().count(device(DeviceId::OutSpeaker), "start"), 2);
}

#[test]
fn close_without_open_is_a_no_op() {
    let (rm, sim) = setup();
    let stream = playback(&rm, StreamType::LowLatency, &[DeviceId::OutSpeaker]);
    stream.close().unwrap();
    assert_eq!(stream.device_ids(), vec![DeviceId::OutSpeaker]);
    assert!(sim.journal().is_empty());
}

#[test]
fn close_from_running_stops_first() {
    let (rm, sim) = setup();
    let stream = running(&rm, &[DeviceId::OutSpeaker]);
    stream.close().unwrap();

    let journal = sim.journal();
    assert!(
        journal.position(session(&stream), "stop").unwrap()
            < journal.position(session(&stream), "close").unwrap()
    );
    assert_eq!(
        journal.ops_for(device(DeviceId::OutSpeaker)),
        vec!["open", "start", "stop", "close"]
    );
    assert!(rm.active_bindings().is_empty());
}

#[test]
fn reopen_rebinds_remembered_devices() {
    let (rm, _sim) = setup();
    let stream = playback(&rm, StreamType::LowLatency, &[DeviceId::OutSpeaker]);
    stream.open().unwrap();
    stream.close().unwrap();
    assert!(stream.device_ids().is_empty());

    stream.open().unwrap();
    assert_eq!(stream.device_ids(), vec![DeviceId::OutSpeaker]);
    assert_eq!(stream.state(), StreamState::Initialized);
}

#[test]
fn reopen_with_no_ready_device_fails() {
    let (rm, _sim) = setup();
    let stream = playback(&rm, StreamType::LowLatency, &[DeviceId::OutSpeaker]);
    stream.open().unwrap();
    stream.close().unwrap();

    rm.set_device_ready(DeviceId::OutSpeaker, false);
    assert!(matches!(stream.open(), Err(Error::NoDevice(_))));
    assert_eq!(stream.state(), StreamState::Idle);
}

#[test]
fn partial_open_failure_is_resumable() {
    let (rm, sim) = setup();
    let stream = playback(
        &rm,
        StreamType::LowLatency,
        &[DeviceId::OutSpeaker, DeviceId::OutHandset],
    );
    sim.inject_fault(device(DeviceId::OutHandset), "open", FaultMode::Once);

    assert!(matches!(stream.open(), Err(Error::Io { .. })));
    assert_eq!(stream.state(), StreamState::Idle);
    assert!(!stream.has_session());
    assert_eq!(rm.device(DeviceId::OutSpeaker).unwrap().open_count(), 1);

    stream.open().unwrap();
    assert_eq!(stream.state(), StreamState::Initialized);
    assert_eq!(rm.device(DeviceId::OutSpeaker).unwrap().open_count(), 1);
    assert_eq!(rm.device(DeviceId::OutHandset).unwrap().open_count(), 1);
    assert_eq!(sim.journal().count(device(DeviceId::OutSpeaker), "open"), 1);
}

#[test]
fn close_after_partial_open_releases_opened_devices() {
    let (rm, sim) = setup();
    let stream = playback(
        &rm,
        StreamType::LowLatency,
        &[DeviceId::OutSpeaker, DeviceId::OutHandset],
    );
    sim.inject_fault(device(DeviceId::OutHandset), "open", FaultMode::Once);
    stream.open().unwrap_err();

    stream.close().unwrap();
    let journal = sim.journal();
    assert_eq!(journal.count(device(DeviceId::OutSpeaker), "close"), 1);
    assert_eq!(journal.count(device(DeviceId::OutHandset), "close"), 0);
    assert!(stream.device_ids().is_empty());

    stream.open().unwrap();
    assert_eq!(
        stream.device_ids(),
        vec![DeviceId::OutSpeaker, DeviceId::OutHandset]
    );
}

#[test]
fn session_start_failure_rolls_back_devices() {
    let (rm, sim) = setup();
    let stream = playback(
        &rm,
        StreamType::LowLatency,
        &[DeviceId::OutSpeaker, DeviceId::OutHandset],
    );
    stream.open().unwrap();
    sim.inject_fault(session(&stream), "start", FaultMode::Once);

    assert!(stream.start().is_err());
    assert_eq!(stream.state(), StreamState::Initialized);
    let journal = sim.journal();
    assert_eq!(journal.count(device(DeviceId::OutSpeaker), "stop"), 1);
    assert_eq!(journal.count(device(DeviceId::OutHandset), "stop"), 1);
    assert!(rm.active_bindings().is_empty());

    stream.start().unwrap();
    assert_eq!(stream.state(), StreamState::Running);
}

#[test]
fn device_start_failure_stops_earlier_devices() {
    let (rm, sim) = setup();
    let stream = playback(
        &rm,
        StreamType::LowLatency,
        &[DeviceId::OutSpeaker, DeviceId::OutHandset],
    );
    stream.open().unwrap();
    sim.inject_fault(device(DeviceId::OutHandset), "start", FaultMode::Once);

    assert!(stream.start().is_err());
    let journal = sim.journal();
    assert_eq!(journal.count(device(DeviceId::OutSpeaker), "stop"), 1);
    assert_eq!(journal.count(device(DeviceId::OutHandset), "stop"), 0);
    assert_eq!(journal.count(session(&stream), "prepare"), 0);
    assert_eq!(rm.device(DeviceId::OutSpeaker).unwrap().start_count(), 0);
}

#[test]
fn stop_failure_still_stops() {
    let (rm, sim) = setup();
    let stream = running(&rm, &[DeviceId::OutSpeaker]);
    sim.inject_fault(session(&stream), "stop", FaultMode::Once);

    assert!(stream.stop().is_err());
    assert_eq!(stream.state(), StreamState::Stopped);
    assert_eq!(sim.journal().count(device(DeviceId::OutSpeaker), "stop"), 1);
    assert!(rm.active_bindings().is_empty());
}

#[test]
fn write_moves_playback_to_running() {
    let (rm, sim) = setup();
    let stream = playback(&rm, StreamType::DeepBuffer, &[DeviceId::OutSpeaker]);
    assert!(matches!(
        stream.write(&[0; 64]),
        Err(Error::InvalidState { op: "write", .. })
    ));

    stream.open().unwrap();
    assert_eq!(stream.write(&[0; 64]).unwrap(), 64);
    assert_eq!(stream.state(), StreamState::Running);
    assert_eq!(sim.journal().count(session(&stream), "write"), 1);
}

#[test]
fn write_rejected_while_paused() {
    let (rm, _sim) = setup();
    let stream = running(&rm, &[DeviceId::OutSpeaker]);
    stream.pause().unwrap();
    assert!(matches!(stream.write(&[0; 16]), Err(Error::InvalidState { .. })));
}

#[test]
fn capture_read_keeps_state() {
    let (rm, sim) = setup();
    let stream = capture(&rm, StreamType::LowLatency, &[DeviceId::InHandsetMic]);
    stream.open().unwrap();
    let mut buf = [1u8; 32];
    assert_eq!(stream.read(&mut buf).unwrap(), 32);
    assert_eq!(buf, [0u8; 32]);
    assert_eq!(stream.state(), StreamState::Initialized);
    assert_eq!(sim.journal().count(session(&stream), "read"), 1);
}

#[test]
fn kinds_reject_unsupported_transfer() {
    let (rm, _sim) = setup();
    let compressed = create_stream(
        &rm,
        &StreamAttributes::playback(
            StreamType::Compressed,
            MediaConfig::pcm(44100, 16, 2).with_format(AudioFormat::Mp3),
        ),
        &[dev(DeviceId::OutSpeaker)],
        &[],
    )
    .unwrap();
    assert_eq!(compressed.kind(), StreamKind::Compressed);
    assert!(matches!(compressed.read(&mut [0; 4]), Err(Error::Unsupported(_))));

    let trigger = capture(&rm, StreamType::VoiceUi, &[DeviceId::InHandsetVaMic]);
    assert_eq!(trigger.kind(), StreamKind::SoundTrigger);
    assert!(matches!(trigger.write(&[0; 4]), Err(Error::Unsupported(_))));
}

#[test]
fn volume_is_stored_and_applied_when_running() {
    let (rm, sim) = setup();
    let stream = playback(&rm, StreamType::LowLatency, &[DeviceId::OutSpeaker]);

    assert!(matches!(
        stream.set_volume(VolumeData::default()),
        Err(Error::InvalidArgument(_))
    ));
    assert!(stream.volume_data().is_none());

    stream.set_volume(VolumeData::uniform(0.5)).unwrap();
    assert_eq!(stream.volume_data(), Some(VolumeData::uniform(0.5)));
    assert!(sim.journal().is_empty());

    stream.open().unwrap();
    stream.start().unwrap();
    stream.set_volume(VolumeData::uniform(0.25)).unwrap();
    assert_eq!(
        sim.journal()
            .count(session(&stream), "set_config(calibration,volume)"),
        1
    );

    stream.close().unwrap();
    assert!(stream.volume_data().is_none());
}

#[test]
fn session_calls_need_a_session() {
    let (rm, sim) = setup();
    let stream = playback(&rm, StreamType::LowLatency, &[DeviceId::OutSpeaker]);

    assert!(matches!(stream.set_mute(true), Err(Error::InvalidState { .. })));
    assert!(matches!(stream.timestamp(), Err(Error::InvalidState { .. })));
    assert!(matches!(stream.set_parameters(1, &[0]), Err(Error::InvalidState { .. })));
    assert!(matches!(stream.drain(DrainType::Full), Err(Error::InvalidState { .. })));

    stream.open().unwrap();
    stream.set_mute(true).unwrap();
    stream.set_parameters(0x10, &[1, 2, 3]).unwrap();
    stream.drain(DrainType::Partial).unwrap();
    stream.write(&[0; 1920]).unwrap();
    let time = stream.timestamp().unwrap();
    assert_eq!(time.session_time_us, 10_000);

    let journal = sim.journal();
    let ops = journal.ops_for(session(&stream));
    assert!(ops.contains(&"set_config(module,mute)"));
    assert!(ops.contains(&"set_parameters(0x10,3)"));
    assert!(ops.contains(&"drain(partial)"));
}

#[test]
fn ec_ref_forwards_to_session() {
    let (rm, sim) = setup();
    let stream = capture(&rm, StreamType::VoipTx, &[DeviceId::InHandsetMic]);
    assert!(stream.set_ec_ref(DeviceId::None, true).is_err());
    stream.open().unwrap();
    stream.set_ec_ref(DeviceId::OutSpeaker, true).unwrap();
    assert_eq!(
        sim.journal().count(session(&stream), "ec_ref(out_speaker,on)"),
        1
    );
}

#[test]
fn flush_only_acts_while_paused() {
    let (rm, sim) = setup();
    let stream = running(&rm, &[DeviceId::OutSpeaker]);
    stream.flush().unwrap();
    assert_eq!(sim.journal().count(session(&stream), "flush"), 0);

    stream.pause().unwrap();
    stream.flush().unwrap();
    assert_eq!(sim.journal().count(session(&stream), "flush"), 1);
}

#[test]
fn attributes_update_keeps_kind() {
    let (rm, sim) = setup();
    let stream = playback(&rm, StreamType::LowLatency, &[DeviceId::OutSpeaker]);
    let compressed = StreamAttributes::playback(
        StreamType::Compressed,
        MediaConfig::default().with_format(AudioFormat::Aac),
    );
    assert!(matches!(
        stream.set_stream_attributes(compressed),
        Err(Error::InvalidArgument(_))
    ));

    stream.open().unwrap();
    let attrs = StreamAttributes::playback(StreamType::DeepBuffer, MediaConfig::pcm(44100, 24, 2));
    stream.set_stream_attributes(attrs.clone()).unwrap();
    assert_eq!(stream.attributes(), attrs);
    assert_eq!(
        sim.journal()
            .count(session(&stream), "set_config(module,attributes)"),
        1
    );
}

#[test]
fn buffer_sizes_align_to_frames() {
    let (rm, _sim) = setup();
    let stream = playback(&rm, StreamType::LowLatency, &[DeviceId::OutSpeaker]);

    let info = stream
        .set_buf_info(None, Some(BufferRequest::new(1001, 4)))
        .unwrap();
    assert_eq!(info.out_size, 1000);
    assert_eq!(info.out_count, 4);
    assert_eq!(stream.buf_info(), info);

    assert!(stream.set_buf_info(Some(BufferRequest::new(1000, 4)), None).is_err());
    assert!(
        stream
            .set_buf_info(None, Some(BufferRequest::new(1000, 0)))
            .is_err()
    );
}

#[test]
fn compressed_streams_start_with_fragment_buffers() {
    let (rm, _sim) = setup();
    let attrs = StreamAttributes::playback(
        StreamType::Compressed,
        MediaConfig::default().with_format(AudioFormat::Flac),
    );
    let stream = create_stream(&rm, &attrs, &[dev(DeviceId::OutSpeaker)], &[]).unwrap();
    assert_eq!(stream.buf_info().out_size, 32 * 1024);
    assert_eq!(stream.buf_info().out_count, 4);
}

#[test]
fn output_format_support() {
    let (rm, _sim) = setup();
    let stream = playback(&rm, StreamType::DeepBuffer, &[DeviceId::OutSpeaker]);
    assert!(stream.is_output_format_supported(AudioFormat::DefaultPcm));
    assert!(stream.is_output_format_supported(AudioFormat::Vorbis));
    assert!(!stream.is_output_format_supported(AudioFormat::AmrNb));
}

#[test]
fn callback_receives_session_events() {
    let (rm, sim) = setup();
    let stream = playback(&rm, StreamType::Compressed, &[DeviceId::OutSpeaker]);
    let seen: Arc<Mutex<Vec<(StreamId, StreamEvent)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    stream.register_callback(Arc::new(move |id: StreamId, event: &StreamEvent| {
        sink.lock().push((id, event.clone()));
    }));

    assert!(!sim.emit(stream.id(), StreamEvent::WriteReady));
    stream.open().unwrap();
    assert!(sim.emit(stream.id(), StreamEvent::DrainReady));
    assert_eq!(seen.lock().as_slice(), &[(stream.id(), StreamEvent::DrainReady)]);

    stream.clear_callback();
    assert!(sim.emit(stream.id(), StreamEvent::WriteReady));
    assert_eq!(seen.lock().len(), 1);

    stream.close().unwrap();
    assert!(!sim.emit(stream.id(), StreamEvent::WriteReady));
}

#[test]
fn graph_keys_match_type_and_devices() {
    let (rm, _sim) = setup();
    let stream = playback(&rm, StreamType::LowLatency, &[DeviceId::OutSpeaker]);

    let stream_key = KeyValue::new(GraphKey::StreamRx, StreamType::LowLatency.graph_value());
    let speaker_key = KeyValue::new(GraphKey::DeviceRx, DeviceId::OutSpeaker.graph_value());
    let handset_key = KeyValue::new(GraphKey::DeviceRx, DeviceId::OutHandset.graph_value());
    let instance = KeyValue::new(GraphKey::Instance, 1);

    assert!(stream.is_graph_key_match(&[stream_key, speaker_key, instance]));
    assert!(!stream.is_graph_key_match(&[stream_key, handset_key]));
    assert!(!stream.is_graph_key_match(&[instance]));
    assert!(!stream.is_graph_key_match(&[]));

    let deep_buffer = KeyValue::new(GraphKey::StreamRx, StreamType::DeepBuffer.graph_value());
    assert!(stream.is_graph_key_match(&[deep_buffer, speaker_key]));
    assert!(!stream.is_graph_key_match(&[speaker_key, deep_buffer]));
    assert!(stream.is_graph_key_match(&[handset_key, stream_key, instance]));
}

#[test]
fn factory_filters_requested_devices() {
    let (rm, _sim) = setup();
    let attrs = StreamAttributes::playback(StreamType::LowLatency, MediaConfig::default());

    assert!(matches!(
        create_stream(&rm, &attrs, &[], &[]),
        Err(Error::InvalidArgument(_))
    ));

    let stream = create_stream(
        &rm,
        &attrs,
        &[
            dev(DeviceId::None),
            dev(DeviceId::OutSpeaker),
            dev(DeviceId::OutSpeaker),
        ],
        &[],
    )
    .unwrap();
    assert_eq!(stream.device_ids(), vec![DeviceId::OutSpeaker]);

    rm.set_device_ready(DeviceId::OutHandset, false);
    assert!(matches!(
        create_stream(&rm, &attrs, &[dev(DeviceId::OutHandset)], &[]),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn factory_rejects_wrong_direction() {
    let (rm, _sim) = setup();
    let attrs = StreamAttributes::playback(StreamType::LowLatency, MediaConfig::default());
    assert!(matches!(
        create_stream(&rm, &attrs, &[dev(DeviceId::InHandsetMic)], &[]),
        Err(Error::Unsupported(_))
    ));
}

#[test]
fn capture_devices_carry_echo_reference() {
    let (rm, _sim) = setup();
    let stream = capture(&rm, StreamType::VoipTx, &[DeviceId::InHandsetMic]);
    let attrs = stream.devices()[0].attributes();
    assert_eq!(attrs.config.ec_ref, Some(EcInfo { channels: 2 }));

    let out = playback(&rm, StreamType::VoipRx, &[DeviceId::OutHandset]);
    assert_eq!(out.devices()[0].attributes().config.ec_ref, None);
}

#[test]
fn streams_share_device_handles() {
    let (rm, sim) = setup();
    let a = running(&rm, &[DeviceId::OutSpeaker]);
    let b = running(&rm, &[DeviceId::OutSpeaker]);
    assert!(Arc::ptr_eq(&a.devices()[0], &b.devices()[0]));
    assert_eq!(a.devices()[0].open_count(), 2);

    a.close().unwrap();
    assert_eq!(sim.journal().count(device(DeviceId::OutSpeaker), "close"), 0);
    b.close().unwrap();
    assert_eq!(sim.journal().count(device(DeviceId::OutSpeaker), "close"), 1);
}
