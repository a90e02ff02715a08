//! Decoding captured event frames, including the malformed ones a live
//! stream produces.

use isy_parser::{decode, EventKind, NodeChangeAction, ProgramRunning, SystemStatus};
use rstest::rstest;

#[test]
fn test_thermostat_frames_keep_precision() {
    let frames: [&[u8]; 3] = [
        br#"<Event seqnum="1" sid="uuid:1"><control>CLISPH</control><action uom="17" prec="0">68</action><node>n001_t1</node><eventInfo/><fmtAct>68 F</fmtAct></Event>"#,
        br#"<Event seqnum="2" sid="uuid:1"><control>CLIMD</control><action uom="67" prec="0">3</action><node>n001_t1</node><eventInfo/></Event>"#,
        br#"<Event seqnum="3" sid="uuid:1"><control>ST</control><action uom="17" prec="2">7125</action><node>n001_t1</node><eventInfo/></Event>"#,
    ];

    let decoded: Vec<_> = frames.iter().map(|f| decode(f).unwrap()).collect();
    assert_eq!(decoded[0].seqnum, Some(1));

    match &decoded[2].kind {
        EventKind::Property(update) => {
            assert_eq!(update.value.unwrap().to_string(), "71.25");
            assert_eq!(update.uom.as_deref(), Some("17"));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[rstest]
#[case(b"0".as_slice(), SystemStatus::NotBusy)]
#[case(b"1".as_slice(), SystemStatus::Busy)]
#[case(b"2".as_slice(), SystemStatus::Idle)]
#[case(b"3".as_slice(), SystemStatus::SafeMode)]
fn test_system_status(#[case] action: &[u8], #[case] expected: SystemStatus) {
    let mut frame = b"<Event><control>_5</control><action>".to_vec();
    frame.extend_from_slice(action);
    frame.extend_from_slice(b"</action><node/></Event>");
    assert_eq!(decode(&frame).unwrap().kind, EventKind::SystemStatus(expected));
}

#[rstest]
#[case("10", Some(false), ProgramRunning::Idle)]
#[case("21", Some(true), ProgramRunning::Then)]
#[case("32", Some(false), ProgramRunning::Else)]
#[case("01", Some(true), ProgramRunning::Idle)]
#[case("00", None, ProgramRunning::Idle)]
fn test_program_status_nibbles(
    #[case] code: &str,
    #[case] status: Option<bool>,
    #[case] running: ProgramRunning,
) {
    let frame = format!(
        "<Event><control>_1</control><action>0</action><node/><eventInfo><id>12</id><s>{}</s></eventInfo></Event>",
        code
    );
    match decode(frame.as_bytes()).unwrap().kind {
        EventKind::Program(update) => {
            assert_eq!(update.id, "0012");
            assert_eq!(update.status, status);
            assert_eq!(update.running, Some(running));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_node_lifecycle_events() {
    let added = decode(br#"<Event><control>_3</control><action>ND</action><node>11 22 33 1</node><eventInfo/></Event>"#).unwrap();
    let removed = decode(br#"<Event><control>_3</control><action>NR</action><node>11 22 33 1</node><eventInfo/></Event>"#).unwrap();

    match (added.kind, removed.kind) {
        (EventKind::NodeChanged(a), EventKind::NodeChanged(r)) => {
            assert_eq!(a.action, NodeChangeAction::Added);
            assert_eq!(r.action, NodeChangeAction::Removed);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_unmodelled_system_channels_are_other() {
    let event = decode(br#"<Event><control>_7</control><action>1</action><node/></Event>"#).unwrap();
    assert!(matches!(event.kind, EventKind::Other { ref control, .. } if control == "_7"));
}

#[test]
fn test_garbage_between_good_frames_does_not_poison_decoder() {
    let good = br#"<Event><control>ST</control><action>0</action><node>A</node></Event>"#;
    assert!(decode(good).is_ok());
    assert!(decode(b"<Event><control>ST</control><act").is_err());
    assert!(decode(good).is_ok());
}
