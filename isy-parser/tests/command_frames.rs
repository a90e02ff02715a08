//! Command frame round trips across every frame shape.

use isy_parser::{decode_command, CommandFrame, FixedPoint, ProgramAction, VariableType};
use proptest::prelude::*;
use rstest::rstest;

#[rstest]
#[case("/rest/nodes/12%2034%2056%201/cmd/DON")]
#[case("/rest/nodes/12%2034%2056%201/cmd/DON/255")]
#[case("/rest/nodes/n001_t1/cmd/CLISPH/72.5/17")]
#[case("/rest/nodes/ZW002_1/cmd/SECMD/1?user=3&code=1234")]
#[case("/rest/nodes/12%2034%2056%201/enable")]
#[case("/rest/nodes/12%2034%2056%201/disable")]
#[case("/rest/query")]
#[case("/rest/query/12%2034%2056%201")]
#[case("/rest/vars/set/1/3/-42")]
#[case("/rest/vars/init/2/14/125")]
#[case("/rest/programs/002A/runThen")]
#[case("/rest/programs/0001/disableRunAtStartup")]
#[case("/rest/networking/resources/7")]
#[case("/rest/nodes/12%2034%2056%201/change?name=Front%20Porch")]
#[case("/rest/zwave/node/ZW002_1/config/query/3")]
#[case("/rest/zwave/node/ZW002_1/config/set/3/600/2")]
fn test_canonical_paths_round_trip(#[case] path: &str) {
    let frame = decode_command(path).unwrap();
    assert_eq!(frame.encode(), path);
}

#[test]
fn test_round_trip_ignores_surrounding_whitespace() {
    let frame = decode_command("\n  /rest/programs/0002/runIf \r\n").unwrap();
    assert_eq!(
        frame,
        CommandFrame::Program {
            id: "0002".to_string(),
            action: ProgramAction::Run
        }
    );
    assert_eq!(frame.encode(), "/rest/programs/0002/runIf");
}

fn address_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z0-9 _./&?=%-]{1,16}"
}

proptest! {
    #[test]
    fn prop_node_commands_round_trip(
        address in address_strategy(),
        command in "[A-Z]{2,6}",
        raw in proptest::option::of(-100_000i64..100_000),
        precision in 0u8..4,
        uom in proptest::option::of("[0-9]{1,3}"),
        params in proptest::collection::vec(("[a-z]{1,6}", "[ -~]{0,8}"), 0..3),
    ) {
        let value = raw.map(|r| FixedPoint::new(r, precision));
        let frame = CommandFrame::NodeCommand {
            address,
            command,
            value,
            uom: if value.is_some() { uom } else { None },
            params,
        };
        let path = frame.encode();
        let decoded = decode_command(&path).unwrap();
        prop_assert_eq!(decoded.encode(), path);
    }

    #[test]
    fn prop_variable_frames_round_trip(
        state in any::<bool>(),
        id in 1u32..10_000,
        value in any::<i64>(),
        init in any::<bool>(),
    ) {
        let frame = CommandFrame::SetVariable {
            var_type: if state { VariableType::State } else { VariableType::Integer },
            id,
            value,
            init,
        };
        prop_assert_eq!(decode_command(&frame.encode()).unwrap(), frame);
    }
}
