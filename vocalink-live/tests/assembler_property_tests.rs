//! Property tests for turn assembly.
//!
//! For any sequence of fragments, the emitted turn is their concatenation in
//! arrival order, and an interruption leaves no trace in the next turn.

use proptest::prelude::*;
use vocalink_live::audio::{decode_base64, encode_base64};
use vocalink_live::{TurnAssembler, TurnState};

fn arb_fragments() -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 1..16)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_turn_is_concatenation_in_order(fragments in arb_fragments()) {
        let mut assembler = TurnAssembler::new();
        for fragment in &fragments {
            assembler.push_fragment(Some(&encode_base64(fragment))).unwrap();
        }

        let turn = assembler.complete().unwrap();
        let expected: Vec<u8> = fragments.concat();
        prop_assert_eq!(turn.audio.len(), fragments.iter().map(Vec::len).sum::<usize>());
        prop_assert_eq!(&turn.audio[..], &expected[..]);
        prop_assert_eq!(turn.fragment_count, fragments.len());
        prop_assert_eq!(assembler.state(), TurnState::Idle);
    }

    #[test]
    fn prop_interrupt_discards_everything_before_it(
        before in arb_fragments(),
        after in arb_fragments(),
    ) {
        let mut assembler = TurnAssembler::new();
        for fragment in &before {
            assembler.push_fragment(Some(&encode_base64(fragment))).unwrap();
        }
        let discarded = assembler.interrupt();
        prop_assert_eq!(discarded, before.iter().map(Vec::len).sum::<usize>());
        prop_assert!(assembler.complete().is_none());

        for fragment in &after {
            assembler.push_fragment(Some(&encode_base64(fragment))).unwrap();
        }
        let turn = assembler.complete().unwrap();
        prop_assert_eq!(&turn.audio[..], &after.concat()[..]);
    }

    #[test]
    fn prop_emitted_base64_decodes_to_turn_audio(fragments in arb_fragments()) {
        let mut assembler = TurnAssembler::new();
        for fragment in &fragments {
            assembler.push_fragment(Some(&encode_base64(fragment))).unwrap();
        }
        let turn = assembler.complete().unwrap();
        prop_assert_eq!(decode_base64(&turn.to_base64()).unwrap(), fragments.concat());
    }
}

#[test]
fn empty_payload_round_trips_to_empty_bytes() {
    assert_eq!(encode_base64(&[]), "");
    assert!(decode_base64("").unwrap().is_empty());
}
