// Unit tests for display pacing
//
// Agent text must not outrun the avatar's spoken playback: fragments queue
// in arrival order and are released in bounded batches gated on the
// animation-complete signal and a live stream.

use avatar_realtime::DisplayPacer;

#[test]
fn test_advance_blocked_without_stream() {
    let mut pacer = DisplayPacer::new();
    pacer.push_fragment("Hello");

    assert_eq!(pacer.advance(false), None);
    assert_eq!(pacer.pending(), 1);
}

#[test]
fn test_advance_blocked_on_empty_queue() {
    let mut pacer = DisplayPacer::new();
    assert_eq!(pacer.advance(true), None);
}

#[test]
fn test_batch_concatenates_in_arrival_order() {
    let mut pacer = DisplayPacer::new();
    pacer.push_fragment("Hello");
    pacer.push_fragment(", ");
    pacer.push_fragment("world");

    let displayed = pacer.advance(true).unwrap();
    assert_eq!(displayed, "Hello, world");
    assert_eq!(pacer.displayed(), Some("Hello, world"));
    assert!(pacer.is_animating());
}

#[test]
fn test_batch_is_bounded_to_three_fragments() {
    let mut pacer = DisplayPacer::new();
    for fragment in ["a", "b", "c", "d", "e"] {
        pacer.push_fragment(fragment);
    }

    assert_eq!(pacer.advance(true).unwrap(), "abc");
    assert_eq!(pacer.pending(), 2);
}

#[test]
fn test_animating_blocks_next_batch_until_complete() {
    let mut pacer = DisplayPacer::new();
    for fragment in ["a", "b", "c", "d"] {
        pacer.push_fragment(fragment);
    }

    assert_eq!(pacer.advance(true).unwrap(), "abc");

    // Still animating: nothing moves even with a live stream.
    assert_eq!(pacer.advance(true), None);

    pacer.display_complete();
    assert_eq!(pacer.advance(true).unwrap(), "d");
}

#[test]
fn test_order_preserved_across_batches() {
    let mut pacer = DisplayPacer::new();
    for i in 0..7 {
        pacer.push_fragment(format!("{} ", i));
    }

    let mut shown = String::new();
    while let Some(batch) = {
        pacer.display_complete();
        pacer.advance(true)
    } {
        shown.push_str(&batch);
    }

    assert_eq!(shown, "0 1 2 3 4 5 6 ");
}

#[test]
fn test_fragments_arriving_mid_animation_queue_up() {
    let mut pacer = DisplayPacer::new();
    pacer.push_fragment("first");
    assert_eq!(pacer.advance(true).unwrap(), "first");

    pacer.push_fragment("second");
    pacer.push_fragment("third");
    assert_eq!(pacer.pending(), 2);

    pacer.display_complete();
    assert_eq!(pacer.advance(true).unwrap(), "secondthird");
}
