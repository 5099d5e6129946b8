//! Folds inbound protocol events into the session's sentinel message.
//!
//! Chunks append decoded text fragments to the sentinel. The first terminal
//! event seals it under a fresh permanent id and clears loading. With no
//! sentinel present every event is a stray and is dropped. A late event
//! for an already finalized reply lands in that case too.

use memchr::memchr_iter;
use tracing::{debug, warn};

use crate::api::events::{ProtocolEvent, RelayFailure};
use crate::core::frame::{parse_frame, Frame, FrameError};
use crate::core::message::{Message, MessageId, Role};
use crate::core::session::ChatSession;

/// Marker that prefixes the content of a failed reply.
pub const ERROR_MARKER: &str = "[Backend Proxy Error]";

pub fn format_error_content(failure: &RelayFailure) -> String {
    format!("{ERROR_MARKER} {}", failure.message.trim())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The event had no sentinel to apply to.
    NoSentinel,
    /// The raw event could not be decoded.
    Undecodable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssembleOutcome {
    Appended { fragments: usize, dropped_frames: usize },
    Finalized { id: MessageId, failed: bool },
    Dropped(DropReason),
}

#[derive(Default)]
struct FoldTally {
    fragments: usize,
    dropped: usize,
}

#[derive(Debug, Default)]
pub struct InboundStreamAssembler {
    // Unterminated tail of the previous chunk that was cut mid-frame.
    carry: String,
}

impl InboundStreamAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, session: &mut ChatSession, event: ProtocolEvent) -> AssembleOutcome {
        let Some(sentinel) = session.sentinel() else {
            warn!(event = event_label(&event), "Dropping event with no streaming reply");
            self.carry.clear();
            return AssembleOutcome::Dropped(DropReason::NoSentinel);
        };
        let mut content = sentinel.content.clone();

        match event {
            ProtocolEvent::Chunk(raw) => {
                let (fragments, dropped_frames) = self.fold_chunk(&raw, &mut content);
                if fragments > 0 {
                    self.store(session, Message::new(MessageId::Sentinel, Role::Assistant, content));
                }
                AssembleOutcome::Appended {
                    fragments,
                    dropped_frames,
                }
            }
            ProtocolEvent::End => {
                if !self.carry.is_empty() {
                    debug!(len = self.carry.len(), "Discarding incomplete trailing frame");
                }
                self.seal(session, content, false)
            }
            ProtocolEvent::Error(failure) => {
                warn!(kind = %failure.kind, error = %failure.message, "Reply failed");
                self.seal(session, format_error_content(&failure), true)
            }
        }
    }

    fn fold_chunk(&mut self, raw: &str, content: &mut String) -> (usize, usize) {
        let mut buffer = std::mem::take(&mut self.carry);
        let carried_len = buffer.len();
        buffer.push_str(raw);

        let mut tally = FoldTally::default();
        let mut start = 0;
        let mut ends: Vec<usize> = memchr_iter(b'\n', buffer.as_bytes()).collect();
        let terminated = ends.last().is_some_and(|&end| end + 1 == buffer.len());
        if !terminated {
            ends.push(buffer.len());
        }

        let last = ends.len().saturating_sub(1);
        for (index, end) in ends.into_iter().enumerate() {
            let line = &buffer[start..end];
            start = end + 1;
            let may_carry = index == last && !terminated;
            let parsed = parse_frame(line);

            // A carried tail that did not complete is its own bad frame; the
            // chunk's first line is decoded again without it.
            if index == 0 && carried_len > 0 {
                if let Some(Err(err)) = &parsed {
                    if !(may_carry && err.is_truncated()) {
                        debug!(error = %err, "Dropping incomplete carried frame");
                        tally.dropped += 1;
                        let own = &line[carried_len..];
                        self.absorb(own, parse_frame(own), may_carry, content, &mut tally);
                        continue;
                    }
                }
            }
            self.absorb(line, parsed, may_carry, content, &mut tally);
        }
        (tally.fragments, tally.dropped)
    }

    fn absorb(
        &mut self,
        line: &str,
        parsed: Option<Result<Frame, FrameError>>,
        may_carry: bool,
        content: &mut String,
        tally: &mut FoldTally,
    ) {
        match parsed {
            None => {}
            Some(Ok(Frame::Text(text))) => {
                content.push_str(&text);
                tally.fragments += 1;
            }
            Some(Ok(Frame::Reserved { tag })) => {
                debug!(tag = %tag, "Skipping reserved frame");
            }
            Some(Err(err)) if may_carry && err.is_truncated() => {
                self.carry.push_str(line);
            }
            Some(Err(err)) => {
                debug!(error = %err, "Dropping malformed frame");
                tally.dropped += 1;
            }
        }
    }

    fn seal(&mut self, session: &mut ChatSession, content: String, failed: bool) -> AssembleOutcome {
        self.carry.clear();
        let id = session.allocate_id();
        self.store(session, Message::new(id, Role::Assistant, content));
        debug!(id = %id, failed, "Reply finalized");
        AssembleOutcome::Finalized { id, failed }
    }

    fn store(&self, session: &mut ChatSession, message: Message) {
        if let Err(err) = session.replace(MessageId::Sentinel, message) {
            warn!(error = %err, "Sentinel replacement rejected");
        }
    }
}

fn event_label(event: &ProtocolEvent) -> &'static str {
    match event {
        ProtocolEvent::Chunk(_) => "chunk",
        ProtocolEvent::End => "end",
        ProtocolEvent::Error(_) => "error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::events::RelayErrorKind;
    use proptest::prelude::*;

    fn streaming_session() -> ChatSession {
        let mut session = ChatSession::default();
        let id = session.allocate_id();
        session
            .append(Message::new(id, Role::User, "question"))
            .expect("user");
        session.append(Message::sentinel()).expect("sentinel");
        session
    }

    fn chunk(raw: &str) -> ProtocolEvent {
        ProtocolEvent::Chunk(raw.to_string())
    }

    #[test]
    fn chunks_then_end_produce_sealed_reply() {
        let mut session = streaming_session();
        let mut assembler = InboundStreamAssembler::new();

        assembler.apply(&mut session, chunk("0:\"Hel\""));
        assembler.apply(&mut session, chunk("0:\"lo\""));
        let outcome = assembler.apply(&mut session, ProtocolEvent::End);

        let last = session.messages().last().expect("reply");
        assert_eq!(last.content, "Hello");
        assert!(!last.is_sentinel());
        assert!(!session.loading());
        assert_eq!(
            outcome,
            AssembleOutcome::Finalized {
                id: last.id,
                failed: false
            }
        );
    }

    #[test]
    fn multiple_frames_in_one_chunk_are_applied_in_order() {
        let mut session = streaming_session();
        let mut assembler = InboundStreamAssembler::new();
        let outcome = assembler.apply(&mut session, chunk("0:\"a\"\n0:\"b\"\n\n0:\"c\"\n"));
        assert_eq!(
            outcome,
            AssembleOutcome::Appended {
                fragments: 3,
                dropped_frames: 0
            }
        );
        assert_eq!(session.sentinel().map(|m| m.content.as_str()), Some("abc"));
    }

    #[test]
    fn malformed_frame_is_dropped_without_aborting_stream() {
        let mut session = streaming_session();
        let mut assembler = InboundStreamAssembler::new();
        assembler.apply(&mut session, chunk("0:\"keep\"\n"));
        let outcome = assembler.apply(&mut session, chunk("0:{broken\n0:\" going\"\n"));
        assert_eq!(
            outcome,
            AssembleOutcome::Appended {
                fragments: 1,
                dropped_frames: 1
            }
        );
        assert!(session.loading());
        assembler.apply(&mut session, ProtocolEvent::End);
        assert_eq!(
            session.messages().last().map(|m| m.content.as_str()),
            Some("keep going")
        );
    }

    #[test]
    fn reserved_tags_are_ignored() {
        let mut session = streaming_session();
        let mut assembler = InboundStreamAssembler::new();
        assembler.apply(
            &mut session,
            chunk("9:{\"tool\":1}\n0:\"x\"\nd:{\"finishReason\":\"stop\"}\n"),
        );
        assert_eq!(session.sentinel().map(|m| m.content.as_str()), Some("x"));
    }

    #[test]
    fn frame_split_across_chunks_is_reassembled() {
        let mut session = streaming_session();
        let mut assembler = InboundStreamAssembler::new();
        assembler.apply(&mut session, chunk("0:\"one\"\n0:\"tw"));
        assert_eq!(session.sentinel().map(|m| m.content.as_str()), Some("one"));
        assembler.apply(&mut session, chunk("o\"\n"));
        assert_eq!(session.sentinel().map(|m| m.content.as_str()), Some("onetwo"));
    }

    #[test]
    fn unfinished_carry_does_not_swallow_next_frame() {
        let mut session = streaming_session();
        let mut assembler = InboundStreamAssembler::new();
        assembler.apply(&mut session, chunk("0:\"ok\"\n0:\"bro"));

        let outcome = assembler.apply(&mut session, chunk("0:\"x\""));

        assert_eq!(
            outcome,
            AssembleOutcome::Appended {
                fragments: 1,
                dropped_frames: 1
            }
        );
        assembler.apply(&mut session, ProtocolEvent::End);
        assert_eq!(
            session.messages().last().map(|m| m.content.as_str()),
            Some("okx")
        );
    }

    #[test]
    fn unfinished_carry_is_dropped_before_a_terminated_line() {
        let mut session = streaming_session();
        let mut assembler = InboundStreamAssembler::new();
        assembler.apply(&mut session, chunk("0:\"cut"));

        let outcome = assembler.apply(&mut session, chunk("0:\"next\"\n0:\"!\"\n"));

        assert_eq!(
            outcome,
            AssembleOutcome::Appended {
                fragments: 2,
                dropped_frames: 1
            }
        );
        assert_eq!(session.sentinel().map(|m| m.content.as_str()), Some("next!"));
    }

    #[test]
    fn error_replaces_content_with_marked_message() {
        let mut session = streaming_session();
        let mut assembler = InboundStreamAssembler::new();
        assembler.apply(&mut session, chunk("0:\"partial\""));
        let outcome = assembler.apply(
            &mut session,
            ProtocolEvent::Error(RelayFailure::http(500, "server error")),
        );

        let last = session.messages().last().expect("reply");
        assert!(matches!(outcome, AssembleOutcome::Finalized { failed: true, .. }));
        assert_eq!(
            last.content,
            "[Backend Proxy Error] Request failed with status 500: server error"
        );
        assert!(last.content.starts_with(ERROR_MARKER));
        assert!(!last.is_sentinel());
        assert!(!session.loading());
    }

    #[test]
    fn terminal_events_without_sentinel_are_noops() {
        let mut session = ChatSession::default();
        let id = session.allocate_id();
        session
            .append(Message::new(id, Role::User, "hello"))
            .expect("user");
        let before = session.messages().to_vec();
        let mut assembler = InboundStreamAssembler::new();

        for event in [
            ProtocolEvent::End,
            ProtocolEvent::Error(RelayFailure::new(RelayErrorKind::Network, "late")),
            chunk("0:\"stray\""),
        ] {
            assert_eq!(
                assembler.apply(&mut session, event),
                AssembleOutcome::Dropped(DropReason::NoSentinel)
            );
        }
        assert_eq!(session.messages(), before.as_slice());
        assert!(!session.loading());
    }

    #[test]
    fn second_terminal_event_is_dropped() {
        let mut session = streaming_session();
        let mut assembler = InboundStreamAssembler::new();
        assembler.apply(&mut session, chunk("0:\"done\""));
        let first = assembler.apply(&mut session, ProtocolEvent::End);
        let snapshot = session.messages().to_vec();

        let second = assembler.apply(
            &mut session,
            ProtocolEvent::Error(RelayFailure::network("too late")),
        );
        assert!(matches!(first, AssembleOutcome::Finalized { .. }));
        assert_eq!(second, AssembleOutcome::Dropped(DropReason::NoSentinel));
        assert_eq!(session.messages(), snapshot.as_slice());
    }

    #[test]
    fn finalized_ids_do_not_collide_across_rapid_exchanges() {
        let mut session = ChatSession::default();
        let mut assembler = InboundStreamAssembler::new();
        let mut ids = Vec::new();
        for _ in 0..50 {
            session.append(Message::sentinel()).expect("sentinel");
            match assembler.apply(&mut session, ProtocolEvent::End) {
                AssembleOutcome::Finalized { id, .. } => ids.push(id),
                other => panic!("expected finalization, got {other:?}"),
            }
        }
        let mut unique = ids.clone();
        unique.sort_by_key(|id| id.to_string());
        unique.dedup();
        assert_eq!(unique.len(), ids.len());
    }

    fn arb_fragment() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9 é🦀\"\\\\\n:]{0,12}"
    }

    fn arb_frame() -> impl Strategy<Value = (String, Option<String>)> {
        prop_oneof![
            4 => arb_fragment().prop_map(|text| {
                let line = format!("0:{}", serde_json::to_string(&text).expect("json"));
                (line, Some(text))
            }),
            1 => Just(("0:{oops".to_string(), None)),
            1 => Just(("0:12".to_string(), None)),
            1 => Just(("2:[\"reserved\"]".to_string(), None)),
        ]
    }

    // An opened string that never closes in this chunk or the next.
    fn arb_truncated_tail() -> impl Strategy<Value = Option<String>> {
        prop::option::weighted(0.3, "[a-z ]{0,6}".prop_map(|text| format!("0:\"{text}")))
    }

    fn arb_chunk() -> impl Strategy<Value = (String, String)> {
        (
            prop::collection::vec(arb_frame(), 1..5),
            any::<bool>(),
            arb_truncated_tail(),
        )
            .prop_map(|(frames, trailing_newline, tail)| {
                let expected: String = frames.iter().filter_map(|(_, t)| t.clone()).collect();
                let mut raw = frames
                    .into_iter()
                    .map(|(line, _)| line)
                    .collect::<Vec<_>>()
                    .join("\n");
                match tail {
                    Some(tail) => {
                        raw.push('\n');
                        raw.push_str(&tail);
                    }
                    None if trailing_newline => raw.push('\n'),
                    None => {}
                }
                (raw, expected)
            })
    }

    proptest! {
        #[test]
        fn finalized_content_is_concatenation_of_text_fragments(
            chunks in prop::collection::vec(arb_chunk(), 0..8)
        ) {
            let mut session = streaming_session();
            let mut assembler = InboundStreamAssembler::new();
            let mut expected = String::new();
            for (raw, text) in chunks {
                assembler.apply(&mut session, ProtocolEvent::Chunk(raw));
                expected.push_str(&text);
            }
            let outcome = assembler.apply(&mut session, ProtocolEvent::End);
            let is_finalized = matches!(outcome, AssembleOutcome::Finalized { failed: false, .. });
            prop_assert!(is_finalized);
            let last = session.messages().last().expect("reply");
            prop_assert_eq!(&last.content, &expected);
            prop_assert!(!last.is_sentinel());
            prop_assert!(!session.loading());
        }
    }
}
