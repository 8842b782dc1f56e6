use super::*;

const COMPLETE_EVENT: &str = r#"data: {"status":"complete","step":5,"progress":100,"result":{"generatedImages":["a","b","c","d"],"videoUrl":"v"}}"#;

fn push(
    decoder: &mut EventStreamDecoder,
    chunk: &[u8],
) -> Vec<Result<DecodedEvent, EventDecodeError>> {
    decoder.push(chunk).expect("line within limit")
}

fn ok_events(results: Vec<Result<DecodedEvent, EventDecodeError>>) -> Vec<DecodedEvent> {
    results
        .into_iter()
        .map(|result| result.expect("event decodes"))
        .collect()
}

#[test]
fn decodes_step_and_progress() {
    let event = decode_event(r#"{"step":2,"progress":25}"#).expect("decode");
    assert_eq!(
        event,
        DecodedEvent::progress(Some(GenerationStep::Enhancing), Some(25))
    );
}

#[test]
fn zero_progress_is_present_but_zero_step_is_absent() {
    let event = decode_event(r#"{"step":0,"progress":0}"#).expect("decode");
    assert_eq!(event.step, None);
    assert_eq!(event.progress, Some(0));

    let event = decode_event(r#"{"step":3}"#).expect("decode");
    assert_eq!(event.progress, None);
}

#[test]
fn progress_is_rounded_and_clamped() {
    assert_eq!(
        decode_event(r#"{"progress":42.6}"#).expect("decode").progress,
        Some(43)
    );
    assert_eq!(
        decode_event(r#"{"progress":250}"#).expect("decode").progress,
        Some(100)
    );
    assert_eq!(
        decode_event(r#"{"progress":-3}"#).expect("decode").progress,
        Some(0)
    );
}

#[test]
fn rejects_step_outside_known_range() {
    assert!(matches!(
        decode_event(r#"{"step":9}"#),
        Err(EventDecodeError::StepOutOfRange(9))
    ));
}

#[test]
fn rejects_wrongly_typed_fields() {
    assert!(matches!(
        decode_event(r#"{"step":"two"}"#),
        Err(EventDecodeError::MalformedJson(_))
    ));
}

#[test]
fn error_status_keeps_message_verbatim() {
    let event = decode_event(r#"{"status":"error","message":"Kling quota exceeded"}"#)
        .expect("decode");
    assert_eq!(
        event.outcome,
        Some(EventOutcome::Failed("Kling quota exceeded".to_string()))
    );
}

#[test]
fn error_status_without_message_uses_default() {
    let event = decode_event(r#"{"status":"error"}"#).expect("decode");
    assert_eq!(
        event.outcome,
        Some(EventOutcome::Failed(DEFAULT_STREAM_ERROR_MESSAGE.to_string()))
    );
}

#[test]
fn complete_status_without_result_keeps_progress_fields() {
    let event = decode_event(r#"{"step":4,"progress":80,"status":"complete"}"#).expect("decode");
    assert_eq!(
        event,
        DecodedEvent::progress(Some(GenerationStep::CreatingVideo), Some(80))
    );
    assert!(!event.is_terminal());
}

#[test]
fn complete_status_with_invalid_result_is_not_terminal() {
    let event = decode_event(
        r#"{"status":"complete","step":5,"progress":100,"result":{"generatedImages":["a","b","c","d"],"videoUrl":""}}"#,
    )
    .expect("decode");
    assert_eq!(event.outcome, None);
    assert_eq!(event.step, Some(GenerationStep::Finalizing));
    assert_eq!(event.progress, Some(100));
}

#[test]
fn complete_status_carries_result_and_progress() {
    let mut decoder = EventStreamDecoder::new();
    let events = ok_events(push(&mut decoder, format!("{COMPLETE_EVENT}\n").as_bytes()));
    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert!(event.is_terminal());
    assert_eq!(event.step, Some(GenerationStep::Finalizing));
    assert_eq!(event.progress, Some(100));
    match &event.outcome {
        Some(EventOutcome::Complete(result)) => assert_eq!(result.video_url, "v"),
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[test]
fn line_split_across_chunks_is_not_parsed_until_newline() {
    let mut decoder = EventStreamDecoder::new();

    let first = push(&mut decoder, br#"data: {"step":1,"pro"#);
    assert!(first.is_empty());
    assert_eq!(decoder.pending_len(), br#"data: {"step":1,"pro"#.len());

    let second = ok_events(push(&mut decoder, b"gress\":10}\n"));
    assert_eq!(
        second,
        vec![DecodedEvent::progress(
            Some(GenerationStep::Uploading),
            Some(10)
        )]
    );
    assert_eq!(decoder.pending_len(), 0);
}

#[test]
fn multibyte_character_split_across_chunks_is_reassembled() {
    let line = "data: {\"status\":\"error\",\"message\":\"échec du rendu\"}\n".as_bytes();
    let split = line
        .iter()
        .position(|b| *b == 0xC3)
        .expect("first byte of é")
        + 1;

    let mut decoder = EventStreamDecoder::new();
    assert!(push(&mut decoder, &line[..split]).is_empty());
    let events = ok_events(push(&mut decoder, &line[split..]));
    assert_eq!(
        events[0].outcome,
        Some(EventOutcome::Failed("échec du rendu".to_string()))
    );
}

#[test]
fn several_lines_in_one_chunk_decode_in_order() {
    let mut decoder = EventStreamDecoder::new();
    let events = ok_events(push(
        &mut decoder,
        b"data: {\"step\":1,\"progress\":10}\r\n\r\ndata: {\"progress\":0}\ndata: {\"step\":2,\"progress\":50}\n",
    ));
    assert_eq!(
        events,
        vec![
            DecodedEvent::progress(Some(GenerationStep::Uploading), Some(10)),
            DecodedEvent::progress(None, Some(0)),
            DecodedEvent::progress(Some(GenerationStep::Enhancing), Some(50)),
        ]
    );
}

#[test]
fn malformed_line_is_reported_without_affecting_neighbours() {
    let mut decoder = EventStreamDecoder::new();
    let results = push(
        &mut decoder,
        b"data: {\"step\":1,\"progress\":10}\ndata: {not json\ndata: {\"step\":2,\"progress\":50}\n",
    );
    assert_eq!(results.len(), 3);
    assert!(results[0].is_ok());
    assert!(matches!(results[1], Err(EventDecodeError::MalformedJson(_))));
    assert!(results[2].is_ok());
}

#[test]
fn non_data_lines_are_ignored() {
    let mut decoder = EventStreamDecoder::new();
    let events = ok_events(push(
        &mut decoder,
        b": keep-alive\nevent: progress\nid: 4\nretry: 100\ndata:\ndata:{\"progress\":5}\n",
    ));
    assert_eq!(events, vec![DecodedEvent::progress(None, Some(5))]);
}

#[test]
fn unterminated_tail_is_discarded_on_finish() {
    let mut decoder = EventStreamDecoder::new();
    assert!(push(&mut decoder, br#"data: {"progress":99}"#).is_empty());
    assert_eq!(decoder.finish(), br#"data: {"progress":99}"#.len());
}

#[test]
fn unterminated_line_past_limit_is_rejected() {
    let mut decoder = EventStreamDecoder::with_line_limit(32);
    assert!(push(&mut decoder, b"data: {\"progress\":").is_empty());
    assert!(matches!(
        decoder.push(&[b'9'; 40]),
        Err(LineTooLong { limit: 32 })
    ));
}

#[test]
fn complete_line_past_limit_is_rejected() {
    let mut decoder = EventStreamDecoder::with_line_limit(16);
    let line = b"data: {\"step\":1,\"progress\":10}\n";
    assert!(matches!(
        decoder.push(line),
        Err(LineTooLong { limit: 16 })
    ));
}

#[test]
fn lines_within_limit_decode_normally() {
    let mut decoder = EventStreamDecoder::with_line_limit(40);
    let events = ok_events(push(&mut decoder, b"data: {\"step\":1,\"progress\":10}\n"));
    assert_eq!(
        events,
        vec![DecodedEvent::progress(Some(GenerationStep::Uploading), Some(10))]
    );
}
