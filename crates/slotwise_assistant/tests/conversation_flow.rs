
use fixtures::{assistant_on, busy_event, week, Conversation, FlakyCalendar, WriteFault, CALENDAR};
use slotwise_assistant::{Action, CandidateSlot, DialogueState, Phase, SchedulingError};
use slotwise_gcal::MemoryCalendarService;
use std::sync::Arc;

fn state(outcome: &slotwise_assistant::TurnOutcome) -> &DialogueState {
    outcome
        .state
        .as_ref()
        .unwrap_or_else(|| panic!("no dialogue state; reply was {:?}", outcome.reply_text))
}

fn booking_ref(state: &DialogueState) -> String {
    match &state.phase {
        Phase::AwaitingConfirmation { booking_ref, .. } => booking_ref.clone(),
        other => panic!("expected AwaitingConfirmation, got {:?}", other),
    }
}

#[tokio::test]
async fn test_book_from_first_utterance_to_calendar() {
    let calendar = MemoryCalendarService::new();
    let assistant = assistant_on(Arc::new(calendar.clone()));
    let conversation = Conversation::new(&assistant);

    let offers = conversation
        .say("Book a 30 minute call with Alice tomorrow afternoon")
        .await;
    let offered = state(&offers);
    assert_eq!(offered.phase, Phase::AwaitingSelection);
    assert_eq!(offered.offered_slots.len(), 5);
    assert_eq!(
        offered.offered_slots[0],
        CandidateSlot::new(week(1, 12, 0), week(1, 12, 30))
    );
    assert!(offers.reply_text.contains("1. Tue May 6, 12:00-12:30"));

    let pick = conversation.say("2").await;
    let reference = booking_ref(state(&pick));
    assert!(pick.reply_text.contains("Shall I book \"Call with Alice\""));

    let booked = conversation.say("yes").await;
    assert!(booked.error.is_none());
    assert_eq!(
        state(&booked).phase,
        Phase::Booked {
            event_id: reference.clone(),
            slot: CandidateSlot::new(week(1, 12, 30), week(1, 13, 0)),
        }
    );
    assert!(booked.reply_text.starts_with("Done!"));

    let events = calendar.events(CALENDAR);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].id, reference);
    assert_eq!(events[0].title, "Call with Alice");
    assert_eq!(events[0].start, week(1, 12, 30));
}

#[tokio::test]
async fn test_slot_taken_before_confirmation_is_reoffered_without_it() {
    let calendar = MemoryCalendarService::new();
    let assistant = assistant_on(Arc::new(calendar.clone()));
    let conversation = Conversation::new(&assistant);

    let offers = conversation
        .say("30 minutes tomorrow between 2 and 4pm")
        .await;
    assert_eq!(state(&offers).offered_slots.len(), 4);
    conversation.say("1").await;

    let taken = CandidateSlot::new(week(1, 14, 0), week(1, 14, 30));
    calendar
        .insert(CALENDAR, busy_event("rival", "Someone else", taken.start, taken.end))
        .unwrap();

    let conflict = conversation.say("yes").await;
    assert_eq!(conflict.error, Some(SchedulingError::BookingConflict));
    let recovered = state(&conflict);
    assert_eq!(recovered.phase, Phase::AwaitingSelection);
    assert!(!recovered.offered_slots.contains(&taken));
    assert_eq!(recovered.offered_slots[0].start, week(1, 14, 30));
    assert!(conflict.reply_text.contains("just taken"));

    conversation.say("1").await;
    let booked = conversation.say("yes").await;
    assert!(matches!(state(&booked).phase, Phase::Booked { .. }));
    assert_eq!(calendar.events(CALENDAR).len(), 2);
}

#[tokio::test]
async fn test_conflict_with_unreachable_calendar_offers_nothing_stale() {
    let calendar = FlakyCalendar::new();
    let assistant = assistant_on(Arc::new(calendar.clone()));
    let conversation = Conversation::new(&assistant);

    conversation
        .say("30 minutes tomorrow between 2 and 4pm")
        .await;
    conversation.say("1").await;
    let taken = CandidateSlot::new(week(1, 14, 0), week(1, 14, 30));
    calendar
        .inner
        .insert(CALENDAR, busy_event("rival", "Someone else", taken.start, taken.end))
        .unwrap();
    calendar.fail_next_write(WriteFault::ThenBlind);

    let outcome = conversation.say("yes").await;
    assert!(matches!(
        outcome.error,
        Some(SchedulingError::ExternalCalendar(_))
    ));
    let recovered = state(&outcome);
    assert_eq!(recovered.phase, Phase::AwaitingSelection);
    assert!(recovered.offered_slots.is_empty());
    assert!(recovered
        .pending_request
        .constraints()
        .excluded_intervals
        .contains(&(taken.start, taken.end)));
    assert!(outcome.reply_text.contains("just taken"));
    assert!(outcome.reply_text.contains("couldn't reach your calendar"));

    // Once the calendar is back, narrowing re-resolves without the taken slot
    let retry = conversation.say("after 2pm").await;
    assert!(retry.error.is_none());
    assert_eq!(state(&retry).offered_slots[0].start, week(1, 14, 30));
}

#[tokio::test]
async fn test_clock_bound_while_choosing_narrows_offers() {
    let assistant = assistant_on(Arc::new(MemoryCalendarService::new()));
    let conversation = Conversation::new(&assistant);

    let offers = conversation.say("book 30 minutes tomorrow").await;
    assert_eq!(state(&offers).offered_slots[0].start, week(1, 9, 0));

    let narrowed = conversation.say("before 10am").await;
    let narrowed = state(&narrowed);
    assert_eq!(narrowed.phase, Phase::AwaitingSelection);
    assert_eq!(
        narrowed.offered_slots,
        vec![
            CandidateSlot::new(week(1, 9, 0), week(1, 9, 30)),
            CandidateSlot::new(week(1, 9, 30), week(1, 10, 0)),
        ]
    );
}

#[tokio::test]
async fn test_clock_bound_while_confirming_returns_to_choosing() {
    let assistant = assistant_on(Arc::new(MemoryCalendarService::new()));
    let conversation = Conversation::new(&assistant);

    conversation.say("book 30 minutes tomorrow").await;
    let pick = conversation.say("1").await;
    assert!(matches!(
        state(&pick).phase,
        Phase::AwaitingConfirmation { .. }
    ));

    let later = conversation.say("actually, after 2pm").await;
    let later = state(&later);
    assert_eq!(later.phase, Phase::AwaitingSelection);
    assert!(!later.offered_slots.is_empty());
    assert!(later.offered_slots.iter().all(|s| s.start >= week(1, 14, 0)));
}

#[tokio::test]
async fn test_oversized_follow_up_keeps_dialogue() {
    let assistant = assistant_on(Arc::new(MemoryCalendarService::new()));
    let conversation = Conversation::new(&assistant);

    conversation.say("tomorrow").await;
    let outcome = conversation.say("make it 99999999999999999999 hours").await;
    assert!(matches!(
        outcome.error,
        Some(SchedulingError::AmbiguousIntent(_))
    ));
    assert_eq!(state(&outcome).phase, Phase::AwaitingSelection);

    let pick = conversation.say("2").await;
    assert!(matches!(
        state(&pick).phase,
        Phase::AwaitingConfirmation { .. }
    ));
}

#[tokio::test]
async fn test_lost_write_reply_is_verified_by_reading_back() {
    let calendar = FlakyCalendar::new();
    let assistant = assistant_on(Arc::new(calendar.clone()));
    let conversation = Conversation::new(&assistant);

    conversation.say("tomorrow at 10am").await;
    conversation.say("1").await;
    calendar.fail_next_write(WriteFault::LostReply);

    let booked = conversation.say("yes").await;
    assert!(booked.error.is_none(), "{:?}", booked.error);
    assert!(matches!(state(&booked).phase, Phase::Booked { .. }));
    assert_eq!(calendar.writes(), 1);
    assert_eq!(calendar.inner.events(CALENDAR).len(), 1);
}

#[tokio::test]
async fn test_dropped_write_stays_in_confirmation_and_retries_with_same_ref() {
    let calendar = FlakyCalendar::new();
    let assistant = assistant_on(Arc::new(calendar.clone()));
    let conversation = Conversation::new(&assistant);

    conversation.say("tomorrow at 10am").await;
    let reference = booking_ref(state(&conversation.say("1").await));
    calendar.fail_next_write(WriteFault::Dropped);

    let failed = conversation.say("yes").await;
    assert!(matches!(
        failed.error,
        Some(SchedulingError::ExternalCalendar(_))
    ));
    assert_eq!(booking_ref(state(&failed)), reference);
    assert!(calendar.inner.events(CALENDAR).is_empty());

    let booked = conversation.say("yes").await;
    assert_eq!(
        state(&booked).phase,
        Phase::Booked {
            event_id: reference,
            slot: CandidateSlot::new(week(1, 10, 0), week(1, 11, 0)),
        }
    );
    assert_eq!(calendar.writes(), 2);
    assert_eq!(calendar.inner.events(CALENDAR).len(), 1);
}

#[tokio::test]
async fn test_retry_after_unverified_write_does_not_double_book() {
    let calendar = FlakyCalendar::new();
    let assistant = assistant_on(Arc::new(calendar.clone()));
    let conversation = Conversation::new(&assistant);

    conversation.say("tomorrow at 10am").await;
    conversation.say("1").await;
    calendar.fail_next_write(WriteFault::LostReplyThenBlind);

    let unknown = conversation.say("yes").await;
    assert!(matches!(
        unknown.error,
        Some(SchedulingError::ExternalCalendar(_))
    ));
    assert!(matches!(
        state(&unknown).phase,
        Phase::AwaitingConfirmation { .. }
    ));

    let booked = conversation.say("yes").await;
    assert!(matches!(state(&booked).phase, Phase::Booked { .. }));
    assert_eq!(calendar.writes(), 1);
    assert_eq!(calendar.inner.events(CALENDAR).len(), 1);
}

#[tokio::test]
async fn test_calendar_outage_on_first_read() {
    let calendar = FlakyCalendar::new();
    calendar.fail_reads(1);
    let assistant = assistant_on(Arc::new(calendar.clone()));
    let outcome = Conversation::new(&assistant).say("tomorrow").await;

    assert_eq!(
        outcome.error.as_ref().map(|e| e.code()),
        Some("external_calendar_error")
    );
    assert!(outcome.state.is_none());
}

#[tokio::test]
async fn test_reschedule_moves_existing_event() {
    let calendar = MemoryCalendarService::new();
    calendar
        .insert(
            CALENDAR,
            busy_event("dentist", "Dentist appointment", week(1, 10, 0), week(1, 11, 0)),
        )
        .unwrap();
    let assistant = assistant_on(Arc::new(calendar.clone()));
    let conversation = Conversation::new(&assistant);

    let offers = conversation.say("Move my dentist appointment to Friday").await;
    let offered = state(&offers);
    assert_eq!(offered.pending_request.action(), Action::Reschedule);
    assert_eq!(offered.pending_request.title(), "Dentist appointment");
    assert_eq!(offered.reschedule_event_id.as_deref(), Some("dentist"));
    assert_eq!(
        offered.offered_slots[0],
        CandidateSlot::new(week(4, 9, 0), week(4, 10, 0))
    );
    assert!(offers.reply_text.contains("I can move \"Dentist appointment\""));

    let pick = conversation.say("1").await;
    assert!(pick.reply_text.contains("Shall I move"));
    let moved = conversation.say("yes").await;
    assert!(matches!(
        &state(&moved).phase,
        Phase::Booked { event_id, .. } if event_id == "dentist"
    ));

    let events = calendar.events(CALENDAR);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].start, week(4, 9, 0));
}

#[tokio::test]
async fn test_reschedule_of_unknown_event_is_ambiguous() {
    let assistant = assistant_on(Arc::new(MemoryCalendarService::new()));
    let outcome = Conversation::new(&assistant)
        .say("Move my board meeting to Friday")
        .await;
    assert!(matches!(
        outcome.error,
        Some(SchedulingError::AmbiguousIntent(_))
    ));
    assert!(outcome.state.is_none());
}

#[tokio::test]
async fn test_availability_query_lists_free_time() {
    let assistant = assistant_on(Arc::new(MemoryCalendarService::new()));
    let outcome = Conversation::new(&assistant)
        .say("When am I free tomorrow morning?")
        .await;

    let offered = state(&outcome);
    assert_eq!(offered.pending_request.action(), Action::Query);
    assert_eq!(
        offered
            .offered_slots
            .iter()
            .map(|s| s.start)
            .collect::<Vec<_>>(),
        vec![week(1, 9, 0), week(1, 10, 0), week(1, 11, 0)]
    );
    assert!(outcome.reply_text.starts_with("Here's when you're free"));
}

#[tokio::test]
async fn test_follow_up_narrows_then_restarts() {
    let assistant = assistant_on(Arc::new(MemoryCalendarService::new()));
    let conversation = Conversation::new(&assistant);

    let first = conversation.say("tomorrow").await;
    assert_eq!(state(&first).offered_slots[0].start, week(1, 9, 0));

    let narrowed = conversation.say("afternoon please").await;
    let slots = &state(&narrowed).offered_slots;
    assert!(!slots.is_empty());
    assert!(slots.iter().all(|s| s.start >= week(1, 12, 0)));
    assert_eq!(state(&narrowed).turn_count, 2);

    let restarted = conversation.say("how about thursday").await;
    assert_eq!(state(&restarted).offered_slots[0].start, week(3, 9, 0));
    assert_eq!(state(&restarted).turn_count, 3);
}

#[tokio::test]
async fn test_fully_booked_day_suggests_another() {
    let calendar = MemoryCalendarService::new();
    calendar
        .insert(
            CALENDAR,
            busy_event("offsite", "Offsite", week(1, 8, 0), week(1, 18, 0)),
        )
        .unwrap();
    let assistant = assistant_on(Arc::new(calendar));
    let conversation = Conversation::new(&assistant);

    let none = conversation.say("tomorrow").await;
    assert!(state(&none).offered_slots.is_empty());
    assert!(none.reply_text.contains("couldn't find"));

    let other_day = conversation.say("what about wednesday").await;
    assert_eq!(state(&other_day).offered_slots[0].start, week(2, 9, 0));
}

#[tokio::test]
async fn test_concurrent_confirmations_write_once() {
    let calendar = FlakyCalendar::new();
    let assistant = assistant_on(Arc::new(calendar.clone()));
    let conversation = Conversation::new(&assistant);

    conversation.say("tomorrow at 10am").await;
    conversation.say("1").await;

    let (a, b) = tokio::join!(conversation.say("yes"), conversation.say("yes"));
    let booked = [&a, &b]
        .iter()
        .filter(|o| matches!(o.state.as_ref().map(|s| &s.phase), Some(Phase::Booked { .. })))
        .count();

    assert_eq!(booked, 1);
    assert_eq!(calendar.writes(), 1);
    assert_eq!(calendar.inner.events(CALENDAR).len(), 1);
}

#[tokio::test]
async fn test_sessions_are_independent() {
    let assistant = assistant_on(Arc::new(MemoryCalendarService::new()));
    let now = week(0, 10, 0);

    let (a, b) = tokio::join!(
        assistant.handle_message("alice", "tomorrow", now, None),
        assistant.handle_message("bob", "friday afternoon", now, None),
    );
    assert_eq!(state(&a).offered_slots[0].start, week(1, 9, 0));
    assert_eq!(state(&b).offered_slots[0].start, week(4, 12, 0));
    assert_eq!(a.session_id, "alice");
    assert_eq!(b.session_id, "bob");
}
