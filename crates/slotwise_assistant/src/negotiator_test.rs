#[cfg(test)]
mod tests {
    use crate::intent::Refinement;
    use crate::model::CandidateSlot;
    use crate::negotiator::*;
    use crate::test_support::*;
    use crate::turn::{SlotChoice, TurnIntent};
    use chrono::{Duration, NaiveTime};
    use proptest::prelude::*;

    const MAX_TURNS: u32 = 12;

    fn slots() -> Vec<CandidateSlot> {
        vec![
            CandidateSlot::new(week(0, 9, 0), week(0, 9, 30)),
            CandidateSlot::new(week(0, 9, 30), week(0, 10, 0)),
            CandidateSlot::new(week(0, 11, 0), week(0, 11, 30)),
        ]
    }

    fn opened() -> DialogueState {
        open(monday_request(30), slots(), week(0, 8, 0), None)
    }

    fn input(intent: TurnIntent, booking_ref: &str) -> TurnInput {
        TurnInput {
            intent,
            refinement: Refinement::Unchanged,
            fresh_booking_ref: booking_ref.to_string(),
        }
    }

    fn turn(state: DialogueState, intent: TurnIntent, booking_ref: &str) -> (DialogueState, Directive) {
        apply_turn(state, input(intent, booking_ref), week(0, 8, 5), MAX_TURNS)
    }

    fn confirmed(state: &DialogueState) -> (CandidateSlot, String) {
        match &state.phase {
            Phase::AwaitingConfirmation {
                chosen,
                booking_ref,
            } => (*chosen, booking_ref.clone()),
            other => panic!("expected AwaitingConfirmation, got {:?}", other),
        }
    }

    #[test]
    fn test_open_counts_first_turn() {
        let state = opened();
        assert_eq!(state.turn_count, 1);
        assert_eq!(state.phase, Phase::AwaitingSelection);
        assert_eq!(state.offered_slots.len(), 3);
    }

    #[test]
    fn test_select_then_confirm_writes_with_stable_ref() {
        let (state, directive) = turn(opened(), TurnIntent::Select(SlotChoice::Index(2)), "ref-1");
        assert_eq!(directive, Directive::Present);
        assert_eq!(state.turn_count, 2);
        assert_eq!(state.last_activity, week(0, 8, 5));
        let (chosen, booking_ref) = confirmed(&state);
        assert_eq!(chosen, slots()[1]);
        assert_eq!(booking_ref, "ref-1");

        let (state, directive) = turn(state, TurnIntent::Affirm, "ref-unused");
        assert_eq!(
            directive,
            Directive::Write {
                slot: slots()[1],
                booking_ref: "ref-1".to_string(),
            }
        );

        let state = complete_booking(state, "evt-1".to_string(), slots()[1]);
        assert!(state.phase.is_terminal());
        assert_eq!(state.phase.name(), "booked");
    }

    #[test]
    fn test_changing_choice_gets_new_ref_but_repeat_keeps_it() {
        let (state, _) = turn(opened(), TurnIntent::Select(SlotChoice::Index(1)), "ref-1");
        let (state, _) = turn(state, TurnIntent::Select(SlotChoice::Index(1)), "ref-2");
        assert_eq!(confirmed(&state).1, "ref-1");

        let (state, _) = turn(state, TurnIntent::Select(SlotChoice::Last), "ref-3");
        assert_eq!(confirmed(&state), (slots()[2], "ref-3".to_string()));
    }

    #[test]
    fn test_time_choice_matches_offer_in_either_half_of_day() {
        let choice = SlotChoice::Time {
            weekday: None,
            time: NaiveTime::from_hms_opt(21, 0, 0).unwrap(),
        };
        let (state, _) = turn(opened(), TurnIntent::Select(choice), "ref-1");
        assert_eq!(confirmed(&state).0, slots()[0]);
    }

    #[test]
    fn test_unmatched_choice_clarifies() {
        let (state, directive) = turn(opened(), TurnIntent::Select(SlotChoice::Index(9)), "ref-1");
        assert!(matches!(directive, Directive::Clarify(_)));
        assert_eq!(state.phase, Phase::AwaitingSelection);
    }

    #[test]
    fn test_refinements_drive_resolve_and_restart() {
        let narrowed = monday_request(30)
            .with_duration(Duration::minutes(60))
            .unwrap();
        let (_, directive) = apply_turn(
            opened(),
            TurnInput {
                intent: TurnIntent::Other,
                refinement: Refinement::Narrowed(narrowed.clone()),
                fresh_booking_ref: "ref-1".to_string(),
            },
            week(0, 8, 5),
            MAX_TURNS,
        );
        assert_eq!(directive, Directive::Resolve(narrowed.clone()));

        let (_, directive) = apply_turn(
            opened(),
            TurnInput {
                intent: TurnIntent::Other,
                refinement: Refinement::StartOver,
                fresh_booking_ref: "ref-1".to_string(),
            },
            week(0, 8, 5),
            MAX_TURNS,
        );
        assert_eq!(directive, Directive::Restart);

        let state = reoffer(opened(), narrowed.clone(), vec![slots()[0]], MAX_TURNS);
        assert_eq!(state.pending_request, narrowed);
        assert_eq!(state.offered_slots, vec![slots()[0]]);
    }

    #[test]
    fn test_affirm_needs_a_single_offer() {
        let (_, directive) = turn(opened(), TurnIntent::Affirm, "ref-1");
        assert!(matches!(directive, Directive::Clarify(_)));

        let single = open(monday_request(30), vec![slots()[0]], week(0, 8, 0), None);
        let (state, directive) = turn(single, TurnIntent::Affirm, "ref-1");
        assert_eq!(directive, Directive::Present);
        assert_eq!(confirmed(&state).0, slots()[0]);
    }

    #[test]
    fn test_rejecting_tentative_slot_returns_to_selection() {
        let (state, _) = turn(opened(), TurnIntent::Select(SlotChoice::Index(1)), "ref-1");
        let (state, directive) = turn(state, TurnIntent::Reject(None), "ref-2");
        assert_eq!(directive, Directive::Present);
        assert_eq!(state.phase, Phase::AwaitingSelection);
    }

    #[test]
    fn test_cancel_abandons_from_any_phase() {
        let (state, _) = turn(opened(), TurnIntent::Select(SlotChoice::Index(1)), "ref-1");
        let (state, _) = turn(state, TurnIntent::Cancel, "ref-2");
        assert_eq!(
            state.phase,
            Phase::Abandoned {
                reason: AbandonReason::Cancelled
            }
        );

        // Terminal states ignore further turns
        let count = state.turn_count;
        let (state, directive) = turn(state, TurnIntent::Affirm, "ref-3");
        assert_eq!(directive, Directive::Present);
        assert_eq!(state.turn_count, count);
    }

    #[test]
    fn test_turn_limit_abandons() {
        let mut state = opened();
        for _ in 0..2 {
            state = apply_turn(state, input(TurnIntent::Other, "r"), week(0, 8, 5), 3).0;
        }
        assert_eq!(state.turn_count, 3);
        assert_eq!(
            state.phase,
            Phase::Abandoned {
                reason: AbandonReason::TurnLimit
            }
        );
    }

    #[test]
    fn test_conflict_recovery_drops_taken_slot() {
        let taken = CandidateSlot::new(week(0, 14, 0), week(0, 14, 30));
        let later = CandidateSlot::new(week(0, 14, 30), week(0, 15, 0));
        let state = open(monday_request(30), vec![taken, later], week(0, 8, 0), None);
        let (state, _) = turn(state, TurnIntent::Select(SlotChoice::Index(1)), "ref-1");

        let state = recover_conflict(state, taken, vec![taken, later], MAX_TURNS);

        assert_eq!(state.phase, Phase::AwaitingSelection);
        assert_eq!(state.offered_slots, vec![later]);
        assert!(state
            .pending_request
            .constraints()
            .excluded_intervals
            .contains(&(taken.start, taken.end)));
    }

    #[test]
    fn test_idle_expiry() {
        let state = opened();
        assert!(!is_idle(&state, week(0, 8, 29), Duration::minutes(30)));
        assert!(is_idle(&state, week(0, 8, 30), Duration::minutes(30)));
        assert_eq!(
            expire(state).phase,
            Phase::Abandoned {
                reason: AbandonReason::IdleTimeout
            }
        );
    }

    fn any_intent() -> impl Strategy<Value = TurnIntent> {
        prop_oneof![
            Just(TurnIntent::Affirm),
            Just(TurnIntent::Other),
            Just(TurnIntent::Reject(None)),
            (0..6usize).prop_map(|n| TurnIntent::Select(SlotChoice::Index(n))),
            (0..6usize).prop_map(|n| TurnIntent::Reject(Some(SlotChoice::Index(n)))),
            Just(TurnIntent::Select(SlotChoice::Last)),
        ]
    }

    proptest! {
        #[test]
        fn test_every_dialogue_ends_within_max_turns(
            intents in prop::collection::vec(any_intent(), 0..40),
            max_turns in 1..10u32,
        ) {
            let mut state = enforce_turn_limit(opened(), max_turns);
            for (i, intent) in intents.iter().cycle().take(max_turns as usize).enumerate() {
                if state.phase.is_terminal() {
                    break;
                }
                let (next, directive) = apply_turn(
                    state,
                    input(*intent, &format!("ref-{}", i)),
                    week(0, 8, 5),
                    max_turns,
                );
                state = match directive {
                    Directive::Write { slot, booking_ref } => complete_booking(next, booking_ref, slot),
                    _ => next,
                };
            }
            if !intents.is_empty() || max_turns == 1 {
                prop_assert!(state.phase.is_terminal(), "still {:?} after {} turns", state.phase, state.turn_count);
            }
            prop_assert!(state.turn_count <= max_turns.max(1));
        }
    }
}
