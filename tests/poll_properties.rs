//! Property-based tests for the poll state machine and keyboards
//!
//! These tests verify key invariants hold across arbitrary answer sequences.

use proptest::prelude::*;
use teacher_poll::dialogue::{PollState, Session, StateTag};
use teacher_poll::keyboard::render_question;
use teacher_poll::poll_model::{
    AnswerOptions, Category, CategoryPlan, PlannedQuestion, Question, RowLayout, SubjectRef,
};
use teacher_poll::state_machine::{transition, Effect, Event};

// ============================================================================
// Test Helpers
// ============================================================================

fn subject() -> SubjectRef {
    SubjectRef {
        teacher_n_group_id: 1,
        teacher_id: 1,
        group_id: 1,
        teacher_name: "Teacher".to_string(),
        teacher_photo: None,
        fixed_category: None,
    }
}

fn plan(category: Category, shapes: &[(AnswerOptions, bool)]) -> CategoryPlan {
    let questions = shapes
        .iter()
        .enumerate()
        .map(|(index, &(options, split_roles))| {
            let question = Question {
                id: index as i64 + 1,
                text: format!("Question {index}"),
                hint: String::new(),
                options,
                split_roles,
                categories: vec![category],
            };
            PlannedQuestion {
                layout: RowLayout::from_two_rows(question.requires_two_rows(category)),
                question,
            }
        })
        .collect();
    CategoryPlan {
        category,
        questions,
    }
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_options() -> impl Strategy<Value = AnswerOptions> {
    prop_oneof![Just(AnswerOptions::YesNo), Just(AnswerOptions::FivePoint)]
}

fn arb_category() -> impl Strategy<Value = Category> {
    prop_oneof![
        Just(Category::Lector),
        Just(Category::Practice),
        Just(Category::LectorPractice),
    ]
}

fn arb_shapes() -> impl Strategy<Value = Vec<(AnswerOptions, bool)>> {
    proptest::collection::vec((arb_options(), any::<bool>()), 1..6)
}

/// Raw taps; many of them point outside the poll
fn arb_taps() -> impl Strategy<Value = Vec<(i64, usize, u8)>> {
    proptest::collection::vec((0i64..8, 0usize..3, 0u8..6), 0..40)
}

proptest! {
    #[test]
    fn prop_open_answer_only_after_every_slot(
        category in arb_category(),
        shapes in arb_shapes(),
        taps in arb_taps(),
    ) {
        let waiting = Session {
            state: PollState::AwaitingTeacherType,
            ..Session::new(1, subject())
        };
        let mut session = transition(&waiting, Event::CategoryChosen(plan(category, &shapes)))
            .expect("category accepted")
            .session
            .expect("session kept");
        let mut prompts = 0;

        for (question_id, row, option) in taps {
            let before = session.clone();
            match transition(&session, Event::AnswerSelected { question_id, row, option: Some(option) }) {
                Ok(result) => {
                    prompts += result.effects.iter().filter(|e| **e == Effect::AskOpenAnswer).count();
                    session = result.session.expect("answers never finish the poll");
                }
                Err(_) => {
                    // Rejected taps leave the session untouched
                    prop_assert_eq!(&session, &before);
                }
            }

            let complete = session.answers().map(|a| a.is_complete()).unwrap_or(false);
            match session.state.tag() {
                StateTag::AwaitingOpenAnswer => prop_assert!(complete),
                StateTag::AnsweringQuestions => prop_assert!(!complete),
                other => prop_assert!(false, "unexpected state {}", other),
            }
        }

        // The open question is asked at most once
        prop_assert!(prompts <= 1);
    }

    #[test]
    fn prop_keyboard_marks_stored_values(
        options in arb_options(),
        split in any::<bool>(),
        values in proptest::collection::vec(proptest::option::of(0u8..5), 2),
    ) {
        let layout = RowLayout::from_two_rows(split);
        let mut answers = teacher_poll::poll_model::AnswerVector::new(options, layout);
        for (row, value) in values.iter().enumerate() {
            if let Some(value) = value {
                answers.set(row, *value);
            }
        }

        let grid = render_question(9, &answers);
        prop_assert_eq!(grid.len(), layout.rows());
        for (row, buttons) in grid.iter().enumerate() {
            let marked: Vec<_> = buttons.iter().filter(|b| b.selected).collect();
            match answers.slot(row).and_then(|slot| slot.value()) {
                Some(_) => prop_assert_eq!(marked.len(), 1),
                None => prop_assert!(marked.is_empty()),
            }
        }
    }
}
