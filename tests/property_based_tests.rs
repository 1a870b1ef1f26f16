use chrono::{TimeZone, Utc};
use kiorga_core::messaging::{envelope, queue_name_for_topic};
use kiorga_core::models::{Task, TaskPriority, TaskStatus};
use kiorga_core::validation::validate_task;
use proptest::prelude::*;

fn non_blank() -> impl Strategy<Value = String> {
    "[A-Za-z0-9][A-Za-z0-9 _-]{0,40}"
}

fn blank() -> impl Strategy<Value = String> {
    "[ \t\n]{0,8}"
}

fn declared_status() -> impl Strategy<Value = TaskStatus> {
    proptest::sample::select(TaskStatus::DECLARED.to_vec())
}

fn declared_priority() -> impl Strategy<Value = TaskPriority> {
    proptest::sample::select(TaskPriority::DECLARED.to_vec())
}

prop_compose! {
    fn valid_task()(
        task_id in non_blank(),
        title in non_blank(),
        description in non_blank(),
        status in declared_status(),
        priority in declared_priority(),
        creator in non_blank(),
        created_secs in 1i64..4_000_000_000,
    ) -> Task {
        Task {
            task_id,
            title,
            description,
            status,
            priority,
            creator_agent_id: creator,
            assigned_to_agent_id: None,
            created_at: Utc.timestamp_opt(created_secs, 0).single(),
            updated_at: None,
        }
    }
}

fn fields(task: &Task) -> Vec<String> {
    validate_task(task).into_iter().map(|e| e.field).collect()
}

proptest! {
    /// Property: Tasks built from declared values and non-blank text validate cleanly
    #[test]
    fn valid_tasks_have_no_errors(task in valid_task()) {
        prop_assert!(validate_task(&task).is_empty(), "unexpected errors for {:?}", task);
    }

    /// Property: A blank title is always reported, whatever else is set
    #[test]
    fn blank_title_is_always_reported(mut task in valid_task(), title in blank()) {
        task.title = title;
        prop_assert_eq!(fields(&task), vec!["title".to_string()]);
    }

    /// Property: Status numbers outside the declared set are reported
    #[test]
    fn undeclared_status_is_reported(mut task in valid_task(), number in 5i32..10_000) {
        task.status = TaskStatus::from_number(number);
        prop_assert_eq!(fields(&task), vec!["status".to_string()]);
    }

    /// Property: Every defect is reported, not just the first
    #[test]
    fn errors_accumulate(
        mut task in valid_task(),
        clear_title in any::<bool>(),
        clear_description in any::<bool>(),
        clear_creator in any::<bool>(),
        clear_created_at in any::<bool>(),
    ) {
        let mut expected = Vec::new();
        if clear_title {
            task.title.clear();
            expected.push("title");
        }
        if clear_description {
            task.description.clear();
            expected.push("description");
        }
        if clear_creator {
            task.creator_agent_id.clear();
            expected.push("creator_agent_id");
        }
        if clear_created_at {
            task.created_at = None;
            expected.push("created_at");
        }

        prop_assert_eq!(fields(&task), expected);
    }

    /// Property: The push envelope carries any payload text unchanged
    #[test]
    fn envelope_preserves_payload(payload in "\\PC{0,200}") {
        let decoded = envelope::decode(&envelope::wrap(&payload, None, None)).unwrap();
        prop_assert_eq!(decoded.payload, payload);
    }

    /// Property: Accepted queue names are short lowercase identifiers
    #[test]
    fn queue_names_are_identifiers(topic in "\\PC{0,60}") {
        if let Ok(name) = queue_name_for_topic(&topic) {
            prop_assert!(!name.is_empty() && name.len() <= 47);
            prop_assert!(name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'));
        }
    }
}

#[test]
fn known_topics_map_to_queue_names() {
    assert_eq!(queue_name_for_topic("lda-tasks").unwrap(), "lda_tasks");
    assert_eq!(queue_name_for_topic("final-reports").unwrap(), "final_reports");
    assert!(queue_name_for_topic("   ").is_err());
}
