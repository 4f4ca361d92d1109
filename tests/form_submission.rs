use taskdesk::form::{FieldKind, FieldSpec, Form};
use taskdesk::validation::{validate, ValidationError, Verdict};

fn task_form() -> Form {
    Form::new(
        Some("taskForm"),
        "Task",
        vec![
            FieldSpec::text("title", "Title").required(),
            FieldSpec::new("email", "Notify", FieldKind::Email),
            FieldSpec::text("notes", "Notes"),
        ],
    )
}

#[test]
fn empty_title_and_bad_email_block_submission() {
    let mut form = task_form();
    form.set_value("email", "bad");

    let verdict = validate(&mut form);

    assert!(!verdict.is_valid());
    let annotations: Vec<(String, String)> = form
        .annotations()
        .map(|(name, a)| (name.to_string(), a.message.clone()))
        .collect();
    assert_eq!(
        annotations,
        vec![
            ("title".to_string(), "This field is required".to_string()),
            (
                "email".to_string(),
                "Please enter a valid email address".to_string()
            ),
        ]
    );
}

#[test]
fn fixing_the_form_clears_previous_annotations() {
    let mut form = task_form();
    form.set_value("email", "bad");
    validate(&mut form);

    form.set_value("title", "Renew passport");
    form.set_value("email", "me@example.com");
    assert_eq!(validate(&mut form), Verdict::Valid);
    assert!(form.fields().iter().all(|f| !f.is_invalid()));
}

#[test]
fn unmarked_fields_are_never_checked() {
    let mut form = task_form();
    form.set_value("title", "x");
    form.set_value("notes", "   ");
    assert!(validate(&mut form).is_valid());
}

#[test]
fn email_without_dot_after_at_is_rejected() {
    let mut form = task_form();
    form.set_value("title", "x");
    for bad in ["user@host", "userhost.com", "us er@host.com"] {
        form.set_value("email", bad);
        let verdict = validate(&mut form);
        assert_eq!(
            verdict.failures().iter().map(|f| f.error).collect::<Vec<_>>(),
            vec![ValidationError::InvalidEmail],
            "{bad} should be rejected"
        );
    }
}
