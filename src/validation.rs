use crate::form::{FieldKind, Form};
use crate::util::is_valid_email;
use tracing::debug;

pub const PASSWORD_FIELD: &str = "password";
pub const CONFIRM_PASSWORD_FIELD: &str = "confirm_password";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    Required,
    InvalidEmail,
    PasswordMismatch,
}

impl ValidationError {
    pub fn message(self) -> &'static str {
        match self {
            ValidationError::Required => "This field is required",
            ValidationError::InvalidEmail => "Please enter a valid email address",
            ValidationError::PasswordMismatch => "Passwords do not match",
        }
    }
}

/// Inline error shown next to a field while it is invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub error: ValidationError,
    pub message: String,
}

impl Annotation {
    pub fn new(error: ValidationError) -> Self {
        Annotation {
            error,
            message: error.message().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldFailure {
    pub field: String,
    pub error: ValidationError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Valid,
    Invalid(Vec<FieldFailure>),
}

impl Verdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, Verdict::Valid)
    }

    pub fn failures(&self) -> &[FieldFailure] {
        match self {
            Verdict::Valid => &[],
            Verdict::Invalid(failures) => failures,
        }
    }
}

/// Runs every rule over the form, annotating each failing field. An
/// `Invalid` verdict means the submission must not go out.
pub fn validate(form: &mut Form) -> Verdict {
    form.clear_annotations();
    let mut failures = Vec::new();

    for field in form.fields() {
        if field.spec.required && field.value.value.trim().is_empty() {
            failures.push(FieldFailure {
                field: field.spec.name.clone(),
                error: ValidationError::Required,
            });
        }
    }

    for field in form.fields() {
        if field.spec.kind == FieldKind::Email {
            let value = &field.value.value;
            if !value.is_empty() && !is_valid_email(value) {
                failures.push(FieldFailure {
                    field: field.spec.name.clone(),
                    error: ValidationError::InvalidEmail,
                });
            }
        }
    }

    if let (Some(password), Some(confirm)) = (
        form.value(PASSWORD_FIELD),
        form.value(CONFIRM_PASSWORD_FIELD),
    ) {
        if password != confirm {
            failures.push(FieldFailure {
                field: CONFIRM_PASSWORD_FIELD.to_string(),
                error: ValidationError::PasswordMismatch,
            });
        }
    }

    for failure in &failures {
        form.annotate(&failure.field, Annotation::new(failure.error));
    }

    if failures.is_empty() {
        Verdict::Valid
    } else {
        debug!(form = form.storage_key(), failures = failures.len(), "form rejected");
        Verdict::Invalid(failures)
    }
}
