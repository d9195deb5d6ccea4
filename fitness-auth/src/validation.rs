//! Request body validation.
//!
//! Each writable record implements [`Validate`], turning a JSON object into a
//! checked value or a [`FieldErrors`] map keyed by field name. Unknown keys
//! are ignored; write-once and server-managed fields are simply not read.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::db::{NewUser, ProfileChanges};

const REQUIRED: &str = "This field is required.";
const NOT_NULL: &str = "This field may not be null.";
const NOT_BLANK: &str = "This field may not be blank.";
const NOT_STRING: &str = "Not a valid string.";

pub const USERNAME_TAKEN: &str = "A user with that username already exists.";

static USERNAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\w.@+-]+$").unwrap_or_else(|e| panic!("username regex must be valid: {e}"))
});
static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$")
        .unwrap_or_else(|e| panic!("email regex must be valid: {e}"))
});

/// Validation failures keyed by field name, serialized as
/// `{"field": ["message", ...]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[cfg(test)]
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// `Ok(value)` when nothing was recorded, otherwise the collected errors.
    pub fn into_result<T>(self, value: T) -> Result<T, Self> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

pub trait Validate: Sized {
    fn validate(data: &Map<String, Value>) -> Result<Self, FieldErrors>;
}

/// Human name for a JSON value's type, used when the body is not an object.
pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

struct StringField {
    name: &'static str,
    required: bool,
    allow_blank: bool,
    max_len: usize,
    trim: bool,
}

impl StringField {
    const fn new(name: &'static str, max_len: usize) -> Self {
        Self {
            name,
            required: false,
            allow_blank: true,
            max_len,
            trim: true,
        }
    }

    const fn required(mut self) -> Self {
        self.required = true;
        self.allow_blank = false;
        self
    }

    const fn untrimmed(mut self) -> Self {
        self.trim = false;
        self
    }

    /// Returns `None` both when the field is absent and when it failed; the
    /// failure is recorded in `errors`.
    fn read(&self, data: &Map<String, Value>, errors: &mut FieldErrors) -> Option<String> {
        let raw = match data.get(self.name) {
            None => {
                if self.required {
                    errors.add(self.name, REQUIRED);
                }
                return None;
            }
            Some(Value::Null) => {
                errors.add(self.name, NOT_NULL);
                return None;
            }
            Some(Value::String(raw)) => raw.clone(),
            // Numbers are accepted and stored in their JSON spelling.
            Some(Value::Number(number)) => number.to_string(),
            Some(_) => {
                errors.add(self.name, NOT_STRING);
                return None;
            }
        };

        let value = if self.trim {
            raw.trim().to_string()
        } else {
            raw
        };

        if !self.allow_blank && value.trim().is_empty() {
            errors.add(self.name, NOT_BLANK);
            return None;
        }
        if value.chars().count() > self.max_len {
            errors.add(
                self.name,
                format!(
                    "Ensure this field has no more than {} characters.",
                    self.max_len
                ),
            );
            return None;
        }
        Some(value)
    }
}

const USERNAME: StringField = StringField::new("username", 150).required();
const EMAIL: StringField = StringField::new("email", 254).required();
const PASSWORD: StringField = StringField::new("password", 128).required().untrimmed();

const BIO: StringField = StringField::new("bio", 500);
const FITNESS_GOALS: StringField = StringField::new("fitness_goals", 500);
const PREFERRED_ACTIVITIES: StringField = StringField::new("preferred_activities", 255);
const AVATAR: StringField = StringField::new("avatar", 200);

impl Validate for NewUser {
    fn validate(data: &Map<String, Value>) -> Result<Self, FieldErrors> {
        let mut errors = FieldErrors::new();

        let username = read_username(data, &mut errors);

        let email = EMAIL.read(data, &mut errors);
        if let Some(email) = &email {
            if !EMAIL_RE.is_match(email) {
                errors.add(EMAIL.name, "Enter a valid email address.");
            }
        }

        let password = PASSWORD.read(data, &mut errors);

        match (username, email, password) {
            (Some(username), Some(email), Some(password)) => errors.into_result(NewUser {
                username,
                email,
                password,
            }),
            _ => Err(errors),
        }
    }
}

impl Validate for ProfileChanges {
    fn validate(data: &Map<String, Value>) -> Result<Self, FieldErrors> {
        let mut errors = FieldErrors::new();

        let changes = ProfileChanges {
            bio: BIO.read(data, &mut errors),
            fitness_goals: FITNESS_GOALS.read(data, &mut errors),
            preferred_activities: PREFERRED_ACTIVITIES.read(data, &mut errors),
            avatar: AVATAR.read(data, &mut errors),
        };

        if let Some(avatar) = &changes.avatar {
            if !avatar.is_empty() && !is_http_url(avatar) {
                errors.add(AVATAR.name, "Enter a valid URL.");
            }
        }

        errors.into_result(changes)
    }
}

fn read_username(data: &Map<String, Value>, errors: &mut FieldErrors) -> Option<String> {
    let username = USERNAME.read(data, errors)?;
    if !USERNAME_RE.is_match(&username) {
        errors.add(
            USERNAME.name,
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        );
        return None;
    }
    Some(username)
}

/// The submitted username when it passes the field rules on its own, so its
/// uniqueness can be checked even when other fields fail.
pub fn username_candidate(data: &Map<String, Value>) -> Option<String> {
    read_username(data, &mut FieldErrors::new())
}

fn is_http_url(value: &str) -> bool {
    let rest = value
        .strip_prefix("https://")
        .or_else(|| value.strip_prefix("http://"));
    match rest {
        Some(rest) => {
            let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
            !host.is_empty() && !rest.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use serde_json::{json, Map, Value};

    use super::{username_candidate, FieldErrors, Validate};
    use crate::db::{NewUser, ProfileChanges};

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("test payload must be an object"),
        }
    }

    #[test]
    fn new_user_accepts_valid_payload_and_trims() {
        let data = object(json!({
            "username": " runner.one ",
            "email": "runner@example.com",
            "password": " spaced pw ",
            "is_staff": true,
        }));

        let user = NewUser::validate(&data).unwrap();
        assert_eq!(user.username, "runner.one");
        assert_eq!(user.email, "runner@example.com");
        assert_eq!(user.password, " spaced pw ");
    }

    #[test]
    fn new_user_reports_every_missing_field() {
        let errors = NewUser::validate(&Map::new()).unwrap_err();

        for field in ["username", "email", "password"] {
            assert_eq!(
                errors.get(field),
                Some(&[String::from("This field is required.")][..]),
                "{field}"
            );
        }
    }

    #[test]
    fn new_user_rejects_bad_username_and_email() {
        let data = object(json!({
            "username": "no spaces allowed",
            "email": "not-an-email",
            "password": "pw",
        }));

        let errors = NewUser::validate(&data).unwrap_err();
        assert!(errors.get("username").is_some());
        assert_eq!(
            errors.get("email"),
            Some(&[String::from("Enter a valid email address.")][..])
        );
        assert!(errors.get("password").is_none());
    }

    #[test]
    fn new_user_rejects_blank_null_and_non_string() {
        let data = object(json!({
            "username": "   ",
            "email": null,
            "password": ["pw"],
        }));

        let errors = NewUser::validate(&data).unwrap_err();
        assert_eq!(
            errors.get("username"),
            Some(&[String::from("This field may not be blank.")][..])
        );
        assert_eq!(
            errors.get("email"),
            Some(&[String::from("This field may not be null.")][..])
        );
        assert_eq!(
            errors.get("password"),
            Some(&[String::from("Not a valid string.")][..])
        );
    }

    #[test]
    fn new_user_enforces_username_length() {
        let data = object(json!({
            "username": "a".repeat(151),
            "email": "a@example.com",
            "password": "pw",
        }));

        let errors = NewUser::validate(&data).unwrap_err();
        assert_eq!(
            errors.get("username"),
            Some(&[String::from("Ensure this field has no more than 150 characters.")][..])
        );
    }

    #[test]
    fn profile_changes_leave_absent_fields_unset() {
        let data = object(json!({ "bio": "Morning runs", "user_id": 7 }));

        let changes = ProfileChanges::validate(&data).unwrap();
        assert_eq!(
            changes,
            ProfileChanges {
                bio: Some(String::from("Morning runs")),
                ..Default::default()
            }
        );
    }

    #[test]
    fn profile_changes_allow_clearing_with_empty_string() {
        let data = object(json!({ "avatar": "", "fitness_goals": "" }));

        let changes = ProfileChanges::validate(&data).unwrap();
        assert_eq!(changes.avatar.as_deref(), Some(""));
        assert_eq!(changes.fitness_goals.as_deref(), Some(""));
    }

    #[test]
    fn profile_changes_reject_bad_avatar_and_long_activities() {
        let data = object(json!({
            "avatar": "ftp://example.com/me.png",
            "preferred_activities": "x".repeat(256),
        }));

        let errors = ProfileChanges::validate(&data).unwrap_err();
        assert_eq!(
            errors.get("avatar"),
            Some(&[String::from("Enter a valid URL.")][..])
        );
        assert!(errors.get("preferred_activities").is_some());
        assert!(errors.get("bio").is_none());
    }

    #[test]
    fn field_errors_serialize_keyed_by_field() {
        let mut errors = FieldErrors::single("username", "first");
        errors.add("username", "second");

        let value = serde_json::to_value(&errors).unwrap();
        assert_eq!(value, json!({ "username": ["first", "second"] }));
    }

    fn too_long(max: usize) -> Vec<String> {
        vec![format!("Ensure this field has no more than {max} characters.")]
    }

    #[test]
    fn new_user_enforces_email_length() {
        let local = "a".repeat(243);
        let at_limit = object(json!({
            "username": "runner",
            "email": format!("{local}@example.co"),
            "password": "pw",
        }));
        assert!(NewUser::validate(&at_limit).is_ok());

        let over = object(json!({
            "username": "runner",
            "email": format!("{local}@example.com"),
            "password": "pw",
        }));
        let errors = NewUser::validate(&over).unwrap_err();
        assert_eq!(errors.get("email"), Some(too_long(254).as_slice()));
    }

    #[test]
    fn profile_changes_enforce_length_limits() {
        let at_limit = object(json!({
            "bio": "b".repeat(500),
            "fitness_goals": "g".repeat(500),
            "preferred_activities": "p".repeat(255),
            "avatar": format!("https://example.com/{}", "a".repeat(180)),
        }));
        assert!(ProfileChanges::validate(&at_limit).is_ok());

        let over = object(json!({
            "bio": "b".repeat(501),
            "fitness_goals": "g".repeat(501),
            "avatar": format!("https://example.com/{}", "a".repeat(181)),
        }));
        let errors = ProfileChanges::validate(&over).unwrap_err();
        assert_eq!(errors.get("bio"), Some(too_long(500).as_slice()));
        assert_eq!(errors.get("fitness_goals"), Some(too_long(500).as_slice()));
        assert_eq!(errors.get("avatar"), Some(too_long(200).as_slice()));
        assert!(errors.get("preferred_activities").is_none());
    }

    #[test]
    fn numbers_are_accepted_in_their_json_spelling() {
        let data = object(json!({ "bio": 42, "fitness_goals": 5.5 }));

        let changes = ProfileChanges::validate(&data).unwrap();
        assert_eq!(changes.bio.as_deref(), Some("42"));
        assert_eq!(changes.fitness_goals.as_deref(), Some("5.5"));
    }

    #[test]
    fn booleans_and_objects_are_not_strings() {
        let data = object(json!({ "bio": true, "avatar": { "url": "https://example.com" } }));

        let errors = ProfileChanges::validate(&data).unwrap_err();
        assert_eq!(
            errors.get("bio"),
            Some(&[String::from("Not a valid string.")][..])
        );
        assert_eq!(
            errors.get("avatar"),
            Some(&[String::from("Not a valid string.")][..])
        );
    }

    #[test]
    fn username_candidate_requires_a_well_formed_username() {
        let ok = object(json!({ "username": " runner ", "email": "bad" }));
        assert_eq!(username_candidate(&ok).as_deref(), Some("runner"));

        let malformed = object(json!({ "username": "has space" }));
        assert_eq!(username_candidate(&malformed), None);
        assert_eq!(username_candidate(&Map::new()), None);
    }
}
