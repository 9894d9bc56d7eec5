//! Request validation.
//!
//! Constraint checks for registration and profile updates. Every violated
//! constraint is reported, not just the first one.

use chrono::{NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, FieldViolation, Result};
use crate::models::{RegisterUserRequest, UpdateProfileRequest};

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)*$",
    )
    .expect("email pattern is valid")
});

static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[1-9]\d{1,14}$").expect("phone pattern is valid"));

// Column widths of the users table.
const MAX_NAME_PART: usize = 30;
const MAX_CITY: usize = 26;
const MAX_JOB_FIELD: usize = 100;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn is_valid_email(email: &str) -> bool {
    email.len() <= 100 && EMAIL_RE.is_match(email)
}

pub fn is_valid_phone_number(phone: &str) -> bool {
    (10..=15).contains(&phone.len()) && PHONE_RE.is_match(phone)
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

fn char_len(value: &str) -> usize {
    value.chars().count()
}

/// Check a registration request against `today`.
pub fn check_registration(req: &RegisterUserRequest, today: NaiveDate) -> Vec<FieldViolation> {
    let mut violations = Vec::new();

    if is_blank(req.name.as_deref()) {
        violations.push(FieldViolation::new("name", "Full name is required"));
    }
    if let Some(name) = req.name.as_deref() {
        if name.split_whitespace().any(|part| char_len(part) > MAX_NAME_PART) {
            violations.push(FieldViolation::new(
                "name",
                "First and last name must be at most 30 characters each",
            ));
        }
    }

    if is_blank(req.email.as_deref()) {
        violations.push(FieldViolation::new("email", "Email is required"));
    }
    if let Some(email) = req.email.as_deref() {
        if !email.is_empty() && !is_valid_email(email) {
            violations.push(FieldViolation::new(
                "email",
                "Please provide a valid email address",
            ));
        }
    }

    if is_blank(req.password.as_deref()) {
        violations.push(FieldViolation::new("password", "Password is required"));
    }
    if let Some(password) = req.password.as_deref() {
        if char_len(password) < 8 {
            violations.push(FieldViolation::new(
                "password",
                "Password must be at least 8 characters long",
            ));
        }
    }

    match req.date_of_birth {
        None => violations.push(FieldViolation::new(
            "dateOfBirth",
            "Date of birth is required",
        )),
        Some(dob) if dob >= today => violations.push(FieldViolation::new(
            "dateOfBirth",
            "Date of birth must be in the past",
        )),
        Some(_) => {}
    }

    if req.role.is_none() {
        violations.push(FieldViolation::new("role", "Role is required"));
    }

    if is_blank(req.city.as_deref()) {
        violations.push(FieldViolation::new("city", "City is required"));
    }
    if let Some(city) = req.city.as_deref() {
        if char_len(city) > MAX_CITY {
            violations.push(FieldViolation::new(
                "city",
                "City must be at most 26 characters",
            ));
        }
    }

    if is_blank(req.state.as_deref()) {
        violations.push(FieldViolation::new("state", "State is required"));
    }
    if let Some(state) = req.state.as_deref() {
        if char_len(state) != 2 {
            violations.push(FieldViolation::new("state", "State must be 2 characters"));
        }
    }

    violations
}

pub fn check_profile_update(req: &UpdateProfileRequest) -> Vec<FieldViolation> {
    let mut violations = Vec::new();

    if let Some(username) = req.username.as_deref() {
        if !(3..=16).contains(&char_len(username)) {
            violations.push(FieldViolation::new(
                "username",
                "Username must be between 3 and 16 characters",
            ));
        }
    }

    if let Some(phone) = req.phone_number.as_deref() {
        if !is_valid_phone_number(phone) {
            violations.push(FieldViolation::new(
                "phoneNumber",
                "Please provide a valid phone number",
            ));
        }
    }

    if let Some(state) = req.state.as_deref() {
        if char_len(state) != 2 {
            violations.push(FieldViolation::new("state", "State must be 2 characters"));
        }
    }

    if let Some(city) = req.city.as_deref() {
        if char_len(city) > MAX_CITY {
            violations.push(FieldViolation::new(
                "city",
                "City must be at most 26 characters",
            ));
        }
    }

    if let Some(job_title) = req.job_title.as_deref() {
        if char_len(job_title) > MAX_JOB_FIELD {
            violations.push(FieldViolation::new(
                "jobTitle",
                "Job title must be at most 100 characters",
            ));
        }
    }

    if let Some(industry) = req.industry.as_deref() {
        if char_len(industry) > MAX_JOB_FIELD {
            violations.push(FieldViolation::new(
                "industry",
                "Industry must be at most 100 characters",
            ));
        }
    }

    if matches!(req.years_of_experience, Some(years) if years < 0) {
        violations.push(FieldViolation::new(
            "yearsOfExperience",
            "Years of experience cannot be negative",
        ));
    }

    violations
}

fn into_result(violations: Vec<FieldViolation>) -> Result<()> {
    if violations.is_empty() {
        Ok(())
    } else {
        Err(Error::InvalidFields(violations))
    }
}

impl Validate for RegisterUserRequest {
    fn validate(&self) -> Result<()> {
        into_result(check_registration(self, Utc::now().date_naive()))
    }
}

impl Validate for UpdateProfileRequest {
    fn validate(&self) -> Result<()> {
        into_result(check_profile_update(self))
    }
}
