use lazy_static::lazy_static;
use regex::Regex;

use super::dto::{LoginRequest, SignupRequest};
use crate::error::ApiError;

pub const PHONE_LEN: usize = 11;
pub const MIN_EMAIL_LEN: usize = 10;
pub const MIN_PASSWORD_LEN: usize = 6;
pub const MIN_NAME_LEN: usize = 3;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub struct ValidSignup {
    pub name: String,
    pub phone: String,
    pub email: String,
    pub password: String,
}

pub struct ValidLogin {
    pub identifier: String,
    pub password: String,
}

fn required(value: Option<String>, message: &str) -> Result<String, ApiError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::bad_request(message))
}

pub fn validate_signup(req: SignupRequest) -> Result<ValidSignup, ApiError> {
    let name = required(req.name, "Name is required")?;
    let phone = required(req.phone, "Phone is required")?;
    let email = required(req.email, "Email is required")?;
    let password = required(req.password, "Password is required")?;

    if phone.chars().count() != PHONE_LEN {
        return Err(ApiError::bad_request("Phone number must be 11 digits"));
    }
    if email.chars().count() < MIN_EMAIL_LEN {
        return Err(ApiError::bad_request("Email must be at least 10 characters"));
    }
    if !is_valid_email(&email) {
        return Err(ApiError::bad_request("Invalid email"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request("Password must be at least 6 characters"));
    }
    if name.chars().count() < MIN_NAME_LEN {
        return Err(ApiError::bad_request("Name must be at least 3 characters"));
    }

    Ok(ValidSignup {
        name,
        phone,
        email,
        password,
    })
}

pub fn validate_login(req: LoginRequest) -> Result<ValidLogin, ApiError> {
    let identifier = required(req.identifier, "Email or Phone is required")?;
    let password = required(req.password, "Password is required")?;
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request("Password must be at least 6 characters"));
    }
    Ok(ValidLogin {
        identifier,
        password,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jane() -> SignupRequest {
        SignupRequest {
            name: Some("Jane Doe".into()),
            phone: Some("12345678901".into()),
            email: Some("jane@example.com".into()),
            password: Some("secret1".into()),
        }
    }

    fn message(err: ApiError) -> String {
        err.to_string()
    }

    #[test]
    fn accepts_well_formed_signup() {
        let ok = validate_signup(jane()).unwrap();
        assert_eq!(ok.phone, "12345678901");
    }

    #[test]
    fn rejects_each_bad_signup_field() {
        let mut req = jane();
        req.name = None;
        assert_eq!(message(validate_signup(req).err().unwrap()), "Name is required");

        let mut req = jane();
        req.phone = Some("123".into());
        assert_eq!(
            message(validate_signup(req).err().unwrap()),
            "Phone number must be 11 digits"
        );

        let mut req = jane();
        req.email = Some("a@b.co".into());
        assert_eq!(
            message(validate_signup(req).err().unwrap()),
            "Email must be at least 10 characters"
        );

        let mut req = jane();
        req.email = Some("not-an-email-address".into());
        assert_eq!(message(validate_signup(req).err().unwrap()), "Invalid email");

        let mut req = jane();
        req.password = Some("12345".into());
        assert_eq!(
            message(validate_signup(req).err().unwrap()),
            "Password must be at least 6 characters"
        );

        let mut req = jane();
        req.name = Some("Jo".into());
        assert_eq!(
            message(validate_signup(req).err().unwrap()),
            "Name must be at least 3 characters"
        );
    }

    #[test]
    fn login_requires_identifier_and_password() {
        let err = validate_login(LoginRequest::default()).err().unwrap();
        assert_eq!(message(err), "Email or Phone is required");

        let err = validate_login(LoginRequest {
            identifier: Some("jane@example.com".into()),
            password: None,
        })
        .err()
        .unwrap();
        assert_eq!(message(err), "Password is required");
    }

    #[test]
    fn email_regex() {
        assert!(is_valid_email("jane@example.com"));
        assert!(!is_valid_email("jane@example"));
        assert!(!is_valid_email("jane doe@example.com"));
    }
}
