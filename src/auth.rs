use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Authenticated identity granted by the identity service after a
/// successful login or registration.
#[derive(Deserialize, Debug, Clone)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub token_type: String,
    pub user: UserProfile,
}

#[derive(Deserialize, Debug, Clone)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub name: String,
    pub created_at: String,
}

/// Remote-auth failures, classified by response status so the view layer
/// can render them directly.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Account not found. Please register first.")]
    AccountNotFound,
    #[error("This email is already registered. Please login instead.")]
    EmailTaken,
    #[error("{0}")]
    Rejected(String),
    #[error("Cannot connect to server. Please try again later.")]
    Unreachable,
    #[error("{detail}")]
    Server { status: u16, detail: String },
}

impl AuthError {
    /// Map a non-success response onto the error taxonomy. 400 bodies are
    /// inspected because the identity service reports duplicate
    /// registration with that status.
    pub fn classify(status: StatusCode, detail: &str) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => AuthError::InvalidCredentials,
            StatusCode::NOT_FOUND => AuthError::AccountNotFound,
            StatusCode::BAD_REQUEST => {
                if detail.contains("already registered") || detail.contains("already exists") {
                    AuthError::EmailTaken
                } else if detail.is_empty() {
                    AuthError::Rejected("Request rejected. Please check your information.".to_string())
                } else {
                    AuthError::Rejected(detail.to_string())
                }
            }
            _ => AuthError::Server {
                status: status.as_u16(),
                detail: if detail.is_empty() {
                    format!("Request failed with status {}", status.as_u16())
                } else {
                    detail.to_string()
                },
            },
        }
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RegisterRequest<'a> {
    name: &'a str,
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: String,
}

#[derive(Clone)]
pub struct AuthClient {
    client: Client,
    base_url: String,
}

impl AuthClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let url = format!("{}/api/auth/login", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&LoginRequest { email, password })
            .send()
            .await
            .map_err(|_| AuthError::Unreachable)?;

        Self::read_session(response).await
    }

    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        let url = format!("{}/api/auth/register", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&RegisterRequest { name, email, password })
            .send()
            .await
            .map_err(|_| AuthError::Unreachable)?;

        Self::read_session(response).await
    }

    /// Validate a remembered access token. Drives the initial session
    /// check behind "remember me".
    pub async fn me(&self, access_token: &str) -> Result<UserProfile, AuthError> {
        let url = format!("{}/api/auth/me", self.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|_| AuthError::Unreachable)?;

        let status = response.status();
        if status.is_success() {
            response.json::<UserProfile>().await.map_err(|_| AuthError::Server {
                status: status.as_u16(),
                detail: "Malformed response from server".to_string(),
            })
        } else {
            let detail = Self::read_detail(response).await;
            Err(AuthError::classify(status, &detail))
        }
    }

    async fn read_session(response: reqwest::Response) -> Result<Session, AuthError> {
        let status = response.status();
        if status.is_success() {
            response.json::<Session>().await.map_err(|_| AuthError::Server {
                status: status.as_u16(),
                detail: "Malformed response from server".to_string(),
            })
        } else {
            let detail = Self::read_detail(response).await;
            Err(AuthError::classify(status, &detail))
        }
    }

    async fn read_detail(response: reqwest::Response) -> String {
        response
            .json::<ErrorBody>()
            .await
            .map(|body| body.detail)
            .unwrap_or_default()
    }
}

/// Password strength on a 0-100 scale: fixed increments for length >= 8,
/// length >= 12, mixed case, and a digit.
pub fn password_strength(password: &str) -> u8 {
    let mut strength: u8 = 0;
    let len = password.chars().count();
    if len >= 8 {
        strength += 25;
    }
    if len >= 12 {
        strength += 25;
    }
    if password.chars().any(|c| c.is_lowercase()) && password.chars().any(|c| c.is_uppercase()) {
        strength += 25;
    }
    if password.chars().any(|c| c.is_ascii_digit()) {
        strength += 25;
    }
    strength.min(100)
}

pub fn strength_label(strength: u8) -> &'static str {
    if strength < 50 {
        "Weak password"
    } else if strength < 75 {
        "Medium password"
    } else {
        "Strong password"
    }
}

/// Login form validation, checked before any network call.
pub fn validate_login(email: &str, password: &str) -> Result<(), String> {
    if email.is_empty() || password.is_empty() {
        return Err("Please fill in all fields".to_string());
    }
    Ok(())
}

/// Registration form validation, checked before any network call.
pub fn validate_registration(
    name: &str,
    email: &str,
    password: &str,
    confirm: &str,
) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("Please enter your full name".to_string());
    }
    if name.trim().chars().count() < 2 {
        return Err("Name must be at least 2 characters long".to_string());
    }
    if email.is_empty() {
        return Err("Please enter your email address".to_string());
    }
    if password.chars().count() < 8 {
        return Err("Password must be at least 8 characters long".to_string());
    }
    if password != confirm {
        return Err("Passwords do not match".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_invalid_credentials() {
        let err = AuthError::classify(StatusCode::UNAUTHORIZED, "Invalid email or password");
        assert_eq!(err, AuthError::InvalidCredentials);
        assert_eq!(err.to_string(), "Invalid email or password");
    }

    #[test]
    fn test_classify_unknown_account() {
        let err = AuthError::classify(StatusCode::NOT_FOUND, "");
        assert_eq!(err, AuthError::AccountNotFound);
        assert_eq!(err.to_string(), "Account not found. Please register first.");
    }

    #[test]
    fn test_classify_duplicate_registration() {
        let err = AuthError::classify(StatusCode::BAD_REQUEST, "Email already registered");
        assert_eq!(err, AuthError::EmailTaken);

        let err = AuthError::classify(StatusCode::BAD_REQUEST, "account already exists");
        assert_eq!(err, AuthError::EmailTaken);
    }

    #[test]
    fn test_classify_other_bad_request_keeps_detail() {
        let err = AuthError::classify(StatusCode::BAD_REQUEST, "Password too common");
        assert_eq!(err, AuthError::Rejected("Password too common".to_string()));
        assert_eq!(err.to_string(), "Password too common");
    }

    #[test]
    fn test_classify_server_error() {
        let err = AuthError::classify(StatusCode::INTERNAL_SERVER_ERROR, "");
        assert_eq!(
            err,
            AuthError::Server {
                status: 500,
                detail: "Request failed with status 500".to_string()
            }
        );
    }

    #[test]
    fn test_password_strength_empty_is_zero() {
        assert_eq!(password_strength(""), 0);
        assert_eq!(password_strength("abc"), 0);
    }

    #[test]
    fn test_password_strength_increments() {
        assert_eq!(password_strength("aaaaaaaa"), 25); // length >= 8
        assert_eq!(password_strength("aaaaaaaaaaaa"), 50); // length >= 12
        assert_eq!(password_strength("aaaaAAAAaaaa"), 75); // + mixed case
        assert_eq!(password_strength("aaaaAAAA1234"), 100); // + digit
    }

    #[test]
    fn test_password_strength_monotonic_in_length() {
        let short = password_strength("Ab1defg"); // 7 chars
        let medium = password_strength("Ab1defgh"); // 8 chars
        let long = password_strength("Ab1defghijkl"); // 12 chars
        assert!(short <= medium);
        assert!(medium <= long);
    }

    #[test]
    fn test_password_strength_capped_at_hundred() {
        assert_eq!(password_strength("Aa1Aa1Aa1Aa1Aa1Aa1Aa1Aa1"), 100);
    }

    #[test]
    fn test_strength_labels() {
        assert_eq!(strength_label(25), "Weak password");
        assert_eq!(strength_label(50), "Medium password");
        assert_eq!(strength_label(75), "Strong password");
        assert_eq!(strength_label(100), "Strong password");
    }

    #[test]
    fn test_login_validation_requires_both_fields() {
        assert!(validate_login("user@example.com", "secret123").is_ok());
        assert_eq!(
            validate_login("", "secret123").unwrap_err(),
            "Please fill in all fields"
        );
        assert_eq!(
            validate_login("user@example.com", "").unwrap_err(),
            "Please fill in all fields"
        );
    }

    #[test]
    fn test_registration_validation_short_password() {
        let err = validate_registration("Priya", "priya@example.com", "abc", "abc").unwrap_err();
        assert_eq!(err, "Password must be at least 8 characters long");
    }

    #[test]
    fn test_registration_validation_order() {
        assert_eq!(
            validate_registration("", "a@b.c", "password1", "password1").unwrap_err(),
            "Please enter your full name"
        );
        assert_eq!(
            validate_registration("P", "a@b.c", "password1", "password1").unwrap_err(),
            "Name must be at least 2 characters long"
        );
        assert_eq!(
            validate_registration("Priya", "", "password1", "password1").unwrap_err(),
            "Please enter your email address"
        );
        assert_eq!(
            validate_registration("Priya", "a@b.c", "password1", "password2").unwrap_err(),
            "Passwords do not match"
        );
        assert!(validate_registration("Priya", "a@b.c", "password1", "password1").is_ok());
    }
}
