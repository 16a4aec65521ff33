use serde::{Deserialize, Serialize};

/// The signed-in user, as persisted under the `user` storage key.
///
/// Only `id` is required; a payload without one is not a user.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub role: i64,
    #[serde(default)]
    pub organization_id: Option<String>,
    #[serde(default)]
    pub is_active: bool,
}

impl UserProfile {
    /// Best available display name
    pub fn display_name(&self) -> String {
        if !self.full_name.trim().is_empty() {
            self.full_name.trim().to_string()
        } else {
            let joined = format!("{} {}", self.first_name, self.last_name);
            let joined = joined.trim();
            if joined.is_empty() {
                self.email.clone()
            } else {
                joined.to_string()
            }
        }
    }
}

/// Split a full name at the first run of whitespace.
///
/// `"Ana María Gómez"` becomes `("Ana", "María Gómez")`; a single word gets an
/// empty last name.
pub fn split_full_name(full_name: &str) -> (String, String) {
    let trimmed = full_name.trim();
    match trimmed.split_once(char::is_whitespace) {
        Some((first, rest)) => (first.to_string(), rest.trim_start().to_string()),
        None => (trimmed.to_string(), String::new()),
    }
}

#[derive(Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
}

impl std::fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("organization_id", &self.organization_id)
            .finish()
    }
}

/// The credential bundle: both tokens plus the user they belong to.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub user: Option<UserProfile>,
}

impl std::fmt::Debug for AuthResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthResponse")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("user", &self.user)
            .finish()
    }
}

/// Flat payload returned by the login and refresh endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LoginResponse {
    pub user_id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub role: i64,
    #[serde(default)]
    pub organization_id: Option<String>,
    pub access_token: String,
    pub refresh_token: String,
}

impl LoginResponse {
    /// Build the bundle, synthesizing first/last name from the full name.
    pub fn into_auth_response(self) -> AuthResponse {
        let (first_name, last_name) = split_full_name(&self.full_name);
        let user = UserProfile {
            id: self.user_id,
            email: self.email,
            full_name: self.full_name,
            first_name,
            last_name,
            role: self.role,
            organization_id: self.organization_id,
            is_active: true,
        };
        AuthResponse {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            user: Some(user),
        }
    }
}

/// Parse a refresh-token response.
///
/// The endpoint answers with the flat login shape; some deployments return
/// the nested `{accessToken, refreshToken, user}` bundle instead. Both are
/// accepted.
pub(crate) fn parse_token_response(value: serde_json::Value) -> Result<AuthResponse, serde_json::Error> {
    if value.get("userId").is_some() {
        let flat: LoginResponse = serde_json::from_value(value)?;
        Ok(flat.into_auth_response())
    } else {
        serde_json::from_value(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_split_full_name() {
        assert_eq!(split_full_name("Ana Gómez"), ("Ana".to_string(), "Gómez".to_string()));
        assert_eq!(
            split_full_name("Ana María  Gómez"),
            ("Ana".to_string(), "María  Gómez".to_string())
        );
        assert_eq!(split_full_name("Cher"), ("Cher".to_string(), String::new()));
        assert_eq!(split_full_name("Ana \t Gómez"), ("Ana".to_string(), "Gómez".to_string()));
        assert_eq!(split_full_name(""), (String::new(), String::new()));
    }

    #[test]
    fn test_login_response_synthesizes_profile() {
        let response: LoginResponse = serde_json::from_value(json!({
            "userId": "u1",
            "email": "a@b.com",
            "fullName": "Ana Gómez",
            "role": 2,
            "organizationId": "org1",
            "accessToken": "tok1",
            "refreshToken": "ref1"
        }))
        .unwrap();

        let bundle = response.into_auth_response();
        assert_eq!(bundle.access_token, "tok1");
        assert_eq!(bundle.refresh_token, "ref1");
        let user = bundle.user.unwrap();
        assert_eq!(user.id, "u1");
        assert_eq!(user.first_name, "Ana");
        assert_eq!(user.last_name, "Gómez");
        assert_eq!(user.role, 2);
        assert_eq!(user.organization_id.as_deref(), Some("org1"));
        assert!(user.is_active);
    }

    #[test]
    fn test_user_profile_json_is_camel_case() {
        let user = UserProfile {
            id: "u1".to_string(),
            full_name: "Ana Gómez".to_string(),
            ..Default::default()
        };
        let value = serde_json::to_value(&user).unwrap();
        assert_eq!(value["fullName"], "Ana Gómez");
        assert!(value.get("organizationId").is_some());
        assert!(value.get("full_name").is_none());
    }

    #[test]
    fn test_parse_token_response_both_shapes() {
        let flat = parse_token_response(json!({
            "userId": "u1", "fullName": "Ana Gómez", "accessToken": "a", "refreshToken": "r"
        }))
        .unwrap();
        assert_eq!(flat.user.unwrap().last_name, "Gómez");

        let nested = parse_token_response(json!({
            "accessToken": "tok2", "refreshToken": "ref2", "user": {"id": "u1", "email": "a@b.com"}
        }))
        .unwrap();
        assert_eq!(nested.access_token, "tok2");
        assert_eq!(nested.user.unwrap().email, "a@b.com");

        let bare = parse_token_response(json!({"accessToken": "t", "refreshToken": "r"})).unwrap();
        assert!(bare.user.is_none());

        assert!(parse_token_response(json!({"token": "t"})).is_err());
    }

    #[test]
    fn test_user_profile_requires_id() {
        assert!(serde_json::from_str::<UserProfile>("{}").is_err());
        assert!(serde_json::from_value::<UserProfile>(json!({"email": "a@b.com"})).is_err());

        let user: UserProfile = serde_json::from_value(json!({"id": "u1"})).unwrap();
        assert_eq!(user.id, "u1");
        assert!(!user.is_active);
    }

    #[test]
    fn test_secrets_not_in_debug_output() {
        let creds = Credentials::new("a@b.com", "secret1");
        assert!(!format!("{:?}", creds).contains("secret1"));

        let bundle = AuthResponse {
            access_token: "tok1".to_string(),
            refresh_token: "ref1".to_string(),
            user: None,
        };
        let debug = format!("{:?}", bundle);
        assert!(!debug.contains("tok1"));
        assert!(!debug.contains("ref1"));
    }

    #[test]
    fn test_display_name_fallbacks() {
        let mut user = UserProfile {
            email: "a@b.com".to_string(),
            ..Default::default()
        };
        assert_eq!(user.display_name(), "a@b.com");
        user.first_name = "Ana".to_string();
        assert_eq!(user.display_name(), "Ana");
        user.full_name = "Ana Gómez".to_string();
        assert_eq!(user.display_name(), "Ana Gómez");
    }
}
