use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Some(Role::User),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// Verified identity attached to a session.
///
/// `role` is the canonical admin claim. On the wire the user also carries `isAdmin`,
/// always derived from `role`; older profile records that only have `isAdmin` are
/// still accepted when `role` is missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "UserWire", into = "UserWire")]
pub struct User {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    pub role: Role,
}

impl User {
    pub fn is_admin(&self) -> bool { self.role == Role::Admin }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserWire {
    uid: String,
    email: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    role: Option<Role>,
    #[serde(default)]
    is_admin: Option<bool>,
}

impl From<UserWire> for User {
    fn from(w: UserWire) -> Self {
        let role = match (w.role, w.is_admin) {
            (Some(role), _) => role,
            (None, Some(true)) => Role::Admin,
            (None, _) => Role::User,
        };
        User { uid: w.uid, email: w.email, display_name: w.display_name, role }
    }
}

impl From<User> for UserWire {
    fn from(u: User) -> Self {
        let is_admin = u.is_admin();
        UserWire { uid: u.uid, email: u.email, display_name: u.display_name, role: Some(u.role), is_admin: Some(is_admin) }
    }
}

/// Account as the identity provider reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub user: User,
    pub disabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_admin_is_derived_from_role() {
        let u = User { uid: "u1".into(), email: "a@b.lt".into(), display_name: None, role: Role::Admin };
        let v = serde_json::to_value(&u).unwrap();
        assert_eq!(v["role"], "admin");
        assert_eq!(v["isAdmin"], true);
        assert_eq!(v["displayName"], serde_json::Value::Null);
    }

    #[test]
    fn legacy_is_admin_only_records_still_load() {
        let u: User = serde_json::from_value(serde_json::json!({"uid":"u2","email":"x@y.lt","isAdmin":true})).unwrap();
        assert_eq!(u.role, Role::Admin);
        let u: User = serde_json::from_value(serde_json::json!({"uid":"u3","email":"x@y.lt"})).unwrap();
        assert_eq!(u.role, Role::User);
    }

    #[test]
    fn role_wins_over_stale_flag() {
        let u: User = serde_json::from_value(serde_json::json!({"uid":"u4","email":"x@y.lt","role":"user","isAdmin":true})).unwrap();
        assert_eq!(u.role, Role::User);
        assert!(!u.is_admin());
    }

    #[test]
    fn role_parse_is_case_insensitive() {
        assert_eq!(Role::parse(" Admin "), Some(Role::Admin));
        assert_eq!(Role::parse("user"), Some(Role::User));
        assert_eq!(Role::parse("owner"), None);
    }
}
