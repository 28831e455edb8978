use super::user::User;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// No valid session.
    Anonymous,
    /// Signed in, but without the admin role.
    NotAdmin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Allow,
    Deny(DenyReason),
}

impl Gate {
    pub fn is_allowed(&self) -> bool { matches!(self, Gate::Allow) }
}

/// Admin-only gate. Only the canonical role is consulted; nothing else on the user
/// can grant access.
pub fn require_admin(user: Option<&User>) -> Gate {
    match user {
        None => Gate::Deny(DenyReason::Anonymous),
        Some(u) if u.is_admin() => Gate::Allow,
        Some(_) => Gate::Deny(DenyReason::NotAdmin),
    }
}

/// Login page URL that returns to `path` after signing in.
pub fn login_redirect(path: &str) -> String {
    format!("/login?redirect={}", urlencoding::encode(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Role;

    fn user(role: Role, display_name: Option<&str>) -> User {
        User { uid: "u".into(), email: "admin@example.com".into(), display_name: display_name.map(|s| s.to_string()), role }
    }

    #[test]
    fn anonymous_is_denied() {
        assert_eq!(require_admin(None), Gate::Deny(DenyReason::Anonymous));
    }

    #[test]
    fn only_admin_role_allows() {
        assert_eq!(require_admin(Some(&user(Role::Admin, None))), Gate::Allow);
        assert_eq!(require_admin(Some(&user(Role::User, None))), Gate::Deny(DenyReason::NotAdmin));
        // an admin-looking name or email grants nothing
        assert!(!require_admin(Some(&user(Role::User, Some("admin")))).is_allowed());
    }

    #[test]
    fn redirect_is_encoded() {
        assert_eq!(login_redirect("/admin"), "/login?redirect=%2Fadmin");
        assert_eq!(login_redirect("/admin/reviews?status=pending"), "/login?redirect=%2Fadmin%2Freviews%3Fstatus%3Dpending");
    }
}
