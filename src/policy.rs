use std::collections::HashMap;

use regex::Regex;

/// Login page. Unauthenticated and denied navigations are sent here.
pub const LOGIN_PATH: &str = "/login";

/// Role
///
/// The closed set of roles the LMS backend puts in its session claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Admin,
    Instructor,
    Student,
}

impl Role {
    /// Maps a raw role claim to a known role. Anything else is an unknown role.
    pub fn from_claim(claim: &str) -> Option<Role> {
        match claim.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Some(Role::Admin),
            "INSTRUCTOR" => Some(Role::Instructor),
            "STUDENT" => Some(Role::Student),
            _ => None,
        }
    }
}

/// RoutePolicy
///
/// Role to allowed-route table, compiled once at startup and shared read-only.
/// A role with no entry is allowed nowhere.
#[derive(Debug, Clone, Default)]
pub struct RoutePolicy {
    routes: HashMap<Role, Vec<Regex>>,
}

impl RoutePolicy {
    /// The admin console policy: administrators may enter the root page and
    /// everything under the dashboard.
    pub fn standard() -> Self {
        Self::default().allow(
            Role::Admin,
            vec![
                Regex::new(r"^/$").expect("static pattern"),
                Regex::new(r"^/dashboard(/.*)?$").expect("static pattern"),
            ],
        )
    }

    /// Builder step appending patterns for a role, in order.
    pub fn allow(mut self, role: Role, patterns: Vec<Regex>) -> Self {
        self.routes.entry(role).or_default().extend(patterns);
        self
    }

    /// Whether `role` may enter `path`. Unknown roles never may.
    pub fn allows(&self, role: Option<Role>, path: &str) -> bool {
        role.and_then(|role| self.routes.get(&role))
            .is_some_and(|patterns| patterns.iter().any(|pattern| pattern.is_match(path)))
    }
}

/// is_guarded
///
/// The fixed route matcher: the root page, `/dashboard` and anything nested under
/// it. All other paths bypass the session gate.
pub fn is_guarded(path: &str) -> bool {
    path == "/" || path == "/dashboard" || path.starts_with("/dashboard/")
}
