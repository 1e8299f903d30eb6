use axum::http::Method;

use crate::models::user::UserRole;

/// What a caller needs to reach a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Authenticated,
    Roles(&'static [UserRole]),
}

impl Access {
    pub fn permits(&self, role: UserRole) -> bool {
        match self {
            Access::Public | Access::Authenticated => true,
            Access::Roles(roles) => roles.contains(&role),
        }
    }
}

const ADMIN: &[UserRole] = &[UserRole::Admin];
const STUDENT: &[UserRole] = &[UserRole::Student];
const STAFF: &[UserRole] = &[UserRole::Teacher, UserRole::Admin];

struct Rule {
    methods: &'static [&'static str],
    pattern: &'static str,
    access: Access,
}

const ANY: &[&str] = &[];
const GET: &[&str] = &["GET"];
const POST: &[&str] = &["POST"];
const PUT: &[&str] = &["PUT"];
const MUTATE: &[&str] = &["POST", "PUT", "PATCH", "DELETE"];

/// Checked top to bottom; the first matching rule decides. `*` matches one
/// path segment, a trailing `**` matches any remainder (including none).
static RULES: &[Rule] = &[
    Rule { methods: ANY, pattern: "/health", access: Access::Public },
    Rule { methods: ANY, pattern: "/api/auth/**", access: Access::Public },
    Rule { methods: GET, pattern: "/api/courses", access: Access::Public },
    Rule { methods: GET, pattern: "/api/courses/*", access: Access::Public },
    Rule { methods: GET, pattern: "/api/courses/*/preview", access: Access::Public },
    Rule { methods: GET, pattern: "/api/certificates/verify/*", access: Access::Public },
    Rule { methods: ANY, pattern: "/api/admin/**", access: Access::Roles(ADMIN) },
    Rule { methods: ANY, pattern: "/api/progress/**", access: Access::Roles(STUDENT) },
    Rule { methods: ANY, pattern: "/api/enrollments/**", access: Access::Roles(STUDENT) },
    Rule { methods: ANY, pattern: "/api/payments/**", access: Access::Roles(STUDENT) },
    Rule { methods: ANY, pattern: "/api/certificates/generate/**", access: Access::Roles(STUDENT) },
    Rule { methods: ANY, pattern: "/api/certificates/my", access: Access::Roles(STUDENT) },
    Rule { methods: POST, pattern: "/api/mcq/submit", access: Access::Roles(STUDENT) },
    Rule { methods: GET, pattern: "/api/mcq/*/submission", access: Access::Roles(STUDENT) },
    Rule { methods: POST, pattern: "/api/theory/*/submit", access: Access::Roles(STUDENT) },
    Rule { methods: GET, pattern: "/api/theory/*/submission", access: Access::Roles(STUDENT) },
    Rule { methods: GET, pattern: "/api/theory/task/*/submissions", access: Access::Roles(STAFF) },
    Rule { methods: PUT, pattern: "/api/theory/submission/*/review", access: Access::Roles(STAFF) },
    Rule { methods: POST, pattern: "/api/tasks/*/complete", access: Access::Roles(STUDENT) },
    Rule { methods: GET, pattern: "/api/courses/*/lessons", access: Access::Authenticated },
    Rule { methods: GET, pattern: "/api/courses/*/tasks", access: Access::Authenticated },
    Rule { methods: GET, pattern: "/api/courses/*/students", access: Access::Roles(STAFF) },
    Rule { methods: MUTATE, pattern: "/api/courses/**", access: Access::Roles(STAFF) },
    Rule { methods: MUTATE, pattern: "/api/tasks/**", access: Access::Roles(STAFF) },
    Rule { methods: ANY, pattern: "/api/teacher/**", access: Access::Roles(STAFF) },
    Rule { methods: ANY, pattern: "/api/upload/**", access: Access::Roles(STAFF) },
];

pub fn required_access(method: &Method, path: &str) -> Access {
    RULES
        .iter()
        .find(|rule| {
            (rule.methods.is_empty() || rule.methods.contains(&method.as_str()))
                && path_matches(rule.pattern, path)
        })
        .map(|rule| rule.access)
        .unwrap_or(Access::Authenticated)
}

fn path_matches(pattern: &str, path: &str) -> bool {
    let mut path_segments = path.trim_end_matches('/').split('/');

    for expected in pattern.split('/') {
        if expected == "**" {
            return true;
        }
        match path_segments.next() {
            Some(actual) if expected == "*" && !actual.is_empty() => {}
            Some(actual) if actual == expected => {}
            _ => return false,
        }
    }

    path_segments.next().is_none()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_matching() {
        assert!(path_matches("/api/courses", "/api/courses"));
        assert!(path_matches("/api/courses", "/api/courses/"));
        assert!(!path_matches("/api/courses", "/api/courses/1"));
        assert!(path_matches("/api/courses/*", "/api/courses/1"));
        assert!(!path_matches("/api/courses/*", "/api/courses/1/lessons"));
        assert!(path_matches("/api/auth/**", "/api/auth"));
        assert!(path_matches("/api/auth/**", "/api/auth/login"));
        assert!(path_matches("/api/auth/**", "/api/auth/verify-email/abc"));
        assert!(!path_matches("/api/auth/**", "/api/authors"));
        assert!(!path_matches("/api/courses/*/preview", "/api/courses//preview"));
    }

    #[test]
    fn test_public_allow_list() {
        assert_eq!(required_access(&Method::POST, "/api/auth/register"), Access::Public);
        assert_eq!(required_access(&Method::POST, "/api/auth/login"), Access::Public);
        assert_eq!(required_access(&Method::GET, "/api/courses"), Access::Public);
        assert_eq!(required_access(&Method::GET, "/api/courses/3/preview"), Access::Public);
        assert_eq!(
            required_access(&Method::GET, "/api/certificates/verify/CERT-1A2B3C4D"),
            Access::Public
        );
    }

    #[test]
    fn test_course_mutation_needs_staff() {
        assert_eq!(required_access(&Method::POST, "/api/courses"), Access::Roles(STAFF));
        assert_eq!(required_access(&Method::PUT, "/api/courses/1"), Access::Roles(STAFF));
        assert_eq!(required_access(&Method::DELETE, "/api/courses/1"), Access::Roles(STAFF));
        assert_eq!(
            required_access(&Method::POST, "/api/courses/1/lessons"),
            Access::Roles(STAFF)
        );
        assert_eq!(
            required_access(&Method::PUT, "/api/courses/1/lessons/2"),
            Access::Roles(STAFF)
        );
        assert_eq!(required_access(&Method::PUT, "/api/courses/1/publish"), Access::Roles(STAFF));
        assert_eq!(required_access(&Method::DELETE, "/api/tasks/9"), Access::Roles(STAFF));
    }

    #[test]
    fn test_student_routes() {
        for (method, path) in [
            (Method::POST, "/api/enrollments/4"),
            (Method::GET, "/api/enrollments/me"),
            (Method::GET, "/api/enrollments/4/check"),
            (Method::POST, "/api/progress/courses/1/lessons/2/complete"),
            (Method::GET, "/api/progress/courses/1"),
            (Method::POST, "/api/mcq/submit"),
            (Method::GET, "/api/mcq/5/submission"),
            (Method::POST, "/api/theory/5/submit"),
            (Method::POST, "/api/certificates/generate/1"),
            (Method::GET, "/api/certificates/my"),
            (Method::POST, "/api/payments/pay/1"),
            (Method::POST, "/api/tasks/3/complete"),
        ] {
            assert_eq!(required_access(&method, path), Access::Roles(STUDENT), "{method} {path}");
        }
    }

    #[test]
    fn test_authenticated_defaults() {
        assert_eq!(
            required_access(&Method::GET, "/api/courses/1/lessons"),
            Access::Authenticated
        );
        assert_eq!(required_access(&Method::GET, "/api/users/profile"), Access::Authenticated);
        assert_eq!(required_access(&Method::GET, "/api/notifications"), Access::Authenticated);
        assert_eq!(
            required_access(&Method::GET, "/api/theory/submission/1/download"),
            Access::Authenticated
        );
    }

    #[test]
    fn test_admin_routes() {
        assert_eq!(required_access(&Method::GET, "/api/admin/users"), Access::Roles(ADMIN));
        assert_eq!(
            required_access(&Method::POST, "/api/admin/create-teacher"),
            Access::Roles(ADMIN)
        );
        assert!(!Access::Roles(ADMIN).permits(UserRole::Teacher));
        assert!(Access::Roles(STAFF).permits(UserRole::Admin));
        assert!(Access::Authenticated.permits(UserRole::Student));
    }
}
