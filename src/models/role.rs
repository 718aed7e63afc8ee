use crate::pipeline::collation::fold_diacritics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Admin,
    Teacher,
    ClassMonitor,
    Student,
}

// Keys are folded: lowercase, no diacritics, separators collapsed to `_`.
const ROLE_TABLE: &[(&str, Role)] = &[
    ("admin", Role::Admin),
    ("administrator", Role::Admin),
    ("quan_tri", Role::Admin),
    ("quan_tri_vien", Role::Admin),
    ("qtv", Role::Admin),
    ("teacher", Role::Teacher),
    ("lecturer", Role::Teacher),
    ("giang_vien", Role::Teacher),
    ("giao_vien", Role::Teacher),
    ("gv", Role::Teacher),
    ("lop_truong", Role::ClassMonitor),
    ("lt", Role::ClassMonitor),
    ("monitor", Role::ClassMonitor),
    ("class_monitor", Role::ClassMonitor),
    ("classmonitor", Role::ClassMonitor),
    ("sinh_vien", Role::Student),
    ("sv", Role::Student),
    ("student", Role::Student),
];

impl Role {
    /// Maps any spelling of a role name the portal has used to a `Role`.
    pub fn normalize(raw: &str) -> Option<Role> {
        let key = fold_role_key(raw);
        if key.is_empty() {
            return None;
        }
        ROLE_TABLE
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, role)| *role)
    }

    /// Canonical code sent to the REST API.
    pub fn code(self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Teacher => "GIANG_VIEN",
            Role::ClassMonitor => "LOP_TRUONG",
            Role::Student => "SINH_VIEN",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Role::Admin => "Quản trị viên",
            Role::Teacher => "Giảng viên",
            Role::ClassMonitor => "Lớp trưởng",
            Role::Student => "Sinh viên",
        }
    }

    /// Roles that carry a student profile.
    pub fn is_student_like(self) -> bool {
        matches!(self, Role::Student | Role::ClassMonitor)
    }
}

fn fold_role_key(raw: &str) -> String {
    let folded = fold_diacritics(raw.trim());
    let mut out = String::with_capacity(folded.len());
    let mut pending_sep = false;
    for c in folded.chars() {
        if c.is_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(c);
        } else {
            pending_sep = true;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_known_spelling_normalizes() {
        let cases = [
            ("ADMIN", Role::Admin),
            ("Admin", Role::Admin),
            ("Quản trị viên", Role::Admin),
            ("GIANG_VIEN", Role::Teacher),
            ("Giảng viên", Role::Teacher),
            ("giảng-viên", Role::Teacher),
            ("GV", Role::Teacher),
            ("teacher", Role::Teacher),
            ("LOP_TRUONG", Role::ClassMonitor),
            ("Lớp trưởng", Role::ClassMonitor),
            ("LỚP_TRƯỞNG", Role::ClassMonitor),
            ("LT", Role::ClassMonitor),
            ("class monitor", Role::ClassMonitor),
            ("SINH_VIEN", Role::Student),
            ("Sinh viên", Role::Student),
            ("SINH_VIÊN", Role::Student),
            ("sv", Role::Student),
            ("  Student  ", Role::Student),
        ];
        for (raw, expected) in cases {
            assert_eq!(Role::normalize(raw), Some(expected), "input {raw:?}");
        }
    }

    #[test]
    fn unknown_roles_stay_unknown() {
        assert_eq!(Role::normalize(""), None);
        assert_eq!(Role::normalize("guest"), None);
        assert_eq!(Role::normalize("___"), None);
    }

    #[test]
    fn codes_round_trip() {
        for role in [Role::Admin, Role::Teacher, Role::ClassMonitor, Role::Student] {
            assert_eq!(Role::normalize(role.code()), Some(role));
            assert_eq!(Role::normalize(role.label()), Some(role));
        }
    }
}
