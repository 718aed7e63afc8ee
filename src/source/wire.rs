//! Lenient mapping from REST JSON to records.
//!
//! Field names drifted across API versions, so every field is looked up
//! through a list of candidate keys. Values that fail to parse become `None`;
//! only a missing id makes a record unusable.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{json, Map, Value};

use crate::models::{
    ActivityRecord, ActivityRef, NewUser, RegistrationRecord, Role, StudentProfile, StudentRef,
    UserRecord, ViewerRegistration,
};

use super::ActiveSessions;

/// Follows a dotted path such as `"vai_tro.ten_vt"`.
pub fn path<'a>(value: &'a Value, dotted: &str) -> Option<&'a Value> {
    dotted
        .split('.')
        .try_fold(value, |current, key| current.get(key))
        .filter(|v| !v.is_null())
}

pub fn first<'a>(value: &'a Value, candidates: &[&str]) -> Option<&'a Value> {
    candidates.iter().find_map(|key| path(value, key))
}

/// Strings and numbers as text; blank strings are treated as missing.
pub fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn text(value: &Value, candidates: &[&str]) -> Option<String> {
    candidates
        .iter()
        .find_map(|key| path(value, key).and_then(as_text))
}

pub fn as_f64(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', ".").parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|n| n.is_finite())
}

pub fn as_usize(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
        Value::String(s) => s.trim().parse::<usize>().ok(),
        _ => None,
    }
}

pub fn number(value: &Value, candidates: &[&str]) -> Option<f64> {
    candidates
        .iter()
        .find_map(|key| path(value, key).and_then(as_f64))
}

pub fn integer(value: &Value, candidates: &[&str]) -> Option<i64> {
    number(value, candidates).map(|n| n.round() as i64)
}

pub fn flag(value: &Value, candidates: &[&str]) -> Option<bool> {
    candidates.iter().find_map(|key| match path(value, key)? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    })
}

/// RFC 3339, naive date-times (read as UTC) with `T` or a space, or a bare
/// date at midnight.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

pub fn timestamp(value: &Value, candidates: &[&str]) -> Option<DateTime<Utc>> {
    candidates.iter().find_map(|key| match path(value, key)? {
        Value::String(s) => parse_timestamp(s),
        Value::Number(n) => n.as_i64().and_then(|ms| DateTime::from_timestamp_millis(ms)),
        _ => None,
    })
}

fn role(value: &Value) -> Option<Role> {
    text(
        value,
        &["vai_tro.ten_vt", "vai_tro", "role.name", "role", "ten_vt"],
    )
    .and_then(|raw| Role::normalize(&raw))
}

fn activity_type(value: &Value) -> Option<String> {
    text(
        value,
        &[
            "loai_hd.ten_loai_hd",
            "loai_hd",
            "loai_hoat_dong.ten_loai_hd",
            "loai",
            "type_name",
            "type",
        ],
    )
}

pub fn activity_from_value(value: &Value) -> Option<ActivityRecord> {
    let id = text(value, &["id", "hd_id", "ma_hd_id"])?;
    let title = text(value, &["ten_hd", "title", "name"]).unwrap_or_default();

    let raw_viewer = text(
        value,
        &["registration_status", "trang_thai_dk", "my_registration.trang_thai_dk"],
    );
    let mut viewer_status = ViewerRegistration::parse(raw_viewer.as_deref());
    if viewer_status == ViewerRegistration::None && flag(value, &["is_registered"]) == Some(true) {
        viewer_status = ViewerRegistration::Pending;
    }

    Some(ActivityRecord {
        id,
        title,
        code: text(value, &["ma_hd", "code"]),
        type_name: activity_type(value),
        starts_at: timestamp(value, &["ngay_bd", "start_date", "startDate"]),
        ends_at: timestamp(value, &["ngay_kt", "end_date", "endDate"]),
        registration_deadline: timestamp(value, &["han_dk", "han_dang_ky", "deadline"]),
        capacity: integer(value, &["sl_toi_da", "capacity", "max_participants"]),
        registered_count: integer(
            value,
            &["so_luong_dang_ky", "registered_count", "_count.dang_ky_hd"],
        ),
        points: number(value, &["diem_rl", "points"]),
        organizer: text(value, &["don_vi_to_chuc", "organizer", "nguoi_tao.ho_ten"]),
        status: text(value, &["trang_thai", "status"]).unwrap_or_default(),
        viewer_status,
        semester: text(value, &["hoc_ky", "semester"]),
        created_at: timestamp(value, &["ngay_tao", "createdAt", "created_at"]),
        updated_at: timestamp(value, &["ngay_cap_nhat", "updatedAt", "updated_at"]),
    })
}

pub fn registration_from_value(value: &Value) -> Option<RegistrationRecord> {
    let id = text(value, &["id", "dk_id"])?;
    let activity_json = first(value, &["hoat_dong", "activity"]);
    let student_json = first(value, &["sinh_vien", "student"]);

    let activity = activity_json
        .map(|a| ActivityRef {
            id: text(a, &["id", "hd_id"]),
            title: text(a, &["ten_hd", "title"]),
            code: text(a, &["ma_hd", "code"]),
            type_name: activity_type(a),
            points: number(a, &["diem_rl", "points"]),
            starts_at: timestamp(a, &["ngay_bd", "start_date"]),
        })
        .unwrap_or_else(|| ActivityRef {
            id: text(value, &["hd_id", "activity_id"]),
            ..ActivityRef::default()
        });

    let student = student_json
        .map(|s| StudentRef {
            id: text(s, &["id", "sv_id", "nguoi_dung.id"]),
            name: text(s, &["nguoi_dung.ho_ten", "ho_ten", "name"]),
            student_code: text(s, &["mssv", "ma_sv", "student_code"]),
            class_id: text(s, &["lop_id", "lop.id", "class_id"]),
            class_name: text(s, &["lop.ten_lop", "ten_lop", "class_name"]),
        })
        .unwrap_or_else(|| StudentRef {
            id: text(value, &["sv_id", "student_id"]),
            ..StudentRef::default()
        });

    Some(RegistrationRecord {
        id,
        activity,
        student,
        status: text(value, &["trang_thai_dk", "trang_thai", "status"]).unwrap_or_default(),
        registered_at: timestamp(value, &["ngay_dang_ky", "registered_at"]),
        approved_at: timestamp(value, &["ngay_duyet", "approved_at"]),
        updated_at: timestamp(value, &["updated_at", "updatedAt", "ngay_cap_nhat"]),
        created_at: timestamp(value, &["createdAt", "created_at", "ngay_tao"]),
        rejection_reason: text(value, &["ly_do_tu_choi", "rejection_reason"]),
        approver_role: first(value, &["nguoi_duyet"]).and_then(role),
    })
}

pub fn user_from_value(value: &Value) -> Option<UserRecord> {
    let id = text(value, &["id", "nguoi_dung_id"])?;

    let status = text(value, &["trang_thai", "status"]).map(|s| s.to_lowercase());
    let locked = status.as_deref().is_some_and(|s| s == "khoa" || s == "locked")
        || flag(value, &["khoa", "locked"]) == Some(true);

    let student = first(value, &["sinh_vien", "student"]).map(|s| StudentProfile {
        student_code: text(s, &["mssv", "ma_sv"]),
        class_id: text(s, &["lop_id", "lop.id"]),
        class_name: text(s, &["lop.ten_lop", "ten_lop"]),
        birth_date: text(s, &["ngay_sinh"])
            .and_then(|raw| parse_timestamp(&raw))
            .map(|dt| dt.date_naive()),
        gender: text(s, &["gt", "gioi_tinh"]),
        address: text(s, &["dia_chi"]),
        phone: text(s, &["sdt"]),
    });

    Some(UserRecord {
        id,
        display_name: text(value, &["ho_ten", "hoten", "name"]),
        login_name: text(value, &["ten_dn", "maso", "username"]),
        email: text(value, &["email"]),
        role: role(value),
        locked,
        active_now: false,
        created_at: timestamp(value, &["ngay_tao", "createdAt", "created_at"]),
        last_login_at: timestamp(value, &["lan_cuoi_dn", "last_login", "lastLogin"]),
        student,
    })
}

pub fn active_sessions_from_value(body: &Value) -> ActiveSessions {
    let data = body.get("data").filter(|d| d.is_object()).unwrap_or(body);
    let collect = |key: &str| {
        data.get(key)
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(as_text).collect())
            .unwrap_or_default()
    };
    let user_ids: std::collections::HashSet<String> = collect("userIds");
    let user_codes = collect("userCodes");
    let session_count = data
        .get("sessionCount")
        .and_then(as_usize)
        .unwrap_or(user_ids.len());
    ActiveSessions {
        user_ids,
        user_codes,
        session_count,
    }
}

/// Type names from `[{"ten_loai_hd": ..}]` or a list of strings.
pub fn activity_types_from_value(body: &Value) -> Vec<String> {
    let Some(raw) = super::envelope::unwrap_envelope(body, &["types", "loai_hd"]) else {
        return Vec::new();
    };
    let mut names: Vec<String> = raw
        .items
        .iter()
        .filter_map(|item| as_text(item).or_else(|| text(item, &["ten_loai_hd", "name"])))
        .collect();
    names.dedup();
    names
}

/// Request body for account creation.
pub fn new_user_body(user: &NewUser, role: Role) -> Value {
    let mut body = Map::new();
    body.insert("maso".into(), json!(user.login_name.trim()));
    body.insert("hoten".into(), json!(user.full_name.trim()));
    body.insert("email".into(), json!(user.email.trim()));
    body.insert("password".into(), json!(user.password));
    body.insert("role".into(), json!(role.code()));
    let optional = [
        ("mssv", &user.student_code),
        ("lop_id", &user.class_id),
        ("sdt", &user.phone),
        ("ngay_sinh", &user.birth_date),
        ("gt", &user.gender),
        ("dia_chi", &user.address),
    ];
    for (key, value) in optional {
        if let Some(value) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            body.insert(key.into(), json!(value));
        }
    }
    Value::Object(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps_accept_common_forms() {
        let expected = Utc.with_ymd_and_hms(2025, 3, 1, 7, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2025-03-01T07:30:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2025-03-01T14:30:00+07:00"), Some(expected));
        assert_eq!(parse_timestamp("2025-03-01 07:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2025-03-01T07:30:00.000"), Some(expected));
        assert_eq!(
            parse_timestamp("2025-03-01"),
            Some(Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_timestamp("01/03/2025"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn activity_fields_fall_back_across_names() {
        let value = json!({
            "id": 12,
            "ten_hd": "Hiến máu nhân đạo",
            "ma_hd": "HM-01",
            "loai_hd": { "ten_loai_hd": "Tình nguyện" },
            "ngay_bd": "2025-04-01T01:00:00Z",
            "han_dang_ky": "2025-03-25",
            "diem_rl": "5",
            "sl_toi_da": 100,
            "trang_thai": "da_duyet",
            "is_registered": true,
            "ngay_tao": "not a date"
        });
        let a = activity_from_value(&value).unwrap();
        assert_eq!(a.id, "12");
        assert_eq!(a.type_name.as_deref(), Some("Tình nguyện"));
        assert_eq!(a.points, Some(5.0));
        assert_eq!(a.capacity, Some(100));
        assert!(a.registration_deadline.is_some());
        assert_eq!(a.viewer_status, ViewerRegistration::Pending);
        assert_eq!(a.created_at, None);
    }

    #[test]
    fn activity_type_may_be_a_plain_string() {
        let a = activity_from_value(&json!({ "id": "a", "loai_hd": "Học thuật" })).unwrap();
        assert_eq!(a.type_name.as_deref(), Some("Học thuật"));
        assert!(activity_from_value(&json!({ "ten_hd": "no id" })).is_none());
    }

    #[test]
    fn registration_reads_nested_student_and_activity() {
        let value = json!({
            "id": "r1",
            "trang_thai_dk": "da_duyet",
            "ngay_dang_ky": "2025-03-01T00:00:00Z",
            "nguoi_duyet": { "vai_tro": { "ten_vt": "LOP_TRUONG" } },
            "hoat_dong": { "id": "a1", "ten_hd": "Seminar", "diem_rl": 3 },
            "sinh_vien": {
                "mssv": "2112345",
                "lop_id": "L1",
                "lop": { "ten_lop": "CTK45A" },
                "nguoi_dung": { "ho_ten": "Nguyễn Văn An" }
            }
        });
        let r = registration_from_value(&value).unwrap();
        assert_eq!(r.activity.title.as_deref(), Some("Seminar"));
        assert_eq!(r.activity.points, Some(3.0));
        assert_eq!(r.student.name.as_deref(), Some("Nguyễn Văn An"));
        assert_eq!(r.student.class_name.as_deref(), Some("CTK45A"));
        assert_eq!(r.approver_role, Some(Role::ClassMonitor));
    }

    #[test]
    fn user_lock_state_from_either_field() {
        let locked = user_from_value(&json!({ "id": 1, "trang_thai": "khoa" })).unwrap();
        assert!(locked.locked);
        let flagged = user_from_value(&json!({ "id": 2, "khoa": true })).unwrap();
        assert!(flagged.locked);
        let open = user_from_value(&json!({
            "id": 3,
            "vai_tro": { "ten_vt": "Sinh viên" },
            "sinh_vien": { "mssv": "2110001", "ngay_sinh": "2003-05-04" }
        }))
        .unwrap();
        assert!(!open.locked);
        assert_eq!(open.role, Some(Role::Student));
        assert_eq!(open.student_code(), Some("2110001"));
        assert_eq!(
            open.student.and_then(|s| s.birth_date),
            NaiveDate::from_ymd_opt(2003, 5, 4)
        );
    }

    #[test]
    fn active_sessions_default_count() {
        let sessions = active_sessions_from_value(&json!({
            "data": { "userIds": [1, "2"], "userCodes": ["2112345"] }
        }));
        assert_eq!(sessions.session_count, 2);
        assert!(sessions.user_ids.contains("1"));
        assert_eq!(sessions.identifiers().len(), 3);
    }

    #[test]
    fn new_user_body_skips_blank_optionals() {
        let form = NewUser {
            login_name: " gv001 ".to_string(),
            full_name: "Trần B".to_string(),
            email: "b@dlu.edu.vn".to_string(),
            password: "secret1".to_string(),
            role: "Giảng viên".to_string(),
            phone: Some(" ".to_string()),
            ..NewUser::default()
        };
        let body = new_user_body(&form, Role::Teacher);
        assert_eq!(body["maso"], "gv001");
        assert_eq!(body["role"], "GIANG_VIEN");
        assert!(body.get("sdt").is_none());
    }
}
