use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use super::collation::{collation_key, CollationKey};
use super::{Category, ListConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Newest,
    Oldest,
    NameAsc,
    NameDesc,
    PointsHigh,
    PointsLow,
}

impl SortKey {
    pub const ALL: [SortKey; 6] = [
        SortKey::Newest,
        SortKey::Oldest,
        SortKey::NameAsc,
        SortKey::NameDesc,
        SortKey::PointsHigh,
        SortKey::PointsLow,
    ];

    /// Unknown values fall back to newest first.
    pub fn parse(raw: &str) -> SortKey {
        match raw.trim().to_lowercase().as_str() {
            "oldest" => SortKey::Oldest,
            "name-az" | "name_az" => SortKey::NameAsc,
            "name-za" | "name_za" => SortKey::NameDesc,
            "points-high" | "points_high" => SortKey::PointsHigh,
            "points-low" | "points_low" => SortKey::PointsLow,
            _ => SortKey::Newest,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortKey::Newest => "newest",
            SortKey::Oldest => "oldest",
            SortKey::NameAsc => "name-az",
            SortKey::NameDesc => "name-za",
            SortKey::PointsHigh => "points-high",
            SortKey::PointsLow => "points-low",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SortKey::Newest => "Mới nhất",
            SortKey::Oldest => "Cũ nhất",
            SortKey::NameAsc => "Tên A-Z",
            SortKey::NameDesc => "Tên Z-A",
            SortKey::PointsHigh => "Điểm cao nhất",
            SortKey::PointsLow => "Điểm thấp nhất",
        }
    }
}

/// Stable sort of `records` by `key`. Records without a timestamp count as
/// the oldest; records without a name or points go last.
pub fn sort_records<R: 'static, C: Category>(
    records: &mut Vec<&R>,
    config: &ListConfig<R, C>,
    key: SortKey,
) {
    match key {
        SortKey::Newest | SortKey::Oldest => {
            let mut keyed: Vec<(Option<DateTime<Utc>>, &R)> = records
                .drain(..)
                .map(|record| (config.timestamp_of(record), record))
                .collect();
            // `None < Some(_)`, so missing timestamps already rank as oldest.
            if key == SortKey::Newest {
                keyed.sort_by(|a, b| b.0.cmp(&a.0));
            } else {
                keyed.sort_by(|a, b| a.0.cmp(&b.0));
            }
            records.extend(keyed.into_iter().map(|(_, record)| record));
        }
        SortKey::NameAsc | SortKey::NameDesc => {
            let mut keyed: Vec<(Option<CollationKey>, &R)> = records
                .drain(..)
                .map(|record| {
                    let name = (config.name_field)(record)
                        .map(str::trim)
                        .filter(|name| !name.is_empty());
                    (name.map(collation_key), record)
                })
                .collect();
            let descending = key == SortKey::NameDesc;
            keyed.sort_by(|a, b| last_if_missing(&a.0, &b.0, descending));
            records.extend(keyed.into_iter().map(|(_, record)| record));
        }
        SortKey::PointsHigh | SortKey::PointsLow => {
            let descending = key == SortKey::PointsHigh;
            records.sort_by(|a, b| {
                let pa = (config.facets)(a).points.filter(|p| p.is_finite());
                let pb = (config.facets)(b).points.filter(|p| p.is_finite());
                match (pa, pb) {
                    (Some(x), Some(y)) => {
                        let ord = x.total_cmp(&y);
                        if descending {
                            ord.reverse()
                        } else {
                            ord
                        }
                    }
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                }
            });
        }
    }
}

fn last_if_missing<T: Ord>(a: &Option<T>, b: &Option<T>, descending: bool) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => {
            if descending {
                y.cmp(x)
            } else {
                x.cmp(y)
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
