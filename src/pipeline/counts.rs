use super::{Category, ListConfig};

/// Per-bucket counts of a filtered set. Every known bucket is present, zero
/// included. Records whose category value maps to no bucket only add to
/// `total`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryCounts<C> {
    pub total: usize,
    pub by_category: Vec<(C, usize)>,
}

impl<C: Category> CategoryCounts<C> {
    pub fn get(&self, category: C) -> usize {
        self.by_category
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }

    pub fn get_key(&self, key: &str) -> usize {
        self.by_category
            .iter()
            .find(|(c, _)| c.key() == key)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }

    pub fn sum_known(&self) -> usize {
        self.by_category.iter().map(|(_, n)| n).sum()
    }

    pub fn unmapped(&self) -> usize {
        self.total - self.sum_known()
    }
}

pub fn count_categories<R: 'static, C: Category>(
    records: &[&R],
    config: &ListConfig<R, C>,
) -> CategoryCounts<C> {
    let mut by_category: Vec<(C, usize)> = config.categories.iter().map(|c| (*c, 0)).collect();
    for record in records {
        let Some(category) = config.category_of(record) else {
            continue;
        };
        if let Some(slot) = by_category.iter_mut().find(|(c, _)| *c == category) {
            slot.1 += 1;
        }
    }
    CategoryCounts {
        total: records.len(),
        by_category,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::registrations::tests::registration;
    use crate::models::RegistrationStatus;
    use crate::services::registrations_service::REGISTRATION_LIST;

    #[test]
    fn unknown_status_only_counts_towards_total() {
        let records = vec![
            registration("r1", "cho_duyet"),
            registration("r2", "unknown_value"),
            registration("r3", "da_tham_gia"),
        ];
        let refs: Vec<&_> = records.iter().collect();
        let counts = count_categories(&refs, &REGISTRATION_LIST);

        assert_eq!(counts.total, 3);
        assert_eq!(counts.sum_known(), 2);
        assert_eq!(counts.unmapped(), 1);
        assert_eq!(counts.get(RegistrationStatus::Rejected), 0);
        assert_eq!(counts.get_key("attended"), 1);
        assert_eq!(counts.by_category.len(), 4);
    }

    #[test]
    fn empty_input_lists_every_bucket() {
        let counts = count_categories(&[], &REGISTRATION_LIST);
        assert_eq!(counts.total, 0);
        assert!(counts.by_category.iter().all(|(_, n)| *n == 0));
        assert_eq!(counts.by_category.len(), RegistrationStatus::ALL.len());
    }
}
