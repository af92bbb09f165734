//! Post-load validation over range views.
//!
//! Validation never panics and never stops at the first problem: every
//! check appends its failures to a shared [`ValidateResult`], so a single
//! pass over freshly loaded data reports everything that is wrong with it.

use std::fmt::{self, Debug, Display};
use std::hash::Hash;

use hashbrown::HashSet;
use tabula_core::{Record, Result};
use tabula_storage::RangeView;

/// One failed check, tagged with the record type it came from.
#[derive(Debug, Clone)]
pub struct FailedItem {
    element: &'static str,
    message: String,
    data: String,
}

impl FailedItem {
    pub fn element(&self) -> &'static str {
        self.element
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn data(&self) -> &str {
        &self.data
    }
}

impl Display for FailedItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.element, self.message, self.data)
    }
}

/// Accumulated validation failures.
#[derive(Debug, Default)]
pub struct ValidateResult {
    failures: Vec<FailedItem>,
}

impl ValidateResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_failed(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn failures(&self) -> &[FailedItem] {
        &self.failures
    }

    /// One failure per line, for logs and panic messages.
    pub fn format_failures(&self) -> String {
        let mut out = String::new();
        for (at, failure) in self.failures.iter().enumerate() {
            if at > 0 {
                out.push('\n');
            }
            out.push_str(&failure.to_string());
        }
        out
    }

    fn fail(&mut self, element: &'static str, message: impl Into<String>, data: impl Into<String>) {
        self.failures.push(FailedItem {
            element,
            message: message.into(),
            data: data.into(),
        });
    }
}

/// Runs checks over range views, accumulating failures.
///
/// The checks themselves return `Result` only because a view can go stale
/// under them; a failed check is recorded, not raised.
#[derive(Debug, Default)]
pub struct Validator {
    result: ValidateResult,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn result(&self) -> &ValidateResult {
        &self.result
    }

    pub fn into_result(self) -> ValidateResult {
        self.result
    }

    /// Records a failure for every record the predicate rejects.
    pub fn validate<S, V, F>(
        &mut self,
        view: &RangeView<S, V::Key, V>,
        predicate: F,
        message: &str,
    ) -> Result<()>
    where
        S: Ord + Clone + Debug,
        V: Record,
        F: Fn(&V) -> bool,
    {
        for item in view.iter() {
            let item = item?;
            if !predicate(&item) {
                self.result.fail(
                    V::element_name(),
                    message,
                    format!("{:?} (PK: {:?})", item, item.primary_key()),
                );
            }
        }
        Ok(())
    }

    /// Records a failure for every duplicate of the selected value.
    pub fn unique<S, V, T, F>(&mut self, view: &RangeView<S, V::Key, V>, selector: F) -> Result<()>
    where
        S: Ord + Clone + Debug,
        V: Record,
        T: Hash + Eq + Debug,
        F: Fn(&V) -> T,
    {
        let mut seen = HashSet::new();
        for item in view.iter() {
            let item = item?;
            let value = selector(&item);
            if !seen.insert(value) {
                self.result.fail(
                    V::element_name(),
                    "value must be unique",
                    format!("{:?} (PK: {:?})", item, item.primary_key()),
                );
            }
        }
        Ok(())
    }

    /// Checks that neighbouring secondary keys in the view follow each
    /// other, as defined by `successor`. With `allow_repeats` an equal
    /// neighbour is accepted alongside the successor.
    pub fn sequential<S, V, F>(
        &mut self,
        view: &RangeView<S, V::Key, V>,
        successor: F,
        allow_repeats: bool,
    ) -> Result<()>
    where
        S: Ord + Clone + Debug + PartialEq,
        V: Record,
        F: Fn(&S) -> S,
    {
        let len = view.len()?;
        for at in 1..len {
            let (previous, _) = view.keys_at(at - 1)?;
            let (current, primary) = view.keys_at(at)?;
            if allow_repeats && previous == current {
                continue;
            }
            if successor(&previous) != current {
                self.result.fail(
                    V::element_name(),
                    "keys are not sequential",
                    format!("{:?} follows {:?} (PK: {:?})", current, previous, primary),
                );
            }
        }
        Ok(())
    }

    /// Checks that every secondary key of `view` appears as a secondary
    /// key of `target`. A foreign-key check between two tables.
    pub fn exists<S, V, W>(
        &mut self,
        view: &RangeView<S, V::Key, V>,
        target: &RangeView<S, W::Key, W>,
    ) -> Result<()>
    where
        S: Ord + Clone + Debug,
        V: Record,
        W: Record,
    {
        let len = view.len()?;
        for at in 0..len {
            let (key, primary) = view.keys_at(at)?;
            if !target.contains_key(&key)? {
                self.result.fail(
                    V::element_name(),
                    "key does not exist in the target table",
                    format!("{:?} (PK: {:?})", key, primary),
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabula_storage::TableBuilder;

    #[derive(Clone, Debug, PartialEq)]
    struct Quest {
        id: u32,
        reward_id: u32,
        cost: i32,
    }

    impl Record for Quest {
        type Key = u32;

        fn primary_key(&self) -> u32 {
            self.id
        }

        fn element_name() -> &'static str {
            "Quest"
        }
    }

    #[derive(Clone, Debug, PartialEq)]
    struct Reward {
        id: u32,
    }

    impl Record for Reward {
        type Key = u32;

        fn primary_key(&self) -> u32 {
            self.id
        }

        fn element_name() -> &'static str {
            "Reward"
        }
    }

    fn quest(id: u32, reward_id: u32, cost: i32) -> Quest {
        Quest {
            id,
            reward_id,
            cost,
        }
    }

    fn quest_table(rows: Vec<Quest>) -> tabula_storage::Table<Quest> {
        let builder: TableBuilder<Quest> = TableBuilder::new("quests");
        builder.build(rows).unwrap()
    }

    #[test]
    fn test_validate_collects_predicate_failures() {
        let table = quest_table(vec![quest(1, 1, 10), quest(2, 1, -1), quest(3, 1, -5)]);
        let view = table.get_all_sorted(true).unwrap();

        let mut validator = Validator::new();
        validator
            .validate(&view, |q| q.cost >= 0, "cost must not be negative")
            .unwrap();

        let result = validator.into_result();
        assert!(result.is_failed());
        assert_eq!(result.failures().len(), 2);
        assert!(result.format_failures().contains("cost must not be negative"));
        assert!(result.format_failures().contains("Quest"));
    }

    #[test]
    fn test_unique_flags_duplicates_only() {
        let table = quest_table(vec![quest(1, 7, 0), quest(2, 7, 0), quest(3, 8, 0)]);
        let view = table.get_all_sorted(true).unwrap();

        let mut validator = Validator::new();
        validator.unique(&view, |q| q.reward_id).unwrap();

        assert_eq!(validator.result().failures().len(), 1);
    }

    #[test]
    fn test_sequential_reports_gaps() {
        let table = quest_table(vec![quest(1, 1, 0), quest(2, 1, 0), quest(5, 1, 0)]);
        let view = table.get_all_sorted(true).unwrap();

        let mut validator = Validator::new();
        validator.sequential(&view, |id| id + 1, false).unwrap();

        let result = validator.into_result();
        assert_eq!(result.failures().len(), 1);
        assert!(result.format_failures().contains("not sequential"));
    }

    #[test]
    fn test_sequential_allows_repeats_when_asked() {
        let mut builder: TableBuilder<Quest> = TableBuilder::new("quests");
        let by_reward = builder.index("reward", |q: &Quest| q.reward_id);
        let table = builder
            .build(vec![quest(1, 1, 0), quest(2, 1, 0), quest(3, 2, 0)])
            .unwrap();
        let view = table.get_all_sorted_by(&by_reward, true).unwrap();

        let mut validator = Validator::new();
        validator.sequential(&view, |id| id + 1, true).unwrap();
        assert!(!validator.result().is_failed());
    }

    #[test]
    fn test_exists_reports_dangling_references() {
        let mut quest_builder: TableBuilder<Quest> = TableBuilder::new("quests");
        let by_reward = quest_builder.index("reward", |q: &Quest| q.reward_id);
        let quests = quest_builder
            .build(vec![quest(1, 10, 0), quest(2, 11, 0), quest(3, 99, 0)])
            .unwrap();

        let rewards = {
            let builder: TableBuilder<Reward> = TableBuilder::new("rewards");
            builder
                .build(vec![Reward { id: 10 }, Reward { id: 11 }])
                .unwrap()
        };

        let referencing = quests.get_all_sorted_by(&by_reward, true).unwrap();
        let referenced = rewards.get_all_sorted(true).unwrap();

        let mut validator = Validator::new();
        validator.exists(&referencing, &referenced).unwrap();

        let result = validator.into_result();
        assert_eq!(result.failures().len(), 1);
        assert!(result.format_failures().contains("99"));
    }

    #[test]
    fn test_stale_view_surfaces_as_error() {
        let table = quest_table(vec![quest(1, 1, 0)]);
        let view = table.get_all_sorted(true).unwrap();
        table.insert(quest(2, 1, 0)).unwrap();

        let mut validator = Validator::new();
        let outcome = validator.validate(&view, |_| true, "unused");
        assert!(outcome.is_err());
    }
}
