use std::fmt;

use serde::{Deserialize, Serialize};

use super::daily_log::{DailyLog, WriteMode};

/// One of the three name lists owned by a daily log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Symptoms,
    Supplements,
    Foods,
}

impl Collection {
    pub const ALL: [Collection; 3] = [
        Collection::Symptoms,
        Collection::Supplements,
        Collection::Foods,
    ];

    pub fn table(self) -> &'static str {
        match self {
            Self::Symptoms => "symptoms",
            Self::Supplements => "supplements",
            Self::Foods => "foods",
        }
    }

    pub fn name_column(self) -> &'static str {
        match self {
            Self::Symptoms => "symptom_name",
            Self::Supplements => "supplement_name",
            Self::Foods => "food_name",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

/// The three child lists of a log, in stored order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildLists {
    #[serde(default)]
    pub symptoms: Vec<String>,
    #[serde(default)]
    pub supplements: Vec<String>,
    #[serde(default)]
    pub foods: Vec<String>,
}

impl ChildLists {
    pub fn get(&self, collection: Collection) -> &[String] {
        match collection {
            Collection::Symptoms => &self.symptoms,
            Collection::Supplements => &self.supplements,
            Collection::Foods => &self.foods,
        }
    }

    pub fn set(&mut self, collection: Collection, names: Vec<String>) {
        match collection {
            Collection::Symptoms => self.symptoms = names,
            Collection::Supplements => self.supplements = names,
            Collection::Foods => self.foods = names,
        }
    }
}

/// A daily log together with all of its child lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HydratedLog {
    #[serde(flatten)]
    pub log: DailyLog,
    #[serde(flatten)]
    pub lists: ChildLists,
}

/// Child lists supplied with a save. `None` means the list was not sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChildUpdate {
    pub symptoms: Option<Vec<String>>,
    pub supplements: Option<Vec<String>>,
    pub foods: Option<Vec<String>>,
}

impl ChildUpdate {
    fn get(&self, collection: Collection) -> Option<&Vec<String>> {
        match collection {
            Collection::Symptoms => self.symptoms.as_ref(),
            Collection::Supplements => self.supplements.as_ref(),
            Collection::Foods => self.foods.as_ref(),
        }
    }

    /// True when no list was supplied at all.
    pub fn is_empty(&self) -> bool {
        Collection::ALL.into_iter().all(|c| self.get(c).is_none())
    }

    /// Replacements a save performs. A `Replace` write clears every list it
    /// was not given; a `Merge` write only touches the lists it was given.
    pub fn replacements(&self, mode: WriteMode) -> Vec<(Collection, Vec<String>)> {
        Collection::ALL
            .into_iter()
            .filter_map(|c| match (self.get(c), mode) {
                (Some(names), _) => Some((c, names.clone())),
                (None, WriteMode::Replace) => Some((c, Vec::new())),
                (None, WriteMode::Merge) => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_mode_clears_missing_lists() {
        let update = ChildUpdate {
            foods: Some(vec!["Dairy".into(), "Dairy".into()]),
            ..Default::default()
        };
        let ops = update.replacements(WriteMode::Replace);
        assert_eq!(
            ops,
            vec![
                (Collection::Symptoms, vec![]),
                (Collection::Supplements, vec![]),
                (Collection::Foods, vec!["Dairy".to_string(), "Dairy".to_string()]),
            ]
        );
    }

    #[test]
    fn test_merge_mode_skips_missing_lists() {
        let update = ChildUpdate {
            symptoms: Some(vec![]),
            ..Default::default()
        };
        let ops = update.replacements(WriteMode::Merge);
        assert_eq!(ops, vec![(Collection::Symptoms, vec![])]);
    }

    #[test]
    fn test_collection_deserializes_from_path_segment() {
        let c: Collection = serde_json::from_str("\"supplements\"").unwrap();
        assert_eq!(c, Collection::Supplements);
        assert_eq!(c.name_column(), "supplement_name");
        assert_eq!(c.to_string(), "supplements");
    }
}
