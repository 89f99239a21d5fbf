//! Per-client grouping of extracted actions (`actions_by_client.json`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::model::{ActionItem, Category, Priority};

/// File name → actions extracted from it (`all_actions.json`).
pub type AllActions = BTreeMap<String, Vec<ActionItem>>;

/// Client name → grouped actions.
pub type ActionsByClient = BTreeMap<String, ClientActions>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub name: String,
    pub total_actions: usize,
    pub high_priority: usize,
    pub medium_priority: usize,
    pub low_priority: usize,
}

/// One list per known category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryBuckets {
    pub support: Vec<ActionItem>,
    pub training: Vec<ActionItem>,
    pub documentation: Vec<ActionItem>,
    pub design: Vec<ActionItem>,
    pub communication: Vec<ActionItem>,
}

impl CategoryBuckets {
    fn bucket_mut(&mut self, category: &Category) -> Option<&mut Vec<ActionItem>> {
        match category {
            Category::Support => Some(&mut self.support),
            Category::Training => Some(&mut self.training),
            Category::Documentation => Some(&mut self.documentation),
            Category::Design => Some(&mut self.design),
            Category::Communication => Some(&mut self.communication),
            Category::Other(_) => None,
        }
    }

    /// Non-empty buckets as `(category, count)`.
    pub fn counts(&self) -> Vec<(&'static str, usize)> {
        [
            ("support", self.support.len()),
            ("training", self.training.len()),
            ("documentation", self.documentation.len()),
            ("design", self.design.len()),
            ("communication", self.communication.len()),
        ]
        .into_iter()
        .filter(|(_, n)| *n > 0)
        .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientActions {
    pub client_info: ClientInfo,
    pub categories: CategoryBuckets,
    pub all_actions: Vec<ActionItem>,
}

/// Group every action by its `client`. Totals count every action; priority
/// counters and category buckets only count known values, so an action
/// with an unrecognized category shows up in `all_actions` alone.
pub fn organize_by_client(all: &AllActions) -> ActionsByClient {
    let mut grouped = ActionsByClient::new();

    for item in all.values().flatten() {
        let entry = grouped
            .entry(item.client.clone())
            .or_insert_with(|| ClientActions {
                client_info: ClientInfo {
                    name: item.client.clone(),
                    ..Default::default()
                },
                ..Default::default()
            });

        entry.all_actions.push(item.clone());
        entry.client_info.total_actions += 1;

        match item.priority {
            Priority::High => entry.client_info.high_priority += 1,
            Priority::Medium => entry.client_info.medium_priority += 1,
            Priority::Low => entry.client_info.low_priority += 1,
            Priority::Other(_) => {}
        }

        if let Some(bucket) = entry.categories.bucket_mut(&item.category) {
            bucket.push(item.clone());
        }
    }

    grouped
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn item(client: &str, priority: Priority, category: Category) -> ActionItem {
        ActionItem {
            action: "do it".into(),
            reasoning: "because".into(),
            priority,
            category,
            client: client.into(),
            source_file: "summary_a.md".into(),
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn counts_per_priority_and_bucket() {
        let mut all = AllActions::new();
        all.insert(
            "summary_a.md".into(),
            vec![
                item("Acme", Priority::High, Category::Support),
                item("Acme", Priority::High, Category::Training),
                item("Acme", Priority::Low, Category::Support),
            ],
        );
        all.insert(
            "summary_b.md".into(),
            vec![item("Globex", Priority::Medium, Category::Design)],
        );

        let grouped = organize_by_client(&all);
        assert_eq!(grouped.len(), 2);

        let acme = &grouped["Acme"];
        assert_eq!(acme.client_info.name, "Acme");
        assert_eq!(acme.client_info.total_actions, 3);
        assert_eq!(acme.client_info.high_priority, 2);
        assert_eq!(acme.client_info.medium_priority, 0);
        assert_eq!(acme.client_info.low_priority, 1);
        assert_eq!(acme.categories.support.len(), 2);
        assert_eq!(acme.categories.counts(), vec![("support", 2), ("training", 1)]);

        assert_eq!(grouped["Globex"].categories.design.len(), 1);
    }

    #[test]
    fn unknown_values_are_only_in_all_actions() {
        let mut all = AllActions::new();
        all.insert(
            "summary_a.md".into(),
            vec![item(
                "Acme",
                Priority::Other("urgent".into()),
                Category::Other("billing".into()),
            )],
        );

        let acme = &organize_by_client(&all)["Acme"];
        assert_eq!(acme.client_info.total_actions, 1);
        assert_eq!(
            acme.client_info.high_priority
                + acme.client_info.medium_priority
                + acme.client_info.low_priority,
            0
        );
        assert!(acme.categories.counts().is_empty());
        assert_eq!(acme.all_actions.len(), 1);
    }

    #[test]
    fn serialized_shape() {
        let mut all = AllActions::new();
        all.insert("f.md".into(), vec![item("Acme", Priority::High, Category::Design)]);
        let value = serde_json::to_value(organize_by_client(&all)).unwrap();
        assert_eq!(value["Acme"]["client_info"]["high_priority"], 1);
        assert!(value["Acme"]["categories"]["communication"].as_array().unwrap().is_empty());
        assert_eq!(value["Acme"]["all_actions"][0]["category"], "design");
    }
}
