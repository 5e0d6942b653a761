use std::collections::HashSet;

use crate::ynab::RemoteCategoryGroup;

pub const SYNCED_DESCRIPTION: &str = "Synced from YNAB";

pub const CATEGORY_PALETTE: [&str; 10] = [
    "#4e79a7", "#f28e2b", "#e15759", "#76b7b2", "#59a14f", "#edc948", "#b07aa1", "#ff9da7",
    "#9c755f", "#bab0ac",
];

const INTERNAL_GROUP_PREFIX: &str = "internal:";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlannedGroup {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlannedCategory {
    pub id: String,
    pub group_id: String,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlannedLocalCategory {
    pub name: String,
    pub color: &'static str,
}

/// Rows one successful sync writes for a user. Every planned category references a planned
/// group.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MirrorPlan {
    pub groups: Vec<PlannedGroup>,
    pub categories: Vec<PlannedCategory>,
    pub local_categories: Vec<PlannedLocalCategory>,
}

impl MirrorPlan {
    pub fn build(groups: &[RemoteCategoryGroup], clock_seed: u64) -> Self {
        let mut plan = MirrorPlan::default();

        let mut group_ids = HashSet::new();
        let mut category_ids = HashSet::new();
        let mut local_names = HashSet::new();

        let kept_groups = groups.iter().filter(|g| {
            !g.hidden && !g.deleted && !g.id.starts_with(INTERNAL_GROUP_PREFIX)
        });

        for group in kept_groups {
            if !group_ids.insert(group.id.as_str()) {
                continue;
            }

            plan.groups.push(PlannedGroup {
                id: group.id.clone(),
                name: group.name.clone(),
            });

            for category in group.categories.iter().filter(|c| !c.hidden && !c.deleted) {
                if !category_ids.insert(category.id.as_str()) {
                    continue;
                }

                plan.categories.push(PlannedCategory {
                    id: category.id.clone(),
                    group_id: group.id.clone(),
                    name: category.name.clone(),
                });

                if local_names.insert(category.name.as_str()) {
                    let position = plan.local_categories.len() as u64;
                    let color = CATEGORY_PALETTE
                        [((clock_seed + position) % CATEGORY_PALETTE.len() as u64) as usize];

                    plan.local_categories.push(PlannedLocalCategory {
                        name: category.name.clone(),
                        color,
                    });
                }
            }
        }

        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::ynab::RemoteCategory;

    fn category(id: &str, name: &str, hidden: bool, deleted: bool) -> RemoteCategory {
        RemoteCategory {
            id: String::from(id),
            name: String::from(name),
            hidden,
            deleted,
        }
    }

    fn group(
        id: &str,
        hidden: bool,
        deleted: bool,
        categories: Vec<RemoteCategory>,
    ) -> RemoteCategoryGroup {
        RemoteCategoryGroup {
            id: String::from(id),
            name: format!("Group {id}"),
            hidden,
            deleted,
            categories,
        }
    }

    #[test]
    fn test_filters_hidden_deleted_and_internal() {
        let groups = vec![
            group(
                "g1",
                false,
                false,
                vec![
                    category("c1", "Rent", false, false),
                    category("c2", "Old", true, false),
                    category("c3", "Gone", false, true),
                ],
            ),
            group("g2", true, false, vec![category("c4", "Hidden", false, false)]),
            group("g3", false, true, vec![category("c5", "Deleted", false, false)]),
            group(
                "internal:master",
                false,
                false,
                vec![category("c6", "Inflow", false, false)],
            ),
        ];

        let plan = MirrorPlan::build(&groups, 0);

        assert_eq!(
            plan.groups,
            vec![PlannedGroup {
                id: String::from("g1"),
                name: String::from("Group g1"),
            }]
        );
        assert_eq!(plan.categories.len(), 1);
        assert_eq!(plan.categories[0].id, "c1");
        assert_eq!(plan.categories[0].group_id, "g1");
        assert_eq!(plan.local_categories.len(), 1);
        assert_eq!(plan.local_categories[0].name, "Rent");
    }

    #[test]
    fn test_local_categories_first_name_wins() {
        let groups = vec![
            group("g1", false, false, vec![category("c1", "Fun", false, false)]),
            group(
                "g2",
                false,
                false,
                vec![
                    category("c2", "Fun", false, false),
                    category("c3", "Food", false, false),
                ],
            ),
        ];

        let plan = MirrorPlan::build(&groups, 9);

        assert_eq!(plan.categories.len(), 3);
        assert_eq!(plan.local_categories.len(), 2);
        assert_eq!(plan.local_categories[0].name, "Fun");
        assert_eq!(plan.local_categories[0].color, CATEGORY_PALETTE[9]);
        assert_eq!(plan.local_categories[1].name, "Food");
        assert_eq!(plan.local_categories[1].color, CATEGORY_PALETTE[0]);
    }

    #[test]
    fn test_every_category_references_a_planned_group() {
        let groups = vec![
            group("g1", false, false, vec![category("c1", "A", false, false)]),
            group("g1", false, false, vec![category("c2", "B", false, false)]),
            group("g2", false, false, vec![category("c1", "A", false, false)]),
        ];

        let plan = MirrorPlan::build(&groups, 0);

        assert_eq!(plan.groups.len(), 2);
        assert_eq!(plan.categories.len(), 1);
        for c in &plan.categories {
            assert!(plan.groups.iter().any(|g| g.id == c.group_id));
        }
    }
}
