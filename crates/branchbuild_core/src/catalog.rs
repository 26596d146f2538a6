//! # Catalog
//!
//! Owns a [`Project`] together with the lookup maps the engine needs:
//!
//! - item id → location in the page tree (and owning group)
//! - group id → merged group entry (all layout fragments)
//! - group id → member item ids, in layout order
//!
//! The maps are derived once and rebuilt by [`Catalog::edit`] whenever the
//! project changes. Duplicate item ids resolve to the last declaration.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::project::{
    Currency, Group, GroupId, GroupRules, Item, ItemId, LayoutElement, Page, Project,
};

/// Where an item sits in the page tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Location {
    /// Page index, or `None` for legacy top-level groups.
    page: Option<usize>,
    /// Element index within the page layout (or the legacy group list).
    element: usize,
    /// Member index within the group, `None` for standalone items.
    member: Option<usize>,
}

/// One logical group, merged across its layout fragments.
#[derive(Clone, Debug, PartialEq)]
pub struct GroupEntry {
    /// Group identifier.
    pub id: GroupId,
    /// Title of the first fragment that declares one.
    pub title: Option<String>,
    /// Page index of the first fragment (`None` for legacy groups).
    pub page: Option<usize>,
    /// Load-time rules, taken from the first fragment that declares any.
    pub rules: Option<GroupRules>,
    /// Member item ids across all fragments, in layout order.
    pub members: Vec<ItemId>,
    /// Number of layout fragments sharing this id.
    pub fragments: usize,
}

impl GroupEntry {
    /// Authored `max_choices`, if any.
    #[must_use]
    pub fn max_choices(&self) -> Option<i64> {
        self.rules.as_ref().and_then(|r| r.max_choices)
    }
}

/// A project plus its derived lookup maps.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    project: Project,
    locations: HashMap<ItemId, Location>,
    item_order: Vec<ItemId>,
    item_groups: HashMap<ItemId, GroupId>,
    groups: Vec<GroupEntry>,
    group_index: HashMap<GroupId, usize>,
    duplicates: Vec<ItemId>,
}

impl Catalog {
    /// Indexes a project.
    #[must_use]
    pub fn new(project: Project) -> Self {
        let mut catalog = Self {
            project,
            ..Self::default()
        };
        catalog.rebuild();
        catalog
    }

    /// The underlying project.
    #[must_use]
    pub fn project(&self) -> &Project {
        &self.project
    }

    /// Consumes the catalog, returning the project.
    #[must_use]
    pub fn into_project(self) -> Project {
        self.project
    }

    /// Mutates the project in place and rebuilds every lookup map.
    pub fn edit<R>(&mut self, f: impl FnOnce(&mut Project) -> R) -> R {
        let out = f(&mut self.project);
        self.rebuild();
        out
    }

    fn rebuild(&mut self) {
        self.locations.clear();
        self.item_order.clear();
        self.item_groups.clear();
        self.groups.clear();
        self.group_index.clear();
        self.duplicates.clear();

        // Pass 1: locations (last declaration wins) and group shells.
        let mut visits: Vec<(ItemId, Location, Option<GroupId>)> = Vec::new();
        for (element, group) in self.project.groups.iter().enumerate() {
            Self::visit_group(&mut visits, &mut self.groups, &mut self.group_index, group, None, element);
        }
        for (page_idx, page) in self.project.pages.iter().enumerate() {
            for (element, el) in page.layout.iter().enumerate() {
                match el {
                    LayoutElement::Group(group) => Self::visit_group(
                        &mut visits,
                        &mut self.groups,
                        &mut self.group_index,
                        group,
                        Some(page_idx),
                        element,
                    ),
                    LayoutElement::Item(item) => visits.push((
                        item.id.clone(),
                        Location { page: Some(page_idx), element, member: None },
                        None,
                    )),
                    LayoutElement::Decoration(_) => {}
                }
            }
        }

        for (id, location, group) in &visits {
            if self.locations.insert(id.clone(), *location).is_some() {
                warn!(item = %id, "duplicate item id, last declaration wins");
                if !self.duplicates.contains(id) {
                    self.duplicates.push(id.clone());
                }
            } else {
                self.item_order.push(id.clone());
            }
            match group {
                Some(g) => {
                    self.item_groups.insert(id.clone(), g.clone());
                }
                None => {
                    self.item_groups.remove(id);
                }
            }
        }

        // Pass 2: membership, only for the winning declaration of each id.
        for (id, location, group) in visits {
            let Some(group_id) = group else { continue };
            if self.locations.get(&id) != Some(&location) {
                continue;
            }
            if let Some(&idx) = self.group_index.get(&group_id) {
                self.groups[idx].members.push(id);
            }
        }

        debug!(
            items = self.locations.len(),
            groups = self.groups.len(),
            currencies = self.project.points.len(),
            "catalog indexed"
        );
    }

    fn visit_group(
        visits: &mut Vec<(ItemId, Location, Option<GroupId>)>,
        groups: &mut Vec<GroupEntry>,
        group_index: &mut HashMap<GroupId, usize>,
        group: &Group,
        page: Option<usize>,
        element: usize,
    ) {
        match group_index.get(&group.id) {
            Some(&idx) => {
                let entry = &mut groups[idx];
                entry.fragments += 1;
                if entry.rules.is_none() {
                    entry.rules.clone_from(&group.rules);
                }
                if entry.title.is_none() {
                    entry.title.clone_from(&group.title);
                }
            }
            None => {
                group_index.insert(group.id.clone(), groups.len());
                groups.push(GroupEntry {
                    id: group.id.clone(),
                    title: group.title.clone(),
                    page,
                    rules: group.rules.clone(),
                    members: Vec::new(),
                    fragments: 1,
                });
            }
        }
        for (member, item) in group.items.iter().enumerate() {
            visits.push((
                item.id.clone(),
                Location { page, element, member: Some(member) },
                Some(group.id.clone()),
            ));
        }
    }

    fn resolve(&self, location: Location) -> Option<&Item> {
        let element = match location.page {
            Some(page) => match self.project.pages.get(page)?.layout.get(location.element)? {
                LayoutElement::Group(group) => return group.items.get(location.member?),
                LayoutElement::Item(item) => return Some(item),
                LayoutElement::Decoration(_) => return None,
            },
            None => self.project.groups.get(location.element)?,
        };
        element.items.get(location.member?)
    }

    /// Looks up an item by id.
    #[must_use]
    pub fn item(&self, id: &str) -> Option<&Item> {
        self.resolve(*self.locations.get(id)?)
    }

    /// Whether an item with this id exists.
    #[must_use]
    pub fn contains_item(&self, id: &str) -> bool {
        self.locations.contains_key(id)
    }

    /// Looks up a merged group by id.
    #[must_use]
    pub fn group(&self, id: &str) -> Option<&GroupEntry> {
        self.groups.get(*self.group_index.get(id)?)
    }

    /// The group owning an item, `None` for standalone or unknown items.
    #[must_use]
    pub fn group_for_item(&self, item_id: &str) -> Option<&GroupEntry> {
        self.group(self.item_groups.get(item_id)?)
    }

    /// The page an item sits on, `None` for legacy groups or unknown items.
    #[must_use]
    pub fn page_for_item(&self, item_id: &str) -> Option<&Page> {
        let page = self.locations.get(item_id)?.page?;
        self.project.pages.get(page)
    }

    /// Member items of a group, merged across fragments.
    #[must_use]
    pub fn items_in_group(&self, group_id: &str) -> Vec<&Item> {
        self.group(group_id)
            .map(|g| g.members.iter().filter_map(|id| self.item(id)).collect())
            .unwrap_or_default()
    }

    /// Every item, in declaration order.
    pub fn items(&self) -> impl Iterator<Item = &Item> + '_ {
        self.item_order.iter().filter_map(|id| self.item(id))
    }

    /// Every merged group, in declaration order.
    #[must_use]
    pub fn groups(&self) -> &[GroupEntry] {
        &self.groups
    }

    /// Currencies, in declaration order.
    #[must_use]
    pub fn currencies(&self) -> &[Currency] {
        &self.project.points
    }

    /// Looks up a currency by id.
    #[must_use]
    pub fn currency(&self, id: &str) -> Option<&Currency> {
        self.project.points.iter().find(|c| c.id == id)
    }

    /// Item ids declared more than once.
    #[must_use]
    pub fn duplicate_items(&self) -> &[ItemId] {
        &self.duplicates
    }

    /// Number of distinct items.
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.locations.len()
    }
}

impl From<Project> for Catalog {
    fn from(project: Project) -> Self {
        Self::new(project)
    }
}
