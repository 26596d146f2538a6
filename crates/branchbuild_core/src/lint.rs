//! # Configuration Lint
//!
//! Static checks over a [`Catalog`] that catch content bugs before they
//! show up as silently rejected selections at runtime. Nothing here is
//! fatal; the engine tolerates every issue reported.
//!
//! Requirement cycles are found with a depth-first search over simple
//! item references (`a` requires `b` gives an edge `a -> b`).

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::catalog::Catalog;
use crate::requirement::RequirementRef;

/// A problem found in a project.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigIssue {
    /// An item id is declared more than once.
    DuplicateItem(String),
    /// A simple requirement names an unknown item.
    UnknownRequirement {
        /// Item declaring the requirement.
        item: String,
        /// Missing target.
        target: String,
    },
    /// An incompatibility names an unknown item.
    UnknownIncompatible {
        /// Item declaring the incompatibility.
        item: String,
        /// Missing target.
        target: String,
    },
    /// A `force_selection` effect names an unknown item.
    UnknownForceTarget {
        /// Item declaring the effect.
        item: String,
        /// Missing target.
        target: String,
    },
    /// A `modify_group_limit` effect names an unknown group.
    UnknownLimitGroup {
        /// Item declaring the effect.
        item: String,
        /// Missing group.
        group: String,
    },
    /// A cost entry names an unknown currency.
    UnknownCostCurrency {
        /// Item declaring the cost.
        item: String,
        /// Missing currency.
        currency: String,
    },
    /// A budget names an unknown currency.
    UnknownBudgetCurrency {
        /// Group declaring the budget.
        group: String,
        /// Missing currency.
        currency: String,
    },
    /// A budget's `applies_to` names an unknown group.
    UnknownBudgetGroup {
        /// Group declaring the budget.
        group: String,
        /// Missing sibling.
        target: String,
    },
    /// Items require each other in a loop and can never all be selected.
    RequirementCycle {
        /// The loop, first id repeated at the end.
        path: Vec<String>,
    },
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateItem(id) => write!(f, "item `{id}` is declared more than once"),
            Self::UnknownRequirement { item, target } => {
                write!(f, "item `{item}` requires unknown item `{target}`")
            }
            Self::UnknownIncompatible { item, target } => {
                write!(f, "item `{item}` is incompatible with unknown item `{target}`")
            }
            Self::UnknownForceTarget { item, target } => {
                write!(f, "item `{item}` forces unknown item `{target}`")
            }
            Self::UnknownLimitGroup { item, group } => {
                write!(f, "item `{item}` modifies the limit of unknown group `{group}`")
            }
            Self::UnknownCostCurrency { item, currency } => {
                write!(f, "item `{item}` costs unknown currency `{currency}`")
            }
            Self::UnknownBudgetCurrency { group, currency } => {
                write!(f, "group `{group}` budgets unknown currency `{currency}`")
            }
            Self::UnknownBudgetGroup { group, target } => {
                write!(f, "group `{group}` shares its budget with unknown group `{target}`")
            }
            Self::RequirementCycle { path } => {
                write!(f, "requirement cycle: {}", path.join(" -> "))
            }
        }
    }
}

impl Catalog {
    /// Runs every static check and returns the issues found.
    #[must_use]
    pub fn lint(&self) -> Vec<ConfigIssue> {
        let mut issues: Vec<ConfigIssue> = self
            .duplicate_items()
            .iter()
            .cloned()
            .map(ConfigIssue::DuplicateItem)
            .collect();

        for item in self.items() {
            for raw in &item.requirements {
                if let RequirementRef::Selected(target) | RequirementRef::NotSelected(target) =
                    RequirementRef::parse(raw)
                {
                    if !self.contains_item(target) {
                        issues.push(ConfigIssue::UnknownRequirement {
                            item: item.id.clone(),
                            target: target.to_string(),
                        });
                    }
                }
            }
            for target in &item.incompatible {
                if !self.contains_item(target) {
                    issues.push(ConfigIssue::UnknownIncompatible {
                        item: item.id.clone(),
                        target: target.clone(),
                    });
                }
            }
            for cost in &item.cost {
                if self.currency(&cost.currency).is_none() {
                    issues.push(ConfigIssue::UnknownCostCurrency {
                        item: item.id.clone(),
                        currency: cost.currency.clone(),
                    });
                }
            }
            for effect in &item.effects {
                match effect.effect_type.as_str() {
                    "force_selection" => {
                        if let Some(target) = &effect.target_id {
                            if !self.contains_item(target) {
                                issues.push(ConfigIssue::UnknownForceTarget {
                                    item: item.id.clone(),
                                    target: target.clone(),
                                });
                            }
                        }
                    }
                    "modify_group_limit" => {
                        if let Some(group) = &effect.group_id {
                            if self.group(group).is_none() {
                                issues.push(ConfigIssue::UnknownLimitGroup {
                                    item: item.id.clone(),
                                    group: group.clone(),
                                });
                            }
                        }
                    }
                    _ => {}
                }
            }
        }

        for group in self.groups() {
            let Some(budget) = group.rules.as_ref().and_then(|r| r.budget.as_ref()) else {
                continue;
            };
            if self.currency(&budget.currency).is_none() {
                issues.push(ConfigIssue::UnknownBudgetCurrency {
                    group: group.id.clone(),
                    currency: budget.currency.clone(),
                });
            }
            for target in &budget.applies_to {
                if self.group(target).is_none() {
                    issues.push(ConfigIssue::UnknownBudgetGroup {
                        group: group.id.clone(),
                        target: target.clone(),
                    });
                }
            }
        }

        issues.extend(self.requirement_cycles());
        issues
    }

    fn requirement_cycles(&self) -> Vec<ConfigIssue> {
        let mut edges: HashMap<&str, Vec<&str>> = HashMap::new();
        for item in self.items() {
            let targets = item
                .requirements
                .iter()
                .filter_map(|raw| match RequirementRef::parse(raw) {
                    RequirementRef::Selected(target) if target != item.id => Some(target),
                    _ => None,
                })
                .filter(|target| self.contains_item(target))
                .collect();
            edges.insert(item.id.as_str(), targets);
        }

        let mut visited: HashSet<&str> = HashSet::new();
        let mut cycles = Vec::new();
        for item in self.items() {
            if visited.contains(item.id.as_str()) {
                continue;
            }
            let mut on_stack = HashSet::new();
            let mut path = Vec::new();
            if let Some(cycle) = dfs_find_cycle(&edges, &item.id, &mut visited, &mut on_stack, &mut path) {
                cycles.push(ConfigIssue::RequirementCycle {
                    path: cycle.into_iter().map(str::to_string).collect(),
                });
            }
        }
        cycles
    }
}

fn dfs_find_cycle<'a>(
    edges: &HashMap<&'a str, Vec<&'a str>>,
    node: &'a str,
    visited: &mut HashSet<&'a str>,
    on_stack: &mut HashSet<&'a str>,
    path: &mut Vec<&'a str>,
) -> Option<Vec<&'a str>> {
    visited.insert(node);
    on_stack.insert(node);
    path.push(node);

    if let Some(targets) = edges.get(node) {
        for &next in targets {
            if !visited.contains(next) {
                if let Some(cycle) = dfs_find_cycle(edges, next, visited, on_stack, path) {
                    return Some(cycle);
                }
            } else if on_stack.contains(next) {
                let start = path.iter().position(|&id| id == next).unwrap_or(0);
                let mut cycle = path[start..].to_vec();
                cycle.push(next);
                return Some(cycle);
            }
        }
    }

    path.pop();
    on_stack.remove(node);
    None
}
