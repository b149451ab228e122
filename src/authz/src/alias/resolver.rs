//! Alias resolver with construction-time cycle detection

use std::collections::{HashMap, HashSet, VecDeque};
use thiserror::Error;
use tracing::debug;

/// Alias name -> implied actions
pub type AliasMap = HashMap<String, Vec<String>>;

/// Alias map errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AliasError {
    /// An alias expands back into itself
    #[error("Alias cycle detected for '{alias}': {path}")]
    CycleDetected { alias: String, path: String },

    /// The reserved any-action is used as an alias name or target
    #[error("Alias '{alias}' conflicts with reserved action '{reserved}'")]
    ReservedActionConflict { alias: String, reserved: String },

    /// Blank alias name or target, or an alias with no targets
    #[error("Invalid alias: {0}")]
    InvalidAlias(String),
}

/// One entry of the validation worklist
struct PathNode<'a> {
    action: &'a str,
    parent: Option<usize>,
}

/// Expands actions into the closure of actions they imply
///
/// Built once per engine. Expansion is a pure function of the alias map:
/// the original actions come first, then every newly discovered action in
/// breadth-first discovery order, without duplicates.
#[derive(Debug, Clone, Default)]
pub struct AliasResolver {
    aliases: AliasMap,
    validated: bool,
}

impl AliasResolver {
    /// Resolver with no aliases; expansion returns its input unchanged
    pub fn identity() -> Self {
        Self {
            aliases: AliasMap::new(),
            validated: true,
        }
    }

    /// Validate `aliases` against cycles and the reserved `any_action`
    ///
    /// # Errors
    ///
    /// - `ReservedActionConflict` if `any_action` is an alias name or target
    /// - `CycleDetected` if any alias expands back into an action already on
    ///   its own expansion path
    /// - `InvalidAlias` for blank names or empty target lists
    pub fn new(aliases: AliasMap, any_action: &str) -> Result<Self, AliasError> {
        // Sorted for deterministic error reporting
        let mut keys: Vec<&String> = aliases.keys().collect();
        keys.sort();

        for key in &keys {
            Self::check_entry(key, &aliases[key.as_str()], any_action)?;
        }

        for key in &keys {
            Self::detect_cycle(key, &aliases)?;
        }

        debug!("Validated {} action aliases", aliases.len());

        Ok(Self {
            aliases,
            validated: true,
        })
    }

    /// Build a resolver without validating the alias map
    ///
    /// Unlike an unbounded worklist, expansion here deduplicates and so
    /// terminates even on a cyclic map. That is the only protection: a cycle
    /// still makes every member imply every other, and an alias targeting the
    /// reserved any-action silently grants everything. Only use this for maps
    /// that were validated elsewhere.
    pub fn unchecked(aliases: AliasMap) -> Self {
        Self {
            aliases,
            validated: false,
        }
    }

    /// Expand a single action
    pub fn expand_one(&self, action: &str) -> Vec<String> {
        self.expand(&[action])
    }

    /// Expand a list of actions
    pub fn expand<S: AsRef<str>>(&self, actions: &[S]) -> Vec<String> {
        if self.aliases.is_empty() {
            return actions.iter().map(|a| a.as_ref().to_string()).collect();
        }

        let mut expanded: Vec<String> = Vec::with_capacity(actions.len());
        for action in actions {
            let action = action.as_ref();
            if !expanded.iter().any(|a| a == action) {
                expanded.push(action.to_string());
            }
        }

        let mut cursor = 0;
        while cursor < expanded.len() {
            if let Some(targets) = self.aliases.get(&expanded[cursor]) {
                for target in targets {
                    if !expanded.contains(target) {
                        expanded.push(target.clone());
                    }
                }
            }
            cursor += 1;
        }

        expanded
    }

    /// The alias map
    pub fn aliases(&self) -> &AliasMap {
        &self.aliases
    }

    /// Whether the map passed validation
    pub fn is_validated(&self) -> bool {
        self.validated
    }

    /// Whether no aliases are configured
    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    fn check_entry(alias: &str, targets: &[String], any_action: &str) -> Result<(), AliasError> {
        if alias.trim().is_empty() {
            return Err(AliasError::InvalidAlias("alias name cannot be blank".to_string()));
        }

        if alias == any_action {
            return Err(AliasError::ReservedActionConflict {
                alias: alias.to_string(),
                reserved: any_action.to_string(),
            });
        }

        if targets.is_empty() {
            return Err(AliasError::InvalidAlias(format!(
                "alias '{}' must have at least one target",
                alias
            )));
        }

        for target in targets {
            if target.trim().is_empty() {
                return Err(AliasError::InvalidAlias(format!(
                    "alias '{}' has a blank target",
                    alias
                )));
            }
            if target == any_action {
                return Err(AliasError::ReservedActionConflict {
                    alias: alias.to_string(),
                    reserved: any_action.to_string(),
                });
            }
        }

        Ok(())
    }

    /// Breadth-first expansion of `alias`, failing on the first target that
    /// is already on the path leading to it
    ///
    /// A target reached earlier through a different branch is not queued
    /// again, so diamonds (`a -> [b, c]`, `b -> d`, `c -> d`) are accepted.
    fn detect_cycle(alias: &str, aliases: &AliasMap) -> Result<(), AliasError> {
        let mut nodes = vec![PathNode {
            action: alias,
            parent: None,
        }];
        let mut discovered: HashSet<&str> = HashSet::from([alias]);
        let mut queue: VecDeque<usize> = VecDeque::from([0]);

        while let Some(current) = queue.pop_front() {
            let Some(targets) = aliases.get(nodes[current].action) else {
                continue;
            };

            for target in targets {
                if Self::on_path(&nodes, current, target) {
                    return Err(AliasError::CycleDetected {
                        alias: alias.to_string(),
                        path: Self::render_path(&nodes, current, target),
                    });
                }

                if discovered.insert(target.as_str()) {
                    nodes.push(PathNode {
                        action: target.as_str(),
                        parent: Some(current),
                    });
                    queue.push_back(nodes.len() - 1);
                }
            }
        }

        Ok(())
    }

    fn on_path(nodes: &[PathNode<'_>], mut current: usize, action: &str) -> bool {
        loop {
            if nodes[current].action == action {
                return true;
            }
            match nodes[current].parent {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    fn render_path(nodes: &[PathNode<'_>], mut current: usize, closing: &str) -> String {
        let mut path = vec![closing];
        loop {
            path.push(nodes[current].action);
            match nodes[current].parent {
                Some(parent) => current = parent,
                None => break,
            }
        }
        path.reverse();
        path.join(" -> ")
    }
}
