//! FILENAME: grid-engine/src/tree.rs
//! PURPOSE: Hierarchical (tree) view over rows with expand/collapse state.
//! CONTEXT: Nodes live in an arena (`Vec<TreeNode>`) and refer to each other
//! by index. The tree is built either from a nested children field on each
//! row or from a data-path accessor that implies synthetic parent nodes.
//! Expand/collapse only flips flags and re-flattens the display list; the
//! structure is rebuilt by `build_tree` alone.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::value::{Row, Value, DEFAULT_KEY_FIELD};
use crate::{log_debug, log_enter, log_exit, log_warn};

/// Separator between path segments in synthesized node keys.
pub const PATH_SEPARATOR: &str = "/";
/// Prefix of keys given to rows that have no usable row key.
pub const GENERATED_KEY_PREFIX: &str = "#";

/// Accessor returning a row's position in the hierarchy, root first.
#[derive(Clone)]
pub struct DataPath(Arc<dyn Fn(&Row) -> Vec<String> + Send + Sync>);

impl DataPath {
    pub fn new(f: impl Fn(&Row) -> Vec<String> + Send + Sync + 'static) -> Self {
        DataPath(Arc::new(f))
    }

    pub fn path(&self, row: &Row) -> Vec<String> {
        (self.0)(row)
    }
}

impl fmt::Debug for DataPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DataPath(..)")
    }
}

/// How rows are turned into a tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TreeConfig {
    /// Field holding nested child rows (used when no data path is set).
    pub child_field: String,
    /// `-1` expands everything, `0` collapses everything, `n` expands levels `0..n`.
    pub default_expanded: i32,
    pub key_field: String,
    #[serde(skip)]
    pub get_data_path: Option<DataPath>,
}

impl Default for TreeConfig {
    fn default() -> Self {
        TreeConfig {
            child_field: "children".to_string(),
            default_expanded: 0,
            key_field: DEFAULT_KEY_FIELD.to_string(),
            get_data_path: None,
        }
    }
}

impl TreeConfig {
    pub fn with_child_field(mut self, child_field: impl Into<String>) -> Self {
        self.child_field = child_field.into();
        self
    }

    pub fn with_data_path(mut self, data_path: DataPath) -> Self {
        self.get_data_path = Some(data_path);
        self
    }

    pub fn with_default_expanded(mut self, default_expanded: i32) -> Self {
        self.default_expanded = default_expanded;
        self
    }

    pub fn with_key_field(mut self, key_field: impl Into<String>) -> Self {
        self.key_field = key_field.into();
        self
    }

    fn expanded_at(&self, level: usize) -> bool {
        match self.default_expanded {
            d if d < 0 => true,
            d => level < d as usize,
        }
    }
}

/// One node of the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    pub key: String,
    /// Last path segment, or the key in children-field mode.
    pub label: String,
    /// Source row. Synthetic parents carry an empty row.
    pub row: Row,
    /// True for parents implied by a data path that no row filled.
    pub synthetic: bool,
    pub level: usize,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    /// Number of descendants with no children.
    pub leaf_count: usize,
    pub expanded: bool,
}

impl TreeNode {
    fn new(key: String, label: String, row: Row, level: usize, parent: Option<usize>) -> Self {
        TreeNode {
            key,
            label,
            row,
            synthetic: false,
            level,
            parent,
            children: Vec::new(),
            leaf_count: 0,
            expanded: false,
        }
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }
}

// ============================================================================
// TREE DATA
// ============================================================================

#[derive(Debug, Default)]
pub struct TreeData {
    config: TreeConfig,
    nodes: Vec<TreeNode>,
    roots: Vec<usize>,
    by_key: FxHashMap<String, usize>,
    display: Vec<usize>,
}

impl TreeData {
    pub fn new(config: TreeConfig) -> Self {
        TreeData {
            config,
            ..TreeData::default()
        }
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Replaces the configuration; takes effect on the next `build_tree`.
    pub fn set_config(&mut self, config: TreeConfig) {
        self.config = config;
    }

    /// Rebuilds the whole forest from rows.
    pub fn build_tree(&mut self, rows: &[Row]) {
        log_enter!("TREE", "build_tree", "rows={}", rows.len());
        self.nodes.clear();
        self.roots.clear();
        self.by_key.clear();

        match self.config.get_data_path.clone() {
            Some(data_path) => self.build_from_paths(rows, &data_path),
            None => {
                let mut reserved = FxHashSet::default();
                for row in rows {
                    self.collect_keys(row, &mut reserved);
                }
                for (i, row) in rows.iter().enumerate() {
                    self.add_nested(row, None, 0, &i.to_string(), &reserved);
                }
            }
        }

        self.compute_leaf_counts();
        for node in self.nodes.iter_mut() {
            node.expanded = self.config.expanded_at(node.level);
        }
        self.flatten();
        log_exit!(
            "TREE",
            "build_tree",
            "nodes={} roots={} visible={}",
            self.nodes.len(),
            self.roots.len(),
            self.display.len()
        );
    }

    fn push_node(&mut self, node: TreeNode) -> usize {
        let index = self.nodes.len();
        let parent = node.parent;
        self.by_key.insert(node.key.clone(), index);
        self.nodes.push(node);
        match parent {
            Some(p) => self.nodes[p].children.push(index),
            None => self.roots.push(index),
        }
        index
    }

    /// Every row key in a nested tree, children included.
    fn collect_keys(&self, row: &Row, out: &mut FxHashSet<String>) {
        if let Some(key) = row.key(&self.config.key_field) {
            out.insert(key.to_string());
        }
        if let Value::List(children) = row.value(&self.config.child_field) {
            for child in children {
                if let Value::Record(child_row) = child {
                    self.collect_keys(child_row, out);
                }
            }
        }
    }

    /// A key for a row without a usable row key. Never equal to any row key
    /// in the data or to a key already assigned.
    fn generated_key(&self, position: &str, reserved: &FxHashSet<String>) -> String {
        let mut key = format!("{}{}", GENERATED_KEY_PREFIX, position);
        let mut attempt = 1;
        while reserved.contains(&key) || self.by_key.contains_key(&key) {
            key = format!("{}{}~{}", GENERATED_KEY_PREFIX, position, attempt);
            attempt += 1;
        }
        key
    }

    /// Children-field mode: the key is the row key, or a generated key
    /// derived from the positional path.
    fn add_nested(
        &mut self,
        row: &Row,
        parent: Option<usize>,
        level: usize,
        position: &str,
        reserved: &FxHashSet<String>,
    ) {
        let mut own = row.clone();
        let nested = own.remove(&self.config.child_field);

        let key = match row.key(&self.config.key_field).map(|k| k.to_string()) {
            Some(k) if !self.by_key.contains_key(&k) => k,
            Some(k) => {
                let key = self.generated_key(position, reserved);
                log_warn!("TREE", "duplicate node key '{}', using '{}'", k, key);
                key
            }
            None => self.generated_key(position, reserved),
        };

        let node = TreeNode::new(key.clone(), key, own, level, parent);
        let index = self.push_node(node);

        if let Some(Value::List(children)) = nested {
            for (i, child) in children.iter().enumerate() {
                if let Value::Record(child_row) = child {
                    let child_position = format!("{}{}{}", position, PATH_SEPARATOR, i);
                    self.add_nested(child_row, Some(index), level + 1, &child_position, reserved);
                }
            }
        }
    }

    /// Data-path mode: each path prefix is a node; missing prefixes are synthesized.
    fn build_from_paths(&mut self, rows: &[Row], data_path: &DataPath) {
        for row in rows {
            let path = data_path.path(row);
            if path.is_empty() {
                continue;
            }

            let mut parent: Option<usize> = None;
            let mut key = String::new();
            for (level, segment) in path.iter().enumerate() {
                if level > 0 {
                    key.push_str(PATH_SEPARATOR);
                }
                key.push_str(segment);
                let is_last = level + 1 == path.len();

                let index = match self.by_key.get(&key).copied() {
                    Some(existing) => {
                        if is_last {
                            let node = &mut self.nodes[existing];
                            if node.synthetic {
                                node.row = row.clone();
                                node.synthetic = false;
                            } else {
                                log_warn!("TREE", "duplicate data path '{}', keeping first row", key);
                            }
                        }
                        existing
                    }
                    None => {
                        let mut node =
                            TreeNode::new(key.clone(), segment.clone(), Row::new(), level, parent);
                        if is_last {
                            node.row = row.clone();
                        } else {
                            node.synthetic = true;
                        }
                        self.push_node(node)
                    }
                };
                parent = Some(index);
            }
        }
    }

    /// Children always have larger indices than their parent, so one
    /// reverse pass is a bottom-up traversal.
    fn compute_leaf_counts(&mut self) {
        for i in (0..self.nodes.len()).rev() {
            let count = self.nodes[i]
                .children
                .iter()
                .map(|&c| {
                    let child = &self.nodes[c];
                    if child.has_children() {
                        child.leaf_count
                    } else {
                        1
                    }
                })
                .sum();
            self.nodes[i].leaf_count = count;
        }
    }

    fn flatten(&mut self) {
        fn walk(nodes: &[TreeNode], index: usize, out: &mut Vec<usize>) {
            out.push(index);
            if nodes[index].expanded {
                for &child in &nodes[index].children {
                    walk(nodes, child, out);
                }
            }
        }

        let mut display = Vec::with_capacity(self.nodes.len());
        for &root in &self.roots {
            walk(&self.nodes, root, &mut display);
        }
        self.display = display;
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    /// Visible nodes in display order.
    pub fn display_list(&self) -> Vec<&TreeNode> {
        self.display.iter().map(|&i| &self.nodes[i]).collect()
    }

    pub fn display_len(&self) -> usize {
        self.display.len()
    }

    pub fn get_node(&self, key: &str) -> Option<&TreeNode> {
        self.by_key.get(key).map(|&i| &self.nodes[i])
    }

    pub fn roots(&self) -> Vec<&TreeNode> {
        self.roots.iter().map(|&i| &self.nodes[i]).collect()
    }

    pub fn children_of(&self, key: &str) -> Vec<&TreeNode> {
        self.get_node(key)
            .map(|node| node.children.iter().map(|&c| &self.nodes[c]).collect())
            .unwrap_or_default()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    // ========================================================================
    // EXPAND / COLLAPSE
    // ========================================================================

    fn set_expanded(&mut self, key: &str, expanded: Option<bool>) -> bool {
        let Some(&index) = self.by_key.get(key) else {
            return false;
        };
        let node = &mut self.nodes[index];
        node.expanded = expanded.unwrap_or(!node.expanded);
        self.flatten();
        true
    }

    /// Returns false for unknown keys.
    pub fn expand_node(&mut self, key: &str) -> bool {
        self.set_expanded(key, Some(true))
    }

    pub fn collapse_node(&mut self, key: &str) -> bool {
        self.set_expanded(key, Some(false))
    }

    pub fn toggle_node(&mut self, key: &str) -> bool {
        self.set_expanded(key, None)
    }

    /// Expands every level, or only levels `0..depth` (deeper ones collapse).
    pub fn expand_all(&mut self, depth: Option<usize>) {
        for node in self.nodes.iter_mut() {
            node.expanded = depth.map_or(true, |d| node.level < d);
        }
        self.flatten();
    }

    pub fn collapse_all(&mut self) {
        for node in self.nodes.iter_mut() {
            node.expanded = false;
        }
        self.flatten();
    }

    // ========================================================================
    // FILTER / SORT
    // ========================================================================

    /// Nodes that match or have a matching descendant, with their ancestor
    /// chains, in tree order. Expansion state is ignored.
    pub fn filter_tree(&self, predicate: impl Fn(&TreeNode) -> bool) -> Vec<&TreeNode> {
        fn mark(nodes: &[TreeNode], index: usize, predicate: &dyn Fn(&TreeNode) -> bool, keep: &mut [bool]) -> bool {
            let mut hit = predicate(&nodes[index]);
            for &child in &nodes[index].children {
                // Every child must be visited so its own subtree gets marked
                hit |= mark(nodes, child, predicate, keep);
            }
            keep[index] = hit;
            hit
        }

        fn emit<'a>(nodes: &'a [TreeNode], index: usize, keep: &[bool], out: &mut Vec<&'a TreeNode>) {
            if !keep[index] {
                return;
            }
            out.push(&nodes[index]);
            for &child in &nodes[index].children {
                emit(nodes, child, keep, out);
            }
        }

        let mut keep = vec![false; self.nodes.len()];
        for &root in &self.roots {
            mark(&self.nodes, root, &predicate, &mut keep);
        }

        let mut out = Vec::new();
        for &root in &self.roots {
            emit(&self.nodes, root, &keep, &mut out);
        }
        log_debug!("TREE", "filter_tree kept {} of {} nodes", out.len(), self.nodes.len());
        out
    }

    /// Sorts siblings at every level in place, then re-flattens.
    pub fn sort_tree(&mut self, mut compare: impl FnMut(&TreeNode, &TreeNode) -> Ordering) {
        let mut roots = std::mem::take(&mut self.roots);
        roots.sort_by(|&a, &b| compare(&self.nodes[a], &self.nodes[b]));
        self.roots = roots;

        for i in 0..self.nodes.len() {
            let mut children = std::mem::take(&mut self.nodes[i].children);
            children.sort_by(|&a, &b| compare(&self.nodes[a], &self.nodes[b]));
            self.nodes[i].children = children;
        }
        self.flatten();
    }
}
