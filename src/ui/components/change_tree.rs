use crate::change::ChangeStatus;
use crate::tree::TreeNode;
use std::collections::HashSet;

/// One visible line of the change tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeRow {
    pub depth: usize,
    pub path: String,
    pub title: String,
    pub is_leaf: bool,
    pub expanded: bool,
    pub status: Option<ChangeStatus>,
}

/// Expansion and selection state for a tree that is rebuilt on every
/// refresh. State is keyed by path so it survives rebuilds.
#[derive(Debug, Default)]
pub struct ChangeTreeView {
    collapsed: HashSet<String>,
    selected: usize,
}

impl ChangeTreeView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visible_rows(&self, tree: &[TreeNode]) -> Vec<TreeRow> {
        let mut rows = Vec::new();
        self.push_rows(tree, 0, &mut rows);
        rows
    }

    fn push_rows(&self, nodes: &[TreeNode], depth: usize, rows: &mut Vec<TreeRow>) {
        for node in nodes {
            let expanded = !node.is_leaf() && !self.collapsed.contains(node.path());
            rows.push(TreeRow {
                depth,
                path: node.path().to_string(),
                title: node.title().to_string(),
                is_leaf: node.is_leaf(),
                expanded,
                status: node.status(),
            });
            if let (true, Some(children)) = (expanded, node.children()) {
                self.push_rows(children, depth + 1, rows);
            }
        }
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn selected_row(&self, tree: &[TreeNode]) -> Option<TreeRow> {
        self.visible_rows(tree).into_iter().nth(self.selected)
    }

    pub fn select_next(&mut self, tree: &[TreeNode]) {
        let len = self.visible_rows(tree).len();
        if self.selected + 1 < len {
            self.selected += 1;
        }
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn select_first(&mut self) {
        self.selected = 0;
    }

    pub fn select_last(&mut self, tree: &[TreeNode]) {
        self.selected = self.visible_rows(tree).len().saturating_sub(1);
    }

    /// Expands or collapses the selected directory. No-op on files.
    pub fn toggle_selected(&mut self, tree: &[TreeNode]) {
        let Some(row) = self.selected_row(tree) else {
            return;
        };
        if row.is_leaf {
            return;
        }
        if !self.collapsed.remove(&row.path) {
            self.collapsed.insert(row.path);
        }
    }

    pub fn expand_all(&mut self) {
        self.collapsed.clear();
    }

    pub fn collapse_all(&mut self, tree: &[TreeNode]) {
        let mut stack: Vec<&TreeNode> = tree.iter().collect();
        while let Some(node) = stack.pop() {
            if let Some(children) = node.children() {
                self.collapsed.insert(node.path().to_string());
                stack.extend(children);
            }
        }
        self.clamp(tree);
    }

    /// Keeps the selection inside the tree after a rebuild.
    pub fn clamp(&mut self, tree: &[TreeNode]) {
        let len = self.visible_rows(tree).len();
        self.selected = self.selected.min(len.saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::ChangeRecord;
    use crate::change::ChangeStatus::{Deleted, Modified};
    use crate::tree::build_tree;
    use pretty_assertions::assert_eq;

    fn tree() -> Vec<TreeNode> {
        build_tree(&[
            ChangeRecord::new("src/ui/mod.rs", Modified),
            ChangeRecord::new("src/main.rs", Modified),
            ChangeRecord::new("Cargo.toml", Deleted),
        ])
    }

    fn titles(rows: &[TreeRow]) -> Vec<(usize, &str)> {
        rows.iter().map(|r| (r.depth, r.title.as_str())).collect()
    }

    #[test]
    fn everything_starts_expanded() {
        let view = ChangeTreeView::new();
        let rows = view.visible_rows(&tree());
        assert_eq!(
            titles(&rows),
            vec![(0, "src"), (1, "ui"), (2, "mod.rs"), (1, "main.rs"), (0, "Cargo.toml")]
        );
        assert!(rows[0].expanded);
        assert_eq!(rows[4].status, Some(Deleted));
    }

    #[test]
    fn toggling_hides_children() {
        let tree = tree();
        let mut view = ChangeTreeView::new();
        view.select_next(&tree);
        view.toggle_selected(&tree);

        let rows = view.visible_rows(&tree);
        assert_eq!(titles(&rows), vec![(0, "src"), (1, "ui"), (1, "main.rs"), (0, "Cargo.toml")]);
        assert!(!rows[1].expanded);

        view.toggle_selected(&tree);
        assert_eq!(view.visible_rows(&tree).len(), 5);
    }

    #[test]
    fn toggling_a_file_does_nothing() {
        let tree = tree();
        let mut view = ChangeTreeView::new();
        view.select_last(&tree);
        view.toggle_selected(&tree);
        assert_eq!(view.visible_rows(&tree).len(), 5);
    }

    #[test]
    fn selection_stays_in_bounds() {
        let tree = tree();
        let mut view = ChangeTreeView::new();
        for _ in 0..10 {
            view.select_next(&tree);
        }
        assert_eq!(view.selected(), 4);

        view.collapse_all(&tree);
        assert_eq!(titles(&view.visible_rows(&tree)), vec![(0, "src"), (0, "Cargo.toml")]);
        assert_eq!(view.selected(), 1);

        view.clamp(&[]);
        assert_eq!(view.selected(), 0);
        assert_eq!(view.selected_row(&[]), None);

        view.expand_all();
        view.select_prev();
        assert_eq!(view.selected(), 0);
    }

    #[test]
    fn collapse_state_survives_rebuild() {
        let mut view = ChangeTreeView::new();
        view.collapse_all(&tree());
        let rebuilt = tree();
        assert_eq!(view.visible_rows(&rebuilt).len(), 2);
    }
}
