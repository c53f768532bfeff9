use crate::change::{ChangeRecord, ChangeStatus};
use icu_collator::{Collator, CollatorOptions};
use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt::Write;

/// A node of the change tree. Directories own their children; files carry
/// the status of the change they came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeNode {
    File {
        path: String,
        title: String,
        status: ChangeStatus,
    },
    Directory {
        path: String,
        title: String,
        children: Vec<TreeNode>,
    },
}

impl TreeNode {
    pub fn path(&self) -> &str {
        match self {
            TreeNode::File { path, .. } | TreeNode::Directory { path, .. } => path,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            TreeNode::File { title, .. } | TreeNode::Directory { title, .. } => title,
        }
    }

    /// Directories have no status of their own.
    pub fn status(&self) -> Option<ChangeStatus> {
        match self {
            TreeNode::File { status, .. } => Some(*status),
            TreeNode::Directory { .. } => None,
        }
    }

    pub fn children(&self) -> Option<&[TreeNode]> {
        match self {
            TreeNode::File { .. } => None,
            TreeNode::Directory { children, .. } => Some(children),
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, TreeNode::File { .. })
    }
}

impl Serialize for TreeNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("TreeNode", 4)?;
        state.serialize_field("path", self.path())?;
        state.serialize_field("title", self.title())?;
        state.serialize_field("isLeaf", &self.is_leaf())?;
        match self {
            TreeNode::File { status, .. } => state.serialize_field("status", status)?,
            TreeNode::Directory { children, .. } => state.serialize_field("children", children)?,
        }
        state.end()
    }
}

/// Groups a flat change list into directory and file nodes.
///
/// Paths are expected non-empty, `/`-separated and free of file/directory
/// conflicts, which [`crate::change::ChangeSet`] guarantees. Other input
/// still terminates: each record becomes exactly one leaf.
pub fn build_tree(changes: &[ChangeRecord]) -> Vec<TreeNode> {
    build_tree_under(changes, None)
}

pub fn build_tree_under(changes: &[ChangeRecord], parent: Option<&str>) -> Vec<TreeNode> {
    let prefix = parent.map(|p| format!("{p}/"));
    let entries = changes
        .iter()
        .map(|change| {
            let rest = prefix
                .as_deref()
                .and_then(|p| change.path.strip_prefix(p))
                .unwrap_or(change.path.as_str());
            (change, rest)
        })
        .collect();
    build_level(entries, parent)
}

/// One tree level. Each entry carries the part of its path below `parent`;
/// recursion hands down strictly shorter remainders, so every input
/// terminates, duplicates and file/directory collisions included.
fn build_level(entries: Vec<(&ChangeRecord, &str)>, parent: Option<&str>) -> Vec<TreeNode> {
    // Insertion-ordered grouping by first remaining segment.
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<(&str, Vec<(&ChangeRecord, &str)>)> = Vec::new();

    for (change, rest) in entries {
        let segment = rest.split('/').next().unwrap_or(rest);
        match index.get(segment) {
            Some(&i) => groups[i].1.push((change, rest)),
            None => {
                index.insert(segment, groups.len());
                groups.push((segment, vec![(change, rest)]));
            }
        }
    }

    let mut directories = Vec::new();
    let mut files = Vec::new();

    for (segment, members) in groups {
        let (nested, bare): (Vec<_>, Vec<_>) =
            members.into_iter().partition(|(_, rest)| rest.contains('/'));

        // Well-formed input yields either one bare record (a leaf) or only
        // nested ones (a directory) per segment.
        for (change, _) in bare {
            files.push(TreeNode::File {
                path: change.path.clone(),
                title: segment.to_string(),
                status: change.status,
            });
        }

        if nested.is_empty() {
            continue;
        }

        let dir_path = match parent {
            Some(p) => format!("{p}/{segment}"),
            None => segment.to_string(),
        };
        let below = nested
            .into_iter()
            .map(|(change, rest)| (change, rest.split_once('/').map_or("", |(_, tail)| tail)))
            .collect();
        let children = build_level(below, Some(dir_path.as_str()));
        directories.push(TreeNode::Directory {
            path: dir_path,
            title: segment.to_string(),
            children,
        });
    }

    directories.sort_by(|a, b| locale_compare(a.title(), b.title()));
    files.sort_by(|a, b| locale_compare(a.title(), b.title()));
    directories.extend(files);
    directories
}

thread_local! {
    static COLLATOR: Option<Collator> =
        match Collator::try_new(&Default::default(), CollatorOptions::new()) {
            Ok(collator) => Some(collator),
            Err(e) => {
                tracing::warn!("Root collator unavailable, sorting by folded case: {}", e);
                None
            }
        };
}

/// Locale string comparison with CLDR root collation at tertiary strength:
/// accents and case are secondary/tertiary differences (`"Éclair"` sorts
/// with the e's, `"a"` before `"A"`), punctuation orders as in the root
/// table (`_` before `.`), digits compare one by one. Strings the collator
/// treats as equal fall back to raw order so the result is total.
pub fn locale_compare(a: &str, b: &str) -> Ordering {
    COLLATOR
        .with(|collator| match collator {
            Some(collator) => collator.compare(a, b),
            None => folded_compare(a, b),
        })
        .then_with(|| a.cmp(b))
}

fn folded_compare(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| lowercase_first(a, b))
}

fn lowercase_first(a: &str, b: &str) -> Ordering {
    for (x, y) in a.chars().zip(b.chars()) {
        if x != y {
            return match (x.is_lowercase(), y.is_lowercase()) {
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                _ => x.cmp(&y),
            };
        }
    }
    a.len().cmp(&b.len())
}

/// Leaf paths in depth-first order.
pub fn leaf_paths(nodes: &[TreeNode]) -> Vec<&str> {
    let mut paths = Vec::new();
    collect_leaves(nodes, &mut paths);
    paths
}

fn collect_leaves<'a>(nodes: &'a [TreeNode], out: &mut Vec<&'a str>) {
    for node in nodes {
        match node {
            TreeNode::File { path, .. } => out.push(path),
            TreeNode::Directory { children, .. } => collect_leaves(children, out),
        }
    }
}

/// Deepest directory containing every change, following single-directory
/// chains from the top. `None` when the top level already branches.
pub fn common_directory(nodes: &[TreeNode]) -> Option<&str> {
    let mut current = nodes;
    let mut found = None;
    while let [TreeNode::Directory { path, children, .. }] = current {
        found = Some(path.as_str());
        current = children;
    }
    found
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusMarker {
    pub label: &'static str,
    pub strikethrough: bool,
}

impl StatusMarker {
    pub fn for_status(status: ChangeStatus) -> Self {
        Self {
            label: status.label(),
            strikethrough: status == ChangeStatus::Deleted,
        }
    }
}

/// Indented plain-text rendering, one node per line.
pub fn render_text(nodes: &[TreeNode]) -> String {
    let mut out = String::new();
    write_nodes(nodes, 0, &mut out);
    out
}

fn write_nodes(nodes: &[TreeNode], depth: usize, out: &mut String) {
    for node in nodes {
        let indent = "  ".repeat(depth);
        match node {
            TreeNode::Directory {
                title, children, ..
            } => {
                let _ = writeln!(out, "{indent}{title}/");
                write_nodes(children, depth + 1, out);
            }
            TreeNode::File { title, status, .. } => {
                let _ = writeln!(out, "{indent}{title}  [{}]", status.label());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::ChangeStatus::{Deleted, Modified, Untracked};
    use pretty_assertions::assert_eq;

    fn rec(path: &str, status: ChangeStatus) -> ChangeRecord {
        ChangeRecord::new(path, status)
    }

    fn file(path: &str, title: &str, status: ChangeStatus) -> TreeNode {
        TreeNode::File {
            path: path.to_string(),
            title: title.to_string(),
            status,
        }
    }

    fn dir(path: &str, title: &str, children: Vec<TreeNode>) -> TreeNode {
        TreeNode::Directory {
            path: path.to_string(),
            title: title.to_string(),
            children,
        }
    }

    fn sample() -> Vec<ChangeRecord> {
        vec![
            rec("src/ui/mod.rs", Modified),
            rec("README.md", Modified),
            rec("src/main.rs", Untracked),
            rec("Cargo.toml", Modified),
            rec("src/ui/components/tree.rs", Deleted),
            rec("docs/guide.md", Untracked),
            rec("src/app/mod.rs", Modified),
            rec("build.rs", Deleted),
        ]
    }

    fn assert_sibling_order(nodes: &[TreeNode]) {
        let first_file = nodes.iter().position(|n| n.is_leaf()).unwrap_or(nodes.len());
        assert!(nodes[first_file..].iter().all(|n| n.is_leaf()));
        for window in nodes[..first_file].windows(2).chain(nodes[first_file..].windows(2)) {
            assert_ne!(
                locale_compare(window[0].title(), window[1].title()),
                Ordering::Greater
            );
        }
        for node in nodes {
            if let Some(children) = node.children() {
                assert_sibling_order(children);
            }
        }
    }

    fn assert_prefixes(nodes: &[TreeNode]) {
        for node in nodes {
            if let TreeNode::Directory { path, children, .. } = node {
                let prefix = format!("{path}/");
                for child in children {
                    assert!(child.path().starts_with(&prefix));
                    assert!(!child.path()[prefix.len()..].contains('/'));
                }
                assert!(leaf_paths(children).iter().all(|p| p.starts_with(&prefix)));
                assert_prefixes(children);
            }
        }
    }

    #[test]
    fn empty_input_builds_empty_tree() {
        assert_eq!(build_tree(&[]), Vec::<TreeNode>::new());
    }

    #[test]
    fn single_file_is_a_leaf() {
        assert_eq!(
            build_tree(&[rec("a.txt", Modified)]),
            vec![file("a.txt", "a.txt", Modified)]
        );
    }

    #[test]
    fn nested_path_gets_directory() {
        assert_eq!(
            build_tree(&[rec("src/app.ts", Untracked)]),
            vec![dir("src", "src", vec![file("src/app.ts", "app.ts", Untracked)])]
        );
    }

    #[test]
    fn directories_precede_files() {
        let tree = build_tree(&[rec("b.txt", Modified), rec("a/x.txt", Deleted)]);
        assert_eq!(
            tree,
            vec![
                dir("a", "a", vec![file("a/x.txt", "x.txt", Deleted)]),
                file("b.txt", "b.txt", Modified),
            ]
        );

        let tree = build_tree(&[rec("a.txt", Modified), rec("z/x.txt", Deleted)]);
        assert_eq!(tree[0].title(), "z");
        assert_eq!(tree[1].title(), "a.txt");
    }

    #[test]
    fn files_in_same_directory_are_grouped() {
        let tree = build_tree(&[rec("dir/b.txt", Untracked), rec("dir/a.txt", Modified)]);
        assert_eq!(
            tree,
            vec![dir(
                "dir",
                "dir",
                vec![
                    file("dir/a.txt", "a.txt", Modified),
                    file("dir/b.txt", "b.txt", Untracked),
                ]
            )]
        );
    }

    #[test]
    fn deep_chain_keeps_every_level() {
        let tree = build_tree(&[rec("a/b/c/d.txt", Modified)]);
        assert_eq!(
            tree,
            vec![dir(
                "a",
                "a",
                vec![dir(
                    "a/b",
                    "b",
                    vec![dir("a/b/c", "c", vec![file("a/b/c/d.txt", "d.txt", Modified)])]
                )]
            )]
        );
    }

    #[test]
    fn leaves_biject_with_input() {
        let input = sample();
        let tree = build_tree(&input);

        let mut leaves: Vec<&str> = leaf_paths(&tree);
        let mut expected: Vec<&str> = input.iter().map(|r| r.path.as_str()).collect();
        leaves.sort_unstable();
        expected.sort_unstable();
        assert_eq!(leaves, expected);
    }

    #[test]
    fn leaves_keep_their_status() {
        let input = sample();
        let tree = build_tree(&input);
        let mut stack: Vec<&TreeNode> = tree.iter().collect();
        while let Some(node) = stack.pop() {
            match node {
                TreeNode::File { path, status, .. } => {
                    let original = input.iter().find(|r| &r.path == path).unwrap();
                    assert_eq!(*status, original.status);
                }
                TreeNode::Directory { children, .. } => stack.extend(children),
            }
        }
    }

    #[test]
    fn directory_paths_prefix_descendants() {
        assert_prefixes(&build_tree(&sample()));
    }

    #[test]
    fn siblings_are_ordered() {
        let tree = build_tree(&sample());
        assert_sibling_order(&tree);

        let titles: Vec<&str> = tree.iter().map(|n| n.title()).collect();
        assert_eq!(titles, vec!["docs", "src", "build.rs", "Cargo.toml", "README.md"]);

        let src: Vec<&str> = tree[1].children().unwrap().iter().map(|n| n.title()).collect();
        assert_eq!(src, vec!["app", "ui", "main.rs"]);
    }

    #[test]
    fn building_twice_is_identical() {
        let input = sample();
        assert_eq!(build_tree(&input), build_tree(&input));
    }

    #[test]
    fn input_order_does_not_change_output() {
        let input = sample();
        let mut reversed = input.clone();
        reversed.reverse();
        assert_eq!(build_tree(&input), build_tree(&reversed));
    }

    #[test]
    fn explicit_parent_strips_prefix() {
        let tree = build_tree_under(
            &[rec("lib/x/a.rs", Modified), rec("lib/b.rs", Deleted)],
            Some("lib"),
        );
        assert_eq!(
            tree,
            vec![
                dir("lib/x", "x", vec![file("lib/x/a.rs", "a.rs", Modified)]),
                file("lib/b.rs", "b.rs", Deleted),
            ]
        );
    }

    #[test]
    fn accents_and_punctuation_follow_collation() {
        let tree = build_tree(&[
            rec("Zebra.txt", Modified),
            rec("Éclair.txt", Modified),
            rec("mod.rs", Modified),
            rec("mod_a.rs", Modified),
        ]);
        let titles: Vec<&str> = tree.iter().map(|n| n.title()).collect();
        assert_eq!(titles, vec!["Éclair.txt", "mod_a.rs", "mod.rs", "Zebra.txt"]);

        assert_eq!(locale_compare("été", "ete"), Ordering::Greater);
        assert_eq!(locale_compare("été", "evening"), Ordering::Less);
        assert_eq!(locale_compare("Ångström", "zulu"), Ordering::Less);
    }

    #[test]
    fn duplicate_records_still_terminate() {
        let tree = build_tree(&[rec("a", Modified), rec("a", Modified)]);
        assert_eq!(
            tree,
            vec![file("a", "a", Modified), file("a", "a", Modified)]
        );
    }

    #[test]
    fn file_directory_collision_keeps_every_leaf() {
        let tree = build_tree(&[rec("a", Deleted), rec("a/x.txt", Untracked)]);
        assert_eq!(
            tree,
            vec![
                dir("a", "a", vec![file("a/x.txt", "x.txt", Untracked)]),
                file("a", "a", Deleted),
            ]
        );
    }

    #[test]
    fn record_outside_explicit_parent_terminates() {
        let tree = build_tree_under(&[rec("x/y.rs", Modified)], Some("lib"));
        assert_eq!(
            tree,
            vec![dir("lib/x", "x", vec![file("x/y.rs", "y.rs", Modified)])]
        );
    }

    #[test]
    fn locale_compare_ignores_case_first() {
        assert_eq!(locale_compare("apple", "Banana"), Ordering::Less);
        assert_eq!(locale_compare("Zebra", "apple"), Ordering::Greater);
        assert_eq!(locale_compare("a", "A"), Ordering::Less);
        assert_eq!(locale_compare("A", "a"), Ordering::Greater);
        assert_eq!(locale_compare("file10", "file2"), Ordering::Less);
        assert_eq!(locale_compare("same", "same"), Ordering::Equal);
    }

    #[test]
    fn folded_fallback_orders_lowercase_first() {
        assert_eq!(folded_compare("apple", "Banana"), Ordering::Less);
        assert_eq!(folded_compare("a", "A"), Ordering::Less);
        assert_eq!(folded_compare("Readme", "README"), Ordering::Less);
    }

    #[test]
    fn common_directory_follows_single_chain() {
        let tree = build_tree(&[rec("a/b/x.rs", Modified), rec("a/b/c/y.rs", Modified)]);
        assert_eq!(common_directory(&tree), Some("a/b"));

        let tree = build_tree(&[rec("a/x.rs", Modified), rec("top.rs", Modified)]);
        assert_eq!(common_directory(&tree), None);

        assert_eq!(common_directory(&[]), None);
    }

    #[test]
    fn markers_follow_status() {
        assert_eq!(
            StatusMarker::for_status(Deleted),
            StatusMarker {
                label: "Deleted",
                strikethrough: true
            }
        );
        assert_eq!(
            StatusMarker::for_status(Untracked),
            StatusMarker {
                label: "Untracked",
                strikethrough: false
            }
        );
        assert_eq!(StatusMarker::for_status(Modified).label, "Modified");
    }

    #[test]
    fn text_rendering_indents_children() {
        let tree = build_tree(&[rec("b.txt", Modified), rec("a/x.txt", Deleted)]);
        assert_eq!(render_text(&tree), "a/\n  x.txt  [Deleted]\nb.txt  [Modified]\n");
    }

    #[test]
    fn json_shape_matches_tree_widget() {
        let tree = build_tree(&[rec("src/app.ts", Untracked)]);
        let json = serde_json::to_value(&tree).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{
                "path": "src",
                "title": "src",
                "isLeaf": false,
                "children": [{
                    "path": "src/app.ts",
                    "title": "app.ts",
                    "isLeaf": true,
                    "status": "untracked"
                }]
            }])
        );
    }
}
