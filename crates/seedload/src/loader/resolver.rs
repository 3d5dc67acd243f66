//! Group dependency resolution

use std::collections::{BTreeMap, BTreeSet};

use crate::loader::source::RawSourceDescriptor;

/// Expand requested groups with everything they depend on.
///
/// Any source whose groups intersect the working set contributes its
/// `dependsOn` groups. Passes repeat until one adds nothing. Cycles converge
/// like any other dependency.
pub fn resolve(requested: &BTreeSet<String>, sources: &[RawSourceDescriptor]) -> BTreeSet<String> {
    let mut effective = requested.clone();

    loop {
        let before = effective.len();
        for source in sources {
            if source.in_any_group(&effective) {
                effective.extend(source.depends_on.iter().cloned());
            }
        }
        if effective.len() == before {
            return effective;
        }
    }
}

/// Find one dependency cycle between groups, if any.
///
/// Returns the groups along the cycle with the first group repeated at the
/// end, e.g. `[a, b, a]`.
pub fn find_cycle(sources: &[RawSourceDescriptor]) -> Option<Vec<String>> {
    let mut edges: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for source in sources {
        for group in &source.groups {
            edges
                .entry(group.as_str())
                .or_default()
                .extend(source.depends_on.iter().map(String::as_str));
        }
    }

    let mut done: BTreeSet<&str> = BTreeSet::new();
    for start in edges.keys().copied() {
        let mut path = Vec::new();
        if let Some(cycle) = visit(start, &edges, &mut path, &mut done) {
            return Some(cycle);
        }
    }
    None
}

fn visit<'a>(
    group: &'a str,
    edges: &BTreeMap<&'a str, BTreeSet<&'a str>>,
    path: &mut Vec<&'a str>,
    done: &mut BTreeSet<&'a str>,
) -> Option<Vec<String>> {
    if let Some(pos) = path.iter().position(|g| *g == group) {
        let mut cycle: Vec<String> = path[pos..].iter().map(|g| g.to_string()).collect();
        cycle.push(group.to_string());
        return Some(cycle);
    }
    if done.contains(group) {
        return None;
    }

    path.push(group);
    if let Some(next) = edges.get(group) {
        for dep in next {
            if let Some(cycle) = visit(*dep, edges, path, done) {
                return Some(cycle);
            }
        }
    }
    path.pop();
    done.insert(group);
    None
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::loader::source::SourceKind;

    fn groups(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn source(groups: &[&str], depends_on: &[&str]) -> RawSourceDescriptor {
        RawSourceDescriptor::new("classpath:db/x", SourceKind::Csv)
            .with_groups(groups.iter().copied())
            .with_depends_on(depends_on.iter().copied())
    }

    #[test]
    fn test_resolve_adds_dependencies() {
        let sources = vec![source(&["a"], &["b"]), source(&["b"], &[])];
        assert_eq!(resolve(&groups(&["a"]), &sources), groups(&["a", "b"]));
    }

    #[test]
    fn test_resolve_empty_request() {
        let sources = vec![source(&["a"], &["b"])];
        assert!(resolve(&BTreeSet::new(), &sources).is_empty());
    }

    #[test]
    fn test_resolve_is_transitive_regardless_of_order() {
        let sources = vec![
            source(&["c"], &["d"]),
            source(&["b"], &["c"]),
            source(&["a"], &["b"]),
        ];
        assert_eq!(resolve(&groups(&["a"]), &sources), groups(&["a", "b", "c", "d"]));
    }

    #[test]
    fn test_resolve_does_not_pull_unrelated_groups() {
        let sources = vec![source(&["a"], &[]), source(&["z"], &["y"])];
        assert_eq!(resolve(&groups(&["a"]), &sources), groups(&["a"]));
    }

    #[test]
    fn test_resolve_converges_on_cycles() {
        let sources = vec![source(&["a"], &["b"]), source(&["b"], &["a"])];
        assert_eq!(resolve(&groups(&["a"]), &sources), groups(&["a", "b"]));
        assert_eq!(resolve(&groups(&["b"]), &sources), groups(&["a", "b"]));
    }

    #[test]
    fn test_find_cycle() {
        let acyclic = vec![source(&["a"], &["b"]), source(&["b"], &["c"])];
        assert_eq!(find_cycle(&acyclic), None);

        let cyclic = vec![source(&["a"], &["b"]), source(&["b"], &["c"]), source(&["c"], &["a"])];
        assert_eq!(find_cycle(&cyclic).unwrap(), vec!["a", "b", "c", "a"]);

        let self_loop = vec![source(&["a"], &["a"])];
        assert_eq!(find_cycle(&self_loop).unwrap(), vec!["a", "a"]);
    }
}
