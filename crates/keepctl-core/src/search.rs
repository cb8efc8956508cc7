//! Multi-criteria entry search.

use regex::Regex;

use crate::error::{Result, VaultError};
use crate::models::{EntryData, Node, NodeId, Store};

/// Field filters. Every field that is set must match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Criteria {
    pub title: Option<String>,
    pub username: Option<String>,
    pub notes: Option<String>,
    pub url: Option<String>,
    /// Required tags. A lone empty tag means no tag filter.
    pub tags: Option<Vec<String>>,
}

impl Criteria {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    /// Tags that actually constrain the result, if any.
    fn effective_tags(&self) -> Option<&[String]> {
        match self.tags.as_deref() {
            None | Some([]) => None,
            Some([only]) if only.is_empty() => None,
            Some(tags) => Some(tags),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.username.is_none()
            && self.notes.is_none()
            && self.url.is_none()
            && self.effective_tags().is_none()
    }
}

/// How text criteria are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    #[default]
    Exact,
    /// Pattern found anywhere in the field, or the field equals the criterion.
    Regex,
}

/// A search over one scope group.
#[derive(Debug, Clone)]
pub struct Query {
    pub criteria: Criteria,
    pub recursive: bool,
    pub mode: MatchMode,
}

impl Query {
    pub fn new(criteria: Criteria) -> Self {
        Self {
            criteria,
            recursive: true,
            mode: MatchMode::Exact,
        }
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn mode(mut self, mode: MatchMode) -> Self {
        self.mode = mode;
        self
    }
}

enum FieldMatcher<'a> {
    Exact(&'a str),
    Pattern { literal: &'a str, regex: Regex },
}

impl<'a> FieldMatcher<'a> {
    fn build(field: &'static str, value: &'a str, mode: MatchMode) -> Result<Self> {
        match mode {
            MatchMode::Exact => Ok(FieldMatcher::Exact(value)),
            MatchMode::Regex => {
                let regex = Regex::new(value)
                    .map_err(|source| VaultError::InvalidPattern { field, source })?;
                Ok(FieldMatcher::Pattern {
                    literal: value,
                    regex,
                })
            }
        }
    }

    fn matches(&self, candidate: &str) -> bool {
        match self {
            FieldMatcher::Exact(want) => candidate == *want,
            FieldMatcher::Pattern { literal, regex } => {
                candidate == *literal || regex.is_match(candidate)
            }
        }
    }
}

/// Compiled form of [`Criteria`].
struct Filter<'a> {
    title: Option<FieldMatcher<'a>>,
    username: Option<FieldMatcher<'a>>,
    notes: Option<FieldMatcher<'a>>,
    url: Option<FieldMatcher<'a>>,
    tags: Option<&'a [String]>,
}

impl<'a> Filter<'a> {
    fn compile(criteria: &'a Criteria, mode: MatchMode) -> Result<Self> {
        let field = |name: &'static str, value: &'a Option<String>| {
            value
                .as_deref()
                .map(|v| FieldMatcher::build(name, v, mode))
                .transpose()
        };

        Ok(Self {
            title: field("title", &criteria.title)?,
            username: field("username", &criteria.username)?,
            notes: field("notes", &criteria.notes)?,
            url: field("url", &criteria.url)?,
            tags: criteria.effective_tags(),
        })
    }

    fn accepts(&self, node: &Node, entry: &EntryData) -> bool {
        text(&self.title, &node.name)
            && text(&self.username, &entry.username)
            && self
                .notes
                .as_ref()
                .map_or(true, |m| node.notes.as_deref().is_some_and(|n| m.matches(n)))
            && text(&self.url, &entry.url)
            && self.tags.map_or(true, |tags| entry.has_tags(tags))
    }
}

fn text(matcher: &Option<FieldMatcher<'_>>, value: &str) -> bool {
    matcher.as_ref().map_or(true, |m| m.matches(value))
}

/// Entries in scope matching the query, in tree order.
pub fn search(store: &Store, scope: NodeId, query: &Query) -> Result<Vec<NodeId>> {
    if !store.node(scope).is_some_and(Node::is_group) {
        return Err(VaultError::StaleNode(scope));
    }

    let candidates = if query.recursive {
        store.descendant_entries(scope)
    } else {
        store.direct_entries(scope)
    };

    if query.criteria.is_empty() {
        return Ok(candidates);
    }

    let filter = Filter::compile(&query.criteria, query.mode)?;
    let found: Vec<NodeId> = candidates
        .into_iter()
        .filter(|id| {
            store
                .node(*id)
                .and_then(|node| node.as_entry().map(|entry| filter.accepts(node, entry)))
                .unwrap_or(false)
        })
        .collect();

    tracing::debug!(
        "Search matched {} entries (recursive: {}, mode: {:?})",
        found.len(),
        query.recursive,
        query.mode
    );
    Ok(found)
}

/// Entries titled exactly `title` directly under `scope`.
pub fn entries_titled(store: &Store, scope: NodeId, title: &str) -> Result<Vec<NodeId>> {
    search(
        store,
        scope,
        &Query::new(Criteria::title(title)).recursive(false),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add(store: &mut Store, parent: NodeId, title: &str, tags: &[&str]) -> NodeId {
        let mut data = EntryData {
            username: format!("{title}-user"),
            url: format!("https://{title}.example"),
            ..EntryData::default()
        };
        data.set_tags(tags.iter().map(|t| t.to_string()));
        store.add_entry(parent, title, data).unwrap()
    }

    fn fixture() -> (Store, NodeId, Vec<NodeId>) {
        let mut store = Store::new("Root");
        let root = store.root();
        let a = add(&mut store, root, "MyEntry", &["a", "b", "c"]);
        let g = store.add_group(root, "Apps").unwrap();
        let b = add(&mut store, g, "Other", &["a"]);
        let c = add(&mut store, g, "My", &[]);
        (store, g, vec![a, b, c])
    }

    #[test]
    fn no_criteria_returns_everything_in_scope() {
        let (store, group, ids) = fixture();
        let root = store.root();

        let all = search(&store, root, &Query::new(Criteria::default())).unwrap();
        assert_eq!(all, ids);

        let direct = search(&store, root, &Query::new(Criteria::default()).recursive(false))
            .unwrap();
        assert_eq!(direct, vec![ids[0]]);

        let in_group = search(&store, group, &Query::new(Criteria::default())).unwrap();
        assert_eq!(in_group, vec![ids[1], ids[2]]);
    }

    #[test]
    fn fast_path_agrees_with_vacuous_filter() {
        let (store, _, _) = fixture();
        let root = store.root();
        let vacuous = Criteria {
            tags: Some(vec![String::new()]),
            ..Criteria::default()
        };
        assert!(vacuous.is_empty());
        assert_eq!(
            search(&store, root, &Query::new(vacuous)).unwrap(),
            search(&store, root, &Query::new(Criteria::default())).unwrap()
        );
    }

    #[test]
    fn non_recursive_stays_in_scope() {
        let (store, group, _) = fixture();
        let found = search(&store, group, &Query::new(Criteria::default()).recursive(false))
            .unwrap();
        assert!(!found.is_empty());
        for id in found {
            assert_eq!(store.node(id).unwrap().parent(), Some(group));
        }
    }

    #[test]
    fn tag_subset_matching() {
        let (store, _, ids) = fixture();
        let root = store.root();
        let with_tags = |tags: &[&str]| Criteria {
            tags: Some(tags.iter().map(|t| t.to_string()).collect()),
            ..Criteria::default()
        };

        let ab = search(&store, root, &Query::new(with_tags(&["a", "b"]))).unwrap();
        assert_eq!(ab, vec![ids[0]]);

        let ad = search(&store, root, &Query::new(with_tags(&["a", "d"]))).unwrap();
        assert!(ad.is_empty());

        let a = search(&store, root, &Query::new(with_tags(&["a"]))).unwrap();
        assert_eq!(a, vec![ids[0], ids[1]]);
    }

    #[test]
    fn exact_mode_requires_equality() {
        let (store, _, ids) = fixture();
        let root = store.root();
        let found = search(&store, root, &Query::new(Criteria::title("My"))).unwrap();
        assert_eq!(found, vec![ids[2]]);
    }

    #[test]
    fn regex_mode_is_search_or_equality() {
        let (store, _, ids) = fixture();
        let root = store.root();

        let prefix = search(
            &store,
            root,
            &Query::new(Criteria::title("^My")).mode(MatchMode::Regex),
        )
        .unwrap();
        assert_eq!(prefix, vec![ids[0], ids[2]]);

        // "a+b" is not found in "a+b" as a pattern, but equality still matches.
        let mut store = Store::new("Root");
        let root = store.root();
        let literal = add(&mut store, root, "a+b", &[]);
        let found = search(
            &store,
            root,
            &Query::new(Criteria::title("a+b")).mode(MatchMode::Regex),
        )
        .unwrap();
        assert_eq!(found, vec![literal]);
    }

    #[test]
    fn criteria_are_and_combined() {
        let (store, _, ids) = fixture();
        let root = store.root();
        let criteria = Criteria {
            title: Some("Other".into()),
            username: Some("Other-user".into()),
            url: Some("https://Other.example".into()),
            ..Criteria::default()
        };
        assert_eq!(
            search(&store, root, &Query::new(criteria.clone())).unwrap(),
            vec![ids[1]]
        );

        let mismatched = Criteria {
            username: Some("someone-else".into()),
            ..criteria
        };
        assert!(search(&store, root, &Query::new(mismatched)).unwrap().is_empty());
    }

    #[test]
    fn notes_criterion_skips_entries_without_notes() {
        let (mut store, _, ids) = fixture();
        let root = store.root();
        store.node_mut(ids[1]).unwrap().notes = Some("rotate monthly".into());

        let found = search(
            &store,
            root,
            &Query::new(Criteria {
                notes: Some("monthly".into()),
                ..Criteria::default()
            })
            .mode(MatchMode::Regex),
        )
        .unwrap();
        assert_eq!(found, vec![ids[1]]);
    }

    #[test]
    fn bad_pattern_is_a_validation_error() {
        let (store, _, _) = fixture();
        let err = search(
            &store,
            store.root(),
            &Query::new(Criteria::title("(")).mode(MatchMode::Regex),
        )
        .unwrap_err();
        assert!(matches!(err, VaultError::InvalidPattern { field: "title", .. }));
    }

    #[test]
    fn entries_titled_ignores_nested_entries() {
        let (store, group, ids) = fixture();
        assert!(entries_titled(&store, store.root(), "Other").unwrap().is_empty());
        assert_eq!(entries_titled(&store, group, "Other").unwrap(), vec![ids[1]]);
    }
}
