//! Component A — maps `(method, path)` to a [`Route`], supporting exact and
//! parameterised (`/users/:id`) matching.

use crate::model::{Route, RouteId};
use std::collections::HashMap;
use std::sync::RwLock;

/// One segment of a compiled path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// A pattern compiled once at `store()` time so that `lookup()` never
/// allocates a matcher per request.
#[derive(Debug, Clone)]
struct CompiledPattern {
    segments: Vec<Segment>,
    param_count: usize,
}

impl CompiledPattern {
    fn compile(pattern: &str) -> Self {
        let segments: Vec<Segment> = pattern
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| {
                if let Some(name) = s.strip_prefix(':') {
                    Segment::Param(name.to_string())
                } else {
                    Segment::Literal(s.to_string())
                }
            })
            .collect();
        let param_count = segments
            .iter()
            .filter(|s| matches!(s, Segment::Param(_)))
            .count();
        Self { segments, param_count }
    }

    /// Matches a full request path (already split on `/`) against this
    /// pattern. Each `:name` consumes exactly one non-empty segment.
    fn matches(&self, path_segments: &[&str]) -> bool {
        if self.segments.len() != path_segments.len() {
            return false;
        }
        self.segments.iter().zip(path_segments.iter()).all(|(seg, actual)| match seg {
            Segment::Literal(lit) => lit == actual,
            Segment::Param(_) => !actual.is_empty(),
        })
    }
}

struct Entry {
    route: Route,
    pattern: CompiledPattern,
}

/// Tie-break strategy for two parameterised patterns that both match the
/// same path.
///
/// spec.md §9 pins plain ascending-id order but flags a specificity order
/// (fewest params wins) as operator-preferable; this store defaults to
/// specificity and exposes the strict mode as an explicit opt-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TieBreak {
    #[default]
    Specificity,
    StrictAscendingId,
}

/// Route index: exact lookup via a hash map, parameterised lookup via a
/// linear scan over compiled patterns.
pub struct RouteIndex {
    exact: RwLock<HashMap<(String, String), RouteId>>,
    parameterised: RwLock<Vec<Entry>>,
    by_id: RwLock<HashMap<RouteId, Route>>,
    tie_break: TieBreak,
}

impl RouteIndex {
    pub fn new() -> Self {
        Self {
            exact: RwLock::new(HashMap::new()),
            parameterised: RwLock::new(Vec::new()),
            by_id: RwLock::new(HashMap::new()),
            tie_break: TieBreak::Specificity,
        }
    }

    /// Construct an index that breaks ties between equally-specific
    /// parameterised routes by ascending id, per spec.md's literal pinning.
    pub fn with_strict_id_order() -> Self {
        Self {
            tie_break: TieBreak::StrictAscendingId,
            ..Self::new()
        }
    }

    /// Insert or overwrite a route by id and by `(method, path_pattern)`.
    pub fn store(&self, route: Route) {
        let pattern = CompiledPattern::compile(&route.path_pattern);
        let key = (route.method.clone(), route.path_pattern.clone());

        // Remove any previous registration for this id first, so an update
        // that changes the pattern doesn't leave a stale entry behind.
        self.remove_id(route.id);

        if pattern.param_count == 0 {
            self.exact.write().unwrap().insert(key, route.id);
        } else {
            self.parameterised.write().unwrap().push(Entry { route: route.clone(), pattern });
        }
        self.by_id.write().unwrap().insert(route.id, route);
    }

    fn remove_id(&self, id: RouteId) {
        if let Some(old) = self.by_id.write().unwrap().remove(&id) {
            self.exact.write().unwrap().retain(|_, v| *v != id);
            self.parameterised.write().unwrap().retain(|e| e.route.id != id);
            let _ = old;
        }
    }

    /// Exact match first, falling back to a scan of parameterised patterns.
    pub fn lookup(&self, method: &str, path: &str) -> Option<Route> {
        if let Some(id) = self.exact.read().unwrap().get(&(method.to_string(), path.to_string())) {
            return self.by_id.read().unwrap().get(id).cloned();
        }

        let path_segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let candidates = self.parameterised.read().unwrap();
        let mut best: Option<&Entry> = None;
        for entry in candidates.iter() {
            if entry.route.method != method {
                continue;
            }
            if !entry.pattern.matches(&path_segments) {
                continue;
            }
            best = Some(match (best, self.tie_break) {
                (None, _) => entry,
                (Some(cur), TieBreak::StrictAscendingId) => {
                    if entry.route.id.0 < cur.route.id.0 { entry } else { cur }
                }
                (Some(cur), TieBreak::Specificity) => {
                    if entry.pattern.param_count < cur.pattern.param_count
                        || (entry.pattern.param_count == cur.pattern.param_count
                            && entry.route.id.0 < cur.route.id.0)
                    {
                        entry
                    } else {
                        cur
                    }
                }
            });
        }
        best.map(|e| e.route.clone())
    }

    /// Remove every route. Used during a full control-plane refresh.
    pub fn clear(&self) {
        self.exact.write().unwrap().clear();
        self.parameterised.write().unwrap().clear();
        self.by_id.write().unwrap().clear();
    }

    /// All routes currently stored, in no particular order.
    pub fn list(&self) -> Vec<Route> {
        self.by_id.read().unwrap().values().cloned().collect()
    }
}

impl Default for RouteIndex {
    fn default() -> Self {
        Self::new()
    }
}
