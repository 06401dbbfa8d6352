//! URL matching, delegated to [`matchit`].
//!
//! Every standard method gets its own matchit tree, and routes that declared
//! no methods live in a separate any-method tree. A request is looked up in
//! its method's tree first, then in the any-method tree, so a static segment
//! registered for one method never shadows a parameter registered for
//! another. Only when neither tree matches are the other methods' trees
//! probed, which separates "no such path" (404) from "path exists but not
//! for this method" (405).

use std::collections::HashMap;

use matchit::Router as MatchitRouter;

use crate::method::{Method, MethodSet};

/// A successful match: the route's index in the table and the path
/// parameters extracted from the URL.
#[derive(Debug)]
pub struct Match {
    pub route: usize,
    pub params: Vec<(String, String)>,
}

#[derive(Debug, Eq, PartialEq)]
pub enum MatchError {
    NotFound,
    /// The path is registered, but not for this method. `allow` lists the
    /// methods that would have matched.
    MethodNotAllowed { allow: MethodSet },
}

pub struct Matcher {
    by_method: HashMap<Method, MatchitRouter<usize>>,
    any: MatchitRouter<usize>,
}

impl Matcher {
    pub fn new() -> Self {
        Self { by_method: HashMap::new(), any: MatchitRouter::new() }
    }

    /// Registers route `route` under `pattern` for `methods` (empty = any).
    pub fn insert(
        &mut self,
        pattern: &str,
        methods: MethodSet,
        route: usize,
    ) -> Result<(), matchit::InsertError> {
        if methods.is_empty() {
            return self.any.insert(pattern, route);
        }
        for method in methods.iter() {
            self.by_method
                .entry(method)
                .or_insert_with(MatchitRouter::new)
                .insert(pattern, route)?;
        }
        Ok(())
    }

    /// Resolves a request's method and path.
    pub fn find(&self, method: &http::Method, path: &str) -> Result<Match, MatchError> {
        let own = Method::try_from(method).ok().and_then(|m| self.by_method.get(&m));

        let hit = own.into_iter()
            .chain([&self.any])
            .find_map(|tree| tree.at(path).ok());
        if let Some(hit) = hit {
            let params = hit.params.iter()
                .map(|(k, v)| (k.to_owned(), v.to_owned()))
                .collect();
            return Ok(Match { route: *hit.value, params });
        }

        let allow = self.allowed(path);
        if allow.is_empty() {
            Err(MatchError::NotFound)
        } else {
            Err(MatchError::MethodNotAllowed { allow })
        }
    }

    /// The methods accepted at `path`. Empty when some route there accepts
    /// any method.
    pub fn methods_at(&self, path: &str) -> MethodSet {
        if self.any.at(path).is_ok() {
            return MethodSet::EMPTY;
        }
        self.allowed(path)
    }

    fn allowed(&self, path: &str) -> MethodSet {
        Method::ALL.into_iter()
            .filter(|m| self.by_method.get(m).is_some_and(|tree| tree.at(path).is_ok()))
            .collect()
    }
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new()
    }
}
