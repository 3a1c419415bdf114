//! Path router: literal segments plus `:name` parameters. The route with the most
//! literal segments wins; ties go to the earliest added.

#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct RouteId(pub u32);

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

#[derive(Clone, Debug)]
struct Route {
    method: String,
    segments: Vec<Segment>,
    id: RouteId,
}

impl Route {
    fn literal_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Literal(_)))
            .count()
    }
}

/// Outcome of matching a request against the route table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RouteMatch {
    Found {
        id: RouteId,
        params: Vec<(String, String)>,
    },
    /// The path is known but not for this verb.
    MethodNotAllowed { allowed: Vec<String> },
    NotFound,
}

/// Maps (verb, path pattern) -> RouteId. Patterns look like `api/:method`.
#[derive(Clone, Debug, Default)]
pub struct Router {
    routes: Vec<Route>,
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.trim_matches('/').split('/').filter(|s| !s.is_empty())
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, method: &str, pattern: &str, id: RouteId) {
        let segments = split_path(pattern)
            .map(|s| match s.strip_prefix(':') {
                Some(name) => Segment::Param(name.to_owned()),
                None => Segment::Literal(s.to_owned()),
            })
            .collect();
        self.routes.push(Route {
            method: method.to_uppercase(),
            segments,
            id,
        });
    }

    pub fn match_route(&self, method: &str, path: &str) -> RouteMatch {
        let parts: Vec<&str> = split_path(path).collect();
        let mut allowed = Vec::new();
        let mut best: Option<(usize, &Route, Vec<(String, String)>)> = None;
        for route in &self.routes {
            let Some(params) = match_segments(&route.segments, &parts) else {
                continue;
            };
            if route.method.eq_ignore_ascii_case(method) {
                let literals = route.literal_count();
                if best.as_ref().map_or(true, |(n, _, _)| literals > *n) {
                    best = Some((literals, route, params));
                }
                continue;
            }
            if !allowed.contains(&route.method) {
                allowed.push(route.method.clone());
            }
        }
        match best {
            Some((_, route, params)) => RouteMatch::Found { id: route.id, params },
            None if allowed.is_empty() => RouteMatch::NotFound,
            None => RouteMatch::MethodNotAllowed { allowed },
        }
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

fn match_segments(segments: &[Segment], parts: &[&str]) -> Option<Vec<(String, String)>> {
    if segments.len() != parts.len() {
        return None;
    }
    let mut params = Vec::new();
    for (segment, part) in segments.iter().zip(parts) {
        match segment {
            Segment::Literal(lit) if lit == part => {}
            Segment::Literal(_) => return None,
            Segment::Param(name) => params.push((name.clone(), (*part).to_owned())),
        }
    }
    Some(params)
}
