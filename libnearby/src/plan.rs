//! Query plans describe which locations a search should return and in which
//! order. A plan is validated once when it is built and is immutable after
//! that, so every store executes the same description.
use crate::{
    core::{
        error::ValidationError,
        query::{LimitSpec, SortOrder, SortSpec},
    },
    geometry::{self, Point},
    location::{Column, Location, SortField},
    spatial::Proximity,
};
use std::cmp::Ordering;

/// The default number of results per page
pub const DEFAULT_PER_PAGE: u32 = 10;

/// The largest number of results a single page may hold
pub const MAX_PER_PAGE: u32 = 100;

/// The largest radius, in meters, that a proximity search may cover
pub const MAX_SEARCH_RADIUS: f64 = 50_000.0;

/// A 1-based page of results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    page: u32,
    per_page: u32,
}

impl Default for Window {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl Window {
    pub fn new(page: u32, per_page: u32) -> Result<Self, ValidationError> {
        if page < 1 {
            return Err(ValidationError::Page);
        }
        if !(1..=MAX_PER_PAGE).contains(&per_page) {
            return Err(ValidationError::PerPage(per_page));
        }
        Ok(Self { page, per_page })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    /// The number of results that come before this page
    pub fn skip(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.per_page)
    }

    /// Whether results remain after this page, given the total number of matches
    pub fn has_next(&self, total: u64) -> bool {
        u64::from(self.page) * u64::from(self.per_page) < total
    }

    pub fn to_limit(&self) -> LimitSpec {
        LimitSpec {
            count: self.per_page,
            offset: Some(self.skip()),
        }
    }

    /// Take the items that fall within this page from a fully sorted sequence
    pub fn slice<T, I: IntoIterator<Item = T>>(&self, items: I) -> Vec<T> {
        items
            .into_iter()
            .skip(usize::try_from(self.skip()).unwrap_or(usize::MAX))
            .take(self.per_page as usize)
            .collect()
    }
}

/// What kind of search a plan performs
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Intent {
    /// Every location, optionally filtered by a text search
    List,
    /// Locations no further than `radius` meters from `center`
    Nearby { center: Point, radius: f64 },
    /// Locations whose distance from `center` lies in `[min, max]` meters
    Range { center: Point, min: f64, max: f64 },
}

/// A location that matched a plan, together with its distance from the
/// search center for proximity searches
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub location: Location,
    pub distance: Option<f64>,
}

/// One page of matches plus the number of matches over all pages
#[derive(Debug, Clone, PartialEq)]
pub struct Matches {
    pub items: Vec<Match>,
    pub total: u64,
    pub window: Window,
}

impl Matches {
    pub fn empty(window: Window) -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            window,
        }
    }

    pub fn has_next(&self) -> bool {
        self.window.has_next(self.total)
    }
}

/// An immutable, validated description of a search
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    intent: Intent,
    search: Option<String>,
    sort_field: SortField,
    sort_order: SortOrder,
    window: Window,
}

impl QueryPlan {
    /// Start building a plan that lists all locations
    pub fn list() -> QueryPlanBuilder {
        QueryPlanBuilder::new(Intent::List)
    }

    /// Start building a plan for locations within `radius` meters of `center`
    pub fn nearby(center: Point, radius: f64) -> QueryPlanBuilder {
        QueryPlanBuilder::new(Intent::Nearby { center, radius })
    }

    /// Start building a plan for locations between `min` and `max` meters of `center`
    pub fn range(center: Point, min: f64, max: f64) -> QueryPlanBuilder {
        QueryPlanBuilder::new(Intent::Range { center, min, max })
    }

    pub fn intent(&self) -> Intent {
        self.intent
    }

    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    pub fn sort_field(&self) -> SortField {
        self.sort_field
    }

    pub fn sort_order(&self) -> SortOrder {
        self.sort_order
    }

    pub fn window(&self) -> Window {
        self.window
    }

    /// The distance predicate of this plan, if it is a proximity search
    pub fn proximity(&self) -> Option<Proximity> {
        match self.intent {
            Intent::List => None,
            Intent::Nearby { center, radius } => Some(Proximity::within(center, radius)),
            Intent::Range { center, min, max } => Some(Proximity::between(center, min, max)),
        }
    }

    /// The database ordering for this plan, if its sort field is a stored column
    pub fn sql_sort(&self) -> Option<SortSpec<Column>> {
        Column::for_field(self.sort_field).map(|c| SortSpec::new(c, self.sort_order))
    }

    /// The order in which two matches appear in the results. Matches that
    /// compare equal on the sort field are ordered by ascending id.
    pub fn compare(&self, a: &Match, b: &Match) -> Ordering {
        let primary = match self.sort_field {
            SortField::Name => a.location.name.cmp(&b.location.name),
            SortField::CreatedAt => a.location.created_at.cmp(&b.location.created_at),
            SortField::Distance => match (a.distance, b.distance) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                _ => Ordering::Equal,
            },
        };
        self.sort_order
            .apply(primary)
            .then_with(|| a.location.id.cmp(&b.location.id))
    }

    /// Whether a location satisfies the text and distance predicates of this
    /// plan, returning the match if it does
    pub fn accept(&self, location: Location) -> Option<Match> {
        if let Some(text) = self.search() {
            if !location.matches_search(text) {
                return None;
            }
        }
        match self.proximity() {
            None => Some(Match {
                location,
                distance: None,
            }),
            Some(p) => p.measure(location.position).map(|d| Match {
                location,
                distance: Some(d),
            }),
        }
    }

    /// Filter, order and paginate a set of candidate locations. Candidates
    /// may be a superset of the matches; every predicate is checked again
    /// here.
    pub fn evaluate<I: IntoIterator<Item = Location>>(&self, candidates: I) -> Matches {
        let mut matches: Vec<Match> = candidates
            .into_iter()
            .filter_map(|l| self.accept(l))
            .collect();
        matches.sort_by(|a, b| self.compare(a, b));
        Matches {
            total: matches.len() as u64,
            items: self.window.slice(matches),
            window: self.window,
        }
    }
}

/// An object for building a [QueryPlan]. All validation happens in
/// [QueryPlanBuilder::build()].
#[derive(Debug, Clone)]
pub struct QueryPlanBuilder {
    intent: Intent,
    search: Option<String>,
    sort: Option<(SortField, SortOrder)>,
    page: u32,
    per_page: u32,
}

impl QueryPlanBuilder {
    fn new(intent: Intent) -> Self {
        Self {
            intent,
            search: None,
            sort: None,
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }

    /// Only match locations whose name or description contains `text`. An
    /// empty string matches everything.
    ///
    /// Matching ignores case for ASCII letters only, the same as SQLite's
    /// `LIKE`: "CAFE" finds "Cafe", but "CAFÉ" does not find "café".
    pub fn search<S: Into<String>>(mut self, text: Option<S>) -> Self {
        self.search = text.map(Into::into).filter(|s| !s.is_empty());
        self
    }

    pub fn sort(mut self, field: SortField, order: SortOrder) -> Self {
        self.sort = Some((field, order));
        self
    }

    pub fn page(mut self, page: u32, per_page: u32) -> Self {
        self.page = page;
        self.per_page = per_page;
        self
    }

    pub fn build(self) -> Result<QueryPlan, ValidationError> {
        let window = Window::new(self.page, self.per_page)?;
        let default_sort = match self.intent {
            Intent::List => (SortField::CreatedAt, SortOrder::Descending),
            Intent::Nearby { center, radius } => {
                check_center(center)?;
                if !(radius > 0.0 && radius <= MAX_SEARCH_RADIUS) {
                    return Err(ValidationError::Radius(radius));
                }
                (SortField::Distance, SortOrder::Ascending)
            }
            Intent::Range { center, min, max } => {
                check_center(center)?;
                if !(min.is_finite() && min >= 0.0) {
                    return Err(ValidationError::MinDistance(min));
                }
                if !(max > 0.0 && max <= MAX_SEARCH_RADIUS) {
                    return Err(ValidationError::MaxDistance(max));
                }
                (SortField::Distance, SortOrder::Ascending)
            }
        };
        let (sort_field, sort_order) = self.sort.unwrap_or(default_sort);
        if sort_field == SortField::Distance && self.intent == Intent::List {
            return Err(ValidationError::SortByDistanceWithoutCenter);
        }
        Ok(QueryPlan {
            intent: self.intent,
            search: self.search,
            sort_field,
            sort_order,
            window,
        })
    }
}

fn check_center(center: Point) -> Result<(), ValidationError> {
    let (latitude, longitude) = geometry::to_lat_lng(center);
    geometry::check(latitude, longitude).map(|_| ())
}
