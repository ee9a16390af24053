//! Track search query model.
//!
//! A [`TrackSearchRequest`] is what clients send; [`SearchQuery`] is the
//! validated, backend-neutral form. The query renders itself either as an
//! Elasticsearch request body ([`SearchQuery::to_dsl`]) or evaluates directly
//! against in-memory documents ([`SearchQuery::execute`]).

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::track::TrackDocument;

/// Fields searched together with one shared query.
#[derive(Debug, Clone, Default, Serialize, Deserialize, utoipa::ToSchema)]
pub struct GroupSearch {
    #[serde(default)]
    #[schema(example = json!(["title"]))]
    pub fields: Vec<String>,
    /// `true` switches the group's clauses from exact to fuzzy matching.
    #[serde(default)]
    pub refine: bool,
    /// Shared query. When absent, each field falls back to its `field_search` entry.
    #[serde(default)]
    #[schema(example = "Moon")]
    pub query: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct FieldSearch {
    #[schema(example = "Doors")]
    pub query: String,
    #[serde(default)]
    pub refine: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, utoipa::ToSchema)]
pub struct TrackSearchRequest {
    #[serde(default)]
    pub group_search: GroupSearch,
    #[serde(default)]
    pub field_search: BTreeMap<String, FieldSearch>,
    #[schema(example = "rock")]
    pub genre: Option<String>,
    #[schema(example = "mp3")]
    pub format: Option<String>,
    #[serde(default)]
    pub sort_by_duration_asc: bool,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("field '{0}' is not searchable (expected one of: title, artist, album)")]
    UnknownField(String),
}

/// Text fields a match clause may target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SearchField {
    Title,
    Artist,
    Album,
}

impl SearchField {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchField::Title => "title",
            SearchField::Artist => "artist",
            SearchField::Album => "album",
        }
    }

    fn value_of<'a>(&self, doc: &'a TrackDocument) -> Option<&'a str> {
        match self {
            SearchField::Title => Some(&doc.title),
            SearchField::Artist => Some(&doc.artist),
            SearchField::Album => doc.album.as_deref(),
        }
    }
}

impl fmt::Display for SearchField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchField {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "title" => Ok(SearchField::Title),
            "artist" => Ok(SearchField::Artist),
            "album" => Ok(SearchField::Album),
            other => Err(QueryError::UnknownField(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    Exact,
    Fuzzy,
}

impl MatchMode {
    fn from_refine(refine: bool) -> Self {
        if refine { MatchMode::Fuzzy } else { MatchMode::Exact }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchClause {
    pub field: SearchField,
    pub value: String,
    pub mode: MatchMode,
}

impl MatchClause {
    fn matches(&self, doc: &TrackDocument) -> bool {
        let Some(text) = self.field.value_of(doc) else {
            return false;
        };
        let tokens = tokenize(text);
        match self.mode {
            MatchMode::Exact => {
                let wanted = tokenize(&self.value);
                !wanted.is_empty() && wanted.iter().all(|w| tokens.contains(w))
            }
            MatchMode::Fuzzy => {
                let term = self.value.trim().to_lowercase();
                let max = auto_fuzziness(&term);
                tokens.iter().any(|t| osa_distance(&term, t) <= max)
            }
        }
    }

    fn to_dsl(&self) -> Value {
        let field = self.field.as_str();
        match self.mode {
            MatchMode::Exact => json!({
                "match": { field: { "query": self.value, "operator": "and" } }
            }),
            MatchMode::Fuzzy => json!({
                "fuzzy": {
                    field: {
                        "value": self.value.trim().to_lowercase(),
                        "fuzziness": "AUTO",
                        "transpositions": true
                    }
                }
            }),
        }
    }
}

/// Keyword equality filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TermFilter {
    Genre(String),
    Format(String),
}

impl TermFilter {
    fn matches(&self, doc: &TrackDocument) -> bool {
        match self {
            TermFilter::Genre(g) => doc.genre.as_deref() == Some(g.as_str()),
            TermFilter::Format(f) => doc.format == *f,
        }
    }

    fn to_dsl(&self) -> Value {
        match self {
            TermFilter::Genre(g) => json!({ "term": { "genre": g } }),
            TermFilter::Format(f) => json!({ "term": { "format": f } }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DurationOrder {
    Asc,
    #[default]
    Desc,
}

impl DurationOrder {
    fn as_str(&self) -> &'static str {
        match self {
            DurationOrder::Asc => "asc",
            DurationOrder::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub must: Vec<MatchClause>,
    pub filter: Vec<TermFilter>,
    pub sort: DurationOrder,
    pub size: usize,
}

impl SearchQuery {
    /// Validate a client request into a query returning at most `size` hits.
    pub fn from_request(req: &TrackSearchRequest, size: usize) -> Result<Self, QueryError> {
        let mut must = Vec::new();
        let mut grouped = Vec::new();

        for name in &req.group_search.fields {
            let field: SearchField = name.parse()?;
            if grouped.contains(&field) {
                continue;
            }
            grouped.push(field);

            let query = req
                .group_search
                .query
                .as_deref()
                .or_else(|| req.field_search.get(name).map(|f| f.query.as_str()));
            if let Some(value) = query.filter(|q| !q.trim().is_empty()) {
                must.push(MatchClause {
                    field,
                    value: value.to_string(),
                    mode: MatchMode::from_refine(req.group_search.refine),
                });
            }
        }

        // BTreeMap iteration keeps the remaining clauses in field-name order.
        for (name, search) in &req.field_search {
            let field: SearchField = name.parse()?;
            if grouped.contains(&field) || search.query.trim().is_empty() {
                continue;
            }
            must.push(MatchClause {
                field,
                value: search.query.clone(),
                mode: MatchMode::from_refine(search.refine),
            });
        }

        let mut filter = Vec::new();
        if let Some(genre) = &req.genre {
            filter.push(TermFilter::Genre(genre.clone()));
        }
        if let Some(format) = &req.format {
            filter.push(TermFilter::Format(format.clone()));
        }

        Ok(Self {
            must,
            filter,
            sort: if req.sort_by_duration_asc {
                DurationOrder::Asc
            } else {
                DurationOrder::Desc
            },
            size,
        })
    }

    /// Elasticsearch `_search` request body.
    pub fn to_dsl(&self) -> Value {
        json!({
            "size": self.size,
            "query": {
                "bool": {
                    "must": self.must.iter().map(MatchClause::to_dsl).collect::<Vec<_>>(),
                    "filter": self.filter.iter().map(TermFilter::to_dsl).collect::<Vec<_>>(),
                }
            },
            "sort": [
                { "duration": { "order": self.sort.as_str(), "missing": "_last", "unmapped_type": "integer" } }
            ]
        })
    }

    pub fn matches(&self, doc: &TrackDocument) -> bool {
        self.must.iter().all(|c| c.matches(doc)) && self.filter.iter().all(|f| f.matches(doc))
    }

    /// Evaluate against an in-memory document set.
    pub fn execute<'a, I>(&self, docs: I) -> Vec<TrackDocument>
    where
        I: IntoIterator<Item = &'a TrackDocument>,
    {
        let mut hits: Vec<&TrackDocument> = docs.into_iter().filter(|d| self.matches(d)).collect();
        hits.sort_by(|a, b| self.compare(a, b).then_with(|| a.id.cmp(&b.id)));
        hits.into_iter().take(self.size).cloned().collect()
    }

    fn compare(&self, a: &TrackDocument, b: &TrackDocument) -> Ordering {
        match (a.duration, b.duration) {
            (Some(x), Some(y)) => match self.sort {
                DurationOrder::Asc => x.cmp(&y),
                DurationOrder::Desc => y.cmp(&x),
            },
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
}

/// Case-folded alphanumeric tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Edit budget Elasticsearch applies for `fuzziness: AUTO`.
fn auto_fuzziness(term: &str) -> usize {
    match term.chars().count() {
        0..=2 => 0,
        3..=5 => 1,
        _ => 2,
    }
}

/// Optimal string alignment distance: Levenshtein plus adjacent transpositions.
fn osa_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (n, m) = (a.len(), b.len());
    let mut d = vec![vec![0usize; m + 1]; n + 1];
    for (i, row) in d.iter_mut().enumerate() {
        row[0] = i;
    }
    for j in 0..=m {
        d[0][j] = j;
    }
    for i in 1..=n {
        for j in 1..=m {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            let mut best = (d[i - 1][j] + 1).min(d[i][j - 1] + 1).min(d[i - 1][j - 1] + cost);
            if i > 1 && j > 1 && a[i - 1] == b[j - 2] && a[i - 2] == b[j - 1] {
                best = best.min(d[i - 2][j - 2] + 1);
            }
            d[i][j] = best;
        }
    }
    d[n][m]
}
