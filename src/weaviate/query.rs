// movievec/src/weaviate/query.rs
// GraphQL query construction and response decoding for the store's read
// path. All ranking (distance, BM25, hybrid fusion, generation) happens
// server-side; this module only renders requests and unpacks results.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use crate::error::{LoaderError, Result};

/// Search operator for a query. The store embeds text and image inputs
/// itself; `NearVector` carries a caller-computed vector.
#[derive(Debug, Clone)]
pub enum SearchInput {
    NearText(String),
    NearVector(Vec<f32>),
    /// Base64-encoded image payload.
    NearImage(String),
    Bm25(String),
    Hybrid {
        query:  String,
        vector: Option<Vec<f32>>,
    },
}

impl SearchInput {
    /// Near-style searches rank by ascending distance; keyword and hybrid
    /// searches rank by descending score.
    fn ranks_by_distance(&self) -> bool {
        matches!(
            self,
            SearchInput::NearText(_) | SearchInput::NearVector(_) | SearchInput::NearImage(_)
        )
    }
}

/// Attribute predicate pushed down to the store. Filtering semantics
/// (pre- vs post-filter) are the store's contract.
#[derive(Debug, Clone)]
pub enum Filter {
    DateGreaterThan {
        property: String,
        value:    DateTime<Utc>,
    },
}

impl Filter {
    pub fn release_date_after(value: DateTime<Utc>) -> Self {
        Filter::DateGreaterThan {
            property: "release_date".to_string(),
            value,
        }
    }

    fn render(&self) -> String {
        match self {
            Filter::DateGreaterThan { property, value } => format!(
                "where: {{path: [{}], operator: GreaterThan, valueDate: {}}}",
                gql_string(property),
                gql_string(&value.to_rfc3339_opts(SecondsFormat::Secs, true))
            ),
        }
    }
}

/// Generation request attached to a retrieval: one generated text per
/// object (single prompt) or one text for the whole result set (grouped).
#[derive(Debug, Clone)]
pub enum GenerativeTask {
    /// Prompt template; `{property}` placeholders are interpolated by the
    /// store from each retrieved object.
    SinglePrompt(String),
    GroupedTask {
        task:       String,
        /// Properties exposed to the grouped prompt; empty means all.
        properties: Vec<String>,
    },
}

#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Named vector to search against when the collection has several.
    pub target_vector:     Option<String>,
    pub filter:            Option<Filter>,
    /// Properties to return; defaults to the base movie set.
    pub return_properties: Option<Vec<String>>,
    pub generative:        Option<GenerativeTask>,
}

const DEFAULT_RETURN_PROPERTIES: [&str; 6] = [
    "title",
    "overview",
    "vote_average",
    "genre_ids",
    "release_date",
    "tmdb_id",
];

#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub collection: String,
    pub input:      SearchInput,
    pub limit:      usize,
    pub options:    QueryOptions,
}

impl QueryRequest {
    pub fn new(collection: &str, input: SearchInput, limit: usize) -> Self {
        QueryRequest {
            collection: collection.to_string(),
            input,
            limit,
            options: QueryOptions::default(),
        }
    }

    pub fn with_options(mut self, options: QueryOptions) -> Self {
        self.options = options;
        self
    }

    /// Renders the full GraphQL document.
    pub fn to_graphql(&self) -> String {
        let mut args = vec![format!("limit: {}", self.limit)];
        args.push(self.render_operator());
        if let Some(filter) = &self.options.filter {
            args.push(filter.render());
        }

        let properties = match &self.options.return_properties {
            Some(props) => props.clone(),
            None => DEFAULT_RETURN_PROPERTIES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        };

        format!(
            "{{ Get {{ {}({}) {{ {} {} }} }} }}",
            self.collection,
            args.join(", "),
            properties.join(" "),
            self.render_additional()
        )
    }

    fn render_operator(&self) -> String {
        let target = self
            .options
            .target_vector
            .as_ref()
            .map(|name| format!(", targetVectors: [{}]", gql_string(name)))
            .unwrap_or_default();

        match &self.input {
            SearchInput::NearText(query) => {
                format!(
                    "nearText: {{concepts: [{}]{}}}",
                    gql_string(query),
                    target
                )
            },
            SearchInput::NearVector(vector) => {
                format!(
                    "nearVector: {{vector: {}{}}}",
                    render_vector(vector),
                    target
                )
            },
            SearchInput::NearImage(image_b64) => {
                format!(
                    "nearImage: {{image: {}{}}}",
                    gql_string(image_b64),
                    target
                )
            },
            SearchInput::Bm25(query) => {
                format!("bm25: {{query: {}}}", gql_string(query))
            },
            SearchInput::Hybrid { query, vector } => {
                let vector_arg = vector
                    .as_ref()
                    .map(|v| format!(", vector: {}", render_vector(v)))
                    .unwrap_or_default();
                format!(
                    "hybrid: {{query: {}{}{}}}",
                    gql_string(query),
                    vector_arg,
                    target
                )
            },
        }
    }

    fn render_additional(&self) -> String {
        let metadata = if self.input.ranks_by_distance() {
            "distance"
        } else {
            "score"
        };

        let generate = match &self.options.generative {
            None => String::new(),
            Some(GenerativeTask::SinglePrompt(prompt)) => format!(
                " generate(singleResult: {{prompt: {}}}) {{ singleResult error }}",
                gql_string(prompt)
            ),
            Some(GenerativeTask::GroupedTask { task, properties }) => {
                let props = if properties.is_empty() {
                    String::new()
                } else {
                    format!(
                        ", properties: [{}]",
                        properties
                            .iter()
                            .map(|p| gql_string(p))
                            .collect::<Vec<_>>()
                            .join(", ")
                    )
                };
                format!(
                    " generate(groupedResult: {{task: {}{}}}) {{ groupedResult error }}",
                    gql_string(task),
                    props
                )
            },
        };

        format!("_additional {{ {}{} }}", metadata, generate)
    }
}

/// One retrieved object: its properties plus whichever ranking metadata the
/// search produced, and per-object generated text for single-prompt RAG.
#[derive(Debug, Clone)]
pub struct QueryHit {
    pub properties: Value,
    pub distance:   Option<f64>,
    pub score:      Option<f64>,
    pub generated:  Option<String>,
}

#[derive(Debug, Clone)]
pub struct QueryResponse {
    pub hits:      Vec<QueryHit>,
    /// Group-level generated text for grouped-task RAG.
    pub generated: Option<String>,
}

/// Decodes the store's GraphQL response body for `collection`.
pub fn parse_query_response(collection: &str, body: Value) -> Result<QueryResponse> {
    if let Some(errors) = body.get("errors").and_then(|e| e.as_array()) {
        if !errors.is_empty() {
            let message = errors[0]
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown GraphQL error");
            return Err(LoaderError::Store(format!("query failed: {}", message)));
        }
    }

    let objects = body
        .pointer(&format!("/data/Get/{}", collection))
        .and_then(|v| v.as_array())
        .ok_or_else(|| {
            LoaderError::Store(format!(
                "query response has no results for collection {}",
                collection
            ))
        })?;

    let mut hits = Vec::with_capacity(objects.len());
    let mut grouped = None;
    for object in objects {
        let additional = object.get("_additional").cloned().unwrap_or(Value::Null);
        let generate = additional.get("generate").cloned().unwrap_or(Value::Null);
        if let Some(err) = generate.get("error").and_then(|e| e.as_str()) {
            return Err(LoaderError::Store(format!("generation failed: {}", err)));
        }
        if grouped.is_none() {
            grouped = generate
                .get("groupedResult")
                .and_then(|g| g.as_str())
                .map(|s| s.to_string());
        }

        let mut properties = object.clone();
        if let Some(map) = properties.as_object_mut() {
            map.remove("_additional");
        }

        hits.push(QueryHit {
            properties,
            distance: additional.get("distance").and_then(|d| d.as_f64()),
            score: score_from_additional(&additional),
            generated: generate
                .get("singleResult")
                .and_then(|g| g.as_str())
                .map(|s| s.to_string()),
        });
    }

    Ok(QueryResponse {
        hits,
        generated: grouped,
    })
}

// The store reports score either as a number or a numeric string depending
// on version.
fn score_from_additional(additional: &Value) -> Option<f64> {
    match additional.get("score") {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    }
}

fn render_vector(vector: &[f32]) -> String {
    let components: Vec<String> = vector.iter().map(|v| v.to_string()).collect();
    format!("[{}]", components.join(", "))
}

/// Escapes a string for embedding in a GraphQL document.
fn gql_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    #[test]
    fn near_text_asks_for_distance_and_limit() {
        let gql = QueryRequest::new(
            "Movie",
            SearchInput::NearText("dystopian future".to_string()),
            5,
        )
        .to_graphql();

        assert!(gql.contains("Movie(limit: 5, nearText: {concepts: [\"dystopian future\"]})"));
        assert!(gql.contains("_additional { distance }"));
        assert!(gql.contains("title overview vote_average genre_ids release_date tmdb_id"));
    }

    #[test]
    fn bm25_and_hybrid_ask_for_score() {
        let bm25 = QueryRequest::new("Movie", SearchInput::Bm25("history".to_string()), 5)
            .to_graphql();
        assert!(bm25.contains("bm25: {query: \"history\"}"));
        assert!(bm25.contains("_additional { score }"));

        let hybrid = QueryRequest::new(
            "Movie",
            SearchInput::Hybrid {
                query:  "history".to_string(),
                vector: Some(vec![0.5, -1.0]),
            },
            5,
        )
        .to_graphql();
        assert!(hybrid.contains("hybrid: {query: \"history\", vector: [0.5, -1]}"));
        assert!(hybrid.contains("_additional { score }"));
    }

    #[test]
    fn filter_renders_where_clause() {
        let threshold = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let gql = QueryRequest::new(
            "Movie",
            SearchInput::NearText("dystopian future".to_string()),
            5,
        )
        .with_options(QueryOptions {
            filter: Some(Filter::release_date_after(threshold)),
            ..Default::default()
        })
        .to_graphql();

        assert!(gql.contains(
            "where: {path: [\"release_date\"], operator: GreaterThan, \
             valueDate: \"2020-01-01T00:00:00Z\"}"
        ));
    }

    #[test]
    fn target_vector_selects_named_vector() {
        let gql = QueryRequest::new(
            "MovieNVDemo",
            SearchInput::NearText("A joyful holiday film".to_string()),
            5,
        )
        .with_options(QueryOptions {
            target_vector: Some("title".to_string()),
            ..Default::default()
        })
        .to_graphql();

        assert!(gql.contains("targetVectors: [\"title\"]"));
    }

    #[test]
    fn near_image_embeds_payload() {
        let gql = QueryRequest::new(
            "MovieNVDemo",
            SearchInput::NearImage("aGVsbG8=".to_string()),
            10,
        )
        .to_graphql();
        assert!(gql.contains("nearImage: {image: \"aGVsbG8=\"}"));
    }

    #[test]
    fn generative_prompts_are_escaped() {
        let gql = QueryRequest::new(
            "Movie",
            SearchInput::NearText("dystopian future".to_string()),
            5,
        )
        .with_options(QueryOptions {
            generative: Some(GenerativeTask::SinglePrompt(
                "Translate \"this\" into French: {title}".to_string(),
            )),
            ..Default::default()
        })
        .to_graphql();

        assert!(gql.contains(
            "generate(singleResult: {prompt: \"Translate \\\"this\\\" into French: {title}\"})"
        ));
        assert!(gql.contains("{ singleResult error }"));
    }

    #[test]
    fn control_characters_are_escaped_in_query_strings() {
        let gql = QueryRequest::new(
            "Movie",
            SearchInput::Bm25("null\u{0} bell\u{7} escape\u{1b}".to_string()),
            5,
        )
        .to_graphql();
        assert!(gql.contains("bm25: {query: \"null\\u0000 bell\\u0007 escape\\u001b\"}"));
    }

    #[test]
    fn grouped_task_lists_prompt_properties() {
        let gql = QueryRequest::new(
            "MovieNVDemo",
            SearchInput::NearText("dystopian future".to_string()),
            5,
        )
        .with_options(QueryOptions {
            generative: Some(GenerativeTask::GroupedTask {
                task:       "What do these movies have in common?".to_string(),
                properties: vec!["title".to_string(), "overview".to_string()],
            }),
            ..Default::default()
        })
        .to_graphql();

        assert!(gql.contains("groupedResult: {task: \"What do these movies have in common?\""));
        assert!(gql.contains("properties: [\"title\", \"overview\"]"));
    }

    #[test]
    fn parses_hits_with_distance() {
        let body = json!({
            "data": { "Get": { "Movie": [
                {
                    "title": "Nearest",
                    "tmdb_id": 1,
                    "_additional": { "distance": 0.12 }
                },
                {
                    "title": "Further",
                    "tmdb_id": 2,
                    "_additional": { "distance": 0.48 }
                }
            ]}}
        });

        let response = parse_query_response("Movie", body).unwrap();
        assert_eq!(response.hits.len(), 2);
        assert_eq!(response.hits[0].properties["title"], "Nearest");
        assert_eq!(response.hits[0].distance, Some(0.12));
        assert!(response.hits[0].properties.get("_additional").is_none());
        assert!(response.hits[0].distance <= response.hits[1].distance);
        assert!(response.generated.is_none());
    }

    #[test]
    fn parses_string_scores_and_grouped_generation() {
        let body = json!({
            "data": { "Get": { "Movie": [
                {
                    "title": "A",
                    "_additional": {
                        "score": "0.75",
                        "generate": { "groupedResult": "They are all westerns.", "error": null }
                    }
                },
                {
                    "title": "B",
                    "_additional": { "score": "0.50", "generate": { "error": null } }
                }
            ]}}
        });

        let response = parse_query_response("Movie", body).unwrap();
        assert_eq!(response.hits[0].score, Some(0.75));
        assert_eq!(response.hits[1].score, Some(0.50));
        assert_eq!(response.generated.as_deref(), Some("They are all westerns."));
    }

    #[test]
    fn graphql_errors_become_store_errors() {
        let body = json!({
            "errors": [ { "message": "no such class" } ],
            "data": null
        });
        let res = parse_query_response("Movie", body);
        assert!(matches!(res, Err(LoaderError::Store(_))));
    }

    #[test]
    fn generation_error_surfaces() {
        let body = json!({
            "data": { "Get": { "Movie": [
                {
                    "title": "A",
                    "_additional": { "generate": { "error": "rate limited" } }
                }
            ]}}
        });
        let res = parse_query_response("Movie", body);
        assert!(matches!(res, Err(LoaderError::Store(_))));
    }
}
