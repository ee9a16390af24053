use async_trait::async_trait;
use common::search::SearchQuery;
use common::{TrackDocument, TrackId};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::info;

use super::{SearchError, SearchIndex};

const SUGGESTER: &str = "track-title-suggest";

/// Elasticsearch index reached over its REST API. Document id = track id.
#[derive(Clone)]
pub struct ElasticsearchIndex {
    http: reqwest::Client,
    base_url: String,
    index: String,
}

impl ElasticsearchIndex {
    /// Connect and create the index with its mapping if it does not exist.
    pub async fn connect(base_url: &str, index: &str) -> Result<Self, SearchError> {
        let es = Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            index: index.to_string(),
        };
        es.ensure_index().await?;
        Ok(es)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}{}", self.base_url, self.index, path)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        req: reqwest::RequestBuilder,
    ) -> Result<T, SearchError> {
        let response = req.send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(SearchError::Backend(format!("{status}: {body}")));
        }
        serde_json::from_str(&body).map_err(|e| SearchError::Backend(e.to_string()))
    }

    async fn ensure_index(&self) -> Result<(), SearchError> {
        let response = self.http.head(self.url("")).send().await?;
        if response.status().is_success() {
            return Ok(());
        }
        let _: Value = self
            .send_json(self.http.put(self.url("")).json(&index_mapping()))
            .await?;
        info!(index = %self.index, "Created search index");
        Ok(())
    }
}

fn index_mapping() -> Value {
    json!({
        "mappings": {
            "properties": {
                "id": { "type": "keyword" },
                "title": { "type": "text" },
                "title_suggest": { "type": "completion" },
                "artist": { "type": "text" },
                "album": { "type": "text" },
                "genre": { "type": "keyword" },
                "format": { "type": "keyword" },
                "duration": { "type": "integer" },
                "locator": { "type": "keyword", "index": false }
            }
        }
    })
}

/// Indexed form: the projection plus the completion input.
fn indexed_body(doc: &TrackDocument) -> Result<Value, SearchError> {
    let mut body = serde_json::to_value(doc).map_err(|e| SearchError::Backend(e.to_string()))?;
    if let Some(obj) = body.as_object_mut() {
        obj.insert("title_suggest".into(), json!({ "input": [doc.title] }));
    }
    Ok(body)
}

fn parse_hits(response: &Value) -> Result<Vec<TrackDocument>, SearchError> {
    let hits = response["hits"]["hits"]
        .as_array()
        .ok_or_else(|| SearchError::Backend("response has no hits array".into()))?;
    hits.iter()
        .map(|hit| {
            serde_json::from_value(hit["_source"].clone())
                .map_err(|e| SearchError::Backend(format!("malformed hit: {e}")))
        })
        .collect()
}

fn parse_suggestions(response: &Value) -> Vec<String> {
    let mut titles: Vec<String> = response["suggest"][SUGGESTER]
        .as_array()
        .into_iter()
        .flatten()
        .flat_map(|entry| entry["options"].as_array().into_iter().flatten())
        .filter_map(|option| option["text"].as_str().map(str::to_owned))
        .collect();
    titles.dedup();
    titles
}

#[async_trait]
impl SearchIndex for ElasticsearchIndex {
    async fn upsert(&self, doc: &TrackDocument) -> Result<(), SearchError> {
        let req = self
            .http
            .put(self.url(&format!("/_doc/{}", doc.id)))
            .query(&[("refresh", "wait_for")])
            .json(&indexed_body(doc)?);
        let _: Value = self.send_json(req).await?;
        Ok(())
    }

    async fn remove(&self, id: TrackId) -> Result<(), SearchError> {
        let response = self
            .http
            .delete(self.url(&format!("/_doc/{id}")))
            .query(&[("refresh", "wait_for")])
            .send()
            .await?;
        match response.status() {
            s if s.is_success() || s == StatusCode::NOT_FOUND => Ok(()),
            s => Err(SearchError::Backend(format!(
                "{s}: {}",
                response.text().await.unwrap_or_default()
            ))),
        }
    }

    async fn clear(&self) -> Result<(), SearchError> {
        let req = self
            .http
            .post(self.url("/_delete_by_query"))
            .query(&[("refresh", "true"), ("conflicts", "proceed")])
            .json(&json!({ "query": { "match_all": {} } }));
        let _: Value = self.send_json(req).await?;
        Ok(())
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<TrackDocument>, SearchError> {
        let response: Value = self
            .send_json(self.http.post(self.url("/_search")).json(&query.to_dsl()))
            .await?;
        parse_hits(&response)
    }

    async fn suggest(&self, prefix: &str, limit: usize) -> Result<Vec<String>, SearchError> {
        let body = json!({
            "_source": false,
            "suggest": {
                SUGGESTER: {
                    "prefix": prefix,
                    "completion": {
                        "field": "title_suggest",
                        "size": limit,
                        "skip_duplicates": true
                    }
                }
            }
        });
        let response: Value = self
            .send_json(self.http.post(self.url("/_search")).json(&body))
            .await?;
        Ok(parse_suggestions(&response))
    }
}
