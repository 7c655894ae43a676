//! Notion database backend.
//!
//! Each task is a page in one database with the properties `title`
//! (title), `description` (rich text), `priority` and `status` (select),
//! `deadline` (date), `tags` (multi-select) and `progress` (number).
//! Deletion archives the page.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{json, Map, Value};

use crate::config::NotionConfig;
use crate::error::{Error, Result};
use crate::task::{Priority, Task, TaskCreateInput, TaskPatch, TaskStatus, TaskStore};
use crate::view::{sort_tasks, FilterSortSpec, SortDirection, SortField};

/// Notion API version header value
pub const NOTION_VERSION: &str = "2022-06-28";

const USER_AGENT: &str = concat!("questlog/", env!("CARGO_PKG_VERSION"));
const PAGE_SIZE: u32 = 100;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct NotionTaskStore {
    agent: ureq::Agent,
    base_url: String,
    database_id: String,
    api_key: String,
}

impl NotionTaskStore {
    pub fn new(
        base_url: impl Into<String>,
        database_id: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build();
        Self {
            agent,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            database_id: database_id.into(),
            api_key: api_key.into(),
        }
    }

    /// Build from `[notion]` config. The token is read from the environment
    /// variable named by `api_key_env`.
    pub fn from_config(config: &NotionConfig) -> Result<Self> {
        let database_id = config.resolved_database_id().ok_or_else(|| {
            Error::InvalidConfig(
                "notion.database_id is not set (or export NOTION_DATABASE_ID)".to_string(),
            )
        })?;
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                Error::StoreUnavailable(format!("{} is not set", config.api_key_env))
            })?;
        Ok(Self::new(&config.base_url, database_id, api_key))
    }

    /// Send one request. A 404 comes back as `Ok(None)`.
    fn call(&self, method: &str, path: &str, body: Option<Value>) -> Result<Option<Value>> {
        let url = format!("{}/{}", self.base_url, path);
        tracing::debug!(method, url = %url, "notion request");

        let request = self
            .agent
            .request(method, &url)
            .set("Authorization", &format!("Bearer {}", self.api_key))
            .set("Notion-Version", NOTION_VERSION);
        let response = match body {
            Some(body) => request.send_json(body),
            None => request.call(),
        };

        match response {
            Ok(resp) => {
                let value: Value = resp.into_json().map_err(|err| {
                    Error::StoreUnavailable(format!("notion returned invalid JSON: {err}"))
                })?;
                Ok(Some(value))
            }
            Err(ureq::Error::Status(404, _)) => Ok(None),
            Err(ureq::Error::Status(code, resp)) => {
                let body = resp.into_string().unwrap_or_default();
                let message = serde_json::from_str::<Value>(&body)
                    .ok()
                    .and_then(|value| value["message"].as_str().map(str::to_string))
                    .unwrap_or(body);
                tracing::warn!(code, %message, "notion request rejected");
                Err(Error::StoreUnavailable(format!(
                    "notion returned HTTP {code}: {message}"
                )))
            }
            Err(err) => Err(Error::StoreUnavailable(format!(
                "notion request failed: {err}"
            ))),
        }
    }

    fn expect(&self, method: &str, path: &str, body: Option<Value>) -> Result<Value> {
        self.call(method, path, body)?.ok_or_else(|| {
            Error::StoreUnavailable(format!("notion resource not found: {path}"))
        })
    }

    /// Run a database query, following `next_cursor` until exhausted.
    fn query(&self, mut body: Value) -> Result<Vec<Task>> {
        let path = format!("databases/{}/query", self.database_id);
        let mut tasks = Vec::new();
        loop {
            let page = self.expect("POST", &path, Some(body.clone()))?;
            if let Some(results) = page["results"].as_array() {
                tasks.extend(results.iter().map(task_from_page));
            }
            match page["next_cursor"].as_str() {
                Some(cursor) if page["has_more"].as_bool().unwrap_or(false) => {
                    body["start_cursor"] = json!(cursor);
                }
                _ => break,
            }
        }
        Ok(tasks)
    }

    fn patch_page(&self, id: &str, body: Value) -> Result<Option<Task>> {
        let page = self.call("PATCH", &format!("pages/{id}"), Some(body))?;
        Ok(page.as_ref().map(task_from_page))
    }
}

impl TaskStore for NotionTaskStore {
    fn backend(&self) -> &'static str {
        "notion"
    }

    fn list(&self) -> Result<Vec<Task>> {
        self.query(json!({
            "page_size": PAGE_SIZE,
            "sorts": [{ "property": "deadline", "direction": "ascending" }],
        }))
    }

    fn create(&self, input: TaskCreateInput) -> Result<Task> {
        let body = json!({
            "parent": { "database_id": self.database_id },
            "properties": create_properties(&input),
        });
        let page = self.expect("POST", "pages", Some(body))?;
        let task = task_from_page(&page);
        tracing::info!(id = %task.id, "notion page created");
        Ok(task)
    }

    fn update(&self, id: &str, patch: TaskPatch) -> Result<Option<Task>> {
        if patch.is_empty() {
            return self.get(id);
        }
        self.patch_page(id, json!({ "properties": patch_properties(&patch) }))
    }

    fn update_progress(&self, id: &str, progress: u8) -> Result<Option<Task>> {
        let mut properties = Map::new();
        insert_progress(&mut properties, progress);
        self.patch_page(id, json!({ "properties": properties }))
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let archived = self.patch_page(id, json!({ "archived": true }))?;
        Ok(archived.is_some())
    }

    fn clear(&self) -> Result<usize> {
        let mut archived = 0;
        for task in self.list()? {
            if self.delete(&task.id)? {
                archived += 1;
            }
        }
        tracing::info!(archived, "notion database cleared");
        Ok(archived)
    }

    fn get(&self, id: &str) -> Result<Option<Task>> {
        let page = self.call("GET", &format!("pages/{id}"), None)?;
        Ok(page
            .filter(|page| !page["archived"].as_bool().unwrap_or(false))
            .as_ref()
            .map(task_from_page))
    }

    fn query_filtered(&self, spec: &FilterSortSpec) -> Result<Vec<Task>> {
        let mut tasks = self.query(query_body(spec))?;
        // Notion orders selects by option position, not by rank.
        if let Some(sort) = spec.sort {
            sort_tasks(&mut tasks, sort);
        }
        Ok(tasks)
    }
}

/// Database query body with the filters and sort pushed down to Notion.
pub fn query_body(spec: &FilterSortSpec) -> Value {
    let mut conditions = Vec::new();
    if let Some(priority) = spec.priority {
        conditions.push(json!({
            "property": "priority",
            "select": { "equals": priority.as_str() },
        }));
    }
    if let Some(status) = spec.status {
        conditions.push(json!({
            "property": "status",
            "select": { "equals": status.as_str() },
        }));
    }
    if let Some(search) = spec.search_text() {
        conditions.push(json!({
            "or": [
                { "property": "title", "title": { "contains": search } },
                { "property": "description", "rich_text": { "contains": search } },
            ]
        }));
    }

    let mut body = json!({ "page_size": PAGE_SIZE });
    if !conditions.is_empty() {
        body["filter"] = json!({ "and": conditions });
    }
    if let Some(sort) = spec.sort {
        let property = match sort.field {
            SortField::Deadline => "deadline",
            SortField::Priority => "priority",
            SortField::Progress => "progress",
        };
        let direction = match sort.direction {
            SortDirection::Ascending => "ascending",
            SortDirection::Descending => "descending",
        };
        body["sorts"] = json!([{ "property": property, "direction": direction }]);
    }
    body
}

fn text_value(content: &str) -> Value {
    json!([{ "text": { "content": content } }])
}

fn tags_value(tags: &[String]) -> Value {
    Value::Array(tags.iter().map(|tag| json!({ "name": tag })).collect())
}

fn insert_progress(properties: &mut Map<String, Value>, progress: u8) {
    let status = TaskStatus::from_progress(progress);
    properties.insert("progress".into(), json!({ "number": progress }));
    properties.insert("status".into(), json!({ "select": { "name": status.as_str() } }));
}

/// Page properties for a new task: progress 0, status "To Do"
pub fn create_properties(input: &TaskCreateInput) -> Value {
    let mut properties = Map::new();
    properties.insert("title".into(), json!({ "title": text_value(&input.title) }));
    properties.insert(
        "description".into(),
        json!({ "rich_text": text_value(&input.description) }),
    );
    properties.insert(
        "priority".into(),
        json!({ "select": { "name": input.priority.as_str() } }),
    );
    if let Some(deadline) = input.deadline {
        properties.insert("deadline".into(), json!({ "date": { "start": deadline.to_string() } }));
    }
    properties.insert("tags".into(), json!({ "multi_select": tags_value(&input.tags) }));
    insert_progress(&mut properties, 0);
    Value::Object(properties)
}

/// Page properties for the fields a patch sets. Progress also writes status.
pub fn patch_properties(patch: &TaskPatch) -> Value {
    let mut properties = Map::new();
    if let Some(title) = &patch.title {
        properties.insert("title".into(), json!({ "title": text_value(title) }));
    }
    if let Some(description) = &patch.description {
        properties.insert(
            "description".into(),
            json!({ "rich_text": text_value(description) }),
        );
    }
    if let Some(priority) = patch.priority {
        properties.insert(
            "priority".into(),
            json!({ "select": { "name": priority.as_str() } }),
        );
    }
    if let Some(deadline) = patch.deadline {
        properties.insert("deadline".into(), json!({ "date": { "start": deadline.to_string() } }));
    }
    if let Some(tags) = &patch.tags {
        properties.insert("tags".into(), json!({ "multi_select": tags_value(tags) }));
    }
    if let Some(progress) = patch.progress {
        insert_progress(&mut properties, progress);
    }
    Value::Object(properties)
}

fn plain_text(segments: &Value) -> String {
    segments
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part["plain_text"].as_str())
                .collect::<String>()
        })
        .unwrap_or_default()
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    value
        .as_str()
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|ts| ts.with_timezone(&Utc))
}

/// Map a Notion page to a task. Missing or malformed properties fall back
/// to defaults; status is taken as stored.
pub fn task_from_page(page: &Value) -> Task {
    let props = &page["properties"];

    let priority = props["priority"]["select"]["name"]
        .as_str()
        .and_then(|name| name.parse::<Priority>().ok())
        .unwrap_or_default();
    let status = props["status"]["select"]["name"]
        .as_str()
        .and_then(|name| name.parse::<TaskStatus>().ok())
        .unwrap_or_default();
    // Date-times ("2026-10-18T09:00:00Z") keep only the date part.
    let deadline = props["deadline"]["date"]["start"]
        .as_str()
        .and_then(|raw| raw.get(..10))
        .and_then(|raw| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok());
    let tags = props["tags"]["multi_select"]
        .as_array()
        .map(|tags| {
            tags.iter()
                .filter_map(|tag| tag["name"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();
    let progress = props["progress"]["number"]
        .as_f64()
        .map(|value| value.round().clamp(0.0, 100.0) as u8)
        .unwrap_or(0);

    Task {
        id: page["id"].as_str().unwrap_or_default().to_string(),
        title: plain_text(&props["title"]["title"]),
        description: plain_text(&props["description"]["rich_text"]),
        priority,
        status,
        deadline,
        tags,
        progress,
        created_at: parse_timestamp(&page["created_time"]).unwrap_or_else(Utc::now),
        updated_at: parse_timestamp(&page["last_edited_time"]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::SortSpec;

    fn sample_page() -> Value {
        json!({
            "object": "page",
            "id": "59833787-2cf9-4fdf-8782-e53db20768a5",
            "created_time": "2026-10-01T08:30:00.000Z",
            "last_edited_time": "2026-10-02T10:00:00.000Z",
            "archived": false,
            "properties": {
                "title": { "title": [
                    { "plain_text": "Write " },
                    { "plain_text": "report" }
                ]},
                "description": { "rich_text": [{ "plain_text": "Q3 numbers" }] },
                "priority": { "select": { "name": "High" } },
                "status": { "select": { "name": "In Progress" } },
                "deadline": { "date": { "start": "2026-10-20" } },
                "tags": { "multi_select": [{ "name": "work" }, { "name": "q3" }] },
                "progress": { "number": 40 }
            }
        })
    }

    #[test]
    fn page_maps_to_task() {
        let task = task_from_page(&sample_page());
        assert_eq!(task.id, "59833787-2cf9-4fdf-8782-e53db20768a5");
        assert_eq!(task.title, "Write report");
        assert_eq!(task.description, "Q3 numbers");
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.deadline, NaiveDate::from_ymd_opt(2026, 10, 20));
        assert_eq!(task.tags, vec!["work".to_string(), "q3".to_string()]);
        assert_eq!(task.progress, 40);
        assert_eq!(task.created_at.to_rfc3339(), "2026-10-01T08:30:00+00:00");
        assert!(task.updated_at.is_some());
    }

    #[test]
    fn sparse_page_uses_defaults() {
        let task = task_from_page(&json!({
            "id": "abc",
            "properties": {
                "title": { "title": [] },
                "deadline": { "date": null },
                "status": { "select": { "name": "Blocked" } }
            }
        }));
        assert_eq!(task.title, "");
        assert_eq!(task.priority, Priority::Low);
        assert_eq!(task.status, TaskStatus::ToDo);
        assert!(task.deadline.is_none());
        assert!(task.tags.is_empty());
        assert_eq!(task.progress, 0);
    }

    #[test]
    fn remote_status_is_not_rederived() {
        let mut page = sample_page();
        page["properties"]["status"]["select"]["name"] = json!("Done");
        let task = task_from_page(&page);
        assert_eq!(task.progress, 40);
        assert_eq!(task.status, TaskStatus::Done);
    }

    #[test]
    fn datetime_deadline_keeps_date() {
        let mut page = sample_page();
        page["properties"]["deadline"]["date"]["start"] = json!("2026-11-05T09:00:00.000+02:00");
        assert_eq!(
            task_from_page(&page).deadline,
            NaiveDate::from_ymd_opt(2026, 11, 5)
        );
    }

    #[test]
    fn create_properties_start_at_todo() {
        let input = TaskCreateInput {
            title: "Plan trip".to_string(),
            description: "Book flights".to_string(),
            priority: Priority::Medium,
            deadline: NaiveDate::from_ymd_opt(2026, 12, 1),
            tags: vec!["travel".to_string()],
        };
        let props = create_properties(&input);
        assert_eq!(props["title"]["title"][0]["text"]["content"], "Plan trip");
        assert_eq!(props["priority"]["select"]["name"], "Medium");
        assert_eq!(props["status"]["select"]["name"], "To Do");
        assert_eq!(props["progress"]["number"], 0);
        assert_eq!(props["deadline"]["date"]["start"], "2026-12-01");
        assert_eq!(props["tags"]["multi_select"][0]["name"], "travel");
    }

    #[test]
    fn patch_properties_only_touch_set_fields() {
        let patch = TaskPatch {
            title: Some("Renamed".to_string()),
            progress: Some(100),
            ..TaskPatch::default()
        };
        let props = patch_properties(&patch);
        let keys: Vec<&String> = props.as_object().unwrap().keys().collect();
        assert_eq!(keys.len(), 3);
        assert_eq!(props["status"]["select"]["name"], "Done");
        assert!(props.get("description").is_none());
    }

    #[test]
    fn query_body_pushes_filters_and_sort() {
        let spec = FilterSortSpec {
            priority: Some(Priority::High),
            status: Some(TaskStatus::ToDo),
            search: Some("  report ".to_string()),
            sort: Some(SortSpec {
                field: SortField::Progress,
                direction: SortDirection::Descending,
            }),
        };
        let body = query_body(&spec);
        let and = body["filter"]["and"].as_array().unwrap();
        assert_eq!(and.len(), 3);
        assert_eq!(and[0]["select"]["equals"], "High");
        assert_eq!(and[1]["select"]["equals"], "To Do");
        assert_eq!(and[2]["or"][0]["title"]["contains"], "report");
        assert_eq!(and[2]["or"][1]["rich_text"]["contains"], "report");
        assert_eq!(body["sorts"][0]["property"], "progress");
        assert_eq!(body["sorts"][0]["direction"], "descending");
    }

    #[test]
    fn empty_spec_queries_everything() {
        let body = query_body(&FilterSortSpec::default());
        assert!(body.get("filter").is_none());
        assert!(body.get("sorts").is_none());
        assert_eq!(body["page_size"], 100);
    }

    #[test]
    fn unreachable_api_is_store_unavailable() {
        let store = NotionTaskStore::new("http://127.0.0.1:9", "db", "secret");
        match store.list() {
            Err(Error::StoreUnavailable(message)) => assert!(message.contains("notion")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn missing_database_id_is_invalid_config() {
        let config = NotionConfig::default();
        if std::env::var(crate::config::NOTION_DATABASE_ID_ENV).is_err() {
            assert!(matches!(
                NotionTaskStore::from_config(&config),
                Err(Error::InvalidConfig(_))
            ));
        }
    }
}
