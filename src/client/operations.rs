//! Endpoint operations
//!
//! Every operation runs the same pipeline:
//! descriptor -> mutation gate -> headers -> in-flight coordinator ->
//! status check -> envelope decode -> mapping. Failures at any stage are
//! logged, reported to the notifier, and turned into the operation's failure
//! value (`None`, `false`, or an empty `Vec`).

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;

use super::GerritClient;
use super::envelope::{Envelope, decode};
use super::error::{RequestError, RequestResult, TransportError};
use super::notify::Notice;
use super::query::{ChangeField, ChangeQuery, build_change_list_query, normalize_fields};
use super::request::{EndpointRequest, encode_id, encode_segment};
use super::types::{
    AccountInfo, ChangeInfo, Comment, CommentInfo, CommentKind, CommentMap, DraftInput,
    FileContent, FileInfo,
};

/// Anonymous endpoint used for connectivity checks.
const VERSION_PATH: &str = "config/server/version";

/// Change ids are accepted raw or as issued by the server (already encoded).
fn change_path(change_id: &str) -> String {
    format!("changes/{}", encode_id(change_id))
}

fn revision_path(change_id: &str, revision: &str) -> String {
    format!(
        "{}/revisions/{}",
        change_path(change_id),
        encode_id(revision)
    )
}

impl GerritClient {
    /// `true` iff the server answers the version endpoint with status 200.
    pub async fn probe(&self) -> bool {
        let request = EndpointRequest::get(VERSION_PATH).anonymous();
        match self.send(request).await {
            Ok(envelope) if envelope.status == 200 => true,
            Ok(envelope) => {
                let err = RequestError::Status {
                    status: envelope.status,
                    body: envelope.normalized().to_owned(),
                };
                self.report("connectivity check", &err);
                false
            }
            Err(err) => {
                self.report("connectivity check", &err);
                false
            }
        }
    }

    /// Server version string.
    pub async fn server_version(&self) -> Option<String> {
        let request = EndpointRequest::get(VERSION_PATH).anonymous();
        let result = self.fetch_json::<String>(request).await;
        self.absorb("fetch server version", result)
    }

    /// Fetch one change with the requested annotations.
    ///
    /// On success the change is written to the change cache under
    /// `(change_id, fields)`.
    pub async fn get_change(&self, change_id: &str, fields: &[ChangeField]) -> Option<ChangeInfo> {
        let request = EndpointRequest::get(change_path(change_id))
            .with_query(build_change_list_query(&[], None, fields));
        let result = self.fetch_json::<ChangeInfo>(request).await;
        let change = self.absorb("fetch change", result)?;

        self.change_cache
            .set(change_id, &normalize_fields(fields), &change);
        Some(change)
    }

    /// List changes matching `query`, flattened in filter-group order.
    ///
    /// Every returned change is written to the change cache.
    pub async fn list_changes(&self, query: &ChangeQuery) -> Vec<ChangeInfo> {
        let request = EndpointRequest::get("changes/").with_query(query.params());
        let result = match self.fetch_json::<Value>(request).await {
            Ok(value) => flatten_listing(value),
            Err(err) => Err(err),
        };
        let Some(changes) = self.absorb("list changes", result) else {
            return Vec::new();
        };

        let fields = normalize_fields(&query.fields);
        for change in &changes {
            self.change_cache.set(&change.change_id, &fields, change);
        }
        tracing::debug!(count = changes.len(), "listed changes");
        changes
    }

    /// Published comments of a change, by file.
    pub async fn get_comments(&self, change_id: &str) -> Option<CommentMap> {
        self.comment_collection(change_id, CommentKind::Published)
            .await
    }

    /// The current user's drafts on a change, by file.
    pub async fn get_drafts(&self, change_id: &str) -> Option<CommentMap> {
        self.comment_collection(change_id, CommentKind::Draft).await
    }

    async fn comment_collection(&self, change_id: &str, kind: CommentKind) -> Option<CommentMap> {
        let request = EndpointRequest::get(format!(
            "{}/{}",
            change_path(change_id),
            kind.collection()
        ));
        let result = self
            .fetch_json::<BTreeMap<String, Vec<CommentInfo>>>(request)
            .await;
        let by_file = self.absorb("fetch comments", result)?;

        Some(
            by_file
                .into_iter()
                .map(|(path, records)| {
                    let comments: Vec<Comment> = records
                        .into_iter()
                        .map(|info| Comment::new(kind, path.as_str(), info))
                        .collect();
                    (path, comments)
                })
                .collect(),
        )
    }

    /// Create a draft on `revision`.
    pub async fn create_draft(
        &self,
        change_id: &str,
        revision: &str,
        draft: &DraftInput,
    ) -> Option<Comment> {
        let body = match serde_json::to_value(draft) {
            Ok(body) => body,
            Err(err) => {
                self.report("create draft", &RequestError::Mapping(err.to_string()));
                return None;
            }
        };
        let request =
            EndpointRequest::put(format!("{}/drafts", revision_path(change_id, revision)))
                .with_body(body);
        let result = self.fetch_json::<CommentInfo>(request).await;
        let info = self.absorb("create draft", result)?;
        Some(Comment::new(CommentKind::Draft, draft.path.as_str(), info))
    }

    /// Replace draft `draft_id` with `draft`.
    ///
    /// The full payload is sent; omitted optional fields are cleared on the
    /// server.
    pub async fn update_draft(
        &self,
        change_id: &str,
        revision: &str,
        draft_id: &str,
        draft: &DraftInput,
    ) -> Option<Comment> {
        let mut payload = draft.clone();
        payload.id = Some(draft_id.to_string());
        let body = match serde_json::to_value(&payload) {
            Ok(body) => body,
            Err(err) => {
                self.report("update draft", &RequestError::Mapping(err.to_string()));
                return None;
            }
        };
        let request = EndpointRequest::put(format!(
            "{}/drafts/{}",
            revision_path(change_id, revision),
            encode_segment(draft_id)
        ))
        .with_body(body);
        let result = self.fetch_json::<CommentInfo>(request).await;
        let info = self.absorb("update draft", result)?;
        Some(Comment::new(CommentKind::Draft, payload.path, info))
    }

    /// Delete a draft. Success is the status check alone.
    pub async fn delete_draft(&self, change_id: &str, revision: &str, draft_id: &str) -> bool {
        let request = EndpointRequest::delete(format!(
            "{}/drafts/{}",
            revision_path(change_id, revision),
            encode_segment(draft_id)
        ));
        let result = self.execute(request).await.map(|_| ());
        self.absorb("delete draft", result).is_some()
    }

    /// Content of `path` at `commit`, through the file cache.
    ///
    /// `commit` doubles as the revision id of `change_id`. Failures are not
    /// cached.
    pub async fn get_file_content(
        &self,
        project: &str,
        change_id: &str,
        commit: &str,
        path: &str,
    ) -> Option<FileContent> {
        if self.file_cache.has(project, commit, path) {
            if let Some(content) = self.file_cache.get(project, commit, path) {
                tracing::debug!(project, commit, path, "file content served from cache");
                return Some(content);
            }
        }

        let request = EndpointRequest::get(format!(
            "{}/files/{}/content",
            revision_path(change_id, commit),
            encode_segment(path)
        ));
        let result = match self.execute(request).await {
            Ok(envelope) => decode_blob(&envelope),
            Err(err) => Err(err),
        };
        let text = self.absorb("fetch file content", result)?;

        let content = FileContent {
            project: project.to_string(),
            commit: commit.to_string(),
            path: path.to_string(),
            text,
        };
        self.file_cache
            .set(project, commit, path, content.clone());
        Some(content)
    }

    /// Files touched by `revision`.
    pub async fn get_revision_files(
        &self,
        change_id: &str,
        revision: &str,
    ) -> Option<BTreeMap<String, FileInfo>> {
        let request =
            EndpointRequest::get(format!("{}/files/", revision_path(change_id, revision)));
        let result = self.fetch_json(request).await;
        self.absorb("fetch revision files", result)
    }

    /// The authenticated account.
    pub async fn get_self(&self) -> Option<AccountInfo> {
        self.get_account("self").await
    }

    /// Any account by id, username, or email.
    pub async fn get_account(&self, account: &str) -> Option<AccountInfo> {
        let request = EndpointRequest::get(format!("accounts/{}", encode_segment(account)));
        let result = self.fetch_json(request).await;
        self.absorb("fetch account", result)
    }

    /// Gate, stamp headers, dispatch.
    async fn send(&self, request: EndpointRequest) -> RequestResult<Envelope> {
        self.gate.check(&request)?;
        let request = self.coordinator.gateway().prepare(request);
        Ok(self.coordinator.dispatch(request).await?)
    }

    /// [`send`](Self::send) plus the status check.
    async fn execute(&self, request: EndpointRequest) -> RequestResult<Envelope> {
        let envelope = self.send(request).await?;
        envelope.check_status()?;
        Ok(envelope)
    }

    /// [`execute`](Self::execute) plus JSON decoding and mapping.
    async fn fetch_json<T: DeserializeOwned>(&self, request: EndpointRequest) -> RequestResult<T> {
        let envelope = self.execute(request).await?;
        let value: Value = decode(envelope.normalized())?;
        serde_json::from_value(value).map_err(|err| RequestError::Mapping(err.to_string()))
    }

    fn absorb<T>(&self, operation: &str, result: RequestResult<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                self.report(operation, &err);
                None
            }
        }
    }

    /// Log `err` and tell the user. Refusals, transport faults and interrupted
    /// shared calls were already reported by the gate and the gateway.
    fn report(&self, operation: &str, err: &RequestError) {
        let kind = err.kind();
        match err {
            RequestError::Refused { .. } => {}
            RequestError::Transport(TransportError::Interrupted) => {
                tracing::debug!(operation, kind, "request interrupted before completion");
            }
            RequestError::Transport(_) => {}
            RequestError::Status { status, body } => {
                tracing::warn!(operation, kind, status, body = %body, "server rejected request");
                self.notifier.notify(Notice::error(format!(
                    "{operation} failed: server answered with status {status}"
                )));
            }
            RequestError::Envelope { reason, text } => {
                tracing::warn!(
                    operation,
                    kind,
                    reason = %reason,
                    text = %text,
                    "malformed response body"
                );
                self.notifier.notify(Notice::error(format!(
                    "{operation} failed: the server sent a malformed response"
                )));
            }
            RequestError::Mapping(detail) => {
                tracing::warn!(operation, kind, detail = %detail, "unexpected response shape");
                self.notifier.notify(Notice::error(format!(
                    "{operation} failed: unexpected response from the server"
                )));
            }
        }
    }
}

/// A single `q` yields a flat list; several yield one list per query.
fn flatten_listing(value: Value) -> RequestResult<Vec<ChangeInfo>> {
    let Value::Array(items) = value else {
        return Err(RequestError::Mapping(
            "change listing is not an array".to_string(),
        ));
    };

    let nested = !items.is_empty() && items.iter().all(Value::is_array);
    let entries: Vec<Value> = if nested {
        items
            .into_iter()
            .flat_map(|group| match group {
                Value::Array(changes) => changes,
                _ => Vec::new(),
            })
            .collect()
    } else {
        items
    };

    entries
        .into_iter()
        .map(|entry| {
            serde_json::from_value(entry).map_err(|err| RequestError::Mapping(err.to_string()))
        })
        .collect()
}

/// File content is served as base64 text, optionally behind the magic prefix.
/// Content that does not decode to UTF-8 is rejected rather than mangled.
fn decode_blob(envelope: &Envelope) -> RequestResult<String> {
    let text = envelope.normalized();
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact.as_bytes())
        .map_err(|err| RequestError::Envelope {
            reason: err.to_string(),
            text: text.to_owned(),
        })?;
    String::from_utf8(bytes).map_err(|err| RequestError::Envelope {
        reason: format!("file content is not UTF-8: {err}"),
        text: text.to_owned(),
    })
}
