//! Endpoint operation tests against a scripted server
//!
//! Covers request shapes (paths, query parameters, headers, bodies), cache
//! writes, and the failure value of each operation.

mod common;

use common::{ScriptedTransport, gerrit_body, harness};
use gerrit_relay::client::cache::FileCache;
use gerrit_relay::client::notify::NoticeLevel;
use gerrit_relay::client::request::Method;
use gerrit_relay::client::types::{CommentRange, FileContent};
use gerrit_relay::client::{ChangeField, ChangeQuery, DraftInput, Envelope, TransportError};
use serde_json::Value;

#[tokio::test]
async fn successful_change_fetch_writes_cache_once() {
    let transport =
        ScriptedTransport::respond(200, &gerrit_body(r#"{"id":"p~1","change_id":"Ichg1"}"#));
    let h = harness(transport.clone());

    let change = h.client.get_change("Ichg1", &[]).await.expect("change");
    assert_eq!(change.change_id, "Ichg1");

    let writes = h.changes.writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].0, "Ichg1");
    assert!(writes[0].1.is_empty());

    let calls = transport.calls();
    assert_eq!(calls[0].target, "https://review.example.org/a/changes/Ichg1");
    assert_eq!(calls[0].request.method, Method::Get);
    assert!(h.notifier.notices().is_empty());
}

#[tokio::test]
async fn change_fetch_sends_annotations() {
    let transport =
        ScriptedTransport::respond(200, &gerrit_body(r#"{"id":"p~1","change_id":"I1"}"#));
    let h = harness(transport.clone());

    h.client
        .get_change(
            "I1",
            &[ChangeField::CurrentRevision, ChangeField::DetailedAccounts],
        )
        .await
        .expect("change");

    let calls = transport.calls();
    let request = &calls[0].request;
    let mut fields: Vec<_> = request.query.values("o").collect();
    fields.sort_unstable();
    assert_eq!(fields, vec!["CURRENT_REVISION", "DETAILED_ACCOUNTS"]);
    assert_eq!(
        h.changes.writes()[0].1,
        vec![ChangeField::DetailedAccounts, ChangeField::CurrentRevision]
    );
}

#[tokio::test]
async fn malformed_json_yields_none_without_cache_write() {
    let transport = ScriptedTransport::respond(200, ")]}'\n{bad json");
    let h = harness(transport);

    assert!(h.client.get_change("Ichg1", &[]).await.is_none());
    assert!(h.changes.writes().is_empty());

    let notices = h.notifier.notices();
    assert_eq!(notices.len(), 1);
    assert!(notices[0].message.contains("malformed"));
}

#[tokio::test]
async fn status_failure_yields_none_without_parsing() {
    // an unparseable body proves the decoder never ran
    let transport = ScriptedTransport::respond(404, "{bad json");
    let h = harness(transport);

    assert!(h.client.get_change("Ichg1", &[]).await.is_none());
    assert!(h.changes.writes().is_empty());

    let notices = h.notifier.notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Error);
    assert!(notices[0].message.contains("404"));
    assert!(!notices[0].message.contains("malformed"));
}

#[tokio::test]
async fn unexpected_shape_is_a_failure() {
    let transport = ScriptedTransport::respond(200, &gerrit_body(r#"{"id":"p~1"}"#));
    let h = harness(transport);

    assert!(h.client.get_change("I1", &[]).await.is_none());
    assert!(h.notifier.notices()[0].message.contains("unexpected"));
}

#[tokio::test]
async fn paginated_filtered_listing() {
    let transport = ScriptedTransport::respond(
        200,
        &gerrit_body(
            r#"[[{"id":"p~1","change_id":"I1"}],[{"id":"p~2","change_id":"I2","_more_changes":true}]]"#,
        ),
    );
    let h = harness(transport.clone());

    let query = ChangeQuery::new()
        .group(["is:open"])
        .group(["owner:self"])
        .limit(25)
        .skip(50);
    let changes = h.client.list_changes(&query).await;

    let ids: Vec<_> = changes.iter().map(|c| c.change_id.as_str()).collect();
    assert_eq!(ids, vec!["I1", "I2"]);
    assert_eq!(changes[1].more_changes, Some(true));

    let calls = transport.calls();
    let call = &calls[0];
    assert_eq!(call.target, "https://review.example.org/a/changes/");
    let mut pairs: Vec<_> = call.request.query.iter().collect();
    pairs.sort_unstable();
    assert_eq!(
        pairs,
        vec![("S", "50"), ("n", "25"), ("q", "is:open"), ("q", "owner:self")]
    );

    let cached: Vec<_> = h.changes.writes().into_iter().map(|w| w.0).collect();
    assert_eq!(cached, vec!["I1", "I2"]);
}

#[tokio::test]
async fn failed_listing_is_empty() {
    let transport = ScriptedTransport::respond(500, "internal error");
    let h = harness(transport);

    let changes = h
        .client
        .list_changes(&ChangeQuery::new().group(["is:open"]))
        .await;
    assert!(changes.is_empty());
    assert!(h.changes.writes().is_empty());
    assert_eq!(h.notifier.notices().len(), 1);
}

#[tokio::test]
async fn drafts_preserve_per_file_order() {
    let transport = ScriptedTransport::respond(
        200,
        &gerrit_body(r#"{"a.txt":[{"id":"1"},{"id":"2"}],"b.txt":[{"id":"3","line":9}]}"#),
    );
    let h = harness(transport.clone());

    let drafts = h.client.get_drafts("I1").await.expect("drafts");
    let ids: Vec<_> = drafts["a.txt"].iter().map(|c| c.id()).collect();
    assert_eq!(ids, vec!["1", "2"]);
    assert_eq!(drafts["b.txt"][0].info.path.as_deref(), Some("b.txt"));
    assert_eq!(
        transport.calls()[0].target,
        "https://review.example.org/a/changes/I1/drafts"
    );
}

#[tokio::test]
async fn comments_use_the_comments_collection() {
    let transport = ScriptedTransport::respond(200, &gerrit_body(r#"{}"#));
    let h = harness(transport.clone());

    let comments = h.client.get_comments("I1").await.expect("comments");
    assert!(comments.is_empty());
    assert_eq!(
        transport.calls()[0].target,
        "https://review.example.org/a/changes/I1/comments"
    );
}

#[tokio::test]
async fn create_draft_puts_json_body() {
    let transport = ScriptedTransport::respond(
        201,
        &gerrit_body(r#"{"id":"d9","line":12,"message":"typo"}"#),
    );
    let h = harness(transport.clone());

    let mut draft = DraftInput::new("src/lib.rs", "typo");
    draft.line = Some(12);
    let created = h
        .client
        .create_draft("I1", "current", &draft)
        .await
        .expect("draft");
    assert_eq!(created.id(), "d9");
    assert_eq!(created.path, "src/lib.rs");

    let calls = transport.calls();
    let call = &calls[0];
    assert_eq!(call.request.method, Method::Put);
    assert_eq!(
        call.target,
        "https://review.example.org/a/changes/I1/revisions/current/drafts"
    );
    assert_eq!(
        call.request.headers.get("Content-Type").map(String::as_str),
        Some("application/json")
    );
    let body = call.request.body.as_ref().expect("body");
    assert_eq!(body["path"], "src/lib.rs");
    assert_eq!(body["line"], 12);
}

#[tokio::test]
async fn update_draft_sends_full_payload() {
    let transport = ScriptedTransport::respond(200, &gerrit_body(r#"{"id":"d1"}"#));
    let h = harness(transport.clone());

    let mut draft = DraftInput::new("a.txt", "please rename");
    draft.unresolved = Some(true);
    draft.patch_set = Some(3);
    draft.range = Some(CommentRange {
        start_line: 4,
        start_character: 0,
        end_line: 5,
        end_character: 10,
    });
    draft.line = Some(5);

    assert!(
        h.client
            .update_draft("I1", "abc123", "d1", &draft)
            .await
            .is_some()
    );

    let calls = transport.calls();
    let call = &calls[0];
    assert_eq!(call.request.method, Method::Put);
    assert_eq!(
        call.target,
        "https://review.example.org/a/changes/I1/revisions/abc123/drafts/d1"
    );
    let body: &Value = call.request.body.as_ref().expect("body");
    assert_eq!(body["id"], "d1");
    assert_eq!(body["unresolved"], true);
    assert_eq!(body["patch_set"], 3);
    assert_eq!(body["line"], 5);
    assert_eq!(body["range"]["start_line"], 4);
    assert!(body["updated"].is_string());
}

#[tokio::test]
async fn delete_draft_checks_status_only() {
    let transport = ScriptedTransport::respond(204, "");
    let h = harness(transport.clone());
    assert!(h.client.delete_draft("I1", "current", "d1").await);
    assert_eq!(transport.calls()[0].request.method, Method::Delete);
    assert!(transport.calls()[0].request.body.is_none());

    let missing = harness(ScriptedTransport::respond(404, "Not found"));
    assert!(!missing.client.delete_draft("I1", "current", "d1").await);
}

#[tokio::test]
async fn file_content_is_fetched_then_cached() {
    let transport = ScriptedTransport::respond(200, "aGVsbG8K");
    let h = harness(transport.clone());

    let content = h
        .client
        .get_file_content("core", "I1", "abc", "src/main.rs")
        .await
        .expect("content");
    assert_eq!(content.text, "hello\n");
    assert_eq!(
        transport.calls()[0].target,
        "https://review.example.org/a/changes/I1/revisions/abc/files/src%2Fmain.rs/content"
    );
    assert!(h.files.has("core", "abc", "src/main.rs"));

    let again = h
        .client
        .get_file_content("core", "I1", "abc", "src/main.rs")
        .await
        .expect("cached content");
    assert_eq!(again, content);
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn file_cache_hit_skips_transport() {
    let transport = ScriptedTransport::respond(500, "");
    let h = harness(transport.clone());
    let cached = FileContent {
        project: "core".into(),
        commit: "abc".into(),
        path: "README".into(),
        text: "cached".into(),
    };
    h.files.set("core", "abc", "README", cached.clone());

    assert_eq!(
        h.client.get_file_content("core", "I1", "abc", "README").await,
        Some(cached)
    );
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn failed_file_fetch_is_not_cached() {
    let transport = ScriptedTransport::respond(404, "Not found");
    let h = harness(transport);

    assert!(
        h.client
            .get_file_content("core", "I1", "abc", "README")
            .await
            .is_none()
    );
    assert!(h.files.is_empty());
}

#[tokio::test]
async fn current_user_is_fetched_with_basic_auth() {
    let transport = ScriptedTransport::respond(
        200,
        &gerrit_body(r#"{"_account_id":1000,"name":"Alice","username":"alice"}"#),
    );
    let h = harness(transport.clone());

    let account = h.client.get_self().await.expect("account");
    assert_eq!(account.account_id, 1000);
    assert_eq!(account.username.as_deref(), Some("alice"));

    let calls = transport.calls();
    let call = &calls[0];
    assert_eq!(call.target, "https://review.example.org/a/accounts/self");
    assert_eq!(
        call.request.headers.get("Authorization").map(String::as_str),
        Some("Basic YWxpY2U6c2VjcmV0")
    );
    assert!(!call.request.headers.contains_key("Content-Type"));
}

#[tokio::test]
async fn revision_files_are_listed() {
    let transport = ScriptedTransport::respond(
        200,
        &gerrit_body(r#"{"/COMMIT_MSG":{"status":"A"},"src/lib.rs":{"lines_inserted":3}}"#),
    );
    let h = harness(transport);

    let files = h
        .client
        .get_revision_files("I1", "current")
        .await
        .expect("files");
    assert_eq!(files.len(), 2);
    assert_eq!(files["src/lib.rs"].lines_inserted, Some(3));
}

#[tokio::test]
async fn probe_requires_status_200() {
    let ok = harness(ScriptedTransport::respond(200, "not even json"));
    assert!(ok.client.probe().await);
    let calls = ok.transport.calls();
    let call = &calls[0];
    assert_eq!(
        call.target,
        "https://review.example.org/config/server/version"
    );
    assert!(call.request.headers.is_empty());

    let no_content = harness(ScriptedTransport::respond(204, ""));
    assert!(!no_content.client.probe().await);

    let down = harness(ScriptedTransport::new(|_, _| {
        Err(TransportError::Connect("connection refused".into()))
    }));
    assert!(!down.client.probe().await);
    assert_eq!(down.notifier.notices().len(), 1);
}

#[tokio::test]
async fn server_version_is_decoded() {
    let h = harness(ScriptedTransport::respond(200, &gerrit_body(r#""3.9.1""#)));
    assert_eq!(h.client.server_version().await.as_deref(), Some("3.9.1"));
}

#[tokio::test]
async fn envelope_without_prefix_is_accepted() {
    let h = harness(ScriptedTransport::new(|_, _| {
        Ok(Envelope::new(200, "  {\"id\":\"p~1\",\"change_id\":\"I1\"}  "))
    }));
    assert!(h.client.get_change("I1", &[]).await.is_some());
}

#[tokio::test]
async fn server_issued_change_id_round_trips() {
    let transport = ScriptedTransport::new(|target, _| {
        if target == "https://review.example.org/a/changes/core%2Fsub~main~I1" {
            Ok(Envelope::new(
                200,
                gerrit_body(r#"{"id":"core%2Fsub~main~I1","change_id":"I1"}"#),
            ))
        } else {
            Ok(Envelope::new(404, "Not found"))
        }
    });
    let h = harness(transport.clone());

    let change = h.client.get_change("core%2Fsub~main~I1", &[]).await.expect("change");
    let again = h.client.get_change(&change.id, &[]).await;
    assert_eq!(again, Some(change));
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test]
async fn server_issued_id_reaches_revision_endpoints() {
    let transport = ScriptedTransport::respond(204, "");
    let h = harness(transport.clone());

    assert!(h.client.delete_draft("core%2Fsub~main~I1", "current", "d1").await);
    assert_eq!(
        transport.calls()[0].target,
        "https://review.example.org/a/changes/core%2Fsub~main~I1/revisions/current/drafts/d1"
    );
}

#[tokio::test]
async fn non_utf8_file_content_is_rejected_and_not_cached() {
    // 0xff 0xfe
    let transport = ScriptedTransport::respond(200, "//4=");
    let h = harness(transport);

    assert!(
        h.client
            .get_file_content("core", "I1", "abc", "logo.png")
            .await
            .is_none()
    );
    assert!(h.files.is_empty());
    assert!(h.notifier.notices()[0].message.contains("malformed"));
}
