//! Draft file diff resource tests: owner-only reads, the commit filter,
//! `extra_data` changes and binary uploads.

mod common;

use axum::http::{Method, StatusCode};
use common::{basic, err_code, TestApp};
use reviewboard_lib::db::diffs::{self, NewFileDiff};
use reviewboard_lib::db::review_requests::{self, NewReviewRequest};
use reviewboard_lib::models::{DiffSet, FileDiff};
use reviewboard_lib::services::draft_filediffs::DEST_ATTACHMENT_EXISTS_ERROR;
use serde_json::json;

struct Scenario {
    app: TestApp,
    review_request_id: i64,
    diffset: DiffSet,
}

async fn scenario() -> Scenario {
    let app = TestApp::new().await;
    let submitter = app.user("doc").await;
    app.user("grumpy").await;

    let review_request = review_requests::create_review_request(
        app.pool(),
        &NewReviewRequest {
            submitter_id: submitter.id,
            summary: "Replace the logo".to_string(),
            public: true,
            ..Default::default()
        },
    )
    .await
    .unwrap();
    let diffset = diffs::create_diffset(app.pool(), review_request.id, true)
        .await
        .unwrap();

    Scenario {
        app,
        review_request_id: review_request.id,
        diffset,
    }
}

impl Scenario {
    async fn file(&self, name: &str, commit_id: Option<&str>, binary: bool) -> FileDiff {
        diffs::insert_filediff(
            self.app.pool(),
            &NewFileDiff {
                diffset_id: self.diffset.id,
                source_file: name.to_string(),
                dest_file: name.to_string(),
                source_revision: "abc123".to_string(),
                commit_id: commit_id.map(str::to_string),
                binary,
            },
        )
        .await
        .unwrap()
    }

    fn list_url(&self) -> String {
        format!(
            "/api/review-requests/{}/draft/diffs/{}/files/",
            self.review_request_id, self.diffset.revision
        )
    }

    fn url(&self, filediff: &FileDiff) -> String {
        format!("{}{}/", self.list_url(), filediff.id)
    }
}

#[tokio::test]
async fn test_owner_lists_and_gets_files() {
    let s = scenario().await;
    let readme = s.file("README", None, false).await;
    s.file("logo.png", None, true).await;

    let (status, rsp) = s
        .app
        .send(Method::GET, &s.list_url(), Some(&basic("doc")), None)
        .await;
    assert_eq!(status, StatusCode::OK, "{}", rsp);
    assert_eq!(rsp["total_results"], 2);
    assert_eq!(rsp["files"][0]["dest_file"], "README");
    assert_eq!(rsp["files"][1]["binary"], true);

    let (status, rsp) = s
        .app
        .send(Method::GET, &s.url(&readme), Some(&basic("doc")), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rsp["file"]["id"], readme.id);
    assert_eq!(rsp["file"]["source_revision"], "abc123");
    assert_eq!(rsp["file"]["extra_data"], json!({}));
    assert!(rsp["file"]["dest_attachment"].is_null());
}

#[tokio::test]
async fn test_draft_files_hidden_from_others() {
    let s = scenario().await;
    let readme = s.file("README", None, false).await;

    let (status, rsp) = s.app.send(Method::GET, &s.list_url(), None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(err_code(&rsp), 103);

    let (status, rsp) = s
        .app
        .send(Method::GET, &s.url(&readme), Some(&basic("grumpy")), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(err_code(&rsp), 101);

    let (status, _) = s
        .app
        .send(
            Method::PUT,
            &s.url(&readme),
            Some(&basic("grumpy")),
            Some(json!({"extra_data.lint": "clean"})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    s.app.superuser("admin").await;
    let (status, _) = s
        .app
        .send(Method::GET, &s.url(&readme), Some(&basic("admin")), None)
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_list_filtered_by_commit() {
    let s = scenario().await;
    s.file("a.c", Some("r1"), false).await;
    let b = s.file("b.c", Some("r2"), false).await;
    s.file("c.c", Some("r1"), false).await;

    let (status, rsp) = s
        .app
        .send(
            Method::GET,
            &format!("{}?commit-id=r2", s.list_url()),
            Some(&basic("doc")),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rsp["total_results"], 1);
    assert_eq!(rsp["files"][0]["id"], b.id);
    assert_eq!(rsp["files"][0]["commit_id"], "r2");

    let (status, rsp) = s
        .app
        .send(
            Method::GET,
            &format!("{}?commit-id=missing", s.list_url()),
            Some(&basic("doc")),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rsp["total_results"], 0);
    assert_eq!(rsp["files"], json!([]));
}

#[tokio::test]
async fn test_update_extra_data() {
    let s = scenario().await;
    let readme = s.file("README", None, false).await;

    let (status, rsp) = s
        .app
        .send(
            Method::PUT,
            &s.url(&readme),
            Some(&basic("doc")),
            Some(json!({"extra_data.lint": "clean", "extra_data.score": 3})),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", rsp);
    assert_eq!(rsp["file"]["extra_data"], json!({"lint": "clean", "score": 3}));

    let (status, rsp) = s
        .app
        .send(
            Method::PUT,
            &s.url(&readme),
            Some(&basic("doc")),
            Some(json!({"extra_data.lint": null})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rsp["file"]["extra_data"], json!({"score": 3}));

    let (status, rsp) = s
        .app
        .send(
            Method::PUT,
            &s.url(&readme),
            Some(&basic("doc")),
            Some(json!({"extra_data.__secret": "x"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err_code(&rsp), 105);
}

#[tokio::test]
async fn test_upload_dest_attachment_once() {
    let s = scenario().await;
    let logo = s.file("logo.png", None, true).await;
    let upload = json!({
        "dest_attachment_file": {
            "filename": "logo.png",
            "mimetype": "image/png",
            "content": "iVBORw==",
        }
    });

    let (status, rsp) = s
        .app
        .send(Method::PUT, &s.url(&logo), Some(&basic("doc")), Some(upload.clone()))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", rsp);
    assert_eq!(rsp["file"]["dest_attachment"]["filename"], "logo.png");
    assert_eq!(rsp["file"]["dest_attachment"]["mimetype"], "image/png");

    let (status, rsp) = s
        .app
        .send(Method::PUT, &s.url(&logo), Some(&basic("doc")), Some(upload))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err_code(&rsp), 105);
    assert_eq!(
        rsp["fields"]["dest_attachment_file"],
        DEST_ATTACHMENT_EXISTS_ERROR
    );
}

#[tokio::test]
async fn test_upload_to_text_file_rejected() {
    let s = scenario().await;
    let readme = s.file("README", None, false).await;

    let (status, rsp) = s
        .app
        .send(
            Method::PUT,
            &s.url(&readme),
            Some(&basic("doc")),
            Some(json!({"dest_attachment_file": {"filename": "README", "content": "aGk="}})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(rsp["fields"]["dest_attachment_file"].is_string());
}

#[tokio::test]
async fn test_published_or_unknown_revision_not_found() {
    let s = scenario().await;
    let readme = s.file("README", None, false).await;

    let (status, rsp) = s
        .app
        .send(
            Method::GET,
            &format!(
                "/api/review-requests/{}/draft/diffs/99/files/",
                s.review_request_id
            ),
            Some(&basic("doc")),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err_code(&rsp), 100);

    diffs::publish_diffset(s.app.pool(), s.diffset.id).await.unwrap();
    let (status, _) = s
        .app
        .send(Method::GET, &s.url(&readme), Some(&basic("doc")), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
