//! Admin upload: working set, batch submit, progress.

#![allow(clippy::indexing_slicing)]

use picture_gallery_integration_tests::{PASSWORD, TestApp, location};
use picture_gallery_web::platform::memory::Fault;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde_json::Value;

/// Smallest valid PNG header; the platform only sees bytes.
const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

async fn signed_in_admin(app: &TestApp) -> Client {
    app.add_admin("admin@example.com");
    let browser = TestApp::browser();
    let resp = app.login(&browser, "admin@example.com", PASSWORD).await;
    assert_eq!(location(&resp), "/admin/dashboard");
    browser
}

fn file(name: &str, content_type: &str, bytes: &[u8]) -> Part {
    Part::bytes(bytes.to_vec())
        .file_name(name.to_string())
        .mime_str(content_type)
        .expect("Invalid content type")
}

async fn add_files(app: &TestApp, browser: &Client, parts: Vec<Part>) {
    let form = parts
        .into_iter()
        .fold(Form::new(), |form, part| form.part("files", part));
    let resp = browser
        .post(app.url("/pictures/upload/files"))
        .multipart(form)
        .send()
        .await
        .expect("Failed to post files");
    assert_eq!(location(&resp), "/pictures/upload");
}

async fn upload_page(app: &TestApp, browser: &Client) -> String {
    let resp = app.get(browser, "/pictures/upload").await;
    assert_eq!(resp.status(), StatusCode::OK);
    resp.text().await.expect("Failed to read response")
}

async fn progress(app: &TestApp, browser: &Client) -> Value {
    app.get(browser, "/pictures/upload/progress")
        .await
        .json()
        .await
        .expect("Progress is not JSON")
}

#[tokio::test]
async fn test_batch_upload_stores_every_file() {
    let app = TestApp::spawn().await;
    let browser = signed_in_admin(&app).await;

    add_files(
        &app,
        &browser,
        vec![
            file("one.png", "image/png", PNG),
            file("two.png", "image/png", PNG),
            file("three.jpg", "image/jpeg", b"\xff\xd8\xff\xe0"),
        ],
    )
    .await;

    let body = upload_page(&app, &browser).await;
    assert!(body.contains("one.png"));
    assert!(body.contains("three.jpg"));

    let resp = app.post(&browser, "/pictures/upload").await;
    assert_eq!(location(&resp), "/pictures");
    assert_eq!(app.image_count(), 3);
    assert_eq!(app.file_count(), 3);

    let progress = progress(&app, &browser).await;
    assert_eq!(progress["completed"], 3);
    assert_eq!(progress["total"], 3);
    assert_eq!(progress["percent"], 100);

    let resp = app.get(&browser, "/pictures").await;
    let body = resp.text().await.expect("Failed to read response");
    assert!(body.contains("Uploaded 3 images"));
    assert!(body.contains("two.png"));

    // The working set is cleared after a successful batch
    let body = upload_page(&app, &browser).await;
    assert!(!body.contains("one.png"));
}

#[tokio::test]
async fn test_uploaded_image_is_served() {
    let app = TestApp::spawn().await;
    let browser = signed_in_admin(&app).await;
    add_files(&app, &browser, vec![file("one.png", "image/png", PNG)]).await;
    app.post(&browser, "/pictures/upload").await;

    let body = app
        .get(&browser, "/pictures")
        .await
        .text()
        .await
        .expect("Failed to read response");
    let start = body.find("/storage/buckets/").expect("image URL missing");
    let end = start + body[start..].find('"').expect("unterminated URL");
    let path = body[start..end].replace("&amp;", "&");

    let resp = app.get(&browser, &path).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["content-type"], "image/png");
    assert_eq!(&resp.bytes().await.expect("Failed to read image")[..], PNG);
}

#[tokio::test]
async fn test_submit_without_files_makes_no_platform_calls() {
    let app = TestApp::spawn().await;
    let browser = signed_in_admin(&app).await;

    let resp = app.post(&browser, "/pictures/upload").await;
    assert_eq!(location(&resp), "/pictures/upload");
    assert_eq!(app.platform.call_count("create_file"), 0);
    assert_eq!(app.platform.call_count("create_document"), 0);

    let body = upload_page(&app, &browser).await;
    assert!(body.contains("Please select at least one image"));
}

#[tokio::test]
async fn test_non_images_are_rejected_by_name() {
    let app = TestApp::spawn().await;
    let browser = signed_in_admin(&app).await;

    add_files(
        &app,
        &browser,
        vec![
            file("cat.png", "image/png", PNG),
            file("notes.txt", "text/plain", b"hello"),
        ],
    )
    .await;

    let body = upload_page(&app, &browser).await;
    assert!(body.contains("notes.txt is not a valid image file"));
    assert!(body.contains("cat.png"));
}

#[tokio::test]
async fn test_remove_file_from_working_set() {
    let app = TestApp::spawn().await;
    let browser = signed_in_admin(&app).await;
    add_files(
        &app,
        &browser,
        vec![
            file("keep.png", "image/png", PNG),
            file("drop.png", "image/png", PNG),
        ],
    )
    .await;

    let resp = app.post(&browser, "/pictures/upload/remove/1").await;
    assert_eq!(location(&resp), "/pictures/upload");

    let body = upload_page(&app, &browser).await;
    assert!(body.contains("keep.png"));
    assert!(!body.contains("drop.png"));

    let resp = app.post(&browser, "/pictures/upload/remove/5").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_partial_failure_reports_failed_files() {
    let app = TestApp::spawn().await;
    let browser = signed_in_admin(&app).await;
    app.platform.inject_fault(Fault::Upload("bad.png".to_string()));

    add_files(
        &app,
        &browser,
        vec![
            file("good.png", "image/png", PNG),
            file("bad.png", "image/png", PNG),
        ],
    )
    .await;

    let resp = app.post(&browser, "/pictures/upload").await;
    assert_eq!(location(&resp), "/pictures/upload");
    assert_eq!(app.image_count(), 1);

    let body = upload_page(&app, &browser).await;
    assert!(body.contains("Failed to upload images. Please try again."));
    assert!(body.contains("bad.png:"));
}

#[tokio::test]
async fn test_progress_before_any_batch() {
    let app = TestApp::spawn().await;
    let browser = signed_in_admin(&app).await;

    let progress = progress(&app, &browser).await;
    assert_eq!(progress["total"], 0);
    assert_eq!(progress["percent"], 0);
}

#[tokio::test]
async fn test_dashboard_counts_images_and_pending_files() {
    let app = TestApp::spawn().await;
    let browser = signed_in_admin(&app).await;
    app.add_image("first", "nature", "2024-01-01T10:00:00.000+00:00");
    app.add_image("second", "nature", "2024-01-02T10:00:00.000+00:00");
    add_files(&app, &browser, vec![file("queued.png", "image/png", PNG)]).await;

    let body = app
        .get(&browser, "/admin/dashboard")
        .await
        .text()
        .await
        .expect("Failed to read response");
    let compact: String = body.split_whitespace().collect();
    assert!(compact.contains("<dd>2</dd>"));
    assert!(compact.contains("<dd>1</dd>"));
}
