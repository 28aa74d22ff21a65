use std::net::SocketAddr;
use std::time::Duration;

use condarel_github::{GitHubConfig, GitHubHost, encode_content};
use condarel_host::{ArtifactRef, FileCommit, HostError, PublishedRelease, ReleaseAsset, ReleaseHost};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{body_bytes, body_json, body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const REPO: &str = "/repos/DIRACGrid/DIRACOS2";

fn host(api_root: &str) -> GitHubHost {
    let mut config = GitHubConfig::new("DIRACGrid", "DIRACOS2", "secret");
    config.api_root = api_root.to_string();
    GitHubHost::new(config).expect("client should build")
}

fn artifact(url: String) -> ArtifactRef {
    ArtifactRef {
        id: 11,
        name: "installer".to_string(),
        archive_download_url: url,
        size_in_bytes: 0,
        expired: false,
    }
}

fn release(server: &MockServer) -> PublishedRelease {
    PublishedRelease {
        id: 77,
        url: format!("{}{REPO}/releases/77", server.uri()),
        html_url: "https://github.com/DIRACGrid/DIRACOS2/releases/tag/2.1".to_string(),
        upload_url: format!("{}/uploads{REPO}/releases/77/assets{{?name,label}}", server.uri()),
        tag_name: "2.1".to_string(),
        draft: true,
        prerelease: false,
    }
}

fn release_json(server: &MockServer, draft: bool) -> serde_json::Value {
    json!({
        "id": 77,
        "url": format!("{}{REPO}/releases/77", server.uri()),
        "html_url": "https://github.com/DIRACGrid/DIRACOS2/releases/tag/2.1",
        "upload_url": format!("{}/uploads{REPO}/releases/77/assets{{?name,label}}", server.uri()),
        "tag_name": "2.1",
        "draft": draft,
        "prerelease": false,
    })
}

#[tokio::test]
async fn list_builds_asks_for_successful_runs_with_auth_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{REPO}/actions/workflows/build-and-test.yml/runs")))
        .and(query_param("branch", "main"))
        .and(query_param("status", "success"))
        .and(header("accept", "application/vnd.github.v3+json"))
        .and(header("authorization", "token secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total_count": 1,
            "workflow_runs": [{
                "id": 42,
                "head_sha": "abc123",
                "head_branch": "main",
                "conclusion": "success",
                "created_at": "2024-05-03T08:00:00Z",
                "html_url": "https://github.com/DIRACGrid/DIRACOS2/actions/runs/42",
                "status": "completed"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let runs = host(&server.uri())
        .list_builds("build-and-test.yml", "main")
        .await
        .expect("runs should be listed");

    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].id, 42);
    assert_eq!(runs[0].head_sha, "abc123");
    assert!(runs[0].succeeded());
}

#[tokio::test]
async fn get_build_maps_404_to_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{REPO}/actions/runs/99")))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Not Found"})))
        .mount(&server)
        .await;

    let error = host(&server.uri())
        .get_build(99)
        .await
        .expect_err("missing run should fail");

    assert_eq!(error, HostError::not_found("workflow run 99"));
}

#[tokio::test]
async fn server_error_keeps_short_body_snippet() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{REPO}/actions/runs/5/artifacts")))
        .respond_with(ResponseTemplate::new(500).set_body_string("x".repeat(400)))
        .mount(&server)
        .await;

    let error = host(&server.uri())
        .list_artifacts(5)
        .await
        .expect_err("server error should fail");

    let HostError::HttpStatus {
        operation,
        status,
        body_snippet,
    } = &error
    else {
        panic!("expected HTTP status error, got {error:?}");
    };
    assert_eq!(*operation, "list artifacts");
    assert_eq!(*status, 500);
    assert_eq!(*body_snippet, format!(": {}", "x".repeat(160)));
}

#[tokio::test]
async fn download_artifact_returns_zip_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/artifacts/11/zip"))
        .and(header("authorization", "token secret"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"PK\x03\x04zip".to_vec(), "application/zip"))
        .mount(&server)
        .await;

    let data = host(&server.uri())
        .download_artifact(&artifact(format!("{}/artifacts/11/zip", server.uri())))
        .await
        .expect("download should succeed");

    assert_eq!(data, b"PK\x03\x04zip");
}

#[tokio::test]
async fn download_artifact_rejects_non_zip_content() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/artifacts/11/zip"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"<html></html>".to_vec(), "text/html"))
        .mount(&server)
        .await;

    let error = host(&server.uri())
        .download_artifact(&artifact(format!("{}/artifacts/11/zip", server.uri())))
        .await
        .expect_err("HTML body should be rejected");

    assert!(matches!(
        error,
        HostError::InvalidResponse { operation: "download artifact", ref details }
            if details.contains("text/html")
    ));
}

#[tokio::test]
async fn create_release_posts_draft() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{REPO}/releases")))
        .and(body_partial_json(json!({
            "tag_name": "2.1",
            "target_commitish": "abc123",
            "draft": true,
            "prerelease": false
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(release_json(&server, true)))
        .expect(1)
        .mount(&server)
        .await;

    let created = host(&server.uri())
        .create_release(&condarel_host::NewRelease {
            tag_name: "2.1".to_string(),
            target_commitish: "abc123".to_string(),
            name: "2.1".to_string(),
            body: "# DIRACOS 2.1".to_string(),
            draft: true,
            prerelease: false,
        })
        .await
        .expect("release should be created");

    assert_eq!(created.id, 77);
    assert!(created.draft);
    assert!(created.upload_url.ends_with("{?name,label}"));
}

#[tokio::test]
async fn upload_asset_posts_named_body_with_content_type() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/uploads{REPO}/releases/77/assets")))
        .and(query_param("name", "DIRACOS-2.1-Linux-x86_64.sh"))
        .and(header("content-type", "application/x-sh"))
        .and(body_bytes(b"#!/bin/sh\necho hi\n".to_vec()))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 1})))
        .expect(1)
        .mount(&server)
        .await;

    let asset = ReleaseAsset::new(
        "DIRACOS-2.1-Linux-x86_64.sh",
        "application/x-sh",
        b"#!/bin/sh\necho hi\n".to_vec(),
    );
    host(&server.uri())
        .upload_asset(&release(&server), &asset)
        .await
        .expect("upload should succeed");
}

#[tokio::test]
async fn publish_release_sends_make_latest_as_string() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path(format!("{REPO}/releases/77")))
        .and(body_json(json!({"draft": false, "make_latest": "true"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(release_json(&server, false)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path(format!("{REPO}/releases/77")))
        .and(body_json(json!({"draft": false, "make_latest": "false"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(release_json(&server, false)))
        .expect(1)
        .mount(&server)
        .await;

    let host = host(&server.uri());
    let draft = release(&server);

    let latest = host
        .publish_release(&draft, true)
        .await
        .expect("publish as latest should succeed");
    host.publish_release(&draft, false)
        .await
        .expect("publish without latest should succeed");

    assert!(!latest.draft);
}

#[tokio::test]
async fn get_file_decodes_wrapped_base64() {
    let server = MockServer::start().await;
    let mut encoded = encode_content("name: DIRACOS\nversion: 2.2a1\n");
    encoded.insert(8, '\n');
    Mock::given(method("GET"))
        .and(path(format!("{REPO}/contents/construct.yaml")))
        .and(query_param("ref", "main"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "path": "construct.yaml",
            "sha": "blob-sha",
            "content": encoded,
            "encoding": "base64"
        })))
        .mount(&server)
        .await;

    let file = host(&server.uri())
        .get_file("construct.yaml", "main")
        .await
        .expect("file should be read");

    assert_eq!(file.sha, "blob-sha");
    assert_eq!(file.content, "name: DIRACOS\nversion: 2.2a1\n");
}

#[tokio::test]
async fn commit_file_puts_encoded_content_with_sha_and_branch() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path(format!("{REPO}/contents/construct.yaml")))
        .and(body_json(json!({
            "message": "Bump version to 2.2a1",
            "content": encode_content("version: 2.2a1\n"),
            "sha": "blob-sha",
            "branch": "main"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": {"path": "construct.yaml"},
            "commit": {
                "sha": "new-commit",
                "html_url": "https://github.com/DIRACGrid/DIRACOS2/commit/new-commit"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let commit = host(&server.uri())
        .commit_file(&FileCommit {
            path: "construct.yaml".to_string(),
            branch: "main".to_string(),
            message: "Bump version to 2.2a1".to_string(),
            content: "version: 2.2a1\n".to_string(),
            previous_sha: "blob-sha".to_string(),
        })
        .await
        .expect("commit should succeed");

    assert_eq!(commit.sha, "new-commit");
}

/// Serves one `application/zip` response, writing `chunk_count` chunks with
/// `gap` between them.
async fn trickle_server(chunk_count: usize, chunk_len: usize, gap: Duration) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let addr = listener.local_addr().expect("listener should have an address");

    tokio::spawn(async move {
        let Ok((mut socket, _)) = listener.accept().await else {
            return;
        };
        let mut request = Vec::new();
        let mut buf = [0_u8; 1024];
        while !request.windows(4).any(|window| window == b"\r\n\r\n") {
            match socket.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(n) => request.extend_from_slice(&buf[..n]),
            }
        }

        let head = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/zip\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            chunk_count * chunk_len
        );
        if socket.write_all(head.as_bytes()).await.is_err() {
            return;
        }
        let chunk = vec![b'z'; chunk_len];
        for _ in 0..chunk_count {
            tokio::time::sleep(gap).await;
            if socket.write_all(&chunk).await.is_err() {
                return;
            }
        }
    });

    addr
}

fn host_with_idle_timeout(idle_timeout: Duration) -> GitHubHost {
    let mut config = GitHubConfig::new("DIRACGrid", "DIRACOS2", "secret");
    config.idle_timeout = idle_timeout;
    GitHubHost::new(config).expect("client should build")
}

#[tokio::test]
async fn slow_download_that_keeps_progressing_outlives_idle_timeout() {
    let addr = trickle_server(6, 4096, Duration::from_millis(300)).await;
    let host = host_with_idle_timeout(Duration::from_secs(1));

    let started = std::time::Instant::now();
    let data = host
        .download_artifact(&artifact(format!("http://{addr}/artifact.zip")))
        .await
        .expect("progressing transfer should complete");

    assert_eq!(data.len(), 6 * 4096);
    assert!(started.elapsed() > Duration::from_secs(1));
}

#[tokio::test]
async fn stalled_download_hits_idle_timeout() {
    let addr = trickle_server(2, 4096, Duration::from_secs(3)).await;
    let host = host_with_idle_timeout(Duration::from_millis(300));

    let error = host
        .download_artifact(&artifact(format!("http://{addr}/artifact.zip")))
        .await
        .expect_err("stalled transfer should fail");

    assert!(matches!(
        error,
        HostError::Network {
            operation: "download artifact",
            ..
        }
    ));
}
