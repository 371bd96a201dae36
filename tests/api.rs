use std::error::Error;
use std::net::SocketAddr;

use hhd::api::{router, ApiState};
use hhd::config::{profile::ProfileStore, state::State, Config};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

async fn serve(token: Option<&str>) -> Result<(SocketAddr, tempfile::TempDir), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let api = ApiState::new(
        State::new(Config::default()),
        ProfileStore::new(dir.path().join("profiles")),
        None,
    );
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = router(api, token.map(str::to_string));
    tokio::spawn(async move { axum::serve(listener, app).await });
    Ok((addr, dir))
}

/// Send a raw HTTP/1.1 request, returning the status code and body
async fn request(
    addr: SocketAddr,
    method: &str,
    path: &str,
    headers: &[&str],
    body: &str,
) -> Result<(u16, String), Box<dyn Error>> {
    let mut stream = TcpStream::connect(addr).await?;
    let mut req = format!("{method} {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n");
    for header in headers {
        req.push_str(header);
        req.push_str("\r\n");
    }
    req.push_str(&format!("Content-Length: {}\r\n\r\n{body}", body.len()));
    stream.write_all(req.as_bytes()).await?;

    let mut response = String::new();
    stream.read_to_string(&mut response).await?;
    let status = response
        .split_whitespace()
        .nth(1)
        .ok_or("missing status")?
        .parse()?;
    let body = response
        .split_once("\r\n\r\n")
        .map(|(_, body)| body.to_string())
        .unwrap_or_default();
    Ok((status, body))
}

#[tokio::test]
async fn test_version() -> Result<(), Box<dyn Error>> {
    let (addr, _dir) = serve(None).await?;
    let (status, body) = request(addr, "GET", "/api/v1/version", &[], "").await?;
    assert_eq!(status, 200);
    assert!(body.contains(r#""version":5"#));
    Ok(())
}

#[tokio::test]
async fn test_bearer_token() -> Result<(), Box<dyn Error>> {
    let (addr, _dir) = serve(Some("s3cret")).await?;

    let (status, body) = request(addr, "GET", "/api/v1/version", &[], "").await?;
    assert_eq!(status, 401);
    assert!(body.contains("bearer token"));

    let auth = ["Authorization: Bearer s3cret"];
    let (status, _) = request(addr, "GET", "/api/v1/version", &auth, "").await?;
    assert_eq!(status, 200);
    Ok(())
}

#[tokio::test]
async fn test_state_and_profiles() -> Result<(), Box<dyn Error>> {
    let (addr, _dir) = serve(None).await?;

    let (status, body) = request(
        addr,
        "POST",
        "/api/v1/state",
        &[],
        r#"{"controller": {"emulation": "steam_deck"}}"#,
    )
    .await?;
    assert_eq!(status, 200);
    assert!(body.contains("steam_deck"));

    let (status, _) = request(addr, "POST", "/api/v1/state", &[], "not json").await?;
    assert_eq!(status, 400);

    let (status, _) = request(
        addr,
        "POST",
        "/api/v1/profile/set?profile=Battery%20Saver",
        &[],
        r#"{"tdp": {"mode": "quiet"}}"#,
    )
    .await?;
    assert_eq!(status, 200);
    let (_, body) = request(addr, "GET", "/api/v1/profile/list", &[], "").await?;
    assert_eq!(body, r#"["Battery Saver"]"#);

    let (status, body) = request(
        addr,
        "POST",
        "/api/v1/profile/apply?profile=Battery%20Saver",
        &[],
        "",
    )
    .await?;
    assert_eq!(status, 200);
    assert!(body.contains("quiet"));

    let (status, _) = request(addr, "DELETE", "/api/v1/profile/del?profile=Battery%20Saver", &[], "").await?;
    assert_eq!(status, 200);
    let (status, _) = request(addr, "GET", "/api/v1/profile/get?profile=Battery%20Saver", &[], "").await?;
    assert_eq!(status, 400);
    Ok(())
}

#[tokio::test]
async fn test_errors() -> Result<(), Box<dyn Error>> {
    let (addr, _dir) = serve(None).await?;

    let (status, body) = request(addr, "GET", "/api/v1/unknown", &[], "").await?;
    assert_eq!(status, 404);
    assert!(body.starts_with("Handheld Daemon Error (404"));

    let (status, _) = request(addr, "GET", "/api/v1/image/570/wallpaper", &[], "").await?;
    assert_eq!(status, 400);
    Ok(())
}
