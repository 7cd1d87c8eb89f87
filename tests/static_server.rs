use layoutprobe::harness;
use layoutprobe::serve::StaticServer;

fn site() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), "<h1>index</h1>").unwrap();
    std::fs::write(dir.path().join("home.html"), "<section class=hero></section>").unwrap();
    std::fs::create_dir(dir.path().join("css")).unwrap();
    std::fs::write(dir.path().join("css/site.css"), "body{margin:0}").unwrap();
    std::fs::write(dir.path().join("About us.html"), "<h1>about</h1>").unwrap();
    std::fs::create_dir(dir.path().join("img")).unwrap();
    std::fs::write(dir.path().join("img/café.svg"), "<svg/>").unwrap();
    dir
}

#[tokio::test]
async fn serves_files_with_types_and_no_cache() {
    let root = site();
    let server = StaticServer::start(root.path(), "127.0.0.1:0").unwrap();
    let base = server.base_url();
    let client = reqwest::Client::new();

    let res = client.get(format!("{}home.html", base)).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["content-type"], "text/html; charset=utf-8");
    assert_eq!(res.headers()["cache-control"], "no-cache");
    assert_eq!(res.text().await.unwrap(), "<section class=hero></section>");

    let res = client.get(format!("{}css/site.css?v=2", base)).send().await.unwrap();
    assert_eq!(res.headers()["content-type"], "text/css; charset=utf-8");

    let res = client.get(base.clone()).send().await.unwrap();
    assert_eq!(res.text().await.unwrap(), "<h1>index</h1>");

    let res = client.get(format!("{}nope.html", base)).send().await.unwrap();
    assert_eq!(res.status(), 404);

    server.shutdown();
}

#[tokio::test]
async fn serves_names_with_spaces_and_non_ascii() {
    let root = site();
    let server = StaticServer::start(root.path(), "127.0.0.1:0").unwrap();
    let base = url::Url::parse(&server.base_url()).unwrap();
    let client = reqwest::Client::new();

    let about = base.join("About us.html").unwrap();
    assert_eq!(about.path(), "/About%20us.html");
    let res = client.get(about).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "<h1>about</h1>");

    let poster = base.join("img/café.svg").unwrap();
    let res = client.get(poster).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["content-type"], "image/svg+xml");

    let res = client
        .get(format!("{}img/%2e%2e/%2e%2e/etc/passwd", base))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);

    server.shutdown();
}

#[tokio::test]
async fn preflight_distinguishes_reachable_from_unreachable() {
    let root = site();
    let server = StaticServer::start(root.path(), "127.0.0.1:0").unwrap();
    let base = url::Url::parse(&server.base_url()).unwrap();
    harness::preflight(&base, 2_000).await.unwrap();

    let addr = server.addr();
    drop(server);
    let gone = url::Url::parse(&format!("http://{}/", addr)).unwrap();
    let err = harness::preflight(&gone, 2_000).await.unwrap_err();
    assert!(err.is_configuration());
}

#[test]
fn missing_root_is_a_config_error() {
    let err = StaticServer::start("/definitely/not/here", "127.0.0.1:0").err().unwrap();
    assert!(err.is_configuration());
}
