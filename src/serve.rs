//! Minimal static content server for the site under test
//!
//! Serves files below a root directory with no caching and no server-side
//! behavior, so every case sees exactly the bytes on disk.

use crate::{Error, Result};
use log::{debug, info};
use percent_encoding::percent_decode_str;
use std::fs::File;
use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tiny_http::{Header, Request, Response, Server};

/// A background static file server; stops when dropped
pub struct StaticServer {
    server: Arc<Server>,
    addr: SocketAddr,
    worker: Option<JoinHandle<()>>,
}

impl StaticServer {
    /// Serve `root` on `addr` (e.g. `127.0.0.1:4173`, or port 0 for any).
    pub fn start(root: impl AsRef<Path>, addr: &str) -> Result<Self> {
        let root = root.as_ref().canonicalize().map_err(|e| {
            Error::ConfigError(format!("site root {}: {}", root.as_ref().display(), e))
        })?;
        if !root.is_dir() {
            return Err(Error::ConfigError(format!(
                "site root {} is not a directory",
                root.display()
            )));
        }

        let server = Server::http(addr)
            .map_err(|e| Error::ConfigError(format!("cannot bind {}: {}", addr, e)))?;
        let addr = server
            .server_addr()
            .to_ip()
            .ok_or_else(|| Error::ConfigError(format!("{} is not an IP listener", addr)))?;
        let server = Arc::new(server);

        let listener = server.clone();
        let worker = thread::Builder::new()
            .name("layoutprobe-serve".into())
            .spawn(move || {
                for request in listener.incoming_requests() {
                    respond(&root, request);
                }
            })?;

        info!("serving static content on http://{}", addr);
        Ok(Self {
            server,
            addr,
            worker: Some(worker),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Base URL pages can be resolved against
    pub fn base_url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.server.unblock();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for StaticServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Map a request target onto a file below `root`; `None` for anything that
/// would escape it. The path is percent-decoded before the walk, so encoded
/// `..` segments are rejected like literal ones.
fn resolve(root: &Path, target: &str) -> Option<PathBuf> {
    let raw = target.split(['?', '#']).next().unwrap_or("");
    let path = percent_decode_str(raw).decode_utf8().ok()?;
    let relative = Path::new(path.trim_start_matches('/'));
    let mut resolved = root.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if resolved.is_dir() {
        resolved.push("index.html");
    }
    Some(resolved)
}

fn content_type(path: &Path) -> String {
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    if mime.type_().as_str() == "text" {
        format!("{}; charset=utf-8", mime.essence_str())
    } else {
        mime.essence_str().to_string()
    }
}

fn header(name: &str, value: &str) -> Option<Header> {
    Header::from_bytes(name.as_bytes(), value.as_bytes()).ok()
}

fn respond(root: &Path, request: Request) {
    let target = request.url().to_string();
    let file = resolve(root, &target).and_then(|p| File::open(&p).ok().map(|f| (p, f)));

    let result = match file {
        Some((path, file)) => {
            let mut response = Response::from_file(file);
            for h in [
                header("Content-Type", &content_type(&path)),
                header("Cache-Control", "no-cache"),
            ]
            .into_iter()
            .flatten()
            {
                response.add_header(h);
            }
            request.respond(response)
        }
        None => {
            debug!("404 {}", target);
            request.respond(Response::from_string("Not Found").with_status_code(404))
        }
    };
    if let Err(e) = result {
        debug!("failed to answer {}: {}", target, e);
    }
}
