//! Preview server: serves the output directory and rebuilds the page on request
//!
//! One connection is served at a time on the calling thread, which also owns
//! the [`PageBuilder`]; there is no shared mutable state between requests.

use crate::builder::PageBuilder;
use crate::error::{BuildError, Result};
use crate::resolver::is_regular_file;
use std::fs::File;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};
use tiny_http::{Header, Method, Request, Response, Server, StatusCode};

/// Content types by file extension
pub mod mime {
    pub const HTML: &str = "text/html;charset=utf-8";
    pub const CSS: &str = "text/css;charset=utf-8";
    pub const JAVASCRIPT: &str = "text/javascript;charset=utf-8";
    pub const PNG: &str = "image/png";
    pub const JPEG: &str = "image/jpeg";
    pub const GIF: &str = "image/gif";
    pub const SVG: &str = "image/svg+xml";
    pub const PLAIN: &str = "text/plain";
    pub const OCTET_STREAM: &str = "application/octet-stream";
}

pub struct PreviewServer {
    server: Server,
    base_dir: PathBuf,
    page: PathBuf,
}

impl PreviewServer {
    /// Bind to `host:port`; an empty host listens on every interface
    pub fn bind(address: &str, page: &Path) -> Result<Self> {
        let (host, port) = parse_address(address)?;
        let host = if host.is_empty() { "0.0.0.0" } else { host };
        Self::bind_to((host, port), page)
    }

    pub(crate) fn bind_to(addr: impl ToSocketAddrs, page: &Path) -> Result<Self> {
        let server = Server::http(addr).map_err(|e| BuildError::server(format!("Failed to start server: {}", e)))?;
        Ok(Self {
            server,
            base_dir: page.parent().map(Path::to_path_buf).unwrap_or_default(),
            page: page.to_path_buf(),
        })
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.server_addr().to_ip()
    }

    /// Serve requests until the listener fails
    pub fn run(&self, builder: &mut PageBuilder) -> Result<()> {
        for request in self.server.incoming_requests() {
            if let Err(e) = self.handle(request, builder) {
                log::error!("request error: {}", e);
            }
        }
        Ok(())
    }

    /// Block until one request arrives and serve it
    pub fn handle_next(&self, builder: &mut PageBuilder) -> Result<()> {
        let request = self.server.recv()?;
        self.handle(request, builder)
    }

    fn handle(&self, request: Request, builder: &mut PageBuilder) -> Result<()> {
        if request.method() != &Method::Get {
            return send_text(request, 405, "Method not allowed");
        }

        let url = request.url().to_string();
        let file_path = map_request_path(&self.base_dir, &self.page, &url);

        if file_path == self.page {
            if let Err(e) = builder.rebuild() {
                log::error!("GET {} -> rebuild failed: {}", url, e);
                return send_text(request, 500, &format!("Build failed: {}", e));
            }
        }

        if !is_regular_file(&file_path) {
            log::info!("GET {} -> {} NOT FOUND!", url, file_path.display());
            return send_text(request, 404, "Not found");
        }
        let file = match File::open(&file_path) {
            Ok(file) => file,
            Err(e) => {
                log::info!("GET {} -> {} {}", url, file_path.display(), e);
                return send_text(request, 404, "Not found");
            }
        };

        let content_type = content_type(&file_path);
        log::info!("GET {} -> {} {}", url, file_path.display(), content_type);
        let response = Response::from_file(file).with_header(header("Content-Type", content_type)?);
        request.respond(response)?;
        Ok(())
    }
}

/// Map a request URL onto the output directory.
///
/// The query string is dropped, as are empty, `.` and `..` segments, so a
/// request can never leave `base_dir`. The directory itself maps to the page.
pub fn map_request_path(base_dir: &Path, page: &Path, url: &str) -> PathBuf {
    let path = url.split(['?', '#']).next().unwrap_or("");
    let mut file_path = base_dir.to_path_buf();
    for part in path.split('/') {
        if !part.is_empty() && part != "." && part != ".." {
            file_path.push(part);
        }
    }
    if file_path == base_dir {
        page.to_path_buf()
    } else {
        file_path
    }
}

pub fn content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "html" | "htm" => mime::HTML,
        "css" => mime::CSS,
        "js" => mime::JAVASCRIPT,
        "png" => mime::PNG,
        "jpg" | "jpeg" => mime::JPEG,
        "gif" => mime::GIF,
        "svg" => mime::SVG,
        _ => mime::OCTET_STREAM,
    }
}

/// Split `host:port`; the port must be a non-zero number
pub fn parse_address(address: &str) -> Result<(&str, u16)> {
    let sep = address
        .rfind(':')
        .ok_or_else(|| BuildError::server("Server address has no port. Failed to start server"))?;
    let port = address[sep + 1..]
        .parse::<u16>()
        .ok()
        .filter(|&p| p != 0)
        .ok_or_else(|| BuildError::server("Invalid port address. Failed to start server"))?;
    Ok((&address[..sep], port))
}

fn header(name: &str, value: &str) -> Result<Header> {
    Header::from_bytes(name.as_bytes(), value.as_bytes())
        .map_err(|_| BuildError::server(format!("Invalid header {}: {}", name, value)))
}

fn send_text(request: Request, status: u16, body: &str) -> Result<()> {
    let response = Response::from_string(body)
        .with_status_code(StatusCode(status))
        .with_header(header("Content-Type", mime::PLAIN)?);
    request.respond(response)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::SearchPaths;
    use crate::types::BuildMode;
    use std::fs;
    use std::io::{Read, Write};
    use std::net::TcpStream;
    use tempfile::TempDir;

    #[test]
    fn test_map_request_path() {
        let base = Path::new("/site");
        let page = Path::new("/site/index.html");

        assert_eq!(map_request_path(base, page, "/"), PathBuf::from("/site/index.html"));
        assert_eq!(map_request_path(base, page, "/?v=2"), PathBuf::from("/site/index.html"));
        assert_eq!(map_request_path(base, page, "/css/a.css"), PathBuf::from("/site/css/a.css"));
        assert_eq!(map_request_path(base, page, "/a.js?x=1"), PathBuf::from("/site/a.js"));
        assert_eq!(map_request_path(base, page, "/../../etc/passwd"), PathBuf::from("/site/etc/passwd"));
        assert_eq!(map_request_path(base, page, "//./img//x.png"), PathBuf::from("/site/img/x.png"));
        assert_eq!(map_request_path(base, page, "/index.html"), PathBuf::from("/site/index.html"));
    }

    #[test]
    fn test_content_type() {
        assert_eq!(content_type(Path::new("a.html")), mime::HTML);
        assert_eq!(content_type(Path::new("a.HTM")), mime::HTML);
        assert_eq!(content_type(Path::new("a.css")), mime::CSS);
        assert_eq!(content_type(Path::new("a.js")), mime::JAVASCRIPT);
        assert_eq!(content_type(Path::new("a.jpeg")), mime::JPEG);
        assert_eq!(content_type(Path::new("a.svg")), mime::SVG);
        assert_eq!(content_type(Path::new("a.woff2")), mime::OCTET_STREAM);
        assert_eq!(content_type(Path::new("Makefile")), mime::OCTET_STREAM);
    }

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("localhost:10000").unwrap(), ("localhost", 10000));
        assert_eq!(parse_address(":8080").unwrap(), ("", 8080));
        assert!(matches!(parse_address("localhost"), Err(BuildError::Server { .. })));
        assert!(parse_address("localhost:0").is_err());
        assert!(parse_address("localhost:http").is_err());
        assert!(parse_address("localhost:70000").is_err());
    }

    fn get(addr: SocketAddr, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).unwrap();
        write!(stream, "GET {} HTTP/1.0\r\nConnection: close\r\n\r\n", path).unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).unwrap();
        response
    }

    #[test]
    fn test_page_is_rebuilt_on_request() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().to_path_buf();
        fs::write(dir.join("main.js"), "first();").unwrap();
        let page = dir.join("out/index.html");

        let server = PreviewServer::bind_to("127.0.0.1:0", &page).unwrap();
        let addr = server.local_addr().unwrap();

        let worker = {
            let dir = dir.clone();
            let page = page.clone();
            std::thread::spawn(move || {
                let mut builder = PageBuilder::new(|_| {});
                builder.prepare(&dir.join("main.js"), &SearchPaths::new());
                builder.build(&page, BuildMode::OneFile).unwrap();
                fs::write(dir.join("main.js"), "second();").unwrap();
                for _ in 0..3 {
                    server.handle_next(&mut builder).unwrap();
                }
            })
        };

        // the worker rewrites main.js before it accepts the first request
        let response = get(addr, "/");
        assert!(response.starts_with("HTTP/1.1 200") || response.starts_with("HTTP/1.0 200"));
        assert!(response.contains("text/html;charset=utf-8"));
        assert!(response.contains("second();"));

        let missing = get(addr, "/nope.css");
        assert!(missing.contains(" 404 "));
        assert!(missing.contains("Not found"));

        let direct = get(addr, "/index.html");
        assert!(direct.contains("second();"));

        worker.join().unwrap();
    }
}
