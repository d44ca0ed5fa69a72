use crate::error::NestError;
use crate::graph::{DumpStyle, Graph};
use crate::node::NodeId;
use std::fs;
use std::path::{Path, PathBuf};
use tiny_http::{Header, Response, Server};

/// Long-running front end started by dereferencing a `web` node. `serve`
/// only returns when the listener fails.
pub trait Service {
    fn serve(&mut self, graph: &Graph, ctx: NodeId, web: NodeId) -> Result<(), NestError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Index,
    Static {
        file: String,
        content_type: &'static str,
    },
    NotFound,
}

pub fn route(path: &str) -> Route {
    let path = path.split('?').next().unwrap_or("");
    if path == "/" {
        return Route::Index;
    }

    let file = path.trim_start_matches('/');
    if file.is_empty() || file.split('/').any(|seg| seg == ".." || seg.is_empty()) {
        return Route::NotFound;
    }

    let content_type = match Path::new(file).extension().and_then(|e| e.to_str()) {
        Some("css") => "text/css",
        Some("png") => "image/png",
        Some("js") => "application/javascript",
        _ => return Route::NotFound,
    };
    Route::Static {
        file: file.to_string(),
        content_type,
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    out
}

pub fn render_index(graph: &Graph, ctx: NodeId, web: NodeId) -> String {
    let title = escape(graph.value(ctx));
    let logo = graph
        .slot(web, "logo")
        .map(|logo| escape(graph.value(logo)))
        .unwrap_or_default();

    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<title>{title}</title>\n\
         <link rel=\"stylesheet\" href=\"/style.css\">\n</head>\n<body>\n\
         <img src=\"/{logo}\">\n<pre id=\"ctx\">{}</pre>\n<pre id=\"web\">{}</pre>\n\
         </body>\n</html>\n",
        escape(&graph.dump(ctx, DumpStyle::Full)),
        escape(&graph.dump(web, DumpStyle::Full)),
    )
}

/// A finished response, independent of the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl Reply {
    fn not_found() -> Self {
        Self {
            status: 404,
            content_type: "text/plain",
            body: b"not found".to_vec(),
        }
    }
}

/// Blocking HTTP front end: the index page plus static assets.
#[derive(Debug, Clone)]
pub struct HttpService {
    static_dir: PathBuf,
}

impl HttpService {
    pub fn new(static_dir: impl Into<PathBuf>) -> Self {
        Self {
            static_dir: static_dir.into(),
        }
    }

    pub fn reply(&self, url: &str, graph: &Graph, ctx: NodeId, web: NodeId) -> Reply {
        match route(url) {
            Route::Index => Reply {
                status: 200,
                content_type: "text/html; charset=utf-8",
                body: render_index(graph, ctx, web).into_bytes(),
            },
            Route::Static { file, content_type } => {
                match fs::read(self.static_dir.join(&file)) {
                    Ok(body) => Reply {
                        status: 200,
                        content_type,
                        body,
                    },
                    Err(_) => Reply::not_found(),
                }
            }
            Route::NotFound => Reply::not_found(),
        }
    }
}

impl Service for HttpService {
    fn serve(&mut self, graph: &Graph, ctx: NodeId, web: NodeId) -> Result<(), NestError> {
        let address = |slot: &str| {
            graph
                .slot(web, slot)
                .map(|node| graph.value(node).to_string())
                .ok_or_else(|| NestError::Service(format!("web node has no `{}` slot", slot)))
        };
        let ip = address("ip")?;
        let port: u16 = address("port")?
            .parse()
            .map_err(|_| NestError::Service("port is not a number".to_string()))?;

        let server = Server::http((ip.as_str(), port))
            .map_err(|e| NestError::Service(format!("cannot listen on {}:{}: {}", ip, port, e)))?;
        log::info!("listening on http://{}:{}/", ip, port);

        for request in server.incoming_requests() {
            let reply = self.reply(request.url(), graph, ctx, web);
            log::debug!("{} {} {}", reply.status, request.method(), request.url());

            let mut response = Response::from_data(reply.body).with_status_code(reply.status);
            if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], reply.content_type) {
                response = response.with_header(header);
            }
            if let Err(e) = request.respond(response) {
                log::warn!("response failed: {}", e);
            }
        }
        Ok(())
    }
}
