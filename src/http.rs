//! A hand-rolled HTTP/1.1 front end over a raw `tokio` `TcpListener`: read a
//! fixed header, learn the body length from it, read exactly that many
//! bytes, dispatch. Every route maps onto one `Db` operation; see the route
//! table in `SPEC_FULL.md` §4.7.

use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::document::validate_is_object;
use crate::errors::TransportError;
use crate::kv::SledEngine;
use crate::storage::Db;

struct Request {
    method: String,
    path: String,
    body: Vec<u8>,
}

pub async fn serve(addr: &str, db: Arc<Db<SledEngine>>) -> io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    println!("deuspyd listening on {addr}");

    loop {
        let (socket, peer) = listener.accept().await?;
        let db = Arc::clone(&db);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(socket, db).await {
                eprintln!("connection error ({peer}): {e}");
            }
        });
    }
}

async fn handle_connection(mut socket: TcpStream, db: Arc<Db<SledEngine>>) -> io::Result<()> {
    loop {
        let request = match read_request(&mut socket).await? {
            Some(r) => r,
            None => return Ok(()),
        };

        let response = dispatch(&db, request).await;
        write_response(&mut socket, response).await?;
    }
}

async fn read_request(socket: &mut TcpStream) -> io::Result<Option<Request>> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    let header_end = loop {
        if let Some(pos) = find_header_terminator(&buf) {
            break pos;
        }
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            return Ok(None);
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let header_text = String::from_utf8_lossy(&buf[..header_end]).into_owned();
    let mut lines = header_text.split("\r\n");
    let request_line = lines.next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or("/").to_string();

    let mut headers = HashMap::new();
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
        }
    }

    let content_length: usize = headers.get("content-length").and_then(|v| v.parse().ok()).unwrap_or(0);

    let mut body = buf.split_off(header_end + 4);
    while body.len() < content_length {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }
    body.truncate(content_length);

    Ok(Some(Request { method, path, body }))
}

fn find_header_terminator(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

struct Response {
    status: u16,
    reason: &'static str,
    body: Vec<u8>,
}

impl Response {
    fn json(status: u16, reason: &'static str, value: &Value) -> Self {
        Self { status, reason, body: serde_json::to_vec(value).unwrap_or_default() }
    }

    fn empty(status: u16, reason: &'static str) -> Self {
        Self::json(status, reason, &Value::Object(Map::new()))
    }
}

impl From<TransportError> for Response {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::BadRequest(msg) => Response::json(400, "Bad Request", &Value::String(msg)),
            TransportError::NotFound => Response::empty(404, "Not Found"),
            other => {
                eprintln!("internal error: {other}");
                Response::empty(500, "Internal Server Error")
            }
        }
    }
}

async fn dispatch(db: &Arc<Db<SledEngine>>, request: Request) -> Response {
    match route(db, &request).await {
        Ok(response) => response,
        Err(e) => e.into(),
    }
}

async fn route(db: &Arc<Db<SledEngine>>, request: &Request) -> Result<Response, TransportError> {
    let segments: Vec<&str> = request.path.trim_start_matches('/').split('/').filter(|s| !s.is_empty()).collect();

    match (request.method.as_str(), segments.as_slice()) {
        ("GET", []) => handle_query(db, request).await,
        ("POST", []) => handle_create(db, request).await,
        ("GET", [uid]) => handle_read(db, parse_uid(uid)?).await,
        ("POST", [uid]) => handle_update(db, parse_uid(uid)?, request).await,
        ("DELETE", [uid]) => handle_delete(db, parse_uid(uid)?).await,
        _ => Err(TransportError::NotFound),
    }
}

fn parse_uid(raw: &str) -> Result<u64, TransportError> {
    raw.parse().map_err(|_| TransportError::BadRequest(format!("{raw:?} is not a valid uid")))
}

fn parse_body_object(body: &[u8]) -> Result<Map<String, Value>, TransportError> {
    if body.is_empty() {
        return Ok(Map::new());
    }
    let value: Value =
        serde_json::from_slice(body).map_err(|e| TransportError::BadRequest(format!("malformed JSON body: {e}")))?;
    validate_is_object(value).ok_or_else(|| TransportError::BadRequest("body must be a JSON object".into()))
}

async fn handle_query(db: &Arc<Db<SledEngine>>, request: &Request) -> Result<Response, TransportError> {
    let filters_obj = parse_body_object(&request.body)?;
    let filters: Vec<(String, Value)> = filters_obj.into_iter().collect();

    let db = Arc::clone(db);
    let matches: Vec<(u64, Map<String, Value>)> = tokio::task::spawn_blocking(move || -> Result<_, TransportError> {
        let mut out = Vec::new();
        for uid in db.query(filters)? {
            let uid = uid?;
            if let Some(doc) = db.read(uid)? {
                out.push((uid, doc));
            }
        }
        Ok(out)
    })
    .await
    .map_err(|e| TransportError::BadRequest(format!("worker task panicked: {e}")))??;

    let mut result = Map::new();
    for (uid, doc) in matches {
        result.insert(uid.to_string(), Value::Object(doc));
    }
    Ok(Response::json(200, "OK", &Value::Object(result)))
}

async fn handle_create(db: &Arc<Db<SledEngine>>, request: &Request) -> Result<Response, TransportError> {
    let doc = parse_body_object(&request.body)?;
    let db = Arc::clone(db);
    let uid = tokio::task::spawn_blocking(move || db.create(doc))
        .await
        .map_err(|e| TransportError::BadRequest(format!("worker task panicked: {e}")))??;
    Ok(Response::json(200, "OK", &Value::Number(uid.into())))
}

async fn handle_read(db: &Arc<Db<SledEngine>>, uid: u64) -> Result<Response, TransportError> {
    let db = Arc::clone(db);
    let doc = tokio::task::spawn_blocking(move || db.read(uid))
        .await
        .map_err(|e| TransportError::BadRequest(format!("worker task panicked: {e}")))??;
    match doc {
        Some(doc) => Ok(Response::json(200, "OK", &Value::Object(doc))),
        None => Err(TransportError::NotFound),
    }
}

async fn handle_update(db: &Arc<Db<SledEngine>>, uid: u64, request: &Request) -> Result<Response, TransportError> {
    let doc = parse_body_object(&request.body)?;
    let db = Arc::clone(db);
    tokio::task::spawn_blocking(move || db.update(uid, doc))
        .await
        .map_err(|e| TransportError::BadRequest(format!("worker task panicked: {e}")))??;
    Ok(Response::empty(200, "OK"))
}

async fn handle_delete(db: &Arc<Db<SledEngine>>, uid: u64) -> Result<Response, TransportError> {
    let db2 = Arc::clone(db);
    let existed = tokio::task::spawn_blocking(move || db2.read(uid))
        .await
        .map_err(|e| TransportError::BadRequest(format!("worker task panicked: {e}")))??
        .is_some();
    if !existed {
        return Err(TransportError::NotFound);
    }
    let db3 = Arc::clone(db);
    tokio::task::spawn_blocking(move || db3.delete(uid))
        .await
        .map_err(|e| TransportError::BadRequest(format!("worker task panicked: {e}")))??;
    Ok(Response::empty(200, "OK"))
}

async fn write_response(socket: &mut TcpStream, response: Response) -> io::Result<()> {
    let mut out = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: keep-alive\r\n\r\n",
        response.status,
        response.reason,
        response.body.len()
    )
    .into_bytes();
    out.extend_from_slice(&response.body);
    socket.write_all(&out).await
}
