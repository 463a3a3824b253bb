//! CDP Transport Layer
//!
//! A minimal WebSocket client speaking to Chrome's DevTools endpoint. One
//! reader thread routes responses back to waiting callers by message id;
//! protocol events are not subscribed to and are dropped.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpStream;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use tokio::sync::{oneshot, Mutex};

use crate::error::{Error, Result};

/// Caller waiting on a response, with the method it sent
struct Pending {
    method: String,
    reply: oneshot::Sender<Result<Value>>,
}

type PendingMap = Arc<Mutex<HashMap<u64, Pending>>>;

/// Write half of the socket, shared with the reader thread for pongs
type SharedWriter<W> = Arc<Mutex<W>>;

/// RFC 6455 framing, text frames only
mod frame {
    use std::io::{Read, Result, Write};

    pub const TEXT: u8 = 0x1;
    pub const CLOSE: u8 = 0x8;
    pub const PING: u8 = 0x9;
    pub const PONG: u8 = 0xA;

    /// Write one masked client frame
    pub fn write(stream: &mut impl Write, opcode: u8, payload: &[u8]) -> Result<()> {
        let len = payload.len();
        let mut buf = Vec::with_capacity(14 + len);
        buf.push(0x80 | opcode);

        match len {
            0..=125 => buf.push(0x80 | len as u8),
            126..=0xFFFF => {
                buf.push(0x80 | 126);
                buf.extend_from_slice(&(len as u16).to_be_bytes());
            }
            _ => {
                buf.push(0x80 | 127);
                buf.extend_from_slice(&(len as u64).to_be_bytes());
            }
        }

        let mask: [u8; 4] = rand::random();
        buf.extend_from_slice(&mask);
        buf.extend(payload.iter().enumerate().map(|(i, b)| b ^ mask[i % 4]));

        stream.write_all(&buf)?;
        stream.flush()
    }

    /// Read one frame as (opcode, unmasked payload)
    pub fn read(stream: &mut impl Read) -> Result<(u8, Vec<u8>)> {
        let mut header = [0u8; 2];
        stream.read_exact(&mut header)?;

        let opcode = header[0] & 0x0F;
        let masked = header[1] & 0x80 != 0;
        let len = match header[1] & 0x7F {
            126 => {
                let mut ext = [0u8; 2];
                stream.read_exact(&mut ext)?;
                u16::from_be_bytes(ext) as usize
            }
            127 => {
                let mut ext = [0u8; 8];
                stream.read_exact(&mut ext)?;
                u64::from_be_bytes(ext) as usize
            }
            n => n as usize,
        };

        let mask = if masked {
            let mut m = [0u8; 4];
            stream.read_exact(&mut m)?;
            Some(m)
        } else {
            None
        };

        let mut payload = vec![0u8; len];
        stream.read_exact(&mut payload)?;
        if let Some(mask) = mask {
            payload
                .iter_mut()
                .enumerate()
                .for_each(|(i, b)| *b ^= mask[i % 4]);
        }

        Ok((opcode, payload))
    }
}

/// CDP transport owning the Chrome process and its DevTools socket
pub struct Transport {
    child: Mutex<Child>,
    writer: SharedWriter<TcpStream>,
    next_id: AtomicU64,
    pending: PendingMap,
}

impl Transport {
    /// Connect to the DevTools WebSocket of an already launched Chrome
    pub fn connect(child: Child, ws_url: &str) -> Result<Self> {
        let rest = ws_url.trim_start_matches("ws://");
        let (host_port, path) = rest.split_once('/').unwrap_or((rest, ""));

        let mut stream = TcpStream::connect(host_port)
            .map_err(|e| Error::transport_io("connect to DevTools", e))?;
        handshake(&mut stream, host_port, path)?;
        tracing::debug!(url = ws_url, "DevTools socket open");

        let reader = stream
            .try_clone()
            .map_err(|e| Error::transport_io("clone DevTools socket", e))?;
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));

        let writer = Arc::new(Mutex::new(stream));
        let routes = Arc::clone(&pending);
        let pongs = Arc::clone(&writer);
        std::thread::spawn(move || read_loop(reader, pongs, routes));

        Ok(Self {
            child: Mutex::new(child),
            writer,
            next_id: AtomicU64::new(1),
            pending,
        })
    }

    /// Send a command, optionally scoped to a target session, and wait for its result
    pub async fn call<C, R>(&self, session_id: Option<&str>, method: &str, params: &C) -> Result<R>
    where
        C: Serialize,
        R: DeserializeOwned,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        let mut message = json!({
            "id": id,
            "method": method,
            "params": serde_json::to_value(params)?,
        });
        if let Some(session_id) = session_id {
            message["sessionId"] = json!(session_id);
        }
        let data = serde_json::to_vec(&message)?;

        let (reply, rx) = oneshot::channel();
        self.pending.lock().await.insert(
            id,
            Pending {
                method: method.to_string(),
                reply,
            },
        );

        {
            let mut writer = self.writer.lock().await;
            if let Err(e) = frame::write(&mut *writer, frame::TEXT, &data) {
                self.pending.lock().await.remove(&id);
                return Err(Error::transport_io("DevTools write", e));
            }
        }
        tracing::trace!(id, method, session = session_id, "sent CDP command");

        let result = rx
            .await
            .map_err(|_| Error::transport(format!("connection closed while waiting for {method}")))??;
        Ok(serde_json::from_value(result)?)
    }

    /// Close the socket and kill Chrome
    pub async fn close(&self) -> Result<()> {
        {
            let mut writer = self.writer.lock().await;
            let _ = frame::write(&mut *writer, frame::CLOSE, &[]);
        }

        let mut child = self.child.lock().await;
        let _ = child.kill();
        let _ = child.wait();
        Ok(())
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        if let Ok(mut child) = self.child.try_lock() {
            let _ = child.kill();
        }
    }
}

fn handshake(stream: &mut TcpStream, host_port: &str, path: &str) -> Result<()> {
    let key = base64::Engine::encode(
        &base64::engine::general_purpose::STANDARD,
        rand::random::<[u8; 16]>(),
    );
    let request = format!(
        "GET /{path} HTTP/1.1\r\n\
         Host: {host_port}\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Key: {key}\r\n\
         Sec-WebSocket-Version: 13\r\n\
         \r\n"
    );
    stream
        .write_all(request.as_bytes())
        .map_err(|e| Error::transport_io("handshake write", e))?;

    let mut response = [0u8; 1024];
    let n = stream
        .read(&mut response)
        .map_err(|e| Error::transport_io("handshake read", e))?;
    let response = String::from_utf8_lossy(&response[..n]);

    if !response.starts_with("HTTP/1.1 101") {
        return Err(Error::transport(format!(
            "WebSocket upgrade refused: {}",
            response.lines().next().unwrap_or_default()
        )));
    }
    Ok(())
}

fn read_loop<R: Read, W: Write>(mut reader: R, writer: SharedWriter<W>, pending: PendingMap) {
    loop {
        let (opcode, payload) = match frame::read(&mut reader) {
            Ok(f) => f,
            Err(e) => {
                tracing::debug!(error = %e, "DevTools read ended");
                break;
            }
        };

        match opcode {
            frame::TEXT => match serde_json::from_slice::<Value>(&payload) {
                Ok(message) => route(message, &pending),
                Err(e) => tracing::warn!(error = %e, "unparseable CDP message"),
            },
            frame::PING => {
                let mut writer = writer.blocking_lock();
                if let Err(e) = frame::write(&mut *writer, frame::PONG, &payload) {
                    tracing::debug!(error = %e, "pong write failed");
                }
            }
            frame::CLOSE => {
                tracing::debug!("DevTools socket closed by Chrome");
                break;
            }
            _ => {}
        }
    }

    // Wake anyone still waiting; their senders drop with the map entries
    pending.blocking_lock().clear();
}

/// Deliver a response to its caller. Events carry no id and are ignored.
fn route(message: Value, pending: &PendingMap) {
    let Some(id) = message.get("id").and_then(Value::as_u64) else {
        if let Some(method) = message.get("method").and_then(Value::as_str) {
            tracing::trace!(method, "ignoring CDP event");
        }
        return;
    };

    let Some(Pending { method, reply }) = pending.blocking_lock().remove(&id) else {
        tracing::trace!(id, "response for unknown request");
        return;
    };

    let result = match message.get("error") {
        Some(error) => Err(Error::cdp(
            method,
            error.get("code").and_then(Value::as_i64).unwrap_or(-1),
            error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error"),
        )),
        None => Ok(message.get("result").cloned().unwrap_or_else(|| json!({}))),
    };
    let _ = reply.send(result);
}

/// Start Chrome with remote debugging on a free port and return the process
/// and its DevTools WebSocket URL
pub fn launch_chrome(path: &Path, args: &[String]) -> Result<(Child, String)> {
    let mut child = Command::new(path)
        .args(args)
        .arg("--remote-debugging-port=0")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| Error::Launch(format!("{}: {e}", path.display())))?;

    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| Error::Launch("no stderr from Chrome".into()))?;

    // Chrome prints: DevTools listening on ws://127.0.0.1:PORT/devtools/browser/GUID
    let ws_url = BufReader::new(stderr)
        .lines()
        .map_while(|line| line.ok())
        .inspect(|line| tracing::trace!(line = %line, "chrome stderr"))
        .find_map(|line| {
            line.contains("DevTools listening on")
                .then(|| line.find("ws://").map(|at| line[at..].trim().to_string()))
                .flatten()
        });

    match ws_url {
        Some(url) => {
            tracing::debug!(url = %url, "Chrome DevTools endpoint");
            Ok((child, url))
        }
        None => {
            let _ = child.kill();
            Err(Error::Launch("Chrome exited without a DevTools URL".into()))
        }
    }
}
