use std::io;

pub const CONTENT_TYPE_HTML: &str = "text/html; charset=utf-8";
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Writable, streaming response provided by the transport layer
///
/// Status and headers must be set before the first `write`. `end` is called
/// exactly once per request by the dispatcher.
pub trait ResponseSink: Send {
    fn set_status(&mut self, status: u16);
    fn set_header(&mut self, name: &str, value: &str);
    /// Append a chunk of body bytes
    ///
    /// # Errors
    ///
    /// Returns the transport's I/O error if the peer is gone.
    fn write(&mut self, chunk: &[u8]) -> io::Result<()>;
    /// Finish the response
    ///
    /// # Errors
    ///
    /// Returns the transport's I/O error if the final flush fails.
    fn end(&mut self) -> io::Result<()>;
    /// Whether `end` has already been called
    fn is_finished(&self) -> bool;
    /// Whether body bytes have already gone out; status and headers are
    /// then fixed
    fn is_committed(&self) -> bool;
}

/// In-memory response used by tests and by adapters that buffer whole bodies
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub finished: bool,
}

impl BufferedResponse {
    #[must_use]
    pub fn new() -> Self {
        Self {
            status: 200,
            ..Self::default()
        }
    }

    /// Get a header by name (case-insensitive)
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Body as UTF-8 text (lossy)
    #[must_use]
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Body parsed as JSON
    ///
    /// # Errors
    ///
    /// Returns the serde error if the body is not JSON.
    pub fn body_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_slice(&self.body)
    }
}

impl ResponseSink for BufferedResponse {
    fn set_status(&mut self, status: u16) {
        self.status = status;
    }

    fn set_header(&mut self, name: &str, value: &str) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.to_string()));
    }

    fn write(&mut self, chunk: &[u8]) -> io::Result<()> {
        if self.finished {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "write after end of response",
            ));
        }
        self.body.extend_from_slice(chunk);
        Ok(())
    }

    fn end(&mut self) -> io::Result<()> {
        self.finished = true;
        Ok(())
    }

    fn is_finished(&self) -> bool {
        self.finished
    }

    fn is_committed(&self) -> bool {
        !self.body.is_empty()
    }
}
