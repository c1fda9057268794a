#![allow(dead_code)]

use std::io;
use std::sync::{Arc, Mutex};

use drawscript::ConfigEntry;

/// Log sink shared between a test and the subscriber it installs.
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }

    pub fn count(&self, needle: &str) -> usize {
        self.contents().matches(needle).count()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Run `f` with every event at `DEBUG` and above written to the returned buffer.
pub fn with_logs<T>(f: impl FnOnce(&LogBuffer) -> T) -> (T, LogBuffer) {
    let buf = LogBuffer::default();
    let writer = buf.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let out = tracing::subscriber::with_default(subscriber, || f(&buf));
    (out, buf)
}

/// `(section, key, value)` triples in the global namespace.
pub fn entries(lines: &[(&str, &str, &str)]) -> Vec<ConfigEntry> {
    lines
        .iter()
        .map(|(s, k, v)| ConfigEntry::new(s, k, v))
        .collect()
}
