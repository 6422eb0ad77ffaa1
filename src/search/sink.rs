use crate::board::{notation, Node};
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// Receives every accepted tour with its 1-based number.
pub trait TourSink {
    fn tour(&mut self, number: u64, path: &[Node]);
}

impl<F: FnMut(u64, &[Node])> TourSink for F {
    fn tour(&mut self, number: u64, path: &[Node]) {
        self(number, path)
    }
}

/// Discards tours; the engine's stats still count them.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl TourSink for NullSink {
    fn tour(&mut self, _number: u64, _path: &[Node]) {}
}

#[derive(Debug, Default, Clone)]
pub struct CollectingSink {
    pub tours: Vec<Vec<Node>>,
}

impl TourSink for CollectingSink {
    fn tour(&mut self, _number: u64, path: &[Node]) {
        self.tours.push(path.to_vec());
    }
}

/// Writes one line per tour in board notation. The first write error is
/// kept and later tours are dropped.
pub struct WriterSink<W: Write> {
    out: W,
    error: Option<io::Error>,
    written: u64,
}

impl<W: Write> WriterSink<W> {
    pub fn new(out: W) -> Self {
        Self { out, error: None, written: 0 }
    }

    pub fn written(&self) -> u64 { self.written }

    pub fn finish(mut self) -> io::Result<W> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        self.out.flush()?;
        Ok(self.out)
    }
}

impl<W: Write> TourSink for WriterSink<W> {
    fn tour(&mut self, _number: u64, path: &[Node]) {
        if self.error.is_some() {
            return;
        }
        match writeln!(self.out, "{}", notation(path)) {
            Ok(()) => self.written += 1,
            Err(e) => self.error = Some(e),
        }
    }
}

/// Sink shared between worker threads.
pub struct SharedSink<S>(Arc<Mutex<S>>);

impl<S> Clone for SharedSink<S> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<S> SharedSink<S> {
    pub fn new(inner: S) -> Self {
        Self(Arc::new(Mutex::new(inner)))
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        let mut g = match self.0.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut g)
    }

    /// The inner sink once every clone is gone.
    pub fn into_inner(self) -> Option<S> {
        Arc::try_unwrap(self.0).ok().map(|m| match m.into_inner() {
            Ok(s) => s,
            Err(poisoned) => poisoned.into_inner(),
        })
    }
}

impl<S: TourSink> TourSink for SharedSink<S> {
    fn tour(&mut self, number: u64, path: &[Node]) {
        self.with(|s| s.tour(number, path))
    }
}
