pub mod engine;
pub mod sink;
pub mod validate;

use std::time::Duration;

pub use engine::{Child, SearchEngine, SearchParams, SearchStats};
pub use sink::{CollectingSink, NullSink, SharedSink, TourSink, WriterSink};
pub use validate::{check_tour, TourValidator};

/// `HH:MM:SS.mmm`
pub fn fmt_elapsed(d: Duration) -> String {
    let ms = d.as_millis();
    let (s, ms) = (ms / 1000, ms % 1000);
    let (m, s) = (s / 60, s % 60);
    let (h, m) = (m / 60, m % 60);
    format!("{h:02}:{m:02}:{s:02}.{ms:03}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_format() {
        assert_eq!(fmt_elapsed(Duration::from_millis(0)), "00:00:00.000");
        assert_eq!(fmt_elapsed(Duration::from_millis(3_723_045)), "01:02:03.045");
    }
}
