use crate::debug::DebugLogger;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProgressSection {
    #[serde(rename = "calculating stats")]
    CalculatingStats,
    #[serde(rename = "adding qr codes")]
    AddingQrCodes,
}

impl ProgressSection {
    pub fn label(self) -> &'static str {
        match self {
            ProgressSection::CalculatingStats => "calculating stats",
            ProgressSection::AddingQrCodes => "adding qr codes",
        }
    }
}

impl std::fmt::Display for ProgressSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub section: ProgressSection,
    pub percent: u8,
}

/// Number of processed items between two progress reports: one hundredth of
/// the total, but at least every item.
pub fn sampling_interval(total: usize) -> usize {
    (total / 100).max(1)
}

pub fn percent_of(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    (done.saturating_mul(100).div_ceil(total)).min(100) as u8
}

/// Forwards progress to the caller, keeping percentages monotonic within a
/// section and yielding the thread after each report so an interactive
/// consumer gets a chance to run.
pub(crate) struct ProgressReporter<'a> {
    sink: &'a mut dyn FnMut(&ProgressEvent),
    debug: Option<&'a DebugLogger>,
    last: Option<ProgressEvent>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new(sink: &'a mut dyn FnMut(&ProgressEvent), debug: Option<&'a DebugLogger>) -> Self {
        Self {
            sink,
            debug,
            last: None,
        }
    }

    pub fn emit(&mut self, section: ProgressSection, percent: u8) {
        let percent = match self.last {
            Some(last) if last.section == section => percent.max(last.percent),
            _ => 0,
        }
        .min(100);
        let event = ProgressEvent { section, percent };
        if let Some(debug) = self.debug {
            debug.event(
                "progress",
                json!({ "section": section.label(), "percent": percent }),
            );
        }
        (self.sink)(&event);
        self.last = Some(event);
        std::thread::yield_now();
    }

    /// Reports 100% for `section` unless that was already the last event.
    pub fn complete(&mut self, section: ProgressSection) {
        let done = ProgressEvent {
            section,
            percent: 100,
        };
        if self.last != Some(done) {
            self.emit(section, 100);
        }
    }
}
