use std::collections::BTreeMap;
use std::fmt::Write;

use folio_market_data::Ticker;
use serde::Serialize;

/// Counters for one synchronization pass.
///
/// Record-level counters count documents; `not_found` lists tickers, once each.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSummary {
    pub records: usize,
    pub skipped_no_ticker: usize,
    pub already_resolved: usize,
    pub newly_resolved: usize,
    /// Tickers no provider could resolve, sorted.
    pub not_found: Vec<Ticker>,
    /// Tickers whose resolution failed on a provider error.
    pub resolution_errors: usize,
    pub prices_updated: usize,
    pub unpriced: usize,
    pub persistence_failures: usize,
    /// Prices written per provider.
    pub by_provider: BTreeMap<String, usize>,
    pub timed_out: bool,
}

impl SyncSummary {
    pub(crate) fn add_not_found(&mut self, ticker: Ticker) {
        if let Err(pos) = self.not_found.binary_search(&ticker) {
            self.not_found.insert(pos, ticker);
        }
    }

    pub(crate) fn record_price(&mut self, provider: &str) {
        self.prices_updated += 1;
        *self.by_provider.entry(provider.to_string()).or_default() += 1;
    }

    /// One human-readable line for the end of the run log.
    pub fn summary(&self) -> String {
        let mut line = format!(
            "{} records: {} already resolved, {} newly resolved, {} prices updated",
            self.records, self.already_resolved, self.newly_resolved, self.prices_updated
        );

        if !self.by_provider.is_empty() {
            let providers: Vec<String> = self
                .by_provider
                .iter()
                .map(|(provider, count)| format!("{} {}", provider, count))
                .collect();
            let _ = write!(line, " ({})", providers.join(", "));
        }

        let _ = write!(line, ", {} unpriced", self.unpriced);

        if !self.not_found.is_empty() {
            let tickers: Vec<&str> = self.not_found.iter().map(Ticker::as_str).collect();
            let _ = write!(line, ", {} not found [{}]", tickers.len(), tickers.join(", "));
        }
        if self.skipped_no_ticker > 0 {
            let _ = write!(line, ", {} without ticker", self.skipped_no_ticker);
        }
        if self.resolution_errors > 0 {
            let _ = write!(line, ", {} resolution errors", self.resolution_errors);
        }
        if self.persistence_failures > 0 {
            let _ = write!(line, ", {} write failures", self.persistence_failures);
        }
        if self.timed_out {
            line.push_str(" (timed out)");
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticker(s: &str) -> Ticker {
        Ticker::parse(s).unwrap()
    }

    #[test]
    fn test_not_found_is_sorted_and_unique() {
        let mut summary = SyncSummary::default();
        summary.add_not_found(ticker("ZZZZ"));
        summary.add_not_found(ticker("AAA"));
        summary.add_not_found(ticker("ZZZZ"));

        assert_eq!(summary.not_found, vec![ticker("AAA"), ticker("ZZZZ")]);
    }

    #[test]
    fn test_summary_line() {
        let mut summary = SyncSummary {
            records: 3,
            newly_resolved: 1,
            unpriced: 1,
            ..Default::default()
        };
        summary.record_price("ETORO");
        summary.record_price("TWELVE_DATA");
        summary.add_not_found(ticker("ZZZZ"));

        assert_eq!(
            summary.summary(),
            "3 records: 0 already resolved, 1 newly resolved, 2 prices updated \
             (ETORO 1, TWELVE_DATA 1), 1 unpriced, 1 not found [ZZZZ]"
        );
    }

    #[test]
    fn test_summary_flags_timeout_and_failures() {
        let summary = SyncSummary {
            persistence_failures: 2,
            timed_out: true,
            ..Default::default()
        };
        let line = summary.summary();
        assert!(line.ends_with("2 write failures (timed out)"));
    }
}
