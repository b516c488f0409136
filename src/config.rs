//! Tunables for the invalidation coordinator.
//!
//! These are heuristics, not protocol semantics: any positive values produce
//! a correct (if slower or chattier) system. Defaults assume a nominal
//! 1 GHz monotonic tick rate; the embedding kernel should scale them to the
//! calibrated clock frequency, or let operators override them on the kernel
//! command line.

/// Nominal tick rate the defaults are expressed against
pub const DEFAULT_TICK_HZ: u64 = 1_000_000_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InvalTunables {
    /// Spin time before the watchdog assumes a signal was lost
    pub watchdog_timeout_ticks: u64,
    /// Recovery attempts before stall logging escalates to full record dumps
    pub watchdog_verbose_after: u32,
    /// Minimum interval between stall warnings on the console
    pub warn_interval_ticks: u64,
    /// Largest page count flushed entry-by-entry; larger spans (and the
    /// flush-everything sentinel) become a full local flush
    pub max_page_loop: usize,
}

impl Default for InvalTunables {
    fn default() -> Self {
        Self {
            // 1/16 second, matching the empirically safe recovery latency
            watchdog_timeout_ticks: DEFAULT_TICK_HZ >> 4,
            watchdog_verbose_after: 1,
            warn_interval_ticks: DEFAULT_TICK_HZ,
            max_page_loop: 128,
        }
    }
}

impl InvalTunables {
    /// Apply `inval.*=` directives from a kernel command line.
    ///
    /// Unknown keys and unparsable values are ignored; zero values are
    /// rejected (every tunable must stay positive to preserve liveness).
    pub fn parse_directives(mut self, cmdline: &str) -> Self {
        for token in cmdline.split_whitespace() {
            let Some((key, value)) = token.split_once('=') else {
                continue;
            };
            match key {
                "inval.timeout_ticks" => {
                    if let Some(v) = parse_u64(value) {
                        self.watchdog_timeout_ticks = v;
                    }
                }
                "inval.verbose_after" => {
                    if let Some(v) = parse_u64(value) {
                        self.watchdog_verbose_after = v as u32;
                    }
                }
                "inval.warn_interval_ticks" => {
                    if let Some(v) = parse_u64(value) {
                        self.warn_interval_ticks = v;
                    }
                }
                "inval.page_loop" => {
                    if let Some(v) = parse_u64(value) {
                        self.max_page_loop = v as usize;
                    }
                }
                _ => {}
            }
        }
        self
    }
}

fn parse_u64(value: &str) -> Option<u64> {
    match value.parse::<u64>() {
        Ok(0) | Err(_) => None,
        Ok(v) => Some(v),
    }
}
