//! Simulation-wide tunables threaded through [`crate::model::world::World`].
//!
//! Defaults favor reproducibility: `deterministic = true` disables the
//! stochastic link-loss model and the STP MAC tiebreak fallback, which is
//! what the testable-properties section of the spec assumes.

#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Nominal scheduler rate; only used by an embedder's frame driver to
    /// size its accumulator. The engine itself is tick-counted, not
    /// wall-clock-driven.
    pub ticks_per_second: u32,

    /// Default simulation speed factor (percent progress per tick is
    /// `2 * speed`, see the link-tick processor).
    pub default_speed: f64,

    /// When true, link packet-loss is disabled and TCP ISNs / STP
    /// tiebreaks use deterministic counters rather than `rand`.
    pub deterministic: bool,

    /// Whether ARP/MAC table entries age out automatically. Disabled by
    /// default — see Open Question resolution in SPEC_FULL.md.
    pub age_entries: bool,

    /// Ticks an ARP or MAC entry survives once `age_entries` is enabled.
    pub entry_timeout_ticks: u32,

    /// How many times a buffered packet re-issues its ARP request before
    /// giving up and generating a Host-Unreachable.
    pub arp_retry_limit: u32,

    /// Ticks between ARP retries for a buffered packet.
    pub arp_retry_interval_ticks: u32,

    /// How often (in ticks) devices emit CDP neighbor announcements.
    pub cdp_interval_ticks: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            ticks_per_second: 60,
            default_speed: 1.0,
            deterministic: true,
            age_entries: false,
            entry_timeout_ticks: 60 * 300,
            arp_retry_limit: 3,
            arp_retry_interval_ticks: 60,
            cdp_interval_ticks: 60 * 60,
        }
    }
}
