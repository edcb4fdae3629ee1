// SPDX-License-Identifier: Apache-2.0

/// Tunables for one [`crate::Switch`]. The teacher's daemon reads similar
/// knobs from a config file; this core has exactly one knob of its own and
/// leaves anything transport-related (listen address, socket paths) to its
/// caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlicerConfig {
    /// `idle_timeout` applied to a learned ingress-suppression rule when the
    /// caller doesn't specify one explicitly (spec default: 600s).
    pub learn_idle_timeout_secs: u32,
}

impl Default for SlicerConfig {
    fn default() -> Self {
        Self {
            learn_idle_timeout_secs: 600,
        }
    }
}
