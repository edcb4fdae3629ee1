// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SlicerError;

/// A datapath id, always rendered as 16 lowercase hex digits (the
/// convention the original Ryu app borrowed from `dpid_lib.DPID_PATTERN`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Dpid(pub u64);

impl Dpid {
    pub fn from_hex(s: &str) -> Result<Self, SlicerError> {
        if s.len() != 16 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(SlicerError::invalid_argument(format!(
                "dpid must be 16 hex digits, got {s:?}"
            )));
        }
        u64::from_str_radix(s, 16)
            .map(Dpid)
            .map_err(|e| SlicerError::invalid_argument(format!("invalid dpid {s:?}: {e}")))
    }

    pub fn to_hex(self) -> String {
        format!("{:016x}", self.0)
    }
}

impl fmt::Display for Dpid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for Dpid {
    type Err = SlicerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_hex() {
        let dpid = Dpid::from_hex("0000000000000001").unwrap();
        assert_eq!(dpid.0, 1);
        assert_eq!(dpid.to_hex(), "0000000000000001");
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(Dpid::from_hex("1").is_err());
        assert!(Dpid::from_hex("00000000000000001").is_err());
    }

    #[test]
    fn rejects_non_hex() {
        assert!(Dpid::from_hex("000000000000000g").is_err());
    }
}
