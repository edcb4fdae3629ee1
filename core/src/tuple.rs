// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use serde::de::{Error as DeError, SeqAccess, Visitor};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::SlicerError;

/// The maximum value a port number may take (`OFPP_MAX`-ish upper bound
/// used by the original app; anything above it cannot reach the switch).
pub const MAX_PORT: u32 = 0x7FFF_FFFF;

/// A traffic class on the switch: `(port)`, `(port, vlan)`, or
/// `(port, outer, inner)`. Dispatch over arity is exhaustive and
/// compile-time checked, rather than branching on a `Vec`'s length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tuple {
    Untagged { port: u32 },
    CTagged { port: u32, vlan: u16 },
    STagged { port: u32, outer: u16, inner: u16 },
}

impl Tuple {
    pub fn untagged(port: u32) -> Self {
        Self::Untagged { port }
    }

    pub fn c_tagged(port: u32, vlan: u16) -> Self {
        Self::CTagged { port, vlan }
    }

    pub fn s_tagged(port: u32, outer: u16, inner: u16) -> Self {
        Self::STagged { port, outer, inner }
    }

    pub fn port(&self) -> u32 {
        match self {
            Self::Untagged { port } | Self::CTagged { port, .. } | Self::STagged { port, .. } => {
                *port
            }
        }
    }

    /// The VLAN at the first tag position (the "outer" tag for a
    /// double-tagged tuple), if any.
    pub fn first_vlan(&self) -> Option<u16> {
        match self {
            Self::Untagged { .. } => None,
            Self::CTagged { vlan, .. } => Some(*vlan),
            Self::STagged { outer, .. } => Some(*outer),
        }
    }

    pub fn inner_vlan(&self) -> Option<u16> {
        match self {
            Self::STagged { inner, .. } => Some(*inner),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Untagged { .. } => 1,
            Self::CTagged { .. } => 2,
            Self::STagged { .. } => 3,
        }
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Build a tuple from raw, possibly-invalid wire integers.
    pub fn from_raw(values: &[i64]) -> Result<Self, SlicerError> {
        match values {
            [p] => Self::checked(*p, None, None),
            [p, v] => Self::checked(*p, Some(*v), None),
            [p, o, i] => Self::checked(*p, Some(*o), Some(*i)),
            _ => Err(SlicerError::invalid_argument(format!(
                "tuple must have 1-3 elements, got {}",
                values.len()
            ))),
        }
    }

    fn checked(port: i64, first: Option<i64>, second: Option<i64>) -> Result<Self, SlicerError> {
        let port = non_negative_u32(port, "port")?;
        if port > MAX_PORT {
            return Err(SlicerError::invalid_argument(format!(
                "port {port} exceeds maximum {MAX_PORT}"
            )));
        }
        Ok(match (first, second) {
            (None, None) => Self::Untagged { port },
            (Some(v), None) => Self::CTagged {
                port,
                vlan: non_negative_u16(v, "vlan")?,
            },
            (Some(o), Some(i)) => Self::STagged {
                port,
                outer: non_negative_u16(o, "outer vlan")?,
                inner: non_negative_u16(i, "inner vlan")?,
            },
            (None, Some(_)) => unreachable!("caller never passes second without first"),
        })
    }

    /// Two tuples conflict when they could both match the same traffic
    /// given OpenFlow's inability to tell an S-tag from a C-tag: same port,
    /// and neither tuple's encapsulation prefix disagrees with the other's
    /// at a position both define.
    pub fn conflicts_with(&self, other: &Self) -> bool {
        if self.port() != other.port() {
            return false;
        }
        if self.len() == 1 || other.len() == 1 {
            return true;
        }
        if self.first_vlan() != other.first_vlan() {
            return false;
        }
        if self.len() == 2 || other.len() == 2 {
            return true;
        }
        self.inner_vlan() == other.inner_vlan()
    }
}

fn non_negative_u32(v: i64, what: &str) -> Result<u32, SlicerError> {
    u32::try_from(v).map_err(|_| SlicerError::invalid_argument(format!("{what} {v} is negative or too large")))
}

fn non_negative_u16(v: i64, what: &str) -> Result<u16, SlicerError> {
    u16::try_from(v).map_err(|_| SlicerError::invalid_argument(format!("{what} {v} is negative or too large")))
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Untagged { port } => write!(f, "{port}"),
            Self::CTagged { port, vlan } => write!(f, "{port}.{vlan}"),
            Self::STagged { port, outer, inner } => write!(f, "{port}.{outer}.{inner}"),
        }
    }
}

/// Render a slice of tuples the way the original logged them:
/// `"1.100, 2, 3.50.60"`.
pub fn fmt_tuples(tuples: &[Tuple]) -> String {
    tuples
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl Serialize for Tuple {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Untagged { port } => {
                let mut seq = serializer.serialize_seq(Some(1))?;
                seq.serialize_element(port)?;
                seq.end()
            }
            Self::CTagged { port, vlan } => {
                let mut seq = serializer.serialize_seq(Some(2))?;
                seq.serialize_element(port)?;
                seq.serialize_element(vlan)?;
                seq.end()
            }
            Self::STagged { port, outer, inner } => {
                let mut seq = serializer.serialize_seq(Some(3))?;
                seq.serialize_element(port)?;
                seq.serialize_element(outer)?;
                seq.serialize_element(inner)?;
                seq.end()
            }
        }
    }
}

struct TupleVisitor;

impl<'de> Visitor<'de> for TupleVisitor {
    type Value = Tuple;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a 1-, 2-, or 3-element array of non-negative integers")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut values = Vec::with_capacity(3);
        while let Some(v) = seq.next_element::<i64>()? {
            values.push(v);
            if values.len() > 3 {
                return Err(DeError::invalid_length(values.len(), &self));
            }
        }
        Tuple::from_raw(&values).map_err(DeError::custom)
    }
}

impl<'de> Deserialize<'de> for Tuple {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_seq(TupleVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_like_the_original() {
        assert_eq!(Tuple::untagged(6).to_string(), "6");
        assert_eq!(Tuple::c_tagged(6, 100).to_string(), "6.100");
        assert_eq!(Tuple::s_tagged(6, 100, 200).to_string(), "6.100.200");
    }

    #[test]
    fn different_ports_never_conflict() {
        assert!(!Tuple::untagged(1).conflicts_with(&Tuple::untagged(2)));
    }

    #[test]
    fn untagged_conflicts_with_anything_on_same_port() {
        assert!(Tuple::untagged(6).conflicts_with(&Tuple::c_tagged(6, 100)));
        assert!(Tuple::untagged(6).conflicts_with(&Tuple::s_tagged(6, 100, 200)));
    }

    #[test]
    fn c_tagged_conflicts_only_on_matching_outer_vlan() {
        let a = Tuple::c_tagged(6, 100);
        assert!(a.conflicts_with(&Tuple::s_tagged(6, 100, 1)));
        assert!(!a.conflicts_with(&Tuple::c_tagged(6, 101)));
        assert!(!a.conflicts_with(&Tuple::s_tagged(6, 101, 1)));
    }

    #[test]
    fn s_tagged_conflicts_require_matching_inner_vlan() {
        let a = Tuple::s_tagged(6, 100, 200);
        assert!(a.conflicts_with(&Tuple::s_tagged(6, 100, 200)));
        assert!(!a.conflicts_with(&Tuple::s_tagged(6, 100, 201)));
    }

    #[test]
    fn conflict_is_reflexive_and_symmetric() {
        let a = Tuple::c_tagged(1, 5);
        let b = Tuple::s_tagged(1, 5, 9);
        assert!(a.conflicts_with(&a));
        assert_eq!(a.conflicts_with(&b), b.conflicts_with(&a));
    }

    #[test]
    fn rejects_negative_and_oversized_fields() {
        assert!(Tuple::from_raw(&[-1]).is_err());
        assert!(Tuple::from_raw(&[(MAX_PORT as i64) + 1]).is_err());
        assert!(Tuple::from_raw(&[]).is_err());
        assert!(Tuple::from_raw(&[1, 2, 3, 4]).is_err());
    }

    #[test]
    fn json_round_trips() {
        let t = Tuple::s_tagged(3, 50, 60);
        let json = serde_json::to_string(&t).unwrap();
        assert_eq!(json, "[3,50,60]");
        let back: Tuple = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);
    }
}
