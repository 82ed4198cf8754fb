//! Typed identifiers. Each displays with a short prefix (`fs-3`, `snap-1`,
//! `job-7`) and parses back from that form or from the bare number.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! typed_id {
    ($name:ident, $prefix:literal) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            pub const PREFIX: &'static str = $prefix;

            pub const fn new(v: u64) -> Self {
                Self(v)
            }

            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}-{}", $prefix, self.0)
            }
        }

        impl FromStr for $name {
            type Err = crate::error::Error;

            fn from_str(s: &str) -> crate::error::Result<Self> {
                let digits = s
                    .strip_prefix(concat!($prefix, "-"))
                    .unwrap_or(s);
                digits.parse::<u64>().map(Self).map_err(|_| {
                    crate::error::Error::Config(format!(
                        "'{s}' is not a valid {} id",
                        stringify!($name)
                    ))
                })
            }
        }
    };
}

typed_id!(FeatureSetId, "fs");
typed_id!(SnapshotId, "snap");
typed_id!(JobId, "job");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_round_trips_through_from_str() {
        let id = FeatureSetId::new(12);
        assert_eq!(id.to_string(), "fs-12");
        assert_eq!("fs-12".parse::<FeatureSetId>().unwrap(), id);
        assert_eq!("12".parse::<FeatureSetId>().unwrap(), id);
        assert!("snap-12".parse::<FeatureSetId>().is_err());
    }
}
