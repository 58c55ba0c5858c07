use std::fmt;

use serde::{Deserialize, Serialize};

/// When a generated file may replace one that already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverwritePolicy {
    Always,
    /// Generated only when absent; an existing file is left alone silently.
    IfMissing,
    /// Generated only when absent; an existing file is reported as skipped.
    Never,
    /// Replacing an existing file needs the caller's force flag.
    #[default]
    WithForce,
}

/// What the policy says about one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Write { requires_force: bool },
    DropSilently,
    Skip,
    NeedsForce,
}

impl OverwritePolicy {
    pub fn decide(self, exists: bool, force: bool) -> Decision {
        match (self, exists) {
            (_, false) => Decision::Write {
                requires_force: false,
            },
            (OverwritePolicy::Always, true) => Decision::Write {
                requires_force: false,
            },
            (OverwritePolicy::IfMissing, true) => Decision::DropSilently,
            (OverwritePolicy::Never, true) => Decision::Skip,
            (OverwritePolicy::WithForce, true) if force => Decision::Write {
                requires_force: true,
            },
            (OverwritePolicy::WithForce, true) => Decision::NeedsForce,
        }
    }
}

impl fmt::Display for OverwritePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OverwritePolicy::Always => "always",
            OverwritePolicy::IfMissing => "if-missing",
            OverwritePolicy::Never => "never",
            OverwritePolicy::WithForce => "with-force",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(OverwritePolicy::Always, true, false, Decision::Write { requires_force: false })]
    #[case(OverwritePolicy::IfMissing, true, true, Decision::DropSilently)]
    #[case(OverwritePolicy::Never, true, true, Decision::Skip)]
    #[case(OverwritePolicy::WithForce, true, false, Decision::NeedsForce)]
    #[case(OverwritePolicy::WithForce, true, true, Decision::Write { requires_force: true })]
    #[case(OverwritePolicy::Never, false, false, Decision::Write { requires_force: false })]
    #[case(OverwritePolicy::WithForce, false, true, Decision::Write { requires_force: false })]
    fn test_decide(
        #[case] policy: OverwritePolicy,
        #[case] exists: bool,
        #[case] force: bool,
        #[case] expected: Decision,
    ) {
        assert_eq!(policy.decide(exists, force), expected);
    }

    #[test]
    fn test_policy_names_in_toml() {
        #[derive(Deserialize)]
        struct Entry {
            overwrite: OverwritePolicy,
        }
        let entry: Entry = toml::from_str("overwrite = \"if-missing\"").unwrap();
        assert_eq!(entry.overwrite, OverwritePolicy::IfMissing);
        assert_eq!(OverwritePolicy::IfMissing.to_string(), "if-missing");
    }
}
