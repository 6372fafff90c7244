//! Supervised process roles.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed tag identifying which supervised responsibility a child fulfils.
///
/// The supervisor keeps at most one live process per role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Build of the supervised binary (`make -C <source>`).
    Compile,
    /// The long-lived `<binary> serve` process.
    Serve,
    /// One-shot `<binary> list`.
    ListModels,
    /// One-shot `<binary> pull <name>` (or any other one-shot job).
    PullOneShot,
}

impl Role {
    /// All roles, in display order.
    pub const ALL: [Self; 4] = [Self::Compile, Self::Serve, Self::ListModels, Self::PullOneShot];

    /// Stable lowercase name used in logs and wire events.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Compile => "compile",
            Self::Serve => "serve",
            Self::ListModels => "list_models",
            Self::PullOneShot => "pull_one_shot",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_names_match_serde() {
        for role in Role::ALL {
            let json = serde_json::to_string(&role).unwrap();
            assert_eq!(json, format!("\"{}\"", role.as_str()));
        }
    }
}
