use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Visibility class of a test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Public,
    Release,
    Secret,
    Student,
}

impl Tier {
    /// Tiers a student must never see before grading.
    pub const HIDDEN_FROM_STUDENTS: [Tier; 2] = [Tier::Secret, Tier::Release];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Public => "public",
            Tier::Release => "release",
            Tier::Secret => "secret",
            Tier::Student => "student",
        }
    }
}

impl Default for Tier {
    fn default() -> Self {
        Tier::Public
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "public" => Ok(Tier::Public),
            "release" => Ok(Tier::Release),
            "secret" => Ok(Tier::Secret),
            "student" => Ok(Tier::Student),
            other => Err(format!("unknown tier '{other}'")),
        }
    }
}
