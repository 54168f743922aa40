//! Approvers and the rule that combines their decisions on a node

use serde::{Deserialize, Serialize};

/// A person eligible to act on approval nodes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Approver {
    pub id: String,
    pub name: String,
    pub role: String,
}

impl Approver {
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role: role.into(),
        }
    }
}

/// How the approvals on a node combine into the node's outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombinationRule {
    /// A single approval finalizes the node
    #[default]
    Any,
    /// Every listed approver must approve
    All,
}

impl CombinationRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            CombinationRule::Any => "any",
            CombinationRule::All => "all",
        }
    }
}

impl std::str::FromStr for CombinationRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "any" => Ok(CombinationRule::Any),
            "all" => Ok(CombinationRule::All),
            _ => Err(format!("Invalid combination rule: {}", s)),
        }
    }
}
