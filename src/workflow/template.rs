//! Workflow templates: the levels and approvers a request type goes through
//!
//! Templates are configuration. The engine only instantiates them.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::approver::{Approver, CombinationRule};
use super::error::{WorkflowError, WorkflowResult};
use super::node::ApprovalNode;

/// One level of a workflow template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelTemplate {
    pub approvers: Vec<Approver>,
    #[serde(default)]
    pub combination_rule: CombinationRule,
}

impl LevelTemplate {
    pub fn new(approvers: Vec<Approver>, combination_rule: CombinationRule) -> Self {
        Self {
            approvers,
            combination_rule,
        }
    }
}

/// Ordered list of levels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowTemplate {
    pub levels: Vec<LevelTemplate>,
}

impl WorkflowTemplate {
    pub fn new(levels: Vec<LevelTemplate>) -> Self {
        Self { levels }
    }

    pub fn validate(&self) -> WorkflowResult<()> {
        if self.levels.is_empty() {
            return Err(WorkflowError::InvalidTemplate(
                "template has no levels".to_string(),
            ));
        }

        for (index, level) in self.levels.iter().enumerate() {
            let level_no = index + 1;
            if level.approvers.is_empty() {
                return Err(WorkflowError::InvalidTemplate(format!(
                    "level {} has no approvers",
                    level_no
                )));
            }
            for (i, approver) in level.approvers.iter().enumerate() {
                if approver.id.trim().is_empty() {
                    return Err(WorkflowError::InvalidTemplate(format!(
                        "level {} has an approver with an empty id",
                        level_no
                    )));
                }
                if level.approvers[..i].iter().any(|a| a.id == approver.id) {
                    return Err(WorkflowError::InvalidTemplate(format!(
                        "approver {} is listed twice on level {}",
                        approver.id, level_no
                    )));
                }
            }
        }

        Ok(())
    }

    /// Instantiate pending nodes, numbering levels 1..N in template order
    pub fn build_nodes(&self) -> WorkflowResult<Vec<ApprovalNode>> {
        self.validate()?;
        Ok(self
            .levels
            .iter()
            .zip(1u32..)
            .map(|(level, n)| ApprovalNode::new(n, level.approvers.clone(), level.combination_rule))
            .collect())
    }
}

/// Templates keyed by request type, with a fallback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateRegistry {
    pub default: WorkflowTemplate,
    #[serde(default)]
    pub request_types: BTreeMap<String, WorkflowTemplate>,
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TemplateRegistry {
    /// Two levels: either team lead, then HR
    pub fn builtin() -> Self {
        let default = WorkflowTemplate::new(vec![
            LevelTemplate::new(
                vec![
                    Approver::new("1", "Jane Smith", "Team Lead"),
                    Approver::new("2", "Bob Johnson", "Team Lead"),
                ],
                CombinationRule::Any,
            ),
            LevelTemplate::new(
                vec![Approver::new("3", "Alice Brown", "HR Manager")],
                CombinationRule::All,
            ),
        ]);

        Self {
            default,
            request_types: BTreeMap::new(),
        }
    }

    pub fn from_json(json: &str) -> WorkflowResult<Self> {
        let parsed: TemplateRegistry = serde_json::from_str(json)
            .map_err(|e| WorkflowError::InvalidTemplate(e.to_string()))?;

        parsed.default.validate()?;
        let mut request_types = BTreeMap::new();
        for (name, template) in parsed.request_types {
            template.validate().map_err(|e| match e {
                WorkflowError::InvalidTemplate(msg) => {
                    WorkflowError::InvalidTemplate(format!("{}: {}", name, msg))
                }
                other => other,
            })?;
            let key = normalize(&name);
            if request_types.insert(key.clone(), template).is_some() {
                return Err(WorkflowError::InvalidTemplate(format!(
                    "request type {} is defined twice",
                    key
                )));
            }
        }

        Ok(Self {
            default: parsed.default,
            request_types,
        })
    }

    pub fn load(path: &Path) -> WorkflowResult<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            WorkflowError::InvalidTemplate(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    /// Template for a request type, falling back to the default
    pub fn for_request_type(&self, request_type: &str) -> &WorkflowTemplate {
        self.request_types
            .get(&normalize(request_type))
            .unwrap_or(&self.default)
    }

    /// Every approver referenced by any template, first occurrence wins.
    /// The default template comes first, then request types by name.
    pub fn approvers(&self) -> Vec<Approver> {
        let mut seen: Vec<Approver> = Vec::new();
        let templates = std::iter::once(&self.default).chain(self.request_types.values());
        for level in templates.flat_map(|t| t.levels.iter()) {
            for approver in &level.approvers {
                if !seen.iter().any(|a| a.id == approver.id) {
                    seen.push(approver.clone());
                }
            }
        }
        seen
    }
}

fn normalize(request_type: &str) -> String {
    request_type.trim().to_lowercase()
}
