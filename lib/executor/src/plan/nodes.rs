use std::fmt::{Display, Formatter as FmtFormatter, Result as FmtResult};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    plan::path::FlattenNodePath,
    utils::pretty_display::{get_indent, PrettyDisplay},
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryPlan {
    /// Always `"QueryPlan"`; optional on input.
    #[serde(default)]
    kind: QueryPlanKind,
    pub node: Option<PlanNode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variable_definitions: Vec<VariableDefinition>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
enum QueryPlanKind {
    #[default]
    QueryPlan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableDefinition {
    pub name: String,
    #[serde(default)]
    pub non_null: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum PlanNode {
    Fetch(FetchNode),
    Sequence(SequenceNode),
    Parallel(ParallelNode),
    Flatten(FlattenNode),
    Condition(ConditionNode),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchNode {
    pub service_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
    pub operation: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variable_usages: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires: Option<SelectionSet>,
}

impl FetchNode {
    /// Entity fetches re-resolve objects already present in the response,
    /// so they need representations extracted before being dispatched.
    pub fn requires_entities(&self) -> bool {
        self.requires.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceNode {
    pub nodes: Vec<PlanNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParallelNode {
    pub nodes: Vec<PlanNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlattenNode {
    pub path: FlattenNodePath,
    pub node: Box<PlanNode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionKind {
    Skip,
    #[default]
    Include,
}

impl ConditionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionKind::Skip => "skip",
            ConditionKind::Include => "include",
        }
    }
}

/// The `if:` argument of `@skip`/`@include`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionValue {
    Literal(bool),
    Variable(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionNode {
    #[serde(default)]
    pub directive: ConditionKind,
    pub condition: ConditionValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub if_clause: Option<Box<PlanNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub else_clause: Option<Box<PlanNode>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectionSet {
    pub items: Vec<SelectionItem>,
}

impl SelectionSet {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum SelectionItem {
    Field(FieldSelection),
    InlineFragment(InlineFragmentSelection),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSelection {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "SelectionSet::is_empty")]
    pub selections: SelectionSet,
}

impl FieldSelection {
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineFragmentSelection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_condition: Option<String>,
    pub selections: SelectionSet,
}

impl PlanNode {
    /// Names of every service a fetch beneath this node may call, in plan order.
    pub fn service_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_service_names(&mut names);
        names
    }

    fn collect_service_names<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            PlanNode::Fetch(node) => {
                if !names.contains(&node.service_name.as_str()) {
                    names.push(&node.service_name);
                }
            }
            PlanNode::Sequence(SequenceNode { nodes }) | PlanNode::Parallel(ParallelNode { nodes }) => {
                for node in nodes {
                    node.collect_service_names(names);
                }
            }
            PlanNode::Flatten(node) => node.node.collect_service_names(names),
            PlanNode::Condition(node) => {
                for clause in [&node.if_clause, &node.else_clause].into_iter().flatten() {
                    clause.collect_service_names(names);
                }
            }
        }
    }
}

impl Display for QueryPlan {
    fn fmt(&self, f: &mut FmtFormatter<'_>) -> FmtResult {
        self.pretty_fmt(f, 0)
    }
}

impl Display for PlanNode {
    fn fmt(&self, f: &mut FmtFormatter<'_>) -> FmtResult {
        self.pretty_fmt(f, 0)
    }
}

impl Display for SelectionSet {
    fn fmt(&self, f: &mut FmtFormatter<'_>) -> FmtResult {
        write!(f, "{{")?;
        for (index, item) in self.items.iter().enumerate() {
            if index > 0 {
                write!(f, " ")?;
            }
            match item {
                SelectionItem::Field(field) => {
                    if let Some(alias) = &field.alias {
                        write!(f, "{}: ", alias)?;
                    }
                    write!(f, "{}", field.name)?;
                    if !field.selections.is_empty() {
                        write!(f, " {}", field.selections)?;
                    }
                }
                SelectionItem::InlineFragment(fragment) => match &fragment.type_condition {
                    Some(type_condition) => {
                        write!(f, "... on {} {}", type_condition, fragment.selections)?
                    }
                    None => write!(f, "... {}", fragment.selections)?,
                },
            }
        }
        write!(f, "}}")
    }
}

impl PrettyDisplay for QueryPlan {
    fn pretty_fmt(&self, f: &mut FmtFormatter<'_>, depth: usize) -> FmtResult {
        let indent = get_indent(depth);
        writeln!(f, "{indent}QueryPlan {{")?;
        if let Some(node) = &self.node {
            node.pretty_fmt(f, depth + 1)?;
        }
        writeln!(f, "{indent}}},")?;
        Ok(())
    }
}

impl PrettyDisplay for FetchNode {
    fn pretty_fmt(&self, f: &mut FmtFormatter<'_>, depth: usize) -> FmtResult {
        let indent = get_indent(depth);
        writeln!(f, "{indent}Fetch(service: \"{}\") {{", self.service_name)?;
        if let Some(requires) = &self.requires {
            writeln!(f, "{indent}  {} =>", requires)?;
        }
        writeln!(f, "{indent}  {{")?;
        for line in self.operation.lines() {
            writeln!(f, "{indent}    {line}")?;
        }
        writeln!(f, "{indent}  }}")?;
        writeln!(f, "{indent}}},")?;

        Ok(())
    }
}

impl PrettyDisplay for FlattenNode {
    fn pretty_fmt(&self, f: &mut FmtFormatter<'_>, depth: usize) -> FmtResult {
        let indent = get_indent(depth);
        writeln!(f, "{indent}Flatten(path: \"{}\") {{", self.path)?;
        self.node.pretty_fmt(f, depth + 1)?;
        writeln!(f, "{indent}}},")?;

        Ok(())
    }
}

impl PrettyDisplay for ConditionNode {
    fn pretty_fmt(&self, f: &mut FmtFormatter<'_>, depth: usize) -> FmtResult {
        let indent = get_indent(depth);
        let condition = match &self.condition {
            ConditionValue::Literal(value) => value.to_string(),
            ConditionValue::Variable(name) => format!("${}", name),
        };
        writeln!(
            f,
            "{indent}{}({}) {{",
            self.directive.as_str().to_uppercase(),
            condition
        )?;
        if let Some(if_clause) = &self.if_clause {
            writeln!(f, "{indent}  Then {{")?;
            if_clause.pretty_fmt(f, depth + 2)?;
            writeln!(f, "{indent}  }},")?;
        }
        if let Some(else_clause) = &self.else_clause {
            writeln!(f, "{indent}  Else {{")?;
            else_clause.pretty_fmt(f, depth + 2)?;
            writeln!(f, "{indent}  }},")?;
        }
        writeln!(f, "{indent}}},")?;

        Ok(())
    }
}

impl PrettyDisplay for PlanNode {
    fn pretty_fmt(&self, f: &mut FmtFormatter<'_>, depth: usize) -> FmtResult {
        match self {
            PlanNode::Fetch(node) => node.pretty_fmt(f, depth),
            PlanNode::Flatten(node) => node.pretty_fmt(f, depth),
            PlanNode::Condition(node) => node.pretty_fmt(f, depth),
            PlanNode::Parallel(ParallelNode { nodes }) | PlanNode::Sequence(SequenceNode { nodes }) => {
                let indent = get_indent(depth);
                let variant = if matches!(self, PlanNode::Parallel(_)) {
                    "Parallel"
                } else {
                    "Sequence"
                };
                writeln!(f, "{indent}{variant} {{")?;
                for node in nodes {
                    node.pretty_fmt(f, depth + 1)?;
                }
                writeln!(f, "{indent}}},")?;
                Ok(())
            }
        }
    }
}
