pub mod nodes;
pub mod path;
pub mod position;

pub use nodes::{
    ConditionKind, ConditionNode, ConditionValue, FetchNode, FieldSelection, FlattenNode,
    InlineFragmentSelection, ParallelNode, PlanNode, QueryPlan, SelectionItem, SelectionSet,
    SequenceNode, VariableDefinition,
};
pub use path::{FlattenNodePath, FlattenNodePathSegment};
pub use position::PlanPosition;
