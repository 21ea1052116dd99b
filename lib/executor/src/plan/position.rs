use std::fmt::{Display, Formatter as FmtFormatter, Result as FmtResult};

/// Where a node sits in its plan: the child index taken at every level below
/// the root. Ordering positions gives the plan's pre-order.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PlanPosition(Vec<usize>);

impl PlanPosition {
    pub fn root() -> Self {
        PlanPosition::default()
    }

    pub fn child(&self, index: usize) -> Self {
        let mut indexes = self.0.clone();
        indexes.push(index);
        PlanPosition(indexes)
    }
}

impl Display for PlanPosition {
    fn fmt(&self, f: &mut FmtFormatter<'_>) -> FmtResult {
        if self.0.is_empty() {
            return write!(f, "root");
        }
        for (i, index) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{}", index)?;
        }
        Ok(())
    }
}
