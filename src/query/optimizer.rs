use crate::query::planner::LogicalPlan;

/// Trait for plan rewrite rules. A rule returns `None` when it does not apply.
pub trait OptimizationRule: Send + Sync {
    fn name(&self) -> &str;
    fn optimize(&self, plan: LogicalPlan) -> Option<LogicalPlan>;
}

/// Rule: clauses that can never match are dropped, or empty the whole bool
pub struct PruneMatchNoneRule;

impl OptimizationRule for PruneMatchNoneRule {
    fn name(&self) -> &str {
        "prune_match_none"
    }

    fn optimize(&self, plan: LogicalPlan) -> Option<LogicalPlan> {
        let LogicalPlan::Bool { must, should, must_not, boost } = plan else {
            return None;
        };
        let is_none = |p: &LogicalPlan| matches!(p, LogicalPlan::MatchNone);

        if must.iter().any(is_none) {
            return Some(LogicalPlan::MatchNone);
        }
        if !should.iter().any(is_none) && !must_not.iter().any(is_none) {
            return None;
        }

        let had_should = !should.is_empty();
        let should: Vec<LogicalPlan> = should.into_iter().filter(|p| !is_none(p)).collect();
        let must_not: Vec<LogicalPlan> = must_not.into_iter().filter(|p| !is_none(p)).collect();

        // Without musts, the shoulds decide the match
        if must.is_empty() && had_should && should.is_empty() {
            return Some(LogicalPlan::MatchNone);
        }
        Some(LogicalPlan::Bool { must, should, must_not, boost })
    }
}

/// Rule: a bool wrapping one unboosted positive clause is that clause
pub struct SingleClauseRule;

impl OptimizationRule for SingleClauseRule {
    fn name(&self) -> &str {
        "single_clause"
    }

    fn optimize(&self, plan: LogicalPlan) -> Option<LogicalPlan> {
        match plan {
            LogicalPlan::Bool { mut must, mut should, must_not, boost }
                if must_not.is_empty() && boost == 1.0 && must.len() + should.len() == 1 =>
            {
                Some(must.pop().or_else(|| should.pop()).unwrap_or(LogicalPlan::MatchNone))
            }
            LogicalPlan::Bool { must, should, must_not, boost }
                if must.is_empty() && should.is_empty() && must_not.is_empty() =>
            {
                Some(LogicalPlan::MatchAll { boost })
            }
            _ => None,
        }
    }
}

/// Query optimizer: applies every rule bottom-up
pub struct QueryOptimizer {
    pub rules: Vec<Box<dyn OptimizationRule>>,
}

impl QueryOptimizer {
    pub fn new() -> Self {
        QueryOptimizer {
            rules: vec![
                Box::new(PruneMatchNoneRule),
                Box::new(SingleClauseRule),
            ],
        }
    }

    pub fn optimize(&self, plan: LogicalPlan) -> LogicalPlan {
        let plan = match plan {
            LogicalPlan::Bool { must, should, must_not, boost } => LogicalPlan::Bool {
                must: must.into_iter().map(|p| self.optimize(p)).collect(),
                should: should.into_iter().map(|p| self.optimize(p)).collect(),
                must_not: must_not.into_iter().map(|p| self.optimize(p)).collect(),
                boost,
            },
            other => other,
        };

        let mut optimized = plan;
        for rule in &self.rules {
            if let Some(new_plan) = rule.optimize(optimized.clone()) {
                optimized = new_plan;
            }
        }
        optimized
    }
}

impl Default for QueryOptimizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn term(t: &str) -> LogicalPlan {
        LogicalPlan::Term { field: "f".into(), term: t.into(), boost: 1.0 }
    }

    #[test]
    fn test_match_none_pruning() {
        let optimizer = QueryOptimizer::new();
        let plan = LogicalPlan::any_of(vec![term("a"), LogicalPlan::MatchNone]);
        assert_eq!(optimizer.optimize(plan), term("a"));

        let only_none = LogicalPlan::Bool {
            must: Vec::new(),
            should: vec![LogicalPlan::MatchNone],
            must_not: vec![term("b")],
            boost: 1.0,
        };
        assert_eq!(optimizer.optimize(only_none), LogicalPlan::MatchNone);

        let required = LogicalPlan::all_of(vec![term("a"), LogicalPlan::MatchNone]);
        assert_eq!(optimizer.optimize(required), LogicalPlan::MatchNone);
    }

    #[test]
    fn test_negation_only_bool_is_kept() {
        let optimizer = QueryOptimizer::new();
        let plan = LogicalPlan::Bool { must: Vec::new(), should: Vec::new(), must_not: vec![term("a")], boost: 1.0 };
        assert_eq!(optimizer.optimize(plan.clone()), plan);
    }
}
