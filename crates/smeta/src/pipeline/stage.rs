//! Stage graph: which stage needs which upstream result, and the order a
//! request's stages run in.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::results::{ComparisonReport, EstimateItem, LineItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    List,
    Estimate,
    Comparison,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::List, Stage::Estimate, Stage::Comparison];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::List => "list",
            Stage::Estimate => "estimate",
            Stage::Comparison => "comparison",
        }
    }

    /// Capitalized name used in error messages.
    pub fn label(&self) -> &'static str {
        match self {
            Stage::List => "List",
            Stage::Estimate => "Estimate",
            Stage::Comparison => "Comparison",
        }
    }

    /// Stages whose output this stage cannot run without.
    pub fn requires(&self) -> &'static [Stage] {
        match self {
            Stage::List => &[],
            Stage::Estimate => &[Stage::List],
            Stage::Comparison => &[Stage::List],
        }
    }

    /// Stages whose output this stage uses instead, when they are part of
    /// the same run. They are never pulled into a run on their own.
    pub fn prefers(&self) -> &'static [Stage] {
        match self {
            Stage::Comparison => &[Stage::Estimate],
            _ => &[],
        }
    }

    /// Max tokens for this stage's generation call.
    pub fn budget(&self, budgets: &crate::config::TokenBudgets) -> u32 {
        match self {
            Stage::List => budgets.list,
            Stage::Estimate => budgets.estimate,
            Stage::Comparison => budgets.comparison,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown output kind: '{0}'")]
pub struct UnknownStage(pub String);

impl FromStr for Stage {
    type Err = UnknownStage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "list" => Ok(Stage::List),
            "estimate" => Ok(Stage::Estimate),
            "comparison" => Ok(Stage::Comparison),
            _ => Err(UnknownStage(s.trim().to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("No outputs requested")]
    Empty,

    #[error("Stage dependency cycle involving: {0:?}")]
    Cycle(Vec<Stage>),
}

/// One step of a plan. `emit` is false for stages computed only because a
/// requested stage depends on them; those produce no artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedStage {
    pub stage: Stage,
    pub emit: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagePlan {
    steps: Vec<PlannedStage>,
}

impl StagePlan {
    pub fn steps(&self) -> &[PlannedStage] {
        &self.steps
    }

    pub fn stages(&self) -> impl Iterator<Item = Stage> + '_ {
        self.steps.iter().map(|s| s.stage)
    }

    pub fn contains(&self, stage: Stage) -> bool {
        self.steps.iter().any(|s| s.stage == stage)
    }
}

/// Builds the ordered stage list for a set of requested outputs.
///
/// The requested set is closed over [`Stage::requires`], then ordered with
/// Kahn's algorithm over the hard edges plus any [`Stage::prefers`] edge
/// whose source is in the closure. Ties break on [`Stage`] order, so the
/// same request always yields the same plan.
pub fn plan(requested: &BTreeSet<Stage>) -> Result<StagePlan, PlanError> {
    if requested.is_empty() {
        return Err(PlanError::Empty);
    }

    let mut included: BTreeSet<Stage> = BTreeSet::new();
    let mut pending: Vec<Stage> = requested.iter().copied().collect();
    while let Some(stage) = pending.pop() {
        if included.insert(stage) {
            pending.extend_from_slice(stage.requires());
        }
    }

    let mut in_degree: BTreeMap<Stage, usize> = included.iter().map(|s| (*s, 0)).collect();
    let mut dependents: BTreeMap<Stage, Vec<Stage>> = BTreeMap::new();
    for &stage in &included {
        let upstream = stage
            .requires()
            .iter()
            .chain(stage.prefers())
            .filter(|u| included.contains(u));
        for &up in upstream {
            dependents.entry(up).or_default().push(stage);
            *in_degree.entry(stage).or_default() += 1;
        }
    }

    let mut ready: BTreeSet<Stage> = in_degree
        .iter()
        .filter(|(_, d)| **d == 0)
        .map(|(s, _)| *s)
        .collect();
    let mut steps = Vec::with_capacity(included.len());

    while let Some(stage) = ready.pop_first() {
        steps.push(PlannedStage {
            stage,
            emit: requested.contains(&stage),
        });
        for &next in dependents.get(&stage).map(Vec::as_slice).unwrap_or_default() {
            if let Some(degree) = in_degree.get_mut(&next) {
                *degree -= 1;
                if *degree == 0 {
                    ready.insert(next);
                }
            }
        }
    }

    if steps.len() != included.len() {
        let stuck = in_degree
            .into_iter()
            .filter(|(_, d)| *d > 0)
            .map(|(s, _)| s)
            .collect();
        return Err(PlanError::Cycle(stuck));
    }

    Ok(StagePlan { steps })
}

/// Structured result of one stage, held for the rest of the run.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutput {
    Items(Vec<LineItem>),
    Estimate(Vec<EstimateItem>),
    Comparison(ComparisonReport),
}

impl StageOutput {
    pub fn stage(&self) -> Stage {
        match self {
            StageOutput::Items(_) => Stage::List,
            StageOutput::Estimate(_) => Stage::Estimate,
            StageOutput::Comparison(_) => Stage::Comparison,
        }
    }

    /// Pretty JSON of the output, as handed to a downstream prompt.
    pub fn to_prompt_json(&self) -> String {
        let rendered = match self {
            StageOutput::Items(items) => serde_json::to_string_pretty(items),
            StageOutput::Estimate(items) => serde_json::to_string_pretty(items),
            StageOutput::Comparison(report) => serde_json::to_string_pretty(report),
        };
        rendered.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(stages: &[Stage]) -> BTreeSet<Stage> {
        stages.iter().copied().collect()
    }

    fn order(plan: &StagePlan) -> Vec<(Stage, bool)> {
        plan.steps().iter().map(|s| (s.stage, s.emit)).collect()
    }

    // ── Parsing ──

    #[test]
    fn test_parse_stage_names() {
        assert_eq!("list".parse::<Stage>().unwrap(), Stage::List);
        assert_eq!(" Estimate ".parse::<Stage>().unwrap(), Stage::Estimate);
        assert_eq!("COMPARISON".parse::<Stage>().unwrap(), Stage::Comparison);
        assert_eq!(
            "summary".parse::<Stage>(),
            Err(UnknownStage("summary".to_string()))
        );
    }

    #[test]
    fn test_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Stage::Estimate).unwrap(), "\"estimate\"");
        let parsed: Vec<Stage> = serde_json::from_str(r#"["comparison","list"]"#).unwrap();
        assert_eq!(parsed, vec![Stage::Comparison, Stage::List]);
    }

    #[test]
    fn test_budget_per_stage() {
        let budgets = crate::config::TokenBudgets::default();
        assert_eq!(Stage::List.budget(&budgets), 8000);
        assert_eq!(Stage::Estimate.budget(&budgets), 8000);
        assert_eq!(Stage::Comparison.budget(&budgets), 4000);
    }

    // ── Planning ──

    #[test]
    fn test_plan_empty_rejected() {
        assert_eq!(plan(&BTreeSet::new()), Err(PlanError::Empty));
    }

    #[test]
    fn test_plan_list_only() {
        let p = plan(&set(&[Stage::List])).unwrap();
        assert_eq!(order(&p), vec![(Stage::List, true)]);
    }

    #[test]
    fn test_plan_estimate_pulls_in_silent_list() {
        let p = plan(&set(&[Stage::Estimate])).unwrap();
        assert_eq!(order(&p), vec![(Stage::List, false), (Stage::Estimate, true)]);
    }

    #[test]
    fn test_plan_comparison_alone_skips_estimate() {
        let p = plan(&set(&[Stage::Comparison])).unwrap();
        assert_eq!(order(&p), vec![(Stage::List, false), (Stage::Comparison, true)]);
        assert!(!p.contains(Stage::Estimate));
    }

    #[test]
    fn test_plan_comparison_runs_after_estimate_when_both_requested() {
        let p = plan(&set(&[Stage::Comparison, Stage::Estimate])).unwrap();
        assert_eq!(
            order(&p),
            vec![
                (Stage::List, false),
                (Stage::Estimate, true),
                (Stage::Comparison, true)
            ]
        );
    }

    #[test]
    fn test_plan_all_stages() {
        let p = plan(&set(&Stage::ALL)).unwrap();
        assert_eq!(
            p.stages().collect::<Vec<_>>(),
            vec![Stage::List, Stage::Estimate, Stage::Comparison]
        );
        assert!(p.steps().iter().all(|s| s.emit));
    }

    #[test]
    fn test_plan_list_and_comparison() {
        let p = plan(&set(&[Stage::List, Stage::Comparison])).unwrap();
        assert_eq!(order(&p), vec![(Stage::List, true), (Stage::Comparison, true)]);
    }

    #[test]
    fn test_every_dependency_precedes_its_dependent() {
        let subsets: Vec<Vec<Stage>> = vec![
            vec![Stage::List],
            vec![Stage::Estimate],
            vec![Stage::Comparison],
            vec![Stage::List, Stage::Estimate],
            vec![Stage::List, Stage::Comparison],
            vec![Stage::Estimate, Stage::Comparison],
            Stage::ALL.to_vec(),
        ];
        for subset in subsets {
            let p = plan(&set(&subset)).unwrap();
            let stages: Vec<Stage> = p.stages().collect();
            for (i, stage) in stages.iter().enumerate() {
                for up in stage.requires().iter().chain(stage.prefers()) {
                    if let Some(j) = stages.iter().position(|s| s == up) {
                        assert!(j < i, "{:?} must precede {:?} in {:?}", up, stage, stages);
                    }
                }
            }
        }
    }

    // ── Outputs ──

    #[test]
    fn test_output_stage_and_prompt_json() {
        let output = StageOutput::Items(vec![LineItem {
            name: "Кладка кирпича".to_string(),
            ..Default::default()
        }]);
        assert_eq!(output.stage(), Stage::List);
        assert!(output.to_prompt_json().contains("Кладка кирпича"));
    }
}
