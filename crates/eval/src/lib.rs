pub mod adaptive;
pub mod alerts;
pub mod bertscore;
pub mod dashboard;
pub mod evaluation;
pub mod judge;
pub mod prompt_opt;
pub mod rouge;

pub use adaptive::{
    AdaptationReport, AdaptationStatus, AdaptiveConfig, AdaptiveRetriever, FineTuneTrigger, HardNegative,
    HardNegativeReason, JsonlFineTuneQueue,
};
pub use alerts::{Alert, AlertKind, AlertSystem};
pub use bertscore::{BertScore, BertScorer};
pub use dashboard::{Dashboard, DashboardMetrics, DashboardReport};
pub use evaluation::{AutomaticScores, ContinuousEvaluator, EvaluationRecord};
pub use judge::LlmJudge;
pub use prompt_opt::{AbTestReport, PromptOptimizer, PromptSample, PromptTemplates, PromptVariant};
pub use rouge::{RougeScore, rouge_l};
