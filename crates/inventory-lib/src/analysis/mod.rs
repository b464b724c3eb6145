//! Cost breakdowns, forecasts and optimization recommendations

mod costs;
mod recommend;

pub use costs::{
    CostAnalysis, CostAnalyzer, CostPrediction, DailyCost, RegionCost, ServiceCost, Trend,
    ANALYSIS_WINDOW_DAYS,
};
pub use recommend::{
    recommend, total_savings, Recommendation, RecommendationType, LOW_CPU_PERCENT,
    LOW_DB_CONNECTIONS,
};
