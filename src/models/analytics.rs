use serde::Serialize;

/// One labelled value in a chart series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphPoint {
    pub label: String,
    pub value: f64,
}

impl GraphPoint {
    pub fn new(label: impl Into<String>, value: f64) -> Self {
        Self {
            label: label.into(),
            value,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AnalyticsResponse {
    pub total_revenue: f64,
    pub total_students: i64,
    pub active_courses: i64,
    pub total_enrollments: i64,
    pub revenue_data: Vec<GraphPoint>,
    pub course_distribution: Vec<GraphPoint>,
}
