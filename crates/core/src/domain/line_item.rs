use serde::{Deserialize, Serialize};

use crate::domain::job::JobId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineItemId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LineItemType {
    Labor,
    Part,
    Fee,
}

impl LineItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineItemType::Labor => "LABOR",
            LineItemType::Part => "PART",
            LineItemType::Fee => "FEE",
        }
    }
}

impl std::str::FromStr for LineItemType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "LABOR" => Ok(LineItemType::Labor),
            "PART" => Ok(LineItemType::Part),
            "FEE" => Ok(LineItemType::Fee),
            other => Err(format!("unknown line item type `{other}`")),
        }
    }
}

/// Proposal lifecycle of a line item. `Proposed` may move to `Approved` or
/// `Declined` through the approval cascade, never back.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LineItemStatus {
    Proposed,
    Approved,
    Declined,
}

impl LineItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineItemStatus::Proposed => "PROPOSED",
            LineItemStatus::Approved => "APPROVED",
            LineItemStatus::Declined => "DECLINED",
        }
    }
}

impl std::str::FromStr for LineItemStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "PROPOSED" => Ok(LineItemStatus::Proposed),
            "APPROVED" => Ok(LineItemStatus::Approved),
            "DECLINED" => Ok(LineItemStatus::Declined),
            other => Err(format!("unknown line item status `{other}`")),
        }
    }
}

/// One billable unit (labor/part/fee) proposed on a job.
///
/// `unit_price_cents` is integer minor currency units; display formatting is
/// someone else's problem. `sort_order` is per-job creation order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: LineItemId,
    pub job_id: JobId,
    pub item_type: LineItemType,
    pub name: String,
    pub qty: i64,
    pub unit_price_cents: i64,
    pub labor_hours: Option<f64>,
    pub taxable: bool,
    pub status: LineItemStatus,
    pub sort_order: i64,
}

impl LineItem {
    pub fn total_cents(&self) -> i64 {
        self.qty * self.unit_price_cents
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewLineItem {
    pub item_type: LineItemType,
    pub name: String,
    pub qty: i64,
    pub unit_price_cents: i64,
    pub labor_hours: Option<f64>,
    pub taxable: bool,
}
