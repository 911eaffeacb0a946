use std::fmt;

use chrono::SecondsFormat;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionType {
    Available,
    Progressing,
}

impl fmt::Display for ConditionType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Available => write!(f, "Available"),
            Self::Progressing => write!(f, "Progressing"),
        }
    }
}

/// Conditions written here are always `True`, the other values show up on
/// conditions set by other clients and must still parse.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: ConditionType,
    pub status: ConditionStatus,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub last_update_time: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub last_transition_time: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

/// Observed vs declared child count of a parent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildCount {
    pub available: i32,
    pub total: i32,
}

/// Wording of the progressing reasons, per child noun
#[derive(Debug, Clone, Copy)]
pub struct Reasons {
    pub converged: &'static str,
    pub too_many: &'static str,
    pub too_few: &'static str,
}

impl ChildCount {
    pub fn new(available: usize, total: usize) -> Self {
        Self {
            available: available as i32,
            total: total as i32,
        }
    }

    /// status already reflects a converged, non empty parent
    pub fn is_settled(&self) -> bool {
        self.available != 0 && self.available == self.total
    }

    pub fn is_over(&self) -> bool {
        self.available > self.total
    }

    /// condition to append for this count, stamped now
    pub fn condition(&self, reasons: &Reasons) -> Condition {
        let (condition_type, reason) = if self.available == self.total {
            (ConditionType::Available, reasons.converged)
        } else if self.is_over() {
            (ConditionType::Progressing, reasons.too_many)
        } else {
            (ConditionType::Progressing, reasons.too_few)
        };
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        Condition {
            condition_type,
            status: ConditionStatus::True,
            last_update_time: now.clone(),
            last_transition_time: now,
            reason: reason.to_owned(),
            message: String::new(),
        }
    }
}

#[cfg(test)]
mod test {

    use super::ChildCount;
    use super::Condition;
    use super::ConditionStatus;
    use super::ConditionType;
    use super::Reasons;

    const REASONS: Reasons = Reasons {
        converged: "all",
        too_many: "delete",
        too_few: "create",
    };

    #[test]
    fn test_settled() {
        assert!(ChildCount::new(2, 2).is_settled());
        assert!(!ChildCount::new(0, 0).is_settled());
        assert!(!ChildCount::new(1, 2).is_settled());
    }

    #[test]
    fn test_condition_reason() {
        let available = ChildCount::new(1, 1).condition(&REASONS);
        assert_eq!(available.condition_type, ConditionType::Available);
        assert_eq!(available.status, ConditionStatus::True);
        assert_eq!(available.reason, "all");
        assert!(!available.last_update_time.is_empty());

        let over = ChildCount::new(3, 1).condition(&REASONS);
        assert_eq!(over.condition_type, ConditionType::Progressing);
        assert_eq!(over.reason, "delete");

        let under = ChildCount::new(0, 1).condition(&REASONS);
        assert_eq!(under.condition_type, ConditionType::Progressing);
        assert_eq!(under.reason, "create");
    }

    #[test]
    fn test_condition_json() {
        let condition = ChildCount::new(0, 0).condition(&REASONS);
        let json = serde_json::to_value(&condition).expect("json");
        assert_eq!(json["type"], "Available");
        assert_eq!(json["status"], "True");
        assert!(json.get("message").is_none());
        assert!(json["lastTransitionTime"].as_str().is_some());
    }

    #[test]
    fn test_foreign_condition_status() {
        let conditions: Vec<Condition> = serde_json::from_value(serde_json::json!([
            { "type": "Progressing", "status": "False", "reason": "paused" },
            { "type": "Available", "status": "Unknown" }
        ]))
        .expect("conditions");
        assert_eq!(conditions[0].status, ConditionStatus::False);
        assert_eq!(conditions[1].status, ConditionStatus::Unknown);
        assert!(conditions[1].last_update_time.is_empty());
    }
}
