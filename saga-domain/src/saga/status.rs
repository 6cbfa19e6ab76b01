use saga_macros::value_object;
use std::fmt;

/// Saga 状态，除 `InProgress` 外均为终态
#[value_object(copy = true)]
#[derive(Hash)]
#[serde(rename_all = "snake_case")]
pub enum SagaStatus {
    #[default]
    InProgress,
    Completed,
    Failed,
    Expired,
}

impl SagaStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SagaStatus::InProgress)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SagaStatus::InProgress => "in_progress",
            SagaStatus::Completed => "completed",
            SagaStatus::Failed => "failed",
            SagaStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for SagaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_in_progress_is_open() {
        assert!(!SagaStatus::default().is_terminal());
        assert!(SagaStatus::Completed.is_terminal());
        assert!(SagaStatus::Failed.is_terminal());
        assert!(SagaStatus::Expired.is_terminal());
    }

    #[test]
    fn serializes_as_snake_case() {
        let json = serde_json::to_string(&SagaStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
        assert_eq!(SagaStatus::Expired.to_string(), "expired");
    }
}
