use serde::{Deserialize, Serialize};

/// Lifecycle of an entity's generated image
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Status {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

impl Status {
    /// Whether an entity in this state may move to `next`
    ///
    /// `Processing` may be re-entered by a retry, and a finished entity may
    /// be restarted by a new generation request.
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending | Self::Processing | Self::Completed | Self::Failed, Self::Processing)
                | (Self::Processing, Self::Completed | Self::Failed)
        )
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::Status::{self, Completed, Failed, Pending, Processing};

    #[test]
    fn allowed_transitions() {
        let allowed = [
            (Pending, Processing),
            (Processing, Processing),
            (Processing, Completed),
            (Processing, Failed),
            (Completed, Processing),
            (Failed, Processing),
        ];
        let all = [Pending, Processing, Completed, Failed];

        for from in all {
            for to in all {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&(from, to)),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn terminal_states() {
        assert!(Status::Completed.is_terminal());
        assert!(Status::Failed.is_terminal());
        assert!(!Status::Processing.is_terminal());
        assert_eq!(Status::default(), Pending);
    }
}
