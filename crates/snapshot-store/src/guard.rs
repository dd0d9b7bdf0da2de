use stepreplay_core_types::Step;

use crate::errors::{SnapErrKind, SnapError};
use crate::model::{executed_coverage, ExecutedStep};

/// A save must cover every distinct expected step so a partial run cannot
/// truncate the stored snapshot.
pub fn check_complete(expected: &[Step], executed: &[ExecutedStep]) -> Result<(), SnapError> {
    let (done, wanted) = executed_coverage(expected, executed);
    if wanted == 0 || done < wanted {
        return Err(SnapErrKind::Incomplete {
            executed: done,
            expected: wanted,
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RecordedAction;
    use action_primitives::ActionRecord;

    fn done(step: &Step) -> ExecutedStep {
        ExecutedStep::new(
            step.clone(),
            vec![RecordedAction::new(
                ActionRecord::Navigate { url: "/".into() },
                None,
            )],
        )
    }

    #[test]
    fn test_check_complete() {
        let steps = stepreplay_core_types::parse_steps("open\nclick Go");
        assert!(check_complete(&steps, &[done(&steps[0]), done(&steps[1])]).is_ok());
        let err = check_complete(&steps, &[done(&steps[0])]).unwrap_err();
        assert_eq!(
            err.kind(),
            &SnapErrKind::Incomplete {
                executed: 1,
                expected: 2
            }
        );
        assert!(err.is_refusal());
        assert!(check_complete(&[], &[]).is_err());
    }
}
