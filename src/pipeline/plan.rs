//! Batch planner: partition one run of consecutive pages into batches.
//!
//! The rule is divisor-based, not size-based. `group_size` is how many pages
//! get stacked into one composite, chosen so that the *number of composites*
//! never exceeds the per-request image limit:
//!
//! ```text
//! group_size  = ceil(len / max_images_per_request)
//! batch count = ceil(len / group_size)   ≤ max_images_per_request
//! ```
//!
//! For short runs (`len ≤ max`) the divisor is 1 and every page is its own
//! batch. For a long run the divisor grows — a 45-page run with the default
//! limit of 20 yields 15 batches of 3 pages each, each batch one composite.

use crate::error::ExtractError;

/// Partition `run` into contiguous batches under the divisor-based rule.
///
/// Every batch except possibly the last holds exactly `group_size` pages;
/// the last holds the remainder. Concatenating the batches in order
/// reproduces `run` exactly.
///
/// # Errors
/// [`ExtractError::InvalidConfig`] if `max_images_per_request` is zero. This
/// is a configuration error reported to the caller, not retried.
pub fn plan_batches(
    run: &[u32],
    max_images_per_request: usize,
) -> Result<Vec<Vec<u32>>, ExtractError> {
    if max_images_per_request == 0 {
        return Err(ExtractError::InvalidConfig(
            "max_images_per_request must be ≥ 1".into(),
        ));
    }
    if run.is_empty() {
        return Ok(Vec::new());
    }

    let group_size = run.len().div_ceil(max_images_per_request);
    Ok(run.chunks(group_size).map(<[u32]>::to_vec).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_limit_is_a_config_error() {
        let err = plan_batches(&[1, 2, 3], 0).unwrap_err();
        assert!(matches!(err, ExtractError::InvalidConfig(_)));
    }

    #[test]
    fn empty_run_plans_nothing() {
        assert!(plan_batches(&[], 20).unwrap().is_empty());
    }

    #[test]
    fn short_run_is_one_page_per_batch() {
        // len ≤ max ⇒ group_size = 1.
        let batches = plan_batches(&[3, 4, 5], 20).unwrap();
        assert_eq!(batches, vec![vec![3], vec![4], vec![5]]);
    }

    #[test]
    fn long_run_packs_pages_per_batch() {
        // The reference scenario: 45 consecutive pages, limit 20 ⇒
        // group_size = ceil(45/20) = 3 ⇒ 15 batches of exactly 3 pages.
        let run: Vec<u32> = (1..=45).collect();
        let batches = plan_batches(&run, 20).unwrap();
        assert_eq!(batches.len(), 15);
        assert!(batches.iter().all(|b| b.len() == 3));
    }

    #[test]
    fn final_batch_holds_the_remainder() {
        // 7 pages, limit 3 ⇒ group_size = 3 ⇒ batches of 3, 3, 1.
        let run: Vec<u32> = (10..=16).collect();
        let batches = plan_batches(&run, 3).unwrap();
        assert_eq!(batches, vec![vec![10, 11, 12], vec![13, 14, 15], vec![16]]);
    }

    #[test]
    fn concatenation_reproduces_the_run() {
        for len in 1usize..=60 {
            for max in 1usize..=25 {
                let run: Vec<u32> = (1..=len as u32).collect();
                let batches = plan_batches(&run, max).unwrap();

                let rejoined: Vec<u32> = batches.iter().flatten().copied().collect();
                assert_eq!(rejoined, run, "len={len} max={max}");
                assert!(
                    batches.len() <= max,
                    "len={len} max={max}: {} batches",
                    batches.len()
                );

                let group_size = len.div_ceil(max);
                assert_eq!(batches.len(), len.div_ceil(group_size));
            }
        }
    }
}
