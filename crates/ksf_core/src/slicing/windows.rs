//! Fixed-stride clip windows.

use super::{SlicingError, SlicingResult};

/// Window start times covering a video of `duration` seconds.
///
/// Walks from 0 in steps of `stride`, emitting each start whose clip fits
/// entirely inside the video. When the next step overshoots the end but
/// still lies inside the video, one final start is emitted there if at
/// least half a clip of content remains. That last clip may run past the
/// end and may overlap its predecessor.
///
/// A video shorter than one clip yields no windows. Negative or non-finite
/// durations and non-positive clip lengths or strides are rejected.
pub fn generate_starts(duration: f64, clip_len: f64, stride: f64) -> SlicingResult<Vec<f64>> {
    if !duration.is_finite() || duration < 0.0 {
        return Err(SlicingError::InvalidInput(format!(
            "duration must be a non-negative number, got {}",
            duration
        )));
    }
    if !clip_len.is_finite() || clip_len <= 0.0 {
        return Err(SlicingError::InvalidInput(format!(
            "clip length must be positive, got {}",
            clip_len
        )));
    }
    if !stride.is_finite() || stride <= 0.0 {
        return Err(SlicingError::InvalidInput(format!(
            "stride must be positive, got {}",
            stride
        )));
    }

    if duration < clip_len {
        tracing::warn!(
            "Video duration ({:.2}s) is shorter than clip length ({}s)",
            duration,
            clip_len
        );
        return Ok(Vec::new());
    }

    let mut starts = Vec::new();
    let mut current = 0.0;

    while current + clip_len <= duration {
        starts.push(current);
        current += stride;

        if current + clip_len > duration && current < duration {
            let remaining = duration - current;
            if remaining >= clip_len * 0.5 {
                starts.push(current);
            }
            break;
        }
    }

    tracing::debug!(
        "Generated {} windows ({}s clips, {}s stride) over {:.2}s",
        starts.len(),
        clip_len,
        stride,
        duration
    );

    Ok(starts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hundred_seconds_gets_tail_window() {
        let starts = generate_starts(100.0, 20.0, 18.0).unwrap();
        assert_eq!(starts, vec![0.0, 18.0, 36.0, 54.0, 72.0, 90.0]);
    }

    #[test]
    fn short_tail_is_dropped() {
        // Tail at 36 leaves 9s, under half a clip
        let starts = generate_starts(45.0, 20.0, 18.0).unwrap();
        assert_eq!(starts, vec![0.0, 18.0]);
    }

    #[test]
    fn video_shorter_than_clip_is_empty() {
        assert!(generate_starts(10.0, 20.0, 18.0).unwrap().is_empty());
        assert!(generate_starts(0.0, 20.0, 18.0).unwrap().is_empty());
    }

    #[test]
    fn exact_fit_is_single_window() {
        assert_eq!(generate_starts(20.0, 20.0, 18.0).unwrap(), vec![0.0]);
    }

    #[test]
    fn stride_equal_to_clip_tiles_exactly() {
        let starts = generate_starts(60.0, 20.0, 20.0).unwrap();
        assert_eq!(starts, vec![0.0, 20.0, 40.0]);
    }

    #[test]
    fn starts_ascend_and_fit() {
        let duration = 317.5;
        let starts = generate_starts(duration, 20.0, 18.0).unwrap();
        assert!(starts.windows(2).all(|w| w[0] < w[1]));
        // Every start but a possible tail fits fully
        for s in &starts[..starts.len() - 1] {
            assert!(s + 20.0 <= duration);
        }
        assert!(duration - starts[starts.len() - 1] >= 10.0);
    }

    #[test]
    fn malformed_input_is_rejected() {
        assert!(matches!(
            generate_starts(-1.0, 20.0, 18.0),
            Err(SlicingError::InvalidInput(_))
        ));
        assert!(generate_starts(f64::NAN, 20.0, 18.0).is_err());
        assert!(generate_starts(100.0, 0.0, 18.0).is_err());
        assert!(generate_starts(100.0, 20.0, 0.0).is_err());
        assert!(generate_starts(100.0, 20.0, -5.0).is_err());
    }
}
