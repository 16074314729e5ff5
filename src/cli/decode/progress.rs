use anyhow::Result;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// A bar over `total_frames` when the stream was indexed, otherwise a
/// spinner counting frames.
pub fn create_progress_bar(
    multi: &MultiProgress,
    total_frames: Option<u64>,
) -> Result<ProgressBar> {
    let pb = if let Some(total) = total_frames {
        let pb = multi.add(ProgressBar::new(total));
        pb.set_style(ProgressStyle::with_template(
            "{bar:40.cyan/blue} {pos}/{len} frames ({percent}%)\n{msg} | elapsed: {elapsed_precise} | ETA: {eta_precise}",
        )?);

        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    } else {
        let pb = multi.add(ProgressBar::new_spinner());
        pb.set_style(ProgressStyle::with_template(
            "{spinner:.green} {pos} frames\n{msg} | elapsed: {elapsed_precise}",
        )?);

        pb
    };
    pb.set_message("decoding");
    Ok(pb)
}

pub fn finalize_progress_bar(
    pb: &ProgressBar,
    indexed: bool,
    decoded_secs: f64,
    start_time: std::time::Instant,
) {
    let elapsed = start_time.elapsed().as_secs_f64();
    let realtime_multiplier = if elapsed > 0.0 {
        decoded_secs / elapsed
    } else {
        0.0
    };
    let final_time_str = crate::timestamp::time_str(decoded_secs);

    if indexed {
        pb.set_style(
            ProgressStyle::with_template(
                "{bar:40.cyan/blue} {pos}/{len} frames ({percent}%)\n{msg} | elapsed: {elapsed_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
    } else {
        pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} {pos} frames\n{msg} | elapsed: {elapsed_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
    }

    pb.finish_with_message(format!(
        "speed: {realtime_multiplier:.1}x | decoded: {final_time_str}"
    ));
}
