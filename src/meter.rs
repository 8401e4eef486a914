use cpal::{FromSample, Sample};

use crate::types::LevelPair;

/// Instantaneous peak of each channel of an interleaved stereo block.
///
/// Every call starts from zero; nothing carries over between blocks. A
/// trailing half frame is ignored. Integer samples are scaled to [-1, 1]
/// as they are read, so no converted copy of the block is made.
pub fn measure<T>(block: &[T]) -> LevelPair
where
    T: Sample,
    f32: FromSample<T>,
{
    block
        .chunks_exact(2)
        .fold(LevelPair::SILENT, |acc, frame| {
            let left = f32::from_sample(frame[0]).abs();
            let right = f32::from_sample(frame[1]).abs();
            LevelPair::new(acc.left.max(left), acc.right.max(right))
        })
}
