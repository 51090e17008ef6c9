use std::fmt;

use thiserror::Error;

/// The value could not be stored inline and was handed back to the caller.
///
/// Returned by [`SmallBox::try_new_inline()`][crate::SmallBox::try_new_inline].
#[derive(Error)]
#[error(
    "{size}-byte value (align {align}) does not fit {capacity} inline bytes (align {buffer_align})"
)]
pub struct InlineError<T> {
    value: T,
    size: usize,
    align: usize,
    capacity: usize,
    buffer_align: usize,
}

impl<T> InlineError<T> {
    pub(crate) fn new(value: T, capacity: usize, buffer_align: usize) -> Self {
        Self {
            value,
            size: size_of::<T>(),
            align: align_of::<T>(),
            capacity,
            buffer_align,
        }
    }

    /// Returns the value that could not be stored.
    #[must_use]
    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T> fmt::Debug for InlineError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InlineError")
            .field("size", &self.size)
            .field("align", &self.align)
            .field("capacity", &self.capacity)
            .field("buffer_align", &self.buffer_align)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn message_names_layouts() {
        let error = InlineError::new([0_u8; 100], 48, 64);

        assert_eq!(
            error.to_string(),
            "100-byte value (align 1) does not fit 48 inline bytes (align 64)"
        );
    }

    #[test]
    fn hands_value_back() {
        let error = InlineError::new(String::from("kept"), 0, 1);

        assert_eq!(error.into_inner(), "kept");
    }
}
