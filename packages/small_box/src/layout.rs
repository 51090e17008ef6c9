use crate::{HeapOnly, Marked, Overlapped, Storage, Tagged};

/// Size of one pointer-sized bookkeeping word.
const WORD: usize = size_of::<usize>();

/// A total size budget for a [`SmallBox`][crate::SmallBox].
///
/// The budget fixes how many bytes a [`SmallBox`][crate::SmallBox] occupies. Whatever is left
/// after the bookkeeping words becomes inline storage for the owned object:
///
/// | Owned view | Bookkeeping | Inline bytes |
/// |---|---|---|
/// | sized type | heap pointer + state tag | `SIZE - 2 * WORD` |
/// | trait object, callback | view pointer + callback | `SIZE - 3 * WORD` |
/// | trait object, relocation hook | view pointer | `SIZE - 2 * WORD` |
/// | slice | view pointer | `SIZE - 2 * WORD` |
///
/// Trait objects with a relocation hook and slices need no callback, so they get one word more
/// than trait objects that relocate through a stored callback.
///
/// The inline buffer is aligned to the largest power of two that divides `SIZE`, so budgets that
/// are powers of two can hold the most strictly aligned objects.
///
/// The [`Heap`] budget has no inline storage at all and reduces a
/// [`SmallBox`][crate::SmallBox] to a single (possibly wide) pointer.
///
/// # Safety
///
/// Implementations must only name storage layouts from this crate, sized from `SIZE`, such that
/// every storage type is at most `SIZE` bytes (with `SIZE` at least the size of a wide pointer).
pub unsafe trait Budget: 'static {
    /// The upper bound for the size of a [`SmallBox`][crate::SmallBox] using this budget.
    const SIZE: usize;

    /// Storage layout for sized, non-polymorphic owned types.
    type OverlappedStorage<T>: Storage<T>;

    /// Storage layout for trait objects relocated through a stored callback.
    type TaggedStorage<T: ?Sized>: Storage<T>;

    /// Storage layout for slices and for trait objects relocated through their own hook.
    type MarkedStorage<T: ?Sized>: Storage<T>;
}

/// Zero-sized marker that gives an inline buffer an alignment of 8 bytes.
#[derive(Clone, Copy, Debug)]
#[non_exhaustive]
#[repr(align(8))]
pub struct Align8;

/// Zero-sized marker that gives an inline buffer an alignment of 16 bytes.
#[derive(Clone, Copy, Debug)]
#[non_exhaustive]
#[repr(align(16))]
pub struct Align16;

/// Zero-sized marker that gives an inline buffer an alignment of 32 bytes.
#[derive(Clone, Copy, Debug)]
#[non_exhaustive]
#[repr(align(32))]
pub struct Align32;

/// Zero-sized marker that gives an inline buffer an alignment of 64 bytes.
#[derive(Clone, Copy, Debug)]
#[non_exhaustive]
#[repr(align(64))]
pub struct Align64;

/// Zero-sized marker that gives an inline buffer an alignment of 128 bytes.
#[derive(Clone, Copy, Debug)]
#[non_exhaustive]
#[repr(align(128))]
pub struct Align128;

/// Zero-sized marker that gives an inline buffer an alignment of 256 bytes.
#[derive(Clone, Copy, Debug)]
#[non_exhaustive]
#[repr(align(256))]
pub struct Align256;

macro_rules! budgets {
    ($($(#[$meta:meta])* $name:ident => $size:literal, $align:ty;)*) => {$(
        $(#[$meta])*
        #[derive(Clone, Copy, Debug)]
        #[non_exhaustive]
        pub struct $name;

        // SAFETY: Each layout is sized so that buffer and bookkeeping words add up to at most
        // `$size` bytes and `$size` is a multiple of the alignment marker.
        unsafe impl Budget for $name {
            const SIZE: usize = $size;

            type OverlappedStorage<T> =
                Overlapped<T, $align, { usize::saturating_sub($size, 2 * WORD) }>;
            type TaggedStorage<T: ?Sized> =
                Tagged<T, $align, { usize::saturating_sub($size, 3 * WORD) }>;
            type MarkedStorage<T: ?Sized> =
                Marked<T, $align, { usize::saturating_sub($size, 2 * WORD) }>;
        }
    )*};
}

budgets! {
    /// A 24-byte budget. Trait objects without a relocation hook get no inline bytes on 64-bit
    /// targets.
    S24 => 24, Align8;
    /// A 32-byte budget with a 32-byte aligned buffer.
    S32 => 32, Align32;
    /// A 40-byte budget.
    S40 => 40, Align8;
    /// A 48-byte budget with a 16-byte aligned buffer.
    S48 => 48, Align16;
    /// A 56-byte budget.
    S56 => 56, Align8;
    /// The default 64-byte budget, one cache line on common hardware.
    S64 => 64, Align64;
    /// A 128-byte budget.
    S128 => 128, Align128;
    /// A 256-byte budget.
    S256 => 256, Align256;
}

/// A budget without inline storage. Every object is allocated on the heap.
///
/// A [`SmallBox`][crate::SmallBox] with this budget behaves like a [`Box`] and is exactly one
/// (possibly wide) pointer in size.
///
/// # Examples
///
/// ```rust
/// use small_box::{Heap, SmallBox};
///
/// let boxed = SmallBox::<u32, Heap>::new(42);
///
/// assert!(!boxed.is_inline());
/// assert_eq!(size_of::<SmallBox<u32, Heap>>(), size_of::<usize>());
/// ```
#[derive(Clone, Copy, Debug)]
#[non_exhaustive]
pub struct Heap;

// SAFETY: Heap-only storage is a single pointer, at most a wide pointer in size.
unsafe impl Budget for Heap {
    const SIZE: usize = 2 * WORD;

    type OverlappedStorage<T> = HeapOnly<T>;
    type TaggedStorage<T: ?Sized> = HeapOnly<T>;
    type MarkedStorage<T: ?Sized> = HeapOnly<T>;
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::any::Any;

    use super::*;
    use crate::SmallBox;

    #[test]
    fn owner_size_matches_budget() {
        assert_eq!(size_of::<SmallBox<u8, S24>>(), 24);
        assert_eq!(size_of::<SmallBox<u8, S32>>(), 32);
        assert_eq!(size_of::<SmallBox<u8, S40>>(), 40);
        assert_eq!(size_of::<SmallBox<u8, S48>>(), 48);
        assert_eq!(size_of::<SmallBox<u8, S56>>(), 56);
        assert_eq!(size_of::<SmallBox<u8>>(), 64);
        assert_eq!(size_of::<SmallBox<u8, S128>>(), 128);
        assert_eq!(size_of::<SmallBox<u8, S256>>(), 256);

        assert_eq!(size_of::<SmallBox<dyn Any, S24>>(), 24);
        assert_eq!(size_of::<SmallBox<dyn Any, S32>>(), 32);
        assert_eq!(size_of::<SmallBox<dyn Any>>(), 64);
        assert_eq!(size_of::<SmallBox<[u16], S48>>(), 48);
        assert_eq!(size_of::<SmallBox<[u16]>>(), 64);
    }

    #[test]
    fn oversized_types_still_fit_budget() {
        assert_eq!(size_of::<SmallBox<[u8; 1000]>>(), 64);
        assert_eq!(size_of::<SmallBox<[u8; 1000], S32>>(), 32);
    }

    #[test]
    fn heap_budget_is_one_pointer() {
        assert_eq!(size_of::<SmallBox<u64, Heap>>(), size_of::<usize>());
        assert_eq!(size_of::<SmallBox<dyn Any, Heap>>(), 2 * size_of::<usize>());
        assert_eq!(size_of::<SmallBox<[u8], Heap>>(), 2 * size_of::<usize>());
    }

    #[test]
    fn owner_alignment_is_power_of_two_factor_of_budget() {
        assert_eq!(align_of::<SmallBox<u8, S24>>(), 8);
        assert_eq!(align_of::<SmallBox<u8, S32>>(), 32);
        assert_eq!(align_of::<SmallBox<u8, S40>>(), 8);
        assert_eq!(align_of::<SmallBox<u8, S48>>(), 16);
        assert_eq!(align_of::<SmallBox<u8, S56>>(), 8);
        assert_eq!(align_of::<SmallBox<u8, S64>>(), 64);
        assert_eq!(align_of::<SmallBox<u8, S128>>(), 128);
        assert_eq!(align_of::<SmallBox<u8, S256>>(), 256);
    }

    #[test]
    fn budget_sizes() {
        assert_eq!(S24::SIZE, 24);
        assert_eq!(S64::SIZE, 64);
        assert_eq!(S256::SIZE, 256);
        assert_eq!(Heap::SIZE, 2 * size_of::<usize>());
    }
}
